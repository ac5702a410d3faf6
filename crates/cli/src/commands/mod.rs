pub mod duplicates;
pub mod ingest;
pub mod persons;
pub mod photos;
pub mod status;
