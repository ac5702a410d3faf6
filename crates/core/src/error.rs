use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("embedding serialization error: {0}")]
    Embedding(#[from] serde_json::Error),

    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("source path does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("source path is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("media root does not exist: {}", .0.display())]
    MediaRootNotFound(PathBuf),

    #[error("photo not found: {0}")]
    PhotoNotFound(i64),

    #[error("person not found: {0}")]
    PersonNotFound(i64),

    #[error("face extraction failed: {0}")]
    Extraction(String),

    #[error("embedding failed: {0}")]
    EmbeddingModel(String),
}

pub type Result<T> = std::result::Result<T, Error>;
