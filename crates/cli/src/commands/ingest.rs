use std::path::Path;

use anyhow::Result;
use shoebox_core::{IngestProgress, Pipeline};

pub fn run(pipeline: &mut Pipeline, dir: &Path) -> Result<()> {
    let batch_size = pipeline.config().batch_size;

    let mut on_progress = |progress: IngestProgress| match progress {
        IngestProgress::BatchStart { index, file_count } => {
            println!("Batch #{index}: {file_count} files...");
        }
        IngestProgress::BatchComplete { stats } => {
            println!(
                "  {} new, {} exact duplicates, {} faces, {} errors",
                stats.photos_processed, stats.exact_duplicates, stats.faces_detected, stats.errors
            );
        }
        IngestProgress::Complete { stats } => {
            println!();
            println!("Ingestion complete ({} batches)", stats.batches_processed);
            println!("  Photos ingested:     {}", stats.photos_processed);
            println!("  Exact duplicates:    {}", stats.exact_duplicates);
            println!("  Faces detected:      {}", stats.faces_detected);
            println!("  Clusters formed:     {}", stats.clusters_created);
            println!("  Persons created:     {}", stats.persons_created);
            println!("  Persons matched:     {}", stats.persons_matched);
            println!("  Embeddings saved:    {}", stats.embeddings_saved);
            println!("  Associations:        {}", stats.associations_created);
            println!("  Perceptual links:    {}", stats.perceptual_links);
            println!("  Visual links:        {}", stats.visual_links);
            println!("  Errors:              {}", stats.errors);
        }
    };

    pipeline.run(dir, batch_size, Some(&mut on_progress))?;
    Ok(())
}
