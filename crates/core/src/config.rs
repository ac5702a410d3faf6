use std::path::PathBuf;

use serde::Deserialize;

/// Pipeline thresholds and knobs. Defaults mirror the values the pipeline was
/// tuned with; all of them can be overridden from a deserialized config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum Hamming distance (out of 64 bits) for a perceptual match.
    pub perceptual_threshold: u32,
    /// DBSCAN neighborhood radius in face-embedding space.
    pub cluster_eps: f32,
    /// Minimum neighborhood size (self included) for a core point.
    pub cluster_min_samples: usize,
    /// Maximum centroid distance to assign a cluster to an existing person.
    pub person_match_threshold: f32,
    /// Photos per ingestion batch.
    pub batch_size: usize,
    /// Longest edge of the normalized derivative image.
    pub max_derivative_edge: u32,
    /// Where originals and derivatives are stored. None disables media copies.
    pub media_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            perceptual_threshold: 10,
            cluster_eps: 0.6,
            cluster_min_samples: 2,
            person_match_threshold: 0.6,
            batch_size: 32,
            max_derivative_edge: 1600,
            media_dir: None,
        }
    }
}
