//! Collaborator traits for the face-detection and image-embedding models.
//!
//! The models themselves are external: the pipeline only requires something
//! that maps a decoded image to face observations or to a holistic embedding
//! vector. Implementations wrap whatever backend is deployed (ONNX sessions,
//! a remote inference service, a test stub).

use image::DynamicImage;

use crate::domain::BoundingBox;
use crate::error::Result;

/// A face found by the detector, before it is tied to a photo.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bounds: BoundingBox,
    pub embedding: Vec<f32>,
}

/// Detects faces and produces one fixed-length embedding per face.
/// Called from worker threads during the parallel extraction phase, so
/// implementations must be thread-safe.
pub trait FaceExtractor: Send + Sync {
    fn extract(&self, image: &DynamicImage) -> Result<Vec<DetectedFace>>;
}

/// Produces a holistic image embedding for visual near-duplicate detection.
/// This is a whole-image vector, not a face vector.
pub trait ImageEmbedder: Send + Sync {
    fn embed(&self, image: &DynamicImage) -> Result<Vec<f32>>;
}
