use serde::{Deserialize, Serialize};

/// A photo known to the catalog.
///
/// `hash` is unique across all rows: re-ingesting the same bytes resolves to
/// the existing row instead of creating a second one. `is_new` stays set until
/// the photo has been perceptually compared against the full corpus, which
/// happens exactly once over its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub filename: String,
    /// Location of the original bytes.
    pub path: String,
    /// Location of the normalized derivative, if one was produced.
    pub derived_path: Option<String>,
    /// SHA-256 of the raw file bytes, hex-encoded.
    pub hash: String,
    /// 64-bit average hash of the decoded image.
    pub phash: Option<u64>,
    /// 64-bit difference hash, kept alongside the aHash for consensus checks.
    pub dhash: Option<u64>,
    /// True until perceptual validation against the corpus has run.
    pub is_new: bool,
    /// Unix timestamp of ingestion.
    pub processed_at: i64,
}

/// A clustered identity. The centroid is always the arithmetic mean of every
/// face embedding currently on record for this person; it is recomputed from
/// scratch whenever membership changes, never drifted incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub label: String,
    pub centroid: Vec<f32>,
    pub created_at: i64,
}

/// Face location within a photo, in pixel coordinates (top, right, bottom, left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

/// A detected face tied to the photo it was found in. Ephemeral within a
/// batch until clustering resolves it to a person.
#[derive(Debug, Clone)]
pub struct FaceObservation {
    pub photo_id: i64,
    pub bounds: BoundingBox,
    pub embedding: Vec<f32>,
}

/// Records that a photo duplicates another, with the mechanism that matched.
/// A photo may carry several links with different reasons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateLink {
    pub id: i64,
    pub photo_id: i64,
    pub duplicate_of_id: i64,
    /// `exact`, `perceptual:<distance>`, or `visual`.
    pub reason: String,
}

/// Cumulative counters emitted by ingestion. The per-item counters
/// (`photos_processed`, `exact_duplicates`, `faces_detected`,
/// `perceptual_links`, `visual_links`, `errors`) sum across sub-batches to
/// the same totals as one large batch. `clusters_created`,
/// `persons_created`, and `persons_matched` depend on where batch
/// boundaries fall: an identity built across two batches is created once
/// and then matched, where a single batch only creates. The catalog ends
/// in the same state either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub photos_processed: usize,
    pub exact_duplicates: usize,
    pub faces_detected: usize,
    pub clusters_created: usize,
    pub persons_created: usize,
    pub persons_matched: usize,
    pub embeddings_saved: usize,
    pub associations_created: usize,
    pub perceptual_links: usize,
    pub visual_links: usize,
    pub errors: usize,
    pub batches_processed: usize,
}

impl std::ops::AddAssign for BatchStats {
    fn add_assign(&mut self, rhs: Self) {
        self.photos_processed += rhs.photos_processed;
        self.exact_duplicates += rhs.exact_duplicates;
        self.faces_detected += rhs.faces_detected;
        self.clusters_created += rhs.clusters_created;
        self.persons_created += rhs.persons_created;
        self.persons_matched += rhs.persons_matched;
        self.embeddings_saved += rhs.embeddings_saved;
        self.associations_created += rhs.associations_created;
        self.perceptual_links += rhs.perceptual_links;
        self.visual_links += rhs.visual_links;
        self.errors += rhs.errors;
        self.batches_processed += rhs.batches_processed;
    }
}

/// Catalog-wide totals for the status view.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CatalogStats {
    pub total_photos: usize,
    pub total_persons: usize,
    pub total_associations: usize,
    pub total_duplicate_links: usize,
    pub unvalidated_photos: usize,
}
