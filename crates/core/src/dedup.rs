//! Three-granularity duplicate resolution: exact (content hash), perceptual
//! (Hamming distance over aHash fingerprints), and visual (holistic embedding
//! nearest-neighbor). The mechanisms are independent and additive; a photo
//! may carry links from several of them at once.

use log::{debug, info};

use crate::catalog::Catalog;
use crate::domain::{BatchStats, Photo};
use crate::error::Result;
use crate::hasher;
use crate::hasher::perceptual::hamming_distance;
use crate::index::SimilarityIndex;

/// How many index neighbors to consider for the visual step. The index only
/// returns ids above its similarity threshold, so this is an upper bound, not
/// a sensitivity knob.
const VISUAL_TOP_K: usize = 5;

/// Outcome of the exact-duplicate check for a byte stream.
#[derive(Debug)]
pub enum DedupDecision {
    /// No photo with this content hash exists yet.
    Unseen { content_hash: String },
    /// Byte-identical to an existing photo. The caller must not create a new
    /// row, re-extract faces, or store bytes: this is a pure short-circuit,
    /// and no duplicate link is recorded for it.
    ExactDuplicateOf(Photo),
}

pub struct DuplicateResolver<'a> {
    catalog: &'a Catalog,
    perceptual_threshold: u32,
}

impl<'a> DuplicateResolver<'a> {
    pub fn new(catalog: &'a Catalog, perceptual_threshold: u32) -> Self {
        Self {
            catalog,
            perceptual_threshold,
        }
    }

    /// Exact step: hash the raw bytes and look the hash up.
    pub fn evaluate(&self, bytes: &[u8]) -> Result<DedupDecision> {
        let content_hash = hasher::content_hash(bytes);
        match self.catalog.get_photo_by_hash(&content_hash)? {
            Some(existing) => {
                debug!("exact duplicate of photo {} ({content_hash})", existing.id);
                Ok(DedupDecision::ExactDuplicateOf(existing))
            }
            None => Ok(DedupDecision::Unseen { content_hash }),
        }
    }

    /// Visual step: query the embedding index for near neighbors of a newly
    /// persisted photo. Any hit records a `visual` link per neighbor and the
    /// new embedding stays OUT of the index, so one underlying image never
    /// accumulates a cluster of index entries. No hit inserts the embedding
    /// under the new photo's id.
    pub fn resolve_visual(
        &self,
        index: &mut dyn SimilarityIndex,
        photo_id: i64,
        embedding: &[f32],
        stats: &mut BatchStats,
    ) -> Result<()> {
        let neighbors = index.query(embedding, VISUAL_TOP_K);
        if neighbors.is_empty() {
            index.insert(photo_id, embedding);
            return Ok(());
        }

        for neighbor in neighbors {
            if !self.catalog.duplicate_exists(photo_id, neighbor, "visual")? {
                self.catalog.create_duplicate(photo_id, neighbor, "visual")?;
                stats.visual_links += 1;
                info!("photo {photo_id} visually duplicates photo {neighbor}");
            }
        }
        Ok(())
    }

    /// Perceptual step: compare every unvalidated photo against the entire
    /// corpus and record `perceptual:<distance>` links for fingerprints within
    /// threshold.
    ///
    /// The full scan is O(corpus size) per new photo, deliberately: the
    /// fingerprints are 8 bytes and the corpus this pipeline targets is
    /// bounded, and an index would change which matches are observed.
    ///
    /// The unvalidated flag flips exactly once per photo, after its scan
    /// completes, even when no duplicate was found. A retry after a crash
    /// mid-scan re-checks the photo; the link guards make that safe.
    pub fn validate_perceptual(&self, stats: &mut BatchStats) -> Result<()> {
        let new_photos = self.catalog.list_unvalidated()?;
        if new_photos.is_empty() {
            return Ok(());
        }

        let all_photos = self.catalog.list_photos()?;
        info!(
            "validating {} new photos against {} total",
            new_photos.len(),
            all_photos.len()
        );

        for new_photo in &new_photos {
            if let Some(phash_new) = new_photo.phash {
                for existing in &all_photos {
                    if existing.id == new_photo.id {
                        continue;
                    }
                    let Some(phash_existing) = existing.phash else {
                        continue;
                    };
                    let distance = hamming_distance(phash_new, phash_existing);
                    if distance <= self.perceptual_threshold {
                        let reason = format!("perceptual:{distance}");
                        if !self
                            .catalog
                            .duplicate_exists(new_photo.id, existing.id, &reason)?
                        {
                            self.catalog
                                .create_duplicate(new_photo.id, existing.id, &reason)?;
                            stats.perceptual_links += 1;
                            info!(
                                "photo {} perceptually duplicates photo {} (distance {distance})",
                                new_photo.id, existing.id
                            );
                        }
                    }
                }
            } else {
                debug!("photo {} has no perceptual hash, skipping", new_photo.id);
            }
            self.catalog.mark_validated(new_photo.id)?;
        }
        Ok(())
    }
}
