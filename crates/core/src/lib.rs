pub mod catalog;
pub mod cluster;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod extract;
pub mod hasher;
pub mod index;
pub mod media;
pub mod scanner;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::{info, warn};
use rayon::prelude::*;

use catalog::{Catalog, NewPhoto};
use cluster::FaceClusterer;
use dedup::{DedupDecision, DuplicateResolver};
use domain::*;
use error::Result;
use extract::{DetectedFace, FaceExtractor, ImageEmbedder};
use hasher::perceptual;
use index::SimilarityIndex;

pub use config::PipelineConfig;

/// Callback for reporting ingestion progress.
pub enum IngestProgress {
    /// Starting a batch of files.
    BatchStart { index: usize, file_count: usize },
    /// A batch finished, with its counters.
    BatchComplete { stats: BatchStats },
    /// The whole run finished, with cumulative counters.
    Complete { stats: BatchStats },
}

/// The ingestion pipeline: exact/perceptual/visual deduplication plus face
/// clustering into a stable person population.
///
/// The face extractor, image embedder, and photo similarity index are
/// pluggable externals; an absent collaborator skips its stage (hashing and
/// perceptual dedup always run). Batches are processed sequentially — the
/// person match-or-create step needs a single writer — while per-photo
/// hashing, decoding, and model work fan out across rayon workers.
pub struct Pipeline {
    catalog: Catalog,
    config: PipelineConfig,
    face_extractor: Option<Box<dyn FaceExtractor>>,
    image_embedder: Option<Box<dyn ImageEmbedder>>,
    photo_index: Option<Box<dyn SimilarityIndex>>,
}

/// Per-photo output of the parallel preparation phase.
struct Prepared {
    hash: String,
    phash: Option<u64>,
    dhash: Option<u64>,
    orientation: u8,
    image: DynamicImage,
    faces: Vec<DetectedFace>,
    embedding: Option<Vec<f32>>,
}

impl Pipeline {
    /// Open or create a pipeline catalog at the given path.
    pub fn open(catalog_path: &Path, config: PipelineConfig) -> Result<Self> {
        if let Some(media_dir) = &config.media_dir {
            media::check_media_root(media_dir)?;
        }
        let catalog = Catalog::open(catalog_path)?;
        Ok(Self {
            catalog,
            config,
            face_extractor: None,
            image_embedder: None,
            photo_index: None,
        })
    }

    /// In-memory pipeline (for testing).
    pub fn open_in_memory(config: PipelineConfig) -> Result<Self> {
        let catalog = Catalog::open_in_memory()?;
        Ok(Self {
            catalog,
            config,
            face_extractor: None,
            image_embedder: None,
            photo_index: None,
        })
    }

    pub fn with_face_extractor(mut self, extractor: Box<dyn FaceExtractor>) -> Self {
        self.face_extractor = Some(extractor);
        self
    }

    pub fn with_image_embedder(mut self, embedder: Box<dyn ImageEmbedder>) -> Self {
        self.image_embedder = Some(embedder);
        self
    }

    pub fn with_photo_index(mut self, photo_index: Box<dyn SimilarityIndex>) -> Self {
        self.photo_index = Some(photo_index);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Discover image files under `dir` and ingest them in batches of
    /// `batch_size`. Cumulative counters are the sum of every batch's
    /// counters, whatever the batch split.
    pub fn run(
        &mut self,
        dir: &Path,
        batch_size: usize,
        mut progress_cb: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> Result<BatchStats> {
        let files = scanner::scan_directory(dir)?;
        let batch_size = batch_size.max(1);

        let mut total = BatchStats::default();
        for (i, chunk) in files.chunks(batch_size).enumerate() {
            if let Some(ref mut cb) = progress_cb {
                cb(IngestProgress::BatchStart {
                    index: i + 1,
                    file_count: chunk.len(),
                });
            }
            let stats = self.ingest_batch(chunk)?;
            if let Some(ref mut cb) = progress_cb {
                cb(IngestProgress::BatchComplete { stats });
            }
            total += stats;
        }

        if let Some(ref mut cb) = progress_cb {
            cb(IngestProgress::Complete { stats: total });
        }
        Ok(total)
    }

    /// Ingest one batch of files.
    ///
    /// Phases: parallel read+hash, sequential exact-duplicate short-circuit
    /// (before any decode or model work), parallel decode+hash+extract+embed
    /// for survivors, sequential persistence and visual dedup, one clustering
    /// call over the whole batch's observations, then perceptual validation
    /// of the corpus. A failing photo is counted and skipped; its siblings
    /// still go through.
    pub fn ingest_batch(&mut self, files: &[PathBuf]) -> Result<BatchStats> {
        let mut stats = BatchStats {
            batches_processed: 1,
            ..BatchStats::default()
        };

        // Phase 1: read and content-hash in parallel, no shared state.
        let read: Vec<(PathBuf, std::io::Result<Vec<u8>>)> = files
            .par_iter()
            .map(|path| (path.clone(), std::fs::read(path)))
            .collect();

        // Phase 2: exact-duplicate short-circuit. Runs before face
        // extraction, embedding, or media copies are paid for.
        let resolver = DuplicateResolver::new(&self.catalog, self.config.perceptual_threshold);
        let mut batch_hashes: HashSet<String> = HashSet::new();
        let mut survivors: Vec<(PathBuf, Vec<u8>)> = Vec::new();
        for (path, bytes) in read {
            let bytes = match bytes {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("failed to read {}: {e}", path.display());
                    stats.errors += 1;
                    continue;
                }
            };
            match resolver.evaluate(&bytes)? {
                DedupDecision::ExactDuplicateOf(existing) => {
                    info!(
                        "{} is byte-identical to photo {}, skipping",
                        path.display(),
                        existing.id
                    );
                    stats.exact_duplicates += 1;
                }
                DedupDecision::Unseen { content_hash } => {
                    if batch_hashes.insert(content_hash) {
                        survivors.push((path, bytes));
                    } else {
                        // Byte-identical to an earlier file in this batch
                        stats.exact_duplicates += 1;
                    }
                }
            }
        }

        // Phase 3: decode, perceptual-hash, extract faces, and embed in
        // parallel. Collaborators are shared immutably across workers.
        let extractor = self.face_extractor.as_deref();
        let embedder = self.image_embedder.as_deref();
        let prepared: Vec<(PathBuf, Result<Prepared>)> = survivors
            .into_par_iter()
            .map(|(path, bytes)| {
                let result = prepare_photo(&bytes, extractor, embedder);
                (path, result)
            })
            .collect();

        // Phase 4: persist sequentially. Catalog writes and index updates
        // happen in file order, one photo at a time.
        let mut observations: Vec<FaceObservation> = Vec::new();
        for (path, result) in prepared {
            let photo = match result {
                Ok(p) => p,
                Err(e) => {
                    warn!("failed to process {}: {e}", path.display());
                    stats.errors += 1;
                    continue;
                }
            };
            if let Err(e) = persist_photo(
                &self.catalog,
                &self.config,
                &mut self.photo_index,
                &path,
                photo,
                &mut stats,
                &mut observations,
            ) {
                warn!("failed to persist {}: {e}", path.display());
                stats.errors += 1;
            }
        }

        // Phase 5: cluster the whole batch at once. Every photo has finished
        // extraction by now; clustering a partial population would fragment
        // identities.
        let clusterer = FaceClusterer::from_config(&self.config);
        clusterer.cluster_batch(&self.catalog, &observations, &mut stats)?;

        // Phase 6: perceptual validation of everything still unvalidated.
        let resolver = DuplicateResolver::new(&self.catalog, self.config.perceptual_threshold);
        resolver.validate_perceptual(&mut stats)?;

        Ok(stats)
    }

    /// Catalog summary totals.
    pub fn status(&self) -> Result<CatalogStats> {
        self.catalog.stats_summary()
    }

    pub fn photos(&self) -> Result<Vec<Photo>> {
        self.catalog.list_photos()
    }

    pub fn persons(&self) -> Result<Vec<Person>> {
        self.catalog.list_people()
    }

    pub fn duplicates(&self) -> Result<Vec<DuplicateLink>> {
        self.catalog.list_duplicates()
    }
}

/// Decode and run the per-photo model work. Pure with respect to the catalog;
/// safe to run on any worker thread.
fn prepare_photo(
    bytes: &[u8],
    extractor: Option<&dyn FaceExtractor>,
    embedder: Option<&dyn ImageEmbedder>,
) -> Result<Prepared> {
    let hash = hasher::content_hash(bytes);
    let image = image::load_from_memory(bytes)?;
    let orientation = perceptual::orientation_from_bytes(bytes);
    let (phash, dhash) = match perceptual::hashes_from_image(&image, orientation) {
        Some((p, d)) => (Some(p), Some(d)),
        None => (None, None),
    };
    let faces = match extractor {
        Some(x) => x.extract(&image)?,
        None => Vec::new(),
    };
    let embedding = match embedder {
        Some(e) => Some(e.embed(&image)?),
        None => None,
    };
    Ok(Prepared {
        hash,
        phash,
        dhash,
        orientation,
        image,
        faces,
        embedding,
    })
}

/// Persist one prepared photo: optional media copies, the photo row, the
/// visual dedup step, and the batch's face observations.
fn persist_photo(
    catalog: &Catalog,
    config: &PipelineConfig,
    photo_index: &mut Option<Box<dyn SimilarityIndex>>,
    source_path: &Path,
    prepared: Prepared,
    stats: &mut BatchStats,
    observations: &mut Vec<FaceObservation>,
) -> Result<()> {
    let (path, derived_path) = match &config.media_dir {
        Some(root) => {
            let original = media::store_original(root, &prepared.hash, source_path)?;
            let derivative = media::store_derivative(
                root,
                &prepared.hash,
                &prepared.image,
                prepared.orientation,
                config.max_derivative_edge,
            )?;
            (
                original.to_string_lossy().into_owned(),
                Some(derivative.to_string_lossy().into_owned()),
            )
        }
        None => (source_path.to_string_lossy().into_owned(), None),
    };

    let filename = source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| prepared.hash.clone());

    let photo = catalog.create_photo(&NewPhoto {
        filename,
        path,
        derived_path,
        hash: prepared.hash,
        phash: prepared.phash,
        dhash: prepared.dhash,
    })?;
    stats.photos_processed += 1;
    stats.faces_detected += prepared.faces.len();

    if let (Some(embedding), Some(index)) = (&prepared.embedding, photo_index.as_deref_mut()) {
        let resolver = DuplicateResolver::new(catalog, config.perceptual_threshold);
        resolver.resolve_visual(index, photo.id, embedding, stats)?;
    }

    for face in prepared.faces {
        observations.push(FaceObservation {
            photo_id: photo.id,
            bounds: face.bounds,
            embedding: face.embedding,
        });
    }
    Ok(())
}
