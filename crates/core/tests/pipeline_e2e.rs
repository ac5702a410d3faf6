use std::collections::HashMap;
use std::fs;
use std::path::Path;

use image::DynamicImage;
use shoebox_core::domain::BoundingBox;
use shoebox_core::extract::{DetectedFace, FaceExtractor, ImageEmbedder};
use shoebox_core::index::CosineIndex;
use shoebox_core::{Pipeline, PipelineConfig};

// ── Fixtures ─────────────────────────────────────────────────────

/// Create a lossless image whose top-left pixel carries `marker`, with a
/// marker-seeded noise body so every marker gets a distinct content hash and
/// an uncorrelated perceptual hash. Stubs key off the marker pixel.
fn marker_image(marker: u8) -> image::RgbImage {
    image::RgbImage::from_fn(64, 64, |x, y| {
        if x == 0 && y == 0 {
            return image::Rgb([marker, 0, 0]);
        }
        let m = marker as u32;
        let v = (x.wrapping_mul(m + 3) ^ y.wrapping_mul(2 * m + 7) ^ (m * 37)) as u8;
        image::Rgb([v, v ^ marker, v.wrapping_add(marker)])
    })
}

fn save_marker_png(dir: &Path, name: &str, marker: u8) -> std::path::PathBuf {
    let path = dir.join(name);
    marker_image(marker).save(&path).unwrap();
    path
}

fn marker_of(image: &DynamicImage) -> u8 {
    image.to_rgb8().get_pixel(0, 0)[0]
}

const BOUNDS: BoundingBox = BoundingBox {
    top: 0,
    right: 16,
    bottom: 16,
    left: 0,
};

/// Face extractor stub: returns canned embeddings keyed by the marker pixel,
/// so results are deterministic under parallel extraction.
struct StubFaces {
    by_marker: HashMap<u8, Vec<Vec<f32>>>,
}

impl StubFaces {
    fn new(entries: &[(u8, Vec<Vec<f32>>)]) -> Self {
        Self {
            by_marker: entries.iter().cloned().collect(),
        }
    }
}

impl FaceExtractor for StubFaces {
    fn extract(&self, image: &DynamicImage) -> shoebox_core::error::Result<Vec<DetectedFace>> {
        let embeddings = self
            .by_marker
            .get(&marker_of(image))
            .cloned()
            .unwrap_or_default();
        Ok(embeddings
            .into_iter()
            .map(|embedding| DetectedFace {
                bounds: BOUNDS,
                embedding,
            })
            .collect())
    }
}

/// Image embedder stub: one-hot vector keyed by the marker pixel. Identical
/// pixels produce identical embeddings; distinct markers are orthogonal.
struct StubEmbedder;

impl ImageEmbedder for StubEmbedder {
    fn embed(&self, image: &DynamicImage) -> shoebox_core::error::Result<Vec<f32>> {
        let mut v = vec![0.0f32; 256];
        v[marker_of(image) as usize] = 1.0;
        Ok(v)
    }
}

fn face(base: f32, jitter: f32) -> Vec<f32> {
    vec![base + jitter, base - jitter, 0.0, 0.0]
}

// ── Dedup: exact ─────────────────────────────────────────────────

#[test]
fn test_ingest_distinct_photos_no_duplicates() {
    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();
    save_marker_png(&photos, "a.png", 10);
    save_marker_png(&photos, "b.png", 90);
    save_marker_png(&photos, "c.png", 170);

    let mut pipeline = Pipeline::open(
        &tmp.path().join("catalog.db"),
        PipelineConfig::default(),
    )
    .unwrap();
    let stats = pipeline.run(&photos, 10, None).unwrap();

    assert_eq!(stats.photos_processed, 3);
    assert_eq!(stats.exact_duplicates, 0);
    assert_eq!(stats.errors, 0);
    assert!(pipeline.duplicates().unwrap().is_empty());

    // Every photo was perceptually validated in the same run
    let status = pipeline.status().unwrap();
    assert_eq!(status.total_photos, 3);
    assert_eq!(status.unvalidated_photos, 0);
}

#[test]
fn test_exact_reingest_creates_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();
    let original = save_marker_png(&photos, "a.png", 10);

    let mut pipeline = Pipeline::open(
        &tmp.path().join("catalog.db"),
        PipelineConfig::default(),
    )
    .unwrap();
    let first = pipeline.run(&photos, 10, None).unwrap();
    assert_eq!(first.photos_processed, 1);

    // Byte-identical copy under a new name, plus the original still present
    fs::copy(&original, photos.join("copy.png")).unwrap();
    let second = pipeline.run(&photos, 10, None).unwrap();

    assert_eq!(second.photos_processed, 0);
    assert_eq!(second.exact_duplicates, 2);
    // Exact duplicates bypass the link mechanism entirely
    assert!(pipeline.duplicates().unwrap().is_empty());
    assert_eq!(pipeline.status().unwrap().total_photos, 1);
}

#[test]
fn test_exact_duplicate_within_one_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();
    let original = save_marker_png(&photos, "a.png", 10);
    fs::copy(&original, photos.join("twin.png")).unwrap();

    let mut pipeline = Pipeline::open(
        &tmp.path().join("catalog.db"),
        PipelineConfig::default(),
    )
    .unwrap();
    let stats = pipeline.run(&photos, 10, None).unwrap();

    assert_eq!(stats.photos_processed, 1);
    assert_eq!(stats.exact_duplicates, 1);
    assert_eq!(pipeline.status().unwrap().total_photos, 1);
}

// ── Dedup: perceptual ────────────────────────────────────────────

#[test]
fn test_perceptual_link_for_resized_copy() {
    let tmp = tempfile::tempdir().unwrap();
    let full = tmp.path().join("full.jpg");
    let resized = tmp.path().join("resized.jpg");

    let img = image::RgbImage::from_fn(128, 128, |x, y| {
        image::Rgb([(x * 2) as u8, (y * 2) as u8, 100])
    });
    img.save(&full).unwrap();
    image::imageops::resize(&img, 64, 64, image::imageops::FilterType::Triangle)
        .save(&resized)
        .unwrap();

    let config = PipelineConfig {
        perceptual_threshold: 15,
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::open(&tmp.path().join("catalog.db"), config).unwrap();

    // First batch: the original alone, validated with no links
    let first = pipeline.ingest_batch(&[full]).unwrap();
    assert_eq!(first.photos_processed, 1);
    assert_eq!(first.perceptual_links, 0);

    // Second batch: the resized copy links back to the original
    let second = pipeline.ingest_batch(&[resized]).unwrap();
    assert_eq!(second.photos_processed, 1);
    assert_eq!(second.perceptual_links, 1);

    let links = pipeline.duplicates().unwrap();
    assert_eq!(links.len(), 1);
    assert!(links[0].reason.starts_with("perceptual:"));

    let photos = pipeline.photos().unwrap();
    assert_eq!(links[0].photo_id, photos[1].id);
    assert_eq!(links[0].duplicate_of_id, photos[0].id);
    assert!(photos.iter().all(|p| !p.is_new));
}

#[test]
fn test_perceptual_validation_idempotent_across_reruns() {
    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();

    let img = image::RgbImage::from_fn(128, 128, |x, _| image::Rgb([(x * 2) as u8, 50, 50]));
    img.save(photos.join("a.jpg")).unwrap();
    image::imageops::resize(&img, 96, 96, image::imageops::FilterType::Triangle)
        .save(photos.join("b.jpg"))
        .unwrap();

    let config = PipelineConfig {
        perceptual_threshold: 15,
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::open(&tmp.path().join("catalog.db"), config).unwrap();

    pipeline.run(&photos, 10, None).unwrap();
    let links_after_first = pipeline.duplicates().unwrap().len();
    assert!(links_after_first >= 1);

    // Re-running over the same directory changes nothing
    let second = pipeline.run(&photos, 10, None).unwrap();
    assert_eq!(second.perceptual_links, 0);
    assert_eq!(pipeline.duplicates().unwrap().len(), links_after_first);
}

// ── Dedup: visual ────────────────────────────────────────────────

#[test]
fn test_visual_link_for_reencoded_image() {
    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();

    // Same pixels in two containers: different bytes, same embedding
    let img = marker_image(42);
    img.save(photos.join("a.png")).unwrap();
    img.save(photos.join("b.tif")).unwrap();

    let mut pipeline = Pipeline::open(
        &tmp.path().join("catalog.db"),
        PipelineConfig::default(),
    )
    .unwrap()
    .with_image_embedder(Box::new(StubEmbedder))
    .with_photo_index(Box::new(CosineIndex::new(0.99)));

    let stats = pipeline.run(&photos, 10, None).unwrap();

    assert_eq!(stats.photos_processed, 2);
    assert_eq!(stats.visual_links, 1);

    let links = pipeline.duplicates().unwrap();
    let visual: Vec<_> = links.iter().filter(|l| l.reason == "visual").collect();
    assert_eq!(visual.len(), 1);

    let photos_rows = pipeline.photos().unwrap();
    assert_eq!(visual[0].photo_id, photos_rows[1].id);
    assert_eq!(visual[0].duplicate_of_id, photos_rows[0].id);
}

#[test]
fn test_visual_duplicate_not_inserted_into_index() {
    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();

    let img = marker_image(42);
    img.save(photos.join("a.png")).unwrap();
    img.save(photos.join("b.tif")).unwrap();
    // Same marker pixel, one body pixel changed: distinct bytes, same embedding
    let mut variant = marker_image(42);
    variant.put_pixel(5, 5, image::Rgb([1, 2, 3]));
    variant.save(photos.join("c.png")).unwrap();

    let mut pipeline = Pipeline::open(
        &tmp.path().join("catalog.db"),
        PipelineConfig::default(),
    )
    .unwrap()
    .with_image_embedder(Box::new(StubEmbedder))
    .with_photo_index(Box::new(CosineIndex::new(0.99)));

    let stats = pipeline.run(&photos, 10, None).unwrap();

    // b and c each link to a only: a's embedding is the single index entry,
    // so later copies cannot match each other through the index.
    assert_eq!(stats.visual_links, 2);
    let first_id = pipeline.photos().unwrap()[0].id;
    for link in pipeline
        .duplicates()
        .unwrap()
        .iter()
        .filter(|l| l.reason == "visual")
    {
        assert_eq!(link.duplicate_of_id, first_id);
    }
}

// ── Face clustering ──────────────────────────────────────────────

#[test]
fn test_cluster_batch_one_person_plus_noise() {
    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();
    for (name, marker) in [
        ("p1.png", 10u8),
        ("p2.png", 20),
        ("p3.png", 30),
        ("p4.png", 40),
        ("p5.png", 50),
    ] {
        save_marker_png(&photos, name, marker);
    }

    // Five similar faces across the five photos, plus one isolated face in p5
    let faces = StubFaces::new(&[
        (10, vec![face(1.0, 0.00)]),
        (20, vec![face(1.0, 0.01)]),
        (30, vec![face(1.0, 0.02)]),
        (40, vec![face(1.0, 0.03)]),
        (50, vec![face(1.0, 0.04), vec![50.0, 50.0, 50.0, 50.0]]),
    ]);

    let mut pipeline = Pipeline::open(
        &tmp.path().join("catalog.db"),
        PipelineConfig::default(),
    )
    .unwrap()
    .with_face_extractor(Box::new(faces));

    let stats = pipeline.run(&photos, 10, None).unwrap();

    assert_eq!(stats.photos_processed, 5);
    assert_eq!(stats.faces_detected, 6);
    assert_eq!(stats.clusters_created, 1);
    assert_eq!(stats.persons_created, 1);
    assert_eq!(stats.persons_matched, 0);
    assert_eq!(stats.embeddings_saved, 5);
    assert_eq!(stats.associations_created, 5);

    let persons = pipeline.persons().unwrap();
    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0].label, "Person 1");
    // The isolated face produced no association
    assert_eq!(
        pipeline.catalog().photos_of_person(persons[0].id).unwrap().len(),
        5
    );
    // Every photo resolves back to the same person
    for photo in pipeline.photos().unwrap() {
        assert_eq!(
            pipeline.catalog().people_in_photo(photo.id).unwrap(),
            vec![persons[0].id]
        );
    }
}

#[test]
fn test_second_batch_matches_existing_person_and_recomputes_centroid() {
    let tmp = tempfile::tempdir().unwrap();
    let batch1 = tmp.path().join("batch1");
    let batch2 = tmp.path().join("batch2");
    fs::create_dir_all(&batch1).unwrap();
    fs::create_dir_all(&batch2).unwrap();
    for (name, marker) in [("p1.png", 10u8), ("p2.png", 20), ("p3.png", 30), ("p4.png", 40), ("p5.png", 50)] {
        save_marker_png(&batch1, name, marker);
    }
    for (name, marker) in [("q1.png", 60u8), ("q2.png", 70), ("q3.png", 80)] {
        save_marker_png(&batch2, name, marker);
    }

    let faces = StubFaces::new(&[
        (10, vec![face(1.0, 0.00)]),
        (20, vec![face(1.0, 0.01)]),
        (30, vec![face(1.0, 0.02)]),
        (40, vec![face(1.0, 0.03)]),
        (50, vec![face(1.0, 0.04)]),
        (60, vec![face(1.0, 0.05)]),
        (70, vec![face(1.0, 0.06)]),
        (80, vec![face(1.0, 0.07)]),
    ]);

    let mut pipeline = Pipeline::open(
        &tmp.path().join("catalog.db"),
        PipelineConfig::default(),
    )
    .unwrap()
    .with_face_extractor(Box::new(faces));

    pipeline.run(&batch1, 10, None).unwrap();
    let second = pipeline.run(&batch2, 10, None).unwrap();

    assert_eq!(second.persons_created, 0);
    assert_eq!(second.persons_matched, 1);
    assert_eq!(second.associations_created, 3);

    // Centroid covers all eight embeddings on record
    let person = &pipeline.persons().unwrap()[0];
    let all = pipeline.catalog().embeddings_for_person(person.id).unwrap();
    assert_eq!(all.len(), 8);
    let dim = all[0].len();
    for d in 0..dim {
        let mean: f32 = all.iter().map(|e| e[d]).sum::<f32>() / all.len() as f32;
        assert!((person.centroid[d] - mean).abs() < 1e-5);
    }
}

#[test]
fn test_reingest_creates_no_new_associations() {
    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();
    save_marker_png(&photos, "p1.png", 10);
    save_marker_png(&photos, "p2.png", 20);

    let faces = StubFaces::new(&[(10, vec![face(1.0, 0.0)]), (20, vec![face(1.0, 0.01)])]);

    let mut pipeline = Pipeline::open(
        &tmp.path().join("catalog.db"),
        PipelineConfig::default(),
    )
    .unwrap()
    .with_face_extractor(Box::new(faces));

    pipeline.run(&photos, 10, None).unwrap();
    let associations_before = pipeline.status().unwrap().total_associations;

    // Exact dedup short-circuits before extraction, so a re-run produces no
    // observations at all
    let second = pipeline.run(&photos, 10, None).unwrap();
    assert_eq!(second.faces_detected, 0);
    assert_eq!(second.associations_created, 0);
    assert_eq!(pipeline.status().unwrap().total_associations, associations_before);
}

// ── Batch statistics ─────────────────────────────────────────────

#[test]
fn test_batch_additivity_without_faces() {
    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();
    for (i, marker) in [10u8, 60, 110, 160, 210, 250].iter().enumerate() {
        save_marker_png(&photos, &format!("p{i}.png"), *marker);
    }

    let mut one_batch = Pipeline::open(
        &tmp.path().join("one.db"),
        PipelineConfig::default(),
    )
    .unwrap();
    let total_one = one_batch.run(&photos, 6, None).unwrap();

    let mut small_batches = Pipeline::open(
        &tmp.path().join("small.db"),
        PipelineConfig::default(),
    )
    .unwrap();
    let total_small = small_batches.run(&photos, 2, None).unwrap();

    assert_eq!(total_one.photos_processed, total_small.photos_processed);
    assert_eq!(total_one.exact_duplicates, total_small.exact_duplicates);
    assert_eq!(total_one.faces_detected, total_small.faces_detected);
    assert_eq!(total_one.perceptual_links, total_small.perceptual_links);
    assert_eq!(total_one.errors, total_small.errors);
    assert_eq!(total_small.batches_processed, 3);

    let status_one = one_batch.status().unwrap();
    let status_small = small_batches.status().unwrap();
    assert_eq!(status_one.total_photos, status_small.total_photos);
    assert_eq!(status_one.total_duplicate_links, status_small.total_duplicate_links);
}

#[test]
fn test_batch_split_converges_to_same_person_population() {
    let markers = [10u8, 20, 30, 40, 50, 60];
    let face_entries: Vec<(u8, Vec<Vec<f32>>)> = markers
        .iter()
        .enumerate()
        .map(|(i, &m)| (m, vec![face(1.0, 0.01 * i as f32)]))
        .collect();

    let run_with_batch_size = |db: &Path, photos: &Path, batch_size: usize| {
        let mut pipeline = Pipeline::open(db, PipelineConfig::default())
            .unwrap()
            .with_face_extractor(Box::new(StubFaces::new(&face_entries)));
        pipeline.run(photos, batch_size, None).unwrap();
        pipeline.status().unwrap()
    };

    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();
    for (i, &m) in markers.iter().enumerate() {
        save_marker_png(&photos, &format!("p{i}.png"), m);
    }

    let status_one = run_with_batch_size(&tmp.path().join("one.db"), &photos, 6);
    let status_split = run_with_batch_size(&tmp.path().join("split.db"), &photos, 2);

    // However the batches are cut, the catalog ends in the same place: one
    // person, six associations
    assert_eq!(status_one.total_persons, 1);
    assert_eq!(status_split.total_persons, status_one.total_persons);
    assert_eq!(status_split.total_associations, status_one.total_associations);
    assert_eq!(status_split.total_photos, status_one.total_photos);
}

// ── Error isolation ──────────────────────────────────────────────

#[test]
fn test_unreadable_image_does_not_abort_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();
    save_marker_png(&photos, "good.png", 10);
    fs::write(photos.join("broken.jpg"), b"definitely not a jpeg").unwrap();
    save_marker_png(&photos, "also_good.png", 90);

    let mut pipeline = Pipeline::open(
        &tmp.path().join("catalog.db"),
        PipelineConfig::default(),
    )
    .unwrap();
    let stats = pipeline.run(&photos, 10, None).unwrap();

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.photos_processed, 2);
    assert_eq!(pipeline.status().unwrap().total_photos, 2);
}

// ── Media storage ────────────────────────────────────────────────

#[test]
fn test_media_dir_receives_original_and_derivative() {
    let tmp = tempfile::tempdir().unwrap();
    let photos = tmp.path().join("photos");
    let media = tmp.path().join("media");
    fs::create_dir_all(&photos).unwrap();
    fs::create_dir_all(&media).unwrap();
    save_marker_png(&photos, "a.png", 10);

    let config = PipelineConfig {
        media_dir: Some(media.clone()),
        max_derivative_edge: 32,
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::open(&tmp.path().join("catalog.db"), config).unwrap();
    pipeline.run(&photos, 10, None).unwrap();

    let photo = &pipeline.photos().unwrap()[0];
    assert!(Path::new(&photo.path).exists());
    let derived = photo.derived_path.as_ref().unwrap();
    assert!(Path::new(derived).exists());

    // Derivative is bounded by the configured edge
    let derivative = image::open(derived).unwrap();
    assert!(derivative.width() <= 32 && derivative.height() <= 32);
}
