//! Batch face clustering and person resolution.
//!
//! All face observations collected across a batch are clustered in one pass;
//! each dense group is then matched against the existing person population or
//! founds a new person. The batch boundary is a hard synchronization point:
//! clustering a partial batch would fragment one person's faces into several
//! small clusters.

pub mod dbscan;

use std::collections::BTreeMap;

use log::{debug, info};

use crate::catalog::Catalog;
use crate::config::PipelineConfig;
use crate::domain::{BatchStats, FaceObservation, Person};

/// Elementwise mean of a set of embeddings.
pub fn centroid(embeddings: &[&[f32]]) -> Vec<f32> {
    let Some(first) = embeddings.first() else {
        return Vec::new();
    };
    let dim = first.len();
    let mut mean = vec![0.0f32; dim];
    for e in embeddings {
        for (m, v) in mean.iter_mut().zip(e.iter()) {
            *m += v;
        }
    }
    let n = embeddings.len() as f32;
    for m in &mut mean {
        *m /= n;
    }
    mean
}

/// Scan the person population in ascending id order and return the first one
/// whose centroid lies within `threshold`. The deterministic linear scan makes
/// tie-breaking reproducible; ties are not otherwise broken.
fn find_matching_person(people: &[Person], cluster_centroid: &[f32], threshold: f32) -> Option<i64> {
    for person in people {
        let distance = dbscan::euclidean_distance(&person.centroid, cluster_centroid);
        debug!("person {} centroid distance: {distance}", person.id);
        if distance <= threshold {
            return Some(person.id);
        }
    }
    None
}

/// Groups a batch's face embeddings and resolves each group to a person.
pub struct FaceClusterer {
    eps: f32,
    min_samples: usize,
    match_threshold: f32,
}

impl FaceClusterer {
    pub fn new(eps: f32, min_samples: usize, match_threshold: f32) -> Self {
        Self {
            eps,
            min_samples,
            match_threshold,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.cluster_eps,
            config.cluster_min_samples,
            config.person_match_threshold,
        )
    }

    /// Cluster a full batch of observations and persist the outcome.
    ///
    /// For each dense group: match-or-create a person, persist the
    /// per-observation embedding and association records under their
    /// existence guards, then recompute the person's centroid over ALL
    /// embeddings on record (not just this batch's contribution). Re-running
    /// the same batch changes nothing.
    ///
    /// Must not run concurrently with another batch: the match-or-create step
    /// requires a single writer over the person store, or two batches could
    /// each create a fresh person for the same identity.
    pub fn cluster_batch(
        &self,
        catalog: &Catalog,
        observations: &[FaceObservation],
        stats: &mut BatchStats,
    ) -> crate::error::Result<()> {
        if observations.is_empty() {
            debug!("no face observations in batch, skipping clustering");
            return Ok(());
        }

        let points: Vec<Vec<f32>> = observations.iter().map(|o| o.embedding.clone()).collect();
        let labels = dbscan::dbscan(&points, self.eps, self.min_samples);

        // Group observation indices by cluster label, noise excluded.
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, label) in labels.iter().enumerate() {
            if let Some(cluster) = label {
                groups.entry(*cluster).or_default().push(i);
            }
        }
        info!(
            "clustered {} observations into {} groups ({} noise)",
            observations.len(),
            groups.len(),
            labels.iter().filter(|l| l.is_none()).count()
        );

        for (cluster, members) in &groups {
            let member_embeddings: Vec<&[f32]> = members
                .iter()
                .map(|&i| observations[i].embedding.as_slice())
                .collect();
            let group_centroid = centroid(&member_embeddings);

            // Refetched per group so a person created by an earlier group in
            // this batch is visible to later groups.
            let people = catalog.list_people()?;
            let person_id = match find_matching_person(&people, &group_centroid, self.match_threshold)
            {
                Some(id) => {
                    info!("cluster {cluster}: matched existing person {id}");
                    stats.persons_matched += 1;
                    id
                }
                None => {
                    let label = catalog.next_person_label()?;
                    let person = catalog.create_person(&label, &group_centroid)?;
                    info!("cluster {cluster}: created {label} (id {})", person.id);
                    stats.persons_created += 1;
                    person.id
                }
            };

            for &i in members {
                let obs = &observations[i];
                if !catalog.face_embedding_exists(person_id, obs.photo_id)? {
                    catalog.create_face_embedding(person_id, obs.photo_id, &obs.embedding)?;
                    stats.embeddings_saved += 1;
                }
                if !catalog.association_exists(obs.photo_id, person_id)? {
                    catalog.create_association(obs.photo_id, person_id)?;
                    stats.associations_created += 1;
                }
            }

            // Recompute from scratch over everything on record, never drift
            // the stored centroid incrementally.
            let all = catalog.embeddings_for_person(person_id)?;
            let refs: Vec<&[f32]> = all.iter().map(|e| e.as_slice()).collect();
            catalog.update_centroid(person_id, &centroid(&refs))?;

            stats.clusters_created += 1;
        }

        Ok(())
    }
}
