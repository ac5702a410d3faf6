//! Density-based clustering over embedding vectors.

/// Euclidean distance between two embeddings. Dimensions are assumed equal
/// within one batch; a shorter vector is treated as zero-padded.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().max(b.len());
    let mut sum = 0.0f32;
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0.0);
        let y = b.get(i).copied().unwrap_or(0.0);
        sum += (x - y) * (x - y);
    }
    sum.sqrt()
}

/// DBSCAN over `points` under Euclidean distance.
///
/// Returns one label per point: `Some(cluster)` with clusters numbered from 0
/// in discovery order, or `None` for noise. A point is a core point iff its
/// ε-neighborhood (itself included) holds at least `min_samples` points.
/// Noise points stay unassigned this pass; they may cluster in a later batch
/// once enough similar observations have accumulated.
pub fn dbscan(points: &[Vec<f32>], eps: f32, min_samples: usize) -> Vec<Option<usize>> {
    let n = points.len();
    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut next_cluster = 0usize;

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let neighbors = region_query(points, i, eps);
        if neighbors.len() < min_samples {
            continue; // noise, unless a later expansion claims it
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[i] = Some(cluster);

        // Expand the cluster through every density-reachable point.
        let mut frontier = neighbors;
        let mut cursor = 0;
        while cursor < frontier.len() {
            let j = frontier[cursor];
            cursor += 1;

            if !visited[j] {
                visited[j] = true;
                let j_neighbors = region_query(points, j, eps);
                if j_neighbors.len() >= min_samples {
                    frontier.extend(j_neighbors);
                }
            }
            if labels[j].is_none() {
                labels[j] = Some(cluster);
            }
        }
    }

    labels
}

fn region_query(points: &[Vec<f32>], i: usize, eps: f32) -> Vec<usize> {
    (0..points.len())
        .filter(|&j| euclidean_distance(&points[i], &points[j]) <= eps)
        .collect()
}
