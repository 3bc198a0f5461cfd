//! Density-based grouping of chunk embeddings into topic clusters.
//!
//! The engine follows the HDBSCAN family: core distances estimated from the
//! `min_samples`-th nearest neighbor under cosine distance, a mutual-reachability graph, a
//! minimum spanning tree, and a flat extraction that cuts tree links above
//! `cluster_selection_epsilon`. Connected components with at least `min_cluster_size`
//! members become clusters, labelled `0, 1, …` in order of their first member; everything
//! else is noise (`-1`). The procedure is deterministic for identical vectors and
//! parameters.
//!
//! Populations below `min_cluster_size` (or below two points, whatever the configured
//! minimum) skip clustering entirely and land in a single trivial cluster `0`; density
//! estimates are meaningless with so few points.
//!
//! This step is CPU-bound and synchronous; the runner executes it on a blocking worker so
//! it cannot starve pending I/O tasks.

use super::types::{ClusterParams, NOISE_CLUSTER_ID, ProcessedChunk};

/// Assign a `cluster_id` to every chunk and discard the consumed embeddings.
pub(crate) fn cluster_chunks(chunks: &mut [ProcessedChunk], params: &ClusterParams) {
    if chunks.is_empty() {
        return;
    }

    // Density estimates need at least two points even when min_cluster_size allows one.
    if chunks.len() < params.min_cluster_size.max(2) {
        tracing::info!(
            population = chunks.len(),
            min_cluster_size = params.min_cluster_size,
            "Too few chunks for density clustering; assigning all to cluster 0"
        );
        for chunk in chunks.iter_mut() {
            chunk.cluster_id = Some(0);
            chunk.embedding = None;
        }
        return;
    }

    let vectors: Vec<Vec<f32>> = chunks
        .iter_mut()
        .map(|chunk| chunk.embedding.take().unwrap_or_default())
        .collect();

    let labels = density_cluster(&vectors, params);

    let cluster_count = labels
        .iter()
        .filter(|&&label| label != NOISE_CLUSTER_ID)
        .collect::<std::collections::HashSet<_>>()
        .len();
    let noise_count = labels
        .iter()
        .filter(|&&label| label == NOISE_CLUSTER_ID)
        .count();
    tracing::info!(
        population = chunks.len(),
        clusters = cluster_count,
        noise = noise_count,
        "Clustering complete"
    );

    for (chunk, label) in chunks.iter_mut().zip(labels) {
        chunk.cluster_id = Some(label);
    }
}

/// Label each vector with a cluster id, or `-1` for noise.
fn density_cluster(vectors: &[Vec<f32>], params: &ClusterParams) -> Vec<i32> {
    let n = vectors.len();

    let mut distances = vec![vec![0.0_f32; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = cosine_distance(&vectors[i], &vectors[j]);
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }

    let core = core_distances(&distances, params.min_samples);
    let edges = minimum_spanning_tree(&distances, &core);
    extract_labels(
        n,
        &edges,
        params.cluster_selection_epsilon,
        params.min_cluster_size,
    )
}

/// Cosine distance in `[0, 2]`. Degenerate pairs (zero-norm or mismatched lengths) get a
/// fixed distance of `1.0`, the value for unrelated vectors, so they never cluster under
/// any reasonable epsilon.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 1.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Distance from each point to its `min_samples`-th nearest neighbor.
fn core_distances(distances: &[Vec<f32>], min_samples: usize) -> Vec<f32> {
    let n = distances.len();
    let k = min_samples.clamp(1, n - 1);
    (0..n)
        .map(|i| {
            let mut row: Vec<f32> = (0..n).filter(|&j| j != i).map(|j| distances[i][j]).collect();
            row.sort_by(f32::total_cmp);
            row[k - 1]
        })
        .collect()
}

/// Prim's algorithm over the mutual-reachability graph.
///
/// Returns `n - 1` edges `(a, b, weight)` where the weight is
/// `max(d(a, b), core(a), core(b))`.
fn minimum_spanning_tree(distances: &[Vec<f32>], core: &[f32]) -> Vec<(usize, usize, f32)> {
    let n = distances.len();
    let mut in_tree = vec![false; n];
    let mut best_weight = vec![f32::INFINITY; n];
    let mut best_parent = vec![0_usize; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));

    in_tree[0] = true;
    for j in 1..n {
        best_weight[j] = mutual_reachability(distances, core, 0, j);
        best_parent[j] = 0;
    }

    for _ in 1..n {
        let mut next = usize::MAX;
        let mut next_weight = f32::INFINITY;
        for j in 0..n {
            if !in_tree[j] && best_weight[j] < next_weight {
                next = j;
                next_weight = best_weight[j];
            }
        }
        if next == usize::MAX {
            break;
        }

        in_tree[next] = true;
        edges.push((best_parent[next], next, next_weight));

        for j in 0..n {
            if !in_tree[j] {
                let weight = mutual_reachability(distances, core, next, j);
                if weight < best_weight[j] {
                    best_weight[j] = weight;
                    best_parent[j] = next;
                }
            }
        }
    }

    edges
}

fn mutual_reachability(distances: &[Vec<f32>], core: &[f32], i: usize, j: usize) -> f32 {
    distances[i][j].max(core[i]).max(core[j])
}

/// Flat cluster extraction: drop tree links above `epsilon`, keep components of at least
/// `min_cluster_size` points, relabel them in first-member order.
fn extract_labels(
    n: usize,
    edges: &[(usize, usize, f32)],
    epsilon: f32,
    min_cluster_size: usize,
) -> Vec<i32> {
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut Vec<usize>, mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for &(a, b, weight) in edges {
        if weight <= epsilon {
            let root_a = find(&mut parent, a);
            let root_b = find(&mut parent, b);
            if root_a != root_b {
                parent[root_a.max(root_b)] = root_a.min(root_b);
            }
        }
    }

    let mut component_sizes = std::collections::HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        *component_sizes.entry(root).or_insert(0_usize) += 1;
    }

    let mut labels = vec![NOISE_CLUSTER_ID; n];
    let mut next_label = 0_i32;
    let mut assigned = std::collections::HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        if component_sizes[&root] < min_cluster_size {
            continue;
        }
        let label = *assigned.entry(root).or_insert_with(|| {
            let label = next_label;
            next_label += 1;
            label
        });
        labels[i] = label;
    }
    labels
}
