//! Structural estimators over an [`AdjacencyView`].
//!
//! Every estimator is deterministic and returns 0.0 on degenerate input
//! (empty graph, no triples, zero variance) instead of dividing by zero.

use crate::engine::adjacency::AdjacencyView;

/// Mean local clustering over nodes with degree >= 2.
///
/// `C_i = links among neighbors / (k_i (k_i - 1) / 2)`
pub fn clustering_coefficient(view: &AdjacencyView) -> f64 {
    let mut total = 0.0;
    let mut counted = 0usize;
    for i in 0..view.len() {
        let k = view.degree(i);
        if k < 2 {
            continue;
        }
        let possible = (k * (k - 1) / 2) as f64;
        total += view.neighbor_links(i) as f64 / possible;
        counted += 1;
    }
    if counted == 0 {
        0.0
    } else {
        total / counted as f64
    }
}

/// Global transitivity: `3 × triangles / connected triples`.
///
/// Each triangle is seen once from each corner, so the sum of per-node
/// neighbor links already equals `3 × triangles`.
pub fn transitivity(view: &AdjacencyView) -> f64 {
    let mut closed = 0usize;
    let mut triples = 0usize;
    for i in 0..view.len() {
        let k = view.degree(i);
        triples += k * k.saturating_sub(1) / 2;
        closed += view.neighbor_links(i);
    }
    if triples == 0 {
        0.0
    } else {
        closed as f64 / triples as f64
    }
}

/// Degree centralization: `(max degree − mean degree) / max degree`.
pub fn centralization(view: &AdjacencyView) -> f64 {
    let n = view.len();
    if n <= 1 {
        return 0.0;
    }
    let degrees: Vec<usize> = (0..n).map(|i| view.degree(i)).collect();
    let max = degrees.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return 0.0;
    }
    let mean = degrees.iter().sum::<usize>() as f64 / n as f64;
    (max as f64 - mean) / max as f64
}

/// Sampled path redundancy in `[0, 1]`.
///
/// Approximation: up to `sample_size` evenly spaced nodes are sampled and,
/// for each sampled pair, length-1 and length-2 routes are counted
/// (direct link + common neighbors). Two or more routes score 1.0, one route
/// scores 0.5, none scores 0. Cost is O(sample² · degree).
pub fn path_redundancy(view: &AdjacencyView, sample_size: usize) -> f64 {
    let n = view.len();
    if n < 2 {
        return 0.0;
    }
    let sample: Vec<usize> = if n <= sample_size {
        (0..n).collect()
    } else {
        let step = n as f64 / sample_size as f64;
        (0..sample_size).map(|i| (i as f64 * step) as usize).collect()
    };

    let mut score = 0.0;
    let mut pairs = 0usize;
    for (i, &a) in sample.iter().enumerate() {
        for &b in &sample[i + 1..] {
            let routes = usize::from(view.linked(a, b)) + view.common_neighbors(a, b);
            score += routes.min(2) as f64 / 2.0;
            pairs += 1;
        }
    }
    if pairs == 0 {
        0.0
    } else {
        score / pairs as f64
    }
}

/// Deterministic modularity-driven label propagation.
///
/// Every node starts with its own label. Nodes are visited in index order and
/// adopt the neighboring label with the largest modularity gain
/// `k_i,in / W − Σ_tot · k_i / (2W²)`; a node keeps its label unless another
/// label is strictly better, and ties between other labels go to the smallest.
/// Stops when a sweep changes nothing or after `max_rounds` sweeps.
pub fn label_propagation(view: &AdjacencyView, max_rounds: usize) -> Vec<usize> {
    const GAIN_EPSILON: f64 = 1e-12;

    let n = view.len();
    let mut labels: Vec<usize> = (0..n).collect();
    let strength: Vec<f64> = (0..n).map(|i| view.weighted_degree(i)).collect();
    let total = strength.iter().sum::<f64>() / 2.0;
    if total <= 0.0 {
        return labels;
    }
    let mut label_strength = strength.clone();
    let gain = |k_in: f64, tot: f64, k_i: f64| k_in / total - tot * k_i / (2.0 * total * total);

    for _ in 0..max_rounds {
        let mut changed = false;
        for i in 0..n {
            let row = view.neighbors(i);
            if row.is_empty() {
                continue;
            }
            let current = labels[i];
            label_strength[current] -= strength[i];

            let mut tally: Vec<(usize, f64)> = Vec::with_capacity(row.len());
            for &(j, w) in row {
                let label = labels[j];
                match tally.iter_mut().find(|(l, _)| *l == label) {
                    Some(slot) => slot.1 += w,
                    None => tally.push((label, w)),
                }
            }
            tally.sort_unstable_by_key(|(l, _)| *l);

            let own_links = tally
                .iter()
                .find(|(l, _)| *l == current)
                .map_or(0.0, |(_, w)| *w);
            let mut best = current;
            let mut best_gain = gain(own_links, label_strength[current], strength[i]);
            for &(label, k_in) in &tally {
                let g = gain(k_in, label_strength[label], strength[i]);
                if g > best_gain + GAIN_EPSILON {
                    best = label;
                    best_gain = g;
                }
            }

            label_strength[best] += strength[i];
            if best != current {
                labels[i] = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    labels
}

/// Weighted Newman modularity of a partition.
///
/// `Q = Σ_c [ W_c / W − (S_c / 2W)² ]` where `W` is the total link weight,
/// `W_c` the weight inside community `c` and `S_c` its summed weighted degree.
pub fn modularity(view: &AdjacencyView, labels: &[usize]) -> f64 {
    let n = view.len();
    let total: f64 = (0..n).map(|i| view.weighted_degree(i)).sum::<f64>() / 2.0;
    if total <= 0.0 {
        return 0.0;
    }
    let mut inside = vec![0.0; n];
    let mut strength = vec![0.0; n];
    for i in 0..n {
        strength[labels[i]] += view.weighted_degree(i);
        for &(j, w) in view.neighbors(i) {
            if j > i && labels[j] == labels[i] {
                inside[labels[i]] += w;
            }
        }
    }
    (0..n)
        .map(|c| inside[c] / total - (strength[c] / (2.0 * total)).powi(2))
        .sum()
}

/// Newman degree assortativity (Pearson correlation of degrees at link ends).
pub fn assortativity(view: &AdjacencyView) -> f64 {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for i in 0..view.len() {
        let ki = view.degree(i) as f64;
        for &(j, _) in view.neighbors(i) {
            // Both orientations of every link, keeping the estimator symmetric
            xs.push(ki);
            ys.push(view.degree(j) as f64);
        }
    }
    if xs.is_empty() {
        return 0.0;
    }
    let m = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / m;
    let mean_y = ys.iter().sum::<f64>() / m;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    let denom = (var_x * var_y).sqrt();
    if denom <= f64::EPSILON {
        0.0
    } else {
        (cov / denom).clamp(-1.0, 1.0)
    }
}

/// Humphries–Gurney small-world coefficient σ.
///
/// `σ = (C / C_rand) / (L / L_rand)` with the Erdős–Rényi reference
/// `C_rand = k / n` and `L_rand = ln n / ln k`, where `C` is the transitivity,
/// `L` the mean hop distance and `k` the mean degree. Returns 0.0 when the
/// reference is undefined (n < 4, k <= 1, no reachable pair).
pub fn small_world(view: &AdjacencyView, transitivity: f64, average_hops: Option<f64>) -> f64 {
    let n = view.len();
    if n < 4 {
        return 0.0;
    }
    let k = (0..n).map(|i| view.degree(i)).sum::<usize>() as f64 / n as f64;
    let Some(l) = average_hops else {
        return 0.0;
    };
    if k <= 1.0 || l <= 0.0 {
        return 0.0;
    }
    let c_rand = k / n as f64;
    let l_rand = (n as f64).ln() / k.ln();
    if c_rand <= 0.0 || l_rand <= 0.0 {
        return 0.0;
    }
    (transitivity / c_rand) / (l / l_rand)
}
