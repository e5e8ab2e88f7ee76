//! Acoustic vocabulary: Lloyd's k-means over MFCC frames.
//!
//! # Algorithm
//!
//! - k-means++ initialization from a seeded `StdRng`
//! - assign / relocate until no frame changes cluster or `max_iters` is reached
//! - an emptied cluster is moved onto the frame farthest from its own centroid
//!
//! Lloyd's iteration only reaches a local optimum.

use super::features::FrameVector;
use crate::error::{Result, RetrievalError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyConfig {
    /// Number of acoustic words K (default: 128).
    pub clusters: usize,
    /// Seed for k-means++ initialization (default: 0).
    pub seed: u64,
    /// Iteration cap for Lloyd's loop (default: 300).
    pub max_iters: usize,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self { clusters: 128, seed: 0, max_iters: 300 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    pub frames: usize,
    pub iterations: usize,
    pub converged: bool,
    /// Sum of squared distances from each frame to its centroid.
    pub inertia: f64,
}

/// K learned centroids. Word id `w` owns `centroids[w]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcousticVocabulary {
    dim: usize,
    centroids: Vec<Vec<f32>>,
}

impl AcousticVocabulary {
    /// Rebuild from stored centroids.
    pub fn from_centroids(centroids: Vec<Vec<f32>>) -> Result<Self> {
        let dim = centroids
            .first()
            .map(Vec::len)
            .ok_or_else(|| RetrievalError::Config("vocabulary needs at least one centroid".into()))?;
        if let Some(bad) = centroids.iter().find(|c| c.len() != dim) {
            return Err(RetrievalError::DimensionMismatch { expected: dim, got: bad.len() });
        }
        Ok(Self { dim, centroids })
    }

    /// Cluster the union of every sequence's frames into `config.clusters` words.
    pub fn fit(sequences: &[Vec<FrameVector>], config: &VocabularyConfig) -> Result<(Self, FitReport)> {
        if config.clusters == 0 {
            return Err(RetrievalError::Config("vocabulary size must be positive".into()));
        }
        let data: Vec<&[f32]> = sequences.iter().flatten().map(Vec::as_slice).collect();
        if data.len() < config.clusters {
            return Err(RetrievalError::InsufficientFrames { frames: data.len(), clusters: config.clusters });
        }
        let dim = data[0].len();
        if let Some(bad) = data.iter().find(|v| v.len() != dim) {
            return Err(RetrievalError::DimensionMismatch { expected: dim, got: bad.len() });
        }

        let k = config.clusters;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut centroids = kmeans_plus_plus_init(&data, k, &mut rng);
        let mut assignments = vec![usize::MAX; data.len()];
        let mut report = FitReport { frames: data.len(), iterations: 0, converged: false, inertia: 0.0 };

        for iter in 0..config.max_iters.max(1) {
            let mut changed = 0usize;
            for (slot, v) in assignments.iter_mut().zip(&data) {
                let (best, _) = nearest(&centroids, v);
                if *slot != best {
                    *slot = best;
                    changed += 1;
                }
            }
            report.iterations = iter + 1;
            if changed == 0 {
                report.converged = true;
                break;
            }
            centroids = recompute_centroids(&data, &assignments, &centroids);
        }

        report.inertia = data
            .iter()
            .zip(&assignments)
            .map(|(v, &c)| squared_distance(v, &centroids[c]) as f64)
            .sum();
        tracing::info!(
            clusters = k,
            frames = report.frames,
            iterations = report.iterations,
            converged = report.converged,
            inertia = report.inertia,
            "fitted acoustic vocabulary"
        );
        Ok((Self { dim, centroids }, report))
    }

    pub fn size(&self) -> usize {
        self.centroids.len()
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn centroids(&self) -> &[Vec<f32>] {
        &self.centroids
    }

    /// Nearest centroid by Euclidean distance; ties go to the lower id.
    pub fn predict(&self, vector: &[f32]) -> Result<usize> {
        if vector.len() != self.dim {
            return Err(RetrievalError::DimensionMismatch { expected: self.dim, got: vector.len() });
        }
        Ok(nearest(&self.centroids, vector).0)
    }

    /// Length-K word counts for a frame sequence.
    pub fn histogram(&self, frames: &[FrameVector]) -> Result<Vec<u32>> {
        let mut counts = vec![0u32; self.size()];
        for frame in frames {
            counts[self.predict(frame)?] += 1;
        }
        Ok(counts)
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(centroids: &[Vec<f32>], v: &[f32]) -> (usize, f32) {
    let mut best = (0usize, f32::INFINITY);
    for (c, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(v, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

/// Next centroid drawn with probability proportional to squared distance from the
/// closest one already chosen.
fn kmeans_plus_plus_init(data: &[&[f32]], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let n = data.len();
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
    centroids.push(data[rng.gen_range(0..n)].to_vec());
    let mut min_dists = vec![f32::INFINITY; n];

    while centroids.len() < k {
        let last = centroids[centroids.len() - 1].as_slice();
        for (d, v) in min_dists.iter_mut().zip(data) {
            *d = d.min(squared_distance(v, last));
        }

        let total: f64 = min_dists.iter().map(|&d| d as f64).sum();
        let chosen = if total <= 0.0 {
            // every frame already sits on a centroid
            rng.gen_range(0..n)
        } else {
            let threshold = rng.gen::<f64>() * total;
            let mut cumulative = 0.0f64;
            min_dists
                .iter()
                .position(|&d| {
                    cumulative += d as f64;
                    cumulative >= threshold
                })
                .unwrap_or(n - 1)
        };
        centroids.push(data[chosen].to_vec());
    }
    centroids
}

fn recompute_centroids(data: &[&[f32]], assignments: &[usize], previous: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let k = previous.len();
    let dim = previous[0].len();
    let mut sums = vec![vec![0.0f64; dim]; k];
    let mut counts = vec![0usize; k];
    for (v, &c) in data.iter().zip(assignments) {
        counts[c] += 1;
        for (s, x) in sums[c].iter_mut().zip(v.iter()) {
            *s += *x as f64;
        }
    }

    let mut next: Vec<Vec<f32>> = sums
        .iter()
        .zip(&counts)
        .zip(previous)
        .map(|((sum, &count), prev)| {
            if count == 0 {
                prev.clone()
            } else {
                sum.iter().map(|s| (s / count as f64) as f32).collect()
            }
        })
        .collect();

    let empty: Vec<usize> = (0..k).filter(|&c| counts[c] == 0).collect();
    if !empty.is_empty() {
        // farthest frames first, each frame used at most once
        let mut by_distance: Vec<(usize, f32)> = data
            .iter()
            .zip(assignments)
            .enumerate()
            .map(|(i, (v, &c))| (i, squared_distance(v, &next[c])))
            .collect();
        by_distance.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        for (c, (i, _)) in empty.into_iter().zip(by_distance) {
            next[c] = data[i].to_vec();
        }
    }
    next
}
