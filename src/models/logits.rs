//! Logits processing for next-token selection.
//!
//! Handles temperature scaling, id suppression, nucleus (top-p) truncation,
//! checked normalization, and sampling.

use std::fmt::{Debug, Formatter};
use std::ops::{Deref, DerefMut};

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;

/// Smallest temperature used for scaling.
pub const MIN_TEMPERATURE: f32 = 1e-6;

/// Default nucleus probability mass.
pub const DEFAULT_TOP_P: f32 = 0.98;

/// Wrapper around one row of next-token scores with processing methods.
#[derive(Clone, PartialEq)]
pub struct Logits(Vec<f32>);

impl Deref for Logits {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Logits {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Debug for Logits {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Logits({})", self.0.len())
    }
}

impl From<Vec<f32>> for Logits {
    fn from(scores: Vec<f32>) -> Self {
        Self(scores)
    }
}

impl Logits {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    /// Divides every score by `temperature`, floored at [`MIN_TEMPERATURE`].
    pub fn scale(&mut self, temperature: f32) {
        let t = temperature.max(MIN_TEMPERATURE);
        for x in self.0.iter_mut() {
            *x /= t;
        }
    }

    /// Masks `id` to negative infinity. Out-of-range ids are ignored.
    pub fn suppress(&mut self, id: u32) {
        if let Some(x) = self.0.get_mut(id as usize) {
            *x = f32::NEG_INFINITY;
        }
    }

    /// Returns true if every score is negative infinity.
    pub fn is_fully_masked(&self) -> bool {
        self.0.iter().all(|&x| x == f32::NEG_INFINITY)
    }

    /// Applies nucleus (top-p) truncation.
    ///
    /// Keeps the minimal prefix of descending scores whose cumulative
    /// probability exceeds `top_p`, and always at least one token. Every
    /// other score becomes negative infinity. A row with no usable mass is
    /// returned unchanged.
    pub fn nucleus(&self, top_p: f32) -> Logits {
        let Some(weights) = unnormalized_weights(&self.0) else {
            return self.clone();
        };
        let total: f64 = weights.iter().sum();
        if !(total > 0.0 && total.is_finite()) {
            return self.clone();
        }

        let mut order: Vec<usize> = (0..self.0.len()).collect();
        order.sort_by(|&a, &b| sort_key(self.0[b]).total_cmp(&sort_key(self.0[a])));

        let mut keep = order.len();
        let mut cumulative = 0.0f64;
        for (rank, &idx) in order.iter().enumerate() {
            cumulative += weights[idx] / total;
            if cumulative > top_p as f64 {
                keep = rank + 1;
                break;
            }
        }
        let keep = keep.max(1);

        let mut out = vec![f32::NEG_INFINITY; self.0.len()];
        for &idx in &order[..keep] {
            out[idx] = self.0[idx];
        }
        Logits(out)
    }

    /// Normalizes the scores into probabilities.
    ///
    /// Returns None if the result would contain non-finite values or the
    /// total mass is zero.
    pub fn softmax(&self) -> Option<Vec<f32>> {
        if self.0.iter().any(|x| x.is_nan()) {
            return None;
        }
        let max = self.0.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !max.is_finite() {
            return None;
        }

        let exps: Vec<f64> = self.0.iter().map(|&x| ((x - max) as f64).exp()).collect();
        let sum: f64 = exps.iter().sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return None;
        }

        let probs: Vec<f32> = exps.iter().map(|&e| (e / sum) as f32).collect();
        probs.iter().all(|p| p.is_finite()).then_some(probs)
    }

    /// Index of the highest score that is neither NaN nor negative infinity.
    pub fn argmax(&self) -> Option<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, x)| !x.is_nan() && **x > f32::NEG_INFINITY)
            .fold(None, |best: Option<(usize, f32)>, (i, &x)| match best {
                Some((_, b)) if b >= x => best,
                _ => Some((i, x)),
            })
            .map(|(i, _)| i)
    }

    /// Samples an index from the normalized scores.
    ///
    /// Returns None when the scores cannot be normalized.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let probs = self.softmax()?;
        let distribution = WeightedIndex::new(&probs).ok()?;
        Some(distribution.sample(rng))
    }
}

fn sort_key(x: f32) -> f32 {
    if x.is_nan() {
        f32::NEG_INFINITY
    } else {
        x
    }
}

/// Per-index weights proportional to softmax probability, or None when no
/// score carries mass. Positive infinities share all of the mass.
fn unnormalized_weights(scores: &[f32]) -> Option<Vec<f64>> {
    let max = scores
        .iter()
        .copied()
        .filter(|x| !x.is_nan())
        .fold(f32::NEG_INFINITY, f32::max);

    if max == f32::NEG_INFINITY {
        return None;
    }
    if max == f32::INFINITY {
        return Some(
            scores
                .iter()
                .map(|&x| if x == f32::INFINITY { 1.0 } else { 0.0 })
                .collect(),
        );
    }

    Some(
        scores
            .iter()
            .map(|&x| {
                if x.is_nan() {
                    0.0
                } else {
                    ((x - max) as f64).exp()
                }
            })
            .collect(),
    )
}
