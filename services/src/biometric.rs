//! Seam to the face-recognition subsystem.
//!
//! The engine never looks inside an embedding; it only asks a [`FaceMatcher`]
//! whether two of them belong to the same person. Check-in and liveness ticks
//! use the same matcher.

use serde::{Deserialize, Serialize};

/// A face embedding as produced by the capture pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Identity oracle.
pub trait FaceMatcher: Send + Sync {
    fn is_same_person(&self, reference: &Embedding, sample: &Embedding) -> bool;
}

/// Euclidean-distance matcher: same person when the distance is strictly
/// below the threshold. Embeddings of different length never match.
#[derive(Debug, Clone, Copy)]
pub struct DistanceMatcher {
    pub threshold: f32,
}

impl Default for DistanceMatcher {
    fn default() -> Self {
        Self { threshold: 0.45 }
    }
}

impl DistanceMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn distance(a: &Embedding, b: &Embedding) -> Option<f32> {
        if a.0.len() != b.0.len() || a.0.is_empty() {
            return None;
        }
        let sum: f32 = a.0.iter().zip(&b.0).map(|(x, y)| (x - y) * (x - y)).sum();
        Some(sum.sqrt())
    }
}

impl FaceMatcher for DistanceMatcher {
    fn is_same_person(&self, reference: &Embedding, sample: &Embedding) -> bool {
        match Self::distance(reference, sample) {
            Some(d) if d.is_finite() => d < self.threshold,
            _ => false,
        }
    }
}
