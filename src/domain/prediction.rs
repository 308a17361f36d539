// ============================================================
// Layer 3 — Prediction
// ============================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// The classifier's answer for a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Which image was classified
    pub source: String,

    /// Winning label index
    pub label: usize,

    /// Class name for `label`
    pub class_name: String,

    /// Softmax probability per class, in label order
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Build a prediction from per-class probabilities by taking the argmax.
    /// Returns None when `probabilities` is empty.
    pub fn from_probabilities(
        source: impl Into<String>,
        probabilities: Vec<f32>,
        class_names: &[String],
    ) -> Option<Self> {
        let (label, _) = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        let class_name = class_names
            .get(label)
            .cloned()
            .unwrap_or_else(|| format!("class_{label}"));
        Some(Self {
            source: source.into(),
            label,
            class_name,
            probabilities,
        })
    }

    /// Probability assigned to the winning class
    pub fn confidence(&self) -> f32 {
        self.probabilities.get(self.label).copied().unwrap_or(0.0)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({:.1}%)",
            self.source,
            self.class_name,
            self.confidence() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["ants".to_string(), "bees".to_string()]
    }

    #[test]
    fn test_argmax_selects_label() {
        let p = Prediction::from_probabilities("a.jpg", vec![0.2, 0.8], &names()).unwrap();
        assert_eq!(p.label, 1);
        assert_eq!(p.class_name, "bees");
        assert!((p.confidence() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_empty_probabilities() {
        assert!(Prediction::from_probabilities("a.jpg", vec![], &names()).is_none());
    }

    #[test]
    fn test_display() {
        let p = Prediction::from_probabilities("a.jpg", vec![0.75, 0.25], &names()).unwrap();
        assert_eq!(p.to_string(), "a.jpg: ants (75.0%)");
    }
}
