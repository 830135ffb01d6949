//! Device identification on top of an extracted feature frame.
//!
//! Every row is classified on its own; the capture's verdict is the class with
//! the highest mean probability over all rows.
pub mod features;
pub mod model;

use serde::Serialize;

use crate::analyser::containers::FeatureFrame;
use crate::analyser::error::{AnalysisError, Result};
use features::FeatureVector;
use model::Classifier;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Identification {
    pub label: String,
    pub confidence: f64,
    /// Mean probability per class, in the classifier's class order.
    pub mean_probabilities: Vec<(String, f64)>,
}

pub fn identify<C: Classifier + ?Sized>(frame: &FeatureFrame, classifier: &C) -> Result<Identification> {
    if frame.rows.is_empty() {
        return Err(AnalysisError::EmptyFrame);
    }

    let vectors: Vec<FeatureVector> = frame.rows.iter().map(FeatureVector::from).collect();
    let proba = classifier.predict_proba(&vectors);
    let classes = classifier.classes();

    let mut mean = vec![0.0; classes.len()];
    for distribution in &proba {
        for (sum, p) in mean.iter_mut().zip(distribution) {
            *sum += p;
        }
    }
    for sum in &mut mean {
        *sum /= proba.len() as f64;
    }

    // First maximum wins on ties
    let (best, confidence) = mean
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

    log::info!("Classified {} rows, best class {}", vectors.len(), classes[best]);
    Ok(Identification {
        label: classes[best].clone(),
        confidence,
        mean_probabilities: classes.iter().cloned().zip(mean).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyser::containers::{BurstStats, FeatureRow, PacketRecord};

    /// Always answers with fixed probabilities per row, cycling through them.
    struct Scripted {
        classes: Vec<String>,
        answers: Vec<Vec<f64>>,
    }

    impl Classifier for Scripted {
        fn classes(&self) -> &[String] {
            &self.classes
        }

        fn predict_proba(&self, rows: &[FeatureVector]) -> Vec<Vec<f64>> {
            (0..rows.len()).map(|i| self.answers[i % self.answers.len()].clone()).collect()
        }
    }

    fn frame(rows: usize) -> FeatureFrame {
        FeatureFrame {
            label: "NoLabel".to_string(),
            size_threshold: 0,
            group_count: 1,
            rows: (0..rows)
                .map(|_| FeatureRow {
                    record: PacketRecord::default(),
                    inter_arrival: None,
                    burst: BurstStats::NONE,
                })
                .collect(),
        }
    }

    #[test]
    fn averages_row_probabilities() {
        let classifier = Scripted {
            classes: vec!["Argus PT".to_string(), "HomeBase2".to_string()],
            answers: vec![vec![0.9, 0.1], vec![0.3, 0.7]],
        };
        let result = identify(&frame(4), &classifier).unwrap();

        assert_eq!(result.label, "Argus PT");
        assert!((result.confidence - 0.6).abs() < 1e-12);
        assert!((result.mean_probabilities[1].1 - 0.4).abs() < 1e-12);
    }

    #[test]
    fn empty_frame_cannot_be_identified() {
        let classifier = Scripted {
            classes: vec!["a".to_string()],
            answers: vec![vec![1.0]],
        };
        assert!(matches!(identify(&frame(0), &classifier), Err(AnalysisError::EmptyFrame)));
    }

    #[test]
    fn works_with_loaded_model() {
        let model = model::GaussianNb::from_json(model::tests::TWO_CLASS_MODEL).unwrap();
        let result = identify(&frame(3), &model).unwrap();
        // all-zero rows resemble the second class
        assert_eq!(result.label, "HomeBase2");
    }
}
