use std::f64::consts::PI;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use super::features::{FeatureVector, FEATURE_NAMES};
use crate::analyser::error::{AnalysisError, Result};

/// A pre-trained per-row device classifier.
pub trait Classifier {
    /// Class labels, in the order of the probability columns.
    fn classes(&self) -> &[String];

    /// One probability distribution over [Classifier::classes] per input row.
    fn predict_proba(&self, rows: &[FeatureVector]) -> Vec<Vec<f64>>;
}

/// Gaussian naive Bayes over the four model features.
///
/// Parameters are exported from the training environment as JSON:
/// `{"classes": [...], "class_prior": [...], "theta": [[...]], "var": [[...]]}`
/// with one `theta`/`var` row of four values per class.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct GaussianNb {
    classes: Vec<String>,
    class_prior: Vec<f64>,
    theta: Vec<[f64; 4]>,
    var: Vec<[f64; 4]>,
}

impl GaussianNb {
    pub fn from_file(path: &Path) -> Result<Self> {
        log::info!("Loading classifier from {}", path.display());
        let file = File::open(path)?;
        let model: GaussianNb = serde_json::from_reader(BufReader::new(file))?;
        model.validate()?;
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let model: GaussianNb = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        let classes = self.classes.len();
        if classes == 0 {
            return Err(AnalysisError::Model("no classes".to_string()));
        }
        if self.class_prior.len() != classes || self.theta.len() != classes || self.var.len() != classes {
            return Err(AnalysisError::Model(format!(
                "expected {classes} priors, means and variances, got {}, {} and {}",
                self.class_prior.len(),
                self.theta.len(),
                self.var.len()
            )));
        }
        if self.class_prior.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(AnalysisError::Model("class priors must be positive".to_string()));
        }
        for (class, variances) in self.classes.iter().zip(&self.var) {
            if let Some(i) = variances.iter().position(|v| !v.is_finite() || *v <= 0.0) {
                return Err(AnalysisError::Model(format!(
                    "non-positive variance for {} of class {class}",
                    FEATURE_NAMES[i]
                )));
            }
        }
        Ok(())
    }

    fn joint_log_likelihood(&self, row: &FeatureVector) -> Vec<f64> {
        self.class_prior
            .iter()
            .zip(self.theta.iter().zip(&self.var))
            .map(|(prior, (means, variances))| {
                let gauss: f64 = row
                    .0
                    .iter()
                    .zip(means.iter().zip(variances))
                    .map(|(x, (mean, var))| -0.5 * (2.0 * PI * var).ln() - 0.5 * (x - mean).powi(2) / var)
                    .sum();
                prior.ln() + gauss
            })
            .collect()
    }
}

impl Classifier for GaussianNb {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, rows: &[FeatureVector]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                let jll = self.joint_log_likelihood(row);
                let max = jll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let exp: Vec<f64> = jll.iter().map(|l| (l - max).exp()).collect();
                let total: f64 = exp.iter().sum();
                exp.into_iter().map(|e| e / total).collect()
            })
            .collect()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub const TWO_CLASS_MODEL: &str = r#"{
        "classes": ["Spotlight Cam", "HomeBase2"],
        "class_prior": [0.5, 0.5],
        "theta": [[1000.0, 10.0, 5.0, 900.0], [60.0, 500.0, 0.0, 0.0]],
        "var": [[10000.0, 100.0, 4.0, 10000.0], [400.0, 10000.0, 1.0, 1.0]]
    }"#;

    #[test]
    fn probabilities_sum_to_one() {
        let model = GaussianNb::from_json(TWO_CLASS_MODEL).unwrap();
        let rows = [FeatureVector([980.0, 12.0, 4.0, 910.0]), FeatureVector([55.0, 480.0, 0.0, 0.0])];
        let proba = model.predict_proba(&rows);

        assert_eq!(proba.len(), 2);
        for distribution in &proba {
            assert!((distribution.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
        assert!(proba[0][0] > 0.99);
        assert!(proba[1][1] > 0.99);
    }

    #[test]
    fn rejects_inconsistent_parameters() {
        let missing_var = r#"{"classes": ["a", "b"], "class_prior": [0.5, 0.5],
            "theta": [[0,0,0,0],[1,1,1,1]], "var": [[1,1,1,1]]}"#;
        assert!(matches!(GaussianNb::from_json(missing_var), Err(AnalysisError::Model(_))));

        let zero_var = r#"{"classes": ["a"], "class_prior": [1.0],
            "theta": [[0,0,0,0]], "var": [[1,0,1,1]]}"#;
        assert!(matches!(GaussianNb::from_json(zero_var), Err(AnalysisError::Model(_))));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(GaussianNb::from_json("{"), Err(AnalysisError::Json(_))));
    }
}
