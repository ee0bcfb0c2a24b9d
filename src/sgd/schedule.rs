use serde::{Deserialize, Serialize};

/// The decaying step size `alpha / (1 + beta * t^exponent)`, where `t` counts
/// the visits to the rating being updated, the current one included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRate {
    pub alpha: f64,
    pub beta: f64,
    pub exponent: f64,
}

impl LearningRate {
    /// Returns the step size for the `t`-th visit, starting at 1.
    pub fn at(&self, t: u64) -> f64 {
        self.alpha / (1. + self.beta * (t as f64).powf(self.exponent))
    }
}

/// The penalty added to the gradient of an embedding `v`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regularization {
    /// `lambda * v`
    #[default]
    WeightDecay,
    /// `lambda * |v| * v`
    NormScaled,
}

impl Regularization {
    /// Returns the scalar the embedding is multiplied by to get its penalty.
    pub fn coefficient(self, lambda: f64, v: &[f64]) -> f64 {
        match self {
            Self::WeightDecay => lambda,
            Self::NormScaled => lambda * v.iter().map(|x| x * x).sum::<f64>().sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_visit_is_already_decayed() {
        let lr = LearningRate {
            alpha: 0.012,
            beta: 0.01,
            exponent: 1.5,
        };

        assert!((lr.at(1) - 0.012 / 1.01).abs() < 1e-15);
        assert!((lr.at(100) - 0.012 / 11.).abs() < 1e-15);
        assert!(lr.at(101) < lr.at(100));
    }

    #[test]
    fn penalty_coefficients() {
        let v = [3., 4.];
        assert_eq!(Regularization::WeightDecay.coefficient(0.1, &v), 0.1);
        assert!((Regularization::NormScaled.coefficient(0.1, &v) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn deserializes_from_snake_case() {
        let reg: Regularization = serde_json::from_str("\"norm_scaled\"").unwrap();
        assert_eq!(reg, Regularization::NormScaled);
    }
}
