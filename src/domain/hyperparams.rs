// ============================================================
// Layer 3 — Hyperparameters
// ============================================================
// Named, defaulted, range-checked configuration for the model
// builder, plus the discrete grid the tuner draws from.
//
//   name            default   tuning choices
//   embedding_dim   8         4, 8, 16
//   unit_1          128       128, 256
//   dropout_1       0.2       0.2, 0.4
//   unit_2          64        64, 128
//   dropout_2       0.2       0.2, 0.4
//   unit_3          32        32, 64
//   dropout_3       0.2       0.2, 0.4
//   learning_rate   0.001     0.0001, 0.001
//
// The tuner hands its winner to the trainer as a plain
// key → number mapping; `from_values` reads that mapping back.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum HyperParameterError {
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("{name} must be in [0, 1), got {value}")]
    DropoutOutOfRange { name: &'static str, value: f64 },

    #[error("{name} must be a number, got {value}")]
    NotANumber { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParameters {
    pub embedding_dim: usize,
    pub unit_1:        usize,
    pub dropout_1:     f64,
    pub unit_2:        usize,
    pub dropout_2:     f64,
    pub unit_3:        usize,
    pub dropout_3:     f64,
    pub learning_rate: f64,
}

impl Default for HyperParameters {
    fn default() -> Self {
        Self {
            embedding_dim: 8,
            unit_1:        128,
            dropout_1:     0.2,
            unit_2:        64,
            dropout_2:     0.2,
            unit_3:        32,
            dropout_3:     0.2,
            learning_rate: 0.001,
        }
    }
}

impl HyperParameters {
    /// Check every value against its allowed range.
    pub fn validate(&self) -> Result<(), HyperParameterError> {
        for (name, value) in [
            ("embedding_dim", self.embedding_dim),
            ("unit_1", self.unit_1),
            ("unit_2", self.unit_2),
            ("unit_3", self.unit_3),
        ] {
            if value == 0 {
                return Err(HyperParameterError::NotPositive { name, value: 0.0 });
            }
        }
        for (name, value) in [
            ("dropout_1", self.dropout_1),
            ("dropout_2", self.dropout_2),
            ("dropout_3", self.dropout_3),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(HyperParameterError::DropoutOutOfRange { name, value });
            }
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(HyperParameterError::NotPositive {
                name:  "learning_rate",
                value: self.learning_rate,
            });
        }
        Ok(())
    }

    /// Read the tuner hand-off mapping.
    ///
    /// Missing keys keep their default, unknown keys are ignored
    /// with a warning. The result is validated.
    pub fn from_values(values: &Map<String, Value>) -> Result<Self, HyperParameterError> {
        let mut hp = Self::default();
        for (key, value) in values {
            let number = value.as_f64().ok_or_else(|| HyperParameterError::NotANumber {
                name:  key.clone(),
                value: value.to_string(),
            })?;
            match key.as_str() {
                "embedding_dim" => hp.embedding_dim = as_width("embedding_dim", number)?,
                "unit_1"        => hp.unit_1        = as_width("unit_1", number)?,
                "unit_2"        => hp.unit_2        = as_width("unit_2", number)?,
                "unit_3"        => hp.unit_3        = as_width("unit_3", number)?,
                "dropout_1"     => hp.dropout_1     = number,
                "dropout_2"     => hp.dropout_2     = number,
                "dropout_3"     => hp.dropout_3     = number,
                "learning_rate" => hp.learning_rate = number,
                other => tracing::warn!("Ignoring unknown hyperparameter '{}'", other),
            }
        }
        hp.validate()?;
        Ok(hp)
    }

    /// The plain key-value form handed from tuner to trainer.
    pub fn to_values(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("embedding_dim".into(), Value::from(self.embedding_dim));
        m.insert("unit_1".into(),        Value::from(self.unit_1));
        m.insert("dropout_1".into(),     Value::from(self.dropout_1));
        m.insert("unit_2".into(),        Value::from(self.unit_2));
        m.insert("dropout_2".into(),     Value::from(self.dropout_2));
        m.insert("unit_3".into(),        Value::from(self.unit_3));
        m.insert("dropout_3".into(),     Value::from(self.dropout_3));
        m.insert("learning_rate".into(), Value::from(self.learning_rate));
        m
    }
}

fn as_width(name: &'static str, number: f64) -> Result<usize, HyperParameterError> {
    if number < 1.0 || number.fract() != 0.0 {
        return Err(HyperParameterError::NotPositive { name, value: number });
    }
    Ok(number as usize)
}

// ─── Search Space ─────────────────────────────────────────────────────────────
/// Discrete choices per hyperparameter used by random search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub embedding_dim: Vec<usize>,
    pub unit_1:        Vec<usize>,
    pub dropout_1:     Vec<f64>,
    pub unit_2:        Vec<usize>,
    pub dropout_2:     Vec<f64>,
    pub unit_3:        Vec<usize>,
    pub dropout_3:     Vec<f64>,
    pub learning_rate: Vec<f64>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            embedding_dim: vec![4, 8, 16],
            unit_1:        vec![128, 256],
            dropout_1:     vec![0.2, 0.4],
            unit_2:        vec![64, 128],
            dropout_2:     vec![0.2, 0.4],
            unit_3:        vec![32, 64],
            dropout_3:     vec![0.2, 0.4],
            learning_rate: vec![0.0001, 0.001],
        }
    }
}

impl SearchSpace {
    /// Number of distinct points in the grid
    pub fn cardinality(&self) -> usize {
        self.embedding_dim.len()
            * self.unit_1.len()
            * self.dropout_1.len()
            * self.unit_2.len()
            * self.dropout_2.len()
            * self.unit_3.len()
            * self.dropout_3.len()
            * self.learning_rate.len()
    }

    /// Draw one grid point uniformly at random.
    /// Every choice list must be non-empty.
    pub fn sample(&self, rng: &mut impl Rng) -> HyperParameters {
        HyperParameters {
            embedding_dim: pick(&self.embedding_dim, rng),
            unit_1:        pick(&self.unit_1, rng),
            dropout_1:     pick(&self.dropout_1, rng),
            unit_2:        pick(&self.unit_2, rng),
            dropout_2:     pick(&self.dropout_2, rng),
            unit_3:        pick(&self.unit_3, rng),
            dropout_3:     pick(&self.dropout_3, rng),
            learning_rate: pick(&self.learning_rate, rng),
        }
    }

    pub fn contains(&self, hp: &HyperParameters) -> bool {
        self.embedding_dim.contains(&hp.embedding_dim)
            && self.unit_1.contains(&hp.unit_1)
            && self.dropout_1.contains(&hp.dropout_1)
            && self.unit_2.contains(&hp.unit_2)
            && self.dropout_2.contains(&hp.dropout_2)
            && self.unit_3.contains(&hp.unit_3)
            && self.dropout_3.contains(&hp.dropout_3)
            && self.learning_rate.contains(&hp.learning_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality() == 0
    }
}

fn pick<T: Copy>(choices: &[T], rng: &mut impl Rng) -> T {
    choices[rng.gen_range(0..choices.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use serde_json::json;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(HyperParameters::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_dropout() {
        let hp = HyperParameters { dropout_2: 1.0, ..Default::default() };
        assert!(matches!(
            hp.validate(),
            Err(HyperParameterError::DropoutOutOfRange { name: "dropout_2", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_width_and_lr() {
        let hp = HyperParameters { unit_3: 0, ..Default::default() };
        assert!(hp.validate().is_err());
        let hp = HyperParameters { learning_rate: 0.0, ..Default::default() };
        assert!(hp.validate().is_err());
    }

    #[test]
    fn test_from_values_fills_defaults() {
        let values = json!({"unit_1": 256, "learning_rate": 0.0001});
        let hp = HyperParameters::from_values(values.as_object().unwrap()).unwrap();
        assert_eq!(hp.unit_1, 256);
        assert_eq!(hp.learning_rate, 0.0001);
        assert_eq!(hp.embedding_dim, 8);
        assert_eq!(hp.unit_2, 64);
    }

    #[test]
    fn test_from_values_rejects_non_numeric_and_fractional_width() {
        let values = json!({"unit_1": "wide"});
        assert!(HyperParameters::from_values(values.as_object().unwrap()).is_err());
        let values = json!({"unit_1": 12.5});
        assert!(HyperParameters::from_values(values.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_values_mapping_is_read_back() {
        let hp = HyperParameters { embedding_dim: 16, dropout_3: 0.4, ..Default::default() };
        let back = HyperParameters::from_values(&hp.to_values()).unwrap();
        assert_eq!(back, hp);
    }

    #[test]
    fn test_default_grid_size() {
        assert_eq!(SearchSpace::default().cardinality(), 3 * 128);
    }

    #[test]
    fn test_samples_stay_inside_grid() {
        let space = SearchSpace::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let hp = space.sample(&mut rng);
            assert!(space.contains(&hp));
            assert!(hp.validate().is_ok());
        }
    }
}
