// ============================================================
// Layer 5 — Random Search Tuner
// ============================================================
// Draws points from the discrete SearchSpace, trains one fresh
// model per point, and keeps the point with the best objective.
//
//   objective:  val_binary_accuracy (max over a trial's epochs)
//   trials:     10 by default
//   duplicates: a point already tried is redrawn, up to
//               MAX_COLLISIONS times; after that the grid is
//               treated as exhausted and the search ends early
//   ties:       the earlier trial wins
//
// The evaluation itself is injected, so the search can be
// driven by real training or by a stub in tests.

use anyhow::{bail, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::domain::hyperparams::{HyperParameters, SearchSpace};

pub const OBJECTIVE: &str = "val_binary_accuracy";

const MAX_COLLISIONS: usize = 20;

/// One completed trial.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// 1-based trial number
    pub number:          usize,
    pub hyperparameters: HyperParameters,
    pub score:           f64,
}

impl Trial {
    pub fn to_json(&self) -> Value {
        json!({
            "trial":     self.number,
            "values":    self.hyperparameters.to_values(),
            "objective": OBJECTIVE,
            "score":     self.score,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best:   Trial,
    pub trials: Vec<Trial>,
}

impl SearchResult {
    /// The hand-off document read back by the trainer.
    pub fn to_json(&self) -> Value {
        json!({
            "values": self.best.hyperparameters.to_values(),
            "score":  self.best.score,
            "trials": self.trials.iter().map(Trial::to_json).collect::<Vec<_>>(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RandomSearch {
    pub space:      SearchSpace,
    pub max_trials: usize,
    pub seed:       u64,
}

impl RandomSearch {
    pub fn new(space: SearchSpace, max_trials: usize, seed: u64) -> Self {
        Self { space, max_trials, seed }
    }

    /// Run the search.
    ///
    /// `evaluate` trains and scores one point; `on_trial` is called
    /// after every completed trial. Any error aborts the search.
    pub fn run<E, T>(&self, mut evaluate: E, mut on_trial: T) -> Result<SearchResult>
    where
        E: FnMut(usize, &HyperParameters) -> Result<f64>,
        T: FnMut(&Trial) -> Result<()>,
    {
        if self.space.is_empty() {
            bail!("search space has no points");
        }
        if self.max_trials == 0 {
            bail!("max_trials must be positive");
        }

        tracing::info!(
            "Random search: up to {} trials over {} grid points, objective {}",
            self.max_trials,
            self.space.cardinality(),
            OBJECTIVE,
        );

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut seen: HashSet<String> = HashSet::new();
        let mut trials: Vec<Trial> = Vec::new();
        let mut best: Option<Trial> = None;

        for number in 1..=self.max_trials {
            let Some(hp) = self.next_unseen(&mut rng, &mut seen) else {
                tracing::info!("Search space exhausted after {} trials", trials.len());
                break;
            };

            tracing::info!("Trial {}/{}: {:?}", number, self.max_trials, hp);
            let score = evaluate(number, &hp)?;
            let trial = Trial { number, hyperparameters: hp, score };
            tracing::info!("Trial {} {} = {:.4}", number, OBJECTIVE, score);

            on_trial(&trial)?;

            if best.as_ref().map_or(true, |b| trial.score > b.score) {
                best = Some(trial.clone());
            }
            trials.push(trial);
        }

        match best {
            Some(best) => {
                tracing::info!("Best trial {} with {} = {:.4}", best.number, OBJECTIVE, best.score);
                Ok(SearchResult { best, trials })
            }
            None => bail!("no trials completed"),
        }
    }

    fn next_unseen(&self, rng: &mut StdRng, seen: &mut HashSet<String>) -> Option<HyperParameters> {
        for _ in 0..=MAX_COLLISIONS {
            let hp = self.space.sample(rng);
            if seen.insert(point_key(&hp)) {
                return Some(hp);
            }
        }
        None
    }
}

fn point_key(hp: &HyperParameters) -> String {
    Value::Object(hp.to_values()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_space() -> SearchSpace {
        SearchSpace {
            embedding_dim: vec![4, 8],
            unit_1:        vec![128],
            dropout_1:     vec![0.2],
            unit_2:        vec![64],
            dropout_2:     vec![0.2],
            unit_3:        vec![32],
            dropout_3:     vec![0.2],
            learning_rate: vec![0.001],
        }
    }

    #[test]
    fn test_never_repeats_a_point() {
        let search = RandomSearch::new(SearchSpace::default(), 10, 7);
        let result = search.run(|_, hp| Ok(hp.unit_1 as f64), |_| Ok(())).unwrap();

        assert_eq!(result.trials.len(), 10);
        let keys: HashSet<String> = result.trials.iter().map(|t| point_key(&t.hyperparameters)).collect();
        assert_eq!(keys.len(), 10);
        assert!(result.trials.iter().all(|t| search.space.contains(&t.hyperparameters)));
    }

    #[test]
    fn test_stops_early_when_grid_exhausted() {
        let search = RandomSearch::new(tiny_space(), 10, 1);
        let mut calls = 0;
        let result = search.run(|_, _| { calls += 1; Ok(0.5) }, |_| Ok(())).unwrap();
        assert_eq!(result.trials.len(), 2);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_best_score_wins_and_ties_keep_earlier() {
        let search = RandomSearch::new(tiny_space(), 2, 3);
        let result = search.run(|_, _| Ok(0.8), |_| Ok(())).unwrap();
        assert_eq!(result.best.number, 1);

        let result = search
            .run(|n, _| Ok(if n == 2 { 0.9 } else { 0.7 }), |_| Ok(()))
            .unwrap();
        assert_eq!(result.best.number, 2);
        assert_eq!(result.best.score, 0.9);
    }

    #[test]
    fn test_same_seed_same_trials() {
        let a = RandomSearch::new(SearchSpace::default(), 5, 42).run(|_, _| Ok(0.0), |_| Ok(())).unwrap();
        let b = RandomSearch::new(SearchSpace::default(), 5, 42).run(|_, _| Ok(0.0), |_| Ok(())).unwrap();
        assert_eq!(a.trials, b.trials);
    }

    #[test]
    fn test_trial_callback_sees_every_trial() {
        let mut numbers = Vec::new();
        RandomSearch::new(SearchSpace::default(), 3, 9)
            .run(|_, _| Ok(0.5), |t| { numbers.push(t.number); Ok(()) })
            .unwrap();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_evaluation_error_aborts() {
        let search = RandomSearch::new(SearchSpace::default(), 3, 9);
        let err = search.run(|n, _| if n == 2 { bail!("boom") } else { Ok(0.5) }, |_| Ok(()));
        assert!(err.is_err());
    }

    #[test]
    fn test_hand_off_document_shape() {
        let result = RandomSearch::new(tiny_space(), 1, 0).run(|_, _| Ok(0.75), |_| Ok(())).unwrap();
        let doc = result.to_json();
        assert_eq!(doc["score"], 0.75);
        assert_eq!(doc["trials"].as_array().unwrap().len(), 1);
        let hp = HyperParameters::from_values(doc["values"].as_object().unwrap()).unwrap();
        assert_eq!(hp, result.best.hyperparameters);
    }
}
