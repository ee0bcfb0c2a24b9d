//! Run parameters: a JSON run file for the training knobs and the environment
//! for the process topology.

use std::{
    env, fs,
    net::SocketAddr,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    error::{NomadErr, Result},
    sgd::{LearningRate, Regularization},
};

const DEFAULT_EPOCHS: usize = 1000;
const DEFAULT_ALPHA: f64 = 0.012;
const DEFAULT_BETA: f64 = 0.01;
const DEFAULT_LAMBDA: f64 = 0.01;
const DEFAULT_LR_EXPONENT: f64 = 1.5;
const DEFAULT_PRECISION: usize = 4;
const DEFAULT_OUTPUT: &str = "prediction.txt";

/// The training knobs shared by every process of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Iterations of the token loop every process runs.
    pub epochs: usize,
    pub alpha: f64,
    pub beta: f64,
    pub lambda: f64,
    pub lr_exponent: f64,
    pub regularization: Regularization,
    /// Overrides the derived embedding dimension.
    pub embeddings: Option<NonZeroUsize>,
    /// Base seed, the wall clock when missing.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            lambda: DEFAULT_LAMBDA,
            lr_exponent: DEFAULT_LR_EXPONENT,
            regularization: Regularization::default(),
            embeddings: None,
            seed: None,
        }
    }
}

impl TrainConfig {
    /// Checks every knob before any process starts training.
    ///
    /// # Returns
    /// A `Configuration` error naming the first invalid knob.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("lambda", self.lambda),
            ("lr_exponent", self.lr_exponent),
        ];

        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(NomadErr::Configuration(format!("{name} must be finite, got {value}")));
        }

        if self.alpha <= 0. {
            return Err(NomadErr::Configuration(format!(
                "alpha must be positive, got {}",
                self.alpha
            )));
        }

        if self.beta < 0. || self.lambda < 0. || self.lr_exponent < 0. {
            return Err(NomadErr::Configuration(
                "beta, lambda and lr_exponent can't be negative".into(),
            ));
        }

        Ok(())
    }

    pub fn schedule(&self) -> LearningRate {
        LearningRate {
            alpha: self.alpha,
            beta: self.beta,
            exponent: self.lr_exponent,
        }
    }

    /// Returns the embedding dimension for a `rows` x `cols` matrix.
    ///
    /// Defaults to `max(1, (rows + cols) / 2 / 3)`. A dimension that isn't
    /// below `min(rows, cols)` is accepted with a warning.
    pub fn embeddings_for(&self, rows: usize, cols: usize) -> usize {
        let width = self
            .embeddings
            .map(NonZeroUsize::get)
            .unwrap_or_else(|| ((rows + cols) / 2 / 3).max(1));

        if width >= rows.min(cols) {
            warn!("embedding dimension {width} isn't below min({rows}, {cols})");
        }

        width
    }
}

/// The contents of a run file.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// The rating matrix to complete.
    pub input: PathBuf,
    /// Where process 0 writes the completed matrix.
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Decimals per value in the output file.
    #[serde(default = "default_precision")]
    pub precision: usize,
    #[serde(flatten)]
    pub training: TrainConfig,
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT)
}

fn default_precision() -> usize {
    DEFAULT_PRECISION
}

impl RunConfig {
    /// Parses and validates a run file's contents.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| NomadErr::Configuration(format!("invalid run file: {e}")))?;

        config.training.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the run file at `path`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// How the processes of a run find each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    /// Every process runs inside this one, joined by in-memory pipes.
    Local { world: usize },
    /// This process is `rank` out of `peers.len()`, each one listening at its address.
    Tcp { rank: usize, peers: Vec<SocketAddr> },
}

fn invalid_var(var: &str, value: &str, reason: impl std::fmt::Display) -> NomadErr {
    NomadErr::Configuration(format!("{var}={value:?}: {reason}"))
}

impl Topology {
    /// Reads `NOMAD_RANK` and `NOMAD_PEERS` for a TCP run, otherwise
    /// `NOMAD_WORLD` for a local run of that many processes (default 1).
    pub fn from_env() -> Result<Self> {
        Self::from_vars(
            env::var("NOMAD_RANK").ok().as_deref(),
            env::var("NOMAD_PEERS").ok().as_deref(),
            env::var("NOMAD_WORLD").ok().as_deref(),
        )
    }

    /// Builds a topology out of the raw variable values.
    ///
    /// # Arguments
    /// * `rank` - The value of `NOMAD_RANK`.
    /// * `peers` - The value of `NOMAD_PEERS`, comma separated socket addresses.
    /// * `world` - The value of `NOMAD_WORLD`.
    pub fn from_vars(rank: Option<&str>, peers: Option<&str>, world: Option<&str>) -> Result<Self> {
        match (rank, peers) {
            (Some(rank), Some(peers)) => {
                let rank: usize = rank
                    .trim()
                    .parse()
                    .map_err(|e| invalid_var("NOMAD_RANK", rank, e))?;

                let peers = peers
                    .split(',')
                    .map(|addr| {
                        addr.trim()
                            .parse()
                            .map_err(|e| invalid_var("NOMAD_PEERS", addr, e))
                    })
                    .collect::<Result<Vec<SocketAddr>>>()?;

                if rank >= peers.len() {
                    return Err(NomadErr::Configuration(format!(
                        "rank {rank} is out of range for {} peers",
                        peers.len()
                    )));
                }

                Ok(Self::Tcp { rank, peers })
            }
            (None, None) => {
                let world = match world {
                    Some(world) => world
                        .trim()
                        .parse()
                        .map_err(|e| invalid_var("NOMAD_WORLD", world, e))?,
                    None => 1,
                };

                if world == 0 {
                    return Err(NomadErr::Configuration("NOMAD_WORLD can't be 0".into()));
                }

                Ok(Self::Local { world })
            }
            _ => Err(NomadErr::Configuration(
                "NOMAD_RANK and NOMAD_PEERS must be set together".into(),
            )),
        }
    }

    /// The amount of processes in the run.
    pub fn world_size(&self) -> usize {
        match self {
            Self::Local { world } => *world,
            Self::Tcp { peers, .. } => peers.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_knobs() {
        let config = RunConfig::from_json(r#"{ "input": "ratings.txt", "epochs": 50 }"#).unwrap();

        assert_eq!(config.input, PathBuf::from("ratings.txt"));
        assert_eq!(config.output, PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(config.precision, 4);
        assert_eq!(config.training.epochs, 50);
        assert_eq!(config.training.alpha, 0.012);
        assert_eq!(config.training.regularization, Regularization::WeightDecay);
    }

    #[test]
    fn missing_input_is_rejected() {
        let err = RunConfig::from_json(r#"{ "epochs": 50 }"#).unwrap_err();
        assert!(matches!(err, NomadErr::Configuration(_)));
    }

    #[test]
    fn negative_lambda_is_rejected() {
        let json = r#"{ "input": "a", "lambda": -1.0 }"#;
        assert!(matches!(
            RunConfig::from_json(json).unwrap_err(),
            NomadErr::Configuration(_)
        ));
    }

    #[test]
    fn embedding_dimension() {
        let config = TrainConfig::default();
        assert_eq!(config.embeddings_for(4, 3), 1);
        assert_eq!(config.embeddings_for(300, 600), 150);

        let config = TrainConfig {
            embeddings: NonZeroUsize::new(7),
            ..TrainConfig::default()
        };
        assert_eq!(config.embeddings_for(4, 3), 7);
    }

    #[test]
    fn tcp_topology() {
        let topology =
            Topology::from_vars(Some("1"), Some("127.0.0.1:7000, 127.0.0.1:7001"), None).unwrap();

        let Topology::Tcp { rank, peers } = topology else {
            panic!("expected a tcp topology");
        };

        assert_eq!(rank, 1);
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[1].port(), 7001);
    }

    #[test]
    fn local_topology() {
        assert_eq!(
            Topology::from_vars(None, None, Some("3")).unwrap(),
            Topology::Local { world: 3 }
        );
        assert_eq!(Topology::from_vars(None, None, None).unwrap().world_size(), 1);
    }

    #[test]
    fn bad_topologies() {
        assert!(Topology::from_vars(Some("2"), Some("127.0.0.1:1,127.0.0.1:2"), None).is_err());
        assert!(Topology::from_vars(Some("0"), None, None).is_err());
        assert!(Topology::from_vars(None, None, Some("0")).is_err());
        assert!(Topology::from_vars(Some("0"), Some("nowhere"), None).is_err());
    }
}
