//! Distributed matrix completion with asynchronous, token-passing SGD.
//!
//! The rows of a sparse rating matrix are split across processes. Each process
//! keeps the row factors of its rows, while the column factors live on process
//! 0 and are read and written remotely. A column may only be updated by the
//! process holding its work token, which then hands the token to the process
//! with the shallowest queue.

pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod initialization;
pub mod matrix;
pub mod partition;
pub mod sgd;
pub mod storage;
pub mod tokens;

pub use config::{RunConfig, Topology, TrainConfig};
pub use coordinator::{RunReport, run_local, run_tcp};
pub use error::{NomadErr, Result};
pub use matrix::RatingMatrix;
