//! `stratus-recon` — Incremental reconciliation engine for weather relations.
//!
//! Pure engine crate: receives one parsed snapshot document plus the prior
//! persisted state, returns the next state of the five relations.
//! No CLI or IO dependencies.

pub mod derive;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod schema;
pub mod snapshot;

pub use engine::{run_batch, BatchOutput, PriorState};
pub use error::ReconError;
pub use model::{Relation, Value};
pub use reconcile::{reconcile, MergePolicy};
