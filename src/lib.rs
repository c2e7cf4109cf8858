//! Budget-Choice Experiment
//!
//! A single-session behavioral-economics survey service:
//! - Draws a randomized budget line (prices + income) each round
//! - Records every confirmed allocation in an append-only ledger
//! - Requests AI-generated advice past the session midpoint (treatment arm)
//! - Exports the finished ledger as a CSV artifact
//!
//! SESSION LOOP:
//! INTAKE → [DRAW LINE → CHOOSE → RECORD → ADVISE?] × 20 → EXPORT

pub mod advice;
pub mod api;
pub mod budget;
pub mod error;
pub mod ledger;
pub mod models;
pub mod session;
pub mod store;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use session::{AdvicePolicy, RoundOutcome, Session};
