//! CLI command implementations.

pub mod adversarial;
pub mod run;
pub mod score;
