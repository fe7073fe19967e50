//! The reasoning graph engine.
//!
//! This module provides:
//! - **errors**: Error types for engine failures
//! - **graph**: Confidence-weighted reasoning graph and its builder
//! - **adjacency**: Dense-index adjacency view used by the metric passes
//! - **belief**: Parametric beliefs and Bayesian update records
//! - **propagation**: Evidence updates and iterative belief propagation
//! - **uncertainty**: Graph-wide uncertainty quantification

pub mod adjacency;
pub mod belief;
pub mod errors;
pub mod graph;
pub mod numeric;
pub mod propagation;
pub mod uncertainty;
