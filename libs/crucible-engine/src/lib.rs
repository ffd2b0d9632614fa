//! Compilation-and-validation engine for learner-submitted C code.
//!
//! The pipeline is strictly layered: the harness generator and evaluator
//! are pure, the compiler invoker and sandboxed runner own all process and
//! filesystem effects, and the executor sequences them into one verdict
//! per submission. Nothing is shared between submissions except immutable
//! configuration, so any number of learners can be graded concurrently.

pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod harness;
pub mod sandbox;

pub use error::EngineError;
pub use executor::Engine;
