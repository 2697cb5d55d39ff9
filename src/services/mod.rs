//! Composition strategies behind the public routes.
//!
//! - [`aggregator`]: Core listing joined with Index details (fan-out/fan-in).
//! - [`saga`]: borrow, load borrow, create appointment (strictly sequential).
//! - [`health`]: concurrent probes that never fail as a whole.

pub mod aggregator;
pub mod health;
pub mod models;
pub mod saga;

pub use aggregator::{Aggregator, Shelf};
pub use saga::{SagaError, SagaOrchestrator};
