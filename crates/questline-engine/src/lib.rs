//! The Questline turn pipeline.
//!
//! One service, [`TurnPipeline`], drives the whole progression flow for a
//! conversational turn: normalize the upstream classification, fold it into
//! the mission's progress row, persist through the store's atomic
//! increments, award XP, and re-evaluate the achievement catalog against
//! freshly re-read cumulative state. The pipeline itself is stateless
//! between calls; every durable value lives behind the
//! [`ProgressStore`](questline_core::store::ProgressStore) it wraps.

pub mod error;
mod pipeline;

pub use error::{Error, Result};
pub use pipeline::{TurnInput, TurnOutcome, TurnPipeline};

#[cfg(test)]
mod tests;
