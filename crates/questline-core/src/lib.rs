//! Core types and trait definitions for the Questline progression engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Everything here is pure: classification normalization, counter
//! aggregation, XP math, and achievement predicates all operate on values
//! and leave persistence to a [`store::ProgressStore`] backend.

pub mod achievement;
pub mod decision;
pub mod error;
pub mod mission;
pub mod progress;
pub mod store;
pub mod xp;

pub use error::{Error, Result};
