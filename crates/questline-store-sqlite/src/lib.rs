//! SQLite backend for the Questline progress store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Counter and XP mutations are
//! issued as in-database increments; the submission ledger and the counter
//! update always commit in the same transaction.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
