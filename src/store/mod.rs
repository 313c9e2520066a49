/// Storage adapters
///
/// Postgres-backed implementations for production and in-memory ones for
/// tests and local experiments. Both honor the same uniqueness and
/// revocation rules.

mod memory;
mod postgres;

pub use memory::{InMemoryRevocationStore, InMemoryUserStore};
pub use postgres::{PgRevocationStore, PgUserStore};
