//! PostgreSQL transport for Lattice cache invalidation.
//!
//! Carries invalidation messages over the database's native LISTEN/NOTIFY
//! primitive, so no extra infrastructure is needed beyond the shared
//! backing store every instance already connects to.

pub mod channel;

pub use channel::PgChannel;
