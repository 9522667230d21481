//! Record-store implementations.
//!
//! `PgStore` is the production PostgreSQL store; `MemoryStore` backs tests
//! and database-free local runs.

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;
