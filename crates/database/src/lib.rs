//! # Database Crate
//!
//! This crate owns the application's connection to its database: one engine
//! (connection pool) built from the configured connection string, one session
//! factory bound to it, and a scoped provider that lends a session to a unit
//! of work and always releases it.
//!
//! ## Architectural Principles
//!
//! - **Construct once, pass explicitly:** `connect` returns a `SessionFactory`
//!   that the caller threads through the application. There are no globals, so
//!   tests build an isolated engine each.
//! - **Runtime-selected backend:** `sqlx`'s `Any` driver serves both embedded
//!   SQLite and networked PostgreSQL; the URL scheme decides.
//! - **Explicit unit of work:** sessions never commit, flush or expire on
//!   their own. `SessionFactory::scope` only guarantees release.
//!
//! ## Public API
//!
//! - `connect` / `create_engine`: build the factory or just the engine.
//! - `Engine`: the shared pool plus its connect arguments and session counters.
//! - `SessionFactory`: opens sessions and runs scoped units of work.
//! - `Session`: statements, pending additions, identity-mapped `get`, commit.
//! - `Record` / `Value`: table mapping for `add` and `get`.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod engine;
pub mod error;
pub mod factory;
mod identity;
pub mod record;
pub mod session;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, create_engine};
pub use engine::{Backend, ConnectArgs, Engine, EngineStats};
pub use error::DbError;
pub use factory::SessionFactory;
pub use record::{Record, Value};
pub use session::{Session, SessionOptions};
