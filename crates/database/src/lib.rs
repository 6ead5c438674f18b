//! # Ledger Database Crate
//!
//! This crate is the durable home of account ledgers and their order logs.
//!
//! ## Architectural Principles
//!
//! - **Storage behind a trait:** The engine only sees `AccountStore`. The
//!   PostgreSQL `DbRepository` and the process-local `InMemoryAccountStore`
//!   are interchangeable, and the handle is passed explicitly rather than held
//!   in global state.
//! - **All-or-nothing fills:** `commit_fill` replaces the account and appends
//!   the order record in one transaction, guarded by a conditional update on
//!   the account's order counter.
//! - **Asynchronous & Pooled:** All operations are asynchronous, and the
//!   PostgreSQL store uses a connection pool (`PgPool`).
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: open the pool and bring the schema up to date.
//! - `AccountStore`, `OrderFilter`: the storage contract.
//! - `DbRepository`, `InMemoryAccountStore`: the two implementations.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use repository::DbRepository;
pub use store::{AccountStore, InMemoryAccountStore, OrderFilter};
