//! # Engine
//!
//! Orchestrates order execution and reporting for one book of accounts.
//!
//! Control flow for an order: take the account's lock, resolve the account
//! under the book's `AccountPolicy`, price the order with the `Executor`,
//! validate and apply it to a working copy of the ledger, then commit the new
//! ledger and its order record in one store transaction. Reports snapshot the
//! account and its log under the same lock, release it, and compute outside.
//!
//! ## Public API
//!
//! - `TradingEngine`: `place_order`, portfolio/history/performance reports,
//!   CSV exports, `open_account`, `audit`.
//! - `AccountManager`: policy-driven account lookup and provisioning.
//! - `LedgerAuditor`: periodic replay-versus-ledger audit of every account.
//! - `EngineError`: rejections and failures surfaced to callers.

pub mod accounts;
pub mod auditor;
pub mod error;
pub mod trading;

pub use accounts::AccountManager;
pub use auditor::{audit_ledger, AuditReport, Discrepancy, LedgerAuditor};
pub use error::EngineError;
pub use trading::TradingEngine;
