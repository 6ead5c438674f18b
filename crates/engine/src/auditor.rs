use crate::error::EngineError;
use crate::trading::TradingEngine;
use analytics::LedgerReplay;
use core_types::{Account, OrderRecord};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// One way in which the stored ledger disagrees with its replayed log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Discrepancy {
    Cash { stored: Decimal, replayed: Decimal },
    OrderCount { stored: u64, replayed: u64 },
    /// Held in the stored ledger but not in the replay.
    GhostPosition { symbol: String, quantity: Decimal },
    /// Held according to the log but missing from the stored ledger.
    UntrackedPosition { symbol: String, quantity: Decimal },
    Quantity { symbol: String, stored: Decimal, replayed: Decimal },
    AverageCost { symbol: String, stored: Decimal, replayed: Decimal },
    /// The log itself could not be replayed.
    UnreplayableLog(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub account_id: String,
    pub orders_replayed: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Compares a stored account with a replay of its full order log.
/// Both paths use the same arithmetic, so every comparison is exact.
pub fn audit_ledger(account: &Account, orders: &[OrderRecord]) -> AuditReport {
    let mut report = AuditReport {
        account_id: account.account_id.clone(),
        orders_replayed: orders.len(),
        discrepancies: Vec::new(),
    };

    let replay = match LedgerReplay::run(account.starting_cash, orders) {
        Ok(replay) => replay,
        Err(e) => {
            report.discrepancies.push(Discrepancy::UnreplayableLog(e.to_string()));
            return report;
        }
    };

    if account.cash != replay.cash {
        report.discrepancies.push(Discrepancy::Cash {
            stored: account.cash,
            replayed: replay.cash,
        });
    }
    if account.order_count != replay.order_count {
        report.discrepancies.push(Discrepancy::OrderCount {
            stored: account.order_count,
            replayed: replay.order_count,
        });
    }

    let symbols: BTreeSet<&String> = account.positions.keys().chain(replay.positions.keys()).collect();
    for symbol in symbols {
        match (account.positions.get(symbol), replay.positions.get(symbol)) {
            (Some(stored), Some(replayed)) => {
                if stored.quantity != replayed.quantity {
                    report.discrepancies.push(Discrepancy::Quantity {
                        symbol: symbol.clone(),
                        stored: stored.quantity,
                        replayed: replayed.quantity,
                    });
                }
                if stored.average_cost != replayed.average_cost {
                    report.discrepancies.push(Discrepancy::AverageCost {
                        symbol: symbol.clone(),
                        stored: stored.average_cost,
                        replayed: replayed.average_cost,
                    });
                }
            }
            (Some(stored), None) => report.discrepancies.push(Discrepancy::GhostPosition {
                symbol: symbol.clone(),
                quantity: stored.quantity,
            }),
            (None, Some(replayed)) => report.discrepancies.push(Discrepancy::UntrackedPosition {
                symbol: symbol.clone(),
                quantity: replayed.quantity,
            }),
            (None, None) => {}
        }
    }
    report
}

/// Periodically audits every account of the engine's book in the background.
pub struct LedgerAuditor {
    engine: Arc<TradingEngine>,
    period: Duration,
}

impl LedgerAuditor {
    pub fn new(engine: Arc<TradingEngine>, period: Duration) -> Self {
        Self { engine, period }
    }

    /// Audits every account once. Accounts of other books are skipped.
    pub async fn run_audit(&self) -> Result<Vec<AuditReport>, EngineError> {
        tracing::info!("Running ledger audit...");
        let mut reports = Vec::new();

        for account_id in self.engine.account_ids().await? {
            let report = match self.engine.audit(&account_id).await {
                Ok(report) => report,
                Err(EngineError::AccountNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            for discrepancy in &report.discrepancies {
                tracing::error!(account_id = %report.account_id, ?discrepancy, "Ledger discrepancy found.");
            }
            reports.push(report);
        }

        let inconsistent = reports.iter().filter(|r| !r.is_consistent()).count();
        tracing::info!(accounts = reports.len(), inconsistent, "Ledger audit complete.");
        Ok(reports)
    }

    pub async fn start(self) {
        tracing::info!(period_secs = self.period.as_secs(), "Starting periodic ledger audit task...");
        let mut timer = interval(self.period);

        loop {
            // The first tick is immediate.
            timer.tick().await;
            if let Err(e) = self.run_audit().await {
                tracing::error!(error = %e, "Ledger audit failed.");
            }
        }
    }
}
