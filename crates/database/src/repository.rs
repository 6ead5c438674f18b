use crate::store::{AccountStore, OrderFilter};
use crate::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Account, OrderRecord, Position};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::{QueryBuilder, Row, Transaction};
use std::collections::BTreeMap;

/// The `DbRepository` provides the PostgreSQL-backed account store. It
/// encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

fn to_count(value: i64, column: &str) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|_| DbError::InvalidRow(format!("negative {}: {}", column, value)))
}

fn to_bigint(value: u64, column: &str) -> Result<i64, DbError> {
    i64::try_from(value).map_err(|_| DbError::InvalidRow(format!("{} out of range: {}", column, value)))
}

fn order_from_row(row: &PgRow) -> Result<OrderRecord, DbError> {
    let side: String = row.try_get("side")?;
    let order_type: String = row.try_get("order_type")?;
    let status: String = row.try_get("status")?;
    let sequence: i64 = row.try_get("sequence")?;

    Ok(OrderRecord {
        order_id: row.try_get("order_id")?,
        account_id: row.try_get("account_id")?,
        sequence: to_count(sequence, "sequence")?,
        symbol: row.try_get("symbol")?,
        side: side.parse().map_err(|e| DbError::InvalidRow(format!("{}", e)))?,
        quantity: row.try_get("quantity")?,
        executed_price: row.try_get("executed_price")?,
        order_type: order_type.parse().map_err(|e| DbError::InvalidRow(format!("{}", e)))?,
        status: status.parse().map_err(|e| DbError::InvalidRow(format!("{}", e)))?,
        timestamp: row.try_get("executed_at")?,
    })
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Closes the pool. Called once at shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Fetches the most recent closes for a symbol, newest first.
    pub async fn latest_closes(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Decimal>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT close
            FROM klines
            WHERE symbol = $1 AND interval = $2
            ORDER BY open_time DESC
            LIMIT $3
            "#,
        )
        .bind(symbol)
        .bind(interval)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<Decimal, _>("close").map_err(DbError::from))
            .collect()
    }

    async fn write_positions(tx: &mut Transaction<'_, Postgres>, account: &Account) -> Result<(), DbError> {
        sqlx::query("DELETE FROM account_positions WHERE account_id = $1")
            .bind(&account.account_id)
            .execute(&mut **tx)
            .await?;

        for position in account.positions.values() {
            sqlx::query(
                "INSERT INTO account_positions (account_id, symbol, quantity, average_cost) VALUES ($1, $2, $3, $4)",
            )
            .bind(&account.account_id)
            .bind(&position.symbol)
            .bind(position.quantity)
            .bind(position.average_cost)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn insert_order(tx: &mut Transaction<'_, Postgres>, order: &OrderRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, account_id, sequence, symbol, side, quantity,
                executed_price, order_type, status, executed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.order_id)
        .bind(&order.account_id)
        .bind(to_bigint(order.sequence, "sequence")?)
        .bind(&order.symbol)
        .bind(order.side.as_str())
        .bind(order.quantity)
        .bind(order.executed_price)
        .bind(order.order_type.as_str())
        .bind(order.status.as_str())
        .bind(order.timestamp)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for DbRepository {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, DbError> {
        // Both reads see the same snapshot, so a concurrent commit cannot pair
        // new cash with old positions.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            "SELECT account_id, kind, cash, starting_cash, order_count, created_at FROM accounts WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let kind: String = row.try_get("kind")?;
        let order_count: i64 = row.try_get("order_count")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;

        let position_rows = sqlx::query(
            "SELECT symbol, quantity, average_cost FROM account_positions WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut positions = BTreeMap::new();
        for p in &position_rows {
            let position = Position {
                symbol: p.try_get("symbol")?,
                quantity: p.try_get("quantity")?,
                average_cost: p.try_get("average_cost")?,
            };
            positions.insert(position.symbol.clone(), position);
        }

        Ok(Some(Account {
            account_id: row.try_get("account_id")?,
            kind: kind.parse().map_err(|e| DbError::InvalidRow(format!("{}", e)))?,
            cash: row.try_get("cash")?,
            starting_cash: row.try_get("starting_cash")?,
            positions,
            order_count: to_count(order_count, "order_count")?,
            created_at,
        }))
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO accounts (account_id, kind, cash, starting_cash, order_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(&account.account_id)
        .bind(account.kind.as_str())
        .bind(account.cash)
        .bind(account.starting_cash)
        .bind(to_bigint(account.order_count, "order_count")?)
        .bind(account.created_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            Self::write_positions(&mut tx, account).await?;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn save_account(&self, account: &Account) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, kind, cash, starting_cash, order_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (account_id) DO UPDATE
            SET cash = EXCLUDED.cash, order_count = EXCLUDED.order_count
            "#,
        )
        .bind(&account.account_id)
        .bind(account.kind.as_str())
        .bind(account.cash)
        .bind(account.starting_cash)
        .bind(to_bigint(account.order_count, "order_count")?)
        .bind(account.created_at)
        .execute(&mut *tx)
        .await?;

        Self::write_positions(&mut tx, account).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn append_order(&self, order: &OrderRecord) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        Self::insert_order(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_fill(&self, account: &Account, order: &OrderRecord) -> Result<(), DbError> {
        // Dropping `tx` on any early return rolls the whole unit back.
        let mut tx = self.pool.begin().await?;

        let expected_count = order.sequence.checked_sub(1).ok_or_else(|| {
            DbError::InvalidRow(format!("order {} has sequence 0", order.order_id))
        })?;

        // Conditional update: only applies if nobody else committed in between.
        let updated = sqlx::query(
            "UPDATE accounts SET cash = $2, order_count = $3 WHERE account_id = $1 AND order_count = $4",
        )
        .bind(&account.account_id)
        .bind(account.cash)
        .bind(to_bigint(account.order_count, "order_count")?)
        .bind(to_bigint(expected_count, "order_count")?)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(DbError::Conflict(format!(
                "account {} changed while order {} was being committed",
                account.account_id, order.order_id
            )));
        }

        Self::write_positions(&mut tx, account).await?;
        Self::insert_order(&mut tx, order).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_orders(&self, account_id: &str, filter: &OrderFilter) -> Result<Vec<OrderRecord>, DbError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT order_id, account_id, sequence, symbol, side, quantity, executed_price, order_type, status, executed_at FROM orders WHERE account_id = ",
        );
        query.push_bind(account_id);

        if let Some(symbol) = &filter.symbol {
            query.push(" AND symbol = ").push_bind(symbol.clone());
        }
        if let Some(side) = filter.side {
            query.push(" AND side = ").push_bind(side.as_str());
        }
        if let Some(from) = filter.from {
            query.push(" AND executed_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND executed_at <= ").push_bind(to);
        }
        if let Some(after) = filter.after_sequence {
            query.push(" AND sequence > ").push_bind(to_bigint(after, "after_sequence")?);
        }
        query.push(" ORDER BY sequence ASC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn list_account_ids(&self) -> Result<Vec<String>, DbError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT account_id FROM accounts ORDER BY account_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
