use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use crate::{
    Condition, Item, Result,
    store::{RecordStore, UpdateExpression, check_condition},
};

/// PostgreSQL-backed record store implementation.
///
/// Items live in a single `records` table keyed by `(table_name, record_key)`.
/// Conditional writes take a transaction-scoped advisory lock on the key, read
/// the current item, evaluate the condition and upsert, all inside one
/// transaction.
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Creates a new PostgreSQL record store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn lock_and_read(
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        key: &str,
    ) -> Result<Option<Item>> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("{table}/{key}"))
            .execute(&mut **tx)
            .await?;

        let current: Option<sqlx::types::Json<Item>> = sqlx::query_scalar(
            "SELECT item FROM records WHERE table_name = $1 AND record_key = $2",
        )
        .bind(table)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(current.map(|json| json.0))
    }

    async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        key: &str,
        item: &Item,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO records (table_name, record_key, item, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (table_name, record_key) DO UPDATE SET
                item = EXCLUDED.item,
                updated_at = NOW()
            "#,
        )
        .bind(table)
        .bind(key)
        .bind(sqlx::types::Json(item))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Item>> {
        let item: Option<sqlx::types::Json<Item>> = sqlx::query_scalar(
            "SELECT item FROM records WHERE table_name = $1 AND record_key = $2",
        )
        .bind(table)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item.map(|json| json.0))
    }

    #[tracing::instrument(skip(self, item, condition))]
    async fn put(
        &self,
        table: &str,
        key: &str,
        item: Item,
        condition: Option<Condition>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if condition.is_some() {
            let current = Self::lock_and_read(&mut tx, table, key).await?;
            check_condition(table, key, &current, condition.as_ref())?;
        }

        Self::upsert(&mut tx, table, key, &item).await?;
        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, update, condition))]
    async fn update(
        &self,
        table: &str,
        key: &str,
        update: UpdateExpression,
        condition: Option<Condition>,
    ) -> Result<Item> {
        let mut tx = self.pool.begin().await?;

        let current = Self::lock_and_read(&mut tx, table, key).await?;
        check_condition(table, key, &current, condition.as_ref())?;

        let mut next = current.unwrap_or_default();
        update.apply(table, key, &mut next)?;

        Self::upsert(&mut tx, table, key, &next).await?;
        tx.commit().await?;
        Ok(next)
    }

    async fn scan(&self, table: &str) -> Result<Vec<Item>> {
        let items: Vec<sqlx::types::Json<Item>> = sqlx::query_scalar(
            "SELECT item FROM records WHERE table_name = $1 ORDER BY record_key ASC",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        Ok(items.into_iter().map(|json| json.0).collect())
    }
}
