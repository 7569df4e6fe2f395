//! Bridge facade: the single entry point callers use to move rows between
//! the database and the in-memory model. Owns the pool handle, the
//! statement cache, and the transaction discipline around every mutation.

use crate::config::DbConfig;
use crate::error::{classify, BridgeError};
use crate::reconstruct::{reconstruct, RawRow};
use crate::schema::{Row, SchemaRegistry, TableDescriptor};
use crate::sql::{self, alias, SqlValue, StatementCache, StatementKind};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool};
use sqlx::query::Query;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Operations exposed to the HTTP layer (and other callers). Mutations
/// return explicit results; every failure has already been rolled back and
/// logged by the time the caller sees the error.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn select_single(
        &self,
        table: &Arc<TableDescriptor>,
        id: i64,
    ) -> Result<Option<Row>, BridgeError>;

    async fn select_all(&self, table: &Arc<TableDescriptor>) -> Result<Vec<Row>, BridgeError>;

    /// Two-phase insert: the permission record first, then the owner row,
    /// in one transaction. Captured auto-increment ids are written back.
    async fn insert(&self, row: &mut Row, permission: &mut Row) -> Result<(), BridgeError>;

    async fn update(&self, row: &mut Row) -> Result<(), BridgeError>;

    /// Removes the row and then its permission record, one transaction.
    async fn delete(&self, row: &Row) -> Result<(), BridgeError>;

    /// False without touching the database when the primary key is unset.
    async fn row_exist(&self, row: &Row) -> Result<bool, BridgeError>;

    async fn declare_table(&self, table: &TableDescriptor) -> Result<(), BridgeError>;

    /// Table names already present in the database's schema catalog.
    async fn declared_tables(&self) -> Result<Vec<String>, BridgeError>;
}

pub struct MySqlBridge {
    pool: MySqlPool,
    database: String,
    cache: StatementCache,
}

fn bind_values<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
    for v in values {
        query = query.bind(SqlValue::from_json(v));
    }
    query
}

fn begin_error(e: sqlx::Error) -> BridgeError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => BridgeError::Acquire(e),
        other => BridgeError::Transaction(other),
    }
}

impl MySqlBridge {
    pub fn new(pool: MySqlPool, database: impl Into<String>) -> Self {
        MySqlBridge {
            pool,
            database: database.into(),
            cache: StatementCache::new(),
        }
    }

    /// Build the pool from config and wrap it.
    pub async fn connect(config: &DbConfig) -> Result<Self, BridgeError> {
        let pool = config.connect().await?;
        Ok(Self::new(pool, config.database.clone()))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Declare the permission table, then every registered table that the
    /// schema catalog does not already list, in registration order (which
    /// is also foreign-key dependency order).
    pub async fn declare_all(&self, registry: &SchemaRegistry) -> Result<(), BridgeError> {
        let declared = self.declared_tables().await?;
        if !declared.iter().any(|n| n == registry.permission().name()) {
            self.declare_table(registry.permission()).await?;
        }
        for table in registry.tables() {
            if declared.iter().any(|n| n == table.name()) {
                continue;
            }
            self.declare_table(table).await?;
        }
        Ok(())
    }

    /// Fill every one-to-many collection of `row`, recursively: one query
    /// per relation, each child reconstructed and expanded in turn. The
    /// collection is replaced wholesale, so re-expansion never appends.
    pub async fn expand(&self, row: &mut Row) -> Result<(), BridgeError> {
        self.expand_inner(row).await
    }

    fn expand_inner<'a>(
        &'a self,
        row: &'a mut Row,
    ) -> Pin<Box<dyn Future<Output = Result<(), BridgeError>> + Send + 'a>> {
        Box::pin(async move {
            if row.table().one_to_many().is_empty() {
                return Ok(());
            }
            let pk = row
                .primary_key()
                .ok_or_else(|| BridgeError::PrimaryKeyUnset(row.table().name().to_string()))?;
            for index in 0..row.table().one_to_many().len() {
                let relation = row.table().one_to_many()[index].clone();
                let key = format!("{}#{}", row.table().name(), relation.name);
                let stmt = self
                    .cache
                    .get_or_build(&key, StatementKind::ChildSelect, || {
                        sql::child_select(&relation)
                    });
                tracing::debug!(sql = %stmt, parent = pk, "expand");
                let rows = sqlx::query(&stmt)
                    .bind(pk)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(classify)?;
                let mut children = Vec::with_capacity(rows.len());
                for raw in rows.iter().map(RawRow::from_sql_row) {
                    let mut child = reconstruct(
                        &raw,
                        &relation.ref_table,
                        alias::root(relation.ref_table.name()),
                    )?;
                    self.expand_inner(&mut child).await?;
                    children.push(child);
                }
                row.set_children(index, children);
            }
            Ok(())
        })
    }

    async fn insert_in_tx(
        &self,
        tx: &mut sqlx::MySqlConnection,
        row: &mut Row,
        permission: &mut Row,
    ) -> Result<(), BridgeError> {
        let perm_table = permission.table().clone();
        let stmt = self
            .cache
            .get_or_build(perm_table.name(), StatementKind::Insert, || {
                sql::insert(&perm_table)
            });
        let values = permission.insert_values()?;
        tracing::debug!(sql = %stmt, table = perm_table.name(), "insert");
        let result = bind_values(sqlx::query(&stmt), &values)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        if permission.primary_key().is_none() {
            permission.set_primary_key(result.last_insert_id() as i64)?;
        }
        row.attach_permission(permission.clone())?;

        let table = row.table().clone();
        let stmt = self
            .cache
            .get_or_build(table.name(), StatementKind::Insert, || sql::insert(&table));
        let values = row.insert_values()?;
        tracing::debug!(sql = %stmt, table = table.name(), "insert");
        let result = bind_values(sqlx::query(&stmt), &values)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        if row.primary_key().is_none() {
            row.set_primary_key(result.last_insert_id() as i64)?;
        }
        Ok(())
    }

    async fn delete_in_tx(
        &self,
        tx: &mut sqlx::MySqlConnection,
        row: &Row,
    ) -> Result<(), BridgeError> {
        let table = row.table().clone();
        let pk = row
            .primary_key()
            .ok_or_else(|| BridgeError::PrimaryKeyUnset(table.name().to_string()))?;
        let stmt = self
            .cache
            .get_or_build(table.name(), StatementKind::Delete, || sql::delete(&table));
        tracing::debug!(sql = %stmt, table = table.name(), id = pk, "delete");
        sqlx::query(&stmt)
            .bind(pk)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        // The owner goes first; its FK on the permission row is gone now.
        if let (Some(perm_col), Some(perm_key)) =
            (table.permission_column(), row.permission_key())
        {
            if let Some(perm_table) = perm_col.direct_ref().cloned() {
                let stmt = self
                    .cache
                    .get_or_build(perm_table.name(), StatementKind::Delete, || {
                        sql::delete(&perm_table)
                    });
                tracing::debug!(sql = %stmt, table = perm_table.name(), id = perm_key, "delete");
                sqlx::query(&stmt)
                    .bind(perm_key)
                    .execute(&mut *tx)
                    .await
                    .map_err(classify)?;
            }
        }
        Ok(())
    }

    /// Rollback, log, and hand the original error back. Rollback-before-
    /// return is a hard invariant on every mutating path.
    async fn fail_tx(
        &self,
        tx: sqlx::Transaction<'static, MySql>,
        table: &str,
        op: &'static str,
        error: BridgeError,
    ) -> BridgeError {
        if let Err(e) = tx.rollback().await {
            tracing::warn!(table, op, error = %e, "rollback failed");
        }
        tracing::error!(table, op, error = %error, "operation rolled back");
        error
    }
}

#[async_trait]
impl Bridge for MySqlBridge {
    async fn select_single(
        &self,
        table: &Arc<TableDescriptor>,
        id: i64,
    ) -> Result<Option<Row>, BridgeError> {
        let stmt = self
            .cache
            .get_or_build(table.name(), StatementKind::SelectSingle, || {
                sql::select_single(table)
            });
        tracing::debug!(sql = %stmt, id, "select single");
        let raw = sqlx::query(&stmt)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let mut row = reconstruct(&RawRow::from_sql_row(&raw), table, alias::root(table.name()))?;
        self.expand(&mut row).await?;
        Ok(Some(row))
    }

    async fn select_all(&self, table: &Arc<TableDescriptor>) -> Result<Vec<Row>, BridgeError> {
        let stmt = self
            .cache
            .get_or_build(table.name(), StatementKind::SelectAll, || {
                sql::select_all(table)
            });
        tracing::debug!(sql = %stmt, "select all");
        let raws = sqlx::query(&stmt)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        let mut rows = Vec::with_capacity(raws.len());
        for raw in &raws {
            let mut row =
                reconstruct(&RawRow::from_sql_row(raw), table, alias::root(table.name()))?;
            self.expand(&mut row).await?;
            rows.push(row);
        }
        Ok(rows)
    }

    async fn insert(&self, row: &mut Row, permission: &mut Row) -> Result<(), BridgeError> {
        let mut tx = self.pool.begin().await.map_err(begin_error)?;
        match self.insert_in_tx(&mut tx, row, permission).await {
            Ok(()) => tx.commit().await.map_err(BridgeError::Transaction)?,
            Err(e) => {
                return Err(self.fail_tx(tx, row.table().name(), "insert", e).await);
            }
        }
        // Freshly inserted rows have no children yet, but expansion still
        // runs so the collections reflect the database uniformly.
        self.expand(row).await
    }

    async fn update(&self, row: &mut Row) -> Result<(), BridgeError> {
        let table = row.table().clone();
        let values = row.update_values()?;
        let stmt = self
            .cache
            .get_or_build(table.name(), StatementKind::Update, || sql::update(&table));
        let mut tx = self.pool.begin().await.map_err(begin_error)?;
        tracing::debug!(sql = %stmt, table = table.name(), "update");
        let executed = bind_values(sqlx::query(&stmt), &values)
            .execute(&mut *tx)
            .await
            .map_err(classify);
        match executed {
            Ok(_) => tx.commit().await.map_err(BridgeError::Transaction)?,
            Err(e) => {
                return Err(self.fail_tx(tx, table.name(), "update", e).await);
            }
        }
        self.expand(row).await
    }

    async fn delete(&self, row: &Row) -> Result<(), BridgeError> {
        let mut tx = self.pool.begin().await.map_err(begin_error)?;
        match self.delete_in_tx(&mut tx, row).await {
            Ok(()) => tx.commit().await.map_err(BridgeError::Transaction),
            Err(e) => Err(self.fail_tx(tx, row.table().name(), "delete", e).await),
        }
    }

    async fn row_exist(&self, row: &Row) -> Result<bool, BridgeError> {
        use sqlx::Row as _;
        let Some(pk) = row.primary_key() else {
            return Ok(false);
        };
        let table = row.table().clone();
        let stmt = self
            .cache
            .get_or_build(table.name(), StatementKind::Exists, || sql::exists(&table));
        let mut tx = self.pool.begin().await.map_err(begin_error)?;
        tracing::debug!(sql = %stmt, id = pk, "row exist");
        let fetched = sqlx::query(&stmt)
            .bind(pk)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify);
        match fetched {
            Ok(raw) => {
                tx.commit().await.map_err(BridgeError::Transaction)?;
                Ok(raw.try_get::<i64, _>("x").map(|x| x == 1).unwrap_or(false))
            }
            Err(e) => Err(self.fail_tx(tx, table.name(), "row_exist", e).await),
        }
    }

    async fn declare_table(&self, table: &TableDescriptor) -> Result<(), BridgeError> {
        let stmt = self
            .cache
            .get_or_build(table.name(), StatementKind::CreateTable, || {
                sql::create_table(table, &[])
            });
        tracing::info!(table = table.name(), "declare table");
        let mut tx = self.pool.begin().await.map_err(begin_error)?;
        let executed = sqlx::query(&stmt).execute(&mut *tx).await.map_err(classify);
        match executed {
            Ok(_) => tx.commit().await.map_err(BridgeError::Transaction),
            Err(e) => Err(self.fail_tx(tx, table.name(), "declare_table", e).await),
        }
    }

    async fn declared_tables(&self) -> Result<Vec<String>, BridgeError> {
        use sqlx::Row as _;
        let rows = sqlx::query(
            "SELECT table_name AS name FROM information_schema.tables WHERE table_schema = ?",
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("name").map_err(BridgeError::Db))
            .collect()
    }
}
