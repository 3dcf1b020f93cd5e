use crate::engine::Engine;
use crate::error::DbError;
use crate::identity::{IdentityKey, IdentityMap};
use crate::record::{Record, Value, bind_values, insert_sql, select_by_pk_sql};
use sqlx::any::{Any, AnyRow};
use sqlx::{AnyConnection, FromRow, Transaction};
use std::any::Any as StdAny;
use std::fmt;
use std::thread::{self, ThreadId};
use uuid::Uuid;

/// How sessions produced by a factory behave.
///
/// The default is the unit-of-work profile used by the application:
/// nothing is committed, flushed or expired behind the caller's back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Run every statement on its own pooled connection, outside any transaction.
    pub autocommit: bool,
    /// Flush pending additions before each statement.
    pub autoflush: bool,
    /// Mark loaded objects stale after commit so the next access reloads them.
    pub expire_on_commit: bool,
}

impl SessionOptions {
    pub fn autocommit(mut self, enabled: bool) -> Self {
        self.autocommit = enabled;
        self
    }

    pub fn autoflush(mut self, enabled: bool) -> Self {
        self.autoflush = enabled;
        self
    }

    pub fn expire_on_commit(mut self, enabled: bool) -> Self {
        self.expire_on_commit = enabled;
        self
    }
}

struct PendingInsert {
    key: IdentityKey,
    sql: String,
    values: Vec<Value>,
    object: Box<dyn StdAny + Send>,
}

/// One unit of work against the database.
///
/// A session borrows a pooled connection the first time it issues a
/// statement and keeps it, inside one transaction, until `commit`,
/// `rollback` or `close`. It should be closed explicitly; dropping an open
/// session logs a warning, counts it as closed and lets the pool discard the
/// transaction.
pub struct Session {
    id: Uuid,
    engine: Engine,
    options: SessionOptions,
    origin: ThreadId,
    tx: Option<Transaction<'static, Any>>,
    pending: Vec<PendingInsert>,
    identity: IdentityMap,
    statements: u64,
    closed: bool,
}

impl Session {
    pub(crate) fn new(engine: Engine, options: SessionOptions) -> Self {
        engine.record_open();
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, "Session opened.");
        Self {
            id,
            engine,
            options,
            origin: thread::current().id(),
            tx: None,
            pending: Vec::new(),
            identity: IdentityMap::default(),
            statements: 0,
            closed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether a transaction (and so a pooled connection) is currently held.
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Additions waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Data statements sent to the database so far.
    pub fn statement_count(&self) -> u64 {
        self.statements
    }

    /// Whether `pk` of `M` can be served from the session without a query.
    pub fn is_loaded<M: Record>(&self, pk: i64) -> bool {
        self.identity
            .get_fresh::<M>(&IdentityKey::of::<M>(pk))
            .is_some()
    }

    /// Runs a statement and returns the number of rows it affected.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        self.ensure_usable()?;
        self.autoflush().await?;
        self.execute_raw(sql, params).await
    }

    pub async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<AnyRow>, DbError> {
        self.ensure_usable()?;
        self.autoflush().await?;

        let query = bind_values(sqlx::query(sql), params);
        let rows = if self.options.autocommit {
            query.fetch_all(self.engine.pool()).await?
        } else {
            query.fetch_all(self.connection().await?).await?
        };
        self.statements += 1;
        Ok(rows)
    }

    pub async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<AnyRow>, DbError> {
        self.ensure_usable()?;
        self.autoflush().await?;
        self.fetch_optional_raw(sql, params).await
    }

    /// Schedules `record` for insertion on the next flush.
    pub fn add<M: Record>(&mut self, record: M) -> Result<(), DbError> {
        self.ensure_usable()?;
        self.pending.push(PendingInsert {
            key: IdentityKey::of::<M>(record.primary_key()),
            sql: insert_sql::<M>(),
            values: record.values(),
            object: Box::new(record),
        });
        Ok(())
    }

    /// Sends pending additions inside the current transaction.
    pub async fn flush(&mut self) -> Result<(), DbError> {
        self.ensure_usable()?;
        self.flush_pending().await
    }

    /// Looks `pk` up in the session first and only queries when the object
    /// is unknown or expired.
    pub async fn get<M: Record>(&mut self, pk: i64) -> Result<Option<M>, DbError> {
        self.ensure_usable()?;
        let key = IdentityKey::of::<M>(pk);
        if let Some(record) = self.identity.get_fresh::<M>(&key) {
            return Ok(Some(record));
        }

        self.autoflush().await?;
        let row = self
            .fetch_optional_raw(&select_by_pk_sql::<M>(), &[Value::Int(pk)])
            .await?;

        match row {
            Some(row) => {
                let record = M::from_row(&row)?;
                self.identity.insert(key, Box::new(record.clone()));
                Ok(Some(record))
            }
            None => {
                self.identity.remove(&key);
                Ok(None)
            }
        }
    }

    /// Flushes, then commits the open transaction and releases its connection.
    pub async fn commit(&mut self) -> Result<(), DbError> {
        self.ensure_usable()?;
        self.flush_pending().await?;

        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            tracing::debug!(session = %self.id, "Transaction committed.");
        }
        if self.options.expire_on_commit {
            self.identity.expire_all();
        }
        Ok(())
    }

    /// Discards pending additions and rolls the open transaction back.
    pub async fn rollback(&mut self) -> Result<(), DbError> {
        self.ensure_usable()?;
        self.pending.clear();
        self.identity.expire_all();

        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            tracing::debug!(session = %self.id, "Transaction rolled back.");
        }
        Ok(())
    }

    /// Marks every held object stale.
    pub fn expire_all(&mut self) {
        self.identity.expire_all();
    }

    /// Releases the session. Calling it again is a no-op.
    ///
    /// Anything not committed is rolled back. Closing is allowed from any
    /// thread and always counts the session as closed, even when the
    /// rollback itself fails.
    pub async fn close(&mut self) -> Result<(), DbError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.pending.clear();
        self.identity.clear();

        let result = match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(DbError::from),
            None => Ok(()),
        };
        self.engine.record_close();
        tracing::debug!(session = %self.id, statements = self.statements, "Session closed.");
        result
    }

    fn ensure_usable(&self) -> Result<(), DbError> {
        if self.closed {
            return Err(DbError::SessionClosed(self.id));
        }
        if self.engine.enforces_same_thread() && thread::current().id() != self.origin {
            return Err(DbError::CrossThread(self.id));
        }
        Ok(())
    }

    async fn autoflush(&mut self) -> Result<(), DbError> {
        if self.options.autoflush {
            self.flush_pending().await?;
        }
        Ok(())
    }

    async fn flush_pending(&mut self) -> Result<(), DbError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let count = self.pending.len();
        let mut pending = std::mem::take(&mut self.pending).into_iter();
        while let Some(insert) = pending.next() {
            if let Err(e) = self.execute_raw(&insert.sql, &insert.values).await {
                // Keep what was not written so a rollback can discard it.
                self.pending.push(insert);
                self.pending.extend(pending);
                return Err(e);
            }
            self.identity.insert(insert.key, insert.object);
        }
        tracing::debug!(session = %self.id, count, "Flushed pending additions.");
        Ok(())
    }

    async fn execute_raw(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let query = bind_values(sqlx::query(sql), params);
        let result = if self.options.autocommit {
            query.execute(self.engine.pool()).await?
        } else {
            query.execute(self.connection().await?).await?
        };
        self.statements += 1;
        Ok(result.rows_affected())
    }

    async fn fetch_optional_raw(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<AnyRow>, DbError> {
        let query = bind_values(sqlx::query(sql), params);
        let row = if self.options.autocommit {
            query.fetch_optional(self.engine.pool()).await?
        } else {
            query.fetch_optional(self.connection().await?).await?
        };
        self.statements += 1;
        Ok(row)
    }

    /// The connection of the open transaction, beginning one if needed.
    async fn connection(&mut self) -> Result<&mut AnyConnection, DbError> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                let tx = self.engine.pool().begin().await?;
                tracing::debug!(session = %self.id, "Transaction begun.");
                tx
            }
        };
        Ok(&mut **self.tx.insert(tx))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("in_transaction", &self.tx.is_some())
            .field("pending", &self.pending.len())
            .field("identity", &self.identity.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.engine.record_close();
            tracing::warn!(
                session = %self.id,
                in_transaction = self.tx.is_some(),
                pending = self.pending.len(),
                "Session dropped without close; uncommitted work is discarded."
            );
        }
    }
}
