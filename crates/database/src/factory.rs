use crate::engine::Engine;
use crate::error::DbError;
use crate::session::{Session, SessionOptions};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::panic::{self, AssertUnwindSafe};

/// Produces fresh sessions bound to one engine.
///
/// Build it once at startup and hand clones to whatever needs database
/// access; every clone shares the engine.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    engine: Engine,
    options: SessionOptions,
}

impl SessionFactory {
    /// A factory with the default unit-of-work options: no autocommit,
    /// no autoflush, no expire-on-commit.
    pub fn new(engine: Engine) -> Self {
        Self::with_options(engine, SessionOptions::default())
    }

    pub fn with_options(engine: Engine, options: SessionOptions) -> Self {
        Self { engine, options }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// A new session. The caller owns it and must `close` it.
    pub fn open(&self) -> Session {
        Session::new(self.engine.clone(), self.options)
    }

    /// Lends a fresh session to `work` and closes it afterwards, whatever
    /// the outcome.
    ///
    /// Nothing is committed or rolled back on the caller's behalf beyond what
    /// closing implies: uncommitted work is discarded. An error from `work`
    /// is returned unchanged; a close failure only surfaces when `work`
    /// succeeded. A panic in `work`, including one raised before it returns
    /// its future, is resumed after the session is closed. If the returned
    /// future is dropped mid-work the session is released by its `Drop`.
    ///
    /// ```ignore
    /// let total: i64 = factory
    ///     .scope(|session| Box::pin(async move {
    ///         let row = session.fetch_optional("SELECT SUM(balance) FROM accounts", &[]).await?;
    ///         Ok::<_, DbError>(row.map(|r| r.get(0)).unwrap_or(0))
    ///     }))
    ///     .await?;
    /// ```
    pub async fn scope<F, T, E>(&self, work: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, E>>,
        E: From<DbError>,
    {
        let mut session = self.open();
        let outcome = AssertUnwindSafe(async { work(&mut session).await })
            .catch_unwind()
            .await;
        let closed = session.close().await;

        match outcome {
            Ok(Ok(value)) => {
                closed?;
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(close_err) = closed {
                    tracing::warn!(
                        session = %session.id(),
                        error = %close_err,
                        "Failed to close session after the unit of work failed."
                    );
                }
                Err(err)
            }
            Err(payload) => {
                if let Err(close_err) = closed {
                    tracing::warn!(
                        session = %session.id(),
                        error = %close_err,
                        "Failed to close session after the unit of work panicked."
                    );
                }
                panic::resume_unwind(payload)
            }
        }
    }
}
