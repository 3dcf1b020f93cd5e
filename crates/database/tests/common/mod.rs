#![allow(dead_code)]

use configuration::DatabaseSettings;
use database::{ConnectArgs, DbError, Engine, Record, SessionFactory, SessionOptions, Value};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub balance: i64,
}

impl Account {
    pub fn new(id: i64, owner: &str, balance: i64) -> Self {
        Self {
            id,
            owner: owner.to_string(),
            balance,
        }
    }
}

impl Record for Account {
    const TABLE: &'static str = "accounts";
    const COLUMNS: &'static [&'static str] = &["id", "owner", "balance"];

    fn primary_key(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.id.into(),
            self.owner.clone().into(),
            self.balance.into(),
        ]
    }
}

/// A file-backed SQLite database that lives as long as the returned directory.
pub struct TestDb {
    pub dir: TempDir,
    pub settings: DatabaseSettings,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let settings = DatabaseSettings::new(format!("sqlite://{}?mode=rwc", path.display()));
        Self { dir, settings }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.settings.pool.max_connections = max;
        self
    }

    /// The application's factory, built the way startup builds it.
    pub async fn factory(&self) -> SessionFactory {
        let factory = database::connect(&self.settings).unwrap();
        create_schema(&factory).await;
        factory
    }

    pub async fn factory_with(&self, options: SessionOptions) -> SessionFactory {
        let engine = database::create_engine(&self.settings).unwrap();
        let factory = SessionFactory::with_options(engine, options);
        create_schema(&factory).await;
        factory
    }

    pub async fn factory_with_args(&self, args: ConnectArgs) -> SessionFactory {
        let engine = Engine::new(&self.settings, args).unwrap();
        let factory = SessionFactory::new(engine);
        create_schema(&factory).await;
        factory
    }
}

async fn create_schema(factory: &SessionFactory) {
    factory
        .scope(|session| {
            Box::pin(async move {
                session
                    .execute(
                        "CREATE TABLE IF NOT EXISTS accounts (
                            id INTEGER PRIMARY KEY,
                            owner TEXT NOT NULL,
                            balance INTEGER NOT NULL
                        )",
                        &[],
                    )
                    .await?;
                session.commit().await?;
                Ok::<_, DbError>(())
            })
        })
        .await
        .unwrap();
}

/// Inserts and commits one account in its own unit of work.
pub async fn seed(factory: &SessionFactory, account: Account) {
    factory
        .scope(|session| {
            Box::pin(async move {
                session.add(account)?;
                session.commit().await?;
                Ok::<_, DbError>(())
            })
        })
        .await
        .unwrap();
}

/// Counts accounts from a fresh unit of work.
pub async fn count_accounts(factory: &SessionFactory) -> i64 {
    factory
        .scope(|session| {
            Box::pin(async move {
                let rows = session.fetch_all("SELECT id FROM accounts", &[]).await?;
                Ok::<_, DbError>(rows.len() as i64)
            })
        })
        .await
        .unwrap()
}
