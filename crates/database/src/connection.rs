use crate::engine::{Backend, ConnectArgs, Engine};
use crate::error::DbError;
use crate::factory::SessionFactory;
use configuration::DatabaseSettings;

/// Builds the process-wide engine for `settings.url`.
///
/// The connect arguments follow from the URL scheme: embedded SQLite gets the
/// same-thread check disabled, networked backends are left at their defaults.
/// Parse errors and unsupported schemes are returned as-is; there is no retry.
pub fn create_engine(settings: &DatabaseSettings) -> Result<Engine, DbError> {
    let backend = Backend::from_url(&settings.url)?;
    Engine::new(settings, ConnectArgs::for_backend(backend))
}

/// Creates the engine and binds the application's session factory to it.
///
/// Call this once during startup and pass the factory to whatever runs units
/// of work. It must be called from within a Tokio runtime.
pub fn connect(settings: &DatabaseSettings) -> Result<SessionFactory, DbError> {
    let engine = create_engine(settings)?;
    Ok(SessionFactory::new(engine))
}
