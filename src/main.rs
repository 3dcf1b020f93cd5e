use anyhow::Context;
use clap::{Parser, Subcommand};
use configuration::Overrides;
use database::{DbError, SessionFactory};
use sqlx::Row;

/// The main entry point: configuration, logging, engine and session factory
/// are built exactly once here and then handed to the command.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    let config = configuration::load_config_with(&cli.overrides)
        .context("Failed to load configuration")?;
    let _log_guard = configuration::init_tracing(&config.logging)?;

    // Any failure here is fatal: there is no retry on a bad connection string.
    let factory = database::connect(&config.database)
        .context("Failed to create the database engine")?;

    // Execute the appropriate command
    match cli.command {
        Commands::Check => handle_check(&factory).await?,
        Commands::Exec(args) => handle_exec(&factory, args).await?,
    }

    let stats = factory.engine().stats();
    tracing::info!(
        opened = stats.sessions_opened,
        closed = stats.sessions_closed,
        "Done."
    );
    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Database session tooling: verifies connectivity and runs one-off statements.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open one unit of work and run a trivial query against the database.
    Check,
    /// Run a single statement in one unit of work.
    Exec(ExecArgs),
}

#[derive(Parser)]
struct ExecArgs {
    /// The SQL statement to execute.
    statement: String,

    /// Commit the unit of work. Without this flag the change is discarded.
    #[arg(long)]
    commit: bool,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_check(factory: &SessionFactory) -> anyhow::Result<()> {
    let engine = factory.engine();
    println!("Backend:  {}", engine.backend());
    println!("URL:      {}", engine.display_url());

    let answer: i64 = factory
        .scope(|session| {
            Box::pin(async move {
                let row = session.fetch_optional("SELECT CAST(1 AS BIGINT)", &[]).await?;
                Ok::<_, DbError>(row.map(|r| r.get::<i64, _>(0)).unwrap_or_default())
            })
        })
        .await
        .context("Connectivity check failed")?;

    anyhow::ensure!(answer == 1, "unexpected answer from the database: {answer}");
    println!("Status:   OK");
    Ok(())
}

async fn handle_exec(factory: &SessionFactory, args: ExecArgs) -> anyhow::Result<()> {
    let commit = args.commit;
    let affected = factory
        .scope(|session| {
            Box::pin(async move {
                let affected = session.execute(&args.statement, &[]).await?;
                if commit {
                    session.commit().await?;
                }
                Ok::<_, DbError>(affected)
            })
        })
        .await?;

    if commit {
        println!("{affected} row(s) affected, committed.");
    } else {
        println!("{affected} row(s) affected, discarded (pass --commit to keep).");
    }
    Ok(())
}
