//! `db` sub-commands: connectivity check, migrations, and sample data.

use clap::Subcommand;
use diwali_core::AppConfig;

#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check that the database answers
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Insert sample orders and visitor sessions (skipped when already present)
    Seed,
}

/// Connect with the configured pool settings and run one `db` command.
///
/// # Errors
///
/// Returns an error if the pool cannot be created or the command fails.
pub(crate) async fn run(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool_config = diwali_db::PoolConfig::from_app_config(config);
    let pool = diwali_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        DbCommands::Ping => {
            diwali_db::health_check(&pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = diwali_db::run_migrations(&pool).await?;
            tracing::info!(applied, "migrations applied");
            println!("applied {applied} migration(s)");
        }
        DbCommands::Seed => {
            let inserted = diwali_db::seed_sample_data(&pool).await?;
            if inserted == 0 {
                println!("sample data already present; nothing inserted");
            } else {
                println!("inserted {inserted} sample order(s)");
            }
        }
    }

    pool.close().await;
    Ok(())
}
