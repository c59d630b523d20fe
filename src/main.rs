use anyhow::Context as _;
use clap::Parser as _;
use dotenvy::dotenv;
use tracing::info;

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Rollback the specified number of migrations and run all migrations again.
    #[arg(long, num_args = 0..=1, default_missing_value = "1")]
    refresh_migrations: Option<u32>,
}

/// Database bootstrap for the points engine. The engine itself is embedded
/// as a library by the gateway process; this binary only prepares (or
/// refreshes) the schema the services expect.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::fmt::init();

    info!("Preparing guild points database...");

    let db = guild_points::db::establish_connection()
        .await
        .context("Failed to connect to database")?;

    use sea_orm_migration::MigratorTrait;
    if let Some(depth) = args.refresh_migrations {
        info!("Refreshing migrations (down {}, then up)...", depth);
        guild_points::db::migrations::Migrator::down(&db, Some(depth))
            .await
            .context("Failed to rollback migration")?;
    }

    guild_points::db::migrations::Migrator::up(&db, None)
        .await
        .context("Failed to run migrations")?;

    info!("Database schema is up to date.");
    Ok(())
}
