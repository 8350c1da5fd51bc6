use sea_orm_migration::MigratorTrait;
use tracing::info;

use storefront_api::{config, db, migrator::Migrator};

/// Applies pending migrations, or rolls back the last one with `down`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("Starting database migration");
    let pool = db::establish_connection_from_app_config(&cfg).await?;

    match std::env::args().nth(1).as_deref() {
        Some("down") => {
            Migrator::down(&pool, Some(1)).await?;
            info!("Rolled back the last migration");
        }
        Some("status") => Migrator::status(&pool).await?,
        _ => {
            db::run_migrations(&pool).await?;
            info!("Migration completed successfully");
        }
    }

    Ok(())
}
