pub(crate) mod models;
pub(crate) mod types;

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};

use crate::core::config::Settings;

pub(crate) fn connect_options(settings: &Settings) -> Result<PgConnectOptions, sqlx::Error> {
    let database_url = settings.database().database_url();
    let connect_options: PgConnectOptions = database_url.parse()?;

    Ok(connect_options
        .application_name("exam-connect")
        .log_statements(tracing::log::LevelFilter::Off))
}

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(30))
        .test_before_acquire(true)
}

pub(crate) async fn init_pool(settings: &Settings) -> Result<PgPool, sqlx::Error> {
    pool_options().connect_with(connect_options(settings)?).await
}

/// Pool that opens its first connection on first use.
pub(crate) fn lazy_pool(options: PgConnectOptions) -> PgPool {
    pool_options().connect_lazy_with(options)
}

pub(crate) async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
