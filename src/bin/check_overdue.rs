//! Send reminders for overdue loans. Meant to run once a day from cron.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

use borrowedwords_server::{
    clock::{Clock, SystemClock},
    config::AppConfig,
    init_tracing,
    repository::Repository,
    services::{self, Services},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    let clock = Arc::new(SystemClock);
    let today = clock.today();
    let services = Services::new(Repository::new(pool), services::notifier_for(&config.email), clock);

    let sent = services
        .overdue
        .send_reminders(today)
        .await
        .context("Failed to list overdue transactions")?;

    tracing::info!("Overdue check for {} done, {} reminders sent", today, sent);
    Ok(())
}
