use crate::{
    api::{self, AppState, StateParts},
    audit::{
        email::{self, EmailQueue, LogEmailSender},
        geo::{GeoLookup, HttpGeoLookup, NoopGeoLookup},
    },
    cleanup,
    keys::KeyManager,
    rate_limit::{RateLimiter, IDLE_EVICTION, SWEEP_INTERVAL},
    settings::{AppSettings, SettingsValues},
    store::{postgres::PgStore, Stores},
    webauthn::verifier::WebauthnVerifier,
};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub app_url: Url,
    pub app_name: String,
    pub keys_path: PathBuf,
    pub session_duration_minutes: u32,
    pub email_login_notification: bool,
    pub emails_verified: bool,
    pub geo_url: Option<Url>,
    pub test_mode: bool,
}

async fn stores(dsn: Option<&str>) -> Result<Stores> {
    let Some(dsn) = dsn else {
        warn!("No DSN configured, data is kept in memory only");
        return Ok(Stores::in_memory());
    };

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    let store = PgStore::new(pool);
    store.apply_schema().await?;
    Ok(Stores::from_backend(Arc::new(store)))
}

/// Execute the server action.
/// # Errors
/// Returns an error if storage, signing keys or the listener cannot be set up.
pub async fn execute(args: Args) -> Result<()> {
    let stores = stores(args.dsn.as_deref()).await?;

    let keys = Arc::new(
        KeyManager::ensure(&args.keys_path).context("Failed to load token signing keys")?,
    );

    let settings = Arc::new(AppSettings::new(SettingsValues {
        app_name: args.app_name.clone(),
        session_duration_minutes: args.session_duration_minutes,
        email_login_notification: args.email_login_notification,
        emails_verified: args.emails_verified,
    }));

    let verifier = Arc::new(WebauthnVerifier::new(&args.app_url, &args.app_name)?);

    let geo: Arc<dyn GeoLookup> = match args.geo_url {
        Some(url) => Arc::new(HttpGeoLookup::new(url)?),
        None => Arc::new(NoopGeoLookup),
    };

    let (emails, outbox) = EmailQueue::channel(email::DEFAULT_QUEUE_CAPACITY);
    let email_worker = email::spawn_worker(outbox, Arc::new(LogEmailSender));

    let rate_limiter = Arc::new(if args.test_mode {
        warn!("Test mode: rate limiting disabled");
        RateLimiter::disabled()
    } else {
        RateLimiter::new()
    });
    let sweeper = rate_limiter.spawn_sweeper(SWEEP_INTERVAL, IDLE_EVICTION);
    let cleanup = cleanup::spawn(stores.clone(), cleanup::CLEANUP_INTERVAL);

    let state = AppState::new(StateParts {
        stores,
        keys,
        settings,
        app_url: args.app_url,
        verifier,
        geo,
        emails: Some(emails),
        rate_limiter,
    })?;

    let served = api::new(args.port, state).await;

    sweeper.shutdown().await;
    cleanup.shutdown().await;
    email_worker.abort();
    info!("Background jobs stopped");

    served
}
