//! agent-billing server
//!
//! Loads configuration, connects to Postgres, wires the adapters into the
//! handlers and serves the HTTP API until Ctrl-C or SIGTERM.

use std::sync::Arc;

use axum::Router;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use agent_billing::adapters::auth::JwtSessionValidator;
use agent_billing::adapters::crypto::AesCredentialCipher;
use agent_billing::adapters::http::{
    app_router, AccessAppState, AppState, AuthState, BillingAppState, GatePaths, GateState,
    RouterSettings,
};
use agent_billing::adapters::postgres::{
    PostgresAccountRepository, PostgresPendingRegistrationRepository, PostgresProfileRepository,
    PostgresSubscriptionRepository, PostgresUsageRepository,
};
use agent_billing::adapters::stripe::{StripeBillingAdapter, StripeConfig};
use agent_billing::application::handlers::access::{CheckAccessHandler, CheckUsageHandler};
use agent_billing::application::handlers::registration::CompleteRegistrationHandler;
use agent_billing::application::handlers::subscription::{
    CheckoutSettings, CreateCheckoutHandler, HandleBillingWebhookHandler, SubscriptionReconciler,
    SyncRetryPolicy, SyncSubscriptionHandler,
};
use agent_billing::config::{AppConfig, DatabaseConfig, ServerConfig};
use agent_billing::domain::subscription::StripeWebhookVerifier;
use agent_billing::ports::{
    AccountRepository, BillingProvider, CredentialCipher, PendingRegistrationRepository,
    ProfileRepository, SessionValidator, SubscriptionRepository, UsageRepository,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    info!(
        environment = %config.server.environment,
        stripe_live = config.payment.is_live_mode(),
        "Starting agent-billing v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = create_pool(&config.database).await?;
    if config.database.runs_migrations(&config.server.environment) {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations completed");
    }

    let state = build_state(&config, pool)?;
    let settings = RouterSettings {
        request_timeout: Some(config.server.request_timeout()),
        cors_origins: config.server.cors_origins_list(),
    };
    let app = app_router(state, Router::new(), &settings);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down cleanly");
    Ok(())
}

/// `RUST_LOG` wins over `server.log_level`. JSON lines in production.
fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(server.log_level.as_str()));

    if server.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, BoxError> {
    info!(
        "Connecting to database with pool size: {}-{}",
        config.min_connections, config.max_connections
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;
    info!("Database connection established");

    Ok(pool)
}

fn build_state(config: &AppConfig, pool: PgPool) -> Result<AppState, BoxError> {
    let subscriptions: Arc<dyn SubscriptionRepository> =
        Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let profiles: Arc<dyn ProfileRepository> =
        Arc::new(PostgresProfileRepository::new(pool.clone()));
    let pending: Arc<dyn PendingRegistrationRepository> =
        Arc::new(PostgresPendingRegistrationRepository::new(pool.clone()));
    let accounts: Arc<dyn AccountRepository> =
        Arc::new(PostgresAccountRepository::new(pool.clone()));
    let usage: Arc<dyn UsageRepository> = Arc::new(PostgresUsageRepository::new(pool));

    let cipher: Arc<dyn CredentialCipher> = Arc::new(AesCredentialCipher::from_base64(
        &config.registration.encryption_key(),
    )?);

    let mut stripe_config = StripeConfig::new(config.payment.api_key());
    if let Some(url) = &config.payment.api_base_url {
        stripe_config = stripe_config.with_base_url(url.clone());
    }
    let billing: Arc<dyn BillingProvider> = Arc::new(StripeBillingAdapter::new(stripe_config));

    let reconciler = Arc::new(SubscriptionReconciler::new(
        subscriptions.clone(),
        profiles.clone(),
        billing.clone(),
    ));

    if config.registration.allow_legacy_plaintext_credentials {
        tracing::warn!("Legacy plaintext registration credentials are accepted");
    }
    let registrations = Arc::new(
        CompleteRegistrationHandler::new(
            pending.clone(),
            accounts.clone(),
            profiles.clone(),
            cipher.clone(),
        )
        .with_legacy_plaintext(config.registration.allow_legacy_plaintext_credentials),
    );

    let webhook_handler = Arc::new(HandleBillingWebhookHandler::new(
        StripeWebhookVerifier::new(config.payment.webhook_secret()),
        reconciler.clone(),
        registrations,
        subscriptions.clone(),
        profiles.clone(),
        billing.clone(),
    ));

    let sync_handler = Arc::new(
        SyncSubscriptionHandler::new(
            reconciler,
            subscriptions.clone(),
            profiles.clone(),
            billing.clone(),
        )
        .with_retry(SyncRetryPolicy {
            max_attempts: config.sync.max_attempts,
            retry_delay: config.sync.retry_delay(),
        }),
    );

    let checkout_handler = Arc::new(CreateCheckoutHandler::new(
        subscriptions.clone(),
        profiles.clone(),
        accounts,
        pending,
        cipher,
        billing,
        CheckoutSettings {
            trial_price_id: config.payment.trial_price_id.clone(),
            direct_price_id: config.payment.direct_price_id.clone(),
            trial_period_days: config.payment.trial_period_days,
            success_url: config.payment.success_url.clone(),
            cancel_url: config.payment.cancel_url.clone(),
            registration_ttl_hours: config.registration.ttl_hours,
        },
    ));

    let access_handler = Arc::new(CheckAccessHandler::new(subscriptions.clone(), profiles));
    let usage_handler = Arc::new(CheckUsageHandler::new(subscriptions, usage));

    let validator: Arc<dyn SessionValidator> = Arc::new(JwtSessionValidator::new(
        &config.auth.jwt_secret(),
        config.auth.audience.clone(),
    ));

    Ok(AppState {
        billing: BillingAppState {
            webhook_handler,
            sync_handler,
            checkout_handler,
        },
        access: AccessAppState {
            access_handler: access_handler.clone(),
            usage_handler,
        },
        auth: AuthState::new(validator, config.auth.cookie_name.clone()),
        gate: GateState {
            handler: access_handler,
            paths: Arc::new(GatePaths {
                protected_prefix: config.access.protected_prefix.clone(),
                exclusions: config.access.exclusions_list(),
                login_path: config.access.login_path.clone(),
                plan_selection_path: config.access.plan_selection_path.clone(),
            }),
        },
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down...");
}
