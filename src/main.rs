use std::{future::IntoFuture, net::SocketAddr, process, sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vestry::{
    application::{
        analytics::AnalyticsService,
        domains::{DomainService, DomainSettings},
        error::AppError,
        forms::{FormService, SubmissionPolicy},
        public::{PublicSiteService, sitemap::SitemapService},
        website::{WebsiteService, WebsiteStores},
    },
    config,
    domain::spam::SpamPolicy,
    infra::{
        db::PostgresRepositories,
        dns::HickoryTxtResolver,
        error::InfraError,
        http::{self, ApiState, HttpState, PublicRateLimiter, RouterState},
        telemetry,
    },
};

const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn connect_pool(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!(target = "vestry::migrate", "migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    let repositories = Arc::new(PostgresRepositories::new(pool));

    let router_state = build_router_state(repositories, &settings)?;
    let limiter = router_state.http.rate_limiter.clone();
    let prune_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.prune();
        }
    });

    let result = serve_http(&settings, router_state).await;
    prune_handle.abort();
    result
}

fn to_time_duration(key: &str, value: Duration) -> Result<time::Duration, AppError> {
    time::Duration::try_from(value)
        .map_err(|err| AppError::validation(format!("{key} is out of range: {err}")))
}

fn build_router_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<RouterState, AppError> {
    let stores = WebsiteStores::from_shared(repositories.clone());
    let website = WebsiteService::new(&stores);

    let site = PublicSiteService::new(
        &stores,
        website.clone(),
        to_time_duration("website.preview_ttl_seconds", settings.website.preview_ttl)?,
    );
    let resolver = site.resolver().clone();
    let sitemap = SitemapService::new(&stores, resolver.clone());

    let policy = SubmissionPolicy {
        spam: SpamPolicy {
            long_field_chars: settings.forms.long_field_chars,
            long_field_weight: settings.forms.long_field_weight,
            url_weight: settings.forms.url_weight,
            quarantine_score: settings.forms.quarantine_score,
        },
        max_submissions: u64::from(settings.forms.rate_limit_max_submissions.get()),
        window: to_time_duration(
            "forms.rate_limit_window_seconds",
            settings.forms.rate_limit_window,
        )?,
    };
    let forms = FormService::new(
        &stores,
        website.clone(),
        resolver.clone(),
        policy,
        &settings.website.hash_salt,
    );

    let txt_resolver = HickoryTxtResolver::from_system_conf(settings.dns.lookup_timeout)
        .map_err(AppError::from)?;
    let domains = DomainService::new(
        &stores,
        website.clone(),
        Arc::new(txt_resolver),
        DomainSettings {
            platform_apex: settings.website.platform_apex_domain.clone(),
            verification_prefix: settings.dns.verification_prefix.clone(),
        },
    );

    let analytics = AnalyticsService::new(
        &stores,
        website.clone(),
        resolver,
        &settings.website.hash_salt,
    );

    let site = Arc::new(site);
    let forms = Arc::new(forms);
    let analytics = Arc::new(analytics);

    let rate_limiter = PublicRateLimiter::new(
        Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
        settings.rate_limit.max_requests.get(),
    );

    Ok(RouterState {
        http: HttpState {
            site: site.clone(),
            sitemap: Arc::new(sitemap),
            forms: forms.clone(),
            analytics: analytics.clone(),
            db: repositories,
            rate_limiter,
            trusted_proxies: settings.server.trusted_proxies.clone(),
        },
        api: ApiState {
            website: Arc::new(website),
            site,
            forms,
            domains: Arc::new(domains),
            analytics,
        },
    })
}

async fn serve_http(settings: &config::Settings, router_state: RouterState) -> Result<(), AppError> {
    let router = http::build_router(router_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "vestry::server",
        addr = %settings.server.addr,
        "listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    })
    .into_future();

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        if stop_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = deadline => {
            warn!(
                target = "vestry::server",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "vestry::server", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "vestry::server", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!(target = "vestry::server", "shutdown signal received");
}
