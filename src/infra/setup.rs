use crate::{
    adapters::http::app_state::AppState,
    application::ports::{cache::SubscriptionCacheBackend, clock::SystemClock},
    infra::{
        config::{AppConfig, CacheBackendKind},
        jwt_identity::JwtIdentityProvider,
        memory_cache::InMemorySubscriptionCache,
        postgres_persistence,
        redis_cache::RedisSubscriptionCache,
    },
    use_cases::{
        enforcement::{EnforcementUseCases, GuardServices},
        organization::{OrganizationRepo, OrganizationUseCases},
        plans::{PlanRepo, PlanUseCases},
        reconciliation::ReconciliationUseCases,
        subscription::{SubscriptionRepo, SubscriptionUseCases},
        subscription_cache::SubscriptionCache,
        usage::{UsageRepo, UsageUseCases},
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let organization_repo = postgres_arc.clone() as Arc<dyn OrganizationRepo>;
    let plan_repo = postgres_arc.clone() as Arc<dyn PlanRepo>;
    let usage_repo = postgres_arc.clone() as Arc<dyn UsageRepo>;

    let clock = Arc::new(SystemClock);
    let ttl = chrono::Duration::seconds(config.subscription_cache_ttl_secs);

    let backend: Arc<dyn SubscriptionCacheBackend> = match config.cache_backend {
        CacheBackendKind::Memory => Arc::new(InMemorySubscriptionCache::new()),
        CacheBackendKind::Redis => Arc::new(
            RedisSubscriptionCache::new(
                &config.redis_url,
                config.subscription_cache_ttl_secs.unsigned_abs(),
            )
            .await?,
        ),
    };
    let subscription_cache = Arc::new(SubscriptionCache::new(
        backend,
        subscription_repo.clone(),
        clock.clone(),
        ttl,
    ));

    let usage_use_cases = Arc::new(UsageUseCases::new(usage_repo, clock.clone()));

    let enforcement = EnforcementUseCases::new(GuardServices {
        identity: Arc::new(JwtIdentityProvider::new(config.jwt_secret.clone())),
        organizations: OrganizationUseCases::new(organization_repo.clone()),
        cache: subscription_cache.clone(),
        usage: usage_use_cases.clone(),
        upgrade_url: config.upgrade_url.clone(),
    });

    let subscription_use_cases = SubscriptionUseCases::new(
        subscription_repo.clone(),
        organization_repo,
        subscription_cache.clone(),
        clock.clone(),
    );

    let plan_use_cases = PlanUseCases::new(plan_repo, clock);
    let reconciliation_use_cases = ReconciliationUseCases::new(subscription_repo, usage_use_cases);

    Ok(AppState {
        config: Arc::new(config),
        enforcement: Arc::new(enforcement),
        subscription_use_cases: Arc::new(subscription_use_cases),
        plan_use_cases: Arc::new(plan_use_cases),
        reconciliation_use_cases: Arc::new(reconciliation_use_cases),
        subscription_cache,
    })
}

pub fn init_tracing(log_file: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "plangate=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer().with_target(false).with_level(true).pretty();

    // File (structured JSON logs)
    let json_layer = log_file.and_then(|path| match File::create(path) {
        Ok(file) => Some(
            fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
        ),
        Err(e) => {
            eprintln!("cannot create log file {path}: {e}");
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
