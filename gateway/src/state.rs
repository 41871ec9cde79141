use crate::auth::TokenIssuer;
use crate::config::GatewayConfig;
use crate::fields::{FieldService, LiveFieldSource};
use crate::rate_limit::RateLimiter;
use crate::store::Store;
use response_cache::ResponseCache;
use std::sync::Arc;
use std::time::Instant;
use upstreams::Upstreams;

pub struct Limiters {
    pub ai: Arc<RateLimiter>,
    pub sms: Arc<RateLimiter>,
    pub general: Arc<RateLimiter>,
}

impl Limiters {
    pub fn new(config: &GatewayConfig) -> Self {
        Limiters {
            ai: Arc::new(RateLimiter::ai()),
            sms: Arc::new(RateLimiter::sms()),
            general: Arc::new(RateLimiter::general(
                config.rate_limit.max_requests,
                config.rate_limit.window(),
            )),
        }
    }

    pub fn retain_recent(&self) {
        self.ai.retain_recent();
        self.sms.retain_recent();
        self.general.retain_recent();
    }
}

/// Everything a handler needs, cheap to clone into each request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub cache: ResponseCache,
    pub upstreams: Upstreams,
    pub store: Arc<Store>,
    pub tokens: Arc<TokenIssuer>,
    pub fields: Arc<FieldService>,
    pub limiters: Arc<Limiters>,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: GatewayConfig, cache: ResponseCache, upstreams: Upstreams, store: Store) -> Self {
        let fields = FieldService::new(Arc::new(LiveFieldSource::new(
            cache.clone(),
            upstreams.clone(),
        )));

        AppState {
            tokens: Arc::new(TokenIssuer::new(&config.auth.jwt_secret)),
            limiters: Arc::new(Limiters::new(&config)),
            config: Arc::new(config),
            cache,
            upstreams,
            store: Arc::new(store),
            fields: Arc::new(fields),
            started: Instant::now(),
        }
    }

    /// Error detail to expose in 500 bodies; hidden in production.
    pub fn detail(&self, err: impl std::fmt::Display) -> Option<String> {
        (!self.config.environment.is_production()).then(|| err.to_string())
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}
