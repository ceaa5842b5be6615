use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{
    future::Future,
    net::SocketAddr,
    num::NonZeroU32,
    pin::Pin,
    sync::Arc,
    time::Duration,
};
use tower::{Layer, Service};

use crate::middleware::auth::bearer_token;
use crate::modules::auth::interface::AuthError;
use crate::services::jwt::JwtService;

pub type KeyedLimiter = Arc<DefaultKeyedRateLimiter<String>>;

/// `limit` requests per `window` for each key. GCRA: one cell returns every
/// `window / limit`, so this is a refilling bucket rather than a sliding window.
pub fn create_keyed_limiter(limit: u32, window: Duration) -> KeyedLimiter {
    let limit = NonZeroU32::new(limit.max(1)).unwrap_or(NonZeroU32::MIN);
    let period = window / limit.get();
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(limit))
        .allow_burst(limit);
    Arc::new(RateLimiter::keyed(quota))
}

/// Per-endpoint buckets for the authentication surface.
#[derive(Clone)]
pub struct AuthRateLimits {
    pub enabled: bool,
    /// Key on `X-Forwarded-For` / `X-Real-IP`; only safe behind a proxy that overwrites them.
    pub trust_proxy_headers: bool,
    pub login: KeyedLimiter,
    pub register: KeyedLimiter,
    pub password_reset: KeyedLimiter,
    pub refresh: KeyedLimiter,
    pub verification: KeyedLimiter,
}

impl AuthRateLimits {
    pub fn new(enabled: bool) -> Self {
        const MINUTE: Duration = Duration::from_secs(60);
        const HOUR: Duration = Duration::from_secs(60 * 60);

        Self {
            enabled,
            trust_proxy_headers: false,
            login: create_keyed_limiter(5, 15 * MINUTE),
            register: create_keyed_limiter(3, HOUR),
            password_reset: create_keyed_limiter(3, HOUR),
            refresh: create_keyed_limiter(10, MINUTE),
            verification: create_keyed_limiter(3, HOUR),
        }
    }

    pub fn trusting_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn layer(&self, limiter: &KeyedLimiter) -> RateLimitLayer {
        RateLimitLayer::new(limiter.clone(), self.enabled)
            .trusting_proxy_headers(self.trust_proxy_headers)
    }

    /// Drops keys whose buckets have fully refilled.
    pub fn prune(&self) {
        for limiter in [
            &self.login,
            &self.register,
            &self.password_reset,
            &self.refresh,
            &self.verification,
        ] {
            limiter.retain_recent();
        }
    }
}

/// Client address for rate-limit keys.
///
/// With `trust_proxy_headers` the first `X-Forwarded-For` hop wins, then
/// `X-Real-IP`. Clients can set both headers themselves, so they are only
/// honoured when a reverse proxy in front of the service rewrites them.
/// Otherwise, and as a fallback, the socket peer is used.
pub fn client_ip<B>(request: &Request<B>, trust_proxy_headers: bool) -> String {
    let headers = request.headers();
    let forwarded = if trust_proxy_headers {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            })
    } else {
        None
    };

    forwarded
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: KeyedLimiter,
    enabled: bool,
    trust_proxy_headers: bool,
    identity: Option<Arc<JwtService>>,
}

impl RateLimitLayer {
    pub fn new(limiter: KeyedLimiter, enabled: bool) -> Self {
        Self {
            limiter,
            enabled,
            trust_proxy_headers: false,
            identity: None,
        }
    }

    pub fn trusting_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Key by user id instead of address whenever a valid access token accompanies the request.
    pub fn keyed_by_user(mut self, jwt: Arc<JwtService>) -> Self {
        self.identity = Some(jwt);
        self
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            enabled: self.enabled,
            trust_proxy_headers: self.trust_proxy_headers,
            identity: self.identity.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: KeyedLimiter,
    enabled: bool,
    trust_proxy_headers: bool,
    identity: Option<Arc<JwtService>>,
}

impl<S> RateLimitService<S> {
    fn key_for(&self, request: &Request<Body>) -> String {
        let user_key = self.identity.as_ref().and_then(|jwt| {
            bearer_token(request.headers())
                .and_then(|token| jwt.verify_access_token(token).ok())
                .map(|claims| format!("user:{}", claims.user_id))
        });
        user_key.unwrap_or_else(|| format!("ip:{}", client_ip(request, self.trust_proxy_headers)))
    }
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let allowed = !self.enabled || {
            let key = self.key_for(&request);
            let ok = self.limiter.check_key(&key).is_ok();
            if !ok {
                tracing::warn!(key = %key, path = %request.uri().path(), "Rate limit exceeded");
            }
            ok
        };

        // Keep the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            if !allowed {
                return Ok(AuthError::TooManyAttempts.into_response());
            }
            inner.call(request).await
        })
    }
}
