pub mod config;
pub mod middleware;
pub mod modules;
pub mod services;

use axum::{
    http::{HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use config::{Config, DbPool};
use modules::auth::crud::{EmailTokenCrud, RefreshTokenCrud, UserCrud};
use modules::auth::interface::{EmailTokenRepository, RefreshTokenRepository, UserRepository};
use modules::auth::{auth_routes, AuthService, TokenMinter};
use modules::messaging::crud::MessageCrud;
use modules::messaging::interface::MessageStore;
use modules::messaging::{messaging_routes, MessageService};
use modules::metrics::routes::metrics_routes;
use modules::oauth::crud::{AccountCrud, OAuthStateCrud};
use modules::oauth::interface::{AccountRepository, OAuthStateRepository};
use modules::oauth::OAuthService;
use modules::realtime::{realtime_routes, Hub, RealtimeService};
use modules::users::crud::CoachAssignmentCrud;
use modules::users::interface::CoachAssignmentRepository;
use modules::users::{user_routes, UserService};
use services::email::EmailSender;
use services::identity_provider::{ProviderClient, ProviderError};
use services::jwt::JwtService;
use services::metrics::{metrics_middleware, MetricsRegistry};
use services::rate_limit::AuthRateLimits;
use services::security::security_headers;
use services::sweeper::Sweeper;

pub const MAX_BODY_BYTES: usize = 1024 * 100;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to build metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Failed to build identity provider client: {0}")]
    Provider(#[from] ProviderError),
}

pub struct AppState {
    pub config: Config,
    pub auth: AuthService,
    pub oauth: OAuthService,
    pub jwt_service: Arc<JwtService>,
    pub users: UserService,
    pub assignments: Arc<dyn CoachAssignmentRepository>,
    pub messages: MessageService,
    pub realtime: Arc<RealtimeService>,
    pub hub: Arc<Hub>,
    pub rate_limits: AuthRateLimits,
    pub metrics: Arc<MetricsRegistry>,
}

/// Storage seams the services are built over.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub password_resets: Arc<dyn EmailTokenRepository>,
    pub verifications: Arc<dyn EmailTokenRepository>,
    pub oauth_states: Arc<dyn OAuthStateRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub assignments: Arc<dyn CoachAssignmentRepository>,
    pub messages: Arc<dyn MessageStore>,
}

impl Repositories {
    pub fn mysql(pool: DbPool) -> Self {
        Self {
            users: Arc::new(UserCrud::new(pool.clone())),
            refresh_tokens: Arc::new(RefreshTokenCrud::new(pool.clone())),
            password_resets: Arc::new(EmailTokenCrud::password_resets(pool.clone())),
            verifications: Arc::new(EmailTokenCrud::verifications(pool.clone())),
            oauth_states: Arc::new(OAuthStateCrud::new(pool.clone())),
            accounts: Arc::new(AccountCrud::new(pool.clone())),
            assignments: Arc::new(CoachAssignmentCrud::new(pool.clone())),
            messages: Arc::new(MessageCrud::new(pool)),
        }
    }

    pub fn sweeper(&self, rate_limits: AuthRateLimits) -> Sweeper {
        Sweeper::new(
            self.refresh_tokens.clone(),
            self.oauth_states.clone(),
            self.password_resets.clone(),
            self.verifications.clone(),
            rate_limits,
        )
    }
}

/// Wires services over `repos` and starts the realtime hub; the hub stops when
/// `shutdown` is cancelled.
pub fn build_state(
    config: Config,
    repos: &Repositories,
    mailer: Arc<dyn EmailSender>,
    shutdown: CancellationToken,
) -> Result<Arc<AppState>, StartupError> {
    let metrics = MetricsRegistry::new()?;

    let jwt_service = Arc::new(JwtService::with_lifetimes(
        config.jwt_secret.clone(),
        config.access_token_ttl_secs,
        config.refresh_token_ttl_secs,
    ));

    let auth = AuthService::new(
        repos.users.clone(),
        TokenMinter::new(jwt_service.clone(), repos.refresh_tokens.clone()),
        repos.password_resets.clone(),
        repos.verifications.clone(),
        mailer,
        config.app_url.clone(),
    );

    let oauth = OAuthService::new(
        ProviderClient::new()?,
        config.web_providers.clone(),
        config.mobile_providers.clone(),
        repos.oauth_states.clone(),
        repos.accounts.clone(),
        repos.users.clone(),
    );

    let hub = Hub::start(shutdown, metrics.clone());
    let realtime = Arc::new(RealtimeService::new(
        hub.clone(),
        repos.messages.clone(),
        metrics.clone(),
    ));

    Ok(Arc::new(AppState {
        rate_limits: AuthRateLimits::new(config.rate_limit_enabled)
            .trusting_proxy_headers(config.trust_proxy_headers),
        users: UserService::new(repos.users.clone(), repos.assignments.clone()),
        assignments: repos.assignments.clone(),
        messages: MessageService::new(repos.messages.clone(), repos.users.clone(), realtime.clone()),
        config,
        auth,
        oauth,
        jwt_service,
        realtime,
        hub,
        metrics,
    }))
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/auth", auth_routes(state.clone()))
        .merge(user_routes(state.clone()))
        .merge(messaging_routes(state.clone()))
        .merge(realtime_routes())
        .merge(metrics_routes())
        .layer(axum_middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics_middleware,
        ))
        .layer(axum_middleware::from_fn(security_headers))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

/// Serves `app` until `shutdown` is cancelled, then gives in-flight requests
/// `grace` to finish before the server future is dropped.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    grace: Duration,
) -> std::io::Result<()> {
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.clone().cancelled_owned())
    .into_future();

    let deadline = async {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result,
        () = deadline => {
            tracing::warn!(grace_secs = grace.as_secs_f64(), "Connections still open after the grace period; dropping them");
            Ok(())
        }
    }
}

/// Explicit origins when configured; otherwise any origin without credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if allowed.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

async fn root() -> &'static str {
    "Leornian Core API"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    realtime_connections: usize,
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        realtime_connections: state.hub.active_connections().await,
    })
}
