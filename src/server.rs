use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    BoxError, Router,
};
use tokio::net::TcpListener;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::auth::{JwtMaker, PasswordHasher, TokenError, TokenMaker};
use crate::config::AppConfig;
use crate::database::{DatabaseManager, PgStore};
use crate::error::ApiError;
use crate::handlers::{exercises, health, profiles, statuses, users, workouts};
use crate::services::{
    ExerciseService, MemoryStore, ProfileService, UserService, WEStatusService, WorkoutExerciseService, WorkoutService,
};

/// Cookie and lifetime settings for issued sessions.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub token_duration: chrono::Duration,
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            token_duration: config.security.token_duration(),
            cookie_domain: config.security.cookie_domain.clone(),
            cookie_secure: config.security.cookie_secure,
        }
    }
}

/// Shared handler state. Every service is injected as a trait object so the
/// same router runs on Postgres or on the in-memory store.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<dyn TokenMaker>,
    pub hasher: PasswordHasher,
    pub session: SessionSettings,
    pub users: Arc<dyn UserService>,
    pub profiles: Arc<dyn ProfileService>,
    pub exercises: Arc<dyn ExerciseService>,
    pub workouts: Arc<dyn WorkoutService>,
    pub workout_exercises: Arc<dyn WorkoutExerciseService>,
    pub statuses: Arc<dyn WEStatusService>,
    /// Present when backed by Postgres; used by `/health`.
    pub db: Option<DatabaseManager>,
}

impl AppState {
    pub fn new<S>(store: S, tokens: Arc<dyn TokenMaker>, hasher: PasswordHasher, session: SessionSettings) -> Self
    where
        S: UserService
            + ProfileService
            + ExerciseService
            + WorkoutService
            + WorkoutExerciseService
            + WEStatusService
            + 'static,
    {
        let store = Arc::new(store);
        Self {
            tokens,
            hasher,
            session,
            users: store.clone(),
            profiles: store.clone(),
            exercises: store.clone(),
            workouts: store.clone(),
            workout_exercises: store.clone(),
            statuses: store,
            db: None,
        }
    }

    pub fn postgres(db: DatabaseManager, config: &AppConfig) -> Result<Self, TokenError> {
        let hasher = PasswordHasher::new(config.security.bcrypt_cost);
        let tokens = Arc::new(JwtMaker::new(&config.security.jwt_secret)?);
        let mut state = Self::new(
            PgStore::new(db.clone(), hasher),
            tokens,
            hasher,
            SessionSettings::from_config(config),
        );
        state.db = Some(db);
        Ok(state)
    }

    pub fn in_memory(store: MemoryStore, config: &AppConfig) -> Result<Self, TokenError> {
        let hasher = PasswordHasher::new(config.security.bcrypt_cost);
        let tokens = Arc::new(JwtMaker::new(&config.security.jwt_secret)?);
        Ok(Self::new(
            store.with_hasher(hasher),
            tokens,
            hasher,
            SessionSettings::from_config(config),
        ))
    }
}

pub fn router(state: AppState, config: &AppConfig) -> Router {
    let public = Router::new()
        .route("/healthchecker", get(health::healthchecker))
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/logout", post(users::logout));

    let protected = Router::new()
        .route("/users/me", get(users::me))
        .route("/users/update", axum::routing::patch(users::update))
        .route("/users/delete", axum::routing::delete(users::delete))
        .route("/profiles", post(profiles::create))
        .route("/profiles/me", get(profiles::me))
        .route("/profiles/:id", axum::routing::patch(profiles::update).delete(profiles::delete))
        .route("/exercises", get(exercises::list).post(exercises::create))
        .route(
            "/exercises/:id",
            get(exercises::show).patch(exercises::update).delete(exercises::delete),
        )
        .route("/workouts", get(workouts::list).post(workouts::create))
        .route(
            "/workouts/:id",
            get(workouts::show).patch(workouts::update).delete(workouts::delete),
        )
        .route(
            "/workouts/:id/exercises",
            post(workouts::add_exercises).delete(workouts::remove_exercises),
        )
        .route("/workouts/:id/workout-exercises", get(workouts::workout_exercises))
        .route("/workout-exercises/:id/status", get(statuses::show).patch(statuses::update))
        .route_layer(middleware::from_fn_with_state(state.clone(), crate::middleware::authenticate));

    let app = Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", public.merge(protected));

    with_request_timeout(app, config.server.request_timeout())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.security.cors_origins)),
        )
        .with_state(state)
}

/// Abort requests that run longer than `timeout` with a JSON 408.
pub fn with_request_timeout<S>(app: Router<S>, timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    app.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_timeout_error))
            .layer(TimeoutLayer::new(timeout)),
    )
}

async fn handle_timeout_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        ApiError::RequestTimeout("Request Timeout".to_string())
    } else {
        error!("unhandled middleware error: {}", err);
        ApiError::internal_server_error()
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Serve `app` until `shutdown` resolves, then give in-flight requests
/// `grace` to finish before dropping them.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F, grace: Duration) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = stop_rx.await;
    });
    let mut handle = tokio::spawn(server.into_future());

    tokio::select! {
        res = &mut handle => return join_result(res),
        _ = shutdown => info!("shutdown requested, draining for {:?}", grace),
    }

    let _ = stop_tx.send(());
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(res) => join_result(res),
        Err(_) => {
            warn!("graceful shutdown exceeded {:?}; closing remaining connections", grace);
            handle.abort();
            Ok(())
        }
    }
}

fn join_result(res: Result<std::io::Result<()>, tokio::task::JoinError>) -> std::io::Result<()> {
    res.map_err(std::io::Error::other)?
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
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
}
