use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path as AxumPath, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use moniker_allocator::{AllocationError, AllocationService, ProbeError};
use moniker_registry::{Registry, RegistryError};
use moniker_types::{Address, Authorization, Label, Nonce, Partition, SignatureBytes};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Commit hash embedded by this crate's build script, when known.
pub const GIT_COMMIT_HASH: Option<&str> = option_env!("GIT_COMMIT_HASH");

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub allocator: Arc<AllocationService>,
    /// `None` when the Prometheus exporter is disabled.
    pub metrics: Option<PrometheusHandle>,
    /// Upper bound on any single registry or allocation call.
    pub request_timeout: Duration,
    pub node_id: String,
    pub start_time: Instant,
    pub req_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(
        registry: Arc<Registry>,
        allocator: Arc<AllocationService>,
        request_timeout: Duration,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            allocator,
            metrics: None,
            request_timeout,
            node_id: node_id.into(),
            start_time: Instant::now(),
            req_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Run a read-only registry call on the blocking pool under the request timeout.
    async fn with_registry<T, F>(&self, task: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Registry) -> Result<T, RegistryError> + Send + 'static,
    {
        let registry = self.registry.clone();
        let handle = tokio::task::spawn_blocking(move || task(registry.as_ref()));
        match timeout(self.request_timeout, handle).await {
            Err(_) => Err(ApiError::gateway_timeout("registry request timed out")),
            Ok(Err(err)) => Err(ApiError::internal(format!("registry task failed: {err}"))),
            Ok(Ok(result)) => result.map_err(ApiError::from),
        }
    }

    /// Run a mutating registry call on the blocking pool to completion.
    ///
    /// Not bounded by `request_timeout`: the response must reflect whether
    /// the commit landed.
    async fn commit_to_registry<T, F>(&self, task: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Registry) -> Result<T, RegistryError> + Send + 'static,
    {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || task(registry.as_ref()))
            .await
            .map_err(|err| ApiError::internal(format!("registry task failed: {err}")))?
            .map_err(ApiError::from)
    }

    async fn with_allocator<T, Fut>(&self, call: Fut) -> Result<T, ApiError>
    where
        Fut: std::future::Future<Output = Result<T, AllocationError>>,
    {
        timeout(self.request_timeout, call)
            .await
            .map_err(|_| ApiError::gateway_timeout("allocation timed out"))?
            .map_err(ApiError::from)
    }
}

type SharedState = Arc<AppState>;

/// `Json` extractor whose rejections use the `{error}` envelope.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct ApiJson<T>(T);

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

fn ok<T>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    node_id: String,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<&'static str>,
    uptime_secs: u64,
    records: usize,
    req_total: u64,
}

#[derive(Debug, Deserialize)]
struct AllocateRequest {
    owner: Option<String>,
    #[serde(default)]
    partition: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwnerQuery {
    owner: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    owner: String,
    partition: String,
    label: String,
    deadline: u64,
    nonce: String,
    signature: String,
    #[serde(default)]
    payment: u128,
}

impl RegisterRequest {
    fn into_authorization(self) -> Result<(Authorization, u128), ApiError> {
        let owner = Address::parse(&self.owner)
            .map_err(|err| ApiError::bad_request(format!("Invalid owner address: {err}")))?;
        let partition = Partition::new(self.partition)
            .map_err(|err| ApiError::bad_request(err.to_string()))?;
        let label = Label::parse(&self.label).map_err(|err| ApiError::bad_request(err.to_string()))?;
        let nonce = Nonce::from_hex(&self.nonce)
            .map_err(|err| ApiError::bad_request(format!("invalid nonce: {err}")))?;
        let signature = SignatureBytes::from_hex(&self.signature)
            .map_err(|err| ApiError::bad_request(format!("invalid signature: {err}")))?;
        Ok((
            Authorization {
                partition,
                label,
                owner,
                deadline: self.deadline,
                nonce,
                signature,
            },
            self.payment,
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewQuery {
    owner: String,
    nonce: u64,
    partition_index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewResponse {
    partition: Partition,
    label: Label,
    full_name: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    retryable: bool,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
            retryable: false,
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    fn gateway_timeout<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorResponse {
            error: self.message,
            retryable: self.retryable,
        });
        (self.status, payload).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<AllocationError> for ApiError {
    fn from(err: AllocationError) -> Self {
        let status = match &err {
            AllocationError::InvalidAddress(_)
            | AllocationError::ZeroAddress
            | AllocationError::UnknownPartition { .. } => StatusCode::BAD_REQUEST,
            AllocationError::ExhaustedAttempts { .. }
            | AllocationError::RegistryUnavailable(ProbeError::Backend(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AllocationError::RegistryUnavailable(ProbeError::Timeout { .. }) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            AllocationError::PartitionMisconfigured { .. }
            | AllocationError::InvalidRetryPolicy => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = match &err {
            RegistryError::InvalidOwner(_)
            | RegistryError::UnknownPartition { .. }
            | RegistryError::PartitionIndexOutOfRange { .. }
            | RegistryError::LabelNotInCorpus { .. }
            | RegistryError::InvalidLabel(_)
            | RegistryError::InvalidComponents(_) => StatusCode::BAD_REQUEST,
            RegistryError::InsufficientPayment { .. } => StatusCode::PAYMENT_REQUIRED,
            RegistryError::InvalidSignature
            | RegistryError::AuthorizationExpired { .. }
            | RegistryError::ReplayedAuthorization
            | RegistryError::Unauthorized { .. }
            | RegistryError::NotOwner { .. } => StatusCode::FORBIDDEN,
            RegistryError::DomainNotFound { .. } => StatusCode::NOT_FOUND,
            RegistryError::AlreadyRegistered { .. } | RegistryError::QuotaExceeded { .. } => {
                StatusCode::CONFLICT
            }
            RegistryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

fn parse_owner(raw: Option<&str>) -> Result<Address, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::bad_request("Invalid owner address"))?;
    Address::parse(raw)
        .map_err(|err| ApiError::bad_request(format!("Invalid owner address: {err}")))
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    info!("RPC listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("RPC server terminated unexpectedly")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
    }
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {addr}"))
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/allocate", post(handle_allocate))
        .route("/status", get(handle_status))
        .route("/registry/register", post(handle_register))
        .route("/registry/records/:partition/:label", get(handle_get_record))
        .route("/registry/accounts/:owner", get(handle_get_account))
        .route("/registry/components", get(handle_get_components))
        .route("/registry/preview", get(handle_preview))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        node_id: state.node_id.clone(),
        version: env!("CARGO_PKG_VERSION"),
        commit: GIT_COMMIT_HASH,
        uptime_secs: state.uptime_seconds(),
        records: state.registry.record_count(),
        req_total: state.record_request(),
    })
}

async fn handle_metrics(State(state): State<SharedState>) -> Result<Response, ApiError> {
    state.record_request();
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("metrics exporter disabled"))?;

    let mut response = Response::new(Body::from(handle.render()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    Ok(response)
}

async fn handle_allocate(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<AllocateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.record_request();
    let owner = request
        .owner
        .ok_or_else(|| ApiError::bad_request("Invalid owner address"))?;
    let grant = state
        .with_allocator(state.allocator.grant(&owner, request.partition.as_deref()))
        .await?;
    Ok(ok(grant))
}

async fn handle_status(
    State(state): State<SharedState>,
    Query(query): Query<OwnerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.record_request();
    let owner = query
        .owner
        .ok_or_else(|| ApiError::bad_request("Invalid owner address"))?;
    let status = state.with_allocator(state.allocator.status(&owner)).await?;
    Ok(ok(status))
}

async fn handle_register(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.record_request();
    let (authorization, payment) = request.into_authorization()?;
    let record = state
        .commit_to_registry(move |registry| {
            registry.register(
                &authorization.owner,
                &authorization.partition,
                &authorization.label,
                &authorization,
                payment,
            )
        })
        .await?;
    Ok((StatusCode::CREATED, ok(record)))
}

async fn handle_get_record(
    State(state): State<SharedState>,
    AxumPath((partition, label)): AxumPath<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.record_request();
    let partition = Partition::new(partition).map_err(|err| ApiError::bad_request(err.to_string()))?;
    let label = Label::parse(&label).map_err(|err| ApiError::bad_request(err.to_string()))?;
    let name = format!("{label}.{partition}");
    let record = state
        .with_registry(move |registry| Ok(registry.get_record(&partition, &label)))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Domain not found: {name}")))?;
    Ok(ok(record))
}

async fn handle_get_account(
    State(state): State<SharedState>,
    AxumPath(owner): AxumPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.record_request();
    let owner = parse_owner(Some(&owner))?;
    let account = state
        .with_registry(move |registry| Ok(registry.account(&owner)))
        .await?;
    Ok(ok(account))
}

async fn handle_get_components(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    state.record_request();
    let corpus = state
        .with_registry(|registry| Ok(registry.components()))
        .await?;
    Ok(ok(corpus))
}

async fn handle_preview(
    State(state): State<SharedState>,
    Query(query): Query<PreviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.record_request();
    let owner = parse_owner(Some(&query.owner))?;
    let preview = state
        .with_registry(move |registry| {
            let key = registry.preview_random(&owner, query.nonce, query.partition_index)?;
            Ok(PreviewResponse {
                full_name: registry.full_name(&key),
                partition: key.partition,
                label: key.label,
            })
        })
        .await?;
    Ok(ok(preview))
}
