//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Every service the
//! handlers need is constructed at process start and injected through
//! [`AppState`] — there is no global singleton to reach for.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::routes;
use crate::rpc::{NodeRegistry, NodeSelector, StreamValidator};
use crate::signal::{self, GroupTable, SignalRelay, SignalStore, DEFAULT_MAX_CLIENTS};
use crate::types::SwitchboardError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Signal service bundle, present when the signal service is enabled
pub struct SignalServices {
    pub store: Arc<SignalStore>,
    pub groups: Arc<GroupTable>,
    pub relay: Arc<SignalRelay>,
}

impl SignalServices {
    /// Construct the store, group table, and relay as one wired unit
    pub fn new(max_clients: usize) -> Self {
        let store = Arc::new(SignalStore::new(max_clients));
        let groups = Arc::new(GroupTable::new());
        let relay = Arc::new(SignalRelay::new(Arc::clone(&store), Arc::clone(&groups)));
        Self {
            store,
            groups,
            relay,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Signal services (None when SIGNAL_ENABLED=false)
    pub signal: Option<SignalServices>,
    /// Known RPC nodes and their probe history
    pub registry: Arc<NodeRegistry>,
    /// Node selection with consensus validation and failover
    pub selector: Arc<NodeSelector>,
    /// Stream validation reads (None without a validator contract)
    pub streams: Option<Arc<dyn StreamValidator>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        args: Args,
        signal: Option<SignalServices>,
        registry: Arc<NodeRegistry>,
        selector: Arc<NodeSelector>,
        streams: Option<Arc<dyn StreamValidator>>,
    ) -> Self {
        Self {
            args,
            signal,
            registry,
            selector,
            streams,
            started_at: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), SwitchboardError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Switchboard listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    if state.signal.is_some() {
        let max = state.args.signal_max_clients.unwrap_or(DEFAULT_MAX_CLIENTS);
        info!(
            "Signal service enabled at /signal?peerId={{id}} (max {} clients)",
            max
        );
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Liveness probe - 200 while the process is up
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)).await)
        }

        // Readiness probe - 200 only once discovery has produced nodes
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            to_boxed(routes::readiness_check(Arc::clone(&state)).await)
        }

        // Version info for deployment verification
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        // Runtime diagnostics
        (Method::GET, "/status") => to_boxed(routes::status_check(Arc::clone(&state)).await),

        // WebSocket upgrade for the signal channel
        (Method::GET, "/signal") => match state.signal {
            Some(ref signal) if hyper_tungstenite::is_upgrade_request(&req) => {
                let store = Arc::clone(&signal.store);
                let groups = Arc::clone(&signal.groups);
                let relay = Arc::clone(&signal.relay);
                return Ok(to_boxed(
                    signal::handle_signal_upgrade(store, groups, relay, req, addr, &state.args)
                        .await,
                ));
            }
            Some(_) => to_boxed(bad_request_response(
                "WebSocket upgrade required for /signal",
            )),
            None => to_boxed(service_unavailable_response("Signal service disabled")),
        },

        // Signaling relay endpoints
        (Method::POST, "/signaling/offer") => {
            return Ok(to_boxed(
                routes::handle_offer(req, Arc::clone(&state)).await,
            ));
        }
        (Method::POST, "/signaling/answer") => {
            return Ok(to_boxed(
                routes::handle_answer(req, Arc::clone(&state)).await,
            ));
        }
        (Method::POST, "/signaling/ice-candidate") => {
            return Ok(to_boxed(
                routes::handle_ice_candidate(req, Arc::clone(&state)).await,
            ));
        }
        (Method::POST, "/signaling/reconnect") => {
            return Ok(to_boxed(
                routes::handle_reconnect(req, Arc::clone(&state)).await,
            ));
        }
        (
            _,
            "/signaling/offer" | "/signaling/answer" | "/signaling/ice-candidate"
            | "/signaling/reconnect",
        ) => to_boxed(method_not_allowed_response()),

        // RPC node selection
        (Method::GET, "/rpc/best-node") => {
            to_boxed(routes::handle_best_node(Arc::clone(&state)).await)
        }

        // Stream validation reads
        (Method::GET, p) if p.starts_with("/rpc/streams/") && p.ends_with("/validate") => {
            let stream_id = p
                .strip_prefix("/rpc/streams/")
                .and_then(|s| s.strip_suffix("/validate"))
                .unwrap_or("");
            if stream_id.is_empty() {
                to_boxed(not_found_response(p))
            } else {
                to_boxed(routes::handle_validate_stream(Arc::clone(&state), stream_id).await)
            }
        }
        (Method::GET, p) if p.starts_with("/rpc/streams/") && p.ends_with("/data") => {
            let stream_id = p
                .strip_prefix("/rpc/streams/")
                .and_then(|s| s.strip_suffix("/data"))
                .unwrap_or("");
            if stream_id.is_empty() {
                to_boxed(not_found_response(p))
            } else {
                to_boxed(routes::handle_stream_data(Arc::clone(&state), stream_id).await)
            }
        }

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        (_, p) => to_boxed(not_found_response(p)),
    };

    Ok(response)
}

fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Method not allowed (signaling endpoints accept POST only)
fn method_not_allowed_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", "application/json")
        .header("Allow", "POST")
        .body(Full::new(Bytes::from(
            r#"{"error": "Method not allowed"}"#,
        )))
        .unwrap()
}

/// Bad request response
fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Bad Request",
        "message": message,
    });

    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Service unavailable response
fn service_unavailable_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": message,
    });

    Response::builder()
        .status(StatusCode::SERVICE_UNAVAILABLE)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
