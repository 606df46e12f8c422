//! HTTP bridge for the shipledger ledger.
//!
//! Maps each ledger operation onto one JSON route under `/api`. The bridge
//! decodes requests and establishes the caller identity; every business rule
//! lives in `shipledger-core`, and core error kinds are mapped to HTTP
//! statuses here.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

pub mod config;

pub use config::ServerConfig;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shipledger_core::{
    shutdown_requested, CoreError, ErrorKind, Identity, Ledger, NewShipment, Shipment,
    ShipmentFilter, ShipmentId, ShipmentState, Transfer, TransferRequest,
};
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

/// Header carrying the authenticated caller, set by the gateway in front of the bridge.
pub const IDENTITY_HEADER: &str = "X-Caller-Identity";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("config error: {0}")]
    Config(String),
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error(transparent)]
    Ledger(#[from] CoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state of a running bridge.
pub struct AppState {
    ledger: RwLock<Ledger>,
    auth_token: Option<String>,
}

impl AppState {
    pub fn new(ledger: Ledger, auth_token: Option<String>) -> Self {
        Self {
            ledger: RwLock::new(ledger),
            auth_token,
        }
    }

    /// Open the ledger under `config.data_dir`.
    pub fn open(config: &ServerConfig) -> Result<Self, ServerError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let ledger = Ledger::open(config.data_dir.clone())?;
        Ok(Self::new(ledger, config.auth_token.clone()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Ledger>, ApiError> {
        self.ledger
            .read()
            .map_err(|_| ApiError::internal("ledger lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Ledger>, ApiError> {
        self.ledger
            .write()
            .map_err(|_| ApiError::internal("ledger lock poisoned"))
    }

    fn check_token(&self, bearer: Option<&str>) -> Result<(), ApiError> {
        match &self.auth_token {
            None => Ok(()),
            Some(expected) if bearer == Some(expected.as_str()) => Ok(()),
            Some(_) => Err(ApiError::unauthorized()),
        }
    }
}

/// A decoded request, independent of the transport.
#[derive(Debug)]
pub struct ApiRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub caller: Option<&'a str>,
    pub bearer: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

impl ApiReply {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn json(value: &impl Serialize) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(Self::ok)
            .map_err(|e| ApiError::internal(format!("failed to encode response: {e}")))
    }
}

#[derive(Debug)]
struct ApiError {
    status: u16,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: u16, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, "BadRequest", message)
    }

    fn unauthorized() -> Self {
        Self::new(401, "Unauthorized", "missing or invalid bearer token")
    }

    fn no_route() -> Self {
        Self::new(404, "RouteNotFound", "no such route")
    }

    fn method_not_allowed() -> Self {
        Self::new(405, "MethodNotAllowed", "method not allowed")
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(500, "InternalError", message)
    }

    fn into_reply(self) -> ApiReply {
        ApiReply {
            status: self.status,
            body: json!({ "error": { "kind": self.kind, "message": self.message } }),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        let kind = e.kind();
        let status = match kind {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Authorization => 403,
            ErrorKind::Store => 500,
        };
        Self::new(status, kind.as_str(), e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Health,
    NextShipmentId,
    NextTransferId,
    Shipments,
    Shipment(&'a str),
    Transfer(&'a str),
    Transfers(&'a str),
}

/// Match a URL path (without query string) to a route.
///
/// Shipment ids are returned raw so a malformed id can be reported as a bad
/// request rather than a missing route.
pub fn parse_route(path: &str) -> Option<Route<'_>> {
    if path == "/health" {
        return Some(Route::Health);
    }
    let rest = path.strip_prefix("/api/")?;
    let segments: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
    match segments.as_slice() {
        ["shipments"] => Some(Route::Shipments),
        ["shipments", "next-id"] => Some(Route::NextShipmentId),
        ["transfers", "next-id"] => Some(Route::NextTransferId),
        ["shipments", id] => Some(Route::Shipment(*id)),
        ["shipments", id, "transfer"] => Some(Route::Transfer(*id)),
        ["shipments", id, "transfers"] => Some(Route::Transfers(*id)),
        _ => None,
    }
}

fn query_param(query: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn parse_id(raw: &str) -> Result<ShipmentId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid shipment id '{raw}'")))
}

fn parse_body<'de, T: Deserialize<'de>>(body: &'de [u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))
}

fn caller_identity(req: &ApiRequest<'_>) -> Result<Identity, ApiError> {
    match req.caller {
        Some(caller) if !caller.is_empty() => Ok(Identity::from(caller)),
        _ => Err(ApiError::bad_request(format!(
            "{IDENTITY_HEADER} header is required"
        ))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    #[serde(alias = "name")]
    product_name: String,
    description: String,
    origin: String,
    destination: String,
    delivery_date: String,
    units: i64,
    weight: f64,
}

impl From<CreateBody> for NewShipment {
    fn from(body: CreateBody) -> Self {
        NewShipment {
            name: body.product_name,
            description: body.description,
            origin: body.origin,
            destination: body.destination,
            delivery_date: body.delivery_date,
            units: body.units,
            weight: body.weight,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferBody {
    #[serde(alias = "newOwner")]
    new_shipment_owner: String,
    new_state: u8,
    location: String,
    #[serde(alias = "notes")]
    transfer_notes: String,
}

/// Wire form of a shipment. The transfer list is served separately.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShipmentView<'a> {
    id: ShipmentId,
    name: &'a str,
    description: &'a str,
    origin: &'a str,
    destination: &'a str,
    delivery_date: &'a str,
    units: u64,
    weight: f64,
    current_state: ShipmentState,
    current_owner: &'a Identity,
    creator: &'a Identity,
    created_at: u64,
    transfer_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    delivered_at: Option<u64>,
}

impl<'a> From<&'a Shipment> for ShipmentView<'a> {
    fn from(s: &'a Shipment) -> Self {
        Self {
            id: s.id,
            name: &s.name,
            description: &s.description,
            origin: &s.origin,
            destination: &s.destination,
            delivery_date: &s.delivery_date,
            units: s.units,
            weight: s.weight,
            current_state: s.state,
            current_owner: &s.current_owner,
            creator: &s.creator,
            created_at: s.created_at,
            transfer_count: s.transfer_count(),
            delivered_at: s.delivered_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferView<'a> {
    id: u64,
    shipment_id: ShipmentId,
    timestamp: u64,
    new_state: ShipmentState,
    location: &'a str,
    new_shipment_owner: &'a Identity,
    transfer_notes: &'a str,
}

impl<'a> From<&'a Transfer> for TransferView<'a> {
    fn from(t: &'a Transfer) -> Self {
        Self {
            id: t.id.get(),
            shipment_id: t.shipment_id,
            timestamp: t.timestamp,
            new_state: t.new_state,
            location: &t.location,
            new_shipment_owner: &t.new_owner,
            transfer_notes: &t.transfer_notes,
        }
    }
}

fn create_shipment(state: &AppState, req: &ApiRequest<'_>) -> Result<ApiReply, ApiError> {
    let caller = caller_identity(req)?;
    let body: CreateBody = parse_body(req.body)?;

    let mut ledger = state.write()?;
    let id = ledger.create(body.into(), &caller)?;
    let shipment = ledger.shipment(id)?;
    Ok(ApiReply::ok(json!({
        "id": shipment.id,
        "currentOwner": shipment.current_owner,
        "deliveryDate": shipment.delivery_date,
    })))
}

fn transfer_shipment(
    state: &AppState,
    raw_id: &str,
    req: &ApiRequest<'_>,
) -> Result<ApiReply, ApiError> {
    let shipment_id = parse_id(raw_id)?;
    let caller = caller_identity(req)?;
    let body: TransferBody = parse_body(req.body)?;
    let new_state = ShipmentState::from_ordinal(body.new_state)
        .ok_or_else(|| ApiError::bad_request("newState must be between 0 and 3"))?;

    let receipt = state.write()?.transfer(
        TransferRequest {
            shipment_id,
            new_owner: Identity::from(body.new_shipment_owner),
            new_state,
            location: body.location,
            notes: body.transfer_notes,
        },
        &caller,
    )?;
    Ok(ApiReply::ok(json!({
        "shipmentId": receipt.shipment_id,
        "transferId": receipt.transfer_id,
        "newOwner": receipt.new_owner,
        "newState": receipt.new_state,
        "timestamp": receipt.timestamp,
    })))
}

fn list_shipments(state: &AppState, query: &str) -> Result<ApiReply, ApiError> {
    let filter = ShipmentFilter {
        owner: query_param(query, "owner").map(Identity::from),
        participant: query_param(query, "participant").map(Identity::from),
    };

    let ledger = state.read()?;
    let views: Vec<ShipmentView<'_>> = ledger
        .list_shipments(&filter)
        .into_iter()
        .map(ShipmentView::from)
        .collect();
    ApiReply::json(&views)
}

fn get_shipment(state: &AppState, raw_id: &str) -> Result<ApiReply, ApiError> {
    let id = parse_id(raw_id)?;
    let ledger = state.read()?;
    ApiReply::json(&ShipmentView::from(ledger.shipment(id)?))
}

fn get_transfers(state: &AppState, raw_id: &str) -> Result<ApiReply, ApiError> {
    let id = parse_id(raw_id)?;
    let ledger = state.read()?;
    let views: Vec<TransferView<'_>> = ledger.transfers(id)?.map(TransferView::from).collect();
    ApiReply::json(&views)
}

fn route_request(state: &AppState, req: &ApiRequest<'_>) -> Result<ApiReply, ApiError> {
    let (path, query) = req.url.split_once('?').unwrap_or((req.url, ""));
    let route = parse_route(path).ok_or_else(ApiError::no_route)?;
    if route != Route::Health {
        state.check_token(req.bearer)?;
    }

    match (route, &req.method) {
        (Route::Health, Method::Get) => Ok(ApiReply::ok(json!({ "status": "ok" }))),
        (Route::NextShipmentId, Method::Get) => {
            let next = state.read()?.next_shipment_id();
            Ok(ApiReply::ok(json!({ "nextShipmentId": next })))
        }
        (Route::NextTransferId, Method::Get) => {
            let next = state.read()?.next_transfer_id();
            Ok(ApiReply::ok(json!({ "nextTransferId": next })))
        }
        (Route::Shipments, Method::Get) => list_shipments(state, query),
        (Route::Shipments, Method::Post) => create_shipment(state, req),
        (Route::Shipment(id), Method::Get) => get_shipment(state, id),
        (Route::Transfer(id), Method::Post) => transfer_shipment(state, id, req),
        (Route::Transfers(id), Method::Get) => get_transfers(state, id),
        _ => Err(ApiError::method_not_allowed()),
    }
}

/// Run one decoded request against the ledger.
pub fn dispatch(state: &AppState, req: &ApiRequest<'_>) -> ApiReply {
    match route_request(state, req) {
        Ok(reply) => reply,
        Err(e) => {
            if e.status >= 500 {
                error!("{} {}: {}", req.method, req.url, e.message);
            } else {
                debug!("{} {}: {} {}", req.method, req.url, e.status, e.message);
            }
            e.into_reply()
        }
    }
}

fn header_value(req: &tiny_http::Request, name: &'static str) -> Option<String> {
    req.headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_owned())
}

fn respond(req: tiny_http::Request, reply: ApiReply) {
    let mut response = Response::from_data(reply.body.to_string().into_bytes())
        .with_status_code(StatusCode(reply.status));
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    if let Err(e) = req.respond(response) {
        warn!("failed to send response: {e}");
    }
}

/// Handle a single HTTP request.
pub fn handle_request(state: &AppState, mut req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let caller = header_value(&req, IDENTITY_HEADER);
    let bearer = header_value(&req, "Authorization")
        .and_then(|v| v.strip_prefix("Bearer ").map(str::to_owned));

    let mut body = Vec::new();
    if let Err(e) = req.as_reader().read_to_end(&mut body) {
        warn!("{method} {url}: failed to read body: {e}");
        respond(req, ApiError::bad_request("unreadable request body").into_reply());
        return;
    }

    let reply = dispatch(
        state,
        &ApiRequest {
            method,
            url: &url,
            caller: caller.as_deref(),
            bearer: bearer.as_deref(),
            body: &body,
        },
    );
    respond(req, reply);
}

fn bind(addr: &str) -> Result<Server, ServerError> {
    Server::http(addr).map_err(|e| ServerError::Bind {
        addr: addr.to_owned(),
        reason: e.to_string(),
    })
}

/// Serve requests until a shutdown signal arrives, blocking the current thread.
///
/// Requests are handled one at a time, so mutations are applied in arrival order.
pub fn run_server(state: &Arc<AppState>, addr: &str) -> Result<(), ServerError> {
    let server = bind(addr)?;
    info!("listening on {addr}");

    while !shutdown_requested() {
        match server.recv_timeout(Duration::from_millis(250)) {
            Ok(Some(request)) => handle_request(state, request),
            Ok(None) => {}
            Err(e) => {
                error!("failed to accept request: {e}");
                return Err(e.into());
            }
        }
    }
    info!("shutdown requested, server stopped");
    Ok(())
}

/// A test helper that starts a shipledger-server on a random port in a background thread.
///
/// The server listens on `127.0.0.1:{port}` and keeps its ledger in `data_dir`.
/// Dropping the `TestServer` stops the server and releases the ledger.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub data_dir: PathBuf,
    server: Arc<Server>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl TestServer {
    pub fn start(data_dir: PathBuf) -> Result<Self, ServerError> {
        Self::start_with_token(data_dir, None)
    }

    pub fn start_with_token(
        data_dir: PathBuf,
        auth_token: Option<String>,
    ) -> Result<Self, ServerError> {
        let config = ServerConfig {
            data_dir: data_dir.clone(),
            auth_token,
            ..ServerConfig::default()
        };
        let state = Arc::new(AppState::open(&config)?);

        let addr = "127.0.0.1:0";
        let server = Arc::new(bind(addr)?);
        let port = server
            .server_addr()
            .to_ip()
            .map(|a| a.port())
            .ok_or_else(|| ServerError::Bind {
                addr: addr.to_owned(),
                reason: "listener has no IP address".to_owned(),
            })?;

        let srv = Arc::clone(&server);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&state, request);
            }
        });

        Ok(Self {
            url: format!("http://127.0.0.1:{port}"),
            port,
            data_dir,
            server,
            handle: Some(handle),
        })
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
