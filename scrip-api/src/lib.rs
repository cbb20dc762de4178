//! JSON-RPC surface over HTTP
//!
//! One POST endpoint carrying JSON-RPC requests, behind HTTP Basic auth.
//! Read methods run against a read-only store handle; write methods compose
//! unsigned transactions or forward a signed one to the chain node. The
//! server never mutates the ledger.

mod methods;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use scrip_chain::compose::DataEncoding;
use scrip_chain::ChainRpc;
use scrip_ledger::Store;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub rpc_user: String,
    pub rpc_password: String,
    pub prefix: Vec<u8>,
    pub address_version: u8,
    pub unspendable: String,
    /// Default payload encoding for composed transactions.
    pub multisig: bool,
    pub testnet: bool,
}

impl ApiConfig {
    fn encoding(&self, multisig: Option<bool>) -> DataEncoding {
        if multisig.unwrap_or(self.multisig) {
            DataEncoding::Multisig
        } else {
            DataEncoding::OpReturn
        }
    }
}

pub struct ApiContext {
    pub store: Mutex<Store>,
    pub chain: Box<dyn ChainRpc + Send + Sync>,
    pub config: ApiConfig,
}

/// JSON-RPC error codes used by the surface.
const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug)]
pub(crate) struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    pub(crate) fn invalid_params(message: impl Into<String>) -> Self {
        RpcError {
            code: INVALID_PARAMS,
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        RpcError {
            code: INTERNAL_ERROR,
            message: message.into(),
        }
    }
}

impl From<scrip_ledger::Error> for RpcError {
    fn from(err: scrip_ledger::Error) -> Self {
        RpcError::internal(err.to_string())
    }
}

impl From<scrip_chain::Error> for RpcError {
    fn from(err: scrip_chain::Error) -> Self {
        RpcError::internal(err.to_string())
    }
}

impl From<scrip_messages::Error> for RpcError {
    fn from(err: scrip_messages::Error) -> Self {
        RpcError::invalid_params(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

/// Runs the server on the current thread until the process exits.
pub fn serve_blocking(context: ApiContext, addr: SocketAddr) -> Result<(), Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let app = Router::new()
            .route("/jsonrpc", post(handle))
            .with_state(Arc::new(context));

        info!(%addr, "api listening");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    })
}

fn authorized(context: &ApiContext, headers: &HeaderMap) -> bool {
    let expected = format!(
        "Basic {}",
        BASE64.encode(format!(
            "{}:{}",
            context.config.rpc_user, context.config.rpc_password
        ))
    );
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == expected)
        .unwrap_or(false)
}

async fn handle(
    State(context): State<Arc<ApiContext>>,
    headers: HeaderMap,
    body: String,
) -> axum::response::Response {
    if !authorized(&context, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"scrip\"")],
            Json(json!({"error": "unauthorized"})),
        )
            .into_response();
    }

    let response = match serde_json::from_str::<RpcRequest>(&body) {
        Err(err) => json!({
            "jsonrpc": "2.0",
            "id": Value::Null,
            "error": { "code": PARSE_ERROR, "message": err.to_string() },
        }),
        Ok(request) => {
            debug!(method = %request.method, "api request");
            let id = request.id.clone();
            match dispatch(&context, &request) {
                Ok(result) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": result,
                }),
                Err(err) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": err.code, "message": err.message },
                }),
            }
        }
    };

    Json(response).into_response()
}

pub(crate) fn dispatch(context: &ApiContext, request: &RpcRequest) -> Result<Value, RpcError> {
    let params = &request.params;

    match request.method.as_str() {
        // read surface
        "get_balances" => methods::get_entity(context, "balances", params),
        "get_credits" => methods::get_entity(context, "credits", params),
        "get_debits" => methods::get_entity(context, "debits", params),
        "get_sends" => methods::get_entity(context, "sends", params),
        "get_orders" => methods::get_entity(context, "orders", params),
        "get_order_matches" => methods::get_entity(context, "order_matches", params),
        "get_btcpays" => methods::get_entity(context, "btcpays", params),
        "get_issuances" => methods::get_entity(context, "issuances", params),
        "get_broadcasts" => methods::get_entity(context, "broadcasts", params),
        "get_bets" => methods::get_entity(context, "bets", params),
        "get_bet_matches" => methods::get_entity(context, "bet_matches", params),
        "get_dividends" => methods::get_entity(context, "dividends", params),
        "get_burns" => methods::get_entity(context, "burns", params),
        "get_cancels" => methods::get_entity(context, "cancels", params),
        "get_callbacks" => methods::get_entity(context, "callbacks", params),
        "get_messages" => methods::get_messages(context, params),
        "get_asset_info" => methods::get_asset_info(context, params),
        "get_asset_names" => methods::get_asset_names(context),
        "get_block_info" => methods::get_block_info(context, params),
        "get_running_info" => methods::get_running_info(context),
        "get_element_counts" => methods::get_element_counts(context),
        "xcp_supply" => methods::xcp_supply(context),

        // write surface
        "create_send" => methods::create_send(context, params),
        "create_order" => methods::create_order(context, params),
        "create_btcpay" => methods::create_btcpay(context, params),
        "create_issuance" => methods::create_issuance(context, params),
        "create_broadcast" => methods::create_broadcast(context, params),
        "create_bet" => methods::create_bet(context, params),
        "create_dividend" => methods::create_dividend(context, params),
        "create_burn" => methods::create_burn(context, params),
        "create_cancel" => methods::create_cancel(context, params),
        "create_callback" => methods::create_callback(context, params),
        "transmit" => methods::transmit(context, params),

        other => Err(RpcError {
            code: METHOD_NOT_FOUND,
            message: format!("unknown method {other}"),
        }),
    }
}
