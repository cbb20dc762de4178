//! The individual JSON-RPC methods.

use scrip_chain::compose::{self, REGULAR_DUST_SIZE};
use scrip_ledger::query::{self, Combine, Filter, OrderDir, SelectSpec};
use scrip_ledger::Ledger;
use scrip_messages as messages;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{ApiContext, RpcError};

fn parse<T: DeserializeOwned>(params: &Value) -> Result<T, RpcError> {
    let source = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(source).map_err(|err| RpcError::invalid_params(err.to_string()))
}

/// Filters arrive either as one `{field, op, value}` object or as a list.
fn parse_filters(raw: &Value) -> Result<Vec<Filter>, RpcError> {
    match raw {
        Value::Null => Ok(vec![]),
        Value::Object(_) => Ok(vec![serde_json::from_value(raw.clone())
            .map_err(|err| RpcError::invalid_params(err.to_string()))?]),
        Value::Array(_) => serde_json::from_value(raw.clone())
            .map_err(|err| RpcError::invalid_params(err.to_string())),
        _ => Err(RpcError::invalid_params("filters must be a list or object")),
    }
}

#[derive(Debug, Default, Deserialize)]
struct EntityParams {
    #[serde(default)]
    filters: Value,
    #[serde(default)]
    is_valid: Option<bool>,
    #[serde(default)]
    order_by: Option<String>,
    #[serde(default)]
    order_dir: Option<OrderDir>,
    #[serde(default)]
    start_block: Option<u32>,
    #[serde(default)]
    end_block: Option<u32>,
    #[serde(default)]
    filterop: Option<Combine>,
}

pub(crate) fn get_entity(
    context: &ApiContext,
    entity: &str,
    params: &Value,
) -> Result<Value, RpcError> {
    let params: EntityParams = parse(params)?;

    let spec = SelectSpec {
        filters: parse_filters(&params.filters)?,
        filterop: params.filterop.unwrap_or_default(),
        order_by: params.order_by,
        order_dir: params.order_dir.unwrap_or_default(),
        start_block: params.start_block,
        end_block: params.end_block,
        validity: params
            .is_valid
            .unwrap_or(true)
            .then(|| "valid".to_owned()),
    };

    let store = context.store.lock().map_err(|_| RpcError::internal("store lock poisoned"))?;
    let rows = query::select(store.conn(), entity, &spec)?;
    Ok(Value::Array(rows))
}

pub(crate) fn get_messages(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        block_index: u32,
    }
    let params: Params = parse(params)?;

    let spec = SelectSpec {
        filters: vec![Filter {
            field: "block_index".into(),
            op: "==".parse().map_err(|_| RpcError::internal("bad op"))?,
            value: json!(params.block_index),
        }],
        order_by: Some("message_index".into()),
        ..Default::default()
    };

    let store = context.store.lock().map_err(|_| RpcError::internal("store lock poisoned"))?;
    let rows = query::select(store.conn(), "messages", &spec)?;
    Ok(Value::Array(rows))
}

pub(crate) fn get_asset_info(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        asset: String,
    }
    let params: Params = parse(params)?;

    let store = context.store.lock().map_err(|_| RpcError::internal("store lock poisoned"))?;
    let ledger = Ledger::new(store.conn());

    if params.asset == messages::assets::BTC || params.asset == messages::assets::XCP {
        let total = if params.asset == messages::assets::XCP {
            Some(ledger.xcp_supply()?)
        } else {
            None
        };
        return Ok(json!({
            "asset": params.asset,
            "owner": Value::Null,
            "divisible": true,
            "locked": false,
            "total_issued": total,
            "callable": false,
            "call_date": Value::Null,
            "call_price": Value::Null,
            "description": "",
            "issuer": Value::Null,
        }));
    }

    let issuances = ledger.valid_issuances(&params.asset)?;
    let last = match issuances.last() {
        Some(last) => last,
        None => return Ok(Value::Null),
    };

    Ok(json!({
        "asset": params.asset,
        "owner": last.issuer,
        "divisible": last.divisible,
        "locked": issuances.iter().any(|row| row.locked),
        "total_issued": ledger.asset_issued(&params.asset)?,
        "callable": last.callable,
        "call_date": last.call_date,
        "call_price": last.call_price,
        "description": last.description,
        "issuer": last.issuer,
    }))
}

pub(crate) fn get_asset_names(context: &ApiContext) -> Result<Value, RpcError> {
    let store = context.store.lock().map_err(|_| RpcError::internal("store lock poisoned"))?;
    let names = Ledger::new(store.conn()).asset_names()?;
    Ok(json!(names))
}

pub(crate) fn get_block_info(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        block_index: u32,
    }
    let params: Params = parse(params)?;

    let store = context.store.lock().map_err(|_| RpcError::internal("store lock poisoned"))?;
    let block = Ledger::new(store.conn())
        .block_at(params.block_index)?
        .ok_or_else(|| RpcError::internal("no such block"))?;
    Ok(json!({
        "block_index": block.block_index,
        "block_hash": block.block_hash,
        "block_time": block.block_time,
    }))
}

pub(crate) fn get_running_info(context: &ApiContext) -> Result<Value, RpcError> {
    let chain_height = context.chain.get_block_count().ok();

    let store = context.store.lock().map_err(|_| RpcError::internal("store lock poisoned"))?;
    let store_minor = store.minor_version().ok();
    let last_block = Ledger::new(store.conn()).last_block()?;

    let caught_up = match (&last_block, chain_height) {
        (Some(block), Some(height)) => block.block_index >= height,
        _ => false,
    };

    Ok(json!({
        "db_caught_up": caught_up,
        "bitcoin_block_count": chain_height,
        "last_block": last_block.map(|b| json!({
            "block_index": b.block_index,
            "block_hash": b.block_hash,
            "block_time": b.block_time,
        })),
        "running_testnet": context.config.testnet,
        "db_version_major": scrip_ledger::DB_VERSION_MAJOR,
        "db_version_minor": store_minor,
    }))
}

pub(crate) fn get_element_counts(context: &ApiContext) -> Result<Value, RpcError> {
    let store = context.store.lock().map_err(|_| RpcError::internal("store lock poisoned"))?;
    let counts = Ledger::new(store.conn()).element_counts()?;
    Ok(Value::Object(
        counts
            .into_iter()
            .map(|(table, count)| (table, json!(count)))
            .collect(),
    ))
}

pub(crate) fn xcp_supply(context: &ApiContext) -> Result<Value, RpcError> {
    let store = context.store.lock().map_err(|_| RpcError::internal("store lock poisoned"))?;
    let supply = Ledger::new(store.conn()).xcp_supply()?;
    Ok(json!(supply))
}

// ----------------------------------------------------------------------
// write surface

fn composed(
    context: &ApiContext,
    destination: Option<(&str, i64)>,
    type_id: u32,
    body: &[u8],
    multisig: Option<bool>,
) -> Result<Value, RpcError> {
    let mut payload = type_id.to_be_bytes().to_vec();
    payload.extend_from_slice(body);

    let hex_tx = compose::unsigned_transaction(
        destination,
        &payload,
        context.config.encoding(multisig),
        &context.config.compose_params(),
    )?;
    Ok(json!(hex_tx))
}

impl crate::ApiConfig {
    pub(crate) fn compose_params(&self) -> compose::ComposeParams {
        compose::ComposeParams {
            prefix: self.prefix.clone(),
            address_version: self.address_version,
        }
    }
}

pub(crate) fn create_send(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        destination: String,
        asset: String,
        quantity: u64,
        #[serde(default)]
        multisig: Option<bool>,
    }
    let params: Params = parse(params)?;

    let body = messages::send::Send {
        asset: params.asset,
        amount: params.quantity,
    }
    .pack()?;
    composed(
        context,
        Some((&params.destination, REGULAR_DUST_SIZE)),
        messages::send::ID,
        &body,
        params.multisig,
    )
}

pub(crate) fn create_order(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        give_asset: String,
        give_quantity: u64,
        get_asset: String,
        get_quantity: u64,
        expiration: u16,
        #[serde(default)]
        fee_required: u64,
        #[serde(default)]
        multisig: Option<bool>,
    }
    let params: Params = parse(params)?;

    let body = messages::order::Order {
        give_asset: params.give_asset,
        give_amount: params.give_quantity,
        get_asset: params.get_asset,
        get_amount: params.get_quantity,
        expiration: params.expiration,
        fee_required: params.fee_required,
    }
    .pack()?;
    composed(context, None, messages::order::ID, &body, params.multisig)
}

pub(crate) fn create_btcpay(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        order_match_id: String,
        #[serde(default)]
        multisig: Option<bool>,
    }
    let params: Params = parse(params)?;

    if params.order_match_id.len() != 128 || !params.order_match_id.is_ascii() {
        return Err(RpcError::invalid_params("order match id must be 128 hex chars"));
    }

    // The composed transaction must itself pay the BTC leg.
    let (destination, owed) = {
        let store = context.store.lock().map_err(|_| RpcError::internal("store lock poisoned"))?;
        let ledger = Ledger::new(store.conn());
        let order_match = ledger
            .order_match(&params.order_match_id)?
            .ok_or_else(|| RpcError::invalid_params("no such order match"))?;
        if order_match.forward_asset == messages::assets::BTC {
            (order_match.tx1_address, order_match.forward_amount)
        } else {
            (order_match.tx0_address, order_match.backward_amount)
        }
    };

    let body = messages::btcpay::BtcPay {
        tx0_hash: params.order_match_id[..64].to_owned(),
        tx1_hash: params.order_match_id[64..].to_owned(),
    }
    .pack()?;
    composed(
        context,
        Some((&destination, owed)),
        messages::btcpay::ID,
        &body,
        params.multisig,
    )
}

pub(crate) fn create_issuance(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        asset: String,
        quantity: u64,
        divisible: bool,
        #[serde(default)]
        description: String,
        #[serde(default)]
        callable: bool,
        #[serde(default)]
        call_date: u32,
        #[serde(default)]
        call_price: f32,
        #[serde(default)]
        transfer_destination: Option<String>,
        #[serde(default)]
        multisig: Option<bool>,
    }
    let params: Params = parse(params)?;

    let body = messages::issuance::Issuance {
        asset: params.asset,
        amount: params.quantity,
        divisible: params.divisible,
        callable: params.callable,
        call_date: params.call_date,
        call_price: params.call_price,
        description: params.description,
    }
    .pack()?;

    let destination = params
        .transfer_destination
        .as_deref()
        .map(|destination| (destination, REGULAR_DUST_SIZE));
    composed(context, destination, messages::issuance::ID, &body, params.multisig)
}

pub(crate) fn create_broadcast(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        timestamp: u32,
        #[serde(default = "default_value")]
        value: f64,
        fee_fraction: f64,
        text: String,
        #[serde(default)]
        multisig: Option<bool>,
    }
    fn default_value() -> f64 {
        -1.0
    }
    let params: Params = parse(params)?;

    let fee_fraction_int = (params.fee_fraction * messages::UNIT as f64).round_ties_even();
    if !(0.0..=u32::MAX as f64).contains(&fee_fraction_int) {
        return Err(RpcError::invalid_params("fee fraction out of range"));
    }

    let body = messages::broadcast::Broadcast {
        timestamp: params.timestamp,
        value: params.value,
        fee_fraction_int: fee_fraction_int as u32,
        text: params.text,
    }
    .pack()?;
    composed(context, None, messages::broadcast::ID, &body, params.multisig)
}

pub(crate) fn create_bet(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        feed_address: String,
        bet_type: u16,
        deadline: u32,
        wager: u64,
        counterwager: u64,
        expiration: u16,
        #[serde(default)]
        target_value: f64,
        #[serde(default = "default_leverage")]
        leverage: u16,
        #[serde(default)]
        multisig: Option<bool>,
    }
    fn default_leverage() -> u16 {
        messages::bet::LEVERAGE_UNIT
    }
    let params: Params = parse(params)?;

    let body = messages::bet::Bet {
        bet_type: params.bet_type,
        deadline: params.deadline,
        wager_amount: params.wager,
        counterwager_amount: params.counterwager,
        target_value: params.target_value,
        leverage: params.leverage,
        expiration: params.expiration,
    }
    .pack()?;
    composed(
        context,
        Some((&params.feed_address, REGULAR_DUST_SIZE)),
        messages::bet::ID,
        &body,
        params.multisig,
    )
}

pub(crate) fn create_dividend(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        quantity_per_unit: u64,
        asset: String,
        #[serde(default)]
        multisig: Option<bool>,
    }
    let params: Params = parse(params)?;

    let body = messages::dividend::Dividend {
        amount_per_unit: params.quantity_per_unit,
        asset: params.asset,
    }
    .pack()?;
    composed(context, None, messages::dividend::ID, &body, params.multisig)
}

pub(crate) fn create_burn(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        quantity: i64,
    }
    let params: Params = parse(params)?;

    let hex_tx = compose::unsigned_transaction(
        Some((&context.config.unspendable, params.quantity)),
        &[],
        context.config.encoding(None),
        &context.config.compose_params(),
    )?;
    Ok(json!(hex_tx))
}

pub(crate) fn create_cancel(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        offer_hash: String,
        #[serde(default)]
        multisig: Option<bool>,
    }
    let params: Params = parse(params)?;

    let body = messages::cancel::Cancel {
        offer_hash: params.offer_hash,
    }
    .pack()?;
    composed(context, None, messages::cancel::ID, &body, params.multisig)
}

pub(crate) fn create_callback(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        fraction: f64,
        asset: String,
        #[serde(default)]
        multisig: Option<bool>,
    }
    let params: Params = parse(params)?;

    let body = messages::callback::Callback {
        fraction: params.fraction,
        asset: params.asset,
    }
    .pack()?;
    composed(context, None, messages::callback::ID, &body, params.multisig)
}

pub(crate) fn transmit(context: &ApiContext, params: &Value) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct Params {
        unsigned_tx_hex: String,
    }
    let params: Params = parse(params)?;

    let txid = context.chain.send_raw_transaction(&params.unsigned_tx_hex)?;
    Ok(json!(txid))
}
