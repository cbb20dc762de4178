//! Thin JSON-RPC client for the underlying full node.
//!
//! Only the five queries the engine consumes are exposed, behind the
//! [`ChainRpc`] trait so the follower and the test suite can substitute a
//! scripted chain.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub time: u32,
    #[serde(default)]
    pub tx: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub vin: Vec<TxIn>,
    #[serde(default)]
    pub vout: Vec<TxOut>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxIn {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(default)]
    pub coinbase: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxOut {
    /// Value in whole coins, as the node reports it.
    pub value: f64,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub asm: String,
}

pub trait ChainRpc {
    fn get_block_count(&self) -> Result<u32, Error>;
    fn get_block_hash(&self, height: u32) -> Result<String, Error>;
    fn get_block(&self, hash: &str) -> Result<Block, Error>;
    fn get_raw_transaction(&self, txid: &str) -> Result<RawTransaction, Error>;
    fn send_raw_transaction(&self, hex: &str) -> Result<String, Error>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    code: i64,
    message: String,
}

pub struct HttpClient {
    url: String,
    user: String,
    password: String,
    http: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new(url: &str, user: &str, password: &str) -> Result<Self, Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(HttpClient {
            url: url.to_owned(),
            user: user.to_owned(),
            password: password.to_owned(),
            http,
        })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, Error> {
        debug!(method, %params, "chain rpc call");

        let body = json!({
            "jsonrpc": "1.0",
            "id": "scrip",
            "method": method,
            "params": params,
        });

        let envelope: Envelope = self
            .http
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()?
            .json()?;

        if let Some(err) = envelope.error {
            return Err(Error::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = envelope.result.ok_or(Error::MissingResult)?;
        Ok(serde_json::from_value(result)?)
    }
}

impl ChainRpc for HttpClient {
    fn get_block_count(&self) -> Result<u32, Error> {
        self.call("getblockcount", json!([]))
    }

    fn get_block_hash(&self, height: u32) -> Result<String, Error> {
        self.call("getblockhash", json!([height]))
    }

    fn get_block(&self, hash: &str) -> Result<Block, Error> {
        self.call("getblock", json!([hash]))
    }

    fn get_raw_transaction(&self, txid: &str) -> Result<RawTransaction, Error> {
        self.call("getrawtransaction", json!([txid, 1]))
    }

    fn send_raw_transaction(&self, hex: &str) -> Result<String, Error> {
        self.call("sendrawtransaction", json!([hex]))
    }
}
