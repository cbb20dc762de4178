//! Dynamic read queries over a typed filter AST.
//!
//! The read API accepts `{field, op, value}` filters; fields and order
//! columns are whitelisted per entity and values are always bound, never
//! interpolated.

use std::str::FromStr;

use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Like,
}

impl FilterOp {
    fn sql(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::In => "IN",
            FilterOp::Like => "LIKE",
        }
    }
}

impl FromStr for FilterOp {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "==" => Ok(FilterOp::Eq),
            "!=" => Ok(FilterOp::Ne),
            "<" => Ok(FilterOp::Lt),
            "<=" => Ok(FilterOp::Le),
            ">" => Ok(FilterOp::Gt),
            ">=" => Ok(FilterOp::Ge),
            _ if s.eq_ignore_ascii_case("in") => Ok(FilterOp::In),
            _ if s.eq_ignore_ascii_case("like") => Ok(FilterOp::Like),
            _ => Err(()),
        }
    }
}

impl<'de> Deserialize<'de> for FilterOp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown filter op {raw}")))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combine {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct SelectSpec {
    pub filters: Vec<Filter>,
    pub filterop: Combine,
    pub order_by: Option<String>,
    pub order_dir: OrderDir,
    pub start_block: Option<u32>,
    pub end_block: Option<u32>,
    /// Restrict to rows with this validity, when the entity has one.
    pub validity: Option<String>,
}

struct Entity {
    table: &'static str,
    fields: &'static [&'static str],
    has_validity: bool,
    has_block_index: bool,
}

const ENTITIES: &[Entity] = &[
    Entity {
        table: "balances",
        fields: &["address", "asset", "amount"],
        has_validity: false,
        has_block_index: false,
    },
    Entity {
        table: "credits",
        fields: &["block_index", "address", "asset", "amount", "calling_function", "event"],
        has_validity: false,
        has_block_index: true,
    },
    Entity {
        table: "debits",
        fields: &["block_index", "address", "asset", "amount", "action", "event"],
        has_validity: false,
        has_block_index: true,
    },
    Entity {
        table: "sends",
        fields: &["tx_index", "tx_hash", "block_index", "source", "destination", "asset", "amount", "validity"],
        has_validity: true,
        has_block_index: true,
    },
    Entity {
        table: "orders",
        fields: &[
            "tx_index", "tx_hash", "block_index", "source", "give_asset", "give_amount",
            "give_remaining", "get_asset", "get_amount", "get_remaining", "expiration",
            "expire_index", "fee_required", "fee_provided", "validity",
        ],
        has_validity: true,
        has_block_index: true,
    },
    Entity {
        table: "order_matches",
        fields: &[
            "id", "tx0_index", "tx0_hash", "tx0_address", "tx1_index", "tx1_hash",
            "tx1_address", "forward_asset", "forward_amount", "backward_asset",
            "backward_amount", "tx0_block_index", "tx1_block_index", "tx0_expiration",
            "tx1_expiration", "match_expire_index", "validity",
        ],
        has_validity: true,
        has_block_index: false,
    },
    Entity {
        table: "btcpays",
        fields: &["tx_index", "tx_hash", "block_index", "source", "destination", "btc_amount", "order_match_id", "validity"],
        has_validity: true,
        has_block_index: true,
    },
    Entity {
        table: "issuances",
        fields: &[
            "tx_index", "tx_hash", "block_index", "asset", "amount", "divisible", "issuer",
            "transfer", "callable", "call_date", "call_price", "description", "fee_paid",
            "locked", "validity",
        ],
        has_validity: true,
        has_block_index: true,
    },
    Entity {
        table: "broadcasts",
        fields: &["tx_index", "tx_hash", "block_index", "source", "timestamp", "value", "fee_fraction_int", "text", "locked", "validity"],
        has_validity: true,
        has_block_index: true,
    },
    Entity {
        table: "bets",
        fields: &[
            "tx_index", "tx_hash", "block_index", "source", "feed_address", "bet_type",
            "deadline", "wager_amount", "wager_remaining", "counterwager_amount",
            "counterwager_remaining", "target_value", "leverage", "expiration",
            "expire_index", "fee_fraction_int", "validity",
        ],
        has_validity: true,
        has_block_index: true,
    },
    Entity {
        table: "bet_matches",
        fields: &[
            "id", "tx0_index", "tx0_hash", "tx0_address", "tx1_index", "tx1_hash",
            "tx1_address", "tx0_bet_type", "tx1_bet_type", "feed_address", "initial_value",
            "deadline", "target_value", "leverage", "forward_amount", "backward_amount",
            "tx0_block_index", "tx1_block_index", "tx0_expiration", "tx1_expiration",
            "match_expire_index", "fee_fraction_int", "validity",
        ],
        has_validity: true,
        has_block_index: false,
    },
    Entity {
        table: "dividends",
        fields: &["tx_index", "tx_hash", "block_index", "source", "asset", "amount_per_unit", "validity"],
        has_validity: true,
        has_block_index: true,
    },
    Entity {
        table: "burns",
        fields: &["tx_index", "tx_hash", "block_index", "source", "burned", "earned", "validity"],
        has_validity: true,
        has_block_index: true,
    },
    Entity {
        table: "cancels",
        fields: &["tx_index", "tx_hash", "block_index", "source", "offer_hash", "validity"],
        has_validity: true,
        has_block_index: true,
    },
    Entity {
        table: "callbacks",
        fields: &["tx_index", "tx_hash", "block_index", "source", "fraction", "asset", "validity"],
        has_validity: true,
        has_block_index: true,
    },
    Entity {
        table: "messages",
        fields: &["message_index", "block_index", "command", "category"],
        has_validity: false,
        has_block_index: true,
    },
];

/// Names of the entities the read surface exposes.
pub fn entity_names() -> impl Iterator<Item = &'static str> {
    ENTITIES.iter().map(|e| e.table)
}

fn entity(name: &str) -> Result<&'static Entity, Error> {
    ENTITIES
        .iter()
        .find(|e| e.table == name)
        .ok_or_else(|| Error::UnknownEntity(name.to_owned()))
}

fn bind_scalar(entity: &str, value: &Value) -> Result<SqlValue, Error> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(*b as i64)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(SqlValue::Real(f))
            } else {
                Err(Error::BadFilterValue(entity.to_owned()))
            }
        }
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        _ => Err(Error::BadFilterValue(entity.to_owned())),
    }
}

/// Runs a whitelisted select and returns rows as JSON objects.
pub fn select(conn: &Connection, name: &str, spec: &SelectSpec) -> Result<Vec<Value>, Error> {
    let entity = entity(name)?;

    let mut conditions: Vec<String> = vec![];
    let mut params: Vec<SqlValue> = vec![];

    for filter in &spec.filters {
        if !entity.fields.contains(&filter.field.as_str()) {
            return Err(Error::FieldNotAllowed {
                entity: entity.table.to_owned(),
                field: filter.field.clone(),
            });
        }

        match (&filter.op, &filter.value) {
            (FilterOp::In, Value::Array(items)) => {
                let mut holes = vec![];
                for item in items {
                    params.push(bind_scalar(entity.table, item)?);
                    holes.push(format!("?{}", params.len()));
                }
                conditions.push(format!("{} IN ({})", filter.field, holes.join(", ")));
            }
            (FilterOp::In, _) => return Err(Error::BadFilterValue(filter.field.clone())),
            (op, value) => {
                params.push(bind_scalar(entity.table, value)?);
                conditions.push(format!("{} {} ?{}", filter.field, op.sql(), params.len()));
            }
        }
    }

    let joiner = match spec.filterop {
        Combine::And => " AND ",
        Combine::Or => " OR ",
    };
    let mut where_clauses: Vec<String> = vec![];
    if !conditions.is_empty() {
        where_clauses.push(format!("({})", conditions.join(joiner)));
    }

    // Block-range and validity restrictions always AND onto the filters.
    if entity.has_block_index {
        if let Some(start) = spec.start_block {
            params.push(SqlValue::Integer(start as i64));
            where_clauses.push(format!("block_index >= ?{}", params.len()));
        }
        if let Some(end) = spec.end_block {
            params.push(SqlValue::Integer(end as i64));
            where_clauses.push(format!("block_index <= ?{}", params.len()));
        }
    }
    if entity.has_validity {
        if let Some(validity) = &spec.validity {
            params.push(SqlValue::Text(validity.clone()));
            where_clauses.push(format!("validity = ?{}", params.len()));
        }
    }

    let mut sql = format!("SELECT * FROM {}", entity.table);
    if !where_clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clauses.join(" AND "));
    }

    if let Some(order_by) = &spec.order_by {
        if !entity.fields.contains(&order_by.as_str()) {
            return Err(Error::FieldNotAllowed {
                entity: entity.table.to_owned(),
                field: order_by.clone(),
            });
        }
        let dir = match spec.order_dir {
            OrderDir::Asc => "ASC",
            OrderDir::Desc => "DESC",
        };
        sql.push_str(&format!(" ORDER BY {order_by} {dir}"));
    } else if entity.fields.contains(&"tx_index") {
        sql.push_str(" ORDER BY tx_index ASC");
    }

    let mut stmt = conn.prepare(&sql)?;
    let column_names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(|c| c.to_owned())
        .collect();

    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
    let mut out = vec![];
    while let Some(row) = rows.next()? {
        let mut object = Map::new();
        for (i, column) in column_names.iter().enumerate() {
            let value = match row.get_ref(i)? {
                rusqlite::types::ValueRef::Null => Value::Null,
                rusqlite::types::ValueRef::Integer(n) => Value::Number(n.into()),
                rusqlite::types::ValueRef::Real(f) => {
                    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
                }
                rusqlite::types::ValueRef::Text(t) => {
                    Value::String(String::from_utf8_lossy(t).into_owned())
                }
                rusqlite::types::ValueRef::Blob(b) => Value::String(hex::encode(b)),
            };
            object.insert(column.clone(), value);
        }
        out.push(Value::Object(object));
    }

    Ok(out)
}
