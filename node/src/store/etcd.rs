// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! etcd v3 adapter over the JSON gRPC gateway.
//!
//! Keys and values travel base64 encoded, 64-bit integers as decimal strings.
//! A key's version is its `mod_revision`; a missing key compares as 0.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use super::{ConsensusStore, StoreError, StoreResult, TxnOutcome, Versioned, WriteOp};

const RANGE_PATH: &str = "/v3/kv/range";
const TXN_PATH: &str = "/v3/kv/txn";

pub struct EtcdStore {
    client: reqwest::Client,
    endpoints: Vec<String>,
    /// Index of the last endpoint that answered.
    preferred: AtomicUsize,
}

impl EtcdStore {
    pub fn new(endpoints: Vec<String>) -> Self {
        let endpoints = endpoints
            .into_iter()
            .map(|e| {
                let e = e.trim_end_matches('/');
                if e.starts_with("http://") || e.starts_with("https://") {
                    e.to_string()
                } else {
                    format!("http://{}", e)
                }
            })
            .collect();

        Self {
            client: reqwest::Client::new(),
            endpoints,
            preferred: AtomicUsize::new(0),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn call<T: DeserializeOwned>(&self, path: &str, body: &Value, timeout: Duration) -> StoreResult<T> {
        let count = self.endpoints.len();
        if count == 0 {
            return Err(StoreError::Unavailable("no etcd endpoints configured".into()));
        }

        let start = self.preferred.load(Ordering::Relaxed) % count;
        let mut last_err = StoreError::Unavailable("no endpoint answered".into());

        for offset in 0..count {
            let idx = (start + offset) % count;
            let url = format!("{}{}", self.endpoints[idx], path);

            match self.client.post(&url).timeout(timeout).json(body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    self.preferred.store(idx, Ordering::Relaxed);
                    return resp.json::<T>().await.map_err(|e| StoreError::Corrupt {
                        key: url,
                        reason: e.to_string(),
                    });
                }
                Ok(resp) => {
                    tracing::warn!("etcd endpoint {} answered {}", url, resp.status());
                    last_err = StoreError::Unavailable(format!("{} answered {}", url, resp.status()));
                }
                // The call may have landed; trying another endpoint would double the wait.
                Err(e) if e.is_timeout() => return Err(StoreError::Timeout(timeout)),
                Err(e) => {
                    tracing::warn!("etcd endpoint {} unreachable: {}", url, e);
                    last_err = StoreError::Unavailable(e.to_string());
                }
            }
        }

        Err(last_err)
    }
}

impl ConsensusStore for EtcdStore {
    fn name(&self) -> &'static str {
        "etcd"
    }

    fn get<'a>(&'a self, key: &'a str, timeout: Duration) -> BoxFuture<'a, StoreResult<Option<Versioned>>> {
        async move {
            let resp: RangeResponse = self.call(RANGE_PATH, &range_request(key), timeout).await?;
            parse_range(key, resp)
        }
        .boxed()
    }

    fn transactional_write(&self, ops: Vec<WriteOp>, timeout: Duration) -> BoxFuture<'_, StoreResult<TxnOutcome>> {
        async move {
            let resp: TxnResponse = self.call(TXN_PATH, &txn_request(&ops), timeout).await?;
            Ok(if resp.succeeded {
                TxnOutcome::Committed
            } else {
                TxnOutcome::Conflict
            })
        }
        .boxed()
    }
}

fn range_request(key: &str) -> Value {
    json!({ "key": STANDARD.encode(key) })
}

fn txn_request(ops: &[WriteOp]) -> Value {
    let compare: Vec<Value> = ops
        .iter()
        .map(|op| {
            json!({
                "key": STANDARD.encode(&op.key),
                "target": "MOD",
                "result": "EQUAL",
                "mod_revision": op.expected_version.to_string(),
            })
        })
        .collect();

    let success: Vec<Value> = ops
        .iter()
        .map(|op| {
            json!({
                "request_put": {
                    "key": STANDARD.encode(&op.key),
                    "value": STANDARD.encode(&op.value),
                }
            })
        })
        .collect();

    json!({ "compare": compare, "success": success, "failure": [] })
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    /// Absent when the stored value is empty.
    #[serde(default)]
    value: String,
    #[serde(default, deserialize_with = "int64")]
    mod_revision: u64,
}

#[derive(Debug, Deserialize)]
struct TxnResponse {
    /// The gateway omits `false` booleans.
    #[serde(default)]
    succeeded: bool,
}

fn parse_range(key: &str, resp: RangeResponse) -> StoreResult<Option<Versioned>> {
    let Some(kv) = resp.kvs.into_iter().next() else {
        return Ok(None);
    };
    let value = STANDARD.decode(kv.value.as_bytes()).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("value is not base64: {}", e),
    })?;
    Ok(Some(Versioned {
        value,
        version: kv.mod_revision,
    }))
}

/// int64 fields arrive as JSON strings, but accept bare numbers too.
fn int64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    match Raw::deserialize(d)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
