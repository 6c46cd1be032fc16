/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The JSONSQL Client contract.
//!
//! Transport, authentication, and retry are someone else's problem: this
//! module only describes the request/result shapes the core emits and
//! consumes, and the trait the core calls through.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thiserror::Error;

/// A JSONSQL request document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JsonSqlRequest {
    pub method: &'static str,
    pub params: JsonSqlParams,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JsonSqlParams {
    pub data: Vec<String>,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#where: Option<Where>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

/// The small `where` dialect the Manager translates `sync_config.where` into,
/// and emits directly for incremental checkpoints (`gt`).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Where {
    Eq(String, JsonValue),
    Like(String, String),
    Gt(String, JsonValue),
    And(Vec<Where>),
}

impl JsonSqlRequest {
    pub fn select(params: JsonSqlParams) -> Self {
        Self {
            method: "select",
            params,
        }
    }
}

/// The result of executing a request: a list of positional rows.
#[derive(Debug, Clone, Default)]
pub struct JsonSqlResult {
    pub rows: Vec<Vec<JsonValue>>,
}

impl JsonSqlResult {
    pub fn single_row(row: Vec<JsonValue>) -> Self {
        Self { rows: vec![row] }
    }

    /// The shape `{method:"select", params:{data:["COUNT(*)"], ...}}` returns
    /// for a scalar aggregate: one row, one column.
    pub fn scalar(&self) -> Option<&JsonValue> {
        self.rows.first().and_then(|r| r.first())
    }
}

#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Network/timeout failures; retryable at the caller's discretion, but
    /// the Manager treats the final outcome as fatal for the run.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server returned a structured error payload.
    #[error("api error: {0}")]
    Api(String),

    /// A distinguished sub-kind of `Api` for 403-equivalent responses. The
    /// Manager treats this as a permanent per-table condition.
    #[error("access denied: {0}")]
    AccessDenied(String),
}

/// Contract the core calls to execute a JSONSQL request and receive a
/// result. Implementations own transport, auth, retry, and timeouts.
pub trait JsonSqlClient: Send + Sync {
    fn execute(&self, request: &JsonSqlRequest) -> Result<JsonSqlResult, ClientError>;
}

/// Convenience helpers for building the request shapes the core needs,
/// kept here rather than scattered across `introspect.rs`/`manager.rs`.
pub fn select_star(from: &str, limit: Option<u64>) -> JsonSqlRequest {
    JsonSqlRequest::select(JsonSqlParams {
        data: vec!["*".to_string()],
        from: from.to_string(),
        limit,
        ..Default::default()
    })
}

pub fn select_count(from: &str) -> JsonSqlRequest {
    JsonSqlRequest::select(JsonSqlParams {
        data: vec!["COUNT(*)".to_string()],
        from: from.to_string(),
        ..Default::default()
    })
}

pub fn select_min_max(from: &str, column: &str) -> JsonSqlRequest {
    JsonSqlRequest::select(JsonSqlParams {
        data: vec![format!("MIN({column})"), format!("MAX({column})")],
        from: from.to_string(),
        ..Default::default()
    })
}

pub fn select_chunk(
    from: &str,
    r#where: Option<Where>,
    limit: u64,
    offset: u64,
    order_by: &str,
) -> JsonSqlRequest {
    JsonSqlRequest::select(JsonSqlParams {
        data: vec!["*".to_string()],
        from: from.to_string(),
        r#where,
        limit: Some(limit),
        offset: Some(offset),
        order_by: Some(order_by.to_string()),
    })
}

pub fn select_incremental(
    from: &str,
    incremental_field: &str,
    last_value: JsonValue,
    limit: Option<u64>,
) -> JsonSqlRequest {
    JsonSqlRequest::select(JsonSqlParams {
        data: vec!["*".to_string()],
        from: from.to_string(),
        r#where: Some(Where::Gt(incremental_field.to_string(), last_value)),
        limit,
        offset: None,
        order_by: Some(incremental_field.to_string()),
    })
}

/// A column-wise select used by the Validator.
pub fn select_column(from: &str, column: &str, limit: u64) -> JsonSqlRequest {
    JsonSqlRequest::select(JsonSqlParams {
        data: vec![column.to_string()],
        from: from.to_string(),
        limit: Some(limit),
        ..Default::default()
    })
}

/// Placeholder value map used by `select_min_max` results when a caller
/// needs to associate results back with column names (timestamp ranges).
pub type TimestampRanges = BTreeMap<String, (JsonValue, JsonValue)>;
