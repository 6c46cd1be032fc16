/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Validator: quantifies how well a claimed
//! `{position -> remote_column}` mapping holds against sampled data. Purely
//! advisory — never mutates a schema.

use crate::client::{select_column, select_star, JsonSqlClient};
use serde_json::Value as JsonValue;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeFamily {
    Integer,
    Float,
    Boolean,
    Datetime,
    String,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct FieldValidation {
    pub remote_column: String,
    pub match_ratio: f64,
    pub sample_size: usize,
    pub validated_at: String,
    pub dtype: DtypeFamily,
    pub null_count: usize,
    pub unique_count: usize,
    pub min_value: Option<JsonValue>,
    pub max_value: Option<JsonValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Confirmed,
    Suspect,
    Rejected,
}

impl FieldValidation {
    pub fn outcome(&self) -> ValidationOutcome {
        if self.match_ratio >= 0.95 {
            ValidationOutcome::Confirmed
        } else if self.match_ratio >= 0.80 {
            ValidationOutcome::Suspect
        } else {
            ValidationOutcome::Rejected
        }
    }
}

/// Validate a single `(position, remote_column)` mapping.
pub fn validate_field_mapping(
    client: &dyn JsonSqlClient,
    table: &str,
    position: u32,
    remote_column: &str,
    sample_size: u64,
) -> crate::error::Result<FieldValidation> {
    let local_rows = client
        .execute(&select_star(table, Some(sample_size)))
        .map_err(crate::error::Error::from)?;
    let remote_rows = client
        .execute(&select_column(table, remote_column, sample_size))
        .map_err(crate::error::Error::from)?;

    let local_values: Vec<Option<&JsonValue>> = local_rows
        .rows
        .iter()
        .map(|row| row.get(position as usize))
        .collect();
    let remote_values: Vec<Option<&JsonValue>> =
        remote_rows.rows.iter().map(|row| row.first()).collect();

    let n = local_values.len().min(remote_values.len());
    let matches = (0..n)
        .filter(|&i| values_match(local_values[i], remote_values[i]))
        .count();
    let match_ratio = if n == 0 { 0.0 } else { matches as f64 / n as f64 };

    let sampled: Vec<&JsonValue> = remote_rows.rows.iter().filter_map(|r| r.first()).collect();
    let null_count = sampled.iter().filter(|v| v.is_null()).count();
    let dtype = infer_dtype_family(&sampled);
    let unique_count = sampled
        .iter()
        .map(|v| v.to_string())
        .collect::<HashSet<_>>()
        .len();
    let (min_value, max_value) = match dtype {
        DtypeFamily::Integer | DtypeFamily::Float | DtypeFamily::Datetime => min_max(&sampled),
        _ => (None, None),
    };

    Ok(FieldValidation {
        remote_column: remote_column.to_string(),
        match_ratio,
        sample_size: n,
        validated_at: crate::db::format_unix_timestamp(crate::db::now_unix_secs()),
        dtype,
        null_count,
        unique_count,
        min_value,
        max_value,
    })
}

/// Batch variant over a full `{position -> remote_column}` mapping; each
/// field's failure is captured rather than aborting the batch.
pub fn validate_table_schema(
    client: &dyn JsonSqlClient,
    table: &str,
    field_mappings: &std::collections::BTreeMap<u32, String>,
    sample_size: u64,
) -> std::collections::BTreeMap<u32, crate::error::Result<FieldValidation>> {
    field_mappings
        .iter()
        .map(|(position, column)| {
            (
                *position,
                validate_field_mapping(client, table, *position, column, sample_size),
            )
        })
        .collect()
}

fn values_match(a: Option<&JsonValue>, b: Option<&JsonValue>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) if a.is_null() && b.is_null() => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn infer_dtype_family(values: &[&JsonValue]) -> DtypeFamily {
    for v in values {
        match v {
            JsonValue::Null => continue,
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => return DtypeFamily::Integer,
            JsonValue::Number(_) => return DtypeFamily::Float,
            JsonValue::Bool(_) => return DtypeFamily::Boolean,
            JsonValue::String(s) if crate::transform::looks_like_iso8601(s) => {
                return DtypeFamily::Datetime
            }
            JsonValue::String(_) => return DtypeFamily::String,
            _ => return DtypeFamily::Unknown,
        }
    }
    DtypeFamily::Unknown
}

fn min_max(values: &[&JsonValue]) -> (Option<JsonValue>, Option<JsonValue>) {
    let non_null: Vec<&JsonValue> = values.iter().filter(|v| !v.is_null()).copied().collect();
    if non_null.is_empty() {
        return (None, None);
    }
    let min = non_null
        .iter()
        .min_by(|a, b| compare_json(a, b))
        .map(|v| (*v).clone());
    let max = non_null
        .iter()
        .max_by(|a, b| compare_json(a, b))
        .map(|v| (*v).clone());
    (min, max)
}

fn compare_json(a: &JsonValue, b: &JsonValue) -> std::cmp::Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::{ClientError, JsonSqlRequest, JsonSqlResult};
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeClient {
        responses: RefCell<HashMap<String, JsonSqlResult>>,
    }

    impl JsonSqlClient for FakeClient {
        fn execute(&self, request: &JsonSqlRequest) -> Result<JsonSqlResult, ClientError> {
            let key = format!("{}:{:?}", request.params.from, request.params.data);
            self.responses
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| ClientError::Api(format!("no fixture for {key}")))
        }
    }

    #[test]
    fn confirmed_when_values_line_up() {
        let mut responses = HashMap::new();
        responses.insert(
            "users:[\"*\"]".to_string(),
            JsonSqlResult {
                rows: vec![
                    vec![JsonValue::from(1), JsonValue::String("a".into())],
                    vec![JsonValue::from(2), JsonValue::String("b".into())],
                ],
            },
        );
        responses.insert(
            "users:[\"name\"]".to_string(),
            JsonSqlResult {
                rows: vec![
                    vec![JsonValue::String("a".into())],
                    vec![JsonValue::String("b".into())],
                ],
            },
        );
        let client = FakeClient {
            responses: RefCell::new(responses),
        };
        let validation = validate_field_mapping(&client, "users", 1, "name", 10).unwrap();
        assert_eq!(validation.outcome(), ValidationOutcome::Confirmed);
        assert_eq!(validation.match_ratio, 1.0);
        assert!(!validation.validated_at.is_empty());
    }
}
