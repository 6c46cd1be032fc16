/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Introspector: produces a `TableSchema` from a sampled
//! remote row, without any out-of-band description of the table.

use crate::client::{select_count, select_min_max, select_star, JsonSqlClient};
use crate::schema::{CacheStrategy, FieldDefinition, FieldType, SyncConfig, TableMetadata, TableSchema};
use crate::transform::looks_like_iso8601;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct IntrospectOptions {
    /// Caller-provided field name overrides, keyed by position.
    pub field_name_overrides: HashMap<u32, String>,
    pub gather_metadata: bool,
}

/// Produce a `TableSchema` (and, if requested, a `TableMetadata`) for
/// `table` by sampling one row and inferring types/names.
pub fn introspect_table(
    client: &dyn JsonSqlClient,
    table: &str,
    options: &IntrospectOptions,
) -> crate::error::Result<TableSchema> {
    let result = client
        .execute(&select_star(table, Some(1)))
        .map_err(crate::error::Error::from)?;
    let sample = result
        .rows
        .first()
        .ok_or_else(|| crate::error::Error::Configuration(format!("table {table} empty or missing")))?;

    let total_fields = sample.len() as u32;
    let mut schema = TableSchema::new(table, total_fields);

    for (position, value) in sample.iter().enumerate() {
        let position = position as u32;
        let field_type = infer_field_type(value);
        let name = options
            .field_name_overrides
            .get(&position)
            .cloned()
            .unwrap_or_else(|| infer_field_name(position, value, &field_type));
        schema
            .fields
            .insert(position, FieldDefinition::new(position, name, field_type));
    }

    let mut access_denied = false;
    let metadata = if options.gather_metadata {
        match gather_metadata(client, table, &schema) {
            MetadataOutcome::Metadata(m) => Some(m),
            MetadataOutcome::Unavailable => None,
            MetadataOutcome::AccessDenied => {
                access_denied = true;
                None
            }
        }
    } else {
        None
    };

    let mut sync_config = generate_sync_config(&schema, metadata.as_ref());
    if access_denied {
        // AccessDenied at registration-time metadata fetch is a permanent
        // per-table condition, not a transient "metadata unavailable".
        log::warn!("introspect {table}: access denied gathering metadata, disabling table");
        sync_config.disabled = true;
    }
    schema.sync_config = Some(sync_config);
    schema.metadata = metadata;
    Ok(schema)
}

/// Batch variant: runs introspection per table, isolating
/// individual failures so one bad table doesn't abort the batch.
pub fn introspect_all_tables(
    client: &dyn JsonSqlClient,
    tables: &[String],
    options: &IntrospectOptions,
) -> BTreeMap<String, crate::error::Result<TableSchema>> {
    tables
        .iter()
        .map(|t| (t.clone(), introspect_table(client, t, options)))
        .collect()
}

fn infer_field_type(value: &JsonValue) -> FieldType {
    match value {
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => FieldType::Integer,
        JsonValue::Number(_) => FieldType::Float,
        JsonValue::Bool(_) => FieldType::Boolean,
        JsonValue::String(s) if looks_like_iso8601(s) => FieldType::Datetime,
        JsonValue::String(_) => FieldType::String,
        JsonValue::Array(_) | JsonValue::Object(_) => FieldType::Json,
        JsonValue::Null => FieldType::Unknown,
    }
}

lazy_static::lazy_static! {
    static ref EMAIL_RE: regex::Regex =
        regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref URL_RE: regex::Regex =
        regex::Regex::new(r"^https?://[^\s]+$").unwrap();
    static ref UUID_RE: regex::Regex = regex::Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    )
    .unwrap();
    static ref PHONE_RE: regex::Regex = regex::Regex::new(r"^\+?[1-9]\d{7,14}$").unwrap();
}

/// Ordered pattern rules: email/url/uuid/phone regexes,
/// then position-based heuristics, else a synthetic name.
fn infer_field_name(position: u32, value: &JsonValue, field_type: &FieldType) -> String {
    if let JsonValue::String(s) = value {
        if EMAIL_RE.is_match(s) {
            return "email".to_string();
        }
        if URL_RE.is_match(s) {
            return "url".to_string();
        }
        if UUID_RE.is_match(s) {
            return "uuid".to_string();
        }
        if PHONE_RE.is_match(s) {
            return "phone".to_string();
        }
    }
    if position == 0 && *field_type == FieldType::Integer {
        return "id".to_string();
    }
    if *field_type == FieldType::Datetime {
        if position == 1 {
            return "created_at".to_string();
        }
        if position == 2 {
            return "updated_at".to_string();
        }
    }
    TableSchema::synthetic_name(position)
}

enum MetadataOutcome {
    Metadata(TableMetadata),
    Unavailable,
    AccessDenied,
}

/// Best-effort aggregate statistics. Each sub-query is
/// individually guarded: a transport failure here is "metadata
/// unavailable", not fatal to introspection as a whole. An `AccessDenied`
/// on the initial `COUNT(*)` is distinguished so the caller can mark the
/// table `disabled` instead.
fn gather_metadata(client: &dyn JsonSqlClient, table: &str, schema: &TableSchema) -> MetadataOutcome {
    let mut metadata = TableMetadata::default();

    match client.execute(&select_count(table)) {
        Ok(result) => {
            metadata.row_count = result.scalar().and_then(JsonValue::as_u64);
        }
        Err(crate::client::ClientError::AccessDenied(_)) => return MetadataOutcome::AccessDenied,
        Err(_) => return MetadataOutcome::Unavailable,
    }

    if let Some(id_field) = schema.id_field() {
        if let Ok(result) = client.execute(&select_min_max(table, &id_field.name)) {
            if let Some(row) = result.rows.first() {
                // select_min_max emits `MIN(col), MAX(col)` in that order.
                metadata.min_id = row.first().and_then(JsonValue::as_i64);
                metadata.max_id = row.get(1).and_then(JsonValue::as_i64);
            }
        }
    }

    for field in schema.fields.values() {
        if matches!(field.field_type, FieldType::Datetime | FieldType::Date) {
            if let Ok(result) = client.execute(&select_min_max(table, &field.name)) {
                if let Some(row) = result.rows.first() {
                    if let (Some(min), Some(max)) = (row.first(), row.get(1)) {
                        metadata
                            .timestamp_ranges
                            .insert(field.name.clone(), (min.clone(), max.clone()));
                    }
                }
            }
        }
    }

    MetadataOutcome::Metadata(metadata)
}

/// Default `SyncConfig` as a function of `row_count`.
fn generate_sync_config(schema: &TableSchema, metadata: Option<&TableMetadata>) -> SyncConfig {
    let Some(metadata) = metadata else {
        return SyncConfig::default();
    };
    let Some(row_count) = metadata.row_count else {
        return SyncConfig::default();
    };

    let mut config = SyncConfig::default();
    if row_count < 1000 {
        config.cache_strategy = CacheStrategy::Full;
        config.chunk_size = row_count.max(100);
        config.auto_sync = true;
        config.ttl = Some(3600);
    } else if row_count < 100_000 {
        config.cache_strategy = CacheStrategy::Full;
        config.chunk_size = 5000;
        config.auto_sync = true;
        config.ttl = Some(1800);
    } else {
        config.cache_strategy = CacheStrategy::Incremental;
        config.chunk_size = 10_000;
        config.auto_sync = false;
        config.ttl = Some(600);
    }

    let mut clauses = Vec::new();
    if schema
        .fields
        .values()
        .any(|f| f.name.eq_ignore_ascii_case("deleted_at"))
    {
        clauses.push("deleted_at IS NULL".to_string());
    }
    for field in schema.fields.values() {
        if field.field_type != FieldType::Boolean {
            continue;
        }
        if field.name.eq_ignore_ascii_case("disabled") || field.name.eq_ignore_ascii_case("archived") {
            clauses.push(format!("{} = false", field.name));
        } else if field.name.eq_ignore_ascii_case("active") {
            clauses.push(format!("{} = true", field.name));
        }
    }
    if !clauses.is_empty() {
        config.r#where = Some(clauses.join(" AND "));
    }

    if row_count > 10_000 {
        if let Some(incremental_field) = schema.fields.values().find(|f| {
            f.field_type == FieldType::Datetime
                && (f.name.eq_ignore_ascii_case("updated_at")
                    || f.name.eq_ignore_ascii_case("modified_at")
                    || f.name.eq_ignore_ascii_case("update_time"))
        }) {
            config.incremental_mode = true;
            config.incremental_field = Some(incremental_field.name.clone());
            config.cache_strategy = CacheStrategy::Incremental;
        }
    }

    if row_count > 0 {
        config.limit = Some(row_count * 2);
    }

    config
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::{ClientError, JsonSqlRequest, JsonSqlResult};
    use std::cell::RefCell;

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

    fn row(values: Vec<JsonValue>) -> Vec<JsonValue> {
        values
    }

    #[test]
    fn introspect_infers_types_and_names() {
        let mut responses = HashMap::new();
        responses.insert(
            "users:[\"*\"]".to_string(),
            JsonSqlResult::single_row(row(vec![
                JsonValue::from(1),
                JsonValue::String("alice@example.com".to_string()),
                JsonValue::String("2023-01-01T00:00:00".to_string()),
            ])),
        );
        let client = FakeClient {
            responses: RefCell::new(responses),
        };
        let schema = introspect_table(&client, "users", &IntrospectOptions::default()).unwrap();
        assert_eq!(schema.total_fields, 3);
        assert_eq!(schema.fields[&0].name, "id");
        assert_eq!(schema.fields[&1].name, "email");
        assert_eq!(schema.fields[&2].name, "created_at");
    }

    #[test]
    fn introspect_fails_on_empty_table() {
        let client = FakeClient {
            responses: RefCell::new(HashMap::new()),
        };
        let err = introspect_table(&client, "ghost", &IntrospectOptions::default()).unwrap_err();
        assert!(matches!(err, crate::error::Error::Configuration(_)));
    }

    #[test]
    fn access_denied_on_count_disables_table() {
        struct DeniedClient;
        impl JsonSqlClient for DeniedClient {
            fn execute(&self, request: &JsonSqlRequest) -> Result<JsonSqlResult, ClientError> {
                if request.params.data == ["*"] {
                    Ok(JsonSqlResult::single_row(vec![JsonValue::from(1)]))
                } else {
                    Err(ClientError::AccessDenied("no access to aggregates".to_string()))
                }
            }
        }
        let options = IntrospectOptions {
            gather_metadata: true,
            ..Default::default()
        };
        let schema = introspect_table(&DeniedClient, "secrets", &options).unwrap();
        assert!(schema.metadata.is_none());
        assert!(schema.sync_config.unwrap().disabled);
    }

    #[test]
    fn sync_config_scales_with_row_count() {
        let schema = TableSchema::new("t", 1);
        let small = TableMetadata {
            row_count: Some(10),
            ..Default::default()
        };
        let cfg = generate_sync_config(&schema, Some(&small));
        assert_eq!(cfg.cache_strategy, CacheStrategy::Full);
        assert_eq!(cfg.chunk_size, 100);

        let large = TableMetadata {
            row_count: Some(200_000),
            ..Default::default()
        };
        let cfg = generate_sync_config(&schema, Some(&large));
        assert_eq!(cfg.cache_strategy, CacheStrategy::Incremental);
        assert_eq!(cfg.chunk_size, 10_000);
        assert_eq!(cfg.limit, Some(400_000));
    }
}
