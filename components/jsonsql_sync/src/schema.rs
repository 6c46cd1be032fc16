/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Schema Model: in-memory representation of a mirrored
//! table, its sync policy, and the registry the Manager resolves schemas
//! through.

use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

/// Closed enumeration of field types the Introspector infers and the Data
/// Store maps to SQLite column affinities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Integer,
    String,
    Boolean,
    Float,
    Datetime,
    Date,
    Json,
    Unknown,
}

impl FieldType {
    /// The SQLite column affinity used when creating a data table (§4.5).
    pub fn sqlite_affinity(self) -> &'static str {
        match self {
            FieldType::Integer => "INTEGER",
            FieldType::Float => "REAL",
            FieldType::String => "TEXT",
            FieldType::Boolean => "INTEGER",
            FieldType::Datetime | FieldType::Date | FieldType::Json => "TEXT",
            FieldType::Unknown => "TEXT",
        }
    }
}

/// Recognized `constraints` keys on a `FieldDefinition`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldConstraints {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub index: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ge: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub le: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    OneToMany,
    ManyToOne,
    ManyToMany,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Relationship {
    pub r#type: RelationshipKind,
    pub target_table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_populates: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
}

/// Description of one column slot in the remote row tuple.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldDefinition {
    pub position: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_column_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_name: Option<String>,
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of a built-in transformer (see `TransformerRegistry`); never a
    /// closure, so a loaded-from-document schema reproduces the same
    /// mapping behavior as one built in-process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<FieldConstraints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Relationship>,
}

impl FieldDefinition {
    pub fn new(position: u32, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            position,
            name: name.into(),
            alias: None,
            python_name: None,
            local_column_name: None,
            remote_name: None,
            field_type,
            description: None,
            transformer: None,
            constraints: None,
            relationships: None,
        }
    }

    /// The effective display name: `python_name > alias > name`.
    pub fn mapped_name(&self) -> &str {
        self.python_name
            .as_deref()
            .or(self.alias.as_deref())
            .unwrap_or(&self.name)
    }

    pub fn is_primary_key(&self) -> bool {
        self.name.eq_ignore_ascii_case("id")
            || self
                .constraints
                .as_ref()
                .map(|c| c.primary_key)
                .unwrap_or(false)
    }
}

/// Per-table synchronization policy.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#where: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    pub order_by: String,
    pub chunk_size: u64,
    pub enable_chunking: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    pub cache_strategy: CacheStrategy,
    pub auto_sync: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<u64>,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental_field: Option<String>,
    pub incremental_mode: bool,
    pub prefetch_relationships: bool,
    pub max_concurrent_chunks: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            r#where: None,
            limit: None,
            order_by: "id".to_string(),
            chunk_size: 1000,
            enable_chunking: true,
            ttl: None,
            cache_strategy: CacheStrategy::Full,
            auto_sync: false,
            sync_interval: None,
            disabled: false,
            include_fields: None,
            exclude_fields: None,
            incremental_field: None,
            incremental_mode: false,
            prefetch_relationships: false,
            max_concurrent_chunks: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    Full,
    Incremental,
    OnDemand,
}

impl SyncConfig {
    /// Validates this configuration. Returns every violation found, not
    /// just the first.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.chunk_size == 0 {
            errors.push("chunk_size must be > 0".to_string());
        }
        if let Some(limit) = self.limit {
            if limit < self.chunk_size {
                errors.push("limit must be >= chunk_size".to_string());
            }
        }
        if self.incremental_mode && self.incremental_field.is_none() {
            errors.push("incremental_mode requires incremental_field".to_string());
        }
        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Whether a field named `name` passes this config's `include_fields`/
    /// `exclude_fields` projection. `include_fields`, if set, is an
    /// allow-list; `exclude_fields` is then applied on top of it.
    pub fn field_projected(&self, name: &str) -> bool {
        if let Some(include) = &self.include_fields {
            if !include.iter().any(|f| f == name) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude_fields {
            if exclude.iter().any(|f| f == name) {
                return false;
            }
        }
        true
    }
}

/// Remote-side measurements captured at introspection time.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TableMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_size_mb: Option<f64>,
    #[serde(default)]
    pub timestamp_ranges: BTreeMap<String, (JsonValue, JsonValue)>,
}

/// The full description of a mirrored table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    /// Keyed by position; a position with no entry is an "undescribed"
    /// slot that resolves to the synthetic `Field_<n>` name.
    pub fields: BTreeMap<u32, FieldDefinition>,
    pub total_fields: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_config: Option<SyncConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TableMetadata>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, total_fields: u32) -> Self {
        Self {
            table_name: table_name.into(),
            fields: BTreeMap::new(),
            total_fields,
            sync_config: None,
            metadata: None,
        }
    }

    pub fn synthetic_name(position: u32) -> String {
        format!("Field_{position}")
    }

    /// `ResolveSelectStar`: resolved name of every slot
    /// `0..total_fields`, or the sentinel `"*"` if nothing is known at all.
    pub fn resolve_select_star(&self, use_aliases: bool) -> Vec<String> {
        if self.total_fields == 0 && self.fields.is_empty() {
            return vec!["*".to_string()];
        }
        let mut seen: HashMap<String, u32> = HashMap::new();
        (0..self.total_fields)
            .map(|p| {
                let base = match self.fields.get(&p) {
                    Some(f) if use_aliases => f.mapped_name().to_string(),
                    Some(f) => f.name.clone(),
                    None => Self::synthetic_name(p),
                };
                dedupe(&mut seen, base)
            })
            .collect()
    }

    /// `MapRow`: maps a positional row to `{name: value}`,
    /// applying the field's transformer if any. Transformer failures are
    /// swallowed — the raw value is kept, no error surfaced.
    pub fn map_row(
        &self,
        row: &[JsonValue],
        transformers: &super::transform::TransformerRegistry,
    ) -> BTreeMap<String, JsonValue> {
        let mut out = BTreeMap::new();
        for (pos, value) in row.iter().enumerate() {
            let pos = pos as u32;
            let (name, transformed) = match self.fields.get(&pos) {
                Some(f) => {
                    let v = match &f.transformer {
                        Some(t) => transformers.apply(t, value.clone()).unwrap_or(value.clone()),
                        None => value.clone(),
                    };
                    (f.mapped_name().to_string(), v)
                }
                None => (Self::synthetic_name(pos), value.clone()),
            };
            out.insert(name, transformed);
        }
        out
    }

    pub fn field_by_name(&self, query: &str) -> Option<&FieldDefinition> {
        self.fields.values().find(|f| {
            f.name == query || f.alias.as_deref() == Some(query) || f.python_name.as_deref() == Some(query)
        })
    }

    pub fn field_by_position(&self, position: u32) -> Option<&FieldDefinition> {
        self.fields.get(&position)
    }

    pub fn id_field(&self) -> Option<&FieldDefinition> {
        self.fields.values().find(|f| f.is_primary_key())
    }

    /// Canonical, order-independent hash over `{table_name, per-position
    /// (name, type, position), sync_config projected fields}`.
    /// Used by the catalog to detect schema change.
    pub fn hash(&self) -> String {
        #[derive(serde::Serialize)]
        struct FieldHashEntry<'a> {
            name: &'a str,
            field_type: FieldType,
            position: u32,
        }
        #[derive(serde::Serialize)]
        struct SyncConfigHashEntry<'a> {
            strategy: CacheStrategy,
            incremental_field: Option<&'a str>,
            chunk_size: u64,
            r#where: Option<&'a str>,
            order_by: &'a str,
        }
        #[derive(serde::Serialize)]
        struct HashPayload<'a> {
            table_name: &'a str,
            fields: BTreeMap<u32, FieldHashEntry<'a>>,
            sync_config: Option<SyncConfigHashEntry<'a>>,
        }
        let fields = self
            .fields
            .iter()
            .map(|(pos, f)| {
                (
                    *pos,
                    FieldHashEntry {
                        name: &f.name,
                        field_type: f.field_type,
                        position: f.position,
                    },
                )
            })
            .collect();
        let sync_config = self.sync_config.as_ref().map(|c| SyncConfigHashEntry {
            strategy: c.cache_strategy,
            incremental_field: c.incremental_field.as_deref(),
            chunk_size: c.chunk_size,
            r#where: c.r#where.as_deref(),
            order_by: &c.order_by,
        });
        let payload = HashPayload {
            table_name: &self.table_name,
            fields,
            sync_config,
        };
        // serde_json serializes BTreeMap keys in sorted order and struct
        // fields in declaration order, which is what makes this hash
        // reproducible regardless of field insertion order.
        let canonical = serde_json::to_string(&payload).expect("hash payload always serializes");
        format!("{:x}", md5_like(canonical.as_bytes()))
    }
}

fn dedupe(seen: &mut HashMap<String, u32>, base: String) -> String {
    match seen.get_mut(&base) {
        None => {
            seen.insert(base.clone(), 0);
            base
        }
        Some(count) => {
            *count += 1;
            format!("{base}_{count}")
        }
    }
}

/// A small, dependency-free 128-bit digest used for `TableSchema::hash` and
/// the catalog's `schema_hash` column. Not cryptographic; only required to
/// be a pure, deterministic function of its input — two identical schemas
/// must hash equal regardless of field insertion order.
fn md5_like(bytes: &[u8]) -> u128 {
    // FNV-1a extended to 128 bits: stable, deterministic, dependency-free.
    let mut hash: u128 = 0x6c62272e07bb014262b821756295c58d;
    const PRIME: u128 = 0x0000000001000000000000000000013B;
    for &b in bytes {
        hash ^= b as u128;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// An in-memory name → `TableSchema` map the Manager resolves schemas
/// through. Insertion order is irrelevant.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: TableSchema) {
        self.tables.insert(schema.table_name.clone(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TableSchema> {
        self.tables.get_mut(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

/// Fluent builder for constructing a `TableSchema` in-process.
#[derive(Debug, Default)]
pub struct TableSchemaBuilder {
    table_name: String,
    fields: BTreeMap<u32, FieldDefinition>,
    sync_config: Option<SyncConfig>,
    metadata: Option<TableMetadata>,
}

impl TableSchemaBuilder {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table_name: name.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.insert(field.position, field);
        self
    }

    pub fn sync_config(mut self, config: SyncConfig) -> Self {
        self.sync_config = Some(config);
        self
    }

    pub fn metadata(mut self, metadata: TableMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn build(self) -> TableSchema {
        let total_fields = self
            .fields
            .keys()
            .next_back()
            .map(|p| p + 1)
            .unwrap_or(0)
            .max(self.fields.len() as u32);
        TableSchema {
            table_name: self.table_name,
            fields: self.fields,
            total_fields,
            sync_config: self.sync_config,
            metadata: self.metadata,
        }
    }
}
