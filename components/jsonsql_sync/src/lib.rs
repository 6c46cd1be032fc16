/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! A client-side mirror of a remote JSON-RPC table service ("JSONSQL"):
//! introspects remote table shapes, builds a typed local SQLite cache, and
//! keeps it fresh via full or incremental sync.
//!
//! A plain Rust library crate, like `sql-support` or `interrupt-support`:
//! no `uniffi` scaffolding, no `build.rs` — this component has no
//! foreign-language consumer of its own, only Rust callers within the
//! workspace.

pub mod client;
pub mod db;
pub mod document;
pub mod error;
pub mod introspect;
pub mod manager;
pub mod schema;
pub mod transform;
pub mod validate;

pub use client::{
    select_chunk, select_column, select_count, select_incremental, select_min_max, select_star,
    ClientError, JsonSqlClient, JsonSqlParams, JsonSqlRequest, JsonSqlResult, Where,
};
pub use db::{CatalogRow, HistoryEntry, MetadataUpdate, OnConflict, Store};
pub use document::{SchemaDocument, TableDocument};
pub use error::{Error, Result};
pub use introspect::{introspect_all_tables, introspect_table, IntrospectOptions};
pub use manager::{Manager, ProgressHook, SyncProgress, SyncResult, SyncStatus};
pub use schema::{
    CacheStrategy, FieldConstraints, FieldDefinition, FieldType, Relationship, RelationshipKind,
    SchemaRegistry, SyncConfig, TableMetadata, TableSchema, TableSchemaBuilder,
};
pub use transform::TransformerRegistry;
pub use validate::{
    validate_field_mapping, validate_table_schema, DtypeFamily, FieldValidation,
    ValidationOutcome,
};

use std::path::Path;
use std::sync::Arc;

/// Top-level facade wiring a `JsonSqlClient`, an on-disk `Store`, and a
/// `Manager` together — the shape most callers reach for first, the same
/// way `RemoteSettings` wraps `Client` + cache in `remote_settings::lib`.
pub struct JsonSqlMirror {
    manager: Manager,
}

impl JsonSqlMirror {
    /// Open (creating if absent) the SQLite cache at `path` and wire it to
    /// `client`.
    pub fn open(client: Arc<dyn JsonSqlClient>, path: &Path) -> Result<Self> {
        let store = Arc::new(Store::open(path)?);
        Ok(Self {
            manager: Manager::new(client, store),
        })
    }

    /// An in-memory cache, for tests and short-lived tooling.
    pub fn open_in_memory(client: Arc<dyn JsonSqlClient>) -> Result<Self> {
        let store = Arc::new(Store::open_in_memory()?);
        Ok(Self {
            manager: Manager::new(client, store),
        })
    }

    /// Introspect `table` against the wired client and register the
    /// resulting schema, in one step.
    pub fn discover_table(&self, table: &str, options: &IntrospectOptions) -> Result<TableSchema> {
        let schema = introspect_table(self.manager.client(), table, options)?;
        self.manager.register_table(schema.clone())?;
        Ok(schema)
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }
}
