/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Sync Catalog and Data Store: a SQLite-backed
//! catalog of per-table sync metadata plus one dynamically created data
//! table per mirrored table.
//!
//! Grounded on `sql_support::open_database`'s `MigrationLogic` for
//! initialization, and `ConnExt::unchecked_transaction` for scoped,
//! drop-safe transactions around every chunk write.

use crate::error::{Error, Result};
use crate::schema::{CacheStrategy, FieldType, TableSchema};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use sql_support::open_database::{self, DatabaseLocation, ErrorHandling, MigrationLogic};
use sql_support::ConnExt;
use std::path::Path;

pub const SCHEMA_FORMAT_VERSION: i64 = 1;
pub const CACHE_VERSION: &str = "1";

const CATALOG_SQL: &str = "
CREATE TABLE _sync_metadata (
    table_name TEXT PRIMARY KEY,
    strategy TEXT NOT NULL,
    ttl INTEGER,
    chunk_size INTEGER NOT NULL,
    where_clause TEXT,
    order_by TEXT NOT NULL,
    incremental_field TEXT,
    schema_hash TEXT NOT NULL,
    schema_version INTEGER NOT NULL DEFAULT 1,
    total_fields INTEGER NOT NULL,
    row_count INTEGER,
    local_row_count INTEGER NOT NULL DEFAULT 0,
    min_id INTEGER,
    max_id INTEGER,
    last_sync_at TEXT,
    next_sync_at TEXT,
    last_sync_checkpoint TEXT,
    last_sync_duration_ms INTEGER,
    last_sync_rows INTEGER,
    total_syncs INTEGER NOT NULL DEFAULT 0,
    failed_syncs INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    last_error_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE _field_mappings (
    table_name TEXT NOT NULL REFERENCES _sync_metadata(table_name) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    field_name TEXT NOT NULL,
    local_column TEXT NOT NULL,
    field_type TEXT NOT NULL,
    is_primary_key BOOLEAN NOT NULL DEFAULT FALSE,
    is_incremental_field BOOLEAN NOT NULL DEFAULT FALSE,
    is_nullable BOOLEAN NOT NULL DEFAULT TRUE,
    description TEXT,
    PRIMARY KEY (table_name, position)
);

CREATE TABLE _sync_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name TEXT NOT NULL REFERENCES _sync_metadata(table_name) ON DELETE CASCADE,
    sync_type TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    duration_ms INTEGER,
    rows_fetched INTEGER NOT NULL DEFAULT 0,
    rows_inserted INTEGER NOT NULL DEFAULT 0,
    rows_updated INTEGER NOT NULL DEFAULT 0,
    rows_deleted INTEGER NOT NULL DEFAULT 0,
    chunks_processed INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    error_message TEXT,
    triggered_by TEXT,
    checkpoint_before TEXT,
    checkpoint_after TEXT
);

CREATE TABLE _cache_stats (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    total_tables INTEGER NOT NULL DEFAULT 0,
    total_rows INTEGER NOT NULL DEFAULT 0,
    database_size_bytes INTEGER NOT NULL DEFAULT 0,
    total_syncs INTEGER NOT NULL DEFAULT 0,
    successful_syncs INTEGER NOT NULL DEFAULT 0,
    failed_syncs INTEGER NOT NULL DEFAULT 0,
    last_activity_at TEXT,
    initialized_at TEXT NOT NULL,
    last_vacuum_at TEXT,
    last_analyze_at TEXT,
    cache_version TEXT NOT NULL,
    schema_format_version INTEGER NOT NULL
);

CREATE INDEX idx_sync_metadata_next_sync_at ON _sync_metadata(next_sync_at);
CREATE INDEX idx_sync_metadata_strategy ON _sync_metadata(strategy);
CREATE INDEX idx_sync_history_table_started ON _sync_history(table_name, started_at DESC);
CREATE INDEX idx_sync_history_status ON _sync_history(status);

CREATE VIEW v_sync_status AS
SELECT
    table_name,
    strategy,
    last_sync_at,
    next_sync_at,
    total_syncs,
    failed_syncs,
    CASE
        WHEN next_sync_at IS NULL THEN 'unknown'
        WHEN datetime(next_sync_at) < datetime('now') THEN 'stale'
        ELSE 'fresh'
    END AS cache_status
FROM _sync_metadata;

CREATE VIEW v_recent_sync_history AS
SELECT * FROM _sync_history ORDER BY started_at DESC LIMIT 100;
";

fn prepare(conn: &Connection) -> open_database::Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        PRAGMA mmap_size = 268435456;
        PRAGMA page_size = 4096;
        PRAGMA cache_size = -65536;
        ",
    )?;
    Ok(())
}

fn init(conn: &Connection) -> open_database::Result<()> {
    conn.execute_batch(CATALOG_SQL)?;
    conn.execute(
        "INSERT INTO _cache_stats (id, initialized_at, cache_version, schema_format_version)
         VALUES (1, datetime('now'), ?, ?)",
        params![CACHE_VERSION, SCHEMA_FORMAT_VERSION],
    )?;
    Ok(())
}

fn migration_logic() -> MigrationLogic {
    MigrationLogic {
        name: "jsonsql_sync cache".to_string(),
        start_version: 1,
        end_version: 1,
        prepare: Some(prepare),
        init,
        upgrades: vec![],
        finish: None,
        // An unreadable cache may hold data worth recovering; surface the
        // error rather than silently discarding it.
        error_handling: ErrorHandling::ReturnError,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    Fail,
    Replace,
    Ignore,
}

impl OnConflict {
    fn sql_keyword(self) -> &'static str {
        match self {
            OnConflict::Fail => "OR FAIL",
            OnConflict::Replace => "OR REPLACE",
            OnConflict::Ignore => "OR IGNORE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogRow {
    pub table_name: String,
    pub strategy: CacheStrategy,
    pub row_count: Option<i64>,
    pub local_row_count: i64,
    pub min_id: Option<i64>,
    pub max_id: Option<i64>,
    pub last_sync_at: Option<String>,
    pub next_sync_at: Option<String>,
    pub last_sync_checkpoint: Option<String>,
    pub total_syncs: i64,
    pub failed_syncs: i64,
    pub last_error: Option<String>,
}

/// Updates applied to `_sync_metadata` after a run. Only `Some` fields are
/// written; absent fields leave the existing column untouched.
#[derive(Debug, Default)]
pub struct MetadataUpdate {
    pub last_sync_at: Option<String>,
    pub next_sync_at: Option<String>,
    pub row_count: Option<i64>,
    pub local_row_count_delta: Option<i64>,
    pub local_row_count_set: Option<i64>,
    pub min_id: Option<i64>,
    pub max_id: Option<i64>,
    pub last_sync_checkpoint: Option<String>,
    pub last_sync_duration_ms: Option<i64>,
    pub last_sync_rows: Option<i64>,
    pub increment_total_syncs: bool,
    pub increment_failed_syncs: bool,
    pub last_error: Option<String>,
    pub last_error_at: Option<String>,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::OpenDatabase(open_database::Error::IOError(e))
                })?;
            }
        }
        let conn = open_database::open_database(path.to_path_buf(), migration_logic())?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = open_database::open_database_with_flags(
            DatabaseLocation::Memory,
            rusqlite::OpenFlags::default(),
            migration_logic(),
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Register a table: create its data table, indexes, user view, and
    /// catalog rows.
    pub fn register_table(&self, schema: &TableSchema) -> Result<()> {
        log::debug!(
            "registering table {} ({} fields, hash {})",
            schema.table_name,
            schema.total_fields,
            schema.hash()
        );
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        create_data_table(&tx, schema)?;
        upsert_catalog_rows(&tx, schema)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_metadata(&self, table: &str) -> Result<Option<CatalogRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT table_name, strategy, row_count, local_row_count, min_id, max_id,
                        last_sync_at, next_sync_at, last_sync_checkpoint, total_syncs,
                        failed_syncs, last_error
                 FROM _sync_metadata WHERE table_name = ?",
                params![table],
                |r| {
                    Ok(CatalogRow {
                        table_name: r.get(0)?,
                        strategy: parse_strategy(&r.get::<_, String>(1)?),
                        row_count: r.get(2)?,
                        local_row_count: r.get(3)?,
                        min_id: r.get(4)?,
                        max_id: r.get(5)?,
                        last_sync_at: r.get(6)?,
                        next_sync_at: r.get(7)?,
                        last_sync_checkpoint: r.get(8)?,
                        total_syncs: r.get(9)?,
                        failed_syncs: r.get(10)?,
                        last_error: r.get(11)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn update_metadata(&self, table: &str, update: &MetadataUpdate) -> Result<()> {
        let conn = self.conn.lock();
        let mut sets: Vec<String> = vec!["updated_at = datetime('now')".to_string()];
        let mut binds: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        macro_rules! bind_opt {
            ($col:literal, $val:expr) => {
                if let Some(v) = $val.clone() {
                    sets.push(format!("{} = ?", $col));
                    binds.push(Box::new(v));
                }
            };
        }
        bind_opt!("last_sync_at", update.last_sync_at);
        bind_opt!("next_sync_at", update.next_sync_at);
        bind_opt!("row_count", update.row_count);
        bind_opt!("min_id", update.min_id);
        bind_opt!("max_id", update.max_id);
        bind_opt!("last_sync_checkpoint", update.last_sync_checkpoint);
        bind_opt!("last_sync_duration_ms", update.last_sync_duration_ms);
        bind_opt!("last_sync_rows", update.last_sync_rows);
        bind_opt!("last_error", update.last_error);
        bind_opt!("last_error_at", update.last_error_at);

        if let Some(v) = update.local_row_count_set {
            sets.push("local_row_count = ?".to_string());
            binds.push(Box::new(v));
        } else if let Some(delta) = update.local_row_count_delta {
            sets.push("local_row_count = local_row_count + ?".to_string());
            binds.push(Box::new(delta));
        }
        if update.increment_total_syncs {
            sets.push("total_syncs = total_syncs + 1".to_string());
        }
        if update.increment_failed_syncs {
            sets.push("failed_syncs = failed_syncs + 1".to_string());
        }

        if sets.len() == 1 {
            // Nothing but the timestamp bump was requested; still a no-op
            // write is fine, but skip the round trip.
            return Ok(());
        }

        let sql = format!(
            "UPDATE _sync_metadata SET {} WHERE table_name = ?",
            sets.join(", ")
        );
        binds.push(Box::new(table.to_string()));
        let param_refs: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|b| b.as_ref()).collect();
        conn.execute(&sql, param_refs.as_slice())?;
        Ok(())
    }

    /// Freshness check: no metadata row, or
    /// no `next_sync_at`, or `now > next_sync_at`.
    ///
    /// Compares through SQLite's `datetime()` rather than a raw string `<`:
    /// `next_sync_at` is stored with a `T` date/time separator while
    /// `datetime('now')` renders with a space, and those two otherwise-equal
    /// instants don't compare correctly as text. `datetime()` accepts both
    /// separators and normalizes to its own canonical form, so running it
    /// over `next_sync_at` too makes the comparison apples-to-apples.
    pub fn is_stale(&self, table: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let stale: Option<bool> = conn
            .query_row(
                "SELECT next_sync_at IS NULL OR datetime(next_sync_at) < datetime('now')
                 FROM _sync_metadata WHERE table_name = ?",
                params![table],
                |r| r.get(0),
            )
            .optional()?;
        Ok(stale.unwrap_or(true))
    }

    /// Bulk insert one chunk of rows. Runs in one
    /// transaction; a failure rolls the whole chunk back.
    pub fn bulk_insert(
        &self,
        schema: &TableSchema,
        rows: &[Vec<JsonValue>],
        on_conflict: OnConflict,
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        let layout = TableLayout::from_schema(schema);
        let mut columns: Vec<&str> = layout.columns.iter().map(|c| c.local_name.as_str()).collect();
        columns.extend(["_synced_at", "_sync_version", "_is_partial"]);
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT {} INTO {} ({}) VALUES ({})",
            on_conflict.sql_keyword(),
            quote_ident(&schema.table_name),
            columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            placeholders
        );
        let mut stmt = tx.prepare(&sql)?;
        let mut inserted = 0;
        for row in rows {
            let mut binds: Vec<SqlValue> = layout
                .columns
                .iter()
                .map(|c| row.get(c.position as usize).map(json_to_sql).unwrap_or(SqlValue::Null))
                .collect();
            binds.push(SqlValue::Text(now_iso8601()));
            binds.push(SqlValue::Integer(1));
            binds.push(SqlValue::Integer(0));
            let params: Vec<&dyn rusqlite::ToSql> =
                binds.iter().map(|b| b as &dyn rusqlite::ToSql).collect();
            inserted += stmt.execute(params.as_slice())?;
        }
        drop(stmt);
        tx.commit()?;
        Ok(inserted)
    }

    /// Per-row upsert. Entire batch runs in one
    /// transaction; returns `(inserted, updated)`.
    pub fn upsert_rows(&self, schema: &TableSchema, rows: &[Vec<JsonValue>]) -> Result<(usize, usize)> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        let layout = TableLayout::from_schema(schema);
        let Some(id_column) = layout.id_column() else {
            return Err(Error::Configuration(format!(
                "upsert requires an id column on {}",
                schema.table_name
            )));
        };

        let mut inserted = 0;
        let mut updated = 0;
        for row in rows {
            let id_value = row
                .get(id_column.position as usize)
                .map(json_to_sql)
                .unwrap_or(SqlValue::Null);
            let exists: bool = tx
                .query_row(
                    &format!(
                        "SELECT 1 FROM {} WHERE {} = ? LIMIT 1",
                        quote_ident(&schema.table_name),
                        quote_ident(&id_column.local_name)
                    ),
                    params![id_value],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();

            if exists {
                let assignments = layout
                    .columns
                    .iter()
                    .map(|c| format!("{} = ?", quote_ident(&c.local_name)))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "UPDATE {} SET {}, _synced_at = ?, _sync_version = _sync_version + 1 WHERE {} = ?",
                    quote_ident(&schema.table_name),
                    assignments,
                    quote_ident(&id_column.local_name)
                );
                let mut binds: Vec<SqlValue> = layout
                    .columns
                    .iter()
                    .map(|c| row.get(c.position as usize).map(json_to_sql).unwrap_or(SqlValue::Null))
                    .collect();
                binds.push(SqlValue::Text(now_iso8601()));
                binds.push(id_value);
                let params: Vec<&dyn rusqlite::ToSql> =
                    binds.iter().map(|b| b as &dyn rusqlite::ToSql).collect();
                tx.execute(&sql, params.as_slice())?;
                updated += 1;
            } else {
                let mut columns: Vec<String> =
                    layout.columns.iter().map(|c| c.local_name.clone()).collect();
                columns.extend(["_synced_at".to_string(), "_sync_version".to_string(), "_is_partial".to_string()]);
                let placeholders = vec!["?"; columns.len()].join(", ");
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quote_ident(&schema.table_name),
                    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
                    placeholders
                );
                let mut binds: Vec<SqlValue> = layout
                    .columns
                    .iter()
                    .map(|c| row.get(c.position as usize).map(json_to_sql).unwrap_or(SqlValue::Null))
                    .collect();
                binds.push(SqlValue::Text(now_iso8601()));
                binds.push(SqlValue::Integer(1));
                binds.push(SqlValue::Integer(0));
                let params: Vec<&dyn rusqlite::ToSql> =
                    binds.iter().map(|b| b as &dyn rusqlite::ToSql).collect();
                tx.execute(&sql, params.as_slice())?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok((inserted, updated))
    }

    /// Counts rows then deletes them all, returning the pre-deletion count.
    pub fn clear_table(&self, table_name: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table_name)),
            [],
            |r| r.get(0),
        )?;
        conn.execute(&format!("DELETE FROM {}", quote_ident(table_name)), [])?;
        log::debug!("cleared {count} rows from {table_name}");
        Ok(count as usize)
    }

    /// Query pass-through: fails with
    /// `TableNotFoundError` if the table does not exist.
    pub fn execute_query(&self, table: &str, sql: &str) -> Result<Vec<Vec<JsonValue>>> {
        let conn = self.conn.lock();
        let table_exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?",
                params![table],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !table_exists {
            return Err(Error::TableNotFound(table.to_string()));
        }
        let mut stmt = conn.prepare(sql)?;
        let column_count = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    values.push(sql_to_json(row.get::<_, SqlValue>(i)?));
                }
                Ok(values)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn vacuum(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch("VACUUM")?;
        conn.execute(
            "UPDATE _cache_stats SET last_vacuum_at = datetime('now') WHERE id = 1",
            [],
        )?;
        Ok(())
    }

    pub fn analyze(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch("ANALYZE")?;
        conn.execute(
            "UPDATE _cache_stats SET last_analyze_at = datetime('now') WHERE id = 1",
            [],
        )?;
        Ok(())
    }

    pub fn record_history(&self, entry: &HistoryEntry) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO _sync_history
                (table_name, sync_type, started_at, completed_at, duration_ms, rows_fetched,
                 rows_inserted, rows_updated, rows_deleted, chunks_processed, status,
                 error_message, triggered_by, checkpoint_before, checkpoint_after)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.table_name,
                entry.sync_type,
                entry.started_at,
                entry.completed_at,
                entry.duration_ms,
                entry.rows_fetched,
                entry.rows_inserted,
                entry.rows_updated,
                entry.rows_deleted,
                entry.chunks_processed,
                entry.status,
                entry.error_message,
                entry.triggered_by,
                entry.checkpoint_before,
                entry.checkpoint_after,
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct HistoryEntry {
    pub table_name: String,
    pub sync_type: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub rows_fetched: i64,
    pub rows_inserted: i64,
    pub rows_updated: i64,
    pub rows_deleted: i64,
    pub chunks_processed: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub triggered_by: Option<String>,
    pub checkpoint_before: Option<String>,
    pub checkpoint_after: Option<String>,
}

struct ColumnLayout {
    position: u32,
    local_name: String,
    is_id: bool,
}

struct TableLayout {
    columns: Vec<ColumnLayout>,
}

impl TableLayout {
    /// Builds the set of columns the data table actually has, applying
    /// `sync_config.include_fields`/`exclude_fields` (§3) against each
    /// position's resolved name. A position kept out of the projection has
    /// no column at all: it is simply never read off the incoming row.
    fn from_schema(schema: &TableSchema) -> Self {
        let config = schema.sync_config.as_ref();
        let mut seen = std::collections::HashMap::new();
        let mut columns = Vec::new();
        for position in 0..schema.total_fields {
            let field = schema.fields.get(&position);
            let resolved_name = match field {
                Some(f) => f.mapped_name().to_string(),
                None => TableSchema::synthetic_name(position),
            };
            if let Some(config) = config {
                if !config.field_projected(&resolved_name) {
                    continue;
                }
            }
            let base = match field {
                Some(f) => normalize_identifier(f.local_column_name.as_deref().unwrap_or(&resolved_name)),
                None => resolved_name,
            };
            let local_name = dedupe_identifier(&mut seen, base);
            let is_id = field.map(|f| f.is_primary_key()).unwrap_or(false);
            columns.push(ColumnLayout {
                position,
                local_name,
                is_id,
            });
        }
        Self { columns }
    }

    fn id_column(&self) -> Option<&ColumnLayout> {
        self.columns.iter().find(|c| c.is_id)
    }
}

fn normalize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

fn dedupe_identifier(seen: &mut std::collections::HashMap<String, u32>, base: String) -> String {
    match seen.get_mut(&base) {
        None => {
            seen.insert(base.clone(), 0);
            base
        }
        Some(n) => {
            *n += 1;
            format!("{base}_{n}")
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_data_table(conn: &Connection, schema: &TableSchema) -> Result<()> {
    let layout = TableLayout::from_schema(schema);
    let mut column_defs: Vec<String> = layout
        .columns
        .iter()
        .map(|c| {
            let affinity = schema
                .fields
                .get(&c.position)
                .map(|f| f.field_type.sqlite_affinity())
                .unwrap_or(FieldType::String.sqlite_affinity());
            let pk = if c.is_id { " PRIMARY KEY" } else { "" };
            format!("{} {}{}", quote_ident(&c.local_name), affinity, pk)
        })
        .collect();
    column_defs.push("_synced_at TEXT NOT NULL".to_string());
    column_defs.push("_sync_version INTEGER DEFAULT 1".to_string());
    column_defs.push("_is_partial BOOLEAN DEFAULT FALSE".to_string());

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&schema.table_name),
        column_defs.join(", ")
    ))?;

    conn.execute_batch(&format!(
        "CREATE INDEX IF NOT EXISTS {} ON {}(_synced_at)",
        quote_ident(&format!("idx_{}_synced_at", schema.table_name)),
        quote_ident(&schema.table_name)
    ))?;
    if let Some(id_column) = layout.id_column() {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}({})",
            quote_ident(&format!("idx_{}_id", schema.table_name)),
            quote_ident(&schema.table_name),
            quote_ident(&id_column.local_name)
        ))?;
    }
    if let Some(incremental_field) = schema.sync_config.as_ref().and_then(|c| c.incremental_field.as_deref()) {
        if let Some(field) = schema.field_by_name(incremental_field) {
            // `layout.columns` is already projection-filtered (§3
            // include_fields/exclude_fields), so it's indexed by kept-column
            // order, not by schema position — look the column up by
            // position rather than assuming `columns[position]`. A field
            // excluded from the projection has no column to index at all.
            let local_column = layout
                .columns
                .iter()
                .find(|c| c.position == field.position)
                .map(|c| c.local_name.clone());
            if let Some(local) = local_column {
                conn.execute_batch(&format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}({})",
                    quote_ident(&format!("idx_{}_incremental", schema.table_name)),
                    quote_ident(&schema.table_name),
                    quote_ident(&local)
                ))?;
            }
        }
    }

    let view_columns = layout
        .columns
        .iter()
        .map(|c| {
            let public_name = schema
                .fields
                .get(&c.position)
                .map(|f| f.mapped_name().to_string())
                .unwrap_or_else(|| TableSchema::synthetic_name(c.position));
            format!("{} AS {}", quote_ident(&c.local_name), quote_ident(&public_name))
        })
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!(
        "CREATE VIEW IF NOT EXISTS {} AS SELECT {} FROM {}",
        quote_ident(&format!("v_{}", schema.table_name)),
        view_columns,
        quote_ident(&schema.table_name)
    ))?;

    Ok(())
}

fn upsert_catalog_rows(conn: &Connection, schema: &TableSchema) -> Result<()> {
    let config = schema.sync_config.clone().unwrap_or_default();
    let hash = schema.hash();
    conn.execute(
        "INSERT INTO _sync_metadata
            (table_name, strategy, ttl, chunk_size, where_clause, order_by, incremental_field,
             schema_hash, total_fields, row_count, min_id, max_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'), datetime('now'))
         ON CONFLICT(table_name) DO UPDATE SET
            strategy = excluded.strategy,
            ttl = excluded.ttl,
            chunk_size = excluded.chunk_size,
            where_clause = excluded.where_clause,
            order_by = excluded.order_by,
            incremental_field = excluded.incremental_field,
            schema_hash = excluded.schema_hash,
            total_fields = excluded.total_fields,
            updated_at = datetime('now')",
        params![
            schema.table_name,
            strategy_str(config.cache_strategy),
            config.ttl,
            config.chunk_size as i64,
            config.r#where,
            config.order_by,
            config.incremental_field,
            hash,
            schema.total_fields,
            schema.metadata.as_ref().and_then(|m| m.row_count.map(|n| n as i64)),
            schema.metadata.as_ref().and_then(|m| m.min_id),
            schema.metadata.as_ref().and_then(|m| m.max_id),
        ],
    )?;

    conn.execute(
        "DELETE FROM _field_mappings WHERE table_name = ?",
        params![schema.table_name],
    )?;
    for field in schema.fields.values() {
        conn.execute(
            "INSERT INTO _field_mappings
                (table_name, position, field_name, local_column, field_type, is_primary_key,
                 is_incremental_field, is_nullable, description)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                schema.table_name,
                field.position,
                field.name,
                field.local_column_name.clone().unwrap_or_else(|| field.mapped_name().to_string()),
                field_type_str(field.field_type),
                field.is_primary_key(),
                config.incremental_field.as_deref() == Some(field.name.as_str()),
                field
                    .constraints
                    .as_ref()
                    .map(|c| c.nullable)
                    .unwrap_or(true),
                field.description,
            ],
        )?;
    }
    Ok(())
}

fn field_type_str(t: FieldType) -> &'static str {
    match t {
        FieldType::Integer => "INTEGER",
        FieldType::String => "STRING",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Float => "FLOAT",
        FieldType::Datetime => "DATETIME",
        FieldType::Date => "DATE",
        FieldType::Json => "JSON",
        FieldType::Unknown => "UNKNOWN",
    }
}

fn strategy_str(s: CacheStrategy) -> &'static str {
    match s {
        CacheStrategy::Full => "full",
        CacheStrategy::Incremental => "incremental",
        CacheStrategy::OnDemand => "on_demand",
    }
}

fn parse_strategy(s: &str) -> CacheStrategy {
    match s {
        "incremental" => CacheStrategy::Incremental,
        "on_demand" => CacheStrategy::OnDemand,
        _ => CacheStrategy::Full,
    }
}

fn json_to_sql(value: &JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Integer(*b as i64),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Null
            }
        }
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => {
            SqlValue::Text(value.to_string())
        }
    }
}

fn sql_to_json(value: SqlValue) -> JsonValue {
    match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Integer(i) => JsonValue::from(i),
        SqlValue::Real(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        SqlValue::Text(s) => JsonValue::String(s),
        SqlValue::Blob(b) => JsonValue::String(base16_encode(&b)),
    }
}

fn base16_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn now_iso8601() -> String {
    format_unix_timestamp(now_unix_secs())
}

/// Seconds since the epoch, used both for `_synced_at` stamping here and
/// for `manager.rs`'s `next_sync_at = now + ttl` computation.
pub(crate) fn now_unix_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Minimal proleptic Gregorian calendar conversion, avoiding a pull on a
/// date/time crate for a single formatting need (`_synced_at` stamping,
/// and `manager.rs`'s catalog timestamps).
pub(crate) fn format_unix_timestamp(secs: u64) -> String {
    const SECS_PER_DAY: u64 = 86_400;
    let days = secs / SECS_PER_DAY;
    let time = secs % SECS_PER_DAY;
    let (hour, minute, second) = (time / 3600, (time % 3600) / 60, time % 60);

    let mut z = days as i64 + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    z -= era * 146_097;
    let doe = z;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{FieldDefinition, FieldType, SyncConfig, TableMetadata, TableSchemaBuilder};

    fn users_schema() -> TableSchema {
        TableSchemaBuilder::table("users")
            .field(FieldDefinition::new(0, "id", FieldType::Integer))
            .field(FieldDefinition::new(1, "name", FieldType::String))
            .field(FieldDefinition::new(2, "email", FieldType::String))
            .sync_config(SyncConfig {
                chunk_size: 2,
                ..Default::default()
            })
            .metadata(TableMetadata {
                row_count: Some(3),
                ..Default::default()
            })
            .build()
    }

    #[test]
    fn register_and_bulk_insert_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let schema = users_schema();
        store.register_table(&schema).unwrap();

        let rows = vec![
            vec![JsonValue::from(1), JsonValue::from("alice"), JsonValue::from("a@x")],
            vec![JsonValue::from(2), JsonValue::from("bob"), JsonValue::from("b@x")],
            vec![JsonValue::from(3), JsonValue::from("carol"), JsonValue::from("c@x")],
        ];
        let inserted = store.bulk_insert(&schema, &rows, OnConflict::Replace).unwrap();
        assert_eq!(inserted, 3);

        let fetched = store.execute_query("users", "SELECT id, name FROM users ORDER BY id").unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0][0], JsonValue::from(1));
    }

    #[test]
    fn clear_table_returns_pre_deletion_count() {
        let store = Store::open_in_memory().unwrap();
        let schema = users_schema();
        store.register_table(&schema).unwrap();
        store
            .bulk_insert(
                &schema,
                &[vec![JsonValue::from(1), JsonValue::from("a"), JsonValue::from("a@x")]],
                OnConflict::Replace,
            )
            .unwrap();
        let count = store.clear_table("users").unwrap();
        assert_eq!(count, 1);
        let remaining = store.execute_query("users", "SELECT id FROM users").unwrap();
        assert!(remaining.is_empty());
    }

    #[test]
    fn upsert_inserts_then_updates() {
        let store = Store::open_in_memory().unwrap();
        let schema = users_schema();
        store.register_table(&schema).unwrap();
        let (ins, upd) = store
            .upsert_rows(&schema, &[vec![JsonValue::from(1), JsonValue::from("a"), JsonValue::from("a@x")]])
            .unwrap();
        assert_eq!((ins, upd), (1, 0));
        let (ins, upd) = store
            .upsert_rows(&schema, &[vec![JsonValue::from(1), JsonValue::from("a2"), JsonValue::from("a2@x")]])
            .unwrap();
        assert_eq!((ins, upd), (0, 1));
    }

    #[test]
    fn is_stale_true_when_no_next_sync_at() {
        let store = Store::open_in_memory().unwrap();
        let schema = users_schema();
        store.register_table(&schema).unwrap();
        assert!(store.is_stale("users").unwrap());
    }

    #[test]
    fn is_stale_true_for_a_past_deadline_on_the_same_calendar_day() {
        // next_sync_at is stored with a `T` date/time separator
        // (format_unix_timestamp); a naive string `<` against
        // `datetime('now')` (space separator) would rank any same-day `T`
        // timestamp above `now`, making it look fresh even seconds after
        // its deadline passed.
        let store = Store::open_in_memory().unwrap();
        let schema = users_schema();
        store.register_table(&schema).unwrap();
        let one_second_ago = format_unix_timestamp(now_unix_secs().saturating_sub(1));
        assert!(one_second_ago.contains('T'));
        store
            .update_metadata(
                "users",
                &MetadataUpdate {
                    next_sync_at: Some(one_second_ago),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.is_stale("users").unwrap());
    }

    #[test]
    fn is_stale_false_for_a_future_deadline_on_the_same_calendar_day() {
        let store = Store::open_in_memory().unwrap();
        let schema = users_schema();
        store.register_table(&schema).unwrap();
        let one_hour_from_now = format_unix_timestamp(now_unix_secs() + 3600);
        store
            .update_metadata(
                "users",
                &MetadataUpdate {
                    next_sync_at: Some(one_hour_from_now),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!store.is_stale("users").unwrap());
    }

    #[test]
    fn execute_query_fails_on_missing_table() {
        let store = Store::open_in_memory().unwrap();
        let err = store.execute_query("ghost", "SELECT 1").unwrap_err();
        assert!(matches!(err, Error::TableNotFound(_)));
    }

    #[test]
    fn exclude_fields_drops_the_column_from_the_data_table() {
        let store = Store::open_in_memory().unwrap();
        let mut schema = users_schema();
        schema.sync_config.as_mut().unwrap().exclude_fields = Some(vec!["email".to_string()]);
        store.register_table(&schema).unwrap();

        store
            .bulk_insert(
                &schema,
                &[vec![JsonValue::from(1), JsonValue::from("alice"), JsonValue::from("a@x")]],
                OnConflict::Replace,
            )
            .unwrap();
        let err = store.execute_query("users", "SELECT email FROM users").unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        let kept = store.execute_query("users", "SELECT id, name FROM users").unwrap();
        assert_eq!(kept[0], vec![JsonValue::from(1), JsonValue::String("alice".to_string())]);
    }

    #[test]
    fn incremental_index_survives_an_excluded_earlier_field() {
        // Regression: `layout.columns` is projection-filtered, so its
        // entries no longer line up with raw schema `position` as an
        // index. Exclude the position-1 field and point incremental_field
        // at position 2 ("email"); registering the table used to panic
        // (or silently index the wrong column) on `columns[2]`.
        let store = Store::open_in_memory().unwrap();
        let mut schema = users_schema();
        {
            let config = schema.sync_config.as_mut().unwrap();
            config.exclude_fields = Some(vec!["name".to_string()]);
            config.incremental_field = Some("email".to_string());
        }
        store.register_table(&schema).unwrap();
        let kept = store.execute_query("users", "SELECT id, email FROM users").unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn opens_an_on_disk_cache_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.sqlite3");
        let store = Store::open(&path).unwrap();
        assert!(path.exists());
        store.register_table(&users_schema()).unwrap();
        // Reopening the same file should find the catalog already initialized.
        drop(store);
        let reopened = Store::open(&path).unwrap();
        assert!(reopened.get_metadata("users").unwrap().is_some());
    }
}
