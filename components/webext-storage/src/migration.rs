/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::error::*;
use rusqlite::{Connection, OpenFlags, Transaction, NO_PARAMS};
use serde_json::{Map, Value};
use sql_support::ConnExt;
use std::path::PathBuf;

// Simple migration from the "old" kinto-with-sqlite-backing implementation
// to ours.
// Could almost be trivially done in JS using the regular public API if not
// for:
// * We don't want to enforce the same quotas when migrating.
// * We'd rather do the entire migration in a single transaction for perf
//   reasons.

// The sqlite database we migrate from has a very simple structure:
// * table collection_data with columns collection_name, record_id and record
// * `collection_name` is a string of form "default/{extension_id}"
// * `record_id` is `key-{key}`
// * `record` is a string with json, of form: {
//     id: {the record id repeated},
//     key: {the key},
//     data: {the actual data},
//     _status: {sync status},
//     last_modified: {timestamp},
//  }
// So the info we need is stored somewhat redundantly.
// Further:
// * There's a special collection_name "default/storage-sync-crypto" that
//   we don't want to migrate. Its record_id is 'keys' and its json has no
//   `data`

// We don't enforce a real quota, but don't want to exceed the
// sync server's BSO size and also just be generally sane - so stop at 1.5MB
// and also 2k of keys
const MAX_LEN: usize = 1_512_000;
const MAX_KEYS: usize = 2048;

// The struct we read from the DB.
struct LegacyRow {
    col_name: String, // collection_name column
    record: String,   // record column
}

impl LegacyRow {
    // Parse the 2 columns from the DB into the data we need to insert into
    // our target database.
    fn parse(&self) -> Option<Parsed<'_>> {
        if self.col_name.len() < 8 {
            log::trace!("collection_name of '{}' is too short", self.col_name);
            return None;
        }
        if &self.col_name[..8] != "default/" {
            log::trace!("collection_name of '{}' isn't ours", self.col_name);
            return None;
        }
        let ext_id = &self.col_name[8..];
        let mut record_map = match serde_json::from_str(&self.record) {
            Ok(Value::Object(m)) => m,
            Ok(o) => {
                log::info!("skipping non-json-object 'record' column");
                log::trace!("record value is json, but not an object: {}", o);
                return None;
            }
            Err(e) => {
                log::info!("skipping non-json 'record' column");
                log::trace!("record value isn't json: {}", e);
                return None;
            }
        };

        let key = match record_map.remove("key") {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(o) => {
                log::trace!("key is json but not a string: {}", o);
                return None;
            }
            _ => {
                log::trace!("key doesn't exist in the map");
                return None;
            }
        };
        let data = match record_map.remove("data") {
            Some(d) => d,
            _ => {
                log::trace!("data doesn't exist in the map");
                return None;
            }
        };
        Some(Parsed { ext_id, key, data })
    }
}

// The info we parse from the raw DB strings.
struct Parsed<'a> {
    ext_id: &'a str,
    key: String,
    data: serde_json::Value,
}

pub fn migrate(tx: &Transaction<'_>, filename: &PathBuf) -> Result<usize> {
    // We do the grouping manually, collecting string values as we go.
    let mut last_ext_id = "".to_string();
    let mut curr_values: Vec<(String, serde_json::Value)> = Vec::new();
    let mut curr_value_len = 0;
    let mut num_extensions = 0;
    for row in read_rows(filename)? {
        log::trace!("processing '{}' - '{}'", row.col_name, row.record);
        let parsed = match row.parse() {
            Some(p) => p,
            None => continue,
        };
        // Do our "grouping"
        if parsed.ext_id != last_ext_id {
            if last_ext_id != "" && !curr_values.is_empty() {
                // a different extension id - write what we have to the DB.
                if do_insert(tx, &last_ext_id, curr_values) {
                    num_extensions += 1;
                }
            }
            last_ext_id = parsed.ext_id.to_string();
            curr_values = Vec::new();
            curr_value_len = 0;
        }
        // no 'else' here - must also enter this block on ext_id change.
        if parsed.ext_id == last_ext_id {
            // Do our "quota but not a quota" thing.
            let new_len = curr_value_len + parsed.data.to_string().len() + parsed.key.len();
            if new_len < MAX_LEN && curr_values.len() < MAX_KEYS {
                curr_values.push((parsed.key.to_string(), parsed.data));
                curr_value_len = new_len;
            }
            log::trace!(
                "extension {} now has {} bytes, {} keys",
                parsed.ext_id,
                curr_value_len,
                curr_values.len()
            );
        }
    }
    // and the last one
    if last_ext_id != "" && !curr_values.is_empty() {
        // a different extension id - write what we have to the DB.
        if do_insert(tx, &last_ext_id, curr_values) {
            num_extensions += 1;
        }
    }
    log::info!("migrated {} extensions", num_extensions);
    Ok(num_extensions)
}

fn read_rows(filename: &PathBuf) -> Result<Vec<LegacyRow>> {
    let flags = OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_READ_ONLY;
    let src_conn = Connection::open_with_flags(&filename, flags)?;
    let mut stmt = src_conn.prepare(
        "SELECT collection_name, record FROM collection_data
         ORDER BY collection_name",
    )?;
    let rows = stmt
        .query_and_then(NO_PARAMS, |row| -> Result<LegacyRow> {
            Ok(LegacyRow {
                col_name: row.get(0)?,
                record: row.get(1)?,
            })
        })?
        .filter_map(Result::ok)
        .collect();
    Ok(rows)
}

fn do_insert(tx: &Transaction<'_>, ext_id: &str, vals: Vec<(String, Value)>) -> bool {
    let mut map = Map::with_capacity(vals.len());
    for (key, val) in vals {
        map.insert(key, val);
    }
    match tx.execute_named_cached(
        "INSERT OR REPLACE INTO storage_sync_data(ext_id, data, sync_change_counter)
         VALUES (:ext_id, :data, 1)",
        rusqlite::named_params! {
            ":ext_id": &ext_id,
            ":data": &Value::Object(map),
        },
    ) {
        Ok(_) => {
            log::trace!("successfully wrote data for {}", ext_id);
            true
        }
        Err(e) => {
            log::error!("failed to write data: {}", e);
            false
        }
    }
}
