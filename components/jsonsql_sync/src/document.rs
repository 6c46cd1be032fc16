/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Schema document (de)serialization: the YAML/JSON on-disk
//! shape a `SchemaRegistry` can be loaded from or saved to.

use crate::error::{Error, Result};
use crate::schema::{FieldDefinition, SchemaRegistry, SyncConfig, TableMetadata, TableSchema};
use std::collections::BTreeMap;

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SchemaDocument {
    pub schemas: BTreeMap<String, TableDocument>,
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct TableDocument {
    pub total_fields: u32,
    pub fields: BTreeMap<String, FieldDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_config: Option<SyncConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TableMetadata>,
}

impl SchemaDocument {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Merge this document into a registry. Order of `fields` entries is
    /// irrelevant (the integer key is authoritative); a duplicate position
    /// within one table is rejected rather than silently letting the later
    /// entry win.
    pub fn load_into(&self, registry: &mut SchemaRegistry) -> Result<()> {
        for (table_name, doc) in &self.schemas {
            let mut fields = BTreeMap::new();
            for (key, field) in &doc.fields {
                let position: u32 = key
                    .parse()
                    .map_err(|_| Error::Configuration(format!("non-integer field key {key:?} in {table_name}")))?;
                if fields.insert(position, field.clone()).is_some() {
                    return Err(Error::Configuration(format!(
                        "duplicate position {position} in schema document for {table_name}"
                    )));
                }
            }
            let schema = TableSchema {
                table_name: table_name.clone(),
                fields,
                total_fields: doc.total_fields,
                sync_config: doc.sync_config.clone(),
                metadata: doc.metadata.clone(),
            };
            registry.register(schema);
        }
        Ok(())
    }

    /// Project a registry back into the document shape.
    pub fn save(registry: &SchemaRegistry) -> Self {
        let mut schemas = BTreeMap::new();
        for name in registry.list_tables() {
            let Some(schema) = registry.get(&name) else {
                continue;
            };
            let fields = schema
                .fields
                .iter()
                .map(|(pos, field)| (pos.to_string(), field.clone()))
                .collect();
            schemas.insert(
                name,
                TableDocument {
                    total_fields: schema.total_fields,
                    fields,
                    sync_config: schema.sync_config.clone(),
                    metadata: schema.metadata.clone(),
                },
            );
        }
        Self { schemas }
    }
}
