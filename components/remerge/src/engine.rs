/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::error::*;
use crate::storage::{db::RemergeDb, NativeRecord, NativeSchemaAndText, SchemaBundle};
use crate::Guid;
use std::convert::{TryFrom, TryInto};
use std::path::Path;

/// "Friendly" public api for using Remerge.
pub struct RemergeEngine {
    pub(crate) db: RemergeDb,
}

impl RemergeEngine {
    pub fn open(path: impl AsRef<Path>, schema_json: impl AsRef<str>) -> Result<Self> {
        let schema = NativeSchemaAndText::try_from(schema_json.as_ref())?;
        let conn = rusqlite::Connection::open(path.as_ref())?;
        let db = RemergeDb::with_connection(conn, schema)?;
        Ok(Self { db })
    }

    pub fn open_in_memory(schema_json: impl AsRef<str>) -> Result<Self> {
        let schema = NativeSchemaAndText::try_from(schema_json.as_ref())?;
        let conn = rusqlite::Connection::open_in_memory()?;
        let db = RemergeDb::with_connection(conn, schema)?;
        Ok(Self { db })
    }

    pub fn bundle(&self) -> &SchemaBundle {
        self.db.bundle()
    }

    pub fn list(&self) -> Result<Vec<NativeRecord>> {
        self.db.get_all()
    }

    pub fn exists(&self, id: impl AsRef<str>) -> Result<bool> {
        self.db.exists(id.as_ref())
    }

    pub fn get(&self, id: impl AsRef<str>) -> Result<Option<NativeRecord>> {
        self.db.get_by_id(id.as_ref())
    }

    pub fn delete(&self, id: impl AsRef<str>) -> Result<bool> {
        self.db.delete_by_id(id.as_ref())
    }

    pub fn update<R>(&self, rec: R) -> Result<()>
    where
        R: TryInto<NativeRecord>,
        Error: From<R::Error>,
    {
        self.db.update_record(&rec.try_into()?)
    }

    pub fn insert<R>(&self, rec: R) -> Result<Guid>
    where
        R: TryInto<NativeRecord>,
        Error: From<R::Error>,
    {
        self.db.create(&rec.try_into()?)
    }
}
