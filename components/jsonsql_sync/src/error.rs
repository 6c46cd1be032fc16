/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("unknown sync strategy: {0}")]
    SyncStrategy(String),

    #[error("sync already in progress for table {0}")]
    SyncInProgress(String),

    #[error("bad sync configuration: {0}")]
    Configuration(String),

    #[error("client error: {0}")]
    Client(#[from] crate::client::ClientError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database open error: {0}")]
    OpenDatabase(#[from] sql_support::open_database::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema document error: {0}")]
    Document(#[from] serde_yaml::Error),

    #[error("{0}")]
    Interrupted(#[from] interrupt_support::Interrupted),
}

impl Error {
    /// A short, PII-free label suitable for telemetry.
    pub fn label(&self) -> &'static str {
        match self {
            Error::TableNotFound(_) => "TableNotFound",
            Error::SyncStrategy(_) => "SyncStrategy",
            Error::SyncInProgress(_) => "SyncInProgress",
            Error::Configuration(_) => "Configuration",
            Error::Client(_) => "Client",
            Error::Database(_) => "Database",
            Error::OpenDatabase(_) => "OpenDatabase",
            Error::Json(_) => "Json",
            Error::Document(_) => "Document",
            Error::Interrupted(_) => "Interrupted",
        }
    }
}
