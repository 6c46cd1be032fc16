/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

// Login entry from a server payload
//
// This struct is used for fetching/sending login records to the server.  There are a number
// of differences between this and the top-level Login struct; some fields are renamed, some are
// locally encrypted, etc.
use crate::encryption::EncryptorDecryptor;
use crate::error::*;
use crate::Login;
use serde_derive::*;
use sync_guid::Guid;

#[derive(Debug, Clone, Hash, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    #[serde(rename = "id")]
    pub guid: Guid,

    pub origin: String,

    // rename_all = "camelCase" by default will do formActionOrigin, but we can just
    // override this one field.
    #[serde(rename = "formActionOrigin")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_action_origin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_realm: Option<String>,

    #[serde(default)]
    pub username: String,

    pub password: String,

    #[serde(default)]
    pub username_field: String,

    #[serde(default)]
    pub password_field: String,

    #[serde(default)]
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub time_created: i64,

    #[serde(default)]
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub time_password_changed: i64,

    #[serde(default)]
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub time_last_used: i64,

    #[serde(default)]
    pub times_used: i64,
}

// These probably should be on the payload itself, but one refactor at a time!
impl Login {
    pub fn from_payload(
        sync_payload: sync15::Payload,
        encdec: &EncryptorDecryptor,
    ) -> Result<Self> {
        let p: crate::sync::LoginPayload = sync_payload.into_record()?;

        Ok(Login {
            id: p.guid.to_string(),
            origin: p.origin,
            form_action_origin: p.form_action_origin,
            http_realm: p.http_realm,
            username_enc: encdec.encrypt(&p.username)?,
            password_enc: encdec.encrypt(&p.password)?,
            username_field: p.username_field,
            password_field: p.password_field,
            time_created: p.time_created,
            time_password_changed: p.time_password_changed,
            time_last_used: p.time_last_used,
            times_used: p.times_used,
        })
    }

    pub fn into_payload(self, encdec: &EncryptorDecryptor) -> Result<sync15::Payload> {
        Ok(sync15::Payload::from_record(crate::sync::LoginPayload {
            guid: self.guid(),
            origin: self.origin,
            form_action_origin: self.form_action_origin,
            http_realm: self.http_realm,
            username: encdec.decrypt(&self.username_enc)?,
            password: encdec.decrypt(&self.password_enc)?,
            username_field: self.username_field,
            password_field: self.password_field,
            time_created: self.time_created,
            time_password_changed: self.time_password_changed,
            time_last_used: self.time_last_used,
            times_used: self.times_used,
        })?)
    }
}

// Quiet clippy, since this function is passed to deserialiaze_with...
#[allow(clippy::unnecessary_wraps)]
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    use serde::de::Deserialize;
    // Invalid and negative timestamps are all replaced with 0. Eventually we
    // should investigate replacing values that are unreasonable but still fit
    // in an i64 (a date 1000 years in the future, for example), but
    // appropriately handling that is complex.
    Ok(i64::deserialize(deserializer).unwrap_or_default().max(0))
}
