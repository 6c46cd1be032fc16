/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::error::*;
use serde::de::Error;
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, Hash, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TabsRecordTab {
    pub title: String,
    pub url_history: Vec<String>,
    pub icon: Option<String>,
    pub last_used: u64, // Seconds since epoch!
}

#[derive(Debug, Clone, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabsRecord {
    pub id: String, // `String` instead of `SyncGuid` because some IDs are FxA device ID.
    pub client_name: String,
    pub tabs: Vec<TabsRecordTab>,
    #[serde(default)]
    pub ttl: u32,
}

impl TabsRecord {
    #[inline]
    pub fn from_payload(payload: sync15::Payload) -> Result<Self> {
        // Note: We are hand-parsing the tabs payload so that we can provide support for
        // older clients that may have a stringified float or integer `last_used` value.
        let id = payload.id.to_string();
        let client_name =
            parse_string_from_json(&"clientName", payload.data.get("clientName"), false)?
                .expect("client name to have a value");
        let tabs: Vec<TabsRecordTab> = payload
            .data
            .get("tabs")
            .ok_or_else(|| serde_json::Error::custom("missing field `tabs`"))?
            .as_array()
            .ok_or_else(|| serde_json::Error::custom("invalid `tabs`, expected sequence"))?
            .iter()
            .map(|x| -> Result<TabsRecordTab> {
                let tabs_obj: Map<String, JsonValue> = x.as_object().unwrap_or(&Map::new()).clone();
                let title: String = parse_string_from_json(&"title", tabs_obj.get("title"), false)?
                    .expect("tab title to have a value");
                let url_history: Vec<String> = tabs_obj
                    .get("urlHistory")
                    .ok_or_else(|| serde_json::Error::custom("missing field `urlHistory`"))?
                    .as_array()
                    .ok_or_else(|| {
                        serde_json::Error::custom("invalid `urlHistory`, expected sequence")
                    })?
                    .iter()
                    .map(|u| -> Result<String> {
                        Ok(u.as_str()
                            .ok_or_else(|| {
                                serde_json::Error::custom(
                                    "invalid `urlHistory` value, expected string",
                                )
                            })?
                            .to_string())
                    })
                    .into_iter()
                    .collect::<Result<_>>()?;
                let icon = parse_string_from_json("icon", tabs_obj.get("icon"), true)?;
                let last_used = parse_last_used(
                    tabs_obj
                        .get("lastUsed")
                        .ok_or_else(|| serde_json::Error::custom("missing field `lastUsed`"))?,
                )?;

                Ok(TabsRecordTab {
                    title,
                    url_history,
                    icon,
                    last_used,
                })
            })
            .into_iter()
            .collect::<Result<_>>()?;

        let ttl: u32 = match payload.data.get("ttl") {
            Some(v) => v.as_u64().unwrap_or_default() as u32,
            None => u32::default(),
        };

        Ok(TabsRecord {
            id,
            client_name,
            tabs,
            ttl,
        })
    }
}

fn parse_last_used(last_used_val: &JsonValue) -> Result<u64> {
    // In order to support older clients, we are handling `last used` values that
    // are either floats, integers, or stringified floats or integers. We attempt to
    // represent `last used` as a float before converting it to an integer. If that
    // operation isn't successful, we try converting `last used` to an integer directly.
    // If that isn't successful, we return an error.

    let invalid_err_msg = "invalid `lastUsed`, expected u64";
    let last_used = if last_used_val.is_string() {
        let l = last_used_val.as_str().unwrap_or_default();

        match l.parse::<f64>() {
            Ok(f) => f.trunc() as u64,
            Err(_) => l
                .parse::<u64>()
                .map_err(|_| serde_json::Error::custom(invalid_err_msg))?,
        }
    } else {
        match last_used_val.as_f64() {
            Some(f) => f.trunc() as u64,
            None => last_used_val
                .as_u64()
                .ok_or_else(|| serde_json::Error::custom(invalid_err_msg))?,
        }
    };

    Ok(last_used)
}

fn parse_string_from_json(
    field_name: &str,
    val: Option<&JsonValue>,
    can_be_empty: bool,
) -> Result<Option<String>> {
    if can_be_empty && val.is_none() {
        Ok(None)
    } else {
        Ok(Some(
            val.ok_or_else(|| {
                serde_json::Error::custom(format!("missing field `{}`", field_name))
            })?
            .as_str()
            .ok_or_else(|| {
                serde_json::Error::custom(format!("invalid `{}`, expected string", field_name))
            })?
            .to_string(),
        ))
    }
}
