/* This Source Code Form is subject to the terms of the Mozilla Public
* License, v. 2.0. If a copy of the MPL was not distributed with this
* file, You can obtain one at http://mozilla.org/MPL/2.0/.
*/

//! Nimbus experiment integration for ads-client.

use nimbus::NimbusClient;
use std::sync::Arc;

const FEATURE_ID: &str = "ads-client";

/// Query NimbusClient to check if HTTP cache is enabled for this user.
/// Returns true (cache enabled) by default if no NimbusClient or no experiment is active.
pub fn is_http_cache_enabled(nimbus: Option<Arc<NimbusClient>>) -> bool {
    let Some(nimbus) = nimbus else {
        return true; // Default: cache enabled
    };

    let Ok(Some(json)) = nimbus.get_feature_config_variables(FEATURE_ID.to_string()) else {
        return true; // Default: cache enabled
    };

    serde_json::from_str::<serde_json::Value>(&json)
        .ok()
        .and_then(|v| v.get("http-cache-enabled")?.as_bool())
        .unwrap_or(true)
}
