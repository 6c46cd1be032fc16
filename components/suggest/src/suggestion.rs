/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use chrono::Local;

/// The template parameter for a timestamp in a "raw" sponsored suggestion URL.
const TIMESTAMP_TEMPLATE: &str = "%YYYYMMDDHH%";

/// The length, in bytes, of a timestamp in a "cooked" sponsored suggestion URL.
///
/// Cooked timestamps don't include the leading or trailing `%`, so this is
/// 2 bytes shorter than [`TIMESTAMP_TEMPLATE`].
const TIMESTAMP_LENGTH: usize = 10;

/// A suggestion from the database to show in the address bar.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Suggestion {
    Amp {
        title: String,
        url: String,
        raw_url: String,
        icon: Option<Vec<u8>>,
        full_keyword: String,
        block_id: i64,
        advertiser: String,
        iab_category: String,
        impression_url: String,
        click_url: String,
        raw_click_url: String,
    },
    Wikipedia {
        title: String,
        url: String,
        icon: Option<Vec<u8>>,
        full_keyword: String,
    },
}

impl Suggestion {
    /// Returns `true` if the suggestion is sponsored.
    pub(crate) fn is_sponsored(&self) -> bool {
        matches!(self, Self::Amp { .. })
    }
}

/// Replaces all template parameters in a "raw" sponsored suggestion URL,
/// producing a "cooked" URL with real values.
pub(crate) fn cook_raw_suggestion_url(raw_url: &str) -> String {
    let replacement = Local::now().format("%Y%m%d%H").to_string();
    debug_assert!(replacement.len() == TIMESTAMP_LENGTH);
    raw_url.replace(TIMESTAMP_TEMPLATE, &replacement)
}

/// Determines whether a "raw" sponsored suggestion URL is equivalent to a
/// "cooked" URL. The two URLs are equivalent if they are identical except for
/// their replaced template parameters, which can be different.
pub fn raw_suggestion_url_matches(raw_url: &str, cooked_url: &str) -> bool {
    let mut last_raw_url_index = 0;

    // The running difference between indices in the raw URL and the
    // corresponding indices in the cooked URL.
    let mut cooked_url_diff = 0;

    // Ensure that the segments between the timestamps are the same.
    for (raw_url_index, _) in raw_url.match_indices(TIMESTAMP_TEMPLATE) {
        let raw_url_segment = &raw_url[last_raw_url_index..raw_url_index];
        let Some(cooked_url_segment) =
            cooked_url.get(last_raw_url_index - cooked_url_diff..raw_url_index - cooked_url_diff)
        else {
            // The corresponding indices in the cooked URL are out-of-bounds,
            // so the URLs can't match.
            return false;
        };
        if raw_url_segment != cooked_url_segment {
            // The corresponding segments between the last timestamp and this
            // timestamp are different, so the URLs can't match.
            return false;
        }
        last_raw_url_index = raw_url_index + TIMESTAMP_TEMPLATE.len();
        cooked_url_diff += TIMESTAMP_TEMPLATE.len() - TIMESTAMP_LENGTH;
    }

    // Ensure that the last corresponding segments, after the last timestamp,
    // are the same.
    let last_raw_url_segment = &raw_url[last_raw_url_index..];
    match cooked_url.get(last_raw_url_index - cooked_url_diff..) {
        Some(last_cooked_url_segment) => last_raw_url_segment == last_cooked_url_segment,
        None => false,
    }
}
