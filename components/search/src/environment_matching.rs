/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! This module defines functions for testing if an environment from the
//! configuration matches the user environment.

use crate::{JSONVariantEnvironment, SearchApplicationName, SearchUserEnvironment};

/// Matches the user's environment against the given environment from the
/// configuration.
///
/// This function expects the locale, region and app version in the environment
/// to be lower case.
pub(crate) fn matches_user_environment(
    environment: &JSONVariantEnvironment,
    user_environment: &SearchUserEnvironment,
) -> bool {
    if !environment.excluded_distributions.is_empty()
        && environment
            .excluded_distributions
            .contains(&user_environment.distribution_id)
    {
        return false;
    }

    matches_region_and_locale(
        &user_environment.region,
        &user_environment.locale,
        environment,
    ) && matches_distribution(
        &user_environment.distribution_id,
        &environment.distributions,
    ) && matches_application(&user_environment.app_name, &environment.applications)
}

/// Determines whether the region and locale constraints in the supplied
/// environment apply to a user given the region and locale they are using.
fn matches_region_and_locale(
    user_region: &str,
    user_locale: &str,
    environment: &JSONVariantEnvironment,
) -> bool {
    if does_array_include(&environment.excluded_regions, user_region)
        || does_array_include(&environment.excluded_locales, user_locale)
    {
        return false;
    }

    // This is a special case, if all_regions_and_locales is false (default value)
    // and region and locales are not set, then we assume that for the purposes of
    // matching region & locale, we do match everywhere. This allows us to specify
    // none of these options but match against other items such as distribution or
    // application name.
    if !environment.all_regions_and_locales
        && environment.regions.is_empty()
        && environment.locales.is_empty()
    {
        return true;
    }

    if does_array_include(&environment.regions, user_region)
        && does_array_include(&environment.locales, user_locale)
    // && environment.all_regions_and_locales
    {
        return true;
    }

    if environment.regions.is_empty() && does_array_include(&environment.locales, user_locale) {
        return true;
    }

    if environment.locales.is_empty() && does_array_include(&environment.regions, user_region) {
        return true;
    }

    if environment.all_regions_and_locales {
        return true;
    }

    false
}

fn matches_distribution(user_distribution_id: &str, environment_distributions: &[String]) -> bool {
    environment_distributions.is_empty()
        || environment_distributions.contains(&user_distribution_id.to_string())
}

fn matches_application(
    user_application_name: &SearchApplicationName,
    environment_applications: &[SearchApplicationName],
) -> bool {
    environment_applications.is_empty() || environment_applications.contains(user_application_name)
}

fn does_array_include(config_array: &[String], compare_item: &str) -> bool {
    !config_array.is_empty()
        && config_array
            .iter()
            .any(|x| x.to_lowercase() == compare_item)
}
