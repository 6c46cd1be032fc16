/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

pub const PROFILE: &'static str = "profile";
pub const INSTANCES_READ: &'static str = "clients:read";
pub const COMMANDS_WRITE: &'static str = "commands:write";
