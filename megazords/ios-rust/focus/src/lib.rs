/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

#![allow(unknown_lints)]
#![warn(rust_2018_idioms)]

pub use error_support;
pub use nimbus;
pub use rc_log_ffi;
pub use remote_settings;
pub use rust_log_forwarder;
pub use viaduct_reqwest;
