/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::sync::atomic::{AtomicBool, Ordering};
mod foreign_logger;
mod rust_logger;

pub use foreign_logger::{Level, Logger, Record};

static HAVE_SET_MAX_LEVEL: AtomicBool = AtomicBool::new(false);

/// Set the logger to forward to.
///
/// Pass in None to disable logging.
pub fn set_logger(logger: Option<Box<dyn Logger>>) {
    // Set a default max level, if none has already been set
    if !HAVE_SET_MAX_LEVEL.load(Ordering::Relaxed) {
        set_max_level(Level::Debug);
    }
    rust_logger::set_foreign_logger(logger)
}

/// Set the maximum log level filter.  Records below this level will not be sent to the logger.
pub fn set_max_level(level: Level) {
    log::set_max_level(level.to_level_filter());
    HAVE_SET_MAX_LEVEL.store(true, Ordering::Relaxed);
}

uniffi::include_scaffolding!("rust_log_forwarder");
