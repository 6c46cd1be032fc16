/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use super::FirefoxAccount;
use crate::{FirefoxAccountEventHandler, Profile};

// [`FirefoxAccountEventHandler`] to use if the app doesn't set one, it's a noop
pub(crate) struct DefaultFirefoxAccountEventHandler;
impl FirefoxAccountEventHandler for DefaultFirefoxAccountEventHandler {
    fn profile_updated(&self, _profile: Profile) {}
}

impl FirefoxAccount {
    /// Register a new event handler that is implemented by the application
    pub(crate) fn register_event_handler(
        &mut self,
        event_handler: Box<dyn FirefoxAccountEventHandler>,
    ) {
        self.event_handler = event_handler;
    }

    /// Unregister the event handler set by the app, and resets it to the default, no-op handler
    pub(crate) fn unregister_event_handler(&mut self) {
        self.event_handler = Box::new(DefaultFirefoxAccountEventHandler);
    }
}
