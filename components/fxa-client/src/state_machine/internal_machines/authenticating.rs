/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use super::{invalid_transition, Event, InternalStateMachine, State};
use crate::{Error, FxaEvent, FxaState, Result};

pub struct AuthenticatingStateMachine;

// Save some typing
use Event::*;
use State::*;

impl InternalStateMachine for AuthenticatingStateMachine {
    fn initial_state(&self, event: FxaEvent) -> Result<State> {
        match event {
            FxaEvent::CompleteOAuthFlow { code, state } => Ok(CompleteOAuthFlow {
                code: code.clone(),
                state: state.clone(),
            }),
            FxaEvent::CancelOAuthFlow => Ok(Complete(FxaState::Disconnected)),
            // These next 2 cases allow apps to begin a new oauth flow when we're already in the
            // middle of an existing one.
            FxaEvent::BeginOAuthFlow { scopes, entrypoint } => {
                Ok(State::BeginOAuthFlow { scopes, entrypoint })
            }
            FxaEvent::BeginPairingFlow {
                pairing_url,
                scopes,
                entrypoint,
            } => Ok(State::BeginPairingFlow {
                pairing_url,
                scopes,
                entrypoint,
            }),
            e => Err(Error::InvalidStateTransition(format!(
                "Authenticating -> {e}"
            ))),
        }
    }

    fn next_state(&self, state: State, event: Event) -> Result<State> {
        Ok(match (state, event) {
            (CompleteOAuthFlow { .. }, CompleteOAuthFlowSuccess) => InitializeDevice,
            (CompleteOAuthFlow { .. }, CallError) => Complete(FxaState::Disconnected),
            (InitializeDevice, InitializeDeviceSuccess) => Complete(FxaState::Connected),
            (InitializeDevice, CallError) => Complete(FxaState::Disconnected),
            (BeginOAuthFlow { .. }, BeginOAuthFlowSuccess { oauth_url }) => {
                Complete(FxaState::Authenticating { oauth_url })
            }
            (BeginPairingFlow { .. }, BeginPairingFlowSuccess { oauth_url }) => {
                Complete(FxaState::Authenticating { oauth_url })
            }
            (BeginOAuthFlow { .. }, CallError) => Complete(FxaState::Disconnected),
            (BeginPairingFlow { .. }, CallError) => Complete(FxaState::Disconnected),
            (state, event) => return invalid_transition(state, event),
        })
    }
}
