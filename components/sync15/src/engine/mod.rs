/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

mod bridged_engine;
mod changeset;
mod request;
mod sync_engine;

pub use bridged_engine::{
    ApplyResults, BridgedEngine, IncomingEnvelope, OutgoingEnvelope, PayloadError,
};
pub use changeset::{IncomingChangeset, OutgoingChangeset, RecordChangeset};
pub use request::{CollectionRequest, RequestOrder};
pub use sync_engine::{CollSyncIds, EngineSyncAssociation, SyncEngine, SyncEngineId};
