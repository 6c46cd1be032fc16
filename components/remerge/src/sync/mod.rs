/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */
mod driver;
mod meta_records;
pub(crate) mod records;
pub(crate) mod schema_action;
mod store;
pub use driver::RemergeSync;
pub(crate) use meta_records::RemoteSchemaEnvelope;
pub use store::RemergeStore;
