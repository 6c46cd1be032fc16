/* This Source Code Form is subject to the terms of the Mozilla Public
* License, v. 2.0. If a copy of the MPL was not distributed with this
* file, You can obtain one at http://mozilla.org/MPL/2.0/. */

mod hasher;
mod types;
mod validator;

pub(crate) use hasher::{Sha256Hasher, StructureHasher};
pub(crate) use types::TypeQuery;
pub(crate) use validator::StructureValidator;
