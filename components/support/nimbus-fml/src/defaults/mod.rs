/* This Source Code Form is subject to the terms of the Mozilla Public
* License, v. 2.0. If a copy of the MPL was not distributed with this
* file, You can obtain one at http://mozilla.org/MPL/2.0/. */

mod hasher;
mod merger;
mod validator;

pub(crate) use hasher::DefaultsHasher;
pub(crate) use merger::DefaultsMerger;
pub(crate) use validator::DefaultsValidator;
