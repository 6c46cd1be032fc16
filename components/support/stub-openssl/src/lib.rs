#![warn(rust_2018_idioms)]

pub mod bn;
pub mod derive;
pub mod ec;
pub mod error;
pub mod nid;
pub mod pkey;
pub mod rand;
pub mod symm;
