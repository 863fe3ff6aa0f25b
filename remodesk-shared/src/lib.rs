#![warn(rust_2018_idioms)]

pub mod crypto;
pub mod error;
