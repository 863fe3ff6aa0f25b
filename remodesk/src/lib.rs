#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod config;
pub mod connector;
pub mod constants;
pub mod description;
pub mod session;
pub mod session_manager;
pub mod transport;

pub use shared::error::{Error, Result};
