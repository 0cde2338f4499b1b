pub mod cache;
pub mod config;
pub mod demo;
pub mod error;
pub mod fingerprint;
pub mod recorder;
pub mod remote;
pub mod store;

pub use error::{Result, StoreError};
