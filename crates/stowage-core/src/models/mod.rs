//! Data models shared by the storage subsystem and the HTTP API.

mod storage;

pub use storage::*;
