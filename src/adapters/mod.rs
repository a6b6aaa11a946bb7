// Adapters layer: concrete implementations for external systems (files, http).

pub mod delimited;
pub mod http;
pub mod storage;
