pub mod meta_store;

/// the default port of the store server for client requests
pub const STORE_DEFAULT_PORT: u16 = 3002;
