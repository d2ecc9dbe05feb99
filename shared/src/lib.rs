pub mod envelope;
pub mod key;
pub mod logger;
pub mod retry;
pub mod value;
