//! This module defines the command line interface (CLI) of the server.
use crate::cache::CacheEvictionStrategy;
use crate::log_storage::LogOptions;
use crate::storage::StorageKind;
use clap::error::ErrorKind;
use clap::CommandFactory;
use clap::Parser;
use protocol::STORE_DEFAULT_PORT;
use shared::logger::LogLevel;
use std::{
    net::{SocketAddr, ToSocketAddrs},
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Ip address of the server.
    #[arg(short = 'a', long, default_value = "localhost")]
    address: String,

    /// Port of the server to listen for clients' requests.
    #[arg(short = 'p', long, default_value_t = STORE_DEFAULT_PORT)]
    port: u16,

    /// Directory holding the log files of the storage.
    #[arg(short = 'd', long, default_value = "./data/kv_server/storage")]
    directory: PathBuf,

    /// Storage engine to use.
    #[arg(long, value_enum, default_value_t)]
    storage: StorageKind,

    /// Relative path to the server's log file.
    #[arg(short = 'l', long, default_value = "./data/kv_server/kv_server.log")]
    log_file: PathBuf,

    /// Set the log level.
    #[arg(long = "ll", value_enum, default_value_t)]
    log_level: LogLevel,

    /// Set the cache size in number of entries. 0 disables the cache.
    #[arg(short = 'c', long, default_value_t = 30)]
    cache_size: usize,

    /// Set the cache eviction strategy.
    #[arg(short = 's', long, value_enum, default_value_t)]
    cache_eviction_strategy: CacheEvictionStrategy,

    /// Cluster id stamped on every response header.
    #[arg(long, default_value_t = 0)]
    cluster_id: u64,

    /// Size in bytes after which the active log file is rotated.
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    max_log_file_size: u64,

    /// Flush every write to the disk before acknowledging it.
    #[arg(long, default_value_t = false)]
    sync_writes: bool,

    /// Seconds after which a request is aborted.
    #[arg(long, default_value_t = 5)]
    request_timeout: u64,

    /// Maximum number of concurrent requests per client connection.
    #[arg(long, default_value_t = 64)]
    concurrency_limit: usize,

    /// Number of requests that may queue up in front of the store.
    #[arg(long, default_value_t = 128)]
    store_queue_size: usize,
}

impl Args {
    pub fn validate(self) -> Self {
        if self.request_timeout == 0 {
            let mut cmd = Self::command();
            cmd.error(
                ErrorKind::InvalidValue,
                "request timeout must be at least one second",
            )
            .exit();
        }
        if self.concurrency_limit == 0 || self.store_queue_size == 0 {
            let mut cmd = Self::command();
            cmd.error(
                ErrorKind::InvalidValue,
                format!(
                    "concurrency limit ({}) and store queue size ({}) must be bigger than 0",
                    self.concurrency_limit, self.store_queue_size
                ),
            )
            .exit();
        }
        if self.max_log_file_size == 0 {
            let mut cmd = Self::command();
            cmd.error(
                ErrorKind::InvalidValue,
                "maximum log file size must be bigger than 0",
            )
            .exit();
        }
        if let Err(e) = Self::resolve_addr(&format!("{}:{}", self.address, self.port)) {
            let mut cmd = Self::command();
            cmd.error(ErrorKind::InvalidValue, e).exit();
        }
        self
    }
    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }
    pub fn log_dir(&self) -> &Path {
        self.log_file.parent().unwrap_or(Path::new("."))
    }
    pub fn log_file(&self) -> &Path {
        self.log_file
            .file_name()
            .map(|f| f.as_ref())
            .unwrap_or(Path::new("server.log"))
    }
    fn resolve_addr(string: &str) -> Result<SocketAddr, String> {
        string
            .to_socket_addrs()
            .map_err(|e| {
                format!(
                    "Could not resolve server address by looking up DNS {}: {}",
                    string, e
                )
            })?
            .find(|addr| addr.is_ipv4())
            .ok_or_else(|| format!("Could not resolve server address by filtering V4 {}", string))
    }
    pub fn socket_addr(&self) -> SocketAddr {
        Self::resolve_addr(&format!("{}:{}", self.address, self.port))
            .unwrap_or_else(|e| Self::command().error(ErrorKind::InvalidValue, e).exit())
    }
    pub fn cache_size(&self) -> usize {
        self.cache_size
    }
    pub fn cache_eviction_strategy(&self) -> CacheEvictionStrategy {
        self.cache_eviction_strategy
    }
    pub fn data_dir(&self) -> &Path {
        self.directory.as_path()
    }
    pub fn storage(&self) -> StorageKind {
        self.storage
    }
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            max_file_size: self.max_log_file_size,
            sync_writes: self.sync_writes,
        }
    }
    pub fn cluster_id(&self) -> u64 {
        self.cluster_id
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }
    pub fn store_queue_size(&self) -> usize {
        self.store_queue_size
    }
}

pub fn parse_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["kv_server"]).unwrap().validate();
        assert_eq!(args.socket_addr().port(), STORE_DEFAULT_PORT);
        assert_eq!(args.storage(), StorageKind::Log);
        assert_eq!(args.cache_eviction_strategy(), CacheEvictionStrategy::Fifo);
        assert_eq!(args.log_level(), LogLevel::Info);
        assert_eq!(args.log_file(), Path::new("kv_server.log"));
        assert_eq!(args.log_dir(), Path::new("./data/kv_server"));
        assert!(!args.log_options().sync_writes);
    }

    #[test]
    fn parses_options() {
        let args = Args::try_parse_from([
            "kv_server",
            "--port",
            "4000",
            "--storage",
            "memory",
            "-s",
            "LFU",
            "--ll",
            "DEBUG",
            "--cluster-id",
            "42",
            "--sync-writes",
            "--request-timeout",
            "10",
        ])
        .unwrap();
        assert_eq!(args.port, 4000);
        assert_eq!(args.storage(), StorageKind::Memory);
        assert_eq!(args.cache_eviction_strategy(), CacheEvictionStrategy::Lfu);
        assert_eq!(args.log_level(), LogLevel::Debug);
        assert_eq!(args.cluster_id(), 42);
        assert!(args.log_options().sync_writes);
        assert_eq!(args.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_unknown_storage() {
        assert!(Args::try_parse_from(["kv_server", "--storage", "rocks"]).is_err());
    }

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }
}
