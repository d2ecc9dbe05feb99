//! This module defines the command line interface (CLI) of the program. It is
//! responsible for parsing the command line arguments and options and _not_
//! for the interactive REPL. See [repl module](crate::repl) for that.
use clap::Parser;
use protocol::STORE_DEFAULT_PORT;
use shared::logger::LogLevel;
use std::{
    net::{SocketAddr, ToSocketAddrs},
    path::{Path, PathBuf},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Domain name or ip address of the server to connect to
    #[arg(short, long)]
    address: Option<String>,

    /// Port of the server to connect to
    #[arg(short, long, default_value_t = STORE_DEFAULT_PORT)]
    port: u16,

    /// Cluster id sent in every request header
    #[arg(long, default_value_t = 0)]
    cluster_id: u64,

    /// Member id sent in every request header
    #[arg(long, default_value_t = 0)]
    member_id: u64,

    /// Set the log level.
    #[arg(long = "ll", value_enum, default_value_t)]
    log_level: LogLevel,

    /// Relative path to the client's log file.
    #[arg(short = 'l', long, default_value = "./data/client/client.log")]
    log_file: PathBuf,
}

impl Args {
    pub fn server_addr(&self) -> Option<Result<SocketAddr, String>> {
        let addr = self.address.as_ref()?;
        Some(to_ipv4_socket_addr(addr, &self.port.to_string()))
    }
    pub fn cluster_id(&self) -> u64 {
        self.cluster_id
    }
    pub fn member_id(&self) -> u64 {
        self.member_id
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
            .unwrap_or(Path::new("client.log"))
    }
}

pub fn parse_args() -> Args {
    Args::parse()
}

pub fn to_ipv4_socket_addr(addr: &str, port: &str) -> Result<SocketAddr, String> {
    format!("{}:{}", addr, port)
        .to_socket_addrs()
        .map_err(|e| format!("Could not resolve server address {} {}: {}", addr, port, e))?
        .find(|addr| addr.is_ipv4())
        .ok_or_else(|| format!("No ipv4 address found for {} {}", addr, port))
}
