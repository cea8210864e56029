//! Command line configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::builder::RangedU64ValueParser;
use clap::Parser;

use crate::pipeline::DEFAULT_CAPACITY;

/// Default listening port
pub const DEFAULT_PORT: u16 = 8033;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Port to listen on. Use 0 for an ephemeral port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Messages buffered between producers and the broadcaster.
    #[arg(long, default_value_t = DEFAULT_CAPACITY, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub pipeline_capacity: usize,
}

impl Config {
    /// Socket address to bind
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            pipeline_capacity: DEFAULT_CAPACITY,
        }
    }
}
