// Copyright 2025 bgpblast Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub neighbors: Vec<NeighborConfig>,
}

/// One benchmark target. Immutable for the lifetime of its session engine.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NeighborConfig {
    /// Remote IPv4 address
    pub neighbor: Ipv4Addr,
    #[serde(default = "default_neighbor_port")]
    pub neighbor_port: u16,
    /// Expected peer AS; informational, not verified against the peer OPEN
    pub remote_as: u32,
    /// IPv4 bind address for the outbound socket
    pub local_address: Ipv4Addr,
    /// Local AS, advertised in OPEN and in the 4-octet AS capability
    pub local_as: u32,
    /// BGP identifier advertised in OPEN
    pub router_id: Ipv4Addr,
    /// First /32 prefix to announce
    pub prefix_start: Ipv4Addr,
    /// Number of sequential /32 prefixes to announce; 0 disables pacing
    pub prefix_amount: u32,
    #[serde(default = "default_hold_time")]
    pub hold_time_secs: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_neighbor_port() -> u16 {
    179
}

fn default_hold_time() -> u16 {
    180
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

impl NeighborConfig {
    pub fn remote_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.neighbor, self.neighbor_port))
    }

    /// Local bind address for the outbound connection (ephemeral port)
    pub fn local_bind_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.local_address, 0))
    }
}
