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

use super::msg::{Message, MessageType};
use super::msg_update_types::{AsPathSegmentType, Origin, PathAttribute};
use super::utils::Ipv4Net;
use std::net::Ipv4Addr;

/// Outbound UPDATE. The withdrawn-routes list is always empty: the load
/// generator only announces.
#[derive(Debug, PartialEq)]
pub struct UpdateMessage {
    pub path_attributes: Vec<PathAttribute>,
    pub nlri: Vec<Ipv4Net>,
}

impl UpdateMessage {
    pub fn new(path_attributes: Vec<PathAttribute>, nlri: Vec<Ipv4Net>) -> Self {
        UpdateMessage {
            path_attributes,
            nlri,
        }
    }

    /// Announcement with the three mandatory attributes: ORIGIN, a single
    /// AS_SEQUENCE of 4-octet ASNs, and NEXT_HOP.
    pub fn announcement(
        origin: Origin,
        as_path: &[u32],
        next_hop: Ipv4Addr,
        nlri: Vec<Ipv4Net>,
    ) -> Self {
        UpdateMessage {
            path_attributes: vec![
                PathAttribute::origin(origin),
                PathAttribute::as_path(AsPathSegmentType::AsSequence, as_path),
                PathAttribute::next_hop(next_hop),
            ],
            nlri,
        }
    }
}

/// Encode one NLRI entry: `prefix_len:u8` followed by the minimum number of
/// address octets covering the prefix (RFC 4271 Section 4.3).
pub fn encode_nlri(net: &Ipv4Net) -> Vec<u8> {
    let octets = net.address.octets();
    let byte_len = (net.prefix_length as usize + 7) / 8;
    let mut bytes = Vec::with_capacity(1 + byte_len);
    bytes.push(net.prefix_length);
    bytes.extend_from_slice(&octets[..byte_len]);
    bytes
}

impl Message for UpdateMessage {
    fn kind(&self) -> MessageType {
        MessageType::UPDATE
    }

    fn to_bytes(&self) -> Vec<u8> {
        let attrs: Vec<u8> = self
            .path_attributes
            .iter()
            .flat_map(|attr| attr.to_bytes())
            .collect();

        let mut bytes = Vec::with_capacity(4 + attrs.len() + self.nlri.len() * 5);

        // Withdrawn routes length (always empty)
        bytes.extend_from_slice(&0u16.to_be_bytes());

        // Total path attribute length
        bytes.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&attrs);

        for net in &self.nlri {
            bytes.extend_from_slice(&encode_nlri(net));
        }

        bytes
    }
}
