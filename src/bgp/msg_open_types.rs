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

//! OPEN optional parameters and the capabilities they carry (RFC 5492).

use super::utils::ByteReader;

/// OptionalParam type carrying capabilities (RFC 5492).
pub const PARAM_TYPE_CAPABILITIES: u8 = 2;

// IANA capability codes
// https://www.iana.org/assignments/capability-codes/capability-codes.xhtml
pub const CAP_MULTIPROTOCOL: u8 = 1; // RFC 2858
pub const CAP_ROUTE_REFRESH: u8 = 2; // RFC 2918
pub const CAP_GRACEFUL_RESTART: u8 = 64; // RFC 4724
pub const CAP_FOUR_OCTET_AS: u8 = 65; // RFC 6793
pub const CAP_ADD_PATH: u8 = 69; // RFC 7911
pub const CAP_FQDN: u8 = 73; // draft-walton-bgp-hostname-capability
pub const CAP_CISCO_ROUTE_REFRESH: u8 = 128; // Cisco pre-standard

pub const AFI_IPV4: u16 = 1;
pub const SAFI_UNICAST: u8 = 1;

/// A single capability: raw code plus its value octets. Constructors below
/// assemble the value for the codes this speaker knows how to build; the
/// decoder keeps whatever code arrives.
#[derive(Debug, PartialEq, Clone)]
pub struct Capability {
    pub code: u8,
    pub value: Vec<u8>,
}

impl Capability {
    /// Multiprotocol extension: AFI:u16, reserved:u8, SAFI:u8 (RFC 2858).
    pub fn multiprotocol(afi: u16, safi: u8) -> Self {
        let mut value = Vec::with_capacity(4);
        value.extend_from_slice(&afi.to_be_bytes());
        value.push(0x00); // Reserved
        value.push(safi);
        Capability {
            code: CAP_MULTIPROTOCOL,
            value,
        }
    }

    pub fn route_refresh() -> Self {
        Capability {
            code: CAP_ROUTE_REFRESH,
            value: Vec::new(),
        }
    }

    /// Graceful restart: restart flag (1 bit), 3 reserved bits, restart
    /// timer (12 bits), packed into a u16 (RFC 4724).
    pub fn graceful_restart(restarting: bool, restart_time: u16) -> Self {
        let mut word = restart_time & 0x0fff;
        if restarting {
            word |= 0x8000;
        }
        Capability {
            code: CAP_GRACEFUL_RESTART,
            value: word.to_be_bytes().to_vec(),
        }
    }

    /// 4-octet AS number support, carrying the full ASN (RFC 6793).
    pub fn four_octet_as(asn: u32) -> Self {
        Capability {
            code: CAP_FOUR_OCTET_AS,
            value: asn.to_be_bytes().to_vec(),
        }
    }

    /// ADD-PATH: AFI:u16, SAFI:u8, send/receive:u8 (RFC 7911).
    pub fn add_path(afi: u16, safi: u8, send_receive: u8) -> Self {
        let mut value = Vec::with_capacity(4);
        value.extend_from_slice(&afi.to_be_bytes());
        value.push(safi);
        value.push(send_receive);
        Capability {
            code: CAP_ADD_PATH,
            value,
        }
    }

    /// FQDN: hostname_len:u8, hostname, domain_len:u8, domain.
    pub fn fqdn(hostname: &str, domain: &str) -> Self {
        let mut value = Vec::with_capacity(2 + hostname.len() + domain.len());
        value.push(hostname.len() as u8);
        value.extend_from_slice(hostname.as_bytes());
        value.push(domain.len() as u8);
        value.extend_from_slice(domain.as_bytes());
        Capability {
            code: CAP_FQDN,
            value,
        }
    }

    pub fn cisco_route_refresh() -> Self {
        Capability {
            code: CAP_CISCO_ROUTE_REFRESH,
            value: Vec::new(),
        }
    }

    /// Parse a code byte, a length byte, and that many value octets. Fails
    /// when the declared length exceeds the input; the caller decides what
    /// lenient means.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut reader = ByteReader::new(bytes);
        let code = reader.read_u8()?;
        let value = reader.take_u8_prefixed()?;
        if !reader.is_empty() {
            // Trailing garbage after the declared capability length
            return None;
        }
        Some(Capability {
            code,
            value: value.to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + self.value.len());
        bytes.push(self.code);
        bytes.push(self.value.len() as u8);
        bytes.extend_from_slice(&self.value);
        bytes
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum ParamValue {
    Capability(Capability),
    /// Unknown parameter types and capabilities that failed to parse keep
    /// their raw octets.
    Raw(Vec<u8>),
}

impl ParamValue {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            ParamValue::Capability(cap) => cap.to_bytes(),
            ParamValue::Raw(data) => data.clone(),
        }
    }
}

/// One OPEN optional parameter: a type byte, a length byte, and the value.
#[derive(Debug, PartialEq, Clone)]
pub struct OptionalParam {
    pub param_type: u8,
    pub value: ParamValue,
}

impl OptionalParam {
    /// Wrap a capability as a type-2 parameter.
    pub fn capability(cap: Capability) -> Self {
        OptionalParam {
            param_type: PARAM_TYPE_CAPABILITIES,
            value: ParamValue::Capability(cap),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let inner = self.value.to_bytes();
        let mut bytes = Vec::with_capacity(2 + inner.len());
        bytes.push(self.param_type);
        bytes.push(inner.len() as u8);
        bytes.extend_from_slice(&inner);
        bytes
    }
}

/// Parse the OPEN parameter list sequentially. Returns None on truncation;
/// a type-2 value that is not a well-formed capability is retained raw.
pub fn read_optional_params(bytes: &[u8]) -> Option<Vec<OptionalParam>> {
    let mut reader = ByteReader::new(bytes);
    let mut params = Vec::new();

    while !reader.is_empty() {
        let param_type = reader.read_u8()?;
        let value = reader.take_u8_prefixed()?;

        let value = if param_type == PARAM_TYPE_CAPABILITIES {
            match Capability::from_bytes(value) {
                Some(cap) => ParamValue::Capability(cap),
                None => ParamValue::Raw(value.to_vec()),
            }
        } else {
            ParamValue::Raw(value.to_vec())
        };

        params.push(OptionalParam { param_type, value });
    }

    Some(params)
}
