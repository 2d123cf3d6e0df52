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
use super::msg_notification::{BgpError, OpenMessageError};
use super::msg_open_types::{read_optional_params, OptionalParam};
use super::utils::{is_valid_unicast_ipv4, ByteReader, ParserError};

pub const BGP_VERSION: u8 = 4;

/// Placeholder ASN carried in the 16-bit OPEN field when the local AS does
/// not fit; the real ASN rides in the 4-octet AS capability (RFC 6793).
pub const AS_TRANS: u16 = 23456;

#[derive(Debug, PartialEq)]
pub struct OpenMessage {
    pub version: u8,
    pub asn: u16,
    pub hold_time: u16,
    pub bgp_identifier: u32,
    pub optional_params: Vec<OptionalParam>,
}

fn malformed_open() -> ParserError {
    ParserError::BgpError {
        error: BgpError::OpenMessageError(OpenMessageError::UnsupportedOptionalParameter),
        data: Vec::new(),
    }
}

/// Validate BGP version (RFC 4271 Section 6.2). Data field carries the
/// largest locally-supported version as a 2-octet integer.
fn validate_version(version: u8) -> Result<(), ParserError> {
    if version != BGP_VERSION {
        return Err(ParserError::BgpError {
            error: BgpError::OpenMessageError(OpenMessageError::UnsupportedVersionNumber),
            data: (BGP_VERSION as u16).to_be_bytes().to_vec(),
        });
    }
    Ok(())
}

/// RFC 4271 Section 6.2: hold times of one or two seconds MUST be rejected.
fn validate_hold_time(hold_time: u16) -> Result<(), ParserError> {
    if hold_time == 1 || hold_time == 2 {
        return Err(ParserError::BgpError {
            error: BgpError::OpenMessageError(OpenMessageError::UnacceptedHoldTime),
            data: Vec::new(),
        });
    }
    Ok(())
}

/// RFC 4271 Section 6.2: the BGP identifier must be a valid unicast host
/// address, so 0.0.0.0, 255.255.255.255, and multicast are rejected.
fn validate_bgp_identifier(bgp_identifier: u32) -> Result<(), ParserError> {
    if !is_valid_unicast_ipv4(bgp_identifier) {
        return Err(ParserError::BgpError {
            error: BgpError::OpenMessageError(OpenMessageError::BadBgpIdentifier),
            data: Vec::new(),
        });
    }
    Ok(())
}

impl OpenMessage {
    /// Build the local OPEN. A `local_as` above 65535 is advertised as
    /// AS_TRANS in the 16-bit field.
    pub fn new(
        local_as: u32,
        hold_time: u16,
        bgp_identifier: u32,
        optional_params: Vec<OptionalParam>,
    ) -> Self {
        let asn = u16::try_from(local_as).unwrap_or(AS_TRANS);
        OpenMessage {
            version: BGP_VERSION,
            asn,
            hold_time,
            bgp_identifier,
            optional_params,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParserError> {
        let mut reader = ByteReader::new(bytes);

        let version = reader.read_u8().ok_or_else(malformed_open)?;
        let asn = reader.read_u16().ok_or_else(malformed_open)?;
        let hold_time = reader.read_u16().ok_or_else(malformed_open)?;
        let bgp_identifier = reader.read_u32().ok_or_else(malformed_open)?;
        let optional_params_len = reader.read_u8().ok_or_else(malformed_open)? as usize;

        // The declared parameter length must cover exactly the rest of the
        // body (RFC 4271 Section 4.2)
        if optional_params_len != reader.remaining() {
            return Err(malformed_open());
        }

        validate_version(version)?;
        validate_hold_time(hold_time)?;
        validate_bgp_identifier(bgp_identifier)?;

        let param_bytes = reader.take(optional_params_len).ok_or_else(malformed_open)?;
        let optional_params = read_optional_params(param_bytes).ok_or_else(malformed_open)?;

        Ok(OpenMessage {
            version,
            asn,
            hold_time,
            bgp_identifier,
            optional_params,
        })
    }
}

impl Message for OpenMessage {
    fn kind(&self) -> MessageType {
        MessageType::OPEN
    }

    fn to_bytes(&self) -> Vec<u8> {
        let params: Vec<u8> = self
            .optional_params
            .iter()
            .flat_map(|param| param.to_bytes())
            .collect();

        let mut bytes = Vec::with_capacity(10 + params.len());
        bytes.push(self.version);
        bytes.extend_from_slice(&self.asn.to_be_bytes());
        bytes.extend_from_slice(&self.hold_time.to_be_bytes());
        bytes.extend_from_slice(&self.bgp_identifier.to_be_bytes());
        bytes.push(params.len() as u8);
        bytes.extend_from_slice(&params);
        bytes
    }
}
