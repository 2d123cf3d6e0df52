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

use super::msg_keepalive::KeepAliveMessage;
use super::msg_notification::{BgpError, MessageHeaderError};
use super::msg_open::OpenMessage;
use super::utils::ParserError;

pub const BGP_HEADER_SIZE_BYTES: usize = 19;
pub const MAX_MESSAGE_SIZE: u16 = 4096;

// BGP header marker (16 bytes of 0xFF)
pub const BGP_MARKER: [u8; 16] = [0xff; 16];

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MessageType {
    OPEN = 1,
    UPDATE = 2,
    NOTIFICATION = 3,
    KEEPALIVE = 4,
}

impl MessageType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ParserError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::OPEN),
            2 => Ok(MessageType::UPDATE),
            3 => Ok(MessageType::NOTIFICATION),
            4 => Ok(MessageType::KEEPALIVE),
            _ => Err(ParserError::BgpError {
                error: BgpError::MessageHeaderError(MessageHeaderError::BadMessageType),
                data: vec![value],
            }),
        }
    }
}

/// Trait for BGP message types that can serialize themselves
pub trait Message {
    /// Returns the message type identifier
    fn kind(&self) -> MessageType;

    /// Serializes the message body (without BGP header)
    fn to_bytes(&self) -> Vec<u8>;

    /// Serializes the complete BGP message with header
    fn serialize(&self) -> Vec<u8> {
        let body = self.to_bytes();
        let mut message = Vec::with_capacity(BGP_HEADER_SIZE_BYTES + body.len());

        message.extend_from_slice(&BGP_MARKER);

        // Message length (header + body)
        let length = BGP_HEADER_SIZE_BYTES as u16 + body.len() as u16;
        message.extend_from_slice(&length.to_be_bytes());

        message.push(self.kind().as_u8());
        message.extend_from_slice(&body);

        message
    }
}

/// Inbound message. Only OPEN carries a decoded payload; UPDATE and
/// NOTIFICATION keep their raw bodies since this speaker does not process
/// received routes.
#[derive(Debug, PartialEq)]
pub enum BgpMessage {
    Open(OpenMessage),
    Update(Vec<u8>),
    Notification(Vec<u8>),
    KeepAlive(KeepAliveMessage),
}

fn bad_length(length: u16) -> ParserError {
    ParserError::BgpError {
        error: BgpError::MessageHeaderError(MessageHeaderError::BadMessageLength),
        data: length.to_be_bytes().to_vec(),
    }
}

/// Decode as many complete messages as the buffer holds, in wire order.
///
/// Returns the decoded messages plus the residual tail: either an
/// incomplete header or a complete header whose body has not fully arrived.
/// The caller carries the tail into the next read, so a message split
/// across any number of socket reads reassembles exactly.
///
/// Framing errors abort the batch; the returned error carries the
/// NOTIFICATION code/subcode/data to send back (RFC 4271 Section 6.1).
pub fn decode_stream(bytes: &[u8]) -> Result<(Vec<BgpMessage>, Vec<u8>), ParserError> {
    let mut messages = Vec::new();
    let mut rest = bytes;

    loop {
        if rest.len() < BGP_HEADER_SIZE_BYTES {
            return Ok((messages, rest.to_vec()));
        }

        if rest[..16] != BGP_MARKER {
            return Err(ParserError::BgpError {
                error: BgpError::MessageHeaderError(MessageHeaderError::ConnectionNotSynchronized),
                data: Vec::new(),
            });
        }

        let length = u16::from_be_bytes([rest[16], rest[17]]);
        let message_type = rest[18];

        if length < BGP_HEADER_SIZE_BYTES as u16 || length > MAX_MESSAGE_SIZE {
            return Err(bad_length(length));
        }

        if rest.len() < length as usize {
            // Partial message: hand the whole remainder back, header included
            return Ok((messages, rest.to_vec()));
        }

        let body = &rest[BGP_HEADER_SIZE_BYTES..length as usize];

        let message = match MessageType::try_from(message_type)? {
            MessageType::OPEN => BgpMessage::Open(OpenMessage::from_bytes(body)?),
            MessageType::UPDATE => BgpMessage::Update(body.to_vec()),
            MessageType::NOTIFICATION => BgpMessage::Notification(body.to_vec()),
            MessageType::KEEPALIVE => {
                // KEEPALIVE is header-only (RFC 4271 Section 4.4)
                if length != BGP_HEADER_SIZE_BYTES as u16 {
                    return Err(bad_length(length));
                }
                BgpMessage::KeepAlive(KeepAliveMessage {})
            }
        };

        messages.push(message);
        rest = &rest[length as usize..];
    }
}
