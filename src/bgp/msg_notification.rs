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
use super::utils::ParserError;

#[repr(u8)]
#[derive(Debug, PartialEq, Clone)]
pub enum MessageHeaderError {
    ConnectionNotSynchronized = 1,
    BadMessageLength = 2,
    BadMessageType = 3,
    Unknown(u8),
}

impl From<u8> for MessageHeaderError {
    fn from(value: u8) -> Self {
        match value {
            1 => MessageHeaderError::ConnectionNotSynchronized,
            2 => MessageHeaderError::BadMessageLength,
            3 => MessageHeaderError::BadMessageType,
            val => MessageHeaderError::Unknown(val),
        }
    }
}

#[repr(u8)]
#[derive(Debug, PartialEq, Clone)]
pub enum OpenMessageError {
    UnsupportedVersionNumber = 1,
    BadBgpIdentifier = 3,
    UnsupportedOptionalParameter = 4,
    UnacceptedHoldTime = 6,
    Unknown(u8),
}

impl From<u8> for OpenMessageError {
    fn from(value: u8) -> Self {
        match value {
            1 => OpenMessageError::UnsupportedVersionNumber,
            3 => OpenMessageError::BadBgpIdentifier,
            4 => OpenMessageError::UnsupportedOptionalParameter,
            6 => OpenMessageError::UnacceptedHoldTime,
            val => OpenMessageError::Unknown(val),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum BgpError {
    MessageHeaderError(MessageHeaderError),
    OpenMessageError(OpenMessageError),
    HoldTimerExpired,
    Unknown,
}

#[repr(u8)]
enum ErrorCode {
    MessageHeaderError = 1,
    OpenMessageError = 2,
    HoldTimerExpired = 4,
    Unknown,
}

impl From<u8> for ErrorCode {
    fn from(value: u8) -> Self {
        match value {
            1 => ErrorCode::MessageHeaderError,
            2 => ErrorCode::OpenMessageError,
            4 => ErrorCode::HoldTimerExpired,
            _ => ErrorCode::Unknown,
        }
    }
}

impl BgpError {
    fn new(err_code: u8, err_sub_code: u8) -> BgpError {
        match ErrorCode::from(err_code) {
            ErrorCode::MessageHeaderError => {
                BgpError::MessageHeaderError(MessageHeaderError::from(err_sub_code))
            }
            ErrorCode::OpenMessageError => {
                BgpError::OpenMessageError(OpenMessageError::from(err_sub_code))
            }
            ErrorCode::HoldTimerExpired => BgpError::HoldTimerExpired,
            ErrorCode::Unknown => BgpError::Unknown,
        }
    }

    pub fn error_code(&self) -> u8 {
        match self {
            BgpError::MessageHeaderError(_) => 1,
            BgpError::OpenMessageError(_) => 2,
            BgpError::HoldTimerExpired => 4,
            BgpError::Unknown => 0,
        }
    }

    pub fn error_subcode(&self) -> u8 {
        match self {
            BgpError::MessageHeaderError(err) => match err {
                MessageHeaderError::ConnectionNotSynchronized => 1,
                MessageHeaderError::BadMessageLength => 2,
                MessageHeaderError::BadMessageType => 3,
                MessageHeaderError::Unknown(val) => *val,
            },
            BgpError::OpenMessageError(err) => match err {
                OpenMessageError::UnsupportedVersionNumber => 1,
                OpenMessageError::BadBgpIdentifier => 3,
                OpenMessageError::UnsupportedOptionalParameter => 4,
                OpenMessageError::UnacceptedHoldTime => 6,
                OpenMessageError::Unknown(val) => *val,
            },
            _ => 0,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct NotificationMessage {
    error: BgpError,
    data: Vec<u8>,
}

impl NotificationMessage {
    pub fn new(error: BgpError, data: Vec<u8>) -> Self {
        NotificationMessage { error, data }
    }

    pub fn from_parser_error(error: &ParserError) -> Option<Self> {
        match error {
            ParserError::BgpError { error, data } => {
                Some(NotificationMessage::new(error.clone(), data.clone()))
            }
            _ => None,
        }
    }

    /// Decode a received NOTIFICATION body. Bodies shorter than the two
    /// mandatory code octets decode as Unknown rather than failing; received
    /// NOTIFICATIONs are only summarized in logs.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.len() < 2 {
            return NotificationMessage {
                error: BgpError::Unknown,
                data: Vec::new(),
            };
        }

        NotificationMessage {
            error: BgpError::new(bytes[0], bytes[1]),
            data: bytes[2..].to_vec(),
        }
    }

    pub fn error(&self) -> &BgpError {
        &self.error
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Message for NotificationMessage {
    fn kind(&self) -> MessageType {
        MessageType::NOTIFICATION
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.push(self.error.error_code());
        bytes.push(self.error.error_subcode());
        bytes.extend_from_slice(&self.data);
        bytes
    }
}
