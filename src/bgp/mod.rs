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

//! BGP-4 wire codec (RFC 4271): header framing, the four message kinds,
//! OPEN capabilities, and UPDATE path attributes.

pub mod msg;
pub mod msg_keepalive;
pub mod msg_notification;
pub mod msg_open;
pub mod msg_open_types;
pub mod msg_update;
pub mod msg_update_types;
pub mod utils;
