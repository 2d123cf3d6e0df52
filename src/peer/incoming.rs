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

//! Inbound byte handling: reassembly across reads, message dispatch, and
//! hold-timer expiry.

use super::{Peer, SessionEvent, SessionState};
use crate::bgp::msg::{decode_stream, BgpMessage, Message, MessageType};
use crate::bgp::msg_keepalive::KeepAliveMessage;
use crate::bgp::msg_notification::{BgpError, NotificationMessage};
use crate::{debug, info, warn};
use std::mem;
use std::time::Instant;

impl Peer {
    /// Concatenate freshly read bytes onto the carried tail, decode every
    /// complete message, and keep the remainder for the next read. A
    /// framing error sends its NOTIFICATION back and drops the buffered
    /// bytes to resynchronize; the session itself continues.
    pub(super) fn handle_inbound(&mut self, bytes: &[u8]) {
        let mut data = mem::take(&mut self.tail);
        data.extend_from_slice(bytes);

        match decode_stream(&data) {
            Ok((messages, tail)) => {
                self.tail = tail;
                for message in messages {
                    self.apply_message(message);
                }
            }
            Err(e) => {
                warn!("framing error",
                    "peer_ip" => self.cfg.neighbor.to_string(),
                    "error" => e.to_string());
                if let Some(notif) = NotificationMessage::from_parser_error(&e) {
                    self.queue_out(MessageType::NOTIFICATION, notif.serialize());
                    self.flush_out();
                }
            }
        }
    }

    fn apply_message(&mut self, message: BgpMessage) {
        self.last_received = Instant::now();

        match (self.state, message) {
            (SessionState::OpenSent, BgpMessage::Open(open)) => {
                self.stats.open_received += 1;
                self.establish(open.asn, open.hold_time);
            }
            (SessionState::OpenSent, message) => {
                // Anything else before the peer's OPEN is ignored
                self.count_received(&message);
                debug!("ignoring message in OpenSent",
                    "peer_ip" => self.cfg.neighbor.to_string());
            }
            (SessionState::Established, BgpMessage::Notification(body)) => {
                self.stats.notification_received += 1;
                let notif = NotificationMessage::from_bytes(&body);
                warn!("NOTIFICATION received",
                    "peer_ip" => self.cfg.neighbor.to_string(),
                    "code" => notif.error().error_code(),
                    "subcode" => notif.error().error_subcode());
            }
            (SessionState::Established, message) => {
                // No inbound route processing; received messages only feed
                // the liveness clock and the counters
                self.count_received(&message);
            }
        }
    }

    fn count_received(&mut self, message: &BgpMessage) {
        match message {
            BgpMessage::Open(_) => self.stats.open_received += 1,
            BgpMessage::Update(_) => self.stats.update_received += 1,
            BgpMessage::Notification(_) => self.stats.notification_received += 1,
            BgpMessage::KeepAlive(_) => self.stats.keepalive_received += 1,
        }
    }

    /// OpenSent -> Established. The KEEPALIVE is queued before SendRoute is
    /// posted, so it is always the first post-OPEN message on the wire.
    fn establish(&mut self, peer_asn: u16, peer_hold_time: u16) {
        self.hold_time = peer_hold_time;

        info!("session established",
            "peer_ip" => self.cfg.neighbor.to_string(),
            "peer_as" => peer_asn,
            "hold_time" => peer_hold_time,
            "prefix_amount" => self.cfg.prefix_amount);

        self.queue_out(MessageType::KEEPALIVE, KeepAliveMessage {}.serialize());
        self.flush_out();
        self.schedule_keepalive();
        self.state = SessionState::Established;

        if self.cfg.prefix_amount > 0 {
            self.announce_started = Some(Instant::now());
            self.post(SessionEvent::SendRoute);
        }
    }

    /// No message from the peer within the hold time: send
    /// NOTIFICATION(HoldTimerExpired) and start over.
    pub(super) fn handle_hold_expiry(&mut self) {
        warn!("hold timer expired",
            "peer_ip" => self.cfg.neighbor.to_string(),
            "hold_time" => self.hold_time);
        let notif = NotificationMessage::new(BgpError::HoldTimerExpired, Vec::new());
        self.queue_out(MessageType::NOTIFICATION, notif.serialize());
        self.flush_out();
        self.reset();
    }
}
