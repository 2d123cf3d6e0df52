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

use super::{Peer, SessionEvent, SessionState};
use crate::bgp::msg::{Message, MessageType};
use crate::bgp::msg_keepalive::KeepAliveMessage;
use crate::bgp::msg_update::UpdateMessage;
use crate::bgp::msg_update_types::Origin;
use crate::bgp::utils::Ipv4Net;
use crate::{debug, info};
use std::time::Duration;
use tokio::io::AsyncReadExt;

impl Peer {
    /// Established loop: stream UPDATEs, answer the keepalive clock, keep
    /// reading. Returns when the session drops back to pre-connect.
    pub(super) async fn handle_established(&mut self) {
        let mut check_interval = tokio::time::interval(Duration::from_millis(500));
        let mut buf = vec![0u8; 4096];

        loop {
            if self.state != SessionState::Established {
                return;
            }
            let send_pending = self.has_pending_out();
            let conn = match self.conn.as_mut() {
                Some(c) => c,
                None => {
                    self.reset();
                    return;
                }
            };

            tokio::select! {
                result = conn.rx.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            debug!("connection closed by peer",
                                "peer_ip" => self.cfg.neighbor.to_string());
                            self.reset();
                            return;
                        }
                        Ok(n) => self.handle_inbound(&buf[..n]),
                        Err(e) => {
                            debug!("read error",
                                "peer_ip" => self.cfg.neighbor.to_string(),
                                "error" => e.to_string());
                            self.reset();
                            return;
                        }
                    }
                }

                // Backpressured send: the socket signalling writable is the
                // resume edge for the pacing loop
                _ = conn.tx.writable(), if send_pending => {
                    self.handle_send_route();
                }

                Some(event) = self.events_rx.recv() => {
                    match event {
                        SessionEvent::SendRoute => self.handle_send_route(),
                        SessionEvent::KeepaliveTick => self.handle_keepalive_tick(),
                    }
                }

                _ = check_interval.tick() => {
                    if self.hold_timer_expired() {
                        self.handle_hold_expiry();
                        return;
                    }
                }
            }
        }
    }

    /// UPDATE pacing: encode and send announcements inline while the socket
    /// accepts them. Backpressure (a short or refused write) leaves the
    /// remainder queued and yields back to the event loop.
    pub(super) fn handle_send_route(&mut self) {
        loop {
            self.flush_out();
            if self.conn.is_none() {
                // flush hit a hard error and reset the session
                return;
            }
            if self.has_pending_out() {
                return;
            }
            if self.prefix_cursor >= self.cfg.prefix_amount {
                self.log_announce_complete();
                return;
            }

            let update = UpdateMessage::announcement(
                Origin::IGP,
                &[self.cfg.local_as],
                self.cfg.local_address,
                vec![Ipv4Net::host(self.next_prefix())],
            );
            self.queue_out(MessageType::UPDATE, update.serialize());
            self.prefix_cursor += 1;
        }
    }

    fn log_announce_complete(&mut self) {
        if let Some(started) = self.announce_started.take() {
            info!("announcement run complete",
                "peer_ip" => self.cfg.neighbor.to_string(),
                "routes" => self.prefix_cursor,
                "elapsed_ms" => started.elapsed().as_millis() as u64);
        }
    }

    pub(super) fn handle_keepalive_tick(&mut self) {
        self.queue_out(MessageType::KEEPALIVE, KeepAliveMessage {}.serialize());
        self.flush_out();
        if self.conn.is_some() {
            self.schedule_keepalive();
        }
    }
}
