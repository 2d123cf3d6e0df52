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

use super::{Peer, SessionState};
use crate::debug;
use std::time::Duration;
use tokio::io::AsyncReadExt;

impl Peer {
    /// Wait for the peer's OPEN. Returns once the session leaves OpenSent,
    /// either into Established or back to the pre-connect retry in `run`.
    pub(super) async fn handle_opensent(&mut self) {
        let mut check_interval = tokio::time::interval(Duration::from_millis(500));
        let mut buf = vec![0u8; 4096];

        loop {
            if self.state != SessionState::OpenSent {
                return;
            }
            let send_pending = self.has_pending_out();
            let conn = match self.conn.as_mut() {
                Some(c) => c,
                None => return,
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

                _ = conn.tx.writable(), if send_pending => {
                    self.flush_out();
                }

                Some(_) = self.events_rx.recv() => {
                    // Events from a previous incarnation of this session;
                    // nothing is scheduled before the handshake completes
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
}
