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

//! Per-neighbor session engine: one task owning one socket, driven by
//! socket readiness, self-posted events, and timer ticks.

use crate::bgp::msg::{Message, MessageType};
use crate::bgp::msg_open::OpenMessage;
use crate::bgp::msg_open_types::{Capability, OptionalParam, AFI_IPV4, SAFI_UNICAST};
use crate::config::NeighborConfig;
use crate::{debug, info};
use std::io;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

mod incoming;
mod state_established;
mod state_opensent;

/// Events a session posts to its own queue. A self-posted event is observed
/// after everything already enqueued at the time of posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Emit the next UPDATE (or resume a backpressured send)
    SendRoute,
    /// Keepalive timer fired
    KeepaliveTick,
}

/// Implemented FSM subset. Idle/Connect/Active/OpenConfirm collapse into
/// the pre-connect retry loop in `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    OpenSent,
    Established,
}

/// Statistics for BGP messages
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub open_sent: u64,
    pub keepalive_sent: u64,
    pub update_sent: u64,
    pub notification_sent: u64,
    pub open_received: u64,
    pub keepalive_received: u64,
    pub update_received: u64,
    pub notification_received: u64,
}

/// TCP connection state - only present when connected
struct TcpConnection {
    tx: OwnedWriteHalf,
    rx: OwnedReadHalf,
}

pub struct Peer {
    cfg: NeighborConfig,
    state: SessionState,
    /// None while (re)connecting
    conn: Option<TcpConnection>,
    /// Residual bytes from the last read that did not complete a message
    tail: Vec<u8>,
    /// Seconds; from config until the peer's OPEN overwrites it
    hold_time: u16,
    /// Delayed self-post task for the next KeepaliveTick
    keepalive_handle: Option<JoinHandle<()>>,
    /// UPDATEs sent in the current run, up to cfg.prefix_amount
    prefix_cursor: u32,
    /// Outbound byte queue; a partial write keeps its unsent remainder here
    /// so a message is never split across reconnects
    out_buf: Vec<u8>,
    out_pos: usize,
    last_received: Instant,
    announce_started: Option<Instant>,
    stats: SessionStats,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Peer {
    pub fn new(cfg: NeighborConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let hold_time = cfg.hold_time_secs;
        Peer {
            cfg,
            state: SessionState::OpenSent,
            conn: None,
            tail: Vec::new(),
            hold_time,
            keepalive_handle: None,
            prefix_cursor: 0,
            out_buf: Vec::new(),
            out_pos: 0,
            last_received: Instant::now(),
            announce_started: None,
            stats: SessionStats::default(),
            events_tx,
            events_rx,
        }
    }

    /// Main session task. Runs forever: connect, handshake, announce,
    /// keepalive; any socket failure resets to a fresh pre-connect state
    /// with only the neighbor configuration retained.
    pub async fn run(mut self) {
        let peer_ip = self.cfg.neighbor;
        debug!("starting peer session", "peer_ip" => peer_ip.to_string());

        loop {
            if self.conn.is_none() {
                self.connect_and_send_open().await;
            }
            match self.state {
                SessionState::OpenSent => self.handle_opensent().await,
                SessionState::Established => self.handle_established().await,
            }
        }
    }

    /// Connect and send the local OPEN. Connect failures retry immediately;
    /// the OS TCP timeout is the only pacing.
    async fn connect_and_send_open(&mut self) {
        loop {
            match self.try_connect().await {
                Ok(conn) => {
                    self.conn = Some(conn);
                    self.last_received = Instant::now();

                    let open = self.local_open();
                    if let Err(e) = self.send_immediate(&open).await {
                        debug!("failed to send OPEN",
                            "peer_ip" => self.cfg.neighbor.to_string(),
                            "error" => e.to_string());
                        self.reset();
                        continue;
                    }
                    info!("connected, OPEN sent",
                        "peer_ip" => self.cfg.neighbor.to_string(),
                        "local_as" => self.cfg.local_as,
                        "remote_as" => self.cfg.remote_as);
                    return;
                }
                Err(e) => {
                    debug!("connect failed, retrying",
                        "peer_ip" => self.cfg.neighbor.to_string(),
                        "error" => e.to_string());
                }
            }
        }
    }

    async fn try_connect(&self) -> io::Result<TcpConnection> {
        let socket = TcpSocket::new_v4()?;
        socket.bind(self.cfg.local_bind_addr())?;
        let stream = socket.connect(self.cfg.remote_addr()).await?;
        let (rx, tx) = stream.into_split();
        Ok(TcpConnection { tx, rx })
    }

    /// The OPEN this speaker advertises: IPv4 unicast multiprotocol plus
    /// 4-octet AS support.
    fn local_open(&self) -> OpenMessage {
        OpenMessage::new(
            self.cfg.local_as,
            self.cfg.hold_time_secs,
            u32::from(self.cfg.router_id),
            vec![
                OptionalParam::capability(Capability::multiprotocol(AFI_IPV4, SAFI_UNICAST)),
                OptionalParam::capability(Capability::four_octet_as(self.cfg.local_as)),
            ],
        )
    }

    /// Write a message directly. Only used while the outbound queue is
    /// known empty (the OPEN right after connect); everything else goes
    /// through `queue_out` to preserve message boundaries.
    async fn send_immediate<M: Message>(&mut self, message: &M) -> io::Result<()> {
        let kind = message.kind();
        let bytes = message.serialize();
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no connection"))?;
        conn.tx.write_all(&bytes).await?;
        self.count_sent(kind);
        Ok(())
    }

    /// Append a serialized message to the outbound queue.
    fn queue_out(&mut self, kind: MessageType, bytes: Vec<u8>) {
        if self.out_buf.is_empty() {
            self.out_buf = bytes;
            self.out_pos = 0;
        } else {
            self.out_buf.extend_from_slice(&bytes);
        }
        self.count_sent(kind);
    }

    /// Synchronously flush as much of the outbound queue as the socket
    /// accepts. On WouldBlock the remainder stays queued and the state
    /// loop's writable arm resumes it; on a hard error the session resets.
    fn flush_out(&mut self) {
        while self.out_pos < self.out_buf.len() {
            let conn = match self.conn.as_ref() {
                Some(c) => c,
                None => return,
            };
            match conn.tx.try_write(&self.out_buf[self.out_pos..]) {
                Ok(n) => {
                    self.out_pos += n;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    debug!("send failed",
                        "peer_ip" => self.cfg.neighbor.to_string(),
                        "error" => e.to_string());
                    self.reset();
                    return;
                }
            }
        }
        self.out_buf.clear();
        self.out_pos = 0;
    }

    fn has_pending_out(&self) -> bool {
        self.out_pos < self.out_buf.len()
    }

    fn count_sent(&mut self, kind: MessageType) {
        match kind {
            MessageType::OPEN => self.stats.open_sent += 1,
            MessageType::UPDATE => self.stats.update_sent += 1,
            MessageType::NOTIFICATION => self.stats.notification_sent += 1,
            MessageType::KEEPALIVE => self.stats.keepalive_sent += 1,
        }
    }

    /// Arm the keepalive timer at one third of the negotiated hold time by
    /// posting a delayed tick back to this session's own queue. A hold time
    /// of zero disables keepalives.
    fn schedule_keepalive(&mut self) {
        if let Some(handle) = self.keepalive_handle.take() {
            handle.abort();
        }
        let interval_secs = self.hold_time / 3;
        if interval_secs == 0 {
            return;
        }
        let tx = self.events_tx.clone();
        self.keepalive_handle = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(interval_secs as u64)).await;
            let _ = tx.send(SessionEvent::KeepaliveTick);
        }));
    }

    fn post(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }

    fn hold_timer_expired(&self) -> bool {
        self.hold_time > 0 && self.last_received.elapsed() >= Duration::from_secs(self.hold_time as u64)
    }

    /// Drop the connection and return to a fresh pre-connect state. Only
    /// the neighbor configuration survives.
    fn reset(&mut self) {
        if let Some(handle) = self.keepalive_handle.take() {
            handle.abort();
        }
        if self.conn.take().is_some() {
            info!("session down",
                "peer_ip" => self.cfg.neighbor.to_string(),
                "updates_sent" => self.stats.update_sent,
                "keepalives_sent" => self.stats.keepalive_sent);
        }
        self.tail.clear();
        self.out_buf.clear();
        self.out_pos = 0;
        self.prefix_cursor = 0;
        self.announce_started = None;
        self.hold_time = self.cfg.hold_time_secs;
        self.state = SessionState::OpenSent;
    }

    /// Prefix for the next UPDATE: prefix_start advanced by the cursor as a
    /// big-endian 32-bit integer.
    fn next_prefix(&self) -> std::net::Ipv4Addr {
        let base = u32::from(self.cfg.prefix_start);
        std::net::Ipv4Addr::from(base.wrapping_add(self.prefix_cursor))
    }

    #[cfg(test)]
    pub(crate) fn stats(&self) -> &SessionStats {
        &self.stats
    }
}
