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

//! Common test utilities: a mock BGP receiver that re-frames everything the
//! speaker sends and can answer the handshake.

#![allow(dead_code)]

use bgpblast::bgp::msg::{decode_stream, BgpMessage, Message};
use bgpblast::bgp::msg_keepalive::KeepAliveMessage;
use bgpblast::bgp::msg_open::OpenMessage;
use bgpblast::config::NeighborConfig;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

#[derive(Debug)]
pub enum CollectorEvent {
    Connected,
    Message(BgpMessage),
    Closed,
}

/// How the collector treats each accepted connection.
#[derive(Clone, Copy)]
pub enum Behavior {
    /// Complete the handshake (OPEN + KEEPALIVE) and keep reading
    Respond,
    /// Read but never answer the OPEN
    Silent,
    /// Complete the handshake, then close after this many UPDATEs
    RespondCloseAfterUpdates(usize),
}

pub struct Collector {
    pub port: u16,
    pub events: mpsc::UnboundedReceiver<CollectorEvent>,
}

impl Collector {
    pub async fn recv(&mut self) -> CollectorEvent {
        timeout(Duration::from_secs(10), self.events.recv())
            .await
            .expect("timed out waiting for collector event")
            .expect("collector task ended")
    }

    /// Next decoded message, skipping connection lifecycle events.
    pub async fn next_message(&mut self) -> BgpMessage {
        loop {
            if let CollectorEvent::Message(message) = self.recv().await {
                return message;
            }
        }
    }

    /// Wait for the next accepted connection.
    pub async fn next_connection(&mut self) {
        loop {
            if let CollectorEvent::Connected = self.recv().await {
                return;
            }
        }
    }
}

/// Spawn a mock BGP receiver on an ephemeral loopback port. Connections are
/// served one at a time so reconnects land back on the same collector.
pub async fn start_collector(local_as: u32, hold_time: u16, behavior: Behavior) -> Collector {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, events) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            if tx.send(CollectorEvent::Connected).is_err() {
                return;
            }
            serve_connection(stream, &tx, local_as, hold_time, behavior).await;
            if tx.send(CollectorEvent::Closed).is_err() {
                return;
            }
        }
    });

    Collector { port, events }
}

async fn serve_connection(
    mut stream: TcpStream,
    tx: &mpsc::UnboundedSender<CollectorEvent>,
    local_as: u32,
    hold_time: u16,
    behavior: Behavior,
) {
    let mut tail: Vec<u8> = Vec::new();
    let mut buf = vec![0u8; 4096];
    let mut updates_seen = 0usize;

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        tail.extend_from_slice(&buf[..n]);

        let (messages, rest) = match decode_stream(&tail) {
            Ok(decoded) => decoded,
            Err(_) => return,
        };
        tail = rest;

        for message in messages {
            let is_open = matches!(message, BgpMessage::Open(_));
            let is_update = matches!(message, BgpMessage::Update(_));
            if tx.send(CollectorEvent::Message(message)).is_err() {
                return;
            }

            if is_open {
                match behavior {
                    Behavior::Respond | Behavior::RespondCloseAfterUpdates(_) => {
                        let open = OpenMessage::new(local_as, hold_time, 0x0a000002, vec![]);
                        if stream.write_all(&open.serialize()).await.is_err() {
                            return;
                        }
                        if stream
                            .write_all(&KeepAliveMessage {}.serialize())
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Behavior::Silent => return,
                }
            }

            if is_update {
                updates_seen += 1;
                if let Behavior::RespondCloseAfterUpdates(limit) = behavior {
                    if updates_seen >= limit {
                        return;
                    }
                }
            }
        }
    }
}

/// Neighbor pointed at a collector port, with test-friendly defaults.
pub fn neighbor_config(port: u16, prefix_amount: u32) -> NeighborConfig {
    NeighborConfig {
        neighbor: Ipv4Addr::LOCALHOST,
        neighbor_port: port,
        remote_as: 65002,
        local_address: Ipv4Addr::LOCALHOST,
        local_as: 65001,
        router_id: Ipv4Addr::new(192, 0, 2, 1),
        prefix_start: Ipv4Addr::new(10, 128, 0, 1),
        prefix_amount,
        hold_time_secs: 30,
    }
}
