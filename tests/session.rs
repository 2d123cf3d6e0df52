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

//! End-to-end session tests against a mock receiver.

mod common;

use bgpblast::bgp::msg::BgpMessage;
use bgpblast::bgp::msg_notification::NotificationMessage;
use bgpblast::bgp::msg_open_types::{Capability, OptionalParam, ParamValue, AFI_IPV4, SAFI_UNICAST};
use bgpblast::config::Config;
use bgpblast::peer::Peer;
use bgpblast::supervisor::Supervisor;
use common::{neighbor_config, start_collector, Behavior, Collector, CollectorEvent};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

async fn expect_open(collector: &mut Collector) -> bgpblast::bgp::msg_open::OpenMessage {
    match collector.next_message().await {
        BgpMessage::Open(open) => open,
        other => panic!("expected OPEN, got {:?}", other),
    }
}

#[tokio::test]
async fn test_handshake_then_keepalive_then_updates() {
    let mut collector = start_collector(65002, 90, Behavior::Respond).await;
    let cfg = neighbor_config(collector.port, 5);
    let peer = tokio::spawn(Peer::new(cfg).run());

    collector.next_connection().await;

    // The speaker's OPEN advertises IPv4 unicast multiprotocol and 4-octet AS
    let open = expect_open(&mut collector).await;
    assert_eq!(open.asn, 65001);
    assert_eq!(open.hold_time, 30);
    assert_eq!(open.bgp_identifier, u32::from(Ipv4Addr::new(192, 0, 2, 1)));
    assert_eq!(
        open.optional_params,
        vec![
            OptionalParam::capability(Capability::multiprotocol(AFI_IPV4, SAFI_UNICAST)),
            OptionalParam::capability(Capability::four_octet_as(65001)),
        ]
    );

    // First post-OPEN message on the wire is a KEEPALIVE, then the UPDATEs
    match collector.next_message().await {
        BgpMessage::KeepAlive(_) => {}
        other => panic!("expected KEEPALIVE before any UPDATE, got {:?}", other),
    }

    for i in 0..5u32 {
        match collector.next_message().await {
            BgpMessage::Update(body) => {
                let addr = Ipv4Addr::from(u32::from(Ipv4Addr::new(10, 128, 0, 1)) + i);
                let mut nlri = vec![0x20];
                nlri.extend_from_slice(&addr.octets());
                assert!(
                    body.ends_with(&nlri),
                    "update {} should announce {}/32",
                    i,
                    addr
                );
            }
            other => panic!("expected UPDATE, got {:?}", other),
        }
    }

    peer.abort();
}

#[tokio::test]
async fn test_keepalive_cadence() {
    // Peer hold time 6 -> keepalives every 2 seconds
    let mut collector = start_collector(65002, 6, Behavior::Respond).await;
    let cfg = neighbor_config(collector.port, 0);
    let peer = tokio::spawn(Peer::new(cfg).run());

    collector.next_connection().await;
    expect_open(&mut collector).await;

    // Observe for just under the hold time: the immediate handshake
    // KEEPALIVE plus at least one timer-driven one, and no flood
    let mut keepalives = 0;
    let window = sleep(Duration::from_millis(5500));
    tokio::pin!(window);
    loop {
        tokio::select! {
            event = collector.events.recv() => {
                match event.expect("collector ended") {
                    CollectorEvent::Message(BgpMessage::KeepAlive(_)) => keepalives += 1,
                    CollectorEvent::Message(other) => panic!("unexpected message: {:?}", other),
                    _ => {}
                }
            }
            _ = &mut window => break,
        }
    }

    assert!(
        (2..=4).contains(&keepalives),
        "expected 2..=4 keepalives in the window, saw {}",
        keepalives
    );

    peer.abort();
}

#[tokio::test]
async fn test_reconnects_when_open_unanswered() {
    let mut collector = start_collector(65002, 90, Behavior::Silent).await;
    let cfg = neighbor_config(collector.port, 3);
    let peer = tokio::spawn(Peer::new(cfg).run());

    // The collector drops each connection after the OPEN; the speaker keeps
    // retrying with a fresh handshake
    for _ in 0..2 {
        collector.next_connection().await;
        let open = expect_open(&mut collector).await;
        assert_eq!(open.asn, 65001);
    }

    peer.abort();
}

#[tokio::test]
async fn test_reconnect_restarts_announcements() {
    // Drop the session mid-run, after two UPDATEs
    let mut collector = start_collector(65002, 90, Behavior::RespondCloseAfterUpdates(2)).await;
    let cfg = neighbor_config(collector.port, 4);
    let peer = tokio::spawn(Peer::new(cfg).run());

    collector.next_connection().await;
    expect_open(&mut collector).await;

    // First connection: KEEPALIVE then two UPDATEs before the cut
    let mut first_updates = Vec::new();
    loop {
        match collector.recv().await {
            CollectorEvent::Message(BgpMessage::Update(body)) => {
                first_updates.push(body);
                if first_updates.len() == 2 {
                    break;
                }
            }
            CollectorEvent::Message(_) => {}
            CollectorEvent::Closed => panic!("closed before two updates"),
            CollectorEvent::Connected => panic!("unexpected reconnect"),
        }
    }

    // The speaker reconnects with a fresh session: OPEN again, and the
    // announcement run restarts from prefix_start
    collector.next_connection().await;
    expect_open(&mut collector).await;

    let first_prefix: Vec<u8> = {
        let mut nlri = vec![0x20];
        nlri.extend_from_slice(&Ipv4Addr::new(10, 128, 0, 1).octets());
        nlri
    };
    loop {
        match collector.next_message().await {
            BgpMessage::Update(body) => {
                assert!(
                    body.ends_with(&first_prefix),
                    "fresh run should restart at prefix_start"
                );
                break;
            }
            _ => {}
        }
    }

    peer.abort();
}

#[tokio::test]
async fn test_hold_timer_enforcement() {
    // The collector answers the handshake and then goes quiet; with a
    // 3-second negotiated hold time the speaker must declare the session
    // dead, notify, and reconnect
    let mut collector = start_collector(65002, 3, Behavior::Respond).await;
    let cfg = neighbor_config(collector.port, 0);
    let peer = tokio::spawn(Peer::new(cfg).run());

    collector.next_connection().await;
    expect_open(&mut collector).await;

    let deadline = Duration::from_secs(10);
    let notified = timeout(deadline, async {
        loop {
            if let CollectorEvent::Message(BgpMessage::Notification(body)) = collector.recv().await
            {
                return NotificationMessage::from_bytes(&body);
            }
        }
    })
    .await
    .expect("expected a NOTIFICATION before the deadline");

    assert_eq!(notified.error().error_code(), 4, "HoldTimerExpired");

    // And the session starts over
    collector.next_connection().await;
    expect_open(&mut collector).await;

    peer.abort();
}

#[tokio::test]
async fn test_supervisor_runs_one_session_per_neighbor() {
    let mut first = start_collector(65002, 90, Behavior::Respond).await;
    let mut second = start_collector(65003, 90, Behavior::Respond).await;

    let config = Config {
        log_level: "info".to_string(),
        neighbors: vec![
            neighbor_config(first.port, 1),
            neighbor_config(second.port, 1),
        ],
    };
    let supervisor = tokio::spawn(Supervisor::new(config).run());

    first.next_connection().await;
    assert_eq!(expect_open(&mut first).await.asn, 65001);

    second.next_connection().await;
    assert_eq!(expect_open(&mut second).await.asn, 65001);

    supervisor.abort();
}

#[tokio::test]
async fn test_supervisor_restarts_only_crashed_child() {
    // Sibling negotiates a 6-second hold time so its 2-second keepalives
    // prove the session stays alive across the other child's crash
    let mut stable = start_collector(65002, 6, Behavior::Respond).await;
    let mut crashing = start_collector(65003, 90, Behavior::Respond).await;

    let config = Config {
        log_level: "info".to_string(),
        neighbors: vec![
            neighbor_config(stable.port, 0),
            neighbor_config(crashing.port, 0),
        ],
    };

    // The crashing child runs a real session briefly and then panics, once;
    // its restart and the sibling run as plain sessions
    let crash_port = crashing.port;
    let crashed = Arc::new(AtomicBool::new(false));
    let flag = crashed.clone();
    let supervisor = tokio::spawn(Supervisor::new(config).run_with(move |cfg| {
        let crash_now = cfg.neighbor_port == crash_port && !flag.swap(true, Ordering::SeqCst);
        let peer = Peer::new(cfg);
        async move {
            if crash_now {
                let _ = timeout(Duration::from_millis(300), peer.run()).await;
                panic!("injected session crash");
            }
            peer.run().await
        }
    }));

    stable.next_connection().await;
    expect_open(&mut stable).await;

    crashing.next_connection().await;
    expect_open(&mut crashing).await;

    // The crashed child reappears with a fresh handshake
    crashing.next_connection().await;
    let reopened = expect_open(&mut crashing).await;
    assert_eq!(reopened.asn, 65001);
    assert!(crashed.load(Ordering::SeqCst));

    // The sibling never reconnects and its keepalives keep flowing
    let mut keepalives = 0;
    let window = sleep(Duration::from_millis(2500));
    tokio::pin!(window);
    loop {
        tokio::select! {
            event = stable.events.recv() => {
                match event.expect("collector ended") {
                    CollectorEvent::Message(BgpMessage::KeepAlive(_)) => keepalives += 1,
                    CollectorEvent::Message(_) => {}
                    CollectorEvent::Connected | CollectorEvent::Closed => {
                        panic!("sibling session was disturbed by the crash")
                    }
                }
            }
            _ = &mut window => break,
        }
    }
    assert!(
        keepalives >= 1,
        "sibling should keep sending keepalives, saw {}",
        keepalives
    );

    supervisor.abort();
}

#[tokio::test]
async fn test_open_params_decode_as_capabilities() {
    // Both advertised parameters re-frame as typed capabilities on the far end
    let mut collector = start_collector(65002, 90, Behavior::Respond).await;
    let cfg = neighbor_config(collector.port, 0);
    let peer = tokio::spawn(Peer::new(cfg).run());

    collector.next_connection().await;
    let open = expect_open(&mut collector).await;
    for param in &open.optional_params {
        assert!(matches!(param.value, ParamValue::Capability(_)));
    }

    peer.abort();
}
