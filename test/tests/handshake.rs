/// Tests for the connect / accept handshake between a client channel and
/// the server channel table
use tether_client::{ClientConfig, ClientEvent, ClientState};
use tether_server::{ServerConfig, ServerEvent};
use tether_shared::{ChannelId, ControlHeader, DisposeReason, MessageKind};
use tether_test::{Harness, CLIENT_ADDR};

const OTHER_CLIENT_ADDR: &str = "127.0.0.1:23456";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn control(kind: MessageKind, channel_id: ChannelId) -> [u8; 5] {
    ControlHeader::new(kind, channel_id).encode()
}

// ========== Convergence Tests ==========

#[test]
fn both_sides_establish_within_one_round_trip() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);

    let channel_id = harness.start_connect(client);
    assert_eq!(harness.client(client).channel.state(), ClientState::AwaitingConfirm);

    // RequestConnection
    let request = harness.network.take_all();
    assert_eq!(request.len(), 1);
    assert_eq!(
        ControlHeader::decode(&request[0].payload).unwrap().0,
        ControlHeader::new(MessageKind::RequestConnection, channel_id)
    );
    let now = harness.clock.now();
    harness
        .server
        .receive_datagram(now, request[0].from, &request[0].payload);
    assert!(harness.server.is_pending(channel_id));

    // WaitConfirmConnection
    let reply = harness.network.take_all();
    assert_eq!(reply.len(), 1);
    assert_eq!(
        reply[0].payload,
        control(MessageKind::WaitConfirmConnection, channel_id)
    );
    harness
        .client(client)
        .channel
        .receive_datagram(reply[0].from, &reply[0].payload);
    assert!(harness.client(client).channel.is_established());

    // ConfirmConnection
    let confirm = harness.network.take_all();
    assert_eq!(confirm.len(), 1);
    assert_eq!(
        confirm[0].payload,
        control(MessageKind::ConfirmConnection, channel_id)
    );
    harness
        .server
        .receive_datagram(now, confirm[0].from, &confirm[0].payload);

    assert!(harness.server.is_established(channel_id));
    assert!(!harness.server.is_pending(channel_id));
    assert_eq!(
        harness.server.channel_address(channel_id),
        Some(CLIENT_ADDR.parse().unwrap())
    );
}

#[test]
fn lifecycle_events_fire_once() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);

    let channel_id = harness.connect(client);
    harness.settle(5, 10);

    assert_eq!(
        harness.client(client).events,
        vec![ClientEvent::ConnectComplete { channel_id }]
    );
    assert_eq!(
        harness.server_events,
        vec![ServerEvent::Connected {
            channel_id,
            address: CLIENT_ADDR.parse().unwrap(),
        }]
    );
}

#[test]
fn connecting_twice_is_rejected() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    let channel_id = harness.connect(client);

    let now = harness.clock.now();
    let server_address = harness.server_address;
    let result = harness
        .client(client)
        .channel
        .connect(now, server_address);

    assert_eq!(
        result,
        Err(tether_shared::ChannelError::AlreadyConnected { channel_id })
    );
}

// ========== Collision Tests ==========

#[test]
fn established_id_from_another_endpoint_gets_repeat() {
    init_logging();
    let mut harness = Harness::new();
    let first = harness.add_client(CLIENT_ADDR);
    let second = harness.add_client(OTHER_CLIENT_ADDR);
    let taken = ChannelId::new(0xC000_BEEF);
    harness.connect_as(first, taken);
    assert!(harness.server.is_established(taken));

    let now = harness.clock.now();
    let server_address = harness.server_address;
    harness
        .client(second)
        .channel
        .connect_with_channel_id(now, server_address, taken)
        .unwrap();
    for datagram in harness.network.take_all() {
        harness
            .server
            .receive_datagram(now, datagram.from, &datagram.payload);
    }

    let replies = harness.network.take_all();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].to, OTHER_CLIENT_ADDR.parse().unwrap());
    assert_eq!(replies[0].payload, control(MessageKind::RepeatChannelId, taken));
    assert_eq!(
        harness.server.channel_address(taken),
        Some(CLIENT_ADDR.parse().unwrap())
    );
    assert_eq!(harness.server.channel_count(), 1);
}

#[test]
fn repeat_leads_to_a_fresh_id_and_keeps_cached_packets() {
    init_logging();
    let mut harness = Harness::new();
    let first = harness.add_client(CLIENT_ADDR);
    let second = harness.add_client(OTHER_CLIENT_ADDR);
    let taken = ChannelId::new(0xC000_BEEF);
    harness.connect_as(first, taken);

    let now = harness.clock.now();
    let server_address = harness.server_address;
    harness
        .client(second)
        .channel
        .connect_with_channel_id(now, server_address, taken)
        .unwrap();
    harness
        .client(second)
        .channel
        .send(tether_shared::Envelope::new(42, 0, 0), b"queued early")
        .unwrap();
    harness.pump();
    harness.settle(10, 10);

    let fresh = harness.client(second).channel.channel_id();
    assert_ne!(fresh, taken);
    assert!(fresh.is_live());
    assert!(harness.client(second).channel.is_established());
    assert!(harness.server.is_established(fresh));
    assert!(harness.server.is_established(taken));

    let received = harness.server_received.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].channel_id, fresh);
    assert_eq!(&received[0].body[..], b"queued early");
}

#[test]
fn pending_id_from_another_endpoint_gets_repeat() {
    init_logging();
    let mut harness = Harness::new();
    let first = harness.add_client(CLIENT_ADDR);
    let second = harness.add_client(OTHER_CLIENT_ADDR);
    let channel_id = ChannelId::new(0xC000_0A0A);
    let now = harness.clock.now();
    let server_address = harness.server_address;

    harness
        .client(first)
        .channel
        .connect_with_channel_id(now, server_address, channel_id)
        .unwrap();
    for datagram in harness.network.take_all() {
        harness
            .server
            .receive_datagram(now, datagram.from, &datagram.payload);
    }
    // hold the WaitConfirmConnection back
    let held = harness.network.take_all();

    harness.network.inject(
        OTHER_CLIENT_ADDR.parse().unwrap(),
        server_address,
        &control(MessageKind::RequestConnection, channel_id),
    );
    for datagram in harness.network.take_all() {
        harness
            .server
            .receive_datagram(now, datagram.from, &datagram.payload);
    }
    let replies = harness.network.take_all();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].payload, control(MessageKind::RepeatChannelId, channel_id));

    // the first request is untouched and still completes
    for datagram in held {
        harness
            .client(first)
            .channel
            .receive_datagram(datagram.from, &datagram.payload);
    }
    harness.pump();
    assert!(harness.server.is_established(channel_id));
    assert_eq!(
        harness.server.channel_address(channel_id),
        Some(CLIENT_ADDR.parse().unwrap())
    );
}

#[test]
fn duplicate_request_from_same_endpoint_is_ignored() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    let channel_id = harness.start_connect(client);
    let request = harness.network.take_all();
    let now = harness.clock.now();

    harness
        .server
        .receive_datagram(now, request[0].from, &request[0].payload);
    assert_eq!(harness.network.take_all().len(), 1);

    harness
        .server
        .receive_datagram(now, request[0].from, &request[0].payload);
    assert!(harness.network.is_empty());
    assert!(harness.server.is_pending(channel_id));
    assert_eq!(harness.server.pending_count(), 1);
}

// ========== Spoofing Tests ==========

#[test]
fn confirm_from_wrong_endpoint_is_rejected() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    let channel_id = harness.start_connect(client);
    let now = harness.clock.now();
    for datagram in harness.network.take_all() {
        harness
            .server
            .receive_datagram(now, datagram.from, &datagram.payload);
    }
    let held = harness.network.take_all();

    harness.server.receive_datagram(
        now,
        OTHER_CLIENT_ADDR.parse().unwrap(),
        &control(MessageKind::ConfirmConnection, channel_id),
    );
    assert!(!harness.server.is_established(channel_id));
    assert!(harness.server.is_pending(channel_id));
    assert!(harness.server_events.is_empty());

    for datagram in held {
        harness
            .client(client)
            .channel
            .receive_datagram(datagram.from, &datagram.payload);
    }
    harness.pump();
    assert!(harness.server.is_established(channel_id));
}

#[test]
fn control_frames_with_trailing_bytes_are_ignored() {
    init_logging();
    let mut harness = Harness::new();
    let channel_id = ChannelId::new(0xC000_0001);
    let mut padded = control(MessageKind::RequestConnection, channel_id).to_vec();
    padded.push(0);

    let now = harness.clock.now();
    harness
        .server
        .receive_datagram(now, CLIENT_ADDR.parse().unwrap(), &padded);

    assert!(!harness.server.is_pending(channel_id));
    assert!(harness.network.is_empty());
}

#[test]
fn truncated_and_unknown_frames_are_dropped() {
    init_logging();
    let mut harness = Harness::new();
    let now = harness.clock.now();
    let from = CLIENT_ADDR.parse().unwrap();

    harness.server.receive_datagram(now, from, &[]);
    harness.server.receive_datagram(now, from, &[1, 0xEF, 0xBE]);
    harness.server.receive_datagram(now, from, &[0, 1, 0, 0, 0xC0]);
    harness.server.receive_datagram(now, from, &[9, 1, 0, 0, 0xC0]);

    assert_eq!(harness.server.pending_count(), 0);
    assert!(harness.network.is_empty());
}

// ========== Timeout Tests ==========

#[test]
fn unconfirmed_pending_entry_is_evicted_and_id_reusable() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    let channel_id = harness.start_connect(client);
    let now = harness.clock.now();
    for datagram in harness.network.take_all() {
        harness
            .server
            .receive_datagram(now, datagram.from, &datagram.payload);
    }
    // the WaitConfirmConnection is lost
    harness.network.clear();
    assert!(harness.server.is_pending(channel_id));

    let now = harness.clock.advance(9_999);
    harness.server.update(now);
    assert!(harness.server.is_pending(channel_id));

    let now = harness.clock.advance(2);
    harness.server.update(now);
    assert!(!harness.server.is_pending(channel_id));
    assert!(harness.server_events.is_empty());

    harness.server.receive_datagram(
        now,
        OTHER_CLIENT_ADDR.parse().unwrap(),
        &control(MessageKind::RequestConnection, channel_id),
    );
    assert!(harness.server.is_pending(channel_id));
    let replies = harness.network.take_all();
    assert_eq!(
        replies[0].payload,
        control(MessageKind::WaitConfirmConnection, channel_id)
    );
}

#[test]
fn client_reports_connect_timeout_once() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    let channel_id = harness.start_connect(client);
    // nobody answers
    harness.network.clear();

    harness.tick(4_999);
    assert!(harness.client(client).events.is_empty());
    harness.network.clear();

    harness.tick(1);
    harness.tick(10_000);

    assert_eq!(
        harness.client(client).events,
        vec![ClientEvent::ConnectFailed {
            channel_id,
            reason: DisposeReason::ConnectTimeout,
        }]
    );
    assert_eq!(harness.client(client).channel.state(), ClientState::Closed);
}

#[test]
fn confirmed_handshake_cancels_connect_timeout() {
    init_logging();
    let config = ClientConfig::default();
    let timeout = config.channel.connect_timeout_ms;
    let mut harness = Harness::with_config(1_000, ServerConfig::default(), config);
    let client = harness.add_client(CLIENT_ADDR);
    let channel_id = harness.connect(client);

    harness.settle(3, timeout);

    assert!(harness.client(client).channel.is_established());
    assert_eq!(
        harness.client(client).events,
        vec![ClientEvent::ConnectComplete { channel_id }]
    );
}
