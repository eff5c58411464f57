/// Tests for ordered delivery of application packets once a channel is up
use tether_client::{ClientConfig, ClientState};
use tether_server::ServerConfig;
use tether_shared::{
    ChannelError, ChannelId, Envelope, PacketHeader, DEFAULT_MAX_BODY_LENGTH, EMPTY_BODY_LENGTH,
};
use tether_test::{Harness, CLIENT_ADDR};

const OTHER_CLIENT_ADDR: &str = "127.0.0.1:23456";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn empty_body_arrives_with_sentinel_length() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    let channel_id = harness.connect_as(client, ChannelId::new(0xC000_1234));
    assert_eq!(channel_id, ChannelId::new(0xC000_1234));
    assert!(harness.server.is_established(channel_id));

    harness
        .client(client)
        .channel
        .send(Envelope::new(7, 1, 0), &[])
        .unwrap();
    harness.settle(5, 10);

    let received = harness.server_received.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].channel_id, channel_id);
    assert_eq!(received[0].header, PacketHeader::new(EMPTY_BODY_LENGTH, 7, 1, 0));
    assert!(received[0].body.is_empty());
}

#[test]
fn client_packets_arrive_in_send_order() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    harness.connect(client);

    for opcode in 0..50u32 {
        let body = vec![opcode as u8; (opcode as usize * 37) % 300];
        harness
            .client(client)
            .channel
            .send(Envelope::new(opcode, opcode, -(opcode as i64)), &body)
            .unwrap();
    }
    harness.settle(20, 10);

    let received = harness.server_received.received();
    assert_eq!(harness.server_received.opcodes(), (0..50).collect::<Vec<_>>());
    for (opcode, packet) in received.iter().enumerate() {
        assert_eq!(packet.header.rpc_id, opcode as u32);
        assert_eq!(packet.header.route_id, -(opcode as i64));
        assert_eq!(packet.body.len(), (opcode * 37) % 300);
        assert!(packet.body.iter().all(|byte| *byte == opcode as u8));
    }
    assert_eq!(harness.client(client).channel.wait_send_count(), 0);
}

#[test]
fn server_packets_arrive_in_send_order() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    let channel_id = harness.connect(client);

    for opcode in 100..120u32 {
        harness
            .server
            .send(channel_id, Envelope::new(opcode, 0, 9), b"from the server")
            .unwrap();
    }
    harness.settle(20, 10);

    let received = harness.client(client).received.received();
    assert_eq!(
        received
            .iter()
            .map(|packet| packet.header.opcode)
            .collect::<Vec<_>>(),
        (100..120).collect::<Vec<_>>()
    );
    assert!(received
        .iter()
        .all(|packet| &packet.body[..] == b"from the server" && packet.channel_id == channel_id));
    assert_eq!(harness.server.wait_send_count(channel_id), Some(0));
}

#[test]
fn body_spanning_several_segments_is_reassembled() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    harness.connect(client);

    let body: Vec<u8> = (0..20_000u32).map(|index| (index % 251) as u8).collect();
    harness
        .client(client)
        .channel
        .send(Envelope::new(3, 4, 5), &body)
        .unwrap();
    harness.settle(20, 10);

    let received = harness.server_received.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].header.body_length, 20_000);
    assert_eq!(&received[0].body[..], &body[..]);
}

#[test]
fn body_of_hundreds_of_kilobytes_is_delivered() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    harness.connect(client);

    let body: Vec<u8> = (0..200_000u32).map(|index| (index % 253) as u8).collect();
    let channel = &mut harness.client(client).channel;
    channel.send(Envelope::new(8, 1, 0), &body).unwrap();
    channel.send(Envelope::new(9, 2, 0), b"after").unwrap();
    harness.settle(40, 10);

    assert_eq!(harness.client(client).channel.state(), ClientState::Established);
    let received = harness.server_received.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].header.opcode, 8);
    assert_eq!(received[0].header.body_length, 200_000);
    assert!(received[0].body[..] == body[..]);
    assert_eq!(received[1].header.opcode, 9);
    assert_eq!(&received[1].body[..], b"after");
}

#[test]
fn packets_sent_before_confirm_are_flushed_in_order() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    harness.start_connect(client);

    for opcode in 1..=3 {
        harness
            .client(client)
            .channel
            .send(Envelope::new(opcode, 0, 0), b"early")
            .unwrap();
    }
    assert_eq!(harness.client(client).channel.cached_len(), 3);
    assert!(harness.server_received.is_empty());

    harness.pump();
    assert_eq!(harness.client(client).channel.cached_len(), 0);
    harness.settle(10, 10);

    assert_eq!(harness.server_received.opcodes(), vec![1, 2, 3]);
}

#[test]
fn full_cache_rejects_without_closing() {
    init_logging();
    let mut client_config = ClientConfig::default();
    client_config.channel.max_cached_messages = 2;
    let mut harness = Harness::with_config(1_000, ServerConfig::default(), client_config);
    let client = harness.add_client(CLIENT_ADDR);
    let channel_id = harness.start_connect(client);

    let channel = &mut harness.client(client).channel;
    channel.send(Envelope::new(1, 0, 0), b"a").unwrap();
    channel.send(Envelope::new(2, 0, 0), b"b").unwrap();
    assert_eq!(
        channel.send(Envelope::new(3, 0, 0), b"c"),
        Err(ChannelError::CacheFull {
            channel_id,
            capacity: 2,
        })
    );
    assert_eq!(channel.state(), ClientState::AwaitingConfirm);

    harness.pump();
    harness.settle(10, 10);
    assert_eq!(harness.server_received.opcodes(), vec![1, 2]);
}

#[test]
fn oversized_body_is_rejected_and_channel_survives() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);
    let channel_id = harness.connect(client);
    let too_large = vec![0u8; DEFAULT_MAX_BODY_LENGTH as usize + 1];

    assert_eq!(
        harness
            .client(client)
            .channel
            .send(Envelope::default(), &too_large),
        Err(ChannelError::BodyTooLarge {
            length: too_large.len(),
            max: DEFAULT_MAX_BODY_LENGTH,
        })
    );
    assert_eq!(
        harness.server.send(channel_id, Envelope::default(), &too_large),
        Err(ChannelError::BodyTooLarge {
            length: too_large.len(),
            max: DEFAULT_MAX_BODY_LENGTH,
        })
    );

    assert!(harness.client(client).channel.is_established());
    assert!(harness.server.is_established(channel_id));
    assert_eq!(harness.client(client).channel.buffer_pool().outstanding(), 0);
}

#[test]
fn send_before_connect_is_refused() {
    init_logging();
    let mut harness = Harness::new();
    let client = harness.add_client(CLIENT_ADDR);

    assert_eq!(
        harness
            .client(client)
            .channel
            .send(Envelope::default(), b"nobody home"),
        Err(ChannelError::NotConnected)
    );
    assert!(harness.network.is_empty());
}

#[test]
fn server_send_to_unknown_channel_fails() {
    init_logging();
    let mut harness = Harness::new();
    let channel_id = ChannelId::new(0xC000_0404);

    assert_eq!(
        harness.server.send(channel_id, Envelope::default(), b"?"),
        Err(ChannelError::UnknownChannel { channel_id })
    );
}

#[test]
fn channels_are_delivered_separately() {
    init_logging();
    let mut harness = Harness::new();
    let first = harness.add_client(CLIENT_ADDR);
    let second = harness.add_client(OTHER_CLIENT_ADDR);
    let first_id = harness.connect(first);
    let second_id = harness.connect(second);
    assert_ne!(first_id, second_id);

    harness
        .client(first)
        .channel
        .send(Envelope::new(1, 0, 0), b"first")
        .unwrap();
    harness
        .client(second)
        .channel
        .send(Envelope::new(2, 0, 0), b"second")
        .unwrap();
    harness.server.send(first_id, Envelope::new(10, 0, 0), b"to first").unwrap();
    harness.server.send(second_id, Envelope::new(20, 0, 0), b"to second").unwrap();
    harness.settle(10, 10);

    let mut server_side: Vec<(ChannelId, u32)> = harness
        .server_received
        .received()
        .iter()
        .map(|packet| (packet.channel_id, packet.header.opcode))
        .collect();
    server_side.sort();
    let mut expected = vec![(first_id, 1), (second_id, 2)];
    expected.sort();
    assert_eq!(server_side, expected);

    assert_eq!(harness.client(first).received.opcodes(), vec![10]);
    assert_eq!(harness.client(second).received.opcodes(), vec![20]);
}

#[test]
fn delivery_continues_across_tick_wraparound() {
    init_logging();
    let mut harness = Harness::starting_at(u32::MAX - 25);
    let client = harness.add_client(CLIENT_ADDR);
    let channel_id = harness.connect(client);

    for opcode in 0..10 {
        harness
            .client(client)
            .channel
            .send(Envelope::new(opcode, 0, 0), b"wrap")
            .unwrap();
        harness.tick(10);
    }
    harness.settle(20, 10);

    assert!(harness.clock.now() < 1_000);
    assert_eq!(harness.server_received.opcodes(), (0..10).collect::<Vec<_>>());
    assert!(harness.server.is_established(channel_id));
    assert!(harness.client(client).channel.is_established());
}
