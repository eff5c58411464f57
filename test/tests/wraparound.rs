/// Property tests driving whole channels across the 32-bit tick wrap
use proptest::prelude::*;

use tether_shared::{ControlHeader, Envelope, MessageKind};
use tether_test::{Harness, CLIENT_ADDR};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn delivery_is_ordered_from_any_start_tick(
        offset in 0u32..2_000,
        count in 1u32..20,
    ) {
        init_logging();
        let mut harness = Harness::starting_at(u32::MAX - offset);
        let client = harness.add_client(CLIENT_ADDR);
        let channel_id = harness.connect(client);
        prop_assert!(harness.server.is_established(channel_id));

        for opcode in 0..count {
            harness
                .client(client)
                .channel
                .send(Envelope::new(opcode, 0, 0), &opcode.to_le_bytes())
                .unwrap();
            harness.tick(7);
        }
        harness.settle(30, 10);

        prop_assert_eq!(harness.server_received.opcodes(), (0..count).collect::<Vec<_>>());
    }

    #[test]
    fn pending_expiry_holds_across_the_wrap(offset in 0u32..20_000) {
        init_logging();
        let mut harness = Harness::starting_at(u32::MAX - offset);
        let client = harness.add_client(CLIENT_ADDR);
        let channel_id = harness.start_connect(client);
        let now = harness.clock.now();
        for datagram in harness.network.take_all() {
            harness.server.receive_datagram(now, datagram.from, &datagram.payload);
        }
        harness.network.clear();

        let now = harness.clock.advance(9_000);
        harness.server.update(now);
        prop_assert!(harness.server.is_pending(channel_id));

        let now = harness.clock.advance(1_001);
        harness.server.update(now);
        prop_assert!(!harness.server.is_pending(channel_id));

        // a fresh request for the same id is accepted again
        harness.server.receive_datagram(
            now,
            CLIENT_ADDR.parse().unwrap(),
            &ControlHeader::new(MessageKind::RequestConnection, channel_id).encode(),
        );
        prop_assert!(harness.server.is_pending(channel_id));
    }
}
