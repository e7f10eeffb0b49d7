//! Property-based round-trip tests for the channel codecs.
//!
//! Every frame that crosses the wire must survive an encode → decode
//! round trip for arbitrary valid inputs.

use proptest::prelude::*;

use stela_messages::{decode_heartbeat, encode_heartbeat, BlockNotification};

proptest! {
    #[test]
    fn heartbeat_roundtrip(count in any::<u32>()) {
        prop_assert_eq!(decode_heartbeat(&encode_heartbeat(count)).unwrap(), count);
    }

    #[test]
    fn block_notification_roundtrip(
        height in any::<u32>(),
        block in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let notification = BlockNotification { height, block };
        let decoded = BlockNotification::decode(&notification.encode()).unwrap();
        prop_assert_eq!(decoded, notification);
    }

    #[test]
    fn truncated_block_frames_rejected(frame in proptest::collection::vec(any::<u8>(), 0..4)) {
        prop_assert!(BlockNotification::decode(&frame).is_err());
    }
}
