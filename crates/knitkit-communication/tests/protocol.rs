use knitkit_communication::protocol::{
    crc8, decode_frame, decode_host_frame, DeviceMessage, HostMessage, LineFlags,
};
use knitkit_core::{ProtocolViolation, LINE_BYTES};
use proptest::prelude::*;

fn arb_line() -> impl Strategy<Value = HostMessage> {
    (
        any::<u8>(),
        proptest::collection::vec(any::<u8>(), LINE_BYTES),
        any::<bool>(),
    )
        .prop_map(|(line_number, bytes, last)| {
            let mut data = [0u8; LINE_BYTES];
            data.copy_from_slice(&bytes);
            HostMessage::CnfLine {
                line_number,
                data,
                flags: if last {
                    LineFlags::LAST_LINE
                } else {
                    LineFlags::empty()
                },
            }
        })
}

proptest! {
    #[test]
    fn decode_frame_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = decode_frame(&bytes);
        let _ = decode_host_frame(&bytes);
    }

    #[test]
    fn decode_frame_consumes_within_buffer(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        if let Ok(Some((consumed, _))) = decode_frame(&bytes) {
            prop_assert!(consumed > 0 && consumed <= bytes.len());
        }
    }

    #[test]
    fn corrupted_line_frames_are_rejected(
        message in arb_line(),
        index in 1usize..LINE_BYTES + 3,
        mask in 1u8..=255,
    ) {
        let mut frame = message.encode();
        frame[index] ^= mask;
        let result = decode_host_frame(&frame);
        prop_assert!(
            matches!(result, Err(ProtocolViolation::ChecksumMismatch { .. })),
            "corruption at {} not detected",
            index
        );
    }

    #[test]
    fn line_frames_carry_their_crc(message in arb_line()) {
        let frame = message.encode();
        prop_assert_eq!(frame[LINE_BYTES + 3], crc8(&frame[..LINE_BYTES + 3]));
        let decoded = decode_host_frame(&frame).unwrap().map(|(_, m)| m);
        prop_assert_eq!(decoded, Some(message));
    }

    #[test]
    fn line_requests_survive_padding(line_number in any::<u8>(), padding in 0usize..4) {
        let mut bytes = b"\r\n".repeat(padding);
        bytes.extend(DeviceMessage::ReqLine { line_number }.encode());
        let (consumed, message) = decode_frame(&bytes).unwrap().unwrap();
        prop_assert_eq!(consumed, bytes.len());
        prop_assert_eq!(message, DeviceMessage::ReqLine { line_number });
    }
}
