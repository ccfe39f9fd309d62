//! Fixed-length framing for the firmware byte stream.

use super::crc::crc8;
use super::messages::{ids, DeviceMessage, HostMessage, LineFlags, FRAME_TERMINATOR};
use knitkit_core::{ProtocolViolation, LINE_BYTES};

/// Number of line-break bytes at the start of a buffer
pub fn separator_len(buf: &[u8]) -> usize {
    buf.iter()
        .take_while(|&&byte| byte == b'\r' || byte == b'\n')
        .count()
}

/// Decode one device frame from a buffer.
///
/// Returns `Ok(Some((total_consumed_bytes, message)))` if a complete frame is
/// available, `Ok(None)` if the buffer is incomplete, or `Err` if the leading
/// byte is not a known device message id. Line breaks before the frame are
/// skipped and counted as consumed.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(usize, DeviceMessage)>, ProtocolViolation> {
    let skip = separator_len(buf);
    let rest = &buf[skip..];
    let Some(&id) = rest.first() else {
        return Ok(None);
    };

    let len = DeviceMessage::frame_len(id).ok_or_else(|| ProtocolViolation::UnknownMessageId {
        id,
        raw: hex_dump(rest),
    })?;
    if rest.len() < len {
        return Ok(None);
    }

    let message = DeviceMessage::parse(&rest[..len]).ok_or(ProtocolViolation::Truncated {
        id,
        expected: len,
        actual: rest.len(),
    })?;
    Ok(Some((skip + len, message)))
}

/// Decode one host frame from a buffer.
///
/// Same contract as [`decode_frame`]; additionally checks the frame
/// terminator and, for `cnfLine`, the CRC.
pub fn decode_host_frame(buf: &[u8]) -> Result<Option<(usize, HostMessage)>, ProtocolViolation> {
    let skip = separator_len(buf);
    let rest = &buf[skip..];
    let Some(&id) = rest.first() else {
        return Ok(None);
    };

    let body_len = HostMessage::body_len(id).ok_or_else(|| ProtocolViolation::UnknownMessageId {
        id,
        raw: hex_dump(rest),
    })?;
    let total = body_len + FRAME_TERMINATOR.len();
    if rest.len() < total {
        return Ok(None);
    }
    if rest[body_len..total] != FRAME_TERMINATOR {
        return Err(ProtocolViolation::MissingTerminator { id });
    }

    let body = &rest[..body_len];
    let message = match id {
        ids::REQ_START => HostMessage::ReqStart {
            start_needle: body[1],
            stop_needle: body[2],
            continuous_reporting: body[3] != 0,
        },
        ids::REQ_INFO => HostMessage::ReqInfo,
        ids::REQ_TEST => HostMessage::ReqTest,
        _ => {
            let crc_index = body_len - 1;
            let expected = crc8(&body[..crc_index]);
            let actual = body[crc_index];
            if expected != actual {
                return Err(ProtocolViolation::ChecksumMismatch { expected, actual });
            }

            let mut data = [0u8; LINE_BYTES];
            data.copy_from_slice(&body[2..2 + LINE_BYTES]);
            HostMessage::CnfLine {
                line_number: body[1],
                data,
                flags: LineFlags::from_bits_retain(body[2 + LINE_BYTES]),
            }
        }
    };

    Ok(Some((skip + total, message)))
}

/// Space-separated hex rendering of raw bytes
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_frames() {
        assert_eq!(decode_frame(&[]).unwrap(), None);
        assert_eq!(decode_frame(b"\r\n").unwrap(), None);
        assert_eq!(decode_frame(&[0x84, 1, 0, 0]).unwrap(), None);
    }

    #[test]
    fn test_skips_line_breaks() {
        let buf = [b'\r', b'\n', 0x82, 7, b'\r', b'\n', 0xC1, 1];
        let (consumed, message) = decode_frame(&buf).unwrap().unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(message, DeviceMessage::ReqLine { line_number: 7 });

        let (consumed, message) = decode_frame(&buf[4..]).unwrap().unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(message, DeviceMessage::CnfStart { success: true });
    }

    #[test]
    fn test_unknown_id_carries_hex_dump() {
        let err = decode_frame(&[0x55, 0xAA]).unwrap_err();
        assert_eq!(
            err,
            ProtocolViolation::UnknownMessageId {
                id: 0x55,
                raw: "55 AA".to_string()
            }
        );
    }

    #[test]
    fn test_host_frame_checksum() {
        let mut frame = HostMessage::CnfLine {
            line_number: 12,
            data: [0x5A; LINE_BYTES],
            flags: LineFlags::empty(),
        }
        .encode();

        let (consumed, _) = decode_host_frame(&frame).unwrap().unwrap();
        assert_eq!(consumed, frame.len());

        frame[5] ^= 0x10;
        assert!(matches!(
            decode_host_frame(&frame),
            Err(ProtocolViolation::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_host_frame_terminator() {
        assert_eq!(
            decode_host_frame(&[0x03, b'\r', b'\n']),
            Err(ProtocolViolation::MissingTerminator { id: 0x03 })
        );
        assert_eq!(decode_host_frame(&[0x01, 10, 20]).unwrap(), None);
    }
}
