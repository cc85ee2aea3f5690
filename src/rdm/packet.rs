//! RDM packet codec
//!
//! Wire-format encode/decode for standard RDM frames and for the
//! specially-encoded discovery responses.
//!
//! # Standard frames
//!
//! A standard frame is a 24-byte header, 0-231 bytes of parameter
//! data, and a 16-bit big-endian additive checksum over everything
//! before it. The message-length byte covers header plus parameter
//! data (checksum excluded).
//!
//! # Discovery responses
//!
//! A `DISC_UNIQUE_BRANCH` response carries no start code or break.
//! It is a preamble of up to seven `0xFE` bytes, one `0xAA` delimiter,
//! then the responder's UID and a 16-bit checksum, each byte expanded
//! to the pair `(byte | 0xAA, byte | 0x55)`. The checksum is the
//! additive sum of the twelve encoded UID bytes.

use super::pids::{CommandClass, Pid, ResponseType};
use super::uid::Uid;
use crate::constants::{
    DISC_ENCODED_CHECKSUM_LEN, DISC_ENCODED_UID_LEN, DISC_PREAMBLE_BYTE, DISC_PREAMBLE_DELIMITER,
    DISC_PREAMBLE_MAX_LEN, RDM_BASE_PACKET_SIZE, RDM_HEADER_SIZE, RDM_PDL_MAX, SC_RDM,
    SC_SUB_MESSAGE,
};
use crate::driver::error::{CodecError, CodecResult};

// =============================================================================
// Header
// =============================================================================

/// The message fields of an RDM frame, independent of direction.
///
/// The `port_id` byte is reused by the protocol: requests carry the
/// controller's port id (1-based), responses carry the
/// [`ResponseType`]. Use [`RdmHeader::response_type`] when reading a
/// response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RdmHeader {
    /// Destination UID
    pub dest_uid: Uid,
    /// Source UID
    pub src_uid: Uid,
    /// Transaction number
    pub tn: u8,
    /// Port id (requests) or response type (responses)
    pub port_id: u8,
    /// Count of queued messages held by the responder
    pub message_count: u8,
    /// Sub-device the message addresses
    pub sub_device: u16,
    /// Command class
    pub cc: CommandClass,
    /// Parameter id
    pub pid: Pid,
    /// Parameter data length
    pub pdl: u8,
}

impl RdmHeader {
    /// Build a request header with the fields the controller fills in
    /// automatically (source UID, tn, port id, message count) zeroed.
    pub const fn request(dest_uid: Uid, cc: CommandClass, pid: Pid, sub_device: u16) -> Self {
        Self {
            dest_uid,
            src_uid: Uid::NULL,
            tn: 0,
            port_id: 0,
            message_count: 0,
            sub_device,
            cc,
            pid,
            pdl: 0,
        }
    }

    /// Interpret the port-id byte as a response type.
    pub const fn response_type(&self) -> Option<ResponseType> {
        ResponseType::from_wire(self.port_id)
    }
}

// =============================================================================
// Checksum
// =============================================================================

/// The 16-bit additive checksum over a byte run.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut sum = 0u16;
    for &byte in bytes {
        sum = sum.wrapping_add(byte as u16);
    }
    sum
}

// =============================================================================
// Encode
// =============================================================================

/// Encode a standard RDM frame into `buf`.
///
/// Returns the total number of bytes written (header, parameter data
/// and checksum). `header.pdl` is taken from `pd.len()`, not from the
/// header value.
///
/// # Errors
///
/// - [`CodecError::ParameterTooLarge`] if `pd` exceeds 231 bytes
/// - [`CodecError::Truncated`] if `buf` cannot hold the frame
pub fn encode(buf: &mut [u8], header: &RdmHeader, pd: &[u8]) -> CodecResult<usize> {
    if pd.len() > RDM_PDL_MAX {
        return Err(CodecError::ParameterTooLarge);
    }
    let message_len = RDM_HEADER_SIZE + pd.len();
    let total = message_len + 2;
    if buf.len() < total {
        return Err(CodecError::Truncated);
    }

    buf[0] = SC_RDM;
    buf[1] = SC_SUB_MESSAGE;
    buf[2] = message_len as u8;
    buf[3..9].copy_from_slice(&header.dest_uid.to_bytes());
    buf[9..15].copy_from_slice(&header.src_uid.to_bytes());
    buf[15] = header.tn;
    buf[16] = header.port_id;
    buf[17] = header.message_count;
    buf[18..20].copy_from_slice(&header.sub_device.to_be_bytes());
    buf[20] = header.cc.to_wire();
    buf[21..23].copy_from_slice(&header.pid.to_be_bytes());
    buf[23] = pd.len() as u8;
    buf[24..24 + pd.len()].copy_from_slice(pd);

    let sum = checksum(&buf[..message_len]);
    buf[message_len..total].copy_from_slice(&sum.to_be_bytes());
    Ok(total)
}

/// Encode a discovery response for `uid` into `buf`.
///
/// Writes the full eight-byte preamble, the encoded UID and the
/// encoded checksum. Returns the number of bytes written.
///
/// # Errors
///
/// [`CodecError::Truncated`] if `buf` is shorter than 24 bytes.
pub fn encode_disc_response(buf: &mut [u8], uid: Uid) -> CodecResult<usize> {
    let total = DISC_PREAMBLE_MAX_LEN + 1 + DISC_ENCODED_UID_LEN + DISC_ENCODED_CHECKSUM_LEN;
    if buf.len() < total {
        return Err(CodecError::Truncated);
    }

    for slot in buf.iter_mut().take(DISC_PREAMBLE_MAX_LEN) {
        *slot = DISC_PREAMBLE_BYTE;
    }
    buf[DISC_PREAMBLE_MAX_LEN] = DISC_PREAMBLE_DELIMITER;

    let mut cursor = DISC_PREAMBLE_MAX_LEN + 1;
    for byte in uid.to_bytes() {
        buf[cursor] = byte | 0xAA;
        buf[cursor + 1] = byte | 0x55;
        cursor += 2;
    }

    let sum = checksum(&buf[DISC_PREAMBLE_MAX_LEN + 1..cursor]);
    let sum = sum.to_be_bytes();
    buf[cursor] = sum[0] | 0xAA;
    buf[cursor + 1] = sum[0] | 0x55;
    buf[cursor + 2] = sum[1] | 0xAA;
    buf[cursor + 3] = sum[1] | 0x55;
    Ok(total)
}

// =============================================================================
// Decode
// =============================================================================

/// A successfully decoded inbound byte run.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// A standard RDM frame
    Rdm {
        /// The parsed header
        header: RdmHeader,
        /// Borrowed view of the parameter data
        pd: &'a [u8],
    },
    /// A discovery response carrying the responder's UID
    DiscoveryResponse(Uid),
}

/// Decode an inbound byte run as either a standard RDM frame or a
/// discovery response.
///
/// # Errors
///
/// - [`CodecError::Malformed`] on start-code or structure violations
/// - [`CodecError::Truncated`] if length fields exceed `bytes`
/// - [`CodecError::ChecksumMismatch`] if the arithmetic sum disagrees
pub fn decode(bytes: &[u8]) -> CodecResult<Decoded<'_>> {
    match bytes.first() {
        Some(&DISC_PREAMBLE_BYTE) | Some(&DISC_PREAMBLE_DELIMITER) => {
            decode_disc_response(bytes).map(Decoded::DiscoveryResponse)
        }
        Some(&SC_RDM) => decode_rdm(bytes),
        Some(_) => Err(CodecError::Malformed),
        None => Err(CodecError::Truncated),
    }
}

fn decode_rdm(bytes: &[u8]) -> CodecResult<Decoded<'_>> {
    if bytes.len() < RDM_BASE_PACKET_SIZE {
        return Err(CodecError::Truncated);
    }
    if bytes[0] != SC_RDM || bytes[1] != SC_SUB_MESSAGE {
        return Err(CodecError::Malformed);
    }

    let message_len = bytes[2] as usize;
    if message_len < RDM_HEADER_SIZE {
        return Err(CodecError::Malformed);
    }
    if message_len + 2 > bytes.len() {
        return Err(CodecError::Truncated);
    }

    let pdl = bytes[23] as usize;
    if pdl > RDM_PDL_MAX || RDM_HEADER_SIZE + pdl != message_len {
        return Err(CodecError::Malformed);
    }

    let expected = u16::from_be_bytes([bytes[message_len], bytes[message_len + 1]]);
    if checksum(&bytes[..message_len]) != expected {
        return Err(CodecError::ChecksumMismatch);
    }

    let cc = CommandClass::from_wire(bytes[20]).ok_or(CodecError::Malformed)?;
    let header = RdmHeader {
        dest_uid: Uid::from_bytes([bytes[3], bytes[4], bytes[5], bytes[6], bytes[7], bytes[8]]),
        src_uid: Uid::from_bytes([
            bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14],
        ]),
        tn: bytes[15],
        port_id: bytes[16],
        message_count: bytes[17],
        sub_device: u16::from_be_bytes([bytes[18], bytes[19]]),
        cc,
        pid: u16::from_be_bytes([bytes[21], bytes[22]]),
        pdl: pdl as u8,
    };
    Ok(Decoded::Rdm {
        header,
        pd: &bytes[RDM_HEADER_SIZE..message_len],
    })
}

fn decode_disc_response(bytes: &[u8]) -> CodecResult<Uid> {
    let mut cursor = 0;
    while cursor < bytes.len() && bytes[cursor] == DISC_PREAMBLE_BYTE {
        if cursor == DISC_PREAMBLE_MAX_LEN {
            return Err(CodecError::Malformed);
        }
        cursor += 1;
    }
    if bytes.get(cursor) != Some(&DISC_PREAMBLE_DELIMITER) {
        return Err(CodecError::Malformed);
    }
    cursor += 1;

    let encoded = bytes
        .get(cursor..cursor + DISC_ENCODED_UID_LEN + DISC_ENCODED_CHECKSUM_LEN)
        .ok_or(CodecError::Truncated)?;

    let mut uid_bytes = [0u8; 6];
    for (i, pair) in encoded[..DISC_ENCODED_UID_LEN].chunks_exact(2).enumerate() {
        uid_bytes[i] = (pair[0] & 0x55) | (pair[1] & 0xAA);
    }

    let expected = u16::from_be_bytes([
        (encoded[12] & 0x55) | (encoded[13] & 0xAA),
        (encoded[14] & 0x55) | (encoded[15] & 0xAA),
    ]);
    if checksum(&encoded[..DISC_ENCODED_UID_LEN]) != expected {
        return Err(CodecError::ChecksumMismatch);
    }

    Ok(Uid::from_bytes(uid_bytes))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdm::pids::pid;

    fn dub_request_header() -> RdmHeader {
        RdmHeader {
            dest_uid: Uid::BROADCAST_ALL,
            src_uid: Uid::new(0x05E0, 0x12345678),
            tn: 0x01,
            port_id: 2,
            message_count: 0,
            sub_device: 0x0000,
            cc: CommandClass::DiscoveryCommand,
            pid: pid::DISC_UNIQUE_BRANCH,
            pdl: 12,
        }
    }

    #[test]
    fn encode_disc_unique_branch_request() {
        let mut pd = [0u8; 12];
        pd[..6].copy_from_slice(&Uid::NULL.to_bytes());
        pd[6..].copy_from_slice(&Uid::MAX.to_bytes());

        let mut buf = [0u8; 64];
        let len = encode(&mut buf, &dub_request_header(), &pd).unwrap();
        assert_eq!(len, 38);

        let expected_head: [u8; 36] = [
            0xCC, 0x01, 0x24, // start, sub-start, message length (24 + 12)
            0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // dest
            0x05, 0xE0, 0x12, 0x34, 0x56, 0x78, // src
            0x01, 0x02, 0x00, // tn, port id, message count
            0x00, 0x00, // sub-device
            0x10, // cc
            0x00, 0x01, // pid
            0x0C, // pdl
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // branch lower bound
            0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // branch upper bound
        ];
        assert_eq!(&buf[..36], &expected_head);

        let sum = checksum(&expected_head);
        assert_eq!(&buf[36..38], &sum.to_be_bytes());
    }

    #[test]
    fn encode_rejects_oversized_pd() {
        let pd = [0u8; 232];
        let mut buf = [0u8; 300];
        let err = encode(&mut buf, &dub_request_header(), &pd).unwrap_err();
        assert_eq!(err, CodecError::ParameterTooLarge);
    }

    #[test]
    fn encode_rejects_short_buffer() {
        let mut buf = [0u8; 25];
        let err = encode(&mut buf, &dub_request_header(), &[]).unwrap_err();
        assert_eq!(err, CodecError::Truncated);
    }

    #[test]
    fn rdm_frame_roundtrip() {
        let header = RdmHeader {
            dest_uid: Uid::new(0x05E0, 0x00000001),
            src_uid: Uid::new(0x05E0, 0x12345678),
            tn: 0x42,
            port_id: 1,
            message_count: 0,
            sub_device: 0x0000,
            cc: CommandClass::GetCommand,
            pid: pid::DEVICE_INFO,
            pdl: 0,
        };
        let mut buf = [0u8; 64];
        let len = encode(&mut buf, &header, &[]).unwrap();
        assert_eq!(len, 26);

        match decode(&buf[..len]).unwrap() {
            Decoded::Rdm { header: decoded, pd } => {
                assert_eq!(decoded, header);
                assert!(pd.is_empty());
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn rdm_frame_roundtrip_with_pd() {
        let pd = [0xDE, 0xAD, 0xBE, 0xEF, 0x01];
        let mut header = dub_request_header();
        header.cc = CommandClass::SetCommand;
        header.pid = pid::DEVICE_LABEL;
        header.dest_uid = Uid::new(0x05E0, 0x00000001);

        let mut buf = [0u8; 64];
        let len = encode(&mut buf, &header, &pd).unwrap();

        match decode(&buf[..len]).unwrap() {
            Decoded::Rdm { header: decoded, pd: decoded_pd } => {
                assert_eq!(decoded.pid, pid::DEVICE_LABEL);
                assert_eq!(decoded.pdl, 5);
                assert_eq!(decoded_pd, &pd);
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn decode_rejects_bad_start_code() {
        let bytes = [0x00u8; 26];
        assert_eq!(decode(&bytes).unwrap_err(), CodecError::Malformed);
    }

    #[test]
    fn decode_rejects_truncated_frame() {
        let mut buf = [0u8; 64];
        let len = encode(&mut buf, &dub_request_header(), &[0u8; 12]).unwrap();
        assert_eq!(decode(&buf[..len - 3]).unwrap_err(), CodecError::Truncated);
    }

    #[test]
    fn decode_rejects_corrupted_checksum() {
        let mut buf = [0u8; 64];
        let len = encode(&mut buf, &dub_request_header(), &[0u8; 12]).unwrap();
        buf[10] ^= 0x01;
        assert_eq!(
            decode(&buf[..len]).unwrap_err(),
            CodecError::ChecksumMismatch
        );
    }

    #[test]
    fn decode_rejects_inconsistent_pdl() {
        let mut buf = [0u8; 64];
        let len = encode(&mut buf, &dub_request_header(), &[0u8; 12]).unwrap();
        // Claim a shorter pdl than the message length implies, refresh
        // the checksum so only the structural check can object.
        buf[23] = 0x0B;
        let message_len = buf[2] as usize;
        let sum = checksum(&buf[..message_len]);
        buf[message_len..message_len + 2].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(decode(&buf[..len]).unwrap_err(), CodecError::Malformed);
    }

    #[test]
    fn disc_response_roundtrip() {
        let uid = Uid::new(0x05E0, 0x12345678);
        let mut buf = [0u8; 24];
        let len = encode_disc_response(&mut buf, uid).unwrap();
        assert_eq!(len, 24);

        match decode(&buf[..len]).unwrap() {
            Decoded::DiscoveryResponse(decoded) => assert_eq!(decoded, uid),
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn disc_response_known_vector() {
        // Each UID byte 0x03 encodes to (0x03 | 0xAA, 0x03 | 0x55) =
        // (0xAB, 0x57); the checksum is the sum of the encoded bytes,
        // 6 * 0x102 = 0x060C, itself encoded the same way.
        let uid = Uid::new(0x0303, 0x03030303);
        let mut buf = [0u8; 24];
        encode_disc_response(&mut buf, uid).unwrap();

        let expected: [u8; 24] = [
            0xFE, 0xFE, 0xFE, 0xFE, 0xFE, 0xFE, 0xFE, 0xAA, // preamble
            0xAB, 0x57, 0xAB, 0x57, 0xAB, 0x57, 0xAB, 0x57, 0xAB, 0x57, 0xAB, 0x57, // uid
            0xAE, 0x57, 0xAE, 0x5D, // checksum 0x060C
        ];
        assert_eq!(buf, expected);

        match decode(&expected).unwrap() {
            Decoded::DiscoveryResponse(decoded) => assert_eq!(decoded, uid),
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn disc_response_decodes_with_short_preamble() {
        let uid = Uid::new(0x0001, 0x00000002);
        let mut buf = [0u8; 24];
        let len = encode_disc_response(&mut buf, uid).unwrap();

        // Responders may emit 0..=7 preamble bytes; drop them all.
        match decode(&buf[DISC_PREAMBLE_MAX_LEN..len]).unwrap() {
            Decoded::DiscoveryResponse(decoded) => assert_eq!(decoded, uid),
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn disc_response_rejects_corruption() {
        let uid = Uid::new(0x0001, 0x00000002);
        let mut buf = [0u8; 24];
        let len = encode_disc_response(&mut buf, uid).unwrap();
        buf[9] ^= 0x04;
        assert_eq!(
            decode(&buf[..len]).unwrap_err(),
            CodecError::ChecksumMismatch
        );
    }

    #[test]
    fn disc_response_rejects_missing_delimiter() {
        let bytes = [0xFE; 10];
        assert_eq!(decode(&bytes).unwrap_err(), CodecError::Malformed);
    }

    #[test]
    fn checksum_is_additive_mod_65536() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x01, 0x02, 0x03]), 6);
        assert_eq!(checksum(&[0xFF; 300]), (300u32 * 255 % 65536) as u16);
    }
}
