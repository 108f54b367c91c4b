//! ## lorhammer-protocols::semtech
//! Semtech packet-forwarder (UDP, protocol v2) envelope codec.
//!
//! Wire layout: `[version:1][token:2 LE][type:1][gateway_mac:8]?[json]?`.
//! Upstream frames (PUSH_DATA, PULL_DATA) carry the gateway MAC, acks carry
//! nothing after the type byte, PULL_RESP carries a JSON body directly.
//!
//! Inbound classification never panics: a malformed frame is an `Err` the
//! receive loop logs and moves past.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::packet::{PullRespPayload, PushDataPayload, RxPacket, TxPacket};
use crate::phy::{PhyError, PhyPayload};

pub const PROTOCOL_VERSION: u8 = 2;

const HEADER_LEN: usize = 4;
const GATEWAY_MAC_LEN: usize = 8;

/// Last second (9999-12-31T23:59:59Z) an RFC 3339 `time` field can carry.
pub const MAX_RXPK_DATE: i64 = 253_402_300_799;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    PushData = 0x00,
    PushAck = 0x01,
    PullData = 0x02,
    PullResp = 0x03,
    PullAck = 0x04,
    TxAck = 0x05,
}

impl PacketType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(PacketType::PushData),
            0x01 => Some(PacketType::PushAck),
            0x02 => Some(PacketType::PullData),
            0x03 => Some(PacketType::PullResp),
            0x04 => Some(PacketType::PullAck),
            0x05 => Some(PacketType::TxAck),
            _ => None,
        }
    }
}

/// Errors raised while building or classifying forwarder frames.
#[derive(Debug, Error)]
pub enum SemtechError {
    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },
    #[error("Unexpected length for {packet_type:?}: expected {expected} bytes, got {actual}")]
    UnexpectedLength {
        packet_type: PacketType,
        expected: usize,
        actual: usize,
    },
    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid base64 PHY payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Fixed reception time {0} is outside 1..={MAX_RXPK_DATE}")]
    TimestampOutOfRange(i64),
}

/// Identity of one simulated gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayIdentity {
    pub mac: [u8; 8],
    /// Fixed reception time (unix seconds) stamped on every uplink.
    pub rxpk_date: Option<i64>,
}

impl GatewayIdentity {
    pub fn new(mac: [u8; 8]) -> Self {
        Self {
            mac,
            rxpk_date: None,
        }
    }

    pub fn with_rxpk_date(mut self, unix_secs: i64) -> Self {
        self.rxpk_date = Some(unix_secs);
        self
    }

    /// Fixed timestamp when set and positive, current UTC time otherwise.
    pub fn rx_time(&self) -> Result<DateTime<Utc>, SemtechError> {
        match self.rxpk_date {
            Some(secs) if secs > MAX_RXPK_DATE => Err(SemtechError::TimestampOutOfRange(secs)),
            Some(secs) if secs > 0 => {
                DateTime::from_timestamp(secs, 0).ok_or(SemtechError::TimestampOutOfRange(secs))
            }
            _ => Ok(Utc::now()),
        }
    }

    pub fn mac_hex(&self) -> String {
        hex::encode(self.mac)
    }
}

impl PushDataPayload {
    /// Frames this body as a PUSH_DATA packet from `gateway`.
    pub fn prepare(&self, gateway: &GatewayIdentity, token: u16) -> Result<Bytes, SemtechError> {
        let body = serde_json::to_vec(self)?;
        let mut frame = BytesMut::with_capacity(HEADER_LEN + GATEWAY_MAC_LEN + body.len());
        put_header(&mut frame, token, PacketType::PushData);
        frame.put_slice(&gateway.mac);
        frame.put_slice(&body);
        Ok(frame.freeze())
    }
}

fn put_header(frame: &mut BytesMut, token: u16, packet_type: PacketType) {
    frame.put_u8(PROTOCOL_VERSION);
    frame.put_u16_le(token);
    frame.put_u8(packet_type as u8);
}

/// Draws a token over the whole `u16` range.
pub fn random_token() -> u16 {
    rand::random()
}

/// Builds a PUSH_DATA frame carrying one uplink with a random token.
pub fn encode_push_data(payload: &[u8], gateway: &GatewayIdentity) -> Result<Bytes, SemtechError> {
    encode_push_data_with_token(payload, gateway, random_token())
}

pub fn encode_push_data_with_token(
    payload: &[u8],
    gateway: &GatewayIdentity,
    token: u16,
) -> Result<Bytes, SemtechError> {
    let body = PushDataPayload {
        rxpk: vec![RxPacket::new(payload, gateway.rx_time()?)],
    };
    body.prepare(gateway, token)
}

/// Builds the PULL_DATA keep-alive that opens the downlink path.
pub fn encode_pull_data(gateway: &GatewayIdentity, token: u16) -> Bytes {
    let mut frame = BytesMut::with_capacity(HEADER_LEN + GATEWAY_MAC_LEN);
    put_header(&mut frame, token, PacketType::PullData);
    frame.put_slice(&gateway.mac);
    frame.freeze()
}

/// A downlink pushed by the network server.
#[derive(Debug, Clone, PartialEq)]
pub struct PullResponse {
    pub version: u8,
    pub token: u16,
    pub txpk: TxPacket,
    pub phy_payload: Bytes,
    /// Decoding the PHY layer is best effort and never fails the frame.
    pub phy: Result<PhyPayload, PhyError>,
}

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPacket {
    PullAck { version: u8, token: u16 },
    PushAck { version: u8, token: u16 },
    PullResponse(PullResponse),
    Unknown { version: u8, token: u16, packet_type: u8 },
}

/// Classifies and shallow-parses a frame received from the network server.
pub fn classify(data: &[u8]) -> Result<InboundPacket, SemtechError> {
    if data.len() < HEADER_LEN {
        return Err(SemtechError::InsufficientData {
            expected: HEADER_LEN,
            actual: data.len(),
        });
    }
    let version = data[0];
    if version != 1 && version != 2 {
        return Err(SemtechError::UnsupportedVersion(version));
    }
    let token = u16::from_le_bytes([data[1], data[2]]);

    match PacketType::from_byte(data[3]) {
        Some(PacketType::PushAck) => {
            expect_len(PacketType::PushAck, data, HEADER_LEN)?;
            Ok(InboundPacket::PushAck { version, token })
        }
        Some(PacketType::PullAck) => {
            expect_len(PacketType::PullAck, data, HEADER_LEN)?;
            Ok(InboundPacket::PullAck { version, token })
        }
        Some(PacketType::PullResp) => {
            let body: PullRespPayload = serde_json::from_slice(&data[HEADER_LEN..])?;
            let phy_payload = Bytes::from(STANDARD.decode(body.txpk.data.as_bytes())?);
            let phy = PhyPayload::decode(&phy_payload);
            Ok(InboundPacket::PullResponse(PullResponse {
                version,
                token,
                txpk: body.txpk,
                phy_payload,
                phy,
            }))
        }
        _ => Ok(InboundPacket::Unknown {
            version,
            token,
            packet_type: data[3],
        }),
    }
}

fn expect_len(packet_type: PacketType, data: &[u8], expected: usize) -> Result<(), SemtechError> {
    if data.len() != expected {
        return Err(SemtechError::UnexpectedLength {
            packet_type,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Classifies a frame and logs it for token correlation.
pub fn handle_packet(data: &[u8]) -> Result<InboundPacket, SemtechError> {
    let packet = classify(data).inspect_err(|e| {
        warn!(error = %e, len = data.len(), "gateway: dropping malformed udp packet from NS");
    })?;

    match &packet {
        InboundPacket::PullAck { version, token } => {
            info!(
                packet_type = "pullAck",
                protocol_version = version,
                token,
                "gateway: received udp packet from NS"
            );
        }
        InboundPacket::PushAck { version, token } => {
            info!(
                packet_type = "pushAck",
                protocol_version = version,
                token,
                "gateway: received udp packet from NS"
            );
        }
        InboundPacket::PullResponse(resp) => {
            info!(
                packet_type = "pullResp",
                protocol_version = resp.version,
                token = resp.token,
                "gateway: received udp packet from NS"
            );
            match &resp.phy {
                Ok(phy) => debug!(
                    mtype = ?phy.mtype,
                    size = resp.phy_payload.len(),
                    "gateway: decoded downlink"
                ),
                Err(e) => debug!(error = %e, "gateway: downlink PHY payload not decodable"),
            }
        }
        InboundPacket::Unknown { packet_type, .. } => {
            warn!(packet_type, "gateway: unknown packet type");
        }
    }
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    const MAC: [u8; 8] = [0xB8, 0x27, 0xEB, 0xFF, 0xFE, 0x00, 0x00, 0x01];

    fn push_body(frame: &[u8]) -> PushDataPayload {
        serde_json::from_slice(&frame[HEADER_LEN + GATEWAY_MAC_LEN..]).unwrap()
    }

    fn pull_resp_frame(token: u16, body: &str) -> Vec<u8> {
        let mut frame = vec![PROTOCOL_VERSION];
        frame.extend_from_slice(&token.to_le_bytes());
        frame.push(PacketType::PullResp as u8);
        frame.extend_from_slice(body.as_bytes());
        frame
    }

    #[test]
    fn test_push_data_header_layout() {
        let gateway = GatewayIdentity::new(MAC);
        let frame = encode_push_data_with_token(b"hello", &gateway, 0xBEEF).unwrap();

        assert_eq!(frame[0], PROTOCOL_VERSION);
        assert_eq!(&frame[1..3], &[0xEF, 0xBE]);
        assert_eq!(frame[3], PacketType::PushData as u8);
        assert_eq!(&frame[4..12], &MAC);
        assert_eq!(frame[12], b'{');
        assert_eq!(push_body(&frame).rxpk.len(), 1);
    }

    #[test]
    fn test_fixed_rxpk_date() {
        let gateway = GatewayIdentity::new(MAC).with_rxpk_date(1_488_000_000);
        let frame = encode_push_data(b"x", &gateway).unwrap();
        assert_eq!(push_body(&frame).rxpk[0].time.timestamp(), 1_488_000_000);
    }

    #[test]
    fn test_last_representable_rxpk_date() {
        let gateway = GatewayIdentity::new(MAC).with_rxpk_date(MAX_RXPK_DATE);
        let frame = encode_push_data(b"x", &gateway).unwrap();
        assert_eq!(push_body(&frame).rxpk[0].time.timestamp(), MAX_RXPK_DATE);
    }

    #[test]
    fn test_out_of_range_rxpk_date_is_an_error() {
        for date in [MAX_RXPK_DATE + 1, 10_000_000_000_000, i64::MAX] {
            let gateway = GatewayIdentity::new(MAC).with_rxpk_date(date);
            assert!(matches!(
                encode_push_data(b"x", &gateway),
                Err(SemtechError::TimestampOutOfRange(d)) if d == date
            ));
        }
    }

    #[test]
    fn test_non_positive_rxpk_date_uses_now() {
        for date in [None, Some(0), Some(-5)] {
            let gateway = GatewayIdentity {
                mac: MAC,
                rxpk_date: date,
            };
            let before = Utc::now();
            let frame = encode_push_data(b"x", &gateway).unwrap();
            let after = Utc::now();
            let time = push_body(&frame).rxpk[0].time;
            assert!(before <= time && time <= after, "{time} not in [{before}, {after}]");
        }
    }

    #[test]
    fn test_pull_data_layout() {
        let frame = encode_pull_data(&GatewayIdentity::new(MAC), 7);
        assert_eq!(frame.len(), 12);
        assert_eq!(&frame[..4], &[PROTOCOL_VERSION, 7, 0, PacketType::PullData as u8]);
        assert_eq!(&frame[4..], &MAC);
    }

    #[test]
    fn test_classify_acks_echo_token() {
        let push_ack = [2, 0x34, 0x12, 0x01];
        assert_eq!(
            classify(&push_ack).unwrap(),
            InboundPacket::PushAck {
                version: 2,
                token: 0x1234
            }
        );
        let pull_ack = [1, 0xFF, 0xFF, 0x04];
        assert_eq!(
            classify(&pull_ack).unwrap(),
            InboundPacket::PullAck {
                version: 1,
                token: u16::MAX
            }
        );
    }

    #[test]
    fn test_classify_ack_with_trailing_bytes_fails() {
        let result = classify(&[2, 0, 0, 0x01, 0xAA]);
        assert!(matches!(
            result,
            Err(SemtechError::UnexpectedLength {
                packet_type: PacketType::PushAck,
                expected: 4,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_classify_pull_resp() {
        // Join-accept: MHDR 0x20, 12 body bytes, 4 MIC bytes
        let mut phy = vec![0x20u8];
        phy.extend_from_slice(&[0u8; 12]);
        phy.extend_from_slice(&[9, 9, 9, 9]);
        let body = format!(
            r#"{{"txpk":{{"imme":false,"tmst":5000000,"freq":869.525,"rfch":0,"powe":14,"modu":"LORA","datr":"SF9BW125","codr":"4/5","ipol":true,"size":17,"data":"{}"}}}}"#,
            STANDARD.encode(&phy)
        );
        let packet = classify(&pull_resp_frame(0, &body)).unwrap();
        let InboundPacket::PullResponse(resp) = packet else {
            panic!("expected pull response");
        };
        assert_eq!(resp.txpk.size, Some(17));
        assert_eq!(resp.phy_payload.as_ref(), phy.as_slice());
        assert_eq!(resp.phy.unwrap().mtype, crate::phy::MType::JoinAccept);
    }

    #[test]
    fn test_pull_resp_with_undecodable_phy_is_not_an_error() {
        let frame = pull_resp_frame(3, r#"{"txpk":{"data":"AQ=="}}"#);
        let InboundPacket::PullResponse(resp) = classify(&frame).unwrap() else {
            panic!("expected pull response");
        };
        assert_eq!(resp.phy, Err(PhyError::TooShort(1)));
    }

    #[test]
    fn test_pull_resp_malformed_body() {
        assert!(matches!(
            classify(&pull_resp_frame(0, "not json")),
            Err(SemtechError::Json(_))
        ));
        assert!(matches!(
            classify(&pull_resp_frame(0, r#"{"txpk":{"data":"%%%"}}"#)),
            Err(SemtechError::Base64(_))
        ));
    }

    #[test]
    fn test_classify_short_and_bad_version() {
        assert!(matches!(
            classify(&[2, 0]),
            Err(SemtechError::InsufficientData {
                expected: 4,
                actual: 2
            })
        ));
        assert!(matches!(
            classify(&[9, 0, 0, 1]),
            Err(SemtechError::UnsupportedVersion(9))
        ));
    }

    #[traced_test]
    #[test]
    fn test_unknown_types_keep_classifying() {
        for packet_type in [0x00, 0x02, 0x05, 0x06, 0xFF] {
            let packet = handle_packet(&[2, 1, 0, packet_type]).unwrap();
            assert!(matches!(
                packet,
                InboundPacket::Unknown { packet_type: t, .. } if t == packet_type
            ));
        }
        assert!(logs_contain("gateway: unknown packet type"));
        assert!(handle_packet(&[2, 1, 0, 0x01]).is_ok());
    }

    #[traced_test]
    #[test]
    fn test_malformed_frame_is_logged() {
        assert!(handle_packet(&[2]).is_err());
        assert!(logs_contain("dropping malformed udp packet"));
        assert!(handle_packet(&[2, 0, 0, 0x04]).is_ok());
    }

    proptest! {
        #[test]
        fn size_field_matches_payload_len(payload in vec(any::<u8>(), 0..512)) {
            let frame = encode_push_data(&payload, &GatewayIdentity::new(MAC)).unwrap();
            prop_assert_eq!(push_body(&frame).rxpk[0].size, payload.len());
        }

        #[test]
        fn data_field_decodes_to_payload(payload in vec(any::<u8>(), 0..512)) {
            let frame = encode_push_data(&payload, &GatewayIdentity::new(MAC)).unwrap();
            let decoded = STANDARD.decode(&push_body(&frame).rxpk[0].data).unwrap();
            prop_assert_eq!(decoded, payload);
        }

        #[test]
        fn classify_never_panics(frame in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = classify(&frame);
        }
    }
}
