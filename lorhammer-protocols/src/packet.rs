//! ## lorhammer-protocols::packet
//! JSON bodies carried by the packet-forwarder envelope.
//!
//! Uplinks travel as `{"rxpk": [...]}` inside PUSH_DATA frames, downlinks as
//! `{"txpk": {...}}` inside PULL_RESP frames. Radio metadata on simulated
//! uplinks is fixed: the load generator never measures a real channel.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// LoRa data rates are strings (`"SF7BW125"`), FSK data rates are bits/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataRate {
    Lora(String),
    Fsk(u32),
}

/// A received uplink as reported by a gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RxPacket {
    /// UTC time of reception.
    #[serde(with = "compact_time")]
    pub time: DateTime<Utc>,
    /// Concentrator internal counter in microseconds.
    pub tmst: u32,
    /// Centre frequency in MHz.
    pub freq: f64,
    /// IF channel.
    pub chan: u8,
    /// RF chain.
    pub rfch: u8,
    /// CRC status: 1 = OK, -1 = fail, 0 = no CRC.
    pub stat: i8,
    pub modu: String,
    pub datr: DataRate,
    pub codr: String,
    /// RSSI in dBm.
    pub rssi: i16,
    /// SNR in dB.
    pub lsnr: f64,
    /// PHY payload size in bytes.
    pub size: usize,
    /// Base64 encoded PHY payload.
    pub data: String,
}

impl RxPacket {
    pub const TMST: u32 = 123_456;
    pub const FREQ: f64 = 866.349812;
    pub const CHAN: u8 = 2;
    pub const RFCH: u8 = 0;
    pub const STAT: i8 = 1;
    pub const MODU: &'static str = "LORA";
    pub const DATR: &'static str = "SF7BW125";
    pub const CODR: &'static str = "4/6";
    pub const RSSI: i16 = -35;
    pub const LSNR: f64 = 5.1;

    /// Wraps a PHY payload with the simulated radio parameters.
    pub fn new(data: &[u8], time: DateTime<Utc>) -> Self {
        Self {
            time,
            tmst: Self::TMST,
            freq: Self::FREQ,
            chan: Self::CHAN,
            rfch: Self::RFCH,
            stat: Self::STAT,
            modu: Self::MODU.to_string(),
            datr: DataRate::Lora(Self::DATR.to_string()),
            codr: Self::CODR.to_string(),
            rssi: Self::RSSI,
            lsnr: Self::LSNR,
            size: data.len(),
            data: STANDARD.encode(data),
        }
    }
}

/// Body of a PUSH_DATA frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushDataPayload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rxpk: Vec<RxPacket>,
}

/// A downlink request sent by the network server.
///
/// Only `data` is required: the receive path shallow-parses downlinks and
/// hands the PHY bytes on, so missing radio fields are tolerated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxPacket {
    #[serde(default)]
    pub imme: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmst: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rfch: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub powe: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datr: Option<DataRate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipol: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u16>,
    pub data: String,
}

/// Body of a PULL_RESP frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRespPayload {
    pub txpk: TxPacket,
}

/// RFC 3339 with as many sub-second digits as needed, always `Z`.
mod compact_time {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
