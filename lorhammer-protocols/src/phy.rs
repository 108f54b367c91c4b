//! ## lorhammer-protocols::phy
//! Best-effort LoRaWAN PHYPayload decoder.
//!
//! Splits `MHDR | MACPayload | MIC` and, for data frames, reads the frame
//! header. No decryption and no MIC verification happen here.

use bytes::Bytes;
use thiserror::Error;

const MHDR_LEN: usize = 1;
const MIC_LEN: usize = 4;
const FHDR_MIN_LEN: usize = 7;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum PhyError {
    #[error("PHY payload too short: {0} bytes")]
    TooShort(usize),
    #[error("Unsupported LoRaWAN major version {0}")]
    UnsupportedMajor(u8),
}

/// Message type from the top three bits of the MHDR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MType {
    JoinRequest,
    JoinAccept,
    UnconfirmedDataUp,
    UnconfirmedDataDown,
    ConfirmedDataUp,
    ConfirmedDataDown,
    RejoinRequest,
    Proprietary,
}

impl MType {
    fn from_mhdr(mhdr: u8) -> Self {
        match mhdr >> 5 {
            0 => MType::JoinRequest,
            1 => MType::JoinAccept,
            2 => MType::UnconfirmedDataUp,
            3 => MType::UnconfirmedDataDown,
            4 => MType::ConfirmedDataUp,
            5 => MType::ConfirmedDataDown,
            6 => MType::RejoinRequest,
            _ => MType::Proprietary,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(
            self,
            MType::UnconfirmedDataUp
                | MType::UnconfirmedDataDown
                | MType::ConfirmedDataUp
                | MType::ConfirmedDataDown
        )
    }
}

/// Frame header of a data message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub dev_addr: u32,
    pub f_ctrl: u8,
    pub f_cnt: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhyPayload {
    pub mtype: MType,
    pub major: u8,
    pub mac_payload: Bytes,
    pub mic: [u8; 4],
}

impl PhyPayload {
    /// Decodes a raw PHYPayload.
    pub fn decode(data: &[u8]) -> Result<Self, PhyError> {
        if data.len() < MHDR_LEN + MIC_LEN {
            return Err(PhyError::TooShort(data.len()));
        }
        let mhdr = data[0];
        let major = mhdr & 0x03;
        if major != 0 {
            return Err(PhyError::UnsupportedMajor(major));
        }

        let mic_start = data.len() - MIC_LEN;
        let mut mic = [0u8; MIC_LEN];
        mic.copy_from_slice(&data[mic_start..]);

        Ok(Self {
            mtype: MType::from_mhdr(mhdr),
            major,
            mac_payload: Bytes::copy_from_slice(&data[MHDR_LEN..mic_start]),
            mic,
        })
    }

    /// Returns the frame header for data messages long enough to carry one.
    pub fn frame_header(&self) -> Option<FrameHeader> {
        if !self.mtype.is_data() || self.mac_payload.len() < FHDR_MIN_LEN {
            return None;
        }
        let p = &self.mac_payload;
        Some(FrameHeader {
            dev_addr: u32::from_le_bytes([p[0], p[1], p[2], p[3]]),
            f_ctrl: p[4],
            f_cnt: u16::from_le_bytes([p[5], p[6]]),
        })
    }
}
