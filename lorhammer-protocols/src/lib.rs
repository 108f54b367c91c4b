//! # Lorhammer Protocol Codecs
//!
//! Crate for building and classifying Semtech packet-forwarder frames, plus a
//! best-effort LoRaWAN PHY decoder for downlinks.

pub mod packet;
pub mod phy;
pub mod semtech;

pub use packet::{DataRate, PullRespPayload, PushDataPayload, RxPacket, TxPacket};
pub use phy::{MType, PhyError, PhyPayload};
pub use semtech::{
    classify, encode_pull_data, encode_push_data, encode_push_data_with_token, handle_packet,
    random_token, GatewayIdentity, InboundPacket, PacketType, PullResponse, SemtechError,
    MAX_RXPK_DATE,
};
