//! End devices behind a simulated gateway.

use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;

use lorhammer_protocols::MType;

const FPORT: u8 = 1;

/// An activated device producing unconfirmed data uplinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub dev_addr: u32,
    pub f_cnt: u16,
    payload_len: usize,
}

impl Node {
    pub fn new(dev_addr: u32, payload_len: usize) -> Self {
        Self {
            dev_addr,
            f_cnt: 0,
            payload_len,
        }
    }

    pub fn random(payload_len: usize) -> Self {
        Self::new(rand::random(), payload_len)
    }

    /// Builds the next uplink PHY payload and advances the frame counter.
    ///
    /// The application payload and MIC are random; the network server under
    /// test is expected to forward what it receives, not to authenticate it.
    pub fn next_uplink(&mut self) -> Bytes {
        let mut rng = rand::rng();
        let mut phy = BytesMut::with_capacity(13 + self.payload_len);
        phy.put_u8((MType::UnconfirmedDataUp as u8) << 5);
        phy.put_u32_le(self.dev_addr);
        phy.put_u8(0); // FCtrl
        phy.put_u16_le(self.f_cnt);
        phy.put_u8(FPORT);
        for _ in 0..self.payload_len {
            phy.put_u8(rng.random());
        }
        phy.put_u32_le(rng.random());

        self.f_cnt = self.f_cnt.wrapping_add(1);
        phy.freeze()
    }
}
