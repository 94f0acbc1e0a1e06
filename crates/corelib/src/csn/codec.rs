//! Fixed-width binary encoding of CSNs.
//!
//! Layout (big-endian, 14 bytes): timestamp `u64`, sequence number `u32`,
//! origin `u16`. Big-endian keeps byte-wise comparison in step with CSN order.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::Csn;
use crate::error::{Error, Result};
use crate::node::ServerId;

/// Encoded size of a CSN in bytes.
pub const CSN_BYTES: usize = 14;

impl Csn {
    /// Append the binary form to `buf`.
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64(self.timestamp);
        buf.put_u32(self.seq_num);
        buf.put_u16(self.origin.0);
    }

    /// Consume one binary CSN from the front of `buf`.
    pub fn read_from<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < CSN_BYTES {
            return Err(Error::InvalidCsn(format!(
                "need {} bytes, {} remaining",
                CSN_BYTES,
                buf.remaining()
            )));
        }
        let timestamp = buf.get_u64();
        let seq_num = buf.get_u32();
        let origin = ServerId(buf.get_u16());
        Ok(Csn::new(timestamp, seq_num, origin))
    }

    /// Binary form as an owned buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(CSN_BYTES);
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Decode a slice holding exactly one CSN.
    pub fn from_slice(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CSN_BYTES {
            return Err(Error::InvalidCsn(format!(
                "expected {} bytes, got {}",
                CSN_BYTES,
                bytes.len()
            )));
        }
        Self::read_from(&mut bytes)
    }
}
