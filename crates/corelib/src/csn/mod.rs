//! Change sequence numbers.
//!
//! A [`Csn`] identifies one replicated change. CSNs are totally ordered by
//! `(timestamp, seq_num, origin)` and both fixed-width encodings preserve that
//! order: comparing two encodings byte-wise (or as strings) gives the same
//! answer as comparing the CSNs.

pub mod codec;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::ServerId;

pub use codec::CSN_BYTES;

/// Length of the hex string form: 16 digits of timestamp, 8 of sequence
/// number and 4 of origin id.
pub const CSN_HEX_LEN: usize = 28;

/// Change sequence number.
///
/// Field order matters: the derived ordering compares `timestamp`, then
/// `seq_num`, then `origin`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Csn {
    timestamp: u64,
    seq_num: u32,
    origin: ServerId,
}

impl Csn {
    /// Build a CSN from its three components.
    pub const fn new(timestamp: u64, seq_num: u32, origin: ServerId) -> Self {
        Self {
            timestamp,
            seq_num,
            origin,
        }
    }

    /// The oldest possible CSN for `origin`.
    ///
    /// Stands in for "nothing seen yet" when a freshness vector has no entry
    /// for an origin.
    pub const fn zero(origin: ServerId) -> Self {
        Self::new(0, 0, origin)
    }

    /// Milliseconds since the epoch at which the change was made.
    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Sequence number disambiguating changes made in the same millisecond.
    #[inline]
    pub fn seq_num(&self) -> u32 {
        self.seq_num
    }

    /// Server that originated the change.
    #[inline]
    pub fn origin(&self) -> ServerId {
        self.origin
    }

    /// True if `self` sorts strictly after `other`.
    #[inline]
    pub fn is_newer_than(&self, other: &Csn) -> bool {
        self.cmp(other) == Ordering::Greater
    }

    /// True if `self` sorts strictly before `other`.
    #[inline]
    pub fn is_older_than(&self, other: &Csn) -> bool {
        self.cmp(other) == Ordering::Less
    }

    /// Canonical lowercase hex form (28 characters).
    pub fn to_hex(&self) -> String {
        format!(
            "{:016x}{:08x}{:04x}",
            self.timestamp, self.seq_num, self.origin.0
        )
    }

    /// Parse the canonical hex form.
    ///
    /// Only lowercase digits are accepted so that every accepted string
    /// re-encodes to itself.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != CSN_HEX_LEN {
            return Err(Error::InvalidCsn(format!(
                "expected {} hex digits, got {}",
                CSN_HEX_LEN,
                s.len()
            )));
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(Error::InvalidCsn(format!("not lowercase hex: {s:?}")));
        }

        // Every byte is ASCII, so slicing on these offsets is safe.
        let parse = |range: std::ops::Range<usize>| {
            u64::from_str_radix(&s[range], 16).map_err(|e| Error::InvalidCsn(e.to_string()))
        };
        let timestamp = parse(0..16)?;
        let seq_num = parse(16..24)? as u32;
        let origin = parse(24..28)? as u16;

        Ok(Self::new(timestamp, seq_num, ServerId(origin)))
    }
}

impl fmt::Display for Csn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Csn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Csn({}, {}, {})",
            self.timestamp, self.seq_num, self.origin.0
        )
    }
}

impl FromStr for Csn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Csn {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::from_hex(&s)
    }
}

impl From<Csn> for String {
    fn from(csn: Csn) -> Self {
        csn.to_hex()
    }
}
