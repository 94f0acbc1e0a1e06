//! Replication server endpoints.
//!
//! Topology updates carry RS addresses as free-form `host:port` strings. The
//! local configuration lists the same servers, possibly spelled differently
//! (case, `localhost` vs `127.0.0.1`). [`ServerUrl`] parses both sides so
//! they can be compared.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Parsed `host:port` address of a replication server.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServerUrl {
    host: String,
    port: u16,
}

impl ServerUrl {
    /// Parse `host:port`, `[v6-addr]:port` included.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidUrl(s.to_string());

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
            let port = after.strip_prefix(':').ok_or_else(invalid)?;
            (host, port)
        } else {
            s.rsplit_once(':').ok_or_else(invalid)?
        };

        if host.is_empty() || (host.contains(':') && !s.starts_with('[')) {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        if port == 0 {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_ascii_lowercase(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// True if the host names the loopback interface.
    pub fn is_loopback(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }

    /// True if both addresses designate the same server instance.
    ///
    /// Loopback spellings are interchangeable; anything else must match
    /// host (case-insensitively) and port.
    pub fn is_equivalent_to(&self, other: &ServerUrl) -> bool {
        if self.port != other.port {
            return false;
        }
        self.host == other.host || (self.is_loopback() && other.is_loopback())
    }
}

impl FromStr for ServerUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ServerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Compare two raw addresses; unparsable input never matches.
pub fn is_same_server_url(a: &str, b: &str) -> bool {
    match (ServerUrl::parse(a), ServerUrl::parse(b)) {
        (Ok(a), Ok(b)) => a.is_equivalent_to(&b),
        _ => false,
    }
}
