//! Fixed-width identifiers for contracts, hosts and sectors
//!
//! All three are 32-byte values rendered as lowercase hex. Contract and host
//! identifiers carry a short prefix in their display form so they are easy to
//! tell apart in logs; sector roots are rendered bare.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing a hex identifier fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{input}': {reason}")]
pub struct ParseIdError {
    /// Identifier kind that was being parsed
    pub kind: &'static str,
    /// Rejected input
    pub input: String,
    /// Why the input was rejected
    pub reason: String,
}

fn parse_hex32(kind: &'static str, prefix: &str, input: &str) -> Result<[u8; 32], ParseIdError> {
    let stripped = if prefix.is_empty() {
        input
    } else {
        input.strip_prefix(prefix).unwrap_or(input)
    };
    let bytes = hex::decode(stripped).map_err(|e| ParseIdError {
        kind,
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| ParseIdError {
        kind,
        input: input.to_string(),
        reason: format!("expected 32 bytes, got {}", bytes.len()),
    })
}

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Create from raw bytes
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Borrow the raw bytes
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// True for the all-zero value, used as "unset"
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(&self.0[..8]))
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex32($kind, $prefix, s).map(Self)
            }
        }
    };
}

hex_id!(
    /// Identifier of a file contract, stable for the contract's lifetime
    ContractId,
    "contract id",
    "contract-"
);

hex_id!(
    /// Public key of a storage host
    HostKey,
    "host key",
    "host-"
);

hex_id!(
    /// 32-byte content hash; used for sector roots and block ids
    Hash256,
    "hash",
    ""
);

/// Merkle root of a single sector
pub type SectorRoot = Hash256;
