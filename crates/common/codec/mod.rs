//! Wire encodings for [`BlockAccessList`].
//!
//! Two profiles share the same data model and field order:
//!
//! * [`Profile::Ssz`]: little-endian fixed-width integers and a container
//!   layout where variable-size fields are reached through 4-byte offsets.
//!   Lists carry an element count and code a byte length, so truncated or
//!   extended buffers are rejected.
//! * [`Profile::Rlp`]: every structure is an RLP list of its fields, integers
//!   are minimal big-endian and balances are encoded as integers.
//!
//! Encoding never reorders anything, so `decode(encode(x)) == x` holds for
//! any list, canonical or not. Decoding validates structure, widths and
//! list limits, then code size limits and account uniqueness.

use std::{fmt, str::FromStr};

use ethbal_rlp::encode::RLPEncode;
use ethbal_ssz::encode::SSZEncode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::BalError, types::BlockAccessList};

mod rlp;
mod ssz;

pub use rlp::RlpCodec;
pub use ssz::SszCodec;

pub trait BalCodec {
    const PROFILE: Profile;

    fn encode(bal: &BlockAccessList) -> Vec<u8>;

    fn decode(bytes: &[u8]) -> Result<BlockAccessList, BalError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Tree/offset layout.
    Ssz,
    /// Flat nested-list layout.
    Rlp,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::Ssz, Profile::Rlp];

    pub fn name(self) -> &'static str {
        match self {
            Profile::Ssz => "ssz",
            Profile::Rlp => "rlp",
        }
    }

    pub fn encode(self, bal: &BlockAccessList) -> Vec<u8> {
        match self {
            Profile::Ssz => SszCodec::encode(bal),
            Profile::Rlp => RlpCodec::encode(bal),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<BlockAccessList, BalError> {
        let result = match self {
            Profile::Ssz => SszCodec::decode(bytes),
            Profile::Rlp => RlpCodec::decode(bytes),
        };
        if let Err(err) = &result {
            debug!(profile = self.name(), len = bytes.len(), %err, "Rejected block access list");
        }
        result
    }

    /// Encodes a bare list of components, used to measure each component
    /// of a block on its own.
    #[allow(clippy::ptr_arg)]
    pub fn encode_list<T: SSZEncode + RLPEncode>(self, items: &Vec<T>) -> Vec<u8> {
        match self {
            Profile::Ssz => SSZEncode::encode_to_vec(items),
            Profile::Rlp => RLPEncode::encode_to_vec(items),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssz" | "a" => Ok(Profile::Ssz),
            "rlp" | "b" => Ok(Profile::Rlp),
            other => Err(format!("unknown profile '{other}', expected 'ssz' or 'rlp'")),
        }
    }
}

pub(crate) fn malformed(offset: usize, reason: impl fmt::Display) -> BalError {
    BalError::MalformedEncoding {
        offset,
        reason: reason.to_string(),
    }
}
