use crate::error::Error;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// SHA-1, 160-bit output. Digest format of existing catalogs.
    #[default]
    Sha1,
    /// BLAKE3, 256-bit output.
    Blake3,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha1",
            Algorithm::Blake3 => "blake3",
        }
    }

    /// Length of the lowercase hex digest this algorithm produces.
    pub fn hex_len(&self) -> usize {
        match self {
            Algorithm::Sha1 => 40,
            Algorithm::Blake3 => 64,
        }
    }

    pub(crate) fn accumulator(&self) -> Accumulator {
        match self {
            Algorithm::Sha1 => Accumulator::Sha1(Sha1::new()),
            Algorithm::Blake3 => Accumulator::Blake3(Box::new(blake3::Hasher::new())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(Algorithm::Sha1),
            "blake3" => Ok(Algorithm::Blake3),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Incremental hash state for one file.
pub(crate) enum Accumulator {
    Sha1(Sha1),
    Blake3(Box<blake3::Hasher>),
}

impl Accumulator {
    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            Accumulator::Sha1(h) => h.update(data),
            Accumulator::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub(crate) fn finalize_hex(self) -> String {
        match self {
            Accumulator::Sha1(h) => hex::encode(h.finalize()),
            Accumulator::Blake3(h) => hex::encode(h.finalize().as_bytes()),
        }
    }
}
