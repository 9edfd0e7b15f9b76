use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

/// Content checksum recorded on each stored version as `ALG:HEX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha256,
    Blake3,
}

impl ChecksumAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "SHA-256",
            ChecksumAlgorithm::Blake3 => "BLAKE3",
        }
    }

    pub fn checksum(&self, content: &[u8]) -> String {
        let digest = match self {
            ChecksumAlgorithm::Sha256 => hex::encode_upper(Sha256::digest(content)),
            ChecksumAlgorithm::Blake3 => hex::encode_upper(blake3::hash(content).as_bytes()),
        };
        format!("{}:{}", self.name(), digest)
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "SHA256" => Ok(ChecksumAlgorithm::Sha256),
            "BLAKE3" => Ok(ChecksumAlgorithm::Blake3),
            _ => Err(s.to_string()),
        }
    }
}
