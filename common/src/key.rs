// Keys and signature requirements
// Signature cryptography is out of scope: a transaction carries the set
// of primitive keys that signed it, and a key is satisfied when its
// structure is covered by that set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const ED25519_KEY_LEN: usize = 32;
pub const ECDSA_SECP256K1_COMPRESSED_KEY_LEN: usize = 33;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Ed25519(#[serde(with = "hex::serde")] Vec<u8>),
    EcdsaSecp256k1(#[serde(with = "hex::serde")] Vec<u8>),
    KeyList(Vec<Key>),
    Threshold { threshold: u32, keys: Vec<Key> },
}

impl Key {
    /// Structural validity: primitive key lengths, non-empty lists and
    /// thresholds in `1..=keys.len()`
    pub fn is_valid(&self) -> bool {
        match self {
            Key::Ed25519(bytes) => bytes.len() == ED25519_KEY_LEN,
            Key::EcdsaSecp256k1(bytes) => bytes.len() == ECDSA_SECP256K1_COMPRESSED_KEY_LEN,
            Key::KeyList(keys) => !keys.is_empty() && keys.iter().all(Key::is_valid),
            Key::Threshold { threshold, keys } => {
                *threshold >= 1
                    && (*threshold as usize) <= keys.len()
                    && keys.iter().all(Key::is_valid)
            }
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Key::Ed25519(_) | Key::EcdsaSecp256k1(_))
    }

    /// Whether the set of primitive signing keys satisfies this key
    pub fn is_satisfied_by(&self, signatories: &BTreeSet<Key>) -> bool {
        match self {
            Key::Ed25519(_) | Key::EcdsaSecp256k1(_) => signatories.contains(self),
            Key::KeyList(keys) => keys.iter().all(|k| k.is_satisfied_by(signatories)),
            Key::Threshold { threshold, keys } => {
                let satisfied = keys
                    .iter()
                    .filter(|k| k.is_satisfied_by(signatories))
                    .count();
                satisfied >= *threshold as usize
            }
        }
    }

    /// Decode a primitive key used as an account alias
    pub fn from_alias_bytes(bytes: &[u8]) -> Option<Key> {
        match bytes.len() {
            ED25519_KEY_LEN => Some(Key::Ed25519(bytes.to_vec())),
            ECDSA_SECP256K1_COMPRESSED_KEY_LEN if matches!(bytes[0], 0x02 | 0x03) => {
                Some(Key::EcdsaSecp256k1(bytes.to_vec()))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Ed25519(bytes) => write!(f, "Ed25519({})", hex::encode(bytes)),
            Key::EcdsaSecp256k1(bytes) => write!(f, "EcdsaSecp256k1({})", hex::encode(bytes)),
            Key::KeyList(keys) => f.debug_list().entries(keys).finish(),
            Key::Threshold { threshold, keys } => {
                write!(f, "Threshold({}, ", threshold)?;
                f.debug_list().entries(keys).finish()?;
                f.write_str(")")
            }
        }
    }
}
