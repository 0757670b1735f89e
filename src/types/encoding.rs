// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Serde helpers for opaque byte fields.

/// Encodes `Vec<u8>` fields as standard base64 strings.
///
/// Use with `#[serde(with = "crate::types::encoding::base64_bytes")]`.
pub mod base64_bytes {
    use alloc::string::String;
    use alloc::vec::Vec;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(bytes: T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(D::Error::custom)
    }
}
