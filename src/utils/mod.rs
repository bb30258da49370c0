// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

/// Serde adapter for binary fields carried as standard base64 strings.
///
/// Use with `#[serde(with = "crate::utils::base64_bytes")]` on a `Vec<u8>`.
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid base64: {}", e)))
    }
}
