//! Core data types shared by every validation stage

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Protocol generation understood by this engine
pub const PROTOCOL_VERSION: u32 = 1;

/// Platform credits
pub type Credits = u64;

/// Credits that may carry debt
pub type SignedCredits = i64;

/// Entity revision
pub type Revision = u64;

/// Milliseconds since the unix epoch
pub type TimestampMillis = u64;

/// Public key id, unique within one identity
pub type KeyId = u32;

fn serialize_bytes<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() {
        serializer.serialize_str(&hex::encode(bytes))
    } else {
        serializer.serialize_bytes(bytes)
    }
}

fn deserialize_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    if deserializer.is_human_readable() {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded).map_err(de::Error::custom)
    } else {
        <Vec<u8>>::deserialize(deserializer)
    }
}

/// 32-byte identifier of identities, data contracts and documents
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(pub [u8; 32]);

impl Identifier {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Parse from a hex string
    pub fn from_hex(encoded: &str) -> Option<Self> {
        let bytes = hex::decode(encoded).ok()?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", hex::encode(self.0))
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_bytes(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = deserialize_bytes(deserializer)?;
        Identifier::from_slice(&bytes)
            .ok_or_else(|| de::Error::invalid_length(bytes.len(), &"32 bytes"))
    }
}

/// Arbitrary binary payload (signatures, public key data)
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinaryData(pub Vec<u8>);

impl BinaryData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BinaryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinaryData({})", hex::encode(&self.0))
    }
}

impl Serialize for BinaryData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_bytes(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for BinaryData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_bytes(deserializer).map(BinaryData)
    }
}

/// Blake3 hash of a transition's signable payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionHash(pub [u8; 32]);

impl fmt::Display for TransitionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Header of the latest committed platform block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub time: DateTime<Utc>,
}

impl BlockHeader {
    pub fn new(height: u64, time: DateTime<Utc>) -> Self {
        Self { height, time }
    }

    /// Create a header from a millisecond timestamp
    pub fn from_millis(height: u64, time_ms: TimestampMillis) -> Self {
        let time = Utc
            .timestamp_millis_opt(time_ms as i64)
            .single()
            .unwrap_or_default();
        Self { height, time }
    }

    /// Block time in milliseconds, clamped at the epoch
    pub fn time_ms(&self) -> TimestampMillis {
        self.time.timestamp_millis().max(0) as TimestampMillis
    }
}

/// Closed acceptance window around a block time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: TimestampMillis,
    pub end: TimestampMillis,
}

impl TimeWindow {
    /// Window of `width_ms` on either side of `now`
    pub fn around(now: TimestampMillis, width_ms: u64) -> Self {
        Self {
            start: now.saturating_sub(width_ms),
            end: now.saturating_add(width_ms),
        }
    }

    pub fn contains(&self, timestamp: TimestampMillis) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}
