// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Delta data model.
//!
//! This is the shape the host telemetry framework hands in and expects
//! back out; the core only cares that it round-trips through path
//! encoding, serialization, compression and encryption. `source` is never
//! `None` once a delta has passed through [`crate::pathdict`]'s
//! normalization: a missing or `null` source is coerced to an empty map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One context-scoped set of timestamped updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub context: String,
    pub updates: Vec<Update>,
}

/// A single timestamped batch of values from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Map<String, Value>>,
    pub timestamp: String,
    #[serde(rename = "$source", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub values: Vec<PathValue>,
}

/// A single path/value pair. `path` is a sum: a dotted string name, or a
/// dictionary id once path-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValue {
    pub path: PathKey,
    pub value: Value,
}

/// `PathKey` is a sum type so that encode/decode can round-trip through
/// a single `serde_json::Value`-shaped field (`Name` serializes as a JSON
/// string, `Id` as a JSON number) without a wrapper struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    Name(String),
    Id(u16),
}

impl Serialize for PathKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Name(name) => serializer.serialize_str(name),
            Self::Id(id) => serializer.serialize_u16(*id),
        }
    }
}

impl<'de> Deserialize<'de> for PathKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => Ok(Self::Name(s)),
            Value::Number(n) => {
                let id = n
                    .as_u64()
                    .and_then(|v| u16::try_from(v).ok())
                    .ok_or_else(|| serde::de::Error::custom("path id out of u16 range"))?;
                Ok(Self::Id(id))
            }
            other => Err(serde::de::Error::custom(format!(
                "path must be a string or integer, got {other:?}"
            ))),
        }
    }
}

impl PathKey {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(s) => Some(s),
            Self::Id(_) => None,
        }
    }

    /// Human-readable label used to key per-path analytics regardless of
    /// whether the path is still a dotted name or has been dictionary-encoded.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Id(id) => format!("#{id}"),
        }
    }
}

impl Delta {
    /// Coerce every update's `source` to `Some(empty map)` when it is
    /// `None`, without otherwise touching the delta. Used on both the
    /// encode and decode sides so the receive path never observes a null
    /// source.
    pub fn with_source_normalized(&self) -> Self {
        let mut out = self.clone();
        for update in &mut out.updates {
            if update.source.is_none() {
                update.source = Some(Map::new());
            }
        }
        out
    }
}
