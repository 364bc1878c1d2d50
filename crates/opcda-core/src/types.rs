// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value, quality and item snapshot types.
//!
//! These types describe what a cached read produces: a dynamically typed
//! [`Value`], a 16-bit OPC DA [`Quality`] and a timestamp, bundled as an
//! [`Item`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Value
// =============================================================================

/// Dynamically typed scalar exchanged with the server.
///
/// Mirrors the variant types an OPC DA automation server hands out.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// No value (`VT_EMPTY`).
    #[default]
    Empty,

    /// Boolean value.
    Bool(bool),

    /// Signed byte.
    I8(i8),

    /// Unsigned byte.
    U8(u8),

    /// 16-bit signed integer.
    I16(i16),

    /// 16-bit unsigned integer.
    U16(u16),

    /// 32-bit signed integer.
    I32(i32),

    /// 32-bit unsigned integer.
    U32(u32),

    /// 64-bit signed integer.
    I64(i64),

    /// 64-bit unsigned integer.
    U64(u64),

    /// 32-bit float.
    F32(f32),

    /// 64-bit double.
    F64(f64),

    /// String value.
    String(String),

    /// Date/time value.
    DateTime(DateTime<Utc>),

    /// Array of values.
    Array(Vec<Value>),
}

impl Value {
    /// Returns `true` if this is the empty value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the variant name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::Array(_) => "array",
        }
    }

    /// Returns the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => self.integral().map(|v| v != 0),
        }
    }

    /// Returns the value as an i64 (integers are widened, floats truncated).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(v) => Some(i64::from(*v)),
            Self::F32(v) => Some(*v as i64),
            Self::F64(v) => Some(*v as i64),
            _ => self.integral().and_then(|v| i64::try_from(v).ok()),
        }
    }

    /// Returns the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::F32(v) => Some(f64::from(*v)),
            Self::F64(v) => Some(*v),
            _ => self.integral().map(|v| v as f64),
        }
    }

    /// Returns the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns integer variants widened to i128, `None` for everything else.
    fn integral(&self) -> Option<i128> {
        match self {
            Self::I8(v) => Some(i128::from(*v)),
            Self::U8(v) => Some(i128::from(*v)),
            Self::I16(v) => Some(i128::from(*v)),
            Self::U16(v) => Some(i128::from(*v)),
            Self::I32(v) => Some(i128::from(*v)),
            Self::U32(v) => Some(i128::from(*v)),
            Self::I64(v) => Some(i128::from(*v)),
            Self::U64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "<empty>"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Array(v) => write!(f, "[{} items]", v.len()),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    DateTime<Utc> => DateTime,
    Vec<Value> => Array,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

// =============================================================================
// Quality
// =============================================================================

/// OPC DA quality code (the `VT_I2` returned next to every value).
///
/// Bits 7..6 carry the major state: `11` good, `01` uncertain, `00` bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub i16);

impl Quality {
    /// Good (`0xC0`).
    pub const GOOD: Quality = Quality(0xC0);

    /// Uncertain (`0x40`).
    pub const UNCERTAIN: Quality = Quality(0x40);

    /// Bad (`0x00`).
    pub const BAD: Quality = Quality(0x00);

    /// Code substituted when the driver reports something unusable.
    pub const UNKNOWN: Quality = Quality(0);

    const STATUS_MASK: i16 = 0xC0;

    /// Normalizes a driver-reported quality to a signed 16-bit code.
    ///
    /// Integer variants inside the `i16` range are narrowed. Anything else,
    /// including out-of-range integers, yields [`Quality::UNKNOWN`].
    pub fn normalize(raw: &Value) -> Self {
        match raw {
            Value::I16(v) => Self(*v),
            other => other
                .integral()
                .and_then(|v| i16::try_from(v).ok())
                .map(Self)
                .unwrap_or(Self::UNKNOWN),
        }
    }

    /// Returns the raw code.
    #[inline]
    pub fn code(self) -> i16 {
        self.0
    }

    /// Returns `true` for good quality.
    #[inline]
    pub fn is_good(self) -> bool {
        self.0 & Self::STATUS_MASK == Self::GOOD.0
    }

    /// Returns `true` for uncertain quality.
    #[inline]
    pub fn is_uncertain(self) -> bool {
        self.0 & Self::STATUS_MASK == Self::UNCERTAIN.0
    }

    /// Returns `true` for bad quality.
    #[inline]
    pub fn is_bad(self) -> bool {
        self.0 & Self::STATUS_MASK == Self::BAD.0
    }
}

impl From<i16> for Quality {
    fn from(v: i16) -> Self {
        Self(v)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_good() {
            "good"
        } else if self.is_uncertain() {
            "uncertain"
        } else {
            "bad"
        };
        write!(f, "{} ({state})", self.0)
    }
}

// =============================================================================
// Item
// =============================================================================

/// Snapshot produced by one read: value, quality and timestamp.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Item {
    /// The value.
    pub value: Value,

    /// Normalized quality code.
    pub quality: Quality,

    /// Timestamp reported by the server.
    pub timestamp: DateTime<Utc>,
}

impl Item {
    /// Creates a new item.
    pub fn new(value: impl Into<Value>, quality: Quality, timestamp: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            quality,
            timestamp,
        }
    }

    /// Returns `true` for the zero item handed out when a read did not happen.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} {} {}}}",
            self.value,
            self.quality.0,
            self.timestamp.to_rfc3339()
        )
    }
}

// =============================================================================
// ServerState
// =============================================================================

/// State reported by the automation server object (`OPCServerState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// Server is running normally.
    Running,
    /// Vendor specific fatal error.
    Failed,
    /// Running but without configuration.
    NoConfig,
    /// Temporarily suspended.
    Suspended,
    /// Test mode.
    Test,
    /// Not connected.
    Disconnected,
    /// A code not defined by the OPC automation interface.
    Unknown(i32),
}

impl ServerState {
    /// Code of the running state.
    pub const RUNNING_CODE: i32 = 1;

    /// Maps a raw state code.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Running,
            2 => Self::Failed,
            3 => Self::NoConfig,
            4 => Self::Suspended,
            5 => Self::Test,
            6 => Self::Disconnected,
            other => Self::Unknown(other),
        }
    }

    /// Returns the raw state code.
    pub fn code(self) -> i32 {
        match self {
            Self::Running => 1,
            Self::Failed => 2,
            Self::NoConfig => 3,
            Self::Suspended => 4,
            Self::Test => 5,
            Self::Disconnected => 6,
            Self::Unknown(code) => code,
        }
    }

    /// Returns `true` if the server is running.
    #[inline]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Failed => write!(f, "Failed"),
            Self::NoConfig => write!(f, "NoConfig"),
            Self::Suspended => write!(f, "Suspended"),
            Self::Test => write!(f, "Test"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Unknown(code) => write!(f, "Unknown({code})"),
        }
    }
}

// =============================================================================
// DataSource
// =============================================================================

/// Where a synchronous read takes its value from (`OPCDataSource`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// The server's cache.
    #[default]
    Cache,
    /// A live poll of the device.
    Device,
}

impl DataSource {
    /// Returns the automation constant.
    pub fn code(self) -> i32 {
        match self {
            Self::Cache => 1,
            Self::Device => 2,
        }
    }
}

// =============================================================================
// ConnectionState
// =============================================================================

/// Observable state of a connection, derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No running server behind the session.
    #[default]
    Disconnected,
    /// Server reports the running state.
    Connected,
    /// A reconnect loop is in progress.
    Recovering,
}

impl ConnectionState {
    /// Returns `true` if connected.
    #[inline]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
            Self::Recovering => write!(f, "Recovering"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_normalize_passes_i16_through() {
        assert_eq!(Quality::normalize(&Value::I16(192)), Quality::GOOD);
        assert_eq!(Quality::normalize(&Value::I16(-5)), Quality(-5));
    }

    #[test]
    fn test_quality_normalize_narrows_wider_integers() {
        assert_eq!(Quality::normalize(&Value::I32(216)), Quality(216));
        assert_eq!(Quality::normalize(&Value::I32(-32768)), Quality(i16::MIN));
        assert_eq!(Quality::normalize(&Value::I32(32767)), Quality(i16::MAX));
        assert_eq!(Quality::normalize(&Value::U16(64)), Quality::UNCERTAIN);
    }

    #[test]
    fn test_quality_normalize_out_of_range_is_unknown() {
        assert_eq!(Quality::normalize(&Value::I32(40000)), Quality::UNKNOWN);
        assert_eq!(Quality::normalize(&Value::I32(-40000)), Quality::UNKNOWN);
        assert_eq!(Quality::normalize(&Value::U64(u64::MAX)), Quality::UNKNOWN);
        assert_eq!(Quality::normalize(&Value::F64(192.0)), Quality::UNKNOWN);
        assert_eq!(Quality::normalize(&Value::Empty), Quality::UNKNOWN);
    }

    #[test]
    fn test_quality_status_bits() {
        assert!(Quality::GOOD.is_good());
        assert!(Quality(0xD8).is_good());
        assert!(Quality::UNCERTAIN.is_uncertain());
        assert!(Quality::BAD.is_bad());
        assert!(Quality(0x18).is_bad());
        assert_eq!(Quality::GOOD.to_string(), "192 (good)");
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::I32(42).as_i64(), Some(42));
        assert_eq!(Value::U8(7).as_f64(), Some(7.0));
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::I16(0).as_bool(), Some(false));
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
        assert_eq!(Value::from("hello").as_str(), Some("hello"));
        assert!(Value::default().is_empty());
        assert_eq!(Value::F32(1.5).type_name(), "f32");
    }

    #[test]
    fn test_item_zero_value() {
        let zero = Item::default();
        assert!(zero.is_zero());
        assert!(zero.value.is_empty());
        assert_eq!(zero.quality, Quality::UNKNOWN);

        let item = Item::new(3.5f64, Quality::GOOD, Utc::now());
        assert!(!item.is_zero());
    }

    #[test]
    fn test_server_state_codes() {
        assert_eq!(ServerState::from_code(ServerState::RUNNING_CODE), ServerState::Running);
        assert!(ServerState::from_code(1).is_running());
        assert_eq!(ServerState::from_code(6), ServerState::Disconnected);
        assert_eq!(ServerState::from_code(42), ServerState::Unknown(42));
        assert_eq!(ServerState::Suspended.code(), 4);
        assert_eq!(DataSource::Cache.code(), 1);
    }
}
