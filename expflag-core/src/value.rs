//! Scalar Flag Values
//!
//! A flag holds exactly one of four scalar kinds. [`FlagValue`] carries the
//! payload together with its kind, and [`FlagType`] ties each Rust scalar to
//! its tag, its zero value, and its text parsing rule.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared kind of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagValueType {
    Bool,
    Int32,
    Uint32,
    Float,
}

impl FlagValueType {
    pub const ALL: [FlagValueType; 4] = [
        FlagValueType::Bool,
        FlagValueType::Int32,
        FlagValueType::Uint32,
        FlagValueType::Float,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagValueType::Bool => "bool",
            FlagValueType::Int32 => "int32",
            FlagValueType::Uint32 => "uint32",
            FlagValueType::Float => "float",
        }
    }

    /// Zero-equivalent value of this kind.
    pub fn default_value(&self) -> FlagValue {
        match self {
            FlagValueType::Bool => bool::default_value().wrap(),
            FlagValueType::Int32 => i32::default_value().wrap(),
            FlagValueType::Uint32 => u32::default_value().wrap(),
            FlagValueType::Float => f32::default_value().wrap(),
        }
    }

    /// Parse override text as this kind, degrading to the zero value.
    pub fn parse(&self, raw: &str) -> FlagValue {
        match self {
            FlagValueType::Bool => bool::parse(raw).wrap(),
            FlagValueType::Int32 => i32::parse(raw).wrap(),
            FlagValueType::Uint32 => u32::parse(raw).wrap(),
            FlagValueType::Float => f32::parse(raw).wrap(),
        }
    }
}

impl fmt::Display for FlagValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar flag value tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FlagValue {
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Float(f32),
}

impl FlagValue {
    pub fn value_type(&self) -> FlagValueType {
        match self {
            FlagValue::Bool(_) => FlagValueType::Bool,
            FlagValue::Int32(_) => FlagValueType::Int32,
            FlagValue::Uint32(_) => FlagValueType::Uint32,
            FlagValue::Float(_) => FlagValueType::Float,
        }
    }

    /// Project to `T`, or `None` if the kinds disagree.
    pub fn get<T: FlagType>(&self) -> Option<T> {
        T::unwrap(self)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.get()
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.get()
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.get()
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.get()
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(v) => write!(f, "{}", v),
            FlagValue::Int32(v) => write!(f, "{}", v),
            FlagValue::Uint32(v) => write!(f, "{}", v),
            FlagValue::Float(v) => write!(f, "{}", v),
        }
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for bool {}
    impl Sealed for i32 {}
    impl Sealed for u32 {}
    impl Sealed for f32 {}
}

/// A Rust scalar that can be stored in a flag.
///
/// Implemented for `bool`, `i32`, `u32` and `f32` only.
pub trait FlagType:
    Copy + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static + sealed::Sealed
{
    const TYPE: FlagValueType;

    fn to_type() -> FlagValueType {
        Self::TYPE
    }

    fn wrap(self) -> FlagValue;

    fn unwrap(value: &FlagValue) -> Option<Self>;

    fn default_value() -> Self;

    /// Convert a trimmed text token. Malformed text yields
    /// [`FlagType::default_value`]; no error is signalled.
    fn parse(raw: &str) -> Self;
}

impl FlagType for bool {
    const TYPE: FlagValueType = FlagValueType::Bool;

    fn wrap(self) -> FlagValue {
        FlagValue::Bool(self)
    }

    fn unwrap(value: &FlagValue) -> Option<Self> {
        match value {
            FlagValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn default_value() -> Self {
        false
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => Self::default_value(),
        }
    }
}

// Overflow and trailing garbage both fail `str::parse` for integers.
fn parse_integer<T: std::str::FromStr>(raw: &str) -> Option<T> {
    raw.parse().ok()
}

// `str::parse::<f32>` saturates out-of-range input to infinity instead of
// failing; only an explicit `inf`/`infinity` token may produce one.
fn parse_float(raw: &str) -> Option<f32> {
    let value = raw.parse::<f32>().ok()?;
    if value.is_infinite() {
        let literal = raw.trim_start_matches(['+', '-']).to_ascii_lowercase();
        if literal != "inf" && literal != "infinity" {
            return None;
        }
    }
    Some(value)
}

macro_rules! impl_numeric_flag_type {
    ($ty:ty, $variant:ident, $zero:expr, $parse:path) => {
        impl FlagType for $ty {
            const TYPE: FlagValueType = FlagValueType::$variant;

            fn wrap(self) -> FlagValue {
                FlagValue::$variant(self)
            }

            fn unwrap(value: &FlagValue) -> Option<Self> {
                match value {
                    FlagValue::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            fn default_value() -> Self {
                $zero
            }

            fn parse(raw: &str) -> Self {
                $parse(raw).unwrap_or_else(Self::default_value)
            }
        }
    };
}

impl_numeric_flag_type!(i32, Int32, 0, parse_integer);
impl_numeric_flag_type!(u32, Uint32, 0u32, parse_integer);
impl_numeric_flag_type!(f32, Float, 0.0f32, parse_float);

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        value.wrap()
    }
}

impl From<i32> for FlagValue {
    fn from(value: i32) -> Self {
        value.wrap()
    }
}

impl From<u32> for FlagValue {
    fn from(value: u32) -> Self {
        value.wrap()
    }
}

impl From<f32> for FlagValue {
    fn from(value: f32) -> Self {
        value.wrap()
    }
}
