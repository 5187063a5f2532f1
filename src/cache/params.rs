//! Parameter Signature Module
//!
//! Defines the auxiliary values that, together with the string key, identify
//! a cache entry.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

// == Param Value ==
/// A single slot of a parameter signature.
///
/// Signed integers of every width collapse into `Int` and unsigned ones into
/// `UInt`, so `1i32` and `1i64` name the same slot while `1i32` and `1u32`
/// do not.
#[derive(Debug, Clone, Serialize)]
pub enum ParamValue {
    /// An undefined slot, equal only to another `Null`
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
}

impl ParamValue {
    /// Returns true for the undefined slot.
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

/// Bit pattern used for float equality and hashing: `-0.0 == 0.0` and every
/// NaN equals every other NaN.
fn float_bits(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        use ParamValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (UInt(a), UInt(b)) => a == b,
            (Float(a), Float(b)) => float_bits(*a) == float_bits(*b),
            (Char(a), Char(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

impl Hash for ParamValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ParamValue::Null => {}
            ParamValue::Bool(v) => v.hash(state),
            ParamValue::Int(v) => v.hash(state),
            ParamValue::UInt(v) => v.hash(state),
            ParamValue::Float(v) => float_bits(*v).hash(state),
            ParamValue::Char(v) => v.hash(state),
            ParamValue::Str(v) => v.hash(state),
            ParamValue::Bytes(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => f.write_str("null"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::UInt(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Char(v) => write!(f, "{v:?}"),
            ParamValue::Str(v) => write!(f, "{v:?}"),
            ParamValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

// == Conversions ==
macro_rules! impl_from_as {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for ParamValue {
                fn from(value: $source) -> Self {
                    ParamValue::$variant(value as $target)
                }
            }
        )+
    };
}

impl_from_as!(Int, i64, i8, i16, i32, i64, isize);
impl_from_as!(UInt, u64, u8, u16, u32, u64, usize);
impl_from_as!(Float, f64, f32, f64);

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<char> for ParamValue {
    fn from(value: char) -> Self {
        ParamValue::Char(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Str(value.clone())
    }
}

impl From<Vec<u8>> for ParamValue {
    fn from(value: Vec<u8>) -> Self {
        ParamValue::Bytes(value)
    }
}

impl From<&[u8]> for ParamValue {
    fn from(value: &[u8]) -> Self {
        ParamValue::Bytes(value.to_vec())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

// == Params ==
/// An ordered parameter signature.
///
/// An absent signature and an empty one are the same thing: both are
/// represented by an empty `Params`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Params(Vec<ParamValue>);

impl Params {
    /// The empty signature, used when an entry is identified by key alone.
    pub fn none() -> Self {
        Self::default()
    }

    /// Number of slots in the signature.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[ParamValue] {
        &self.0
    }

    // == Signature Equality ==
    /// Compares two signatures slot by slot.
    ///
    /// Signatures of different length never match. A `Null` slot matches only
    /// a `Null` slot at the same position; every other slot compares by value.
    pub fn signature_eq(&self, other: &Params) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }

        self.0.iter().zip(&other.0).all(|(a, b)| match (a, b) {
            (ParamValue::Null, ParamValue::Null) => true,
            (ParamValue::Null, _) | (_, ParamValue::Null) => false,
            (a, b) => a == b,
        })
    }
}

impl PartialEq for Params {
    fn eq(&self, other: &Self) -> bool {
        self.signature_eq(other)
    }
}

impl Eq for Params {}

impl Hash for Params {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            value.hash(state);
        }
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

impl From<Vec<ParamValue>> for Params {
    fn from(values: Vec<ParamValue>) -> Self {
        Params(values)
    }
}

impl From<Option<Vec<ParamValue>>> for Params {
    fn from(values: Option<Vec<ParamValue>>) -> Self {
        Params(values.unwrap_or_default())
    }
}

impl From<&[ParamValue]> for Params {
    fn from(values: &[ParamValue]) -> Self {
        Params(values.to_vec())
    }
}

impl From<&Params> for Params {
    fn from(params: &Params) -> Self {
        params.clone()
    }
}

impl FromIterator<ParamValue> for Params {
    fn from_iter<I: IntoIterator<Item = ParamValue>>(iter: I) -> Self {
        Params(iter.into_iter().collect())
    }
}

/// Builds a [`Params`] signature from values convertible into [`ParamValue`].
///
/// ```
/// use param_cache::{params, Params, ParamValue};
///
/// let signature = params!["region", 42, None::<u32>];
/// assert_eq!(signature.values()[2], ParamValue::Null);
/// assert_eq!(params![], Params::none());
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::none()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Params::from(vec![$($crate::ParamValue::from($value)),+])
    };
}
