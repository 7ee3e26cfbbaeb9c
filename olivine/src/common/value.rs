use crate::document::Document;
use crate::olivine_id::OlivineId;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

/// A dynamically typed value stored inside a [`Document`].
///
/// Numeric variants compare and hash by numeric value rather than by
/// representation, so `Value::I32(7)`, `Value::I64(7)` and
/// `Value::BigInt(7.into())` are all equal to each other. Values of
/// different, non-numeric families order by a fixed family rank, which
/// gives `Value` a total order suitable for sorted map keys.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
    Bytes(Vec<u8>),
    BigInt(BigInt),
    BigDecimal(BigDecimal),
    Array(Vec<Value>),
    Document(Document),
    Id(OlivineId),
}

/// Canonical form of a numeric value, ordered `NegInf < finite < PosInf < Nan`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NumKey {
    NegInf,
    Finite(BigDecimal),
    PosInf,
    Nan,
}

fn float_key(value: f64) -> NumKey {
    if value.is_nan() {
        NumKey::Nan
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            NumKey::PosInf
        } else {
            NumKey::NegInf
        }
    } else {
        match BigDecimal::try_from(value) {
            Ok(decimal) => NumKey::Finite(decimal),
            Err(_) => NumKey::Nan,
        }
    }
}

impl Value {
    /// Rank of the value's family, used to order values of different kinds.
    fn family_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::I8(_)
            | Value::I16(_)
            | Value::I32(_)
            | Value::I64(_)
            | Value::U8(_)
            | Value::U16(_)
            | Value::U32(_)
            | Value::U64(_)
            | Value::F32(_)
            | Value::F64(_)
            | Value::BigInt(_)
            | Value::BigDecimal(_) => 2,
            Value::Char(_) => 3,
            Value::String(_) => 4,
            Value::Bytes(_) => 5,
            Value::Array(_) => 6,
            Value::Document(_) => 7,
            Value::Id(_) => 8,
        }
    }

    /// Fast integer view covering every integer variant narrower than `BigInt`.
    fn as_i128(&self) -> Option<i128> {
        match self {
            Value::I8(v) => Some(*v as i128),
            Value::I16(v) => Some(*v as i128),
            Value::I32(v) => Some(*v as i128),
            Value::I64(v) => Some(*v as i128),
            Value::U8(v) => Some(*v as i128),
            Value::U16(v) => Some(*v as i128),
            Value::U32(v) => Some(*v as i128),
            Value::U64(v) => Some(*v as i128),
            _ => None,
        }
    }

    fn num_key(&self) -> Option<NumKey> {
        match self {
            Value::I8(_)
            | Value::I16(_)
            | Value::I32(_)
            | Value::I64(_)
            | Value::U8(_)
            | Value::U16(_)
            | Value::U32(_)
            | Value::U64(_) => self
                .as_i128()
                .map(|v| NumKey::Finite(BigDecimal::from(BigInt::from(v)))),
            Value::F32(v) => Some(float_key(*v as f64)),
            Value::F64(v) => Some(float_key(*v)),
            Value::BigInt(v) => Some(NumKey::Finite(BigDecimal::from(v.clone()))),
            Value::BigDecimal(v) => Some(NumKey::Finite(v.clone())),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        self.family_rank() == 2
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    /// Returns true when two values belong to the same ordering family, so
    /// that a range comparison between them is meaningful.
    pub(crate) fn is_comparable_with(&self, other: &Value) -> bool {
        self.family_rank() == other.family_rank()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(|v| i32::try_from(v).ok())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::BigInt(v) => v.to_i64(),
            _ => self.as_i128().and_then(|v| i64::try_from(v).ok()),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::BigInt(v) => v.to_u64(),
            _ => self.as_i128().and_then(|v| u64::try_from(v).ok()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            Value::BigInt(v) => v.to_f64(),
            Value::BigDecimal(v) => v.to_f64(),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_big_int(&self) -> Option<BigInt> {
        match self {
            Value::BigInt(v) => Some(v.clone()),
            _ => self.as_i128().map(BigInt::from),
        }
    }

    pub fn as_big_decimal(&self) -> Option<BigDecimal> {
        match self {
            Value::BigDecimal(v) => Some(v.clone()),
            Value::BigInt(v) => Some(BigDecimal::from(v.clone())),
            Value::F32(v) => BigDecimal::try_from(*v as f64).ok(),
            Value::F64(v) => BigDecimal::try_from(*v).ok(),
            _ => self.as_i128().map(|v| BigDecimal::from(BigInt::from(v))),
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<OlivineId> {
        match self {
            Value::Id(v) => Some(*v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::BigInt(_) => "bigint",
            Value::BigDecimal(_) => "bigdecimal",
            Value::Array(_) => "array",
            Value::Document(_) => "document",
            Value::Id(_) => "id",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        // Fast path for plain integers, which dominate key comparisons.
        if let (Some(a), Some(b)) = (self.as_i128(), other.as_i128()) {
            return a.cmp(&b);
        }
        if self.is_number() && other.is_number() {
            match (self.num_key(), other.num_key()) {
                (Some(a), Some(b)) => return a.cmp(&b),
                _ => return Ordering::Equal,
            }
        }

        let rank = self.family_rank().cmp(&other.family_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => a.cmp(b),
            (Value::Id(a), Value::Id(b)) => a.cmp(b),
            // Covered by the numeric paths above.
            _ => Ordering::Equal,
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.is_number() {
            // Numeric values hash through their canonical form so that
            // equal numbers of different widths land in the same bucket.
            match self.num_key() {
                Some(NumKey::NegInf) => state.write_u8(0xFD),
                Some(NumKey::PosInf) => state.write_u8(0xFE),
                Some(NumKey::Nan) | None => state.write_u8(0xFF),
                Some(NumKey::Finite(decimal)) => {
                    state.write_u8(2);
                    if decimal.is_zero() {
                        state.write_u8(0);
                    } else {
                        let (digits, exponent) = decimal.normalized().into_bigint_and_exponent();
                        digits.hash(state);
                        exponent.hash(state);
                    }
                }
            }
            return;
        }

        state.write_u8(self.family_rank());
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Char(v) => v.hash(state),
            Value::String(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::Array(v) => v.hash(state),
            Value::Document(v) => v.hash(state),
            Value::Id(v) => v.hash(state),
            _ => {}
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "bytes({})", v.len()),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::BigDecimal(v) => write!(f, "{}", v),
            Value::Array(values) => {
                let mut parts = String::new();
                for value in values {
                    parts.push_str(&format!("{}, ", value));
                }
                write!(f, "[{}]", parts.trim_end_matches(", "))
            }
            Value::Document(v) => write!(f, "{}", v),
            Value::Id(v) => write!(f, "{}", v),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

macro_rules! value_from {
    ($type:ty, $variant:ident) => {
        impl From<$type> for Value {
            fn from(value: $type) -> Self {
                Value::$variant(value)
            }
        }
    };
}

value_from!(bool, Bool);
value_from!(i8, I8);
value_from!(i16, I16);
value_from!(i32, I32);
value_from!(i64, I64);
value_from!(u8, U8);
value_from!(u16, U16);
value_from!(u32, U32);
value_from!(u64, U64);
value_from!(f32, F32);
value_from!(f64, F64);
value_from!(char, Char);
value_from!(String, String);
value_from!(BigInt, BigInt);
value_from!(BigDecimal, BigDecimal);
value_from!(Document, Document);
value_from!(OlivineId, Id);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Array(values)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_numeric_equality_across_widths() {
        assert_eq!(Value::I32(7), Value::I64(7));
        assert_eq!(Value::U8(7), Value::I64(7));
        assert_eq!(Value::I64(7), Value::BigInt(BigInt::from(7)));
        assert_eq!(Value::F64(7.0), Value::I32(7));
        assert_eq!(
            Value::BigDecimal(BigDecimal::try_from(1.5).unwrap()),
            Value::F64(1.5)
        );
        assert_ne!(Value::I32(7), Value::I32(8));
    }

    #[test]
    fn test_big_decimal_trailing_zeros_are_equal() {
        let one_zero: BigDecimal = "1.0".parse().unwrap();
        let one_zero_zero: BigDecimal = "1.00".parse().unwrap();
        assert_eq!(Value::BigDecimal(one_zero), Value::BigDecimal(one_zero_zero));
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(Value::I32(3) < Value::I64(4));
        assert!(Value::F64(3.5) < Value::I32(4));
        assert!(Value::BigInt(BigInt::from(10).pow(30)) > Value::I64(i64::MAX));
        assert!(Value::F64(f64::NEG_INFINITY) < Value::I64(i64::MIN));
        assert!(Value::F64(f64::INFINITY) > Value::BigInt(BigInt::from(10).pow(30)));
        assert!(Value::F64(f64::NAN) > Value::F64(f64::INFINITY));
    }

    #[test]
    fn test_family_ordering_is_total() {
        let mut values = vec![
            Value::String("a".to_string()),
            Value::Null,
            Value::I32(1),
            Value::Bool(true),
            Value::Array(vec![Value::I32(1)]),
        ];
        values.sort();
        assert!(values[0].is_null());
        assert_eq!(values[1], Value::Bool(true));
        assert_eq!(values[2], Value::I32(1));
        assert!(values[3].is_string());
        assert!(values[4].is_array());
    }

    #[test]
    fn test_hash_agrees_with_equality() {
        let mut map: HashMap<Value, &str> = HashMap::new();
        map.insert(Value::I64(42), "answer");

        assert_eq!(map.get(&Value::I32(42)), Some(&"answer"));
        assert_eq!(map.get(&Value::F64(42.0)), Some(&"answer"));
        assert_eq!(map.get(&Value::BigInt(BigInt::from(42))), Some(&"answer"));
        assert_eq!(map.get(&Value::I64(43)), None);
    }

    #[test]
    fn test_zero_hashes_consistently() {
        let mut map: HashMap<Value, ()> = HashMap::new();
        map.insert(Value::I64(0), ());
        assert!(map.contains_key(&Value::F64(0.0)));
        assert!(map.contains_key(&Value::F64(-0.0)));
        assert!(map.contains_key(&Value::BigDecimal(BigDecimal::zero())));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::I32(5).as_i64(), Some(5));
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::I64(5).as_f64(), Some(5.0));
        assert_eq!(Value::Null.as_i64(), None);
        assert_eq!(Value::I64(1).as_big_int(), Some(BigInt::from(1)));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::I64(3));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::from("word").to_string(), "word");
        assert_eq!(
            Value::Array(vec![Value::I32(1), Value::I32(2)]).to_string(),
            "[1, 2]"
        );
    }
}
