//! Conversion between device-network JSON and typed fabric values.

use crate::fabric::{FabricValue, Status};
use serde_json::{Map, Value};
use thiserror::Error;

/// Fabric data type of an attribute or command field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Bool,
    Unsigned { bits: u8 },
    Signed { bits: u8 },
    Enum8 { names: &'static [(&'static str, u8)] },
    Bitmap { bits: u8, names: &'static [(&'static str, u32)] },
    String { max_len: usize },
}

pub const BOOL: DataType = DataType::Bool;
pub const U8: DataType = DataType::Unsigned { bits: 8 };
pub const U16: DataType = DataType::Unsigned { bits: 16 };
pub const U32: DataType = DataType::Unsigned { bits: 32 };
pub const S8: DataType = DataType::Signed { bits: 8 };
pub const S16: DataType = DataType::Signed { bits: 16 };
pub const S32: DataType = DataType::Signed { bits: 32 };

pub const fn enum8(names: &'static [(&'static str, u8)]) -> DataType {
    DataType::Enum8 { names }
}

pub const fn bitmap8(names: &'static [(&'static str, u32)]) -> DataType {
    DataType::Bitmap { bits: 8, names }
}

pub const fn bitmap16(names: &'static [(&'static str, u32)]) -> DataType {
    DataType::Bitmap { bits: 16, names }
}

pub const fn bitmap32(names: &'static [(&'static str, u32)]) -> DataType {
    DataType::Bitmap { bits: 32, names }
}

pub const fn string(max_len: usize) -> DataType {
    DataType::String { max_len }
}

/// Why a value did not fit its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("null is not allowed")]
    NullNotAllowed,
}

impl ValueError {
    /// Status for a rejected attribute write.
    pub fn write_status(&self) -> Status {
        match self {
            ValueError::OutOfRange(_) => Status::ConstraintError,
            ValueError::TypeMismatch(_) | ValueError::NullNotAllowed => Status::InvalidDataType,
        }
    }

    /// Status for a rejected command field.
    pub fn command_status(&self) -> Status {
        match self {
            ValueError::OutOfRange(_) => Status::ConstraintError,
            ValueError::TypeMismatch(_) | ValueError::NullNotAllowed => Status::InvalidCommand,
        }
    }
}

type ValueResult<T> = std::result::Result<T, ValueError>;

fn unsigned_max(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn signed_bounds(bits: u8) -> (i64, i64) {
    let bits = bits.clamp(1, 64) - 1;
    if bits == 63 {
        (i64::MIN, i64::MAX)
    } else {
        (-(1i64 << bits), (1i64 << bits) - 1)
    }
}

/// Integral view of a JSON number. Floats with a zero fractional part count.
fn json_integer(value: &Value) -> ValueResult<i128> {
    if let Some(v) = value.as_u64() {
        return Ok(i128::from(v));
    }
    if let Some(v) = value.as_i64() {
        return Ok(i128::from(v));
    }
    match value.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1.0e19 => Ok(f as i128),
        Some(f) => Err(ValueError::TypeMismatch(format!("{} is not an integer", f))),
        None => Err(ValueError::TypeMismatch(format!("expected a number, got {}", value))),
    }
}

fn check_unsigned(v: i128, bits: u8) -> ValueResult<u64> {
    let max = unsigned_max(bits);
    if v < 0 || v > i128::from(max) {
        return Err(ValueError::OutOfRange(format!("{} not in 0..={}", v, max)));
    }
    Ok(v as u64)
}

fn check_signed(v: i128, bits: u8) -> ValueResult<i64> {
    let (min, max) = signed_bounds(bits);
    if v < i128::from(min) || v > i128::from(max) {
        return Err(ValueError::OutOfRange(format!("{} not in {}..={}", v, min, max)));
    }
    Ok(v as i64)
}

fn bitmap_from_object(
    object: &Map<String, Value>,
    names: &'static [(&'static str, u32)],
) -> ValueResult<u64> {
    let mut bits = 0u64;
    for (name, set) in object {
        let mask = names
            .iter()
            .find(|(n, _)| *n == name.as_str())
            .map(|(_, mask)| *mask)
            .ok_or_else(|| ValueError::TypeMismatch(format!("unknown bit '{}'", name)))?;
        match set.as_bool() {
            Some(true) => bits |= u64::from(mask),
            Some(false) => {}
            None => {
                return Err(ValueError::TypeMismatch(format!(
                    "bit '{}' must be a boolean",
                    name
                )))
            }
        }
    }
    Ok(bits)
}

/// Convert a reported JSON value into the fabric type.
pub fn from_device(value: &Value, data_type: &DataType, nullable: bool) -> ValueResult<FabricValue> {
    if value.is_null() {
        return if nullable {
            Ok(FabricValue::Null)
        } else {
            Err(ValueError::NullNotAllowed)
        };
    }

    match *data_type {
        DataType::Bool => value
            .as_bool()
            .map(FabricValue::Bool)
            .ok_or_else(|| ValueError::TypeMismatch(format!("expected a boolean, got {}", value))),
        DataType::Unsigned { bits } => {
            Ok(FabricValue::Uint(check_unsigned(json_integer(value)?, bits)?))
        }
        DataType::Signed { bits } => Ok(FabricValue::Int(check_signed(json_integer(value)?, bits)?)),
        DataType::Enum8 { names } => {
            if let Some(name) = value.as_str() {
                return names
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, v)| FabricValue::Uint(u64::from(*v)))
                    .ok_or_else(|| ValueError::TypeMismatch(format!("unknown enum name '{}'", name)));
            }
            Ok(FabricValue::Uint(check_unsigned(json_integer(value)?, 8)?))
        }
        DataType::Bitmap { bits, names } => {
            if let Some(object) = value.as_object() {
                let raw = bitmap_from_object(object, names)?;
                return Ok(FabricValue::Uint(check_unsigned(i128::from(raw), bits)?));
            }
            Ok(FabricValue::Uint(check_unsigned(json_integer(value)?, bits)?))
        }
        DataType::String { max_len } => {
            let s = value
                .as_str()
                .ok_or_else(|| ValueError::TypeMismatch(format!("expected a string, got {}", value)))?;
            if s.chars().count() > max_len {
                return Err(ValueError::OutOfRange(format!(
                    "string longer than {} characters",
                    max_len
                )));
            }
            Ok(FabricValue::Str(s.to_string()))
        }
    }
}

/// Validate a fabric value and render it as device-network JSON.
pub fn to_device(value: &FabricValue, data_type: &DataType, nullable: bool) -> ValueResult<Value> {
    if value.is_null() {
        return if nullable {
            Ok(Value::Null)
        } else {
            Err(ValueError::NullNotAllowed)
        };
    }

    let integer = |value: &FabricValue| -> ValueResult<i128> {
        match value {
            FabricValue::Uint(v) => Ok(i128::from(*v)),
            FabricValue::Int(v) => Ok(i128::from(*v)),
            other => Err(ValueError::TypeMismatch(format!("expected an integer, got {:?}", other))),
        }
    };

    match *data_type {
        DataType::Bool => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| ValueError::TypeMismatch(format!("expected a boolean, got {:?}", value))),
        DataType::Unsigned { bits } => Ok(Value::from(check_unsigned(integer(value)?, bits)?)),
        DataType::Signed { bits } => Ok(Value::from(check_signed(integer(value)?, bits)?)),
        DataType::Enum8 { names } => {
            let raw = check_unsigned(integer(value)?, 8)?;
            Ok(names
                .iter()
                .find(|(_, v)| u64::from(*v) == raw)
                .map(|(name, _)| Value::String(name.to_string()))
                .unwrap_or_else(|| Value::from(raw)))
        }
        DataType::Bitmap { bits, names } => {
            let raw = check_unsigned(integer(value)?, bits)?;
            let known = names.iter().fold(0u64, |acc, (_, mask)| acc | u64::from(*mask));
            if names.is_empty() || raw & !known != 0 {
                return Ok(Value::from(raw));
            }
            let object: Map<String, Value> = names
                .iter()
                .map(|(name, mask)| (name.to_string(), Value::Bool(raw & u64::from(*mask) != 0)))
                .collect();
            Ok(Value::Object(object))
        }
        DataType::String { max_len } => {
            let s = value
                .as_str()
                .ok_or_else(|| ValueError::TypeMismatch(format!("expected a string, got {:?}", value)))?;
            if s.chars().count() > max_len {
                return Err(ValueError::OutOfRange(format!(
                    "string longer than {} characters",
                    max_len
                )));
            }
            Ok(Value::String(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MODES: DataType = enum8(&[("Off", 0), ("Heat", 4)]);
    const OCCUPANCY: DataType = bitmap8(&[("Occupied", 0x01)]);

    #[test]
    fn test_integer_ranges() {
        assert_eq!(from_device(&json!(255), &U8, false), Ok(FabricValue::Uint(255)));
        assert!(matches!(
            from_device(&json!(256), &U8, false),
            Err(ValueError::OutOfRange(_))
        ));
        assert!(matches!(
            from_device(&json!(-1), &U16, false),
            Err(ValueError::OutOfRange(_))
        ));
        assert_eq!(from_device(&json!(-32768), &S16, false), Ok(FabricValue::Int(-32768)));
        assert!(from_device(&json!(32768), &S16, false).is_err());
    }

    #[test]
    fn test_integral_floats_accepted() {
        assert_eq!(from_device(&json!(55.0), &S16, false), Ok(FabricValue::Int(55)));
        assert!(matches!(
            from_device(&json!(55.5), &S16, false),
            Err(ValueError::TypeMismatch(_))
        ));
        assert!(matches!(
            from_device(&json!("55"), &S16, false),
            Err(ValueError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_nullability() {
        assert_eq!(from_device(&Value::Null, &S16, true), Ok(FabricValue::Null));
        assert_eq!(
            from_device(&Value::Null, &S16, false),
            Err(ValueError::NullNotAllowed)
        );
        assert_eq!(to_device(&FabricValue::Null, &U8, true), Ok(Value::Null));
        assert_eq!(
            to_device(&FabricValue::Null, &U8, false).unwrap_err().write_status(),
            Status::InvalidDataType
        );
    }

    #[test]
    fn test_enum_names() {
        assert_eq!(from_device(&json!("Heat"), &MODES, false), Ok(FabricValue::Uint(4)));
        assert_eq!(from_device(&json!(3), &MODES, false), Ok(FabricValue::Uint(3)));
        assert!(from_device(&json!("Cool"), &MODES, false).is_err());

        assert_eq!(to_device(&FabricValue::Uint(4), &MODES, false), Ok(json!("Heat")));
        assert_eq!(to_device(&FabricValue::Uint(3), &MODES, false), Ok(json!(3)));
    }

    #[test]
    fn test_bitmap_objects() {
        assert_eq!(
            from_device(&json!({"Occupied": true}), &OCCUPANCY, false),
            Ok(FabricValue::Uint(1))
        );
        assert_eq!(from_device(&json!(0), &OCCUPANCY, false), Ok(FabricValue::Uint(0)));
        assert!(from_device(&json!({"Vacant": true}), &OCCUPANCY, false).is_err());
        assert!(from_device(&json!({"Occupied": 1}), &OCCUPANCY, false).is_err());

        assert_eq!(
            to_device(&FabricValue::Uint(1), &OCCUPANCY, false),
            Ok(json!({"Occupied": true}))
        );
        assert_eq!(to_device(&FabricValue::Uint(3), &OCCUPANCY, false), Ok(json!(3)));
    }

    #[test]
    fn test_strings_and_statuses() {
        let ty = string(4);
        assert_eq!(from_device(&json!("abcd"), &ty, false), Ok(FabricValue::Str("abcd".into())));
        let err = to_device(&FabricValue::Str("abcde".into()), &ty, false).unwrap_err();
        assert_eq!(err.write_status(), Status::ConstraintError);
        assert_eq!(err.command_status(), Status::ConstraintError);

        let err = to_device(&FabricValue::Bool(true), &U8, false).unwrap_err();
        assert_eq!(err.command_status(), Status::InvalidCommand);
    }
}
