//! Typed access to the fields of a decoded print tuple
//!
//! The notifier renders Clarity values loosely: unsigned integers show up as
//! JSON numbers, decimal strings or `u`-prefixed literals, principals may keep
//! their leading quote, and optionals may be `null`, missing, `none` or
//! `(some x)`. Everything is normalized here so event structs only see plain
//! Rust values.

use crate::core::DecodeError;
use serde_json::{Map, Value};

/// Key holding the event tag inside every print tuple
pub const TAG_FIELD: &str = "event";

#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub fn from_value(value: &'a Value) -> Result<Self, DecodeError> {
        value
            .as_object()
            .map(|map| Self { map })
            .ok_or(DecodeError::NotATuple)
    }

    /// The event tag, with any Clarity string quoting removed
    pub fn tag(&self) -> Result<&'a str, DecodeError> {
        self.map
            .get(TAG_FIELD)
            .and_then(Value::as_str)
            .map(|s| s.trim().trim_matches('"'))
            .filter(|s| !s.is_empty())
            .ok_or(DecodeError::MissingTag)
    }

    fn present(&self, name: &'static str) -> Option<&'a Value> {
        let value = self.map.get(name)?;
        match value {
            Value::Null => None,
            Value::String(s) if s.trim() == "none" => None,
            other => Some(other),
        }
    }

    fn required(&self, name: &'static str) -> Result<&'a Value, DecodeError> {
        self.present(name).ok_or(DecodeError::MissingField(name))
    }

    pub fn uint(&self, name: &'static str) -> Result<u128, DecodeError> {
        parse_uint(self.required(name)?).ok_or(DecodeError::InvalidField {
            field: name,
            expected: "uint",
        })
    }

    pub fn opt_uint(&self, name: &'static str) -> Result<Option<u128>, DecodeError> {
        match self.present(name) {
            None => Ok(None),
            Some(value) => parse_uint(value).map(Some).ok_or(DecodeError::InvalidField {
                field: name,
                expected: "uint",
            }),
        }
    }

    /// Unsigned integer that must fit a block height or counter
    pub fn u64(&self, name: &'static str) -> Result<u64, DecodeError> {
        u64::try_from(self.uint(name)?).map_err(|_| DecodeError::InvalidField {
            field: name,
            expected: "u64",
        })
    }

    pub fn opt_u64(&self, name: &'static str) -> Result<Option<u64>, DecodeError> {
        self.opt_uint(name)?
            .map(|v| {
                u64::try_from(v).map_err(|_| DecodeError::InvalidField {
                    field: name,
                    expected: "u64",
                })
            })
            .transpose()
    }

    pub fn principal(&self, name: &'static str) -> Result<String, DecodeError> {
        parse_principal(self.required(name)?).ok_or(DecodeError::InvalidField {
            field: name,
            expected: "principal",
        })
    }

    pub fn opt_principal(&self, name: &'static str) -> Result<Option<String>, DecodeError> {
        match self.present(name) {
            None => Ok(None),
            Some(value) => parse_principal(value).map(Some).ok_or(DecodeError::InvalidField {
                field: name,
                expected: "principal",
            }),
        }
    }

    pub fn string(&self, name: &'static str) -> Result<String, DecodeError> {
        let value = self.required(name)?;
        value
            .as_str()
            .map(|s| unwrap_some(s).trim_matches('"').to_string())
            .ok_or(DecodeError::InvalidField {
                field: name,
                expected: "string",
            })
    }

    pub fn opt_string(&self, name: &'static str) -> Result<Option<String>, DecodeError> {
        match self.present(name) {
            None => Ok(None),
            Some(_) => self.string(name).map(Some),
        }
    }
}

fn unwrap_some(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("(some ")
        .and_then(|inner| inner.strip_suffix(')'))
        .map(str::trim)
        .unwrap_or(s)
}

fn parse_uint(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => {
            let s = unwrap_some(s);
            let digits = s.strip_prefix('u').unwrap_or(s);
            digits.parse::<u128>().ok()
        }
        _ => None,
    }
}

fn parse_principal(value: &Value) -> Option<String> {
    let s = unwrap_some(value.as_str()?);
    let s = s.strip_prefix('\'').unwrap_or(s);
    if s.is_empty() || !s.starts_with('S') || s.chars().any(char::is_whitespace) {
        return None;
    }
    Some(s.to_string())
}
