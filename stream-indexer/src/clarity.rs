//! Clarity value codec
//!
//! Decodes the consensus serialization of Clarity values, as returned by a
//! Stacks node's read-only calls and by Chainhook's `raw_value` fields, and
//! renders principals in their c32check form.

use crate::core::ChainError;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const MAX_DEPTH: usize = 32;

/// A decoded Clarity value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    Int(i128),
    UInt(u128),
    Buffer(Vec<u8>),
    Bool(bool),
    Principal(String),
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    OptionalNone,
    OptionalSome(Box<ClarityValue>),
    List(Vec<ClarityValue>),
    Tuple(Vec<(String, ClarityValue)>),
    StringAscii(String),
    StringUtf8(String),
}

impl ClarityValue {
    /// Decode a `0x`-prefixed (or bare) hex string
    pub fn from_hex(input: &str) -> Result<Self, ChainError> {
        let trimmed = input.strip_prefix("0x").unwrap_or(input);
        let bytes = hex::decode(trimmed).map_err(|e| ChainError::Codec(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let mut reader = Reader { bytes, pos: 0 };
        let value = reader.value(0)?;
        if reader.pos != bytes.len() {
            return Err(ChainError::Codec(format!(
                "{} trailing bytes",
                bytes.len() - reader.pos
            )));
        }
        Ok(value)
    }

    /// Unwrap `(ok x)`; an `(err e)` becomes an error
    pub fn into_ok(self) -> Result<ClarityValue, ChainError> {
        match self {
            ClarityValue::ResponseOk(inner) => Ok(*inner),
            ClarityValue::ResponseErr(inner) => Err(ChainError::UnexpectedValue(format!(
                "(err {})",
                inner.to_json()
            ))),
            other => Ok(other),
        }
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            ClarityValue::UInt(v) => Some(*v),
            _ => None,
        }
    }

    /// JSON rendering matching the notifier's decoded values
    ///
    /// Unsigned integers keep their `u` prefix so no precision is lost.
    pub fn to_json(&self) -> Value {
        match self {
            ClarityValue::Int(v) => Value::String(v.to_string()),
            ClarityValue::UInt(v) => Value::String(format!("u{}", v)),
            ClarityValue::Buffer(b) => Value::String(format!("0x{}", hex::encode(b))),
            ClarityValue::Bool(b) => Value::Bool(*b),
            ClarityValue::Principal(p) => Value::String(p.clone()),
            ClarityValue::ResponseOk(v) => {
                let mut map = Map::new();
                map.insert("ok".to_string(), v.to_json());
                Value::Object(map)
            }
            ClarityValue::ResponseErr(v) => {
                let mut map = Map::new();
                map.insert("err".to_string(), v.to_json());
                Value::Object(map)
            }
            ClarityValue::OptionalNone => Value::Null,
            ClarityValue::OptionalSome(v) => v.to_json(),
            ClarityValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            ClarityValue::Tuple(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, v)| (name.clone(), v.to_json()))
                    .collect(),
            ),
            ClarityValue::StringAscii(s) | ClarityValue::StringUtf8(s) => Value::String(s.clone()),
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ChainError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| ChainError::Codec(format!("unexpected end of input at {}", self.pos)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ChainError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, ChainError> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn sixteen(&mut self) -> Result<[u8; 16], ChainError> {
        let mut out = [0u8; 16];
        out.copy_from_slice(self.take(16)?);
        Ok(out)
    }

    fn len_prefixed(&mut self) -> Result<&'a [u8], ChainError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn standard_principal(&mut self) -> Result<String, ChainError> {
        let version = self.u8()?;
        let hash = self.take(20)?;
        c32_address(version, hash)
    }

    fn value(&mut self, depth: usize) -> Result<ClarityValue, ChainError> {
        if depth > MAX_DEPTH {
            return Err(ChainError::Codec("value nested too deeply".to_string()));
        }

        let type_id = self.u8()?;
        let value = match type_id {
            0x00 => ClarityValue::Int(i128::from_be_bytes(self.sixteen()?)),
            0x01 => ClarityValue::UInt(u128::from_be_bytes(self.sixteen()?)),
            0x02 => ClarityValue::Buffer(self.len_prefixed()?.to_vec()),
            0x03 => ClarityValue::Bool(true),
            0x04 => ClarityValue::Bool(false),
            0x05 => ClarityValue::Principal(self.standard_principal()?),
            0x06 => {
                let address = self.standard_principal()?;
                let name_len = self.u8()? as usize;
                let name = std::str::from_utf8(self.take(name_len)?)
                    .map_err(|e| ChainError::Codec(e.to_string()))?;
                ClarityValue::Principal(format!("{}.{}", address, name))
            }
            0x07 => ClarityValue::ResponseOk(Box::new(self.value(depth + 1)?)),
            0x08 => ClarityValue::ResponseErr(Box::new(self.value(depth + 1)?)),
            0x09 => ClarityValue::OptionalNone,
            0x0a => ClarityValue::OptionalSome(Box::new(self.value(depth + 1)?)),
            0x0b => {
                let len = self.u32()? as usize;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.value(depth + 1)?);
                }
                ClarityValue::List(items)
            }
            0x0c => {
                let len = self.u32()? as usize;
                let mut fields = Vec::with_capacity(len.min(256));
                for _ in 0..len {
                    let name_len = self.u8()? as usize;
                    let name = std::str::from_utf8(self.take(name_len)?)
                        .map_err(|e| ChainError::Codec(e.to_string()))?
                        .to_string();
                    fields.push((name, self.value(depth + 1)?));
                }
                ClarityValue::Tuple(fields)
            }
            0x0d => {
                let raw = self.len_prefixed()?;
                if !raw.is_ascii() {
                    return Err(ChainError::Codec("string-ascii with non-ascii bytes".to_string()));
                }
                ClarityValue::StringAscii(String::from_utf8_lossy(raw).into_owned())
            }
            0x0e => {
                let raw = self.len_prefixed()?;
                let s = std::str::from_utf8(raw).map_err(|e| ChainError::Codec(e.to_string()))?;
                ClarityValue::StringUtf8(s.to_string())
            }
            other => {
                return Err(ChainError::Codec(format!("unknown type id 0x{:02x}", other)));
            }
        };

        Ok(value)
    }
}

/// Render a version byte and hash160 as a Stacks address (`SP...`, `ST...`)
pub fn c32_address(version: u8, hash160: &[u8]) -> Result<String, ChainError> {
    if version >= 32 {
        return Err(ChainError::Codec(format!("invalid address version {}", version)));
    }

    let mut check_input = Vec::with_capacity(hash160.len() + 1);
    check_input.push(version);
    check_input.extend_from_slice(hash160);
    let checksum = Sha256::digest(Sha256::digest(&check_input));

    let mut payload = hash160.to_vec();
    payload.extend_from_slice(&checksum[..4]);

    Ok(format!(
        "S{}{}",
        C32_ALPHABET[version as usize] as char,
        c32_encode(&payload)
    ))
}

fn c32_encode(input: &[u8]) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(input.len() * 8 / 5 + 1);
    let mut carry: u8 = 0;
    let mut carry_bits: u8 = 0;

    for byte in input.iter().rev() {
        let low_bits_to_take = 5 - carry_bits;
        let low_bits = byte & ((1u8 << low_bits_to_take) - 1);
        out.push(C32_ALPHABET[((low_bits << carry_bits) + carry) as usize]);

        carry_bits = 8 + carry_bits - 5;
        carry = byte >> (8 - carry_bits);

        if carry_bits >= 5 {
            out.push(C32_ALPHABET[(carry & 0x1f) as usize]);
            carry_bits -= 5;
            carry >>= 5;
        }
    }

    if carry_bits > 0 {
        out.push(C32_ALPHABET[carry as usize]);
    }

    // strip encoding zeros, then restore one per leading zero byte
    while out.last() == Some(&C32_ALPHABET[0]) {
        out.pop();
    }
    for byte in input {
        if *byte != 0 {
            break;
        }
        out.push(C32_ALPHABET[0]);
    }

    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c32_boot_addresses() {
        assert_eq!(c32_address(22, &[0u8; 20]).unwrap(), "SP000000000000000000002Q6VF78");
        assert_eq!(c32_address(26, &[0u8; 20]).unwrap(), "ST000000000000000000002AMW42H");
    }

    #[test]
    fn test_c32_known_address() {
        let hash = hex::decode("a46ff88886c2ef9762d970b4d2c63678835bd39d").unwrap();
        assert_eq!(
            c32_address(22, &hash).unwrap(),
            "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7"
        );
    }

    #[test]
    fn test_decode_ok_uint() {
        // (ok u3)
        let value = ClarityValue::from_hex("0x070100000000000000000000000000000003").unwrap();
        assert_eq!(value.into_ok().unwrap().as_uint(), Some(3));
    }

    #[test]
    fn test_decode_list_of_principals() {
        let mut bytes = vec![0x0b, 0, 0, 0, 2];
        bytes.push(0x05);
        bytes.push(22);
        bytes.extend_from_slice(&[0u8; 20]);
        bytes.push(0x06);
        bytes.push(22);
        bytes.extend_from_slice(&hex::decode("a46ff88886c2ef9762d970b4d2c63678835bd39d").unwrap());
        bytes.push(8);
        bytes.extend_from_slice(b"treasury");

        let value = ClarityValue::from_bytes(&bytes).unwrap();
        assert_eq!(
            value,
            ClarityValue::List(vec![
                ClarityValue::Principal("SP000000000000000000002Q6VF78".to_string()),
                ClarityValue::Principal("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.treasury".to_string()),
            ])
        );
    }

    #[test]
    fn test_tuple_to_json() {
        let mut bytes = vec![0x0c, 0, 0, 0, 2];
        bytes.push(5);
        bytes.extend_from_slice(b"event");
        bytes.extend_from_slice(&[0x0d, 0, 0, 0, 14]);
        bytes.extend_from_slice(b"stream-created");
        bytes.push(9);
        bytes.extend_from_slice(b"stream-id");
        bytes.push(0x01);
        let mut id = [0u8; 16];
        id[15] = 7;
        bytes.extend_from_slice(&id);

        let json = ClarityValue::from_bytes(&bytes).unwrap().to_json();
        assert_eq!(json["event"], "stream-created");
        assert_eq!(json["stream-id"], "u7");
    }

    #[test]
    fn test_rejects_truncated_and_trailing_input() {
        assert!(ClarityValue::from_hex("0x01000000").is_err());
        assert!(ClarityValue::from_hex("0x0300").is_err());
        assert!(ClarityValue::from_hex("0xff").is_err());
    }
}
