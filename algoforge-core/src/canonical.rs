//! Canonicalization: order-independent, metadata-free serialization.
//!
//! Documents are lowered into a [`CanonicalValue`] tree whose objects are
//! explicitly key-sorted lists, then emitted as compact JSON:
//!
//! - object keys sorted by code point at every depth
//! - arrays keep their order (indicator and condition order is meaningful)
//! - the top-level `meta` key is dropped
//! - no whitespace; floats in shortest round-trip form (`2.0` → `2`, `-0` → `0`)
//!
//! Nothing here relies on the iteration order of a host map type.

use std::fmt::Write as _;

/// Top-level key excluded from canonical output.
pub const META_KEY: &str = "meta";

/// Structural errors: a malformed document reached the canonicalizer.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    #[error("non-finite number {value} at '{path}'")]
    NonFiniteNumber { path: String, value: f64 },
    #[error("number cannot be represented: {0}")]
    UnrepresentableNumber(String),
    #[error("duplicate object key '{0}'")]
    DuplicateKey(String),
    #[error("unsupported schema_version '{found}' (expected '{expected}')")]
    UnsupportedSchema { found: String, expected: &'static str },
    #[error("canonical document must be a JSON object at the top level")]
    NotAnObject,
    #[error("string encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("formatting failed")]
    Format(#[from] std::fmt::Error),
}

/// A JSON number in one of the exact representations we emit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanonicalNumber {
    Int(i64),
    UInt(u64),
    /// Always finite.
    Float(f64),
}

impl CanonicalNumber {
    /// Wrap a float, rejecting NaN and infinities. `path` is for the error message.
    pub fn float(value: f64, path: &str) -> Result<Self, CanonicalError> {
        if value.is_finite() {
            Ok(CanonicalNumber::Float(value))
        } else {
            Err(CanonicalError::NonFiniteNumber {
                path: path.to_string(),
                value,
            })
        }
    }

    fn write_to(&self, out: &mut String) -> Result<(), CanonicalError> {
        match *self {
            CanonicalNumber::Int(n) => write!(out, "{n}")?,
            CanonicalNumber::UInt(n) => write!(out, "{n}")?,
            CanonicalNumber::Float(x) if x == 0.0 => out.push('0'),
            CanonicalNumber::Float(x) => write_float(x, out)?,
        }
        Ok(())
    }
}

/// Number-to-string as `JSON.stringify` does it: the shortest digits that
/// round-trip, positional for `1e-6 <= |x| < 1e21` and exponent form outside
/// that range (`1e-7`, `1.5e+21`). `x` is finite and non-zero.
fn write_float(x: f64, out: &mut String) -> Result<(), CanonicalError> {
    // `{:e}` yields the shortest round-trip mantissa, e.g. `3.0000000000000004e-1`.
    let scientific = format!("{:e}", x.abs());
    let unrepresentable = || CanonicalError::UnrepresentableNumber(scientific.clone());
    let (mantissa, exponent) = scientific.split_once('e').ok_or_else(unrepresentable)?;
    let exponent: i32 = exponent.parse().map_err(|_| unrepresentable())?;
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();

    // Decimal point sits after `point` digits.
    let len = digits.len() as i32;
    let point = exponent + 1;

    if x.is_sign_negative() {
        out.push('-');
    }
    if len <= point && point <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((point - len) as usize));
    } else if 0 < point && point <= 21 {
        let (whole, fraction) = digits.split_at(point as usize);
        write!(out, "{whole}.{fraction}")?;
    } else if -6 < point && point <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take(-point as usize));
        out.push_str(&digits);
    } else {
        let (lead, rest) = digits.split_at(1);
        out.push_str(lead);
        if !rest.is_empty() {
            write!(out, ".{rest}")?;
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        write!(out, "e{sign}{}", exponent.abs())?;
    }
    Ok(())
}

/// Object node: entries sorted by key, keys unique.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalObject(Vec<(String, CanonicalValue)>);

impl CanonicalObject {
    /// Sort `entries` by key. Duplicate keys are a structural error.
    pub fn from_entries(mut entries: Vec<(String, CanonicalValue)>) -> Result<Self, CanonicalError> {
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        if let Some(pair) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(CanonicalError::DuplicateKey(pair[0].0.clone()));
        }
        Ok(Self(entries))
    }

    pub fn get(&self, key: &str) -> Option<&CanonicalValue> {
        self.0
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|i| &self.0[i].1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn without(&self, key: &str) -> CanonicalObject {
        CanonicalObject(self.0.iter().filter(|(k, _)| k != key).cloned().collect())
    }
}

/// Generic value tree the canonical string is emitted from.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Number(CanonicalNumber),
    String(String),
    Array(Vec<CanonicalValue>),
    Object(CanonicalObject),
}

impl CanonicalValue {
    /// Build an object node from `(key, value)` pairs in any order.
    pub fn object<K: Into<String>>(
        entries: impl IntoIterator<Item = (K, CanonicalValue)>,
    ) -> Result<Self, CanonicalError> {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        CanonicalObject::from_entries(entries).map(CanonicalValue::Object)
    }

    pub fn string(s: impl Into<String>) -> Self {
        CanonicalValue::String(s.into())
    }

    /// Lower an arbitrary JSON value.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CanonicalError> {
        Ok(match value {
            serde_json::Value::Null => CanonicalValue::Null,
            serde_json::Value::Bool(b) => CanonicalValue::Bool(*b),
            serde_json::Value::Number(n) => CanonicalValue::Number(number_from_json(n)?),
            serde_json::Value::String(s) => CanonicalValue::String(s.clone()),
            serde_json::Value::Array(items) => CanonicalValue::Array(
                items
                    .iter()
                    .map(CanonicalValue::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(map) => CanonicalValue::object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), CanonicalValue::from_json(v)?)))
                    .collect::<Result<Vec<_>, CanonicalError>>()?,
            )?,
        })
    }

    pub fn as_object(&self) -> Option<&CanonicalObject> {
        match self {
            CanonicalValue::Object(o) => Some(o),
            _ => None,
        }
    }

    fn write_to(&self, out: &mut String) -> Result<(), CanonicalError> {
        match self {
            CanonicalValue::Null => out.push_str("null"),
            CanonicalValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            CanonicalValue::Number(n) => n.write_to(out)?,
            CanonicalValue::String(s) => out.push_str(&serde_json::to_string(s)?),
            CanonicalValue::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_to(out)?;
                }
                out.push(']');
            }
            CanonicalValue::Object(obj) => {
                out.push('{');
                for (i, (key, value)) in obj.0.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(key)?);
                    out.push(':');
                    value.write_to(out)?;
                }
                out.push('}');
            }
        }
        Ok(())
    }
}

fn number_from_json(n: &serde_json::Number) -> Result<CanonicalNumber, CanonicalError> {
    if let Some(i) = n.as_i64() {
        Ok(CanonicalNumber::Int(i))
    } else if let Some(u) = n.as_u64() {
        Ok(CanonicalNumber::UInt(u))
    } else {
        let f = n
            .as_f64()
            .ok_or_else(|| CanonicalError::UnrepresentableNumber(n.to_string()))?;
        CanonicalNumber::float(f, "")
    }
}

/// Types that lower into a [`CanonicalValue`].
pub trait ToCanonical {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError>;
}

impl ToCanonical for str {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        Ok(CanonicalValue::string(self))
    }
}

impl ToCanonical for String {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        Ok(CanonicalValue::string(self.as_str()))
    }
}

impl ToCanonical for bool {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        Ok(CanonicalValue::Bool(*self))
    }
}

impl ToCanonical for f64 {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        CanonicalNumber::float(*self, "").map(CanonicalValue::Number)
    }
}

impl<T: ToCanonical> ToCanonical for [T] {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        self.iter()
            .map(ToCanonical::to_canonical)
            .collect::<Result<Vec<_>, _>>()
            .map(CanonicalValue::Array)
    }
}

impl<T: ToCanonical> ToCanonical for Vec<T> {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        self.as_slice().to_canonical()
    }
}

impl ToCanonical for serde_json::Value {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        CanonicalValue::from_json(self)
    }
}

/// Emit the canonical string of a top-level object, excluding `meta`.
pub fn canonical_string(value: &CanonicalValue) -> Result<String, CanonicalError> {
    let object = value.as_object().ok_or(CanonicalError::NotAnObject)?;
    let mut out = String::new();
    CanonicalValue::Object(object.without(META_KEY)).write_to(&mut out)?;
    Ok(out)
}

/// Canonicalize any value that lowers into a top-level object.
pub fn canonicalize<T: ToCanonical + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    canonical_string(&value.to_canonical()?)
}

/// Canonicalize a JSON value read from elsewhere (e.g. a stored document).
pub fn canonicalize_json(value: &serde_json::Value) -> Result<String, CanonicalError> {
    canonicalize(value)
}
