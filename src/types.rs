//! Shared domain types used across every component.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A fixed-point rational quantity (need/picked/ordered/received, ...).
///
/// Every upstream quantity field is decoded into this type rather than
/// `f64`: the upstream ERP itself represents quantities as fixed-point
/// decimals, and summing floats across thousands of rows would drift.
pub type Qty = Decimal;

/// An opaque manufacturing tracking number.
///
/// Shape: alphanumeric plus hyphen, 2-50 characters, case preserved.
/// `Mto` never normalizes case; the upstream treats `AK2510034` and
/// `ak2510034` as distinct identifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Mto(String);

impl Mto {
    /// Validates and wraps a caller-supplied MTO string.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let len = raw.chars().count();
        if !(2..=50).contains(&len) {
            return Err(Error::validation(format!(
                "mto length must be 2-50 characters, got {len}"
            )));
        }
        if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::validation(
                "mto must be alphanumeric plus hyphen".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Mto {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A dotted material code, e.g. `"05.02.003"`.
///
/// The leading two-digit group is the class prefix the classifier (C8)
/// matches on; the rest of the code is opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MaterialCode(String);

impl MaterialCode {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaterialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Auxiliary-property id. Defaults to `0` when the upstream omits it
/// (see `SPEC_FULL.md` §4's resolution of the aux-property Open Question).
pub type AuxPropId = i64;

/// The aggregation key used throughout C9: a (material code, aux-property)
/// pair. Variants of the same material code are distinguished by this key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub material_code: MaterialCode,
    pub aux_prop_id: AuxPropId,
}

impl VariantKey {
    #[must_use]
    pub fn new(material_code: MaterialCode, aux_prop_id: Option<AuxPropId>) -> Self {
        Self {
            material_code,
            aux_prop_id: aux_prop_id.unwrap_or(0),
        }
    }
}

/// Which tier of the lookup pipeline produced an assembled result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Memory,
    Persistent,
    Live,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Memory => "memory",
            Self::Persistent => "persistent",
            Self::Live => "live",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mto_parse_accepts_valid_shapes() {
        assert!(Mto::parse("AK2510034").is_ok());
        assert!(Mto::parse("ak-001").is_ok());
        assert!(Mto::parse("AB").is_ok());
    }

    #[test]
    fn mto_parse_rejects_bad_shapes() {
        assert!(Mto::parse("A").is_err());
        assert!(Mto::parse("x".repeat(51)).is_err());
        assert!(Mto::parse("bad mto!").is_err());
    }

    #[test]
    fn mto_preserves_case() {
        let mto = Mto::parse("ak2510034").unwrap();
        assert_eq!(mto.as_str(), "ak2510034");
    }

    #[test]
    fn variant_key_defaults_aux_prop_to_zero() {
        let key = VariantKey::new(MaterialCode::new("05.02.003"), None);
        assert_eq!(key.aux_prop_id, 0);
    }
}
