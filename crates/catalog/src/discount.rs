use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cakestore_core::{DiscountId, DomainError, DomainResult};

/// Kind of reduction a discount applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscountType {
    /// `value` is a percentage of the price.
    Percentage,
    /// `value` is an absolute amount off the price.
    Flat,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "PERCENTAGE",
            DiscountType::Flat => "FLAT",
        }
    }
}

impl core::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = DomainError;

    /// Case-insensitive: `"percentage"`, `"Flat"` and `"FLAT"` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PERCENTAGE" => Ok(DiscountType::Percentage),
            "FLAT" => Ok(DiscountType::Flat),
            _ => Err(DomainError::validation(format!(
                "invalid discount type '{}': must be one of PERCENTAGE, FLAT",
                s.trim()
            ))),
        }
    }
}

/// The client-supplied part of a discount: what kind, and how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountTerms {
    pub kind: DiscountType,
    pub value: Decimal,
}

impl DiscountTerms {
    pub fn new(kind: DiscountType, value: Decimal) -> Self {
        Self { kind, value }
    }

    /// Combine the two optional request fields.
    ///
    /// A discount only exists when *both* fields are supplied; a lone type or
    /// lone value means "no discount". The type is still parsed when present
    /// with a value, so a malformed type is reported rather than ignored.
    pub fn from_parts(kind: Option<&str>, value: Option<Decimal>) -> DomainResult<Option<Self>> {
        match (kind, value) {
            (Some(kind), Some(value)) => Ok(Some(Self::new(kind.parse()?, value))),
            _ => Ok(None),
        }
    }
}

/// A discount record, owned by exactly one cake.
///
/// `id` is `None` until the owning cake has been saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discount {
    pub id: Option<DiscountId>,
    #[serde(rename = "type")]
    pub kind: DiscountType,
    pub value: Decimal,
}

impl Discount {
    pub fn unsaved(terms: DiscountTerms) -> Self {
        Self {
            id: None,
            kind: terms.kind,
            value: terms.value,
        }
    }

    pub fn terms(&self) -> DiscountTerms {
        DiscountTerms::new(self.kind, self.value)
    }

    /// Update kind and value in place, keeping the row identity.
    pub fn overwrite(&mut self, terms: DiscountTerms) {
        self.kind = terms.kind;
        self.value = terms.value;
    }
}
