use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use slabtrace_core::{AttributeSet, CompanyId, DomainError, DomainResult, Entity};
use slabtrace_products::ProductId;

slabtrace_core::record_id!(
    /// Lot / serial number identifier.
    LotId
);

/// Identity of one physical tracked unit.
///
/// The attribute bundle is frozen at creation: it is the ground truth every
/// downstream record is reconciled toward. Only the customs number may be
/// filled in later, once, from the first stock quantity that carries one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    id: LotId,
    name: String,
    product_id: ProductId,
    company_id: CompanyId,
    attributes: AttributeSet,
    customs_number: Option<String>,
    created_at: DateTime<Utc>,
}

impl Lot {
    pub fn new(
        id: LotId,
        name: impl Into<String>,
        product_id: ProductId,
        company_id: CompanyId,
        attributes: AttributeSet,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("lot name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            product_id,
            company_id,
            attributes,
            customs_number: None,
            created_at,
        })
    }

    pub fn id_typed(&self) -> LotId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn customs_number(&self) -> Option<&str> {
        self.customs_number.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Record the inherited customs number. A number already present wins.
    ///
    /// Returns `true` when the lot changed.
    pub fn inherit_customs_number(&mut self, customs_number: &str) -> bool {
        if self.customs_number.is_some() || customs_number.trim().is_empty() {
            return false;
        }
        self.customs_number = Some(customs_number.to_string());
        true
    }
}

impl Entity for Lot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot() -> Lot {
        Lot::new(
            LotId::generate(),
            "UYI-001",
            ProductId::generate(),
            CompanyId::new(),
            AttributeSet::from_dimensions(2.0, 1.0, 2.0).unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn customs_number_is_inherited_once() {
        let mut lot = lot();
        assert!(lot.inherit_customs_number("24 47 3485 4000123"));
        assert!(!lot.inherit_customs_number("99 99 9999 9999999"));
        assert_eq!(lot.customs_number(), Some("24 47 3485 4000123"));
    }

    #[test]
    fn blank_customs_number_is_ignored() {
        let mut lot = lot();
        assert!(!lot.inherit_customs_number("  "));
        assert_eq!(lot.customs_number(), None);
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Lot::new(
            LotId::generate(),
            "",
            ProductId::generate(),
            CompanyId::new(),
            AttributeSet::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
