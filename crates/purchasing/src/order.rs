use serde::{Deserialize, Serialize};

use slabtrace_core::{CompanyId, DomainError, DomainResult, Entity, PartnerId};

slabtrace_core::record_id!(
    /// Purchase order identifier.
    PurchaseOrderId
);

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Draft,
    Confirmed,
    Cancelled,
}

/// Purchase order header. Lines are stored separately and reference the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    name: String,
    company_id: CompanyId,
    partner_id: Option<PartnerId>,
    status: PurchaseOrderStatus,
}

impl PurchaseOrder {
    pub fn new(
        id: PurchaseOrderId,
        name: impl Into<String>,
        company_id: CompanyId,
        partner_id: Option<PartnerId>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("purchase order name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            company_id,
            partner_id,
            status: PurchaseOrderStatus::Draft,
        })
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn partner_id(&self) -> Option<PartnerId> {
        self.partner_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    /// New lines may only be added while the order is a draft.
    pub fn ensure_accepts_lines(&self) -> DomainResult<()> {
        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant(format!(
                "purchase order {} is no longer a draft",
                self.name
            )));
        }
        Ok(())
    }

    pub fn confirm(&mut self) -> DomainResult<()> {
        match self.status {
            PurchaseOrderStatus::Draft => {
                self.status = PurchaseOrderStatus::Confirmed;
                Ok(())
            }
            PurchaseOrderStatus::Confirmed => {
                Err(DomainError::conflict("purchase order is already confirmed"))
            }
            PurchaseOrderStatus::Cancelled => Err(DomainError::invariant(
                "cancelled purchase orders cannot be confirmed",
            )),
        }
    }
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
