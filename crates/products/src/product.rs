use serde::{Deserialize, Serialize};

use slabtrace_core::{DomainError, DomainResult, Entity};

slabtrace_core::record_id!(
    /// Product identifier.
    ProductId
);

/// How individual units of a product are identified in stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Fungible quantity; units are interchangeable.
    #[default]
    None,
    /// Units are grouped under lot numbers.
    Lot,
    /// Every unit carries its own serial number.
    Serial,
}

impl TrackingMode {
    pub fn is_tracked(self) -> bool {
        self != TrackingMode::None
    }
}

/// What a replenishment rule does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Buy,
    Pull,
    Manufacture,
}

/// Whether a rule takes from stock or triggers a new procurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcureMethod {
    MakeToStock,
    MakeToOrder,
}

/// One rule of a product route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub action: RuleAction,
    pub procure_method: ProcureMethod,
}

impl RouteRule {
    pub fn buy_to_order() -> Self {
        Self {
            action: RuleAction::Buy,
            procure_method: ProcureMethod::MakeToOrder,
        }
    }

    pub fn pull_from_stock() -> Self {
        Self {
            action: RuleAction::Pull,
            procure_method: ProcureMethod::MakeToStock,
        }
    }
}

/// Product metadata relevant to fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    tracking: TrackingMode,
    rules: Vec<RouteRule>,
    require_lot_selection_on_sale: bool,
}

impl Product {
    /// Create an untracked product with no replenishment rules.
    pub fn new(id: ProductId, sku: impl Into<String>, name: impl Into<String>) -> DomainResult<Self> {
        let sku = sku.into();
        let name = name.into();

        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }

        Ok(Self {
            id,
            sku,
            name,
            tracking: TrackingMode::None,
            rules: Vec::new(),
            require_lot_selection_on_sale: false,
        })
    }

    pub fn with_tracking(mut self, tracking: TrackingMode) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn with_rule(mut self, rule: RouteRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sale lines must name a lot when on-hand units exist.
    pub fn requiring_lot_selection(mut self) -> Self {
        self.require_lot_selection_on_sale = true;
        self
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracking(&self) -> TrackingMode {
        self.tracking
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn requires_lot_selection_on_sale(&self) -> bool {
        self.require_lot_selection_on_sale
    }

    /// A sale of this product is bought specifically for the order.
    pub fn is_bought_to_order(&self) -> bool {
        self.rules.iter().any(|rule| {
            rule.action == RuleAction::Buy && rule.procure_method == ProcureMethod::MakeToOrder
        })
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
