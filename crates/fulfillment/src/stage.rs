//! Pipeline stages and the values handed between them.
//!
//! Every stage passes through handoffs it does not handle, so the pipeline
//! can feed the whole frontier to each stage in order.

use thiserror::Error;
use tracing::{debug, info};

use slabtrace_core::{AttributeSet, CompanyId, DomainError, LocationId, PartnerId};
use slabtrace_inventory::{DemandSnapshot, LotId, LotNaming, LotRegistry, MoveLineId, StockMoveId};
use slabtrace_products::{BackReference, ProductId};
use slabtrace_purchasing::PurchaseLineId;

use crate::host::{HostError, HostPlatform};
use crate::request::{FulfillmentRequest, Replenishment, RequestId};

#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage}: host call failed: {source}")]
    Host {
        stage: &'static str,
        #[source]
        source: HostError,
    },

    #[error("{stage}: {source}")]
    Domain {
        stage: &'static str,
        #[source]
        source: DomainError,
    },

    #[error("{stage}: {record} is missing")]
    Missing { stage: &'static str, record: String },
}

impl StageError {
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Host { stage, .. }
            | StageError::Domain { stage, .. }
            | StageError::Missing { stage, .. } => stage,
        }
    }

    fn host(stage: &'static str) -> impl FnOnce(HostError) -> StageError {
        move |source| StageError::Host { stage, source }
    }

    fn domain(stage: &'static str) -> impl FnOnce(DomainError) -> StageError {
        move |source| StageError::Domain { stage, source }
    }

    fn missing(stage: &'static str, record: impl core::fmt::Display) -> StageError {
        StageError::Missing {
            stage,
            record: record.to_string(),
        }
    }
}

/// Demand after the procurement boundary: the request's fields plus the
/// procurement group it runs under and its own attribute copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Procurement {
    pub request_id: RequestId,
    pub product_id: ProductId,
    pub quantity: f64,
    pub uom: String,
    pub location_id: LocationId,
    pub company_id: CompanyId,
    pub partner_id: Option<PartnerId>,
    pub name: String,
    pub origin: String,
    pub group: Option<String>,
    pub replenishment: Replenishment,
    pub lot_id: Option<LotId>,
    pub back_reference: BackReference,
    pub attributes: AttributeSet,
}

/// How a procurement picks its procurement group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAssignment {
    /// A group of its own, named after the origin line.
    Dedicated,
    /// The order's group, unless the unit has a known area.
    Shared,
}

impl Procurement {
    /// Dedicated demand and units with a known area get a procurement group
    /// of their own, named after their origin line.
    pub fn from_request(request: &FulfillmentRequest, assignment: GroupAssignment) -> Self {
        let attributes = request.attributes().clone();
        let group = match assignment {
            GroupAssignment::Dedicated => Some(request.origin().to_string()),
            GroupAssignment::Shared if attributes.area > 0.0 => Some(request.origin().to_string()),
            GroupAssignment::Shared => request.order_group().map(str::to_string),
        };

        Self {
            request_id: request.id(),
            product_id: request.product_id(),
            quantity: request.quantity(),
            uom: request.uom().to_string(),
            location_id: request.location_id(),
            company_id: request.company_id(),
            partner_id: request.partner_id(),
            name: request.name().to_string(),
            origin: request.origin().to_string(),
            group,
            replenishment: request.replenishment(),
            lot_id: request.lot_id(),
            back_reference: request.back_reference().clone(),
            attributes,
        }
    }
}

/// What a stage hands to the next one.
#[derive(Debug, Clone, PartialEq)]
pub enum Handoff {
    Request(FulfillmentRequest),
    Procurement(Procurement),
    PurchaseLine(PurchaseLineId),
    Move(StockMoveId),
    MoveLine(MoveLineId),
    Lot(LotId),
}

impl Handoff {
    /// The handoff names a record the host created.
    pub fn is_record(&self) -> bool {
        !matches!(self, Handoff::Request(_) | Handoff::Procurement(_))
    }
}

/// Which requests a handoff serves, and how they must be treated.
#[derive(Debug, Clone, PartialEq)]
pub struct Lineage {
    pub requests: Vec<RequestId>,
    pub company_id: CompanyId,
    pub back_reference: BackReference,
    /// Tracked or unclassifiable: the host may not reuse an existing record.
    pub forbid_reuse: bool,
}

impl Lineage {
    pub fn of(request: &FulfillmentRequest, forbid_reuse: bool) -> Self {
        Self {
            requests: vec![request.id()],
            company_id: request.company_id(),
            back_reference: request.back_reference().clone(),
            forbid_reuse,
        }
    }

    /// Take over the requests of another lineage that reached the same record.
    pub fn absorb(&mut self, other: Lineage) {
        for id in other.requests {
            if !self.requests.contains(&id) {
                self.requests.push(id);
            }
        }
        self.forbid_reuse |= other.forbid_reuse;
    }

    /// Demand the host may not merge also runs under its own group.
    pub fn group_assignment(&self) -> GroupAssignment {
        if self.forbid_reuse {
            GroupAssignment::Dedicated
        } else {
            GroupAssignment::Shared
        }
    }
}

/// One boundary of the propagation pipeline.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Handle `handoff` if it belongs to this stage, otherwise return it as is.
    fn propagate(&self, lineage: &Lineage, handoff: Handoff) -> Result<Vec<Handoff>, StageError>;
}

/// Request -> procurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcurementStage;

impl Stage for ProcurementStage {
    fn name(&self) -> &'static str {
        "procurement"
    }

    fn propagate(&self, lineage: &Lineage, handoff: Handoff) -> Result<Vec<Handoff>, StageError> {
        let Handoff::Request(request) = handoff else {
            return Ok(vec![handoff]);
        };
        let procurement = Procurement::from_request(&request, lineage.group_assignment());
        debug!(
            request_id = %procurement.request_id,
            group = procurement.group.as_deref().unwrap_or(""),
            area = procurement.attributes.area,
            "procurement prepared"
        );
        Ok(vec![Handoff::Procurement(procurement)])
    }
}

/// Buy procurement -> purchase-order line.
#[derive(Debug, Clone)]
pub struct PurchaseStage<H> {
    host: H,
}

impl<H: HostPlatform> PurchaseStage<H> {
    const NAME: &'static str = "purchase";

    pub fn new(host: H) -> Self {
        Self { host }
    }
}

impl<H: HostPlatform> Stage for PurchaseStage<H> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn propagate(&self, lineage: &Lineage, handoff: Handoff) -> Result<Vec<Handoff>, StageError> {
        let procurement = match handoff {
            Handoff::Procurement(p) if p.replenishment == Replenishment::Buy => p,
            other => return Ok(vec![other]),
        };

        let mut payload = self
            .host
            .propose_purchase_line(&procurement)
            .map_err(StageError::host(Self::NAME))?;
        payload.attributes = procurement.attributes.clone();
        payload.procurement_group = procurement.group.clone();
        payload.back_reference = procurement.back_reference.clone();
        if lineage.forbid_reuse {
            if let Some(proposed) = payload.forbid_reuse() {
                info!(
                    request_id = %procurement.request_id,
                    proposed_line = %proposed,
                    "refused to merge tracked demand into an existing purchase line"
                );
            }
        }

        let line_id = self
            .host
            .create_purchase_line(payload)
            .map_err(StageError::host(Self::NAME))?;

        let created: Vec<_> = self
            .host
            .purchase_lines_for(&procurement.back_reference)
            .into_iter()
            .filter(|line| line.id_typed() == line_id)
            .collect();
        if created.is_empty() {
            return Err(StageError::missing(Self::NAME, format!("purchase line {line_id}")));
        }
        for mut line in created {
            if line.is_shared() {
                debug!(%line_id, "purchase line is shared, keeping its attributes");
                continue;
            }
            if line.attributes() != &procurement.attributes {
                debug!(%line_id, "re-asserting purchase line attributes");
                line.set_attributes(procurement.attributes.clone());
                self.host
                    .save_purchase_line(line)
                    .map_err(StageError::host(Self::NAME))?;
            }
        }

        Ok(vec![Handoff::PurchaseLine(line_id)])
    }
}

/// Purchase line -> receipt move, stock procurement -> delivery move.
#[derive(Debug, Clone)]
pub struct MoveStage<H> {
    host: H,
}

impl<H: HostPlatform> MoveStage<H> {
    const NAME: &'static str = "stock_move";

    pub fn new(host: H) -> Self {
        Self { host }
    }

    fn receipt(&self, line_id: PurchaseLineId) -> Result<StockMoveId, StageError> {
        let line = self
            .host
            .purchase_line(line_id)
            .ok_or_else(|| StageError::missing(Self::NAME, format!("purchase line {line_id}")))?;
        let order = self
            .host
            .purchase_order(line.order_id())
            .ok_or_else(|| StageError::missing(Self::NAME, format!("purchase order {}", line.order_id())))?;
        let product = self
            .host
            .product(line.product_id())
            .ok_or_else(|| StageError::missing(Self::NAME, format!("product {}", line.product_id())))?;

        let mut payload = self
            .host
            .prepare_receipt_move(&line)
            .map_err(StageError::host(Self::NAME))?;
        // One move per line: a unique name and origin keep the host from
        // folding moves of the same product together.
        payload.name = line.receipt_move_name(order.name(), product.name());
        payload.origin = line.receipt_origin(order.name());
        payload.purchase_line_id = Some(line_id);
        payload.back_reference = line.back_references().first().cloned();
        payload.attributes = line.attributes().clone();

        let key = payload.back_reference.clone();
        let move_id = self
            .host
            .create_move(payload)
            .map_err(StageError::host(Self::NAME))?;

        if line.is_shared() {
            debug!(%move_id, "receipt of a shared line, keeping host attributes");
        } else if let Some(key) = key {
            self.reassert(&key, move_id, line.attributes())?;
        }
        Ok(move_id)
    }

    fn delivery(&self, procurement: &Procurement) -> Result<StockMoveId, StageError> {
        let mut payload = self
            .host
            .prepare_delivery_move(procurement)
            .map_err(StageError::host(Self::NAME))?;
        payload.attributes = procurement.attributes.clone();
        payload.lot_id = procurement.lot_id;
        payload.back_reference = Some(procurement.back_reference.clone());
        payload.demand = Some(DemandSnapshot {
            attributes: procurement.attributes.clone(),
            lot_id: procurement.lot_id,
        });

        let move_id = self
            .host
            .create_move(payload)
            .map_err(StageError::host(Self::NAME))?;
        self.reassert(&procurement.back_reference, move_id, &procurement.attributes)?;
        Ok(move_id)
    }

    fn reassert(
        &self,
        key: &BackReference,
        move_id: StockMoveId,
        attributes: &AttributeSet,
    ) -> Result<(), StageError> {
        let mut created = self
            .host
            .moves_for(key)
            .into_iter()
            .find(|m| m.id_typed() == move_id)
            .ok_or_else(|| StageError::missing(Self::NAME, format!("stock move {move_id}")))?;
        if created.attributes() != attributes {
            debug!(%move_id, host_area = created.attributes().area, area = attributes.area, "re-asserting move attributes");
            created.set_attributes(attributes.clone());
            self.host
                .save_move(created)
                .map_err(StageError::domain(Self::NAME))?;
        }
        Ok(())
    }
}

impl<H: HostPlatform> Stage for MoveStage<H> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn propagate(&self, _lineage: &Lineage, handoff: Handoff) -> Result<Vec<Handoff>, StageError> {
        match handoff {
            Handoff::PurchaseLine(line_id) => Ok(vec![Handoff::Move(self.receipt(line_id)?)]),
            Handoff::Procurement(p) if p.replenishment == Replenishment::Stock => {
                Ok(vec![Handoff::Move(self.delivery(&p)?)])
            }
            other => Ok(vec![other]),
        }
    }
}

/// Stock move -> move lines.
#[derive(Debug, Clone)]
pub struct MoveLineStage<H> {
    host: H,
}

impl<H: HostPlatform> MoveLineStage<H> {
    const NAME: &'static str = "move_line";

    pub fn new(host: H) -> Self {
        Self { host }
    }
}

impl<H: HostPlatform> Stage for MoveLineStage<H> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn propagate(&self, _lineage: &Lineage, handoff: Handoff) -> Result<Vec<Handoff>, StageError> {
        let Handoff::Move(move_id) = handoff else {
            return Ok(vec![handoff]);
        };
        let stock_move = self
            .host
            .stock_move(move_id)
            .ok_or_else(|| StageError::missing(Self::NAME, format!("stock move {move_id}")))?;

        let existing = self.host.lines_of_move(move_id);
        if !existing.is_empty() {
            return Ok(existing
                .iter()
                .map(|line| Handoff::MoveLine(line.id_typed()))
                .collect());
        }

        let line_id = self
            .host
            .create_move_line(stock_move.move_line_payload(stock_move.quantity()))
            .map_err(StageError::host(Self::NAME))?;
        let mut line = self
            .host
            .move_line(line_id)
            .ok_or_else(|| StageError::missing(Self::NAME, format!("move line {line_id}")))?;
        if line.attributes() != stock_move.attributes() {
            debug!(%line_id, "re-asserting move line attributes");
            line.set_attributes(stock_move.attributes().clone());
            self.host
                .save_move_line(line)
                .map_err(StageError::domain(Self::NAME))?;
        }

        Ok(vec![Handoff::MoveLine(line_id)])
    }
}

/// Labelled receipt move line -> freshly minted lot.
#[derive(Debug)]
pub struct LotStage<H> {
    host: H,
    registry: LotRegistry<H, H>,
}

impl<H: HostPlatform + Clone> LotStage<H> {
    const NAME: &'static str = "lot";

    pub fn new(host: H, naming: LotNaming) -> Self {
        Self {
            registry: LotRegistry::with_naming(host.clone(), host.clone(), naming),
            host,
        }
    }
}

impl<H: HostPlatform + Clone> Stage for LotStage<H> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn propagate(&self, lineage: &Lineage, handoff: Handoff) -> Result<Vec<Handoff>, StageError> {
        let Handoff::MoveLine(line_id) = handoff else {
            return Ok(vec![handoff]);
        };
        let mut line = self
            .host
            .move_line(line_id)
            .ok_or_else(|| StageError::missing(Self::NAME, format!("move line {line_id}")))?;

        let Some(lot) = self
            .registry
            .receive_line(&mut line, lineage.company_id)
            .map_err(StageError::domain(Self::NAME))?
        else {
            return Ok(vec![Handoff::MoveLine(line_id)]);
        };

        let move_id = line.move_id();
        self.host
            .save_move_line(line)
            .map_err(StageError::domain(Self::NAME))?;

        if let Some(mut stock_move) = self.host.stock_move(move_id) {
            if stock_move.lot_id().is_none() {
                stock_move.set_lot(Some(lot.id_typed()));
                self.host
                    .save_move(stock_move)
                    .map_err(StageError::domain(Self::NAME))?;
            }
        }

        Ok(vec![Handoff::Lot(lot.id_typed())])
    }
}
