//! In-memory host platform.
//!
//! Behaves like the native ERP the pipeline runs inside: it proposes folding
//! new purchase demand into an open line of the same product, and it
//! recomputes `area = height * width` on every move and move line it creates,
//! zeroing areas that were entered without dimensions. Intended for tests and
//! local runs.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::debug;

use slabtrace_core::{AttributeSet, CompanyId, DomainError, DomainResult, Entity, LocationId};
use slabtrace_fulfillment::{HostError, HostPlatform, HostResult, Procurement};
use slabtrace_inventory::{
    InMemorySequences, LocationUsage, Lot, LotId, LotStore, MoveLine, MoveLineId, MoveLinePayload,
    Picking, PickingId, PickingKind, QuantFilter, QuantId, QuantQuery, SequenceDefinition,
    SequenceService, StockMove, StockMoveId, StockMovePayload, StockQuant, StockStore,
};
use slabtrace_products::{BackReference, InMemoryCatalog, Product, ProductCatalog, ProductId};
use slabtrace_purchasing::{
    PurchaseLine, PurchaseLineId, PurchaseLinePayload, PurchaseOrder, PurchaseOrderId,
    PurchaseOrderStatus,
};

#[derive(Debug, Default)]
struct State {
    orders: Vec<PurchaseOrder>,
    purchase_lines: Vec<PurchaseLine>,
    pickings: Vec<Picking>,
    moves: Vec<StockMove>,
    move_lines: Vec<MoveLine>,
    lots: Vec<Lot>,
    quants: Vec<StockQuant>,
    next_order_no: u32,
    next_receipt_no: u32,
    next_delivery_no: u32,
    rejected_products: Vec<ProductId>,
}

impl State {
    fn draft_order_for(&mut self, company_id: CompanyId) -> DomainResult<PurchaseOrderId> {
        if let Some(order) = self
            .orders
            .iter()
            .find(|o| o.company_id() == company_id && o.status() == PurchaseOrderStatus::Draft)
        {
            return Ok(order.id_typed());
        }
        self.next_order_no += 1;
        let order = PurchaseOrder::new(
            PurchaseOrderId::generate(),
            format!("P{:05}", self.next_order_no),
            company_id,
            None,
        )?;
        let id = order.id_typed();
        self.orders.push(order);
        Ok(id)
    }

    fn picking_for(&mut self, kind: PickingKind, origin: &str) -> PickingId {
        if let Some(picking) = self
            .pickings
            .iter()
            .find(|p| p.kind() == kind && p.origin() == origin && p.state().is_mutable())
        {
            return picking.id_typed();
        }
        let name = match kind {
            PickingKind::Incoming => {
                self.next_receipt_no += 1;
                format!("WH/IN/{:05}", self.next_receipt_no)
            }
            _ => {
                self.next_delivery_no += 1;
                format!("WH/OUT/{:05}", self.next_delivery_no)
            }
        };
        let picking = Picking::new(PickingId::generate(), name, kind, origin);
        let id = picking.id_typed();
        self.pickings.push(picking);
        id
    }
}

/// Native field recomputation: area always follows the dimensions.
fn native_recompute(attributes: &mut AttributeSet) {
    attributes.area = attributes.height * attributes.width;
}

fn find<E: Entity + Clone>(records: &[E], id: &E::Id) -> Option<E> {
    records.iter().find(|r| r.id() == id).cloned()
}

/// Overwrite the stored version of `record`.
fn replace<E: Entity>(records: &mut [E], record: E, kind: &str) -> DomainResult<()> {
    let slot = records
        .iter_mut()
        .find(|r| r.same_identity(&record))
        .ok_or_else(|| DomainError::not_found(format!("{kind} {:?}", record.id())))?;
    *slot = record;
    Ok(())
}

fn poisoned() -> DomainError {
    DomainError::conflict("host state lock poisoned")
}

#[derive(Debug)]
pub struct InMemoryHost {
    catalog: InMemoryCatalog,
    sequences: InMemorySequences,
    state: RwLock<State>,
    company_id: CompanyId,
    stock_location: LocationId,
    customer_location: LocationId,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self {
            catalog: InMemoryCatalog::new(),
            sequences: InMemorySequences::new(),
            state: RwLock::new(State::default()),
            company_id: CompanyId::new(),
            stock_location: LocationId::new(),
            customer_location: LocationId::new(),
        }
    }

    /// Company the host runs for.
    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn stock_location(&self) -> LocationId {
        self.stock_location
    }

    pub fn register_product(&self, product: Product) {
        self.catalog.register(product);
    }

    pub fn sequences(&self) -> &InMemorySequences {
        &self.sequences
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| poisoned())
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| poisoned())
    }

    pub fn purchase_orders(&self) -> Vec<PurchaseOrder> {
        self.read().map(|s| s.orders.clone()).unwrap_or_default()
    }

    pub fn purchase_lines(&self) -> Vec<PurchaseLine> {
        self.read().map(|s| s.purchase_lines.clone()).unwrap_or_default()
    }

    pub fn pickings(&self) -> Vec<Picking> {
        self.read().map(|s| s.pickings.clone()).unwrap_or_default()
    }

    pub fn moves(&self) -> Vec<StockMove> {
        self.read().map(|s| s.moves.clone()).unwrap_or_default()
    }

    pub fn lots(&self) -> Vec<Lot> {
        self.read().map(|s| s.lots.clone()).unwrap_or_default()
    }

    /// Make the host refuse every purchase for `product_id`.
    pub fn reject_purchases_for(&self, product_id: ProductId) -> DomainResult<()> {
        self.write()?.rejected_products.push(product_id);
        Ok(())
    }

    pub fn add_quant(&self, quant: StockQuant) -> DomainResult<()> {
        self.write()?.quants.push(quant);
        Ok(())
    }

    pub fn confirm_purchase_order(&self, id: PurchaseOrderId) -> DomainResult<()> {
        let mut state = self.write()?;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id_typed() == id)
            .ok_or_else(|| DomainError::not_found(format!("purchase order {id}")))?;
        order.confirm()
    }

    /// Book the stock effect of a transfer's move lines.
    ///
    /// Receipts put each lotted line into stock with `customs_number`;
    /// deliveries take the lot out of stock and into the customer location.
    /// Returns the lots that moved.
    pub fn apply_transfer(&self, picking_id: PickingId, customs_number: Option<&str>) -> DomainResult<Vec<LotId>> {
        let mut state = self.write()?;
        let picking = state
            .pickings
            .iter()
            .find(|p| p.id_typed() == picking_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("transfer {picking_id}")))?;
        if !picking.state().is_mutable() {
            return Err(DomainError::invariant(format!("transfer {} is closed", picking.name())));
        }

        let move_ids: Vec<StockMoveId> = state
            .moves
            .iter()
            .filter(|m| m.picking_id() == picking_id)
            .map(StockMove::id_typed)
            .collect();
        let lines: Vec<MoveLine> = state
            .move_lines
            .iter()
            .filter(|l| move_ids.contains(&l.move_id()) && l.quantity() > 0.0)
            .cloned()
            .collect();

        let now = Utc::now();
        let mut moved = Vec::new();
        for line in lines {
            let Some(lot_id) = line.lot_id() else {
                continue;
            };
            match picking.kind() {
                PickingKind::Incoming => state.quants.push(StockQuant {
                    id: QuantId::generate(),
                    product_id: line.product_id(),
                    lot_id: Some(lot_id),
                    location_id: self.stock_location,
                    location_usage: LocationUsage::Internal,
                    quantity: line.quantity(),
                    in_date: now,
                    customs_number: customs_number.map(str::to_string),
                }),
                PickingKind::Internal => continue,
                PickingKind::Outgoing => {
                    let mut carried = None;
                    if let Some(quant) = state
                        .quants
                        .iter_mut()
                        .find(|q| q.lot_id == Some(lot_id) && q.location_usage == LocationUsage::Internal && q.quantity > 0.0)
                    {
                        quant.quantity -= line.quantity();
                        carried = quant.customs_number.clone();
                    }
                    state.quants.push(StockQuant {
                        id: QuantId::generate(),
                        product_id: line.product_id(),
                        lot_id: Some(lot_id),
                        location_id: self.customer_location,
                        location_usage: LocationUsage::Customer,
                        quantity: line.quantity(),
                        in_date: now,
                        customs_number: carried,
                    });
                }
            }
            if !moved.contains(&lot_id) {
                moved.push(lot_id);
            }
        }
        Ok(moved)
    }

    pub fn mark_done(&self, picking_id: PickingId) -> DomainResult<()> {
        let mut state = self.write()?;
        let picking = state
            .pickings
            .iter_mut()
            .find(|p| p.id_typed() == picking_id)
            .ok_or_else(|| DomainError::not_found(format!("transfer {picking_id}")))?;
        picking.mark_done()
    }
}

impl ProductCatalog for InMemoryHost {
    fn product(&self, id: ProductId) -> Option<Product> {
        self.catalog.product(id)
    }
}

impl SequenceService for InMemoryHost {
    fn next(&self, code: &str, definition: &SequenceDefinition) -> DomainResult<String> {
        self.sequences.next(code, definition)
    }
}

impl QuantQuery for InMemoryHost {
    fn positive_quants(&self, filter: &QuantFilter) -> Vec<StockQuant> {
        self.read()
            .map(|s| s.quants.iter().filter(|q| filter.matches(q)).cloned().collect())
            .unwrap_or_default()
    }
}

impl LotStore for InMemoryHost {
    fn insert_lot(&self, lot: Lot) -> DomainResult<()> {
        let mut state = self.write()?;
        if state
            .lots
            .iter()
            .any(|l| l.product_id() == lot.product_id() && l.name() == lot.name())
        {
            return Err(DomainError::conflict(format!("lot {} already exists", lot.name())));
        }
        state.lots.push(lot);
        Ok(())
    }

    fn replace_lot(&self, lot: Lot) -> DomainResult<()> {
        replace(&mut self.write()?.lots, lot, "lot")
    }

    fn lot(&self, id: LotId) -> Option<Lot> {
        find(&self.read().ok()?.lots, &id)
    }

    fn lot_by_name(&self, product_id: ProductId, name: &str) -> Option<Lot> {
        self.read()
            .ok()?
            .lots
            .iter()
            .find(|l| l.product_id() == product_id && l.name() == name)
            .cloned()
    }
}

impl StockStore for InMemoryHost {
    fn picking(&self, id: PickingId) -> Option<Picking> {
        find(&self.read().ok()?.pickings, &id)
    }

    fn stock_move(&self, id: StockMoveId) -> Option<StockMove> {
        find(&self.read().ok()?.moves, &id)
    }

    fn move_line(&self, id: MoveLineId) -> Option<MoveLine> {
        find(&self.read().ok()?.move_lines, &id)
    }

    fn moves_of_picking(&self, id: PickingId) -> Vec<StockMove> {
        self.read()
            .map(|s| s.moves.iter().filter(|m| m.picking_id() == id).cloned().collect())
            .unwrap_or_default()
    }

    fn lines_of_move(&self, id: StockMoveId) -> Vec<MoveLine> {
        self.read()
            .map(|s| s.move_lines.iter().filter(|l| l.move_id() == id).cloned().collect())
            .unwrap_or_default()
    }

    fn save_move(&self, stock_move: StockMove) -> DomainResult<()> {
        replace(&mut self.write()?.moves, stock_move, "stock move")
    }

    fn save_move_line(&self, line: MoveLine) -> DomainResult<()> {
        replace(&mut self.write()?.move_lines, line, "move line")
    }
}

impl HostPlatform for InMemoryHost {
    fn propose_purchase_line(&self, procurement: &Procurement) -> HostResult<PurchaseLinePayload> {
        if self.catalog.product(procurement.product_id).is_none() {
            return Err(HostError::NotFound(format!("product {}", procurement.product_id)));
        }
        let mut state = self.write()?;
        if state.rejected_products.contains(&procurement.product_id) {
            return Err(HostError::Rejected(format!(
                "purchasing is blocked for product {}",
                procurement.product_id
            )));
        }
        let order_id = state.draft_order_for(procurement.company_id)?;
        let reuse_line = state
            .purchase_lines
            .iter()
            .find(|l| {
                l.order_id() == order_id && l.product_id() == procurement.product_id && l.uom() == procurement.uom
            })
            .map(PurchaseLine::id_typed);

        Ok(PurchaseLinePayload {
            order_id,
            product_id: procurement.product_id,
            quantity: procurement.quantity,
            uom: procurement.uom.clone(),
            name: procurement.name.clone(),
            back_reference: procurement.back_reference.clone(),
            procurement_group: procurement.group.clone(),
            attributes: AttributeSet::default(),
            reuse_line,
        })
    }

    fn create_purchase_line(&self, payload: PurchaseLinePayload) -> HostResult<PurchaseLineId> {
        let mut state = self.write()?;
        let order = state
            .orders
            .iter()
            .find(|o| o.id_typed() == payload.order_id)
            .ok_or_else(|| HostError::NotFound(format!("purchase order {}", payload.order_id)))?;
        order.ensure_accepts_lines()?;

        if let Some(reuse) = payload.reuse_line {
            let line = state
                .purchase_lines
                .iter_mut()
                .find(|l| l.id_typed() == reuse)
                .ok_or_else(|| HostError::NotFound(format!("purchase line {reuse}")))?;
            line.absorb(&payload)?;
            debug!(line_id = %reuse, "host merged demand into existing purchase line");
            return Ok(reuse);
        }

        let line_no = state
            .purchase_lines
            .iter()
            .filter(|l| l.order_id() == payload.order_id)
            .count() as u32
            + 1;
        let line = PurchaseLine::from_payload(PurchaseLineId::generate(), line_no, payload)?;
        let id = line.id_typed();
        state.purchase_lines.push(line);
        Ok(id)
    }

    fn purchase_line(&self, id: PurchaseLineId) -> Option<PurchaseLine> {
        find(&self.read().ok()?.purchase_lines, &id)
    }

    fn purchase_order(&self, id: PurchaseOrderId) -> Option<PurchaseOrder> {
        find(&self.read().ok()?.orders, &id)
    }

    fn purchase_lines_for(&self, key: &BackReference) -> Vec<PurchaseLine> {
        self.read()
            .map(|s| s.purchase_lines.iter().filter(|l| l.serves(key)).cloned().collect())
            .unwrap_or_default()
    }

    fn save_purchase_line(&self, line: PurchaseLine) -> HostResult<()> {
        Ok(replace(&mut self.write()?.purchase_lines, line, "purchase line")?)
    }

    fn prepare_receipt_move(&self, line: &PurchaseLine) -> HostResult<StockMovePayload> {
        let product = self
            .catalog
            .product(line.product_id())
            .ok_or_else(|| HostError::NotFound(format!("product {}", line.product_id())))?;
        let mut state = self.write()?;
        let order_name = state
            .orders
            .iter()
            .find(|o| o.id_typed() == line.order_id())
            .map(|o| o.name().to_string())
            .ok_or_else(|| HostError::NotFound(format!("purchase order {}", line.order_id())))?;
        let picking_id = state.picking_for(PickingKind::Incoming, &order_name);

        Ok(StockMovePayload {
            name: product.name().to_string(),
            origin: order_name,
            product_id: line.product_id(),
            quantity: line.quantity(),
            uom: line.uom().to_string(),
            picking_id,
            kind: PickingKind::Incoming,
            purchase_line_id: Some(line.id_typed()),
            back_reference: None,
            lot_id: None,
            attributes: AttributeSet::default(),
            demand: None,
        })
    }

    fn prepare_delivery_move(&self, procurement: &Procurement) -> HostResult<StockMovePayload> {
        let product = self
            .catalog
            .product(procurement.product_id)
            .ok_or_else(|| HostError::NotFound(format!("product {}", procurement.product_id)))?;
        let mut state = self.write()?;
        let origin = procurement.group.clone().unwrap_or_else(|| procurement.origin.clone());
        let picking_id = state.picking_for(PickingKind::Outgoing, &origin);

        Ok(StockMovePayload {
            name: product.name().to_string(),
            origin,
            product_id: procurement.product_id,
            quantity: procurement.quantity,
            uom: procurement.uom.clone(),
            picking_id,
            kind: PickingKind::Outgoing,
            purchase_line_id: None,
            back_reference: None,
            lot_id: None,
            attributes: AttributeSet::default(),
            demand: None,
        })
    }

    fn create_move(&self, mut payload: StockMovePayload) -> HostResult<StockMoveId> {
        native_recompute(&mut payload.attributes);
        let stock_move = StockMove::from_payload(StockMoveId::generate(), payload)?;
        let id = stock_move.id_typed();
        self.write()?.moves.push(stock_move);
        Ok(id)
    }

    fn moves_for(&self, key: &BackReference) -> Vec<StockMove> {
        self.read()
            .map(|s| {
                s.moves
                    .iter()
                    .filter(|m| m.back_reference() == Some(key))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn create_move_line(&self, mut payload: MoveLinePayload) -> HostResult<MoveLineId> {
        let mut state = self.write()?;
        if !state.moves.iter().any(|m| m.id_typed() == payload.move_id) {
            return Err(HostError::NotFound(format!("stock move {}", payload.move_id)));
        }
        native_recompute(&mut payload.attributes);
        let line = MoveLine::from_payload(MoveLineId::generate(), payload)?;
        let id = line.id_typed();
        state.move_lines.push(line);
        Ok(id)
    }
}
