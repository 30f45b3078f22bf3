//! Reconciliation of stock records toward their lot.
//!
//! A lot's attribute bundle is the ground truth for every move and move line
//! that references it. The host may drift records away from it (recomputing
//! derived fields, consolidating lines); the guard pulls them back at document
//! checkpoints. Passes are idempotent, never fail, and never write a lot.

use tracing::{debug, info, warn};

use slabtrace_core::AttributeSet;
use slabtrace_inventory::{
    LocationUsage, LotId, LotStore, MoveLineId, PickingId, PickingKind, QuantQuery, StockMove,
    StockMoveId, StockStore, customs_number_for_lot,
};

/// Where the guard looks for the customs number of a lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardSettings {
    pub customs_usages: Vec<LocationUsage>,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            customs_usages: vec![LocationUsage::Internal],
        }
    }
}

/// Records a reconciliation pass covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileScope {
    /// All moves of a transfer and all their lines.
    Picking(PickingId),
    Records {
        moves: Vec<StockMoveId>,
        move_lines: Vec<MoveLineId>,
    },
}

/// A record the guard could not evaluate or write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkippedRecord {
    Picking { id: PickingId, reason: String },
    Move { id: StockMoveId, reason: String },
    MoveLine { id: MoveLineId, reason: String },
}

/// Outcome of one guard pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records holding a lot reference that were compared with their lot.
    pub examined: usize,
    pub corrected_moves: Vec<StockMoveId>,
    pub corrected_lines: Vec<MoveLineId>,
    pub backfilled_moves: Vec<StockMoveId>,
    pub skipped: Vec<SkippedRecord>,
}

impl ReconcileReport {
    /// Nothing was written.
    pub fn is_clean(&self) -> bool {
        self.corrected_moves.is_empty()
            && self.corrected_lines.is_empty()
            && self.backfilled_moves.is_empty()
    }

    /// Fold the outcome of another pass into this one.
    pub fn absorb(&mut self, other: ReconcileReport) {
        self.examined += other.examined;
        for id in other.corrected_moves {
            if !self.corrected_moves.contains(&id) {
                self.corrected_moves.push(id);
            }
        }
        for id in other.corrected_lines {
            self.corrected_line(id);
        }
        self.backfilled_moves.extend(other.backfilled_moves);
        self.skipped.extend(other.skipped);
    }

    fn corrected_line(&mut self, id: MoveLineId) {
        if !self.corrected_lines.contains(&id) {
            self.corrected_lines.push(id);
        }
    }
}

/// Anything that can run a reconciliation pass over a scope.
pub trait Reconcile: Send + Sync {
    fn reconcile(&self, scope: &ReconcileScope) -> ReconcileReport;
}

#[derive(Debug, Clone)]
pub struct ConsistencyGuard<S> {
    store: S,
    settings: GuardSettings,
}

impl<S> ConsistencyGuard<S>
where
    S: StockStore + LotStore + QuantQuery,
{
    pub fn new(store: S) -> Self {
        Self::with_settings(store, GuardSettings::default())
    }

    pub fn with_settings(store: S, settings: GuardSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    /// Overwrite every in-scope move, then every in-scope move line, whose
    /// attributes differ from its lot's (customs number included).
    pub fn reconcile(&self, scope: &ReconcileScope) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let (moves, lines) = self.resolve(scope);
        for move_id in moves {
            self.reconcile_move(move_id, &mut report);
        }
        for line_id in lines {
            self.reconcile_line(line_id, false, &mut report);
        }
        if !report.is_clean() {
            info!(
                moves = report.corrected_moves.len(),
                lines = report.corrected_lines.len(),
                "reconciled records toward their lots"
            );
        }
        report
    }

    /// After a save. Finished or cancelled transfers are left alone.
    pub fn on_save(&self, picking_id: PickingId) -> ReconcileReport {
        let Some(picking) = self.store.picking(picking_id) else {
            return Self::missing_picking(picking_id);
        };
        if !picking.state().is_mutable() {
            debug!(picking = %picking.name(), "transfer is closed, skipping reconciliation");
            return ReconcileReport::default();
        }
        self.reconcile(&ReconcileScope::Picking(picking_id))
    }

    /// Before validation: reconcile moves, restore emptied delivery moves from
    /// their demand, then push move attributes down to the move lines.
    pub fn before_validate(&self, picking_id: PickingId) -> ReconcileReport {
        let Some(picking) = self.store.picking(picking_id) else {
            return Self::missing_picking(picking_id);
        };
        let mut report = ReconcileReport::default();
        let move_ids: Vec<StockMoveId> = self
            .store
            .moves_of_picking(picking_id)
            .iter()
            .map(StockMove::id_typed)
            .collect();

        for move_id in &move_ids {
            self.reconcile_move(*move_id, &mut report);
        }

        if picking.kind() == PickingKind::Outgoing {
            for move_id in &move_ids {
                let Some(mut stock_move) = self.store.stock_move(*move_id) else {
                    continue;
                };
                if !stock_move.backfill_from_demand() {
                    continue;
                }
                match self.store.save_move(stock_move) {
                    Ok(()) => {
                        info!(move_id = %move_id, "delivery move restored from sale demand");
                        report.backfilled_moves.push(*move_id);
                        // The demand may describe the unit differently from its lot.
                        self.reconcile_move(*move_id, &mut report);
                    }
                    Err(err) => Self::skip_move(&mut report, *move_id, err.to_string()),
                }
            }
        }

        for move_id in &move_ids {
            let Some(stock_move) = self.store.stock_move(*move_id) else {
                continue;
            };
            if stock_move.lot_id().is_some() || stock_move.attributes().area > 0.0 {
                self.push_to_lines(&stock_move, &mut report);
            }
        }

        report
    }

    /// Last pass before the transfer is marked done: every lotted move, then
    /// the move lines with a lot and a positive quantity.
    pub fn before_done(&self, picking_id: PickingId) -> ReconcileReport {
        if self.store.picking(picking_id).is_none() {
            return Self::missing_picking(picking_id);
        }
        let mut report = ReconcileReport::default();
        let moves = self.store.moves_of_picking(picking_id);
        for stock_move in &moves {
            self.reconcile_move(stock_move.id_typed(), &mut report);
        }
        for stock_move in moves {
            for line in self.store.lines_of_move(stock_move.id_typed()) {
                self.reconcile_line(line.id_typed(), true, &mut report);
            }
        }
        report
    }

    fn resolve(&self, scope: &ReconcileScope) -> (Vec<StockMoveId>, Vec<MoveLineId>) {
        match scope {
            ReconcileScope::Picking(picking_id) => {
                let moves = self.store.moves_of_picking(*picking_id);
                let lines = moves
                    .iter()
                    .flat_map(|m| self.store.lines_of_move(m.id_typed()))
                    .map(|l| l.id_typed())
                    .collect();
                (moves.iter().map(StockMove::id_typed).collect(), lines)
            }
            ReconcileScope::Records { moves, move_lines } => (moves.clone(), move_lines.clone()),
        }
    }

    /// The lot's frozen attributes with the currently resolved customs number.
    ///
    /// The customs number comes from the lot's latest positive quantity in the
    /// configured locations; without one, from the lot itself.
    fn expected(&self, lot_id: LotId) -> Option<AttributeSet> {
        let lot = self.store.lot(lot_id)?;
        let customs = customs_number_for_lot(&self.store, lot_id, &self.settings.customs_usages)
            .unwrap_or_else(|| lot.customs_number().unwrap_or_default().to_string());
        Some(lot.attributes().with_resolved_customs(&customs))
    }

    fn reconcile_move(&self, move_id: StockMoveId, report: &mut ReconcileReport) {
        let Some(mut stock_move) = self.store.stock_move(move_id) else {
            Self::skip_move(report, move_id, "move not found".to_string());
            return;
        };
        let Some(lot_id) = stock_move.lot_id() else {
            return;
        };
        report.examined += 1;
        let Some(expected) = self.expected(lot_id) else {
            Self::skip_move(report, move_id, format!("lot {lot_id} not found"));
            return;
        };
        if stock_move.attributes() == &expected {
            return;
        }

        debug!(%move_id, %lot_id, area = stock_move.attributes().area, lot_area = expected.area, "move drifted from its lot");
        stock_move.set_attributes(expected);
        if let Err(err) = self.store.save_move(stock_move.clone()) {
            Self::skip_move(report, move_id, err.to_string());
            return;
        }
        report.corrected_moves.push(move_id);
        self.push_to_lines(&stock_move, report);
    }

    fn reconcile_line(
        &self,
        line_id: MoveLineId,
        require_quantity: bool,
        report: &mut ReconcileReport,
    ) {
        let Some(mut line) = self.store.move_line(line_id) else {
            Self::skip_line(report, line_id, "move line not found".to_string());
            return;
        };
        let Some(lot_id) = line.lot_id() else {
            return;
        };
        if require_quantity && line.quantity() <= 0.0 {
            return;
        }
        report.examined += 1;
        let Some(expected) = self.expected(lot_id) else {
            Self::skip_line(report, line_id, format!("lot {lot_id} not found"));
            return;
        };
        if line.attributes() == &expected {
            return;
        }

        debug!(%line_id, %lot_id, "move line drifted from its lot");
        line.set_attributes(expected);
        match self.store.save_move_line(line) {
            Ok(()) => report.corrected_line(line_id),
            Err(err) => Self::skip_line(report, line_id, err.to_string()),
        }
    }

    /// Copy a move's attributes (and, for deliveries, its lot) to the lines
    /// that carry no other lot.
    fn push_to_lines(&self, stock_move: &StockMove, report: &mut ReconcileReport) {
        for mut line in self.store.lines_of_move(stock_move.id_typed()) {
            if line.lot_id().is_some() && line.lot_id() != stock_move.lot_id() {
                continue;
            }
            let mut changed = false;
            if line.attributes() != stock_move.attributes() {
                line.set_attributes(stock_move.attributes().clone());
                changed = true;
            }
            if stock_move.is_outgoing() && line.lot_id().is_none() && stock_move.lot_id().is_some() {
                line.set_lot(stock_move.lot_id());
                changed = true;
            }
            if !changed {
                continue;
            }
            let line_id = line.id_typed();
            match self.store.save_move_line(line) {
                Ok(()) => report.corrected_line(line_id),
                Err(err) => Self::skip_line(report, line_id, err.to_string()),
            }
        }
    }

    fn missing_picking(id: PickingId) -> ReconcileReport {
        warn!(picking_id = %id, "transfer not found, nothing to reconcile");
        ReconcileReport {
            skipped: vec![SkippedRecord::Picking {
                id,
                reason: "transfer not found".to_string(),
            }],
            ..ReconcileReport::default()
        }
    }

    fn skip_move(report: &mut ReconcileReport, id: StockMoveId, reason: String) {
        warn!(move_id = %id, %reason, "skipping move");
        report.skipped.push(SkippedRecord::Move { id, reason });
    }

    fn skip_line(report: &mut ReconcileReport, id: MoveLineId, reason: String) {
        warn!(line_id = %id, %reason, "skipping move line");
        report.skipped.push(SkippedRecord::MoveLine { id, reason });
    }
}

impl<S> Reconcile for ConsistencyGuard<S>
where
    S: StockStore + LotStore + QuantQuery,
{
    fn reconcile(&self, scope: &ReconcileScope) -> ReconcileReport {
        ConsistencyGuard::reconcile(self, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use slabtrace_core::{CompanyId, DomainError, DomainResult, LocationId};
    use slabtrace_inventory::{
        DemandSnapshot, Lot, MoveLine, MoveLinePayload, Picking, QuantFilter, QuantId, StockMovePayload,
        StockQuant,
    };
    use slabtrace_products::ProductId;
    use std::sync::{Arc, RwLock};

    #[derive(Default)]
    struct Store {
        pickings: RwLock<Vec<Picking>>,
        moves: RwLock<Vec<StockMove>>,
        lines: RwLock<Vec<MoveLine>>,
        lots: RwLock<Vec<Lot>>,
        quants: RwLock<Vec<StockQuant>>,
        lot_writes: RwLock<usize>,
    }

    impl StockStore for Store {
        fn picking(&self, id: PickingId) -> Option<Picking> {
            self.pickings.read().unwrap().iter().find(|p| p.id_typed() == id).cloned()
        }

        fn stock_move(&self, id: StockMoveId) -> Option<StockMove> {
            self.moves.read().unwrap().iter().find(|m| m.id_typed() == id).cloned()
        }

        fn move_line(&self, id: MoveLineId) -> Option<MoveLine> {
            self.lines.read().unwrap().iter().find(|l| l.id_typed() == id).cloned()
        }

        fn moves_of_picking(&self, id: PickingId) -> Vec<StockMove> {
            self.moves.read().unwrap().iter().filter(|m| m.picking_id() == id).cloned().collect()
        }

        fn lines_of_move(&self, id: StockMoveId) -> Vec<MoveLine> {
            self.lines.read().unwrap().iter().filter(|l| l.move_id() == id).cloned().collect()
        }

        fn save_move(&self, stock_move: StockMove) -> DomainResult<()> {
            let mut moves = self.moves.write().unwrap();
            let slot = moves
                .iter_mut()
                .find(|m| m.id_typed() == stock_move.id_typed())
                .ok_or_else(|| DomainError::not_found("move"))?;
            *slot = stock_move;
            Ok(())
        }

        fn save_move_line(&self, line: MoveLine) -> DomainResult<()> {
            let mut lines = self.lines.write().unwrap();
            let slot = lines
                .iter_mut()
                .find(|l| l.id_typed() == line.id_typed())
                .ok_or_else(|| DomainError::not_found("move line"))?;
            *slot = line;
            Ok(())
        }
    }

    impl LotStore for Store {
        fn insert_lot(&self, lot: Lot) -> DomainResult<()> {
            *self.lot_writes.write().unwrap() += 1;
            self.lots.write().unwrap().push(lot);
            Ok(())
        }

        fn replace_lot(&self, lot: Lot) -> DomainResult<()> {
            *self.lot_writes.write().unwrap() += 1;
            let mut lots = self.lots.write().unwrap();
            if let Some(slot) = lots.iter_mut().find(|l| l.id_typed() == lot.id_typed()) {
                *slot = lot;
            }
            Ok(())
        }

        fn lot(&self, id: LotId) -> Option<Lot> {
            self.lots.read().unwrap().iter().find(|l| l.id_typed() == id).cloned()
        }

        fn lot_by_name(&self, product_id: ProductId, name: &str) -> Option<Lot> {
            self.lots
                .read()
                .unwrap()
                .iter()
                .find(|l| l.product_id() == product_id && l.name() == name)
                .cloned()
        }
    }

    impl QuantQuery for Store {
        fn positive_quants(&self, filter: &QuantFilter) -> Vec<StockQuant> {
            self.quants.read().unwrap().iter().filter(|q| filter.matches(q)).cloned().collect()
        }
    }

    struct Fixture {
        store: Arc<Store>,
        product_id: ProductId,
        lot: Lot,
        picking_id: PickingId,
    }

    fn slab() -> AttributeSet {
        AttributeSet::from_dimensions(1.2, 0.8, 2.0)
            .unwrap()
            .with_lot_label("UYI")
            .with_container("MSCU1234567")
    }

    fn fixture(kind: PickingKind) -> Fixture {
        let store = Arc::new(Store::default());
        let product_id = ProductId::generate();
        let lot = Lot::new(
            LotId::generate(),
            "UYI-001",
            product_id,
            CompanyId::new(),
            slab(),
            Utc::now(),
        )
        .unwrap();
        store.lots.write().unwrap().push(lot.clone());
        let picking = Picking::new(PickingId::generate(), "WH/IN/00001", kind, "P0001");
        let picking_id = picking.id_typed();
        store.pickings.write().unwrap().push(picking);
        Fixture {
            store,
            product_id,
            lot,
            picking_id,
        }
    }

    impl Fixture {
        fn guard(&self) -> ConsistencyGuard<Arc<Store>> {
            ConsistencyGuard::new(self.store.clone())
        }

        fn add_move(
            &self,
            kind: PickingKind,
            lot_id: Option<LotId>,
            attributes: AttributeSet,
        ) -> StockMoveId {
            self.push_move(StockMovePayload {
                name: "P0001 - Carrara [Line 1]".to_string(),
                origin: "P0001 - Line 1".to_string(),
                product_id: self.product_id,
                quantity: 1.0,
                uom: "Units".to_string(),
                picking_id: self.picking_id,
                kind,
                purchase_line_id: None,
                back_reference: None,
                lot_id,
                attributes,
                demand: None,
            })
        }

        fn push_move(&self, payload: StockMovePayload) -> StockMoveId {
            let stock_move = StockMove::from_payload(StockMoveId::generate(), payload).unwrap();
            let id = stock_move.id_typed();
            self.store.moves.write().unwrap().push(stock_move);
            id
        }

        fn add_line(
            &self,
            move_id: StockMoveId,
            lot_id: Option<LotId>,
            quantity: f64,
            attributes: AttributeSet,
        ) -> MoveLineId {
            let kind = self.store.stock_move(move_id).unwrap().kind();
            let line = MoveLine::from_payload(
                MoveLineId::generate(),
                MoveLinePayload {
                    move_id,
                    product_id: self.product_id,
                    kind,
                    quantity,
                    lot_id,
                    attributes,
                },
            )
            .unwrap();
            let id = line.id_typed();
            self.store.lines.write().unwrap().push(line);
            id
        }

        fn add_quant(&self, customs: &str, age_days: i64, usage: LocationUsage) {
            self.store.quants.write().unwrap().push(StockQuant {
                id: QuantId::generate(),
                product_id: self.product_id,
                lot_id: Some(self.lot.id_typed()),
                location_id: LocationId::new(),
                location_usage: usage,
                quantity: 1.0,
                in_date: Utc::now() - Duration::days(age_days),
                customs_number: Some(customs.to_string()),
            });
        }
    }

    #[test]
    fn drifted_area_is_restored_from_lot() {
        let f = fixture(PickingKind::Incoming);
        let mut drifted = slab();
        drifted.area = 0.0;
        let move_id = f.add_move(PickingKind::Incoming, Some(f.lot.id_typed()), drifted);
        f.add_quant("24 47 3485 4000123", 1, LocationUsage::Internal);

        let report = f.guard().reconcile(&ReconcileScope::Picking(f.picking_id));

        assert_eq!(report.corrected_moves, vec![move_id]);
        let restored = f.store.stock_move(move_id).unwrap();
        assert_eq!(restored.attributes().area, 1.2 * 0.8);
        assert_eq!(restored.attributes().customs_number, "24 47 3485 4000123");
    }

    #[test]
    fn second_pass_changes_nothing() {
        let f = fixture(PickingKind::Incoming);
        let move_id = f.add_move(PickingKind::Incoming, Some(f.lot.id_typed()), AttributeSet::default());
        f.add_line(move_id, Some(f.lot.id_typed()), 1.0, AttributeSet::default());
        let guard = f.guard();

        let first = guard.reconcile(&ReconcileScope::Picking(f.picking_id));
        assert!(!first.is_clean());
        let second = guard.reconcile(&ReconcileScope::Picking(f.picking_id));
        assert!(second.is_clean());
        assert_eq!(second.examined, 2);
    }

    #[test]
    fn lots_are_never_written() {
        let f = fixture(PickingKind::Incoming);
        let move_id = f.add_move(PickingKind::Incoming, Some(f.lot.id_typed()), AttributeSet::from_area(9.0).unwrap());
        f.add_line(move_id, Some(f.lot.id_typed()), 1.0, AttributeSet::default());

        f.guard().reconcile(&ReconcileScope::Picking(f.picking_id));

        assert_eq!(f.store.lot(f.lot.id_typed()).unwrap(), f.lot);
        assert_eq!(*f.store.lot_writes.read().unwrap(), 0);
    }

    #[test]
    fn dangling_lot_is_skipped_without_failing() {
        let f = fixture(PickingKind::Incoming);
        let move_id = f.add_move(PickingKind::Incoming, Some(LotId::generate()), AttributeSet::default());

        let report = f.guard().reconcile(&ReconcileScope::Picking(f.picking_id));

        assert!(report.is_clean());
        match report.skipped.as_slice() {
            [SkippedRecord::Move { id, .. }] => assert_eq!(*id, move_id),
            other => panic!("Expected one skipped move, got {other:?}"),
        }
    }

    #[test]
    fn customs_falls_back_to_the_lot_then_to_empty() {
        let f = fixture(PickingKind::Incoming);
        let move_id = f.add_move(PickingKind::Incoming, Some(f.lot.id_typed()), AttributeSet::default());
        let guard = f.guard();

        guard.reconcile(&ReconcileScope::Picking(f.picking_id));
        assert_eq!(f.store.stock_move(move_id).unwrap().attributes().customs_number, "");

        let mut lot = f.lot.clone();
        lot.inherit_customs_number("LOT-CUSTOMS");
        f.store.lots.write().unwrap()[0] = lot;
        guard.reconcile(&ReconcileScope::Picking(f.picking_id));
        assert_eq!(f.store.stock_move(move_id).unwrap().attributes().customs_number, "LOT-CUSTOMS");

        f.add_quant("OLDER", 5, LocationUsage::Internal);
        f.add_quant("NEWER", 1, LocationUsage::Internal);
        f.add_quant("IN-TRANSIT", 0, LocationUsage::Transit);
        guard.reconcile(&ReconcileScope::Picking(f.picking_id));
        assert_eq!(f.store.stock_move(move_id).unwrap().attributes().customs_number, "NEWER");
    }

    #[test]
    fn corrected_move_pushes_attributes_to_its_lines() {
        let f = fixture(PickingKind::Incoming);
        let move_id = f.add_move(PickingKind::Incoming, Some(f.lot.id_typed()), AttributeSet::default());
        let line_id = f.add_line(move_id, None, 1.0, AttributeSet::default());

        let report = f.guard().reconcile(&ReconcileScope::Records {
            moves: vec![move_id],
            move_lines: vec![],
        });

        assert_eq!(report.corrected_lines, vec![line_id]);
        assert!(f.store.move_line(line_id).unwrap().attributes().describes_same_unit(f.lot.attributes()));
    }

    #[test]
    fn closed_transfers_are_left_alone_on_save() {
        let f = fixture(PickingKind::Incoming);
        let move_id = f.add_move(PickingKind::Incoming, Some(f.lot.id_typed()), AttributeSet::default());
        {
            let mut pickings = f.store.pickings.write().unwrap();
            pickings[0].mark_done().unwrap();
        }

        let report = f.guard().on_save(f.picking_id);

        assert_eq!(report, ReconcileReport::default());
        assert!(f.store.stock_move(move_id).unwrap().attributes().is_blank());
    }

    #[test]
    fn before_validate_backfills_empty_delivery_and_reserves_lot() {
        let f = fixture(PickingKind::Outgoing);
        let move_id = f.push_move(StockMovePayload {
            name: "SO001 - Carrara".to_string(),
            origin: "SO001/L1".to_string(),
            product_id: f.product_id,
            quantity: 1.0,
            uom: "Units".to_string(),
            picking_id: f.picking_id,
            kind: PickingKind::Outgoing,
            purchase_line_id: None,
            back_reference: None,
            lot_id: None,
            attributes: AttributeSet::default(),
            demand: Some(DemandSnapshot {
                attributes: slab(),
                lot_id: Some(f.lot.id_typed()),
            }),
        });
        let line_id = f.add_line(move_id, None, 1.0, AttributeSet::default());

        let report = f.guard().before_validate(f.picking_id);

        assert_eq!(report.backfilled_moves, vec![move_id]);
        let stock_move = f.store.stock_move(move_id).unwrap();
        assert_eq!(stock_move.lot_id(), Some(f.lot.id_typed()));
        let line = f.store.move_line(line_id).unwrap();
        assert_eq!(line.lot_id(), Some(f.lot.id_typed()));
        assert_eq!(line.attributes().area, 1.2 * 0.8);
    }

    #[test]
    fn before_done_only_checks_lines_with_quantity() {
        let f = fixture(PickingKind::Incoming);
        let move_id = f.add_move(PickingKind::Incoming, None, AttributeSet::default());
        let empty = f.add_line(move_id, Some(f.lot.id_typed()), 0.0, AttributeSet::default());
        let full = f.add_line(move_id, Some(f.lot.id_typed()), 1.0, AttributeSet::default());

        let report = f.guard().before_done(f.picking_id);

        assert_eq!(report.corrected_lines, vec![full]);
        assert!(f.store.move_line(empty).unwrap().attributes().is_blank());
    }

    #[test]
    fn before_done_restores_drifted_lotted_move() {
        let f = fixture(PickingKind::Incoming);
        let mut drifted = slab();
        drifted.area = 0.0;
        let move_id = f.add_move(PickingKind::Incoming, Some(f.lot.id_typed()), drifted);
        let line_id = f.add_line(move_id, Some(f.lot.id_typed()), 1.0, slab());

        let report = f.guard().before_done(f.picking_id);

        assert_eq!(report.corrected_moves, vec![move_id]);
        assert_eq!(f.store.stock_move(move_id).unwrap().attributes().area, 1.2 * 0.8);
        assert_eq!(f.store.move_line(line_id).unwrap().attributes().area, 1.2 * 0.8);
        assert!(f.guard().before_done(f.picking_id).is_clean());
    }

    #[test]
    fn backfilled_move_is_reconciled_against_its_lot() {
        let f = fixture(PickingKind::Outgoing);
        let move_id = f.push_move(StockMovePayload {
            name: "SO001 - Carrara".to_string(),
            origin: "SO001/L1".to_string(),
            product_id: f.product_id,
            quantity: 1.0,
            uom: "Units".to_string(),
            picking_id: f.picking_id,
            kind: PickingKind::Outgoing,
            purchase_line_id: None,
            back_reference: None,
            lot_id: None,
            attributes: AttributeSet::default(),
            demand: Some(DemandSnapshot {
                attributes: AttributeSet::from_dimensions(2.0, 1.0, 2.0).unwrap(),
                lot_id: Some(f.lot.id_typed()),
            }),
        });
        let line_id = f.add_line(move_id, None, 1.0, AttributeSet::default());

        let report = f.guard().before_validate(f.picking_id);

        assert_eq!(report.backfilled_moves, vec![move_id]);
        assert_eq!(report.corrected_moves, vec![move_id]);
        let stock_move = f.store.stock_move(move_id).unwrap();
        assert_eq!(stock_move.lot_id(), Some(f.lot.id_typed()));
        assert_eq!(stock_move.attributes(), &f.guard().expected(f.lot.id_typed()).unwrap());
        assert_eq!(stock_move.attributes().area, 1.2 * 0.8);
        let line = f.store.move_line(line_id).unwrap();
        assert_eq!(line.lot_id(), Some(f.lot.id_typed()));
        assert_eq!(line.attributes().area, 1.2 * 0.8);
        assert!(f.guard().before_done(f.picking_id).is_clean());
    }

    #[test]
    fn unknown_picking_is_reported_as_skipped() {
        let f = fixture(PickingKind::Incoming);
        let report = f.guard().before_validate(PickingId::generate());
        assert!(matches!(report.skipped.as_slice(), [SkippedRecord::Picking { .. }]));
    }

    fn drift() -> impl Strategy<Value = AttributeSet> {
        (0.0f64..5.0, 0.0f64..5.0, 0.0f64..4.0, 0.0f64..25.0, "[A-Z]{0,3}", "[A-Z0-9]{0,6}").prop_map(
            |(height, width, thickness, area, lot_label, container)| AttributeSet {
                height,
                width,
                thickness,
                area,
                lot_label,
                container,
                customs_number: String::new(),
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: whatever the drift, one pass brings every lotted record
        /// back to its lot and a second pass writes nothing.
        #[test]
        fn reconciliation_is_idempotent(move_attrs in drift(), line_attrs in drift()) {
            let f = fixture(PickingKind::Incoming);
            f.add_quant("24 47 3485 4000123", 2, LocationUsage::Internal);
            let move_id = f.add_move(PickingKind::Incoming, Some(f.lot.id_typed()), move_attrs);
            let line_id = f.add_line(move_id, Some(f.lot.id_typed()), 1.0, line_attrs);
            let guard = f.guard();

            guard.reconcile(&ReconcileScope::Picking(f.picking_id));
            let expected = f.lot.attributes().with_resolved_customs("24 47 3485 4000123");
            let moved = f.store.stock_move(move_id).unwrap().attributes().clone();
            let lined = f.store.move_line(line_id).unwrap().attributes().clone();
            prop_assert_eq!(moved, expected.clone());
            prop_assert_eq!(lined, expected);

            let again = guard.reconcile(&ReconcileScope::Picking(f.picking_id));
            prop_assert!(again.is_clean());
            prop_assert_eq!(f.store.lot(f.lot.id_typed()).unwrap(), f.lot.clone());
        }
    }
}
