//! Lot minting with per-label sequential names.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use slabtrace_core::{AttributeSet, CompanyId, DomainError, DomainResult};
use slabtrace_products::ProductId;

use crate::lot::{Lot, LotId};
use crate::move_line::MoveLine;
use crate::quant::{QuantFilter, QuantQuery, earliest_receipt};
use crate::sequence::{SequenceDefinition, SequenceService};
use crate::store::LotStore;

/// Names already taken (e.g. lots entered by hand) are skipped; give up after
/// this many consecutive collisions.
const MAX_NAME_ATTEMPTS: usize = 32;

/// How lot sequences are keyed and rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LotNaming {
    /// Sequence code prefix; the label is appended.
    pub code_prefix: String,
    pub padding: usize,
}

impl Default for LotNaming {
    fn default() -> Self {
        Self {
            code_prefix: "lot.serial.".to_string(),
            padding: 3,
        }
    }
}

impl LotNaming {
    pub fn sequence_code(&self, label: &str) -> String {
        format!("{}{label}", self.code_prefix)
    }

    pub fn sequence_definition(&self, label: &str) -> SequenceDefinition {
        SequenceDefinition {
            prefix: format!("{label}-"),
            padding: self.padding,
        }
    }
}

/// Mints one lot per received physical unit.
#[derive(Debug)]
pub struct LotRegistry<S, L> {
    sequences: S,
    lots: L,
    naming: LotNaming,
}

impl<S, L> LotRegistry<S, L>
where
    S: SequenceService,
    L: LotStore,
{
    pub fn new(sequences: S, lots: L) -> Self {
        Self::with_naming(sequences, lots, LotNaming::default())
    }

    pub fn with_naming(sequences: S, lots: L, naming: LotNaming) -> Self {
        Self {
            sequences,
            lots,
            naming,
        }
    }

    pub fn naming(&self) -> &LotNaming {
        &self.naming
    }

    /// Mint a new lot named `<label>-<n>` for a received unit.
    ///
    /// Receipts never reuse a lot, so despite the name this always creates.
    /// The lot freezes `attributes` with its label set to `label` and the area
    /// re-derived from the dimensions when both are present.
    pub fn get_or_create_sequential(
        &self,
        label: &str,
        product_id: ProductId,
        company_id: CompanyId,
        attributes: &AttributeSet,
    ) -> DomainResult<Lot> {
        let label = label.trim();
        if label.is_empty() {
            return Err(DomainError::validation("lot label cannot be empty"));
        }

        let mut frozen = attributes.clone();
        frozen.lot_label = label.to_string();
        frozen.recompute_area();

        let code = self.naming.sequence_code(label);
        let definition = self.naming.sequence_definition(label);

        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = self.sequences.next(&code, &definition)?;
            if self.lots.lot_by_name(product_id, &name).is_some() {
                warn!(lot = %name, %product_id, "lot name already taken, drawing the next number");
                continue;
            }

            let lot = Lot::new(LotId::generate(), name, product_id, company_id, frozen.clone(), Utc::now())?;
            match self.lots.insert_lot(lot.clone()) {
                Ok(()) => {
                    info!(lot = %lot.name(), lot_id = %lot.id_typed(), %product_id, "minted lot");
                    return Ok(lot);
                }
                Err(DomainError::Conflict(reason)) => {
                    warn!(lot = %lot.name(), %reason, "lot insert raced, drawing the next number");
                }
                Err(err) => return Err(err),
            }
        }

        Err(DomainError::conflict(format!(
            "no free lot name for label {label} after {MAX_NAME_ATTEMPTS} attempts"
        )))
    }

    /// Mint and attach a lot to a labelled incoming move line without one.
    ///
    /// Returns `None` when the line does not need a lot.
    pub fn receive_line(&self, line: &mut MoveLine, company_id: CompanyId) -> DomainResult<Option<Lot>> {
        if !line.needs_lot() {
            return Ok(None);
        }
        let lot = self.get_or_create_sequential(
            &line.attributes().lot_label,
            line.product_id(),
            company_id,
            line.attributes(),
        )?;
        line.assign_lot(&lot)?;
        Ok(Some(lot))
    }

    /// Fill an unset lot customs number from its earliest stock quantity
    /// carrying one. Returns `true` when the lot changed.
    pub fn attach_customs_number<Q>(&self, quants: &Q, lot_id: LotId) -> DomainResult<bool>
    where
        Q: QuantQuery + ?Sized,
    {
        let mut lot = self
            .lots
            .lot(lot_id)
            .ok_or_else(|| DomainError::not_found(format!("lot {lot_id}")))?;
        if lot.customs_number().is_some() {
            return Ok(false);
        }

        let found = quants.positive_quants(&QuantFilter::for_lot(lot_id, &[]));
        let first = earliest_receipt(
            found
                .iter()
                .filter(|q| q.customs_number.as_deref().is_some_and(|c| !c.trim().is_empty())),
        );
        let Some(customs) = first.and_then(|q| q.customs_number.clone()) else {
            return Ok(false);
        };

        if !lot.inherit_customs_number(&customs) {
            return Ok(false);
        }
        self.lots.replace_lot(lot)?;
        info!(%lot_id, customs = %customs, "lot inherited customs number");
        Ok(true)
    }
}
