use serde::{Deserialize, Serialize};

use slabtrace_core::{DomainError, DomainResult, Entity};

slabtrace_core::record_id!(
    /// Transfer document (picking) identifier.
    PickingId
);

/// Direction of a transfer document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickingKind {
    Incoming,
    Outgoing,
    Internal,
}

/// Transfer document lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickingState {
    Draft,
    Waiting,
    Assigned,
    Done,
    Cancelled,
}

impl PickingState {
    /// Records of the document may still be edited.
    pub fn is_mutable(self) -> bool {
        !matches!(self, PickingState::Done | PickingState::Cancelled)
    }
}

/// A receipt, delivery or internal transfer grouping stock moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picking {
    id: PickingId,
    name: String,
    kind: PickingKind,
    state: PickingState,
    origin: String,
}

impl Picking {
    pub fn new(id: PickingId, name: impl Into<String>, kind: PickingKind, origin: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            state: PickingState::Draft,
            origin: origin.into(),
        }
    }

    pub fn id_typed(&self) -> PickingId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PickingKind {
        self.kind
    }

    pub fn state(&self) -> PickingState {
        self.state
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn mark_assigned(&mut self) -> DomainResult<()> {
        self.ensure_mutable()?;
        self.state = PickingState::Assigned;
        Ok(())
    }

    pub fn mark_done(&mut self) -> DomainResult<()> {
        self.ensure_mutable()?;
        self.state = PickingState::Done;
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        if self.state == PickingState::Done {
            return Err(DomainError::invariant("done transfers cannot be cancelled"));
        }
        self.state = PickingState::Cancelled;
        Ok(())
    }

    fn ensure_mutable(&self) -> DomainResult<()> {
        if !self.state.is_mutable() {
            return Err(DomainError::invariant(format!(
                "transfer {} is {:?} and can no longer change",
                self.name, self.state
            )));
        }
        Ok(())
    }
}

impl Entity for Picking {
    type Id = PickingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
