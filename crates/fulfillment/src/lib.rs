//! Fulfillment: attribute propagation from sale demand down to received lots.
//!
//! - [`GroupingPolicy`] decides which requests the host may merge.
//! - [`PropagationPipeline`] drives requests through the ordered [`Stage`]s,
//!   copying the attribute bundle across every boundary and re-asserting it
//!   after each host creation call.
//! - [`ConsistencyGuard`] pulls records back toward their lot at document
//!   checkpoints.
//!
//! The host platform is reached only through [`HostPlatform`].

pub mod grouping;
pub mod guard;
pub mod host;
pub mod pipeline;
pub mod request;
pub mod stage;

pub use grouping::{ClassificationError, Group, GroupingPolicy, MergeKey, SingletonReason};
pub use guard::{
    ConsistencyGuard, GuardSettings, Reconcile, ReconcileReport, ReconcileScope, SkippedRecord,
};
pub use host::{HostError, HostPlatform, HostResult};
pub use pipeline::{FailedRequest, PipelineReport, PropagationPipeline};
pub use request::{FulfillmentRequest, NewFulfillmentRequest, Replenishment, RequestId};
pub use stage::{
    GroupAssignment, Handoff, Lineage, LotStage, MoveLineStage, MoveStage, Procurement,
    ProcurementStage, PurchaseStage, Stage, StageError,
};
