//! Reconciliation core for soyplane.
//!
//! Three level-triggered controllers drive Modules, Stacks and Executions
//! toward their desired state:
//! - [`ModuleController`] keeps a current Execution per Module generation;
//! - [`StackController`] does the same for Stacks and adds drift re-runs;
//! - [`ExecutionController`] owns the Job of each Execution and derives its phase.
//!
//! Controllers talk to the platform only through [`client::Api`], and are
//! driven by a [`Manager`] that provides per-key exclusivity and requeueing.
pub mod client;
pub mod controller;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod ownership;
pub mod status;
pub mod trigger;

mod context;
pub use context::{Clock, Context, SystemClock};

pub use controller::{Action, ExecutionController, ModuleController, Reconciler, StackController};
pub use error::{CoreError, CoreResult};
pub use manager::{Manager, ManagerConfig};
pub use metrics::{MetricsBackend, MetricsHandle, NoOpMetrics, ReconcileOutcome, noop_metrics};

pub mod prelude {
    pub use crate::client::{Api, Client, MemoryStore, StoreError};
    pub use crate::context::Context;
    pub use crate::controller::{Action, Reconciler};
    pub use crate::error::CoreError;
    pub use crate::manager::Manager;
}
