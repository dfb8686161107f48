//! SHIFTGATE engine — session lifecycle, per-IP quota enforcement,
//! violation escalation, and the append-only audit trail, in front of
//! pluggable training and prediction collaborators.

pub mod audit;
pub mod ban;
pub mod config;
pub mod engine;
pub mod estimator;
pub mod ledger;
pub mod locks;
pub mod store;
pub mod sweeper;
pub mod token;

pub use config::GovernanceConfig;
pub use engine::{GovernanceEngine, SweepReport};
pub use estimator::MeanEstimator;
pub use sweeper::SweeperHandle;
