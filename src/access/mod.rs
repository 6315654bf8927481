// Access control: who may command the robot right now
//
// - Liveness bookkeeping per client identity
// - Single owner + FIFO waiters with stale-owner eviction

pub mod arbiter;
pub mod liveness;

pub use arbiter::{AccessArbiter, ClaimOutcome, DriveAuthorization, ReleaseOutcome, StatusOutcome};
pub use liveness::LivenessTracker;
