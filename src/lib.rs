// Shared-control runtime for a serial drawing robot
//
// - access: who may drive (owner, FIFO waiters, liveness)
// - motor: path planning and the controller handshake
// - coordinator: one run at a time, authorization before execution
// - server/runtime: HTTP surface and process wiring

pub mod access;
pub mod config;
pub mod coordinator;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod server;

pub use coordinator::Coordinator;
