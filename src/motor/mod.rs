// Motor control for the drawing robot
//
// Provides:
// - Path planning (canvas segments -> turn/forward steps)
// - Line-oriented serial link to the motor controller
// - Opcode/echo/Done handshake driver with simulated fallback

pub mod link;
pub mod planner;
pub mod protocol;

#[cfg(test)]
pub(crate) mod testing;

pub use link::{LinkError, LinkOpener, SerialLink, SerialPortOpener};
pub use planner::{MotorPlan, MotorStep, build_plan, build_plan_with_offset};
pub use protocol::{DeviceCommand, Opcode, Param, ProtocolDriver, SerialLog};
