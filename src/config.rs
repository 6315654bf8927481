// Timeouts, serial settings, planner constants
use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

// Serial device the motor controller enumerates as
pub const DEVICE_PATH: &str = "/dev/ttyACM0";
pub const BAUD_RATE: u32 = 115_200;

// Per-read timeout on the serial handle; awaits loop over this until their own deadline
pub const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(200);

// Owner without a heartbeat for this long is superseded
pub const OWNER_TIMEOUT: Duration = Duration::from_secs(5);

// Handshake waits
pub const ECHO_TIMEOUT: Duration = Duration::from_secs(2);
pub const DONE_TIMEOUT: Duration = Duration::from_secs(15);
pub const STOP_DONE_TIMEOUT: Duration = Duration::from_secs(3);

// Opening the port reboots the controller: settle, then drain the boot banner
pub const BOOT_SETTLE: Duration = Duration::from_millis(3500);
pub const BOOT_DRAIN: Duration = Duration::from_millis(1000);

// Between plan steps the controller prints IMU telemetry and clears its input buffer
pub const STEP_SETTLE: Duration = Duration::from_millis(500);
pub const STEP_DRAIN: Duration = Duration::from_millis(500);

// Immediate (joystick) commands
pub const IMMEDIATE_SETTLE: Duration = Duration::from_millis(200);
pub const IMMEDIATE_DONE_TIMEOUT: Duration = Duration::from_secs(2);
pub const TURN_STEP_DEG: u32 = 10;

// Canvas heading 0 points east, robot heading 0 is its starting facing
pub const HEADING_OFFSET_DEG: f64 = 90.0;

// Segment sanity bounds; anything larger is rejected as a malformed path.
// Distances stay well below where the float formatting switches to exponent form.
pub const MAX_SEGMENT_DISTANCE_FT: f64 = 1000.0;
pub const MAX_HEADING_ABS_DEG: f64 = 3600.0;

pub const BIND_ADDR: &str = "0.0.0.0:8080";

/// Every wait the device protocol performs, grouped so tests can shrink them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolTiming {
    pub echo_timeout: Duration,
    pub done_timeout: Duration,
    pub stop_done_timeout: Duration,
    pub boot_settle: Duration,
    pub boot_drain: Duration,
    pub step_settle: Duration,
    pub step_drain: Duration,
    pub immediate_settle: Duration,
    pub immediate_done_timeout: Duration,
}

impl Default for ProtocolTiming {
    fn default() -> Self {
        Self {
            echo_timeout: ECHO_TIMEOUT,
            done_timeout: DONE_TIMEOUT,
            stop_done_timeout: STOP_DONE_TIMEOUT,
            boot_settle: BOOT_SETTLE,
            boot_drain: BOOT_DRAIN,
            step_settle: STEP_SETTLE,
            step_drain: STEP_DRAIN,
            immediate_settle: IMMEDIATE_SETTLE,
            immediate_done_timeout: IMMEDIATE_DONE_TIMEOUT,
        }
    }
}

/// Command line / environment configuration for the runtime process.
#[derive(Debug, Clone, Parser)]
#[command(name = "drawbot-runtime", about = "Shared-control runtime for a serial drawing robot")]
pub struct Config {
    /// Address the HTTP API listens on
    #[arg(long, env = "DRAWBOT_BIND", default_value = BIND_ADDR)]
    pub bind: SocketAddr,

    /// Serial device of the motor controller
    #[arg(long, env = "DRAWBOT_DEVICE", default_value = DEVICE_PATH)]
    pub device: String,

    #[arg(long, env = "DRAWBOT_BAUD", default_value_t = BAUD_RATE)]
    pub baud: u32,

    /// Seconds without contact before the owner is superseded
    #[arg(long, env = "DRAWBOT_OWNER_TIMEOUT", default_value_t = OWNER_TIMEOUT.as_secs_f64())]
    pub owner_timeout: f64,

    /// Added to canvas headings to obtain robot headings (degrees)
    #[arg(long, env = "DRAWBOT_HEADING_OFFSET", default_value_t = HEADING_OFFSET_DEG)]
    pub heading_offset: f64,

    /// Degrees turned per LEFT/RIGHT nudge
    #[arg(long, env = "DRAWBOT_TURN_STEP", default_value_t = TURN_STEP_DEG)]
    pub turn_step: u32,

    #[command(flatten)]
    pub timing: TimingArgs,
}

/// Protocol waits in seconds.
#[derive(Debug, Clone, clap::Args)]
pub struct TimingArgs {
    #[arg(long, env = "DRAWBOT_ECHO_TIMEOUT", default_value_t = ECHO_TIMEOUT.as_secs_f64())]
    pub echo_timeout: f64,

    #[arg(long, env = "DRAWBOT_DONE_TIMEOUT", default_value_t = DONE_TIMEOUT.as_secs_f64())]
    pub done_timeout: f64,

    #[arg(long, env = "DRAWBOT_STOP_DONE_TIMEOUT", default_value_t = STOP_DONE_TIMEOUT.as_secs_f64())]
    pub stop_done_timeout: f64,

    #[arg(long, env = "DRAWBOT_BOOT_SETTLE", default_value_t = BOOT_SETTLE.as_secs_f64())]
    pub boot_settle: f64,

    #[arg(long, env = "DRAWBOT_BOOT_DRAIN", default_value_t = BOOT_DRAIN.as_secs_f64())]
    pub boot_drain: f64,

    #[arg(long, env = "DRAWBOT_STEP_SETTLE", default_value_t = STEP_SETTLE.as_secs_f64())]
    pub step_settle: f64,

    #[arg(long, env = "DRAWBOT_STEP_DRAIN", default_value_t = STEP_DRAIN.as_secs_f64())]
    pub step_drain: f64,

    #[arg(long, env = "DRAWBOT_IMMEDIATE_SETTLE", default_value_t = IMMEDIATE_SETTLE.as_secs_f64())]
    pub immediate_settle: f64,

    #[arg(long, env = "DRAWBOT_IMMEDIATE_DONE_TIMEOUT", default_value_t = IMMEDIATE_DONE_TIMEOUT.as_secs_f64())]
    pub immediate_done_timeout: f64,
}

/// Negative or non-finite seconds collapse to zero rather than panicking.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl From<&TimingArgs> for ProtocolTiming {
    fn from(args: &TimingArgs) -> Self {
        Self {
            echo_timeout: secs(args.echo_timeout),
            done_timeout: secs(args.done_timeout),
            stop_done_timeout: secs(args.stop_done_timeout),
            boot_settle: secs(args.boot_settle),
            boot_drain: secs(args.boot_drain),
            step_settle: secs(args.step_settle),
            step_drain: secs(args.step_drain),
            immediate_settle: secs(args.immediate_settle),
            immediate_done_timeout: secs(args.immediate_done_timeout),
        }
    }
}

impl Config {
    pub fn owner_timeout(&self) -> Duration {
        secs(self.owner_timeout)
    }

    pub fn protocol_timing(&self) -> ProtocolTiming {
        ProtocolTiming::from(&self.timing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_match_constants() {
        let config = Config::try_parse_from(["drawbot-runtime"]).unwrap();
        assert_eq!(config.device, DEVICE_PATH);
        assert_eq!(config.baud, BAUD_RATE);
        assert_eq!(config.owner_timeout(), OWNER_TIMEOUT);
        assert_eq!(config.heading_offset, HEADING_OFFSET_DEG);
        assert_eq!(config.turn_step, TURN_STEP_DEG);
        assert_eq!(config.protocol_timing(), ProtocolTiming::default());
    }

    #[test]
    fn test_timing_flags_override_defaults() {
        let config = Config::try_parse_from([
            "drawbot-runtime",
            "--done-timeout",
            "20",
            "--boot-settle",
            "0",
        ])
        .unwrap();
        let timing = config.protocol_timing();
        assert_eq!(timing.done_timeout, Duration::from_secs(20));
        assert_eq!(timing.boot_settle, Duration::ZERO);
        assert_eq!(timing.echo_timeout, ECHO_TIMEOUT);
    }

    #[test]
    fn test_negative_seconds_clamp_to_zero() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
    }
}
