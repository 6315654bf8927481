// Opcode/echo/parameter/Done handshake with the motor controller
//
// Exchange for one command:
//   host: <opcode>\n      controller: <opcode>        (echo)
//   host: <param>\n       controller: ... Done<opcode> (completion)
//
// Each run opens the port (which resets the controller), performs its
// exchanges, and closes it again. If the port cannot be opened the run
// continues in simulated mode: sends are logged, waits succeed at once.
// Timeouts are logged and never abort a run; the controller has no
// resend support so every command is fire-once.

use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::link::{LinkError, LinkOpener, SerialLink};
use super::planner::MotorStep;
use crate::config::{ProtocolTiming, TURN_STEP_DEG};
use crate::messages::ManualCommand;

/// Command codes understood by the controller firmware
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Forward = 1,
    TurnRight = 4,
    TurnLeft = 5,
    Stop = 9,
}

impl Opcode {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Wire form; also the echo we expect back
    pub fn token(self) -> String {
        self.code().to_string()
    }
}

/// Parameter line following an opcode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param {
    Degrees(u32),
    Feet(f64),
}

impl Param {
    pub fn token(&self) -> String {
        match self {
            Param::Degrees(deg) => deg.to_string(),
            // Debug keeps the decimal point ("3.0"), which the firmware's float parser expects
            Param::Feet(ft) => format!("{:?}", ft),
        }
    }
}

/// One complete command as sent over the wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceCommand {
    pub opcode: Opcode,
    pub param: Option<Param>,
}

impl DeviceCommand {
    /// Wire command for a plan step, or `None` when the step rounds to nothing
    pub fn from_step(step: &MotorStep) -> Option<Self> {
        match *step {
            MotorStep::TurnLeft { degrees } => Self::turn(Opcode::TurnLeft, degrees),
            MotorStep::TurnRight { degrees } => Self::turn(Opcode::TurnRight, degrees),
            MotorStep::Forward { distance_ft } if distance_ft > 0.0 => Some(Self {
                opcode: Opcode::Forward,
                param: Some(Param::Feet(distance_ft)),
            }),
            MotorStep::Forward { .. } => None,
            MotorStep::Stop => Some(Self {
                opcode: Opcode::Stop,
                param: None,
            }),
        }
    }

    /// Wire command for a joystick nudge
    pub fn from_manual(command: ManualCommand, turn_step_deg: u32) -> Self {
        let (opcode, param) = match command {
            ManualCommand::Forward => (Opcode::Forward, None),
            ManualCommand::Left => (Opcode::TurnLeft, Some(Param::Degrees(turn_step_deg))),
            ManualCommand::Right => (Opcode::TurnRight, Some(Param::Degrees(turn_step_deg))),
            ManualCommand::Stop => (Opcode::Stop, None),
        };
        Self { opcode, param }
    }

    fn turn(opcode: Opcode, degrees: f64) -> Option<Self> {
        let rounded = degrees.round();
        if rounded.is_nan() || rounded < 1.0 {
            return None;
        }
        Some(Self {
            opcode,
            param: Some(Param::Degrees(rounded as u32)),
        })
    }
}

/// Human-readable trace of one protocol run, returned to the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialLog(Vec<String>);

impl SerialLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!("serial log: {}", line);
        self.0.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, line: &str) -> bool {
        self.0.iter().any(|l| l == line)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Echo and completion deadlines for one exchange
#[derive(Debug, Clone, Copy)]
struct Waits {
    echo: Duration,
    done: Duration,
}

enum Mode {
    Hardware(Box<dyn SerialLink>),
    Simulated,
}

/// One open-to-close run against the controller
struct Session {
    mode: Mode,
    log: SerialLog,
}

impl Session {
    fn open(opener: &dyn LinkOpener) -> Self {
        let target = opener.describe();
        let mut log = SerialLog::new();
        let mode = match opener.open() {
            Ok(link) => {
                info!("Opened motor controller on {}", target);
                log.push(format!("[info] opened {}", target));
                Mode::Hardware(link)
            }
            Err(e) => {
                warn!("Could not open {} ({}), simulating", target, e);
                log.push(format!("[warn] could not open {}: {}", target, e));
                log.push("[warn] SIM MODE (no device)");
                Mode::Simulated
            }
        };
        Self { mode, log }
    }

    fn is_simulated(&self) -> bool {
        matches!(self.mode, Mode::Simulated)
    }

    fn pause(&self, duration: Duration) {
        if !self.is_simulated() && !duration.is_zero() {
            sleep(duration);
        }
    }

    fn send(&mut self, token: &str) -> Result<(), LinkError> {
        if let Mode::Hardware(link) = &mut self.mode {
            link.write_line(token)?;
        }
        self.log.push(format!("sent {}", token));
        Ok(())
    }

    /// Read and log lines until `matches` accepts one or `timeout` passes.
    /// Always reads at least once.
    fn read_until(
        &mut self,
        timeout: Duration,
        matches: impl Fn(&str) -> bool,
    ) -> Result<bool, LinkError> {
        let Mode::Hardware(link) = &mut self.mode else {
            return Ok(true);
        };
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(line) = link.read_line()? {
                let hit = matches(line.as_str());
                self.log.push(format!("device -> {}", line));
                if hit {
                    return Ok(true);
                }
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
        }
    }

    /// Log everything the controller prints for `window`
    fn drain(&mut self, window: Duration) -> Result<(), LinkError> {
        if self.is_simulated() {
            return Ok(());
        }
        self.read_until(window, |_| false)?;
        Ok(())
    }

    fn await_echo(&mut self, opcode: Opcode, timeout: Duration) -> Result<bool, LinkError> {
        if self.is_simulated() {
            self.log.push("device -> (SIM echo ok)");
            return Ok(true);
        }
        let expected = opcode.token();
        let seen = self.read_until(timeout, |line| line == expected)?;
        if !seen {
            warn!("No echo for opcode {} within {:?}", expected, timeout);
            self.log.push("device -> (no echo)");
        }
        Ok(seen)
    }

    fn await_done(&mut self, timeout: Duration) -> Result<bool, LinkError> {
        if self.is_simulated() {
            self.log.push("device -> SIM_DONE");
            return Ok(true);
        }
        let seen = self.read_until(timeout, |line| line.starts_with("Done"))?;
        if !seen {
            warn!("No Done within {:?}", timeout);
            self.log.push("device -> (no final DONE)");
        }
        Ok(seen)
    }

    /// Opcode, echo, optional parameter, completion
    fn exchange(&mut self, command: &DeviceCommand, waits: Waits) -> Result<(), LinkError> {
        self.send(&command.opcode.token())?;
        self.await_echo(command.opcode, waits.echo)?;
        if let Some(param) = command.param {
            self.send(&param.token())?;
        }
        self.await_done(waits.done)?;
        Ok(())
    }

    fn boot_sync(&mut self, timing: &ProtocolTiming) -> Result<(), LinkError> {
        if self.is_simulated() {
            self.log.push("[info] boot sync skipped (simulated)");
            return Ok(());
        }
        self.log.push(format!(
            "[info] boot sync: settle {:.1}s, drain {:.1}s",
            timing.boot_settle.as_secs_f64(),
            timing.boot_drain.as_secs_f64()
        ));
        self.pause(timing.boot_settle);
        self.drain(timing.boot_drain)
    }

    /// Let the controller finish its telemetry and clear its input before the next opcode
    fn step_sync(&mut self, timing: &ProtocolTiming) -> Result<(), LinkError> {
        self.pause(timing.step_settle);
        self.drain(timing.step_drain)
    }

    fn fail(&mut self, err: LinkError) {
        warn!("Serial I/O failed mid-run: {}", err);
        self.log.push(format!("[error] serial I/O failed: {}", err));
    }

    fn close(mut self) -> SerialLog {
        if let Mode::Hardware(link) = std::mem::replace(&mut self.mode, Mode::Simulated) {
            drop(link);
            info!("Closed motor controller");
            self.log.push("[info] closed serial");
        }
        self.log
    }
}

/// Runs commands and plans against the controller, one run at a time per caller
pub struct ProtocolDriver {
    opener: Arc<dyn LinkOpener>,
    timing: ProtocolTiming,
    turn_step_deg: u32,
}

impl ProtocolDriver {
    pub fn new(opener: Arc<dyn LinkOpener>) -> Self {
        Self::with_timing(opener, ProtocolTiming::default())
    }

    pub fn with_timing(opener: Arc<dyn LinkOpener>, timing: ProtocolTiming) -> Self {
        Self {
            opener,
            timing,
            turn_step_deg: TURN_STEP_DEG,
        }
    }

    pub fn with_turn_step(mut self, turn_step_deg: u32) -> Self {
        self.turn_step_deg = turn_step_deg;
        self
    }

    /// Send one joystick command: no boot sync, short waits
    pub fn run_immediate(&self, command: ManualCommand) -> SerialLog {
        let device_command = DeviceCommand::from_manual(command, self.turn_step_deg);
        let waits = Waits {
            echo: self.timing.echo_timeout,
            done: self.timing.immediate_done_timeout,
        };

        let mut session = Session::open(self.opener.as_ref());
        session.pause(self.timing.immediate_settle);
        if let Err(e) = session.exchange(&device_command, waits) {
            session.fail(e);
        }
        session.close()
    }

    /// Execute a whole plan: boot sync, then one exchange per step with resync in between
    pub fn run_plan(&self, plan: &[MotorStep]) -> SerialLog {
        let mut session = Session::open(self.opener.as_ref());
        if let Err(e) = self.run_steps(&mut session, plan) {
            session.fail(e);
        }
        session.close()
    }

    fn run_steps(&self, session: &mut Session, plan: &[MotorStep]) -> Result<(), LinkError> {
        session.boot_sync(&self.timing)?;

        let mut dispatched = 0usize;
        for step in plan {
            let Some(command) = DeviceCommand::from_step(step) else {
                debug!("Skipping {:?}: rounds to nothing", step);
                continue;
            };

            if dispatched > 0 {
                session.step_sync(&self.timing)?;
            }
            dispatched += 1;

            let done = match command.opcode {
                Opcode::Stop => self.timing.stop_done_timeout,
                _ => self.timing.done_timeout,
            };
            session.exchange(
                &command,
                Waits {
                    echo: self.timing.echo_timeout,
                    done,
                },
            )?;
        }

        info!("Plan finished: {} of {} steps sent", dispatched, plan.len());
        Ok(())
    }
}
