// In-memory stand-ins for the serial device, shared by protocol and coordinator tests

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::link::{LinkError, LinkOpener, Result, SerialLink};
use crate::config::ProtocolTiming;

/// Millisecond-scale waits so handshake tests stay quick
pub fn fast_timing() -> ProtocolTiming {
    ProtocolTiming {
        echo_timeout: Duration::from_millis(40),
        done_timeout: Duration::from_millis(40),
        stop_done_timeout: Duration::from_millis(20),
        boot_settle: Duration::ZERO,
        boot_drain: Duration::from_millis(10),
        step_settle: Duration::ZERO,
        step_drain: Duration::from_millis(5),
        immediate_settle: Duration::ZERO,
        immediate_done_timeout: Duration::from_millis(40),
    }
}

/// Behaves like the controller firmware: echoes opcodes, reports Done after the parameter
#[derive(Debug, Clone, Default)]
pub struct FakeController {
    responsive: bool,
    boot_banner: bool,
    echo_prefix: Option<String>,
    fail_after_writes: Option<usize>,
}

impl FakeController {
    pub fn responsive() -> Self {
        Self {
            responsive: true,
            ..Self::default()
        }
    }

    /// Accepts writes, never answers
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_boot_banner(mut self) -> Self {
        self.boot_banner = true;
        self
    }

    /// Emit a telemetry line before every echo
    pub fn with_echo_prefix(mut self, line: &str) -> Self {
        self.echo_prefix = Some(line.to_string());
        self
    }

    /// Writes beyond the first `n` fail as if the cable were pulled
    pub fn fail_after_writes(mut self, n: usize) -> Self {
        self.fail_after_writes = Some(n);
        self
    }
}

pub struct ScriptedLink {
    controller: FakeController,
    written: Arc<Mutex<Vec<String>>>,
    outbox: VecDeque<String>,
    awaiting_param: Option<String>,
    writes: usize,
}

impl SerialLink for ScriptedLink {
    fn write_line(&mut self, token: &str) -> Result<()> {
        if let Some(limit) = self.controller.fail_after_writes {
            if self.writes >= limit {
                return Err(LinkError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "device disconnected",
                )));
            }
        }
        self.writes += 1;
        self.written.lock().push(token.to_string());

        if !self.controller.responsive {
            return Ok(());
        }

        match self.awaiting_param.take() {
            Some(opcode) => {
                self.outbox.push_back(format!("Done{}", opcode));
                self.outbox.push_back("ax: 0.01 ay: -0.02 gz: 0.00".to_string());
            }
            None => {
                if let Some(noise) = &self.controller.echo_prefix {
                    self.outbox.push_back(noise.clone());
                }
                self.outbox.push_back(token.to_string());
                if token == "9" {
                    self.outbox.push_back("Done9".to_string());
                } else {
                    self.awaiting_param = Some(token.to_string());
                }
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.outbox.pop_front())
    }
}

/// Hands out a fresh `ScriptedLink` per run and records every line written
pub struct ScriptedOpener {
    controller: FakeController,
    written: Arc<Mutex<Vec<String>>>,
}

impl ScriptedOpener {
    pub fn new(controller: FakeController) -> Self {
        Self {
            controller,
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn written(&self) -> Arc<Mutex<Vec<String>>> {
        self.written.clone()
    }
}

impl LinkOpener for ScriptedOpener {
    fn open(&self) -> Result<Box<dyn SerialLink>> {
        let mut outbox = VecDeque::new();
        if self.controller.boot_banner {
            outbox.push_back("MPU6050 Found!".to_string());
            outbox.push_back("ax: 0.00 ay: 0.00 gz: 0.00".to_string());
        }
        Ok(Box::new(ScriptedLink {
            controller: self.controller.clone(),
            written: self.written.clone(),
            outbox,
            awaiting_param: None,
            writes: 0,
        }))
    }

    fn describe(&self) -> String {
        "fake @ 0".to_string()
    }
}

/// Always fails to open, forcing simulated mode
pub struct FailingOpener;

impl LinkOpener for FailingOpener {
    fn open(&self) -> Result<Box<dyn SerialLink>> {
        Err(LinkError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            "no such device",
        )))
    }

    fn describe(&self) -> String {
        "/dev/null-drawbot @ 115200".to_string()
    }
}
