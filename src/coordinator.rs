// Execution coordinator: authorization, busy flag, plan execution
//
// Arbitration state and the busy flag share one mutex. The lock is only
// held for bookkeeping; device runs happen on a blocking worker with the
// lock released, so polling clients stay responsive while a plan runs.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::access::{AccessArbiter, DriveAuthorization};
use crate::config::HEADING_OFFSET_DEG;
use crate::messages::{
    AdminStateResponse, ClaimResponse, ClientId, ExecutionStatus, HeartbeatResponse,
    ManualCommand, ManualDriveResponse, PathSegment, ReleaseResponse, RequestError,
    RunPathResponse, StatusResponse, validate_segments,
};
use crate::motor::{MotorPlan, ProtocolDriver, SerialLog, build_plan_with_offset};

#[derive(Debug)]
struct SharedState {
    arbiter: AccessArbiter,
    busy: bool,
}

/// Clears the busy flag when dropped, including on panic unwind
struct BusyGuard {
    state: Arc<Mutex<SharedState>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.state.lock().busy = false;
        debug!("Device run finished, busy cleared");
    }
}

enum Admission {
    Run(BusyGuard),
    Queued,
}

#[derive(Clone)]
pub struct Coordinator {
    state: Arc<Mutex<SharedState>>,
    driver: Arc<ProtocolDriver>,
    heading_offset: f64,
}

impl Coordinator {
    pub fn new(driver: ProtocolDriver, owner_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(SharedState {
                arbiter: AccessArbiter::new(owner_timeout),
                busy: false,
            })),
            driver: Arc::new(driver),
            heading_offset: HEADING_OFFSET_DEG,
        }
    }

    pub fn with_heading_offset(mut self, heading_offset: f64) -> Self {
        self.heading_offset = heading_offset;
        self
    }

    pub fn claim(&self, client: &ClientId) -> ClaimResponse {
        let outcome = self.state.lock().arbiter.claim(client);
        ClaimResponse {
            ok: true,
            granted: outcome.granted,
            position: outcome.position,
        }
    }

    pub fn release(&self, client: &ClientId) -> ReleaseResponse {
        let mut state = self.state.lock();
        let outcome = state.arbiter.release(client);
        ReleaseResponse {
            ok: true,
            released: outcome.released,
            owner: outcome.new_owner,
            queue: state.arbiter.waiters(),
        }
    }

    pub fn status(&self, client: &ClientId) -> StatusResponse {
        let outcome = self.state.lock().arbiter.status(client);
        StatusResponse {
            ok: true,
            is_owner: outcome.is_owner,
            position: outcome.position,
        }
    }

    pub fn heartbeat(&self, client: &ClientId) -> HeartbeatResponse {
        HeartbeatResponse {
            ok: true,
            current_owner: self.state.lock().arbiter.heartbeat(client),
        }
    }

    pub fn admin_state(&self) -> AdminStateResponse {
        let state = self.state.lock();
        AdminStateResponse {
            is_busy: state.busy,
            queue: state.arbiter.waiters(),
            current_owner: state.arbiter.current_owner().cloned(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Send one joystick command if the caller owns the robot and nothing is running
    pub async fn manual_drive(&self, client: &ClientId, command: ManualCommand) -> ManualDriveResponse {
        let Admission::Run(guard) = self.admit(client) else {
            return ManualDriveResponse {
                ok: true,
                status: ExecutionStatus::Queued,
                command,
                serial_log: SerialLog::new(),
            };
        };

        info!("{} drives {:?}", client, command);
        let driver = self.driver.clone();
        let serial_log = run_blocking(guard, move || driver.run_immediate(command)).await;

        ManualDriveResponse {
            ok: true,
            status: ExecutionStatus::Executed,
            command,
            serial_log,
        }
    }

    /// Plan and execute a drawn path. Input is validated before any state changes.
    pub async fn run_path(
        &self,
        client: &ClientId,
        segments: &[PathSegment],
    ) -> Result<RunPathResponse, RequestError> {
        validate_segments(segments)?;

        // Planning is pure; do it before the busy flag can be taken
        let motor_plan = build_plan_with_offset(segments, self.heading_offset);

        let Admission::Run(guard) = self.admit(client) else {
            return Ok(RunPathResponse {
                ok: true,
                status: ExecutionStatus::Queued,
                motor_plan: MotorPlan::new(),
                serial_log: SerialLog::new(),
                queue: self.queue(),
            });
        };

        info!(
            "{} runs a path: {} segments -> {} steps",
            client,
            segments.len(),
            motor_plan.len()
        );

        let driver = self.driver.clone();
        let plan = motor_plan.clone();
        let serial_log = run_blocking(guard, move || driver.run_plan(&plan)).await;

        Ok(RunPathResponse {
            ok: true,
            status: ExecutionStatus::Executed,
            motor_plan,
            serial_log,
            queue: self.queue(),
        })
    }

    /// Ownership first, then the busy flag, all under one lock
    fn admit(&self, client: &ClientId) -> Admission {
        let mut state = self.state.lock();

        if let DriveAuthorization::Queued { position } = state.arbiter.authorize_drive(client) {
            info!("{} is not the owner, queued at {}", client, position);
            return Admission::Queued;
        }

        if state.busy {
            info!("{} owns the robot but a run is in flight", client);
            return Admission::Queued;
        }

        state.busy = true;
        Admission::Run(BusyGuard {
            state: self.state.clone(),
        })
    }

    fn queue(&self) -> Vec<ClientId> {
        self.state.lock().arbiter.waiters()
    }
}

/// Run a device exchange on the blocking pool. The guard travels with the
/// work, so busy stays set until the device is actually released.
async fn run_blocking<F>(guard: BusyGuard, work: F) -> SerialLog
where
    F: FnOnce() -> SerialLog + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        work()
    });

    match handle.await {
        Ok(log) => log,
        Err(e) => {
            warn!("Device run aborted: {}", e);
            let mut log = SerialLog::new();
            log.push(format!("[error] protocol run aborted: {}", e));
            log
        }
    }
}
