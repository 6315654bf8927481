// Single-owner / FIFO-waiter arbitration with stale-owner eviction
//
// Every public operation marks the caller alive, evicts a silent owner,
// and only then applies its own logic. The arbiter itself is not
// synchronized; the coordinator keeps it behind one mutex.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::liveness::LivenessTracker;
use crate::messages::ClientId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub granted: bool,
    /// 0 for the owner, 1-based rank in the queue otherwise
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub released: bool,
    pub new_owner: Option<ClientId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOutcome {
    pub is_owner: bool,
    pub position: Option<u32>,
}

/// Result of the authorization step that precedes any drive command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveAuthorization {
    Granted,
    Queued { position: u32 },
}

#[derive(Debug)]
pub struct AccessArbiter {
    current_owner: Option<ClientId>,
    waiters: VecDeque<ClientId>,
    liveness: LivenessTracker,
    owner_timeout: Duration,
}

impl AccessArbiter {
    pub fn new(owner_timeout: Duration) -> Self {
        Self {
            current_owner: None,
            waiters: VecDeque::new(),
            liveness: LivenessTracker::new(),
            owner_timeout,
        }
    }

    pub fn current_owner(&self) -> Option<&ClientId> {
        self.current_owner.as_ref()
    }

    pub fn waiters(&self) -> Vec<ClientId> {
        self.waiters.iter().cloned().collect()
    }

    pub fn claim(&mut self, client: &ClientId) -> ClaimOutcome {
        self.claim_at(client, Instant::now())
    }

    pub fn claim_at(&mut self, client: &ClientId, now: Instant) -> ClaimOutcome {
        self.touch(client, now);

        if self.current_owner.is_none() {
            info!("{} claimed control of an idle robot", client);
            self.current_owner = Some(client.clone());
        }

        if self.current_owner.as_ref() == Some(client) {
            return ClaimOutcome {
                granted: true,
                position: 0,
            };
        }
        ClaimOutcome {
            granted: false,
            position: self.enqueue(client),
        }
    }

    pub fn release(&mut self, client: &ClientId) -> ReleaseOutcome {
        self.release_at(client, Instant::now())
    }

    pub fn release_at(&mut self, client: &ClientId, now: Instant) -> ReleaseOutcome {
        self.touch(client, now);

        if self.current_owner.as_ref() != Some(client) {
            debug!("{} tried to release without owning the robot", client);
            return ReleaseOutcome {
                released: false,
                new_owner: self.current_owner.clone(),
            };
        }

        self.current_owner = self.waiters.pop_front();
        match &self.current_owner {
            Some(next) => info!("{} released control, {} promoted", client, next),
            None => info!("{} released control, robot is idle", client),
        }
        ReleaseOutcome {
            released: true,
            new_owner: self.current_owner.clone(),
        }
    }

    pub fn status(&mut self, client: &ClientId) -> StatusOutcome {
        self.status_at(client, Instant::now())
    }

    pub fn status_at(&mut self, client: &ClientId, now: Instant) -> StatusOutcome {
        self.touch(client, now);

        if self.current_owner.as_ref() == Some(client) {
            return StatusOutcome {
                is_owner: true,
                position: Some(0),
            };
        }
        StatusOutcome {
            is_owner: false,
            position: self.rank(client),
        }
    }

    pub fn heartbeat(&mut self, client: &ClientId) -> Option<ClientId> {
        self.heartbeat_at(client, Instant::now())
    }

    /// Returns the (possibly freshly promoted) owner
    pub fn heartbeat_at(&mut self, client: &ClientId, now: Instant) -> Option<ClientId> {
        self.touch(client, now);
        self.current_owner.clone()
    }

    pub fn authorize_drive(&mut self, client: &ClientId) -> DriveAuthorization {
        self.authorize_drive_at(client, Instant::now())
    }

    /// Owner may drive; an idle robot is claimed on the spot; anyone else is queued.
    pub fn authorize_drive_at(&mut self, client: &ClientId, now: Instant) -> DriveAuthorization {
        let claim = self.claim_at(client, now);
        if claim.granted {
            DriveAuthorization::Granted
        } else {
            DriveAuthorization::Queued {
                position: claim.position,
            }
        }
    }

    fn touch(&mut self, client: &ClientId, now: Instant) {
        self.liveness.mark_alive_at(client, now);
        self.evict_stale_owner(now);
    }

    fn evict_stale_owner(&mut self, now: Instant) {
        let Some(owner) = &self.current_owner else {
            return;
        };

        let stale = match self.liveness.last_seen(owner) {
            Some(last) => now.saturating_duration_since(last) > self.owner_timeout,
            None => true,
        };
        if !stale {
            return;
        }

        let evicted = owner.clone();
        self.current_owner = self.waiters.pop_front();
        match &self.current_owner {
            Some(next) => {
                // A promoted waiter that never spoke must not be evicted on the next call
                if self.liveness.last_seen(next).is_none() {
                    self.liveness.mark_alive_at(next, now);
                }
                info!("Owner {} went silent, promoted {}", evicted, next);
            }
            None => info!("Owner {} went silent, robot is idle", evicted),
        }
    }

    /// Append if absent; returns the 1-based rank
    fn enqueue(&mut self, client: &ClientId) -> u32 {
        if let Some(rank) = self.rank(client) {
            return rank;
        }
        self.waiters.push_back(client.clone());
        debug!("{} queued at position {}", client, self.waiters.len());
        self.waiters.len() as u32
    }

    fn rank(&self, client: &ClientId) -> Option<u32> {
        self.waiters
            .iter()
            .position(|w| w == client)
            .map(|idx| idx as u32 + 1)
    }
}
