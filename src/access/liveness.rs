// Last-contact bookkeeping per client

use std::collections::HashMap;
use std::time::Instant;

use crate::messages::ClientId;

/// Records when each client was last heard from. No policy lives here.
#[derive(Debug, Default)]
pub struct LivenessTracker {
    last_seen: HashMap<ClientId, Instant>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_alive(&mut self, client: &ClientId) {
        self.mark_alive_at(client, Instant::now());
    }

    pub fn mark_alive_at(&mut self, client: &ClientId, now: Instant) {
        self.last_seen.insert(client.clone(), now);
    }

    pub fn last_seen(&self, client: &ClientId) -> Option<Instant> {
        self.last_seen.get(client).copied()
    }
}
