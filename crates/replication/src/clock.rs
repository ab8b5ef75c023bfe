//! Clock collaborator.
//!
//! Time is injected so validation and input timestamps can run against
//! controlled time in tests.

use std::cell::Cell;
use std::time::Instant;

use kartsync_sim::Seconds;

/// Source of participant time.
pub trait Clock {
    /// Authoritative server clock, if this participant has one synchronized.
    fn server_time(&self) -> Option<Seconds>;

    /// Local simulation time.
    fn local_time(&self) -> Seconds;

    /// Server time, falling back to local time.
    fn now(&self) -> Seconds {
        self.server_time().unwrap_or_else(|| self.local_time())
    }
}

/// Manually advanced clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    local: Cell<Seconds>,
    server_offset: Cell<Option<Seconds>>,
}

impl ManualClock {
    /// Clock at `local` seconds with no server synchronization.
    pub fn new(local: Seconds) -> Self {
        Self {
            local: Cell::new(local),
            server_offset: Cell::new(None),
        }
    }

    /// Clock whose server time is `local + offset`.
    pub fn synced(local: Seconds, offset: Seconds) -> Self {
        Self {
            local: Cell::new(local),
            server_offset: Cell::new(Some(offset)),
        }
    }

    pub fn advance(&self, seconds: Seconds) {
        self.local.set(self.local.get() + seconds);
    }

    pub fn set(&self, local: Seconds) {
        self.local.set(local);
    }

    pub fn set_server_offset(&self, offset: Option<Seconds>) {
        self.server_offset.set(offset);
    }
}

impl Clock for ManualClock {
    fn server_time(&self) -> Option<Seconds> {
        self.server_offset.get().map(|offset| self.local.get() + offset)
    }

    fn local_time(&self) -> Seconds {
        self.local.get()
    }
}

/// Monotonic wall clock measured from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
    server_offset: Option<Seconds>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            server_offset: None,
        }
    }

    /// Record the offset from local time to the server clock.
    pub fn sync_server(&mut self, offset: Seconds) {
        self.server_offset = Some(offset);
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn server_time(&self) -> Option<Seconds> {
        self.server_offset.map(|offset| self.local_time() + offset)
    }

    fn local_time(&self) -> Seconds {
        self.start.elapsed().as_secs_f64()
    }
}
