//! Write-phase and read-phase idle timers.
//!
//! The write timer runs only while the transport holds the request back: a
//! frame waiting for the transport to become ready, or accepted frames waiting
//! on a flush. It is disarmed while the body producer has nothing to send, so
//! a slow producer is never a write stall. Any accepted frame counts as
//! progress. The read timer covers the response, from the end of the write (or
//! the start of it, for full-duplex exchanges) until the connection is
//! released; any response event for the exchange counts as progress.
//!
//! Timers are polled by the connection's driver. [`TimeoutSupervisor::poll_expired`]
//! must be called after any install or progress call in the same poll so the
//! new deadline registers with the waker.

use crate::base::classifier::TimeoutPhase;
use crate::base::failure::Failure;
use crate::http::config::ClientConfig;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{sleep, Instant, Sleep};

/// A single idle timer. Every touch pushes the deadline out by one period.
#[derive(Debug)]
pub struct IdleTimer {
    phase: TimeoutPhase,
    period: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl IdleTimer {
    pub fn new(phase: TimeoutPhase, period: Duration) -> Self {
        Self {
            phase,
            period,
            sleep: Box::pin(sleep(period)),
        }
    }

    pub fn phase(&self) -> TimeoutPhase {
        self.phase
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Record progress.
    pub fn touch(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + self.period);
    }

    pub fn poll(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        self.sleep.as_mut().poll(cx)
    }

    fn failure(&self) -> Failure {
        match self.phase {
            TimeoutPhase::Write => Failure::WriteIdle(self.period),
            TimeoutPhase::Read => Failure::ReadIdle(self.period),
        }
    }
}

/// The two idle timers of one exchange.
#[derive(Debug)]
pub struct TimeoutSupervisor {
    write_period: Duration,
    read_period: Duration,
    write: Option<IdleTimer>,
    read: Option<IdleTimer>,
}

impl TimeoutSupervisor {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            write_period: config.write_timeout,
            read_period: config.read_timeout,
            write: None,
            read: None,
        }
    }

    /// Start the write timer unless it is already running. A zero write
    /// timeout leaves it uninstalled.
    pub fn arm_write(&mut self) {
        if self.write.is_none() {
            self.write = Self::timer(TimeoutPhase::Write, self.write_period);
        }
    }

    pub fn remove_write(&mut self) {
        self.write = None;
    }

    /// Start the read timer. A zero read timeout leaves it uninstalled.
    pub fn install_read(&mut self) {
        self.read = Self::timer(TimeoutPhase::Read, self.read_period);
    }

    pub fn remove_read(&mut self) {
        self.read = None;
    }

    pub fn write_progress(&mut self) {
        if let Some(timer) = self.write.as_mut() {
            timer.touch();
        }
    }

    pub fn read_progress(&mut self) {
        if let Some(timer) = self.read.as_mut() {
            timer.touch();
        }
    }

    pub fn is_installed(&self, phase: TimeoutPhase) -> bool {
        match phase {
            TimeoutPhase::Write => self.write.is_some(),
            TimeoutPhase::Read => self.read.is_some(),
        }
    }

    /// Resolve with the failure of the first timer that fires. A fired timer
    /// is removed.
    pub fn poll_expired(&mut self, cx: &mut Context<'_>) -> Poll<Failure> {
        for slot in [&mut self.write, &mut self.read] {
            if let Some(timer) = slot.as_mut() {
                if timer.poll(cx).is_ready() {
                    let failure = timer.failure();
                    *slot = None;
                    return Poll::Ready(failure);
                }
            }
        }
        Poll::Pending
    }

    fn timer(phase: TimeoutPhase, period: Duration) -> Option<IdleTimer> {
        if period.is_zero() {
            None
        } else {
            Some(IdleTimer::new(phase, period))
        }
    }
}
