//! Per-role worker loop.
//!
//! Each worker registers once with the shared [`PhaseBarrier`], runs one round
//! per phase inside a metrics session, then waits for every other role before
//! starting the next round. On its final round it deregisters instead of
//! waiting, so the last worker out terminates the barrier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use vigil_core::{BarrierError, Role};
use vigil_metrics::{with_session, MetricRegistry, MetricsReporter};

use crate::barrier::{ParticipantId, PhaseBarrier};
use crate::round::Round;

/// Granularity of the interruptible pause between rounds.
const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// Loop controls for one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Pause after each synchronized round.
    pub round_interval: Duration,
    /// Stop after this many rounds; `None` runs until shutdown.
    pub max_rounds: Option<u64>,
}

impl WorkerOptions {
    /// Pause used between rounds unless configured otherwise.
    pub const DEFAULT_ROUND_INTERVAL: Duration = Duration::from_millis(1000);

    /// Sets the pause between rounds.
    #[must_use]
    pub const fn with_round_interval(mut self, interval: Duration) -> Self {
        self.round_interval = interval;
        self
    }

    /// Sets the round limit.
    #[must_use]
    pub const fn with_max_rounds(mut self, max_rounds: Option<u64>) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            round_interval: Self::DEFAULT_ROUND_INTERVAL,
            max_rounds: None,
        }
    }
}

/// What a worker did before it left the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Role of the worker.
    pub role: Role,
    /// Rounds run.
    pub rounds: u64,
    /// Rounds that failed to set up or whose metrics session did not start.
    pub failed_rounds: u64,
    /// Phase the worker deregistered at.
    pub final_phase: u64,
}

/// A registered barrier seat. Deregisters on drop unless already left.
///
/// Keeps a panicking or abandoned worker from leaving its peers blocked.
struct Membership {
    barrier: Arc<PhaseBarrier>,
    id: Option<ParticipantId>,
}

impl Membership {
    fn join(barrier: Arc<PhaseBarrier>) -> Result<Self, BarrierError> {
        let id = barrier.register()?;
        Ok(Self {
            barrier,
            id: Some(id),
        })
    }

    fn phase(&self) -> u64 {
        self.barrier.phase()
    }

    fn await_advance(&self) -> Result<u64, BarrierError> {
        match self.id {
            Some(id) => self.barrier.arrive_and_await_advance(id),
            None => Err(BarrierError::NotRegistered { participant: 0 }),
        }
    }

    fn leave(&mut self) -> Result<u64, BarrierError> {
        match self.id.take() {
            Some(id) => self.barrier.arrive_and_deregister(id),
            None => Err(BarrierError::NotRegistered { participant: 0 }),
        }
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            if let Err(err) = self.barrier.arrive_and_deregister(id) {
                warn!(participant = %id, error = %err, "could not leave barrier");
            }
        }
    }
}

/// Drives one role's rounds in lock step with the other roles.
pub struct WorkerLoop<R> {
    round: R,
    membership: Membership,
    registry: Arc<MetricRegistry>,
    reporter: Arc<dyn MetricsReporter>,
    shutdown: Arc<AtomicBool>,
    options: WorkerOptions,
}

impl<R: Round> WorkerLoop<R> {
    /// Creates a worker and registers it with `barrier`.
    ///
    /// Register every worker before starting any of them, so the first phase
    /// waits for all of them.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::Terminated`] if the barrier has terminated.
    pub fn new(
        round: R,
        barrier: Arc<PhaseBarrier>,
        registry: Arc<MetricRegistry>,
        reporter: Arc<dyn MetricsReporter>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, BarrierError> {
        Ok(Self {
            round,
            membership: Membership::join(barrier)?,
            registry,
            reporter,
            shutdown,
            options: WorkerOptions::default(),
        })
    }

    /// Sets the loop controls.
    #[must_use]
    pub fn with_options(mut self, options: WorkerOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs rounds until shutdown or the round limit, then leaves the barrier.
    ///
    /// Round setup failures are logged and do not stop the loop.
    ///
    /// # Errors
    ///
    /// Returns a [`BarrierError`] if the barrier rejects this worker.
    pub fn run(mut self) -> Result<WorkerSummary, BarrierError> {
        let role = self.round.role();
        let mut summary = WorkerSummary {
            role,
            rounds: 0,
            failed_rounds: 0,
            final_phase: 0,
        };

        loop {
            let start = Instant::now();
            let phase = self.membership.phase();
            info!(%role, phase, "party has arrived and is working in phase");

            let round = &mut self.round;
            let result = with_session(self.reporter.as_ref(), &self.registry, |_| round.run_round());
            match result {
                Some(Ok(outcome)) => {
                    info!(
                        %role,
                        phase,
                        try_count = outcome.try_count,
                        fail_count = outcome.fail_count,
                        availability = ?outcome.availability,
                        "round complete"
                    );
                }
                Some(Err(err)) => {
                    summary.failed_rounds += 1;
                    error!(%role, phase, code = err.error_code(), error = %err, "round setup failed");
                }
                None => summary.failed_rounds += 1,
            }
            summary.rounds += 1;
            info!(%role, phase, elapsed_ms = start.elapsed().as_millis(), "round elapsed");

            if self.is_final_round(summary.rounds) {
                summary.final_phase = self.membership.leave()?;
                break;
            }
            self.membership.await_advance()?;
            self.pause();
            if self.shutdown.load(Ordering::SeqCst) {
                info!(
                    %role,
                    rounds = summary.rounds,
                    "shutdown during pause, leaving before next round"
                );
                summary.final_phase = self.membership.leave()?;
                break;
            }
        }

        info!(%role, rounds = summary.rounds, "worker has been completed");
        Ok(summary)
    }

    fn is_final_round(&self, rounds: u64) -> bool {
        self.shutdown.load(Ordering::SeqCst)
            || self.options.max_rounds.is_some_and(|max| rounds >= max)
    }

    fn pause(&self) {
        let deadline = Instant::now() + self.options.round_interval;
        while !self.shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(PAUSE_SLICE.min(deadline - now));
        }
    }
}
