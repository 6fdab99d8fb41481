//! Multi-party phase barrier with dynamic registration.
//!
//! Each worker role registers one participant. A phase completes when every
//! participant registered for it has arrived; deregistering counts as arriving.
//! Completing a phase increments the phase number by exactly one, clears all
//! arrival flags and wakes every waiter. When the last participant leaves, the
//! barrier terminates and the phase number is frozen.
//!
//! ```text
//!   register ──▶ [unarrived] ──arrive_and_await_advance──▶ [arrived] ──advance──▶ [unarrived]
//!                     │
//!                     └──arrive_and_deregister──▶ (gone)
//! ```
//!
//! Protocol violations (unknown participant, second arrival in one phase) are
//! reported as [`BarrierError`] and leave the state untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use vigil_core::BarrierError;

/// Handle identifying one registered participant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(u64);

impl ParticipantId {
    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "participant({})", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "participant-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct PhaseState {
    /// Running phase.
    phase: u64,
    /// Participants of the running phase and whether each has arrived.
    participants: BTreeMap<ParticipantId, bool>,
    /// Next id to hand out.
    next_id: u64,
    /// Set once the last participant leaves after at least one phase ran.
    terminated: bool,
}

impl PhaseState {
    fn arrived(&self) -> usize {
        self.participants.values().filter(|&&arrived| arrived).count()
    }

    fn check_arrival(&self, id: ParticipantId) -> Result<(), BarrierError> {
        match self.participants.get(&id) {
            None => Err(BarrierError::NotRegistered { participant: id.0 }),
            Some(true) => Err(BarrierError::AlreadyArrived {
                participant: id.0,
                phase: self.phase,
            }),
            Some(false) => Ok(()),
        }
    }

    /// Advances the phase if every remaining participant has arrived.
    ///
    /// Returns true if the phase advanced.
    fn try_advance(&mut self) -> bool {
        if self.arrived() != self.participants.len() {
            return false;
        }
        self.phase += 1;
        for arrived in self.participants.values_mut() {
            *arrived = false;
        }
        if self.participants.is_empty() {
            self.terminated = true;
        }
        true
    }
}

/// Point-in-time view of a barrier, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierState {
    /// Running (or final) phase.
    pub phase: u64,
    /// Participants registered for the running phase.
    pub registered: usize,
    /// Participants that arrived in the running phase.
    pub arrived: usize,
    /// Whether the barrier has terminated.
    pub terminated: bool,
}

/// A reusable barrier whose party count changes as participants come and go.
#[derive(Debug, Default)]
pub struct PhaseBarrier {
    state: Mutex<PhaseState>,
    advanced: Condvar,
}

impl PhaseBarrier {
    /// Creates a barrier at phase 0 with no participants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PhaseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an unarrived participant to the running phase.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::Terminated`] once the barrier has terminated.
    pub fn register(&self) -> Result<ParticipantId, BarrierError> {
        let mut state = self.lock();
        if state.terminated {
            return Err(BarrierError::Terminated { phase: state.phase });
        }
        let id = ParticipantId(state.next_id);
        state.next_id += 1;
        state.participants.insert(id, false);
        debug!(
            participant = %id,
            phase = state.phase,
            registered = state.participants.len(),
            arrived = state.arrived(),
            "registered with barrier"
        );
        Ok(id)
    }

    /// Arrives and leaves the barrier in one step. Never blocks.
    ///
    /// Returns the phase arrived at.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not registered or already arrived in the
    /// running phase.
    pub fn arrive_and_deregister(&self, id: ParticipantId) -> Result<u64, BarrierError> {
        let mut state = self.lock();
        state.check_arrival(id)?;

        let phase = state.phase;
        state.participants.remove(&id);
        if state.try_advance() {
            self.advanced.notify_all();
        }
        debug!(
            participant = %id,
            phase = state.phase,
            registered = state.participants.len(),
            arrived = state.arrived(),
            terminated = state.terminated,
            "deregistered from barrier"
        );
        Ok(phase)
    }

    /// Arrives, stays registered, and blocks until the phase advances.
    ///
    /// Returns the new phase.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not registered or already arrived in the
    /// running phase.
    pub fn arrive_and_await_advance(&self, id: ParticipantId) -> Result<u64, BarrierError> {
        let mut state = self.lock();
        state.check_arrival(id)?;

        let phase = state.phase;
        state.participants.insert(id, true);
        if state.try_advance() {
            self.advanced.notify_all();
            debug!(participant = %id, phase = state.phase, "advanced barrier");
            return Ok(state.phase);
        }

        debug!(
            participant = %id,
            phase,
            registered = state.participants.len(),
            arrived = state.arrived(),
            "waiting at barrier"
        );
        let state = self
            .advanced
            .wait_while(state, |s| s.phase == phase)
            .unwrap_or_else(PoisonError::into_inner);
        Ok(state.phase)
    }

    /// Returns the running phase, or the final phase once terminated.
    #[must_use]
    pub fn phase(&self) -> u64 {
        self.lock().phase
    }

    /// Returns the number of participants registered for the running phase.
    #[must_use]
    pub fn registered_parties(&self) -> usize {
        self.lock().participants.len()
    }

    /// Returns the number of participants that arrived in the running phase.
    #[must_use]
    pub fn arrived_parties(&self) -> usize {
        self.lock().arrived()
    }

    /// Returns true once every participant has left and a phase has completed.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.lock().terminated
    }

    /// Returns a consistent view of the barrier.
    #[must_use]
    pub fn state(&self) -> BarrierState {
        let state = self.lock();
        BarrierState {
            phase: state.phase,
            registered: state.participants.len(),
            arrived: state.arrived(),
            terminated: state.terminated,
        }
    }
}
