//! Collaboration session state machine.
//!
//! A teacher runs `Idle -> Connecting -> Active -> Idle`; a student moves
//! straight from `Idle` to `Active` when the server announces a session for
//! it. At most one session exists at a time per manager.

use tracing::{debug, info};

use crate::protocol::{ClientEvent, CollabId, ProblemId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting {
        id: CollabId,
    },
    Active {
        id: CollabId,
        /// Problem both sides are assumed to be looking at. Unset until the
        /// first snapshot of the session arrives.
        problem: Option<ProblemId>,
    },
}

#[derive(Debug)]
pub struct SessionManager {
    room_id: String,
    invite_code: String,
    phase: SessionPhase,
}

impl SessionManager {
    pub fn new(room_id: impl Into<String>, invite_code: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            invite_code: invite_code.into(),
            phase: SessionPhase::Idle,
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == SessionPhase::Idle
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Active { .. })
    }

    /// Id of the session once it is active.
    pub fn active_id(&self) -> Option<&CollabId> {
        match &self.phase {
            SessionPhase::Active { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Id of the pending or active session.
    pub fn current_id(&self) -> Option<&CollabId> {
        match &self.phase {
            SessionPhase::Idle => None,
            SessionPhase::Connecting { id } | SessionPhase::Active { id, .. } => Some(id),
        }
    }

    pub fn tracked_problem(&self) -> Option<ProblemId> {
        match &self.phase {
            SessionPhase::Active { problem, .. } => *problem,
            _ => None,
        }
    }

    /// Whether inbound traffic for `id` belongs to the active session.
    pub fn accepts(&self, id: &CollabId) -> bool {
        self.active_id() == Some(id)
    }

    /// Point the active session at another problem.
    pub fn track_problem(&mut self, problem_id: ProblemId) -> bool {
        match &mut self.phase {
            SessionPhase::Active { problem, .. } => {
                *problem = Some(problem_id);
                true
            }
            _ => false,
        }
    }

    /// Open a session with `student_id`, ending any other one first.
    ///
    /// Returns the events to emit, in order.
    pub fn start(&mut self, student_id: &str) -> Vec<ClientEvent> {
        let id = CollabId::new(self.room_id.clone(), student_id);
        match &self.phase {
            SessionPhase::Active { id: open, .. } if *open == id => {
                debug!(collab = %id, "session already open");
                return Vec::new();
            }
            // Nothing confirmed yet, so ask again without tearing anything down.
            SessionPhase::Connecting { id: pending } if *pending == id => {
                debug!(collab = %id, "start still pending, asking again");
                return vec![self.start_event(student_id)];
            }
            _ => {}
        }

        let mut events = Vec::with_capacity(2);
        if let Some(end) = self.end() {
            events.push(end);
        }
        info!(collab = %id, "starting collaboration");
        self.phase = SessionPhase::Connecting { id };
        events.push(self.start_event(student_id));
        events
    }

    fn start_event(&self, student_id: &str) -> ClientEvent {
        ClientEvent::StartCollab {
            room_id: self.room_id.clone(),
            invite_code: self.invite_code.clone(),
            student_id: student_id.to_string(),
        }
    }

    /// Close the current session, returning the end signal for the peer.
    pub fn end(&mut self) -> Option<ClientEvent> {
        let id = match std::mem::replace(&mut self.phase, SessionPhase::Idle) {
            SessionPhase::Idle => return None,
            SessionPhase::Connecting { id } | SessionPhase::Active { id, .. } => id,
        };
        info!(collab = %id, "ending collaboration");
        Some(ClientEvent::EndCollab {
            collaboration_id: id,
        })
    }

    /// The server confirmed the session this side asked for.
    pub fn on_started(&mut self, id: &CollabId) -> bool {
        match &self.phase {
            SessionPhase::Connecting { id: pending } if pending == id => {
                info!(collab = %id, "collaboration active");
                self.phase = SessionPhase::Active {
                    id: id.clone(),
                    problem: None,
                };
                true
            }
            _ => {
                debug!(collab = %id, "ignoring start for a session we did not request");
                false
            }
        }
    }

    /// Join a session opened by the peer.
    pub fn accept(&mut self, id: CollabId, problem: Option<ProblemId>) {
        info!(collab = %id, ?problem, "joined collaboration");
        self.phase = SessionPhase::Active { id, problem };
    }

    /// The peer or the server ended `id`.
    pub fn on_ended(&mut self, id: &CollabId) -> bool {
        if self.current_id() != Some(id) {
            return false;
        }
        info!(collab = %id, "collaboration ended by peer");
        self.phase = SessionPhase::Idle;
        true
    }

    /// Drop the session without signalling, e.g. after the bus went away.
    pub fn reset(&mut self) {
        if let Some(id) = self.current_id() {
            info!(collab = %id, "collaboration reset");
        }
        self.phase = SessionPhase::Idle;
    }

    /// Decide whether a snapshot for `problem` may be applied.
    ///
    /// The first snapshot of a session sets the tracked problem; after that
    /// only snapshots for the tracked problem pass.
    pub fn admit_update(&mut self, id: &CollabId, problem: ProblemId) -> bool {
        let SessionPhase::Active {
            id: active,
            problem: tracked,
        } = &mut self.phase
        else {
            return false;
        };
        if active != id {
            return false;
        }
        match tracked {
            None => {
                debug!(collab = %id, problem, "session seeded");
                *tracked = Some(problem);
                true
            }
            Some(current) => *current == problem,
        }
    }
}
