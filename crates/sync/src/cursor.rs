//! Peer cursor propagation.

use serde::{Deserialize, Serialize};

use crate::protocol::{ClientEvent, ProblemId};
use crate::session::SessionManager;

/// Where the peer's caret is, in the problem the local user is viewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCursor {
    pub line_number: u32,
    pub column: u32,
}

#[derive(Debug, Default)]
pub struct CursorRelay {
    remote: Option<RemoteCursor>,
}

impl CursorRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// The peer cursor to render, if any.
    pub fn remote(&self) -> Option<RemoteCursor> {
        self.remote
    }

    /// Build the outbound update for a local caret move, if a session is
    /// active and a problem is open.
    pub fn outbound(
        session: &SessionManager,
        line_number: u32,
        column: u32,
        local_problem: Option<ProblemId>,
    ) -> Option<ClientEvent> {
        let id = session.active_id()?;
        let problem_id = local_problem?;
        Some(ClientEvent::Cursor {
            collaboration_id: id.clone(),
            line_number,
            column,
            problem_id,
        })
    }

    /// Record the peer's caret. It is only kept when the peer is in the
    /// problem shown locally; anything else hides the indicator.
    pub fn on_remote(
        &mut self,
        line_number: u32,
        column: u32,
        problem_id: ProblemId,
        local_problem: Option<ProblemId>,
    ) {
        self.remote = (local_problem == Some(problem_id)).then_some(RemoteCursor {
            line_number,
            column,
        });
    }

    pub fn clear(&mut self) {
        self.remote = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CollabId;

    #[test]
    fn remote_cursor_visible_only_in_same_problem() {
        for local in [None, Some(1), Some(2)] {
            for remote in [1, 2] {
                let mut relay = CursorRelay::new();
                relay.on_remote(4, 2, remote, local);
                assert_eq!(relay.remote().is_some(), local == Some(remote));
            }
        }
    }

    #[test]
    fn stale_problem_hides_existing_cursor() {
        let mut relay = CursorRelay::new();
        relay.on_remote(3, 5, 9, Some(9));
        assert_eq!(
            relay.remote(),
            Some(RemoteCursor {
                line_number: 3,
                column: 5
            })
        );
        relay.on_remote(1, 1, 10, Some(9));
        assert_eq!(relay.remote(), None);
    }

    #[test]
    fn outbound_requires_active_session_and_problem() {
        let mut session = SessionManager::new("42", "code");
        assert!(CursorRelay::outbound(&session, 1, 1, Some(9)).is_none());

        session.accept(CollabId::new("42", "7"), None);
        assert!(CursorRelay::outbound(&session, 1, 1, None).is_none());
        assert_eq!(
            CursorRelay::outbound(&session, 3, 5, Some(9)),
            Some(ClientEvent::Cursor {
                collaboration_id: CollabId::new("42", "7"),
                line_number: 3,
                column: 5,
                problem_id: 9,
            })
        );
    }
}
