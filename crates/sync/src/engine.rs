//! Per-participant synchronization engine.
//!
//! The engine is single-threaded: the host drives it with local editor
//! activity ([`SyncEngine::pump_editor_events`]) and with transport signals
//! ([`SyncEngine::handle_signal`]), and it reacts by publishing events on its
//! [`RealtimeBus`] and by patching the editor.

use tracing::{debug, info, warn};

use crate::annotation::AnnotationOverlay;
use crate::buffer::BufferCache;
use crate::bus::{BusError, BusSignal, RealtimeBus};
use crate::cursor::{CursorRelay, RemoteCursor};
use crate::diff::{compute_edits_with, normalize_newlines, DiffOptions};
use crate::editor::{EditorAdapter, EditorEvent, RemoteApply};
use crate::error::Result;
use crate::protocol::{
    ClientEvent, CollabId, Polyline, ProblemId, Role, ServerEvent, StudentInfo,
};
use crate::session::{SessionManager, SessionPhase};

/// Who is running this engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub room_id: String,
    pub invite_code: String,
    pub user_id: String,
    pub user_name: String,
    pub role: Role,
}

impl Participant {
    pub fn teacher(
        room_id: impl Into<String>,
        invite_code: impl Into<String>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self::with_role(room_id, invite_code, user_id, user_name, Role::Teacher)
    }

    pub fn student(
        room_id: impl Into<String>,
        invite_code: impl Into<String>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self::with_role(room_id, invite_code, user_id, user_name, Role::Student)
    }

    fn with_role(
        room_id: impl Into<String>,
        invite_code: impl Into<String>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            invite_code: invite_code.into(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Outside,
    Joining,
    Joined,
    Full,
    NotFound,
}

pub struct SyncEngine<E, B> {
    me: Participant,
    editor: E,
    bus: B,
    link_up: bool,
    wants_room: bool,
    membership: Membership,
    session: SessionManager,
    buffers: BufferCache,
    cursor: CursorRelay,
    annotations: AnnotationOverlay,
    roster: Vec<StudentInfo>,
    local_problem: Option<ProblemId>,
    /// Start requests made while the link was down, sent on the next connect.
    deferred: Vec<ClientEvent>,
    diff_options: DiffOptions,
}

impl<E: EditorAdapter, B: RealtimeBus> SyncEngine<E, B> {
    /// Create an engine. The link is assumed down until the bus reports
    /// [`BusSignal::Connected`].
    pub fn new(me: Participant, editor: E, bus: B) -> Self {
        let session = SessionManager::new(me.room_id.clone(), me.invite_code.clone());
        let annotations = AnnotationOverlay::new(me.room_id.clone(), me.role);
        Self {
            me,
            editor,
            bus,
            link_up: false,
            wants_room: false,
            membership: Membership::Outside,
            session,
            buffers: BufferCache::new(),
            cursor: CursorRelay::new(),
            annotations,
            roster: Vec::new(),
            local_problem: None,
            deferred: Vec::new(),
            diff_options: DiffOptions::default(),
        }
    }

    pub fn with_diff_options(mut self, options: DiffOptions) -> Self {
        self.diff_options = options;
        self
    }

    pub fn participant(&self) -> &Participant {
        &self.me
    }

    pub fn role(&self) -> Role {
        self.me.role
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    /// Mutable access for simulating user input. Call
    /// [`pump_editor_events`](Self::pump_editor_events) afterwards.
    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn is_connected(&self) -> bool {
        self.link_up
    }

    pub fn membership(&self) -> Membership {
        self.membership
    }

    pub fn session_phase(&self) -> &SessionPhase {
        self.session.phase()
    }

    pub fn collaboration_id(&self) -> Option<&CollabId> {
        self.session.current_id()
    }

    pub fn tracked_problem(&self) -> Option<ProblemId> {
        self.session.tracked_problem()
    }

    pub fn local_problem(&self) -> Option<ProblemId> {
        self.local_problem
    }

    pub fn buffer(&self, problem_id: ProblemId) -> Option<&str> {
        self.buffers.get(problem_id)
    }

    pub fn remote_cursor(&self) -> Option<RemoteCursor> {
        self.cursor.remote()
    }

    pub fn annotations(&self) -> &[Polyline] {
        self.annotations.lines()
    }

    /// Students currently in the room, as last reported to the teacher.
    pub fn roster(&self) -> &[StudentInfo] {
        &self.roster
    }

    /// Enter the room. Repeated on every reconnect until rejected.
    pub fn join_room(&mut self) {
        self.wants_room = true;
        self.membership = Membership::Joining;
        if self.link_up {
            let event = self.join_event();
            self.send(event);
        }
    }

    /// Open a collaboration with `student_id`, closing any other one.
    pub fn start_session(&mut self, student_id: &str) {
        if self.me.role != Role::Teacher {
            warn!("only the teacher can start a collaboration");
            return;
        }
        let events = self.session.start(student_id);
        if events.is_empty() {
            return;
        }
        self.cursor.clear();
        self.drop_deferred_start();
        for event in events {
            match event {
                ClientEvent::StartCollab { .. } if !self.link_up => {
                    debug!(student_id, "offline, deferring collaboration start");
                    self.deferred.push(event);
                }
                event => self.send(event),
            }
        }
    }

    pub fn end_session(&mut self) {
        self.drop_deferred_start();
        self.cursor.clear();
        if let Some(event) = self.session.end() {
            self.send(event);
        }
    }

    /// Show another problem in the editor.
    pub fn select_problem(&mut self, problem_id: ProblemId) {
        if self.local_problem == Some(problem_id) {
            return;
        }
        // Flush typing that belongs to the problem being left.
        self.pump_editor_events();

        self.local_problem = Some(problem_id);
        self.cursor.clear();
        let text = self.buffers.text_or_empty(problem_id);
        let loaded = RemoteApply::begin(&mut self.editor).set_content(&text);
        if let Err(err) = loaded {
            warn!(%err, problem_id, "failed to load problem into editor");
        }

        if self.me.role == Role::Teacher && self.session.is_active() {
            self.request_peer_buffer(problem_id);
        }
    }

    /// Ask the student for their copy of `problem_id` and follow it.
    pub fn request_peer_buffer(&mut self, problem_id: ProblemId) {
        if self.me.role != Role::Teacher {
            debug!("only the teacher requests buffers");
            return;
        }
        let Some(id) = self.session.active_id().cloned() else {
            debug!(problem_id, "no active collaboration, not requesting buffer");
            return;
        };
        self.session.track_problem(problem_id);
        self.send(ClientEvent::RequestCode {
            collaboration_id: id,
            problem_id: Some(problem_id),
        });
    }

    /// Drain the editor's activity queue and react to it.
    pub fn pump_editor_events(&mut self) {
        let mut changed = false;
        let mut moved_to = None;
        for event in self.editor.take_events() {
            match event {
                EditorEvent::Changed => changed = true,
                EditorEvent::CursorMoved(at) => moved_to = Some(at),
            }
        }
        if changed {
            self.on_local_change();
        }
        if let Some(at) = moved_to {
            self.on_local_cursor_move(at.line_number, at.column);
        }
    }

    /// The user changed the editor content.
    pub fn on_local_change(&mut self) {
        let Some(problem_id) = self.local_problem else {
            return;
        };
        let content = normalize_newlines(&self.editor.content());
        if !self.buffers.store(problem_id, &content) {
            return;
        }
        let Some(id) = self.session.active_id() else {
            return;
        };
        if self.session.tracked_problem() != Some(problem_id) {
            debug!(problem_id, "peer follows another problem, not broadcasting");
            return;
        }
        let event = ClientEvent::Edit {
            collaboration_id: id.clone(),
            problem_id,
            code: content,
        };
        self.send(event);
    }

    pub fn on_local_cursor_move(&mut self, line_number: u32, column: u32) {
        if let Some(event) =
            CursorRelay::outbound(&self.session, line_number, column, self.local_problem)
        {
            self.send(event);
        }
    }

    pub fn add_annotation(&mut self, line: Polyline) {
        if let Some(event) = self.annotations.add_line(line) {
            self.send(event);
        }
    }

    pub fn set_annotations(&mut self, lines: Vec<Polyline>) {
        if let Some(event) = self.annotations.set_lines(lines) {
            self.send(event);
        }
    }

    pub fn clear_annotations(&mut self) {
        if let Some(event) = self.annotations.clear() {
            self.send(event);
        }
    }

    pub fn handle_signal(&mut self, signal: BusSignal) {
        match signal {
            BusSignal::Connected => self.on_connected(),
            BusSignal::Disconnected => self.on_disconnected(),
            BusSignal::Event(event) => self.handle_event(event),
        }
    }

    pub fn handle_event(&mut self, event: ServerEvent) {
        debug!(event = event.name(), "server event");
        match event {
            ServerEvent::RoomJoined { room_id, .. } if room_id == self.me.room_id => {
                info!(room = %room_id, "joined room");
                self.membership = Membership::Joined;
            }
            ServerEvent::RoomJoined { room_id, .. } => {
                debug!(room = %room_id, "join confirmation for another room");
            }
            ServerEvent::RoomFull { room_id } => {
                warn!(room = %room_id, "room is full");
                self.wants_room = false;
                self.membership = Membership::Full;
            }
            ServerEvent::RoomNotFound { room_id } => {
                warn!(room = %room_id, "room not found or invite code rejected");
                self.wants_room = false;
                self.membership = Membership::NotFound;
            }
            ServerEvent::Roster { students, .. } => {
                self.roster = students;
            }
            ServerEvent::CollabStarted { collaboration_id } => {
                self.on_collab_started(collaboration_id);
            }
            ServerEvent::CodeRequested {
                collaboration_id,
                problem_id,
            } => self.on_code_requested(&collaboration_id, problem_id),
            ServerEvent::CodeUpdate {
                collaboration_id,
                problem_id,
                code,
            }
            | ServerEvent::Edit {
                collaboration_id,
                problem_id,
                code,
            } => self.apply_remote_update(&collaboration_id, problem_id, &code),
            ServerEvent::CollabEnded { collaboration_id } => {
                if self.session.on_ended(&collaboration_id) {
                    self.drop_deferred_start();
                    self.cursor.clear();
                }
            }
            ServerEvent::Cursor {
                collaboration_id,
                line_number,
                column,
                problem_id,
            } => {
                if self.session.accepts(&collaboration_id) {
                    self.cursor
                        .on_remote(line_number, column, problem_id, self.local_problem);
                }
            }
            ServerEvent::Annotations { lines } => self.annotations.on_update(lines),
            ServerEvent::AnnotationsCleared => self.annotations.on_cleared(),
            ServerEvent::Error { message } => warn!(%message, "server reported an error"),
        }
    }

    /// Reconcile the editor with a snapshot the peer sent for `problem_id`.
    ///
    /// Snapshots for the problem on screen are applied as a minimal edit set
    /// that keeps the user's selections; others only refresh the cache. A
    /// snapshot that cannot be applied is dropped.
    pub fn apply_remote_update(&mut self, id: &CollabId, problem_id: ProblemId, code: &str) {
        // Local typing not yet seen must go out before the editor is patched.
        self.pump_editor_events();

        if !self.session.admit_update(id, problem_id) {
            debug!(collab = %id, problem_id, "ignoring update outside the tracked problem");
            return;
        }
        let code = normalize_newlines(code);
        if self.local_problem == Some(problem_id) {
            match self.reconcile(&code) {
                Ok(0) => {}
                Ok(applied) => debug!(problem_id, edits = applied, "applied remote update"),
                Err(err) => {
                    warn!(%err, problem_id, "dropping remote update");
                    return;
                }
            }
        }
        self.buffers.store(problem_id, &code);
    }

    fn reconcile(&mut self, incoming: &str) -> Result<usize> {
        let mut scope = RemoteApply::begin(&mut self.editor);
        let edits = compute_edits_with(&scope.content(), incoming, &self.diff_options);
        if edits.is_empty() {
            return Ok(0);
        }
        scope.apply_edits(&edits)?;
        Ok(edits.len())
    }

    fn on_collab_started(&mut self, id: CollabId) {
        match self.me.role {
            Role::Teacher => {
                if self.session.on_started(&id) {
                    self.cursor.clear();
                }
            }
            Role::Student => {
                if id.room_id != self.me.room_id || id.student_id != self.me.user_id {
                    return;
                }
                self.pump_editor_events();
                self.session.accept(id.clone(), self.local_problem);
                self.cursor.clear();
                // Seed the teacher with whatever is on screen.
                if let Some(problem_id) = self.local_problem {
                    let code = self.current_text(problem_id);
                    self.send(ClientEvent::SendCode {
                        collaboration_id: id,
                        problem_id,
                        code,
                    });
                }
            }
        }
    }

    fn on_code_requested(&mut self, id: &CollabId, problem_id: Option<ProblemId>) {
        if self.me.role != Role::Student || !self.session.accepts(id) {
            return;
        }
        let Some(problem_id) = problem_id.or(self.local_problem) else {
            debug!(collab = %id, "buffer requested but no problem is open");
            return;
        };
        self.session.track_problem(problem_id);
        let code = self.current_text(problem_id);
        self.send(ClientEvent::SendCode {
            collaboration_id: id.clone(),
            problem_id,
            code,
        });
    }

    fn on_connected(&mut self) {
        info!(room = %self.me.room_id, "link up");
        self.link_up = true;
        if self.wants_room {
            self.membership = Membership::Joining;
            let event = self.join_event();
            self.send(event);
        }
        for event in std::mem::take(&mut self.deferred) {
            self.send(event);
        }
    }

    fn on_disconnected(&mut self) {
        if !self.link_up {
            return;
        }
        info!(room = %self.me.room_id, "link down");
        self.link_up = false;
        if self.wants_room {
            self.membership = Membership::Joining;
        }
        self.session.reset();
        self.cursor.clear();
        self.annotations.on_disconnect();
    }

    /// Text of `problem_id`, read from the editor when it is on screen.
    fn current_text(&self, problem_id: ProblemId) -> String {
        if self.local_problem == Some(problem_id) {
            normalize_newlines(&self.editor.content())
        } else {
            self.buffers.text_or_empty(problem_id)
        }
    }

    fn join_event(&self) -> ClientEvent {
        ClientEvent::JoinRoom {
            room_id: self.me.room_id.clone(),
            invite_code: self.me.invite_code.clone(),
            user_id: self.me.user_id.clone(),
            user_name: self.me.user_name.clone(),
            role: self.me.role,
        }
    }

    fn drop_deferred_start(&mut self) {
        self.deferred
            .retain(|event| !matches!(event, ClientEvent::StartCollab { .. }));
    }

    fn send(&mut self, event: ClientEvent) {
        let name = event.name();
        if !self.link_up {
            debug!(event = name, "offline, dropping event");
            return;
        }
        match self.bus.emit(event) {
            Ok(()) => {}
            Err(BusError::Full) => warn!(event = name, "outbound queue full, dropping event"),
            Err(BusError::Closed) => {
                warn!(event = name, "bus closed");
                self.on_disconnected();
            }
        }
    }
}
