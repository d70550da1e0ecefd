//! Room-wide drawing overlay.
//!
//! The teacher owns the overlay; students only mirror it. Every change is
//! broadcast as the complete line list so a late or reconnecting viewer never
//! depends on earlier messages.

use tracing::{debug, warn};

use crate::protocol::{ClientEvent, Polyline, Role};

#[derive(Debug)]
pub struct AnnotationOverlay {
    room_id: String,
    role: Role,
    lines: Vec<Polyline>,
}

impl AnnotationOverlay {
    pub fn new(room_id: impl Into<String>, role: Role) -> Self {
        Self {
            room_id: room_id.into(),
            role,
            lines: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[Polyline] {
        &self.lines
    }

    pub fn is_producer(&self) -> bool {
        self.role == Role::Teacher
    }

    pub fn add_line(&mut self, line: Polyline) -> Option<ClientEvent> {
        if !self.is_producer() {
            debug!("annotation ignored, not the producer");
            return None;
        }
        if !line.is_valid() {
            warn!("rejecting empty annotation line");
            return None;
        }
        self.lines.push(line);
        Some(self.snapshot())
    }

    pub fn set_lines(&mut self, lines: Vec<Polyline>) -> Option<ClientEvent> {
        if !self.is_producer() {
            debug!("annotation ignored, not the producer");
            return None;
        }
        self.lines = valid_only(lines);
        Some(self.snapshot())
    }

    pub fn clear(&mut self) -> Option<ClientEvent> {
        if !self.is_producer() {
            debug!("annotation clear ignored, not the producer");
            return None;
        }
        self.lines.clear();
        Some(ClientEvent::ClearAnnotations {
            room_id: self.room_id.clone(),
        })
    }

    /// Replace local state with the room's full line list.
    pub fn on_update(&mut self, lines: Vec<Polyline>) {
        self.lines = valid_only(lines);
    }

    pub fn on_cleared(&mut self) {
        self.lines.clear();
    }

    /// Annotations never outlive the connection they were drawn on.
    pub fn on_disconnect(&mut self) {
        self.lines.clear();
    }

    fn snapshot(&self) -> ClientEvent {
        ClientEvent::UpdateAnnotations {
            room_id: self.room_id.clone(),
            lines: self.lines.clone(),
        }
    }
}

fn valid_only(lines: Vec<Polyline>) -> Vec<Polyline> {
    let total = lines.len();
    let kept: Vec<Polyline> = lines.into_iter().filter(Polyline::is_valid).collect();
    if kept.len() != total {
        warn!(dropped = total - kept.len(), "dropped empty annotation lines");
    }
    kept
}
