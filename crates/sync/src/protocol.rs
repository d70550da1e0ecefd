//! Wire protocol shared by the sync engine and the room server.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": { ... }}` with camelCase payload keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Problems are identified by the integer id the room's problem set uses.
pub type ProblemId = i64;

/// Identifies a collaboration session.
///
/// Both peers derive it from the room and the student, so neither side needs a
/// shared registry to correlate inbound events. It travels as a structured
/// object, never as a delimited string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollabId {
    pub room_id: String,
    pub student_id: String,
}

impl CollabId {
    pub fn new(room_id: impl Into<String>, student_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            student_id: student_id.into(),
        }
    }
}

impl fmt::Display for CollabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.room_id, self.student_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One free-hand stroke of the annotation overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub points: Vec<Point>,
    pub color: String,
}

impl Polyline {
    pub fn new(points: Vec<Point>, color: impl Into<String>) -> Self {
        Self {
            points,
            color: color.into(),
        }
    }

    /// A stroke must carry at least one point.
    pub fn is_valid(&self) -> bool {
        !self.points.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub user_id: String,
    pub user_name: String,
}

/// Events a participant sends to the room server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    #[serde(rename = "room:join")]
    JoinRoom {
        room_id: String,
        invite_code: String,
        user_id: String,
        user_name: String,
        role: Role,
    },

    #[serde(rename = "collab:start")]
    StartCollab {
        room_id: String,
        invite_code: String,
        student_id: String,
    },

    #[serde(rename = "code:request")]
    RequestCode {
        collaboration_id: CollabId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        problem_id: Option<ProblemId>,
    },

    #[serde(rename = "code:send")]
    SendCode {
        collaboration_id: CollabId,
        problem_id: ProblemId,
        code: String,
    },

    #[serde(rename = "collab:edit")]
    Edit {
        collaboration_id: CollabId,
        problem_id: ProblemId,
        code: String,
    },

    #[serde(rename = "collab:end")]
    EndCollab { collaboration_id: CollabId },

    #[serde(rename = "cursor:update")]
    Cursor {
        collaboration_id: CollabId,
        line_number: u32,
        column: u32,
        problem_id: ProblemId,
    },

    #[serde(rename = "updateSVG")]
    UpdateAnnotations { room_id: String, lines: Vec<Polyline> },

    #[serde(rename = "clearSVG")]
    ClearAnnotations { room_id: String },
}

impl ClientEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "room:join",
            ClientEvent::StartCollab { .. } => "collab:start",
            ClientEvent::RequestCode { .. } => "code:request",
            ClientEvent::SendCode { .. } => "code:send",
            ClientEvent::Edit { .. } => "collab:edit",
            ClientEvent::EndCollab { .. } => "collab:end",
            ClientEvent::Cursor { .. } => "cursor:update",
            ClientEvent::UpdateAnnotations { .. } => "updateSVG",
            ClientEvent::ClearAnnotations { .. } => "clearSVG",
        }
    }
}

/// Events the room server delivers to a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    #[serde(rename = "room:joined")]
    RoomJoined {
        room_id: String,
        user_id: String,
        role: Role,
    },

    #[serde(rename = "room:full")]
    RoomFull { room_id: String },

    #[serde(rename = "room:notfound")]
    RoomNotFound { room_id: String },

    #[serde(rename = "room:roster")]
    Roster {
        room_id: String,
        students: Vec<StudentInfo>,
    },

    #[serde(rename = "collab:started")]
    CollabStarted { collaboration_id: CollabId },

    #[serde(rename = "code:request")]
    CodeRequested {
        collaboration_id: CollabId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        problem_id: Option<ProblemId>,
    },

    #[serde(rename = "code:update")]
    CodeUpdate {
        collaboration_id: CollabId,
        problem_id: ProblemId,
        code: String,
    },

    #[serde(rename = "collab:edit")]
    Edit {
        collaboration_id: CollabId,
        problem_id: ProblemId,
        code: String,
    },

    #[serde(rename = "collab:ended")]
    CollabEnded { collaboration_id: CollabId },

    #[serde(rename = "cursor:update")]
    Cursor {
        collaboration_id: CollabId,
        line_number: u32,
        column: u32,
        problem_id: ProblemId,
    },

    #[serde(rename = "svgData")]
    Annotations { lines: Vec<Polyline> },

    #[serde(rename = "svgCleared")]
    AnnotationsCleared,

    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::RoomJoined { .. } => "room:joined",
            ServerEvent::RoomFull { .. } => "room:full",
            ServerEvent::RoomNotFound { .. } => "room:notfound",
            ServerEvent::Roster { .. } => "room:roster",
            ServerEvent::CollabStarted { .. } => "collab:started",
            ServerEvent::CodeRequested { .. } => "code:request",
            ServerEvent::CodeUpdate { .. } => "code:update",
            ServerEvent::Edit { .. } => "collab:edit",
            ServerEvent::CollabEnded { .. } => "collab:ended",
            ServerEvent::Cursor { .. } => "cursor:update",
            ServerEvent::Annotations { .. } => "svgData",
            ServerEvent::AnnotationsCleared => "svgCleared",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_events_use_wire_names_and_camel_case() {
        let event = ClientEvent::Cursor {
            collaboration_id: CollabId::new("42", "7"),
            line_number: 3,
            column: 5,
            problem_id: 9,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "cursor:update",
                "data": {
                    "collaborationId": {"roomId": "42", "studentId": "7"},
                    "lineNumber": 3,
                    "column": 5,
                    "problemId": 9
                }
            })
        );
        assert_eq!(event.name(), "cursor:update");
    }

    #[test]
    fn collab_id_survives_separator_characters() {
        let id = CollabId::new("room_with_underscores", "student_1");
        let text = serde_json::to_string(&ServerEvent::CollabStarted {
            collaboration_id: id.clone(),
        })
        .unwrap();
        let parsed: ServerEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(
            parsed,
            ServerEvent::CollabStarted {
                collaboration_id: id
            }
        );
    }

    #[test]
    fn code_request_problem_is_optional() {
        let parsed: ClientEvent = serde_json::from_value(json!({
            "event": "code:request",
            "data": {"collaborationId": {"roomId": "r", "studentId": "s"}}
        }))
        .unwrap();
        assert_eq!(
            parsed,
            ClientEvent::RequestCode {
                collaboration_id: CollabId::new("r", "s"),
                problem_id: None
            }
        );
    }

    #[test]
    fn unit_event_has_no_payload() {
        let value = serde_json::to_value(ServerEvent::AnnotationsCleared).unwrap();
        assert_eq!(value, json!({"event": "svgCleared"}));
    }

    #[test]
    fn empty_polyline_is_invalid() {
        assert!(!Polyline::new(vec![], "#f00").is_valid());
        assert!(Polyline::new(vec![Point::new(1.0, 2.0)], "#f00").is_valid());
    }
}
