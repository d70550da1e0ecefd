// Room registry: membership, collaboration routing and annotation state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pairlab_sync::protocol::{ClientEvent, CollabId, Polyline, Role, ServerEvent, StudentInfo};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Room-wide event published on the room's broadcast channel. Receivers skip
/// events they sent themselves.
#[derive(Debug, Clone)]
pub struct RoomBroadcast {
    pub from: Uuid,
    pub event: ServerEvent,
}

/// A live socket as seen by the registry.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: Uuid,
    pub tx: mpsc::Sender<ServerEvent>,
}

impl Connection {
    pub fn new(tx: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub room_id: String,
    pub invite_code: String,
    pub user_id: String,
    pub user_name: String,
    pub role: Role,
}

/// Handle a connection keeps after a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub conn_id: Uuid,
    pub room_id: String,
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub teacher_present: bool,
    pub students: Vec<StudentInfo>,
    pub collaboration: Option<CollabId>,
    pub annotation_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Peer {
    conn_id: Uuid,
    user_id: String,
    user_name: String,
    tx: mpsc::Sender<ServerEvent>,
}

impl Peer {
    fn deliver(&self, event: ServerEvent) {
        let name = event.name();
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(user_id = %self.user_id, event = name, "outbound queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(user_id = %self.user_id, event = name, "connection gone, dropping event");
            }
        }
    }

    fn info(&self) -> StudentInfo {
        StudentInfo {
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
        }
    }
}

struct Room {
    id: String,
    invite_code: String,
    teacher: Option<Peer>,
    students: Vec<Peer>,
    collaboration: Option<CollabId>,
    annotations: Vec<Polyline>,
    broadcast: broadcast::Sender<RoomBroadcast>,
    created_at: DateTime<Utc>,
}

impl Room {
    fn new(id: String, invite_code: String, capacity: usize) -> Self {
        let (broadcast, _) = broadcast::channel(capacity);
        Self {
            id,
            invite_code,
            teacher: None,
            students: Vec::new(),
            collaboration: None,
            annotations: Vec::new(),
            broadcast,
            created_at: Utc::now(),
        }
    }

    fn is_empty(&self) -> bool {
        self.teacher.is_none() && self.students.is_empty()
    }

    fn student(&self, user_id: &str) -> Option<&Peer> {
        self.students.iter().find(|s| s.user_id == user_id)
    }

    /// Whether `member` is still the live connection for its seat.
    fn is_current(&self, member: &Member) -> bool {
        match member.role {
            Role::Teacher => self
                .teacher
                .as_ref()
                .is_some_and(|t| t.conn_id == member.conn_id),
            Role::Student => self.students.iter().any(|s| s.conn_id == member.conn_id),
        }
    }

    fn roster(&self) -> ServerEvent {
        ServerEvent::Roster {
            room_id: self.id.clone(),
            students: self.students.iter().map(Peer::info).collect(),
        }
    }

    fn send_roster(&self) {
        if let Some(teacher) = &self.teacher {
            teacher.deliver(self.roster());
        }
    }

    /// Send `event` to both ends of collaboration `id`.
    fn send_to_pair(&self, id: &CollabId, event: ServerEvent) {
        if let Some(student) = self.student(&id.student_id) {
            student.deliver(event.clone());
        }
        if let Some(teacher) = &self.teacher {
            teacher.deliver(event);
        }
    }

    /// The other end of collaboration `id`, if `member` is one of its ends
    /// and `id` is the room's current collaboration.
    fn counterpart(&self, member: &Member, id: &CollabId) -> Option<&Peer> {
        if self.collaboration.as_ref() != Some(id) {
            return None;
        }
        match member.role {
            Role::Teacher => self.student(&id.student_id),
            Role::Student if member.user_id == id.student_id => self.teacher.as_ref(),
            Role::Student => None,
        }
    }

    fn relay(&self, member: &Member, id: &CollabId, event: ServerEvent) {
        match self.counterpart(member, id) {
            Some(peer) => peer.deliver(event),
            None => debug!(
                collab = %id,
                user_id = %member.user_id,
                event = event.name(),
                "dropping event outside the room's collaboration"
            ),
        }
    }

    fn reply_error(&self, member: &Member, message: &str) {
        let sender = match member.role {
            Role::Teacher => self.teacher.as_ref(),
            Role::Student => self.students.iter().find(|s| s.conn_id == member.conn_id),
        };
        if let Some(sender) = sender {
            sender.deliver(ServerEvent::Error {
                message: message.to_string(),
            });
        }
    }

    fn publish(&self, from: Uuid, event: ServerEvent) {
        // No receivers just means nobody else is in the room.
        let _ = self.broadcast.send(RoomBroadcast { from, event });
    }

    /// Cleanup owed when the teacher seat empties or changes hands.
    fn release_teacher(&mut self, conn_id: Uuid) {
        self.end_collaboration();
        self.annotations.clear();
        self.publish(conn_id, ServerEvent::AnnotationsCleared);
    }

    /// Cleanup owed when a student seat empties or changes hands.
    fn release_student(&mut self, user_id: &str) {
        if self
            .collaboration
            .as_ref()
            .is_some_and(|id| id.student_id == user_id)
        {
            self.end_collaboration();
        }
    }

    /// Tell the teacher its start for `student_id` went nowhere.
    fn reject_start(
        &self,
        member: &Member,
        room_id: String,
        student_id: String,
        message: &str,
    ) {
        self.reply_error(member, message);
        if let Some(teacher) = &self.teacher {
            teacher.deliver(ServerEvent::CollabEnded {
                collaboration_id: CollabId::new(room_id, student_id),
            });
        }
    }

    fn end_collaboration(&mut self) {
        if let Some(id) = self.collaboration.take() {
            info!(room = %self.id, collab = %id, "collaboration ended");
            self.send_to_pair(
                &id,
                ServerEvent::CollabEnded {
                    collaboration_id: id.clone(),
                },
            );
        }
    }
}

/// All rooms of this server, keyed by room id.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
    max_students: usize,
    channel_capacity: usize,
}

impl RoomRegistry {
    pub fn new(max_students: usize, channel_capacity: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            max_students,
            channel_capacity,
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn summary(&self, room_id: &str) -> Option<RoomSummary> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(room_id)?;
        Some(RoomSummary {
            room_id: room.id.clone(),
            teacher_present: room.teacher.is_some(),
            students: room.students.iter().map(Peer::info).collect(),
            collaboration: room.collaboration.clone(),
            annotation_count: room.annotations.len(),
            created_at: room.created_at,
        })
    }

    /// Seat `conn` in a room. The outcome is delivered on the connection's
    /// queue; on success the caller gets its member handle and a subscription
    /// to room-wide events.
    pub async fn join(
        &self,
        conn: &Connection,
        request: JoinRequest,
    ) -> Option<(Member, broadcast::Receiver<RoomBroadcast>)> {
        let mut rooms = self.rooms.write().await;
        let peer = Peer {
            conn_id: conn.id,
            user_id: request.user_id.clone(),
            user_name: request.user_name.clone(),
            tx: conn.tx.clone(),
        };
        let not_found = ServerEvent::RoomNotFound {
            room_id: request.room_id.clone(),
        };

        let room = match request.role {
            Role::Teacher => rooms.entry(request.room_id.clone()).or_insert_with(|| {
                info!(room = %request.room_id, "room created");
                Room::new(
                    request.room_id.clone(),
                    request.invite_code.clone(),
                    self.channel_capacity,
                )
            }),
            Role::Student => match rooms.get_mut(&request.room_id) {
                Some(room) => room,
                None => {
                    peer.deliver(not_found);
                    return None;
                }
            },
        };

        if room.invite_code != request.invite_code {
            debug!(room = %room.id, user_id = %request.user_id, "invite code rejected");
            peer.deliver(not_found);
            return None;
        }

        match request.role {
            Role::Teacher => {
                if let Some(current) = &room.teacher {
                    if current.user_id != request.user_id {
                        peer.deliver(ServerEvent::RoomFull {
                            room_id: room.id.clone(),
                        });
                        return None;
                    }
                    debug!(room = %room.id, user_id = %request.user_id, "teacher reconnected");
                    let stale = current.conn_id;
                    room.release_teacher(stale);
                }
                room.teacher = Some(peer);
            }
            Role::Student => {
                if let Some(pos) = room
                    .students
                    .iter()
                    .position(|s| s.user_id == request.user_id)
                {
                    debug!(room = %room.id, user_id = %request.user_id, "student reconnected");
                    room.release_student(&request.user_id);
                    room.students[pos] = peer;
                } else if room.students.len() >= self.max_students {
                    peer.deliver(ServerEvent::RoomFull {
                        room_id: room.id.clone(),
                    });
                    return None;
                } else {
                    room.students.push(peer);
                }
            }
        }

        info!(room = %room.id, user_id = %request.user_id, role = request.role.as_str(), "joined room");
        conn.tx
            .try_send(ServerEvent::RoomJoined {
                room_id: room.id.clone(),
                user_id: request.user_id.clone(),
                role: request.role,
            })
            .ok();
        if request.role == Role::Student && !room.annotations.is_empty() {
            conn.tx
                .try_send(ServerEvent::Annotations {
                    lines: room.annotations.clone(),
                })
                .ok();
        }
        room.send_roster();

        let member = Member {
            conn_id: conn.id,
            room_id: room.id.clone(),
            user_id: request.user_id,
            role: request.role,
        };
        Some((member, room.broadcast.subscribe()))
    }

    /// Route one event from a seated member.
    pub async fn dispatch(&self, member: &Member, event: ClientEvent) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&member.room_id) else {
            return;
        };
        if !room.is_current(member) {
            debug!(user_id = %member.user_id, "event from a replaced connection");
            return;
        }
        match event {
            ClientEvent::JoinRoom { .. } => room.reply_error(member, "already joined a room"),
            ClientEvent::StartCollab {
                room_id,
                invite_code,
                student_id,
            } => {
                if member.role != Role::Teacher {
                    room.reply_error(member, "only the teacher can start a collaboration");
                    return;
                }
                if room_id != room.id || invite_code != room.invite_code {
                    room.reject_start(
                        member,
                        room_id,
                        student_id,
                        "room or invite code does not match",
                    );
                    return;
                }
                if room.student(&student_id).is_none() {
                    room.reject_start(member, room_id, student_id, "student is not in the room");
                    return;
                }
                let id = CollabId::new(room.id.clone(), student_id);
                if room.collaboration.as_ref() != Some(&id) {
                    room.end_collaboration();
                }
                info!(room = %room.id, collab = %id, "collaboration started");
                room.collaboration = Some(id.clone());
                room.send_to_pair(
                    &id,
                    ServerEvent::CollabStarted {
                        collaboration_id: id.clone(),
                    },
                );
            }
            ClientEvent::RequestCode {
                collaboration_id,
                problem_id,
            } => {
                if member.role != Role::Teacher {
                    return;
                }
                let event = ServerEvent::CodeRequested {
                    collaboration_id: collaboration_id.clone(),
                    problem_id,
                };
                room.relay(member, &collaboration_id, event);
            }
            ClientEvent::SendCode {
                collaboration_id,
                problem_id,
                code,
            } => {
                let event = ServerEvent::CodeUpdate {
                    collaboration_id: collaboration_id.clone(),
                    problem_id,
                    code,
                };
                room.relay(member, &collaboration_id, event);
            }
            ClientEvent::Edit {
                collaboration_id,
                problem_id,
                code,
            } => {
                let event = ServerEvent::Edit {
                    collaboration_id: collaboration_id.clone(),
                    problem_id,
                    code,
                };
                room.relay(member, &collaboration_id, event);
            }
            ClientEvent::Cursor {
                collaboration_id,
                line_number,
                column,
                problem_id,
            } => {
                let event = ServerEvent::Cursor {
                    collaboration_id: collaboration_id.clone(),
                    line_number,
                    column,
                    problem_id,
                };
                room.relay(member, &collaboration_id, event);
            }
            ClientEvent::EndCollab { collaboration_id } => {
                if room.counterpart(member, &collaboration_id).is_some() {
                    room.end_collaboration();
                }
            }
            ClientEvent::UpdateAnnotations { room_id, lines } => {
                if member.role != Role::Teacher || room_id != room.id {
                    return;
                }
                room.annotations = lines.into_iter().filter(Polyline::is_valid).collect();
                room.publish(
                    member.conn_id,
                    ServerEvent::Annotations {
                        lines: room.annotations.clone(),
                    },
                );
            }
            ClientEvent::ClearAnnotations { room_id } => {
                if member.role != Role::Teacher || room_id != room.id {
                    return;
                }
                room.annotations.clear();
                room.publish(member.conn_id, ServerEvent::AnnotationsCleared);
            }
        }
    }

    /// Remove a member whose socket closed.
    pub async fn leave(&self, member: &Member) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&member.room_id) else {
            return;
        };
        if !room.is_current(member) {
            return;
        }

        match member.role {
            Role::Teacher => {
                room.teacher = None;
                room.release_teacher(member.conn_id);
            }
            Role::Student => {
                room.students.retain(|s| s.conn_id != member.conn_id);
                room.release_student(&member.user_id);
                room.send_roster();
            }
        }
        info!(room = %room.id, user_id = %member.user_id, "left room");

        if room.is_empty() {
            info!(room = %member.room_id, "room closed");
            rooms.remove(&member.room_id);
        }
    }
}
