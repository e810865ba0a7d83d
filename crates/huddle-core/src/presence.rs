//! Presence protocol for Huddle.
//!
//! A session announces itself exactly twice: a join frame with the full
//! avatar placement once the bus accepts the connection, and a leave frame
//! with only the identity fields during teardown.

use bytes::Bytes;
use huddle_protocol::{destinations, payload, JoinPayload, LeavePayload, ProtocolError};
use serde::{Deserialize, Serialize};

use crate::profile::ADMIN_CHARACTER_ID;

/// Nickname used by the administrative client.
pub const ADMIN_NICKNAME: &str = "관리자";

/// The fixed identity stamped on every outbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub nickname: String,
    pub character_id: i64,
}

impl Identity {
    #[must_use]
    pub fn new(nickname: impl Into<String>, character_id: i64) -> Self {
        Self {
            nickname: nickname.into(),
            character_id,
        }
    }

    /// The administrative identity.
    #[must_use]
    pub fn admin() -> Self {
        Self::new(ADMIN_NICKNAME, ADMIN_CHARACTER_ID)
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::admin()
    }
}

/// Where the client's avatar appears in the shared space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: [f64; 3],
    pub rotation: f64,
    pub animation: String,
    pub model_path: String,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: [8.0, 0.0, -15.0],
            rotation: 335.0,
            animation: "Stop".to_string(),
            model_path: "/models/character99.glb".to_string(),
        }
    }
}

/// Join or leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceKind {
    Join,
    Leave,
}

/// A presence announcement.
///
/// Placement fields are only populated on join.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceFrame {
    pub kind: PresenceKind,
    pub sender: String,
    pub character_id: i64,
    pub position: Option<[f64; 3]>,
    pub rotation_degrees: Option<f64>,
    pub animation_state: Option<String>,
    pub model_ref: Option<String>,
    pub timestamp_millis: i64,
}

impl PresenceFrame {
    /// Destination this frame is published to.
    #[must_use]
    pub fn destination(&self) -> &'static str {
        match self.kind {
            PresenceKind::Join => destinations::JOIN,
            PresenceKind::Leave => destinations::LEAVE,
        }
    }

    /// Encode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_body(&self) -> Result<Bytes, ProtocolError> {
        match self.kind {
            PresenceKind::Join => {
                let defaults = Placement::default();
                payload::to_body(&JoinPayload {
                    nickname: self.sender.clone(),
                    character_id: self.character_id,
                    position: self.position.unwrap_or(defaults.position),
                    rotation: self.rotation_degrees.unwrap_or(defaults.rotation),
                    current_animation: self
                        .animation_state
                        .clone()
                        .unwrap_or(defaults.animation),
                    model_path: self.model_ref.clone().unwrap_or(defaults.model_path),
                    timestamp: self.timestamp_millis,
                })
            }
            PresenceKind::Leave => payload::to_body(&LeavePayload {
                nickname: self.sender.clone(),
                character_id: self.character_id,
                timestamp: self.timestamp_millis,
            }),
        }
    }
}

/// Builds the presence frames for one identity.
#[derive(Debug, Clone, Default)]
pub struct Presence {
    identity: Identity,
    placement: Placement,
}

impl Presence {
    #[must_use]
    pub fn new(identity: Identity, placement: Placement) -> Self {
        Self {
            identity,
            placement,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The join announcement, stamped with `now`.
    #[must_use]
    pub fn join_frame(&self, now: i64) -> PresenceFrame {
        PresenceFrame {
            kind: PresenceKind::Join,
            sender: self.identity.nickname.clone(),
            character_id: self.identity.character_id,
            position: Some(self.placement.position),
            rotation_degrees: Some(self.placement.rotation),
            animation_state: Some(self.placement.animation.clone()),
            model_ref: Some(self.placement.model_path.clone()),
            timestamp_millis: now,
        }
    }

    /// The leave announcement, stamped with `now`.
    #[must_use]
    pub fn leave_frame(&self, now: i64) -> PresenceFrame {
        PresenceFrame {
            kind: PresenceKind::Leave,
            sender: self.identity.nickname.clone(),
            character_id: self.identity.character_id,
            position: None,
            rotation_degrees: None,
            animation_state: None,
            model_ref: None,
            timestamp_millis: now,
        }
    }
}
