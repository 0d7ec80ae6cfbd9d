use crate::{Result, ScoreboardError};
use serde::{Deserialize, Serialize};

// Event discriminators written by the game clients
pub struct EventTypes;

impl EventTypes {
    pub const USER_MOVE: &'static str = "UserMoveEvent";
    pub const USER_JOIN: &'static str = "UserJoinEvent";
    pub const USER_DEAD: &'static str = "UserDeadEvent";
    pub const USER_REVIVE: &'static str = "UserReviveEvent";
    pub const SET_BOMB: &'static str = "SetBombEvent";
    pub const MOVE_BOMB: &'static str = "BombMoveEvent";
    pub const EXPLODE: &'static str = "ExplodeEvent";
    pub const UNDO_EXPLODE: &'static str = "UndoExplodeEvent";
    pub const UPDATE_MAP: &'static str = "UpdateMapEvent";
}

/// Message published on a room's event topic.
///
/// Only `type` is required on the wire. For `UserDeadEvent`, `name` is the
/// eliminated player and `comment` carries the eliminating player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub alive: bool,
    #[serde(default)]
    pub list: Vec<i32>,
}

impl EventMessage {
    pub fn user_dead(victim: &str, killer: &str) -> Self {
        Self {
            event_type: EventTypes::USER_DEAD.to_string(),
            name: Some(victim.to_string()),
            comment: Some(killer.to_string()),
            ..Default::default()
        }
    }

    pub fn is_elimination(&self) -> bool {
        self.event_type == EventTypes::USER_DEAD
    }
}

/// The two players referenced by an elimination event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elimination {
    pub victim: String,
    pub killer: String,
}

impl Elimination {
    pub fn is_self_elimination(&self) -> bool {
        self.victim == self.killer
    }
}

impl TryFrom<&EventMessage> for Elimination {
    type Error = ScoreboardError;

    fn try_from(event: &EventMessage) -> Result<Self> {
        let victim = event.name.clone().ok_or(ScoreboardError::MissingField("name"))?;
        let killer = event.comment.clone().ok_or(ScoreboardError::MissingField("comment"))?;
        Ok(Self { victim, killer })
    }
}
