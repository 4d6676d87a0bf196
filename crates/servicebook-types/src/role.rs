//! Actors and roles

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::{DomainError, DomainResult};

/// Role supplied by the authentication collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Provider,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Provider => "provider",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "client" => Ok(Self::Client),
            "provider" => Ok(Self::Provider),
            "admin" => Ok(Self::Admin),
            other => Err(DomainError::unknown("role", other)),
        }
    }
}

/// Authenticated identity performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require a specific role
    pub fn require(&self, role: Role) -> DomainResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(DomainError::forbidden(format!("{} role required", role)))
        }
    }
}

/// Which side of a booking an actor is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Client,
    Provider,
}

/// User ids of both sides of a booking, after identity resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participants {
    pub client: Uuid,
    pub provider: Uuid,
}

impl Participants {
    /// The side the actor is on, if any. Role and id must both match.
    pub fn party_of(&self, actor: &Actor) -> Option<Party> {
        match actor.role {
            Role::Client if actor.user_id == self.client => Some(Party::Client),
            Role::Provider if actor.user_id == self.provider => Some(Party::Provider),
            _ => None,
        }
    }

    /// Require the actor to be the booking's client
    pub fn require_client(&self, actor: &Actor) -> DomainResult<()> {
        match self.party_of(actor) {
            Some(Party::Client) => Ok(()),
            _ => Err(DomainError::forbidden("only the booking's client may do this")),
        }
    }

    /// Require the actor to be the booking's provider
    pub fn require_provider(&self, actor: &Actor) -> DomainResult<()> {
        match self.party_of(actor) {
            Some(Party::Provider) => Ok(()),
            _ => Err(DomainError::forbidden("only the booking's provider may do this")),
        }
    }

    /// Require a participant, or an admin when `allow_admin` is set
    pub fn require_participant(&self, actor: &Actor, allow_admin: bool) -> DomainResult<Option<Party>> {
        if let Some(party) = self.party_of(actor) {
            return Ok(Some(party));
        }
        if allow_admin && actor.is_admin() {
            return Ok(None);
        }
        Err(DomainError::forbidden("not a participant of this booking"))
    }

    /// The user on the other side of the booking
    pub fn counterpart(&self, party: Party) -> Uuid {
        match party {
            Party::Client => self.provider,
            Party::Provider => self.client,
        }
    }
}
