//! Schema resolver
//!
//! Booking rows store a client and a provider reference. Depending on the
//! deployment those are user ids (`direct`) or ids in the `clients` /
//! `providers` tables (`indirect`). The mode is decided once at startup and
//! never re-queried per request.

use serde::{Deserialize, Serialize};
use servicebook_db::{Database, DbBooking, IdentityRepo, SchemaMetaRepo};
use servicebook_types::{Participants, Party};
use sqlx::PgConnection;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// How booking identity columns map to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMapping {
    /// Columns hold user ids
    #[default]
    Direct,
    /// Columns hold `clients.id` / `providers.id`
    Indirect,
}

impl IdentityMapping {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Indirect => "indirect",
        }
    }
}

impl FromStr for IdentityMapping {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim() {
            "direct" => Ok(Self::Direct),
            "indirect" => Ok(Self::Indirect),
            other => Err(CoreError::Config(format!("unknown identity mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver {
    mapping: IdentityMapping,
}

impl SchemaResolver {
    pub fn new(mapping: IdentityMapping) -> Self {
        Self { mapping }
    }

    /// Resolve the mode: explicit override, else `schema_meta`, else direct
    pub async fn detect(db: &Database, override_mode: Option<IdentityMapping>) -> CoreResult<Self> {
        if let Some(mapping) = override_mode {
            info!(mode = mapping.as_str(), "Identity mode set by configuration");
            return Ok(Self::new(mapping));
        }

        let mut conn = db.pg.acquire().await?;
        let mapping = match SchemaMetaRepo::identity_mode(&mut conn).await? {
            Some(value) => value.parse()?,
            None => IdentityMapping::default(),
        };
        info!(mode = mapping.as_str(), "Identity mode resolved from schema metadata");
        Ok(Self::new(mapping))
    }

    pub fn mapping(&self) -> IdentityMapping {
        self.mapping
    }

    /// User id behind a stored client/provider reference
    pub async fn resolve_user_id(
        &self,
        conn: &mut PgConnection,
        party: Party,
        raw_id: Uuid,
    ) -> CoreResult<Uuid> {
        if self.mapping == IdentityMapping::Direct {
            return Ok(raw_id);
        }
        let user_id = match party {
            Party::Client => IdentityRepo::client_user_id(conn, raw_id).await?,
            Party::Provider => IdentityRepo::provider_user_id(conn, raw_id).await?,
        };
        user_id.ok_or_else(|| CoreError::not_found(party_label(party), raw_id))
    }

    /// Stored reference for a user acting as client or provider
    pub async fn resolve_raw_id(
        &self,
        conn: &mut PgConnection,
        party: Party,
        user_id: Uuid,
    ) -> CoreResult<Uuid> {
        if self.mapping == IdentityMapping::Direct {
            return Ok(user_id);
        }
        let raw_id = match party {
            Party::Client => IdentityRepo::client_id_for_user(conn, user_id).await?,
            Party::Provider => IdentityRepo::provider_id_for_user(conn, user_id).await?,
        };
        raw_id.ok_or_else(|| CoreError::not_found(party_label(party), format!("for user {}", user_id)))
    }

    /// Both sides of a booking as user ids
    pub async fn participants(
        &self,
        conn: &mut PgConnection,
        booking: &DbBooking,
    ) -> CoreResult<Participants> {
        let client = self
            .resolve_user_id(&mut *conn, Party::Client, booking.client_id)
            .await?;
        let provider = self
            .resolve_user_id(conn, Party::Provider, booking.provider_id)
            .await?;
        Ok(Participants { client, provider })
    }
}

fn party_label(party: Party) -> &'static str {
    match party {
        Party::Client => "client profile",
        Party::Provider => "provider profile",
    }
}
