use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-business OAuth connection to an external calendar. Absent or
/// disconnected rows mean bookings proceed without calendar sync.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "calendar_integrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub business_id: Uuid,
    pub provider: String,
    pub calendar_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub timezone: String,
    pub connected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Whether the stored access token needs a refresh before use.
    /// `slack` guards against the token expiring mid-request.
    pub fn token_expired(&self, now: DateTime<Utc>, slack: chrono::Duration) -> bool {
        self.token_expires_at <= now + slack
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::business_profile::Entity",
        from = "Column::BusinessId",
        to = "super::business_profile::Column::Id"
    )]
    Business,
}

impl Related<super::business_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Business.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
