use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shopping cart entity. One cart per (business, session token) while active.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub session_token: String,
    pub business_id: Uuid,
    pub status: CartStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Carts accept mutations (and checkout) only while active and unexpired.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == CartStatus::Active && self.expires_at > now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::cart_booking::Entity")]
    CartBookings,
    #[sea_orm(has_many = "super::checkout_session::Entity")]
    CheckoutSessions,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::cart_booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartBookings.def()
    }
}

impl Related<super::checkout_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CheckoutSessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Cart status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "checked_out")]
    CheckedOut,
    #[sea_orm(string_value = "abandoned")]
    Abandoned,
}
