use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Materialized appointment record. Created by the checkout orchestrator;
/// afterwards only the calendar sync worker touches the `calendar_*` fields,
/// and business-admin actions (confirm/cancel/complete) own `status`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub business_id: Uuid,
    pub checkout_session_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub customer_name: String,
    pub customer_email: String,
    #[sea_orm(nullable)]
    pub customer_phone: Option<String>,
    #[sea_orm(nullable)]
    pub notes: Option<String>,
    pub booking_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub timezone: String,
    /// Appointment status, independent of payment status.
    pub status: BookingStatus,
    pub payment_amount_cents: i64,
    pub payment_status: String,
    pub payment_id: String,
    #[sea_orm(nullable)]
    pub calendar_event_id: Option<String>,
    pub calendar_sync_status: CalendarSyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::checkout_session::Entity",
        from = "Column::CheckoutSessionId",
        to = "super::checkout_session::Column::Id"
    )]
    CheckoutSession,
}

impl Related<super::checkout_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CheckoutSession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "completed")]
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum CalendarSyncStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "synced")]
    Synced,
    #[sea_orm(string_value = "skipped")]
    Skipped,
    #[sea_orm(string_value = "failed")]
    Failed,
}
