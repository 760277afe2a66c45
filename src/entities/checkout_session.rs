use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One charge attempt against a cart; the unit of payment idempotency.
///
/// Created in `processing` and transitioned exactly once to a terminal state.
/// A partial unique index on `(cart_id) WHERE status = 'paid'` guarantees at
/// most one paid session per cart at the datastore layer.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkout_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cart_id: Uuid,
    pub idempotency_key: String,
    pub amount_subtotal_cents: i64,
    pub amount_tax_cents: i64,
    pub amount_total_cents: i64,
    pub currency: String,
    pub status: CheckoutStatus,
    #[sea_orm(nullable)]
    pub square_payment_id: Option<String>,
    #[sea_orm(nullable)]
    pub paid_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cart::Entity",
        from = "Column::CartId",
        to = "super::cart::Column::Id"
    )]
    Cart,
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    /// Session created, gateway not yet called (or call in flight).
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Gateway reported the capture complete.
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Gateway accepted the payment but settles asynchronously.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Gateway declined or errored; nothing was materialized.
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl CheckoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStatus::Processing => "processing",
            CheckoutStatus::Paid => "paid",
            CheckoutStatus::Pending => "pending",
            CheckoutStatus::Failed => "failed",
        }
    }
}
