use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Materialized commerce record for the product portion of a paid checkout.
/// Amounts exclude the booked service, which is tracked on the booking row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shop_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub business_id: Uuid,
    pub checkout_session_id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    #[sea_orm(nullable)]
    pub customer_phone: Option<String>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub currency: String,
    pub square_payment_id: String,
    pub idempotency_key: String,
    #[sea_orm(nullable)]
    pub paid_at: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shop_order_item::Entity")]
    Items,
    #[sea_orm(
        belongs_to = "super::checkout_session::Entity",
        from = "Column::CheckoutSessionId",
        to = "super::checkout_session::Column::Id"
    )]
    CheckoutSession,
}

impl Related<super::shop_order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::checkout_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CheckoutSession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
