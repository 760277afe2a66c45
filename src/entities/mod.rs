//! SeaORM entities for the checkout domain.

pub mod booking;
pub mod business_profile;
pub mod business_service;
pub mod calendar_integration;
pub mod cart;
pub mod cart_booking;
pub mod cart_item;
pub mod checkout_session;
pub mod product;
pub mod shop_order;
pub mod shop_order_item;

// Re-export entities
pub use booking::{CalendarSyncStatus, Entity as Booking, Model as BookingModel};
pub use business_profile::{Entity as BusinessProfile, Model as BusinessProfileModel};
pub use business_service::{Entity as BusinessService, Model as BusinessServiceModel};
pub use calendar_integration::{Entity as CalendarIntegration, Model as CalendarIntegrationModel};
pub use cart::{CartStatus, Entity as Cart, Model as CartModel};
pub use cart_booking::{Entity as CartBooking, Model as CartBookingModel};
pub use cart_item::{CartItemType, Entity as CartItem, Model as CartItemModel};
pub use checkout_session::{CheckoutStatus, Entity as CheckoutSession, Model as CheckoutSessionModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use shop_order::{Entity as ShopOrder, Model as ShopOrderModel};
pub use shop_order_item::{Entity as ShopOrderItem, Model as ShopOrderItemModel};
