//! Business logic services.

pub mod calendar;
pub mod cart;
pub mod checkout;
pub mod notifications;
pub mod payments;

pub use calendar::CalendarSyncService;
pub use cart::CartService;
pub use checkout::CheckoutService;
pub use notifications::NotificationService;
pub use payments::{PaymentGateway, SquarePaymentsClient};
