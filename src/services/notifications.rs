//! Confirmation email dispatch.
//!
//! Rendering is pure and happens on the request path; delivery happens on
//! the side-effect queue, one job per message, so no email failure can block
//! or fail a checkout and a retry never resends a delivered message.

use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::entities::{BookingModel, BusinessProfileModel, ShopOrderModel};
use crate::errors::ServiceError;

/// One rendered, addressed email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    from: &'a str,
    trace_id: &'a str,
}

/// Client for the email dispatch API.
#[derive(Clone)]
pub struct NotificationService {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    from: String,
}

impl NotificationService {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        from: String,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            from,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.email_api_base_url.clone(),
            cfg.email_api_key.clone(),
            cfg.email_from.clone(),
            Duration::from_secs(cfg.email_timeout_secs),
        )
    }

    /// Deliver one message. An unset base URL means email is not configured
    /// for this deployment; that is a skip, not a failure.
    #[instrument(skip(self, message), fields(to = %message.to))]
    pub async fn send(&self, message: &EmailMessage, trace_id: &str) -> Result<(), ServiceError> {
        if self.base_url.is_empty() {
            info!("email dispatch not configured; skipping \"{}\"", message.subject);
            return Ok(());
        }

        let body = SendEmailBody {
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            from: &self.from,
            trace_id,
        };

        let mut request = self.http.post(format!("{}/send", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("email dispatch: {e}")))?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "email dispatch returned {}",
                response.status()
            )));
        }

        info!("email accepted for delivery");
        Ok(())
    }
}

fn dollars(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, (cents % 100).abs())
}

/// Render every message this checkout should produce: customer confirmations
/// for whichever records materialized, plus admin alerts when the business
/// has a notification address configured.
pub fn checkout_messages(
    business: &BusinessProfileModel,
    order: Option<&ShopOrderModel>,
    booking: Option<&BookingModel>,
) -> Vec<EmailMessage> {
    let mut messages = Vec::new();

    if let Some(order) = order {
        messages.push(EmailMessage {
            to: order.customer_email.clone(),
            subject: format!("Order {} confirmed — {}", order.order_number, business.name),
            html: format!(
                "<p>Hi {},</p><p>Thanks for your order at {}!</p>\
                 <p>Order <strong>{}</strong> for <strong>{}</strong> is confirmed.</p>",
                order.customer_name,
                business.name,
                order.order_number,
                dollars(order.total_cents),
            ),
        });
    }

    if let Some(booking) = booking {
        messages.push(EmailMessage {
            to: booking.customer_email.clone(),
            subject: format!("Booking confirmed — {} at {}", booking.service_name, business.name),
            html: format!(
                "<p>Hi {},</p><p>Your {} appointment at {} is confirmed for {} ({}).</p>\
                 <p>Amount paid: <strong>{}</strong>.</p>",
                booking.customer_name,
                booking.service_name,
                business.name,
                booking.booking_date.format("%Y-%m-%d %H:%M UTC"),
                booking.timezone,
                dollars(booking.payment_amount_cents),
            ),
        });
    }

    if let Some(admin) = &business.notification_email {
        if let Some(order) = order {
            messages.push(EmailMessage {
                to: admin.clone(),
                subject: format!("New order {} — {}", order.order_number, dollars(order.total_cents)),
                html: format!(
                    "<p>New shop order from {} ({}).</p><p>Total: {}.</p>",
                    order.customer_name,
                    order.customer_email,
                    dollars(order.total_cents),
                ),
            });
        }
        if let Some(booking) = booking {
            messages.push(EmailMessage {
                to: admin.clone(),
                subject: format!("New booking — {}", booking.service_name),
                html: format!(
                    "<p>{} booked {} for {}.</p><p>Contact: {}{}.</p>",
                    booking.customer_name,
                    booking.service_name,
                    booking.booking_date.format("%Y-%m-%d %H:%M UTC"),
                    booking.customer_email,
                    booking
                        .customer_phone
                        .as_deref()
                        .map(|p| format!(" / {}", p))
                        .unwrap_or_default(),
                ),
            });
        }
    }

    messages
}
