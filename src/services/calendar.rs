//! Best-effort bridge between confirmed bookings and the business's
//! external calendar.
//!
//! Runs only on the side-effect queue. A business without a connected
//! integration gets `skipped`; an API or refresh failure bubbles an error so
//! the worker can retry, and the worker marks the booking `failed` after the
//! final attempt. Nothing here can affect a checkout response.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use oauth2::reqwest::async_http_client;
use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{
    booking, calendar_integration, Booking, CalendarIntegration, CalendarSyncStatus,
};
use crate::errors::ServiceError;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Refresh the access token this close to its recorded expiry.
const TOKEN_EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced { event_id: String },
    Skipped,
}

#[derive(Clone)]
pub struct CalendarSyncService {
    db: Arc<DatabaseConnection>,
    http: reqwest::Client,
    config: Arc<AppConfig>,
}

impl CalendarSyncService {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.calendar_timeout_secs))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { db, http, config }
    }

    /// Create a calendar event for a materialized booking.
    #[instrument(skip(self))]
    pub async fn sync_booking(&self, booking_id: Uuid) -> Result<SyncOutcome, ServiceError> {
        let booking = Booking::find_by_id(booking_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

        // A retried job may find the work already done.
        if booking.calendar_sync_status == CalendarSyncStatus::Synced {
            let event_id = booking.calendar_event_id.unwrap_or_default();
            return Ok(SyncOutcome::Synced { event_id });
        }

        let integration = CalendarIntegration::find()
            .filter(calendar_integration::Column::BusinessId.eq(booking.business_id))
            .one(&*self.db)
            .await?;

        let integration = match integration {
            Some(integration) if integration.connected => integration,
            _ => {
                info!(%booking_id, "no connected calendar integration; skipping sync");
                self.set_sync_status(booking_id, CalendarSyncStatus::Skipped, None)
                    .await?;
                return Ok(SyncOutcome::Skipped);
            }
        };

        let access_token = self.ensure_fresh_token(&integration).await?;
        let event = build_event(&booking, &integration);

        let response = self
            .http
            .post(format!(
                "{}/calendars/{}/events",
                self.config.calendar_api_base_url.trim_end_matches('/'),
                integration.calendar_id
            ))
            .bearer_auth(&access_token)
            .json(&event)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("calendar API: {e}")))?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "calendar API returned {}",
                response.status()
            )));
        }

        let created: CreatedEvent = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("calendar API: {e}")))?;

        self.set_sync_status(
            booking_id,
            CalendarSyncStatus::Synced,
            Some(created.id.clone()),
        )
        .await?;

        info!(%booking_id, event_id = %created.id, "booking synced to calendar");
        Ok(SyncOutcome::Synced {
            event_id: created.id,
        })
    }

    /// Terminal bookkeeping once the worker has given up on a booking.
    pub async fn mark_sync_failed(&self, booking_id: Uuid) -> Result<(), ServiceError> {
        self.set_sync_status(booking_id, CalendarSyncStatus::Failed, None)
            .await
    }

    async fn set_sync_status(
        &self,
        booking_id: Uuid,
        status: CalendarSyncStatus,
        event_id: Option<String>,
    ) -> Result<(), ServiceError> {
        let mut update = booking::ActiveModel {
            id: Set(booking_id),
            calendar_sync_status: Set(status),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(event_id) = event_id {
            update.calendar_event_id = Set(Some(event_id));
        }
        update.update(&*self.db).await?;
        Ok(())
    }

    /// Return a usable access token, refreshing and persisting it first when
    /// the stored one is at or near expiry.
    async fn ensure_fresh_token(
        &self,
        integration: &calendar_integration::Model,
    ) -> Result<String, ServiceError> {
        if !integration.token_expired(Utc::now(), ChronoDuration::seconds(TOKEN_EXPIRY_SLACK_SECS))
        {
            return Ok(integration.access_token.clone());
        }

        let client_id = self.config.google_client_id.clone().ok_or_else(|| {
            ServiceError::ConfigurationError("google oauth client is not configured".to_string())
        })?;
        let client_secret = self.config.google_client_secret.clone().ok_or_else(|| {
            ServiceError::ConfigurationError("google oauth secret is not configured".to_string())
        })?;

        let oauth = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            AuthUrl::new(GOOGLE_AUTH_URL.to_string())
                .map_err(|e| ServiceError::ConfigurationError(e.to_string()))?,
            Some(
                TokenUrl::new(self.config.google_token_url.clone())
                    .map_err(|e| ServiceError::ConfigurationError(e.to_string()))?,
            ),
        );

        let token = oauth
            .exchange_refresh_token(&RefreshToken::new(integration.refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("token refresh failed: {e}")))?;

        let access_token = token.access_token().secret().clone();
        let expires_in = token
            .expires_in()
            .unwrap_or(Duration::from_secs(3600));
        let expires_at = Utc::now()
            + ChronoDuration::from_std(expires_in).unwrap_or(ChronoDuration::seconds(3600));

        calendar_integration::ActiveModel {
            id: Set(integration.id),
            access_token: Set(access_token.clone()),
            token_expires_at: Set(expires_at),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&*self.db)
        .await?;

        info!(business_id = %integration.business_id, "refreshed calendar access token");
        Ok(access_token)
    }
}

#[derive(Debug, Serialize)]
struct CalendarEventBody {
    summary: String,
    description: String,
    start: EventTime,
    end: EventTime,
    attendees: Vec<EventAttendee>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: String,
    time_zone: String,
}

#[derive(Debug, Serialize)]
struct EventAttendee {
    email: String,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

fn build_event(
    booking: &booking::Model,
    integration: &calendar_integration::Model,
) -> CalendarEventBody {
    let end_time = booking.booking_date + ChronoDuration::minutes(booking.duration_minutes as i64);

    let mut description = format!(
        "Service: {}\nCustomer: {}",
        booking.service_name, booking.customer_name
    );
    if let Some(phone) = &booking.customer_phone {
        description.push_str(&format!("\nPhone: {}", phone));
    }
    if let Some(notes) = &booking.notes {
        description.push_str(&format!("\nNotes: {}", notes));
    }

    CalendarEventBody {
        summary: format!("{} — {}", booking.service_name, booking.customer_name),
        description,
        start: EventTime {
            date_time: booking.booking_date.to_rfc3339(),
            time_zone: integration.timezone.clone(),
        },
        end: EventTime {
            date_time: end_time.to_rfc3339(),
            time_zone: integration.timezone.clone(),
        },
        attendees: vec![EventAttendee {
            email: booking.customer_email.clone(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::booking::BookingStatus;
    use chrono::TimeZone;

    fn sample_booking() -> booking::Model {
        booking::Model {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            checkout_session_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            service_name: "Massage".into(),
            customer_name: "Grace".into(),
            customer_email: "grace@example.com".into(),
            customer_phone: Some("+1 555 0100".into()),
            notes: Some("first visit".into()),
            booking_date: Utc.with_ymd_and_hms(2025, 6, 10, 17, 0, 0).unwrap(),
            duration_minutes: 90,
            timezone: "America/New_York".into(),
            status: BookingStatus::Confirmed,
            payment_amount_cents: 9000,
            payment_status: "paid".into(),
            payment_id: "sq_pay_9".into(),
            calendar_event_id: None,
            calendar_sync_status: CalendarSyncStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_integration() -> calendar_integration::Model {
        calendar_integration::Model {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            provider: "google".into(),
            calendar_id: "primary".into(),
            access_token: "tok".into(),
            refresh_token: "refresh".into(),
            token_expires_at: Utc::now() + ChronoDuration::hours(1),
            timezone: "America/New_York".into(),
            connected: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn event_spans_booking_duration_in_integration_timezone() {
        let event = build_event(&sample_booking(), &sample_integration());
        assert_eq!(event.start.time_zone, "America/New_York");
        assert_eq!(event.end.time_zone, "America/New_York");
        assert!(event.start.date_time.starts_with("2025-06-10T17:00:00"));
        assert!(event.end.date_time.starts_with("2025-06-10T18:30:00"));
    }

    #[test]
    fn event_invites_customer_and_describes_booking() {
        let event = build_event(&sample_booking(), &sample_integration());
        assert_eq!(event.attendees.len(), 1);
        assert_eq!(event.attendees[0].email, "grace@example.com");
        assert!(event.description.contains("Service: Massage"));
        assert!(event.description.contains("Phone: +1 555 0100"));
        assert!(event.description.contains("Notes: first visit"));
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["start"]["dateTime"].is_string());
        assert!(json["start"]["timeZone"].is_string());
    }

    #[test]
    fn token_expiry_uses_slack_window() {
        let mut integration = sample_integration();
        integration.token_expires_at = Utc::now() + ChronoDuration::seconds(30);
        assert!(integration.token_expired(Utc::now(), ChronoDuration::seconds(60)));
        integration.token_expires_at = Utc::now() + ChronoDuration::seconds(300);
        assert!(!integration.token_expired(Utc::now(), ChronoDuration::seconds(60)));
    }
}
