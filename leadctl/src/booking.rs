//! Public appointment booking.
//!
//! Booking finds or creates the guest, reserves the slot and records the
//! appointment in one transaction. The meeting and the confirmation email come
//! afterwards; their failures are logged and leave the booking in place.

use sqlx::PgPool;
use tracing::{info, instrument, warn};

use crate::{
    api::models::{normalize_email, scheduling::AppointmentBooking},
    db::{
        handlers::{Appointments, Guests, Repository, TimeSlots},
        models::{
            guests::GuestCreateDBRequest,
            scheduling::{AppointmentCreateDBRequest, AppointmentDBResponse, AppointmentUpdateDBRequest, TimeSlotDBResponse},
        },
    },
    email::{AppointmentNotice, EmailService},
    errors::{Error, Result},
    meetings::MeetingClient,
    types::abbrev_uuid,
};

pub struct Booking<'a> {
    db: &'a PgPool,
    meetings: &'a MeetingClient,
    email: &'a EmailService,
    default_duration_minutes: i64,
}

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} is required"),
        });
    }
    Ok(value.to_string())
}

impl<'a> Booking<'a> {
    pub fn new(db: &'a PgPool, meetings: &'a MeetingClient, email: &'a EmailService, default_duration_minutes: i64) -> Self {
        Self {
            db,
            meetings,
            email,
            default_duration_minutes,
        }
    }

    #[instrument(skip_all, fields(time_slot_id = %abbrev_uuid(&booking.time_slot_id)), err)]
    pub async fn book(&self, booking: AppointmentBooking) -> Result<AppointmentDBResponse> {
        let email = normalize_email(&booking.email);
        if email.is_empty() {
            return Err(Error::BadRequest {
                message: "email is required".to_string(),
            });
        }
        let contact_name = required(&booking.contact_name, "contactName")?;
        let topic = required(&booking.topic, "topic")?;

        let mut tx = self.db.begin().await.map_err(|e| Error::Database(e.into()))?;

        let slot = TimeSlots::new(&mut tx)
            .get_by_id(booking.time_slot_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Time slot".to_string(),
                id: booking.time_slot_id.to_string(),
            })?;
        if !TimeSlots::new(&mut tx).reserve(slot.id).await? {
            return Err(Error::Conflict {
                message: "Time slot is already booked".to_string(),
            });
        }

        let guest = match Guests::new(&mut tx).get_by_email(&email).await? {
            Some(guest) => guest,
            None => {
                Guests::new(&mut tx)
                    .create(&GuestCreateDBRequest {
                        company_name: booking.company_name.trim().to_string(),
                        contact_name: contact_name.clone(),
                        email: email.clone(),
                        phone: booking.phone,
                        message: None,
                    })
                    .await?
            }
        };

        let mut appointment = Appointments::new(&mut tx)
            .create(&AppointmentCreateDBRequest {
                guest_id: guest.id,
                time_slot_id: slot.id,
                topic,
            })
            .await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        info!(appointment_id = %abbrev_uuid(&appointment.id), "Appointment booked");

        if let Some(updated) = self.attach_meeting(&appointment, &slot).await {
            appointment = updated;
        }

        let notice = AppointmentNotice {
            topic: &appointment.topic,
            starts_at: slot.starts_at,
            duration_minutes: self.duration_of(&slot),
            join_url: appointment.join_url.as_deref(),
        };
        if let Err(e) = self.email.send_appointment_confirmation(&guest.email, &guest.contact_name, &notice).await {
            warn!(error = %e, "Failed to send appointment confirmation");
        }

        Ok(appointment)
    }

    fn duration_of(&self, slot: &TimeSlotDBResponse) -> i64 {
        match slot.duration_minutes() {
            minutes if minutes > 0 => minutes,
            _ => self.default_duration_minutes,
        }
    }

    /// Create the meeting and store its id and join link. None when the provider failed.
    async fn attach_meeting(&self, appointment: &AppointmentDBResponse, slot: &TimeSlotDBResponse) -> Option<AppointmentDBResponse> {
        if !self.meetings.is_configured() {
            warn!("Meeting API is not configured, booking without a meeting link");
            return None;
        }

        let meeting = match self
            .meetings
            .create_meeting(&appointment.topic, slot.starts_at, self.duration_of(slot))
            .await
        {
            Ok(meeting) => meeting,
            Err(e) => {
                warn!(error = %e, "Failed to create meeting for appointment");
                return None;
            }
        };

        let stored = async {
            let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            let updated = Appointments::new(&mut conn)
                .update(
                    appointment.id,
                    &AppointmentUpdateDBRequest {
                        meeting_id: Some(meeting.id),
                        join_url: Some(meeting.join_url),
                        status: None,
                    },
                )
                .await?;
            Ok::<_, Error>(updated)
        }
        .await;

        match stored {
            Ok(updated) => Some(updated),
            Err(e) => {
                warn!(error = %e, "Failed to store meeting details");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  Intro call ", "topic").unwrap(), "Intro call");
        let err = required("   ", "topic").unwrap_err();
        assert_eq!(err.user_message(), "topic is required");
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod db_tests {
    use super::*;
    use crate::config::MeetingsConfig;
    use crate::db::models::scheduling::TimeSlotCreateDBRequest;
    use crate::test_utils::{create_test_config, install_crypto_provider};
    use chrono::{Duration, Utc};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_slot(pool: &PgPool) -> TimeSlotDBResponse {
        let starts_at = Utc::now() + Duration::days(3);
        let mut conn = pool.acquire().await.unwrap();
        TimeSlots::new(&mut conn)
            .create(&TimeSlotCreateDBRequest {
                starts_at,
                ends_at: starts_at + Duration::minutes(45),
            })
            .await
            .unwrap()
    }

    fn booking(slot: &TimeSlotDBResponse, email: &str) -> AppointmentBooking {
        AppointmentBooking {
            company_name: "Acme".to_string(),
            contact_name: "Wile".to_string(),
            email: email.to_string(),
            phone: None,
            time_slot_id: slot.id,
            topic: "Discovery call".to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_booking_with_meeting(pool: PgPool) {
        install_crypto_provider();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "tok", "expires_in": 3600})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/users/me/meetings"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 8812, "join_url": "https://meet.example/j/8812"})),
            )
            .mount(&server)
            .await;

        let (config, dir) = create_test_config();
        let meetings = MeetingClient::new(&MeetingsConfig {
            base_url: format!("{}/v2/", server.uri()).parse().unwrap(),
            oauth_url: format!("{}/oauth/token", server.uri()).parse().unwrap(),
            account_id: "acct".to_string(),
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            ..Default::default()
        })
        .unwrap();
        let email = EmailService::new(&config).unwrap();
        let slot = create_slot(&pool).await;

        let appointment = Booking::new(&pool, &meetings, &email, 30)
            .book(booking(&slot, " Wile@Acme.example "))
            .await
            .unwrap();
        assert_eq!(appointment.meeting_id.as_deref(), Some("8812"));
        assert_eq!(appointment.join_url.as_deref(), Some("https://meet.example/j/8812"));

        let mut conn = pool.acquire().await.unwrap();
        let guest = Guests::new(&mut conn).get_by_email("wile@acme.example").await.unwrap().unwrap();
        assert_eq!(guest.id, appointment.guest_id);
        assert!(TimeSlots::new(&mut conn).get_by_id(slot.id).await.unwrap().unwrap().is_booked);
        assert_eq!(std::fs::read_dir(dir.path().join("emails")).unwrap().count(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_double_booking_conflicts_and_meeting_failure_is_tolerated(pool: PgPool) {
        let (config, _dir) = create_test_config();
        // No credentials configured
        let meetings = MeetingClient::new(&MeetingsConfig::default()).unwrap();
        let email = EmailService::new(&config).unwrap();
        let slot = create_slot(&pool).await;
        let booking_service = Booking::new(&pool, &meetings, &email, 30);

        let first = booking_service.book(booking(&slot, "road@runner.example")).await.unwrap();
        assert!(first.meeting_id.is_none());

        let err = booking_service.book(booking(&slot, "coyote@acme.example")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        // The losing booking left no guest behind
        let mut conn = pool.acquire().await.unwrap();
        assert!(Guests::new(&mut conn).get_by_email("coyote@acme.example").await.unwrap().is_none());

        assert!(Appointments::new(&mut conn).delete(first.id).await.unwrap());
        assert!(!TimeSlots::new(&mut conn).get_by_id(slot.id).await.unwrap().unwrap().is_booked);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_slot_is_not_found(pool: PgPool) {
        let (config, _dir) = create_test_config();
        let meetings = MeetingClient::new(&MeetingsConfig::default()).unwrap();
        let email = EmailService::new(&config).unwrap();
        let slot = TimeSlotDBResponse {
            id: uuid::Uuid::new_v4(),
            starts_at: Utc::now(),
            ends_at: Utc::now(),
            is_booked: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let err = Booking::new(&pool, &meetings, &email, 30)
            .book(booking(&slot, "x@y.example"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
