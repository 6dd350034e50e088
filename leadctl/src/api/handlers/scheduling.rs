//! Meeting slots and appointments.
//!
//! Administrators publish time slots; anyone may book a free one. Booking
//! creates the guest on the fly when the email is new.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        scheduling::{
            AppointmentBooking, AppointmentResponse, ListAppointmentsQuery, ListTimeSlotsQuery, TimeSlotCreate, TimeSlotResponse,
            TimeSlotUpdate,
        },
        users::CurrentUser,
    },
    auth::permissions::{RequiresPermission, can_access_all, operation, resource},
    booking::Booking,
    db::{
        handlers::{
            Appointments, Repository, TimeSlots,
            scheduling::{AppointmentFilter, TimeSlotFilter},
        },
        models::scheduling::{TimeSlotCreateDBRequest, TimeSlotUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{AppointmentId, Resource, TimeSlotId},
};

fn slot_not_found(id: TimeSlotId) -> Error {
    Error::NotFound {
        resource: "Time slot".to_string(),
        id: id.to_string(),
    }
}

fn appointment_not_found(id: AppointmentId) -> Error {
    Error::NotFound {
        resource: "Appointment".to_string(),
        id: id.to_string(),
    }
}

fn ensure_ordered(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<()> {
    if ends_at <= starts_at {
        return Err(Error::BadRequest {
            message: "endsAt must be after startsAt".to_string(),
        });
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/time-slots",
    tag = "scheduling",
    summary = "List time slots",
    description = "Without administrator credentials only free slots are listed.",
    params(ListTimeSlotsQuery),
    responses((status = 200, description = "Page of time slots", body = PaginatedResponse<TimeSlotResponse>))
)]
#[tracing::instrument(skip_all)]
pub async fn list_time_slots(
    State(state): State<AppState>,
    Query(query): Query<ListTimeSlotsQuery>,
    current_user: Option<CurrentUser>,
) -> Result<Json<PaginatedResponse<TimeSlotResponse>>> {
    let sees_all = current_user.is_some_and(|user| can_access_all(&user, Resource::TimeSlots));
    let filter = TimeSlotFilter {
        is_booked: if sees_all { query.is_booked } else { Some(false) },
        starts_after: query.starts_after,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = TimeSlots::new(&mut conn);
    let slots = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        slots.into_iter().map(TimeSlotResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    post,
    path = "/time-slots",
    tag = "scheduling",
    summary = "Publish time slot",
    request_body = TimeSlotCreate,
    responses(
        (status = 201, description = "Slot created", body = TimeSlotResponse),
        (status = 400, description = "Slot ends before it starts"),
        (status = 409, description = "Slot already exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_time_slot(
    State(state): State<AppState>,
    _: RequiresPermission<resource::TimeSlots, operation::CreateAll>,
    Json(create): Json<TimeSlotCreate>,
) -> Result<(StatusCode, Json<TimeSlotResponse>)> {
    ensure_ordered(create.starts_at, create.ends_at)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let slot = TimeSlots::new(&mut conn)
        .create(&TimeSlotCreateDBRequest {
            starts_at: create.starts_at,
            ends_at: create.ends_at,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(TimeSlotResponse::from(slot))))
}

#[utoipa::path(
    get,
    path = "/time-slots/{id}",
    tag = "scheduling",
    summary = "Get time slot",
    params(("id" = String, Path, format = "uuid", description = "Time slot ID")),
    responses(
        (status = 200, description = "Time slot", body = TimeSlotResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_time_slot(
    State(state): State<AppState>,
    Path(id): Path<TimeSlotId>,
    _: RequiresPermission<resource::TimeSlots, operation::ReadAll>,
) -> Result<Json<TimeSlotResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let slot = TimeSlots::new(&mut conn).get_by_id(id).await?.ok_or_else(|| slot_not_found(id))?;
    Ok(Json(TimeSlotResponse::from(slot)))
}

#[utoipa::path(
    patch,
    path = "/time-slots/{id}",
    tag = "scheduling",
    summary = "Update time slot",
    params(("id" = String, Path, format = "uuid", description = "Time slot ID")),
    request_body = TimeSlotUpdate,
    responses(
        (status = 200, description = "Updated slot", body = TimeSlotResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_time_slot(
    State(state): State<AppState>,
    Path(id): Path<TimeSlotId>,
    _: RequiresPermission<resource::TimeSlots, operation::UpdateAll>,
    Json(update): Json<TimeSlotUpdate>,
) -> Result<Json<TimeSlotResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = TimeSlots::new(&mut conn);
    let existing = repo.get_by_id(id).await?.ok_or_else(|| slot_not_found(id))?;
    ensure_ordered(
        update.starts_at.unwrap_or(existing.starts_at),
        update.ends_at.unwrap_or(existing.ends_at),
    )?;
    let slot = repo
        .update(
            id,
            &TimeSlotUpdateDBRequest {
                starts_at: update.starts_at,
                ends_at: update.ends_at,
                is_booked: update.is_booked,
            },
        )
        .await?;
    Ok(Json(TimeSlotResponse::from(slot)))
}

#[utoipa::path(
    delete,
    path = "/time-slots/{id}",
    tag = "scheduling",
    summary = "Delete time slot",
    params(("id" = String, Path, format = "uuid", description = "Time slot ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_time_slot(
    State(state): State<AppState>,
    Path(id): Path<TimeSlotId>,
    _: RequiresPermission<resource::TimeSlots, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !TimeSlots::new(&mut conn).delete(id).await? {
        return Err(slot_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/appointments",
    tag = "scheduling",
    summary = "Book an appointment",
    description = "Reserves the slot, records the guest if new, and creates a video meeting. \
                   If the meeting provider is unavailable the booking still succeeds without a join link.",
    request_body = AppointmentBooking,
    responses(
        (status = 201, description = "Booked", body = AppointmentResponse),
        (status = 404, description = "Unknown time slot"),
        (status = 409, description = "Slot already booked"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn book_appointment(
    State(state): State<AppState>,
    Json(booking): Json<AppointmentBooking>,
) -> Result<(StatusCode, Json<AppointmentResponse>)> {
    let appointment = Booking::new(
        &state.db,
        &state.meetings,
        &state.email,
        i64::from(state.config.meetings.default_duration_minutes),
    )
    .book(booking)
    .await?;
    Ok((StatusCode::CREATED, Json(AppointmentResponse::from(appointment))))
}

#[utoipa::path(
    get,
    path = "/appointments",
    tag = "scheduling",
    summary = "List appointments",
    params(ListAppointmentsQuery),
    responses((status = 200, description = "Page of appointments", body = PaginatedResponse<AppointmentResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_appointments(
    State(state): State<AppState>,
    Query(query): Query<ListAppointmentsQuery>,
    _: RequiresPermission<resource::Appointments, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<AppointmentResponse>>> {
    let filter = AppointmentFilter {
        guest_id: query.guest_id,
        status: query.status,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Appointments::new(&mut conn);
    let appointments = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        appointments.into_iter().map(AppointmentResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    get,
    path = "/appointments/{id}",
    tag = "scheduling",
    summary = "Get appointment",
    params(("id" = String, Path, format = "uuid", description = "Appointment ID")),
    responses(
        (status = 200, description = "Appointment", body = AppointmentResponse),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_appointment(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
    _: RequiresPermission<resource::Appointments, operation::ReadAll>,
) -> Result<Json<AppointmentResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let appointment = Appointments::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| appointment_not_found(id))?;
    Ok(Json(AppointmentResponse::from(appointment)))
}

#[utoipa::path(
    delete,
    path = "/appointments/{id}",
    tag = "scheduling",
    summary = "Cancel appointment",
    description = "Frees the booked time slot.",
    params(("id" = String, Path, format = "uuid", description = "Appointment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_appointment(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
    _: RequiresPermission<resource::Appointments, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Appointments::new(&mut conn).delete(id).await? {
        return Err(appointment_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::pagination::PaginatedResponse;
    use crate::api::models::roles::ADMIN;
    use crate::api::models::scheduling::{AppointmentResponse, TimeSlotResponse};
    use crate::test_utils::{bearer, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_book_hides_slot_and_cancel_frees_it(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, ADMIN).await;
        let starts_at = Utc::now() + Duration::days(2);

        server
            .post("/api/v0.1/time-slots")
            .add_header("authorization", bearer(&admin))
            .json(&json!({"startsAt": starts_at, "endsAt": starts_at - Duration::minutes(30)}))
            .await
            .assert_status_bad_request();

        let slot: TimeSlotResponse = server
            .post("/api/v0.1/time-slots")
            .add_header("authorization", bearer(&admin))
            .json(&json!({"startsAt": starts_at, "endsAt": starts_at + Duration::minutes(30)}))
            .await
            .json();

        let booked = server
            .post("/api/v0.1/appointments")
            .json(&json!({
                "companyName": "Umbrella",
                "contactName": "Alice",
                "email": "alice@umbrella.example",
                "timeSlotId": slot.time_slot_id,
                "topic": "Intro call",
            }))
            .await;
        booked.assert_status(StatusCode::CREATED);
        let appointment: AppointmentResponse = booked.json();
        assert!(appointment.join_url.is_none());

        let public: PaginatedResponse<TimeSlotResponse> = server.get("/api/v0.1/time-slots").await.json();
        assert_eq!(public.total, 0);

        let all: PaginatedResponse<TimeSlotResponse> = server
            .get("/api/v0.1/time-slots")
            .add_header("authorization", bearer(&admin))
            .await
            .json();
        assert_eq!(all.total, 1);
        assert!(all.items[0].is_booked);

        server
            .delete(&format!("/api/v0.1/appointments/{}", appointment.appointment_id))
            .add_header("authorization", bearer(&admin))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let public: PaginatedResponse<TimeSlotResponse> = server.get("/api/v0.1/time-slots").await.json();
        assert_eq!(public.total, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deleting_guest_reopens_their_slot(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, ADMIN).await;
        let starts_at = Utc::now() + Duration::days(4);

        let slot: TimeSlotResponse = server
            .post("/api/v0.1/time-slots")
            .add_header("authorization", bearer(&admin))
            .json(&json!({"startsAt": starts_at, "endsAt": starts_at + Duration::minutes(30)}))
            .await
            .json();

        let appointment: AppointmentResponse = server
            .post("/api/v0.1/appointments")
            .json(&json!({
                "companyName": "Globex",
                "contactName": "Hank",
                "email": "hank@globex.example",
                "timeSlotId": slot.time_slot_id,
                "topic": "Renewal",
            }))
            .await
            .json();

        server
            .delete(&format!("/api/v0.1/guests/{}", appointment.guest_id))
            .add_header("authorization", bearer(&admin))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get(&format!("/api/v0.1/appointments/{}", appointment.appointment_id))
            .add_header("authorization", bearer(&admin))
            .await
            .assert_status_not_found();

        let public: PaginatedResponse<TimeSlotResponse> = server.get("/api/v0.1/time-slots").await.json();
        assert_eq!(public.total, 1);
        assert_eq!(public.items[0].time_slot_id, slot.time_slot_id);
        assert!(!public.items[0].is_booked);
    }
}
