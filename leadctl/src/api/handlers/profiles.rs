//! Profiles: per-user workspaces that own leads, sales and the other work items.
//!
//! A profile has one owner and any number of members. Owners and members may
//! read, rename and resync it; creating profiles for someone else and deleting
//! them is reserved for administrators.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        profiles::{ListProfilesQuery, ProfileCreate, ProfileResponse, ProfileUpdate},
        sync::ProfileSyncReport,
        users::CurrentUser,
    },
    auth::permissions::{RequiresPermission, ensure_profile_access, operation, require_permission, resource},
    db::{
        handlers::{
            Profiles, Repository, Services,
            attachments::{self, UploadOwner},
            profiles::ProfileFilter,
        },
        models::profiles::{ProfileCreateDBRequest, ProfileUpdateDBRequest},
    },
    errors::{Error, Result},
    sync::sheets::spreadsheet_id_from_url,
    types::{Operation, ProfileId, Resource},
};

fn validate_sheet_url(sheet_url: Option<&str>) -> Result<()> {
    match sheet_url {
        Some(url) if !url.is_empty() && spreadsheet_id_from_url(url).is_none() => Err(Error::BadRequest {
            message: "sheetUrl is not a spreadsheet link".to_string(),
        }),
        _ => Ok(()),
    }
}

#[utoipa::path(
    get,
    path = "/profiles",
    tag = "profiles",
    summary = "List profiles",
    description = "Administrators see every profile. Anyone else sees the profiles they own or belong to.",
    params(ListProfilesQuery),
    responses((status = 200, description = "Page of profiles", body = PaginatedResponse<ProfileResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_profiles(
    State(state): State<AppState>,
    Query(query): Query<ListProfilesQuery>,
    current_user: RequiresPermission<resource::Profiles, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<ProfileResponse>>> {
    let accessible_by = if current_user.is_admin() {
        query.user_id
    } else {
        Some(current_user.id)
    };
    let filter = ProfileFilter {
        accessible_by,
        service_id: query.service_id,
        offset: query.pagination.offset(),
        limit: query.pagination.limit(),
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Profiles::new(&mut conn);
    let profiles = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        profiles.into_iter().map(ProfileResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[utoipa::path(
    post,
    path = "/profiles",
    tag = "profiles",
    summary = "Create profile",
    description = "The owner is also recorded as the first member.",
    request_body = ProfileCreate,
    responses(
        (status = 201, description = "Profile created", body = ProfileResponse),
        (status = 404, description = "Unknown service"),
        (status = 409, description = "Owner already has a profile with this name"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_profile(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Profiles, operation::CreateOwn>,
    Json(create): Json<ProfileCreate>,
) -> Result<(StatusCode, Json<ProfileResponse>)> {
    let owner = match create.user_id {
        Some(user_id) if user_id != current_user.id => {
            require_permission(&current_user, Resource::Profiles, Operation::CreateAll)?;
            user_id
        }
        _ => current_user.id,
    };
    if create.name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "name is required".to_string(),
        });
    }
    validate_sheet_url(create.sheet_url.as_deref())?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    if Services::new(&mut tx).get_by_id(create.service_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Service".to_string(),
            id: create.service_id.to_string(),
        });
    }
    let mut repo = Profiles::new(&mut tx);
    let profile = repo
        .create(&ProfileCreateDBRequest {
            user_id: owner,
            service_id: create.service_id,
            name: create.name.trim().to_string(),
            sheet_url: create.sheet_url,
            sheet_name: create.sheet_name,
        })
        .await?;
    repo.add_member(owner, profile.id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(ProfileResponse::from(profile))))
}

#[utoipa::path(
    get,
    path = "/profiles/{id}",
    tag = "profiles",
    summary = "Get profile",
    params(("id" = String, Path, format = "uuid", description = "Profile ID")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 403, description = "Not a member"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<ProfileId>,
    current_user: RequiresPermission<resource::Profiles, operation::ReadOwn>,
) -> Result<Json<ProfileResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let profile = ensure_profile_access(&mut conn, &current_user, id).await?;
    Ok(Json(ProfileResponse::from(profile)))
}

#[utoipa::path(
    patch,
    path = "/profiles/{id}",
    tag = "profiles",
    summary = "Update profile",
    params(("id" = String, Path, format = "uuid", description = "Profile ID")),
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 403, description = "Not a member"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<ProfileId>,
    current_user: RequiresPermission<resource::Profiles, operation::UpdateOwn>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    validate_sheet_url(update.sheet_url.as_deref())?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_profile_access(&mut conn, &current_user, id).await?;
    let profile = Profiles::new(&mut conn)
        .update(
            id,
            &ProfileUpdateDBRequest {
                service_id: update.service_id,
                name: update.name,
                sheet_url: update.sheet_url,
                sheet_name: update.sheet_name,
            },
        )
        .await?;
    Ok(Json(ProfileResponse::from(profile)))
}

#[utoipa::path(
    delete,
    path = "/profiles/{id}",
    tag = "profiles",
    summary = "Delete profile",
    description = "Removes the profile with its leads, sales and other work items.",
    params(("id" = String, Path, format = "uuid", description = "Profile ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_profile(
    State(state): State<AppState>,
    Path(id): Path<ProfileId>,
    _: RequiresPermission<resource::Profiles, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let orphaned = attachments::orphaned_by(&mut tx, UploadOwner::Profile(id)).await?;
    if !Profiles::new(&mut tx).delete(id).await? {
        return Err(Error::NotFound {
            resource: "Profile".to_string(),
            id: id.to_string(),
        });
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    state.uploads.remove_all_in_background(orphaned);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/profiles/{id}/sync",
    tag = "profiles",
    summary = "Sync profile from its spreadsheet",
    description = "Runs the same import the scheduler runs, for one profile, and waits for it.",
    params(("id" = String, Path, format = "uuid", description = "Profile ID")),
    responses(
        (status = 200, description = "Sync report", body = ProfileSyncReport),
        (status = 400, description = "No spreadsheet bound"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn sync_profile(
    State(state): State<AppState>,
    Path(id): Path<ProfileId>,
    current_user: RequiresPermission<resource::Sync, operation::CreateOwn>,
) -> Result<Json<ProfileSyncReport>> {
    let user: &CurrentUser = &current_user;
    let profile = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        ensure_profile_access(&mut conn, user, id).await?
    };
    if profile.sheet_binding().is_none() {
        return Err(Error::BadRequest {
            message: "Profile has no spreadsheet bound".to_string(),
        });
    }
    Ok(Json(state.sync.sync_profile(&profile).await))
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use crate::api::models::pagination::PaginatedResponse;
    use crate::api::models::profiles::ProfileResponse;
    use crate::api::models::roles::{ADMIN, USER};
    use crate::api::models::tasks::TaskResponse;
    use crate::api::models::tickets::TicketResponse;
    use crate::test_utils::{
        assert_removed_eventually, bearer, create_test_app, create_test_profile, create_test_service, create_test_user,
        profile_owner,
    };
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_profiles_are_private_to_members(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let owner = create_test_user(&pool, USER).await;
        let stranger = create_test_user(&pool, USER).await;
        let service = create_test_service(&pool).await;

        let created = server
            .post("/api/v0.1/profiles")
            .add_header("authorization", bearer(&owner))
            .json(&json!({"serviceId": service.id, "name": "EMEA outbound"}))
            .await;
        created.assert_status(StatusCode::CREATED);
        let profile: ProfileResponse = created.json();
        assert_eq!(profile.user_id, owner.id);

        server
            .post("/api/v0.1/profiles")
            .add_header("authorization", bearer(&owner))
            .json(&json!({"serviceId": service.id, "name": "EMEA outbound"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        server
            .get(&format!("/api/v0.1/profiles/{}", profile.profile_id))
            .add_header("authorization", bearer(&stranger))
            .await
            .assert_status_forbidden();

        let mine: PaginatedResponse<ProfileResponse> = server
            .get("/api/v0.1/profiles")
            .add_header("authorization", bearer(&stranger))
            .await
            .json();
        assert_eq!(mine.total, 0);

        server
            .post("/api/v0.1/profiles")
            .add_header("authorization", bearer(&stranger))
            .json(&json!({"serviceId": service.id, "name": "Not mine", "userId": owner.id}))
            .await
            .assert_status_forbidden();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sync_without_sheet_is_rejected(pool: PgPool) {
        let (server, _bg, _dir) = create_test_app(pool.clone()).await;
        let owner = create_test_user(&pool, USER).await;
        let service = create_test_service(&pool).await;

        let profile: ProfileResponse = server
            .post("/api/v0.1/profiles")
            .add_header("authorization", bearer(&owner))
            .json(&json!({"serviceId": service.id, "name": "No sheet"}))
            .await
            .json();

        server
            .post(&format!("/api/v0.1/profiles/{}/sync", profile.profile_id))
            .add_header("authorization", bearer(&owner))
            .await
            .assert_status_bad_request();

        server
            .patch(&format!("/api/v0.1/profiles/{}", profile.profile_id))
            .add_header("authorization", bearer(&owner))
            .json(&json!({"sheetUrl": "https://example.com/not-a-sheet"}))
            .await
            .assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_profile_removes_attached_files(pool: PgPool) {
        let (server, _bg, dir) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, ADMIN).await;
        let profile = create_test_profile(&pool).await;
        let owner = profile_owner(&pool, &profile).await;
        let upload_root = dir.path().join("upload");

        let task: TaskResponse = server
            .post("/api/v0.1/tasks")
            .add_header("authorization", bearer(&owner))
            .multipart(
                MultipartForm::new()
                    .add_text("profileId", profile.id.to_string())
                    .add_text("title", "Warm intro list")
                    .add_part("file", Part::bytes(b"names".to_vec()).file_name("names.csv")),
            )
            .await
            .json();
        let ticket: TicketResponse = server
            .post("/api/v0.1/tickets")
            .add_header("authorization", bearer(&owner))
            .multipart(
                MultipartForm::new()
                    .add_text("profileId", profile.id.to_string())
                    .add_text("subject", "Wrong totals")
                    .add_part("file", Part::bytes(b"screenshot".to_vec()).file_name("totals.png")),
            )
            .await
            .json();

        let task_file = upload_root.join(task.document_path.as_deref().unwrap());
        let ticket_file = upload_root.join(ticket.document_path.as_deref().unwrap());
        assert!(task_file.exists());
        assert!(ticket_file.exists());

        server
            .delete(&format!("/api/v0.1/profiles/{}", profile.id))
            .add_header("authorization", bearer(&admin))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        assert_removed_eventually(&task_file).await;
        assert_removed_eventually(&ticket_file).await;
    }
}
