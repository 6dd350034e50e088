//! OpenAPI document for the REST API.
//!
//! Paths are relative to the `/api/v0.1` server. Request and response schemas
//! are collected from the handler annotations.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{self, models};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.security_schemes.insert(
            "BearerAuth".to_string(),
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some(
                        "Access token from `POST /auth/login`. Include it in the `Authorization` header:\n\n\
                         ```\nAuthorization: Bearer ACCESS_TOKEN\n```\n\n\
                         Access tokens are short-lived; exchange the refresh token at `POST /auth/refresh`.",
                    ))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "leadctl API",
        description = "Guests, profiles, the lead and sale pipeline, work items, scheduling and careers."
    ),
    servers(
        (url = "/api/v0.1", description = "leadctl API")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::refresh,
        api::handlers::auth::logout,
        api::handlers::auth::me,
        api::handlers::users::list_users,
        api::handlers::users::create_user,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::roles::list_roles,
        api::handlers::roles::create_role,
        api::handlers::roles::get_role,
        api::handlers::roles::update_role,
        api::handlers::roles::delete_role,
        api::handlers::roles::set_user_roles,
        api::handlers::guests::create_guest,
        api::handlers::guests::list_guests,
        api::handlers::guests::get_guest,
        api::handlers::guests::update_guest,
        api::handlers::guests::delete_guest,
        api::handlers::guests::approve_guest,
        api::handlers::guest_requests::create_guest_request,
        api::handlers::guest_requests::list_guest_requests,
        api::handlers::guest_requests::get_guest_request,
        api::handlers::guest_requests::update_guest_request,
        api::handlers::guest_requests::delete_guest_request,
        api::handlers::guest_requests::approve_guest_request,
        api::handlers::catalog::list_services,
        api::handlers::catalog::get_service,
        api::handlers::catalog::create_service,
        api::handlers::catalog::update_service,
        api::handlers::catalog::set_service_categories,
        api::handlers::catalog::delete_service,
        api::handlers::catalog::list_categories,
        api::handlers::catalog::get_category,
        api::handlers::catalog::create_category,
        api::handlers::catalog::update_category,
        api::handlers::catalog::delete_category,
        api::handlers::profiles::list_profiles,
        api::handlers::profiles::create_profile,
        api::handlers::profiles::get_profile,
        api::handlers::profiles::update_profile,
        api::handlers::profiles::delete_profile,
        api::handlers::profiles::sync_profile,
        api::handlers::leads::list_leads,
        api::handlers::leads::create_lead,
        api::handlers::leads::get_lead,
        api::handlers::leads::update_lead,
        api::handlers::leads::delete_lead,
        api::handlers::sales::list_sales,
        api::handlers::sales::get_sale,
        api::handlers::sales::update_sale,
        api::handlers::sales::delete_sale,
        api::handlers::warm_leads::list_warm_leads,
        api::handlers::warm_leads::create_warm_lead,
        api::handlers::warm_leads::get_warm_lead,
        api::handlers::warm_leads::update_warm_lead,
        api::handlers::warm_leads::delete_warm_lead,
        api::handlers::tasks::list_tasks,
        api::handlers::tasks::create_task,
        api::handlers::tasks::get_task,
        api::handlers::tasks::update_task,
        api::handlers::tasks::delete_task,
        api::handlers::task_submissions::list_task_submissions,
        api::handlers::task_submissions::create_task_submission,
        api::handlers::task_submissions::get_task_submission,
        api::handlers::task_submissions::update_task_submission,
        api::handlers::task_submissions::delete_task_submission,
        api::handlers::tickets::list_tickets,
        api::handlers::tickets::create_ticket,
        api::handlers::tickets::get_ticket,
        api::handlers::tickets::update_ticket,
        api::handlers::tickets::delete_ticket,
        api::handlers::scheduling::list_time_slots,
        api::handlers::scheduling::create_time_slot,
        api::handlers::scheduling::get_time_slot,
        api::handlers::scheduling::update_time_slot,
        api::handlers::scheduling::delete_time_slot,
        api::handlers::scheduling::book_appointment,
        api::handlers::scheduling::list_appointments,
        api::handlers::scheduling::get_appointment,
        api::handlers::scheduling::delete_appointment,
        api::handlers::careers::list_jobs,
        api::handlers::careers::get_job,
        api::handlers::careers::create_job,
        api::handlers::careers::update_job,
        api::handlers::careers::set_job_skills,
        api::handlers::careers::delete_job,
        api::handlers::careers::list_skills,
        api::handlers::careers::create_skill,
        api::handlers::careers::update_skill,
        api::handlers::careers::delete_skill,
        api::handlers::careers::create_application,
        api::handlers::careers::list_applications,
        api::handlers::careers::get_application,
        api::handlers::careers::update_application,
        api::handlers::careers::delete_application,
        api::handlers::metrics::get_pipeline_metrics,
        api::handlers::sync::run_sync,
    ),
    components(
        schemas(
            models::pipeline::PipelineEntry,
            models::sync::ProfileSyncReport,
        )
    ),
    tags(
        (name = "auth", description = "Login, token refresh and logout"),
        (name = "users", description = "User accounts"),
        (name = "roles", description = "Roles and role assignment"),
        (name = "guests", description = "Public sign-up and guest approval"),
        (name = "guest-requests", description = "Service requests from guests"),
        (name = "catalog", description = "Services and categories"),
        (name = "profiles", description = "Per-user workspaces"),
        (name = "leads", description = "Pipeline leads"),
        (name = "sales", description = "Pipeline sales"),
        (name = "warm-leads", description = "Warm leads"),
        (name = "tasks", description = "Tasks and submissions"),
        (name = "tickets", description = "Support tickets"),
        (name = "scheduling", description = "Time slots and appointments"),
        (name = "careers", description = "Jobs, skills and applications"),
        (name = "metrics", description = "Pipeline metrics"),
        (name = "sync", description = "Spreadsheet sync"),
    )
)]
pub struct ApiDoc;
