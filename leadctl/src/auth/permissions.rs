//! Role-based permissions and the profile access check.
//!
//! Handlers declare what they need with the [`RequiresPermission`] extractor:
//!
//! ```ignore
//! async fn delete_guest(_: RequiresPermission<resource::Guests, operation::DeleteAll>, ...)
//! ```
//!
//! `*All` operations are only held by administrators. `*Own` operations are held by
//! standard users on profile-scoped resources, and still need a per-row check via
//! [`ensure_profile_access`] once the target profile is known.

use std::{marker::PhantomData, ops::Deref};

use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::PgConnection;
use tracing::debug;

use crate::{
    AppState,
    api::models::{roles::USER, users::CurrentUser},
    db::{
        handlers::{Profiles, Repository},
        models::profiles::ProfileDBResponse,
    },
    errors::{Error, Result},
    types::{Operation, Permission, ProfileId, Resource, abbrev_uuid},
};

/// Type-level resource markers for [`RequiresPermission`]
pub mod resource {
    use crate::types::Resource;

    pub trait ResourceMarker {
        const RESOURCE: Resource;
    }

    macro_rules! resources {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        };
    }

    resources!(
        Users,
        Roles,
        Guests,
        GuestRequests,
        Catalog,
        Profiles,
        Leads,
        Sales,
        WarmLeads,
        Tasks,
        TaskSubmissions,
        Tickets,
        TimeSlots,
        Appointments,
        Jobs,
        Applications,
        Metrics,
        Sync,
    );
}

/// Type-level operation markers for [`RequiresPermission`]
pub mod operation {
    use crate::types::Operation;

    pub trait OperationMarker {
        const OPERATION: Operation;
    }

    macro_rules! operations {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    operations!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn);
}

const OWN_OPERATIONS: [Operation; 4] = [
    Operation::CreateOwn,
    Operation::ReadOwn,
    Operation::UpdateOwn,
    Operation::DeleteOwn,
];

/// Resources a standard user manages inside their own profiles.
const PROFILE_SCOPED: [Resource; 7] = [
    Resource::Leads,
    Resource::Sales,
    Resource::WarmLeads,
    Resource::Tasks,
    Resource::TaskSubmissions,
    Resource::Tickets,
    Resource::Metrics,
];

fn user_role_allows(resource: Resource, operation: Operation) -> bool {
    if PROFILE_SCOPED.contains(&resource) {
        return OWN_OPERATIONS.contains(&operation);
    }
    match resource {
        // Profiles are handed out by approval; owners may read, rename and resync them.
        Resource::Profiles | Resource::Sync => {
            matches!(operation, Operation::ReadOwn | Operation::UpdateOwn | Operation::CreateOwn)
        }
        Resource::Users => matches!(operation, Operation::ReadOwn | Operation::UpdateOwn),
        _ => false,
    }
}

pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    if user.is_admin() {
        return true;
    }
    user.roles.iter().any(|role| role == USER) && user_role_allows(resource, operation)
}

/// Administrators bypass per-profile checks.
pub fn can_access_all(user: &CurrentUser, resource: Resource) -> bool {
    has_permission(user, resource, Operation::ReadAll)
}

/// Extractor that authenticates the caller and checks one (resource, operation) pair.
pub struct RequiresPermission<R, O> {
    user: CurrentUser,
    _marker: PhantomData<fn() -> (R, O)>,
}

impl<R, O> RequiresPermission<R, O> {
    pub fn into_inner(self) -> CurrentUser {
        self.user
    }
}

impl<R, O> Deref for RequiresPermission<R, O> {
    type Target = CurrentUser;

    fn deref(&self) -> &CurrentUser {
        &self.user
    }
}

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: resource::ResourceMarker + Send + Sync,
    O: operation::OperationMarker + Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = <CurrentUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        require_permission(&user, R::RESOURCE, O::OPERATION)?;
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}

/// Fail with `InsufficientPermissions` unless `user` holds `operation` on `resource`.
pub fn require_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<()> {
    if has_permission(user, resource, operation) {
        return Ok(());
    }
    debug!(user_id = %abbrev_uuid(&user.id), ?resource, ?operation, "Permission denied");
    Err(Error::InsufficientPermissions {
        required: Permission::Allow(resource, operation),
        action: operation,
        resource: format!("{resource:?}"),
    })
}

/// Load a profile and check the caller may work inside it.
///
/// An unknown profile is a 404 for everyone. Administrators pass; anyone else must
/// own the profile or be one of its members.
pub async fn ensure_profile_access(conn: &mut PgConnection, user: &CurrentUser, profile_id: ProfileId) -> Result<ProfileDBResponse> {
    let mut repo = Profiles::new(conn);
    let profile = repo.get_by_id(profile_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Profile".to_string(),
        id: profile_id.to_string(),
    })?;

    if user.is_admin() || profile.user_id == user.id || repo.has_access(user.id, profile_id).await? {
        return Ok(profile);
    }

    Err(Error::InsufficientPermissions {
        required: Permission::Granted,
        action: Operation::ReadOwn,
        resource: format!("profile {profile_id}"),
    })
}

/// Non-administrators must name the profile they are listing from.
pub fn require_profile_filter(user: &CurrentUser, profile_id: Option<ProfileId>) -> Result<Option<ProfileId>> {
    match profile_id {
        None if !user.is_admin() => Err(Error::BadRequest {
            message: "profileId is required".to_string(),
        }),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user_with(roles: &[&str]) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            contact_name: "Someone".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn admins_hold_everything() {
        for role in ["ADMIN", "SUPER_ADMIN"] {
            let admin = user_with(&[role]);
            assert!(has_permission(&admin, Resource::Guests, Operation::DeleteAll));
            assert!(has_permission(&admin, Resource::Roles, Operation::CreateAll));
            assert!(can_access_all(&admin, Resource::Leads));
        }
    }

    #[test]
    fn users_hold_own_operations_on_profile_resources() {
        let user = user_with(&["USER"]);
        assert!(has_permission(&user, Resource::Leads, Operation::UpdateOwn));
        assert!(has_permission(&user, Resource::Tickets, Operation::CreateOwn));
        assert!(!has_permission(&user, Resource::Leads, Operation::ReadAll));
        assert!(!has_permission(&user, Resource::Guests, Operation::ReadOwn));
        assert!(!has_permission(&user, Resource::Catalog, Operation::CreateAll));
        assert!(!has_permission(&user, Resource::Profiles, Operation::DeleteOwn));
        assert!(has_permission(&user, Resource::Sync, Operation::CreateOwn));
        assert!(!can_access_all(&user, Resource::Leads));
    }

    #[test]
    fn no_roles_no_permissions() {
        let nobody = user_with(&[]);
        assert!(!has_permission(&nobody, Resource::Leads, Operation::ReadOwn));
        let err = require_permission(&nobody, Resource::Leads, Operation::ReadOwn).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientPermissions {
                required: Permission::Allow(Resource::Leads, Operation::ReadOwn),
                ..
            }
        ));
    }

    #[test]
    fn profile_filter_is_required_for_users() {
        let user = user_with(&["USER"]);
        assert!(require_profile_filter(&user, None).is_err());
        let id = Uuid::new_v4();
        assert_eq!(require_profile_filter(&user, Some(id)).unwrap(), Some(id));
        assert_eq!(require_profile_filter(&user_with(&["ADMIN"]), None).unwrap(), None);
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod db_tests {
    use super::*;
    use crate::test_utils::{create_test_profile, create_test_user};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_profile_access(pool: PgPool) {
        let profile = create_test_profile(&pool).await;
        let stranger = create_test_user(&pool, "USER").await;
        let member = create_test_user(&pool, "USER").await;
        let admin = create_test_user(&pool, "ADMIN").await;
        let mut conn = pool.acquire().await.unwrap();

        Profiles::new(&mut conn).add_member(member.id, profile.id).await.unwrap();

        let stranger: CurrentUser = stranger.into();
        let member: CurrentUser = member.into();
        let admin: CurrentUser = admin.into();

        assert!(matches!(
            ensure_profile_access(&mut conn, &stranger, profile.id).await,
            Err(Error::InsufficientPermissions { .. })
        ));
        assert_eq!(ensure_profile_access(&mut conn, &member, profile.id).await.unwrap().id, profile.id);
        assert_eq!(ensure_profile_access(&mut conn, &admin, profile.id).await.unwrap().id, profile.id);
        assert!(matches!(
            ensure_profile_access(&mut conn, &admin, uuid::Uuid::new_v4()).await,
            Err(Error::NotFound { .. })
        ));
    }
}
