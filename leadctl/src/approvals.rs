//! Guest approval workflow.
//!
//! Approving a guest turns a contact into a user account. Approving a guest
//! *request* additionally gives that user a profile for the requested service.
//!
//! Every database step runs in one transaction, so a failure leaves no
//! half-approved state behind. The credentials email is sent after commit:
//! a mail failure is reported in the [`ApprovalReport`] but does not undo
//! the approval.

use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument, warn};

use crate::{
    api::models::{
        approvals::{ApprovalReport, ApprovalStep, ApprovalStepName, StepOutcome},
        roles::USER,
    },
    auth::password::{Argon2Params, generate_password, hash_password_blocking},
    config::Config,
    db::{
        handlers::{GuestRequests, Guests, Profiles, Repository, Services, Users},
        models::{
            guest_requests::RequestStatus, guests::GuestDBResponse, profiles::ProfileCreateDBRequest,
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    email::EmailService,
    errors::{Error, Result},
    types::{GuestId, GuestRequestId, abbrev_uuid},
};

pub struct Approvals<'a> {
    db: &'a PgPool,
    config: &'a Config,
    email: &'a EmailService,
}

/// Steps recorded while the transaction is open.
struct Steps(Vec<ApprovalStep>);

impl Steps {
    fn record(&mut self, step: ApprovalStepName, outcome: StepOutcome) {
        self.0.push(ApprovalStep { step, outcome, detail: None });
    }

    fn record_with(&mut self, step: ApprovalStepName, outcome: StepOutcome, detail: impl Into<String>) {
        self.0.push(ApprovalStep {
            step,
            outcome,
            detail: Some(detail.into()),
        });
    }
}

/// A user account the approval produced or found.
struct Account {
    user: UserDBResponse,
    /// Present when this approval created the account
    password: Option<String>,
}

impl<'a> Approvals<'a> {
    pub fn new(db: &'a PgPool, config: &'a Config, email: &'a EmailService) -> Self {
        Self { db, config, email }
    }

    /// Approve a guest directly: create their user account and email the credentials.
    ///
    /// Fails with `Conflict` when the guest is already approved or a user already
    /// holds the guest's email.
    #[instrument(skip(self), fields(guest_id = %abbrev_uuid(&guest_id)), err)]
    pub async fn approve_guest(&self, guest_id: GuestId) -> Result<ApprovalReport> {
        let mut steps = Steps(Vec::new());
        let mut tx = self.db.begin().await.map_err(|e| Error::Database(e.into()))?;

        let guest = Guests::new(&mut tx).get_for_update(guest_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Guest".to_string(),
            id: guest_id.to_string(),
        })?;
        if guest.approved {
            return Err(Error::Conflict {
                message: "Guest already approved".to_string(),
            });
        }

        if Users::new(&mut tx).get_user_by_email(&guest.email).await?.is_some() {
            return Err(Error::Conflict {
                message: format!("A user with email '{}' already exists", guest.email),
            });
        }
        steps.record(ApprovalStepName::CheckExistingUser, StepOutcome::Succeeded);

        let account = self.create_account(&mut tx, &guest).await?;
        steps.record(ApprovalStepName::CreateUser, StepOutcome::Succeeded);

        Guests::new(&mut tx).mark_approved(guest.id).await?;
        steps.record(ApprovalStepName::MarkGuestApproved, StepOutcome::Succeeded);

        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        info!(user_id = %abbrev_uuid(&account.user.id), "Guest approved");

        self.send_credentials(&mut steps, &guest, &account).await;
        Ok(ApprovalReport {
            guest_id: guest.id,
            user_id: account.user.id,
            profile_id: None,
            request_id: None,
            steps: steps.0,
        })
    }

    /// Approve a pending guest request: ensure the guest has a user account, give
    /// that user a profile for the requested service and resolve the request.
    ///
    /// An existing account or an already approved guest is not an error; those
    /// steps report `already_done` and no credentials are sent.
    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&request_id)), err)]
    pub async fn approve_request(&self, request_id: GuestRequestId) -> Result<ApprovalReport> {
        let mut steps = Steps(Vec::new());
        let mut tx = self.db.begin().await.map_err(|e| Error::Database(e.into()))?;

        let request = GuestRequests::new(&mut tx)
            .get_for_update(request_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Guest request".to_string(),
                id: request_id.to_string(),
            })?;
        if request.status != RequestStatus::Pending {
            return Err(Error::Conflict {
                message: "Guest request already resolved".to_string(),
            });
        }

        let guest = Guests::new(&mut tx)
            .get_for_update(request.guest_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Guest".to_string(),
                id: request.guest_id.to_string(),
            })?;
        let service = Services::new(&mut tx)
            .get_by_id(request.service_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Service".to_string(),
                id: request.service_id.to_string(),
            })?;

        let existing = Users::new(&mut tx).get_user_by_email(&guest.email).await?;
        let account = match existing {
            Some(user) => {
                steps.record_with(ApprovalStepName::CheckExistingUser, StepOutcome::AlreadyDone, "user already exists");
                steps.record(ApprovalStepName::CreateUser, StepOutcome::AlreadyDone);
                Account { user, password: None }
            }
            None => {
                steps.record(ApprovalStepName::CheckExistingUser, StepOutcome::Succeeded);
                let account = self.create_account(&mut tx, &guest).await?;
                steps.record(ApprovalStepName::CreateUser, StepOutcome::Succeeded);
                account
            }
        };

        if guest.approved {
            steps.record(ApprovalStepName::MarkGuestApproved, StepOutcome::AlreadyDone);
        } else {
            Guests::new(&mut tx).mark_approved(guest.id).await?;
            steps.record(ApprovalStepName::MarkGuestApproved, StepOutcome::Succeeded);
        }

        let owned = Profiles::new(&mut tx)
            .find_owned_for_service(account.user.id, service.id)
            .await?;
        let profile = match owned {
            Some(profile) => {
                steps.record_with(
                    ApprovalStepName::CreateProfile,
                    StepOutcome::AlreadyDone,
                    "user already has a profile for this service",
                );
                profile
            }
            None => {
                let profile = Profiles::new(&mut tx)
                    .create(&ProfileCreateDBRequest {
                        user_id: account.user.id,
                        service_id: service.id,
                        name: service.name.clone(),
                        sheet_url: None,
                        sheet_name: None,
                    })
                    .await?;
                steps.record(ApprovalStepName::CreateProfile, StepOutcome::Succeeded);
                profile
            }
        };

        if Profiles::new(&mut tx).add_member(account.user.id, profile.id).await? {
            steps.record(ApprovalStepName::LinkUserProfile, StepOutcome::Succeeded);
        } else {
            steps.record(ApprovalStepName::LinkUserProfile, StepOutcome::AlreadyDone);
        }

        GuestRequests::new(&mut tx).resolve(request.id).await?;
        steps.record(ApprovalStepName::ResolveRequest, StepOutcome::Succeeded);

        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        info!(
            user_id = %abbrev_uuid(&account.user.id),
            profile_id = %abbrev_uuid(&profile.id),
            "Guest request approved"
        );

        self.send_credentials(&mut steps, &guest, &account).await;
        Ok(ApprovalReport {
            guest_id: guest.id,
            user_id: account.user.id,
            profile_id: Some(profile.id),
            request_id: Some(request.id),
            steps: steps.0,
        })
    }

    async fn create_account(&self, conn: &mut PgConnection, guest: &GuestDBResponse) -> Result<Account> {
        let password = generate_password();
        let password_hash = hash_password_blocking(password.clone(), Argon2Params::from(&self.config.auth.password)).await?;
        let user = Users::new(conn)
            .create(&UserCreateDBRequest {
                company_name: guest.company_name.clone(),
                contact_name: guest.contact_name.clone(),
                email: guest.email.clone(),
                phone: guest.phone.clone(),
                password_hash,
                is_verified: false,
                roles: vec![USER.to_string()],
            })
            .await?;
        Ok(Account {
            user,
            password: Some(password),
        })
    }

    async fn send_credentials(&self, steps: &mut Steps, guest: &GuestDBResponse, account: &Account) {
        let Some(password) = account.password.as_deref() else {
            steps.record_with(ApprovalStepName::SendCredentials, StepOutcome::Skipped, "no new password was generated");
            return;
        };
        match self.email.send_credentials(&guest.email, &guest.contact_name, password).await {
            Ok(()) => steps.record(ApprovalStepName::SendCredentials, StepOutcome::Succeeded),
            Err(e) => {
                warn!(error = %e, "Failed to send credentials email");
                steps.record_with(ApprovalStepName::SendCredentials, StepOutcome::Failed, e.user_message());
            }
        }
    }
}
