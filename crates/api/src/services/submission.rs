//! Public submission pipeline: intake, email verification and propagation.
//!
//! Handlers apply the per-client attempt limit before calling in here; this
//! service only deals with forms, codes and target tables.

use chrono::Utc;
use domain::models::email_validation::{
    ResendCodeRequest, ResendCodeResponse, ValidateEmailRequest, ValidateEmailResponse,
};
use domain::models::submission::{PropagateResponse, SubmitFormRequest, SubmitFormResponse};
use domain::models::{EmailValidation, FieldMapping, Form, Submission, SubmissionStatus};
use domain::services::{
    check_propagation_eligibility, check_resend, code_expires_at, plan_propagation,
    validate_submission, PropagationError, TableWrite,
};
use persistence::repositories::{
    EmailValidationRepository, FormRepository, SubmissionRepository, TargetTableRepository,
};
use serde_json::Value;
use shared::crypto::{generate_validation_code, hash_validation_code};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::config::Config;
use crate::error::ApiError;
use crate::middleware::metrics::{
    record_email_verification, record_form_submission, record_propagation,
    record_sql_guard_rejection, record_validation_code_sent,
};
use crate::services::email::{validation_code_message, EmailDispatcher, ValidationCodeEmail};

/// Orchestrates a form submission from intake to target tables.
#[derive(Clone)]
pub struct SubmissionService {
    forms: FormRepository,
    submissions: SubmissionRepository,
    validations: EmailValidationRepository,
    targets: TargetTableRepository,
    email: Arc<dyn EmailDispatcher>,
    config: Arc<Config>,
}

impl SubmissionService {
    pub fn new(pool: PgPool, config: Arc<Config>, email: Arc<dyn EmailDispatcher>) -> Self {
        Self {
            forms: FormRepository::new(pool.clone()),
            submissions: SubmissionRepository::new(pool.clone()),
            validations: EmailValidationRepository::new(pool.clone()),
            targets: TargetTableRepository::new(pool),
            email,
            config,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.pool.clone(), state.config.clone(), state.email.clone())
    }

    /// Loads a form by its public widget code. Inactive forms are refused.
    pub async fn active_form(&self, widget_code: &str) -> Result<Form, ApiError> {
        let entity = self
            .forms
            .find_by_widget_code(widget_code)
            .await?
            .ok_or_else(|| ApiError::NotFound("Form not found".to_string()))?;

        if !entity.is_active {
            return Err(ApiError::Forbidden("Form is not active".to_string()));
        }

        let fields = self.forms.find_fields(entity.id).await?;
        Ok(entity.into_form(fields))
    }

    async fn form_by_id(&self, form_id: Uuid) -> Result<Form, ApiError> {
        let entity = self
            .forms
            .find_by_id(form_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Form not found".to_string()))?;
        let fields = self.forms.find_fields(entity.id).await?;
        Ok(entity.into_form(fields))
    }

    async fn mappings(&self, form_id: Uuid) -> Result<Vec<FieldMapping>, ApiError> {
        Ok(self
            .forms
            .find_mappings(form_id)
            .await?
            .into_iter()
            .map(FieldMapping::from)
            .collect())
    }

    async fn submission(&self, submission_id: Uuid) -> Result<Submission, ApiError> {
        self.submissions
            .find_by_id(submission_id)
            .await?
            .map(Submission::from)
            .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))
    }

    /// Accepts a public submission.
    ///
    /// Values are validated and cleaned before anything is stored. Forms with
    /// email validation get a code dispatched and stay `pending`; forms
    /// without it propagate straight away.
    pub async fn submit(
        &self,
        widget_code: &str,
        request: SubmitFormRequest,
    ) -> Result<SubmitFormResponse, ApiError> {
        let form = self.active_form(widget_code).await?;
        let cleaned = validate_submission(&form.fields, &request.data)?;

        let email = request
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .or_else(|| {
                form.email_field_key()
                    .and_then(|key| cleaned.get(key))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });

        let mode = form.email_validation_mode;
        if mode.requires_verification() && email.is_none() {
            return Err(ApiError::Validation(
                "An email address is required to submit this form".to_string(),
            ));
        }

        let mappings = self.mappings(form.id).await?;
        let plan = plan_propagation(form.target_module, &mappings, &cleaned)
            .map_err(|e| planning_error(&form, e))?;

        let submission: Submission = self
            .submissions
            .create(form.id, email.as_deref(), &cleaned)
            .await?
            .into();
        record_form_submission(mode.as_str());

        info!(
            submission_id = %submission.id,
            form_id = %form.id,
            mode = %mode,
            "Form submission accepted"
        );

        if let (true, Some(address)) = (mode.requires_verification(), email.as_deref()) {
            self.issue_code(&submission, address, &form.name).await?;
            return Ok(SubmitFormResponse {
                submission_id: submission.id,
                status: SubmissionStatus::Pending,
                email_validation_required: true,
            });
        }

        let status = self.propagate_quietly(submission.id, &plan).await;

        Ok(SubmitFormResponse {
            submission_id: submission.id,
            status,
            email_validation_required: false,
        })
    }

    /// Issues a fresh code for a submission still awaiting verification.
    ///
    /// Earlier codes stay valid until they expire.
    pub async fn resend_code(
        &self,
        request: ResendCodeRequest,
    ) -> Result<ResendCodeResponse, ApiError> {
        let submission = self.submission(request.submission_id).await?;
        let form = self.form_by_id(submission.form_id).await?;

        let email = request.email.trim();
        check_resend(&submission, email)?;

        let expires_at = self.issue_code(&submission, email, &form.name).await?;
        Ok(ResendCodeResponse {
            sent: true,
            expires_at,
        })
    }

    /// Consumes a validation code.
    ///
    /// On success the submission moves to `validated` and, when the form has
    /// mappings, is propagated. A propagation failure leaves it `validated`
    /// for an operator retry.
    pub async fn verify_email(
        &self,
        request: ValidateEmailRequest,
    ) -> Result<ValidateEmailResponse, ApiError> {
        let email = request.email.trim();
        let code_hash = hash_validation_code(request.submission_id, request.code.trim());

        let Some(entity) = self
            .validations
            .verify(request.submission_id, email, &code_hash)
            .await?
        else {
            record_email_verification("rejected");
            warn!(submission_id = %request.submission_id, "Validation code rejected");
            return Err(ApiError::Validation(
                "Invalid or expired validation code".to_string(),
            ));
        };
        record_email_verification("verified");

        let submission = Submission::from(entity);
        info!(submission_id = %submission.id, "Submission email verified");

        let form = self.form_by_id(submission.form_id).await?;
        let mut status = submission.status;

        if check_propagation_eligibility(
            form.email_validation_mode,
            submission.status,
            submission.email_validated_at,
        )
        .is_ok()
        {
            let mappings = self.mappings(form.id).await?;
            if !mappings.is_empty() {
                match plan_propagation(form.target_module, &mappings, &submission.data) {
                    Ok(plan) => status = self.propagate_quietly(submission.id, &plan).await,
                    Err(e) => {
                        warn!(
                            submission_id = %submission.id,
                            error = %e,
                            "Mappings no longer apply; propagation left for operator retry"
                        );
                    }
                }
            }
        }

        Ok(ValidateEmailResponse {
            submission_id: submission.id,
            status,
            email_validated_at: submission.email_validated_at,
        })
    }

    /// Writes an eligible submission's mapped values to its target tables.
    pub async fn propagate(&self, submission_id: Uuid) -> Result<PropagateResponse, ApiError> {
        let submission = self.submission(submission_id).await?;
        let form = self.form_by_id(submission.form_id).await?;

        check_propagation_eligibility(
            form.email_validation_mode,
            submission.status,
            submission.email_validated_at,
        )?;

        let mappings = self.mappings(form.id).await?;
        let plan = plan_propagation(form.target_module, &mappings, &submission.data)
            .map_err(|e| planning_error(&form, e))?;

        let tables_written = match self
            .targets
            .propagate(
                submission.id,
                &plan,
                self.config.forms.propagation_timeout_ms,
            )
            .await
        {
            Ok(written) => written,
            Err(e) => {
                record_propagation("failed");
                return Err(e.into());
            }
        };
        record_propagation("processed");

        Ok(PropagateResponse {
            submission_id: submission.id,
            status: SubmissionStatus::Processed,
            tables_written,
        })
    }

    /// Propagates without failing the caller; returns the resulting status.
    async fn propagate_quietly(&self, submission_id: Uuid, plan: &[TableWrite]) -> SubmissionStatus {
        match self
            .targets
            .propagate(submission_id, plan, self.config.forms.propagation_timeout_ms)
            .await
        {
            Ok(_) => {
                record_propagation("processed");
                SubmissionStatus::Processed
            }
            Err(e) => {
                record_propagation("failed");
                error!(
                    submission_id = %submission_id,
                    error = %e,
                    "Propagation failed; submission kept for retry"
                );
                // The store rolled back, so the stored status is unchanged.
                match self.submissions.find_by_id(submission_id).await {
                    Ok(Some(entity)) => Submission::from(entity).status,
                    _ => SubmissionStatus::Pending,
                }
            }
        }
    }

    /// Stores a new code hash and mails the code. Returns the code's expiry.
    async fn issue_code(
        &self,
        submission: &Submission,
        email: &str,
        form_name: &str,
    ) -> Result<chrono::DateTime<Utc>, ApiError> {
        let code = generate_validation_code();
        let record: EmailValidation = self
            .validations
            .create(
                submission.id,
                email,
                &hash_validation_code(submission.id, &code),
                code_expires_at(Utc::now(), self.config.forms.validation_code_ttl_minutes),
            )
            .await?
            .into();
        let expires_at = record.expires_at;

        let message = validation_code_message(
            &self.config.email,
            &ValidationCodeEmail {
                to: email,
                form_name,
                code: &code,
                expires_at,
            },
        );

        if let Err(e) = self.email.send(message).await {
            return Err(ApiError::DeliveryFailed(format!(
                "validation code for submission {}: {}",
                submission.id, e
            )));
        }

        record_validation_code_sent();
        info!(
            submission_id = %submission.id,
            validation_id = %record.id,
            expires_at = %expires_at,
            "Validation code sent"
        );
        Ok(expires_at)
    }
}

fn planning_error(form: &Form, err: PropagationError) -> ApiError {
    if matches!(err, PropagationError::UnsafeSql { .. }) {
        record_sql_guard_rejection("propagation");
    }
    warn!(form_id = %form.id, error = %err, "Submission rejected by form mappings");
    err.into()
}
