//! Persistence seams. Handlers and domain code only see these traits; the
//! backend is picked once at startup (`STORAGE_BACKEND`).

pub mod kv;
pub mod memory;
pub mod postgres;
pub mod retry;

use async_trait::async_trait;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::form::{FormPatch, NewForm, PublishedForm};
use crate::models::submission::{FormSubmission, NewSubmission};

#[async_trait]
pub trait FormRepository: Send + Sync {
    /// Every form, newest first.
    async fn list_all(&self) -> Result<Vec<PublishedForm>, AppError>;

    /// Forms whose status is `published`, newest first. Window is not checked.
    async fn list_published(&self) -> Result<Vec<PublishedForm>, AppError>;

    async fn get(&self, id: Uuid) -> Result<PublishedForm, AppError>;

    async fn get_by_slug(&self, slug: &str) -> Result<PublishedForm, AppError>;

    /// Inserts a new record with `status = published` and `version = 1`.
    async fn create(&self, form: NewForm) -> Result<PublishedForm, AppError>;

    /// Applies a partial patch. A stale `expected_version` fails with `Conflict`;
    /// without one the last write wins.
    async fn update(
        &self,
        id: Uuid,
        patch: FormPatch,
        expected_version: Option<i32>,
    ) -> Result<PublishedForm, AppError>;

    /// Deletes the form together with all of its submissions.
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Submissions newest first, optionally limited to one form.
    async fn list(&self, form_id: Option<Uuid>) -> Result<Vec<FormSubmission>, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<FormSubmission>, AppError>;

    async fn find_by_applicant(
        &self,
        form_id: Uuid,
        applicant_key: &str,
    ) -> Result<Option<FormSubmission>, AppError>;

    async fn insert(&self, submission: NewSubmission) -> Result<FormSubmission, AppError>;

    /// Overwrites the given stored values; keys not supplied are kept.
    async fn update_values(
        &self,
        id: Uuid,
        values: BTreeMap<String, String>,
    ) -> Result<FormSubmission, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

pub(crate) fn form_not_found(key: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("Form {key} not found"))
}

pub(crate) fn submission_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Submission {id} not found"))
}
