use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::forms::validate_record;
use crate::models::form::{FormPatch, FormStatus, NewForm, PublishedForm};
use crate::models::submission::{FormSubmission, NewSubmission};
use crate::store::{form_not_found, submission_not_found, FormRepository, SubmissionRepository};

#[derive(Default)]
struct Tables {
    forms: Vec<PublishedForm>,
    submissions: Vec<FormSubmission>,
}

/// Process-local backend used for `STORAGE_BACKEND=memory` and in tests.
/// Forms and submissions share one lock so deletes cascade atomically.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut forms: Vec<PublishedForm>) -> Vec<PublishedForm> {
    forms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    forms
}

#[async_trait]
impl FormRepository for MemoryStore {
    async fn list_all(&self) -> Result<Vec<PublishedForm>, AppError> {
        Ok(newest_first(self.tables.read().await.forms.clone()))
    }

    async fn list_published(&self) -> Result<Vec<PublishedForm>, AppError> {
        let tables = self.tables.read().await;
        let published = tables
            .forms
            .iter()
            .filter(|f| f.status == FormStatus::Published)
            .cloned()
            .collect();
        Ok(newest_first(published))
    }

    async fn get(&self, id: Uuid) -> Result<PublishedForm, AppError> {
        let tables = self.tables.read().await;
        tables
            .forms
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| form_not_found(id))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<PublishedForm, AppError> {
        let tables = self.tables.read().await;
        tables
            .forms
            .iter()
            .find(|f| f.slug == slug)
            .cloned()
            .ok_or_else(|| form_not_found(format!("'{slug}'")))
    }

    async fn create(&self, form: NewForm) -> Result<PublishedForm, AppError> {
        let mut tables = self.tables.write().await;
        if tables.forms.iter().any(|f| f.slug == form.slug) {
            return Err(AppError::Conflict(format!("Slug '{}' is taken", form.slug)));
        }

        let now = Utc::now();
        let record = PublishedForm {
            id: Uuid::new_v4(),
            slug: form.slug,
            name: form.name,
            description: form.draft.description,
            status: FormStatus::Published,
            fields: form.draft.fields,
            theme: form.draft.theme,
            open_at: form.open_at,
            close_at: form.close_at,
            created_at: now,
            updated_at: now,
            version: 1,
            job: form.job,
        };
        validate_record(&record)?;
        tables.forms.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: FormPatch,
        expected_version: Option<i32>,
    ) -> Result<PublishedForm, AppError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .forms
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| form_not_found(id))?;

        if let Some(expected) = expected_version {
            if slot.version != expected {
                return Err(AppError::Conflict(format!(
                    "Form {id} is at version {}, not {expected}",
                    slot.version
                )));
            }
        }

        let mut updated = slot.clone();
        patch.apply_to(&mut updated);
        validate_record(&updated)?;
        updated.version += 1;
        updated.updated_at = Utc::now();
        *slot = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.forms.len();
        tables.forms.retain(|f| f.id != id);
        if tables.forms.len() == before {
            return Err(form_not_found(id));
        }
        tables.submissions.retain(|s| s.form_id != id);
        Ok(())
    }
}

#[async_trait]
impl SubmissionRepository for MemoryStore {
    async fn list(&self, form_id: Option<Uuid>) -> Result<Vec<FormSubmission>, AppError> {
        let tables = self.tables.read().await;
        let mut submissions: Vec<FormSubmission> = tables
            .submissions
            .iter()
            .filter(|s| form_id.map_or(true, |id| s.form_id == id))
            .map(|s| {
                let mut s = s.clone();
                s.form_name = tables
                    .forms
                    .iter()
                    .find(|f| f.id == s.form_id)
                    .map(|f| f.name.clone());
                s
            })
            .collect();
        submissions.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(submissions)
    }

    async fn get(&self, id: Uuid) -> Result<Option<FormSubmission>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn find_by_applicant(
        &self,
        form_id: Uuid,
        applicant_key: &str,
    ) -> Result<Option<FormSubmission>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .submissions
            .iter()
            .find(|s| s.form_id == form_id && s.applicant_key.as_deref() == Some(applicant_key))
            .cloned())
    }

    async fn insert(&self, submission: NewSubmission) -> Result<FormSubmission, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.forms.iter().any(|f| f.id == submission.form_id) {
            return Err(form_not_found(submission.form_id));
        }
        if let Some(key) = &submission.applicant_key {
            let taken = tables.submissions.iter().any(|s| {
                s.form_id == submission.form_id && s.applicant_key.as_ref() == Some(key)
            });
            if taken {
                return Err(AppError::DuplicateApplication { field_id: None });
            }
        }

        let record = FormSubmission {
            id: Uuid::new_v4(),
            form_id: submission.form_id,
            form_name: None,
            submitted_at: Utc::now(),
            values: submission.values,
            applicant_key: submission.applicant_key,
        };
        tables.submissions.push(record.clone());
        Ok(record)
    }

    async fn update_values(
        &self,
        id: Uuid,
        values: BTreeMap<String, String>,
    ) -> Result<FormSubmission, AppError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .submissions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| submission_not_found(id))?;
        slot.values.extend(values);
        Ok(slot.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.submissions.len();
        tables.submissions.retain(|s| s.id != id);
        if tables.submissions.len() == before {
            return Err(submission_not_found(id));
        }
        Ok(())
    }
}
