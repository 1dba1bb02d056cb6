use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::forms::validate_record;
use crate::models::form::{FormPatch, FormRow, NewForm, PublishedForm};
use crate::models::submission::{FormSubmission, NewSubmission, SubmissionRow};
use crate::store::retry::with_retry;
use crate::store::{form_not_found, submission_not_found, FormRepository, SubmissionRepository};

const FORM_COLUMNS: &str = r#"
    id, slug, name, description, status, fields, theme, open_at, close_at,
    created_at, updated_at, version, job_type, department, location, experience,
    skills, seo_title, seo_description, seo_keywords
"#;

const SUBMISSION_SELECT: &str = r#"
    SELECT s.id, s.form_id, f.name AS form_name, s.submitted_at, s.answers, s.applicant_key
    FROM submissions s
    LEFT JOIN forms f ON f.id = s.form_id
"#;

/// Forms and submissions stored in PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One attempt at a form update. A failed attempt rolls back when the
    /// transaction is dropped, so the whole body can be retried.
    async fn update_in_tx(
        &self,
        id: Uuid,
        patch: FormPatch,
        expected_version: Option<i32>,
    ) -> Result<PublishedForm, AppError> {
        // Read-modify-write under a row lock so the version check and the
        // write see the same row.
        let mut tx = self.pool.begin().await?;

        let current: Option<FormRow> =
            sqlx::query_as(&format!("SELECT {FORM_COLUMNS} FROM forms WHERE id = $1 FOR UPDATE"))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let mut form: PublishedForm = current.ok_or_else(|| form_not_found(id))?.into();

        if let Some(expected) = expected_version {
            if form.version != expected {
                return Err(AppError::Conflict(format!(
                    "Form {id} is at version {}, not {expected}",
                    form.version
                )));
            }
        }

        patch.apply_to(&mut form);
        validate_record(&form)?;

        let row: FormRow = sqlx::query_as(&format!(
            r#"
            UPDATE forms SET
                name = $2, description = $3, status = $4, fields = $5, theme = $6,
                open_at = $7, close_at = $8, job_type = $9, department = $10,
                location = $11, experience = $12, skills = $13, seo_title = $14,
                seo_description = $15, seo_keywords = $16,
                version = version + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING {FORM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&form.name)
        .bind(&form.description)
        .bind(form.status.as_str())
        .bind(Json(&form.fields))
        .bind(form.theme.as_ref().map(Json))
        .bind(form.open_at)
        .bind(form.close_at)
        .bind(&form.job.job_type)
        .bind(&form.job.department)
        .bind(&form.job.location)
        .bind(&form.job.experience)
        .bind(&form.job.skills)
        .bind(&form.job.seo_title)
        .bind(&form.job.seo_description)
        .bind(&form.job.seo_keywords)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Updated form {id} to version {}", row.version);
        Ok(row.into())
    }

    async fn delete_in_tx(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM submissions WHERE form_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM forms WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(form_not_found(id));
        }

        tx.commit().await?;
        info!("Deleted form {id} and {removed} submission(s)");
        Ok(())
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

const SUBMISSION_PKEY: &str = "submissions_pkey";

#[derive(Debug, PartialEq, Eq)]
enum InsertFailure {
    /// The one-per-applicant index rejected the row.
    DuplicateApplicant,
    /// The primary key already exists: a retried insert whose first attempt committed.
    AlreadyStored,
    UnknownForm,
    Other,
}

fn classify_insert_error(error: &sqlx::Error) -> InsertFailure {
    let sqlx::Error::Database(db) = error else {
        return InsertFailure::Other;
    };
    if db.is_foreign_key_violation() {
        InsertFailure::UnknownForm
    } else if db.is_unique_violation() && db.constraint() == Some(SUBMISSION_PKEY) {
        InsertFailure::AlreadyStored
    } else if db.is_unique_violation() {
        InsertFailure::DuplicateApplicant
    } else {
        InsertFailure::Other
    }
}

#[async_trait]
impl FormRepository for PgStore {
    async fn list_all(&self) -> Result<Vec<PublishedForm>, AppError> {
        let pool = &self.pool;
        let sql = format!("SELECT {FORM_COLUMNS} FROM forms ORDER BY created_at DESC");
        let rows = with_retry("list forms", || {
            sqlx::query_as::<_, FormRow>(&sql).fetch_all(pool)
        })
        .await?;
        Ok(rows.into_iter().map(PublishedForm::from).collect())
    }

    async fn list_published(&self) -> Result<Vec<PublishedForm>, AppError> {
        let pool = &self.pool;
        let sql = format!(
            "SELECT {FORM_COLUMNS} FROM forms WHERE status = 'published' ORDER BY created_at DESC"
        );
        let rows = with_retry("list published forms", || {
            sqlx::query_as::<_, FormRow>(&sql).fetch_all(pool)
        })
        .await?;
        Ok(rows.into_iter().map(PublishedForm::from).collect())
    }

    async fn get(&self, id: Uuid) -> Result<PublishedForm, AppError> {
        let pool = &self.pool;
        let sql = format!("SELECT {FORM_COLUMNS} FROM forms WHERE id = $1");
        let row = with_retry("get form", || {
            sqlx::query_as::<_, FormRow>(&sql).bind(id).fetch_optional(pool)
        })
        .await?;
        row.map(PublishedForm::from).ok_or_else(|| form_not_found(id))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<PublishedForm, AppError> {
        let pool = &self.pool;
        let sql = format!("SELECT {FORM_COLUMNS} FROM forms WHERE slug = $1");
        let row = with_retry("get form by slug", || {
            sqlx::query_as::<_, FormRow>(&sql).bind(slug).fetch_optional(pool)
        })
        .await?;
        row.map(PublishedForm::from)
            .ok_or_else(|| form_not_found(format!("'{slug}'")))
    }

    async fn create(&self, form: NewForm) -> Result<PublishedForm, AppError> {
        let pool = &self.pool;
        let sql = format!(
            r#"
            INSERT INTO forms
                (id, slug, name, description, status, fields, theme, open_at, close_at,
                 job_type, department, location, experience, skills,
                 seo_title, seo_description, seo_keywords)
            VALUES ($1, $2, $3, $4, 'published', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {FORM_COLUMNS}
            "#
        );
        let id = Uuid::new_v4();
        let NewForm {
            draft,
            name,
            slug,
            open_at,
            close_at,
            job,
        } = &form;

        let row = with_retry("create form", || {
            sqlx::query_as::<_, FormRow>(&sql)
                .bind(id)
                .bind(slug)
                .bind(name)
                .bind(&draft.description)
                .bind(Json(&draft.fields))
                .bind(draft.theme.as_ref().map(Json))
                .bind(open_at)
                .bind(close_at)
                .bind(&job.job_type)
                .bind(&job.department)
                .bind(&job.location)
                .bind(&job.experience)
                .bind(&job.skills)
                .bind(&job.seo_title)
                .bind(&job.seo_description)
                .bind(&job.seo_keywords)
                .fetch_one(pool)
        })
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Slug '{slug}' is taken"))
            } else {
                AppError::Database(e)
            }
        })?;

        info!("Created form {id} ({slug})");
        Ok(row.into())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: FormPatch,
        expected_version: Option<i32>,
    ) -> Result<PublishedForm, AppError> {
        with_retry("update form", || {
            self.update_in_tx(id, patch.clone(), expected_version)
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        with_retry("delete form", || self.delete_in_tx(id)).await
    }
}

#[async_trait]
impl SubmissionRepository for PgStore {
    async fn list(&self, form_id: Option<Uuid>) -> Result<Vec<FormSubmission>, AppError> {
        let pool = &self.pool;
        let sql = format!(
            "{SUBMISSION_SELECT} WHERE ($1::uuid IS NULL OR s.form_id = $1) ORDER BY s.submitted_at DESC"
        );
        let rows = with_retry("list submissions", || {
            sqlx::query_as::<_, SubmissionRow>(&sql)
                .bind(form_id)
                .fetch_all(pool)
        })
        .await?;
        Ok(rows.into_iter().map(FormSubmission::from).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FormSubmission>, AppError> {
        let pool = &self.pool;
        let sql = format!("{SUBMISSION_SELECT} WHERE s.id = $1");
        let row = with_retry("get submission", || {
            sqlx::query_as::<_, SubmissionRow>(&sql)
                .bind(id)
                .fetch_optional(pool)
        })
        .await?;
        Ok(row.map(FormSubmission::from))
    }

    async fn find_by_applicant(
        &self,
        form_id: Uuid,
        applicant_key: &str,
    ) -> Result<Option<FormSubmission>, AppError> {
        let pool = &self.pool;
        let sql = format!("{SUBMISSION_SELECT} WHERE s.form_id = $1 AND s.applicant_key = $2");
        let row = with_retry("find submission by applicant", || {
            sqlx::query_as::<_, SubmissionRow>(&sql)
                .bind(form_id)
                .bind(applicant_key)
                .fetch_optional(pool)
        })
        .await?;
        Ok(row.map(FormSubmission::from))
    }

    async fn insert(&self, submission: NewSubmission) -> Result<FormSubmission, AppError> {
        let pool = &self.pool;
        let id = Uuid::new_v4();
        let inserted = with_retry("insert submission", || {
            sqlx::query_as::<_, SubmissionRow>(
                r#"
                INSERT INTO submissions (id, form_id, answers, applicant_key)
                VALUES ($1, $2, $3, $4)
                RETURNING id, form_id, NULL::text AS form_name, submitted_at, answers, applicant_key
                "#,
            )
            .bind(id)
            .bind(submission.form_id)
            .bind(Json(&submission.values))
            .bind(&submission.applicant_key)
            .fetch_one(pool)
        })
        .await;

        let stored: FormSubmission = match inserted {
            Ok(row) => row.into(),
            Err(e) => match classify_insert_error(&e) {
                InsertFailure::DuplicateApplicant => {
                    return Err(AppError::DuplicateApplication { field_id: None })
                }
                InsertFailure::UnknownForm => return Err(form_not_found(submission.form_id)),
                InsertFailure::AlreadyStored => {
                    warn!("Submission {id} was stored by an earlier attempt");
                    SubmissionRepository::get(self, id)
                        .await?
                        .ok_or(AppError::Database(e))?
                }
                InsertFailure::Other => return Err(AppError::Database(e)),
            },
        };

        info!("Stored submission {id} for form {}", submission.form_id);
        Ok(stored)
    }

    async fn update_values(
        &self,
        id: Uuid,
        values: BTreeMap<String, String>,
    ) -> Result<FormSubmission, AppError> {
        let pool = &self.pool;
        // jsonb `||` keeps keys that are not part of the edit.
        let updated = with_retry("update submission", || {
            sqlx::query("UPDATE submissions SET answers = answers || $2 WHERE id = $1")
                .bind(id)
                .bind(Json(&values))
                .execute(pool)
        })
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(submission_not_found(id));
        }

        SubmissionRepository::get(self, id)
            .await?
            .ok_or_else(|| submission_not_found(id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let pool = &self.pool;
        let deleted = with_retry("delete submission", || {
            sqlx::query("DELETE FROM submissions WHERE id = $1")
                .bind(id)
                .execute(pool)
        })
        .await?
        .rows_affected();
        if deleted == 0 {
            return Err(submission_not_found(id));
        }
        info!("Deleted submission {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::fmt;

    #[derive(Debug)]
    struct ConstraintError {
        unique: bool,
        constraint: &'static str,
    }

    impl fmt::Display for ConstraintError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "violates constraint {}", self.constraint)
        }
    }

    impl std::error::Error for ConstraintError {}

    impl DatabaseError for ConstraintError {
        fn message(&self) -> &str {
            "constraint violation"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::ForeignKeyViolation
            }
        }
    }

    fn violation(unique: bool, constraint: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(ConstraintError { unique, constraint }))
    }

    #[test]
    fn test_primary_key_clash_means_earlier_attempt_committed() {
        assert_eq!(
            classify_insert_error(&violation(true, SUBMISSION_PKEY)),
            InsertFailure::AlreadyStored
        );
    }

    #[test]
    fn test_applicant_index_clash_is_a_duplicate() {
        assert_eq!(
            classify_insert_error(&violation(true, "submissions_one_per_applicant")),
            InsertFailure::DuplicateApplicant
        );
    }

    #[test]
    fn test_missing_form_and_other_errors() {
        assert_eq!(
            classify_insert_error(&violation(false, "submissions_form_id_fkey")),
            InsertFailure::UnknownForm
        );
        assert_eq!(
            classify_insert_error(&sqlx::Error::PoolTimedOut),
            InsertFailure::Other
        );
    }
}
