use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    ShortText,
    LongText,
    Email,
    Number,
    Dropdown,
    MultipleChoice,
    Checkboxes,
    FileUpload,
    LinearScale,
    Rating,
    MultipleChoiceGrid,
    CheckboxGrid,
    Date,
    Time,
}

impl FieldType {
    /// Fields whose answer is picked from `options`.
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            FieldType::Dropdown | FieldType::MultipleChoice | FieldType::Checkboxes
        )
    }

    pub fn is_grid(self) -> bool {
        matches!(self, FieldType::MultipleChoiceGrid | FieldType::CheckboxGrid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scale {
    pub min: i32,
    pub max: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormField {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Scale>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<u32>,
}

impl FormField {
    pub fn rows(&self) -> &[String] {
        self.rows.as_deref().unwrap_or_default()
    }

    /// Returns a message when the field is not fit to be published.
    pub fn publish_problem(&self) -> Option<String> {
        let empty = |list: &Option<Vec<String>>| list.as_ref().map_or(true, |l| l.is_empty());

        if self.field_type.is_choice() && empty(&self.options) {
            return Some(format!("'{}' needs at least one option", self.label));
        }
        if self.field_type.is_grid() && (empty(&self.rows) || empty(&self.columns)) {
            return Some(format!("'{}' needs at least one row and one column", self.label));
        }
        if let Some(scale) = &self.scale {
            if scale.min >= scale.max {
                return Some(format!("'{}' has a scale whose min is not below its max", self.label));
            }
        }
        None
    }
}

/// Partial edit of a single field. Only supplied keys change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldPatch {
    pub label: Option<String>,
    pub required: Option<bool>,
    pub placeholder: Option<String>,
    pub options: Option<Vec<String>>,
    pub helper_text: Option<String>,
    pub rows: Option<Vec<String>>,
    pub columns: Option<Vec<String>>,
    pub scale: Option<Scale>,
    pub max_rating: Option<u32>,
}

impl FieldPatch {
    pub fn apply_to(self, field: &mut FormField) {
        if let Some(label) = self.label {
            field.label = label;
        }
        if let Some(required) = self.required {
            field.required = required;
        }
        if self.placeholder.is_some() {
            field.placeholder = self.placeholder;
        }
        if self.options.is_some() {
            field.options = self.options;
        }
        if self.helper_text.is_some() {
            field.helper_text = self.helper_text;
        }
        if self.rows.is_some() {
            field.rows = self.rows;
        }
        if self.columns.is_some() {
            field.columns = self.columns;
        }
        if self.scale.is_some() {
            field.scale = self.scale;
        }
        if self.max_rating.is_some() {
            field.max_rating = self.max_rating;
        }
    }
}

/// Presentational settings carried alongside a form. Never interpreted by the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormTheme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_text: Option<String>,
}

pub const DEFAULT_DRAFT_TITLE: &str = "Untitled internship form";
pub const DEFAULT_DRAFT_DESCRIPTION: &str =
    "Collect candidate details for your internship program.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftForm {
    pub title: String,
    pub description: String,
    pub fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<FormTheme>,
}

impl Default for DraftForm {
    fn default() -> Self {
        DraftForm {
            title: DEFAULT_DRAFT_TITLE.to_string(),
            description: DEFAULT_DRAFT_DESCRIPTION.to_string(),
            fields: Vec::new(),
            theme: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    Published,
    Unpublished,
}

impl FormStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FormStatus::Published => "published",
            FormStatus::Unpublished => "unpublished",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "published" => Some(FormStatus::Published),
            "unpublished" => Some(FormStatus::Unpublished),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            FormStatus::Published => FormStatus::Unpublished,
            FormStatus::Unpublished => FormStatus::Published,
        }
    }
}

/// Job posting details shown next to a form in the public listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo_keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishedForm {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub status: FormStatus,
    pub fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<FormTheme>,
    pub open_at: DateTime<Utc>,
    pub close_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
    #[serde(flatten)]
    pub job: JobMetadata,
}

impl PublishedForm {
    /// The first email question, whose answer identifies the applicant.
    pub fn email_field(&self) -> Option<&FormField> {
        self.fields.iter().find(|f| f.field_type == FieldType::Email)
    }
}

/// Everything needed to insert a freshly published form.
#[derive(Debug, Clone)]
pub struct NewForm {
    pub draft: DraftForm,
    pub name: String,
    pub slug: String,
    pub open_at: DateTime<Utc>,
    pub close_at: DateTime<Utc>,
    pub job: JobMetadata,
}

/// Admin edit of a form record. Only supplied keys change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<FormStatus>,
    pub fields: Option<Vec<FormField>>,
    pub theme: Option<FormTheme>,
    pub open_at: Option<DateTime<Utc>>,
    pub close_at: Option<DateTime<Utc>>,
    pub job_type: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub experience: Option<String>,
    pub skills: Option<Vec<String>>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<Vec<String>>,
}

impl FormPatch {
    pub fn status(status: FormStatus) -> Self {
        FormPatch {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply_to(self, form: &mut PublishedForm) {
        if let Some(name) = self.name {
            form.name = name;
        }
        if let Some(description) = self.description {
            form.description = description;
        }
        if let Some(status) = self.status {
            form.status = status;
        }
        if let Some(fields) = self.fields {
            form.fields = fields;
        }
        if self.theme.is_some() {
            form.theme = self.theme;
        }
        if let Some(open_at) = self.open_at {
            form.open_at = open_at;
        }
        if let Some(close_at) = self.close_at {
            form.close_at = close_at;
        }
        let job = &mut form.job;
        if self.job_type.is_some() {
            job.job_type = self.job_type;
        }
        if self.department.is_some() {
            job.department = self.department;
        }
        if self.location.is_some() {
            job.location = self.location;
        }
        if self.experience.is_some() {
            job.experience = self.experience;
        }
        if self.skills.is_some() {
            job.skills = self.skills;
        }
        if self.seo_title.is_some() {
            job.seo_title = self.seo_title;
        }
        if self.seo_description.is_some() {
            job.seo_description = self.seo_description;
        }
        if self.seo_keywords.is_some() {
            job.seo_keywords = self.seo_keywords;
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FormRow {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub fields: Json<Vec<FormField>>,
    pub theme: Option<Json<FormTheme>>,
    pub open_at: DateTime<Utc>,
    pub close_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
    pub job_type: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub experience: Option<String>,
    pub skills: Option<Vec<String>>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<Vec<String>>,
}

impl From<FormRow> for PublishedForm {
    fn from(row: FormRow) -> Self {
        PublishedForm {
            id: row.id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            // Anything other than an explicit "published" hides the form.
            status: FormStatus::parse(&row.status).unwrap_or(FormStatus::Unpublished),
            fields: row.fields.0,
            theme: row.theme.map(|t| t.0),
            open_at: row.open_at,
            close_at: row.close_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
            job: JobMetadata {
                job_type: row.job_type,
                department: row.department,
                location: row.location,
                experience: row.experience,
                skills: row.skills,
                seo_title: row.seo_title,
                seo_description: row.seo_description,
                seo_keywords: row.seo_keywords,
            },
        }
    }
}
