use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::form::{FieldType, FormField};

/// A candidate's answer to one question, as sent by the client.
///
/// Stored answers are plain strings; [`Answer::to_stored`] is the only place
/// the two shapes meet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Choices(Vec<String>),
    Grid(BTreeMap<String, String>),
    CheckboxGrid(BTreeMap<String, Vec<String>>),
}

impl Answer {
    /// Whether this answer leaves `field` unanswered.
    ///
    /// Grid questions count as unanswered as soon as one of their rows is.
    pub fn is_missing_for(&self, field: &FormField) -> bool {
        match (field.field_type, self) {
            (FieldType::MultipleChoiceGrid, Answer::Grid(map)) => field
                .rows()
                .iter()
                .any(|row| map.get(row).map_or(true, |col| col.is_empty())),
            (FieldType::CheckboxGrid, Answer::CheckboxGrid(map)) => field
                .rows()
                .iter()
                .any(|row| map.get(row).map_or(true, |cols| cols.is_empty())),
            // An empty object deserializes as `Grid`.
            (FieldType::CheckboxGrid, Answer::Grid(map)) => {
                !field.rows().is_empty() || !map.is_empty()
            }
            (FieldType::MultipleChoiceGrid | FieldType::CheckboxGrid, _) => true,
            (_, Answer::Text(text)) => text.is_empty(),
            (_, Answer::Choices(items)) => items.is_empty(),
            (_, Answer::Grid(map)) => map.is_empty(),
            (_, Answer::CheckboxGrid(map)) => map.is_empty(),
        }
    }

    /// Whether this answer has the shape `field_type` expects.
    pub fn fits(&self, field_type: FieldType) -> bool {
        match field_type {
            FieldType::Checkboxes => matches!(self, Answer::Choices(_)),
            FieldType::MultipleChoiceGrid => matches!(self, Answer::Grid(_)),
            // An empty object deserializes as `Grid`.
            FieldType::CheckboxGrid => match self {
                Answer::CheckboxGrid(_) => true,
                Answer::Grid(map) => map.is_empty(),
                _ => false,
            },
            _ => matches!(self, Answer::Text(_)),
        }
    }

    /// Serialized form kept in the submission store and used by exports.
    pub fn to_stored(&self) -> String {
        match self {
            Answer::Text(text) => text.clone(),
            Answer::Choices(items) => items.join(", "),
            Answer::Grid(map) => serde_json::to_string(map).unwrap_or_default(),
            Answer::CheckboxGrid(map) => serde_json::to_string(map).unwrap_or_default(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Answer::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Serializes the answers of every field of a form, in field order.
/// Unanswered fields are stored as empty strings.
pub fn serialize_answers(
    fields: &[FormField],
    answers: &BTreeMap<String, Answer>,
) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|field| {
            let stored = answers
                .get(&field.id)
                .map(Answer::to_stored)
                .unwrap_or_default();
            (field.id.clone(), stored)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormSubmission {
    pub id: Uuid,
    pub form_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_name: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub values: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub form_id: Uuid,
    pub values: BTreeMap<String, String>,
    pub applicant_key: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SubmissionRow {
    pub id: Uuid,
    pub form_id: Uuid,
    pub form_name: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub answers: Json<BTreeMap<String, String>>,
    pub applicant_key: Option<String>,
}

impl From<SubmissionRow> for FormSubmission {
    fn from(row: SubmissionRow) -> Self {
        FormSubmission {
            id: row.id,
            form_id: row.form_id,
            form_name: row.form_name,
            submitted_at: row.submitted_at,
            values: row.answers.0,
            applicant_key: row.applicant_key,
        }
    }
}

/// Normalizes an email answer into the key used for duplicate detection.
pub fn applicant_key_from(email: &str) -> Option<String> {
    let key = email.trim().to_lowercase();
    (!key.is_empty()).then_some(key)
}
