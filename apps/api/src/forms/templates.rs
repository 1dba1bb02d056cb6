//! The palette of question types an operator can drop into a draft.

use serde::Serialize;
use uuid::Uuid;

use crate::models::form::{FieldType, FormField, Scale};

/// A field definition without identity. Instantiated into a [`FormField`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldTemplate {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Scale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<u32>,
}

impl FieldTemplate {
    fn new(field_type: FieldType, label: &'static str) -> Self {
        FieldTemplate {
            field_type,
            label,
            required: false,
            placeholder: None,
            options: None,
            rows: None,
            columns: None,
            scale: None,
            max_rating: None,
        }
    }

    fn placeholder(mut self, placeholder: &'static str) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    fn options(mut self) -> Self {
        self.options = Some(numbered("Option", 2));
        self
    }

    fn grid(mut self) -> Self {
        self.rows = Some(numbered("Row", 2));
        self.columns = Some(numbered("Column", 3));
        self
    }
}

fn numbered(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{prefix} {i}")).collect()
}

/// Every template, in palette order.
pub fn templates() -> Vec<FieldTemplate> {
    use FieldType::*;

    let mut linear_scale = FieldTemplate::new(LinearScale, "Linear scale");
    linear_scale.scale = Some(Scale {
        min: 1,
        max: 5,
        min_label: Some("Poor".to_string()),
        max_label: Some("Excellent".to_string()),
    });

    let mut rating = FieldTemplate::new(Rating, "Rating");
    rating.max_rating = Some(5);

    vec![
        FieldTemplate::new(ShortText, "Short answer").placeholder("Type here..."),
        FieldTemplate::new(LongText, "Paragraph").placeholder("Describe your experience"),
        FieldTemplate::new(Email, "Email address").placeholder("applicant@example.com"),
        FieldTemplate::new(Number, "Numeric response").placeholder("0"),
        FieldTemplate::new(Dropdown, "Dropdown").options(),
        FieldTemplate::new(MultipleChoice, "Multiple choice").options(),
        FieldTemplate::new(Checkboxes, "Checkboxes").options(),
        FieldTemplate::new(FileUpload, "File upload"),
        linear_scale,
        rating,
        FieldTemplate::new(MultipleChoiceGrid, "Multiple choice grid").grid(),
        FieldTemplate::new(CheckboxGrid, "Checkbox grid").grid(),
        FieldTemplate::new(Date, "Date picker"),
        FieldTemplate::new(Time, "Time"),
    ]
}

pub fn template_for(field_type: FieldType) -> Option<FieldTemplate> {
    templates().into_iter().find(|t| t.field_type == field_type)
}

/// Creates a new question from a template with a fresh id.
pub fn instantiate(template: &FieldTemplate) -> FormField {
    FormField {
        id: Uuid::new_v4().to_string(),
        field_type: template.field_type,
        label: template.label.to_string(),
        required: template.required,
        placeholder: template.placeholder.map(str::to_string),
        options: template.options.clone(),
        helper_text: None,
        rows: template.rows.clone(),
        columns: template.columns.clone(),
        scale: template.scale.clone(),
        max_rating: template.max_rating,
    }
}
