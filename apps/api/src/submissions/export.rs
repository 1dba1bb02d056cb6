//! Read-only views of a form's submissions for download. All three exports
//! share one column order: the form's fields as they appear in the form.

use chrono::{DateTime, Local, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::errors::AppError;
use crate::models::form::PublishedForm;
use crate::models::submission::FormSubmission;

pub const DATE_COLUMN: &str = "Date";
pub const SHEET_NAME: &str = "Submissions";

#[derive(Debug, Clone, Serialize)]
pub struct CsvExport {
    pub filename: String,
    pub content: String,
}

/// One spreadsheet row. Serializes as a JSON object whose keys keep column order.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow(pub Vec<(String, String)>);

impl Serialize for SheetRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in &self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadsheetExport {
    pub filename: String,
    pub sheet_name: String,
    pub rows: Vec<SheetRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfTable {
    pub filename: String,
    pub head: Vec<String>,
    pub body: Vec<Vec<String>>,
}

/// Submission time as shown to admins, e.g. `3/14/2025, 9:05:00 AM`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}

fn labels(form: &PublishedForm) -> Vec<String> {
    form.fields.iter().map(|f| f.label.clone()).collect()
}

fn cells(form: &PublishedForm, submission: &FormSubmission) -> Vec<String> {
    form.fields
        .iter()
        .map(|f| submission.values.get(&f.id).cloned().unwrap_or_default())
        .collect()
}

pub fn to_csv(
    form: &PublishedForm,
    submissions: &[FormSubmission],
) -> Result<Option<CsvExport>, AppError> {
    if submissions.is_empty() {
        return Ok(None);
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(labels(form))
        .map_err(|e| AppError::Internal(e.into()))?;
    for submission in submissions {
        writer
            .write_record(cells(form, submission))
            .map_err(|e| AppError::Internal(e.into()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV flush failed: {e}")))?;
    let content = String::from_utf8(bytes).map_err(|e| AppError::Internal(e.into()))?;

    Ok(Some(CsvExport {
        filename: format!("{}-submissions.csv", form.slug),
        content,
    }))
}

pub fn to_spreadsheet(
    form: &PublishedForm,
    submissions: &[FormSubmission],
) -> Option<SpreadsheetExport> {
    if submissions.is_empty() {
        return None;
    }

    let rows = submissions
        .iter()
        .map(|submission| {
            let mut row = vec![(DATE_COLUMN.to_string(), format_timestamp(submission.submitted_at))];
            row.extend(labels(form).into_iter().zip(cells(form, submission)));
            SheetRow(row)
        })
        .collect();

    Some(SpreadsheetExport {
        filename: format!("{}-submissions.xlsx", form.slug),
        sheet_name: SHEET_NAME.to_string(),
        rows,
    })
}

pub fn to_pdf_table(form: &PublishedForm, submissions: &[FormSubmission]) -> Option<PdfTable> {
    if submissions.is_empty() {
        return None;
    }

    let mut head = vec![DATE_COLUMN.to_string()];
    head.extend(labels(form));

    let body = submissions
        .iter()
        .map(|submission| {
            let mut row = vec![format_timestamp(submission.submitted_at)];
            row.extend(cells(form, submission));
            row
        })
        .collect();

    Some(PdfTable {
        filename: format!("{}-submissions.pdf", form.slug),
        head,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::testing::{field, published_form};
    use crate::models::form::FieldType;
    use chrono::Duration;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn form() -> PublishedForm {
        let now = Utc::now();
        let mut name = field("name", FieldType::ShortText, true);
        name.label = "Full name".to_string();
        let mut skills = field("skills", FieldType::Checkboxes, false);
        skills.label = "Skills".to_string();
        let mut level = field("level", FieldType::MultipleChoiceGrid, false);
        level.label = "Level".to_string();
        published_form(now - Duration::hours(1), now + Duration::hours(1), vec![name, skills, level])
    }

    fn submission(form: &PublishedForm, values: &[(&str, &str)]) -> FormSubmission {
        FormSubmission {
            id: Uuid::new_v4(),
            form_id: form.id,
            form_name: None,
            submitted_at: Utc::now(),
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            applicant_key: None,
        }
    }

    #[test]
    fn test_csv_has_header_plus_one_line_per_submission() {
        let form = form();
        let submissions = vec![
            submission(&form, &[("name", "Ada"), ("skills", "Rust, Go"), ("level", r#"{"Rust":"Expert"}"#)]),
            submission(&form, &[("name", "Grace")]),
            submission(&form, &[("name", "Linus"), ("skills", "C")]),
        ];

        let export = to_csv(&form, &submissions).unwrap().unwrap();
        let lines: Vec<&str> = export.content.lines().collect();

        assert_eq!(export.filename, "internship-abcde-submissions.csv");
        assert_eq!(lines.len(), submissions.len() + 1);
        assert_eq!(lines[0], "Full name,Skills,Level");
        assert_eq!(lines[1], r#"Ada,"Rust, Go","{""Rust"":""Expert""}""#);
        assert_eq!(lines[2], "Grace,,");
    }

    #[test]
    fn test_csv_rows_parse_back_to_field_count() {
        let form = form();
        let submissions = vec![submission(&form, &[("name", "O'Brien, Pat"), ("skills", "SQL")])];
        let export = to_csv(&form, &submissions).unwrap().unwrap();

        let mut reader = csv::Reader::from_reader(export.content.as_bytes());
        for record in reader.records() {
            assert_eq!(record.unwrap().len(), form.fields.len());
        }
    }

    #[test]
    fn test_nothing_to_export_without_submissions() {
        let form = form();
        assert!(to_csv(&form, &[]).unwrap().is_none());
        assert!(to_spreadsheet(&form, &[]).is_none());
        assert!(to_pdf_table(&form, &[]).is_none());
    }

    #[test]
    fn test_spreadsheet_rows_lead_with_date_then_labels() {
        let form = form();
        let export = to_spreadsheet(&form, &[submission(&form, &[("name", "Ada")])]).unwrap();

        let columns: Vec<&str> = export.rows[0].0.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(columns, vec!["Date", "Full name", "Skills", "Level"]);

        let json = serde_json::to_string(&export.rows[0]).unwrap();
        assert!(json.starts_with(r#"{"Date":"#));
        assert!(json.contains(r#""Full name":"Ada""#));
    }

    #[test]
    fn test_pdf_table_shape_matches_header() {
        let form = form();
        let table = to_pdf_table(&form, &[submission(&form, &[]), submission(&form, &[])]).unwrap();
        assert_eq!(table.head, vec!["Date", "Full name", "Skills", "Level"]);
        assert_eq!(table.body.len(), 2);
        assert!(table.body.iter().all(|row| row.len() == table.head.len()));
    }

    #[test]
    fn test_timestamp_uses_month_day_year_clock() {
        let formatted = format_timestamp(Utc::now());
        assert!(formatted.contains(", "));
        assert!(formatted.ends_with("AM") || formatted.ends_with("PM"));
    }
}
