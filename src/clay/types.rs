use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Row payload sent to the Clay table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub attio_record_id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// What to look up for one pending record
#[derive(Debug, Clone, PartialEq)]
pub struct ResultLookup {
    pub record_id: String,
    /// Row id returned by Clay when the record was submitted, if we kept one
    pub row_id: Option<String>,
}

/// Enriched data for a previously submitted record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub row_id: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub linkedin_url: Option<String>,
    pub phone: Option<String>,
}

impl EnrichmentResult {
    /// At least one enriched field came back
    pub fn has_data(&self) -> bool {
        [
            &self.job_title,
            &self.company_name,
            &self.linkedin_url,
            &self.phone,
        ]
        .iter()
        .any(|field| field.is_some())
    }
}

const JOB_TITLE_COLUMNS: [&str; 2] = ["enriched_job_title", "job_title"];
const COMPANY_COLUMNS: [&str; 4] = [
    "enriched_company",
    "enriched_company_name",
    "company",
    "company_name",
];
const LINKEDIN_COLUMNS: [&str; 3] = ["enriched_linkedin", "linkedin_url", "linkedin"];
const PHONE_COLUMNS: [&str; 2] = ["enriched_phone", "phone"];
const STATUS_COLUMNS: [&str; 2] = ["enrichment_status", "status"];
const FINISHED_STATES: [&str; 4] = ["complete", "completed", "done", "finished"];

/// One Clay table row, reduced to what reconciliation needs
#[derive(Debug, Clone, PartialEq)]
pub struct ClayRow {
    pub row_id: Option<String>,
    pub attio_record_id: Option<String>,
    pub result: EnrichmentResult,
    /// Clay has finished with this row, whether or not it found anything
    pub complete: bool,
}

impl ClayRow {
    /// Rows come back either flat or with their cells under `data`.
    pub fn parse(row: &Value) -> Self {
        let cells = row.get("data").filter(|d| d.is_object()).unwrap_or(row);

        let row_id = ["id", "row_id"]
            .iter()
            .find_map(|key| row.get(*key).and_then(cell_text));

        let result = EnrichmentResult {
            row_id: row_id.clone(),
            job_title: first_cell(cells, &JOB_TITLE_COLUMNS),
            company_name: first_cell(cells, &COMPANY_COLUMNS),
            linkedin_url: first_cell(cells, &LINKEDIN_COLUMNS),
            phone: first_cell(cells, &PHONE_COLUMNS),
        };

        let flagged = cells
            .get("enrichment_complete")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let finished = first_cell(cells, &STATUS_COLUMNS)
            .map(|s| FINISHED_STATES.contains(&s.to_lowercase().as_str()))
            .unwrap_or(false);

        Self {
            row_id,
            attio_record_id: cells.get("attio_record_id").and_then(cell_text),
            complete: result.has_data() || flagged || finished,
            result,
        }
    }
}

fn first_cell(cells: &Value, columns: &[&str]) -> Option<String> {
    columns
        .iter()
        .find_map(|column| cells.get(*column).and_then(cell_text))
}

fn cell_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_row_with_enriched_columns() {
        let row = ClayRow::parse(&json!({
            "id": "r_1",
            "data": {
                "attio_record_id": "rec_1",
                "enriched_job_title": "CEO",
                "job_title": "stale",
                "company": "Acme",
                "linkedin_url": "",
            }
        }));

        assert_eq!(row.row_id.as_deref(), Some("r_1"));
        assert_eq!(row.attio_record_id.as_deref(), Some("rec_1"));
        assert_eq!(row.result.job_title.as_deref(), Some("CEO"));
        assert_eq!(row.result.company_name.as_deref(), Some("Acme"));
        assert_eq!(row.result.linkedin_url, None);
        assert!(row.complete);
    }

    #[test]
    fn empty_row_is_pending_until_marked_finished() {
        let pending = ClayRow::parse(&json!({ "row_id": 17, "attio_record_id": "rec_2" }));
        assert_eq!(pending.row_id.as_deref(), Some("17"));
        assert!(!pending.result.has_data());
        assert!(!pending.complete);

        let flagged = ClayRow::parse(&json!({
            "id": "r_3",
            "data": { "attio_record_id": "rec_3", "enrichment_complete": true }
        }));
        assert!(flagged.complete);
        assert!(!flagged.result.has_data());

        let finished = ClayRow::parse(&json!({
            "id": "r_4",
            "data": { "attio_record_id": "rec_4", "status": "Completed" }
        }));
        assert!(finished.complete);
    }

    #[test]
    fn payload_omits_missing_names() {
        let payload = SubmissionPayload {
            attio_record_id: "rec_1".to_string(),
            email: "a@x.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
        };

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({ "attio_record_id": "rec_1", "email": "a@x.com", "first_name": "Ada" })
        );
    }
}
