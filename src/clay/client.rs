use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{hash_map::Entry, HashMap, HashSet};
use tracing::{debug, warn};

use crate::{
    clay::types::{ClayRow, EnrichmentResult, ResultLookup, SubmissionPayload},
    config::ClayConfig,
    enrichment::adapters::EnrichmentService,
    error::{PipelineError, Result},
    utils,
};

const SERVICE: &str = "Clay";

/// Client for a single Clay enrichment table
#[derive(Clone)]
pub struct ClayClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    table_id: String,
    page_size: usize,
    max_pages: Option<usize>,
}

impl ClayClient {
    pub fn new(config: &ClayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(utils::USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table_id: config.table_id.clone(),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.map(|max| max.max(1)),
        })
    }

    fn rows_url(&self) -> String {
        format!("{}/tables/{}/rows", self.base_url, self.table_id)
    }

    /// One page of table rows
    async fn get_rows(&self, offset: usize) -> Result<Vec<Value>> {
        let response = self
            .http
            .get(self.rows_url())
            .bearer_auth(&self.api_key)
            .query(&[("limit", self.page_size), ("offset", offset)])
            .send()
            .await?;
        let response = utils::ensure_success(SERVICE, response).await?;
        let payload: Value = response.json().await?;

        let rows = ["data", "rows"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default();

        Ok(rows)
    }
}

#[async_trait]
impl EnrichmentService for ClayClient {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<Option<String>> {
        let response = self
            .http
            .post(self.rows_url())
            .bearer_auth(&self.api_key)
            .json(&json!({ "data": payload }))
            .send()
            .await?;
        let response = utils::ensure_success(SERVICE, response).await?;

        // Clay acknowledges with the row id, under one of two names
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let row_id = ["id", "row_id"].iter().find_map(|key| match body.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        });

        Ok(row_id)
    }

    async fn fetch_results(
        &self,
        lookups: &[ResultLookup],
    ) -> Result<HashMap<String, EnrichmentResult>> {
        let mut results: HashMap<String, EnrichmentResult> = HashMap::new();
        if lookups.is_empty() {
            return Ok(results);
        }

        let wanted: HashSet<&str> = lookups.iter().map(|l| l.record_id.as_str()).collect();
        let by_row: HashMap<&str, &str> = lookups
            .iter()
            .filter_map(|l| l.row_id.as_deref().map(|row| (row, l.record_id.as_str())))
            .collect();

        // Only a result with data settles a lookup; an empty finished row may
        // still be followed by a resubmitted row that has data
        let settled = |results: &HashMap<String, EnrichmentResult>| {
            results.values().filter(|r| r.has_data()).count()
        };

        let mut page = 0;
        loop {
            let rows = self.get_rows(page * self.page_size).await?;
            page += 1;
            debug!("Clay page {} returned {} rows", page, rows.len());

            for raw in &rows {
                let row = ClayRow::parse(raw);
                if !row.complete {
                    continue;
                }

                let record_id = row
                    .attio_record_id
                    .as_deref()
                    .filter(|id| wanted.contains(id))
                    .or_else(|| row.row_id.as_deref().and_then(|r| by_row.get(r).copied()));

                if let Some(record_id) = record_id {
                    match results.entry(record_id.to_string()) {
                        Entry::Occupied(mut stored) => {
                            if !stored.get().has_data() && row.result.has_data() {
                                stored.insert(row.result);
                            }
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(row.result);
                        }
                    }
                }
            }

            if settled(&results) == wanted.len() {
                debug!("All {} lookups resolved after {} page(s)", wanted.len(), page);
                break;
            }
            if rows.len() < self.page_size {
                debug!("Reached the end of the table after {} page(s)", page);
                break;
            }
            if self.max_pages.is_some_and(|max| page >= max) {
                warn!(
                    "Stopped after {} pages with {} of {} lookups resolved",
                    page,
                    settled(&results),
                    wanted.len()
                );
                return Err(PipelineError::LookupIncomplete {
                    service: SERVICE,
                    pages: page,
                    resolved: settled(&results),
                    wanted: wanted.len(),
                });
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer, page_size: usize) -> ClayClient {
        capped_client(server, page_size, None)
    }

    fn capped_client(server: &MockServer, page_size: usize, max_pages: Option<usize>) -> ClayClient {
        ClayClient::new(&ClayConfig {
            api_key: "clay-key".to_string(),
            table_id: "t_1".to_string(),
            base_url: server.base_url(),
            page_size,
            max_pages,
        })
        .unwrap()
    }

    async fn page(server: &MockServer, offset: usize, rows: Value) -> httpmock::Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/tables/t_1/rows")
                    .query_param("offset", offset.to_string());
                then.status(200).json_body(json!({ "data": rows }));
            })
            .await
    }

    fn lookup(record_id: &str, row_id: Option<&str>) -> ResultLookup {
        ResultLookup {
            record_id: record_id.to_string(),
            row_id: row_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn submit_returns_row_id() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/tables/t_1/rows")
                    .header("authorization", "Bearer clay-key")
                    .json_body(json!({
                        "data": { "attio_record_id": "rec_1", "email": "a@x.com" }
                    }));
                then.status(201).json_body(json!({ "row_id": "r_77" }));
            })
            .await;

        let payload = SubmissionPayload {
            attio_record_id: "rec_1".to_string(),
            email: "a@x.com".to_string(),
            first_name: None,
            last_name: None,
        };
        let row_id = client(&server, 10).submit(&payload).await.unwrap();

        mock.assert_async().await;
        assert_eq!(row_id.as_deref(), Some("r_77"));
    }

    #[tokio::test]
    async fn rejected_submission_is_a_rejection() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST).path("/tables/t_1/rows");
                then.status(422).body("email is invalid");
            })
            .await;

        let payload = SubmissionPayload {
            attio_record_id: "rec_1".to_string(),
            email: "nope".to_string(),
            first_name: None,
            last_name: None,
        };
        let err = client(&server, 10).submit(&payload).await.unwrap_err();
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn lookup_stops_once_every_record_is_found() {
        let server = MockServer::start_async().await;

        let first = page(
            &server,
            0,
            json!([
                { "id": "r_1", "data": { "attio_record_id": "rec_1", "enriched_job_title": "CEO", "company": "Acme" } },
                { "id": "r_x", "data": { "attio_record_id": "someone_else", "job_title": "CFO" } },
            ]),
        )
        .await;
        let second = page(
            &server,
            2,
            json!([
                { "id": "r_2", "data": { "enrichment_complete": true, "job_title": "CTO" } },
                { "id": "r_3", "data": { "attio_record_id": "rec_3" } },
            ]),
        )
        .await;
        let third = page(&server, 4, json!([])).await;

        let results = client(&server, 2)
            .fetch_results(&[lookup("rec_1", None), lookup("rec_2", Some("r_2"))])
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        third.assert_calls_async(0).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results["rec_1"].job_title.as_deref(), Some("CEO"));
        assert_eq!(results["rec_1"].company_name.as_deref(), Some("Acme"));
        // matched through the stored row id
        assert_eq!(results["rec_2"].job_title.as_deref(), Some("CTO"));
    }

    #[tokio::test]
    async fn lookup_walks_past_full_pages_to_find_results() {
        let server = MockServer::start_async().await;

        page(&server, 0, json!([{ "id": "r_a", "data": { "attio_record_id": "rec_a", "job_title": "CFO" } }])).await;
        page(&server, 1, json!([{ "id": "r_b", "data": { "attio_record_id": "rec_b", "job_title": "COO" } }])).await;
        page(&server, 2, json!([{ "id": "r_t", "data": { "attio_record_id": "rec_target", "job_title": "CEO" } }])).await;
        let past_end = page(&server, 3, json!([])).await;

        let results = client(&server, 1)
            .fetch_results(&[lookup("rec_target", None)])
            .await
            .unwrap();

        past_end.assert_calls_async(0).await;
        assert_eq!(results["rec_target"].job_title.as_deref(), Some("CEO"));
    }

    #[tokio::test]
    async fn short_page_ends_lookup_with_records_missing() {
        let server = MockServer::start_async().await;

        let full = page(
            &server,
            0,
            json!([
                { "id": "r_x", "data": { "attio_record_id": "other_1", "job_title": "CFO" } },
                { "id": "r_y", "data": { "attio_record_id": "other_2", "job_title": "COO" } },
            ]),
        )
        .await;
        let short = page(
            &server,
            2,
            json!([{ "id": "r_1", "data": { "attio_record_id": "rec_1", "job_title": "CEO" } }]),
        )
        .await;
        let beyond = page(&server, 4, json!([])).await;

        let results = client(&server, 2)
            .fetch_results(&[lookup("rec_1", None), lookup("rec_2", None)])
            .await
            .unwrap();

        full.assert_async().await;
        short.assert_async().await;
        beyond.assert_calls_async(0).await;

        assert_eq!(results.len(), 1);
        assert!(results.contains_key("rec_1"));
        assert!(!results.contains_key("rec_2"));
    }

    #[tokio::test]
    async fn page_cap_is_an_error_not_a_miss() {
        let server = MockServer::start_async().await;

        page(&server, 0, json!([{ "id": "r_a", "data": { "attio_record_id": "rec_a", "job_title": "CFO" } }])).await;
        page(&server, 1, json!([{ "id": "r_b", "data": { "attio_record_id": "rec_b", "job_title": "COO" } }])).await;
        let capped = page(&server, 2, json!([{ "id": "r_t", "data": { "attio_record_id": "rec_target", "job_title": "CEO" } }])).await;

        let err = capped_client(&server, 1, Some(2))
            .fetch_results(&[lookup("rec_target", None)])
            .await
            .unwrap_err();

        capped.assert_calls_async(0).await;
        assert!(matches!(
            err,
            PipelineError::LookupIncomplete { pages: 2, resolved: 0, wanted: 1, .. }
        ));
    }

    #[tokio::test]
    async fn later_row_with_data_beats_earlier_empty_row() {
        let server = MockServer::start_async().await;

        page(
            &server,
            0,
            json!([
                { "id": "r_old", "data": { "attio_record_id": "rec_a", "status": "completed" } },
                { "id": "r_new", "data": { "attio_record_id": "rec_a", "enriched_job_title": "CEO" } },
                { "id": "r_dup", "data": { "attio_record_id": "rec_a", "status": "done" } },
            ]),
        )
        .await;

        let results = client(&server, 10)
            .fetch_results(&[lookup("rec_a", None)])
            .await
            .unwrap();

        assert_eq!(results["rec_a"].row_id.as_deref(), Some("r_new"));
        assert_eq!(results["rec_a"].job_title.as_deref(), Some("CEO"));
    }

    #[tokio::test]
    async fn empty_finished_row_keeps_paging_then_stands() {
        let server = MockServer::start_async().await;

        let first = page(
            &server,
            0,
            json!([
                { "id": "r_old", "data": { "attio_record_id": "rec_a", "status": "completed" } },
                { "id": "r_x", "data": { "attio_record_id": "other", "job_title": "CFO" } },
            ]),
        )
        .await;
        let last = page(&server, 2, json!([])).await;

        let results = client(&server, 2)
            .fetch_results(&[lookup("rec_a", None)])
            .await
            .unwrap();

        first.assert_async().await;
        last.assert_async().await;
        assert!(!results["rec_a"].has_data());
    }

    #[tokio::test]
    async fn unfinished_rows_are_not_results() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/tables/t_1/rows");
                then.status(200).json_body(json!({
                    "rows": [{ "id": "r_1", "data": { "attio_record_id": "rec_1", "email": "a@x.com" } }]
                }));
            })
            .await;

        let results = client(&server, 10)
            .fetch_results(&[lookup("rec_1", None)])
            .await
            .unwrap();

        assert!(results.is_empty());
    }
}
