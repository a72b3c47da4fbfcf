use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    attio::types::{fields, Company, FieldUpdates, Record, StatusQuery, COMPANIES, PEOPLE},
    config::AttioConfig,
    enrichment::{adapters::RecordStore, status::EnrichmentStatus},
    error::{PipelineError, Result},
    utils,
};

const SERVICE: &str = "Attio";
const COMPANY_SEARCH_LIMIT: usize = 10;

/// Attio REST v2 client for people and company records
#[derive(Clone)]
pub struct AttioClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AttioClient {
    pub fn new(config: &AttioConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(utils::USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn query_records(&self, object: &str, body: Value) -> Result<Vec<Record>> {
        let url = self.url(&format!("/objects/{}/records/query", object));
        debug!("POST {} {}", url, body);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = utils::ensure_success(SERVICE, response).await?;
        let payload: Value = response.json().await?;

        Ok(parse_records(&payload))
    }

    fn status_query_body(query: StatusQuery, limit: usize) -> Value {
        match query {
            StatusQuery::AwaitingResults => json!({
                "limit": limit,
                "filter": { (fields::STATUS): EnrichmentStatus::SentToClay.as_str() },
                "sorts": [{ "attribute": fields::SENT_AT, "direction": "asc" }],
            }),
            StatusQuery::AwaitingCompanyLink => json!({
                "limit": limit,
                "filter": { (fields::STATUS): EnrichmentStatus::Enriched.as_str() },
                "sorts": [{ "attribute": fields::ENRICHED_AT, "direction": "asc" }],
            }),
            // Open records only; older unsubmitted people are never crowded out
            StatusQuery::Candidates => json!({
                "limit": limit,
                "filter": { "$or": [
                    { "$not": { (fields::STATUS): { "$not_empty": true } } },
                    { (fields::STATUS): { "$eq": EnrichmentStatus::Pending.as_str() } },
                ] },
                "sorts": [{ "attribute": fields::CREATED_AT, "direction": "desc" }],
            }),
        }
    }
}

/// Records from a `{"data": [...]}` envelope. Entries that don't look like a
/// record are skipped so one bad row cannot sink a whole query.
fn parse_records(payload: &Value) -> Vec<Record> {
    let Some(entries) = payload.get("data").and_then(Value::as_array) else {
        warn!("Attio response had no data array");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<Record>(entry.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed Attio record: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl RecordStore for AttioClient {
    async fn query_by_status(&self, query: StatusQuery, limit: usize) -> Result<Vec<Record>> {
        self.query_records(PEOPLE, Self::status_query_body(query, limit))
            .await
    }

    async fn patch(&self, record_id: &str, updates: &FieldUpdates) -> Result<()> {
        let url = self.url(&format!("/objects/{}/records/{}", PEOPLE, record_id));
        let body = json!({ "data": { "values": updates.to_attio_values() } });

        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        utils::ensure_success(SERVICE, response).await?;

        Ok(())
    }

    async fn find_companies(&self, name: &str) -> Result<Vec<Company>> {
        let body = json!({
            "limit": COMPANY_SEARCH_LIMIT,
            "filter": { (fields::NAME): { "$contains": name } },
        });

        let records = self.query_records(COMPANIES, body).await?;
        Ok(records.iter().map(Company::from_record).collect())
    }

    async fn create_company(&self, name: &str) -> Result<Company> {
        let url = self.url(&format!("/objects/{}/records", COMPANIES));
        let body = json!({ "data": { "values": { (fields::NAME): name } } });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = utils::ensure_success(SERVICE, response).await?;
        let payload: Value = response.json().await?;

        let record: Record = payload
            .get("data")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| {
                PipelineError::MalformedResponse("company create returned no data".to_string())
            })?;

        Ok(Company::from_record(&record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> AttioClient {
        AttioClient::new(&AttioConfig {
            api_key: "attio-key".to_string(),
            base_url: server.base_url(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn pending_query_filters_on_status_and_skips_malformed_rows() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/objects/people/records/query")
                    .header("authorization", "Bearer attio-key")
                    .json_body(json!({
                        "limit": 25,
                        "filter": { "clay_enrichment_status": "sent_to_clay" },
                        "sorts": [{ "attribute": "clay_sent_at", "direction": "asc" }],
                    }));
                then.status(200).json_body(json!({
                    "data": [
                        { "id": { "record_id": "rec_1" }, "values": {} },
                        { "id": "not-an-identity", "values": {} },
                        { "id": { "record_id": "rec_2" }, "values": {} },
                    ]
                }));
            })
            .await;

        let records = client(&server)
            .query_by_status(StatusQuery::AwaitingResults, 25)
            .await
            .unwrap();

        mock.assert_async().await;
        let ids: Vec<&str> = records.iter().map(Record::record_id).collect();
        assert_eq!(ids, vec!["rec_1", "rec_2"]);
    }

    #[tokio::test]
    async fn candidate_query_asks_only_for_open_records() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/objects/people/records/query")
                    .json_body(json!({
                        "limit": 200,
                        "filter": { "$or": [
                            { "$not": { "clay_enrichment_status": { "$not_empty": true } } },
                            { "clay_enrichment_status": { "$eq": "pending" } },
                        ] },
                        "sorts": [{ "attribute": "created_at", "direction": "desc" }],
                    }));
                then.status(200).json_body(json!({
                    "data": [{ "id": { "record_id": "rec_old" }, "values": {} }]
                }));
            })
            .await;

        let records = client(&server)
            .query_by_status(StatusQuery::Candidates, 200)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(records[0].record_id(), "rec_old");
    }

    #[tokio::test]
    async fn patch_sends_only_present_values() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/objects/people/records/rec_1")
                    .json_body(json!({
                        "data": { "values": {
                            "clay_enrichment_status": "enriched",
                            "job_title": "CEO",
                        } }
                    }));
                then.status(200).json_body(json!({ "data": {} }));
            })
            .await;

        let updates = FieldUpdates::new()
            .with_text(fields::STATUS, Some("enriched"))
            .with_text(fields::JOB_TITLE, Some("CEO"))
            .with_text(fields::LINKEDIN, None);

        client(&server).patch("rec_1", &updates).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_patch_surfaces_status_code() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(PATCH).path("/objects/people/records/rec_1");
                then.status(400).body("unknown attribute clay_row_id");
            })
            .await;

        let err = client(&server)
            .patch("rec_1", &FieldUpdates::new().with_text(fields::STATUS, Some("failed")))
            .await
            .unwrap_err();

        match err {
            PipelineError::Api { status, body, .. } => {
                assert_eq!(status, 400);
                assert!(body.contains("clay_row_id"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn company_search_and_create() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST).path("/objects/companies/records/query");
                then.status(200).json_body(json!({
                    "data": [{
                        "id": { "record_id": "c_1" },
                        "values": { "name": [{ "attribute_type": "text", "value": "Acme Corp" }] }
                    }]
                }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/objects/companies/records")
                    .json_body(json!({ "data": { "values": { "name": "Acme" } } }));
                then.status(200).json_body(json!({
                    "data": {
                        "id": { "record_id": "c_2" },
                        "values": { "name": [{ "attribute_type": "text", "value": "Acme" }] }
                    }
                }));
            })
            .await;

        let attio = client(&server);
        let found = attio.find_companies("Acme").await.unwrap();
        assert_eq!(
            found,
            vec![Company {
                id: "c_1".to_string(),
                name: Some("Acme Corp".to_string())
            }]
        );

        let created = attio.create_company("Acme").await.unwrap();
        create.assert_async().await;
        assert_eq!(created.id, "c_2");
        assert_eq!(created.name.as_deref(), Some("Acme"));
    }
}
