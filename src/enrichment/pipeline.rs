use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error, info};

use crate::{
    attio::types::{Company, StatusQuery},
    clay::types::{EnrichmentResult, ResultLookup},
    config::PipelineConfig,
    enrichment::{
        adapters::{EnrichmentService, RecordStore},
        contact::Contact,
        eligibility,
        report::RunReport,
        status::EnrichmentStatus,
        writer::{self, StatusWriter, Transition},
    },
    error::Result,
    utils,
};

const NO_DATA_REASON: &str = "no enrichment data returned";

/// The phases of one pass, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Apply finished Clay results to records awaiting them
    Resolve,
    /// Resolve enriched company names to company records
    Link,
    /// Send unenriched records to Clay
    Submit,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Resolve, Phase::Link, Phase::Submit];

    fn title(&self) -> &'static str {
        match self {
            Phase::Resolve => "Phase 1: Updating Attio with enriched data from Clay",
            Phase::Link => "Phase 2: Linking enriched records to companies",
            Phase::Submit => "Phase 3: Sending unenriched records to Clay",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Resolve => write!(f, "resolve"),
            Phase::Link => write!(f, "link"),
            Phase::Submit => write!(f, "submit"),
        }
    }
}

/// How a pending record leaves `sent_to_clay`
enum Resolution {
    Enriched(EnrichmentResult),
    NoData,
    TimedOut(String),
}

impl Resolution {
    fn transition(&self, now: DateTime<Utc>) -> Transition {
        match self {
            Resolution::Enriched(result) => Transition::Enriched {
                at: now,
                result: result.clone(),
            },
            Resolution::NoData => Transition::Failed {
                reason: NO_DATA_REASON.to_string(),
            },
            Resolution::TimedOut(reason) => Transition::Failed {
                reason: reason.clone(),
            },
        }
    }
}

/// Runs one reconciliation pass between the record store and the enrichment service
pub struct ReconciliationDriver<'a, S: RecordStore, E: EnrichmentService> {
    store: &'a S,
    service: &'a E,
    writer: StatusWriter<'a, S>,
    settings: &'a PipelineConfig,
    dry_run: bool,
}

impl<'a, S: RecordStore, E: EnrichmentService> ReconciliationDriver<'a, S, E> {
    pub fn new(store: &'a S, service: &'a E, settings: &'a PipelineConfig) -> Self {
        Self {
            store,
            service,
            writer: StatusWriter::new(store),
            settings,
            dry_run: settings.dry_run,
        }
    }

    /// Force dry-run mode on top of whatever the configuration says
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = self.dry_run || dry_run;
        self
    }

    /// Run the selected phases (all of them when `phases` is empty)
    pub async fn run(&self, phases: &[Phase]) -> RunReport {
        self.run_at(Utc::now(), phases).await
    }

    /// Run a pass as of `now`. Phases are isolated: an error that aborts one
    /// is reported and the next still runs.
    pub async fn run_at(&self, now: DateTime<Utc>, phases: &[Phase]) -> RunReport {
        let mut report = RunReport::new(now, self.dry_run);

        for phase in Phase::ALL {
            if !phases.is_empty() && !phases.contains(&phase) {
                debug!("Skipping {} phase", phase);
                continue;
            }

            info!("");
            info!("{}", phase.title());
            info!("{}", "-".repeat(40));

            let outcome = match phase {
                Phase::Resolve => self.resolve_pending(now, &mut report).await,
                Phase::Link => self.link_companies(&mut report).await,
                Phase::Submit => self.submit_new(now, &mut report).await,
            };

            if let Err(e) = outcome {
                error!("ERROR in {} phase: {}", phase, e);
                report.record_phase_error(phase, &e);
            }
        }

        report
    }

    /// Apply finished results, and fail records Clay never finished
    async fn resolve_pending(&self, now: DateTime<Utc>, report: &mut RunReport) -> Result<()> {
        info!("Querying Attio for records awaiting enrichment...");
        let records = self
            .store
            .query_by_status(StatusQuery::AwaitingResults, self.settings.pending_limit)
            .await?;

        let mut pending: Vec<Contact> = records
            .iter()
            .map(Contact::from_record)
            .filter(|c| c.status == EnrichmentStatus::SentToClay)
            .collect();
        // Oldest submissions first so the batch cap never starves stuck records
        pending.sort_by_key(|c| c.sent_at);
        pending.truncate(self.settings.pending_limit);

        info!("Found {} records with 'sent_to_clay' status", pending.len());
        if pending.is_empty() {
            return Ok(());
        }

        info!("Checking Clay for enrichment results...");
        let lookups: Vec<ResultLookup> = pending.iter().map(Contact::result_lookup).collect();
        let results = self.service.fetch_results(&lookups).await?;
        info!("Found {} finished records in Clay", results.len());

        let timeout = self.settings.timeout();
        for contact in &pending {
            let resolution = match results.get(&contact.record_id) {
                Some(result) if result.has_data() => Resolution::Enriched(result.clone()),
                Some(_) => Resolution::NoData,
                None if eligibility::is_stuck(contact, now, timeout) => Resolution::TimedOut(format!(
                    "timed out after {} hours",
                    self.settings.timeout_hours
                )),
                None => {
                    debug!("  {} still waiting on Clay", contact.record_id);
                    continue;
                }
            };

            info!("  Updating {}...", contact.record_id);
            match self.transition(contact, &resolution.transition(now)).await {
                Ok(_) => {
                    report.resolved += 1;
                    match &resolution {
                        Resolution::Enriched(result) => {
                            report.enriched += 1;
                            info!(
                                "    Updated with: job_title={}, company={}",
                                result.job_title.as_deref().unwrap_or("-"),
                                result.company_name.as_deref().unwrap_or("-")
                            );
                        }
                        Resolution::NoData => report.record_failed(&contact.record_id, NO_DATA_REASON),
                        Resolution::TimedOut(reason) => report.record_timed_out(&contact.record_id, reason),
                    }
                }
                Err(e) => report.record_update_error(&contact.record_id, &e),
            }

            self.pace().await;
        }

        info!("Resolved {} pending records", report.resolved);
        Ok(())
    }

    /// Turn enriched company names into company references
    async fn link_companies(&self, report: &mut RunReport) -> Result<()> {
        info!("Querying Attio for enriched records awaiting a company...");
        let records = self
            .store
            .query_by_status(StatusQuery::AwaitingCompanyLink, self.settings.link_limit)
            .await?;

        let candidates: Vec<Contact> = records
            .iter()
            .map(Contact::from_record)
            .filter(eligibility::needs_company_linking)
            .collect();

        info!("Found {} records needing a company link", candidates.len());

        // case-folded name -> company id, so a name is created at most once per run
        let mut known: HashMap<String, String> = HashMap::new();

        for contact in &candidates {
            let name = contact
                .enriched_company_name
                .as_deref()
                .unwrap_or_default()
                .trim();
            info!("  Linking {} to \"{}\"...", contact.record_id, name);

            let company_id = match self.resolve_company(name, &mut known, report).await {
                Ok(id) => id,
                Err(e) => {
                    report.record_link_error(&contact.record_id, &e);
                    self.pace().await;
                    continue;
                }
            };

            match self
                .transition(contact, &Transition::CompanyLinked { company_id })
                .await
            {
                Ok(_) => report.linked += 1,
                Err(e) => report.record_update_error(&contact.record_id, &e),
            }

            self.pace().await;
        }

        info!("Linked {} records to companies", report.linked);
        Ok(())
    }

    async fn resolve_company(
        &self,
        name: &str,
        known: &mut HashMap<String, String>,
        report: &mut RunReport,
    ) -> Result<String> {
        let key = name.to_lowercase();
        if let Some(id) = known.get(&key) {
            debug!("    Reusing company {} for \"{}\"", id, name);
            return Ok(id.clone());
        }

        let candidates = self.store.find_companies(name).await?;
        let company_id = match select_company(name, &candidates) {
            Some(company) => {
                debug!("    Matched existing company {}", company.id);
                company.id.clone()
            }
            None if self.dry_run => {
                info!("    DRY RUN: would create company \"{}\"", name);
                report.companies_created += 1;
                format!("dry-run:{}", key)
            }
            None => {
                let company = self.store.create_company(name).await?;
                info!("    Created company \"{}\" ({})", name, company.id);
                report.companies_created += 1;
                company.id
            }
        };

        known.insert(key, company_id.clone());
        Ok(company_id)
    }

    /// Send eligible records to Clay and mark them as sent
    async fn submit_new(&self, now: DateTime<Utc>, report: &mut RunReport) -> Result<()> {
        info!("Querying Attio for unenriched records...");
        let records = self
            .store
            .query_by_status(StatusQuery::Candidates, self.settings.scan_limit)
            .await?;

        let eligible: Vec<Contact> = records
            .iter()
            .map(Contact::from_record)
            .filter(eligibility::needs_enrichment)
            .take(self.settings.batch_size)
            .collect();

        info!("Found {} records needing enrichment", eligible.len());

        let total = eligible.len();
        for (i, contact) in eligible.iter().enumerate() {
            let Some(payload) = contact.submission_payload() else {
                continue;
            };
            info!("  [{}/{}] Processing {}...", i + 1, total, payload.email);

            if self.dry_run {
                info!("    DRY RUN: would send {} to Clay", contact.record_id);
                report.submitted += 1;
                continue;
            }

            match self.service.submit(&payload).await {
                Ok(row_id) => {
                    let sent = Transition::Sent {
                        at: now,
                        row_id: row_id.clone(),
                    };
                    match self.transition(contact, &sent).await {
                        Ok(_) => {
                            report.submitted += 1;
                            info!("    Sent to Clay (row: {})", row_id.as_deref().unwrap_or("-"));
                        }
                        // Clay has the row but Attio does not; the next pass resubmits it
                        Err(e) => report.record_update_error(&contact.record_id, &e),
                    }
                }
                Err(e) => {
                    report.record_submission_error(&contact.record_id, &e);

                    if e.is_rejection() {
                        let failed = Transition::Failed {
                            reason: format!("Failed to send to Clay: {}", e),
                        };
                        match self.transition(contact, &failed).await {
                            Ok(_) => report.failed += 1,
                            Err(write_err) => {
                                report.record_update_error(&contact.record_id, &write_err)
                            }
                        }
                    }
                }
            }

            self.pace().await;
        }

        info!("Sent {} records to Clay", report.submitted);
        Ok(())
    }

    async fn transition(&self, contact: &Contact, transition: &Transition) -> Result<EnrichmentStatus> {
        if self.dry_run {
            let target = writer::check(contact, transition)?;
            info!("    DRY RUN: would mark {} as {}", contact.record_id, target);
            return Ok(target);
        }

        self.writer.apply(contact, transition).await
    }

    async fn pace(&self) {
        if !self.dry_run {
            utils::pace(self.settings.rate_limit_delay()).await;
        }
    }
}

/// Pick the company for `name`: an exact case-insensitive match wins,
/// otherwise the first candidate the search returned.
pub fn select_company<'c>(name: &str, candidates: &'c [Company]) -> Option<&'c Company> {
    let wanted = name.trim().to_lowercase();

    candidates
        .iter()
        .find(|c| {
            c.name
                .as_deref()
                .is_some_and(|n| n.trim().to_lowercase() == wanted)
        })
        .or_else(|| candidates.first())
}
