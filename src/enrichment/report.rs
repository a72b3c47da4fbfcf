use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tracing::warn;

use crate::{enrichment::pipeline::Phase, error::PipelineError, utils};

/// Longest reason kept per failure in the report
const MAX_REASON_LEN: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub record_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseFailure {
    pub phase: Phase,
    pub message: String,
}

/// Outcome counters for one reconciliation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub started_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    /// Pending records that left `sent_to_clay`
    pub resolved: usize,
    pub enriched: usize,
    /// `failed` transitions other than timeouts
    pub failed: usize,
    pub timed_out: usize,
    pub linked: usize,
    pub companies_created: usize,
    pub submitted: usize,
    pub submission_errors: usize,
    pub update_errors: usize,
    pub link_errors: usize,
    pub phase_errors: Vec<PhaseFailure>,
    /// Per-record problems: errors and business failures alike
    pub failures: Vec<RecordFailure>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            started_at: Some(started_at),
            dry_run,
            ..Self::default()
        }
    }

    /// A record moved to `failed` on purpose
    pub fn record_failed(&mut self, record_id: &str, reason: &str) {
        self.failed += 1;
        self.push_failure(record_id, reason);
    }

    pub fn record_timed_out(&mut self, record_id: &str, reason: &str) {
        self.timed_out += 1;
        self.push_failure(record_id, reason);
    }

    pub fn record_submission_error(&mut self, record_id: &str, error: &PipelineError) {
        self.submission_errors += 1;
        self.push_failure(record_id, &format!("submission failed: {}", error));
    }

    pub fn record_update_error(&mut self, record_id: &str, error: &PipelineError) {
        self.update_errors += 1;
        self.push_failure(record_id, &format!("status update failed: {}", error));
    }

    pub fn record_link_error(&mut self, record_id: &str, error: &PipelineError) {
        self.link_errors += 1;
        self.push_failure(record_id, &format!("company link failed: {}", error));
    }

    pub fn record_phase_error(&mut self, phase: Phase, error: &PipelineError) {
        self.phase_errors.push(PhaseFailure {
            phase,
            message: utils::truncate_chars(&error.to_string(), MAX_REASON_LEN),
        });
    }

    fn push_failure(&mut self, record_id: &str, reason: &str) {
        let reason = utils::truncate_chars(reason, MAX_REASON_LEN);
        warn!("    {}: {}", record_id, reason);
        self.failures.push(RecordFailure {
            record_id: record_id.to_string(),
            reason,
        });
    }

    /// Operational errors; deliberate `failed` transitions are not errors
    pub fn error_count(&self) -> usize {
        self.submission_errors + self.update_errors + self.link_errors + self.phase_errors.len()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn summary_line(&self) -> String {
        if self.has_errors() {
            format!("Pipeline completed with errors ({} errors)", self.error_count())
        } else {
            "Pipeline completed successfully".to_string()
        }
    }

    /// Print a formatted summary to console
    pub fn print_summary(&self) {
        println!("\n{}", "=== Enrichment Run Summary ===".cyan().bold());
        if let Some(started_at) = &self.started_at {
            println!("Started:           {}", utils::format_timestamp(started_at));
        }
        if self.dry_run {
            println!("{}", "DRY RUN: no records were changed".yellow());
        }
        println!("Resolved:          {}", self.resolved);
        println!("  Enriched:        {} ✓", self.enriched.to_string().green());
        println!("  Failed:          {}", self.failed);
        println!("  Timed out:       {}", self.timed_out);
        println!("Companies linked:  {}", self.linked);
        println!("Companies created: {}", self.companies_created);
        println!("Submitted:         {}", self.submitted);
        println!("Submission errors: {}", self.submission_errors);
        println!("Update errors:     {}", self.update_errors);
        println!("Link errors:       {}", self.link_errors);

        for failure in &self.phase_errors {
            println!("{} {}: {}", "Phase error".red(), failure.phase, failure.message);
        }

        if !self.failures.is_empty() {
            println!("\n{}", "Record failures:".yellow());
            utils::print_table_border(90);
            for failure in &self.failures {
                let reason = utils::truncate_chars(&failure.reason, 60);
                utils::print_table_row(&[failure.record_id.as_str(), reason.as_str()], &[28, 60]);
            }
            utils::print_table_border(90);
        }

        println!("==============================");
        if self.has_errors() {
            println!("{}", self.summary_line().red());
        } else {
            println!("{}", self.summary_line().green());
        }
    }
}
