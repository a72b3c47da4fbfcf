use chrono::{DateTime, Duration, Utc};

use crate::enrichment::{contact::Contact, status::EnrichmentStatus};

/// Check if a contact should be submitted for enrichment
///
/// A contact is eligible if:
/// 1. It has an email address
/// 2. Its status is still open (never submitted, not terminal, not foreign)
/// 3. At least one of job title, company or LinkedIn is missing
pub fn needs_enrichment(contact: &Contact) -> bool {
    if contact.email.is_none() {
        return false;
    }

    if !contact.status.is_open() {
        return false;
    }

    contact.job_title.is_none() || contact.company_ref.is_none() || contact.linkedin.is_none()
}

/// Enrichment produced a company name that hasn't been resolved to a company record yet.
/// An existing company reference always wins.
pub fn needs_company_linking(contact: &Contact) -> bool {
    contact.status == EnrichmentStatus::Enriched
        && contact
            .enriched_company_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
        && contact.company_ref.is_none()
}

/// Submitted longer ago than `timeout` and still waiting
pub fn is_stuck(contact: &Contact, now: DateTime<Utc>, timeout: Duration) -> bool {
    if contact.status != EnrichmentStatus::SentToClay {
        return false;
    }

    match contact.sent_at {
        Some(sent_at) => now - sent_at > timeout,
        None => false,
    }
}

/// Get detailed eligibility reason
pub fn eligibility_reason(contact: &Contact, now: DateTime<Utc>, timeout: Duration) -> String {
    match &contact.status {
        EnrichmentStatus::SentToClay => match contact.sent_at {
            _ if is_stuck(contact, now, timeout) => {
                format!("Stuck in Clay for more than {} hours", timeout.num_hours())
            }
            Some(sent_at) => {
                let waited = now - sent_at;
                format!("Waiting on Clay ({}m since submission)", waited.num_minutes())
            }
            None => "Waiting on Clay (no submission time recorded)".to_string(),
        },
        EnrichmentStatus::Enriched if needs_company_linking(contact) => format!(
            "Needs company link to \"{}\"",
            contact.enriched_company_name.as_deref().unwrap_or_default()
        ),
        EnrichmentStatus::Enriched => "Enriched, nothing to link".to_string(),
        EnrichmentStatus::CompanyLinked => "Done (company linked)".to_string(),
        EnrichmentStatus::Skipped => "Skipped".to_string(),
        EnrichmentStatus::Failed => "Failed (not retried)".to_string(),
        EnrichmentStatus::Unknown(raw) => format!("Unrecognised status \"{}\", left alone", raw),
        EnrichmentStatus::Empty | EnrichmentStatus::Pending => {
            if contact.email.is_none() {
                "No email address".to_string()
            } else if needs_enrichment(contact) {
                let missing: Vec<&str> = [
                    ("job title", contact.job_title.is_none()),
                    ("company", contact.company_ref.is_none()),
                    ("linkedin", contact.linkedin.is_none()),
                ]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| *name)
                .collect();
                format!("Eligible for enrichment (missing {})", missing.join(", "))
            } else {
                "Already complete".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn contact(status: EnrichmentStatus) -> Contact {
        Contact {
            record_id: "rec_1".to_string(),
            email: Some("a@x.com".to_string()),
            status,
            ..Contact::default()
        }
    }

    #[test]
    fn fresh_contact_with_gaps_needs_enrichment() {
        assert!(needs_enrichment(&contact(EnrichmentStatus::Empty)));
        assert!(needs_enrichment(&contact(EnrichmentStatus::Pending)));
    }

    #[test]
    fn no_email_means_no_enrichment() {
        let mut c = contact(EnrichmentStatus::Empty);
        c.email = None;
        assert!(!needs_enrichment(&c));
    }

    #[test]
    fn in_flight_terminal_and_foreign_states_are_never_resubmitted() {
        for status in [
            EnrichmentStatus::SentToClay,
            EnrichmentStatus::Enriched,
            EnrichmentStatus::CompanyLinked,
            EnrichmentStatus::Skipped,
            EnrichmentStatus::Failed,
            EnrichmentStatus::Unknown("manual".to_string()),
        ] {
            assert!(!needs_enrichment(&contact(status.clone())), "{status}");
        }
    }

    #[test]
    fn fully_populated_contact_is_left_alone() {
        let mut c = contact(EnrichmentStatus::Empty);
        c.job_title = Some("CEO".to_string());
        c.company_ref = Some("c_1".to_string());
        c.linkedin = Some("https://linkedin.com/in/a".to_string());
        assert!(!needs_enrichment(&c));

        c.linkedin = None;
        assert!(needs_enrichment(&c));
    }

    #[test]
    fn company_linking_needs_enriched_name_and_no_reference() {
        let mut c = contact(EnrichmentStatus::Enriched);
        assert!(!needs_company_linking(&c));

        c.enriched_company_name = Some("Acme".to_string());
        assert!(needs_company_linking(&c));

        c.enriched_company_name = Some("   ".to_string());
        assert!(!needs_company_linking(&c));
    }

    #[test]
    fn existing_company_reference_excludes_linking() {
        let mut c = contact(EnrichmentStatus::Enriched);
        c.enriched_company_name = Some("Acme".to_string());
        c.company_ref = Some("c_1".to_string());
        assert!(!needs_company_linking(&c));
    }

    #[test]
    fn only_enriched_contacts_are_linked() {
        let mut c = contact(EnrichmentStatus::CompanyLinked);
        c.enriched_company_name = Some("Acme".to_string());
        assert!(!needs_company_linking(&c));
    }

    #[test]
    fn stuck_is_strictly_past_the_timeout() {
        let timeout = Duration::hours(2);
        let mut c = contact(EnrichmentStatus::SentToClay);

        c.sent_at = Some(now() - timeout - Duration::hours(1));
        assert!(is_stuck(&c, now(), timeout));

        c.sent_at = Some(now() - timeout + Duration::hours(1));
        assert!(!is_stuck(&c, now(), timeout));

        c.sent_at = Some(now() - timeout);
        assert!(!is_stuck(&c, now(), timeout));
    }

    #[test]
    fn not_stuck_without_timestamp_or_outside_sent_state() {
        let timeout = Duration::hours(2);
        let mut c = contact(EnrichmentStatus::SentToClay);
        assert!(!is_stuck(&c, now(), timeout));

        c.status = EnrichmentStatus::Enriched;
        c.sent_at = Some(now() - Duration::days(3));
        assert!(!is_stuck(&c, now(), timeout));
    }

    #[test]
    fn reasons_describe_each_state() {
        let timeout = Duration::hours(2);

        let fresh = contact(EnrichmentStatus::Empty);
        assert_eq!(
            eligibility_reason(&fresh, now(), timeout),
            "Eligible for enrichment (missing job title, company, linkedin)"
        );

        let mut stuck = contact(EnrichmentStatus::SentToClay);
        stuck.sent_at = Some(now() - Duration::hours(5));
        assert_eq!(
            eligibility_reason(&stuck, now(), timeout),
            "Stuck in Clay for more than 2 hours"
        );

        let mut waiting = contact(EnrichmentStatus::SentToClay);
        waiting.sent_at = Some(now() - Duration::minutes(30));
        assert_eq!(
            eligibility_reason(&waiting, now(), timeout),
            "Waiting on Clay (30m since submission)"
        );
    }
}
