use serde::{Serialize, Serializer};

/// Value of the `clay_enrichment_status` attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum EnrichmentStatus {
    #[default]
    Empty,
    Pending,
    SentToClay,
    Enriched,
    CompanyLinked,
    Skipped,
    Failed,
    /// Any value we don't own. Never touched.
    Unknown(String),
}

impl EnrichmentStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).unwrap_or("") {
            "" => EnrichmentStatus::Empty,
            "pending" => EnrichmentStatus::Pending,
            "sent_to_clay" => EnrichmentStatus::SentToClay,
            "enriched" => EnrichmentStatus::Enriched,
            "company_linked" => EnrichmentStatus::CompanyLinked,
            "skipped" => EnrichmentStatus::Skipped,
            "failed" => EnrichmentStatus::Failed,
            other => EnrichmentStatus::Unknown(other.to_string()),
        }
    }

    /// Wire value written to the CRM
    pub fn as_str(&self) -> &str {
        match self {
            EnrichmentStatus::Empty => "",
            EnrichmentStatus::Pending => "pending",
            EnrichmentStatus::SentToClay => "sent_to_clay",
            EnrichmentStatus::Enriched => "enriched",
            EnrichmentStatus::CompanyLinked => "company_linked",
            EnrichmentStatus::Skipped => "skipped",
            EnrichmentStatus::Failed => "failed",
            EnrichmentStatus::Unknown(raw) => raw,
        }
    }

    /// Not yet submitted; the only states new work is picked from
    pub fn is_open(&self) -> bool {
        matches!(self, EnrichmentStatus::Empty | EnrichmentStatus::Pending)
    }

    /// Transition table. Re-writing `enriched` or `failed` over itself is
    /// allowed so a repeated pass can overwrite the same fields.
    pub fn can_transition_to(&self, next: &EnrichmentStatus) -> bool {
        use EnrichmentStatus::*;

        match (self, next) {
            (Empty | Pending, SentToClay | Failed | Skipped) => true,
            (SentToClay, Enriched | Failed) => true,
            (Enriched, Enriched | CompanyLinked) => true,
            (Failed, Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichmentStatus::Empty => write!(f, "empty"),
            EnrichmentStatus::Unknown(raw) => write!(f, "unknown({})", raw),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl std::str::FromStr for EnrichmentStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(EnrichmentStatus::parse(Some(s)))
    }
}

impl Serialize for EnrichmentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
