//! Keyword-based priority classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ticket priority, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Every priority in precedence order, highest first.
    pub const PRECEDENCE: [Priority; 4] = [
        Priority::Urgent,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Promised response time.
    pub fn estimated_response(&self) -> &'static str {
        match self {
            Priority::Urgent => "30 minutes",
            Priority::High => "2 hours",
            Priority::Medium => "4 hours",
            Priority::Low => "24 hours",
        }
    }

    /// Team the ticket is routed to.
    pub fn assignee(&self) -> &'static str {
        match self {
            Priority::Urgent => "on-call-team",
            _ => "support-team-1",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Subscription tier of the customer's account.
///
/// Tiers other than the known ones are kept verbatim so they can still be
/// recorded on the ticket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlanTier {
    Free,
    Pro,
    Enterprise,
    Other(String),
}

impl PlanTier {
    pub fn as_str(&self) -> &str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
            PlanTier::Enterprise => "enterprise",
            PlanTier::Other(s) => s,
        }
    }
}

impl From<&str> for PlanTier {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => PlanTier::Free,
            "pro" => PlanTier::Pro,
            "enterprise" => PlanTier::Enterprise,
            _ => PlanTier::Other(s.to_string()),
        }
    }
}

impl From<String> for PlanTier {
    fn from(s: String) -> Self {
        PlanTier::from(s.as_str())
    }
}

impl From<PlanTier> for String {
    fn from(tier: PlanTier) -> Self {
        tier.as_str().to_string()
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default keyword triggers per priority.
pub const DEFAULT_KEYWORDS: &[(Priority, &[&str])] = &[
    (Priority::Urgent, &["urgent", "emergency", "critical", "broken"]),
    (Priority::High, &["important", "error", "failed"]),
    (Priority::Medium, &["issue", "problem", "bug"]),
    (Priority::Low, &["how to", "help"]),
];

/// Maps a free-text description and plan tier to a priority.
///
/// Rules are kept sorted by precedence, so the first matching rule is always
/// the highest-priority match regardless of the order they were supplied in
/// or where the keyword appears in the text.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<(Priority, Vec<String>)>,
}

impl Classifier {
    pub fn new<I, K, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = (Priority, K)>,
        K: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules: Vec<(Priority, Vec<String>)> = rules
            .into_iter()
            .map(|(priority, keywords)| {
                let keywords = keywords
                    .into_iter()
                    .map(|k| k.as_ref().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (priority, keywords)
            })
            .collect();
        rules.sort_by(|a, b| b.0.cmp(&a.0));
        Self { rules }
    }

    /// Rules in the order they are evaluated.
    pub fn rules(&self) -> &[(Priority, Vec<String>)] {
        &self.rules
    }

    pub fn classify(&self, description: &str, plan: &PlanTier) -> Priority {
        let text = description.to_lowercase();
        self.rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|(priority, _)| *priority)
            .unwrap_or_else(|| Self::fallback(plan))
    }

    /// Priority used when no keyword matches.
    pub fn fallback(plan: &PlanTier) -> Priority {
        match plan {
            PlanTier::Enterprise => Priority::High,
            _ => Priority::Medium,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().map(|(p, k)| (*p, k.iter().copied())))
    }
}

/// Classify with the default keyword table.
pub fn classify(description: &str, plan: &PlanTier) -> Priority {
    Classifier::default().classify(description, plan)
}
