use serde::{Deserialize, Serialize};

/// Severity level for a finding, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Returns a numeric rank where lower values indicate higher severity.
    /// Critical = 0, High = 1, Medium = 2, Low = 3, Info = 4.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }

    /// Lenient parse of the severity labels models actually emit.
    /// Returns `None` for anything unrecognized so the caller can record the coercion.
    pub fn parse_lenient(raw: &str) -> Option<Severity> {
        let lower = raw.trim().to_lowercase();
        let word = lower.trim_matches(|c: char| !c.is_alphanumeric());
        match word {
            "critical" | "crit" | "severe" | "blocker" => Some(Severity::Critical),
            "high" | "major" => Some(Severity::High),
            "medium" | "med" | "moderate" | "warning" => Some(Severity::Medium),
            "low" | "minor" => Some(Severity::Low),
            "info" | "informational" | "information" | "note" | "none" | "optimization" | "gas" => {
                Some(Severity::Info)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report bucket a finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Gas,
    Quality,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Security, Category::Gas, Category::Quality];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Security => "security",
            Category::Gas => "gas",
            Category::Quality => "quality",
        }
    }

    /// Prefix used for report-stable finding ids (`SEC-01`).
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Category::Security => "SEC",
            Category::Gas => "GAS",
            Category::Quality => "QUA",
        }
    }

    pub fn parse_lenient(raw: &str) -> Option<Category> {
        let lower = raw.trim().to_lowercase();
        if lower.contains("gas") || lower.contains("optimi") {
            Some(Category::Gas)
        } else if lower.contains("quality") || lower.contains("style") || lower.contains("best practice")
            || lower.contains("best_practice") || lower.contains("maintainab")
        {
            Some(Category::Quality)
        } else if lower.contains("secur") || lower.contains("vulnerab") {
            Some(Category::Security)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reported issue. Findings are value objects: two findings describe
/// the same issue when their [`Finding::dedup_key`] matches, regardless of id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub severity: Severity,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub impact: String,
    pub recommendation: String,
    pub code_reference: Option<String>,
    /// Agent that produced this finding (the most severe contributor after consensus).
    pub reported_by: String,
    /// Every distinct agent that reported the same finding, sorted.
    #[serde(default)]
    pub corroborated_by: Vec<String>,
    pub verified: bool,
    /// Records coercions applied while normalizing and consensus demotions.
    #[serde(default)]
    pub analysis_note: Option<String>,
}

impl Finding {
    pub fn dedup_key(&self) -> (Category, String) {
        (self.category, normalize_title(&self.title))
    }

    pub fn append_note(&mut self, note: &str) {
        self.analysis_note = Some(match self.analysis_note.take() {
            Some(existing) if !existing.is_empty() => format!("{}; {}", existing, note),
            _ => note.to_string(),
        });
    }
}

/// Case, punctuation and whitespace insensitive form of a title.
pub fn normalize_title(title: &str) -> String {
    title.to_lowercase()
        .trim()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
