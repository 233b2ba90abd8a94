use crate::models::{Category, Finding, RiskLevel, Scores, Severity, DEFAULT_SCORE};

/// Lowest score heuristic synthesis can produce.
pub const HEURISTIC_FLOOR: u8 = 10;

/// A keyword cluster and the finding it stands for.
struct Cluster {
    title: &'static str,
    keywords: &'static [&'static str],
    severity: Severity,
    category: Category,
    description: &'static str,
    recommendation: &'static str,
}

const CLUSTERS: &[Cluster] = &[
    Cluster {
        title: "Potential reentrancy",
        keywords: &["reentran", "re-entran"],
        severity: Severity::High,
        category: Category::Security,
        description: "External calls may allow a callee to re-enter before state is updated.",
        recommendation: "Apply checks-effects-interactions and a reentrancy guard.",
    },
    Cluster {
        title: "Access control weakness",
        keywords: &["access control", "onlyowner", "unauthorized", "unprotected function", "missing modifier"],
        severity: Severity::High,
        category: Category::Security,
        description: "Privileged functionality may be reachable by arbitrary callers.",
        recommendation: "Restrict privileged functions with explicit role or owner checks.",
    },
    Cluster {
        title: "Self-destruct capability",
        keywords: &["selfdestruct", "self-destruct", "self destruct", "suicide("],
        severity: Severity::Medium,
        category: Category::Security,
        description: "The contract can be destroyed, removing its code and forwarding its balance.",
        recommendation: "Remove selfdestruct or gate it behind strict, audited access control.",
    },
    Cluster {
        title: "Delegatecall usage",
        keywords: &["delegatecall"],
        severity: Severity::High,
        category: Category::Security,
        description: "Delegatecall executes foreign code against this contract's storage.",
        recommendation: "Only delegatecall trusted, immutable targets and validate storage layout.",
    },
    Cluster {
        title: "tx.origin authentication",
        keywords: &["tx.origin"],
        severity: Severity::Medium,
        category: Category::Security,
        description: "Authorization based on tx.origin can be bypassed through an intermediary contract.",
        recommendation: "Use msg.sender for authorization.",
    },
    Cluster {
        title: "Integer overflow or underflow",
        keywords: &["overflow", "underflow"],
        severity: Severity::Medium,
        category: Category::Security,
        description: "Arithmetic may wrap, particularly inside unchecked blocks or pre-0.8 compilers.",
        recommendation: "Use Solidity 0.8+ checked arithmetic and review unchecked blocks.",
    },
    Cluster {
        title: "Oracle manipulation",
        keywords: &["oracle manipulation", "price manipulation", "getreserves", "spot price", "flash loan"],
        severity: Severity::High,
        category: Category::Security,
        description: "Prices read from manipulable sources can be skewed within a single transaction.",
        recommendation: "Use time-weighted or decentralized price feeds with sanity bounds.",
    },
    Cluster {
        title: "Front-running exposure",
        keywords: &["front-run", "frontrun", "front run", "sandwich", "mev bot", "mev extraction"],
        severity: Severity::Medium,
        category: Category::Security,
        description: "Transaction ordering can be exploited by observers of the mempool.",
        recommendation: "Add slippage limits, commit-reveal schemes or deadlines.",
    },
    Cluster {
        title: "Timestamp dependence",
        keywords: &["block.timestamp", "timestamp dependen", "now >", "now <"],
        severity: Severity::Low,
        category: Category::Security,
        description: "Block timestamps can be influenced by block producers within a small window.",
        recommendation: "Avoid using timestamps for randomness or tight timing conditions.",
    },
    Cluster {
        title: "Unchecked external call",
        keywords: &["unchecked call", "unchecked return", "unchecked low-level", ".call{", ".call(", ".send("],
        severity: Severity::Medium,
        category: Category::Security,
        description: "Return values of low-level calls may be ignored, hiding failed transfers.",
        recommendation: "Check the success flag of every low-level call.",
    },
    Cluster {
        title: "Gas inefficiency",
        keywords: &["gas optimi", "gas cost", "gas usage", "gas-efficient", "unbounded loop"],
        severity: Severity::Low,
        category: Category::Gas,
        description: "Storage access or loop patterns may cost more gas than necessary.",
        recommendation: "Cache storage reads, bound loops and prefer calldata for read-only arguments.",
    },
    Cluster {
        title: "Code quality concerns",
        keywords: &["code quality", "todo", "fixme", "magic number", "naming convention", "missing natspec"],
        severity: Severity::Info,
        category: Category::Quality,
        description: "Maintainability issues were mentioned or detected.",
        recommendation: "Address outstanding TODOs, document public functions and name constants.",
    },
];

/// Findings and scores inferred from keywords when no structure could be recovered.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicVerdict {
    pub findings: Vec<Finding>,
    pub scores: Scores,
    pub risk_level: RiskLevel,
}

pub fn penalty(severity: Severity) -> u8 {
    match severity {
        Severity::Critical => 25,
        Severity::High => 15,
        Severity::Medium => 10,
        Severity::Low => 5,
        Severity::Info => 0,
    }
}

fn penalized(penalties: u32) -> u8 {
    (DEFAULT_SCORE as u32).saturating_sub(penalties).max(HEURISTIC_FLOOR as u32) as u8
}

/// Scan `text` for risk keyword clusters. Always yields at least one finding.
pub fn synthesize(text: &str, reported_by: &str) -> HeuristicVerdict {
    let lower = text.to_lowercase();
    let mut findings: Vec<Finding> = CLUSTERS
        .iter()
        .filter(|cluster| cluster.keywords.iter().any(|k| lower.contains(k)))
        .enumerate()
        .map(|(i, cluster)| Finding {
            id: format!("{}#h{}", reported_by, i + 1),
            severity: cluster.severity,
            category: cluster.category,
            title: cluster.title.to_string(),
            description: cluster.description.to_string(),
            impact: String::new(),
            recommendation: cluster.recommendation.to_string(),
            code_reference: None,
            reported_by: reported_by.to_string(),
            corroborated_by: vec![reported_by.to_string()],
            verified: false,
            analysis_note: Some("inferred from keywords; no structured reply".to_string()),
        })
        .collect();

    let per_category = |category: Category| -> u32 {
        findings
            .iter()
            .filter(|f| f.category == category)
            .map(|f| penalty(f.severity) as u32)
            .sum()
    };
    let scores = Scores {
        security: penalized(per_category(Category::Security)),
        gas: penalized(per_category(Category::Gas)),
        quality: penalized(per_category(Category::Quality)),
        overall: penalized(findings.iter().map(|f| penalty(f.severity) as u32).sum()),
    };
    let risk_level = RiskLevel::from_findings(&findings);

    if findings.is_empty() {
        findings.push(Finding {
            id: format!("{}#h1", reported_by),
            severity: Severity::Info,
            category: Category::Quality,
            title: "No structured analysis recovered".to_string(),
            description: "The reply could not be parsed and mentioned no known risk patterns.".to_string(),
            impact: String::new(),
            recommendation: "Review the contract manually or re-run the audit.".to_string(),
            code_reference: None,
            reported_by: reported_by.to_string(),
            corroborated_by: vec![reported_by.to_string()],
            verified: false,
            analysis_note: Some("placeholder; no structured reply".to_string()),
        });
    }

    HeuristicVerdict { findings, scores, risk_level }
}
