use serde_json::{Map, Value};
use crate::models::{
    clamp_score, Category, DeploymentRecommendation, Finding, RiskLevel, Scores, Severity,
};

/// Keys that may hold a finding list, with the category their entries default to.
pub const FINDING_KEYS: &[(&str, Option<Category>)] = &[
    ("security_findings", Some(Category::Security)),
    ("gas_optimizations", Some(Category::Gas)),
    ("code_quality", Some(Category::Quality)),
    ("verified_findings", None),
    ("findings", None),
    ("vulnerabilities", Some(Category::Security)),
    ("issues", None),
];

const SCORE_KEYS: &[&str] = &["scores", "overall_score"];

const TITLE_KEYS: &[&str] = &["title", "name", "issue", "vulnerability"];
const SEVERITY_KEYS: &[&str] = &["severity", "risk", "level", "impact_level"];
const DESCRIPTION_KEYS: &[&str] = &["description", "details", "desc", "explanation"];
const RECOMMENDATION_KEYS: &[&str] = &["recommendation", "fix", "remediation", "mitigation", "suggestion"];
const LOCATION_KEYS: &[&str] = &["code_reference", "location", "line", "lines", "function"];

/// True for a JSON object carrying at least one findings alias or score key.
pub fn is_expected_object(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => {
            FINDING_KEYS.iter().any(|(k, _)| map.contains_key(*k))
                || SCORE_KEYS.iter().any(|k| map.contains_key(*k))
        }
        None => false,
    }
}

/// True when the object carries at least one finding or a reported score.
/// A schema echo such as `{"scores": {}}` has no content.
pub fn has_content(value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    let has_findings = FINDING_KEYS
        .iter()
        .filter_map(|(k, _)| map.get(*k))
        .any(|v| v.as_array().is_some_and(|list| !list.is_empty()));
    has_findings || coerce_scores(map).1
}

/// Fields recovered from a structurally valid reply.
#[derive(Debug, Clone, Default)]
pub struct CoercedReply {
    pub findings: Vec<Finding>,
    pub false_positives: Vec<Finding>,
    pub scores: Scores,
    pub scores_reported: bool,
    pub summary: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub deployment_recommendation: Option<DeploymentRecommendation>,
    pub notes: Vec<String>,
}

pub fn coerce(agent_id: &str, value: &Value) -> CoercedReply {
    let empty = Map::new();
    let map = value.as_object().unwrap_or(&empty);
    let mut reply = CoercedReply::default();
    let mut counter = 0usize;

    for (key, default_category) in FINDING_KEYS {
        if let Some(Value::Array(items)) = map.get(*key) {
            for item in items {
                counter += 1;
                let finding = coerce_finding(agent_id, item, *default_category, counter, &mut reply.notes);
                reply.findings.push(finding);
            }
        }
    }
    if let Some(Value::Array(items)) = map.get("false_positives") {
        for item in items {
            counter += 1;
            let finding = coerce_finding(agent_id, item, None, counter, &mut reply.notes);
            reply.false_positives.push(finding);
        }
    }

    let (scores, reported) = coerce_scores(map);
    reply.scores = scores;
    reply.scores_reported = reported;
    reply.summary = text_field(map, &["summary", "executive_summary", "overview"]);
    reply.risk_level = text_field(map, &["risk_level", "overall_risk"]).and_then(|r| RiskLevel::parse_lenient(&r));
    reply.deployment_recommendation = text_field(map, &["deployment_recommendation", "recommendation"])
        .and_then(|r| DeploymentRecommendation::parse_lenient(&r));
    reply
}

fn coerce_finding(
    agent_id: &str,
    item: &Value,
    default_category: Option<Category>,
    index: usize,
    notes: &mut Vec<String>,
) -> Finding {
    let empty = Map::new();
    let (map, bare_title) = match item {
        Value::Object(map) => (map, None),
        Value::String(s) => (&empty, Some(s.trim().to_string())),
        _ => (&empty, None),
    };

    let mut note: Vec<String> = Vec::new();
    let title = bare_title
        .filter(|t| !t.is_empty())
        .or_else(|| text_field(map, TITLE_KEYS))
        .unwrap_or_else(|| {
            note.push("title missing".to_string());
            format!("Untitled finding #{}", index)
        });
    let description = text_field(map, DESCRIPTION_KEYS).unwrap_or_default();

    let severity = match text_field(map, SEVERITY_KEYS) {
        Some(raw) => Severity::parse_lenient(&raw).unwrap_or_else(|| {
            note.push(format!("unrecognized severity '{}' treated as INFO", raw));
            Severity::Info
        }),
        None => {
            note.push("severity missing, treated as INFO".to_string());
            Severity::Info
        }
    };

    let category = text_field(map, &["category", "type"])
        .and_then(|c| Category::parse_lenient(&c))
        .or(default_category)
        .or_else(|| Category::parse_lenient(&format!("{} {}", title, description)))
        .unwrap_or(Category::Security);

    let contributors = reporters(map);
    let reported_by = contributors.first().cloned().unwrap_or_else(|| agent_id.to_string());
    let corroborated_by = if contributors.is_empty() { vec![agent_id.to_string()] } else { contributors };

    let mut finding = Finding {
        id: format!("{}#{}", agent_id, index),
        severity,
        category,
        title,
        description,
        impact: text_field(map, &["impact"]).unwrap_or_default(),
        recommendation: text_field(map, RECOMMENDATION_KEYS).unwrap_or_default(),
        code_reference: text_field(map, LOCATION_KEYS),
        reported_by,
        corroborated_by,
        verified: map.get("verified").and_then(Value::as_bool).unwrap_or(false),
        analysis_note: text_field(map, &["analysis_note", "note", "supervisor_note"]),
    };
    for n in &note {
        finding.append_note(n);
        notes.push(format!("finding #{}: {}", index, n));
    }
    finding
}

/// First present key rendered as text. Numbers and arrays of scalars are joined.
fn text_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match map.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) if !items.is_empty() => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    })
}

fn reporters(map: &Map<String, Value>) -> Vec<String> {
    let mut ids: Vec<String> = match map.get("reported_by").or_else(|| map.get("agents")) {
        Some(Value::String(s)) => s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        _ => Vec::new(),
    };
    ids.sort();
    ids.dedup();
    ids
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches("/100").trim().parse().ok(),
        _ => None,
    }
}

/// Missing category scores take the reported overall score; a missing overall
/// is the mean of the reported categories; nothing reported means the default.
fn coerce_scores(map: &Map<String, Value>) -> (Scores, bool) {
    let scores_obj = map.get("scores").and_then(Value::as_object);
    let read = |key: &str| scores_obj.and_then(|s| s.get(key)).and_then(number);

    let overall = read("overall").or_else(|| map.get("overall_score").and_then(number));
    let security = read("security");
    let gas = read("gas");
    let quality = read("quality");

    let categories: Vec<f64> = [security, gas, quality].into_iter().flatten().collect();
    if overall.is_none() && categories.is_empty() {
        return (Scores::default(), false);
    }

    let overall = overall.unwrap_or_else(|| categories.iter().sum::<f64>() / categories.len() as f64);
    let fill = |v: Option<f64>| clamp_score(v.unwrap_or(overall));
    let scores = Scores {
        security: fill(security),
        gas: fill(gas),
        quality: fill(quality),
        overall: clamp_score(overall),
    };
    (scores, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_echo_has_no_content() {
        assert!(!has_content(&json!({"scores": {}})));
        assert!(!has_content(&json!({"security_findings": [], "scores": {"overall": null}})));
        assert!(has_content(&json!({"findings": [{"title": "x"}]})));
        assert!(has_content(&json!({"overall_score": 70})));
    }

    #[test]
    fn test_expected_object_detection() {
        assert!(is_expected_object(&json!({"findings": []})));
        assert!(is_expected_object(&json!({"overall_score": 80})));
        assert!(!is_expected_object(&json!({"answer": 42})));
        assert!(!is_expected_object(&json!([1, 2])));
    }

    #[test]
    fn test_category_from_containing_key() {
        let reply = coerce("a", &json!({
            "security_findings": [{"title": "Reentrancy", "severity": "HIGH"}],
            "gas_optimizations": [{"title": "Cache length", "severity": "LOW"}],
            "code_quality": [{"title": "Naming", "severity": "INFO"}]
        }));
        let cats: Vec<Category> = reply.findings.iter().map(|f| f.category).collect();
        assert_eq!(cats, vec![Category::Security, Category::Gas, Category::Quality]);
        assert!(reply.notes.is_empty());
    }

    #[test]
    fn test_missing_and_unknown_severity_become_info() {
        let reply = coerce("a", &json!({"findings": [
            {"title": "No severity"},
            {"title": "Odd", "severity": "catastrophic"},
            {"severity": "high"}
        ]}));
        assert_eq!(reply.findings[0].severity, Severity::Info);
        assert_eq!(reply.findings[1].severity, Severity::Info);
        assert!(reply.findings[1].analysis_note.as_deref().unwrap().contains("catastrophic"));
        assert_eq!(reply.findings[2].title, "Untitled finding #3");
        assert_eq!(reply.findings[2].severity, Severity::High);
        assert_eq!(reply.notes.len(), 3);
    }

    #[test]
    fn test_category_from_keywords_then_security() {
        let reply = coerce("a", &json!({"findings": [
            {"title": "Gas optimization for loop", "severity": "LOW"},
            {"title": "Weird thing", "severity": "LOW"}
        ]}));
        assert_eq!(reply.findings[0].category, Category::Gas);
        assert_eq!(reply.findings[1].category, Category::Security);
    }

    #[test]
    fn test_scores_partial_and_clamped() {
        let reply = coerce("a", &json!({"scores": {"security": 140, "overall": "60"}}));
        assert!(reply.scores_reported);
        assert_eq!(reply.scores.security, 100);
        assert_eq!(reply.scores.gas, 60);
        assert_eq!(reply.scores.overall, 60);

        let none = coerce("a", &json!({"findings": []}));
        assert!(!none.scores_reported);
        assert_eq!(none.scores, Scores::default());
    }

    #[test]
    fn test_supervisor_reporters_and_false_positives() {
        let reply = coerce("sup", &json!({
            "verified_findings": [{"title": "Reentrancy", "severity": "CRITICAL", "category": "security",
                                   "reported_by": ["b", "a"], "verified": true}],
            "false_positives": [{"title": "Timestamp", "severity": "LOW", "reported_by": "c"}],
            "risk_level": "CRITICAL",
            "deployment_recommendation": "do_not_deploy"
        }));
        assert_eq!(reply.findings[0].reported_by, "a");
        assert_eq!(reply.findings[0].corroborated_by, vec!["a", "b"]);
        assert!(reply.findings[0].verified);
        assert_eq!(reply.false_positives.len(), 1);
        assert_eq!(reply.risk_level, Some(RiskLevel::Critical));
        assert_eq!(reply.deployment_recommendation, Some(DeploymentRecommendation::DoNotDeploy));
    }
}
