pub mod coerce;
pub mod extract;
pub mod heuristic;
pub mod repair;

use std::time::Duration;

use serde_json::Value;
use crate::models::{ParseStrategy, ParsedResult, RawAgentResponse};
use coerce::{coerce, has_content, is_expected_object};
use tracing::debug;

/// Turns a raw agent reply into a [`ParsedResult`].
///
/// Stages run strictly in order and the first one that yields a JSON object
/// with an expected key wins: direct parse, delimited extraction, structural
/// repair, then keyword heuristics (which always succeed).
pub fn normalize(raw: &RawAgentResponse) -> ParsedResult {
    match &raw.outcome {
        Ok(text) => normalize_text(&raw.agent_id, text, raw.elapsed),
        Err(failure) => ParsedResult::failed(&raw.agent_id, failure.clone(), raw.elapsed),
    }
}

pub fn normalize_text(agent_id: &str, text: &str, elapsed: Duration) -> ParsedResult {
    let (strategy, value, mut notes) = recover_structure(text);
    let elapsed_ms = elapsed.as_millis() as u64;
    debug!(agent = agent_id, strategy = %strategy, "Reply normalized");

    match value {
        Some(value) => {
            let reply = coerce(agent_id, &value);
            notes.extend(reply.notes);
            ParsedResult {
                agent_id: agent_id.to_string(),
                findings: reply.findings,
                false_positives: reply.false_positives,
                scores: reply.scores,
                scores_reported: reply.scores_reported,
                parse_strategy: strategy,
                confidence: strategy.confidence(),
                summary: reply.summary,
                risk_level: reply.risk_level,
                deployment_recommendation: reply.deployment_recommendation,
                notes,
                error: None,
                elapsed_ms,
            }
        }
        None => {
            let verdict = heuristic::synthesize(text, agent_id);
            notes.push("no JSON recovered; findings inferred from keywords".to_string());
            ParsedResult {
                agent_id: agent_id.to_string(),
                findings: verdict.findings,
                false_positives: Vec::new(),
                scores: verdict.scores,
                scores_reported: false,
                parse_strategy: ParseStrategy::Heuristic,
                confidence: ParseStrategy::Heuristic.confidence(),
                summary: None,
                risk_level: Some(verdict.risk_level),
                deployment_recommendation: None,
                notes,
                error: None,
                elapsed_ms,
            }
        }
    }
}

fn parse_expected(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text.trim())
        .ok()
        .filter(is_expected_object)
}

/// Returns the winning stage and the recovered object (`None` for heuristics).
fn recover_structure(text: &str) -> (ParseStrategy, Option<Value>, Vec<String>) {
    if let Some(value) = parse_expected(text) {
        return (ParseStrategy::Direct, Some(value), Vec::new());
    }

    // An empty object ahead of a cut-off one is usually an echoed schema
    let cut_off = extract::unclosed_tail(text).is_some();
    for candidate in extract::extraction_candidates(text) {
        if let Some(value) = parse_expected(candidate) {
            if cut_off && !has_content(&value) {
                debug!("Skipping empty object ahead of an unclosed reply");
                continue;
            }
            return (ParseStrategy::Extracted, Some(value), Vec::new());
        }
    }

    if let Some(target) = extract::repair_target(text) {
        let mut current = target.to_string();
        let mut applied = Vec::new();
        for (name, repair) in repair::REPAIRS {
            let next = repair(&current);
            if next != current {
                applied.push(*name);
                current = next;
            }
            if let Some(value) = parse_expected(&current) {
                let note = format!("repaired: {}", applied.join(", "));
                return (ParseStrategy::Repaired, Some(value), vec![note]);
            }
        }
    }

    (ParseStrategy::Heuristic, None, Vec::new())
}
