use std::collections::HashMap;
use std::time::{Duration, Instant};

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use crate::pipeline::{AuditEvent, AuditStage};
use crate::utils::formatting::format_duration;

/// Stages an audit reports before its verdict is consolidated.
const STAGE_COUNT: u64 = 4;

fn styled(base: ProgressStyle, template: &str) -> ProgressStyle {
    base.clone().template(template).unwrap_or(base)
}

/// Renders audit events as indicatif spinners, one per agent.
pub struct AuditProgress {
    multi: MultiProgress,
    stage_bar: Option<ProgressBar>,
    agent_bars: HashMap<String, ProgressBar>,
    status_bar: ProgressBar,
    start_time: Instant,
}

impl AuditProgress {
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status_bar = multi.add(ProgressBar::new_spinner());
        status_bar.set_style(styled(ProgressStyle::default_spinner(), "  {spinner:.cyan} {msg}"));
        status_bar.set_message("Preparing audit...");
        status_bar.enable_steady_tick(Duration::from_millis(120));

        Self {
            multi,
            stage_bar: None,
            agent_bars: HashMap::new(),
            status_bar,
            start_time: Instant::now(),
        }
    }

    pub fn handle_event(&mut self, event: &AuditEvent) {
        match event {
            AuditEvent::AuditStarted { contract, tier, agents, supervisor, .. } => {
                let bar = self.multi.insert_before(&self.status_bar, ProgressBar::new(STAGE_COUNT));
                bar.set_style(
                    styled(
                        ProgressStyle::default_bar(),
                        "  {bar:30.cyan/dark_gray} {pos}/{len} stages | {msg}",
                    )
                    .progress_chars("█▓░"),
                );
                bar.set_message(format!("Auditing {} ({} tier)", contract, tier));
                self.stage_bar = Some(bar);
                self.status_bar.set_message(format!(
                    "{} agents, supervisor {}",
                    agents.len(),
                    supervisor
                ));
            }
            AuditEvent::StageEntered { stage } => {
                if let Some(bar) = &self.stage_bar {
                    if *stage != AuditStage::VerifyingFallback {
                        bar.inc(1);
                    }
                    bar.set_message(stage.display_name().to_string());
                }
            }
            AuditEvent::AgentStarted { agent_id } => {
                let bar = self.multi.insert_before(&self.status_bar, ProgressBar::new_spinner());
                bar.set_style(styled(ProgressStyle::default_spinner(), "    {spinner:.yellow} {msg}"));
                bar.set_message(agent_id.clone());
                bar.enable_steady_tick(Duration::from_millis(100));
                self.agent_bars.insert(agent_id.clone(), bar);
            }
            AuditEvent::AgentReplied { agent_id, elapsed_ms } => {
                if let Some(bar) = self.agent_bars.remove(agent_id) {
                    bar.finish_and_clear();
                }
                self.println(&format!(
                    "    {} {} replied in {}",
                    style("✓").green(),
                    agent_id,
                    format_duration(*elapsed_ms)
                ));
            }
            AuditEvent::AgentFailed { agent_id, error } => {
                if let Some(bar) = self.agent_bars.remove(agent_id) {
                    bar.finish_and_clear();
                }
                self.println(&format!("    {} {} failed: {}", style("✗").red(), agent_id, error));
            }
            AuditEvent::AgentNormalized { agent_id, strategy, findings } => {
                self.status_bar.set_message(format!(
                    "{}: {} findings via {}",
                    agent_id,
                    findings,
                    strategy.as_str()
                ));
            }
            AuditEvent::SupervisorFallback { reason } => {
                self.println(&format!(
                    "  {} Supervisor unavailable, using local consensus: {}",
                    style("⚠").yellow(),
                    reason
                ));
            }
            AuditEvent::AuditCompleted { overall_score, risk_level, findings, supervisor_verified, .. } => {
                for (_, bar) in self.agent_bars.drain() {
                    bar.finish_and_clear();
                }
                if let Some(bar) = self.stage_bar.take() {
                    bar.finish_and_clear();
                }
                let verified = if *supervisor_verified { "supervisor verified" } else { "unverified" };
                self.status_bar.finish_with_message(format!(
                    "Audit complete: score {}/100 | {} risk | {} findings | {} | {}",
                    overall_score,
                    risk_level.as_str(),
                    findings,
                    verified,
                    format_duration(self.start_time.elapsed().as_millis() as u64),
                ));
            }
        }
    }

    fn println(&self, msg: &str) {
        let _ = self.multi.println(msg);
    }

    pub fn finish(&self) {
        if !self.status_bar.is_finished() {
            self.status_bar.finish_and_clear();
        }
    }
}

impl Default for AuditProgress {
    fn default() -> Self {
        Self::new()
    }
}
