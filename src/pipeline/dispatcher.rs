use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use crate::agents::AgentSpec;
use crate::errors::{with_retry, RetryConfig};
use crate::models::{FailureKind, RawAgentResponse, TransportFailure};
use super::events::{emit, AuditEvent, EventSender};
use super::transport::AnalysisTransport;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Global upper bound on in-flight agent calls.
    pub max_concurrency: usize,
    pub retry: RetryConfig,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: crate::config::DEFAULT_MAX_CONCURRENCY,
            retry: RetryConfig::default(),
        }
    }
}

/// One agent plus the system prompt it runs under.
#[derive(Debug, Clone)]
pub struct AgentCall {
    pub agent: AgentSpec,
    pub system: String,
}

/// Fans one prompt out to many agents concurrently.
pub struct Dispatcher {
    transport: Arc<dyn AnalysisTransport>,
    settings: DispatchSettings,
    events: Option<EventSender>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn AnalysisTransport>, settings: DispatchSettings) -> Self {
        Self { transport, settings, events: None }
    }

    pub fn with_events(mut self, tx: Option<EventSender>) -> Self {
        self.events = tx;
        self
    }

    /// Call every agent with the same prompt and wait for all of them to settle.
    ///
    /// Each call gets its own deadline; a timeout, error or panic in one call
    /// produces a failed response for that agent only. Results are sorted by
    /// agent id.
    pub async fn dispatch(&self, calls: Vec<AgentCall>, prompt: Arc<str>, deadline: Duration) -> Vec<RawAgentResponse> {
        if calls.is_empty() {
            return Vec::new();
        }
        let permits = calls.len().min(self.settings.max_concurrency.max(1));
        let semaphore = Arc::new(Semaphore::new(permits));
        info!(agents = calls.len(), concurrency = permits, deadline_secs = deadline.as_secs(), "Dispatching agent calls");

        let mut agent_ids = Vec::with_capacity(calls.len());
        let handles: Vec<_> = calls.into_iter().map(|call| {
            agent_ids.push(call.agent.id.clone());
            let transport = self.transport.clone();
            let semaphore = semaphore.clone();
            let prompt = prompt.clone();
            let retry = self.settings.retry.clone();
            let events = self.events.clone();

            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return RawAgentResponse {
                            agent_id: call.agent.id.clone(),
                            outcome: Err(TransportFailure::new(FailureKind::Internal, e.to_string())),
                            elapsed: Duration::ZERO,
                        };
                    }
                };
                emit(&events, AuditEvent::AgentStarted { agent_id: call.agent.id.clone() });
                let response = call_with_deadline(transport.as_ref(), &call, &prompt, deadline, &retry).await;
                report(&events, &response);
                response
            })
        }).collect();

        let results = futures::future::join_all(handles).await;
        let mut responses: Vec<RawAgentResponse> = results
            .into_iter()
            .zip(agent_ids)
            .map(|(result, agent_id)| match result {
                Ok(response) => response,
                Err(e) => {
                    error!(agent = %agent_id, error = %e, "Agent task panicked");
                    let response = RawAgentResponse {
                        agent_id,
                        outcome: Err(TransportFailure::new(FailureKind::Internal, format!("agent task failed: {}", e))),
                        elapsed: Duration::ZERO,
                    };
                    report(&self.events, &response);
                    response
                }
            })
            .collect();

        responses.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        responses
    }

    /// Single call under the same deadline and retry policy, used for the supervisor.
    pub async fn call_one(&self, call: &AgentCall, prompt: &str, deadline: Duration) -> RawAgentResponse {
        emit(&self.events, AuditEvent::AgentStarted { agent_id: call.agent.id.clone() });
        let response = call_with_deadline(self.transport.as_ref(), call, prompt, deadline, &self.settings.retry).await;
        report(&self.events, &response);
        response
    }
}

async fn call_with_deadline(
    transport: &dyn AnalysisTransport,
    call: &AgentCall,
    prompt: &str,
    deadline: Duration,
    retry: &RetryConfig,
) -> RawAgentResponse {
    let started = Instant::now();
    let operation = format!("agent:{}", call.agent.id);
    let until = tokio::time::Instant::now() + deadline;
    let attempt = with_retry(&operation, retry, Some(until), || {
        transport.call(&call.agent, prompt, &call.system)
    });

    let outcome = match tokio::time::timeout(deadline, attempt).await {
        Ok(Ok(text)) if text.trim().is_empty() => {
            Err(TransportFailure::new(FailureKind::EmptyPayload, "reply contained no text"))
        }
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(TransportFailure::from(&e)),
        Err(_) => Err(TransportFailure::timeout(deadline)),
    };

    RawAgentResponse {
        agent_id: call.agent.id.clone(),
        outcome,
        elapsed: started.elapsed(),
    }
}

fn report(events: &Option<EventSender>, response: &RawAgentResponse) {
    let elapsed_ms = response.elapsed.as_millis() as u64;
    match &response.outcome {
        Ok(text) => {
            info!(agent = %response.agent_id, elapsed_ms, chars = text.len(), "Agent replied");
            emit(events, AuditEvent::AgentReplied { agent_id: response.agent_id.clone(), elapsed_ms });
        }
        Err(failure) => {
            warn!(agent = %response.agent_id, elapsed_ms, error = %failure, "Agent call failed");
            emit(events, AuditEvent::AgentFailed {
                agent_id: response.agent_id.clone(),
                error: failure.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;
    use crate::agents::{Specialty, Tier};
    use crate::errors::QuorumError;

    struct FakeTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisTransport for FakeTransport {
        async fn call(&self, agent: &AgentSpec, _prompt: &str, _system: &str) -> Result<String, QuorumError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let result = match agent.id.as_str() {
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("late".to_string())
                }
                "denied" => Err(QuorumError::Authentication("bad key".into())),
                "blank" => Ok("   \n".to_string()),
                "panics" => panic!("transport bug"),
                _ => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(format!("{{\"summary\": \"{}\"}}", agent.id))
                }
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn call(id: &str) -> AgentCall {
        AgentCall {
            agent: AgentSpec {
                id: id.to_string(),
                display_name: id.to_string(),
                specialty: Specialty::General,
                tier: Tier::Free,
                provider: "openrouter".to_string(),
                model: "m".to_string(),
            },
            system: "sys".to_string(),
        }
    }

    fn dispatcher(max_concurrency: usize) -> (Dispatcher, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport { in_flight: AtomicUsize::new(0), peak: AtomicUsize::new(0) });
        let settings = DispatchSettings { max_concurrency, retry: RetryConfig { max_retries: 0 } };
        (Dispatcher::new(transport.clone(), settings), transport)
    }

    #[tokio::test]
    async fn test_failures_are_isolated_and_sorted() {
        let (dispatcher, _) = dispatcher(8);
        let calls = vec![call("zeta"), call("denied"), call("blank"), call("panics"), call("alpha")];
        let responses = dispatcher.dispatch(calls, Arc::from("prompt"), Duration::from_secs(2)).await;

        let ids: Vec<&str> = responses.iter().map(|r| r.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "blank", "denied", "panics", "zeta"]);
        assert!(responses[0].is_success());
        assert_eq!(responses[1].outcome.as_ref().unwrap_err().kind, FailureKind::EmptyPayload);
        assert_eq!(responses[2].outcome.as_ref().unwrap_err().kind, FailureKind::Authentication);
        assert_eq!(responses[3].outcome.as_ref().unwrap_err().kind, FailureKind::Internal);
        assert!(responses[4].is_success());
    }

    #[tokio::test]
    async fn test_deadline_applies_per_call() {
        let (dispatcher, _) = dispatcher(8);
        let responses = dispatcher
            .dispatch(vec![call("slow"), call("fast")], Arc::from("prompt"), Duration::from_millis(300))
            .await;
        assert!(responses[0].is_success());
        assert_eq!(responses[0].agent_id, "fast");
        assert_eq!(responses[1].outcome.as_ref().unwrap_err().kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let (dispatcher, transport) = dispatcher(2);
        let calls = (0..6).map(|i| call(&format!("agent-{}", i))).collect();
        let responses = dispatcher.dispatch(calls, Arc::from("prompt"), Duration::from_secs(2)).await;
        assert_eq!(responses.len(), 6);
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_events_follow_outcomes() {
        let (dispatcher, _) = dispatcher(4);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let dispatcher = dispatcher.with_events(Some(tx));
        dispatcher.dispatch(vec![call("alpha"), call("denied")], Arc::from("p"), Duration::from_secs(2)).await;
        drop(dispatcher);

        let mut replied = 0;
        let mut failed = 0;
        while let Some(event) = rx.recv().await {
            match event {
                AuditEvent::AgentReplied { .. } => replied += 1,
                AuditEvent::AgentFailed { .. } => failed += 1,
                _ => {}
            }
        }
        assert_eq!((replied, failed), (1, 1));
    }
}
