use std::sync::Mutex;

use log::{debug, info, warn};

use crate::domain::domain_for_display;

use super::error::IssuanceError;

/// Which state machine a polling event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Registration,
    Authorization,
    Challenge,
    Certificate,
}

impl Phase {
    fn tag(&self) -> &'static str {
        match self {
            Phase::Registration => "[acme-reg]",
            Phase::Authorization => "[acme-authz]",
            Phase::Challenge => "[acme-challenge]",
            Phase::Certificate => "[acme-cert]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(String),
    TimedOut,
}

/// Checkpoints reported while an issuance step runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceEvent {
    RequestSent {
        phase: Phase,
        resource: &'static str,
        url: String,
    },
    ChallengeFound {
        domain: String,
        token: String,
        url: String,
    },
    PollTick {
        phase: Phase,
        domain: String,
        elapsed_secs: u64,
        status: String,
    },
    Finished {
        phase: Phase,
        domain: String,
        outcome: Outcome,
    },
}

impl Outcome {
    /// Terminal outcome of a finished step. Failures carry the CA body when
    /// there is one, the error text otherwise.
    pub fn of<T>(result: &Result<T, IssuanceError>) -> Self {
        match result {
            Ok(_) => Outcome::Succeeded,
            Err(
                IssuanceError::ChallengeTimedOut { .. }
                | IssuanceError::CertificateRequestTimedOut { .. },
            ) => Outcome::TimedOut,
            Err(err) => Outcome::Failed(
                err.response_body()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string()),
            ),
        }
    }
}

/// Advisory sink for issuance checkpoints. Never consulted for control flow.
pub trait IssuanceObserver: Send + Sync {
    fn on_event(&self, event: &IssuanceEvent);
}

/// Emits the `Finished` checkpoint for `result` and hands it back unchanged.
pub fn report_finished<T>(
    observer: &dyn IssuanceObserver,
    phase: Phase,
    domain: &str,
    result: Result<T, IssuanceError>,
) -> Result<T, IssuanceError> {
    observer.on_event(&IssuanceEvent::Finished {
        phase,
        domain: domain.to_string(),
        outcome: Outcome::of(&result),
    });
    result
}

/// Forwards every checkpoint to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl IssuanceObserver for LogObserver {
    fn on_event(&self, event: &IssuanceEvent) {
        match event {
            IssuanceEvent::RequestSent {
                phase,
                resource,
                url,
            } => debug!("{} sent {} request to {}", phase.tag(), resource, url),
            IssuanceEvent::ChallengeFound { domain, token, url } => info!(
                "[acme-authz] found http-01 challenge for {} (token {}, uri {})",
                domain_for_display(domain),
                token,
                url
            ),
            IssuanceEvent::PollTick {
                phase,
                domain,
                elapsed_secs,
                status,
            } => debug!(
                "{} {} still {} after {}s, retrying",
                phase.tag(),
                domain,
                status,
                elapsed_secs
            ),
            IssuanceEvent::Finished {
                phase,
                domain,
                outcome,
            } => match outcome {
                Outcome::Succeeded => info!("{} {} succeeded", phase.tag(), domain),
                Outcome::Failed(reason) => {
                    warn!("{} {} failed: {}", phase.tag(), domain, reason)
                }
                Outcome::TimedOut => warn!("{} {} timed out", phase.tag(), domain),
            },
        }
    }
}

/// Keeps every event in memory; handy for callers that report progress later.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<IssuanceEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<IssuanceEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl IssuanceObserver for RecordingObserver {
    fn on_event(&self, event: &IssuanceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
