use log::warn;
use serde_json::{Value, json};

use crate::core::types::Challenge;

use super::{
    authorization::HTTP_01,
    error::IssuanceError,
    observer::{IssuanceEvent, IssuanceObserver, Phase, report_finished},
    poll::{Pause, PollOutcome, poll_fixed_interval},
    transport::{Method, Transport},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChallengeStatus {
    Missing,
    Invalid,
    Pending,
    /// `valid`, or anything else the CA reports that is neither pending nor invalid.
    Settled(String),
}

fn status_of(response: &Value) -> ChallengeStatus {
    match response.get("status").and_then(Value::as_str) {
        None => ChallengeStatus::Missing,
        Some("invalid") => ChallengeStatus::Invalid,
        Some("pending") => ChallengeStatus::Pending,
        Some(other) => ChallengeStatus::Settled(other.to_string()),
    }
}

/// Submits a published challenge and waits for the CA to validate it.
pub struct ChallengeValidator<'a> {
    transport: &'a mut dyn Transport,
    observer: &'a dyn IssuanceObserver,
    pause: &'a dyn Pause,
}

impl<'a> ChallengeValidator<'a> {
    pub fn new(
        transport: &'a mut dyn Transport,
        observer: &'a dyn IssuanceObserver,
        pause: &'a dyn Pause,
    ) -> Self {
        Self {
            transport,
            observer,
            pause,
        }
    }

    /// Returns once the authorization left `pending` for anything but
    /// `invalid`. Any status other than `pending`/`invalid` counts as success,
    /// not only `valid`.
    ///
    /// A `timeout_secs` of 0 is rejected with `InvalidArgument` before anything
    /// is sent, rather than submitting and timing out without a single poll.
    pub fn validate(&mut self, challenge: &Challenge, timeout_secs: u64) -> Result<(), IssuanceError> {
        if timeout_secs == 0 {
            return Err(IssuanceError::InvalidArgument(
                "timeout must be at least one second".to_string(),
            ));
        }
        let result = self.submit_and_wait(challenge, timeout_secs);
        report_finished(self.observer, Phase::Challenge, &challenge.domain, result)
    }

    fn submit_and_wait(&mut self, challenge: &Challenge, timeout_secs: u64) -> Result<(), IssuanceError> {
        let payload = json!({
            "resource": "challenge",
            "type": HTTP_01,
            "keyAuthorization": challenge.key_authorization,
            "token": challenge.token,
        });
        self.observer.on_event(&IssuanceEvent::RequestSent {
            phase: Phase::Challenge,
            resource: "challenge",
            url: challenge.challenge_url.clone(),
        });
        let submitted = self
            .transport
            .request(Method::Post, &challenge.challenge_url, Some(&payload))?;
        if matches!(
            status_of(&submitted),
            ChallengeStatus::Missing | ChallengeStatus::Invalid
        ) {
            return Err(challenge_failed(challenge, &submitted));
        }

        let transport = &mut *self.transport;
        let observer = self.observer;
        let outcome = poll_fixed_interval(
            &format!("challenge for {}", challenge.domain),
            timeout_secs,
            self.pause,
            |elapsed| {
                let response =
                    transport.request(Method::Get, &challenge.authorization_location, None)?;
                match status_of(&response) {
                    ChallengeStatus::Missing | ChallengeStatus::Invalid => {
                        Err(challenge_failed(challenge, &response))
                    }
                    ChallengeStatus::Pending => {
                        observer.on_event(&IssuanceEvent::PollTick {
                            phase: Phase::Challenge,
                            domain: challenge.domain.clone(),
                            elapsed_secs: elapsed,
                            status: "pending".to_string(),
                        });
                        Ok(PollOutcome::Pending)
                    }
                    ChallengeStatus::Settled(status) => Ok(PollOutcome::Terminal(status)),
                }
            },
        )?;

        match outcome {
            PollOutcome::Terminal(status) => {
                if status != "valid" {
                    warn!(
                        "[acme-challenge] {} settled with non-standard status {:?}; treating as success",
                        challenge.domain, status
                    );
                }
                Ok(())
            }
            PollOutcome::Pending | PollOutcome::TimedOut => Err(IssuanceError::ChallengeTimedOut {
                domain: challenge.domain.clone(),
                timeout_secs,
            }),
        }
    }
}

fn challenge_failed(challenge: &Challenge, response: &Value) -> IssuanceError {
    IssuanceError::ChallengeFailed {
        domain: challenge.domain.clone(),
        body: response.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuance::observer::{Outcome, RecordingObserver};
    use crate::issuance::poll::testing::CountingPause;
    use crate::issuance::transport::scripted::{Reply, ScriptedTransport};

    fn challenge() -> Challenge {
        Challenge {
            domain: "example.com".into(),
            challenge_url: "https://ca/chall/1".into(),
            token: "abc123".into(),
            key_authorization: "abc123.thumbprint".into(),
            authorization_location: "https://ca/authz/1".into(),
        }
    }

    fn status(value: &str) -> Reply {
        Reply::json(200, json!({ "status": value }))
    }

    fn run(
        transport: &mut ScriptedTransport,
        pause: &CountingPause,
        timeout_secs: u64,
    ) -> Result<(), IssuanceError> {
        let observer = RecordingObserver::new();
        ChallengeValidator::new(transport, &observer, pause).validate(&challenge(), timeout_secs)
    }

    #[test]
    fn pending_pending_valid_succeeds_after_two_pauses() {
        let mut transport = ScriptedTransport::new([
            Reply::json(202, json!({"status": "pending"})),
            status("pending"),
            status("pending"),
            status("valid"),
        ]);
        let pause = CountingPause::default();
        run(&mut transport, &pause, 180).unwrap();
        assert_eq!(pause.count(), 2);
        assert_eq!(transport.remaining(), 0);

        let submit = &transport.sent[0];
        assert_eq!(submit.method, Method::Post);
        assert_eq!(submit.url, "https://ca/chall/1");
        let payload = submit.payload.as_ref().unwrap();
        assert_eq!(payload["resource"], "challenge");
        assert_eq!(payload["type"], "http-01");
        assert_eq!(payload["keyAuthorization"], "abc123.thumbprint");
        assert_eq!(payload["token"], "abc123");

        for poll in &transport.sent[1..] {
            assert_eq!(poll.method, Method::Get);
            assert_eq!(poll.url, "https://ca/authz/1");
            assert!(poll.payload.is_none());
        }
    }

    #[test]
    fn invalid_submission_fails_without_polling() {
        let mut transport = ScriptedTransport::new([status("invalid"), status("valid")]);
        let pause = CountingPause::default();
        let err = run(&mut transport, &pause, 180).unwrap_err();
        assert!(matches!(err, IssuanceError::ChallengeFailed { .. }));
        assert!(err.response_body().unwrap().contains("invalid"));
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(pause.count(), 0);
    }

    #[test]
    fn submission_without_status_fails() {
        let mut transport = ScriptedTransport::new([Reply::json(400, json!({"detail": "bad"}))]);
        let pause = CountingPause::default();
        let err = run(&mut transport, &pause, 180).unwrap_err();
        assert!(matches!(err, IssuanceError::ChallengeFailed { body, .. } if body.contains("bad")));
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn invalid_on_first_poll_fails_immediately() {
        let mut transport = ScriptedTransport::new([
            status("pending"),
            status("invalid"),
            status("valid"),
        ]);
        let pause = CountingPause::default();
        let err = run(&mut transport, &pause, 180).unwrap_err();
        assert!(matches!(err, IssuanceError::ChallengeFailed { .. }));
        assert_eq!(transport.sent.len(), 2);
        assert_eq!(transport.remaining(), 1);
        assert_eq!(pause.count(), 0);
    }

    #[test]
    fn missing_status_during_poll_fails() {
        let mut transport = ScriptedTransport::new([
            status("pending"),
            status("pending"),
            Reply::json(200, json!({})),
        ]);
        let pause = CountingPause::default();
        let err = run(&mut transport, &pause, 180).unwrap_err();
        assert!(matches!(err, IssuanceError::ChallengeFailed { .. }));
        assert_eq!(pause.count(), 1);
    }

    #[test]
    fn still_pending_at_timeout_times_out() {
        let mut replies = vec![status("pending")];
        replies.extend((0..3).map(|_| status("pending")));
        let mut transport = ScriptedTransport::new(replies);
        let pause = CountingPause::default();
        let err = run(&mut transport, &pause, 3).unwrap_err();
        assert!(matches!(
            err,
            IssuanceError::ChallengeTimedOut { timeout_secs: 3, .. }
        ));
        // One submission plus exactly `timeout_secs` polls.
        assert_eq!(transport.sent.len(), 4);
        assert_eq!(pause.count(), 3);
    }

    // Compatibility risk: statuses other than `valid` that are neither pending
    // nor invalid are accepted as success.
    #[test]
    fn non_standard_settled_status_is_accepted() {
        let mut transport = ScriptedTransport::new([status("pending"), status("processing")]);
        let pause = CountingPause::default();
        run(&mut transport, &pause, 180).unwrap();
        assert_eq!(pause.count(), 0);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut transport = ScriptedTransport::new([]);
        let pause = CountingPause::default();
        let err = run(&mut transport, &pause, 0).unwrap_err();
        assert!(matches!(err, IssuanceError::InvalidArgument(_)));
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn reports_poll_ticks_and_outcome() {
        let mut transport =
            ScriptedTransport::new([status("pending"), status("pending"), status("valid")]);
        let pause = CountingPause::default();
        let observer = RecordingObserver::new();
        ChallengeValidator::new(&mut transport, &observer, &pause)
            .validate(&challenge(), 10)
            .unwrap();
        let events = observer.events();
        let ticks = events
            .iter()
            .filter(|e| matches!(e, IssuanceEvent::PollTick { .. }))
            .count();
        assert_eq!(ticks, 1);
        assert!(matches!(
            events.last(),
            Some(IssuanceEvent::Finished {
                outcome: Outcome::Succeeded,
                ..
            })
        ));
    }

    #[test]
    fn transport_failure_while_polling_reports_failed_outcome() {
        let mut transport = ScriptedTransport::new([
            status("pending"),
            Reply::Fail("connection reset".into()),
        ]);
        let pause = CountingPause::default();
        let observer = RecordingObserver::new();
        let err = ChallengeValidator::new(&mut transport, &observer, &pause)
            .validate(&challenge(), 10)
            .unwrap_err();
        assert!(matches!(err, IssuanceError::Transport(_)));
        match observer.events().last() {
            Some(IssuanceEvent::Finished {
                phase: Phase::Challenge,
                outcome: Outcome::Failed(reason),
                ..
            }) => assert!(reason.contains("connection reset")),
            other => panic!("unexpected last event: {other:?}"),
        }
    }

    #[test]
    fn timeout_reports_timed_out_outcome_once() {
        let mut transport = ScriptedTransport::new([status("pending"), status("pending")]);
        let pause = CountingPause::default();
        let observer = RecordingObserver::new();
        ChallengeValidator::new(&mut transport, &observer, &pause)
            .validate(&challenge(), 1)
            .unwrap_err();
        let finished: Vec<_> = observer
            .events()
            .into_iter()
            .filter(|e| matches!(e, IssuanceEvent::Finished { .. }))
            .collect();
        assert_eq!(finished.len(), 1);
        assert!(matches!(
            finished[0],
            IssuanceEvent::Finished {
                outcome: Outcome::TimedOut,
                ..
            }
        ));
    }
}
