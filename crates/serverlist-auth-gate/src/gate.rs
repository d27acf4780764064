//! The admission gate: one decision per connection attempt.
//!
//! This is the only place where internal outcomes become host-visible
//! decisions. The flow for every attempt is:
//!
//! 1. `Pending` → `Validating`: wait for a free slot (bounded by
//!    `max_in_flight`)
//! 2. Run the [`CredentialValidator`] (the slot is held for the lookup)
//! 3. `Validating` → `Allowed`/`Denied`: map the [`Validation`] (or a
//!    saturation/timeout) to an [`AdmissionResult`] and log it
//!
//! Steps 1 and 2 share a single deadline, so the whole check never takes
//! longer than `check_timeout`.

use std::sync::Arc;
use std::time::Duration;

use serverlist_auth_session::{
    CredentialValidator, InvalidReason, SessionStore, Validation,
};
use tokio::sync::Semaphore;
use tokio::time::{self, Instant};

use crate::metrics::{GateMetrics, GateMetricsSnapshot};
use crate::{
    AdmissionResult, AdmissionState, ConnectionAttempt, DenyReason,
    GateConfig, OutagePolicy,
};

/// What happened before a decision could be made.
enum Outcome {
    /// The validator answered.
    Checked(Validation),
    /// No slot freed up before the deadline.
    Saturated,
    /// The validator didn't answer before the deadline.
    TimedOut,
}

/// Decides whether connecting players may proceed.
///
/// Safe to share across tasks (wrap it in an `Arc`). The only mutable
/// state is the slot semaphore and the counters; nothing is kept per
/// player between checks.
pub struct AdmissionGate<S: SessionStore> {
    validator: CredentialValidator<S>,
    config: GateConfig,
    slots: Arc<Semaphore>,
    max_in_flight: usize,
    metrics: GateMetrics,
}

impl<S: SessionStore> AdmissionGate<S> {
    /// Creates a gate that validates against `store`.
    ///
    /// A `max_in_flight` of 0 is raised to 1; a gate with no slots could
    /// never admit anyone.
    pub fn new(store: Arc<S>, config: GateConfig) -> Self {
        let max_in_flight = config.max_in_flight.max(1);
        tracing::debug!(
            max_in_flight,
            check_timeout_ms = config.check_timeout.as_millis() as u64,
            outage_policy = %config.outage_policy,
            "admission gate created"
        );
        Self {
            validator: CredentialValidator::new(store),
            config,
            slots: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            metrics: GateMetrics::default(),
        }
    }

    /// Runs one admission check within the configured `check_timeout`.
    pub async fn check(&self, attempt: ConnectionAttempt) -> AdmissionResult {
        self.check_within(attempt, self.config.check_timeout).await
    }

    /// Runs one admission check within `budget` (capped at the
    /// configured `check_timeout`).
    ///
    /// Hosts with their own connection-attempt timeout pass what's left
    /// of it here, so a slow store turns into a clean "unavailable"
    /// instead of the host giving up mid-check.
    pub async fn check_within(
        &self,
        attempt: ConnectionAttempt,
        budget: Duration,
    ) -> AdmissionResult {
        GateMetrics::bump(&self.metrics.checks);
        let mut state = AdmissionState::Pending;

        advance(&mut state, AdmissionState::Validating, &attempt);
        let deadline = Instant::now() + budget.min(self.config.check_timeout);
        let outcome = self.validate_before(&attempt, deadline).await;

        let result = self.decide(&attempt, outcome);
        advance(&mut state, result.state(), &attempt);
        result
    }

    /// The validator this gate uses.
    pub fn validator(&self) -> &CredentialValidator<S> {
        &self.validator
    }

    /// The session store behind the validator.
    pub fn store(&self) -> &Arc<S> {
        self.validator.store()
    }

    /// The gate's settings.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Slots not currently held by a check.
    ///
    /// Equals [`max_in_flight`](Self::max_in_flight) whenever no check is
    /// running; every exit path of a check gives its slot back.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Total number of slots.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Copies the decision counters.
    pub fn metrics(&self) -> GateMetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn validate_before(
        &self,
        attempt: &ConnectionAttempt,
        deadline: Instant,
    ) -> Outcome {
        // The permit is an RAII guard: it goes back to the semaphore when
        // this function returns, whichever branch returns.
        let _permit = match time::timeout_at(deadline, self.slots.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) | Err(_) => return Outcome::Saturated,
        };

        let validation = self.validator.validate_at(
            &attempt.player_id,
            attempt.token.expose(),
            attempt.at,
        );
        match time::timeout_at(deadline, validation).await {
            Ok(validation) => Outcome::Checked(validation),
            Err(_) => Outcome::TimedOut,
        }
    }

    fn decide(&self, attempt: &ConnectionAttempt, outcome: Outcome) -> AdmissionResult {
        let player_id = &attempt.player_id;
        match outcome {
            Outcome::Checked(Validation::Valid(_)) => {
                GateMetrics::bump(&self.metrics.allowed);
                tracing::info!(%player_id, "player admitted");
                AdmissionResult::Allowed
            }
            Outcome::Checked(Validation::Invalid(reason)) => {
                GateMetrics::bump(&self.metrics.denied_credential);
                let deny = match reason {
                    InvalidReason::Expired => DenyReason::SessionExpired,
                    InvalidReason::UnknownPlayer
                    | InvalidReason::TokenMismatch
                    | InvalidReason::WrongPlayer => DenyReason::InvalidCredential,
                };
                tracing::info!(
                    %player_id,
                    ?reason,
                    code = deny.code(),
                    "player denied"
                );
                AdmissionResult::Denied(deny)
            }
            Outcome::Checked(Validation::Unavailable(err)) => {
                self.unavailable(attempt, &err.to_string())
            }
            Outcome::Saturated => {
                let total = GateMetrics::bump(&self.metrics.saturated);
                tracing::warn!(
                    %player_id,
                    saturated = total,
                    "no admission slot freed before the deadline"
                );
                self.unavailable(attempt, "admission slots saturated")
            }
            Outcome::TimedOut => {
                let total = GateMetrics::bump(&self.metrics.timed_out);
                tracing::warn!(
                    %player_id,
                    timed_out = total,
                    "credential validation timed out"
                );
                self.unavailable(attempt, "validation timed out")
            }
        }
    }

    /// Applies the outage policy. Never produces
    /// [`DenyReason::InvalidCredential`].
    fn unavailable(&self, attempt: &ConnectionAttempt, cause: &str) -> AdmissionResult {
        let player_id = &attempt.player_id;
        match self.config.outage_policy {
            OutagePolicy::FailOpen => {
                GateMetrics::bump(&self.metrics.allowed_unverified);
                tracing::warn!(
                    %player_id,
                    cause,
                    "session store unavailable, admitting unverified (fail-open)"
                );
                AdmissionResult::AllowedUnverified
            }
            OutagePolicy::FailClosed => {
                GateMetrics::bump(&self.metrics.denied_unavailable);
                tracing::warn!(
                    %player_id,
                    cause,
                    "session store unavailable, denying (fail-closed)"
                );
                AdmissionResult::Denied(DenyReason::ServiceUnavailable)
            }
        }
    }
}

fn advance(state: &mut AdmissionState, next: AdmissionState, attempt: &ConnectionAttempt) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal admission transition {state} → {next}"
    );
    tracing::trace!(player_id = %attempt.player_id, from = %state, to = %next, "admission state");
    *state = next;
}
