//! Recovery session state machine
//!
//! ```text
//! Collecting ──intake──► AwaitingPassword ──provide_password──► Validating ──► Reconstructing ──► Succeeded
//!     │                     │   ▲     │                              │               │
//!     │                     │   └retry┘                              ▼               ▼
//!     └──────────► Validating  cancel ─────────────────────────► Failed ◄────────── Failed
//! ```
//!
//! A session is a plain value driven by explicit calls. Every phase change is
//! published on a `tokio::sync::watch` channel so a UI can follow along, and
//! kept in [`RecoverySession::transitions`]. `Succeeded` and `Failed` are
//! final: a new attempt needs a new session.

use crate::crypto::PassphraseCipher;
use crate::detect::{classify_all, ClassifiedInput, EncryptedBlob};
use crate::envelope::ShareEnvelope;
use crate::error::{RecoveryFailure, Result, SessionError};
use crate::gateway::{DecryptionErrorKind, DecryptionGateway};
use crate::intake::{Channel, Origin, RawInput};
use crate::primitives::{combine_with_fallback, Decryptor, SecretCombiner};
use crate::shamir::Gf256Shamir;
use crate::validate::{select_shares, validate, validate_collected, Rejection, ValidationReport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tokio::sync::watch;
use tracing::{info, warn};

/// Observable session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Collecting,
    AwaitingPassword { retry: bool },
    Validating,
    Reconstructing,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Collecting => write!(f, "collecting"),
            Phase::AwaitingPassword { retry: false } => write!(f, "awaiting password"),
            Phase::AwaitingPassword { retry: true } => write!(f, "awaiting password (retry)"),
            Phase::Validating => write!(f, "validating"),
            Phase::Reconstructing => write!(f, "reconstructing"),
            Phase::Succeeded => write!(f, "succeeded"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// A reconstructed secret. Zeroed on drop, never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveredSecret(Vec<u8>);

impl RecoveredSecret {
    fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The secret as text, when it is valid UTF-8
    pub fn as_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RecoveredSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoveredSecret([{} bytes])", self.0.len())
    }
}

impl Drop for RecoveredSecret {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

/// Full session status, including terminal outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Collecting,
    AwaitingPassword { retry: bool },
    Validating,
    Reconstructing,
    Succeeded(RecoveredSecret),
    Failed(RecoveryFailure),
}

impl SessionStatus {
    pub fn phase(&self) -> Phase {
        match self {
            SessionStatus::Collecting => Phase::Collecting,
            SessionStatus::AwaitingPassword { retry } => Phase::AwaitingPassword { retry: *retry },
            SessionStatus::Validating => Phase::Validating,
            SessionStatus::Reconstructing => Phase::Reconstructing,
            SessionStatus::Succeeded(_) => Phase::Succeeded,
            SessionStatus::Failed(_) => Phase::Failed,
        }
    }

    pub fn failure(&self) -> Option<&RecoveryFailure> {
        match self {
            SessionStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn secret(&self) -> Option<&RecoveredSecret> {
        match self {
            SessionStatus::Succeeded(secret) => Some(secret),
            _ => None,
        }
    }
}

/// Tunables for a recovery attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryPolicy {
    /// Fail with `WrongPassword` once this many wrong passwords were given.
    /// `None` allows unlimited retries.
    pub max_password_attempts: Option<u32>,
    /// Leave unrecognized inputs out of validation instead of failing the
    /// set with `InvalidFormat`. They are still listed as rejections.
    /// Encrypted shares that fail to decrypt are never tolerated.
    pub tolerate_unrecognized: bool,
}

/// Answer from a [`PasswordSource`]
#[derive(Clone, PartialEq, Eq)]
pub enum PasswordResponse {
    Provided(String),
    Cancelled,
}

impl fmt::Debug for PasswordResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordResponse::Provided(_) => write!(f, "Provided([redacted])"),
            PasswordResponse::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Where [`drive`] gets passwords from (a prompt, a UI dialog, a test script)
pub trait PasswordSource {
    fn request_password(&mut self, is_retry: bool) -> impl Future<Output = PasswordResponse> + Send;
}

/// An input unit with its position in the intake batch
#[derive(Debug, Clone)]
struct Positioned<T> {
    position: usize,
    origin: Origin,
    value: T,
}

/// One recovery attempt
pub struct RecoverySession<D = PassphraseCipher, C = Gf256Shamir> {
    channel: Channel,
    policy: RecoveryPolicy,
    gateway: DecryptionGateway<D>,
    combiner: C,
    status: SessionStatus,
    phase_tx: watch::Sender<Phase>,
    transitions: Vec<Phase>,
    collected: Vec<(Origin, ClassifiedInput)>,
    plain: Vec<Positioned<ShareEnvelope>>,
    pending: Vec<Positioned<EncryptedBlob>>,
    resolved: Vec<Positioned<ShareEnvelope>>,
    rejections: Vec<Rejection>,
    undecryptable: Vec<Rejection>,
    decrypt_failure: Option<RecoveryFailure>,
    report: Option<ValidationReport>,
    password_attempts: u32,
    last_failure: Option<RecoveryFailure>,
}

impl RecoverySession {
    /// Session using the built-in cipher and Shamir implementation
    pub fn standard(channel: Channel, policy: RecoveryPolicy) -> Self {
        Self::with_policy(channel, PassphraseCipher::new(), Gf256Shamir::new(), policy)
    }
}

impl<D, C> fmt::Debug for RecoverySession<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoverySession")
            .field("channel", &self.channel)
            .field("phase", &self.status.phase())
            .field("collected", &self.collected.len())
            .field("pending", &self.pending.len())
            .field("password_attempts", &self.password_attempts)
            .finish()
    }
}

impl<D: Decryptor, C: SecretCombiner> RecoverySession<D, C> {
    pub fn new(channel: Channel, decryptor: D, combiner: C) -> Self {
        Self::with_policy(channel, decryptor, combiner, RecoveryPolicy::default())
    }

    pub fn with_policy(
        channel: Channel,
        decryptor: D,
        combiner: C,
        policy: RecoveryPolicy,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Collecting);
        Self {
            channel,
            policy,
            gateway: DecryptionGateway::new(decryptor),
            combiner,
            status: SessionStatus::Collecting,
            phase_tx,
            transitions: vec![Phase::Collecting],
            collected: Vec::new(),
            plain: Vec::new(),
            pending: Vec::new(),
            resolved: Vec::new(),
            rejections: Vec::new(),
            undecryptable: Vec::new(),
            decrypt_failure: None,
            report: None,
            password_attempts: 0,
            last_failure: None,
        }
    }

    // ===== Observation =====

    /// Follow phase changes
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn phase(&self) -> Phase {
        self.status.phase()
    }

    /// Every phase entered so far, starting with `Collecting`
    pub fn transitions(&self) -> &[Phase] {
        &self.transitions
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    /// Classification of every input, in input order
    pub fn collected(&self) -> &[(Origin, ClassifiedInput)] {
        &self.collected
    }

    /// Inputs that are not shares in any known format
    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    /// Encrypted shares dropped because they failed to decrypt for a reason
    /// other than a wrong password
    pub fn undecryptable(&self) -> &[Rejection] {
        &self.undecryptable
    }

    /// The last validation report, once validation ran
    pub fn report(&self) -> Option<&ValidationReport> {
        self.report.as_ref()
    }

    /// Envelopes recovered from encrypted blobs
    pub fn resolved_envelopes(&self) -> impl Iterator<Item = (&Origin, &ShareEnvelope)> {
        self.resolved.iter().map(|p| (&p.origin, &p.value))
    }

    /// Encrypted blobs not yet decrypted
    pub fn pending_blobs(&self) -> impl Iterator<Item = (&Origin, &EncryptedBlob)> {
        self.pending.iter().map(|p| (&p.origin, &p.value))
    }

    pub fn password_attempts(&self) -> u32 {
        self.password_attempts
    }

    /// Failure of the previous password attempt, cleared on success
    pub fn last_failure(&self) -> Option<&RecoveryFailure> {
        self.last_failure.as_ref()
    }

    // ===== Transitions =====

    /// Classify a batch of inputs and move past `Collecting`
    pub fn intake(
        &mut self,
        inputs: Vec<RawInput>,
    ) -> std::result::Result<&SessionStatus, SessionError> {
        self.expect_phase("intake", |p| matches!(p, Phase::Collecting))?;
        if let Some(input) = inputs.iter().find(|i| !self.channel.accepts(&i.origin)) {
            return Err(SessionError::ChannelMismatch {
                origin: input.origin.to_string(),
                channel: self.channel,
            });
        }

        let classified = classify_all(&inputs);
        for (position, (origin, input)) in classified.iter().enumerate() {
            match input {
                ClassifiedInput::Envelope(envelope) => self.plain.push(Positioned {
                    position,
                    origin: origin.clone(),
                    value: envelope.clone(),
                }),
                ClassifiedInput::EncryptedBlob(blob) => self.pending.push(Positioned {
                    position,
                    origin: origin.clone(),
                    value: blob.clone(),
                }),
                ClassifiedInput::Unrecognized(reason) => {
                    warn!(%origin, %reason, "Rejected input");
                    self.rejections
                        .push(Rejection::new(origin.clone(), reason.to_string()));
                }
            }
        }
        self.collected = classified;

        info!(
            channel = %self.channel,
            envelopes = self.plain.len(),
            encrypted = self.pending.len(),
            rejected = self.rejections.len(),
            "Inputs collected"
        );

        if !self.pending.is_empty() && !self.envelopes_meet_threshold() {
            self.set_status(SessionStatus::AwaitingPassword { retry: false });
        } else {
            self.validate_and_reconstruct();
        }
        Ok(&self.status)
    }

    /// Try the password on every pending encrypted blob
    pub fn provide_password(
        &mut self,
        password: &str,
    ) -> std::result::Result<&SessionStatus, SessionError> {
        self.expect_phase("provide a password", |p| {
            matches!(p, Phase::AwaitingPassword { .. })
        })?;
        self.password_attempts += 1;

        let mut succeeded = 0usize;
        let mut wrong = 0usize;
        let mut still_pending = Vec::new();

        for blob in std::mem::take(&mut self.pending) {
            match self.gateway.attempt_decrypt(&blob.value, password) {
                Ok(envelope) => {
                    succeeded += 1;
                    self.resolved.push(Positioned {
                        position: blob.position,
                        origin: blob.origin,
                        value: envelope,
                    });
                }
                Err(e) if e.kind == DecryptionErrorKind::WrongPassword => {
                    wrong += 1;
                    still_pending.push(blob);
                }
                Err(e) => {
                    warn!(origin = %blob.origin, kind = %e.kind, "Dropping undecryptable share");
                    self.decrypt_failure.get_or_insert_with(|| match e.kind {
                        DecryptionErrorKind::MalformedCiphertext => {
                            RecoveryFailure::MalformedCiphertext(e.detail.clone())
                        }
                        _ => RecoveryFailure::DecryptionFailed(e.detail.clone()),
                    });
                    self.undecryptable.push(Rejection::new(blob.origin, e.to_string()));
                }
            }
        }
        self.pending = still_pending;

        if succeeded == 0 && wrong == 0 {
            if let Some(failure) = self.decrypt_failure.clone() {
                self.last_failure = Some(failure.clone());
                self.fail(failure);
                return Ok(&self.status);
            }
        }

        if wrong == 0 || self.envelopes_meet_threshold() {
            self.last_failure = None;
            self.validate_and_reconstruct();
            return Ok(&self.status);
        }

        warn!(attempt = self.password_attempts, "Wrong password");
        self.last_failure = Some(RecoveryFailure::WrongPassword);
        match self.policy.max_password_attempts {
            Some(max) if self.password_attempts >= max => self.fail(RecoveryFailure::WrongPassword),
            _ => self.set_status(SessionStatus::AwaitingPassword { retry: true }),
        }
        Ok(&self.status)
    }

    /// Give up on the password prompt
    pub fn cancel_password(&mut self) -> std::result::Result<&SessionStatus, SessionError> {
        self.expect_phase("cancel the password prompt", |p| {
            matches!(p, Phase::AwaitingPassword { .. })
        })?;
        self.fail(RecoveryFailure::PasswordRequired);
        Ok(&self.status)
    }

    // ===== Internals =====

    fn expect_phase(
        &self,
        operation: &'static str,
        allowed: impl Fn(Phase) -> bool,
    ) -> std::result::Result<(), SessionError> {
        let phase = self.phase();
        if phase.is_terminal() {
            return Err(SessionError::Finished);
        }
        if !allowed(phase) {
            return Err(SessionError::InvalidState { operation, phase });
        }
        Ok(())
    }

    /// Plain and decrypted envelopes, in input order
    fn envelopes(&self) -> Vec<ShareEnvelope> {
        let mut all: Vec<&Positioned<ShareEnvelope>> =
            self.plain.iter().chain(self.resolved.iter()).collect();
        all.sort_by_key(|p| p.position);
        all.into_iter().map(|p| p.value.clone()).collect()
    }

    fn envelopes_meet_threshold(&self) -> bool {
        let report = validate(&self.envelopes());
        report.threshold > 0 && report.valid_count >= report.threshold as usize
    }

    fn validate_and_reconstruct(&mut self) {
        self.set_status(SessionStatus::Validating);

        let shares = self.envelopes();
        let rejections: &[Rejection] = if self.policy.tolerate_unrecognized {
            &[]
        } else {
            &self.rejections
        };
        let report = validate_collected(&shares, rejections);
        let failure = match (report.failure(), &self.decrypt_failure) {
            // Undecryptable shares outrank a shortfall or an otherwise complete set
            (
                None | Some(RecoveryFailure::InsufficientShares { .. })
                | Some(RecoveryFailure::NoValidShares),
                Some(decrypt_failure),
            ) => Some(decrypt_failure.clone()),
            (failure, _) => failure.cloned(),
        };
        let threshold = report.threshold;
        self.report = Some(report);

        if let Some(failure) = failure {
            self.fail(failure);
            return;
        }

        self.set_status(SessionStatus::Reconstructing);
        let selected = select_shares(&shares, threshold);
        match combine_with_fallback(&self.combiner, &selected) {
            Ok(secret) => {
                info!(shares = selected.len(), "Secret reconstructed");
                self.set_status(SessionStatus::Succeeded(RecoveredSecret::new(secret)));
            }
            Err(e) => self.fail(RecoveryFailure::CombineFailed(e.to_string())),
        }
    }

    fn fail(&mut self, failure: RecoveryFailure) {
        warn!(%failure, "Recovery failed");
        self.set_status(SessionStatus::Failed(failure));
    }

    fn set_status(&mut self, status: SessionStatus) {
        let phase = status.phase();
        self.status = status;
        self.transitions.push(phase);
        self.phase_tx.send_replace(phase);
        info!(%phase, "Recovery phase changed");
    }
}

/// Run the password step to completion, asking `source` for passwords.
///
/// Call after [`RecoverySession::intake`]. Decryption runs on the blocking
/// pool. Returns the session once it reaches `Succeeded` or `Failed`.
pub async fn drive<D, C, P>(
    mut session: RecoverySession<D, C>,
    source: &mut P,
) -> Result<RecoverySession<D, C>>
where
    D: Decryptor + Send + 'static,
    C: SecretCombiner + Send + 'static,
    P: PasswordSource,
{
    loop {
        match session.phase() {
            Phase::AwaitingPassword { retry } => match source.request_password(retry).await {
                PasswordResponse::Provided(password) => {
                    let (returned, outcome) = tokio::task::spawn_blocking(move || {
                        let outcome = session.provide_password(&password).map(|_| ());
                        (session, outcome)
                    })
                    .await?;
                    session = returned;
                    outcome?;
                }
                PasswordResponse::Cancelled => {
                    session.cancel_password()?;
                }
            },
            phase if phase.is_terminal() => return Ok(session),
            phase => {
                return Err(SessionError::InvalidState {
                    operation: "drive",
                    phase,
                }
                .into())
            }
        }
    }
}
