//! Submissions in flight and their confirmation outcomes.
//!
//! Every submitted call gets a watcher task that folds the client's status stream into a
//! [`SubmissionStatus`] published on a watch channel. A [`Submission`] is a cheap handle onto
//! that channel; waiting on it never re-derives the outcome, so every waiter sees the same
//! terminal result.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use log::{error, info, warn};
use subxt::utils::{AccountId32, H256};
use tokio::sync::watch;

use crate::client::{ChainClient, ChainEvent, DispatchFailure, StatusStream, TxStatusEvent};

/// Guarantee level a caller waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// Inclusion in a best block. Enough to know the call was accepted.
    InBlock,
    /// Finality. Required to trust the success or failure of the call.
    Finalized,
}

/// A pallet error decoded from runtime metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleFailure {
    /// Pallet name in lower camel case, e.g. `pwNftSale`.
    pub section: String,
    /// Error variant name, e.g. `NotEligible`.
    pub method: String,
    /// Documentation attached to the error variant.
    pub description: String,
}

/// Why an executed call was reverted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// A pallet-defined error.
    Module(ModuleFailure),
    /// A non-module dispatch error such as `BadOrigin`.
    Dispatch(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Module(m) if m.description.is_empty() => {
                write!(f, "{}.{}", m.section, m.method)
            }
            FailureReason::Module(m) => write!(f, "{}.{}: {}", m.section, m.method, m.description),
            FailureReason::Dispatch(message) => write!(f, "{message}"),
        }
    }
}

/// Where a submission currently stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Submitted, not yet in a block.
    Pending,
    /// Included in a best block.
    InBlock(H256),
    /// Finalized; `failure` is set when the call was reverted.
    Finalized {
        /// The finalized block.
        block: H256,
        /// Decoded revert reason, if any.
        failure: Option<FailureReason>,
    },
    /// Rejected by the node before inclusion.
    Invalid(String),
    /// Evicted before inclusion.
    Dropped(String),
}

impl SubmissionStatus {
    /// Terminal states never change once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Finalized { .. }
                | SubmissionStatus::Invalid(_)
                | SubmissionStatus::Dropped(_)
        )
    }

    /// The outcome this status yields for a caller waiting at `level`, if it yields one yet.
    pub fn resolve(&self, level: Confirmation) -> Option<ConfirmationResult> {
        match self {
            SubmissionStatus::Pending => None,
            SubmissionStatus::InBlock(block) => match level {
                Confirmation::InBlock => Some(ConfirmationResult::Accepted(*block)),
                Confirmation::Finalized => None,
            },
            SubmissionStatus::Finalized {
                failure: Some(reason),
                ..
            } => Some(ConfirmationResult::Failed(reason.clone())),
            SubmissionStatus::Finalized { block, .. } => Some(ConfirmationResult::Accepted(*block)),
            SubmissionStatus::Invalid(message) => Some(ConfirmationResult::Invalid(message.clone())),
            SubmissionStatus::Dropped(message) => Some(ConfirmationResult::Dropped(message.clone())),
        }
    }
}

/// What a caller learns from waiting on a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmationResult {
    /// The call made it into the given block without reverting.
    Accepted(H256),
    /// The call executed and was reverted by the runtime.
    Failed(FailureReason),
    /// The node rejected the call.
    Invalid(String),
    /// The call was evicted before inclusion and can be resubmitted with a fresh nonce.
    Dropped(String),
    /// The caller stopped waiting. Not authoritative; the call may still land.
    TimedOut,
}

impl ConfirmationResult {
    /// Whether the call was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, ConfirmationResult::Accepted(_))
    }

    /// Block the call landed in, for accepted calls.
    pub fn block(&self) -> Option<H256> {
        match self {
            ConfirmationResult::Accepted(block) => Some(*block),
            _ => None,
        }
    }
}

impl fmt::Display for ConfirmationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationResult::Accepted(block) => write!(f, "accepted in block {block:?}"),
            ConfirmationResult::Failed(reason) => write!(f, "failed: {reason}"),
            ConfirmationResult::Invalid(message) => write!(f, "invalid: {message}"),
            ConfirmationResult::Dropped(message) => write!(f, "dropped: {message}"),
            ConfirmationResult::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Handle onto one signed call in flight.
#[derive(Clone, Debug)]
pub struct Submission {
    account: AccountId32,
    nonce: u64,
    created_at: Instant,
    status: watch::Receiver<SubmissionStatus>,
}

impl Submission {
    pub(crate) fn new(
        account: AccountId32,
        nonce: u64,
        status: watch::Receiver<SubmissionStatus>,
    ) -> Self {
        Self {
            account,
            nonce,
            created_at: Instant::now(),
            status,
        }
    }

    /// The signing account.
    pub fn account(&self) -> &AccountId32 {
        &self.account
    }

    /// The nonce this call was bound to.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// When the call was handed to the client.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// The latest known status.
    pub fn status(&self) -> SubmissionStatus {
        self.status.borrow().clone()
    }

    /// Waits until the call reaches `level`, turns terminal, or `timeout` elapses.
    ///
    /// A timeout ends only this wait; a later call can still observe the real outcome. If the
    /// owning tracker was closed, or the node stopped reporting, before an outcome was known,
    /// this returns [`ConfirmationResult::TimedOut`] right away.
    pub async fn await_confirmation(
        &self,
        level: Confirmation,
        timeout: Duration,
    ) -> ConfirmationResult {
        let mut status = self.status.clone();
        let waited = tokio::time::timeout(
            timeout,
            status.wait_for(|current| current.resolve(level).is_some()),
        )
        .await;

        let result = match waited {
            Ok(Ok(current)) => current.resolve(level),
            Ok(Err(_)) => self.status.borrow().resolve(level),
            Err(_) => None,
        };

        result.unwrap_or_else(|| {
            warn!(
                "⏳ Gave up waiting on {} nonce {} after {:?}",
                self.account, self.nonce, timeout
            );
            ConfirmationResult::TimedOut
        })
    }
}

/// Folds a status stream into `status` until the submission turns terminal.
pub(crate) async fn track<C: ChainClient>(
    client: Arc<C>,
    account: AccountId32,
    nonce: u64,
    mut stream: StatusStream,
    status: watch::Sender<SubmissionStatus>,
) {
    while let Some(event) = stream.next().await {
        let next = match event {
            TxStatusEvent::InBlock(block) => {
                info!("📦 {account} nonce {nonce} included in block {block:?}");
                SubmissionStatus::InBlock(block)
            }
            TxStatusEvent::Retracted => {
                warn!("⚠️ {account} nonce {nonce} is no longer in the best block");
                SubmissionStatus::Pending
            }
            TxStatusEvent::Finalized { block, events } => {
                let failure = failure_reason(client.as_ref(), &events);
                match &failure {
                    Some(reason) => {
                        error!("❌ {account} nonce {nonce} failed in block {block:?}: {reason}")
                    }
                    None => info!("✅ {account} nonce {nonce} finalized in block {block:?}"),
                }
                SubmissionStatus::Finalized { block, failure }
            }
            TxStatusEvent::Invalid(message) => {
                error!("❌ {account} nonce {nonce} invalid: {message}");
                SubmissionStatus::Invalid(message)
            }
            TxStatusEvent::Dropped(message) => {
                error!("❌ {account} nonce {nonce} dropped: {message}");
                SubmissionStatus::Dropped(message)
            }
            TxStatusEvent::Lost(message) => {
                warn!("⚠️ Stopped tracking {account} nonce {nonce}, outcome unknown: {message}");
                return;
            }
        };

        let terminal = next.is_terminal();
        status.send_replace(next);
        if terminal {
            return;
        }
    }

    if let SubmissionStatus::InBlock(block) = *status.borrow() {
        warn!(
            "⚠️ Status stream for {account} nonce {nonce} ended after inclusion in {block:?}, \
             outcome unknown"
        );
        return;
    }
    warn!("⚠️ Status stream for {account} nonce {nonce} ended before inclusion");
    status.send_replace(SubmissionStatus::Dropped(
        "status stream ended before the call was included".to_string(),
    ));
}

/// Finds the first `ExtrinsicFailed` among `events` and decodes it.
fn failure_reason<C: ChainClient>(client: &C, events: &[ChainEvent]) -> Option<FailureReason> {
    events.iter().find_map(|event| match event {
        ChainEvent::ExtrinsicFailed(DispatchFailure::Module {
            pallet_index,
            error,
        }) => Some(FailureReason::Module(
            client
                .decode_module_error(*pallet_index, *error)
                .unwrap_or_else(|| ModuleFailure {
                    section: format!("pallet{pallet_index}"),
                    method: format!("error{}", error[0]),
                    description: "Unknown module error".to_string(),
                }),
        )),
        ChainEvent::ExtrinsicFailed(DispatchFailure::Other(message)) => {
            Some(FailureReason::Dispatch(message.clone()))
        }
        _ => None,
    })
}
