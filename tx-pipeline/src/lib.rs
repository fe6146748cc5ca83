//! # Nonce-Pipelined Transaction Submission
//!
//! This library submits signed calls to a Substrate-based chain for a set of fixed accounts,
//! pipelining each account's calls under consecutive nonces and tracking every call until it
//! is included, finalized, reverted, or rejected.

/// Error handling module.
///
/// Defines the hard errors of the pipeline using the `snafu` crate. Outcomes of individual
/// calls are data, not errors.
pub mod error;

/// Signer module.
///
/// Pairs an account id with an opaque signing key.
pub mod signer;

/// Chain client contract.
///
/// The trait through which the pipeline queries nonces, submits calls, and receives status
/// updates.
pub mod client;

/// `subxt` implementation of the chain client contract.
pub mod subxt_client;

/// Nonce cursor and the process-wide signer registry.
pub mod nonce;

/// Submission handles, their state machine, and confirmation outcomes.
pub mod submission;

/// Per-signer transaction tracker.
///
/// Assigns nonces, submits calls without waiting for confirmation, and watches each call's
/// progress.
pub mod tracker;

/// Batch coordinator
pub mod batch;

#[cfg(test)]
mod mock;

pub use batch::{
    abort_pair,
    run_across_signers,
    run_pipelined,
    run_sequential,
    AbortHandle,
    AbortSignal,
    BatchMode,
    BatchOptions,
    FailurePolicy,
    SignerBatch,
};
pub use client::{ChainClient, ChainEvent, DispatchFailure, StatusStream, TxStatusEvent};
pub use error::{Error, Result};
pub use signer::Signer;
pub use submission::{
    Confirmation,
    ConfirmationResult,
    FailureReason,
    ModuleFailure,
    Submission,
    SubmissionStatus,
};
pub use subxt_client::{sr25519_signer, SubxtClient};
pub use tracker::Tracker;
