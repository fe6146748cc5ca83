//! # Chain Client Contract
//!
//! The pipeline talks to a node only through the [`ChainClient`] trait. An implementation
//! queries account nonces, signs and submits calls with an explicit nonce, and reports each
//! submission's lifecycle as a stream of [`TxStatusEvent`]s.
//!
//! [`crate::subxt_client::SubxtClient`] is the production implementation.

use async_trait::async_trait;
use futures::stream::BoxStream;
use subxt::utils::{AccountId32, H256};

use crate::signer::Signer;
use crate::submission::ModuleFailure;

/// Lifecycle events of one submitted call, as reported by the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatusEvent {
    /// The call was included in a best block.
    InBlock(H256),
    /// The best block containing the call was abandoned.
    Retracted,
    /// The block containing the call was finalized; carries the events the call emitted.
    Finalized {
        /// Hash of the finalized block.
        block: H256,
        /// Events emitted by the call.
        events: Vec<ChainEvent>,
    },
    /// The node rejected the call (bad nonce, insufficient funds, bad signature, ...).
    Invalid(String),
    /// The node evicted the call from its pool before inclusion.
    Dropped(String),
    /// The node stopped reporting on the call. Its fate is unknown and it may still land.
    Lost(String),
}

/// An event emitted by a finalized call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainEvent {
    /// `System.ExtrinsicSuccess`
    ExtrinsicSuccess,
    /// `System.ExtrinsicFailed` with its dispatch error.
    ExtrinsicFailed(DispatchFailure),
    /// Any other event.
    Other {
        /// Pallet that emitted the event.
        pallet: String,
        /// Event variant name.
        variant: String,
    },
}

/// The dispatch error carried by `ExtrinsicFailed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchFailure {
    /// A pallet-defined error, still in raw form.
    Module {
        /// Index of the pallet in the runtime.
        pallet_index: u8,
        /// Raw error bytes; the first byte is the error variant index.
        error: [u8; 4],
    },
    /// Any non-module dispatch error, rendered by the client.
    Other(String),
}

/// Stream of status events for one submission.
pub type StatusStream = BoxStream<'static, TxStatusEvent>;

/// The capabilities the pipeline needs from a node connection.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Signing key type understood by this client.
    type Key: Send + Sync + 'static;

    /// Call payload type accepted by this client.
    type Call: Send + 'static;

    /// Returns the next nonce the chain expects from `account`.
    async fn account_nonce(&self, account: &AccountId32) -> Result<u64, subxt::Error>;

    /// Signs `call` with `signer` at `nonce` and submits it.
    ///
    /// Never fails directly: a rejection at submission time is the first event of the
    /// returned stream.
    async fn submit_signed(
        &self,
        call: Self::Call,
        signer: &Signer<Self::Key>,
        nonce: u64,
    ) -> StatusStream;

    /// Resolves a raw module error against the runtime metadata.
    fn decode_module_error(&self, pallet_index: u8, error: [u8; 4]) -> Option<ModuleFailure>;
}
