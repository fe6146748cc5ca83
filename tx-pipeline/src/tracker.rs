//! Nonce-pipelined submission for one signer.
use std::sync::Arc;

use log::info;
use snafu::ResultExt;
use subxt::utils::AccountId32;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::client::ChainClient;
use crate::error::{ChainUnavailableSnafu, Result};
use crate::nonce::{NonceCursor, SignerLease};
use crate::signer::Signer;
use crate::submission::{track, Submission, SubmissionStatus};

/// Submits calls for one signer, binding each to the next nonce without waiting for earlier
/// calls to confirm.
///
/// Only one tracker per signer can be open in a process. Dropping the tracker closes it.
pub struct Tracker<C: ChainClient> {
    /// Client used to submit calls and to decode their failures.
    client: Arc<C>,
    /// The account whose nonce sequence this tracker owns.
    signer: Signer<C::Key>,
    /// Next nonce to hand out.
    cursor: NonceCursor,
    /// One watcher per submission that has not reached a terminal status yet.
    watchers: JoinSet<()>,
    /// Keeps other trackers for this signer from opening.
    _lease: SignerLease,
}

impl<C: ChainClient> Tracker<C> {
    /// Opens a tracker for `signer`, starting from the nonce the chain currently reports.
    ///
    /// # Errors
    /// - [`crate::Error::AlreadyOpen`] if another tracker holds this signer.
    /// - [`crate::Error::ChainUnavailable`] if the nonce query fails.
    pub async fn open(client: Arc<C>, signer: Signer<C::Key>) -> Result<Self> {
        let lease = SignerLease::acquire(signer.account())?;
        let nonce = fetch_nonce(client.as_ref(), signer.account()).await?;
        info!("🔑 Opened tracker for {} at nonce {}", signer.account(), nonce);

        Ok(Self {
            client,
            signer,
            cursor: NonceCursor::new(nonce),
            watchers: JoinSet::new(),
            _lease: lease,
        })
    }

    /// The signing account.
    pub fn account(&self) -> &AccountId32 {
        self.signer.account()
    }

    /// The nonce the next submission will use.
    pub fn next_nonce(&self) -> u64 {
        self.cursor.peek()
    }

    /// Binds `call` to the next nonce and submits it without waiting for confirmation.
    ///
    /// The nonce is consumed even if the node rejects the call; the rejection arrives later as
    /// an `Invalid` status on the returned submission.
    pub async fn submit(&mut self, call: C::Call) -> Submission {
        while self.watchers.try_join_next().is_some() {}

        let nonce = self.cursor.advance();
        let account = self.signer.account().clone();
        let stream = self.client.submit_signed(call, &self.signer, nonce).await;
        info!("📤 Submitted call from {} with nonce {}", account, nonce);

        let (status_tx, status_rx) = watch::channel(SubmissionStatus::Pending);
        self.watchers.spawn(track(
            Arc::clone(&self.client),
            account.clone(),
            nonce,
            stream,
            status_tx,
        ));

        Submission::new(account, nonce, status_rx)
    }

    /// Re-reads the chain nonce into the cursor, recycling slots of calls that never landed.
    ///
    /// Only safe once every earlier submission has reached a terminal status.
    pub async fn resync_nonce(&mut self) -> Result<u64> {
        let nonce = fetch_nonce(self.client.as_ref(), self.signer.account()).await?;
        info!(
            "🔄 Resynced nonce for {}: {} -> {}",
            self.signer.account(),
            self.cursor.peek(),
            nonce
        );
        self.cursor.reset(nonce);
        Ok(nonce)
    }

    /// Stops tracking and frees the signer for another tracker.
    ///
    /// Calls already submitted are not recalled; their handles stop receiving updates.
    pub fn close(mut self) {
        while self.watchers.try_join_next().is_some() {}
        info!(
            "🔒 Closed tracker for {} ({} submissions still unresolved)",
            self.signer.account(),
            self.watchers.len()
        );
    }
}

async fn fetch_nonce<C: ChainClient>(client: &C, account: &AccountId32) -> Result<u64> {
    client
        .account_nonce(account)
        .await
        .context(ChainUnavailableSnafu {
            account: account.clone(),
        })
}
