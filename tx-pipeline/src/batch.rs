//! # Batch Coordinator
//!
//! Runs groups of calls on top of [`Tracker`]s:
//!
//! - [`run_sequential`] waits for each call to finalize before submitting the next one, for
//!   calls whose correctness depends on an earlier call's effect.
//! - [`run_pipelined`] submits every call up front and then collects outcomes in nonce order.
//! - [`run_across_signers`] runs one batch per signer concurrently, one task and one tracker
//!   each, and joins them.
//!
//! Reverted, invalid, dropped, or timed-out calls are reported as [`ConfirmationResult`]s.
//! Only failures to open a tracker or to join a signer task are errors.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use subxt::utils::AccountId32;
use tokio::sync::watch;

use crate::client::ChainClient;
use crate::error::{Error, Result};
use crate::signer::Signer;
use crate::submission::{Confirmation, ConfirmationResult};
use crate::tracker::Tracker;

/// How a batch reacts to a call that was not accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep going and report every outcome.
    CollectAll,
    /// Stop at the first outcome that is not `Accepted`; the result list ends with it.
    AbortOnFirstFailure,
}

/// How calls of a single signer are issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchMode {
    /// One call at a time, each finalized before the next is submitted.
    Sequential,
    /// All calls submitted immediately, outcomes collected afterwards.
    Pipelined,
}

/// Trigger side of a batch abort.
#[derive(Debug)]
pub struct AbortHandle(watch::Sender<bool>);

/// Observer side of a batch abort, cloned into every batch that should honour it.
#[derive(Clone, Debug)]
pub struct AbortSignal(watch::Receiver<bool>);

/// Creates a connected abort handle and signal.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle(tx), AbortSignal(rx))
}

impl AbortHandle {
    /// Stops every batch holding a matching signal from submitting further calls.
    pub fn abort(&self) {
        self.0.send_replace(true);
    }
}

impl AbortSignal {
    /// Whether the batch should stop submitting.
    pub fn is_aborted(&self) -> bool {
        *self.0.borrow()
    }
}

/// Knobs shared by every batch runner.
#[derive(Clone, Debug)]
pub struct BatchOptions {
    /// Upper bound on each individual confirmation wait.
    pub timeout: Duration,
    /// Guarantee level awaited by pipelined batches. Sequential batches always await finality.
    pub level: Confirmation,
    /// Reaction to calls that are not accepted.
    pub policy: FailurePolicy,
    /// Optional abort signal checked before every submission.
    pub abort: Option<AbortSignal>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            level: Confirmation::Finalized,
            policy: FailurePolicy::CollectAll,
            abort: None,
        }
    }
}

impl BatchOptions {
    /// Sets the per-call confirmation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the level pipelined batches wait for.
    pub fn with_level(mut self, level: Confirmation) -> Self {
        self.level = level;
        self
    }

    /// Sets the failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attaches an abort signal.
    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = Some(abort);
        self
    }

    fn aborted(&self) -> bool {
        self.abort.as_ref().is_some_and(AbortSignal::is_aborted)
    }

    fn stops_on(&self, result: &ConfirmationResult) -> bool {
        self.policy == FailurePolicy::AbortOnFirstFailure && !result.is_accepted()
    }
}

/// The calls one signer should make, in order.
pub struct SignerBatch<C: ChainClient> {
    /// Who signs the calls.
    pub signer: Signer<C::Key>,
    /// Calls in the order they must reach the chain.
    pub calls: Vec<C::Call>,
}

impl<C: ChainClient> SignerBatch<C> {
    /// Groups `calls` under `signer`.
    pub fn new(signer: Signer<C::Key>, calls: Vec<C::Call>) -> Self {
        Self { signer, calls }
    }
}

/// Submits `calls` one by one, waiting for each to finalize before submitting the next.
pub async fn run_sequential<C: ChainClient>(
    tracker: &mut Tracker<C>,
    calls: Vec<C::Call>,
    options: &BatchOptions,
) -> Vec<ConfirmationResult> {
    let total = calls.len();
    let mut results = Vec::with_capacity(total);

    for call in calls {
        if options.aborted() {
            warn!(
                "🛑 Aborted batch for {}: {} of {} calls not submitted",
                tracker.account(),
                total - results.len(),
                total
            );
            break;
        }

        let submission = tracker.submit(call).await;
        let result = submission
            .await_confirmation(Confirmation::Finalized, options.timeout)
            .await;
        let stop = options.stops_on(&result);
        results.push(result);
        if stop {
            warn!(
                "🛑 Stopping batch for {} after nonce {}",
                tracker.account(),
                submission.nonce()
            );
            break;
        }
    }

    results
}

/// Submits all `calls` immediately, then waits for their outcomes in submission order.
pub async fn run_pipelined<C: ChainClient>(
    tracker: &mut Tracker<C>,
    calls: Vec<C::Call>,
    options: &BatchOptions,
) -> Vec<ConfirmationResult> {
    let total = calls.len();
    let mut submissions = Vec::with_capacity(total);

    for call in calls {
        if options.aborted() {
            warn!(
                "🛑 Aborted batch for {}: {} of {} calls not submitted",
                tracker.account(),
                total - submissions.len(),
                total
            );
            break;
        }
        submissions.push(tracker.submit(call).await);
    }

    let mut results = Vec::with_capacity(submissions.len());
    for submission in &submissions {
        let result = submission
            .await_confirmation(options.level, options.timeout)
            .await;
        let stop = options.stops_on(&result);
        results.push(result);
        if stop {
            warn!(
                "🛑 Stopped collecting outcomes for {} at nonce {}",
                tracker.account(),
                submission.nonce()
            );
            break;
        }
    }

    results
}

/// Runs every signer's batch concurrently and gathers the outcomes per account.
///
/// Each batch gets its own task and tracker. Sibling batches always run to completion; if any
/// batch hit a hard error, the first one is returned after all tasks have been joined.
/// The returned map is keyed by account.
pub async fn run_across_signers<C: ChainClient>(
    client: Arc<C>,
    batches: Vec<SignerBatch<C>>,
    mode: BatchMode,
    options: &BatchOptions,
) -> Result<BTreeMap<AccountId32, Vec<ConfirmationResult>>> {
    let mut handles = Vec::with_capacity(batches.len());
    for batch in batches {
        let account = batch.signer.account().clone();
        let client = Arc::clone(&client);
        let options = options.clone();
        let handle =
            tokio::spawn(async move { run_signer_batch(client, batch, mode, &options).await });
        handles.push((account, handle));
    }

    let mut results = BTreeMap::new();
    let mut first_error = None;
    for (account, handle) in handles {
        match handle.await {
            Ok(Ok(outcomes)) => {
                results.insert(account, outcomes);
            }
            Ok(Err(err)) => {
                error!("❌ Batch for {} failed: {}", account, err);
                first_error.get_or_insert(err);
            }
            Err(source) => {
                error!("❌ Batch task for {} did not finish: {}", account, source);
                first_error.get_or_insert(Error::SignerTask { account, source });
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(results),
    }
}

async fn run_signer_batch<C: ChainClient>(
    client: Arc<C>,
    batch: SignerBatch<C>,
    mode: BatchMode,
    options: &BatchOptions,
) -> Result<Vec<ConfirmationResult>> {
    let mut tracker = Tracker::open(client, batch.signer).await?;
    let outcomes = match mode {
        BatchMode::Sequential => run_sequential(&mut tracker, batch.calls, options).await,
        BatchMode::Pipelined => run_pipelined(&mut tracker, batch.calls, options).await,
    };

    let accepted = outcomes.iter().filter(|r| r.is_accepted()).count();
    info!(
        "📊 {}: {} of {} calls accepted",
        tracker.account(),
        accepted,
        outcomes.len()
    );
    tracker.close();
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{block_for, signer, MockChain};
    use crate::submission::FailureReason;

    #[tokio::test]
    async fn pipelined_batch_uses_consecutive_nonces() {
        let chain = MockChain::new();
        let alice = signer(31);
        chain.set_nonce(alice.account(), 5);
        let mut tracker = Tracker::open(chain.clone(), alice.clone()).await.unwrap();

        let results = run_pipelined(
            &mut tracker,
            vec!["ok-1", "ok-2", "ok-3"],
            &BatchOptions::default(),
        )
        .await;

        assert_eq!(
            results,
            vec![
                ConfirmationResult::Accepted(block_for(5)),
                ConfirmationResult::Accepted(block_for(6)),
                ConfirmationResult::Accepted(block_for(7)),
            ]
        );
        let nonces: Vec<_> = chain
            .submitted_by(alice.account())
            .iter()
            .map(|s| s.nonce)
            .collect();
        assert_eq!(nonces, vec![5, 6, 7]);
    }

    #[tokio::test]
    async fn pipelined_batch_submits_everything_before_any_confirmation() {
        let chain = MockChain::new();
        let bob = signer(32);
        let mut tracker = Tracker::open(chain.clone(), bob.clone()).await.unwrap();

        let task = tokio::spawn(async move {
            let options = BatchOptions::default();
            run_pipelined(&mut tracker, vec!["hold-a", "hold-b"], &options).await
        });

        chain.wait_for_submissions(bob.account(), 2).await;
        chain.finalize_ok(bob.account(), 1);
        chain.finalize_ok(bob.account(), 0);

        let results = task.await.unwrap();
        assert_eq!(
            results,
            vec![
                ConfirmationResult::Accepted(block_for(0)),
                ConfirmationResult::Accepted(block_for(1)),
            ]
        );
    }

    #[tokio::test]
    async fn sequential_batch_waits_for_finality_between_calls() {
        let chain = MockChain::new();
        let root = signer(33);
        let mut tracker = Tracker::open(chain.clone(), root.clone()).await.unwrap();

        let task = tokio::spawn(async move {
            let options = BatchOptions::default();
            run_sequential(&mut tracker, vec!["hold-fund", "hold-claim"], &options).await
        });

        chain.wait_for_submissions(root.account(), 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(chain.submitted_by(root.account()).len(), 1);

        chain.finalize_ok(root.account(), 0);
        chain.wait_for_submissions(root.account(), 2).await;
        chain.finalize_ok(root.account(), 1);

        let results = task.await.unwrap();
        assert!(results.iter().all(ConfirmationResult::is_accepted));
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn abort_on_first_failure_truncates_the_results() {
        let chain = MockChain::new();
        let charlie = signer(34);
        let dave = signer(35);
        let options = BatchOptions::default().with_policy(FailurePolicy::AbortOnFirstFailure);

        let mut sequential = Tracker::open(chain.clone(), charlie.clone()).await.unwrap();
        let results = run_sequential(&mut sequential, vec!["ok", "fail", "ok"], &options).await;
        assert_eq!(results.len(), 2);
        assert!(matches!(results[1], ConfirmationResult::Failed(_)));
        assert_eq!(chain.submitted_by(charlie.account()).len(), 2);

        let mut pipelined = Tracker::open(chain.clone(), dave.clone()).await.unwrap();
        let results = run_pipelined(&mut pipelined, vec!["ok", "fail", "ok"], &options).await;
        assert_eq!(results.len(), 2);
        assert_eq!(chain.submitted_by(dave.account()).len(), 3);
    }

    #[tokio::test]
    async fn collect_all_reports_every_outcome() {
        let chain = MockChain::new();
        let eve = signer(36);
        let mut tracker = Tracker::open(chain.clone(), eve).await.unwrap();

        let results = run_pipelined(
            &mut tracker,
            vec!["ok", "fail", "reject", "ok"],
            &BatchOptions::default(),
        )
        .await;

        assert_eq!(results.len(), 4);
        assert!(results[0].is_accepted());
        assert!(matches!(results[1], ConfirmationResult::Failed(_)));
        assert!(matches!(results[2], ConfirmationResult::Invalid(_)));
        assert!(results[3].is_accepted());
    }

    #[tokio::test]
    async fn aborting_stops_unstarted_submissions_only() {
        let chain = MockChain::new();
        let ferdie = signer(37);
        let mut tracker = Tracker::open(chain.clone(), ferdie.clone()).await.unwrap();
        let (handle, signal) = abort_pair();

        let task = tokio::spawn(async move {
            let options = BatchOptions::default().with_abort(signal);
            run_sequential(&mut tracker, vec!["hold-1", "hold-2", "hold-3"], &options).await
        });

        chain.wait_for_submissions(ferdie.account(), 1).await;
        handle.abort();
        chain.finalize_ok(ferdie.account(), 0);

        let results = task.await.unwrap();
        assert_eq!(results, vec![ConfirmationResult::Accepted(block_for(0))]);
        assert_eq!(chain.submitted_by(ferdie.account()).len(), 1);
    }

    #[tokio::test]
    async fn one_failing_signer_does_not_hide_the_others() {
        let chain = MockChain::new();
        let signers = [signer(41), signer(42), signer(43)];
        let batches = vec![
            SignerBatch::new(signers[0].clone(), vec!["ok-a", "ok-b"]),
            SignerBatch::new(signers[1].clone(), vec!["ok-a", "fail-b"]),
            SignerBatch::new(signers[2].clone(), vec!["ok-a"]),
        ];

        let results = run_across_signers(
            chain.clone(),
            batches,
            BatchMode::Pipelined,
            &BatchOptions::default(),
        )
        .await
        .unwrap();

        let accounts: Vec<_> = results.keys().cloned().collect();
        let expected: Vec<_> = signers.iter().map(|s| s.account().clone()).collect();
        assert_eq!(accounts, expected);
        assert!(results[&expected[0]].iter().all(ConfirmationResult::is_accepted));
        assert_eq!(results[&expected[1]].len(), 2);
        assert!(matches!(
            &results[&expected[1]][1],
            ConfirmationResult::Failed(FailureReason::Module(m)) if m.method == "NotEligible"
        ));
        assert_eq!(
            results[&expected[2]],
            vec![ConfirmationResult::Accepted(block_for(0))]
        );
    }

    #[tokio::test]
    async fn unreachable_chain_fails_the_whole_run() {
        let chain = MockChain::new();
        chain.set_unavailable(true);
        let batches = vec![
            SignerBatch::new(signer(44), vec!["ok"]),
            SignerBatch::new(signer(45), vec!["ok"]),
        ];

        let outcome = run_across_signers(
            chain,
            batches,
            BatchMode::Sequential,
            &BatchOptions::default(),
        )
        .await;

        assert!(matches!(outcome, Err(Error::ChainUnavailable { .. })));
    }

    #[tokio::test]
    async fn signers_are_released_after_the_run() {
        let chain = MockChain::new();
        let account = signer(46);
        run_across_signers(
            chain.clone(),
            vec![SignerBatch::new(account.clone(), vec!["ok"])],
            BatchMode::Sequential,
            &BatchOptions::default(),
        )
        .await
        .unwrap();

        let tracker = Tracker::open(chain, account).await.unwrap();
        assert_eq!(tracker.next_nonce(), 0);
    }
}
