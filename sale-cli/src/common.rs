use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Error};
use indexmap::IndexMap;
use log::{error, info, warn};
use subxt::tx::DynamicPayload;
use subxt::utils::AccountId32;
use subxt_signer::sr25519::Keypair;
use tx_pipeline::{
    run_across_signers,
    run_pipelined,
    run_sequential,
    BatchMode,
    BatchOptions,
    ConfirmationResult,
    FailurePolicy,
    Signer,
    SignerBatch,
    SubxtClient,
    Tracker,
};

use crate::accounts::{AccountName, Accounts};
use crate::plan::SalePlan;

/// Outcomes of a user step keyed by account, each account's calls in submission order.
pub(crate) type Outcomes = BTreeMap<AccountId32, Vec<ConfirmationResult>>;

/// Everything a phase needs to talk to the chain.
pub(crate) struct SaleContext {
    /// Connected node.
    pub client: Arc<SubxtClient>,
    /// Signers of every sale account.
    pub accounts: Accounts,
    /// Phase parameters.
    pub plan: SalePlan,
    /// Timeout, confirmation level and abort signal shared by all steps.
    pub options: BatchOptions,
}

impl SaleContext {
    /// Runs an administrative step. Any call that is not accepted fails the phase.
    pub(crate) async fn admin(
        &self,
        step: &str,
        signer: &Signer<Keypair>,
        calls: Vec<DynamicPayload>,
        mode: BatchMode,
    ) -> Result<(), Error> {
        info!("🔧 {}...", step);
        let expected = calls.len();
        let options = self
            .options
            .clone()
            .with_policy(FailurePolicy::AbortOnFirstFailure);

        let mut tracker = Tracker::open(Arc::clone(&self.client), signer.clone()).await?;
        let results = match mode {
            BatchMode::Sequential => run_sequential(&mut tracker, calls, &options).await,
            BatchMode::Pipelined => run_pipelined(&mut tracker, calls, &options).await,
        };
        tracker.close();

        ensure_accepted(step, expected, &results)?;
        info!("✅ {}...Done", step);
        Ok(())
    }

    /// Runs user batches concurrently. Rejected calls are logged and returned, not raised.
    pub(crate) async fn users(
        &self,
        step: &str,
        batches: Vec<SignerBatch<SubxtClient>>,
        mode: BatchMode,
    ) -> Result<Outcomes, Error> {
        info!("👥 {} for {} accounts...", step, batches.len());
        let outcomes =
            run_across_signers(Arc::clone(&self.client), batches, mode, &self.options).await?;
        let rejected = report(step, &outcomes);
        if rejected == 0 {
            info!("✅ {}...Done", step);
        } else {
            warn!("⚠️ {}...Done, {} calls not accepted", step, rejected);
        }
        Ok(outcomes)
    }

    /// Groups calls into one batch per account, keeping each account's calls in order.
    pub(crate) fn batches(
        &self,
        calls: impl IntoIterator<Item = (AccountName, DynamicPayload)>,
    ) -> Vec<SignerBatch<SubxtClient>> {
        group_by_account(calls)
            .into_iter()
            .map(|(name, calls)| SignerBatch::new(self.accounts.get(name).clone(), calls))
            .collect()
    }
}

/// Groups values per account, accounts in first-seen order.
pub(crate) fn group_by_account<T>(
    calls: impl IntoIterator<Item = (AccountName, T)>,
) -> IndexMap<AccountName, Vec<T>> {
    let mut grouped: IndexMap<AccountName, Vec<T>> = IndexMap::new();
    for (name, call) in calls {
        grouped.entry(name).or_default().push(call);
    }
    grouped
}

/// Fails unless all `expected` calls ran and were accepted.
fn ensure_accepted(
    step: &str,
    expected: usize,
    results: &[ConfirmationResult],
) -> Result<(), Error> {
    if let Some((index, result)) = results
        .iter()
        .enumerate()
        .find(|(_, result)| !result.is_accepted())
    {
        bail!("{}: call {} of {}: {}", step, index + 1, expected, result);
    }
    if results.len() < expected {
        bail!(
            "{}: aborted after {} of {} calls",
            step,
            results.len(),
            expected
        );
    }
    Ok(())
}

/// Logs every outcome and returns how many calls were not accepted.
fn report(step: &str, outcomes: &Outcomes) -> usize {
    let mut rejected = 0;
    for (account, results) in outcomes {
        for result in results {
            if result.is_accepted() {
                info!("🟢 {} by {}: {}", step, account, result);
            } else {
                error!("🔴 {} by {}: {}", step, account, result);
                rejected += 1;
            }
        }
    }
    rejected
}

#[cfg(test)]
mod tests {
    use subxt::utils::H256;
    use tx_pipeline::FailureReason;

    use super::*;

    #[test]
    fn admin_step_needs_every_call_accepted() {
        let accepted = ConfirmationResult::Accepted(H256::zero());
        assert!(ensure_accepted("init", 2, &[accepted.clone(), accepted.clone()]).is_ok());

        let failed = ConfirmationResult::Failed(FailureReason::Dispatch("BadOrigin".into()));
        let err = ensure_accepted("init", 2, &[accepted.clone(), failed]).unwrap_err();
        assert!(err.to_string().contains("call 2 of 2"));

        let err = ensure_accepted("init", 3, &[accepted]).unwrap_err();
        assert!(err.to_string().contains("aborted after 1 of 3"));
    }

    #[test]
    fn calls_are_grouped_per_account_in_order() {
        let grouped = group_by_account([
            (AccountName::Bob, 1),
            (AccountName::Alice, 2),
            (AccountName::Bob, 3),
        ]);
        let accounts: Vec<_> = grouped.keys().copied().collect();
        assert_eq!(accounts, vec![AccountName::Bob, AccountName::Alice]);
        assert_eq!(grouped[&AccountName::Bob], vec![1, 3]);
        assert_eq!(grouped[&AccountName::Alice], vec![2]);
    }

    #[test]
    fn report_counts_calls_not_accepted() {
        let mut outcomes = Outcomes::new();
        outcomes.insert(
            AccountId32([1; 32]),
            vec![
                ConfirmationResult::Accepted(H256::zero()),
                ConfirmationResult::TimedOut,
            ],
        );
        outcomes.insert(
            AccountId32([2; 32]),
            vec![ConfirmationResult::Invalid("bad signature".into())],
        );
        assert_eq!(report("claim spirit", &outcomes), 2);
    }
}
