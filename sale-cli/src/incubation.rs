use std::collections::BTreeMap;

use anyhow::{Context, Error};
use log::info;
use tx_pipeline::BatchMode;

use crate::accounts::AccountName;
use crate::calls;
use crate::chain_state;
use crate::common::SaleContext;

/// Times fed per `(collection, nft)`.
pub(crate) type FeedCounts = BTreeMap<(u32, u32), u32>;

/// Enables incubation, starts it for every owned shell, runs the feeding rounds and rewards the
/// most fed shells of the current era with shorter hatch times.
pub(crate) async fn incubation(ctx: &SaleContext) -> Result<(), Error> {
    let plan = &ctx.plan.incubation;
    let overlord = ctx.accounts.overlord();

    let collection_id = match plan.collection_id {
        Some(id) => id,
        None => chain_state::origin_of_shell_collection_id(&ctx.client)
            .await?
            .context("Origin of Shell collection id is not configured")?,
    };

    ctx.admin(
        "Enable the incubation process",
        overlord,
        vec![calls::set_can_start_incubation_status(true)],
        BatchMode::Sequential,
    )
    .await?;

    let shells = shells_to_incubate(ctx, collection_id).await?;
    let starts = ctx.batches(
        shells
            .into_iter()
            .map(|(name, nft_id)| (name, calls::start_incubation(collection_id, nft_id))),
    );
    ctx.users("Start incubation", starts, BatchMode::Pipelined)
        .await?;

    for (round, feeds) in plan.feeding_rounds.iter().enumerate() {
        let batches = ctx.batches(feeds.iter().map(|feed| {
            (
                feed.account,
                calls::feed_origin_of_shell(collection_id, feed.nft_id),
            )
        }));
        let step = format!("Feeding round {}", round + 1);
        ctx.users(&step, batches, BatchMode::Pipelined).await?;
    }

    let era = chain_state::era(&ctx.client).await?;
    let counts = chain_state::food_stats(&ctx.client, era).await?;
    info!("🍽️ {} Origin of Shells fed in era {}", counts.len(), era);

    let reductions = rank_hatch_times(&counts, &plan.hatch_time_reductions);
    if reductions.is_empty() {
        info!("No fed Origin of Shells, hatch times unchanged");
        return Ok(());
    }

    ctx.admin(
        "Update incubation times",
        overlord,
        vec![calls::update_incubation_time(&reductions)],
        BatchMode::Sequential,
    )
    .await
}

/// The plan's owners if it names any, otherwise every incubator's shells found on chain.
async fn shells_to_incubate(
    ctx: &SaleContext,
    collection_id: u32,
) -> Result<Vec<(AccountName, u32)>, Error> {
    let plan = &ctx.plan.incubation;
    if !plan.owners.is_empty() {
        return Ok(plan
            .owners
            .iter()
            .flat_map(|owner| owner.nft_ids.iter().map(|nft_id| (owner.account, *nft_id)))
            .collect());
    }

    let mut shells = Vec::new();
    for name in &plan.incubators {
        let account = ctx.accounts.get(*name).account();
        for nft_id in chain_state::owned_nfts(&ctx.client, account, collection_id).await? {
            info!("🥚 {:?} owns Origin of Shell {}", name, nft_id);
            shells.push((*name, nft_id));
        }
    }
    Ok(shells)
}

/// Most fed first, ties broken by collection and NFT id; each gets the next reduction until
/// they run out.
fn rank_hatch_times(counts: &FeedCounts, reductions: &[u64]) -> Vec<((u32, u32), u64)> {
    let mut fed: Vec<((u32, u32), u32)> = counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(nft, count)| (*nft, *count))
        .collect();
    fed.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    fed.into_iter()
        .zip(reductions)
        .map(|((nft, _), seconds)| (nft, *seconds))
        .collect()
}
