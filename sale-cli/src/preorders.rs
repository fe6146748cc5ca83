//! Preorder window and the last day of the sale.

use anyhow::Error;
use tx_pipeline::BatchMode;

use crate::calls::{self, RarityType, StatusType};
use crate::common::SaleContext;
use crate::plan::ShellChoice;

/// Closes prime purchases, releases the prime inventory and opens preorders.
pub(crate) async fn preorder(ctx: &SaleContext) -> Result<(), Error> {
    let plan = &ctx.plan;
    let overlord = ctx.accounts.overlord();

    ctx.admin(
        "Set PurchasePrimeOriginOfShells status to false",
        overlord,
        vec![calls::set_status_type(
            false,
            StatusType::PurchasePrimeOriginOfShells,
        )],
        BatchMode::Sequential,
    )
    .await?;

    ctx.admin(
        "Update prime Origin of Shell inventory",
        overlord,
        vec![calls::update_rarity_type_counts(
            RarityType::Prime,
            plan.prime_inventory.for_sale,
            plan.prime_inventory.giveaway,
        )],
        BatchMode::Sequential,
    )
    .await?;

    ctx.admin(
        "Set PreorderOriginOfShells status to true",
        overlord,
        vec![calls::set_status_type(
            true,
            StatusType::PreorderOriginOfShells,
        )],
        BatchMode::Sequential,
    )
    .await?;

    place_preorders(ctx, "Preorder Origin of Shell", &plan.preorders).await
}

/// Settles the preorder window, then runs the last day of the sale and settles it too.
pub(crate) async fn last_day(ctx: &SaleContext) -> Result<(), Error> {
    let plan = &ctx.plan;
    let overlord = ctx.accounts.overlord();

    ctx.admin(
        "Set PreorderOriginOfShells status to false",
        overlord,
        vec![calls::set_status_type(
            false,
            StatusType::PreorderOriginOfShells,
        )],
        BatchMode::Sequential,
    )
    .await?;

    settle_preorders(ctx, &plan.chosen_preorders, &plan.not_chosen_preorders).await?;

    ctx.admin(
        "Set LastDayOfSale status to true",
        overlord,
        vec![calls::set_status_type(true, StatusType::LastDayOfSale)],
        BatchMode::Sequential,
    )
    .await?;

    place_preorders(
        ctx,
        "Last day preorder Origin of Shell",
        &plan.last_day_preorders,
    )
    .await?;

    settle_preorders(
        ctx,
        &plan.last_day_chosen_preorders,
        &plan.last_day_not_chosen_preorders,
    )
    .await
}

async fn place_preorders(
    ctx: &SaleContext,
    step: &str,
    preorders: &[ShellChoice],
) -> Result<(), Error> {
    let batches = ctx.batches(preorders.iter().map(|preorder| {
        (
            preorder.account,
            calls::preorder_origin_of_shell(preorder.race, preorder.career),
        )
    }));
    ctx.users(step, batches, BatchMode::Pipelined).await?;
    Ok(())
}

/// Mints the chosen preorders, then refunds the rest.
async fn settle_preorders(
    ctx: &SaleContext,
    chosen: &[u32],
    not_chosen: &[u32],
) -> Result<(), Error> {
    let overlord = ctx.accounts.overlord();

    if !chosen.is_empty() {
        ctx.admin(
            "Mint chosen preorders",
            overlord,
            vec![calls::mint_chosen_preorders(chosen)],
            BatchMode::Sequential,
        )
        .await?;
    }

    if !not_chosen.is_empty() {
        ctx.admin(
            "Refund not chosen preorders",
            overlord,
            vec![calls::refund_not_chosen_preorders(not_chosen)],
            BatchMode::Sequential,
        )
        .await?;
    }

    Ok(())
}
