//! Rare and whitelisted Origin of Shell purchases.

use anyhow::Error;
use log::debug;
use tx_pipeline::BatchMode;

use crate::calls::{self, StatusType};
use crate::common::SaleContext;

/// Publishes Origin of Shell metadata, opens rare purchases and runs the planned purchases.
pub(crate) async fn rare_purchase(ctx: &SaleContext) -> Result<(), Error> {
    let plan = &ctx.plan;
    let overlord = ctx.accounts.overlord();

    ctx.admin(
        "Add Origin of Shell metadata",
        overlord,
        vec![calls::set_origin_of_shells_metadata(
            &plan.origin_of_shells_metadata,
        )],
        BatchMode::Sequential,
    )
    .await?;

    ctx.admin(
        "Set PurchaseRareOriginOfShells status to true",
        overlord,
        vec![calls::set_status_type(
            true,
            StatusType::PurchaseRareOriginOfShells,
        )],
        BatchMode::Sequential,
    )
    .await?;

    let purchases = ctx.batches(plan.rare_purchases.iter().map(|purchase| {
        (
            purchase.account,
            calls::buy_rare_origin_of_shell(purchase.rarity, purchase.race, purchase.career),
        )
    }));
    ctx.users("Buy rare Origin of Shell", purchases, BatchMode::Pipelined)
        .await?;

    Ok(())
}

/// Signs whitelist tickets, opens prime purchases and has each ticket holder buy a prime shell.
pub(crate) async fn whitelist_purchase(ctx: &SaleContext) -> Result<(), Error> {
    let plan = &ctx.plan;
    let overlord = ctx.accounts.overlord();

    let purchases = plan
        .whitelist_purchases
        .iter()
        .map(|purchase| {
            let buyer = ctx.accounts.get(purchase.account).account();
            let ticket = calls::whitelist_ticket(overlord.key(), buyer);
            debug!("Whitelist ticket for {}: 0x{}", buyer, hex::encode(ticket));
            (
                purchase.account,
                calls::buy_prime_origin_of_shell(ticket, purchase.race, purchase.career),
            )
        })
        .collect::<Vec<_>>();

    ctx.admin(
        "Set PurchasePrimeOriginOfShells status to true",
        overlord,
        vec![calls::set_status_type(
            true,
            StatusType::PurchasePrimeOriginOfShells,
        )],
        BatchMode::Sequential,
    )
    .await?;

    ctx.users(
        "Buy whitelisted prime Origin of Shell",
        ctx.batches(purchases),
        BatchMode::Pipelined,
    )
    .await?;

    Ok(())
}
