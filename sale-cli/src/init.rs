use anyhow::Error;
use tx_pipeline::BatchMode;

use crate::calls::{self, token, StatusType};
use crate::common::SaleContext;

/// Funds the sale accounts, installs the overlord and configures collections and inventory.
pub(crate) async fn init(ctx: &SaleContext) -> Result<(), Error> {
    let plan = &ctx.plan;
    let root = ctx.accounts.root();
    let overlord = ctx.accounts.overlord();

    if !plan.initial_funding.is_empty() {
        let transfers = plan
            .initial_funding
            .iter()
            .map(|funding| {
                calls::transfer(
                    ctx.accounts.get(funding.account).account(),
                    token(funding.amount),
                )
            })
            .collect();
        ctx.admin("Fund sale accounts", root, transfers, BatchMode::Pipelined)
            .await?;
    }

    ctx.admin(
        "Set new overlord",
        root,
        vec![calls::sudo(calls::set_overlord(overlord.account()))],
        BatchMode::Sequential,
    )
    .await?;

    ctx.admin(
        "Initialize Phala World clock",
        overlord,
        vec![calls::initialize_world_clock()],
        BatchMode::Sequential,
    )
    .await?;

    // ids are assigned in creation order, so each set follows its create
    let collections = &plan.collections;
    ctx.admin(
        "Create Spirit, Origin of Shell and Shell collections",
        overlord,
        vec![
            calls::create_collection(&collections.spirit.metadata, &collections.spirit.symbol),
            calls::set_spirit_collection_id(collections.spirit.id),
            calls::create_collection(
                &collections.origin_of_shell.metadata,
                &collections.origin_of_shell.symbol,
            ),
            calls::set_origin_of_shell_collection_id(collections.origin_of_shell.id),
            calls::create_collection(&collections.shell.metadata, &collections.shell.symbol),
            calls::set_shell_collection_id(collections.shell.id),
        ],
        BatchMode::Pipelined,
    )
    .await?;

    ctx.admin(
        "Initialize Origin of Shell sale inventory",
        overlord,
        vec![calls::init_rarity_type_counts()],
        BatchMode::Sequential,
    )
    .await?;

    if plan.open_spirit_claims {
        ctx.admin(
            "Set ClaimSpirits status to true",
            overlord,
            vec![calls::set_status_type(true, StatusType::ClaimSpirits)],
            BatchMode::Sequential,
        )
        .await?;
    }

    Ok(())
}
