use anyhow::Error;
use tx_pipeline::BatchMode;

use crate::calls::{self, token, StatusType};
use crate::common::SaleContext;

/// Opens spirit claims, funds the claimants and has each of them claim a spirit.
pub(crate) async fn spirit_claim(ctx: &SaleContext) -> Result<(), Error> {
    let plan = &ctx.plan;
    let overlord = ctx.accounts.overlord();

    ctx.admin(
        "Add spirit metadata",
        overlord,
        vec![calls::set_spirits_metadata(&plan.spirit_metadata)],
        BatchMode::Sequential,
    )
    .await?;

    ctx.admin(
        "Set ClaimSpirits status to true",
        overlord,
        vec![calls::set_status_type(true, StatusType::ClaimSpirits)],
        BatchMode::Sequential,
    )
    .await?;

    if plan.spirit_claimants.is_empty() {
        return Ok(());
    }

    let funding = plan
        .spirit_claimants
        .iter()
        .map(|name| {
            calls::transfer(
                ctx.accounts.get(*name).account(),
                token(plan.spirit_claim_funding),
            )
        })
        .collect();
    ctx.admin(
        "Fund spirit claimants",
        overlord,
        funding,
        BatchMode::Pipelined,
    )
    .await?;

    let claims = ctx.batches(
        plan.spirit_claimants
            .iter()
            .map(|name| (*name, calls::claim_spirit())),
    );
    ctx.users("Claim spirit", claims, BatchMode::Pipelined)
        .await?;

    Ok(())
}
