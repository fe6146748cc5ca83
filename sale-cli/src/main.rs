//! This utility drives the Phala World NFT sale on a Khala-style chain, one sale phase per
//! subcommand, submitting every call through the nonce-pipelined transaction tracker.

mod accounts;
mod calls;
mod chain_state;
mod common;
mod incubation;
mod init;
mod plan;
mod preorders;
mod purchases;
mod spirit_claim;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use clap::{Parser, Subcommand};
use futures::stream::{self, Stream, StreamExt};
use log::{error, info, warn};
use tx_pipeline::{abort_pair, AbortHandle, BatchOptions, SubxtClient};

use crate::accounts::KeyArgs;
use crate::common::SaleContext;
use crate::plan::SalePlan;

/// CLI entrypoint
#[derive(clap::Parser)]
#[command(
    name = "pw-sale",
    version,
    about = "Runs the phases of the Phala World NFT sale"
)]
struct Cli {
    /// Node RPC endpoint
    #[arg(long, env = "ENDPOINT", default_value = "ws://127.0.0.1:9944")]
    endpoint: url::Url,

    /// JSON sale plan; built-in defaults are used for anything it leaves out
    #[arg(long, env = "SALE_PLAN")]
    plan: Option<PathBuf>,

    /// Seconds to wait for each call to be confirmed
    #[arg(long, env = "CONFIRMATION_TIMEOUT_SECS", default_value_t = 120)]
    confirmation_timeout_secs: u64,

    #[command(flatten)]
    keys: KeyArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy, Debug)]
enum Commands {
    /// Fund the sale accounts, set the overlord and create the collections
    Init,
    /// Open spirit claims and have every claimant claim a spirit
    SpiritClaim,
    /// Publish Origin of Shell metadata and run the rare purchases
    RarePurchase,
    /// Sign whitelist tickets and run the prime purchases
    WhitelistPurchase,
    /// Release the prime inventory and open preorders
    Preorder,
    /// Settle preorders and run the last day of the sale
    LastDay,
    /// Start incubation, feed the shells and shorten the hatch times of the most fed
    Incubation,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let command = cli.command;

    if let Err(e) = run(cli).await {
        error!("❌ {:?} failed: {:#}", command, e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let plan = match &cli.plan {
        Some(path) => SalePlan::load(path)?,
        None => SalePlan::default(),
    };
    let accounts = cli.keys.load()?;
    let client = Arc::new(SubxtClient::connect(&cli.endpoint).await?);

    let (abort, signal) = abort_pair();
    tokio::spawn(async move {
        let ctrl_c = stream::unfold((), |()| async {
            tokio::signal::ctrl_c().await.ok().map(|_| ((), ()))
        });
        if handle_interrupts(Box::pin(ctrl_c), abort).await {
            error!("🛑 Second Ctrl-C received, exiting without waiting for confirmations");
            process::exit(130);
        }
    });

    let ctx = SaleContext {
        client,
        accounts,
        plan,
        options: BatchOptions::default()
            .with_timeout(Duration::from_secs(cli.confirmation_timeout_secs))
            .with_abort(signal),
    };

    info!("🚀 Running {:?}", cli.command);
    match cli.command {
        Commands::Init => init::init(&ctx).await?,
        Commands::SpiritClaim => spirit_claim::spirit_claim(&ctx).await?,
        Commands::RarePurchase => purchases::rare_purchase(&ctx).await?,
        Commands::WhitelistPurchase => purchases::whitelist_purchase(&ctx).await?,
        Commands::Preorder => preorders::preorder(&ctx).await?,
        Commands::LastDay => preorders::last_day(&ctx).await?,
        Commands::Incubation => incubation::incubation(&ctx).await?,
    }
    info!("🏁 {:?} complete", cli.command);

    Ok(())
}

/// Aborts the running phase on the first interrupt. Returns `true` once a second interrupt
/// arrives, `false` if the interrupts stop first.
async fn handle_interrupts(
    mut interrupts: impl Stream<Item = ()> + Unpin,
    abort: AbortHandle,
) -> bool {
    if interrupts.next().await.is_none() {
        return false;
    }
    warn!("🛑 Ctrl-C received, calls not yet submitted will be skipped; press again to exit");
    abort.abort();

    interrupts.next().await.is_some()
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[tokio::test]
    async fn first_interrupt_aborts_and_second_exits() {
        let (abort, signal) = abort_pair();
        assert!(handle_interrupts(stream::iter([(), ()]), abort).await);
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn a_single_interrupt_only_aborts() {
        let (abort, signal) = abort_pair();
        assert!(!handle_interrupts(stream::iter([()]), abort).await);
        assert!(signal.is_aborted());

        let (abort, signal) = abort_pair();
        assert!(!handle_interrupts(stream::empty::<()>(), abort).await);
        assert!(!signal.is_aborted());
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn phases_are_kebab_case_subcommands() {
        let cli = Cli::try_parse_from(["pw-sale", "last-day"]).unwrap();
        assert!(matches!(cli.command, Commands::LastDay));
        assert_eq!(cli.endpoint.as_str(), "ws://127.0.0.1:9944/");
    }
}
