//! substrate chain client backed by `subxt`
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, error, info};
use subxt::backend::rpc::reconnecting_rpc_client::RpcClient;
use subxt::config::polkadot::PolkadotExtrinsicParamsBuilder as Params;
use subxt::error::DispatchError;
use subxt::tx::{DynamicPayload, TxInBlock, TxProgress, TxStatus};
use subxt::utils::AccountId32;
use subxt::{OnlineClient, PolkadotConfig};
use subxt_signer::sr25519::Keypair;
use url::Url;

use crate::client::{ChainClient, ChainEvent, DispatchFailure, StatusStream, TxStatusEvent};
use crate::signer::Signer;
use crate::submission::ModuleFailure;

/// The `API` type represents a connected Substrate client that interacts with the blockchain.
pub type API = OnlineClient<PolkadotConfig>;

/// [`ChainClient`] for a Substrate node, submitting dynamically built calls signed with sr25519
/// keys.
#[derive(Clone)]
pub struct SubxtClient {
    api: API,
}

impl SubxtClient {
    /// Wraps an already connected client.
    pub fn new(api: API) -> Self {
        Self { api }
    }

    /// Connects to the node at `url` over a reconnecting websocket client.
    pub async fn connect(url: &Url) -> Result<Self, subxt::Error> {
        info!("🔵 Connecting to Substrate node at {}", url);

        let rpc_client = RpcClient::builder()
            .max_request_size(10 * 1024 * 1024)
            .max_response_size(10 * 1024 * 1024)
            .request_timeout(Duration::from_secs(60))
            .connection_timeout(Duration::from_secs(10))
            .build(url.to_string())
            .await
            .map_err(|e| subxt::Error::Other(e.to_string()))?;

        let api = API::from_rpc_client(rpc_client).await?;
        info!(
            "🟢 Connected, runtime spec version {}",
            api.runtime_version().spec_version
        );
        Ok(Self::new(api))
    }

    /// The underlying `subxt` client.
    pub fn api(&self) -> &API {
        &self.api
    }
}

/// Builds a pipeline signer from an sr25519 keypair.
pub fn sr25519_signer(keypair: Keypair) -> Signer<Keypair> {
    let account = AccountId32::from(keypair.public_key().0);
    Signer::new(account, keypair)
}

#[async_trait]
impl ChainClient for SubxtClient {
    type Key = Keypair;
    type Call = DynamicPayload;

    async fn account_nonce(&self, account: &AccountId32) -> Result<u64, subxt::Error> {
        self.api.tx().account_nonce(account).await
    }

    async fn submit_signed(
        &self,
        call: Self::Call,
        signer: &Signer<Self::Key>,
        nonce: u64,
    ) -> StatusStream {
        let tx_params = Params::new().nonce(nonce).build();

        match self
            .api
            .tx()
            .sign_and_submit_then_watch(&call, signer.key(), tx_params)
            .await
        {
            Ok(progress) => {
                debug!(
                    "Transaction {:?} submitted by {} with nonce {}",
                    progress.extrinsic_hash(),
                    signer.account(),
                    nonce
                );
                watch_progress(progress)
            }
            Err(err) => {
                error!(
                    "❌ Node refused {}.{} from {} with nonce {}: {}",
                    call.pallet_name(),
                    call.call_name(),
                    signer.account(),
                    nonce,
                    err
                );
                stream::iter([TxStatusEvent::Invalid(err.to_string())]).boxed()
            }
        }
    }

    fn decode_module_error(&self, pallet_index: u8, error: [u8; 4]) -> Option<ModuleFailure> {
        let metadata = self.api.metadata();
        let pallet = metadata.pallet_by_index(pallet_index)?;
        let variant = pallet.error_variant_by_index(error[0])?;

        Some(ModuleFailure {
            section: lower_camel(pallet.name()),
            method: variant.name.clone(),
            description: variant.docs.join(" "),
        })
    }
}

/// Turns `subxt` progress updates into pipeline status events, ending at the first terminal
/// one.
fn watch_progress(progress: TxProgress<PolkadotConfig, API>) -> StatusStream {
    let events = stream! {
        let mut progress = progress;
        while let Some(status) = progress.next().await {
            match status {
                Ok(TxStatus::Validated) => debug!("📄 Transaction has been validated."),
                Ok(TxStatus::Broadcasted { num_peers }) => {
                    debug!("📡 Transaction broadcasted to {} peers.", num_peers);
                }
                Ok(TxStatus::InBestBlock(details)) => {
                    yield TxStatusEvent::InBlock(details.block_hash());
                }
                Ok(TxStatus::NoLongerInBestBlock) => yield TxStatusEvent::Retracted,
                Ok(TxStatus::InFinalizedBlock(details)) => {
                    for event in finalized(details).await {
                        yield event;
                    }
                    return;
                }
                Ok(TxStatus::Invalid { message }) => {
                    yield TxStatusEvent::Invalid(message);
                    return;
                }
                Ok(TxStatus::Dropped { message }) => {
                    yield TxStatusEvent::Dropped(message);
                    return;
                }
                Ok(TxStatus::Error { message }) => {
                    yield TxStatusEvent::Lost(format!("node stopped reporting: {message}"));
                    return;
                }
                Err(err) => {
                    yield TxStatusEvent::Lost(format!("lost track of transaction: {err}"));
                    return;
                }
            }
        }
    };
    events.boxed()
}

/// Collects the events of a finalized call, turning a dispatch error into `ExtrinsicFailed`.
///
/// If the events cannot be fetched the call is known to be included but its result is not, so
/// only inclusion is reported before tracking ends.
async fn finalized(details: TxInBlock<PolkadotConfig, API>) -> Vec<TxStatusEvent> {
    let block = details.block_hash();

    let events = match details.wait_for_success().await {
        Ok(events) => events
            .iter()
            .filter_map(|event| event.ok())
            .map(|event| match (event.pallet_name(), event.variant_name()) {
                ("System", "ExtrinsicSuccess") => ChainEvent::ExtrinsicSuccess,
                (pallet, variant) => ChainEvent::Other {
                    pallet: pallet.to_string(),
                    variant: variant.to_string(),
                },
            })
            .collect(),
        Err(subxt::Error::Runtime(DispatchError::Module(module_error))) => {
            let [pallet_index, e0, e1, e2, e3] = module_error.bytes();
            vec![ChainEvent::ExtrinsicFailed(DispatchFailure::Module {
                pallet_index,
                error: [e0, e1, e2, e3],
            })]
        }
        Err(subxt::Error::Runtime(dispatch_error)) => {
            vec![ChainEvent::ExtrinsicFailed(DispatchFailure::Other(
                dispatch_error.to_string(),
            ))]
        }
        Err(err) => {
            error!("❌ Could not fetch events of block {:?}: {}", block, err);
            return vec![
                TxStatusEvent::InBlock(block),
                TxStatusEvent::Lost(format!(
                    "finalized in {block:?} but its events could not be fetched: {err}"
                )),
            ];
        }
    };

    vec![TxStatusEvent::Finalized { block, events }]
}

/// `PwNftSale` -> `pwNftSale`, matching how pallet sections are usually displayed.
fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
