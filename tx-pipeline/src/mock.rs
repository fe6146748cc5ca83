//! In-memory chain client for tests.
//!
//! Calls are plain strings and their fate is chosen by prefix:
//! - `ok…` is included and finalized successfully right away,
//! - `fail…` is finalized with `pwNftSale.NotEligible`,
//! - `dispatch…` is finalized with a non-module `BadOrigin` error,
//! - `unknown…` is finalized with a module error missing from the metadata,
//! - `reject…` is reported invalid,
//! - anything else stays pending until the test calls [`MockChain::emit`] or
//!   [`MockChain::close`].
//!
//! The signer registry is process wide, so every test must use its own account bytes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use subxt::utils::{AccountId32, H256};

use crate::client::{ChainClient, ChainEvent, DispatchFailure, StatusStream, TxStatusEvent};
use crate::signer::Signer;
use crate::submission::ModuleFailure;

pub(crate) const PW_NFT_SALE_INDEX: u8 = 88;
pub(crate) const NOT_ELIGIBLE: u8 = 3;
pub(crate) const UNKNOWN_PALLET_INDEX: u8 = 200;

/// One call the mock received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Submitted {
    pub account: AccountId32,
    pub nonce: u64,
    pub call: &'static str,
}

#[derive(Default)]
pub(crate) struct MockChain {
    nonces: Mutex<BTreeMap<AccountId32, u64>>,
    unavailable: AtomicBool,
    submitted: Mutex<Vec<Submitted>>,
    feeds: Mutex<BTreeMap<(AccountId32, u64), UnboundedSender<TxStatusEvent>>>,
}

pub(crate) fn signer(byte: u8) -> Signer<()> {
    Signer::new(AccountId32([byte; 32]), ())
}

pub(crate) fn block_for(nonce: u64) -> H256 {
    H256::from_low_u64_be(nonce + 1)
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_nonce(&self, account: &AccountId32, nonce: u64) {
        self.nonces.lock().unwrap().insert(account.clone(), nonce);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submitted_by(&self, account: &AccountId32) -> Vec<Submitted> {
        self.submitted()
            .into_iter()
            .filter(|s| &s.account == account)
            .collect()
    }

    pub fn emit(&self, account: &AccountId32, nonce: u64, event: TxStatusEvent) {
        let feeds = self.feeds.lock().unwrap();
        let feed = feeds
            .get(&(account.clone(), nonce))
            .expect("no submission with that nonce");
        feed.unbounded_send(event).expect("tracker stopped listening");
    }

    /// Ends the status stream of a submission without a further event.
    pub fn close(&self, account: &AccountId32, nonce: u64) {
        let feed = self
            .feeds
            .lock()
            .unwrap()
            .remove(&(account.clone(), nonce))
            .expect("no submission with that nonce");
        drop(feed);
    }

    pub fn finalize_ok(&self, account: &AccountId32, nonce: u64) {
        self.emit(
            account,
            nonce,
            TxStatusEvent::Finalized {
                block: block_for(nonce),
                events: vec![ChainEvent::ExtrinsicSuccess],
            },
        );
    }

    /// Polls until `count` calls from `account` have been submitted.
    pub async fn wait_for_submissions(&self, account: &AccountId32, count: usize) {
        while self.submitted_by(account).len() < count {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    type Key = ();
    type Call = &'static str;

    async fn account_nonce(&self, account: &AccountId32) -> Result<u64, subxt::Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(subxt::Error::Other("connection refused".into()));
        }
        Ok(self
            .nonces
            .lock()
            .unwrap()
            .get(account)
            .copied()
            .unwrap_or(0))
    }

    async fn submit_signed(
        &self,
        call: Self::Call,
        signer: &Signer<Self::Key>,
        nonce: u64,
    ) -> StatusStream {
        let account = signer.account().clone();
        self.submitted.lock().unwrap().push(Submitted {
            account: account.clone(),
            nonce,
            call,
        });

        let (feed, stream) = unbounded();
        let block = block_for(nonce);
        if call.starts_with("ok") {
            let _ = feed.unbounded_send(TxStatusEvent::InBlock(block));
            let _ = feed.unbounded_send(TxStatusEvent::Finalized {
                block,
                events: vec![ChainEvent::ExtrinsicSuccess],
            });
        } else if call.starts_with("fail") {
            let _ = feed.unbounded_send(TxStatusEvent::InBlock(block));
            let _ = feed.unbounded_send(TxStatusEvent::Finalized {
                block,
                events: vec![
                    ChainEvent::Other {
                        pallet: "Balances".to_string(),
                        variant: "Withdraw".to_string(),
                    },
                    ChainEvent::ExtrinsicFailed(DispatchFailure::Module {
                        pallet_index: PW_NFT_SALE_INDEX,
                        error: [NOT_ELIGIBLE, 0, 0, 0],
                    }),
                ],
            });
        } else if call.starts_with("dispatch") {
            let _ = feed.unbounded_send(TxStatusEvent::Finalized {
                block,
                events: vec![ChainEvent::ExtrinsicFailed(DispatchFailure::Other(
                    "BadOrigin".to_string(),
                ))],
            });
        } else if call.starts_with("unknown") {
            let _ = feed.unbounded_send(TxStatusEvent::Finalized {
                block,
                events: vec![ChainEvent::ExtrinsicFailed(DispatchFailure::Module {
                    pallet_index: UNKNOWN_PALLET_INDEX,
                    error: [7, 0, 0, 0],
                })],
            });
        } else if call.starts_with("reject") {
            let _ = feed.unbounded_send(TxStatusEvent::Invalid(
                "Transaction has a bad signature".to_string(),
            ));
        }
        self.feeds.lock().unwrap().insert((account, nonce), feed);

        stream.boxed()
    }

    fn decode_module_error(&self, pallet_index: u8, error: [u8; 4]) -> Option<ModuleFailure> {
        (pallet_index == PW_NFT_SALE_INDEX && error[0] == NOT_ELIGIBLE).then(|| ModuleFailure {
            section: "pwNftSale".to_string(),
            method: "NotEligible".to_string(),
            description: "The account is not eligible for this sale phase".to_string(),
        })
    }
}
