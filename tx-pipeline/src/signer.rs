use std::fmt;
use std::sync::Arc;

use subxt::utils::AccountId32;

/// An account able to sign calls.
///
/// The key is opaque to the pipeline; only the chain client knows how to sign with it.
/// Clones share the same key.
pub struct Signer<K> {
    account: AccountId32,
    key: Arc<K>,
}

impl<K> Signer<K> {
    /// Wraps a signing key together with the account id it signs for.
    pub fn new(account: AccountId32, key: K) -> Self {
        Self {
            account,
            key: Arc::new(key),
        }
    }

    /// The on-chain account id of this signer.
    pub fn account(&self) -> &AccountId32 {
        &self.account
    }

    /// The signing key handed to the chain client.
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Clone for Signer<K> {
    fn clone(&self) -> Self {
        Self {
            account: self.account.clone(),
            key: Arc::clone(&self.key),
        }
    }
}

impl<K> fmt::Debug for Signer<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("account", &self.account.to_string())
            .finish_non_exhaustive()
    }
}
