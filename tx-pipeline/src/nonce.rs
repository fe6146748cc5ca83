//! Per-signer nonce bookkeeping.
//!
//! A [`NonceCursor`] hands out nonces for one signer. A [`SignerLease`] proves that the
//! holder is the only open tracker for that signer in this process; leases are recorded in a
//! process-wide registry and released on drop.

use std::collections::BTreeSet;
use std::sync::Mutex;

use lazy_static::lazy_static;
use log::debug;
use subxt::utils::AccountId32;

use crate::error::{Error, Result};

lazy_static! {
    /// Accounts that currently have an open tracker.
    static ref OPEN_SIGNERS: Mutex<BTreeSet<AccountId32>> = Mutex::new(BTreeSet::new());
}

/// The next nonce to use for one signer.
#[derive(Debug, PartialEq, Eq)]
pub struct NonceCursor {
    next: u64,
}

impl NonceCursor {
    /// Starts the cursor at the nonce reported by the chain.
    pub fn new(start: u64) -> Self {
        Self { next: start }
    }

    /// The nonce the next submission will use.
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Issues the current nonce and moves past it. Issued nonces are never handed out again.
    pub fn advance(&mut self) -> u64 {
        let nonce = self.next;
        self.next += 1;
        nonce
    }

    /// Replaces the cursor with a fresh chain reading, recycling unused slots.
    pub(crate) fn reset(&mut self, chain_nonce: u64) {
        self.next = chain_nonce;
    }
}

/// Exclusive claim on a signer's nonce sequence.
#[derive(Debug)]
pub struct SignerLease {
    account: AccountId32,
}

impl SignerLease {
    /// Claims `account`, failing if another lease for it is alive.
    pub fn acquire(account: &AccountId32) -> Result<Self> {
        let mut open = OPEN_SIGNERS.lock().unwrap_or_else(|e| e.into_inner());
        if !open.insert(account.clone()) {
            return Err(Error::AlreadyOpen {
                account: account.clone(),
            });
        }
        debug!("Leased nonce sequence of {}", account);
        Ok(Self {
            account: account.clone(),
        })
    }

    /// The claimed account.
    pub fn account(&self) -> &AccountId32 {
        &self.account
    }
}

impl Drop for SignerLease {
    fn drop(&mut self) {
        let mut open = OPEN_SIGNERS.lock().unwrap_or_else(|e| e.into_inner());
        open.remove(&self.account);
        debug!("Released nonce sequence of {}", self.account);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_issues_consecutive_nonces() {
        let mut cursor = NonceCursor::new(5);
        assert_eq!(cursor.advance(), 5);
        assert_eq!(cursor.advance(), 6);
        assert_eq!(cursor.peek(), 7);
    }

    #[test]
    fn lease_is_exclusive_until_dropped() {
        let account = AccountId32([201; 32]);
        let lease = SignerLease::acquire(&account).unwrap();
        assert!(matches!(
            SignerLease::acquire(&account),
            Err(Error::AlreadyOpen { .. })
        ));
        drop(lease);
        assert!(SignerLease::acquire(&account).is_ok());
    }
}
