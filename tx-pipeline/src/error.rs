use snafu::Snafu;
use subxt::utils::AccountId32;

/// Hard errors raised while opening trackers or coordinating batches.
///
/// Outcomes of individual calls (reverted, invalid, dropped, timed out) are not errors; they
/// are reported as [`crate::submission::ConfirmationResult`] values.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The chain client could not be reached or the account query failed.
    #[snafu(display("Chain unavailable while querying nonce for {account}: {source}"))]
    ChainUnavailable {
        /// The account whose nonce was being fetched.
        account: AccountId32,
        /// The underlying error from the `subxt` library.
        source: subxt::Error,
    },

    /// A tracker is already open for this signer somewhere in the process.
    #[snafu(display("A submission tracker is already open for {account}"))]
    AlreadyOpen {
        /// The account that is already claimed.
        account: AccountId32,
    },

    /// A per-signer batch task panicked or was cancelled before it could report.
    #[snafu(display("Batch task for {account} did not complete: {source}"))]
    SignerTask {
        /// The account the task was running for.
        account: AccountId32,
        /// The join error reported by tokio.
        source: tokio::task::JoinError,
    },
}

/// Type alias for results that return a `Result<T, Error>`, simplifying error handling.
pub type Result<T, E = Error> = std::result::Result<T, E>;
