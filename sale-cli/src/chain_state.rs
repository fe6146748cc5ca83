//! Storage reads the sale phases base their calls on.
//!
//! Map entries are keyed with concat hashers, so the last bytes of every storage key are the
//! SCALE-encoded key itself and ids are read from there.

use anyhow::{Context, Error};
use futures::StreamExt;
use log::debug;
use subxt::dynamic::{storage, Value};
use subxt::utils::AccountId32;
use tx_pipeline::SubxtClient;

use crate::incubation::FeedCounts;

/// The collection Origin of Shells are minted into, if the sale configured one.
pub(crate) async fn origin_of_shell_collection_id(
    client: &SubxtClient,
) -> Result<Option<u32>, Error> {
    let address = storage("PwNftSale", "OriginOfShellCollectionId", ());
    let stored = client
        .api()
        .storage()
        .at_latest()
        .await?
        .fetch(&address)
        .await
        .context("could not read the Origin of Shell collection id")?;

    stored
        .map(|thunk| thunk.as_type::<u32>())
        .transpose()
        .context("could not decode the Origin of Shell collection id")
}

/// The current Phala World era.
pub(crate) async fn era(client: &SubxtClient) -> Result<u64, Error> {
    let address = storage("PwNftSale", "Era", ());
    let era = client
        .api()
        .storage()
        .at_latest()
        .await?
        .fetch_or_default(&address)
        .await
        .context("could not read the current era")?;

    Ok(era.as_type::<u64>()?)
}

/// Ids of the NFTs `account` holds in `collection_id`.
pub(crate) async fn owned_nfts(
    client: &SubxtClient,
    account: &AccountId32,
    collection_id: u32,
) -> Result<Vec<u32>, Error> {
    let address = storage(
        "Uniques",
        "Account",
        vec![
            Value::from_bytes(account.0),
            Value::u128(u128::from(collection_id)),
        ],
    );
    let mut entries = client
        .api()
        .storage()
        .at_latest()
        .await?
        .iter(address)
        .await
        .with_context(|| format!("could not list the NFTs of {account}"))?;

    let mut nft_ids = Vec::new();
    while let Some(entry) = entries.next().await {
        let entry = entry?;
        let [nft_id] =
            trailing_ids::<1>(&entry.key_bytes).context("malformed Uniques.Account key")?;
        nft_ids.push(nft_id);
    }
    debug!("{} owns {:?} in collection {}", account, nft_ids, collection_id);
    Ok(nft_ids)
}

/// How often each `(collection, nft)` was fed during `era`.
pub(crate) async fn food_stats(client: &SubxtClient, era: u64) -> Result<FeedCounts, Error> {
    let address = storage(
        "PwIncubation",
        "OriginOfShellFoodStats",
        vec![Value::u128(u128::from(era))],
    );
    let mut entries = client
        .api()
        .storage()
        .at_latest()
        .await?
        .iter(address)
        .await
        .with_context(|| format!("could not list the food stats of era {era}"))?;

    let mut counts = FeedCounts::new();
    while let Some(entry) = entries.next().await {
        let entry = entry?;
        let [collection_id, nft_id] = trailing_ids::<2>(&entry.key_bytes)
            .context("malformed PwIncubation.OriginOfShellFoodStats key")?;
        counts.insert((collection_id, nft_id), entry.value.as_type::<u32>()?);
    }
    Ok(counts)
}

/// The last `N` little-endian `u32`s of a storage key.
fn trailing_ids<const N: usize>(key: &[u8]) -> Option<[u32; N]> {
    let start = key.len().checked_sub(4 * N)?;
    let mut ids = [0u32; N];
    for (id, chunk) in ids.iter_mut().zip(key[start..].chunks_exact(4)) {
        *id = u32::from_le_bytes(chunk.try_into().ok()?);
    }
    Some(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_read_from_the_end_of_the_key() {
        let mut key = vec![0xAA; 48];
        key.extend(1u32.to_le_bytes());
        key.extend(258u32.to_le_bytes());

        assert_eq!(trailing_ids::<1>(&key), Some([258]));
        assert_eq!(trailing_ids::<2>(&key), Some([1, 258]));
    }

    #[test]
    fn short_keys_yield_nothing() {
        assert_eq!(trailing_ids::<2>(&[1, 0, 0, 0]), None);
    }
}
