//! Builders for the sale's runtime calls.
//!
//! Calls are built dynamically and checked against the node's metadata when they are signed,
//! so a mismatch surfaces as an `Invalid` outcome rather than a compile error.

use codec::Encode;
use serde::Deserialize;
use subxt::dynamic::{tx, Value};
use subxt::tx::DynamicPayload;
use subxt::utils::AccountId32;
use subxt_signer::sr25519::Keypair;

/// Smallest PHA units per token.
pub(crate) const UNIT: u128 = 1_000_000_000_000;

/// Converts whole PHA into balance units.
pub(crate) fn token(amount: u128) -> u128 {
    amount * UNIT
}

/// Declares a unit-variant enum that maps onto a runtime enum of the same variant names.
macro_rules! runtime_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
        pub(crate) enum $name {
            $(
                #[allow(missing_docs)]
                $variant,
            )+
        }

        impl $name {
            /// The runtime variant name.
            pub(crate) fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }

            fn value(&self) -> Value {
                Value::unnamed_variant(self.as_str(), [])
            }
        }
    };
}

runtime_enum!(
    /// Race of an Origin of Shell.
    Race { Cyborg, AISpectre, XGene, Pandroid }
);

runtime_enum!(
    /// Career of an Origin of Shell.
    Career { HardwareDruid, RoboWarrior, TradeNegotiator, HackerWizard, Web3Monk }
);

runtime_enum!(
    /// Rarity tier of an Origin of Shell.
    RarityType { Prime, Magic, Legendary }
);

runtime_enum!(
    /// Sale phase switches controlled by the overlord.
    StatusType {
        ClaimSpirits,
        PurchaseRareOriginOfShells,
        PurchasePrimeOriginOfShells,
        PreorderOriginOfShells,
        LastDayOfSale,
    }
);

fn account(id: &AccountId32) -> Value {
    Value::from_bytes(id.0)
}

fn u32_list(ids: &[u32]) -> Value {
    Value::unnamed_composite(ids.iter().map(|id| Value::u128(u128::from(*id))))
}

/// `Balances.transfer` to `dest`.
pub(crate) fn transfer(dest: &AccountId32, amount: u128) -> DynamicPayload {
    tx(
        "Balances",
        "transfer",
        vec![
            Value::unnamed_variant("Id", [account(dest)]),
            Value::u128(amount),
        ],
    )
}

/// Wraps `call` in `Sudo.sudo`.
pub(crate) fn sudo(call: DynamicPayload) -> DynamicPayload {
    tx("Sudo", "sudo", vec![call.into_value()])
}

/// Installs `overlord` as the sale administrator. Needs sudo.
pub(crate) fn set_overlord(overlord: &AccountId32) -> DynamicPayload {
    tx("PwNftSale", "set_overlord", vec![account(overlord)])
}

/// Starts the Phala World era clock.
pub(crate) fn initialize_world_clock() -> DynamicPayload {
    tx("PwNftSale", "initialize_world_clock", Vec::<Value>::new())
}

/// Creates an unbounded NFT collection.
pub(crate) fn create_collection(metadata: &str, symbol: &str) -> DynamicPayload {
    tx(
        "PwNftSale",
        "pw_create_collection",
        vec![
            Value::from_bytes(metadata.as_bytes()),
            Value::unnamed_variant("None", []),
            Value::from_bytes(symbol.as_bytes()),
        ],
    )
}

pub(crate) fn set_spirit_collection_id(id: u32) -> DynamicPayload {
    tx(
        "PwNftSale",
        "set_spirit_collection_id",
        vec![Value::u128(u128::from(id))],
    )
}

pub(crate) fn set_origin_of_shell_collection_id(id: u32) -> DynamicPayload {
    tx(
        "PwNftSale",
        "set_origin_of_shell_collection_id",
        vec![Value::u128(u128::from(id))],
    )
}

/// Points incubation at the collection hatched shells are minted into.
pub(crate) fn set_shell_collection_id(id: u32) -> DynamicPayload {
    tx(
        "PwIncubation",
        "set_shell_collection_id",
        vec![Value::u128(u128::from(id))],
    )
}

/// Sets the inventory used until preorders open.
pub(crate) fn init_rarity_type_counts() -> DynamicPayload {
    tx("PwNftSale", "init_rarity_type_counts", Vec::<Value>::new())
}

/// Flips one of the sale phase switches.
pub(crate) fn set_status_type(enabled: bool, status: StatusType) -> DynamicPayload {
    tx(
        "PwNftSale",
        "set_status_type",
        vec![Value::bool(enabled), status.value()],
    )
}

pub(crate) fn set_spirits_metadata(uri: &str) -> DynamicPayload {
    tx(
        "PwNftSale",
        "set_spirits_metadata",
        vec![Value::from_bytes(uri.as_bytes())],
    )
}

/// Metadata URI per race.
pub(crate) fn set_origin_of_shells_metadata(metadata: &[(Race, String)]) -> DynamicPayload {
    let pairs = metadata.iter().map(|(race, uri)| {
        Value::unnamed_composite([race.value(), Value::from_bytes(uri.as_bytes())])
    });
    tx(
        "PwNftSale",
        "set_origin_of_shells_metadata",
        vec![Value::unnamed_composite(pairs)],
    )
}

pub(crate) fn claim_spirit() -> DynamicPayload {
    tx("PwNftSale", "claim_spirit", Vec::<Value>::new())
}

pub(crate) fn buy_rare_origin_of_shell(
    rarity: RarityType,
    race: Race,
    career: Career,
) -> DynamicPayload {
    tx(
        "PwNftSale",
        "buy_rare_origin_of_shell",
        vec![rarity.value(), race.value(), career.value()],
    )
}

/// Buys a prime Origin of Shell with an overlord whitelist ticket.
pub(crate) fn buy_prime_origin_of_shell(
    ticket: [u8; 64],
    race: Race,
    career: Career,
) -> DynamicPayload {
    tx(
        "PwNftSale",
        "buy_prime_origin_of_shell",
        vec![Value::from_bytes(ticket), race.value(), career.value()],
    )
}

pub(crate) fn preorder_origin_of_shell(race: Race, career: Career) -> DynamicPayload {
    tx(
        "PwNftSale",
        "preorder_origin_of_shell",
        vec![race.value(), career.value()],
    )
}

/// Replaces the sellable and giveaway counts of a rarity.
pub(crate) fn update_rarity_type_counts(
    rarity: RarityType,
    for_sale: u32,
    giveaway: u32,
) -> DynamicPayload {
    tx(
        "PwNftSale",
        "update_rarity_type_counts",
        vec![
            rarity.value(),
            Value::u128(u128::from(for_sale)),
            Value::u128(u128::from(giveaway)),
        ],
    )
}

pub(crate) fn mint_chosen_preorders(ids: &[u32]) -> DynamicPayload {
    tx("PwNftSale", "mint_chosen_preorders", vec![u32_list(ids)])
}

pub(crate) fn refund_not_chosen_preorders(ids: &[u32]) -> DynamicPayload {
    tx("PwNftSale", "refund_not_chosen_preorders", vec![u32_list(ids)])
}

pub(crate) fn set_can_start_incubation_status(enabled: bool) -> DynamicPayload {
    tx(
        "PwIncubation",
        "set_can_start_incubation_status",
        vec![Value::bool(enabled)],
    )
}

pub(crate) fn start_incubation(collection_id: u32, nft_id: u32) -> DynamicPayload {
    tx(
        "PwIncubation",
        "start_incubation",
        vec![
            Value::u128(u128::from(collection_id)),
            Value::u128(u128::from(nft_id)),
        ],
    )
}

/// Feeds an Origin of Shell, once per account per era.
pub(crate) fn feed_origin_of_shell(collection_id: u32, nft_id: u32) -> DynamicPayload {
    tx(
        "PwIncubation",
        "feed_origin_of_shell",
        vec![
            Value::u128(u128::from(collection_id)),
            Value::u128(u128::from(nft_id)),
        ],
    )
}

/// `PwIncubation.update_incubation_time` with `((collection, nft), seconds)` reductions.
pub(crate) fn update_incubation_time(reductions: &[((u32, u32), u64)]) -> DynamicPayload {
    let entries = reductions.iter().map(|((collection_id, nft_id), seconds)| {
        Value::unnamed_composite([
            Value::unnamed_composite([
                Value::u128(u128::from(*collection_id)),
                Value::u128(u128::from(*nft_id)),
            ]),
            Value::u128(u128::from(*seconds)),
        ])
    });
    tx(
        "PwIncubation",
        "update_incubation_time",
        vec![Value::unnamed_composite(entries)],
    )
}

/// What an overlord-signed ticket authorizes.
#[derive(Encode)]
enum Purpose {
    #[allow(dead_code)]
    RedeemSpirit,
    BuyPrimeOriginOfShells,
}

/// Message the overlord signs to whitelist an account.
#[derive(Encode)]
struct OverlordMessage {
    account: AccountId32,
    purpose: Purpose,
}

/// SCALE-encoded whitelist message for `account`.
pub(crate) fn whitelist_message(account: &AccountId32) -> Vec<u8> {
    OverlordMessage {
        account: account.clone(),
        purpose: Purpose::BuyPrimeOriginOfShells,
    }
    .encode()
}

/// Overlord signature whitelisting `account` for a prime Origin of Shell purchase.
pub(crate) fn whitelist_ticket(overlord: &Keypair, account: &AccountId32) -> [u8; 64] {
    overlord.sign(&whitelist_message(account)).0
}
