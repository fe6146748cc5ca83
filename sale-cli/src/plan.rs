//! The sale plan: accounts, amounts, NFT choices and ids each phase works with.
//!
//! Every field has a default matching a local development chain, so the plan file only needs
//! the values that differ.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::accounts::AccountName;
use crate::calls::{Career, Race, RarityType};

/// Everything the phases need besides keys and the endpoint.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub(crate) struct SalePlan {
    /// Transfers made by the root account before the sale starts, in whole PHA.
    pub initial_funding: Vec<Funding>,
    /// Whether `init` opens the spirit claim window once the sale is configured.
    pub open_spirit_claims: bool,
    /// Collections created during `init`, in creation order.
    pub collections: Collections,
    /// Metadata URI shared by every spirit.
    pub spirit_metadata: String,
    /// Metadata URI per Origin of Shell race.
    pub origin_of_shells_metadata: Vec<(Race, String)>,
    /// PHA the overlord sends each claimant before spirits are claimed.
    pub spirit_claim_funding: u128,
    /// Accounts that claim a spirit.
    pub spirit_claimants: Vec<AccountName>,
    /// Rare Origin of Shell purchases.
    pub rare_purchases: Vec<RarePurchase>,
    /// Whitelisted prime Origin of Shell purchases.
    pub whitelist_purchases: Vec<ShellChoice>,
    /// Prime inventory released before preorders open.
    pub prime_inventory: RarityCounts,
    /// Preorders placed while preorders are open.
    pub preorders: Vec<ShellChoice>,
    /// Preorder ids minted after the preorder window.
    pub chosen_preorders: Vec<u32>,
    /// Preorder ids refunded after the preorder window.
    pub not_chosen_preorders: Vec<u32>,
    /// Preorders placed on the last day of the sale.
    pub last_day_preorders: Vec<ShellChoice>,
    /// Preorder ids minted after the last day.
    pub last_day_chosen_preorders: Vec<u32>,
    /// Preorder ids refunded after the last day.
    pub last_day_not_chosen_preorders: Vec<u32>,
    /// Incubation phase inputs.
    pub incubation: IncubationPlan,
}

/// A root transfer made during `init`.
#[derive(Debug, Deserialize)]
pub(crate) struct Funding {
    /// Recipient.
    pub account: AccountName,
    /// Whole PHA.
    pub amount: u128,
}

/// Collection names and the ids the chain assigns them.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub(crate) struct Collections {
    /// Spirit collection.
    pub spirit: CollectionPlan,
    /// Origin of Shell collection.
    pub origin_of_shell: CollectionPlan,
    /// Shell collection produced by incubation.
    pub shell: CollectionPlan,
}

/// One NFT collection.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CollectionPlan {
    /// Collection metadata.
    pub metadata: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Id the chain assigns on creation.
    pub id: u32,
}

/// A rare Origin of Shell purchase.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RarePurchase {
    /// Buyer.
    pub account: AccountName,
    /// Legendary or Magic.
    pub rarity: RarityType,
    /// Chosen race.
    pub race: Race,
    /// Chosen career.
    pub career: Career,
}

/// A race and career picked by an account.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ShellChoice {
    /// Buyer.
    pub account: AccountName,
    /// Chosen race.
    pub race: Race,
    /// Chosen career.
    pub career: Career,
}

/// Inventory released for one rarity.
#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct RarityCounts {
    /// Sellable count.
    pub for_sale: u32,
    /// Reserved for giveaways.
    pub giveaway: u32,
}

/// Inputs of the incubation phase.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub(crate) struct IncubationPlan {
    /// Collection to incubate. Read from the chain when absent.
    pub collection_id: Option<u32>,
    /// Accounts whose Origin of Shells are looked up on chain and incubated.
    pub incubators: Vec<AccountName>,
    /// Origin of Shells to incubate instead of the ones found on chain.
    pub owners: Vec<ShellOwner>,
    /// Feeding rounds, each submitted across all feeders at once.
    pub feeding_rounds: Vec<Vec<Feed>>,
    /// Hatch time reductions in seconds, handed out by feed count, most fed first.
    pub hatch_time_reductions: Vec<u64>,
}

/// Origin of Shells owned by an account.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ShellOwner {
    /// Owner.
    pub account: AccountName,
    /// Origin of Shell NFT ids.
    pub nft_ids: Vec<u32>,
}

/// One feeding of an Origin of Shell.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Feed {
    /// Feeder.
    pub account: AccountName,
    /// Origin of Shell NFT id.
    pub nft_id: u32,
}

impl SalePlan {
    /// Reads a JSON plan, filling absent fields with their defaults.
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("could not read sale plan {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid sale plan {}", path.display()))
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

fn choice(account: AccountName, race: Race, career: Career) -> ShellChoice {
    ShellChoice {
        account,
        race,
        career,
    }
}

fn feeds(round: [(AccountName, u32); 6]) -> Vec<Feed> {
    round
        .into_iter()
        .map(|(account, nft_id)| Feed { account, nft_id })
        .collect()
}

impl Default for SalePlan {
    fn default() -> Self {
        use AccountName::*;

        let metadata = |race: Race, uri: &str| (race, uri.to_string());

        Self {
            initial_funding: [Overlord, Bob, Charlie, David, Eve, Ferdie]
                .into_iter()
                .map(|account| Funding {
                    account,
                    amount: 20_000,
                })
                .collect(),
            open_spirit_claims: true,
            collections: Collections::default(),
            spirit_metadata: "ar://Q6N5cKjuLzihuiyVlpU-ANUM5ffKLwYYACKFN4mbNuw".to_string(),
            origin_of_shells_metadata: vec![
                metadata(Race::Cyborg, "ar://BS-NUyJWDKJ-CwTYLWZz6TpG0CbWVKUAXvdPQu-KimI"),
                metadata(Race::AISpectre, "ar://KR3ZIIcc_Q6_47sibLOJ5YoFwJZqT6C7aJkkUYbUWbU"),
                metadata(Race::Pandroid, "ar://BS-NUyJWDKJ-CwTYLWZz6TpG0CbWVKUAXvdPQu-KimI"),
                metadata(Race::XGene, "ar://IzOXT_pER7487_RBpzGNOKNBGnDouN1mOcPXojE_Das"),
            ],
            spirit_claim_funding: 11,
            spirit_claimants: vec![Alice, Bob, Charlie, David, Eve, Ferdie],
            rare_purchases: vec![
                RarePurchase {
                    account: Bob,
                    rarity: RarityType::Legendary,
                    race: Race::Cyborg,
                    career: Career::HackerWizard,
                },
                RarePurchase {
                    account: Charlie,
                    rarity: RarityType::Magic,
                    race: Race::Pandroid,
                    career: Career::RoboWarrior,
                },
                RarePurchase {
                    account: David,
                    rarity: RarityType::Magic,
                    race: Race::XGene,
                    career: Career::TradeNegotiator,
                },
            ],
            whitelist_purchases: vec![
                choice(Alice, Race::AISpectre, Career::HardwareDruid),
                choice(Ferdie, Race::Cyborg, Career::Web3Monk),
                choice(Eve, Race::XGene, Career::RoboWarrior),
            ],
            prime_inventory: RarityCounts {
                for_sale: 900,
                giveaway: 50,
            },
            preorders: vec![choice(Alice, Race::Cyborg, Career::HackerWizard)],
            chosen_preorders: (0..=5).collect(),
            not_chosen_preorders: (6..=10).collect(),
            last_day_preorders: vec![choice(Alice, Race::Cyborg, Career::HackerWizard)],
            last_day_chosen_preorders: (0..=5).collect(),
            last_day_not_chosen_preorders: (6..=10).collect(),
            incubation: IncubationPlan::default(),
        }
    }
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            spirit: CollectionPlan {
                metadata: "Phala World Spirits Collection".to_string(),
                symbol: "PWSPRT".to_string(),
                id: 0,
            },
            origin_of_shell: CollectionPlan {
                metadata: "Phala World Origin of Shells Collection".to_string(),
                symbol: "PWOAS".to_string(),
                id: 1,
            },
            shell: CollectionPlan {
                metadata: "Phala World Shells Collection".to_string(),
                symbol: "PWSHL".to_string(),
                id: 2,
            },
        }
    }
}

impl Default for IncubationPlan {
    fn default() -> Self {
        use AccountName::*;

        Self {
            collection_id: None,
            incubators: vec![Alice, Bob, Charlie, David, Eve, Ferdie],
            owners: Vec::new(),
            feeding_rounds: vec![
                feeds([
                    (Alice, 0),
                    (Bob, 0),
                    (Charlie, 1),
                    (David, 2),
                    (Eve, 3),
                    (Ferdie, 4),
                ]),
                feeds([
                    (Alice, 5),
                    (Bob, 1),
                    (Charlie, 3),
                    (David, 8),
                    (Eve, 2),
                    (Ferdie, 10),
                ]),
            ],
            hatch_time_reductions: vec![
                10_800, 7_200, 3_600, 2_400, 1_400, 1_400, 1_400, 1_400, 1_400, 1_400,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_plan_is_the_default_plan() {
        let plan = SalePlan::parse("{}").unwrap();
        assert_eq!(plan.initial_funding.len(), 6);
        assert_eq!(plan.spirit_claim_funding, 11);
        assert_eq!(plan.collections.origin_of_shell.id, 1);
        assert_eq!(plan.collections.shell.symbol, "PWSHL");
        assert_eq!(plan.prime_inventory.for_sale, 900);
        assert_eq!(plan.chosen_preorders, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(plan.not_chosen_preorders, vec![6, 7, 8, 9, 10]);
        assert_eq!(plan.incubation.feeding_rounds.len(), 2);
        assert_eq!(plan.incubation.hatch_time_reductions[0], 10_800);
        assert_eq!(plan.incubation.collection_id, None);
        assert!(plan.incubation.owners.is_empty());
        assert_eq!(plan.incubation.incubators.len(), 6);
    }

    #[test]
    fn partial_plan_overrides_only_given_fields() {
        let plan = SalePlan::parse(
            r#"{
                "spirit_claim_funding": 5,
                "spirit_claimants": ["eve"],
                "rare_purchases": [
                    {"account": "ferdie", "rarity": "Legendary", "race": "AISpectre", "career": "Web3Monk"}
                ],
                "incubation": {
                    "collection_id": 4,
                    "owners": [{"account": "bob", "nft_ids": [7, 9]}],
                    "hatch_time_reductions": [60]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(plan.spirit_claim_funding, 5);
        assert_eq!(plan.spirit_claimants, vec![AccountName::Eve]);
        assert_eq!(plan.rare_purchases.len(), 1);
        assert_eq!(plan.rare_purchases[0].race, Race::AISpectre);
        assert_eq!(plan.incubation.hatch_time_reductions, vec![60]);
        assert_eq!(plan.incubation.collection_id, Some(4));
        assert_eq!(plan.incubation.owners[0].nft_ids, vec![7, 9]);
        assert_eq!(plan.incubation.feeding_rounds.len(), 2);
        assert_eq!(plan.whitelist_purchases.len(), 3);
    }

    #[test]
    fn unknown_race_is_rejected() {
        let err = SalePlan::parse(
            r#"{"preorders": [{"account": "alice", "race": "Elf", "career": "Web3Monk"}]}"#,
        );
        assert!(err.is_err());
    }
}
