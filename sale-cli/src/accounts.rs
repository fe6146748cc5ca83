//! Sale accounts and the keys behind them.

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{bail, Context};
use clap::Args;
use serde::Deserialize;
use subxt::utils::AccountId32;
use subxt_signer::sr25519::Keypair;
use subxt_signer::SecretUri;
use tx_pipeline::{sr25519_signer, Signer};

/// Accounts a sale plan can refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AccountName {
    /// Root (sudo) account.
    Alice,
    /// Regular user account.
    Bob,
    #[allow(missing_docs)]
    Charlie,
    #[allow(missing_docs)]
    David,
    #[allow(missing_docs)]
    Eve,
    #[allow(missing_docs)]
    Ferdie,
    /// Sale administrator.
    Overlord,
}

impl AccountName {
    /// Every account, in declaration order.
    pub(crate) const ALL: [AccountName; 7] = [
        AccountName::Alice,
        AccountName::Bob,
        AccountName::Charlie,
        AccountName::David,
        AccountName::Eve,
        AccountName::Ferdie,
        AccountName::Overlord,
    ];
}

/// Development overlord, used when neither overlord variable is set.
const DEFAULT_OVERLORD_URI: &str =
    "merge almost index garbage agent bracket layer skirt boss fly credit deal";

/// Secret URIs of the sale accounts.
#[derive(Args)]
pub(crate) struct KeyArgs {
    /// Root account, also the plan's `alice`
    #[arg(long, env = "ROOT_PRIVKEY", default_value = "//Alice", hide_env_values = true)]
    root_privkey: String,

    /// User account, the plan's `bob`
    #[arg(long, env = "USER_PRIVKEY", default_value = "//Bob", hide_env_values = true)]
    user_privkey: String,

    /// Sale administrator; defaults to the development overlord mnemonic
    #[arg(long, env = "OVERLORD_PRIVKEY", hide_env_values = true)]
    overlord_privkey: Option<String>,

    /// Older name of `OVERLORD_PRIVKEY`, used when that one is unset
    #[arg(long, env = "OVERLOAD_PRIVKEY", hide = true, hide_env_values = true)]
    overload_privkey: Option<String>,

    /// Plan account `charlie`
    #[arg(long, env = "CHARLIE_PRIVKEY", default_value = "//Charlie", hide_env_values = true)]
    charlie_privkey: String,

    /// Plan account `david`
    #[arg(long, env = "DAVID_PRIVKEY", default_value = "//Dave", hide_env_values = true)]
    david_privkey: String,

    /// Plan account `eve`
    #[arg(long, env = "EVE_PRIVKEY", default_value = "//Eve", hide_env_values = true)]
    eve_privkey: String,

    /// Plan account `ferdie`
    #[arg(long, env = "FERDIE_PRIVKEY", default_value = "//Ferdie", hide_env_values = true)]
    ferdie_privkey: String,
}

/// Signers for every [`AccountName`].
pub(crate) struct Accounts {
    alice: Signer<Keypair>,
    bob: Signer<Keypair>,
    charlie: Signer<Keypair>,
    david: Signer<Keypair>,
    eve: Signer<Keypair>,
    ferdie: Signer<Keypair>,
    overlord: Signer<Keypair>,
}

fn load_signer(name: &str, uri: &str) -> anyhow::Result<Signer<Keypair>> {
    let uri = SecretUri::from_str(uri).with_context(|| format!("invalid secret URI for {name}"))?;
    let keypair =
        Keypair::from_uri(&uri).with_context(|| format!("could not derive the {name} key"))?;
    Ok(sr25519_signer(keypair))
}

impl KeyArgs {
    /// Derives every signer from its secret URI.
    ///
    /// Fails if two names resolve to the same account, since each account's nonces can only be
    /// tracked once.
    pub(crate) fn load(&self) -> anyhow::Result<Accounts> {
        let overlord = self
            .overlord_privkey
            .as_deref()
            .or(self.overload_privkey.as_deref())
            .unwrap_or(DEFAULT_OVERLORD_URI);

        let accounts = Accounts {
            alice: load_signer("root", &self.root_privkey)?,
            bob: load_signer("user", &self.user_privkey)?,
            charlie: load_signer("charlie", &self.charlie_privkey)?,
            david: load_signer("david", &self.david_privkey)?,
            eve: load_signer("eve", &self.eve_privkey)?,
            ferdie: load_signer("ferdie", &self.ferdie_privkey)?,
            overlord: load_signer("overlord", overlord)?,
        };
        accounts.ensure_distinct()?;
        Ok(accounts)
    }
}

impl Accounts {
    /// The signer behind `name`.
    pub(crate) fn get(&self, name: AccountName) -> &Signer<Keypair> {
        match name {
            AccountName::Alice => &self.alice,
            AccountName::Bob => &self.bob,
            AccountName::Charlie => &self.charlie,
            AccountName::David => &self.david,
            AccountName::Eve => &self.eve,
            AccountName::Ferdie => &self.ferdie,
            AccountName::Overlord => &self.overlord,
        }
    }

    /// Sudo account.
    pub(crate) fn root(&self) -> &Signer<Keypair> {
        &self.alice
    }

    /// Sale administrator.
    pub(crate) fn overlord(&self) -> &Signer<Keypair> {
        &self.overlord
    }

    fn ensure_distinct(&self) -> anyhow::Result<()> {
        let mut seen: BTreeMap<&AccountId32, AccountName> = BTreeMap::new();
        for name in AccountName::ALL {
            let account = self.get(name).account();
            if let Some(first) = seen.insert(account, name) {
                bail!("{first:?} and {name:?} resolve to the same account {account}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use subxt_signer::sr25519::dev;

    use super::*;

    fn dev_keys() -> KeyArgs {
        KeyArgs {
            root_privkey: "//Alice".to_string(),
            user_privkey: "//Bob".to_string(),
            overlord_privkey: None,
            overload_privkey: None,
            charlie_privkey: "//Charlie".to_string(),
            david_privkey: "//Dave".to_string(),
            eve_privkey: "//Eve".to_string(),
            ferdie_privkey: "//Ferdie".to_string(),
        }
    }

    #[test]
    fn dev_keys_load_distinct_accounts() {
        let accounts = dev_keys().load().unwrap();
        assert_eq!(
            accounts.get(AccountName::Eve).account(),
            &AccountId32(dev::eve().public_key().0)
        );
        assert_eq!(
            accounts.overlord().account(),
            load_signer("overlord", DEFAULT_OVERLORD_URI).unwrap().account()
        );
    }

    #[test]
    fn two_names_for_one_key_are_refused() {
        let keys = KeyArgs {
            ferdie_privkey: "//Bob".to_string(),
            ..dev_keys()
        };
        let err = match keys.load() {
            Ok(_) => panic!("loaded two names for one account"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("Bob and Ferdie"));
    }

    #[test]
    fn overlord_key_falls_back_to_the_older_variable_name() {
        let keys = KeyArgs {
            overload_privkey: Some("//Overlord".to_string()),
            ..dev_keys()
        };
        let expected = load_signer("overlord", "//Overlord").unwrap();
        assert_eq!(keys.load().unwrap().overlord().account(), expected.account());

        let keys = KeyArgs {
            overlord_privkey: Some("//Admin".to_string()),
            overload_privkey: Some("//Overlord".to_string()),
            ..dev_keys()
        };
        let expected = load_signer("overlord", "//Admin").unwrap();
        assert_eq!(keys.load().unwrap().overlord().account(), expected.account());
    }

    #[test]
    fn dev_uris_resolve_to_the_dev_keyring() {
        let signer = load_signer("root", "//Alice").unwrap();
        assert_eq!(
            signer.account(),
            &AccountId32(dev::alice().public_key().0)
        );
    }

    #[test]
    fn bad_uri_names_the_account() {
        let err = match load_signer("overlord", "not a uri//") {
            Ok(_) => panic!("loaded a signer from a bad uri"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("overlord"));
    }
}
