//! Boot sequence operations.
//!
//! A boot sequence is an ordered list of `{op, label, data}` entries. The
//! `op` tag selects one variant of [`Operation`] from a closed registry and
//! `data` is decoded into that variant's fields. Unknown tags and
//! malformed data fail at decode time, before anything runs.

mod build;

pub use build::{OpContext, SNAPSHOT_CONTENT};

use crate::error::{Error, Result};
use bootmesh_discovery::AccountName;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

/// Every tag the registry accepts.
pub const TAGS: &[&str] = &[
    "system.setcode",
    "system.newaccount",
    "system.setpriv",
    "token.create",
    "token.issue",
    "producers.create_accounts",
    "system.setprods",
    "snapshot.inject",
    "system.destroy_accounts",
];

/// Pubkey value meaning "the boot node's ephemeral key".
pub const EPHEMERAL: &str = "ephemeral";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SetCodeOp {
    pub account: AccountName,
    /// Prefix of the `<name>.wasm` and `<name>.abi` contents
    pub contract_name_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAccountOp {
    pub creator: AccountName,
    pub new_account: AccountName,
    /// Public key, or `ephemeral`
    pub pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SetPrivOp {
    pub account: AccountName,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateTokenOp {
    pub account: AccountName,
    /// Maximum supply, e.g. `10000000000.0000 EOS`
    pub amount: String,
    #[serde(default)]
    pub can_freeze: bool,
    #[serde(default)]
    pub can_recall: bool,
    #[serde(default)]
    pub can_whitelist: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueTokenOp {
    pub account: AccountName,
    pub amount: String,
    #[serde(default)]
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct InjectSnapshotOp {
    /// Keep only this many holders (0 keeps all). Test networks only.
    #[serde(rename = "TESTNET_TRUNCATE_SNAPSHOT", default)]
    pub testnet_truncate_snapshot: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DestroyAccountsOp {
    #[serde(default)]
    pub accounts: Vec<AccountName>,
    /// Leave the accounts usable. Test networks only.
    #[serde(rename = "TESTNET_KEEP_ACCOUNTS", default)]
    pub testnet_keep_accounts: bool,
}

/// One registry entry with its decoded data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    SetCode(SetCodeOp),
    NewAccount(NewAccountOp),
    SetPriv(SetPrivOp),
    CreateToken(CreateTokenOp),
    IssueToken(IssueTokenOp),
    CreateProducers,
    SetProds,
    InjectSnapshot(InjectSnapshotOp),
    DestroyAccounts(DestroyAccountsOp),
}

impl Operation {
    /// Registry tag of this operation.
    pub fn tag(&self) -> &'static str {
        match self {
            Operation::SetCode(_) => "system.setcode",
            Operation::NewAccount(_) => "system.newaccount",
            Operation::SetPriv(_) => "system.setpriv",
            Operation::CreateToken(_) => "token.create",
            Operation::IssueToken(_) => "token.issue",
            Operation::CreateProducers => "producers.create_accounts",
            Operation::SetProds => "system.setprods",
            Operation::InjectSnapshot(_) => "snapshot.inject",
            Operation::DestroyAccounts(_) => "system.destroy_accounts",
        }
    }

    /// Drop test-network-only options.
    pub fn reset_testnet_options(&mut self) {
        match self {
            Operation::InjectSnapshot(op) => op.testnet_truncate_snapshot = 0,
            Operation::DestroyAccounts(op) => op.testnet_keep_accounts = false,
            _ => {}
        }
    }

    /// Decode `data` for `tag`. `label` only feeds error messages.
    pub fn decode(tag: &str, label: &str, data: serde_yaml::Value) -> Result<Self> {
        fn fields<T: DeserializeOwned>(tag: &str, label: &str, data: serde_yaml::Value) -> Result<T> {
            let data = match data {
                serde_yaml::Value::Null => serde_yaml::Value::Mapping(Default::default()),
                other => other,
            };
            serde_yaml::from_value(data).map_err(|e| Error::OperationData {
                label: label.to_string(),
                op: tag.to_string(),
                reason: e.to_string(),
            })
        }

        Ok(match tag {
            "system.setcode" => Operation::SetCode(fields(tag, label, data)?),
            "system.newaccount" => Operation::NewAccount(fields(tag, label, data)?),
            "system.setpriv" => Operation::SetPriv(fields(tag, label, data)?),
            "token.create" => Operation::CreateToken(fields(tag, label, data)?),
            "token.issue" => Operation::IssueToken(fields(tag, label, data)?),
            "producers.create_accounts" => Operation::CreateProducers,
            "system.setprods" => Operation::SetProds,
            "snapshot.inject" => Operation::InjectSnapshot(fields(tag, label, data)?),
            "system.destroy_accounts" => Operation::DestroyAccounts(fields(tag, label, data)?),
            other => {
                return Err(Error::UnknownOperation {
                    tag: other.to_string(),
                    expected: TAGS.join(", "),
                })
            }
        })
    }
}

/// A labelled operation of the boot sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootStep {
    pub label: String,
    pub op: Operation,
}

#[derive(Deserialize)]
struct RawStep {
    op: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    data: serde_yaml::Value,
}

#[derive(Deserialize)]
struct RawSequence {
    boot_sequence: Vec<RawStep>,
}

/// The agreed, ordered list of operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BootSequence {
    pub steps: Vec<BootStep>,
}

impl BootSequence {
    /// Decode a `boot_sequence:` YAML document.
    pub fn from_yaml(input: &str) -> Result<Self> {
        let raw: RawSequence = serde_yaml::from_str(input)?;
        let steps = raw
            .boot_sequence
            .into_iter()
            .map(|step| {
                let op = Operation::decode(&step.op, &step.label, step.data)?;
                Ok(BootStep { label: step.label, op })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Config(format!("boot sequence is not UTF-8: {}", e)))?;
        Self::from_yaml(text)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply [`Operation::reset_testnet_options`] to every step.
    pub fn reset_testnet_options(&mut self) {
        for step in &mut self.steps {
            step.op.reset_testnet_options();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SEQUENCE: &str = r#"
boot_sequence:
  - op: system.setcode
    label: Setting eosio.bios code for account eosio
    data:
      account: eosio
      contract_name_ref: eosio.bios
  - op: system.newaccount
    label: Create account eosio.token
    data:
      creator: eosio
      new_account: eosio.token
      pubkey: ephemeral
  - op: token.create
    label: Creating the EOS currency symbol
    data:
      account: eosio
      amount: 10000000000.0000 EOS
  - op: producers.create_accounts
    label: Creating initial producer accounts
  - op: snapshot.inject
    label: Injecting snapshot
    data:
      TESTNET_TRUNCATE_SNAPSHOT: 10
  - op: system.setprods
    label: Setting initial producers
  - op: system.destroy_accounts
    label: Disabling authorization for system accounts
    data:
      accounts: [eosio, eosio.token]
      TESTNET_KEEP_ACCOUNTS: true
"#;

    #[test]
    fn decodes_every_step() {
        let seq = BootSequence::from_yaml(SEQUENCE).unwrap();
        let tags: Vec<_> = seq.steps.iter().map(|s| s.op.tag()).collect();
        assert_eq!(
            tags,
            vec![
                "system.setcode",
                "system.newaccount",
                "token.create",
                "producers.create_accounts",
                "snapshot.inject",
                "system.setprods",
                "system.destroy_accounts",
            ]
        );
        assert_eq!(seq.steps[3].label, "Creating initial producer accounts");
        match &seq.steps[2].op {
            Operation::CreateToken(op) => {
                assert_eq!(op.amount, "10000000000.0000 EOS");
                assert!(!op.can_freeze);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_tag_fails_at_decode() {
        let err = BootSequence::from_yaml("boot_sequence:\n  - op: system.explode\n").unwrap_err();
        match err {
            Error::UnknownOperation { tag, expected } => {
                assert_eq!(tag, "system.explode");
                assert!(expected.contains("system.setcode"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_data_names_the_step() {
        let err = BootSequence::from_yaml(
            "boot_sequence:\n  - op: system.setpriv\n    label: priv\n    data: {acount: eosio}\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::OperationData { label, op, .. } if label == "priv" && op == "system.setpriv"));
    }

    #[test]
    fn testnet_options_reset() {
        let mut seq = BootSequence::from_yaml(SEQUENCE).unwrap();
        seq.reset_testnet_options();
        for step in &seq.steps {
            match &step.op {
                Operation::InjectSnapshot(op) => assert_eq!(op.testnet_truncate_snapshot, 0),
                Operation::DestroyAccounts(op) => {
                    assert!(!op.testnet_keep_accounts);
                    assert_eq!(op.accounts.len(), 2);
                }
                _ => {}
            }
        }
    }
}
