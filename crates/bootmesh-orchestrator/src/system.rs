//! Builders for the system and token contract actions the boot sequence
//! emits.

use crate::action::{Action, PermissionLevel};
use crate::error::Result;
use bootmesh_discovery::{AccountName, Authority};
use serde::{Deserialize, Serialize};

/// Account hosting the token contract.
pub const TOKEN_ACCOUNT: &str = "eosio.token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub creator: AccountName,
    pub name: AccountName,
    pub owner: Authority,
    pub active: Authority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCode {
    pub account: AccountName,
    pub vmtype: u8,
    pub vmversion: u8,
    pub code: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAbi {
    pub account: AccountName,
    pub abi: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPriv {
    pub account: AccountName,
    pub is_priv: u8,
}

/// One entry of a producer schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerKey {
    pub producer_name: AccountName,
    pub block_signing_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetProds {
    pub schedule: Vec<ProducerKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAuth {
    pub account: AccountName,
    pub permission: String,
    pub parent: String,
    pub auth: Authority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCreate {
    pub issuer: AccountName,
    pub maximum_supply: String,
    pub can_freeze: bool,
    pub can_recall: bool,
    pub can_whitelist: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIssue {
    pub to: AccountName,
    pub quantity: String,
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: AccountName,
    pub to: AccountName,
    pub quantity: String,
    pub memo: String,
}

/// Builds actions against a given system account.
#[derive(Debug, Clone)]
pub struct SystemActions {
    system: AccountName,
    token: AccountName,
}

impl SystemActions {
    pub fn new(system: &AccountName) -> Self {
        Self {
            system: system.clone(),
            token: AccountName::from(TOKEN_ACCOUNT),
        }
    }

    pub fn system_account(&self) -> &AccountName {
        &self.system
    }

    fn system_active(&self) -> Vec<PermissionLevel> {
        vec![PermissionLevel::active(&self.system)]
    }

    /// `newaccount` with the same single key for owner and active.
    pub fn new_account(&self, creator: &AccountName, name: &AccountName, key: &str) -> Result<Action> {
        self.new_account_with(creator, name, Authority::single_key(key), Authority::single_key(key))
    }

    pub fn new_account_with(
        &self,
        creator: &AccountName,
        name: &AccountName,
        owner: Authority,
        active: Authority,
    ) -> Result<Action> {
        Action::new(
            &self.system,
            "newaccount",
            vec![PermissionLevel::active(creator)],
            &NewAccount {
                creator: creator.clone(),
                name: name.clone(),
                owner,
                active,
            },
        )
    }

    pub fn set_code(&self, account: &AccountName, code: Vec<u8>) -> Result<Action> {
        Action::new(
            &self.system,
            "setcode",
            vec![PermissionLevel::active(account)],
            &SetCode {
                account: account.clone(),
                vmtype: 0,
                vmversion: 0,
                code,
            },
        )
    }

    pub fn set_abi(&self, account: &AccountName, abi: Vec<u8>) -> Result<Action> {
        Action::new(
            &self.system,
            "setabi",
            vec![PermissionLevel::active(account)],
            &SetAbi {
                account: account.clone(),
                abi,
            },
        )
    }

    pub fn set_priv(&self, account: &AccountName) -> Result<Action> {
        Action::new(
            &self.system,
            "setpriv",
            self.system_active(),
            &SetPriv {
                account: account.clone(),
                is_priv: 1,
            },
        )
    }

    pub fn set_prods(&self, schedule: Vec<ProducerKey>) -> Result<Action> {
        Action::new(&self.system, "setprods", self.system_active(), &SetProds { schedule })
    }

    /// Replace `permission` of `account`, signed by `account@owner`.
    pub fn update_auth(
        &self,
        account: &AccountName,
        permission: &str,
        parent: &str,
        auth: Authority,
    ) -> Result<Action> {
        Action::new(
            &self.system,
            "updateauth",
            vec![PermissionLevel::owner(account)],
            &UpdateAuth {
                account: account.clone(),
                permission: permission.to_string(),
                parent: parent.to_string(),
                auth,
            },
        )
    }

    pub fn token_create(
        &self,
        issuer: &AccountName,
        maximum_supply: &str,
        can_freeze: bool,
        can_recall: bool,
        can_whitelist: bool,
    ) -> Result<Action> {
        Action::new(
            &self.token,
            "create",
            vec![PermissionLevel::active(&self.token)],
            &TokenCreate {
                issuer: issuer.clone(),
                maximum_supply: maximum_supply.to_string(),
                can_freeze,
                can_recall,
                can_whitelist,
            },
        )
    }

    /// Issue signed by the system account, which holds the issuer role
    /// during boot.
    pub fn token_issue(&self, to: &AccountName, quantity: &str, memo: &str) -> Result<Action> {
        Action::new(
            &self.token,
            "issue",
            self.system_active(),
            &TokenIssue {
                to: to.clone(),
                quantity: quantity.to_string(),
                memo: memo.to_string(),
            },
        )
    }

    pub fn transfer(&self, from: &AccountName, to: &AccountName, quantity: &str, memo: &str) -> Result<Action> {
        Action::new(
            &self.token,
            "transfer",
            vec![PermissionLevel::active(from)],
            &Transfer {
                from: from.clone(),
                to: to.clone(),
                quantity: quantity.to_string(),
                memo: memo.to_string(),
            },
        )
    }
}
