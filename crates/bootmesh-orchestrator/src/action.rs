//! Chain actions and their canonical encoding.
//!
//! The canonical form of an action is its bincode encoding. Booting and
//! verifying nodes both index actions by the blake3 digest of that form, so
//! two actions match exactly when every field matches byte for byte.

use crate::error::Result;
use bootmesh_discovery::AccountName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `actor@permission`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: AccountName,
    pub permission: String,
}

impl PermissionLevel {
    pub fn new(actor: &AccountName, permission: &str) -> Self {
        Self {
            actor: actor.clone(),
            permission: permission.to_string(),
        }
    }

    pub fn active(actor: &AccountName) -> Self {
        Self::new(actor, "active")
    }

    pub fn owner(actor: &AccountName) -> Self {
        Self::new(actor, "owner")
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.actor, self.permission)
    }
}

/// One contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Contract account
    pub account: AccountName,
    /// Action name
    pub name: String,
    pub authorization: Vec<PermissionLevel>,
    /// Encoded action payload
    pub data: Vec<u8>,
}

impl Action {
    /// Build an action, encoding `payload` canonically.
    pub fn new<T: Serialize>(
        account: &AccountName,
        name: &str,
        authorization: Vec<PermissionLevel>,
        payload: &T,
    ) -> Result<Self> {
        Ok(Self {
            account: account.clone(),
            name: name.to_string(),
            authorization,
            data: bincode::serialize(payload)?,
        })
    }

    /// Canonical byte encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn key(&self) -> Result<ActionKey> {
        Ok(ActionKey(*blake3::hash(&self.encode()?).as_bytes()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.account, self.name)
    }
}

/// Digest of an action's canonical encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionKey(pub [u8; 32]);

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
