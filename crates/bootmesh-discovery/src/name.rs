//! Chain account names.
//!
//! Account names are up to 13 characters drawn from `.12345a-z` and pack
//! into a single `u64`: the first 12 characters take 5 bits each, the
//! optional 13th takes the low 4 bits. The packed value is the stable
//! identity a peer is addressed by in the graph arena.

use crate::error::NameError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alphabet in symbol order. Index is the 5-bit symbol value.
const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// Maximum encodable name length.
pub const MAX_NAME_LEN: usize = 13;

/// A chain account name, kept as the raw string it was published as.
///
/// Ordering is lexicographic on the raw string, which is what tie-breaks
/// use.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountName(String);

impl AccountName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of characters in the name.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    /// Pack the name into its 64-bit identity.
    pub fn to_id(&self) -> Result<u64, NameError> {
        if self.0.is_empty() {
            return Err(NameError::Empty);
        }

        let mut value = 0u64;
        for (position, ch) in self.0.chars().enumerate() {
            if position >= MAX_NAME_LEN {
                return Err(NameError::TooLong { name: self.0.clone() });
            }
            let invalid = || NameError::InvalidChar {
                name: self.0.clone(),
                ch,
                position,
            };
            let symbol = symbol_of(ch).ok_or_else(invalid)?;
            if position < 12 {
                value |= symbol << (64 - 5 * (position + 1));
            } else {
                // 13th character only has 4 bits left
                if symbol > 0x0f {
                    return Err(invalid());
                }
                value |= symbol;
            }
        }
        Ok(value)
    }

    /// Unpack a 64-bit identity back into its name. Trailing dots are dropped.
    pub fn from_id(id: u64) -> Self {
        let mut chars = [b'.'; MAX_NAME_LEN];
        let mut rest = id;
        for i in 0..MAX_NAME_LEN {
            let (mask, shift) = if i == 0 { (0x0f, 4) } else { (0x1f, 5) };
            chars[MAX_NAME_LEN - 1 - i] = CHARMAP[(rest & mask) as usize];
            rest >>= shift;
        }
        let name: String = chars.iter().map(|&b| b as char).collect();
        Self(name.trim_end_matches('.').to_string())
    }
}

fn symbol_of(ch: char) -> Option<u64> {
    match ch {
        '.' => Some(0),
        '1'..='5' => Some(ch as u64 - '1' as u64 + 1),
        'a'..='z' => Some(ch as u64 - 'a' as u64 + 6),
        _ => None,
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for AccountName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn system_account_id() {
        assert_eq!(AccountName::from("eosio").to_id().unwrap(), 6138663577826885632);
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(AccountName::from("").to_id(), Err(NameError::Empty));
        assert!(matches!(
            AccountName::from("Upper").to_id(),
            Err(NameError::InvalidChar { ch: 'U', position: 0, .. })
        ));
        assert!(matches!(
            AccountName::from("abc6").to_id(),
            Err(NameError::InvalidChar { ch: '6', position: 3, .. })
        ));
        assert!(matches!(
            AccountName::from("aaaaaaaaaaaaaa").to_id(),
            Err(NameError::TooLong { .. })
        ));
        // 13th character is limited to `.1-5a-j`
        assert!(AccountName::from("aaaaaaaaaaaaj").to_id().is_ok());
        assert!(AccountName::from("aaaaaaaaaaaak").to_id().is_err());
    }

    #[test]
    fn ordering_is_by_raw_string() {
        let mut names = vec![
            AccountName::from("zed"),
            AccountName::from("abc"),
            AccountName::from("ab"),
        ];
        names.sort();
        assert_eq!(names, vec!["ab".into(), "abc".into(), AccountName::from("zed")]);
    }

    proptest! {
        #[test]
        fn id_unpacks_to_same_name(name in "[a-z1-5]{1,12}") {
            let account = AccountName::from(name.as_str());
            let id = account.to_id().unwrap();
            prop_assert_eq!(AccountName::from_id(id), account);
        }

        #[test]
        fn distinct_names_get_distinct_ids(a in "[a-z1-5]{1,12}", b in "[a-z1-5]{1,12}") {
            prop_assume!(a != b);
            prop_assert_ne!(
                AccountName::from(a.as_str()).to_id().unwrap(),
                AccountName::from(b.as_str()).to_id().unwrap()
            );
        }
    }
}
