//! Token-holder snapshot loaded into the target chain at boot.
//!
//! One holder per line: `eth_address,account,public_key,balance`.

use crate::error::{Error, Result};
use bootmesh_discovery::AccountName;

/// Characters of the Ethereum address quoted in the welcome memo.
const MEMO_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLine {
    pub eth_address: String,
    pub account: AccountName,
    pub public_key: String,
    /// Asset string, e.g. `10.0000 EOS`
    pub balance: String,
}

impl SnapshotLine {
    /// `Welcome <last 6 chars of the eth address>`
    pub fn welcome_memo(&self) -> String {
        let chars: Vec<char> = self.eth_address.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(MEMO_SUFFIX_LEN)..].iter().collect();
        format!("Welcome {}", tail)
    }
}

/// Parse a snapshot file. Blank lines are skipped.
pub fn parse(content: &[u8]) -> Result<Vec<SnapshotLine>> {
    let text = std::str::from_utf8(content).map_err(|e| Error::Snapshot {
        line: 0,
        reason: format!("not UTF-8: {}", e),
    })?;

    let mut lines = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
        let [eth, account, key, balance] = fields.as_slice() else {
            return Err(Error::Snapshot {
                line: i + 1,
                reason: format!("expected 4 fields, found {}", fields.len()),
            });
        };
        if eth.len() < MEMO_SUFFIX_LEN {
            return Err(Error::Snapshot {
                line: i + 1,
                reason: format!("ethereum address {:?} too short", eth),
            });
        }
        let account = AccountName::from(*account);
        account.to_id().map_err(|e| Error::Snapshot {
            line: i + 1,
            reason: e.to_string(),
        })?;
        if key.is_empty() || balance.is_empty() {
            return Err(Error::Snapshot {
                line: i + 1,
                reason: "empty public key or balance".into(),
            });
        }
        lines.push(SnapshotLine {
            eth_address: eth.to_string(),
            account,
            public_key: key.to_string(),
            balance: balance.to_string(),
        });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
0x00000000000000000000000000000000001234b1,holderaaaaaa,KEY1,10.0000 EOS
0xffffffffffffffffffffffffffffffffffabcdef,holderbbbbbb,KEY2,0.5000 EOS

";

    #[test]
    fn parses_lines() {
        let lines = parse(CSV.as_bytes()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].account.as_str(), "holderaaaaaa");
        assert_eq!(lines[1].balance, "0.5000 EOS");
        assert_eq!(lines[0].welcome_memo(), "Welcome 1234b1");
        assert_eq!(lines[1].welcome_memo(), "Welcome abcdef");
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = parse(b"0xabcdef12,holder,KEY\n").unwrap_err();
        assert!(matches!(err, Error::Snapshot { line: 1, .. }));
    }

    #[test]
    fn rejects_bad_account() {
        let err = parse(b"0xabcdef12,NotAName,KEY,1.0000 EOS\n").unwrap_err();
        assert!(matches!(err, Error::Snapshot { line: 1, .. }));
    }

    #[test]
    fn empty_file_has_no_lines() {
        assert!(parse(b"\n\n").unwrap().is_empty());
    }
}
