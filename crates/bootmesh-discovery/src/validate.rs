//! Field presence and format checks on discovery documents.

use crate::error::ValidationError;
use crate::record::{Authority, Discovery, NO_P2P_ADDRESS};

/// Maximum weight a peer link may carry.
pub const MAX_LINK_WEIGHT: u8 = 100;

/// Required length of a target-chain producer account name.
pub const TARGET_ACCOUNT_LEN: usize = 12;

impl Discovery {
    /// Check every field rule, stopping at the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.seed_network_account_name
            .to_id()
            .map_err(ValidationError::SeedAccount)?;

        for (index, link) in self.seed_network_peers.iter().enumerate() {
            if link.weight > MAX_LINK_WEIGHT {
                return Err(ValidationError::PeerWeight {
                    index,
                    account: link.account.to_string(),
                    weight: link.weight,
                });
            }
        }

        validate_target_account(self.target_account_name.as_str())?;
        validate_p2p_address(&self.target_p2p_address)?;
        validate_http_address(&self.target_http_address)?;
        validate_authority("owner", &self.target_initial_authority.owner)?;
        validate_authority("active", &self.target_initial_authority.active)?;

        Ok(())
    }
}

fn validate_target_account(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::TargetAccountMissing);
    }
    if name.chars().count() != TARGET_ACCOUNT_LEN {
        return Err(ValidationError::TargetAccountLength(name.to_string()));
    }
    if name.contains('.') {
        return Err(ValidationError::TargetAccountDot(name.to_string()));
    }
    Ok(())
}

fn validate_p2p_address(addr: &str) -> Result<(), ValidationError> {
    if addr == NO_P2P_ADDRESS {
        return Ok(());
    }
    if addr.contains("://") {
        return Err(ValidationError::P2pScheme(addr.to_string()));
    }
    if !addr.contains(':') {
        return Err(ValidationError::P2pMissingPort(addr.to_string()));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-');
    if !addr.chars().all(allowed) {
        return Err(ValidationError::P2pInvalidChars(addr.to_string()));
    }
    Ok(())
}

fn validate_http_address(addr: &str) -> Result<(), ValidationError> {
    if !addr.contains("://") {
        return Err(ValidationError::HttpScheme(addr.to_string()));
    }
    if addr.contains(' ') {
        return Err(ValidationError::HttpSpaces(addr.to_string()));
    }
    Ok(())
}

fn validate_authority(permission: &'static str, authority: &Authority) -> Result<(), ValidationError> {
    if authority.keys.is_empty() {
        return Err(ValidationError::AuthorityNoKeys { permission });
    }
    if let Some(index) = authority.keys.iter().position(|k| k.weight == 0) {
        return Err(ValidationError::AuthorityZeroWeight { permission, index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{InitialAuthority, PeerLink};

    fn valid() -> Discovery {
        Discovery {
            seed_network_account_name: "eosmama".into(),
            seed_network_peers: vec![PeerLink {
                account: "eoscanada".into(),
                weight: 100,
                comment: String::new(),
            }],
            target_account_name: "eosmamaaaaaa".into(),
            target_p2p_address: "p2p-1.mama.example:9876".into(),
            target_http_address: "http://mama.example:8888".into(),
            target_initial_authority: InitialAuthority {
                owner: Authority::single_key("EOS_OWNER"),
                active: Authority::single_key("EOS_ACTIVE"),
            },
            ..Default::default()
        }
    }

    #[test]
    fn valid_document_passes() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn none_p2p_address_passes() {
        let mut d = valid();
        d.target_p2p_address = "none".into();
        assert_eq!(d.validate(), Ok(()));
    }

    #[test]
    fn peer_weight_over_100() {
        let mut d = valid();
        d.seed_network_peers[0].weight = 101;
        assert!(matches!(
            d.validate(),
            Err(ValidationError::PeerWeight { index: 0, weight: 101, .. })
        ));
    }

    #[test]
    fn seed_account_must_encode() {
        let mut d = valid();
        d.seed_network_account_name = "Bad_Name".into();
        assert!(matches!(d.validate(), Err(ValidationError::SeedAccount(_))));
    }

    #[test]
    fn target_account_rules() {
        let mut d = valid();
        d.target_account_name = "".into();
        assert_eq!(d.validate(), Err(ValidationError::TargetAccountMissing));

        d.target_account_name = "short".into();
        assert!(matches!(d.validate(), Err(ValidationError::TargetAccountLength(_))));

        d.target_account_name = "eosmama.aaaa".into();
        assert!(matches!(d.validate(), Err(ValidationError::TargetAccountDot(_))));
    }

    #[test]
    fn p2p_address_rules() {
        let cases = [
            ("tcp://host:9876", "scheme"),
            ("host", "port"),
            ("host name:9876", "chars"),
            ("host_name:9876", "chars"),
        ];
        for (addr, rule) in cases {
            let mut d = valid();
            d.target_p2p_address = addr.into();
            let err = d.validate().unwrap_err();
            let ok = match rule {
                "scheme" => matches!(err, ValidationError::P2pScheme(_)),
                "port" => matches!(err, ValidationError::P2pMissingPort(_)),
                _ => matches!(err, ValidationError::P2pInvalidChars(_)),
            };
            assert!(ok, "{} should fail the {} rule, got {}", addr, rule, err);
        }
    }

    #[test]
    fn http_address_rules() {
        let mut d = valid();
        d.target_http_address = "mama.example:8888".into();
        assert!(matches!(d.validate(), Err(ValidationError::HttpScheme(_))));

        d.target_http_address = "http://mama example".into();
        assert!(matches!(d.validate(), Err(ValidationError::HttpSpaces(_))));
    }

    #[test]
    fn authority_rules() {
        let mut d = valid();
        d.target_initial_authority.active.keys.clear();
        assert_eq!(
            d.validate(),
            Err(ValidationError::AuthorityNoKeys { permission: "active" })
        );

        let mut d = valid();
        d.target_initial_authority.owner.keys[0].weight = 0;
        assert_eq!(
            d.validate(),
            Err(ValidationError::AuthorityZeroWeight { permission: "owner", index: 0 })
        );
    }
}
