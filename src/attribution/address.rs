//! Joins normalized shares with wallet addresses

use rusqlite::Connection;
use serde::Serialize;
use tracing::warn;

use super::normalizer::NormalizedShare;
use crate::db::users;
use crate::error::AttributionError;

/// Final allocation for one contributor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionShare {
    pub user_id: String,
    pub address: String,
    pub units: u64,
}

/// Why a contributor could not be paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingAddress,
    MalformedAddress,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingAddress => "missing_address",
            DropReason::MalformedAddress => "malformed_address",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedContributor {
    pub user_id: String,
    pub reason: DropReason,
}

/// Shares that could be paid out, and the users that could not
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddressJoin {
    pub shares: Vec<DistributionShare>,
    pub dropped: Vec<DroppedContributor>,
}

/// A 20-byte hex account address with a `0x` prefix
pub fn is_valid_address(address: &str) -> bool {
    let Some(digits) = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    else {
        return false;
    };
    digits.len() == 40 && hex::decode(digits).is_ok()
}

/// Attach a wallet address to every share.
///
/// Users without a usable address are dropped and logged. Their units are
/// not handed to anyone else and the remaining shares keep their order
/// and amounts.
pub fn attach_addresses(
    conn: &Connection,
    shares: Vec<NormalizedShare>,
) -> Result<AddressJoin, AttributionError> {
    let user_ids: Vec<String> = shares.iter().map(|s| s.user_id.clone()).collect();
    let addresses = users::get_addresses(conn, &user_ids)?;

    let mut join = AddressJoin::default();

    for share in shares {
        match addresses.get(&share.user_id).map(|a| a.trim()) {
            Some(address) if is_valid_address(address) => {
                join.shares.push(DistributionShare {
                    address: address.to_string(),
                    user_id: share.user_id,
                    units: share.units,
                });
            }
            Some(address) => {
                warn!(
                    user_id = %share.user_id,
                    address,
                    units = share.units,
                    "Contributor has a malformed wallet address, dropping from distribution"
                );
                join.dropped.push(DroppedContributor {
                    user_id: share.user_id,
                    reason: DropReason::MalformedAddress,
                });
            }
            None => {
                warn!(
                    user_id = %share.user_id,
                    units = share.units,
                    "Contributor has no wallet address, dropping from distribution"
                );
                join.dropped.push(DroppedContributor {
                    user_id: share.user_id,
                    reason: DropReason::MissingAddress,
                });
            }
        }
    }

    Ok(join)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;
    use crate::db::users::{upsert_user, CreateUserInput};

    const ADDR_A: &str = "0x1111111111111111111111111111111111111111";
    const ADDR_C: &str = "0xAbCdEf0123456789abcdef0123456789ABCDEF01";

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address(ADDR_A));
        assert!(is_valid_address(ADDR_C));
        assert!(is_valid_address("0X1111111111111111111111111111111111111111"));
        assert!(!is_valid_address("1111111111111111111111111111111111111111"));
        assert!(!is_valid_address("0x1234"));
        assert!(!is_valid_address("0xzz11111111111111111111111111111111111111"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_unresolved_users_dropped_without_redistribution() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        upsert_user(&conn, &CreateUserInput { id: "a".into(), address: Some(ADDR_A.into()) }).unwrap();
        upsert_user(&conn, &CreateUserInput { id: "b".into(), address: Some("not-a-wallet".into()) }).unwrap();
        upsert_user(&conn, &CreateUserInput { id: "c".into(), address: Some(format!(" {} ", ADDR_C)) }).unwrap();

        let shares = vec![
            NormalizedShare { user_id: "a".into(), units: 10 },
            NormalizedShare { user_id: "b".into(), units: 10 },
            NormalizedShare { user_id: "c".into(), units: 7 },
            NormalizedShare { user_id: "d".into(), units: 3 },
        ];

        let join = attach_addresses(&conn, shares).unwrap();
        assert_eq!(
            join.shares,
            vec![
                DistributionShare { user_id: "a".into(), address: ADDR_A.into(), units: 10 },
                DistributionShare { user_id: "c".into(), address: ADDR_C.into(), units: 7 },
            ]
        );
        assert_eq!(
            join.dropped,
            vec![
                DroppedContributor { user_id: "b".into(), reason: DropReason::MalformedAddress },
                DroppedContributor { user_id: "d".into(), reason: DropReason::MissingAddress },
            ]
        );
    }
}
