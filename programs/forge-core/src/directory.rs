use anchor_lang::prelude::*;

use crate::state::ForgeError;

pub const YIELD_CONTRACT_RECORD_SEED: &[u8] = b"yield_contract_record";
pub const MARKET_RECORD_SEED: &[u8] = b"market_record";

/// Identifier of a forge adapter, e.g. `b"CompoundV2"` zero-padded.
pub type ForgeId = [u8; 32];

/// Registry entry for one yield contract, one account per
/// (forge, underlying, expiry). `index` is its position in creation order.
#[account]
#[derive(Debug, PartialEq, Eq)]
pub struct YieldContractRecord {
    pub index: u64,
    pub forge_id: ForgeId,
    pub underlying_mint: Pubkey,
    pub expiry: i64,
    pub yield_contract: Pubkey,
    pub created_at: i64,
    pub bump: u8,
}

impl YieldContractRecord {
    pub const SIZE: usize = 8 + // discriminator
        8 +  // index
        32 + // forge_id
        32 + // underlying_mint
        8 +  // expiry
        32 + // yield_contract
        8 +  // created_at
        1;   // bump

    pub fn address(forge_id: &ForgeId, underlying_mint: &Pubkey, expiry: i64) -> Pubkey {
        Pubkey::find_program_address(
            &[
                YIELD_CONTRACT_RECORD_SEED,
                forge_id.as_ref(),
                underlying_mint.as_ref(),
                &expiry.to_le_bytes(),
            ],
            &crate::ID,
        )
        .0
    }
}

/// Registry entry for one market, keyed by the market address.
#[account]
#[derive(Debug, PartialEq, Eq)]
pub struct MarketRecord {
    pub index: u64,
    pub forge_id: ForgeId,
    pub market_factory_id: ForgeId,
    pub yield_contract: Pubkey,
    pub base_mint: Pubkey,
    pub market: Pubkey,
    pub created_at: i64,
    pub bump: u8,
}

impl MarketRecord {
    pub const SIZE: usize = 8 + // discriminator
        8 +  // index
        32 + // forge_id
        32 + // market_factory_id
        32 + // yield_contract
        32 + // base_mint
        32 + // market
        8 +  // created_at
        1;   // bump

    pub fn address(market: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[MARKET_RECORD_SEED, market.as_ref()], &crate::ID).0
    }
}

/// Checks that `indices` is the contiguous run `start, start + 1, ..` and
/// lies inside the `count` records created so far.
pub fn check_page(indices: &[u64], start: u64, count: u64) -> Result<()> {
    let end = start
        .checked_add(indices.len() as u64)
        .ok_or(ForgeError::MathOverflow)?;
    require!(end <= count, ForgeError::InvalidBoundary);
    for (offset, index) in indices.iter().enumerate() {
        require!(*index == start + offset as u64, ForgeError::InvalidBoundary);
    }
    Ok(())
}

/// Number of records created at or after `since`.
///
/// Creation times never decrease with the index, so the answer is fixed by
/// the first record at or after `since` and the record just before it.
/// Both are passed as `(index, created_at)`; whichever side does not exist
/// is `None`.
pub fn count_created_since(
    count: u64,
    since: i64,
    first_since: Option<(u64, i64)>,
    last_before: Option<(u64, i64)>,
) -> Result<u64> {
    if count == 0 {
        return Ok(0);
    }
    let before_ok = |boundary: u64| {
        matches!(last_before, Some((index, created_at)) if index.checked_add(1) == Some(boundary) && created_at < since)
    };

    match first_since {
        Some((index, created_at)) => {
            require!(index < count && created_at >= since, ForgeError::InvalidBoundary);
            require!(index == 0 || before_ok(index), ForgeError::InvalidBoundary);
            Ok(count - index)
        }
        None => {
            require!(before_ok(count), ForgeError::InvalidBoundary);
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forge_id(name: &[u8]) -> ForgeId {
        let mut id = [0u8; 32];
        id[..name.len()].copy_from_slice(name);
        id
    }

    #[test]
    fn records_are_keyed_by_identity() {
        let compound = forge_id(b"CompoundV2");
        let underlying = Pubkey::new_unique();

        let first = YieldContractRecord::address(&compound, &underlying, 100);
        assert_eq!(first, YieldContractRecord::address(&compound, &underlying, 100));
        assert_ne!(first, YieldContractRecord::address(&compound, &underlying, 200));
        assert_ne!(
            first,
            YieldContractRecord::address(&forge_id(b"Aave"), &underlying, 100)
        );

        let market = Pubkey::new_unique();
        assert_eq!(MarketRecord::address(&market), MarketRecord::address(&market));
        assert_ne!(
            MarketRecord::address(&market),
            MarketRecord::address(&Pubkey::new_unique())
        );
    }

    #[test]
    fn registry_has_no_fixed_capacity() {
        // creation times of 1000 records, two per second
        let created: Vec<i64> = (0..1_000).map(|i| 10_000 + i / 2).collect();
        let count = created.len() as u64;

        let since = 10_250;
        let first = created.iter().position(|t| *t >= since).unwrap() as u64;
        let answer = count_created_since(
            count,
            since,
            Some((first, created[first as usize])),
            Some((first - 1, created[first as usize - 1])),
        )
        .unwrap();
        assert_eq!(answer, created.iter().filter(|t| **t >= since).count() as u64);
        assert_eq!(answer, 500);

        let indices: Vec<u64> = (900..1_000).collect();
        check_page(&indices, 900, count).unwrap();
    }

    #[test]
    fn count_created_since_edges() {
        assert_eq!(count_created_since(0, 50, None, None).unwrap(), 0);
        // everything is newer
        assert_eq!(count_created_since(3, 5, Some((0, 10)), None).unwrap(), 3);
        // nothing is newer
        assert_eq!(count_created_since(3, 50, None, Some((2, 30))).unwrap(), 0);
        assert_eq!(
            count_created_since(3, 20, Some((1, 20)), Some((0, 10))).unwrap(),
            2
        );
    }

    #[test]
    fn boundaries_must_bracket_since() {
        let invalid: anchor_lang::error::Error = ForgeError::InvalidBoundary.into();
        // record before the boundary is itself newer than `since`
        assert_eq!(
            count_created_since(3, 20, Some((2, 30)), Some((1, 20))).unwrap_err(),
            invalid
        );
        // gap between the two records
        assert_eq!(
            count_created_since(3, 20, Some((2, 30)), Some((0, 10))).unwrap_err(),
            invalid
        );
        // first record is older than `since`
        assert_eq!(
            count_created_since(3, 20, Some((1, 15)), Some((0, 10))).unwrap_err(),
            invalid
        );
        // claims nothing is newer without the last record
        assert_eq!(
            count_created_since(3, 50, None, Some((1, 20))).unwrap_err(),
            invalid
        );
        assert_eq!(count_created_since(3, 50, None, None).unwrap_err(), invalid);
        assert_eq!(
            count_created_since(3, 5, Some((3, 10)), Some((2, 4))).unwrap_err(),
            invalid
        );
    }

    #[test]
    fn pages_are_contiguous() {
        check_page(&[], 0, 0).unwrap();
        check_page(&[2, 3, 4], 2, 5).unwrap();
        assert_eq!(
            check_page(&[2, 4], 2, 5).unwrap_err(),
            ForgeError::InvalidBoundary.into()
        );
        assert_eq!(
            check_page(&[4, 5], 4, 5).unwrap_err(),
            ForgeError::InvalidBoundary.into()
        );
    }
}
