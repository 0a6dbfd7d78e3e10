use anchor_lang::prelude::*;
use forge_core::math::{ln, mul_div, rdiv, rmul, rpow, sqrt, to_int, RONE};
use forge_core::{ForgeId, ForgeProtocol, LockParams};

/// LP permanently locked in the pool at bootstrap
pub const MINIMUM_LIQUIDITY: u64 = 1_000;

/// Scale of `lp_interest_index`: interest per LP unit, times 1e18
pub const LP_INTEREST_SCALE: u128 = 1_000_000_000_000_000_000;

// Curve constants for the time-decay price: pi and pi + 1, RONE scaled
const PI: u128 = 314 * RONE / 100;
const PI_PLUSONE: u128 = 414 * RONE / 100;

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Asset {
    Xyt,
    Token,
}

impl Asset {
    pub fn other(self) -> Asset {
        match self {
            Asset::Xyt => Asset::Token,
            Asset::Token => Asset::Xyt,
        }
    }
}

/// Protocol parameters a market operation runs under
#[derive(Clone, Copy, Debug)]
pub struct MarketParams {
    pub swap_fee: u128,
    pub protocol_fee: u128,
    pub curve_shift_block_delta: u64,
    pub swap_lock: LockParams,
    pub add_liquidity_lock: LockParams,
}

impl MarketParams {
    pub fn from_protocol(protocol: &ForgeProtocol) -> Self {
        Self {
            swap_fee: protocol.swap_fee as u128,
            protocol_fee: protocol.protocol_swap_fee as u128,
            curve_shift_block_delta: protocol.curve_shift_block_delta,
            swap_lock: protocol.swap_lock,
            add_liquidity_lock: protocol.add_liquidity_lock,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapOutcome {
    pub amount_in: u64,
    pub amount_out: u64,
    pub protocol_fee_lp: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiquidityOutcome {
    pub xyt: u64,
    pub token: u64,
    pub lp: u64,
    pub protocol_fee_lp: u64,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReserveData {
    pub xyt_balance: u64,
    pub xyt_weight: u64,
    pub token_balance: u64,
    pub token_weight: u64,
    pub last_curve_shift_slot: u64,
}

/// Time-decaying weighted pool between an XYT and a base token.
///
/// Weights start at one half each and move towards the base token as the
/// XYT approaches expiry. `total_lp_supply` includes the locked minimum.
#[account]
#[derive(Debug)]
pub struct Market {
    pub forge_id: ForgeId,
    pub market_factory_id: ForgeId,
    pub yield_contract: Pubkey,
    pub xyt_position: Pubkey, // market's holder position in the yield program
    pub base_mint: Pubkey,
    pub base_vault: Pubkey,
    pub lp_mint: Pubkey,
    pub xyt_start_time: i64,
    pub expiry: i64,
    pub reserve_xyt: u64,
    pub reserve_token: u64,
    pub weight_xyt: u64,
    pub weight_token: u64,
    pub price_last: u64,
    pub last_curve_shift_slot: u64,
    pub total_lp_supply: u64,
    pub last_param_k: u128, // 0 while the protocol fee is off
    pub interest_vault: Pubkey, // underlying shares collected from the XYT position
    pub lp_interest_index: u128,
    pub total_lp_claims: u64, // LP tracked by `LpPosition`s; treasury and locked LP are not
    pub unallocated_interest: u64,
    pub bootstrapped: bool,
    pub bump: u8,
    pub base_vault_bump: u8,
    pub lp_mint_bump: u8,
    pub interest_vault_bump: u8,
}

impl Market {
    pub const SIZE: usize = 8 + // discriminator
        32 + // forge_id
        32 + // market_factory_id
        32 + // yield_contract
        32 + // xyt_position
        32 + // base_mint
        32 + // base_vault
        32 + // lp_mint
        8 +  // xyt_start_time
        8 +  // expiry
        8 +  // reserve_xyt
        8 +  // reserve_token
        8 +  // weight_xyt
        8 +  // weight_token
        8 +  // price_last
        8 +  // last_curve_shift_slot
        8 +  // total_lp_supply
        16 + // last_param_k
        32 + // interest_vault
        16 + // lp_interest_index
        8 +  // total_lp_claims
        8 +  // unallocated_interest
        1 +  // bootstrapped
        1 +  // bump
        1 +  // base_vault_bump
        1 +  // lp_mint_bump
        1;   // interest_vault_bump

    pub fn reserve_data(&self) -> ReserveData {
        ReserveData {
            xyt_balance: self.reserve_xyt,
            xyt_weight: self.weight_xyt,
            token_balance: self.reserve_token,
            token_weight: self.weight_token,
            last_curve_shift_slot: self.last_curve_shift_slot,
        }
    }

    fn reserve(&self, asset: Asset) -> (u128, u128) {
        match asset {
            Asset::Xyt => (self.reserve_xyt as u128, self.weight_xyt as u128),
            Asset::Token => (self.reserve_token as u128, self.weight_token as u128),
        }
    }

    fn credit(&mut self, asset: Asset, amount: u128) -> Result<()> {
        let amount = to_u64(amount)?;
        let reserve = match asset {
            Asset::Xyt => &mut self.reserve_xyt,
            Asset::Token => &mut self.reserve_token,
        };
        *reserve = reserve.checked_add(amount).ok_or(MarketError::MathOverflow)?;
        Ok(())
    }

    fn debit(&mut self, asset: Asset, amount: u128) -> Result<()> {
        let amount = to_u64(amount)?;
        let reserve = match asset {
            Asset::Xyt => &mut self.reserve_xyt,
            Asset::Token => &mut self.reserve_token,
        };
        require!(amount < *reserve, MarketError::InsufficientReserve);
        *reserve -= amount;
        Ok(())
    }

    fn check_open(&self, lock: &LockParams, now: i64) -> Result<()> {
        require!(self.bootstrapped, MarketError::NotBootstrapped);
        let lock_start = lock.lock_start(self.xyt_start_time, self.expiry)?;
        require!(now < lock_start, MarketError::MarketLocked);
        Ok(())
    }

    /// Runs `op` on a copy and keeps the copy only if `op` succeeds, so a
    /// rejected operation leaves every field as it was.
    fn transact<T>(&mut self, op: impl FnOnce(&mut Market) -> Result<T>) -> Result<T> {
        let mut next = self.clone();
        let outcome = op(&mut next)?;
        *self = next;
        Ok(outcome)
    }

    /// Seed both reserves. Returns the LP owed to the caller, which is the
    /// geometric mean of the deposits less `MINIMUM_LIQUIDITY`.
    pub fn bootstrap(
        &mut self,
        params: &MarketParams,
        xyt_amount: u64,
        token_amount: u64,
        now: i64,
        slot: u64,
    ) -> Result<u64> {
        self.transact(|market| {
            require!(!market.bootstrapped, MarketError::AlreadyBootstrapped);
            require!(xyt_amount > 0 && token_amount > 0, MarketError::InvalidAmount);
            let lock_start = params
                .add_liquidity_lock
                .lock_start(market.xyt_start_time, market.expiry)?;
            require!(now < lock_start, MarketError::MarketLocked);

            let supply = sqrt(xyt_amount as u128 * token_amount as u128);
            require!(supply > MINIMUM_LIQUIDITY as u128, MarketError::InvalidAmount);

            market.reserve_xyt = xyt_amount;
            market.reserve_token = token_amount;
            market.weight_xyt = (RONE / 2) as u64;
            market.weight_token = (RONE / 2) as u64;
            market.price_last = RONE as u64;
            market.last_curve_shift_slot = slot;
            market.total_lp_supply = to_u64(supply)?;
            market.bootstrapped = true;
            market.update_param_k(params)?;

            Ok(market.total_lp_supply - MINIMUM_LIQUIDITY)
        })
    }

    /// `ln(pi * t / T + 1) / ln(pi + 1)` where `t` is the time left and `T`
    /// the yield contract's lifetime. One at start, zero at expiry.
    pub fn time_price(&self, now: i64) -> Result<u128> {
        let left = (self.expiry - now).max(0) as u128;
        let duration = (self.expiry - self.xyt_start_time).max(1) as u128;
        let time_to_mature = rdiv(left * RONE, duration * RONE)?;
        let numerator = ln(rmul(PI, time_to_mature)? + RONE, RONE)?;
        rdiv(numerator, ln(PI_PLUSONE, RONE)?)
    }

    fn update_weight(&mut self, now: i64) -> Result<()> {
        let price = self.time_price(now)?;
        let ratio = rdiv(price, self.price_last as u128)?;
        let weight_xyt = self.weight_xyt as u128;
        let weight_token = self.weight_token as u128;

        let decay = RONE.checked_sub(ratio).ok_or(MarketError::MathOverflow)?;
        let numerator = rmul(rmul(weight_xyt, weight_token)?, decay)?;
        let denominator = rmul(ratio, weight_xyt)? + weight_token;
        let theta = rdiv(numerator, denominator)?;

        self.weight_xyt = to_u64(weight_xyt.checked_sub(theta).ok_or(MarketError::MathOverflow)?)?;
        self.weight_token = to_u64(weight_token + theta)?;
        self.price_last = to_u64(price)?;
        Ok(())
    }

    /// Shift weights towards the base token once `curve_shift_block_delta`
    /// slots have passed since the last shift. Returns protocol fee LP minted.
    pub fn curve_shift(&mut self, params: &MarketParams, now: i64, slot: u64) -> Result<u64> {
        if slot.saturating_sub(self.last_curve_shift_slot) < params.curve_shift_block_delta {
            return Ok(0);
        }
        let minted = self.mint_protocol_fees(params)?;
        self.update_weight(now)?;
        self.update_param_k(params)?;
        self.last_curve_shift_slot = slot;
        Ok(minted)
    }

    /// Invariant `xyt^w_xyt * token^w_token`, as an integer.
    pub fn param_k(&self) -> Result<u128> {
        let xyt = rpow(self.reserve_xyt as u128 * RONE, self.weight_xyt as u128)?;
        let token = rpow(self.reserve_token as u128 * RONE, self.weight_token as u128)?;
        Ok(to_int(rmul(xyt, token)?))
    }

    fn update_param_k(&mut self, params: &MarketParams) -> Result<()> {
        if params.protocol_fee > 0 {
            self.last_param_k = self.param_k()?;
        }
        Ok(())
    }

    /// Mint the protocol's share of invariant growth since the last
    /// checkpoint as LP. Supply grows by the returned amount.
    pub fn mint_protocol_fees(&mut self, params: &MarketParams) -> Result<u64> {
        if params.protocol_fee == 0 || self.last_param_k == 0 {
            return Ok(0);
        }
        let k = self.param_k()?;
        if k <= self.last_param_k {
            return Ok(0);
        }
        let supply = self.total_lp_supply as u128;
        let numerator = supply
            .checked_mul(k - self.last_param_k)
            .ok_or(MarketError::MathOverflow)?;
        let denominator = (RONE - params.protocol_fee)
            .checked_mul(k)
            .ok_or(MarketError::MathOverflow)?
            / params.protocol_fee
            + self.last_param_k;
        let minted = to_u64(numerator / denominator)?;
        self.total_lp_supply = self
            .total_lp_supply
            .checked_add(minted)
            .ok_or(MarketError::MathOverflow)?;
        Ok(minted)
    }

    fn calc_exact_out(&self, params: &MarketParams, asset_in: Asset, amount_in: u128) -> Result<u128> {
        let (balance_in, weight_in) = self.reserve(asset_in);
        let (balance_out, weight_out) = self.reserve(asset_in.other());
        let weight_ratio = rdiv(weight_in, weight_out)?;
        let adjusted_in = rmul(amount_in, RONE - params.swap_fee)?;
        let y = rdiv(balance_in, balance_in + adjusted_in)?;
        let keep = rpow(y, weight_ratio)?;
        rmul(balance_out, RONE.checked_sub(keep).ok_or(MarketError::MathOverflow)?)
    }

    fn calc_exact_in(&self, params: &MarketParams, asset_in: Asset, amount_out: u128) -> Result<u128> {
        let (balance_in, weight_in) = self.reserve(asset_in);
        let (balance_out, weight_out) = self.reserve(asset_in.other());
        require!(amount_out < balance_out, MarketError::InsufficientReserve);
        let weight_ratio = rdiv(weight_out, weight_in)?;
        let y = rdiv(balance_out, balance_out - amount_out)?;
        let growth = rpow(y, weight_ratio)? - RONE;
        rdiv(rmul(balance_in, growth)?, RONE - params.swap_fee)
    }

    /// Sell exactly `amount_in` of `asset_in`. The swap fee is charged on input.
    pub fn swap_exact_in(
        &mut self,
        params: &MarketParams,
        asset_in: Asset,
        amount_in: u64,
        min_out: u64,
        now: i64,
        slot: u64,
    ) -> Result<SwapOutcome> {
        self.transact(|market| {
            require!(amount_in > 0, MarketError::InvalidAmount);
            market.check_open(&params.swap_lock, now)?;
            let protocol_fee_lp = market.curve_shift(params, now, slot)?;

            let amount_out = to_u64(market.calc_exact_out(params, asset_in, amount_in as u128)?)?;
            require!(amount_out >= min_out, MarketError::SlippageExceeded);

            market.credit(asset_in, amount_in as u128)?;
            market.debit(asset_in.other(), amount_out as u128)?;
            Ok(SwapOutcome { amount_in, amount_out, protocol_fee_lp })
        })
    }

    /// Buy exactly `amount_out` of the other asset, paying at most `max_in`.
    pub fn swap_exact_out(
        &mut self,
        params: &MarketParams,
        asset_in: Asset,
        amount_out: u64,
        max_in: u64,
        now: i64,
        slot: u64,
    ) -> Result<SwapOutcome> {
        self.transact(|market| {
            require!(amount_out > 0, MarketError::InvalidAmount);
            market.check_open(&params.swap_lock, now)?;
            let protocol_fee_lp = market.curve_shift(params, now, slot)?;

            let amount_in = to_u64(market.calc_exact_in(params, asset_in, amount_out as u128)?)?;
            require!(amount_in <= max_in, MarketError::SlippageExceeded);

            market.credit(asset_in, amount_in as u128)?;
            market.debit(asset_in.other(), amount_out as u128)?;
            Ok(SwapOutcome { amount_in, amount_out, protocol_fee_lp })
        })
    }

    /// Output of an exact-in swap at `now`, without touching the market
    pub fn quote_exact_in(
        &self,
        params: &MarketParams,
        asset_in: Asset,
        amount_in: u64,
        now: i64,
        slot: u64,
    ) -> Result<u64> {
        let mut market = self.clone();
        market.check_open(&params.swap_lock, now)?;
        market.curve_shift(params, now, slot)?;
        to_u64(market.calc_exact_out(params, asset_in, amount_in as u128)?)
    }

    /// Input of an exact-out swap at `now`, without touching the market
    pub fn quote_exact_out(
        &self,
        params: &MarketParams,
        asset_in: Asset,
        amount_out: u64,
        now: i64,
        slot: u64,
    ) -> Result<u64> {
        let mut market = self.clone();
        market.check_open(&params.swap_lock, now)?;
        market.curve_shift(params, now, slot)?;
        to_u64(market.calc_exact_in(params, asset_in, amount_out as u128)?)
    }

    /// Price of one unit of `asset_out` in `asset_in`, fee included, RONE scaled
    pub fn spot_price(&self, params: &MarketParams, asset_in: Asset) -> Result<u128> {
        require!(self.bootstrapped, MarketError::NotBootstrapped);
        let (balance_in, weight_in) = self.reserve(asset_in);
        let (balance_out, weight_out) = self.reserve(asset_in.other());
        let numerator = rdiv(balance_in * RONE, weight_in)?;
        let denominator = rdiv(balance_out * RONE, weight_out)?;
        rdiv(rdiv(numerator, denominator)?, RONE - params.swap_fee)
    }

    /// Deposit both assets in the current ratio. The side in excess is
    /// only partially used.
    pub fn add_liquidity_dual(
        &mut self,
        params: &MarketParams,
        xyt_desired: u64,
        token_desired: u64,
        xyt_min: u64,
        token_min: u64,
        now: i64,
    ) -> Result<LiquidityOutcome> {
        let supply_before = self.total_lp_supply;
        self.transact(|market| {
            require!(xyt_desired > 0 && token_desired > 0, MarketError::InvalidAmount);
            market.check_open(&params.add_liquidity_lock, now)?;
            let protocol_fee_lp = market.mint_protocol_fees(params)?;

            let reserve_xyt = market.reserve_xyt as u128;
            let reserve_token = market.reserve_token as u128;
            let supply = market.total_lp_supply as u128;

            let token_optimal = xyt_desired as u128 * reserve_token / reserve_xyt;
            let (xyt_used, token_used, lp) = if token_optimal <= token_desired as u128 {
                (xyt_desired as u128, token_optimal, xyt_desired as u128 * supply / reserve_xyt)
            } else {
                let xyt_optimal = token_desired as u128 * reserve_xyt / reserve_token;
                (xyt_optimal, token_desired as u128, token_desired as u128 * supply / reserve_token)
            };
            require!(lp > 0, MarketError::InvalidAmount);
            require!(
                xyt_used >= xyt_min as u128 && token_used >= token_min as u128,
                MarketError::SlippageExceeded
            );

            market.credit(Asset::Xyt, xyt_used)?;
            market.credit(Asset::Token, token_used)?;
            let lp = to_u64(lp)?;
            market.total_lp_supply = supply_before
                .checked_add(lp)
                .ok_or(MarketError::MathOverflow)?;
            market.update_param_k(params)?;

            Ok(LiquidityOutcome {
                xyt: to_u64(xyt_used)?,
                token: to_u64(token_used)?,
                lp,
                protocol_fee_lp,
            })
        })
    }

    /// Deposit one asset. The implicit swap half pays `(1 - w) * fee`.
    pub fn add_liquidity_single(
        &mut self,
        params: &MarketParams,
        asset: Asset,
        amount: u64,
        min_lp: u64,
        now: i64,
        slot: u64,
    ) -> Result<LiquidityOutcome> {
        let supply_before = self.total_lp_supply;
        self.transact(|market| {
            require!(amount > 0, MarketError::InvalidAmount);
            market.check_open(&params.add_liquidity_lock, now)?;
            let mut protocol_fee_lp = market.curve_shift(params, now, slot)?;
            protocol_fee_lp += market.mint_protocol_fees(params)?;

            let (balance, weight) = market.reserve(asset);
            let supply = market.total_lp_supply as u128;
            let fee_portion = rmul(RONE - weight, params.swap_fee)?;
            let amount_after_fee = rmul(amount as u128, RONE - fee_portion)?;
            let ratio = rdiv(balance + amount_after_fee, balance)?;
            let updated_supply = rmul(rpow(ratio, weight)?, supply)?;
            let lp = to_u64(updated_supply.saturating_sub(supply))?;
            require!(lp > 0, MarketError::InvalidAmount);
            require!(lp >= min_lp, MarketError::SlippageExceeded);

            market.credit(asset, amount as u128)?;
            market.total_lp_supply = supply_before
                .checked_add(lp)
                .ok_or(MarketError::MathOverflow)?;
            market.update_param_k(params)?;

            let (xyt, token) = match asset {
                Asset::Xyt => (amount, 0),
                Asset::Token => (0, amount),
            };
            Ok(LiquidityOutcome { xyt, token, lp, protocol_fee_lp })
        })
    }

    /// Burn LP for a proportional share of both reserves. Allowed at any
    /// time, including after expiry.
    pub fn remove_liquidity_dual(
        &mut self,
        params: &MarketParams,
        lp: u64,
        xyt_min: u64,
        token_min: u64,
    ) -> Result<LiquidityOutcome> {
        self.transact(|market| {
            require!(market.bootstrapped, MarketError::NotBootstrapped);
            require!(lp > 0, MarketError::InvalidAmount);
            let protocol_fee_lp = market.mint_protocol_fees(params)?;

            let supply = market.total_lp_supply as u128;
            require!(
                lp as u128 + MINIMUM_LIQUIDITY as u128 <= supply,
                MarketError::InsufficientReserve
            );
            let xyt_out = lp as u128 * market.reserve_xyt as u128 / supply;
            let token_out = lp as u128 * market.reserve_token as u128 / supply;
            require!(
                xyt_out >= xyt_min as u128 && token_out >= token_min as u128,
                MarketError::SlippageExceeded
            );

            market.debit(Asset::Xyt, xyt_out)?;
            market.debit(Asset::Token, token_out)?;
            market.total_lp_supply -= lp;
            market.update_param_k(params)?;

            Ok(LiquidityOutcome {
                xyt: to_u64(xyt_out)?,
                token: to_u64(token_out)?,
                lp,
                protocol_fee_lp,
            })
        })
    }

    /// Burn LP for one asset only, paying `(1 - w) * fee` on the output.
    pub fn remove_liquidity_single(
        &mut self,
        params: &MarketParams,
        asset: Asset,
        lp: u64,
        min_out: u64,
        now: i64,
        slot: u64,
    ) -> Result<LiquidityOutcome> {
        self.transact(|market| {
            require!(lp > 0, MarketError::InvalidAmount);
            market.check_open(&params.add_liquidity_lock, now)?;
            let mut protocol_fee_lp = market.curve_shift(params, now, slot)?;
            protocol_fee_lp += market.mint_protocol_fees(params)?;

            let (balance, weight) = market.reserve(asset);
            let supply = market.total_lp_supply as u128;
            require!(
                lp as u128 + MINIMUM_LIQUIDITY as u128 <= supply,
                MarketError::InsufficientReserve
            );

            let ratio = rdiv(supply - lp as u128, supply)?;
            let out_ratio = rpow(ratio, rdiv(RONE, weight)?)?;
            let out_before_fee = balance.saturating_sub(rmul(out_ratio, balance)?);
            let fee_portion = rmul(RONE - weight, params.swap_fee)?;
            let out = rmul(out_before_fee, RONE - fee_portion)?;
            require!(out > 0, MarketError::InvalidAmount);
            require!(out >= min_out as u128, MarketError::SlippageExceeded);

            market.debit(asset, out)?;
            market.total_lp_supply -= lp;
            market.update_param_k(params)?;

            let out = to_u64(out)?;
            let (xyt, token) = match asset {
                Asset::Xyt => (out, 0),
                Asset::Token => (0, out),
            };
            Ok(LiquidityOutcome { xyt, token, lp, protocol_fee_lp })
        })
    }
}

/// A liquidity provider's share of the interest earned by the market's XYT.
#[account]
#[derive(Debug)]
pub struct LpPosition {
    pub market: Pubkey,
    pub owner: Pubkey,
    pub lp_balance: u64,
    pub interest_index: u128, // market index at the last settlement
    pub pending_interest: u64,
    pub bump: u8,
}

impl LpPosition {
    pub const SIZE: usize = 8 + // discriminator
        32 + // market
        32 + // owner
        8 +  // lp_balance
        16 + // interest_index
        8 +  // pending_interest
        1;   // bump
}

// Interest ledger. XYT interest collected by the market is spread over the
// LP held in positions at the time of collection; positions settle against
// the index before their balance changes.
impl Market {
    /// Add `collected` shares to the index. With no tracked LP the shares
    /// wait in `unallocated_interest` for the next collection.
    pub fn distribute_interest(&mut self, collected: u64) -> Result<()> {
        let pool = self
            .unallocated_interest
            .checked_add(collected)
            .ok_or(MarketError::MathOverflow)?;
        if pool == 0 || self.total_lp_claims == 0 {
            self.unallocated_interest = pool;
            return Ok(());
        }
        let claims = self.total_lp_claims as u128;
        let delta = mul_div(pool as u128, LP_INTEREST_SCALE, claims)?;
        let allocated = to_u64(mul_div(delta, claims, LP_INTEREST_SCALE)?)?;
        self.lp_interest_index = self
            .lp_interest_index
            .checked_add(delta)
            .ok_or(MarketError::MathOverflow)?;
        // rounding dust carries over
        self.unallocated_interest = pool - allocated;
        Ok(())
    }

    fn settle_lp(&self, position: &mut LpPosition) -> Result<()> {
        let delta = self
            .lp_interest_index
            .checked_sub(position.interest_index)
            .ok_or(MarketError::MathOverflow)?;
        if delta > 0 && position.lp_balance > 0 {
            let earned = to_u64(mul_div(position.lp_balance as u128, delta, LP_INTEREST_SCALE)?)?;
            position.pending_interest = position
                .pending_interest
                .checked_add(earned)
                .ok_or(MarketError::MathOverflow)?;
        }
        position.interest_index = self.lp_interest_index;
        Ok(())
    }

    pub fn credit_lp(&mut self, position: &mut LpPosition, lp: u64) -> Result<()> {
        self.settle_lp(position)?;
        position.lp_balance = position
            .lp_balance
            .checked_add(lp)
            .ok_or(MarketError::MathOverflow)?;
        self.total_lp_claims = self
            .total_lp_claims
            .checked_add(lp)
            .ok_or(MarketError::MathOverflow)?;
        Ok(())
    }

    /// Burned LP beyond the position's balance (received by plain token
    /// transfer) carried no claim and is ignored.
    pub fn debit_lp(&mut self, position: &mut LpPosition, lp: u64) -> Result<()> {
        self.settle_lp(position)?;
        let tracked = lp.min(position.lp_balance);
        position.lp_balance -= tracked;
        self.total_lp_claims = self.total_lp_claims.saturating_sub(tracked);
        Ok(())
    }

    /// Move the interest claim of `lp` units along with an LP transfer.
    pub fn move_lp_claim(&self, from: &mut LpPosition, to: &mut LpPosition, lp: u64) -> Result<()> {
        require!(lp > 0, MarketError::InvalidAmount);
        require!(from.lp_balance >= lp, MarketError::InsufficientLpClaim);
        self.settle_lp(from)?;
        self.settle_lp(to)?;
        from.lp_balance -= lp;
        to.lp_balance = to.lp_balance.checked_add(lp).ok_or(MarketError::MathOverflow)?;
        Ok(())
    }

    /// Settle and empty the position's interest, returning the shares owed.
    pub fn take_lp_interest(&self, position: &mut LpPosition) -> Result<u64> {
        self.settle_lp(position)?;
        Ok(std::mem::take(&mut position.pending_interest))
    }
}

pub fn to_u64(value: u128) -> Result<u64> {
    u64::try_from(value).map_err(|_| MarketError::MathOverflow.into())
}

#[error_code]
pub enum MarketError {
    #[msg("Market is locked for this operation")]
    MarketLocked,
    #[msg("Market is already bootstrapped")]
    AlreadyBootstrapped,
    #[msg("Market is not bootstrapped")]
    NotBootstrapped,
    #[msg("Invalid amount")]
    InvalidAmount,
    #[msg("Slippage limit exceeded")]
    SlippageExceeded,
    #[msg("Reserve would be drained")]
    InsufficientReserve,
    #[msg("Yield contract does not match the market")]
    InvalidYieldContract,
    #[msg("Protocol is paused")]
    Paused,
    #[msg("Unauthorized access")]
    Unauthorized,
    #[msg("LP position is required for this operation")]
    LpPositionRequired,
    #[msg("LP position holds less than the amount")]
    InsufficientLpClaim,
    #[msg("LP position does not belong to this market")]
    InvalidLpPosition,
    #[msg("Math overflow")]
    MathOverflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 4_000_000_000;
    const SIX_MONTH: i64 = 2_592_000 * 6;
    const EXPIRY: i64 = T0 + SIX_MONTH;
    const BOOTSTRAP_SLOT: u64 = 10;

    fn params(swap_fee: u128, protocol_fee: u128) -> MarketParams {
        MarketParams {
            swap_fee,
            protocol_fee,
            curve_shift_block_delta: 1,
            swap_lock: LockParams::DEFAULT,
            add_liquidity_lock: LockParams::DEFAULT,
        }
    }

    fn market() -> Market {
        Market {
            forge_id: [0; 32],
            market_factory_id: [0; 32],
            yield_contract: Pubkey::new_unique(),
            xyt_position: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            base_vault: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            xyt_start_time: T0,
            expiry: EXPIRY,
            reserve_xyt: 0,
            reserve_token: 0,
            weight_xyt: 0,
            weight_token: 0,
            price_last: 0,
            last_curve_shift_slot: 0,
            total_lp_supply: 0,
            last_param_k: 0,
            interest_vault: Pubkey::new_unique(),
            lp_interest_index: 0,
            total_lp_claims: 0,
            unallocated_interest: 0,
            bootstrapped: false,
            bump: 0,
            base_vault_bump: 0,
            lp_mint_bump: 0,
            interest_vault_bump: 0,
        }
    }

    fn bootstrapped(p: &MarketParams, xyt: u64, token: u64) -> Market {
        let mut m = market();
        m.bootstrap(p, xyt, token, T0, BOOTSTRAP_SLOT).unwrap();
        m
    }

    fn assert_near(actual: u64, expected: u64, delta: u64) {
        assert!(
            actual.abs_diff(expected) <= delta,
            "{} not within {} of {}",
            actual,
            delta,
            expected
        );
    }

    // (seconds after T0, asset in, amount in, amount out)
    const CURVE_CASES: [(i64, Asset, u64, u64); 10] = [
        (3600, Asset::Token, 20405615, 20000000),
        (3660, Asset::Xyt, 120000000, 111303781),
        (43200, Asset::Token, 300000000, 273280448),
        (43210, Asset::Xyt, 74655258, 100000000),
        (2592030, Asset::Xyt, 100000000, 100716340),
        (14515300, Asset::Xyt, 200000000, 24266823),
        (14861000, Asset::Token, 26338047, 300000000),
        (15120300, Asset::Xyt, 400000000, 21595046),
        (15120360, Asset::Token, 3696839, 80000000),
        (15379200, Asset::Xyt, 800000016, 11997610),
    ];

    #[test]
    fn bootstrap_locks_minimum_liquidity() {
        let p = params(0, 0);
        let mut m = market();
        let lp = m.bootstrap(&p, 100_000_000, 100_000_000, T0, BOOTSTRAP_SLOT).unwrap();
        assert_eq!(lp, 100_000_000 - MINIMUM_LIQUIDITY);
        assert_eq!(m.total_lp_supply, 100_000_000);
        assert_eq!(m.weight_xyt as u128, RONE / 2);
        assert_eq!(m.weight_token as u128, RONE / 2);
        assert_eq!(m.last_param_k, 0);

        assert_eq!(
            m.bootstrap(&p, 1, 1, T0, BOOTSTRAP_SLOT).unwrap_err(),
            MarketError::AlreadyBootstrapped.into()
        );
    }

    #[test]
    fn operations_require_bootstrap() {
        let p = params(0, 0);
        let mut m = market();
        assert_eq!(
            m.swap_exact_in(&p, Asset::Token, 10, 0, T0, 11).unwrap_err(),
            MarketError::NotBootstrapped.into()
        );
        assert_eq!(
            m.remove_liquidity_dual(&p, 10, 0, 0).unwrap_err(),
            MarketError::NotBootstrapped.into()
        );
    }

    #[test]
    fn time_price_decays_from_one_to_zero() {
        let m = bootstrapped(&params(0, 0), 100_000_000, 100_000_000);
        assert_eq!(m.time_price(T0).unwrap(), RONE);
        assert_eq!(m.time_price(EXPIRY).unwrap(), 0);
        assert_eq!(m.time_price(T0 + SIX_MONTH / 2).unwrap(), 730512133745);
    }

    #[test]
    fn swap_exact_in_follows_the_curve() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 1_000_000_000, 1_000_000_000);
        for (i, (offset, asset_in, amount_in, amount_out)) in CURVE_CASES.iter().enumerate() {
            let slot = BOOTSTRAP_SLOT + 1 + i as u64;
            let out = m
                .swap_exact_in(&p, *asset_in, *amount_in, 0, T0 + offset, slot)
                .unwrap();
            assert_near(out.amount_out, *amount_out, 5);
            assert_eq!(m.weight_xyt + m.weight_token, RONE as u64);
        }
        assert!(m.weight_xyt < m.weight_token);
    }

    #[test]
    fn swap_exact_out_follows_the_curve() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 1_000_000_000, 1_000_000_000);
        for (i, (offset, asset_in, amount_in, amount_out)) in CURVE_CASES.iter().enumerate() {
            let slot = BOOTSTRAP_SLOT + 1 + i as u64;
            let out = m
                .swap_exact_out(&p, *asset_in, *amount_out, u64::MAX, T0 + offset, slot)
                .unwrap();
            assert_near(out.amount_in, *amount_in, 33);
        }
    }

    #[test]
    fn swap_fee_is_charged_on_input() {
        // 0.35% swap fee, 20% protocol fee
        let fee = rdiv(35 * RONE, 10_000 * RONE).unwrap();
        let protocol_fee = rdiv(2 * RONE, 10 * RONE).unwrap();
        assert_eq!(fee, 3848290697);
        assert_eq!(protocol_fee, 219902325555);

        let p = params(fee, protocol_fee);
        let mut m = bootstrapped(&p, 1_000_000_000, 1_000_000_000);
        let cases = [
            (3600, Asset::Token, 20405615, 19931395),
            (21600, Asset::Token, 20405615, 19162864),
            (93600, Asset::Token, 14832741, 13498154),
            (205200, Asset::Xyt, 12731281, 13851215),
            (720000, Asset::Xyt, 11241212, 11713770),
            (900000, Asset::Token, 112411212, 98219316),
        ];
        for (i, (offset, asset_in, amount_in, amount_out)) in cases.iter().enumerate() {
            let slot = BOOTSTRAP_SLOT + 1 + i as u64;
            let out = m
                .swap_exact_in(&p, *asset_in, *amount_in, 0, T0 + offset, slot)
                .unwrap();
            assert_near(out.amount_out, *amount_out, 1);
        }
    }

    #[test]
    fn protocol_fee_accrues_to_treasury() {
        let fee = rdiv(35 * RONE, 10_000 * RONE).unwrap();
        let protocol_fee = rdiv(2 * RONE, 10 * RONE).unwrap();
        let p = params(fee, protocol_fee);
        let mut m = bootstrapped(&p, 10_000_000_000, 10_000_000_000);
        assert!(m.last_param_k > 0);

        let unit: u64 = 1_500_500 * 15;
        let rounds: [(i64, [u64; 3], u64); 5] = [
            (3600, [1, 1, 1], 15737),
            (36000, [2, 3, 4], 54997),
            (360000, [5, 6, 7], 141046),
            (3600 * 300, [8, 9, 10], 273551),
            (3600 * 500, [11, 12, 13], 452271),
        ];
        let mut slot = BOOTSTRAP_SLOT + 1;
        let mut treasury = 0u64;
        for (offset, multipliers, expected) in rounds {
            let now = T0 + offset;
            treasury += m
                .swap_exact_in(&p, Asset::Token, unit * multipliers[0], 0, now, slot)
                .unwrap()
                .protocol_fee_lp;
            slot += 1;
            treasury += m
                .swap_exact_in(&p, Asset::Xyt, unit * multipliers[1], 0, now, slot)
                .unwrap()
                .protocol_fee_lp;
            slot += 1;
            let amount = unit * multipliers[2];
            treasury += m
                .add_liquidity_dual(&p, amount, amount, 0, 0, now)
                .unwrap()
                .protocol_fee_lp;
            slot += 1;
            assert_near(treasury, expected, 10);
        }
    }

    #[test]
    fn swaps_near_expiry_stay_priced() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 10_000_000_000, 100_000);
        let start = EXPIRY - 90_000;
        let cases = [
            (Asset::Xyt, 993586042, 120),
            (Asset::Xyt, 2299356372, 240),
            (Asset::Xyt, 6173735287, 480),
            (Asset::Xyt, 46611784, 3),
            (Asset::Token, 10000, 19503526195),
        ];
        for (i, (asset_in, amount_in, amount_out)) in cases.iter().enumerate() {
            let out = m
                .swap_exact_in(&p, *asset_in, *amount_in, 0, start + 60 * i as i64, 11 + i as u64)
                .unwrap();
            assert_near(out.amount_out, *amount_out, 1);
        }
    }

    #[test]
    fn single_sided_liquidity_near_expiry() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 1_000_000_000, 10_000);
        let now = EXPIRY - 90_000;
        let mut slot = BOOTSTRAP_SLOT + 1;

        let adds = [
            (Asset::Xyt, 53241241, 2054),
            (Asset::Token, 53210, 16381062),
            (Asset::Xyt, 100000000, 22203),
            (Asset::Token, 100000000, 28227906044),
        ];
        for (i, (asset, amount, lp)) in adds.iter().enumerate() {
            let out = m
                .add_liquidity_single(&p, *asset, *amount, 0, now + i as i64, slot)
                .unwrap();
            assert_near(out.lp, *lp, 3 + lp / 10_000_000);
            slot += 1;
        }

        let removes = [
            (Asset::Xyt, 1412375459, 1134097596),
            (Asset::Token, 14123754590, 53111673),
        ];
        for (i, (asset, lp, amount)) in removes.iter().enumerate() {
            let out = m
                .remove_liquidity_single(&p, *asset, *lp, 0, now + 10 + i as i64, slot)
                .unwrap();
            let received = match asset {
                Asset::Xyt => out.xyt,
                Asset::Token => out.token,
            };
            assert_near(received, *amount, 3 + amount / 10_000_000);
            slot += 1;
        }
        assert_eq!(m.total_lp_supply, 12711343591);
    }

    #[test]
    fn dual_add_uses_the_reserve_ratio() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 1_000, 1_000_000);
        assert_eq!(m.total_lp_supply, 31622);

        let out = m.add_liquidity_dual(&p, 1_000, 1_000, 0, 0, T0 + 10).unwrap();
        assert_eq!((out.xyt, out.token, out.lp), (1, 1_000, 31));
        assert_eq!(m.reserve_xyt, 1_001);
        assert_eq!(m.reserve_token, 1_001_000);

        assert_eq!(
            m.add_liquidity_dual(&p, 1_000, 1_000, 2, 0, T0 + 10).unwrap_err(),
            MarketError::SlippageExceeded.into()
        );
    }

    #[test]
    fn dual_add_and_remove_are_proportional() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 100_000_000, 100_000_000);
        let out = m
            .add_liquidity_dual(&p, 100_000_000, 100_000_000, 0, 0, T0 + 10)
            .unwrap();
        assert_eq!(out.lp, 100_000_000);
        assert_eq!(m.reserve_xyt, 200_000_000);
        assert_eq!(m.total_lp_supply, 200_000_000);

        let out = m.remove_liquidity_dual(&p, 100_000_000, 0, 0).unwrap();
        assert_eq!((out.xyt, out.token), (100_000_000, 100_000_000));
        assert_eq!(m.total_lp_supply, 100_000_000);
    }

    #[test]
    fn quotes_do_not_touch_state() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 100_000_000, 100_000_000);
        let before = m.reserve_data();

        let quote_in = m
            .quote_exact_in(&p, Asset::Token, 10_000_000, T0 + 3600, BOOTSTRAP_SLOT + 1)
            .unwrap();
        let quote_out = m
            .quote_exact_out(&p, Asset::Token, 10_000_000, T0 + 3600, BOOTSTRAP_SLOT + 1)
            .unwrap();
        assert_eq!(quote_in, 9091980);
        assert_eq!(quote_out, 11109664);
        assert_eq!(m.reserve_data(), before);

        let out = m
            .swap_exact_in(&p, Asset::Token, 10_000_000, 0, T0 + 3600, BOOTSTRAP_SLOT + 1)
            .unwrap();
        assert_eq!(out.amount_out, quote_in);
        assert_eq!(m.reserve_xyt, 90_908_020);
        assert_eq!(m.reserve_token, 110_000_000);
    }

    #[test]
    fn curve_shifts_once_the_slot_delta_is_reached() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 100_000_000, 100_000_000);

        let out = m
            .swap_exact_in(&p, Asset::Token, 10_000_000, 0, T0 + 3600, BOOTSTRAP_SLOT)
            .unwrap();
        assert_eq!(out.amount_out, 9090909);
        assert_eq!(m.weight_xyt as u128, RONE / 2);

        m.swap_exact_in(&p, Asset::Token, 10, 0, T0 + 3600, BOOTSTRAP_SLOT + 1)
            .unwrap();
        assert!((m.weight_xyt as u128) < RONE / 2);
        assert_eq!(m.last_curve_shift_slot, BOOTSTRAP_SLOT + 1);
    }

    #[test]
    fn slippage_limits_are_enforced() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 100_000_000, 100_000_000);
        assert_eq!(
            m.swap_exact_in(&p, Asset::Token, 10_000_000, 9_091_981, T0 + 3600, 11)
                .unwrap_err(),
            MarketError::SlippageExceeded.into()
        );
        assert_eq!(
            m.swap_exact_out(&p, Asset::Token, 10_000_000, 11_000_000, T0 + 3600, 11)
                .unwrap_err(),
            MarketError::SlippageExceeded.into()
        );
        assert_eq!(
            m.swap_exact_out(&p, Asset::Token, 100_000_000, u64::MAX, T0 + 3600, 11)
                .unwrap_err(),
            MarketError::InsufficientReserve.into()
        );
        assert_eq!(m.reserve_token, 100_000_000);
    }

    #[test]
    fn rejected_operations_leave_the_market_untouched() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 100_000_000, 100_000_000);
        let before = m.reserve_data();
        let month_in = T0 + 2_592_000;

        assert_eq!(
            m.swap_exact_in(&p, Asset::Token, 10_000_000, u64::MAX, month_in, 11)
                .unwrap_err(),
            MarketError::SlippageExceeded.into()
        );
        assert_eq!(m.reserve_data(), before);
        assert_eq!(m.weight_xyt, 549_755_813_888);
        assert_eq!(m.last_curve_shift_slot, BOOTSTRAP_SLOT);
        assert_eq!(m.price_last as u128, RONE);

        assert_eq!(
            m.swap_exact_out(&p, Asset::Token, 1_000_000, 0, month_in, 11)
                .unwrap_err(),
            MarketError::SlippageExceeded.into()
        );
        assert_eq!(
            m.add_liquidity_single(&p, Asset::Xyt, 1_000_000, u64::MAX, month_in, 11)
                .unwrap_err(),
            MarketError::SlippageExceeded.into()
        );
        assert_eq!(
            m.remove_liquidity_single(&p, Asset::Xyt, 1_000_000, u64::MAX, month_in, 11)
                .unwrap_err(),
            MarketError::SlippageExceeded.into()
        );
        assert_eq!(m.reserve_data(), before);
        assert_eq!(m.total_lp_supply, 100_000_000);
        assert_eq!(m.price_last as u128, RONE);

        // the same swap within its limit shifts the curve
        m.swap_exact_in(&p, Asset::Token, 10_000_000, 0, month_in, 11)
            .unwrap();
        assert!((m.weight_xyt as u128) < RONE / 2);
        assert_eq!(m.last_curve_shift_slot, 11);
    }

    #[test]
    fn rejected_liquidity_mints_no_protocol_fee() {
        let fee = rdiv(35 * RONE, 10_000 * RONE).unwrap();
        let protocol_fee = rdiv(2 * RONE, 10 * RONE).unwrap();
        let p = params(fee, protocol_fee);
        let mut m = bootstrapped(&p, 10_000_000_000, 10_000_000_000);
        let now = T0 + 3600;
        m.swap_exact_in(&p, Asset::Token, 1_000_000_000, 0, now, 11)
            .unwrap();
        assert!(m.param_k().unwrap() > m.last_param_k);

        let supply = m.total_lp_supply;
        let last_param_k = m.last_param_k;
        let before = m.reserve_data();
        assert_eq!(
            m.add_liquidity_dual(&p, 1_000_000, 1_000_000, u64::MAX, 0, now)
                .unwrap_err(),
            MarketError::SlippageExceeded.into()
        );
        assert_eq!(
            m.remove_liquidity_dual(&p, 1_000_000, u64::MAX, 0).unwrap_err(),
            MarketError::SlippageExceeded.into()
        );
        assert_eq!(m.total_lp_supply, supply);
        assert_eq!(m.last_param_k, last_param_k);
        assert_eq!(m.reserve_data(), before);

        let out = m
            .add_liquidity_dual(&p, 1_000_000, 1_000_000, 0, 0, now)
            .unwrap();
        assert!(out.protocol_fee_lp > 0);
        assert_eq!(m.total_lp_supply, supply + out.protocol_fee_lp + out.lp);
    }

    #[test]
    fn locks_close_swaps_and_adds_before_expiry() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 100_000_000, 100_000_000);
        let lock_start = EXPIRY - 86_400;

        assert_eq!(
            m.swap_exact_in(&p, Asset::Token, 1_000, 0, lock_start, 11).unwrap_err(),
            MarketError::MarketLocked.into()
        );
        assert_eq!(
            m.add_liquidity_single(&p, Asset::Xyt, 1_000, 0, lock_start, 11)
                .unwrap_err(),
            MarketError::MarketLocked.into()
        );
        assert_eq!(
            m.remove_liquidity_single(&p, Asset::Xyt, 1_000, 0, EXPIRY, 11)
                .unwrap_err(),
            MarketError::MarketLocked.into()
        );
        assert_eq!(
            m.add_liquidity_dual(&p, 1_000, 1_000, 0, 0, lock_start).unwrap_err(),
            MarketError::MarketLocked.into()
        );

        let mut late = market();
        assert_eq!(
            late.bootstrap(&p, 100_000_000, 100_000_000, lock_start, BOOTSTRAP_SLOT)
                .unwrap_err(),
            MarketError::MarketLocked.into()
        );
        assert!(!late.bootstrapped);
        late.bootstrap(&p, 100_000_000, 100_000_000, lock_start - 1, BOOTSTRAP_SLOT)
            .unwrap();

        // proportional exit stays open after expiry
        let out = m.remove_liquidity_dual(&p, 50_000_000, 0, 0).unwrap();
        assert_eq!((out.xyt, out.token), (50_000_000, 50_000_000));
    }

    #[test]
    fn single_remove_pays_from_one_reserve() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 100_000_000, 100_000_000);
        let out = m
            .remove_liquidity_single(&p, Asset::Xyt, 10_000_000, 0, T0 + 3600, 11)
            .unwrap();
        assert_near(out.xyt, 19001055, 1);
        assert_eq!(out.token, 0);
        assert_eq!(m.total_lp_supply, 90_000_000);
        assert_eq!(m.reserve_token, 100_000_000);
    }

    #[test]
    fn quoted_rate_matches_realized_swap() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 100_000_000, 100_000_000);
        let quote = m
            .quote_exact_in(&p, Asset::Xyt, 10_000_000, T0, BOOTSTRAP_SLOT + 1)
            .unwrap();
        assert_near(quote, 9090839, 1000);

        let out = m
            .swap_exact_in(&p, Asset::Xyt, 10_000_000, 0, T0, BOOTSTRAP_SLOT + 1)
            .unwrap();
        assert_eq!(out.amount_out, quote);
    }

    #[test]
    fn minimum_liquidity_cannot_be_removed() {
        let p = params(0, 0);
        let mut m = bootstrapped(&p, 100_000_000, 100_000_000);
        assert_eq!(
            m.remove_liquidity_dual(&p, 100_000_000 - MINIMUM_LIQUIDITY + 1, 0, 0)
                .unwrap_err(),
            MarketError::InsufficientReserve.into()
        );
        m.remove_liquidity_dual(&p, 100_000_000 - MINIMUM_LIQUIDITY, 0, 0)
            .unwrap();
        assert_eq!(m.total_lp_supply, MINIMUM_LIQUIDITY);
        assert_eq!(m.reserve_xyt, 1_000);
    }

    #[test]
    fn spot_price_is_one_at_bootstrap() {
        let p = params(0, 0);
        let m = bootstrapped(&p, 100_000_000, 100_000_000);
        assert_eq!(m.spot_price(&p, Asset::Token).unwrap(), RONE);
    }

    fn lp_position() -> LpPosition {
        LpPosition {
            market: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
            lp_balance: 0,
            interest_index: 0,
            pending_interest: 0,
            bump: 0,
        }
    }

    #[test]
    fn lp_interest_follows_lp_balances() {
        let mut m = market();
        let (mut alice, mut bob, mut carol) = (lp_position(), lp_position(), lp_position());
        m.credit_lp(&mut alice, 300).unwrap();
        m.credit_lp(&mut bob, 100).unwrap();
        m.distribute_interest(400).unwrap();
        assert_eq!(m.lp_interest_index, LP_INTEREST_SCALE);

        // joins after the first collection, earns only from the second
        m.credit_lp(&mut carol, 400).unwrap();
        m.distribute_interest(800).unwrap();

        assert_eq!(m.take_lp_interest(&mut alice).unwrap(), 600);
        assert_eq!(m.take_lp_interest(&mut bob).unwrap(), 200);
        assert_eq!(m.take_lp_interest(&mut carol).unwrap(), 400);
        assert_eq!(m.take_lp_interest(&mut alice).unwrap(), 0);
        assert_eq!(m.unallocated_interest, 0);
        assert_eq!(m.total_lp_claims, 800);
    }

    #[test]
    fn interest_waits_for_lp_claims() {
        let mut m = market();
        m.distribute_interest(50).unwrap();
        assert_eq!(m.unallocated_interest, 50);
        assert_eq!(m.lp_interest_index, 0);

        let mut alice = lp_position();
        m.credit_lp(&mut alice, 3).unwrap();
        m.distribute_interest(0).unwrap();
        assert_eq!(m.take_lp_interest(&mut alice).unwrap(), 49);
        assert_eq!(m.unallocated_interest, 1);
    }

    #[test]
    fn lp_claim_moves_with_transfers() {
        let mut m = market();
        let (mut alice, mut bob) = (lp_position(), lp_position());
        m.credit_lp(&mut alice, 100).unwrap();
        m.distribute_interest(100).unwrap();

        m.move_lp_claim(&mut alice, &mut bob, 40).unwrap();
        m.distribute_interest(100).unwrap();
        assert_eq!(m.take_lp_interest(&mut alice).unwrap(), 160);
        assert_eq!(m.take_lp_interest(&mut bob).unwrap(), 40);

        assert_eq!(
            m.move_lp_claim(&mut alice, &mut bob, 61).unwrap_err(),
            MarketError::InsufficientLpClaim.into()
        );
        m.debit_lp(&mut alice, 1_000).unwrap();
        assert_eq!(alice.lp_balance, 0);
        assert_eq!(m.total_lp_claims, 40);
    }
}
