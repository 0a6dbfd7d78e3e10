use anchor_lang::prelude::*;
use forge_core::math::mul_div;
use forge_core::ForgeId;

pub const RATE_SCALE: u128 = 1_000_000_000u128; // 1e9 fixed point for exchange rates
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Exchange rate feed for one yield-bearing mint, pushed by its forge adapter.
#[account]
pub struct YieldSource {
    pub authority: Pubkey,
    pub underlying_mint: Pubkey,
    pub exchange_rate: u128, // underlying per share, scaled by RATE_SCALE
    pub last_updated: i64,
    pub bump: u8,
}

impl YieldSource {
    pub const SIZE: usize = 8 + // discriminator
        32 + // authority
        32 + // underlying_mint
        16 + // exchange_rate
        8 +  // last_updated
        1;   // bump

    pub fn push_rate(&mut self, rate: u128, now: i64) -> Result<()> {
        require!(
            rate > 0 && rate >= self.exchange_rate,
            YieldError::InvalidRate
        );
        self.exchange_rate = rate;
        self.last_updated = now;
        Ok(())
    }
}

#[account]
pub struct YieldContract {
    pub forge_id: ForgeId,
    pub underlying_mint: Pubkey,
    pub yield_source: Pubkey,
    pub vault: Pubkey,
    pub start_time: i64,
    pub expiry: i64,
    pub total_ot: u64,
    pub total_xyt: u64,
    pub last_rate_before_expiry: u128, // interest stops accruing at this rate once expired
    pub total_fee: u64,                // forge fee in shares, owed to the treasury
    pub bump: u8,
    pub vault_bump: u8,
}

#[account]
pub struct HolderPosition {
    pub owner: Pubkey,
    pub yield_contract: Pubkey,
    pub ot_balance: u64,
    pub xyt_balance: u64,
    pub last_rate: u128,
    pub due_interests: u64, // settled interest in shares, not yet paid out
    pub bump: u8,
}

impl HolderPosition {
    pub const SIZE: usize = 8 + // discriminator
        32 + // owner
        32 + // yield_contract
        8 +  // ot_balance
        8 +  // xyt_balance
        16 + // last_rate
        8 +  // due_interests
        1;   // bump
}

/// Shares leaving the vault for one redemption.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Redemption {
    pub principal: u64,
    pub interest: u64,
}

impl Redemption {
    pub fn total(&self) -> Result<u64> {
        self.principal
            .checked_add(self.interest)
            .ok_or_else(|| YieldError::MathOverflow.into())
    }
}

fn to_u64(value: u128) -> Result<u64> {
    u64::try_from(value).map_err(|_| YieldError::MathOverflow.into())
}

impl YieldContract {
    pub const SIZE: usize = 8 + // discriminator
        32 + // forge_id
        32 + // underlying_mint
        32 + // yield_source
        32 + // vault
        8 +  // start_time
        8 +  // expiry
        8 +  // total_ot
        8 +  // total_xyt
        16 + // last_rate_before_expiry
        8 +  // total_fee
        1 +  // bump
        1;   // vault_bump

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expiry
    }

    /// Rate interest is measured against: the live rate before expiry, the
    /// last rate observed before expiry afterwards.
    fn observe_rate(&mut self, now: i64, current_rate: u128) -> u128 {
        if !self.is_expired(now) || self.last_rate_before_expiry == 0 {
            self.last_rate_before_expiry = current_rate;
        }
        self.last_rate_before_expiry
    }

    fn effective_rate(&self, now: i64, current_rate: u128) -> u128 {
        if !self.is_expired(now) || self.last_rate_before_expiry == 0 {
            current_rate
        } else {
            self.last_rate_before_expiry
        }
    }

    /// Interest in shares `holder` has earned since its checkpoint, before fees.
    pub fn accrued_interest(&self, holder: &HolderPosition, rate: u128) -> Result<u128> {
        if holder.last_rate == 0 || holder.xyt_balance == 0 || rate <= holder.last_rate {
            return Ok(0);
        }
        // xyt * (rate - last) / last is the underlying earned; divide by rate for shares
        let denominator = holder
            .last_rate
            .checked_mul(rate)
            .ok_or(YieldError::MathOverflow)?;
        mul_div(
            holder.xyt_balance as u128 * RATE_SCALE,
            rate - holder.last_rate,
            denominator,
        )
    }

    /// Credits `holder` with interest earned by its XYT since its last
    /// checkpoint. Idempotent for an unchanged rate.
    pub fn settle(
        &mut self,
        holder: &mut HolderPosition,
        now: i64,
        current_rate: u128,
        forge_fee_bps: u64,
    ) -> Result<u64> {
        require!(current_rate > 0, YieldError::InvalidRate);
        let rate = self.observe_rate(now, current_rate);

        let interest = self.accrued_interest(holder, rate)?;
        let mut credited = 0u64;
        if interest > 0 {
            let fee = interest * forge_fee_bps as u128 / BPS_DENOMINATOR;
            credited = to_u64(interest - fee)?;

            self.total_fee = self
                .total_fee
                .checked_add(to_u64(fee)?)
                .ok_or(YieldError::MathOverflow)?;
            holder.due_interests = holder
                .due_interests
                .checked_add(credited)
                .ok_or(YieldError::MathOverflow)?;
        }
        holder.last_rate = rate;
        Ok(credited)
    }

    /// Deposits `shares` of the yield-bearing asset, minting OT and XYT equal
    /// to their underlying value.
    pub fn tokenize(
        &mut self,
        holder: &mut HolderPosition,
        shares: u64,
        now: i64,
        current_rate: u128,
        forge_fee_bps: u64,
    ) -> Result<u64> {
        require!(shares > 0, YieldError::InvalidAmount);
        require!(!self.is_expired(now), YieldError::Expired);
        let minted = to_u64(mul_div(shares as u128, current_rate, RATE_SCALE)?)?;
        require!(minted > 0, YieldError::InvalidAmount);

        self.settle(holder, now, current_rate, forge_fee_bps)?;

        holder.ot_balance = holder.ot_balance.checked_add(minted).ok_or(YieldError::MathOverflow)?;
        holder.xyt_balance = holder.xyt_balance.checked_add(minted).ok_or(YieldError::MathOverflow)?;
        self.total_ot = self.total_ot.checked_add(minted).ok_or(YieldError::MathOverflow)?;
        self.total_xyt = self.total_xyt.checked_add(minted).ok_or(YieldError::MathOverflow)?;
        Ok(minted)
    }

    /// Burns `amount` OT and XYT before expiry, returning the principal in
    /// shares together with any due interest.
    pub fn redeem_underlying(
        &mut self,
        holder: &mut HolderPosition,
        amount: u64,
        now: i64,
        current_rate: u128,
        forge_fee_bps: u64,
    ) -> Result<Redemption> {
        require!(amount > 0, YieldError::InvalidAmount);
        require!(!self.is_expired(now), YieldError::Expired);
        require!(
            holder.ot_balance >= amount && holder.xyt_balance >= amount,
            YieldError::InsufficientBalance
        );

        self.settle(holder, now, current_rate, forge_fee_bps)?;

        holder.ot_balance -= amount;
        holder.xyt_balance -= amount;
        self.total_ot -= amount;
        self.total_xyt -= amount;

        let principal = to_u64(mul_div(amount as u128, RATE_SCALE, current_rate)?)?;
        let interest = std::mem::take(&mut holder.due_interests);
        Ok(Redemption { principal, interest })
    }

    /// Pays out all OT held at the rate frozen at expiry plus due interest.
    pub fn redeem_after_expiry(
        &mut self,
        holder: &mut HolderPosition,
        now: i64,
        current_rate: u128,
        forge_fee_bps: u64,
    ) -> Result<Redemption> {
        require!(self.is_expired(now), YieldError::NotExpired);
        let pending = self.accrued_interest(holder, self.effective_rate(now, current_rate))?;
        require!(
            holder.ot_balance > 0 || holder.due_interests > 0 || pending > 0,
            YieldError::InvalidAmount
        );

        self.settle(holder, now, current_rate, forge_fee_bps)?;

        let amount = std::mem::take(&mut holder.ot_balance);
        self.total_ot -= amount;
        let principal = to_u64(mul_div(
            amount as u128,
            RATE_SCALE,
            self.last_rate_before_expiry,
        )?)?;
        let interest = std::mem::take(&mut holder.due_interests);
        Ok(Redemption { principal, interest })
    }

    pub fn redeem_due_interests(
        &mut self,
        holder: &mut HolderPosition,
        now: i64,
        current_rate: u128,
        forge_fee_bps: u64,
    ) -> Result<u64> {
        self.settle(holder, now, current_rate, forge_fee_bps)?;
        Ok(std::mem::take(&mut holder.due_interests))
    }

    pub fn transfer_yield_claim(
        &mut self,
        from: &mut HolderPosition,
        to: &mut HolderPosition,
        amount: u64,
        now: i64,
        current_rate: u128,
        forge_fee_bps: u64,
    ) -> Result<()> {
        require!(amount > 0, YieldError::InvalidAmount);
        require!(from.xyt_balance >= amount, YieldError::InsufficientBalance);

        self.settle(from, now, current_rate, forge_fee_bps)?;
        self.settle(to, now, current_rate, forge_fee_bps)?;

        from.xyt_balance -= amount;
        to.xyt_balance = to.xyt_balance.checked_add(amount).ok_or(YieldError::MathOverflow)?;
        Ok(())
    }

    pub fn transfer_principal(
        &mut self,
        from: &mut HolderPosition,
        to: &mut HolderPosition,
        amount: u64,
        now: i64,
        current_rate: u128,
        forge_fee_bps: u64,
    ) -> Result<()> {
        require!(amount > 0, YieldError::InvalidAmount);
        require!(from.ot_balance >= amount, YieldError::InsufficientBalance);

        self.settle(from, now, current_rate, forge_fee_bps)?;
        self.settle(to, now, current_rate, forge_fee_bps)?;

        from.ot_balance -= amount;
        to.ot_balance = to.ot_balance.checked_add(amount).ok_or(YieldError::MathOverflow)?;
        Ok(())
    }

    pub fn take_forge_fee(&mut self) -> Result<u64> {
        require!(self.total_fee > 0, YieldError::InvalidAmount);
        Ok(std::mem::take(&mut self.total_fee))
    }
}

#[error_code]
pub enum YieldError {
    #[msg("Invalid amount - must be greater than zero")]
    InvalidAmount,
    #[msg("Yield contract has expired")]
    Expired,
    #[msg("Yield contract has not expired yet")]
    NotExpired,
    #[msg("Expiry must be in the future")]
    InvalidExpiry,
    #[msg("Exchange rate must be positive and non-decreasing")]
    InvalidRate,
    #[msg("Insufficient OT or XYT balance")]
    InsufficientBalance,
    #[msg("Position does not belong to this yield contract")]
    InvalidPosition,
    #[msg("Unauthorized")]
    Unauthorized,
    #[msg("Protocol is paused")]
    Paused,
    #[msg("Math overflow")]
    MathOverflow,
}
