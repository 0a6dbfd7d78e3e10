use anchor_lang::prelude::*;
use forge_core::math::mul_div;

/// Allocation numerators of one setting sum to this
pub const TOTAL_NUMERATOR: u64 = 1_000_000_000;
/// Fixed-point scale of `param_l`
pub const PARAM_L_MULTIPLIER: u128 = 100_000_000_000_000_000_000;

pub const MAX_EPOCHS: usize = 52;
pub const MAX_VESTING_EPOCHS: u64 = 12;
pub const MAX_ALLOCATION_SETTINGS: usize = 8;
pub const MAX_ALLOCATION_ENTRIES: usize = 8;
/// Vesting slots per staker, indexed by the epoch a tranche unlocks in
pub const VESTING_SLOTS: usize = MAX_EPOCHS + MAX_VESTING_EPOCHS as usize + 1;

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocationEntry {
    pub expiry: i64,
    pub numerator: u64,
}

/// Split of epoch rewards between expiries, effective from `from_epoch`
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct AllocationSetting {
    pub from_epoch: u64,
    pub entries: Vec<AllocationEntry>,
}

impl AllocationSetting {
    pub const SIZE: usize = 8 + 4 + MAX_ALLOCATION_ENTRIES * 16;

    pub fn numerator_for(&self, expiry: i64) -> u64 {
        self.entries
            .iter()
            .find(|entry| entry.expiry == expiry)
            .map(|entry| entry.numerator)
            .unwrap_or(0)
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug)]
pub struct InitializePoolParams {
    pub pool_id: u64,
    pub start_time: i64,
    pub epoch_duration: i64,
    pub vesting_epochs: u64,
}

impl InitializePoolParams {
    pub fn validate(&self, now: i64) -> Result<()> {
        require!(self.start_time > now, RewardsError::InvalidConfig);
        require!(self.epoch_duration > 0, RewardsError::InvalidConfig);
        require!(
            self.vesting_epochs > 0 && self.vesting_epochs <= MAX_VESTING_EPOCHS,
            RewardsError::InvalidConfig
        );
        Ok(())
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochView {
    pub epoch_id: u64,
    pub start_time: i64,
    pub total_rewards: u64,
    pub setting_from_epoch: u64,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct StakerView {
    pub stake: u64,
    pub claimable_rewards: u64,
    pub locked_rewards: u64,
    pub pending_incentives: u64,
}

/// Epoch schedule shared by every expiry of a liquidity mining program
#[account]
#[derive(Debug)]
pub struct RewardPool {
    pub authority: Pubkey,
    pub reward_mint: Pubkey,
    pub reward_vault: Pubkey,
    pub pool_id: u64,
    pub start_time: i64,
    pub epoch_duration: i64,
    pub vesting_epochs: u64,
    pub rewards_per_epoch: Vec<u64>, // index 0 is epoch 1
    pub allocation_settings: Vec<AllocationSetting>,
    pub skipping_rewards: bool,
    pub paused: bool,
    pub locked: bool, // paused for good
    pub emergency_handler: Option<Pubkey>,
    pub bump: u8,
}

impl RewardPool {
    pub const SIZE: usize = 8 + // discriminator
        32 + // authority
        32 + // reward_mint
        32 + // reward_vault
        8 +  // pool_id
        8 +  // start_time
        8 +  // epoch_duration
        8 +  // vesting_epochs
        4 + MAX_EPOCHS * 8 + // rewards_per_epoch
        4 + MAX_ALLOCATION_SETTINGS * AllocationSetting::SIZE + // allocation_settings
        1 +  // skipping_rewards
        1 +  // paused
        1 +  // locked
        1 + 32 + // emergency_handler
        1;   // bump

    /// 0 before `start_time`, then 1, 2, ...
    pub fn epoch_of(&self, t: i64) -> u64 {
        if t < self.start_time {
            return 0;
        }
        ((t - self.start_time) / self.epoch_duration) as u64 + 1
    }

    pub fn epoch_start(&self, epoch_id: u64) -> i64 {
        self.start_time + (epoch_id.saturating_sub(1) as i64) * self.epoch_duration
    }

    /// Seconds of `[from, to)` falling inside each epoch, in epoch order
    pub fn epoch_overlaps(&self, from: i64, to: i64) -> Vec<(u64, u64)> {
        let from = from.max(self.start_time);
        if to <= from {
            return Vec::new();
        }
        let first = self.epoch_of(from);
        let last = self.epoch_of(to - 1).min(MAX_EPOCHS as u64);
        (first..=last)
            .filter_map(|epoch_id| {
                let start = self.epoch_start(epoch_id);
                let end = start + self.epoch_duration;
                let seconds = to.min(end) - from.max(start);
                (seconds > 0).then_some((epoch_id, seconds as u64))
            })
            .collect()
    }

    pub fn ensure_active(&self) -> Result<()> {
        require!(!self.paused, RewardsError::Paused);
        Ok(())
    }

    pub fn setting_for(&self, epoch_id: u64) -> Option<&AllocationSetting> {
        self.allocation_settings
            .iter()
            .rev()
            .find(|setting| setting.from_epoch <= epoch_id)
    }

    /// Reward of `epoch_id` owed to the stakers of `expiry`
    pub fn reward_for(&self, epoch_id: u64, expiry: i64) -> Result<u128> {
        let total = match epoch_id
            .checked_sub(1)
            .and_then(|i| self.rewards_per_epoch.get(i as usize))
        {
            Some(total) => *total,
            None => return Ok(0),
        };
        let numerator = self
            .setting_for(epoch_id)
            .map(|setting| setting.numerator_for(expiry))
            .unwrap_or(0);
        mul_div(total as u128, numerator as u128, TOTAL_NUMERATOR as u128)
    }

    /// Append epochs to the schedule. Returns the amount to transfer in.
    pub fn fund(&mut self, rewards: &[u64], now: i64) -> Result<u64> {
        require!(!rewards.is_empty(), RewardsError::InvalidArrays);
        require!(
            self.rewards_per_epoch.len() + rewards.len() <= MAX_EPOCHS,
            RewardsError::TooManyEpochs
        );
        // appended epochs must all lie in the future
        require!(
            self.rewards_per_epoch.len() as u64 >= self.epoch_of(now),
            RewardsError::InvalidEpochId
        );
        let total = sum(rewards)?;
        require!(total > 0, RewardsError::ZeroFund);

        self.rewards_per_epoch.extend_from_slice(rewards);
        Ok(total)
    }

    /// Add to future epochs. Returns the amount to transfer in.
    pub fn top_up(&mut self, epoch_ids: &[u64], amounts: &[u64], now: i64) -> Result<u64> {
        require!(
            !epoch_ids.is_empty() && epoch_ids.len() == amounts.len(),
            RewardsError::InvalidArrays
        );
        let current = self.epoch_of(now);
        for epoch_id in epoch_ids {
            require!(
                *epoch_id > current && *epoch_id <= self.rewards_per_epoch.len() as u64,
                RewardsError::InvalidEpochId
            );
        }
        let total = sum(amounts)?;
        require!(total > 0, RewardsError::ZeroFund);

        for (epoch_id, amount) in epoch_ids.iter().zip(amounts) {
            let slot = &mut self.rewards_per_epoch[(*epoch_id - 1) as usize];
            *slot = slot.checked_add(*amount).ok_or(RewardsError::MathOverflow)?;
        }
        Ok(total)
    }

    /// Set the expiry split from the current epoch on. Ended epochs keep the
    /// setting they ran under.
    pub fn set_allocation(&mut self, expiries: &[i64], numerators: &[u64], now: i64) -> Result<()> {
        require!(
            !expiries.is_empty()
                && expiries.len() == numerators.len()
                && expiries.len() <= MAX_ALLOCATION_ENTRIES,
            RewardsError::InvalidArrays
        );
        let total = numerators
            .iter()
            .try_fold(0u64, |acc, n| acc.checked_add(*n))
            .ok_or(RewardsError::InvalidAllocation)?;
        require!(total == TOTAL_NUMERATOR, RewardsError::InvalidAllocation);

        let setting = AllocationSetting {
            from_epoch: self.epoch_of(now).max(1),
            entries: expiries
                .iter()
                .zip(numerators)
                .map(|(expiry, numerator)| AllocationEntry {
                    expiry: *expiry,
                    numerator: *numerator,
                })
                .collect(),
        };
        match self.allocation_settings.last_mut() {
            Some(last) if last.from_epoch == setting.from_epoch => *last = setting,
            _ => {
                require!(
                    self.allocation_settings.len() < MAX_ALLOCATION_SETTINGS,
                    RewardsError::AllocationHistoryFull
                );
                self.allocation_settings.push(setting);
            }
        }
        Ok(())
    }

    pub fn set_paused(&mut self, paused: bool) -> Result<()> {
        require!(!self.locked, RewardsError::Locked);
        self.paused = paused;
        Ok(())
    }

    /// Freeze the pool in the paused state permanently
    pub fn lock(&mut self) -> Result<()> {
        require!(self.paused, RewardsError::NotPaused);
        self.locked = true;
        Ok(())
    }

    pub fn set_up_emergency_mode(&mut self, handler: Pubkey) -> Result<()> {
        require!(self.paused, RewardsError::NotPaused);
        self.emergency_handler = Some(handler);
        self.skipping_rewards = true;
        Ok(())
    }

    pub fn view_epoch(&self, epoch_id: u64) -> Result<EpochView> {
        require!(
            epoch_id >= 1 && epoch_id <= self.rewards_per_epoch.len() as u64,
            RewardsError::InvalidEpochId
        );
        Ok(EpochView {
            epoch_id,
            start_time: self.epoch_start(epoch_id),
            total_rewards: self.rewards_per_epoch[(epoch_id - 1) as usize],
            setting_from_epoch: self
                .setting_for(epoch_id)
                .map(|setting| setting.from_epoch)
                .unwrap_or(0),
        })
    }
}

/// Stakers of one expiry: stake-seconds per epoch plus the `param_l`
/// accumulator of the incentive stream
#[account]
#[derive(Debug)]
pub struct ExpiryPool {
    pub reward_pool: Pubkey,
    pub expiry: i64,
    pub stake_mint: Pubkey,
    pub stake_vault: Pubkey,
    pub total_stake: u64,
    pub last_updated: i64,
    pub epoch_units: Vec<u128>, // index 0 is epoch 1
    pub param_l: u128,
    pub last_param_l_update: i64,
    pub incentive_rate: u64, // per second
    pub incentive_end: i64,
    pub undistributed_incentives: u64,
    pub calls_since_update: u64,
    pub update_frequency: u64,
    pub bump: u8,
}

impl ExpiryPool {
    pub const SIZE: usize = 8 + // discriminator
        32 + // reward_pool
        8 +  // expiry
        32 + // stake_mint
        32 + // stake_vault
        8 +  // total_stake
        8 +  // last_updated
        4 + MAX_EPOCHS * 16 + // epoch_units
        16 + // param_l
        8 +  // last_param_l_update
        8 +  // incentive_rate
        8 +  // incentive_end
        8 +  // undistributed_incentives
        8 +  // calls_since_update
        8 +  // update_frequency
        1;   // bump

    fn accrue_units(&mut self, pool: &RewardPool, now: i64) -> Result<()> {
        for (epoch_id, seconds) in pool.epoch_overlaps(self.last_updated, now) {
            let units = &mut self.epoch_units[(epoch_id - 1) as usize];
            *units = units
                .checked_add(self.total_stake as u128 * seconds as u128)
                .ok_or(RewardsError::MathOverflow)?;
        }
        self.last_updated = self.last_updated.max(now);
        Ok(())
    }

    /// Fold the incentive stream since the last update into `param_l`.
    ///
    /// Runs every `update_frequency` calls unless `force` is set, and never
    /// while rewards are skipped. Returns whether `param_l` was recomputed.
    pub fn update_param_l(&mut self, now: i64, skipping: bool, force: bool) -> Result<bool> {
        if skipping {
            return Ok(false);
        }
        self.calls_since_update += 1;
        if !force && self.calls_since_update < self.update_frequency {
            return Ok(false);
        }
        self.calls_since_update = 0;

        let end = now.min(self.incentive_end);
        if end > self.last_param_l_update {
            let accrued = self.incentive_rate as u128 * (end - self.last_param_l_update) as u128;
            if self.total_stake == 0 {
                self.undistributed_incentives = self
                    .undistributed_incentives
                    .checked_add(u64::try_from(accrued).map_err(|_| RewardsError::MathOverflow)?)
                    .ok_or(RewardsError::MathOverflow)?;
            } else {
                let delta = mul_div(accrued, PARAM_L_MULTIPLIER, self.total_stake as u128)?;
                self.param_l = self
                    .param_l
                    .checked_add(delta)
                    .ok_or(RewardsError::MathOverflow)?;
            }
        }
        self.last_param_l_update = self.last_param_l_update.max(now);
        Ok(true)
    }

    /// Stream `amount` over `duration` seconds from now, on top of what
    /// the current stream has left. While rewards are skipped, whatever the
    /// current stream released since the last update is parked in
    /// `undistributed_incentives` instead of going to stakers.
    pub fn fund_incentives(&mut self, amount: u64, duration: i64, now: i64, skipping: bool) -> Result<()> {
        require!(amount > 0, RewardsError::ZeroFund);
        require!(duration > 0, RewardsError::InvalidConfig);
        if skipping {
            let end = now.min(self.incentive_end);
            if end > self.last_param_l_update {
                let streamed = self.incentive_rate as u128 * (end - self.last_param_l_update) as u128;
                self.undistributed_incentives = self
                    .undistributed_incentives
                    .checked_add(u64::try_from(streamed).map_err(|_| RewardsError::MathOverflow)?)
                    .ok_or(RewardsError::MathOverflow)?;
            }
        } else {
            self.update_param_l(now, skipping, true)?;
        }

        let leftover = if now < self.incentive_end {
            self.incentive_rate as u128 * (self.incentive_end - now) as u128
        } else {
            0
        };
        let total = leftover + amount as u128;
        self.incentive_rate =
            u64::try_from(total / duration as u128).map_err(|_| RewardsError::MathOverflow)?;
        self.incentive_end = now + duration;
        self.last_param_l_update = now;
        Ok(())
    }

    /// Bring the pool and `staker` up to `now`: stake-seconds, ended epoch
    /// rewards and incentive accrual
    pub fn checkpoint(
        &mut self,
        staker: &mut StakerPosition,
        pool: &RewardPool,
        now: i64,
        force: bool,
    ) -> Result<()> {
        self.accrue_units(pool, now)?;
        self.update_param_l(now, pool.skipping_rewards, force)?;
        staker.accrue_units(pool, self, now)?;
        staker.settle_incentives(self.param_l)
    }

    pub fn stake(
        &mut self,
        staker: &mut StakerPosition,
        pool: &RewardPool,
        amount: u64,
        now: i64,
    ) -> Result<()> {
        pool.ensure_active()?;
        require!(amount > 0, RewardsError::InvalidAmount);
        require!(now >= pool.start_time, RewardsError::NotStarted);

        self.checkpoint(staker, pool, now, false)?;
        staker.stake = staker.stake.checked_add(amount).ok_or(RewardsError::MathOverflow)?;
        self.total_stake = self
            .total_stake
            .checked_add(amount)
            .ok_or(RewardsError::MathOverflow)?;
        Ok(())
    }

    pub fn withdraw(
        &mut self,
        staker: &mut StakerPosition,
        pool: &RewardPool,
        amount: u64,
        now: i64,
    ) -> Result<()> {
        pool.ensure_active()?;
        require!(amount > 0, RewardsError::InvalidAmount);
        require!(amount <= staker.stake, RewardsError::InsufficientBalance);

        self.checkpoint(staker, pool, now, false)?;
        staker.stake -= amount;
        self.total_stake -= amount;
        Ok(())
    }

    /// Claim every vested tranche. Returns the amount to pay out.
    pub fn redeem_rewards(
        &mut self,
        staker: &mut StakerPosition,
        pool: &RewardPool,
        now: i64,
    ) -> Result<u64> {
        pool.ensure_active()?;
        self.checkpoint(staker, pool, now, false)?;
        staker.claim_vested(pool.epoch_of(now))
    }

    /// Claim accrued incentives. Returns the amount to pay out.
    pub fn redeem_pending_rewards(
        &mut self,
        staker: &mut StakerPosition,
        pool: &RewardPool,
        now: i64,
    ) -> Result<u64> {
        pool.ensure_active()?;
        self.checkpoint(staker, pool, now, false)?;
        Ok(std::mem::take(&mut staker.pending_incentives))
    }
}

#[account]
#[derive(Debug)]
pub struct StakerPosition {
    pub owner: Pubkey,
    pub expiry_pool: Pubkey,
    pub stake: u64,
    pub last_updated: i64,
    pub units_epoch: u64, // epoch `units` belongs to
    pub units: u128,
    pub vested: Vec<u64>, // unlocked at the start of the indexed epoch
    pub user_param_l: u128,
    pub pending_incentives: u64,
    pub bump: u8,
}

impl StakerPosition {
    pub const SIZE: usize = 8 + // discriminator
        32 + // owner
        32 + // expiry_pool
        8 +  // stake
        8 +  // last_updated
        8 +  // units_epoch
        16 + // units
        4 + VESTING_SLOTS * 8 + // vested
        16 + // user_param_l
        8 +  // pending_incentives
        1;   // bump

    pub fn new(owner: Pubkey, expiry_pool: Pubkey, now: i64, bump: u8) -> Self {
        Self {
            owner,
            expiry_pool,
            stake: 0,
            last_updated: now,
            units_epoch: 0,
            units: 0,
            vested: vec![0; VESTING_SLOTS],
            user_param_l: 0,
            pending_incentives: 0,
            bump,
        }
    }

    // `units_epoch` has ended: split its reward by stake-seconds and queue
    // the share in equal tranches over the following epochs
    fn flush(&mut self, pool: &RewardPool, expiry_pool: &ExpiryPool) -> Result<()> {
        let epoch_id = self.units_epoch;
        if epoch_id == 0 || self.units == 0 {
            return Ok(());
        }
        let total_units = expiry_pool
            .epoch_units
            .get((epoch_id - 1) as usize)
            .copied()
            .unwrap_or(0);
        let reward = pool.reward_for(epoch_id, expiry_pool.expiry)?;
        if total_units == 0 || reward == 0 {
            return Ok(());
        }
        let share = mul_div(reward, self.units, total_units)?;
        let tranche = u64::try_from(share / pool.vesting_epochs as u128)
            .map_err(|_| RewardsError::MathOverflow)?;
        for unlock_epoch in epoch_id + 1..=epoch_id + pool.vesting_epochs {
            let slot = &mut self.vested[unlock_epoch as usize];
            *slot = slot.checked_add(tranche).ok_or(RewardsError::MathOverflow)?;
        }
        Ok(())
    }

    fn accrue_units(&mut self, pool: &RewardPool, expiry_pool: &ExpiryPool, now: i64) -> Result<()> {
        for (epoch_id, seconds) in pool.epoch_overlaps(self.last_updated, now) {
            if epoch_id != self.units_epoch {
                self.flush(pool, expiry_pool)?;
                self.units_epoch = epoch_id;
                self.units = 0;
            }
            self.units += self.stake as u128 * seconds as u128;
        }
        let current = pool.epoch_of(now).min(MAX_EPOCHS as u64 + 1);
        if current > self.units_epoch {
            self.flush(pool, expiry_pool)?;
            self.units_epoch = current;
            self.units = 0;
        }
        self.last_updated = self.last_updated.max(now);
        Ok(())
    }

    fn settle_incentives(&mut self, param_l: u128) -> Result<()> {
        let delta = param_l.saturating_sub(self.user_param_l);
        let accrued = mul_div(self.stake as u128, delta, PARAM_L_MULTIPLIER)?;
        self.pending_incentives = self
            .pending_incentives
            .checked_add(u64::try_from(accrued).map_err(|_| RewardsError::MathOverflow)?)
            .ok_or(RewardsError::MathOverflow)?;
        self.user_param_l = param_l;
        Ok(())
    }

    fn unlocked_slots(&self, current_epoch: u64) -> usize {
        (current_epoch as usize + 1).min(self.vested.len())
    }

    pub fn claim_vested(&mut self, current_epoch: u64) -> Result<u64> {
        let unlocked = self.unlocked_slots(current_epoch);
        let mut total = 0u64;
        for slot in self.vested[..unlocked].iter_mut() {
            total = total
                .checked_add(std::mem::take(slot))
                .ok_or(RewardsError::MathOverflow)?;
        }
        Ok(total)
    }

    pub fn view(&self, current_epoch: u64) -> StakerView {
        let unlocked = self.unlocked_slots(current_epoch);
        StakerView {
            stake: self.stake,
            claimable_rewards: self.vested[..unlocked].iter().sum(),
            locked_rewards: self.vested[unlocked..].iter().sum(),
            pending_incentives: self.pending_incentives,
        }
    }
}

fn sum(amounts: &[u64]) -> Result<u64> {
    amounts
        .iter()
        .try_fold(0u64, |acc, amount| acc.checked_add(*amount))
        .ok_or_else(|| RewardsError::MathOverflow.into())
}

#[error_code]
pub enum RewardsError {
    #[msg("Array lengths do not match")]
    InvalidArrays,
    #[msg("Epoch id is in the past or beyond the schedule")]
    InvalidEpochId,
    #[msg("Funding amount is zero")]
    ZeroFund,
    #[msg("Allocation numerators must sum to the total")]
    InvalidAllocation,
    #[msg("Allocation setting history is full")]
    AllocationHistoryFull,
    #[msg("Too many epochs")]
    TooManyEpochs,
    #[msg("Liquidity mining has not started")]
    NotStarted,
    #[msg("Invalid amount")]
    InvalidAmount,
    #[msg("Insufficient stake")]
    InsufficientBalance,
    #[msg("Pool is paused")]
    Paused,
    #[msg("Pool is locked")]
    Locked,
    #[msg("Pool must be paused first")]
    NotPaused,
    #[msg("Unauthorized access")]
    Unauthorized,
    #[msg("Invalid configuration")]
    InvalidConfig,
    #[msg("Expiry pool not found")]
    NotFound,
    #[msg("Math overflow")]
    MathOverflow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const T0: i64 = 4_000_000_000;
    const EPOCH_DURATION: i64 = 864_000; // 10 days
    const START: i64 = T0 + 1000;
    const VESTING: u64 = 4;
    const EXPIRY: i64 = T0 + 2_592_000 * 6;

    fn reward_pool(epochs: usize, epoch_duration: i64) -> RewardPool {
        let mut pool = RewardPool {
            authority: Pubkey::new_unique(),
            reward_mint: Pubkey::new_unique(),
            reward_vault: Pubkey::new_unique(),
            pool_id: 0,
            start_time: START,
            epoch_duration,
            vesting_epochs: VESTING,
            rewards_per_epoch: vec![],
            allocation_settings: vec![],
            skipping_rewards: false,
            paused: false,
            locked: false,
            emergency_handler: None,
            bump: 0,
        };
        let rewards: Vec<u64> = (0..epochs as u64).map(|i| 10_000_000_000 * (i + 1)).collect();
        pool.fund(&rewards, T0).unwrap();
        pool.set_allocation(&[EXPIRY], &[TOTAL_NUMERATOR], T0).unwrap();
        pool
    }

    fn expiry_pool(pool: &RewardPool) -> ExpiryPool {
        ExpiryPool {
            reward_pool: Pubkey::new_unique(),
            expiry: EXPIRY,
            stake_mint: Pubkey::new_unique(),
            stake_vault: Pubkey::new_unique(),
            total_stake: 0,
            last_updated: pool.start_time,
            epoch_units: vec![0; MAX_EPOCHS],
            param_l: 0,
            last_param_l_update: pool.start_time,
            incentive_rate: 0,
            incentive_end: 0,
            undistributed_incentives: 0,
            calls_since_update: 0,
            update_frequency: 1,
            bump: 0,
        }
    }

    fn staker() -> StakerPosition {
        StakerPosition::new(Pubkey::new_unique(), Pubkey::new_unique(), T0, 0)
    }

    #[test]
    fn epochs_are_numbered_from_start() {
        let pool = reward_pool(30, EPOCH_DURATION);
        assert_eq!(pool.epoch_of(START - 1), 0);
        assert_eq!(pool.epoch_of(START), 1);
        assert_eq!(pool.epoch_of(START + EPOCH_DURATION - 1), 1);
        assert_eq!(pool.epoch_of(START + EPOCH_DURATION), 2);
        assert_eq!(
            pool.epoch_overlaps(START - 10, START + EPOCH_DURATION + 5),
            vec![(1, EPOCH_DURATION as u64), (2, 5)]
        );
    }

    #[test]
    fn top_up_raises_future_epochs_only() {
        let mut pool = reward_pool(30, EPOCH_DURATION);
        let now = START + 1;
        let ids = [2u64, 6, 9, 12];
        let amounts = [1_000_000_000u64, 1_000_000_000, 2_000_000_000, 3_000_000_000];

        let total = pool.top_up(&ids, &amounts, now).unwrap();
        assert_eq!(total, 7_000_000_000);
        for (id, amount) in ids.iter().zip(amounts) {
            let base = 10_000_000_000 * id;
            assert_eq!(pool.view_epoch(*id).unwrap().total_rewards, base + amount);
        }

        let before = pool.rewards_per_epoch.clone();
        assert_eq!(
            pool.top_up(&[1], &[1_000_000_000], now).unwrap_err(),
            RewardsError::InvalidEpochId.into()
        );
        assert_eq!(
            pool.top_up(&[99], &[1_000_000_000], now).unwrap_err(),
            RewardsError::InvalidEpochId.into()
        );
        assert_eq!(
            pool.top_up(&[2, 6], &[1_000_000_000], now).unwrap_err(),
            RewardsError::InvalidArrays.into()
        );
        assert_eq!(
            pool.top_up(&[3, 99], &[1, 1], now).unwrap_err(),
            RewardsError::InvalidEpochId.into()
        );
        assert_eq!(pool.top_up(&[3], &[0], now).unwrap_err(), RewardsError::ZeroFund.into());
        assert_eq!(pool.rewards_per_epoch, before);
    }

    #[test]
    fn fund_appends_future_epochs() {
        let mut pool = reward_pool(3, EPOCH_DURATION);
        pool.fund(&[5, 6], START).unwrap();
        assert_eq!(pool.rewards_per_epoch.len(), 5);
        assert_eq!(pool.view_epoch(5).unwrap().total_rewards, 6);

        assert_eq!(pool.fund(&[0, 0], START).unwrap_err(), RewardsError::ZeroFund.into());
        // epoch 6 would already be running
        assert_eq!(
            pool.fund(&[1], START + 5 * EPOCH_DURATION).unwrap_err(),
            RewardsError::InvalidEpochId.into()
        );
    }

    #[test]
    fn allocation_settings_are_snapshotted() {
        let mut pool = reward_pool(30, EPOCH_DURATION);
        let other = EXPIRY + 1;
        assert_eq!(
            pool.set_allocation(&[EXPIRY, other], &[500_000_000, 400_000_000], START)
                .unwrap_err(),
            RewardsError::InvalidAllocation.into()
        );
        assert_eq!(
            pool.set_allocation(&[EXPIRY, other], &[TOTAL_NUMERATOR], START)
                .unwrap_err(),
            RewardsError::InvalidArrays.into()
        );

        pool.set_allocation(&[EXPIRY, other], &[250_000_000, 750_000_000], START + 2 * EPOCH_DURATION)
            .unwrap();
        assert_eq!(pool.reward_for(2, EXPIRY).unwrap(), 20_000_000_000);
        assert_eq!(pool.reward_for(3, EXPIRY).unwrap(), 7_500_000_000);
        assert_eq!(pool.reward_for(3, other).unwrap(), 22_500_000_000);
        assert_eq!(pool.view_epoch(3).unwrap().setting_from_epoch, 3);
    }

    #[test]
    fn epoch_reward_splits_by_stake_seconds_and_vests() {
        let pool = reward_pool(30, EPOCH_DURATION);
        let mut ep = expiry_pool(&pool);
        let (mut alice, mut bob) = (staker(), staker());

        ep.stake(&mut alice, &pool, 100, START).unwrap();
        ep.stake(&mut bob, &pool, 300, START + EPOCH_DURATION / 2).unwrap();

        // epoch 1 reward is 1e10: alice holds 100 * D of 250 * D stake-seconds
        let epoch2 = START + EPOCH_DURATION;
        assert_eq!(ep.redeem_rewards(&mut alice, &pool, epoch2).unwrap(), 1_000_000_000);
        assert_eq!(ep.redeem_rewards(&mut bob, &pool, epoch2).unwrap(), 1_500_000_000);
        assert_eq!(ep.redeem_rewards(&mut alice, &pool, epoch2 + 10).unwrap(), 0);

        let view = bob.view(pool.epoch_of(epoch2));
        assert_eq!(view.claimable_rewards, 0);
        assert_eq!(view.locked_rewards, 4_500_000_000);
    }

    #[test]
    fn stake_and_withdraw_preconditions() {
        let pool = reward_pool(30, EPOCH_DURATION);
        let mut ep = expiry_pool(&pool);
        let mut alice = staker();

        assert_eq!(
            ep.stake(&mut alice, &pool, 100, START - 1).unwrap_err(),
            RewardsError::NotStarted.into()
        );
        ep.stake(&mut alice, &pool, 100, START).unwrap();
        assert_eq!(
            ep.withdraw(&mut alice, &pool, 101, START + 5).unwrap_err(),
            RewardsError::InsufficientBalance.into()
        );
        ep.withdraw(&mut alice, &pool, 40, START + 5).unwrap();
        assert_eq!((alice.stake, ep.total_stake), (60, 60));
    }

    #[test]
    fn paused_pool_rejects_everything() {
        let mut pool = reward_pool(30, EPOCH_DURATION);
        let mut ep = expiry_pool(&pool);
        let mut alice = staker();
        ep.stake(&mut alice, &pool, 100, START).unwrap();

        pool.set_paused(true).unwrap();
        assert_eq!(
            ep.withdraw(&mut alice, &pool, 100, START + 1).unwrap_err(),
            RewardsError::Paused.into()
        );
        assert_eq!(
            ep.redeem_rewards(&mut alice, &pool, START + 1).unwrap_err(),
            RewardsError::Paused.into()
        );

        pool.lock().unwrap();
        assert_eq!(pool.set_paused(false).unwrap_err(), RewardsError::Locked.into());
        pool.set_up_emergency_mode(Pubkey::new_unique()).unwrap();
        assert!(pool.skipping_rewards);
    }

    #[test]
    fn incentives_accrue_into_param_l() {
        let pool = reward_pool(30, EPOCH_DURATION);
        let mut ep = expiry_pool(&pool);
        let (mut alice, mut bob) = (staker(), staker());

        ep.fund_incentives(1_000_000, 1_000, START, false).unwrap();
        assert_eq!(ep.incentive_rate, 1_000);

        ep.stake(&mut alice, &pool, 100, START).unwrap();
        ep.stake(&mut bob, &pool, 300, START + 100).unwrap();
        assert_eq!(ep.redeem_pending_rewards(&mut alice, &pool, START + 500).unwrap(), 200_000);
        assert_eq!(ep.redeem_pending_rewards(&mut bob, &pool, START + 500).unwrap(), 300_000);

        // stream ends at START + 1000
        assert_eq!(ep.redeem_pending_rewards(&mut bob, &pool, START + 5_000).unwrap(), 375_000);
    }

    #[test]
    fn incentives_without_stake_are_undistributed() {
        let pool = reward_pool(30, EPOCH_DURATION);
        let mut ep = expiry_pool(&pool);
        ep.fund_incentives(1_000_000, 1_000, START, false).unwrap();
        assert!(ep.update_param_l(START + 250, false, false).unwrap());
        assert_eq!(ep.undistributed_incentives, 250_000);
        assert_eq!(ep.param_l, 0);
    }

    #[test]
    fn update_frequency_throttles_param_l() {
        let pool = reward_pool(30, EPOCH_DURATION);
        let mut ep = expiry_pool(&pool);
        let mut alice = staker();
        ep.fund_incentives(1_000_000, 1_000, START, false).unwrap();
        ep.stake(&mut alice, &pool, 100, START).unwrap();

        ep.update_frequency = 3;
        assert!(!ep.update_param_l(START + 10, false, false).unwrap());
        assert!(!ep.update_param_l(START + 20, false, false).unwrap());
        assert_eq!(ep.param_l, 0);
        assert!(ep.update_param_l(START + 30, false, false).unwrap());
        let after_third = ep.param_l;
        assert_eq!(after_third, 30_000 * PARAM_L_MULTIPLIER / 100);

        // forcing bypasses the counter
        assert!(ep.update_param_l(START + 40, false, true).unwrap());
        assert!(ep.param_l > after_third);
    }

    #[test]
    fn skipping_rewards_freezes_param_l() {
        let mut pool = reward_pool(30, EPOCH_DURATION);
        let mut ep = expiry_pool(&pool);
        let (mut alice, mut bob) = (staker(), staker());
        ep.fund_incentives(1_000_000, 1_000, START, false).unwrap();
        ep.stake(&mut alice, &pool, 100, START).unwrap();
        ep.stake(&mut bob, &pool, 100, START + 10).unwrap();

        pool.skipping_rewards = true;
        let frozen = ep.param_l;
        ep.stake(&mut alice, &pool, 50, START + 20).unwrap();
        ep.withdraw(&mut bob, &pool, 60, START + 30).unwrap();
        ep.update_param_l(START + 40, pool.skipping_rewards, true).unwrap();
        ep.fund_incentives(1_000, 10, START + 50, pool.skipping_rewards)
            .unwrap();

        assert_eq!(ep.param_l, frozen);
        assert_eq!((alice.stake, bob.stake), (150, 40));
    }

    #[test]
    fn funding_while_skipping_parks_streamed_incentives() {
        let mut pool = reward_pool(30, EPOCH_DURATION);
        let mut ep = expiry_pool(&pool);
        let mut alice = staker();
        ep.fund_incentives(1_000_000, 1_000, START, false).unwrap();
        ep.stake(&mut alice, &pool, 100, START).unwrap();

        pool.skipping_rewards = true;
        let frozen = ep.param_l;
        ep.fund_incentives(500_000, 1_000, START + 100, pool.skipping_rewards)
            .unwrap();

        // 100 seconds at 1_000 per second went out while skipping
        assert_eq!(ep.undistributed_incentives, 100_000);
        assert_eq!(ep.param_l, frozen);
        assert_eq!(ep.last_param_l_update, START + 100);
        // 900_000 left in the old stream plus the new 500_000
        assert_eq!(ep.incentive_rate, 1_400);
        assert_eq!(ep.incentive_end, START + 1_100);
    }

    #[derive(Clone, Debug)]
    struct Action {
        user: usize,
        deposit: bool,
        amount: u64,
        wait: i64,
    }

    fn action() -> impl Strategy<Value = Action> {
        (0..3usize, any::<bool>(), 1..1_000_000u64, 1..150i64).prop_map(
            |(user, deposit, amount, wait)| Action {
                user,
                deposit,
                amount,
                wait,
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn rewards_follow_time_weighted_stake(actions in prop::collection::vec(action(), 1..60)) {
            const DURATION: i64 = 100;
            const EPOCHS: usize = 10;
            let pool = reward_pool(EPOCHS, DURATION);
            let mut ep = expiry_pool(&pool);
            let mut stakers = vec![staker(), staker(), staker()];

            // independent ledger of stake-seconds per (epoch, user)
            let mut units = vec![[0u128; 3]; EPOCHS + 1];
            let mut stakes = [0u64; 3];
            let mut tally = |stakes: &[u64; 3], from: i64, to: i64| {
                for t in from..to {
                    let epoch = ((t - START) / DURATION) as usize + 1;
                    if epoch <= EPOCHS {
                        for user in 0..3 {
                            units[epoch][user] += stakes[user] as u128;
                        }
                    }
                }
            };

            let mut now = START;
            for a in &actions {
                let amount = if a.deposit { a.amount } else { a.amount.min(stakes[a.user]) };
                if amount > 0 {
                    if a.deposit {
                        ep.stake(&mut stakers[a.user], &pool, amount, now).unwrap();
                        stakes[a.user] += amount;
                    } else {
                        ep.withdraw(&mut stakers[a.user], &pool, amount, now).unwrap();
                        stakes[a.user] -= amount;
                    }
                }
                tally(&stakes, now, now + a.wait);
                now += a.wait;
            }
            let end = START + (EPOCHS as i64 + VESTING as i64) * DURATION;
            tally(&stakes, now.min(end), end);

            for user in 0..3 {
                let claimed = ep.redeem_rewards(&mut stakers[user], &pool, end).unwrap();
                let mut expected = 0u128;
                for epoch in 1..=EPOCHS {
                    let total: u128 = units[epoch].iter().sum();
                    if total == 0 {
                        continue;
                    }
                    let reward = pool.reward_for(epoch as u64, EXPIRY).unwrap();
                    let share = reward * units[epoch][user] / total;
                    expected += share / VESTING as u128 * VESTING as u128;
                }
                prop_assert!((claimed as i128 - expected as i128).abs() <= 10);
            }
        }
    }
}
