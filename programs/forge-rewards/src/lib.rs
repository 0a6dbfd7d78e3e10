use anchor_lang::prelude::*;
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer};
use forge_core::{ForgeProtocol, FORGE_PROTOCOL_SEED};

pub mod state;

use state::*;

declare_id!("3UPgC2UJ6odJwWPBqDEx19ycL5ccuS3mbF1pt5SU39dx");

pub const REWARD_POOL_SEED: &[u8] = b"reward_pool";
pub const REWARD_VAULT_SEED: &[u8] = b"reward_vault";
pub const EXPIRY_POOL_SEED: &[u8] = b"expiry_pool";
pub const STAKE_VAULT_SEED: &[u8] = b"stake_vault";
pub const STAKER_SEED: &[u8] = b"staker";

// Every vault of a pool is owned by the reward pool PDA
fn transfer_from_vault<'info>(
    reward_pool: &Account<'info, RewardPool>,
    vault: &Account<'info, TokenAccount>,
    to: &Account<'info, TokenAccount>,
    token_program: &Program<'info, Token>,
    amount: u64,
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }
    let pool_id = reward_pool.pool_id.to_le_bytes();
    let seeds: &[&[u8]] = &[
        REWARD_POOL_SEED,
        reward_pool.reward_mint.as_ref(),
        pool_id.as_ref(),
        &[reward_pool.bump],
    ];
    let signer = &[seeds];
    let cpi_accounts = Transfer {
        from: vault.to_account_info(),
        to: to.to_account_info(),
        authority: reward_pool.to_account_info(),
    };
    token::transfer(
        CpiContext::new_with_signer(token_program.to_account_info(), cpi_accounts, signer),
        amount,
    )
}

fn transfer_to_vault<'info>(
    from: &Account<'info, TokenAccount>,
    vault: &Account<'info, TokenAccount>,
    authority: &Signer<'info>,
    token_program: &Program<'info, Token>,
    amount: u64,
) -> Result<()> {
    let cpi_accounts = Transfer {
        from: from.to_account_info(),
        to: vault.to_account_info(),
        authority: authority.to_account_info(),
    };
    token::transfer(
        CpiContext::new(token_program.to_account_info(), cpi_accounts),
        amount,
    )
}

#[program]
pub mod forge_rewards {
    use super::*;

    /// Create a liquidity mining pool paying `reward_mint`
    pub fn initialize_pool(ctx: Context<InitializePool>, params: InitializePoolParams) -> Result<()> {
        require!(ctx.accounts.forge_protocol.is_active, RewardsError::Paused);
        let now = Clock::get()?.unix_timestamp;
        params.validate(now)?;

        let reward_pool = &mut ctx.accounts.reward_pool;
        reward_pool.authority = ctx.accounts.authority.key();
        reward_pool.reward_mint = ctx.accounts.reward_mint.key();
        reward_pool.reward_vault = ctx.accounts.reward_vault.key();
        reward_pool.pool_id = params.pool_id;
        reward_pool.start_time = params.start_time;
        reward_pool.epoch_duration = params.epoch_duration;
        reward_pool.vesting_epochs = params.vesting_epochs;
        reward_pool.rewards_per_epoch = Vec::new();
        reward_pool.allocation_settings = Vec::new();
        reward_pool.skipping_rewards = false;
        reward_pool.paused = false;
        reward_pool.locked = false;
        reward_pool.emergency_handler = None;
        reward_pool.bump = ctx.bumps.reward_pool;

        msg!(
            "Reward pool {} initialized: start {}, epoch {}s, vesting {} epochs",
            params.pool_id,
            params.start_time,
            params.epoch_duration,
            params.vesting_epochs
        );
        Ok(())
    }

    /// Append epochs to the reward schedule
    pub fn fund(ctx: Context<FundPool>, rewards: Vec<u64>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let reward_pool = &mut ctx.accounts.reward_pool;
        reward_pool.ensure_active()?;
        let total = reward_pool.fund(&rewards, now)?;
        let epochs = reward_pool.rewards_per_epoch.len() as u64;

        transfer_to_vault(
            &ctx.accounts.funder_token_account,
            &ctx.accounts.reward_vault,
            &ctx.accounts.authority,
            &ctx.accounts.token_program,
            total,
        )?;

        emit!(Funded {
            reward_pool: ctx.accounts.reward_pool.key(),
            epochs,
            amount: total,
        });
        Ok(())
    }

    pub fn top_up_rewards(ctx: Context<FundPool>, epoch_ids: Vec<u64>, amounts: Vec<u64>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let reward_pool = &mut ctx.accounts.reward_pool;
        reward_pool.ensure_active()?;
        let total = reward_pool.top_up(&epoch_ids, &amounts, now)?;

        transfer_to_vault(
            &ctx.accounts.funder_token_account,
            &ctx.accounts.reward_vault,
            &ctx.accounts.authority,
            &ctx.accounts.token_program,
            total,
        )?;

        emit!(RewardsToppedUp {
            reward_pool: ctx.accounts.reward_pool.key(),
            epoch_ids,
            amounts,
        });
        Ok(())
    }

    pub fn set_allocation_setting(
        ctx: Context<AdminPool>,
        expiries: Vec<i64>,
        numerators: Vec<u64>,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let reward_pool = &mut ctx.accounts.reward_pool;
        reward_pool.set_allocation(&expiries, &numerators, now)?;
        let from_epoch = reward_pool.epoch_of(now).max(1);

        emit!(AllocationSettingUpdated {
            reward_pool: reward_pool.key(),
            from_epoch,
            expiries,
            numerators,
        });
        Ok(())
    }

    /// Open staking for the LP token of the market expiring at `expiry`
    pub fn add_expiry(ctx: Context<AddExpiry>, expiry: i64) -> Result<()> {
        let start_time = ctx.accounts.reward_pool.start_time;
        let expiry_pool = &mut ctx.accounts.expiry_pool;
        expiry_pool.reward_pool = ctx.accounts.reward_pool.key();
        expiry_pool.expiry = expiry;
        expiry_pool.stake_mint = ctx.accounts.stake_mint.key();
        expiry_pool.stake_vault = ctx.accounts.stake_vault.key();
        expiry_pool.total_stake = 0;
        expiry_pool.last_updated = start_time;
        expiry_pool.epoch_units = vec![0; MAX_EPOCHS];
        expiry_pool.param_l = 0;
        expiry_pool.last_param_l_update = start_time;
        expiry_pool.incentive_rate = 0;
        expiry_pool.incentive_end = 0;
        expiry_pool.undistributed_incentives = 0;
        expiry_pool.calls_since_update = 0;
        expiry_pool.update_frequency = 1;
        expiry_pool.bump = ctx.bumps.expiry_pool;

        msg!("Expiry {} added, staking {}", expiry, expiry_pool.stake_mint);
        Ok(())
    }

    /// Set how many calls an expiry pool lets pass between `param_l`
    /// recomputations. Expiry pools are passed as remaining accounts.
    pub fn set_update_frequency<'info>(
        ctx: Context<'_, '_, 'info, 'info, AdminPool<'info>>,
        expiries: Vec<i64>,
        frequencies: Vec<u64>,
    ) -> Result<()> {
        require!(
            expiries.len() == frequencies.len() && expiries.len() == ctx.remaining_accounts.len(),
            RewardsError::InvalidArrays
        );
        require!(frequencies.iter().all(|f| *f > 0), RewardsError::InvalidConfig);

        let reward_pool_key = ctx.accounts.reward_pool.key();
        for ((expiry, frequency), info) in expiries
            .iter()
            .zip(&frequencies)
            .zip(ctx.remaining_accounts.iter())
        {
            let mut expiry_pool: Account<ExpiryPool> = Account::try_from(info)?;
            require!(
                expiry_pool.reward_pool == reward_pool_key && expiry_pool.expiry == *expiry,
                RewardsError::NotFound
            );
            expiry_pool.update_frequency = *frequency;
            expiry_pool.exit(&crate::ID)?;
        }
        Ok(())
    }

    pub fn set_skipping_rewards(ctx: Context<AdminPool>, skipping: bool) -> Result<()> {
        ctx.accounts.reward_pool.skipping_rewards = skipping;
        msg!("Skipping rewards: {}", skipping);
        Ok(())
    }

    pub fn set_paused(ctx: Context<AdminPool>, paused: bool) -> Result<()> {
        ctx.accounts.reward_pool.set_paused(paused)?;
        msg!("Reward pool paused: {}", paused);
        Ok(())
    }

    /// Keep a paused pool paused for good
    pub fn set_locked(ctx: Context<AdminPool>) -> Result<()> {
        ctx.accounts.reward_pool.lock()?;
        msg!("Reward pool locked");
        Ok(())
    }

    pub fn set_up_emergency_mode(ctx: Context<AdminPool>, handler: Pubkey) -> Result<()> {
        let reward_pool = &mut ctx.accounts.reward_pool;
        reward_pool.set_up_emergency_mode(handler)?;

        emit!(EmergencyModeSet {
            reward_pool: reward_pool.key(),
            handler,
        });
        Ok(())
    }

    /// Move tokens out of any vault of the pool to the emergency handler
    pub fn emergency_sweep(ctx: Context<EmergencySweep>, amount: u64) -> Result<()> {
        let reward_pool = &ctx.accounts.reward_pool;
        require!(reward_pool.paused, RewardsError::NotPaused);
        require!(
            reward_pool.emergency_handler == Some(ctx.accounts.handler.key()),
            RewardsError::Unauthorized
        );
        require!(amount <= ctx.accounts.vault.amount, RewardsError::InsufficientBalance);

        transfer_from_vault(
            reward_pool,
            &ctx.accounts.vault,
            &ctx.accounts.destination,
            &ctx.accounts.token_program,
            amount,
        )?;
        msg!("Emergency sweep of {} from {}", amount, ctx.accounts.vault.key());
        Ok(())
    }

    /// Stream `amount` of reward tokens to the stakers of one expiry over
    /// `duration` seconds
    pub fn fund_incentives(ctx: Context<FundIncentives>, amount: u64, duration: i64) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let reward_pool = &ctx.accounts.reward_pool;
        reward_pool.ensure_active()?;
        ctx.accounts
            .expiry_pool
            .fund_incentives(amount, duration, now, reward_pool.skipping_rewards)?;

        transfer_to_vault(
            &ctx.accounts.funder_token_account,
            &ctx.accounts.reward_vault,
            &ctx.accounts.authority,
            &ctx.accounts.token_program,
            amount,
        )
    }

    /// Stake LP tokens on behalf of `beneficiary`
    pub fn stake_for(ctx: Context<Stake>, beneficiary: Pubkey, amount: u64) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let expiry_pool_key = ctx.accounts.expiry_pool.key();
        let staker = &mut ctx.accounts.staker_position;
        if staker.owner == Pubkey::default() {
            staker.set_inner(StakerPosition::new(
                beneficiary,
                expiry_pool_key,
                now,
                ctx.bumps.staker_position,
            ));
        }
        ctx.accounts
            .expiry_pool
            .stake(staker, &ctx.accounts.reward_pool, amount, now)?;

        transfer_to_vault(
            &ctx.accounts.payer_stake_account,
            &ctx.accounts.stake_vault,
            &ctx.accounts.payer,
            &ctx.accounts.token_program,
            amount,
        )?;

        emit!(Staked {
            expiry_pool: expiry_pool_key,
            staker: beneficiary,
            amount,
            total_stake: ctx.accounts.expiry_pool.total_stake,
        });
        Ok(())
    }

    /// Unstake LP tokens to `destination`
    pub fn withdraw_to(ctx: Context<Withdraw>, amount: u64) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        ctx.accounts.expiry_pool.withdraw(
            &mut ctx.accounts.staker_position,
            &ctx.accounts.reward_pool,
            amount,
            now,
        )?;

        transfer_from_vault(
            &ctx.accounts.reward_pool,
            &ctx.accounts.stake_vault,
            &ctx.accounts.destination,
            &ctx.accounts.token_program,
            amount,
        )?;

        emit!(Withdrawn {
            expiry_pool: ctx.accounts.expiry_pool.key(),
            staker: ctx.accounts.user.key(),
            amount,
            total_stake: ctx.accounts.expiry_pool.total_stake,
        });
        Ok(())
    }

    /// Claim vested epoch rewards
    pub fn redeem_rewards(ctx: Context<Redeem>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let amount = ctx.accounts.expiry_pool.redeem_rewards(
            &mut ctx.accounts.staker_position,
            &ctx.accounts.reward_pool,
            now,
        )?;

        transfer_from_vault(
            &ctx.accounts.reward_pool,
            &ctx.accounts.reward_vault,
            &ctx.accounts.user_reward_account,
            &ctx.accounts.token_program,
            amount,
        )?;

        emit!(RewardsRedeemed {
            expiry_pool: ctx.accounts.expiry_pool.key(),
            staker: ctx.accounts.user.key(),
            amount,
        });
        Ok(())
    }

    /// Claim incentives accrued through `param_l`
    pub fn redeem_pending_rewards(ctx: Context<Redeem>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let amount = ctx.accounts.expiry_pool.redeem_pending_rewards(
            &mut ctx.accounts.staker_position,
            &ctx.accounts.reward_pool,
            now,
        )?;

        transfer_from_vault(
            &ctx.accounts.reward_pool,
            &ctx.accounts.reward_vault,
            &ctx.accounts.user_reward_account,
            &ctx.accounts.token_program,
            amount,
        )?;

        emit!(IncentivesRedeemed {
            expiry_pool: ctx.accounts.expiry_pool.key(),
            staker: ctx.accounts.user.key(),
            amount,
        });
        Ok(())
    }

    /// Recompute `param_l` now, ignoring the update frequency
    pub fn update_param_l_manual(ctx: Context<UpdateParamL>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let reward_pool = &ctx.accounts.reward_pool;
        reward_pool.ensure_active()?;
        ctx.accounts
            .expiry_pool
            .update_param_l(now, reward_pool.skipping_rewards, true)?;
        Ok(())
    }

    pub fn read_epoch_data(ctx: Context<ReadPool>, epoch_id: u64) -> Result<EpochView> {
        ctx.accounts.reward_pool.view_epoch(epoch_id)
    }

    /// Staker balances as they would stand after a checkpoint now
    pub fn read_staker_data(ctx: Context<ReadStaker>) -> Result<StakerView> {
        let now = Clock::get()?.unix_timestamp;
        let reward_pool = &ctx.accounts.reward_pool;
        let mut expiry_pool = (*ctx.accounts.expiry_pool).clone();
        let mut staker = (*ctx.accounts.staker_position).clone();
        expiry_pool.checkpoint(&mut staker, reward_pool, now, true)?;
        Ok(staker.view(reward_pool.epoch_of(now)))
    }

    pub fn current_epoch_id(ctx: Context<ReadPool>) -> Result<u64> {
        let now = Clock::get()?.unix_timestamp;
        Ok(ctx.accounts.reward_pool.epoch_of(now))
    }
}

#[derive(Accounts)]
#[instruction(params: InitializePoolParams)]
pub struct InitializePool<'info> {
    #[account(
        seeds = [FORGE_PROTOCOL_SEED],
        bump = forge_protocol.bump,
        seeds::program = forge_core::ID,
        has_one = authority,
        constraint = forge_protocol.rewards_program == crate::ID @ RewardsError::Unauthorized
    )]
    pub forge_protocol: Box<Account<'info, ForgeProtocol>>,

    #[account(
        init,
        payer = authority,
        space = RewardPool::SIZE,
        seeds = [REWARD_POOL_SEED, reward_mint.key().as_ref(), params.pool_id.to_le_bytes().as_ref()],
        bump
    )]
    pub reward_pool: Account<'info, RewardPool>,

    pub reward_mint: Account<'info, Mint>,

    #[account(
        init,
        payer = authority,
        token::mint = reward_mint,
        token::authority = reward_pool,
        seeds = [REWARD_VAULT_SEED, reward_pool.key().as_ref()],
        bump
    )]
    pub reward_vault: Account<'info, TokenAccount>,

    #[account(mut)]
    pub authority: Signer<'info>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
    pub rent: Sysvar<'info, Rent>,
}

#[derive(Accounts)]
pub struct FundPool<'info> {
    #[account(mut, has_one = authority, has_one = reward_vault)]
    pub reward_pool: Account<'info, RewardPool>,

    #[account(mut)]
    pub reward_vault: Account<'info, TokenAccount>,

    #[account(mut, constraint = funder_token_account.owner == authority.key())]
    pub funder_token_account: Account<'info, TokenAccount>,

    pub authority: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct AdminPool<'info> {
    #[account(mut, has_one = authority)]
    pub reward_pool: Account<'info, RewardPool>,

    pub authority: Signer<'info>,
}

#[derive(Accounts)]
#[instruction(expiry: i64)]
pub struct AddExpiry<'info> {
    #[account(has_one = authority)]
    pub reward_pool: Account<'info, RewardPool>,

    #[account(
        init,
        payer = authority,
        space = ExpiryPool::SIZE,
        seeds = [EXPIRY_POOL_SEED, reward_pool.key().as_ref(), expiry.to_le_bytes().as_ref()],
        bump
    )]
    pub expiry_pool: Account<'info, ExpiryPool>,

    /// LP mint of the market being rewarded
    pub stake_mint: Account<'info, Mint>,

    #[account(
        init,
        payer = authority,
        token::mint = stake_mint,
        token::authority = reward_pool,
        seeds = [STAKE_VAULT_SEED, expiry_pool.key().as_ref()],
        bump
    )]
    pub stake_vault: Account<'info, TokenAccount>,

    #[account(mut)]
    pub authority: Signer<'info>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
    pub rent: Sysvar<'info, Rent>,
}

#[derive(Accounts)]
pub struct EmergencySweep<'info> {
    pub reward_pool: Account<'info, RewardPool>,

    #[account(mut, constraint = vault.owner == reward_pool.key())]
    pub vault: Account<'info, TokenAccount>,

    #[account(mut)]
    pub destination: Account<'info, TokenAccount>,

    pub handler: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct FundIncentives<'info> {
    #[account(has_one = authority, has_one = reward_vault)]
    pub reward_pool: Account<'info, RewardPool>,

    #[account(mut, has_one = reward_pool)]
    pub expiry_pool: Account<'info, ExpiryPool>,

    #[account(mut)]
    pub reward_vault: Account<'info, TokenAccount>,

    #[account(mut, constraint = funder_token_account.owner == authority.key())]
    pub funder_token_account: Account<'info, TokenAccount>,

    pub authority: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
#[instruction(beneficiary: Pubkey)]
pub struct Stake<'info> {
    pub reward_pool: Account<'info, RewardPool>,

    #[account(mut, has_one = reward_pool, has_one = stake_vault)]
    pub expiry_pool: Account<'info, ExpiryPool>,

    #[account(mut)]
    pub stake_vault: Account<'info, TokenAccount>,

    #[account(
        init_if_needed,
        payer = payer,
        space = StakerPosition::SIZE,
        seeds = [STAKER_SEED, expiry_pool.key().as_ref(), beneficiary.as_ref()],
        bump
    )]
    pub staker_position: Account<'info, StakerPosition>,

    #[account(mut, constraint = payer_stake_account.owner == payer.key())]
    pub payer_stake_account: Account<'info, TokenAccount>,

    #[account(mut)]
    pub payer: Signer<'info>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct Withdraw<'info> {
    pub reward_pool: Account<'info, RewardPool>,

    #[account(mut, has_one = reward_pool, has_one = stake_vault)]
    pub expiry_pool: Account<'info, ExpiryPool>,

    #[account(mut)]
    pub stake_vault: Account<'info, TokenAccount>,

    #[account(
        mut,
        seeds = [STAKER_SEED, expiry_pool.key().as_ref(), user.key().as_ref()],
        bump = staker_position.bump
    )]
    pub staker_position: Account<'info, StakerPosition>,

    #[account(mut)]
    pub destination: Account<'info, TokenAccount>,

    pub user: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct Redeem<'info> {
    #[account(has_one = reward_vault)]
    pub reward_pool: Account<'info, RewardPool>,

    #[account(mut, has_one = reward_pool)]
    pub expiry_pool: Account<'info, ExpiryPool>,

    #[account(mut)]
    pub reward_vault: Account<'info, TokenAccount>,

    #[account(
        mut,
        seeds = [STAKER_SEED, expiry_pool.key().as_ref(), user.key().as_ref()],
        bump = staker_position.bump
    )]
    pub staker_position: Account<'info, StakerPosition>,

    #[account(mut)]
    pub user_reward_account: Account<'info, TokenAccount>,

    pub user: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct UpdateParamL<'info> {
    pub reward_pool: Account<'info, RewardPool>,

    #[account(mut, has_one = reward_pool)]
    pub expiry_pool: Account<'info, ExpiryPool>,
}

#[derive(Accounts)]
pub struct ReadPool<'info> {
    pub reward_pool: Account<'info, RewardPool>,
}

#[derive(Accounts)]
pub struct ReadStaker<'info> {
    pub reward_pool: Account<'info, RewardPool>,

    #[account(has_one = reward_pool)]
    pub expiry_pool: Account<'info, ExpiryPool>,

    #[account(constraint = staker_position.expiry_pool == expiry_pool.key())]
    pub staker_position: Account<'info, StakerPosition>,
}

#[event]
pub struct Funded {
    pub reward_pool: Pubkey,
    pub epochs: u64,
    pub amount: u64,
}

#[event]
pub struct RewardsToppedUp {
    pub reward_pool: Pubkey,
    pub epoch_ids: Vec<u64>,
    pub amounts: Vec<u64>,
}

#[event]
pub struct AllocationSettingUpdated {
    pub reward_pool: Pubkey,
    pub from_epoch: u64,
    pub expiries: Vec<i64>,
    pub numerators: Vec<u64>,
}

#[event]
pub struct EmergencyModeSet {
    pub reward_pool: Pubkey,
    pub handler: Pubkey,
}

#[event]
pub struct Staked {
    pub expiry_pool: Pubkey,
    pub staker: Pubkey,
    pub amount: u64,
    pub total_stake: u64,
}

#[event]
pub struct Withdrawn {
    pub expiry_pool: Pubkey,
    pub staker: Pubkey,
    pub amount: u64,
    pub total_stake: u64,
}

#[event]
pub struct RewardsRedeemed {
    pub expiry_pool: Pubkey,
    pub staker: Pubkey,
    pub amount: u64,
}

#[event]
pub struct IncentivesRedeemed {
    pub expiry_pool: Pubkey,
    pub staker: Pubkey,
    pub amount: u64,
}
