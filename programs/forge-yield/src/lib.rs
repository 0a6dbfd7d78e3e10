// Summary: Anchor program splitting a yield-bearing token into a principal
// claim (OT) and a future-yield claim (XYT) per (forge, underlying, expiry).
// XYT holders accrue interest from the forge's exchange rate feed, settled
// on every balance change. Rates use the RATE_SCALE = 1e9 fixed point.

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer};
use forge_core::program::ForgeCore;
use forge_core::{ForgeId, ForgeProtocol, FORGE_AUTHORITY_SEED, FORGE_PROTOCOL_SEED};

pub mod state;
use state::*;

declare_id!("BeJW4TrT31GWgW5wpLeYS4tFiCQquHd5bHcfYrPykErs");

pub const YIELD_SOURCE_SEED: &[u8] = b"yield_source";
pub const YIELD_CONTRACT_SEED: &[u8] = b"yield_contract";
pub const VAULT_SEED: &[u8] = b"vault";
pub const HOLDER_SEED: &[u8] = b"holder";

/// Pays `amount` shares out of the contract vault, signed by the contract PDA.
fn transfer_from_vault<'info>(
    yield_contract: &Account<'info, YieldContract>,
    vault: &Account<'info, TokenAccount>,
    to: &Account<'info, TokenAccount>,
    token_program: &Program<'info, Token>,
    amount: u64,
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }
    let expiry_bytes = yield_contract.expiry.to_le_bytes();
    let seeds: &[&[u8]] = &[
        YIELD_CONTRACT_SEED,
        yield_contract.forge_id.as_ref(),
        yield_contract.underlying_mint.as_ref(),
        expiry_bytes.as_ref(),
        &[yield_contract.bump],
    ];
    let signer = &[seeds];
    let cpi_accounts = Transfer {
        from: vault.to_account_info(),
        to: to.to_account_info(),
        authority: yield_contract.to_account_info(),
    };
    token::transfer(
        CpiContext::new_with_signer(token_program.to_account_info(), cpi_accounts, signer),
        amount,
    )
}

fn init_holder_if_needed(holder: &mut HolderPosition, owner: Pubkey, yield_contract: Pubkey, bump: u8) {
    if holder.owner == Pubkey::default() {
        holder.owner = owner;
        holder.yield_contract = yield_contract;
        holder.bump = bump;
    }
}

#[program]
pub mod forge_yield {
    use super::*;

    /// Register the exchange rate feed of a yield-bearing mint
    pub fn initialize_yield_source(ctx: Context<InitializeYieldSource>, initial_rate: u128) -> Result<()> {
        require!(initial_rate > 0, YieldError::InvalidRate);
        let source = &mut ctx.accounts.yield_source;
        source.authority = ctx.accounts.authority.key();
        source.underlying_mint = ctx.accounts.underlying_mint.key();
        source.exchange_rate = initial_rate;
        source.last_updated = Clock::get()?.unix_timestamp;
        source.bump = ctx.bumps.yield_source;

        msg!("Yield source for {} starts at rate {}", source.underlying_mint, initial_rate);
        Ok(())
    }

    pub fn update_exchange_rate(ctx: Context<UpdateExchangeRate>, rate: u128) -> Result<()> {
        let source = &mut ctx.accounts.yield_source;
        require_keys_eq!(source.authority, ctx.accounts.authority.key(), YieldError::Unauthorized);
        source.push_rate(rate, Clock::get()?.unix_timestamp)?;

        emit!(ExchangeRateUpdated { underlying_mint: source.underlying_mint, rate });
        Ok(())
    }

    /// Create the OT/XYT pair for (forge, underlying, expiry) and record it in
    /// the forge directory. A second call for the same triple fails.
    pub fn new_yield_contract(ctx: Context<NewYieldContract>, forge_id: ForgeId, expiry: i64) -> Result<()> {
        require!(ctx.accounts.forge_protocol.is_active, YieldError::Paused);
        let now = Clock::get()?.unix_timestamp;
        require!(expiry > now, YieldError::InvalidExpiry);

        let yield_contract_key = ctx.accounts.yield_contract.key();
        let underlying_mint = ctx.accounts.underlying_mint.key();

        let yc = &mut ctx.accounts.yield_contract;
        yc.forge_id = forge_id;
        yc.underlying_mint = underlying_mint;
        yc.yield_source = ctx.accounts.yield_source.key();
        yc.vault = ctx.accounts.vault.key();
        yc.start_time = now;
        yc.expiry = expiry;
        yc.total_ot = 0;
        yc.total_xyt = 0;
        yc.last_rate_before_expiry = 0;
        yc.total_fee = 0;
        yc.bump = ctx.bumps.yield_contract;
        yc.vault_bump = ctx.bumps.vault;

        let seeds: &[&[u8]] = &[FORGE_AUTHORITY_SEED, &[ctx.bumps.forge_authority]];
        let signer = &[seeds];
        let cpi_accounts = forge_core::cpi::accounts::RegisterYieldContract {
            forge_protocol: ctx.accounts.forge_protocol.to_account_info(),
            record: ctx.accounts.yield_contract_record.to_account_info(),
            forge_authority: ctx.accounts.forge_authority.to_account_info(),
            payer: ctx.accounts.creator.to_account_info(),
            system_program: ctx.accounts.system_program.to_account_info(),
        };
        forge_core::cpi::register_yield_contract(
            CpiContext::new_with_signer(
                ctx.accounts.forge_core_program.to_account_info(),
                cpi_accounts,
                signer,
            ),
            forge_id,
            underlying_mint,
            expiry,
            yield_contract_key,
        )?;

        emit!(YieldContractCreated {
            yield_contract: yield_contract_key,
            underlying_mint,
            expiry,
        });
        Ok(())
    }

    /// Open an empty OT/XYT position for `owner` (used by programs holding XYT)
    pub fn open_position(ctx: Context<OpenPosition>, owner: Pubkey) -> Result<()> {
        let holder = &mut ctx.accounts.holder;
        holder.owner = owner;
        holder.yield_contract = ctx.accounts.yield_contract.key();
        holder.ot_balance = 0;
        holder.xyt_balance = 0;
        holder.last_rate = 0;
        holder.due_interests = 0;
        holder.bump = ctx.bumps.holder;
        Ok(())
    }

    pub fn tokenize(ctx: Context<Tokenize>, shares: u64) -> Result<()> {
        require!(ctx.accounts.forge_protocol.is_active, YieldError::Paused);
        let now = Clock::get()?.unix_timestamp;
        let rate = ctx.accounts.yield_source.exchange_rate;
        let fee_bps = ctx.accounts.forge_protocol.forge_fee_bps;

        let yield_contract_key = ctx.accounts.yield_contract.key();
        init_holder_if_needed(
            &mut ctx.accounts.holder,
            ctx.accounts.user.key(),
            yield_contract_key,
            ctx.bumps.holder,
        );
        let minted = ctx
            .accounts
            .yield_contract
            .tokenize(&mut ctx.accounts.holder, shares, now, rate, fee_bps)?;

        let cpi_accounts = Transfer {
            from: ctx.accounts.user_token_account.to_account_info(),
            to: ctx.accounts.vault.to_account_info(),
            authority: ctx.accounts.user.to_account_info(),
        };
        token::transfer(
            CpiContext::new(ctx.accounts.token_program.to_account_info(), cpi_accounts),
            shares,
        )?;

        emit!(Tokenized {
            yield_contract: yield_contract_key,
            user: ctx.accounts.user.key(),
            shares,
            minted,
        });
        Ok(())
    }

    pub fn redeem_underlying(ctx: Context<Redeem>, amount: u64) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let rate = ctx.accounts.yield_source.exchange_rate;
        let fee_bps = ctx.accounts.forge_protocol.forge_fee_bps;

        let redemption = ctx
            .accounts
            .yield_contract
            .redeem_underlying(&mut ctx.accounts.holder, amount, now, rate, fee_bps)?;
        let total = redemption.total()?;

        transfer_from_vault(
            &ctx.accounts.yield_contract,
            &ctx.accounts.vault,
            &ctx.accounts.user_token_account,
            &ctx.accounts.token_program,
            total,
        )?;

        emit!(Redeemed {
            yield_contract: ctx.accounts.yield_contract.key(),
            user: ctx.accounts.user.key(),
            burned: amount,
            principal: redemption.principal,
            interest: redemption.interest,
        });
        Ok(())
    }

    pub fn redeem_after_expiry(ctx: Context<Redeem>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let rate = ctx.accounts.yield_source.exchange_rate;
        let fee_bps = ctx.accounts.forge_protocol.forge_fee_bps;

        let burned = ctx.accounts.holder.ot_balance;
        let redemption = ctx
            .accounts
            .yield_contract
            .redeem_after_expiry(&mut ctx.accounts.holder, now, rate, fee_bps)?;
        let total = redemption.total()?;

        transfer_from_vault(
            &ctx.accounts.yield_contract,
            &ctx.accounts.vault,
            &ctx.accounts.user_token_account,
            &ctx.accounts.token_program,
            total,
        )?;

        emit!(Redeemed {
            yield_contract: ctx.accounts.yield_contract.key(),
            user: ctx.accounts.user.key(),
            burned,
            principal: redemption.principal,
            interest: redemption.interest,
        });
        Ok(())
    }

    pub fn redeem_due_interests(ctx: Context<Redeem>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let rate = ctx.accounts.yield_source.exchange_rate;
        let fee_bps = ctx.accounts.forge_protocol.forge_fee_bps;

        let interest = ctx
            .accounts
            .yield_contract
            .redeem_due_interests(&mut ctx.accounts.holder, now, rate, fee_bps)?;

        transfer_from_vault(
            &ctx.accounts.yield_contract,
            &ctx.accounts.vault,
            &ctx.accounts.user_token_account,
            &ctx.accounts.token_program,
            interest,
        )?;

        emit!(Redeemed {
            yield_contract: ctx.accounts.yield_contract.key(),
            user: ctx.accounts.user.key(),
            burned: 0,
            principal: 0,
            interest,
        });
        Ok(())
    }

    /// Checkpoint a position against the current rate; anyone may call
    pub fn settle(ctx: Context<Settle>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let rate = ctx.accounts.yield_source.exchange_rate;
        let fee_bps = ctx.accounts.forge_protocol.forge_fee_bps;
        ctx.accounts
            .yield_contract
            .settle(&mut ctx.accounts.holder, now, rate, fee_bps)?;
        Ok(())
    }

    pub fn transfer_yield_claim(ctx: Context<TransferClaim>, amount: u64) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let rate = ctx.accounts.yield_source.exchange_rate;
        let fee_bps = ctx.accounts.forge_protocol.forge_fee_bps;

        ctx.accounts.yield_contract.transfer_yield_claim(
            &mut ctx.accounts.from_position,
            &mut ctx.accounts.to_position,
            amount,
            now,
            rate,
            fee_bps,
        )?;

        emit!(ClaimTransferred {
            yield_contract: ctx.accounts.yield_contract.key(),
            from: ctx.accounts.from_position.owner,
            to: ctx.accounts.to_position.owner,
            amount,
            is_yield_claim: true,
        });
        Ok(())
    }

    pub fn transfer_principal(ctx: Context<TransferClaim>, amount: u64) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let rate = ctx.accounts.yield_source.exchange_rate;
        let fee_bps = ctx.accounts.forge_protocol.forge_fee_bps;

        ctx.accounts.yield_contract.transfer_principal(
            &mut ctx.accounts.from_position,
            &mut ctx.accounts.to_position,
            amount,
            now,
            rate,
            fee_bps,
        )?;

        emit!(ClaimTransferred {
            yield_contract: ctx.accounts.yield_contract.key(),
            from: ctx.accounts.from_position.owner,
            to: ctx.accounts.to_position.owner,
            amount,
            is_yield_claim: false,
        });
        Ok(())
    }

    /// Send the accumulated forge fee to the treasury (only protocol authority)
    pub fn withdraw_forge_fee(ctx: Context<WithdrawForgeFee>) -> Result<()> {
        require_keys_eq!(
            ctx.accounts.forge_protocol.authority,
            ctx.accounts.authority.key(),
            YieldError::Unauthorized
        );
        let amount = ctx.accounts.yield_contract.take_forge_fee()?;

        transfer_from_vault(
            &ctx.accounts.yield_contract,
            &ctx.accounts.vault,
            &ctx.accounts.treasury_token_account,
            &ctx.accounts.token_program,
            amount,
        )?;

        msg!("Withdrew {} shares of forge fee", amount);
        Ok(())
    }
}

#[derive(Accounts)]
pub struct InitializeYieldSource<'info> {
    #[account(
        init,
        payer = authority,
        space = YieldSource::SIZE,
        seeds = [YIELD_SOURCE_SEED, underlying_mint.key().as_ref()],
        bump
    )]
    pub yield_source: Account<'info, YieldSource>,
    pub underlying_mint: Account<'info, Mint>,
    #[account(mut)]
    pub authority: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct UpdateExchangeRate<'info> {
    #[account(mut, has_one = authority)]
    pub yield_source: Account<'info, YieldSource>,
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
#[instruction(forge_id: ForgeId, expiry: i64)]
pub struct NewYieldContract<'info> {
    #[account(
        init,
        payer = creator,
        space = YieldContract::SIZE,
        seeds = [
            YIELD_CONTRACT_SEED,
            forge_id.as_ref(),
            underlying_mint.key().as_ref(),
            &expiry.to_le_bytes(),
        ],
        bump
    )]
    pub yield_contract: Account<'info, YieldContract>,
    #[account(
        seeds = [YIELD_SOURCE_SEED, underlying_mint.key().as_ref()],
        bump = yield_source.bump,
    )]
    pub yield_source: Account<'info, YieldSource>,
    pub underlying_mint: Account<'info, Mint>,
    #[account(
        init,
        payer = creator,
        token::mint = underlying_mint,
        token::authority = yield_contract,
        seeds = [VAULT_SEED, yield_contract.key().as_ref()],
        bump
    )]
    pub vault: Account<'info, TokenAccount>,
    #[account(mut, seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump, seeds::program = forge_core::ID)]
    pub forge_protocol: Box<Account<'info, ForgeProtocol>>,
    /// CHECK: Registry record, created by the core program in this instruction
    #[account(mut)]
    pub yield_contract_record: UncheckedAccount<'info>,
    /// CHECK: PDA signer for directory writes
    #[account(seeds = [FORGE_AUTHORITY_SEED], bump)]
    pub forge_authority: UncheckedAccount<'info>,
    #[account(mut)]
    pub creator: Signer<'info>,
    pub forge_core_program: Program<'info, ForgeCore>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
    pub rent: Sysvar<'info, Rent>,
}

#[derive(Accounts)]
#[instruction(owner: Pubkey)]
pub struct OpenPosition<'info> {
    pub yield_contract: Account<'info, YieldContract>,
    #[account(
        init,
        payer = payer,
        space = HolderPosition::SIZE,
        seeds = [HOLDER_SEED, yield_contract.key().as_ref(), owner.as_ref()],
        bump
    )]
    pub holder: Account<'info, HolderPosition>,
    #[account(mut)]
    pub payer: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct Tokenize<'info> {
    #[account(mut)]
    pub yield_contract: Account<'info, YieldContract>,
    #[account(address = yield_contract.yield_source)]
    pub yield_source: Account<'info, YieldSource>,
    #[account(seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump, seeds::program = forge_core::ID)]
    pub forge_protocol: Box<Account<'info, ForgeProtocol>>,
    #[account(
        init_if_needed,
        payer = user,
        space = HolderPosition::SIZE,
        seeds = [HOLDER_SEED, yield_contract.key().as_ref(), user.key().as_ref()],
        bump
    )]
    pub holder: Account<'info, HolderPosition>,
    #[account(mut)]
    pub user: Signer<'info>,
    #[account(mut, token::mint = yield_contract.underlying_mint)]
    pub user_token_account: Account<'info, TokenAccount>,
    #[account(mut, address = yield_contract.vault)]
    pub vault: Account<'info, TokenAccount>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct Redeem<'info> {
    #[account(mut)]
    pub yield_contract: Account<'info, YieldContract>,
    #[account(address = yield_contract.yield_source)]
    pub yield_source: Account<'info, YieldSource>,
    #[account(seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump, seeds::program = forge_core::ID)]
    pub forge_protocol: Box<Account<'info, ForgeProtocol>>,
    #[account(
        mut,
        seeds = [HOLDER_SEED, yield_contract.key().as_ref(), user.key().as_ref()],
        bump = holder.bump,
    )]
    pub holder: Account<'info, HolderPosition>,
    pub user: Signer<'info>,
    #[account(mut, token::mint = yield_contract.underlying_mint)]
    pub user_token_account: Account<'info, TokenAccount>,
    #[account(mut, address = yield_contract.vault)]
    pub vault: Account<'info, TokenAccount>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct Settle<'info> {
    #[account(mut)]
    pub yield_contract: Account<'info, YieldContract>,
    #[account(address = yield_contract.yield_source)]
    pub yield_source: Account<'info, YieldSource>,
    #[account(seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump, seeds::program = forge_core::ID)]
    pub forge_protocol: Box<Account<'info, ForgeProtocol>>,
    #[account(
        mut,
        constraint = holder.yield_contract == yield_contract.key() @ YieldError::InvalidPosition,
    )]
    pub holder: Account<'info, HolderPosition>,
}

#[derive(Accounts)]
pub struct TransferClaim<'info> {
    #[account(mut)]
    pub yield_contract: Account<'info, YieldContract>,
    #[account(address = yield_contract.yield_source)]
    pub yield_source: Account<'info, YieldSource>,
    #[account(seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump, seeds::program = forge_core::ID)]
    pub forge_protocol: Box<Account<'info, ForgeProtocol>>,
    #[account(
        mut,
        seeds = [HOLDER_SEED, yield_contract.key().as_ref(), authority.key().as_ref()],
        bump = from_position.bump,
    )]
    pub from_position: Account<'info, HolderPosition>,
    #[account(
        mut,
        constraint = to_position.yield_contract == yield_contract.key() @ YieldError::InvalidPosition,
        constraint = to_position.key() != from_position.key() @ YieldError::InvalidPosition,
    )]
    pub to_position: Account<'info, HolderPosition>,
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct WithdrawForgeFee<'info> {
    #[account(mut)]
    pub yield_contract: Account<'info, YieldContract>,
    #[account(seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump, seeds::program = forge_core::ID)]
    pub forge_protocol: Box<Account<'info, ForgeProtocol>>,
    #[account(mut, address = yield_contract.vault)]
    pub vault: Account<'info, TokenAccount>,
    #[account(
        mut,
        token::mint = yield_contract.underlying_mint,
        constraint = treasury_token_account.owner == forge_protocol.treasury @ YieldError::Unauthorized,
    )]
    pub treasury_token_account: Account<'info, TokenAccount>,
    pub authority: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[event]
pub struct ExchangeRateUpdated {
    pub underlying_mint: Pubkey,
    pub rate: u128,
}

#[event]
pub struct YieldContractCreated {
    pub yield_contract: Pubkey,
    pub underlying_mint: Pubkey,
    pub expiry: i64,
}

#[event]
pub struct Tokenized {
    pub yield_contract: Pubkey,
    pub user: Pubkey,
    pub shares: u64,
    pub minted: u64,
}

#[event]
pub struct Redeemed {
    pub yield_contract: Pubkey,
    pub user: Pubkey,
    pub burned: u64,
    pub principal: u64,
    pub interest: u64,
}

#[event]
pub struct ClaimTransferred {
    pub yield_contract: Pubkey,
    pub from: Pubkey,
    pub to: Pubkey,
    pub amount: u64,
    pub is_yield_claim: bool,
}
