use anchor_lang::prelude::*;
use anchor_spl::token::{self, Transfer};

use crate::state::*;
use crate::{OpenLpPosition, RedeemLpInterests, TransferLp, MARKET_SEED};

pub fn open_lp_position(ctx: Context<OpenLpPosition>) -> Result<()> {
    let market = &ctx.accounts.market;
    ctx.accounts.lp_position.set_inner(LpPosition {
        market: market.key(),
        owner: ctx.accounts.user.key(),
        lp_balance: 0,
        interest_index: market.lp_interest_index,
        pending_interest: 0,
        bump: ctx.bumps.lp_position,
    });
    Ok(())
}

/// LP moved with a plain token transfer keeps its interest claim with the
/// sender's position; this instruction moves both.
pub fn transfer_lp(ctx: Context<TransferLp>, amount: u64) -> Result<()> {
    let accounts = &mut *ctx.accounts;
    accounts.collection.collect()?;
    accounts.collection.market.move_lp_claim(
        &mut accounts.from_position,
        &mut accounts.to_position,
        amount,
    )?;

    let cpi_accounts = Transfer {
        from: accounts.from_lp_account.to_account_info(),
        to: accounts.to_lp_account.to_account_info(),
        authority: accounts.owner.to_account_info(),
    };
    token::transfer(
        CpiContext::new(accounts.collection.token_program.to_account_info(), cpi_accounts),
        amount,
    )?;

    emit!(LpTransferred {
        market: accounts.collection.market.key(),
        from: accounts.from_position.owner,
        to: accounts.to_position.owner,
        amount,
    });
    Ok(())
}

pub fn redeem_lp_interests(ctx: Context<RedeemLpInterests>) -> Result<()> {
    let accounts = &mut *ctx.accounts;
    accounts.collection.collect()?;
    let interest = accounts
        .collection
        .market
        .take_lp_interest(&mut accounts.lp_position)?;

    if interest > 0 {
        let market = &accounts.collection.market;
        let seeds: &[&[u8]] = &[
            MARKET_SEED,
            market.forge_id.as_ref(),
            market.market_factory_id.as_ref(),
            market.yield_contract.as_ref(),
            market.base_mint.as_ref(),
            &[market.bump],
        ];
        let signer = &[seeds];
        let cpi_accounts = Transfer {
            from: accounts.collection.interest_vault.to_account_info(),
            to: accounts.user_token_account.to_account_info(),
            authority: market.to_account_info(),
        };
        token::transfer(
            CpiContext::new_with_signer(
                accounts.collection.token_program.to_account_info(),
                cpi_accounts,
                signer,
            ),
            interest,
        )?;
    }

    msg!("Paid {} shares of LP interest", interest);
    emit!(LpInterestRedeemed {
        market: accounts.collection.market.key(),
        user: accounts.user.key(),
        interest,
    });
    Ok(())
}

#[event]
pub struct LpTransferred {
    pub market: Pubkey,
    pub from: Pubkey,
    pub to: Pubkey,
    pub amount: u64,
}

#[event]
pub struct LpInterestRedeemed {
    pub market: Pubkey,
    pub user: Pubkey,
    pub interest: u64,
}
