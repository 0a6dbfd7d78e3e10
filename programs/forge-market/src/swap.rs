use anchor_lang::prelude::*;

use crate::state::*;
use crate::MarketOperation;

/// Swap an exact input amount; output is checked against `min_out`
pub fn swap_exact_in(
    ctx: Context<MarketOperation>,
    asset_in: Asset,
    amount_in: u64,
    min_out: u64,
) -> Result<()> {
    require!(ctx.accounts.forge_protocol.is_active, MarketError::Paused);
    let clock = Clock::get()?;
    let params = MarketParams::from_protocol(&ctx.accounts.forge_protocol);

    let outcome = ctx.accounts.market.swap_exact_in(
        &params,
        asset_in,
        amount_in,
        min_out,
        clock.unix_timestamp,
        clock.slot,
    )?;
    settle_swap(&ctx, asset_in, &outcome, clock.slot)
}

/// Swap for an exact output amount; input is checked against `max_in`
pub fn swap_exact_out(
    ctx: Context<MarketOperation>,
    asset_in: Asset,
    amount_out: u64,
    max_in: u64,
) -> Result<()> {
    require!(ctx.accounts.forge_protocol.is_active, MarketError::Paused);
    let clock = Clock::get()?;
    let params = MarketParams::from_protocol(&ctx.accounts.forge_protocol);

    let outcome = ctx.accounts.market.swap_exact_out(
        &params,
        asset_in,
        amount_out,
        max_in,
        clock.unix_timestamp,
        clock.slot,
    )?;
    settle_swap(&ctx, asset_in, &outcome, clock.slot)
}

fn settle_swap(
    ctx: &Context<MarketOperation>,
    asset_in: Asset,
    outcome: &SwapOutcome,
    slot: u64,
) -> Result<()> {
    let accounts = &ctx.accounts;
    accounts.pay_in(asset_in, outcome.amount_in)?;
    accounts.pay_out(asset_in.other(), outcome.amount_out)?;
    accounts.mint_lp_to_treasury(outcome.protocol_fee_lp)?;
    accounts.emit_curve_shift(slot);

    let market = &accounts.market;
    msg!(
        "Swap: {} in, {} out, weights {}/{}",
        outcome.amount_in,
        outcome.amount_out,
        market.weight_xyt,
        market.weight_token
    );
    emit!(Swapped {
        market: market.key(),
        user: accounts.user.key(),
        asset_in,
        amount_in: outcome.amount_in,
        amount_out: outcome.amount_out,
        reserve_xyt: market.reserve_xyt,
        reserve_token: market.reserve_token,
    });
    Ok(())
}

#[event]
pub struct Swapped {
    pub market: Pubkey,
    pub user: Pubkey,
    pub asset_in: Asset,
    pub amount_in: u64,
    pub amount_out: u64,
    pub reserve_xyt: u64,
    pub reserve_token: u64,
}
