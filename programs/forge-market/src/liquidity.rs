//! Liquidity handlers. Each one first collects the interest due on the
//! market's XYT so LP entering or leaving settles against an up-to-date
//! interest index.

use anchor_lang::prelude::*;

use crate::state::*;
use crate::MarketOperation;

/// Seed the market. The caller receives all LP except `MINIMUM_LIQUIDITY`.
pub fn bootstrap_market(
    ctx: Context<MarketOperation>,
    xyt_amount: u64,
    token_amount: u64,
) -> Result<()> {
    require!(ctx.accounts.forge_protocol.is_active, MarketError::Paused);
    let clock = Clock::get()?;
    let params = MarketParams::from_protocol(&ctx.accounts.forge_protocol);

    ctx.accounts.collect_interest()?;
    let lp = ctx.accounts.market.bootstrap(
        &params,
        xyt_amount,
        token_amount,
        clock.unix_timestamp,
        clock.slot,
    )?;
    ctx.accounts
        .update_lp_position(|market, position| market.credit_lp(position, lp))?;

    let accounts = &ctx.accounts;
    accounts.pay_in(Asset::Xyt, xyt_amount)?;
    accounts.pay_in(Asset::Token, token_amount)?;
    accounts.mint_lp_to_user(lp)?;

    msg!("Market bootstrapped with {} XYT and {} tokens", xyt_amount, token_amount);
    emit_liquidity(
        accounts,
        true,
        &LiquidityOutcome {
            xyt: xyt_amount,
            token: token_amount,
            lp,
            protocol_fee_lp: 0,
        },
    );
    Ok(())
}

pub fn add_liquidity_dual(
    ctx: Context<MarketOperation>,
    xyt_desired: u64,
    token_desired: u64,
    xyt_min: u64,
    token_min: u64,
) -> Result<()> {
    require!(ctx.accounts.forge_protocol.is_active, MarketError::Paused);
    let now = Clock::get()?.unix_timestamp;
    let params = MarketParams::from_protocol(&ctx.accounts.forge_protocol);

    ctx.accounts.collect_interest()?;
    let outcome = ctx.accounts.market.add_liquidity_dual(
        &params,
        xyt_desired,
        token_desired,
        xyt_min,
        token_min,
        now,
    )?;
    ctx.accounts
        .update_lp_position(|market, position| market.credit_lp(position, outcome.lp))?;

    let accounts = &ctx.accounts;
    accounts.pay_in(Asset::Xyt, outcome.xyt)?;
    accounts.pay_in(Asset::Token, outcome.token)?;
    accounts.mint_lp_to_user(outcome.lp)?;
    accounts.mint_lp_to_treasury(outcome.protocol_fee_lp)?;
    emit_liquidity(accounts, true, &outcome);
    Ok(())
}

pub fn add_liquidity_single(
    ctx: Context<MarketOperation>,
    asset: Asset,
    amount: u64,
    min_lp: u64,
) -> Result<()> {
    require!(ctx.accounts.forge_protocol.is_active, MarketError::Paused);
    let clock = Clock::get()?;
    let params = MarketParams::from_protocol(&ctx.accounts.forge_protocol);

    ctx.accounts.collect_interest()?;
    let outcome = ctx.accounts.market.add_liquidity_single(
        &params,
        asset,
        amount,
        min_lp,
        clock.unix_timestamp,
        clock.slot,
    )?;
    ctx.accounts
        .update_lp_position(|market, position| market.credit_lp(position, outcome.lp))?;

    let accounts = &ctx.accounts;
    accounts.pay_in(asset, amount)?;
    accounts.mint_lp_to_user(outcome.lp)?;
    accounts.mint_lp_to_treasury(outcome.protocol_fee_lp)?;
    accounts.emit_curve_shift(clock.slot);
    emit_liquidity(accounts, true, &outcome);
    Ok(())
}

/// Proportional exit; stays available when the protocol is paused or the
/// market is past expiry
pub fn remove_liquidity_dual(
    ctx: Context<MarketOperation>,
    lp: u64,
    xyt_min: u64,
    token_min: u64,
) -> Result<()> {
    let params = MarketParams::from_protocol(&ctx.accounts.forge_protocol);
    ctx.accounts.collect_interest()?;
    let outcome = ctx
        .accounts
        .market
        .remove_liquidity_dual(&params, lp, xyt_min, token_min)?;
    ctx.accounts
        .update_lp_position(|market, position| market.debit_lp(position, lp))?;

    let accounts = &ctx.accounts;
    accounts.burn_user_lp(lp)?;
    accounts.pay_out(Asset::Xyt, outcome.xyt)?;
    accounts.pay_out(Asset::Token, outcome.token)?;
    accounts.mint_lp_to_treasury(outcome.protocol_fee_lp)?;
    emit_liquidity(accounts, false, &outcome);
    Ok(())
}

pub fn remove_liquidity_single(
    ctx: Context<MarketOperation>,
    asset: Asset,
    lp: u64,
    min_out: u64,
) -> Result<()> {
    require!(ctx.accounts.forge_protocol.is_active, MarketError::Paused);
    let clock = Clock::get()?;
    let params = MarketParams::from_protocol(&ctx.accounts.forge_protocol);

    ctx.accounts.collect_interest()?;
    let outcome = ctx.accounts.market.remove_liquidity_single(
        &params,
        asset,
        lp,
        min_out,
        clock.unix_timestamp,
        clock.slot,
    )?;
    ctx.accounts
        .update_lp_position(|market, position| market.debit_lp(position, lp))?;

    let accounts = &ctx.accounts;
    accounts.burn_user_lp(lp)?;
    accounts.pay_out(Asset::Xyt, outcome.xyt)?;
    accounts.pay_out(Asset::Token, outcome.token)?;
    accounts.mint_lp_to_treasury(outcome.protocol_fee_lp)?;
    accounts.emit_curve_shift(clock.slot);
    emit_liquidity(accounts, false, &outcome);
    Ok(())
}

fn emit_liquidity(accounts: &MarketOperation, is_add: bool, outcome: &LiquidityOutcome) {
    emit!(LiquidityChanged {
        market: accounts.market.key(),
        user: accounts.user.key(),
        is_add,
        xyt: outcome.xyt,
        token: outcome.token,
        lp: outcome.lp,
        protocol_fee_lp: outcome.protocol_fee_lp,
        total_lp_supply: accounts.market.total_lp_supply,
    });
}

#[event]
pub struct LiquidityChanged {
    pub market: Pubkey,
    pub user: Pubkey,
    pub is_add: bool,
    pub xyt: u64,
    pub token: u64,
    pub lp: u64,
    pub protocol_fee_lp: u64,
    pub total_lp_supply: u64,
}
