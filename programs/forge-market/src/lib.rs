use anchor_lang::prelude::*;
use anchor_spl::token::{self, Burn, Mint, MintTo, Token, TokenAccount, Transfer};
use forge_core::program::ForgeCore;
use forge_core::{ForgeId, ForgeProtocol, FORGE_AUTHORITY_SEED, FORGE_PROTOCOL_SEED};
use forge_yield::program::ForgeYield;
use forge_yield::state::YieldContract;

pub mod interest;
pub mod liquidity;
pub mod state;
pub mod swap;

use state::*;

declare_id!("B9qek9NaR3xmBro8pdxixaA2SHzDUExB5KaBt9Kb4fry");

pub const MARKET_SEED: &[u8] = b"market";
pub const LP_MINT_SEED: &[u8] = b"lp_mint";
pub const BASE_VAULT_SEED: &[u8] = b"base_vault";
pub const INTEREST_VAULT_SEED: &[u8] = b"interest_vault";
pub const LP_POSITION_SEED: &[u8] = b"lp_position";

/// Pull the interest due on the market's XYT position into the interest
/// vault and spread it over the tracked LP. Returns the shares collected.
#[allow(clippy::too_many_arguments)]
fn collect_interest<'info>(
    market: &mut Account<'info, Market>,
    forge_protocol: &Account<'info, ForgeProtocol>,
    yield_contract: &UncheckedAccount<'info>,
    yield_source: &UncheckedAccount<'info>,
    market_xyt_position: &UncheckedAccount<'info>,
    yield_vault: &UncheckedAccount<'info>,
    interest_vault: &mut Account<'info, TokenAccount>,
    forge_yield_program: &Program<'info, ForgeYield>,
    token_program: &Program<'info, Token>,
) -> Result<u64> {
    let before = interest_vault.amount;
    let seeds: &[&[u8]] = &[
        MARKET_SEED,
        market.forge_id.as_ref(),
        market.market_factory_id.as_ref(),
        market.yield_contract.as_ref(),
        market.base_mint.as_ref(),
        &[market.bump],
    ];
    let signer = &[seeds];
    let cpi_accounts = forge_yield::cpi::accounts::Redeem {
        yield_contract: yield_contract.to_account_info(),
        yield_source: yield_source.to_account_info(),
        forge_protocol: forge_protocol.to_account_info(),
        holder: market_xyt_position.to_account_info(),
        user: market.to_account_info(),
        user_token_account: interest_vault.to_account_info(),
        vault: yield_vault.to_account_info(),
        token_program: token_program.to_account_info(),
    };
    forge_yield::cpi::redeem_due_interests(CpiContext::new_with_signer(
        forge_yield_program.to_account_info(),
        cpi_accounts,
        signer,
    ))?;

    interest_vault.reload()?;
    let collected = interest_vault
        .amount
        .checked_sub(before)
        .ok_or(MarketError::MathOverflow)?;
    market.distribute_interest(collected)?;
    if collected > 0 {
        emit!(InterestCollected {
            market: market.key(),
            amount: collected,
            lp_interest_index: market.lp_interest_index,
        });
    }
    Ok(collected)
}

#[program]
pub mod forge_market {
    use super::*;

    /// Create the market for (forge, factory, XYT, base token) and register
    /// it in the forge directory
    pub fn create_market(
        ctx: Context<CreateMarket>,
        forge_id: ForgeId,
        market_factory_id: ForgeId,
    ) -> Result<()> {
        require!(ctx.accounts.forge_protocol.is_active, MarketError::Paused);
        let now = Clock::get()?.unix_timestamp;
        let yield_contract = &ctx.accounts.yield_contract;
        require!(
            yield_contract.forge_id == forge_id && yield_contract.expiry > now,
            MarketError::InvalidYieldContract
        );

        let market_key = ctx.accounts.market.key();
        let yield_contract_key = yield_contract.key();
        let base_mint = ctx.accounts.base_mint.key();

        let market = &mut ctx.accounts.market;
        market.forge_id = forge_id;
        market.market_factory_id = market_factory_id;
        market.yield_contract = yield_contract_key;
        market.xyt_position = ctx.accounts.market_xyt_position.key();
        market.base_mint = base_mint;
        market.base_vault = ctx.accounts.base_vault.key();
        market.lp_mint = ctx.accounts.lp_mint.key();
        market.xyt_start_time = yield_contract.start_time;
        market.expiry = yield_contract.expiry;
        market.interest_vault = ctx.accounts.interest_vault.key();
        market.lp_interest_index = 0;
        market.total_lp_claims = 0;
        market.unallocated_interest = 0;
        market.bootstrapped = false;
        market.bump = ctx.bumps.market;
        market.base_vault_bump = ctx.bumps.base_vault;
        market.lp_mint_bump = ctx.bumps.lp_mint;
        market.interest_vault_bump = ctx.bumps.interest_vault;

        // XYT held by the market lives in its own holder position
        let cpi_accounts = forge_yield::cpi::accounts::OpenPosition {
            yield_contract: ctx.accounts.yield_contract.to_account_info(),
            holder: ctx.accounts.market_xyt_position.to_account_info(),
            payer: ctx.accounts.creator.to_account_info(),
            system_program: ctx.accounts.system_program.to_account_info(),
        };
        forge_yield::cpi::open_position(
            CpiContext::new(ctx.accounts.forge_yield_program.to_account_info(), cpi_accounts),
            market_key,
        )?;

        let seeds: &[&[u8]] = &[FORGE_AUTHORITY_SEED, &[ctx.bumps.forge_authority]];
        let signer = &[seeds];
        let cpi_accounts = forge_core::cpi::accounts::RegisterMarket {
            forge_protocol: ctx.accounts.forge_protocol.to_account_info(),
            record: ctx.accounts.market_record.to_account_info(),
            forge_authority: ctx.accounts.forge_authority.to_account_info(),
            payer: ctx.accounts.creator.to_account_info(),
            system_program: ctx.accounts.system_program.to_account_info(),
        };
        forge_core::cpi::register_market(
            CpiContext::new_with_signer(
                ctx.accounts.forge_core_program.to_account_info(),
                cpi_accounts,
                signer,
            ),
            forge_id,
            market_factory_id,
            yield_contract_key,
            base_mint,
            market_key,
        )?;

        emit!(MarketCreated {
            market: market_key,
            yield_contract: yield_contract_key,
            base_mint,
        });
        Ok(())
    }

    pub fn bootstrap_market(
        ctx: Context<MarketOperation>,
        xyt_amount: u64,
        token_amount: u64,
    ) -> Result<()> {
        liquidity::bootstrap_market(ctx, xyt_amount, token_amount)
    }

    pub fn swap_exact_in(
        ctx: Context<MarketOperation>,
        asset_in: Asset,
        amount_in: u64,
        min_out: u64,
    ) -> Result<()> {
        swap::swap_exact_in(ctx, asset_in, amount_in, min_out)
    }

    pub fn swap_exact_out(
        ctx: Context<MarketOperation>,
        asset_in: Asset,
        amount_out: u64,
        max_in: u64,
    ) -> Result<()> {
        swap::swap_exact_out(ctx, asset_in, amount_out, max_in)
    }

    pub fn add_liquidity_dual(
        ctx: Context<MarketOperation>,
        xyt_desired: u64,
        token_desired: u64,
        xyt_min: u64,
        token_min: u64,
    ) -> Result<()> {
        liquidity::add_liquidity_dual(ctx, xyt_desired, token_desired, xyt_min, token_min)
    }

    pub fn add_liquidity_single(
        ctx: Context<MarketOperation>,
        asset: Asset,
        amount: u64,
        min_lp: u64,
    ) -> Result<()> {
        liquidity::add_liquidity_single(ctx, asset, amount, min_lp)
    }

    pub fn remove_liquidity_dual(
        ctx: Context<MarketOperation>,
        lp: u64,
        xyt_min: u64,
        token_min: u64,
    ) -> Result<()> {
        liquidity::remove_liquidity_dual(ctx, lp, xyt_min, token_min)
    }

    pub fn remove_liquidity_single(
        ctx: Context<MarketOperation>,
        asset: Asset,
        lp: u64,
        min_out: u64,
    ) -> Result<()> {
        liquidity::remove_liquidity_single(ctx, asset, lp, min_out)
    }

    /// Open the LP position that tracks `user`'s share of XYT interest
    pub fn open_lp_position(ctx: Context<OpenLpPosition>) -> Result<()> {
        interest::open_lp_position(ctx)
    }

    /// Transfer LP together with its interest claim
    pub fn transfer_lp(ctx: Context<TransferLp>, amount: u64) -> Result<()> {
        interest::transfer_lp(ctx, amount)
    }

    /// Collect the market's XYT interest and pay `user` their share
    pub fn redeem_lp_interests(ctx: Context<RedeemLpInterests>) -> Result<()> {
        interest::redeem_lp_interests(ctx)
    }

    pub fn get_reserves(ctx: Context<ReadMarket>) -> Result<ReserveData> {
        Ok(ctx.accounts.market.reserve_data())
    }

    pub fn quote_exact_in(ctx: Context<ReadMarket>, asset_in: Asset, amount_in: u64) -> Result<u64> {
        let clock = Clock::get()?;
        let params = MarketParams::from_protocol(&ctx.accounts.forge_protocol);
        ctx.accounts
            .market
            .quote_exact_in(&params, asset_in, amount_in, clock.unix_timestamp, clock.slot)
    }

    pub fn quote_exact_out(ctx: Context<ReadMarket>, asset_in: Asset, amount_out: u64) -> Result<u64> {
        let clock = Clock::get()?;
        let params = MarketParams::from_protocol(&ctx.accounts.forge_protocol);
        ctx.accounts
            .market
            .quote_exact_out(&params, asset_in, amount_out, clock.unix_timestamp, clock.slot)
    }

    pub fn spot_price(ctx: Context<ReadMarket>, asset_in: Asset) -> Result<u128> {
        let params = MarketParams::from_protocol(&ctx.accounts.forge_protocol);
        ctx.accounts.market.spot_price(&params, asset_in)
    }
}

#[derive(Accounts)]
#[instruction(forge_id: ForgeId, market_factory_id: ForgeId)]
pub struct CreateMarket<'info> {
    #[account(
        init,
        payer = creator,
        space = Market::SIZE,
        seeds = [
            MARKET_SEED,
            forge_id.as_ref(),
            market_factory_id.as_ref(),
            yield_contract.key().as_ref(),
            base_mint.key().as_ref(),
        ],
        bump
    )]
    pub market: Box<Account<'info, Market>>,
    pub yield_contract: Box<Account<'info, YieldContract>>,
    pub base_mint: Box<Account<'info, Mint>>,
    #[account(
        init,
        payer = creator,
        mint::decimals = base_mint.decimals,
        mint::authority = market,
        seeds = [LP_MINT_SEED, market.key().as_ref()],
        bump
    )]
    pub lp_mint: Box<Account<'info, Mint>>,
    #[account(
        init,
        payer = creator,
        token::mint = base_mint,
        token::authority = market,
        seeds = [BASE_VAULT_SEED, market.key().as_ref()],
        bump
    )]
    pub base_vault: Box<Account<'info, TokenAccount>>,
    #[account(address = yield_contract.underlying_mint)]
    pub underlying_mint: Box<Account<'info, Mint>>,
    #[account(
        init,
        payer = creator,
        token::mint = underlying_mint,
        token::authority = market,
        seeds = [INTEREST_VAULT_SEED, market.key().as_ref()],
        bump
    )]
    pub interest_vault: Box<Account<'info, TokenAccount>>,
    /// CHECK: Created by the yield program in this instruction
    #[account(mut)]
    pub market_xyt_position: UncheckedAccount<'info>,
    #[account(mut, seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump, seeds::program = forge_core::ID)]
    pub forge_protocol: Box<Account<'info, ForgeProtocol>>,
    /// CHECK: Registry record, created by the core program in this instruction
    #[account(mut)]
    pub market_record: UncheckedAccount<'info>,
    /// CHECK: PDA signer for directory writes
    #[account(seeds = [FORGE_AUTHORITY_SEED], bump)]
    pub forge_authority: UncheckedAccount<'info>,
    #[account(mut)]
    pub creator: Signer<'info>,
    pub forge_core_program: Program<'info, ForgeCore>,
    pub forge_yield_program: Program<'info, ForgeYield>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
    pub rent: Sysvar<'info, Rent>,
}

/// Accounts shared by every instruction that moves market balances
#[derive(Accounts)]
pub struct MarketOperation<'info> {
    #[account(
        mut,
        seeds = [
            MARKET_SEED,
            market.forge_id.as_ref(),
            market.market_factory_id.as_ref(),
            market.yield_contract.as_ref(),
            market.base_mint.as_ref(),
        ],
        bump = market.bump,
    )]
    pub market: Box<Account<'info, Market>>,
    #[account(seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump, seeds::program = forge_core::ID)]
    pub forge_protocol: Box<Account<'info, ForgeProtocol>>,
    /// CHECK: Checked against the market, validated by the yield program
    #[account(mut, address = market.yield_contract)]
    pub yield_contract: UncheckedAccount<'info>,
    /// CHECK: Validated by the yield program
    pub yield_source: UncheckedAccount<'info>,
    /// CHECK: Checked against the market, validated by the yield program
    #[account(mut, address = market.xyt_position)]
    pub market_xyt_position: UncheckedAccount<'info>,
    /// CHECK: Validated by the yield program against `user`
    #[account(mut)]
    pub user_xyt_position: UncheckedAccount<'info>,
    /// CHECK: The yield contract's vault, validated by the yield program
    #[account(mut)]
    pub yield_vault: UncheckedAccount<'info>,
    #[account(mut, address = market.interest_vault)]
    pub interest_vault: Box<Account<'info, TokenAccount>>,
    /// Required by liquidity instructions, unused by swaps
    #[account(
        mut,
        seeds = [LP_POSITION_SEED, market.key().as_ref(), user.key().as_ref()],
        bump = lp_position.bump,
    )]
    pub lp_position: Option<Box<Account<'info, LpPosition>>>,
    #[account(mut, address = market.base_vault)]
    pub base_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, token::mint = market.base_mint, token::authority = user)]
    pub user_token_account: Box<Account<'info, TokenAccount>>,
    #[account(mut, address = market.lp_mint)]
    pub lp_mint: Box<Account<'info, Mint>>,
    #[account(mut, token::mint = market.lp_mint, token::authority = user)]
    pub user_lp_account: Box<Account<'info, TokenAccount>>,
    #[account(
        mut,
        token::mint = market.lp_mint,
        constraint = treasury_lp_account.owner == forge_protocol.treasury @ MarketError::Unauthorized,
    )]
    pub treasury_lp_account: Box<Account<'info, TokenAccount>>,
    #[account(mut)]
    pub user: Signer<'info>,
    pub forge_yield_program: Program<'info, ForgeYield>,
    pub token_program: Program<'info, Token>,
}

impl<'info> MarketOperation<'info> {
    pub fn collect_interest(&mut self) -> Result<u64> {
        collect_interest(
            &mut self.market,
            &self.forge_protocol,
            &self.yield_contract,
            &self.yield_source,
            &self.market_xyt_position,
            &self.yield_vault,
            &mut self.interest_vault,
            &self.forge_yield_program,
            &self.token_program,
        )
    }

    /// Run `apply` on the market and the caller's LP position
    pub fn update_lp_position(
        &mut self,
        apply: impl FnOnce(&mut Market, &mut LpPosition) -> Result<()>,
    ) -> Result<()> {
        let position = self
            .lp_position
            .as_deref_mut()
            .ok_or(MarketError::LpPositionRequired)?;
        apply(&mut **self.market, &mut **position)
    }

    fn transfer_xyt(
        &self,
        from: AccountInfo<'info>,
        to: AccountInfo<'info>,
        authority: AccountInfo<'info>,
        signer: &[&[&[u8]]],
        amount: u64,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let cpi_accounts = forge_yield::cpi::accounts::TransferClaim {
            yield_contract: self.yield_contract.to_account_info(),
            yield_source: self.yield_source.to_account_info(),
            forge_protocol: self.forge_protocol.to_account_info(),
            from_position: from,
            to_position: to,
            authority,
        };
        forge_yield::cpi::transfer_yield_claim(
            CpiContext::new_with_signer(self.forge_yield_program.to_account_info(), cpi_accounts, signer),
            amount,
        )
    }

    /// Move `amount` of `asset` from the user into the market
    pub fn pay_in(&self, asset: Asset, amount: u64) -> Result<()> {
        match asset {
            Asset::Xyt => self.transfer_xyt(
                self.user_xyt_position.to_account_info(),
                self.market_xyt_position.to_account_info(),
                self.user.to_account_info(),
                &[],
                amount,
            ),
            Asset::Token => {
                if amount == 0 {
                    return Ok(());
                }
                let cpi_accounts = Transfer {
                    from: self.user_token_account.to_account_info(),
                    to: self.base_vault.to_account_info(),
                    authority: self.user.to_account_info(),
                };
                token::transfer(
                    CpiContext::new(self.token_program.to_account_info(), cpi_accounts),
                    amount,
                )
            }
        }
    }

    /// Move `amount` of `asset` from the market to the user
    pub fn pay_out(&self, asset: Asset, amount: u64) -> Result<()> {
        let market = &self.market;
        let seeds: &[&[u8]] = &[
            MARKET_SEED,
            market.forge_id.as_ref(),
            market.market_factory_id.as_ref(),
            market.yield_contract.as_ref(),
            market.base_mint.as_ref(),
            &[market.bump],
        ];
        let signer = &[seeds];
        match asset {
            Asset::Xyt => self.transfer_xyt(
                self.market_xyt_position.to_account_info(),
                self.user_xyt_position.to_account_info(),
                self.market.to_account_info(),
                signer,
                amount,
            ),
            Asset::Token => {
                if amount == 0 {
                    return Ok(());
                }
                let cpi_accounts = Transfer {
                    from: self.base_vault.to_account_info(),
                    to: self.user_token_account.to_account_info(),
                    authority: self.market.to_account_info(),
                };
                token::transfer(
                    CpiContext::new_with_signer(self.token_program.to_account_info(), cpi_accounts, signer),
                    amount,
                )
            }
        }
    }

    fn mint_lp(&self, to: AccountInfo<'info>, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let market = &self.market;
        let seeds: &[&[u8]] = &[
            MARKET_SEED,
            market.forge_id.as_ref(),
            market.market_factory_id.as_ref(),
            market.yield_contract.as_ref(),
            market.base_mint.as_ref(),
            &[market.bump],
        ];
        let signer = &[seeds];
        let cpi_accounts = MintTo {
            mint: self.lp_mint.to_account_info(),
            to,
            authority: self.market.to_account_info(),
        };
        token::mint_to(
            CpiContext::new_with_signer(self.token_program.to_account_info(), cpi_accounts, signer),
            amount,
        )
    }

    pub fn mint_lp_to_user(&self, amount: u64) -> Result<()> {
        self.mint_lp(self.user_lp_account.to_account_info(), amount)
    }

    /// Protocol fee LP goes to the treasury
    pub fn mint_lp_to_treasury(&self, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        self.mint_lp(self.treasury_lp_account.to_account_info(), amount)?;
        emit!(ProtocolFeeMinted {
            market: self.market.key(),
            lp: amount,
        });
        Ok(())
    }

    /// Emits `CurveShifted` if the weights moved in this slot
    pub fn emit_curve_shift(&self, slot: u64) {
        let market = &self.market;
        if market.last_curve_shift_slot == slot {
            emit!(CurveShifted {
                market: market.key(),
                weight_xyt: market.weight_xyt,
                weight_token: market.weight_token,
                slot,
            });
        }
    }

    pub fn burn_user_lp(&self, amount: u64) -> Result<()> {
        let cpi_accounts = Burn {
            mint: self.lp_mint.to_account_info(),
            from: self.user_lp_account.to_account_info(),
            authority: self.user.to_account_info(),
        };
        token::burn(
            CpiContext::new(self.token_program.to_account_info(), cpi_accounts),
            amount,
        )
    }
}

#[derive(Accounts)]
pub struct OpenLpPosition<'info> {
    pub market: Box<Account<'info, Market>>,
    #[account(
        init,
        payer = user,
        space = LpPosition::SIZE,
        seeds = [LP_POSITION_SEED, market.key().as_ref(), user.key().as_ref()],
        bump
    )]
    pub lp_position: Box<Account<'info, LpPosition>>,
    #[account(mut)]
    pub user: Signer<'info>,
    pub system_program: Program<'info, System>,
}

/// Accounts needed to collect the market's XYT interest
#[derive(Accounts)]
pub struct InterestCollection<'info> {
    #[account(
        mut,
        seeds = [
            MARKET_SEED,
            market.forge_id.as_ref(),
            market.market_factory_id.as_ref(),
            market.yield_contract.as_ref(),
            market.base_mint.as_ref(),
        ],
        bump = market.bump,
    )]
    pub market: Box<Account<'info, Market>>,
    #[account(seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump, seeds::program = forge_core::ID)]
    pub forge_protocol: Box<Account<'info, ForgeProtocol>>,
    /// CHECK: Checked against the market, validated by the yield program
    #[account(mut, address = market.yield_contract)]
    pub yield_contract: UncheckedAccount<'info>,
    /// CHECK: Validated by the yield program
    pub yield_source: UncheckedAccount<'info>,
    /// CHECK: Checked against the market, validated by the yield program
    #[account(mut, address = market.xyt_position)]
    pub market_xyt_position: UncheckedAccount<'info>,
    /// CHECK: The yield contract's vault, validated by the yield program
    #[account(mut)]
    pub yield_vault: UncheckedAccount<'info>,
    #[account(mut, address = market.interest_vault)]
    pub interest_vault: Box<Account<'info, TokenAccount>>,
    pub forge_yield_program: Program<'info, ForgeYield>,
    pub token_program: Program<'info, Token>,
}

impl<'info> InterestCollection<'info> {
    pub fn collect(&mut self) -> Result<u64> {
        collect_interest(
            &mut self.market,
            &self.forge_protocol,
            &self.yield_contract,
            &self.yield_source,
            &self.market_xyt_position,
            &self.yield_vault,
            &mut self.interest_vault,
            &self.forge_yield_program,
            &self.token_program,
        )
    }
}

#[derive(Accounts)]
pub struct TransferLp<'info> {
    pub collection: InterestCollection<'info>,
    #[account(
        mut,
        seeds = [LP_POSITION_SEED, collection.market.key().as_ref(), owner.key().as_ref()],
        bump = from_position.bump,
    )]
    pub from_position: Box<Account<'info, LpPosition>>,
    #[account(
        mut,
        constraint = to_position.market == collection.market.key() @ MarketError::InvalidLpPosition,
        constraint = to_position.key() != from_position.key() @ MarketError::InvalidLpPosition,
    )]
    pub to_position: Box<Account<'info, LpPosition>>,
    #[account(mut, token::mint = collection.market.lp_mint, token::authority = owner)]
    pub from_lp_account: Box<Account<'info, TokenAccount>>,
    #[account(
        mut,
        token::mint = collection.market.lp_mint,
        constraint = to_lp_account.owner == to_position.owner @ MarketError::Unauthorized,
    )]
    pub to_lp_account: Box<Account<'info, TokenAccount>>,
    pub owner: Signer<'info>,
}

#[derive(Accounts)]
pub struct RedeemLpInterests<'info> {
    pub collection: InterestCollection<'info>,
    #[account(
        mut,
        seeds = [LP_POSITION_SEED, collection.market.key().as_ref(), user.key().as_ref()],
        bump = lp_position.bump,
    )]
    pub lp_position: Box<Account<'info, LpPosition>>,
    #[account(mut, token::mint = collection.interest_vault.mint, token::authority = user)]
    pub user_token_account: Box<Account<'info, TokenAccount>>,
    pub user: Signer<'info>,
}

#[derive(Accounts)]
pub struct ReadMarket<'info> {
    pub market: Box<Account<'info, Market>>,
    #[account(seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump, seeds::program = forge_core::ID)]
    pub forge_protocol: Box<Account<'info, ForgeProtocol>>,
}

#[event]
pub struct ProtocolFeeMinted {
    pub market: Pubkey,
    pub lp: u64,
}

#[event]
pub struct CurveShifted {
    pub market: Pubkey,
    pub weight_xyt: u64,
    pub weight_token: u64,
    pub slot: u64,
}

#[event]
pub struct InterestCollected {
    pub market: Pubkey,
    pub amount: u64,
    pub lp_interest_index: u128,
}

#[event]
pub struct MarketCreated {
    pub market: Pubkey,
    pub yield_contract: Pubkey,
    pub base_mint: Pubkey,
}
