use anchor_lang::prelude::*;

pub mod directory;
pub mod math;
pub mod state;

pub use directory::*;
pub use state::*;

declare_id!("CtR5tkwzpUmyxMNnihkPdSZzVk5fws1LumXXGyU4phJa");

#[program]
pub mod forge_core {
    use super::*;

    /// Initialize the protocol config
    pub fn initialize_protocol(
        ctx: Context<InitializeProtocol>,
        protocol_config: ProtocolConfig,
    ) -> Result<()> {
        let forge_protocol = &mut ctx.accounts.forge_protocol;
        let clock = Clock::get()?;

        forge_protocol.apply_config(&protocol_config)?;
        forge_protocol.authority = ctx.accounts.authority.key();
        forge_protocol.treasury = ctx.accounts.treasury.key();
        forge_protocol.yield_contract_count = 0;
        forge_protocol.market_count = 0;
        forge_protocol.is_active = true;
        forge_protocol.created_at = clock.unix_timestamp;
        forge_protocol.bump = ctx.bumps.forge_protocol;

        msg!(
            "Forge Protocol initialized: swap fee {}, protocol fee {}, forge fee {} bps",
            protocol_config.swap_fee,
            protocol_config.protocol_swap_fee,
            protocol_config.forge_fee_bps
        );
        Ok(())
    }

    /// Update protocol configuration (only authority)
    pub fn update_protocol_config(
        ctx: Context<UpdateProtocolConfig>,
        new_config: ProtocolConfig,
    ) -> Result<()> {
        let forge_protocol = &mut ctx.accounts.forge_protocol;
        require_keys_eq!(
            forge_protocol.authority,
            ctx.accounts.authority.key(),
            ForgeError::Unauthorized
        );

        forge_protocol.apply_config(&new_config)?;

        emit!(ProtocolConfigUpdated {
            swap_fee: new_config.swap_fee,
            protocol_swap_fee: new_config.protocol_swap_fee,
            forge_fee_bps: new_config.forge_fee_bps,
            curve_shift_block_delta: new_config.curve_shift_block_delta,
        });
        msg!("Protocol configuration updated");
        Ok(())
    }

    /// Pause/Resume protocol (emergency function)
    pub fn set_protocol_status(ctx: Context<SetProtocolStatus>, is_active: bool) -> Result<()> {
        let forge_protocol = &mut ctx.accounts.forge_protocol;
        require_keys_eq!(
            forge_protocol.authority,
            ctx.accounts.authority.key(),
            ForgeError::Unauthorized
        );
        require!(
            forge_protocol.is_active != is_active,
            ForgeError::InvalidConfig
        );

        forge_protocol.is_active = is_active;

        msg!("Protocol status set to: {}", is_active);
        Ok(())
    }

    /// Record a new yield contract. Called by the yield program through CPI;
    /// the record PDA is keyed by (forge, underlying, expiry), so a second
    /// registration of the same triple fails at account creation.
    pub fn register_yield_contract(
        ctx: Context<RegisterYieldContract>,
        forge_id: ForgeId,
        underlying_mint: Pubkey,
        expiry: i64,
        yield_contract: Pubkey,
    ) -> Result<()> {
        let forge_protocol = &mut ctx.accounts.forge_protocol;
        require!(forge_protocol.is_active, ForgeError::ProtocolInactive);
        require_keys_eq!(
            ctx.accounts.forge_authority.key(),
            ForgeProtocol::program_authority(&forge_protocol.yield_program),
            ForgeError::Unauthorized
        );

        let index = forge_protocol.yield_contract_count;
        ctx.accounts.record.set_inner(YieldContractRecord {
            index,
            forge_id,
            underlying_mint,
            expiry,
            yield_contract,
            created_at: Clock::get()?.unix_timestamp,
            bump: ctx.bumps.record,
        });
        forge_protocol.yield_contract_count = index
            .checked_add(1)
            .ok_or(ForgeError::MathOverflow)?;

        emit!(YieldContractRegistered {
            index,
            forge_id,
            underlying_mint,
            expiry,
            yield_contract,
        });
        Ok(())
    }

    /// Record a new market. Called by the market program through CPI.
    pub fn register_market(
        ctx: Context<RegisterMarket>,
        forge_id: ForgeId,
        market_factory_id: ForgeId,
        yield_contract: Pubkey,
        base_mint: Pubkey,
        market: Pubkey,
    ) -> Result<()> {
        let forge_protocol = &mut ctx.accounts.forge_protocol;
        require!(forge_protocol.is_active, ForgeError::ProtocolInactive);
        require_keys_eq!(
            ctx.accounts.forge_authority.key(),
            ForgeProtocol::program_authority(&forge_protocol.market_program),
            ForgeError::Unauthorized
        );

        let index = forge_protocol.market_count;
        ctx.accounts.record.set_inner(MarketRecord {
            index,
            forge_id,
            market_factory_id,
            yield_contract,
            base_mint,
            market,
            created_at: Clock::get()?.unix_timestamp,
            bump: ctx.bumps.record,
        });
        forge_protocol.market_count = index.checked_add(1).ok_or(ForgeError::MathOverflow)?;

        emit!(MarketRegistered {
            index,
            forge_id,
            market_factory_id,
            yield_contract,
            base_mint,
            market,
        });
        Ok(())
    }

    /// Page of yield contracts starting at `start`. The records are passed as
    /// remaining accounts in index order.
    pub fn list_yield_contracts<'info>(
        ctx: Context<'_, '_, 'info, 'info, ReadDirectory<'info>>,
        start: u64,
    ) -> Result<Vec<YieldContractRecord>> {
        let mut records = Vec::with_capacity(ctx.remaining_accounts.len());
        for info in ctx.remaining_accounts.iter() {
            let record: Account<YieldContractRecord> = Account::try_from(info)?;
            records.push(record.into_inner());
        }
        let indices: Vec<u64> = records.iter().map(|r| r.index).collect();
        check_page(&indices, start, ctx.accounts.forge_protocol.yield_contract_count)?;
        Ok(records)
    }

    /// Page of markets starting at `start`, passed like `list_yield_contracts`
    pub fn list_markets<'info>(
        ctx: Context<'_, '_, 'info, 'info, ReadDirectory<'info>>,
        start: u64,
    ) -> Result<Vec<MarketRecord>> {
        let mut records = Vec::with_capacity(ctx.remaining_accounts.len());
        for info in ctx.remaining_accounts.iter() {
            let record: Account<MarketRecord> = Account::try_from(info)?;
            records.push(record.into_inner());
        }
        let indices: Vec<u64> = records.iter().map(|r| r.index).collect();
        check_page(&indices, start, ctx.accounts.forge_protocol.market_count)?;
        Ok(records)
    }

    /// Number of yield contracts created at or after `since`. The caller
    /// passes the first record at or after `since` and the one before it.
    pub fn count_created_since(ctx: Context<CountCreatedSince>, since: i64) -> Result<u64> {
        let boundary = |record: &Option<Account<YieldContractRecord>>| {
            record.as_ref().map(|r| (r.index, r.created_at))
        };
        directory::count_created_since(
            ctx.accounts.forge_protocol.yield_contract_count,
            since,
            boundary(&ctx.accounts.first_since),
            boundary(&ctx.accounts.last_before),
        )
    }
}

#[derive(Accounts)]
pub struct InitializeProtocol<'info> {
    #[account(
        init,
        payer = authority,
        space = ForgeProtocol::SIZE,
        seeds = [FORGE_PROTOCOL_SEED],
        bump
    )]
    pub forge_protocol: Account<'info, ForgeProtocol>,
    #[account(mut)]
    pub authority: Signer<'info>,
    /// CHECK: Treasury wallet. Fee token accounts are checked against this key
    /// by the programs that pay into them.
    pub treasury: UncheckedAccount<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct UpdateProtocolConfig<'info> {
    #[account(mut, has_one = authority)]
    pub forge_protocol: Account<'info, ForgeProtocol>,
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct SetProtocolStatus<'info> {
    #[account(mut, has_one = authority)]
    pub forge_protocol: Account<'info, ForgeProtocol>,
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
#[instruction(forge_id: ForgeId, underlying_mint: Pubkey, expiry: i64)]
pub struct RegisterYieldContract<'info> {
    #[account(mut, seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump)]
    pub forge_protocol: Account<'info, ForgeProtocol>,
    #[account(
        init,
        payer = payer,
        space = YieldContractRecord::SIZE,
        seeds = [
            YIELD_CONTRACT_RECORD_SEED,
            forge_id.as_ref(),
            underlying_mint.as_ref(),
            &expiry.to_le_bytes(),
        ],
        bump
    )]
    pub record: Account<'info, YieldContractRecord>,
    /// PDA of the yield program; only that program can sign for it
    pub forge_authority: Signer<'info>,
    #[account(mut)]
    pub payer: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(
    forge_id: ForgeId,
    market_factory_id: ForgeId,
    yield_contract: Pubkey,
    base_mint: Pubkey,
    market: Pubkey,
)]
pub struct RegisterMarket<'info> {
    #[account(mut, seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump)]
    pub forge_protocol: Account<'info, ForgeProtocol>,
    #[account(
        init,
        payer = payer,
        space = MarketRecord::SIZE,
        seeds = [MARKET_RECORD_SEED, market.as_ref()],
        bump
    )]
    pub record: Account<'info, MarketRecord>,
    /// PDA of the market program; only that program can sign for it
    pub forge_authority: Signer<'info>,
    #[account(mut)]
    pub payer: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct ReadDirectory<'info> {
    #[account(seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump)]
    pub forge_protocol: Account<'info, ForgeProtocol>,
}

#[derive(Accounts)]
pub struct CountCreatedSince<'info> {
    #[account(seeds = [FORGE_PROTOCOL_SEED], bump = forge_protocol.bump)]
    pub forge_protocol: Account<'info, ForgeProtocol>,
    pub first_since: Option<Account<'info, YieldContractRecord>>,
    pub last_before: Option<Account<'info, YieldContractRecord>>,
}

#[event]
pub struct ProtocolConfigUpdated {
    pub swap_fee: u64,
    pub protocol_swap_fee: u64,
    pub forge_fee_bps: u64,
    pub curve_shift_block_delta: u64,
}

#[event]
pub struct YieldContractRegistered {
    pub index: u64,
    pub forge_id: ForgeId,
    pub underlying_mint: Pubkey,
    pub expiry: i64,
    pub yield_contract: Pubkey,
}

#[event]
pub struct MarketRegistered {
    pub index: u64,
    pub forge_id: ForgeId,
    pub market_factory_id: ForgeId,
    pub yield_contract: Pubkey,
    pub base_mint: Pubkey,
    pub market: Pubkey,
}
