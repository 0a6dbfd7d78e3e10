use anchor_lang::prelude::*;

use crate::math::RONE;

pub const FORGE_PROTOCOL_SEED: &[u8] = b"forge_protocol";
/// Seed of the PDA each registered program signs directory writes with.
pub const FORGE_AUTHORITY_SEED: &[u8] = b"forge_authority";

pub const MAX_FORGE_FEE_BPS: u64 = 10_000;
pub const DEFAULT_CURVE_SHIFT_BLOCK_DELTA: u64 = 1;

/// Fraction of a yield contract's life, counted back from expiry, during
/// which a class of market operations is locked.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockParams {
    pub numerator: u64,
    pub denominator: u64,
}

impl LockParams {
    pub const SIZE: usize = 8 * 2;

    /// One day out of a six month contract.
    pub const DEFAULT: LockParams = LockParams {
        numerator: 1,
        denominator: 180,
    };

    pub fn validate(&self) -> Result<()> {
        require!(
            self.denominator > 0 && self.numerator < self.denominator,
            ForgeError::InvalidConfig
        );
        Ok(())
    }

    /// `expiry - (expiry - start) * numerator / denominator`
    pub fn lock_start(&self, start_time: i64, expiry: i64) -> Result<i64> {
        let duration = expiry
            .checked_sub(start_time)
            .filter(|d| *d > 0)
            .ok_or(ForgeError::InvalidConfig)?;
        let locked = (duration as i128)
            .checked_mul(self.numerator as i128)
            .and_then(|v| v.checked_div(self.denominator as i128))
            .ok_or(ForgeError::MathOverflow)?;
        Ok(expiry - locked as i64)
    }
}

#[account]
pub struct ForgeProtocol {
    pub authority: Pubkey,
    pub treasury: Pubkey,
    pub yield_program: Pubkey,
    pub market_program: Pubkey,
    pub rewards_program: Pubkey,
    pub swap_fee: u64,          // RONE-scaled, charged on swap input
    pub protocol_swap_fee: u64, // RONE-scaled share of curve growth minted to treasury
    pub forge_fee_bps: u64,     // share of paid-out interest kept by the protocol
    pub curve_shift_block_delta: u64,
    pub swap_lock: LockParams,
    pub add_liquidity_lock: LockParams,
    pub yield_contract_count: u64,
    pub market_count: u64,
    pub is_active: bool,
    pub created_at: i64,
    pub bump: u8,
}

impl ForgeProtocol {
    pub const SIZE: usize = 8 + // discriminator
        32 + // authority
        32 + // treasury
        32 + // yield_program
        32 + // market_program
        32 + // rewards_program
        8 +  // swap_fee
        8 +  // protocol_swap_fee
        8 +  // forge_fee_bps
        8 +  // curve_shift_block_delta
        LockParams::SIZE + // swap_lock
        LockParams::SIZE + // add_liquidity_lock
        8 +  // yield_contract_count
        8 +  // market_count
        1 +  // is_active
        8 +  // created_at
        1;   // bump

    pub fn apply_config(&mut self, config: &ProtocolConfig) -> Result<()> {
        config.validate()?;
        self.yield_program = config.yield_program;
        self.market_program = config.market_program;
        self.rewards_program = config.rewards_program;
        self.swap_fee = config.swap_fee;
        self.protocol_swap_fee = config.protocol_swap_fee;
        self.forge_fee_bps = config.forge_fee_bps;
        self.curve_shift_block_delta = config.curve_shift_block_delta;
        self.swap_lock = config.swap_lock;
        self.add_liquidity_lock = config.add_liquidity_lock;
        Ok(())
    }

    /// Authority PDA a registered program signs with.
    pub fn program_authority(program_id: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[FORGE_AUTHORITY_SEED], program_id).0
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug)]
pub struct ProtocolConfig {
    pub yield_program: Pubkey,
    pub market_program: Pubkey,
    pub rewards_program: Pubkey,
    pub swap_fee: u64,
    pub protocol_swap_fee: u64,
    pub forge_fee_bps: u64,
    pub curve_shift_block_delta: u64,
    pub swap_lock: LockParams,
    pub add_liquidity_lock: LockParams,
}

impl ProtocolConfig {
    pub fn validate(&self) -> Result<()> {
        require!(self.swap_fee < RONE as u64, ForgeError::ArithmeticBounds);
        require!(self.protocol_swap_fee < RONE as u64, ForgeError::ArithmeticBounds);
        require!(
            self.forge_fee_bps <= MAX_FORGE_FEE_BPS,
            ForgeError::ArithmeticBounds
        );
        require!(self.curve_shift_block_delta > 0, ForgeError::InvalidConfig);
        self.swap_lock.validate()?;
        self.add_liquidity_lock.validate()?;
        Ok(())
    }
}

#[error_code]
pub enum ForgeError {
    #[msg("Protocol is not active")]
    ProtocolInactive,
    #[msg("Unauthorized access")]
    Unauthorized,
    #[msg("Invalid configuration")]
    InvalidConfig,
    #[msg("Fee or ratio exceeds its hard cap")]
    ArithmeticBounds,
    #[msg("Entity already exists")]
    DuplicateEntity,
    #[msg("Entity not found")]
    NotFound,
    #[msg("Records do not bracket the requested range")]
    InvalidBoundary,
    #[msg("Math overflow")]
    MathOverflow,
    #[msg("Division by zero")]
    DivisionByZero,
    #[msg("Math input outside the function domain")]
    InvalidMathInput,
}
