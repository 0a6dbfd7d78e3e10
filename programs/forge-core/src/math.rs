//! Fixed-point arithmetic shared by the market and reward programs.
//!
//! Values are unsigned integers scaled by `RONE = 2^40`. `rmul` and `rdiv`
//! round half-up, `mul_down` and `div_down` truncate. Intermediate products
//! are carried in a 256-bit integer so `balance * RONE * RONE` cannot wrap.

use anchor_lang::prelude::*;

use crate::state::ForgeError;

pub use wide_int::U256;

// Kept apart from the Anchor prelude: the macro expands against std `Result`.
mod wide_int {
    use uint::construct_uint;

    construct_uint! {
        /// 256-bit unsigned integer for intermediate products.
        pub struct U256(4);
    }
}

pub const PRECISION_BITS: u32 = 40;
pub const RONE: u128 = 1 << PRECISION_BITS;

const LN2_NUMERATOR: u128 = 6_931_471_805_599_453_094_172;
const LN2_DENOMINATOR: u128 = 10_000_000_000_000_000_000_000;
const RPOWE_MAX_TERMS: u128 = 500;

#[inline]
fn wide(x: u128) -> U256 {
    U256::from(x)
}

fn narrow(x: U256) -> Result<u128> {
    require!(x.bits() <= 128, ForgeError::MathOverflow);
    Ok(x.low_u128())
}

/// `x * y / RONE`, rounded half-up.
pub fn rmul(x: u128, y: u128) -> Result<u128> {
    let product = wide(x)
        .checked_mul(wide(y))
        .ok_or(ForgeError::MathOverflow)?;
    narrow((product + wide(RONE / 2)) / wide(RONE))
}

/// `x * RONE / y`, rounded half-up.
pub fn rdiv(x: u128, y: u128) -> Result<u128> {
    require!(y > 0, ForgeError::DivisionByZero);
    let scaled = wide(x)
        .checked_mul(wide(RONE))
        .ok_or(ForgeError::MathOverflow)?;
    narrow((scaled + wide(y / 2)) / wide(y))
}

/// `a * b / RONE`, truncating.
pub fn mul_down(a: u128, b: u128) -> Result<u128> {
    mul_div(a, b, RONE)
}

/// `a * RONE / b`, truncating.
pub fn div_down(a: u128, b: u128) -> Result<u128> {
    mul_div(a, RONE, b)
}

/// `a * b / c` with a 256-bit intermediate, truncating.
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    require!(c > 0, ForgeError::DivisionByZero);
    let product = wide(a)
        .checked_mul(wide(b))
        .ok_or(ForgeError::MathOverflow)?;
    narrow(product / wide(c))
}

pub fn fpart(value: u128) -> u128 {
    value % RONE
}

pub fn to_int(value: u128) -> u128 {
    value / RONE
}

// Only called with p > q, so the quotient is at least one.
fn log2_int(p: U256, q: U256) -> u32 {
    let mut res = 0u32;
    let mut remain = p / q;
    while !remain.is_zero() {
        res += 1;
        remain = remain / U256::from(2u8);
    }
    res - 1
}

/// log2 of `x` in [RONE, 2 * RONE), by repeated squaring.
fn log2_for_small_number(mut x: u128) -> Result<u128> {
    let two = 2 * RONE;
    require!(x >= RONE && x < two, ForgeError::InvalidMathInput);

    let mut res = 0u128;
    let mut addition = RONE;
    for _ in 0..PRECISION_BITS {
        x = x * x / RONE;
        addition /= 2;
        if x >= two {
            x /= 2;
            res += addition;
        }
    }
    Ok(res)
}

/// log2(p / q) as a fixed-point number. Requires `p >= q`.
pub fn log_base2(p: u128, q: u128) -> Result<u128> {
    require!(q > 0, ForgeError::DivisionByZero);
    require!(p >= q, ForgeError::InvalidMathInput);

    let (p, q) = (wide(p), wide(q));
    let n = if p > q { log2_int(p, q) } else { 0 };
    let denominator = q
        .checked_mul(U256::from(2u8).pow(U256::from(n)))
        .ok_or(ForgeError::MathOverflow)?;
    let y = narrow(p * wide(RONE) / denominator)?;

    let small = log2_for_small_number(y)?;
    (n as u128)
        .checked_mul(RONE)
        .and_then(|whole| whole.checked_add(small))
        .ok_or_else(|| ForgeError::MathOverflow.into())
}

/// Natural log of `p / q` as a fixed-point number. Requires `p >= q`.
pub fn ln(p: u128, q: u128) -> Result<u128> {
    let log2x = log_base2(p, q)?;
    mul_div(LN2_NUMERATOR, log2x, LN2_DENOMINATOR)
}

/// e^exp by Taylor expansion, stopping once a term rounds to zero.
pub fn rpowe(exp: u128) -> Result<u128> {
    let mut res = 0u128;
    let mut cur_term = RONE;
    let mut n = 0u128;

    loop {
        res = res.checked_add(cur_term).ok_or(ForgeError::MathOverflow)?;
        cur_term = rmul(cur_term, rdiv(exp, (n + 1) * RONE)?)?;
        if cur_term == 0 {
            break;
        }
        n += 1;
        require!(n <= RPOWE_MAX_TERMS, ForgeError::MathOverflow);
    }
    Ok(res)
}

/// base^exp for a fixed-point base and an integer exponent.
pub fn rpowi(mut base: u128, mut exp: u128) -> Result<u128> {
    let mut res = if exp % 2 != 0 { base } else { RONE };

    exp /= 2;
    while exp != 0 {
        base = rmul(base, base)?;
        if exp % 2 != 0 {
            res = rmul(res, base)?;
        }
        exp /= 2;
    }
    Ok(res)
}

/// base^exp where both are fixed-point numbers.
///
/// The integer part of the exponent goes through `rpowi`, the fractional
/// part through `e^(frac * ln(base))`. Bases below one use the reciprocal
/// so the logarithm argument stays at or above one.
pub fn rpow(base: u128, exp: u128) -> Result<u128> {
    if exp == 0 {
        return Ok(RONE);
    }
    if base == 0 {
        return Ok(0);
    }

    let frac = fpart(exp);
    let whole_pow = rpowi(base, to_int(exp))?;

    let frac_pow = if base < RONE {
        let new_exp = rmul(frac, ln(rdiv(RONE, base)?, RONE)?)?;
        rdiv(RONE, rpowe(new_exp)?)?
    } else {
        let new_exp = rmul(frac, ln(base, RONE)?)?;
        rpowe(new_exp)?
    };
    rmul(whole_pow, frac_pow)
}

/// Integer square root (Babylonian method).
pub fn sqrt(y: u128) -> u128 {
    if y > 3 {
        let mut z = y;
        let mut x = y / 2 + 1;
        while x < z {
            z = x;
            x = (y / x + x) / 2;
        }
        z
    } else if y != 0 {
        1
    } else {
        0
    }
}

pub fn max(a: u128, b: u128) -> u128 {
    a.max(b)
}

pub fn min(a: u128, b: u128) -> u128 {
    a.min(b)
}

/// `a - b`, floored at zero.
pub fn sub_max0(a: u128, b: u128) -> u128 {
    a.saturating_sub(b)
}
