//! Shamir secret sharing over GF(2^8)
//!
//! Each secret byte is the constant term of a random polynomial of degree
//! `threshold - 1`; share `x` holds the polynomial evaluated at `x` for every
//! byte. Arithmetic uses the Rijndael polynomial (x^8 + x^4 + x^3 + x + 1).
//!
//! Payload layout: `x[1] || y[secret_len]`. The string form of a payload is
//! lowercase hex.

use crate::error::{Result, ShardKeepError};
use crate::primitives::{CombineError, SecretCombiner, SecretSplitter};
use crate::MAX_SHARES;
use aes_gcm::aead::OsRng;
use rand::RngCore;

/// Multiply in GF(2^8)
fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    product
}

/// Multiplicative inverse in GF(2^8) as a^254. `a` must be non-zero.
fn gf_inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp > 0 {
        if exp & 1 == 1 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

/// Evaluate a polynomial (coefficients lowest degree first) at `x`
fn eval(coefficients: &[u8], x: u8) -> u8 {
    coefficients
        .iter()
        .rev()
        .fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
}

/// Default GF(256) Shamir implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct Gf256Shamir;

impl Gf256Shamir {
    pub fn new() -> Self {
        Self
    }
}

impl SecretSplitter for Gf256Shamir {
    fn split(&self, secret: &[u8], total: u8, threshold: u8) -> Result<Vec<Vec<u8>>> {
        if secret.is_empty() {
            return Err(ShardKeepError::InvalidParameters(
                "secret must not be empty".to_string(),
            ));
        }
        if threshold == 0 || total < threshold || total as usize > MAX_SHARES {
            return Err(ShardKeepError::InvalidParameters(format!(
                "need 1 <= threshold ({}) <= total ({}) <= {}",
                threshold, total, MAX_SHARES
            )));
        }

        let mut payloads: Vec<Vec<u8>> = (1..=total)
            .map(|x| {
                let mut p = Vec::with_capacity(secret.len() + 1);
                p.push(x);
                p
            })
            .collect();

        let mut coefficients = vec![0u8; threshold as usize];
        for &byte in secret {
            coefficients[0] = byte;
            OsRng.fill_bytes(&mut coefficients[1..]);
            for payload in payloads.iter_mut() {
                let x = payload[0];
                payload.push(eval(&coefficients, x));
            }
        }
        coefficients.iter_mut().for_each(|c| *c = 0);

        Ok(payloads)
    }
}

impl SecretCombiner for Gf256Shamir {
    fn combine_str(&self, payloads: &[String]) -> std::result::Result<Vec<u8>, CombineError> {
        let decoded = payloads
            .iter()
            .map(|p| hex::decode(p.trim()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| CombineError::TypeMismatch(format!("payload is not hex: {}", e)))?;
        self.combine_bytes(&decoded)
    }

    fn combine_bytes(&self, payloads: &[Vec<u8>]) -> std::result::Result<Vec<u8>, CombineError> {
        let first = payloads
            .first()
            .ok_or_else(|| CombineError::Failed("no payloads".to_string()))?;
        if first.len() < 2 {
            return Err(CombineError::Failed("payload too short".to_string()));
        }
        if payloads.iter().any(|p| p.len() != first.len()) {
            return Err(CombineError::Failed(
                "payloads differ in length".to_string(),
            ));
        }

        let xs: Vec<u8> = payloads.iter().map(|p| p[0]).collect();
        if xs.contains(&0) {
            return Err(CombineError::Failed("payload has x = 0".to_string()));
        }
        for (i, x) in xs.iter().enumerate() {
            if xs[i + 1..].contains(x) {
                return Err(CombineError::Failed(format!(
                    "two payloads share x = {}",
                    x
                )));
            }
        }

        // Lagrange basis values at 0: l_i = prod_{m != i} x_m / (x_m - x_i)
        let basis: Vec<u8> = xs
            .iter()
            .enumerate()
            .map(|(i, &xi)| {
                xs.iter()
                    .enumerate()
                    .filter(|(m, _)| *m != i)
                    .fold(1u8, |acc, (_, &xm)| gf_mul(acc, gf_mul(xm, gf_inv(xm ^ xi))))
            })
            .collect();

        let secret_len = first.len() - 1;
        let secret = (0..secret_len)
            .map(|j| {
                payloads
                    .iter()
                    .zip(&basis)
                    .fold(0u8, |acc, (p, &l)| acc ^ gf_mul(p[j + 1], l))
            })
            .collect();

        Ok(secret)
    }
}
