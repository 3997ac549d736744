//! Random numbers, Miller–Rabin and modular exponentiation for key negotiation.
//!
//! Primes are drawn below 2^31 and tested with exactly five Miller–Rabin
//! rounds. Slaves in the field were built against those parameters, so they
//! are not tunable.

use rand::Rng;

/// Exclusive upper bound for random exponents and prime candidates
pub const MAX_RANDOM_INTEGER: u64 = 1 << 31;

/// Miller–Rabin rounds per candidate
pub const MILLER_RABIN_ROUNDS: u32 = 5;

/// Uniform 64-bit value from the thread-local CSPRNG (OS-seeded ChaCha)
pub fn random_u64() -> u64 {
    rand::rng().random()
}

/// Random value in `[0, 2^31)`
pub fn random_below_limit() -> u64 {
    random_u64() % MAX_RANDOM_INTEGER
}

/// `base^exponent mod modulus` by square-and-multiply.
///
/// Products are widened to u128 so operands up to `u64::MAX` never wrap.
pub fn pow_mod(base: u64, mut exponent: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }

    let m = u128::from(modulus);
    let mut square = u128::from(base) % m;
    let mut result: u128 = 1;
    while exponent != 0 {
        if exponent & 1 != 0 {
            result = result * square % m;
        }
        square = square * square % m;
        exponent >>= 1;
    }
    result as u64
}

/// Multiply two residues without overflow
#[inline]
fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    (u128::from(a) * u128::from(b) % u128::from(modulus)) as u64
}

/// One Miller–Rabin round for odd `n` with witness `a`
fn single_round(n: u64, a: u64) -> bool {
    let mut d = n - 1;
    let mut s = 0u32;
    while d & 1 == 0 {
        d >>= 1;
        s += 1;
    }
    if s == 0 {
        return false;
    }

    let mut x = pow_mod(a, d, n);
    if x == 1 || x == n - 1 {
        return true;
    }
    for _ in 1..s {
        x = mul_mod(x, x, n);
        if x == 1 {
            return false;
        }
        if x == n - 1 {
            return true;
        }
    }
    false
}

/// Probabilistic primality test with `rounds` random witnesses in `[2, n-3]`
pub fn miller_rabin(n: u64, rounds: u32) -> bool {
    match n {
        0 | 1 | 4 => return false,
        2 | 3 => return true,
        _ if n & 1 == 0 => return false,
        _ => {}
    }

    let mut rng = rand::rng();
    (0..rounds).all(|_| {
        let a = rng.random_range(2..=n - 3);
        single_round(n, a)
    })
}

/// Draw an odd probable prime below 2^31.
///
/// A random odd start is walked upwards in steps of two until a candidate
/// survives [`MILLER_RABIN_ROUNDS`] rounds. 2^31 - 1 is itself prime, so the
/// walk never leaves the range.
pub fn generate_prime() -> u64 {
    let mut candidate = random_below_limit() | 1;
    while !miller_rabin(candidate, MILLER_RABIN_ROUNDS) {
        candidate += 2;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_prime_trial(n: u64) -> bool {
        if n < 2 {
            return false;
        }
        let mut d = 2u64;
        while d * d <= n {
            if n % d == 0 {
                return false;
            }
            d += 1;
        }
        true
    }

    #[test]
    fn test_pow_mod_small_values() {
        assert_eq!(pow_mod(2, 10, 1000), 24);
        assert_eq!(pow_mod(3, 0, 7), 1);
        assert_eq!(pow_mod(0, 5, 7), 0);
        assert_eq!(pow_mod(5, 3, 1), 0);
    }

    #[test]
    fn test_pow_mod_does_not_wrap() {
        // (2^63)^2 overflows u64; the widened product must not
        let m = 0xFFFF_FFFF_FFFF_FFC5; // largest 64-bit prime
        let base = 1u64 << 63;
        let expected = ((u128::from(base) * u128::from(base)) % u128::from(m)) as u64;
        assert_eq!(pow_mod(base, 2, m), expected);
    }

    #[test]
    fn test_miller_rabin_known_values() {
        for p in [5u64, 7, 11, 13, 104_729, 2_147_483_647] {
            assert!(miller_rabin(p, MILLER_RABIN_ROUNDS), "{p} is prime");
        }
        for c in [9u64, 15, 21, 561, 1_105, 2_147_483_649] {
            assert!(!miller_rabin(c, 20), "{c} is composite");
        }
        assert!(!miller_rabin(1, 5));
        assert!(miller_rabin(3, 5));
    }

    #[test]
    fn test_generate_prime_is_odd_prime_below_limit() {
        for _ in 0..16 {
            let p = generate_prime();
            assert_eq!(p & 1, 1);
            assert!(p < MAX_RANDOM_INTEGER);
            assert!(is_prime_trial(p), "{p} failed trial division");
        }
    }
}
