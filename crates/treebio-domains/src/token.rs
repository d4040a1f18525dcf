//! Verification token generation

use rand::Rng;

/// Namespace prefix so the token is recognizable in DNS zones and
/// well-known files as belonging to Treebio.
pub const TOKEN_PREFIX: &str = "treebio-verify-";

const TOKEN_RANDOM_LEN: usize = 32;

/// Generate a fresh ownership-proof token.
///
/// 32 characters from a 62-symbol alphabet gives ~190 bits of entropy,
/// comfortably above the 128-bit floor needed to survive the DNS
/// propagation window unguessed. Tokens are never reused; every
/// registration gets its own.
pub fn generate_verification_token() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();

    let random_part: String = (0..TOKEN_RANDOM_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    format!("{}{}", TOKEN_PREFIX, random_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn token_carries_namespace_prefix() {
        let token = generate_verification_token();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(token.len(), TOKEN_PREFIX.len() + TOKEN_RANDOM_LEN);
    }

    #[test]
    fn token_random_part_is_alphanumeric() {
        let token = generate_verification_token();
        let random_part = &token[TOKEN_PREFIX.len()..];
        assert!(random_part.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_are_unique() {
        let tokens: HashSet<String> = (0..200).map(|_| generate_verification_token()).collect();
        assert_eq!(tokens.len(), 200);
    }
}
