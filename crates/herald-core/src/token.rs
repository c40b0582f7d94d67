//! Subscriber tokens and the allocator that issues them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Opaque identifier handed to a subscriber when it registers.
///
/// Tokens are plain integers on the wire (the control protocol carries them
/// as decimal strings) but are kept as a newtype so they cannot be confused
/// with counts or ports inside the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(u64);

impl Token {
    /// Wraps a raw token value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw token value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Parses a token from its decimal string form.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidToken` for empty, negative, non-numeric
    /// or out-of-range input.
    pub fn parse(value: &str) -> CoreResult<Self> {
        value
            .parse::<u64>()
            .map(Self)
            .map_err(|e| CoreError::InvalidToken {
                value: value.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Token {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for Token {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Issues strictly increasing tokens.
///
/// The counter is independent of how many subscribers are currently
/// registered, so a token is never handed out twice even after the
/// subscriber it named is gone. The allocator itself is not synchronized;
/// it lives inside the registry's critical section.
#[derive(Debug, Default)]
pub struct TokenAllocator {
    next: u64,
}

impl TokenAllocator {
    /// Creates an allocator whose first token is `0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator whose first token is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Returns a fresh token.
    ///
    /// Tokens are unique for the first 2^64 calls. The counter saturates at
    /// `u64::MAX` instead of wrapping, so an exhausted allocator never hands
    /// out a low token again.
    pub fn next(&mut self) -> Token {
        let token = Token(self.next);
        self.next = self.next.saturating_add(1);
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_allocator_starts_at_zero() {
        let mut allocator = TokenAllocator::new();
        assert_eq!(allocator.next(), Token::new(0));
        assert_eq!(allocator.next(), Token::new(1));
        assert_eq!(allocator.next(), Token::new(2));
    }

    #[test]
    fn test_allocator_is_strictly_increasing() {
        let mut allocator = TokenAllocator::starting_at(40);
        let mut previous = allocator.next();
        for _ in 0..1000 {
            let token = allocator.next();
            assert!(token > previous);
            previous = token;
        }
    }

    #[test]
    fn test_allocator_never_repeats() {
        let mut allocator = TokenAllocator::new();
        let tokens: HashSet<Token> = (0..10_000).map(|_| allocator.next()).collect();
        assert_eq!(tokens.len(), 10_000);
    }

    #[test]
    fn test_allocator_saturates_at_max() {
        let mut allocator = TokenAllocator::starting_at(u64::MAX - 1);
        assert_eq!(allocator.next(), Token::new(u64::MAX - 1));
        assert_eq!(allocator.next(), Token::new(u64::MAX));
        assert_eq!(allocator.next(), Token::new(u64::MAX));
    }

    #[test]
    fn test_parse_token() {
        assert_eq!(Token::parse("0").unwrap(), Token::new(0));
        assert_eq!("42".parse::<Token>().unwrap(), Token::new(42));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "abc", "-1", "1.5", " 3", "18446744073709551616"] {
            let err = Token::parse(input).unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidToken { ref value, .. } if value == input),
                "expected InvalidToken for {input:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let token = Token::new(1234);
        assert_eq!(token.to_string(), "1234");
        assert_eq!(Token::parse(&token.to_string()).unwrap(), token);
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&Token::new(7)).unwrap();
        assert_eq!(json, "7");
        let token: Token = serde_json::from_str("9").unwrap();
        assert_eq!(token, Token::new(9));
    }
}
