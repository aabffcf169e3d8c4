//! Identifier generation.

use ulid::Ulid;

/// Hands out lowercase ULIDs for votes, choices, casts and roster entries.
///
/// ULIDs sort by creation time at millisecond resolution, so primary-key
/// inserts stay append-mostly.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdGenerator;

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Next identifier (26 lowercase Crockford base32 characters).
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_lowercase_ulids() {
        let ids = IdGenerator::new();
        let first = ids.generate();
        let second = ids.generate();

        assert_eq!(first.len(), 26);
        assert_ne!(first, second);
        assert!(first.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert!(Ulid::from_string(&first.to_uppercase()).is_ok());
    }
}
