//! Redaction strategies: masking (keep last N chars behind a placeholder),
//! hashing (deterministic, non-reversible), and full replacement. Each PII
//! category is assigned a default strategy (§4.4); the processor applies
//! it to every matched leaf outside the caller's allow-list.

use sha2::{Digest, Sha256};

use crate::detector::PiiCategory;

const MASK_PLACEHOLDER: &str = "***";
const FULL_REPLACEMENT: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionStrategy {
    /// Keep the last `keep_last` characters, replace the rest with a
    /// placeholder (e.g. `123-45-6789` -> `***-**-6789` is approximated as
    /// `***6789` — this rewrite does not try to preserve the original
    /// separator shape).
    Masking { keep_last: usize },
    /// SHA-256 of the original value, hex-encoded and truncated to a
    /// stable, non-reversible fingerprint.
    Hashing,
    /// Replace the entire value with a fixed placeholder.
    FullReplacement,
}

/// The default strategy per category, per §4.4 ("Masking and hashing
/// strategies are selected per category").
pub fn default_strategy(category: PiiCategory) -> RedactionStrategy {
    match category {
        PiiCategory::Ssn => RedactionStrategy::Masking { keep_last: 4 },
        PiiCategory::CreditCard => RedactionStrategy::Masking { keep_last: 4 },
        PiiCategory::Phone => RedactionStrategy::Masking { keep_last: 4 },
        PiiCategory::Email => RedactionStrategy::Hashing,
        PiiCategory::Password => RedactionStrategy::FullReplacement,
        PiiCategory::ApiKey => RedactionStrategy::FullReplacement,
    }
}

pub struct Redactor;

impl Redactor {
    pub fn apply(strategy: RedactionStrategy, original: &str) -> String {
        match strategy {
            RedactionStrategy::Masking { keep_last } => mask(original, keep_last),
            RedactionStrategy::Hashing => hash(original),
            RedactionStrategy::FullReplacement => FULL_REPLACEMENT.to_string(),
        }
    }
}

fn mask(original: &str, keep_last: usize) -> String {
    let chars: Vec<char> = original.chars().collect();
    if chars.len() <= keep_last {
        return MASK_PLACEHOLDER.to_string();
    }
    let tail: String = chars[chars.len() - keep_last..].iter().collect();
    format!("{MASK_PLACEHOLDER}{tail}")
}

fn hash(original: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(original.as_bytes());
    let digest = hasher.finalize();
    format!("sha256:{:x}", digest)[..19].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_keeps_tail() {
        assert_eq!(Redactor::apply(RedactionStrategy::Masking { keep_last: 4 }, "123-45-6789"), "***6789");
    }

    #[test]
    fn masking_short_value_is_fully_masked() {
        assert_eq!(Redactor::apply(RedactionStrategy::Masking { keep_last: 4 }, "ab"), "***");
    }

    #[test]
    fn hashing_is_deterministic() {
        let a = Redactor::apply(RedactionStrategy::Hashing, "a@b.com");
        let b = Redactor::apply(RedactionStrategy::Hashing, "a@b.com");
        assert_eq!(a, b);
        assert!(a.starts_with("sha256:"));
    }

    #[test]
    fn hashing_differs_for_different_inputs() {
        let a = Redactor::apply(RedactionStrategy::Hashing, "a@b.com");
        let b = Redactor::apply(RedactionStrategy::Hashing, "c@d.com");
        assert_ne!(a, b);
    }

    #[test]
    fn full_replacement_hides_everything() {
        assert_eq!(Redactor::apply(RedactionStrategy::FullReplacement, "hunter2"), "[REDACTED]");
    }

    #[test]
    fn default_strategy_assigns_masking_to_ssn() {
        assert_eq!(default_strategy(PiiCategory::Ssn), RedactionStrategy::Masking { keep_last: 4 });
    }

    #[test]
    fn default_strategy_assigns_full_replacement_to_password() {
        assert_eq!(default_strategy(PiiCategory::Password), RedactionStrategy::FullReplacement);
    }
}
