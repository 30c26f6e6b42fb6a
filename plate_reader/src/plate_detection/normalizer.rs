use regex::Regex;

use crate::config::NormalizerConfig;
use crate::error::{PlateError, Result};

/// Maps raw OCR output to an uppercase alphanumeric plate token.
pub struct TextNormalizer {
    min_len: usize,
    max_len: usize,
    pattern: Option<Regex>,
}

impl TextNormalizer {
    pub fn new(config: &NormalizerConfig) -> Result<Self> {
        let pattern = if config.strict {
            let source = format!("^[A-Z0-9]{{{},{}}}$", config.min_len, config.max_len);
            let pattern =
                Regex::new(&source).map_err(|e| PlateError::InvalidConfig(e.to_string()))?;
            Some(pattern)
        } else {
            None
        };

        Ok(Self {
            min_len: config.min_len,
            max_len: config.max_len,
            pattern,
        })
    }

    /// Uppercases, drops everything outside `A-Z0-9`, and returns `None`
    /// when what is left is not a plausible plate length.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let token: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if token.len() < self.min_len || token.len() > self.max_len {
            return None;
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&token) {
                return None;
            }
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer(min_len: usize, max_len: usize, strict: bool) -> TextNormalizer {
        TextNormalizer::new(&NormalizerConfig {
            min_len,
            max_len,
            strict,
        })
        .unwrap()
    }

    #[test]
    fn cleans_ocr_noise() {
        let n = normalizer(5, 8, false);
        assert_eq!(n.normalize(" abc-1234\n").as_deref(), Some("ABC1234"));
        assert_eq!(n.normalize("BRA 2E19").as_deref(), Some("BRA2E19"));
        assert_eq!(n.normalize("ÄB.C 12-3").as_deref(), Some("BC123"));
    }

    #[test]
    fn enforces_length_bounds() {
        let n = normalizer(5, 7, false);
        assert_eq!(n.normalize("AB12"), None);
        assert_eq!(n.normalize("AB123").as_deref(), Some("AB123"));
        assert_eq!(n.normalize("ABC1234").as_deref(), Some("ABC1234"));
        assert_eq!(n.normalize("ABC12345"), None);
        assert_eq!(n.normalize(""), None);
        assert_eq!(n.normalize("--- ..."), None);
    }

    #[test]
    fn strict_mode_agrees_with_length_mode() {
        let loose = normalizer(5, 8, false);
        let strict = normalizer(5, 8, true);
        for raw in ["abc1234", "a", "ABCDEFGHI", "x-y-z-1-2", "  9 9 9 9 9 ", "#"] {
            assert_eq!(loose.normalize(raw), strict.normalize(raw), "{raw:?}");
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        let n = normalizer(5, 8, false);
        for raw in ["abc-1234", "q", "ZZ 99 ZZ 99", "plate: xyz987", "ß12345", "\t7\t7\t7\t7\t7"] {
            let once = n.normalize(raw);
            let twice = once.as_deref().and_then(|t| n.normalize(t));
            assert_eq!(once, twice, "{raw:?}");
        }
    }

    #[test]
    fn canonical_tokens_are_unchanged() {
        let n = normalizer(5, 8, true);
        for token in ["ABC1234", "12345", "ABCDEFGH", "A1B2C"] {
            assert_eq!(n.normalize(token).as_deref(), Some(token));
        }
    }
}
