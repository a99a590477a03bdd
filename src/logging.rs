//! Log-safe rendering of secrets.
//!
//! API keys end up in request headers and in the `config show` output; neither
//! place may print them in full.

use std::fmt;

/// Masked API key representation
///
/// Only the first 8 characters are kept, the rest is replaced by `***`.
#[derive(Clone, Debug)]
pub struct SensitiveApiKey<'a> {
    inner: &'a str,
}

impl<'a> SensitiveApiKey<'a> {
    /// # Example
    /// ```
    /// use perplexity_assistant::logging::SensitiveApiKey;
    ///
    /// let key = "pplx-0123456789abcdef";
    /// assert_eq!(SensitiveApiKey::new(key).to_string(), "pplx-012***");
    /// ```
    pub fn new(key: &'a str) -> Self {
        Self { inner: key }
    }
}

impl<'a> fmt::Display for SensitiveApiKey<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible_len = 8;
        if self.inner.len() <= visible_len || !self.inner.is_char_boundary(visible_len) {
            write!(f, "***")
        } else {
            write!(f, "{}***", &self.inner[..visible_len])
        }
    }
}

/// Mask an API key for display: first 7 and last 4 characters are kept.
///
/// Example: `pplx-1234567890abcdef` -> `pplx-12...cdef`
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 11 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
