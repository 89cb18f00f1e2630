//! Style codes and result file naming.
//!
//! A style code is a short alphanumeric token such as `sj12A`. Its last character names the
//! colour variant and everything before it names the style. Generated images are saved as
//! `{STYLE}-{COLOR}-{sequence}.jpg`.
//!
//! ```
//! use drape::style_code::StyleCode;
//!
//! let code = StyleCode::parse("sj12A").unwrap();
//! assert_eq!(code.style(), "SJ12");
//! assert_eq!(code.color(), "A");
//! assert_eq!(code.filename(1), "SJ12-A-1.jpg");
//! ```

use crate::drape::error::ValidationError;
use std::fmt;

/// Shortest accepted style code.
pub const MIN_STYLE_CODE_LEN: usize = 2;
/// Longest accepted style code.
pub const MAX_STYLE_CODE_LEN: usize = 20;

/// A validated style code (`^[A-Za-z0-9]{2,20}$`). The original casing is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StyleCode(String);

impl StyleCode {
    /// Validate `raw` as a style code.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if is_valid_style_code(raw) {
            Ok(StyleCode(raw.to_string()))
        } else {
            Err(ValidationError::InvalidStyleCode(raw.to_string()))
        }
    }

    /// The code as entered.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-cased style token: every character except the last.
    pub fn style(&self) -> String {
        self.0[..self.0.len() - 1].to_ascii_uppercase()
    }

    /// Upper-cased colour token: the last character.
    pub fn color(&self) -> String {
        self.0[self.0.len() - 1..].to_ascii_uppercase()
    }

    /// Result filename for the `sequence`-th garment of a batch (1-based).
    pub fn filename(&self, sequence: usize) -> String {
        format!("{}-{}-{}.jpg", self.style(), self.color(), sequence)
    }
}

impl fmt::Display for StyleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `true` when `raw` is 2-20 ASCII letters or digits.
pub fn is_valid_style_code(raw: &str) -> bool {
    (MIN_STYLE_CODE_LEN..=MAX_STYLE_CODE_LEN).contains(&raw.len())
        && raw.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Strip everything but ASCII letters and digits from user input, as the style-code field
/// does on every keystroke. Length is not enforced here; [`StyleCode::parse`] does that.
pub fn sanitize_style_code(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}
