//! Secret redaction for session material in logs and serialized output.
//!
//! The ephemeral decryption private key and the wallet's authorization
//! signature are wrapped in [`Redacted`] so they never show up in `Debug`,
//! `Display` or `Serialize` output.

use std::fmt::{self, Debug, Display};

/// Wrapper that redacts its inner value when formatted or serialized.
///
/// # Example
///
/// ```
/// use bridge_metrics::redact::Redacted;
///
/// let key = Redacted("0xdeadbeef".to_string());
/// assert_eq!(format!("{key:?}"), "<redacted>");
/// assert_eq!(key.expose(), "0xdeadbeef");
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    /// Borrow the secret for the single call that needs it
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        "<redacted>".serialize(serializer)
    }
}
