//! Secret string handling with redacted display and serialization.
//!
//! `RedactedString` carries the restic repository password and the SMTP password.
//! Neither may leak through `Debug` output, tracing spans or a re-serialized config.

use getset::Getters;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Display, Formatter};
use zeroize::Zeroize;

/// Printed in place of the secret.
pub static REDACTED_SECRET: &str = "###REDACTED###";

/// Zeroed on drop.
#[derive(Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct RedactedString {
    inner: String,
}

impl From<String> for RedactedString {
    fn from(inner: String) -> Self {
        Self { inner }
    }
}

impl From<&str> for RedactedString {
    fn from(value: &str) -> Self {
        value.to_string().into()
    }
}

impl Debug for RedactedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED_SECRET)
    }
}

impl Display for RedactedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED_SECRET)
    }
}

impl Serialize for RedactedString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED_SECRET)
    }
}

impl<'de> Deserialize<'de> for RedactedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(RedactedString::from)
    }
}

impl Drop for RedactedString {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}
