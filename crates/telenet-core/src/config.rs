// ── Account configuration ──
//
// The three fields the host persists across restarts. Core only
// consumes them at construction time; storage and the setup UI belong
// to the host framework.

use secrecy::SecretString;
use serde::Deserialize;
use strum::{Display, EnumString};

/// Display languages the portal serves localized content for.
///
/// Unsupported codes fail at parse time in the host's setup flow;
/// core never sees an invalid value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Nl,
    Fr,
    En,
    De,
}

/// Configuration for one portal account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    pub password: SecretString,
    #[serde(default)]
    pub language: Language,
}

impl AccountConfig {
    pub fn new(username: impl Into<String>, password: SecretString, language: Language) -> Self {
        Self {
            username: username.into(),
            password,
            language,
        }
    }
}
