//! Mod allow-list gate
//!
//! Evaluated once at startup, before any sync component is built. A single
//! unknown mod disables the whole integration.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Mods allowed alongside the integration
pub const DEFAULT_ALLOWED_MODS: &[&str] = &["Pathoschild.SMAPI", "CJBok.CheatsMenu"];

/// Set-membership policy over installed mod IDs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModWhitelist {
    allowed: HashSet<String>,
}

impl ModWhitelist {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, mod_id: &str) -> bool {
        self.allowed.contains(mod_id)
    }

    /// Fail on the first installed mod that is not allowed
    pub fn check<'a, I>(&self, installed: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for mod_id in installed {
            if !self.is_allowed(mod_id) {
                tracing::warn!("Blocked mod detected: {}", mod_id);
                return Err(Error::not_whitelisted(mod_id));
            }
        }
        Ok(())
    }
}

impl Default for ModWhitelist {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_MODS.iter().copied())
    }
}
