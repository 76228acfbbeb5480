use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use super::entity::Platform;

/// Entity name translations, keyed by platform and lowercased parameter.
#[derive(Debug, Clone, Default)]
pub struct Translations {
    names: Arc<RwLock<HashMap<(Platform, String), String>>>,
}

impl Translations {
    pub fn insert(&self, platform: Platform, key: impl Into<String>, name: impl Into<String>) {
        if let Ok(mut names) = self.names.write() {
            names.insert((platform, key.into().to_lowercase()), name.into());
        }
    }

    /// Best effort: a poisoned table reads as "no translation".
    pub fn name(&self, platform: Platform, key: &str) -> Option<String> {
        let names = self.names.read().ok()?;
        names.get(&(platform, key.to_lowercase())).cloned()
    }
}
