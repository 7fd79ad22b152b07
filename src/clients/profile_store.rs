use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::capabilities::ProfileLookup;

/// Fixed map of user id to profile text.
#[derive(Debug, Clone, Default)]
pub struct StaticProfileStore {
    profiles: HashMap<String, String>,
}

impl StaticProfileStore {
    #[must_use]
    pub fn new(profiles: HashMap<String, String>) -> Self {
        Self { profiles }
    }

    /// Load a JSON object of `{ "user_id": "profile text" }`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON object of
    /// strings.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let store = Self::from_json_str(&raw)?;
        info!(
            "Loaded {} profiles from {}",
            store.profiles.len(),
            path.display()
        );
        Ok(store)
    }

    /// # Errors
    ///
    /// Returns an error if `raw` is not a JSON object of strings.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let profiles: HashMap<String, String> = serde_json::from_str(raw)?;
        Ok(Self::new(profiles))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileLookup for StaticProfileStore {
    async fn lookup(&self, user_id: &str) -> Option<String> {
        self.profiles.get(user_id).cloned()
    }
}
