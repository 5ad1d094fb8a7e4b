//! Canned response scripts, stored like history under [`SCRIPT_KEY`].

use std::sync::Arc;

use chatdeck_core::{Result, Script, ScriptItem, ScriptPatch, Scripts};
use tracing::{debug, info};
use uuid::Uuid;

use crate::blob::{read_map, write_map};
use crate::storage::KeyValueStorage;

/// Storage key of the script mapping.
pub const SCRIPT_KEY: &str = "SCRIPT_KEY";

/// Id used when a script is stored without one.
pub const SCRIPT_DEFAULT_ID: &str = "default";

/// A new script with a single greeting item.
pub fn create_script() -> Script {
    Script {
        name: SCRIPT_DEFAULT_ID.to_string(),
        script_items: vec![ScriptItem {
            id: Uuid::new_v4().to_string(),
            value: "Hello World".to_string(),
            prompt: None,
        }],
    }
}

/// Keyed store of scripts.
#[derive(Clone)]
pub struct ScriptStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl ScriptStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn get_all(&self) -> Scripts {
        read_map(self.storage.as_ref(), SCRIPT_KEY)
    }

    /// Look up a script; a missing id is `None`, never an error.
    pub fn get(&self, id: &str) -> Option<Script> {
        self.get_all().remove(id)
    }

    /// Store `script` under `id`, or under [`SCRIPT_DEFAULT_ID`].
    pub fn store(&self, script: &Script, id: Option<&str>) -> Result<String> {
        let id = id
            .filter(|id| !id.is_empty())
            .unwrap_or(SCRIPT_DEFAULT_ID)
            .to_string();

        let mut scripts = self.get_all();
        scripts.insert(id.clone(), script.clone());
        write_map(self.storage.as_ref(), SCRIPT_KEY, &scripts)?;

        info!(script_id = %id, items = script.script_items.len(), "Stored script");
        Ok(id)
    }

    /// Apply `patch` to an existing script. Unknown ids are left alone.
    pub fn update(&self, id: &str, patch: ScriptPatch) -> Result<bool> {
        let mut scripts = self.get_all();
        let Some(script) = scripts.get_mut(id) else {
            debug!(script_id = %id, "Update skipped; script not found");
            return Ok(false);
        };
        patch.apply(script);
        write_map(self.storage.as_ref(), SCRIPT_KEY, &scripts)?;
        Ok(true)
    }

    /// Append a canned response to an existing script.
    pub fn add_item(
        &self,
        id: &str,
        value: impl Into<String>,
        prompt: Option<String>,
    ) -> Result<Option<ScriptItem>> {
        let mut scripts = self.get_all();
        let Some(script) = scripts.get_mut(id) else {
            return Ok(None);
        };
        let item = ScriptItem {
            id: Uuid::new_v4().to_string(),
            value: value.into(),
            prompt,
        };
        script.script_items.push(item.clone());
        write_map(self.storage.as_ref(), SCRIPT_KEY, &scripts)?;
        Ok(Some(item))
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut scripts = self.get_all();
        if scripts.remove(id).is_none() {
            return Ok(false);
        }
        write_map(self.storage.as_ref(), SCRIPT_KEY, &scripts)?;
        info!(script_id = %id, "Deleted script");
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove_item(SCRIPT_KEY)
    }
}
