//! Whole-mapping JSON blobs kept under a single storage key.

use std::collections::HashMap;

use chatdeck_core::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::storage::KeyValueStorage;

/// Read the mapping under `key`.
///
/// Missing, unreadable, and unparsable blobs all read as an empty mapping.
pub(crate) fn read_map<T: DeserializeOwned>(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> HashMap<String, T> {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return HashMap::new(),
        Err(e) => {
            warn!(key, error = %e, "Failed to read stored mapping; treating as empty");
            return HashMap::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(map) => map,
        Err(e) => {
            warn!(key, error = %e, "Stored mapping is not valid JSON; treating as empty");
            HashMap::new()
        }
    }
}

/// Serialize `map` and replace the blob under `key`.
pub(crate) fn write_map<T: Serialize>(
    storage: &dyn KeyValueStorage,
    key: &str,
    map: &HashMap<String, T>,
) -> Result<()> {
    let raw = serde_json::to_string(map)?;
    storage.set_item(key, &raw)
}
