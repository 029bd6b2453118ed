use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::channel_state::ChannelState;
use crate::error::{JbotError, Result};

/// Current schema version for the envelope format. Bump when a change needs
/// more than `#[serde(default)]` backfill to migrate (spec §9, "Persistence
/// schema evolution").
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    schema_version: u32,
    body: T,
}

/// Encode `value` as a self-describing, length-prefixed envelope: a 4-byte
/// big-endian length prefix followed by that many bytes of a versioned JSON
/// document. This is how this codebase expresses spec §4.3's "length-
/// prefixed binary encoding so the schema can grow" requirement without
/// inventing a binary layout foreign to its otherwise-universal use of
/// `serde_json` (see DESIGN.md).
pub fn encode_envelope<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = Envelope {
        schema_version: SCHEMA_VERSION,
        body: value,
    };
    let json = serde_json::to_vec(&envelope)?;
    let len = u32::try_from(json.len())
        .map_err(|_| JbotError::Internal("envelope too large to encode".to_string()))?;
    let mut out = Vec::with_capacity(4 + json.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&json);
    Ok(out)
}

/// Decode a single envelope written by [`encode_envelope`]. Rejects trailing
/// garbage past the declared length — a decode failure here is boot-fatal
/// (spec §4.3).
pub fn decode_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < 4 {
        return Err(JbotError::Decode("truncated envelope: missing length prefix".to_string()));
    }
    let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let body = &bytes[4..];
    if body.len() != len {
        return Err(JbotError::Decode(format!(
            "envelope length mismatch: header says {len}, found {}",
            body.len()
        )));
    }
    let envelope: Envelope<T> = serde_json::from_slice(body)
        .map_err(|e| JbotError::Decode(format!("bad envelope body: {e}")))?;
    Ok(envelope.body)
}

/// Write `bytes` atomically (write to a sibling temp file, then rename) with
/// mode 0600, as spec §4.3/§6 require.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// In-memory index of all known channels, keyed both by name and by
/// transport-assigned id, as spec §3 requires ("both indices must be
/// updated atomically").
#[derive(Debug, Default)]
pub struct ChannelStore {
    by_name: HashMap<String, ChannelState>,
    id_to_name: HashMap<String, String>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut ch: ChannelState) {
        ch.backfill_toggles();
        self.id_to_name.insert(ch.id.clone(), ch.name.clone());
        self.by_name.insert(ch.name.clone(), ch);
    }

    pub fn remove_by_name(&mut self, name: &str) -> Option<ChannelState> {
        let ch = self.by_name.remove(name)?;
        self.id_to_name.remove(&ch.id);
        Some(ch)
    }

    pub fn get(&self, name: &str) -> Option<&ChannelState> {
        self.by_name.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ChannelState> {
        self.by_name.get_mut(name)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&ChannelState> {
        self.id_to_name.get(id).and_then(|name| self.by_name.get(name))
    }

    pub fn get_by_id_mut(&mut self, id: &str) -> Option<&mut ChannelState> {
        let name = self.id_to_name.get(id).cloned()?;
        self.by_name.get_mut(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelState> {
        self.by_name.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChannelState> {
        self.by_name.values_mut()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Load from a persisted envelope file. Missing file yields an empty
    /// store (first boot); any other I/O or decode failure is propagated
    /// (boot-fatal, per spec §4.3).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = fs::read(path)?;
        let channels: Vec<ChannelState> = decode_envelope(&bytes)?;
        let mut store = Self::new();
        for ch in channels {
            store.insert(ch);
        }
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let channels: Vec<&ChannelState> = self.by_name.values().collect();
        let bytes = encode_envelope(&channels)?;
        write_atomic(path, &bytes)
    }
}

/// Outcome of asking the transport whether a channel still exists, for use
/// by [`update_channels`]. Built by the caller (the message-dispatch kernel,
/// which owns the async transport handle) rather than computed here —
/// `jbot-core` stays transport-agnostic and synchronous.
pub struct VerificationResult {
    pub id: String,
    pub exists: bool,
    pub externally_shared: bool,
}

/// Apply the boot-time `updateChannels` pass (spec §4.3): dedupe any channel
/// whose name doesn't match a freshly observed id→name mapping, drop
/// channels the transport reports missing or externally-shared, mark the
/// rest verified, and backfill toggle defaults. The id-index rebuild and
/// per-channel toggle backfill happen unconditionally; `results` drives only
/// the drop/verify decision, letting callers run this against a partial or
/// empty verification pass (e.g. in tests) without losing the rest.
pub fn update_channels(store: &mut ChannelStore, results: &[VerificationResult]) {
    let mut by_id: HashMap<&str, &VerificationResult> = HashMap::new();
    for r in results {
        by_id.insert(r.id.as_str(), r);
    }

    let mut to_drop = Vec::new();
    for ch in store.by_name.values_mut() {
        ch.backfill_toggles();
        if let Some(result) = by_id.get(ch.id.as_str()) {
            if result.externally_shared || !result.exists {
                to_drop.push(ch.name.clone());
            } else {
                ch.verified = true;
            }
        }
    }

    for name in to_drop {
        store.remove_by_name(&name);
    }

    // Rebuild the id index from scratch so any stale mapping left over from
    // a channel whose id changed out from under its name is corrected.
    store.id_to_name = store
        .by_name
        .values()
        .map(|ch| (ch.id.clone(), ch.name.clone()))
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatType;
    use tempfile::tempdir;

    #[test]
    fn envelope_round_trips() {
        let data = vec!["a".to_string(), "b".to_string()];
        let bytes = encode_envelope(&data).unwrap();
        let decoded: Vec<String> = decode_envelope(&bytes).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn decode_rejects_truncated_envelope() {
        let bytes = vec![0u8, 0, 0, 10, b'{'];
        let result: Result<serde_json::Value> = decode_envelope(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn store_insert_keeps_both_indices_consistent() {
        let mut store = ChannelStore::new();
        store.insert(ChannelState::new("ops", "C1", ChatType::Rtm));
        assert!(store.get("ops").is_some());
        assert!(store.get_by_id("C1").is_some());
        assert_eq!(store.get_by_id("C1").unwrap().name, "ops");
    }

    #[test]
    fn load_missing_file_yields_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("channels.db");
        let store = ChannelStore::load(&path).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn save_then_load_round_trips_channel_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("channels.db");
        let mut store = ChannelStore::new();
        store.insert(ChannelState::new("ops", "C1", ChatType::Rtm));
        store.save(&path).unwrap();

        let loaded = ChannelStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("ops").unwrap().id, "C1");
    }

    #[test]
    fn update_channels_drops_externally_shared() {
        let mut store = ChannelStore::new();
        store.insert(ChannelState::new("ops", "C1", ChatType::Rtm));
        store.insert(ChannelState::new("leaked", "C2", ChatType::Rtm));

        let results = vec![
            VerificationResult {
                id: "C1".to_string(),
                exists: true,
                externally_shared: false,
            },
            VerificationResult {
                id: "C2".to_string(),
                exists: true,
                externally_shared: true,
            },
        ];
        update_channels(&mut store, &results);

        assert!(store.get("ops").unwrap().verified);
        assert!(store.get("leaked").is_none());
        assert!(store.get_by_id("C2").is_none());
    }

    #[test]
    fn update_channels_drops_missing() {
        let mut store = ChannelStore::new();
        store.insert(ChannelState::new("gone", "C9", ChatType::Rtm));
        let results = vec![VerificationResult {
            id: "C9".to_string(),
            exists: false,
            externally_shared: false,
        }];
        update_channels(&mut store, &results);
        assert!(store.get("gone").is_none());
    }
}
