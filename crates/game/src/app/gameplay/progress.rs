#[cfg(test)]
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::rc::Rc;

use engine::storage::{read_text_if_exists, write_text_atomic};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::rooms::{ItemKind, ItemSpawn};

pub(crate) const PROGRESS_FILE_NAME: &str = "metroidvania_state_v2.json";
const PROGRESS_VERSION: u32 = 2;
const DEFAULT_MISSILE_AMOUNT: u32 = 5;
const DEFAULT_SUPER_AMOUNT: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct Upgrades {
    pub(crate) dash: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct Ammo {
    pub(crate) missile: u32,
    #[serde(rename = "super")]
    pub(crate) super_: u32,
}

/// Persisted shape. Id sets are written as `{ "id": true }` maps and read
/// back from either that form or a plain array of ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProgressRecord {
    pub(crate) version: u32,
    #[serde(serialize_with = "id_set::serialize")]
    pub(crate) found_items: BTreeSet<String>,
    pub(crate) upgrades: Upgrades,
    pub(crate) ammo: Ammo,
    pub(crate) suit_level: u32,
    #[serde(serialize_with = "id_set::serialize")]
    pub(crate) visited_rooms: BTreeSet<String>,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            version: PROGRESS_VERSION,
            found_items: BTreeSet::new(),
            upgrades: Upgrades::default(),
            ammo: Ammo::default(),
            suit_level: 1,
            visited_rooms: BTreeSet::new(),
        }
    }
}

mod id_set {
    use std::collections::{BTreeMap, BTreeSet};

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Flags(BTreeMap<String, bool>),
        List(Vec<String>),
    }

    pub(super) fn serialize<S: Serializer>(
        ids: &BTreeSet<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let flags: BTreeMap<&str, bool> = ids.iter().map(|id| (id.as_str(), true)).collect();
        flags.serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeSet<String>, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Flags(flags) => flags
                .into_iter()
                .filter_map(|(id, set)| set.then_some(id))
                .collect(),
            Repr::List(ids) => ids.into_iter().collect(),
        })
    }
}

#[derive(Debug, Error)]
pub(crate) enum StorageError {
    #[error("storage io at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode progress json: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable backend for the progress record. Implementations may fail at any
/// time; the store treats every failure as recoverable.
pub(crate) trait ProgressStorage {
    fn read(&self) -> Result<Option<String>, StorageError>;
    fn write(&mut self, text: &str) -> Result<(), StorageError>;
    fn describe(&self) -> String;
}

pub(crate) struct FileProgressStorage {
    path: PathBuf,
}

impl FileProgressStorage {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn in_dir(save_dir: &Path) -> Self {
        Self::new(save_dir.join(PROGRESS_FILE_NAME))
    }
}

impl ProgressStorage for FileProgressStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        read_text_if_exists(&self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&mut self, text: &str) -> Result<(), StorageError> {
        write_text_atomic(&self.path, text).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
struct MemorySlot {
    text: Option<String>,
    writes: usize,
    failing: bool,
}

#[cfg(test)]
impl MemorySlot {
    fn failure(&self) -> StorageError {
        StorageError::Io {
            path: PathBuf::from("memory"),
            source: std::io::Error::other("memory slot is failing"),
        }
    }
}

/// In-process backend. Clones share the same slot, so a test can keep a
/// handle for inspection after moving one into a store.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryProgressStorage {
    slot: Rc<RefCell<MemorySlot>>,
}

#[cfg(test)]
impl MemoryProgressStorage {
    pub(crate) fn with_text(text: &str) -> Self {
        let storage = Self::default();
        storage.slot.borrow_mut().text = Some(text.to_string());
        storage
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.slot.borrow_mut().failing = failing;
    }

    pub(crate) fn text(&self) -> Option<String> {
        self.slot.borrow().text.clone()
    }

    pub(crate) fn write_count(&self) -> usize {
        self.slot.borrow().writes
    }
}

#[cfg(test)]
impl ProgressStorage for MemoryProgressStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        let slot = self.slot.borrow();
        if slot.failing {
            return Err(slot.failure());
        }
        Ok(slot.text.clone())
    }

    fn write(&mut self, text: &str) -> Result<(), StorageError> {
        let mut slot = self.slot.borrow_mut();
        if slot.failing {
            return Err(slot.failure());
        }
        slot.text = Some(text.to_string());
        slot.writes += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[derive(Deserialize)]
struct IdSet(#[serde(deserialize_with = "id_set::deserialize")] BTreeSet<String>);

/// A saved record plus the fields that were dropped while reading it.
#[derive(Debug)]
pub(crate) struct ParsedProgress {
    pub(crate) record: ProgressRecord,
    pub(crate) rejected: Vec<String>,
}

#[derive(Default)]
struct FieldReader {
    rejected: Vec<String>,
}

impl FieldReader {
    fn read<T: DeserializeOwned>(
        &mut self,
        scope: &str,
        fields: &Map<String, Value>,
        key: &str,
    ) -> Option<T> {
        let value = fields.get(key)?;
        match serde_path_to_error::deserialize::<_, T>(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(error) => {
                let field = if scope.is_empty() {
                    key.to_string()
                } else {
                    format!("{scope}.{key}")
                };
                let inner = error.path().to_string();
                let location = if inner.is_empty() || inner == "." {
                    field
                } else {
                    format!("{field}.{inner}")
                };
                self.rejected.push(format!("{location}: {}", error.into_inner()));
                None
            }
        }
    }

    fn section<'a>(
        &mut self,
        fields: &'a Map<String, Value>,
        key: &str,
    ) -> Option<&'a Map<String, Value>> {
        match fields.get(key)? {
            Value::Object(section) => Some(section),
            _ => {
                self.rejected.push(format!("{key}: expected an object"));
                None
            }
        }
    }
}

/// Reads a saved record field by field. A field with the wrong shape keeps
/// its default and is reported; only unreadable JSON or a non-object root
/// rejects the whole record.
pub(crate) fn parse_progress_json(raw: &str) -> Result<ParsedProgress, String> {
    let root: Value =
        serde_json::from_str(raw).map_err(|error| format!("parse progress json: {error}"))?;
    let Value::Object(fields) = root else {
        return Err("parse progress json: root is not an object".to_string());
    };

    let mut reader = FieldReader::default();
    let mut record = ProgressRecord::default();

    if let Some(version) = reader.read("", &fields, "version") {
        record.version = version;
    }
    if let Some(IdSet(ids)) = reader.read("", &fields, "foundItems") {
        record.found_items = ids;
    }
    if let Some(upgrades) = reader.section(&fields, "upgrades") {
        if let Some(dash) = reader.read("upgrades", upgrades, "dash") {
            record.upgrades.dash = dash;
        }
    }
    if let Some(ammo) = reader.section(&fields, "ammo") {
        if let Some(missile) = reader.read("ammo", ammo, "missile") {
            record.ammo.missile = missile;
        }
        if let Some(super_) = reader.read("ammo", ammo, "super") {
            record.ammo.super_ = super_;
        }
    }
    if let Some(suit_level) = reader.read("", &fields, "suitLevel") {
        record.suit_level = suit_level;
    }
    if let Some(IdSet(ids)) = reader.read("", &fields, "visitedRooms") {
        record.visited_rooms = ids;
    }

    Ok(ParsedProgress {
        record,
        rejected: reader.rejected,
    })
}

/// Write-through progress store. Reads and writes never fail from the
/// caller's point of view; storage problems degrade to in-memory state.
pub(crate) struct ProgressStore {
    record: ProgressRecord,
    storage: Box<dyn ProgressStorage>,
}

impl fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressStore")
            .field("record", &self.record)
            .field("storage", &self.storage.describe())
            .finish()
    }
}

impl ProgressStore {
    pub(crate) fn load(storage: Box<dyn ProgressStorage>) -> Self {
        let record = match storage.read() {
            Ok(Some(raw)) => match parse_progress_json(&raw) {
                Ok(ParsedProgress {
                    mut record,
                    rejected,
                }) => {
                    if !rejected.is_empty() {
                        warn!(
                            storage = %storage.describe(),
                            fields = ?rejected,
                            "progress_fields_reset"
                        );
                    }
                    record.suit_level = record.suit_level.max(1);
                    info!(
                        storage = %storage.describe(),
                        items = record.found_items.len(),
                        rooms = record.visited_rooms.len(),
                        "progress_loaded"
                    );
                    record
                }
                Err(error) => {
                    warn!(storage = %storage.describe(), error = %error, "progress_invalid");
                    ProgressRecord::default()
                }
            },
            Ok(None) => {
                debug!(storage = %storage.describe(), "progress_fresh");
                ProgressRecord::default()
            }
            Err(error) => {
                warn!(storage = %storage.describe(), error = %error, "progress_read_failed");
                ProgressRecord::default()
            }
        };
        Self { record, storage }
    }

    #[cfg(test)]
    pub(crate) fn volatile() -> Self {
        Self::load(Box::new(MemoryProgressStorage::default()))
    }

    #[cfg(test)]
    pub(crate) fn record(&self) -> &ProgressRecord {
        &self.record
    }

    pub(crate) fn has_dash(&self) -> bool {
        self.record.upgrades.dash
    }

    pub(crate) fn suit_level(&self) -> u32 {
        self.record.suit_level
    }

    pub(crate) fn ammo(&self) -> &Ammo {
        &self.record.ammo
    }

    pub(crate) fn visited_count(&self) -> usize {
        self.record.visited_rooms.len()
    }

    /// Best effort. A failed write is logged and retried implicitly by the
    /// next mutation.
    pub(crate) fn save(&mut self) {
        let text = match serde_json::to_string_pretty(&self.record) {
            Ok(text) => text,
            Err(error) => {
                warn!(error = %StorageError::from(error), "progress_save_failed");
                return;
            }
        };
        if let Err(error) = self.storage.write(&text) {
            warn!(
                storage = %self.storage.describe(),
                error = %error,
                "progress_save_failed"
            );
        }
    }

    pub(crate) fn mark_room_visited(&mut self, room_id: &str) {
        self.record.visited_rooms.insert(room_id.to_string());
        self.save();
    }

    pub(crate) fn is_room_visited(&self, room_id: &str) -> bool {
        self.record.visited_rooms.contains(room_id)
    }

    pub(crate) fn collect_item(&mut self, item_id: &str) {
        self.record.found_items.insert(item_id.to_string());
        self.save();
    }

    pub(crate) fn is_item_collected(&self, item_id: &str) -> bool {
        self.record.found_items.contains(item_id)
    }

    /// Returns `false` when the item was already collected and nothing changed.
    pub(crate) fn apply_item(&mut self, item: &ItemSpawn) -> bool {
        if self.is_item_collected(&item.id) {
            return false;
        }

        match item.kind {
            ItemKind::DashModule => self.record.upgrades.dash = true,
            ItemKind::MissilePack => {
                let amount = item.amount.unwrap_or(DEFAULT_MISSILE_AMOUNT);
                self.record.ammo.missile = self.record.ammo.missile.saturating_add(amount);
            }
            ItemKind::SuperPack => {
                let amount = item.amount.unwrap_or(DEFAULT_SUPER_AMOUNT);
                self.record.ammo.super_ = self.record.ammo.super_.saturating_add(amount);
            }
            ItemKind::SuitUpgrade => {
                let current = self.record.suit_level;
                self.record.suit_level = current.max(item.level.unwrap_or(current));
            }
        }

        info!(item = %item.id, kind = item.kind.as_str(), "item_applied");
        self.collect_item(&item.id);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::app::gameplay::rooms::TilePos;

    fn flags(raw: &str, field: &str) -> BTreeMap<String, bool> {
        let value: serde_json::Value = serde_json::from_str(raw).expect("json");
        serde_json::from_value(value[field].clone()).expect("flags")
    }

    fn item(id: &str, kind: ItemKind, amount: Option<u32>, level: Option<u32>) -> ItemSpawn {
        ItemSpawn {
            id: id.to_string(),
            kind,
            tile: TilePos::new(0, 0),
            amount,
            level,
        }
    }

    #[test]
    fn missile_pack_applies_once() {
        let mut store = ProgressStore::volatile();
        let pack = item("m1", ItemKind::MissilePack, Some(5), None);

        assert!(store.apply_item(&pack));
        assert_eq!(store.ammo().missile, 5);
        assert!(!store.apply_item(&pack));
        assert_eq!(store.ammo().missile, 5);
        assert!(store.is_item_collected("m1"));
    }

    #[test]
    fn applying_any_item_twice_matches_applying_once() {
        let items = [
            item("dash", ItemKind::DashModule, None, None),
            item("m", ItemKind::MissilePack, None, None),
            item("s", ItemKind::SuperPack, Some(2), None),
            item("suit", ItemKind::SuitUpgrade, None, Some(3)),
            item("suit_none", ItemKind::SuitUpgrade, None, None),
        ];
        for candidate in &items {
            let mut once = ProgressStore::volatile();
            once.apply_item(candidate);
            let mut twice = ProgressStore::volatile();
            twice.apply_item(candidate);
            twice.apply_item(candidate);
            assert_eq!(once.record(), twice.record(), "{}", candidate.id);
        }
    }

    #[test]
    fn item_defaults_follow_kind() {
        let mut store = ProgressStore::volatile();
        store.apply_item(&item("m", ItemKind::MissilePack, None, None));
        store.apply_item(&item("s", ItemKind::SuperPack, None, None));
        store.apply_item(&item("d", ItemKind::DashModule, None, None));
        assert_eq!(store.ammo().missile, 5);
        assert_eq!(store.ammo().super_, 1);
        assert!(store.has_dash());
    }

    #[test]
    fn suit_level_never_decreases() {
        let mut store = ProgressStore::volatile();
        store.apply_item(&item("mk3", ItemKind::SuitUpgrade, None, Some(3)));
        store.apply_item(&item("mk2", ItemKind::SuitUpgrade, None, Some(2)));
        assert_eq!(store.suit_level(), 3);
    }

    #[test]
    fn every_mutation_writes_through_in_flag_map_format() {
        let storage = MemoryProgressStorage::default();
        let mut store = ProgressStore::load(Box::new(storage.clone()));

        store.mark_room_visited("room_01");
        store.apply_item(&item("m1", ItemKind::MissilePack, Some(5), None));
        assert_eq!(storage.write_count(), 2);

        let text = storage.text().expect("saved");
        assert_eq!(flags(&text, "visitedRooms").get("room_01"), Some(&true));
        assert_eq!(flags(&text, "foundItems").get("m1"), Some(&true));
        assert!(text.contains("\"suitLevel\": 1"));
    }

    #[test]
    fn reload_restores_saved_state() {
        let storage = MemoryProgressStorage::default();
        let mut store = ProgressStore::load(Box::new(storage.clone()));
        store.mark_room_visited("room_02");
        store.apply_item(&item("dash", ItemKind::DashModule, None, None));

        let reloaded = ProgressStore::load(Box::new(storage));
        assert!(reloaded.is_room_visited("room_02"));
        assert!(reloaded.has_dash());
        assert_eq!(reloaded.visited_count(), 1);
    }

    #[test]
    fn partial_and_array_shaped_records_merge_with_defaults() {
        let storage = MemoryProgressStorage::with_text(
            r#"{ "foundItems": ["a", "b"], "visitedRooms": { "room_01": true, "room_02": false }, "ammo": { "missile": 3 } }"#,
        );
        let store = ProgressStore::load(Box::new(storage));
        assert!(store.is_item_collected("a") && store.is_item_collected("b"));
        assert!(store.is_room_visited("room_01"));
        assert!(!store.is_room_visited("room_02"));
        assert_eq!(store.ammo().missile, 3);
        assert_eq!(store.ammo().super_, 0);
        assert_eq!(store.suit_level(), 1);
        assert!(!store.has_dash());
    }

    #[test]
    fn bad_field_resets_only_itself() {
        let storage = MemoryProgressStorage::with_text(
            r#"{ "ammo": { "missile": -1, "super": 2 }, "upgrades": { "dash": true }, "suitLevel": "max", "visitedRooms": ["room_01"] }"#,
        );
        let store = ProgressStore::load(Box::new(storage));
        assert_eq!(store.ammo().missile, 0);
        assert_eq!(store.ammo().super_, 2);
        assert!(store.has_dash());
        assert_eq!(store.suit_level(), 1);
        assert!(store.is_room_visited("room_01"));

        let parsed = parse_progress_json(r#"{ "ammo": { "missile": "lots" }, "upgrades": 3 }"#)
            .expect("object root");
        assert_eq!(parsed.rejected.len(), 2);
        assert!(parsed.rejected[0].starts_with("upgrades"), "{:?}", parsed.rejected);
        assert!(parsed.rejected[1].starts_with("ammo.missile"), "{:?}", parsed.rejected);
    }

    #[test]
    fn unreadable_record_falls_back_to_defaults() {
        for raw in ["{ \"ammo\": ", "[1, 2]"] {
            let store = ProgressStore::load(Box::new(MemoryProgressStorage::with_text(raw)));
            assert_eq!(store.record(), &ProgressRecord::default(), "{raw}");
            assert!(parse_progress_json(raw).is_err());
        }
    }

    #[test]
    fn unavailable_storage_keeps_volatile_state() {
        let storage = MemoryProgressStorage::default();
        storage.set_failing(true);
        let mut store = ProgressStore::load(Box::new(storage.clone()));
        store.mark_room_visited("room_01");
        assert!(store.is_room_visited("room_01"));
        assert_eq!(storage.write_count(), 0);

        storage.set_failing(false);
        store.collect_item("x");
        assert_eq!(storage.write_count(), 1);
        let text = storage.text().expect("saved");
        assert_eq!(flags(&text, "visitedRooms").len(), 1);
    }

    #[test]
    fn file_storage_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = ProgressStore::load(Box::new(FileProgressStorage::in_dir(dir.path())));
        assert_eq!(store.visited_count(), 0);
        store.mark_room_visited("room_03");

        let path = dir.path().join(PROGRESS_FILE_NAME);
        assert!(path.exists());
        let reloaded = ProgressStore::load(Box::new(FileProgressStorage::new(path)));
        assert!(reloaded.is_room_visited("room_03"));
    }
}
