// Persistent collection store.
// Sole writer of persisted state: two ordered collections plus the settings
// record, mirrored in memory and written through to a `StorageBackend`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StorageError, StoreError};
use crate::modules::order::{self, MissingId};
use crate::settings::Settings;
use crate::state::{CollectionId, Entity, SearchEngine, Site, StoreChange};
use crate::storage::StorageBackend;

pub const SETTINGS_KEY: &str = "navigator_settings";

pub type StoreObserver = Box<dyn FnMut(StoreChange)>;

/// The single JSON document produced by export and accepted by import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub sites: Vec<Site>,
    pub search_engines: Vec<SearchEngine>,
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
}

pub fn default_sites() -> Vec<Site> {
    vec![
        Entity::new("google", "Google", "https://www.google.com", "google.com"),
        Entity::new("github", "GitHub", "https://github.com", "github.com"),
        Entity::new("youtube", "YouTube", "https://www.youtube.com", "youtube.com"),
        Entity::new("twitter", "Twitter", "https://twitter.com", "twitter.com"),
        Entity::new("facebook", "Facebook", "https://www.facebook.com", "facebook.com"),
        Entity::new("linkedin", "LinkedIn", "https://www.linkedin.com", "linkedin.com"),
    ]
}

pub fn default_search_engines() -> Vec<SearchEngine> {
    vec![
        Entity::new("google", "Google", "https://www.google.com/search?q=%s", "google.com"),
        Entity::new("bing", "Bing", "https://www.bing.com/search?q=%s", "bing.com"),
        Entity::new("duckduckgo", "DuckDuckGo", "https://duckduckgo.com/?q=%s", "duckduckgo.com"),
    ]
}

pub struct Store<B: StorageBackend> {
    backend: B,
    sites: Vec<Site>,
    search_engines: Vec<SearchEngine>,
    settings: Settings,
    last_storage_error: Option<StorageError>,
    observers: Vec<StoreObserver>,
}

impl<B: StorageBackend> Store<B> {
    /// Creates an empty store. Call [`Store::load`] before use, or use [`Store::open`].
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            sites: Vec::new(),
            search_engines: Vec::new(),
            settings: Settings::default(),
            last_storage_error: None,
            observers: Vec::new(),
        }
    }

    pub fn open(backend: B) -> Self {
        let mut store = Self::new(backend);
        store.load();
        store
    }

    // --- accessors ---

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn search_engines(&self) -> &[SearchEngine] {
        &self.search_engines
    }

    pub fn collection(&self, collection: CollectionId) -> &[Entity] {
        match collection {
            CollectionId::Sites => &self.sites,
            CollectionId::SearchEngines => &self.search_engines,
        }
    }

    fn collection_mut(&mut self, collection: CollectionId) -> &mut Vec<Entity> {
        match collection {
            CollectionId::Sites => &mut self.sites,
            CollectionId::SearchEngines => &mut self.search_engines,
        }
    }

    pub fn get(&self, collection: CollectionId, id: &str) -> Option<&Entity> {
        self.collection(collection).iter().find(|e| e.id == id)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn active_search_engine(&self) -> Option<&SearchEngine> {
        self.get(CollectionId::SearchEngines, &self.settings.active_search_engine_id)
            .or_else(|| self.search_engines.first())
    }

    /// True once a write has failed: state is still served from memory but
    /// is not durable until [`Store::sync`] succeeds.
    pub fn is_degraded(&self) -> bool {
        self.last_storage_error.is_some()
    }

    pub fn last_storage_error(&self) -> Option<&StorageError> {
        self.last_storage_error.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn subscribe(&mut self, observer: StoreObserver) {
        self.observers.push(observer);
    }

    fn notify(&mut self, change: StoreChange) {
        for observer in self.observers.iter_mut() {
            observer(change);
        }
    }

    // --- persistence ---

    fn write_key<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value).map_err(|e| StorageError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.backend.set(key, &json)
    }

    /// Writes one key; failures are logged and flip the store into degraded mode.
    fn persist_key<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        match self.write_key(key, value) {
            Ok(()) => {}
            Err(e) => {
                log::error!("[Store] Failed to persist {}: {}", key, e);
                self.last_storage_error = Some(e);
            }
        }
    }

    fn persist_collection(&mut self, collection: CollectionId) {
        let items = self.collection(collection).to_vec();
        self.persist_key(collection.storage_key(), &items);
    }

    fn persist_settings(&mut self) {
        let settings = self.settings.clone();
        self.persist_key(SETTINGS_KEY, &settings);
    }

    /// Rewrites every key. Clears degraded mode on success.
    pub fn sync(&mut self) -> Result<(), StoreError> {
        let sites = self.sites.clone();
        let engines = self.search_engines.clone();
        let settings = self.settings.clone();
        self.write_key(CollectionId::Sites.storage_key(), &sites)?;
        self.write_key(CollectionId::SearchEngines.storage_key(), &engines)?;
        self.write_key(SETTINGS_KEY, &settings)?;
        self.last_storage_error = None;
        Ok(())
    }

    fn read_key(&mut self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                log::error!("[Store] Failed to read {}: {}", key, e);
                self.last_storage_error = Some(e);
                None
            }
        }
    }

    /// Loads one collection, falling back to defaults when the stored value is
    /// absent, empty or unreadable. Returns the items and whether the fallback
    /// replaced a stored value (and so should be written back).
    fn load_collection(&mut self, collection: CollectionId) -> (Vec<Entity>, bool) {
        let defaults = match collection {
            CollectionId::Sites => default_sites,
            CollectionId::SearchEngines => default_search_engines,
        };
        let Some(raw) = self.read_key(collection.storage_key()) else {
            return (defaults(), false);
        };
        match serde_json::from_str::<Vec<Entity>>(&raw) {
            Ok(items) if items.is_empty() => {
                log::info!("[Store] {} is empty, restoring defaults", collection);
                (defaults(), true)
            }
            Ok(items) => (dedupe(collection, items), false),
            Err(e) => {
                log::warn!("[Store] Failed to parse {}: {}, using defaults", collection, e);
                (defaults(), true)
            }
        }
    }

    /// Reads persisted state, substituting defaults and repairing a dangling
    /// active search engine reference.
    pub fn load(&mut self) -> (Vec<Site>, Vec<SearchEngine>, Settings) {
        let (sites, sites_replaced) = self.load_collection(CollectionId::Sites);
        let (engines, engines_replaced) = self.load_collection(CollectionId::SearchEngines);
        self.sites = sites;
        self.search_engines = engines;
        if sites_replaced {
            self.persist_collection(CollectionId::Sites);
        }
        if engines_replaced {
            self.persist_collection(CollectionId::SearchEngines);
        }

        self.settings = match self.read_key(SETTINGS_KEY) {
            Some(raw) => serde_json::from_str::<Settings>(&raw)
                .map(Settings::clamped)
                .unwrap_or_else(|e| {
                    log::warn!("[Store] Failed to parse settings: {}, returning defaults", e);
                    Settings::default()
                }),
            None => Settings::default(),
        };
        self.repair_active_engine();

        log::info!(
            "[Store] Loaded {} sites, {} search engines",
            self.sites.len(),
            self.search_engines.len()
        );
        (
            self.sites.clone(),
            self.search_engines.clone(),
            self.settings.clone(),
        )
    }

    /// Points a dangling active engine at the first engine and persists it.
    fn repair_active_engine(&mut self) -> bool {
        let active = &self.settings.active_search_engine_id;
        if self.search_engines.iter().any(|e| &e.id == active) {
            return false;
        }
        let Some(first) = self.search_engines.first() else {
            return false;
        };
        log::info!(
            "[Store] Active search engine {:?} not found, falling back to {}",
            active,
            first.id
        );
        self.settings.active_search_engine_id = first.id.clone();
        self.persist_settings();
        true
    }

    // --- CRUD ---

    pub fn add(&mut self, collection: CollectionId, entity: Entity) -> Result<(), StoreError> {
        entity.validate(collection)?;
        if self.get(collection, &entity.id).is_some() {
            return Err(StoreError::validation(format!(
                "{} already contains id '{}'",
                collection, entity.id
            )));
        }
        log::info!("[Store] Adding {} to {}", entity.id, collection);
        self.collection_mut(collection).push(entity);
        self.persist_collection(collection);
        self.notify(StoreChange::Collection(collection));
        Ok(())
    }

    /// Replaces the entity with the same id. Unknown ids are a logged no-op.
    pub fn update(&mut self, collection: CollectionId, entity: Entity) -> Result<(), StoreError> {
        entity.validate(collection)?;
        let Some(slot) = self
            .collection_mut(collection)
            .iter_mut()
            .find(|e| e.id == entity.id)
        else {
            log::warn!("[Store] Update of unknown {} id {}", collection, entity.id);
            return Err(StoreError::not_found(collection, entity.id));
        };
        *slot = entity;
        self.persist_collection(collection);
        self.notify(StoreChange::Collection(collection));
        Ok(())
    }

    pub fn delete(&mut self, collection: CollectionId, id: &str) -> Result<(), StoreError> {
        let Some(index) = self.collection(collection).iter().position(|e| e.id == id) else {
            log::warn!("[Store] Delete of unknown {} id {}", collection, id);
            return Err(StoreError::not_found(collection, id));
        };
        if collection == CollectionId::SearchEngines && self.search_engines.len() <= 1 {
            return Err(StoreError::ConstraintViolation(
                "Cannot delete the last search engine.".to_string(),
            ));
        }

        log::info!("[Store] Deleting {} from {}", id, collection);
        self.collection_mut(collection).remove(index);
        self.persist_collection(collection);
        self.notify(StoreChange::Collection(collection));

        if collection == CollectionId::SearchEngines && self.repair_active_engine() {
            self.notify(StoreChange::Settings);
        }
        Ok(())
    }

    /// Moves `moved_id` to sit immediately before `anchor_id`.
    /// Returns whether the order changed; unknown ids are a logged no-op.
    pub fn reorder(&mut self, collection: CollectionId, moved_id: &str, anchor_id: &str) -> Result<bool, StoreError> {
        let items = self.collection_mut(collection);
        match order::move_before(items, moved_id, anchor_id) {
            Ok(true) => {
                log::info!("[Store] Moved {} before {} in {}", moved_id, anchor_id, collection);
                self.persist_collection(collection);
                self.notify(StoreChange::Collection(collection));
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(MissingId(id)) => {
                log::warn!("[Store] Reorder in {} references unknown id {}", collection, id);
                Err(StoreError::not_found(collection, id))
            }
        }
    }

    /// Commits a complete id order produced by a drag. Unknown ids are
    /// ignored and unmentioned entities keep their place at the end.
    pub fn apply_order(&mut self, collection: CollectionId, new_order: &[String]) -> Result<bool, StoreError> {
        let changed = order::apply_order(self.collection_mut(collection), new_order);
        if changed {
            log::info!("[Store] Reordered {}: {:?}", collection, new_order);
            self.persist_collection(collection);
            self.notify(StoreChange::Collection(collection));
        } else {
            log::debug!("[Store] Order of {} unchanged", collection);
        }
        Ok(changed)
    }

    // --- settings ---

    /// Always succeeds; a failed write only degrades the store.
    pub fn update_settings(&mut self, settings: Settings) {
        self.settings = settings.clamped();
        self.repair_active_engine();
        self.persist_settings();
        self.notify(StoreChange::Settings);
    }

    pub fn set_active_search_engine(&mut self, id: &str) -> Result<(), StoreError> {
        if self.get(CollectionId::SearchEngines, id).is_none() {
            log::warn!("[Store] Unknown search engine {}", id);
            return Err(StoreError::not_found(CollectionId::SearchEngines, id));
        }
        let mut settings = self.settings.clone();
        settings.active_search_engine_id = id.to_string();
        self.update_settings(settings);
        Ok(())
    }

    // --- import / export ---

    pub fn export_all(&self) -> ExportPayload {
        ExportPayload {
            sites: self.sites.clone(),
            search_engines: self.search_engines.clone(),
            settings: self.settings.clone(),
            exported_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn export_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(&self.export_all())
            .map_err(|e| StoreError::validation(format!("export failed: {}", e)))
    }

    pub fn import_json(&mut self, json: &str) -> Result<(), StoreError> {
        let payload: Value = serde_json::from_str(json)
            .map_err(|e| StoreError::validation(format!("import is not valid JSON: {}", e)))?;
        self.import_all(&payload)
    }

    /// Replaces all state with `payload`, or changes nothing if any part is invalid.
    pub fn import_all(&mut self, payload: &Value) -> Result<(), StoreError> {
        let parsed = validate_import(payload)?;

        self.sites = parsed.sites;
        self.search_engines = parsed.search_engines;
        self.settings = parsed.settings.clamped();
        self.persist_collection(CollectionId::Sites);
        self.persist_collection(CollectionId::SearchEngines);
        if !self.repair_active_engine() {
            self.persist_settings();
        }

        log::info!(
            "[Store] Imported {} sites, {} search engines",
            self.sites.len(),
            self.search_engines.len()
        );
        self.notify(StoreChange::All);
        Ok(())
    }
}

fn dedupe(collection: CollectionId, items: Vec<Entity>) -> Vec<Entity> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|e| {
            let fresh = seen.insert(e.id.clone());
            if !fresh {
                log::warn!("[Store] Dropping duplicate {} id {}", collection, e.id);
            }
            fresh
        })
        .collect()
}

fn validate_import(payload: &Value) -> Result<ExportPayload, StoreError> {
    let is_array = |name: &str| payload.get(name).is_some_and(Value::is_array);

    if !is_array("sites") {
        return Err(StoreError::validation("import: 'sites' must be an array"));
    }
    if !is_array("searchEngines") {
        return Err(StoreError::validation("import: 'searchEngines' must be an array"));
    }
    if !payload.get("settings").is_some_and(Value::is_object) {
        return Err(StoreError::validation("import: 'settings' must be an object"));
    }

    let parsed: ExportPayload = serde_json::from_value(payload.clone())
        .map_err(|e| StoreError::validation(format!("import: {}", e)))?;

    if parsed.search_engines.is_empty() {
        return Err(StoreError::validation(
            "import: at least one search engine is required",
        ));
    }
    for (collection, items) in [
        (CollectionId::Sites, &parsed.sites),
        (CollectionId::SearchEngines, &parsed.search_engines),
    ] {
        let mut seen = HashSet::new();
        for entity in items {
            entity.validate(collection)?;
            if !seen.insert(entity.id.as_str()) {
                return Err(StoreError::validation(format!(
                    "import: duplicate {} id '{}'",
                    collection, entity.id
                )));
            }
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine(id: &str) -> Entity {
        Entity::new(id, id, &format!("https://{}.test/?q=%s", id), &format!("{}.test", id))
    }

    fn site(id: &str) -> Entity {
        Entity::new(id, id, &format!("https://{}.test", id), &format!("{}.test", id))
    }

    fn ids(items: &[Entity]) -> Vec<&str> {
        items.iter().map(|e| e.id.as_str()).collect()
    }

    fn store_with_sites(site_ids: &[&str]) -> Store<MemoryStorage> {
        let sites: Vec<Entity> = site_ids.iter().map(|id| site(id)).collect();
        let backend = MemoryStorage::new().with_entry(
            CollectionId::Sites.storage_key(),
            &serde_json::to_string(&sites).unwrap(),
        );
        Store::open(backend)
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let mut store = Store::new(MemoryStorage::new());
        let (sites, engines, settings) = store.load();
        assert_eq!(sites.len(), 6);
        assert_eq!(ids(&engines), vec!["google", "bing", "duckduckgo"]);
        assert_eq!(settings.active_search_engine_id, "google");
        // nothing was dangling, so nothing needed writing
        assert_eq!(store.backend().write_count(), 0);
    }

    #[test]
    fn load_replaces_empty_engines_and_persists() {
        let backend = MemoryStorage::new().with_entry("navigator_searchEngines", "[]");
        let store = Store::open(backend);
        assert_eq!(store.search_engines().len(), 3);
        let raw = store.backend().raw("navigator_searchEngines").unwrap();
        assert!(raw.contains("duckduckgo"));
    }

    #[test]
    fn load_repairs_dangling_active_engine() {
        let engines = vec![engine("alpha"), engine("beta")];
        let backend = MemoryStorage::new()
            .with_entry("navigator_searchEngines", &serde_json::to_string(&engines).unwrap())
            .with_entry("navigator_settings", r#"{"currentSearchEngine":"gone"}"#);
        let mut store = Store::new(backend);

        let (_, _, settings) = store.load();
        assert_eq!(settings.active_search_engine_id, "alpha");

        let persisted: Settings =
            serde_json::from_str(store.backend().raw("navigator_settings").unwrap()).unwrap();
        assert_eq!(persisted.active_search_engine_id, "alpha");
    }

    #[test]
    fn load_drops_duplicate_ids_and_survives_garbage() {
        let backend = MemoryStorage::new()
            .with_entry(
                "navigator_sites",
                &serde_json::to_string(&vec![site("a"), site("a"), site("b")]).unwrap(),
            )
            .with_entry("navigator_settings", "{not json");
        let store = Store::open(backend);
        assert_eq!(ids(store.sites()), vec!["a", "b"]);
        assert_eq!(store.settings().background.opacity, 0.2);
    }

    #[test]
    fn reorder_moves_before_anchor() {
        let mut store = store_with_sites(&["A", "B", "C"]);
        assert_eq!(store.reorder(CollectionId::Sites, "C", "A"), Ok(true));
        assert_eq!(ids(store.sites()), vec!["C", "A", "B"]);

        let persisted: Vec<Entity> =
            serde_json::from_str(store.backend().raw("navigator_sites").unwrap()).unwrap();
        assert_eq!(ids(&persisted), vec!["C", "A", "B"]);
    }

    #[test]
    fn reorder_before_itself_is_a_noop() {
        let mut store = store_with_sites(&["A", "B", "C"]);
        let writes = store.backend().write_count();
        assert_eq!(store.reorder(CollectionId::Sites, "B", "B"), Ok(false));
        assert_eq!(ids(store.sites()), vec!["A", "B", "C"]);
        assert_eq!(store.backend().write_count(), writes);
    }

    #[test]
    fn reorder_with_unknown_id_changes_nothing() {
        let mut store = store_with_sites(&["A", "B"]);
        let err = store.reorder(CollectionId::Sites, "Z", "A").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(ids(store.sites()), vec!["A", "B"]);
    }

    #[test]
    fn apply_order_commits_drag_result() {
        let mut store = store_with_sites(&["A", "B", "C"]);
        let order: Vec<String> = ["B", "C", "A"].iter().map(|s| s.to_string()).collect();
        assert_eq!(store.apply_order(CollectionId::Sites, &order), Ok(true));
        assert_eq!(ids(store.sites()), vec!["B", "C", "A"]);
        assert_eq!(store.apply_order(CollectionId::Sites, &order), Ok(false));
    }

    #[test]
    fn add_update_delete_roundtrip() {
        let mut store = store_with_sites(&["A"]);
        store.add(CollectionId::Sites, site("B")).unwrap();
        assert!(matches!(
            store.add(CollectionId::Sites, site("B")),
            Err(StoreError::Validation(_))
        ));

        let mut renamed = site("B");
        renamed.display_name = "Bee".into();
        store.update(CollectionId::Sites, renamed).unwrap();
        assert_eq!(store.get(CollectionId::Sites, "B").unwrap().display_name, "Bee");

        assert!(matches!(
            store.update(CollectionId::Sites, site("nope")),
            Err(StoreError::NotFound { .. })
        ));

        store.delete(CollectionId::Sites, "A").unwrap();
        assert_eq!(ids(store.sites()), vec!["B"]);
    }

    #[test]
    fn cannot_delete_last_search_engine() {
        let engines = vec![engine("only")];
        let backend = MemoryStorage::new()
            .with_entry("navigator_searchEngines", &serde_json::to_string(&engines).unwrap());
        let mut store = Store::open(backend);

        let err = store.delete(CollectionId::SearchEngines, "only").unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
        assert_eq!(ids(store.search_engines()), vec!["only"]);
    }

    #[test]
    fn deleting_active_engine_repoints_active() {
        let mut store = Store::open(MemoryStorage::new());
        store.set_active_search_engine("bing").unwrap();
        store.delete(CollectionId::SearchEngines, "bing").unwrap();
        assert_eq!(store.settings().active_search_engine_id, "google");
        assert_eq!(store.active_search_engine().map(|e| e.id.as_str()), Some("google"));
    }

    #[test]
    fn import_rejects_malformed_payload_atomically() {
        let mut store = store_with_sites(&["A", "B"]);
        let before = store.export_all();

        let bad = json!({
            "sites": "not-an-array",
            "searchEngines": [],
            "settings": {}
        });
        assert!(matches!(store.import_all(&bad), Err(StoreError::Validation(_))));

        let bad_settings = json!({ "sites": [], "searchEngines": [], "settings": 3 });
        assert!(matches!(store.import_all(&bad_settings), Err(StoreError::Validation(_))));

        let bad_engine = json!({
            "sites": [],
            "searchEngines": [{ "id": "x", "name": "X", "url": "https://x.test" }],
            "settings": {}
        });
        assert!(matches!(store.import_all(&bad_engine), Err(StoreError::Validation(_))));

        assert_eq!(store.sites(), before.sites.as_slice());
        assert_eq!(store.search_engines(), before.search_engines.as_slice());
        assert_eq!(store.settings(), &before.settings);
    }

    #[test]
    fn import_replaces_everything_and_repairs_active() {
        let mut store = Store::open(MemoryStorage::new());
        let payload = json!({
            "sites": [{ "id": "s1", "name": "One", "url": "https://one.test" }],
            "searchEngines": [{ "id": "e1", "name": "E", "url": "https://e.test/?q=%s" }],
            "settings": { "currentSearchEngine": "missing", "background": { "opacity": 3.0 } }
        });
        store.import_all(&payload).unwrap();

        assert_eq!(ids(store.sites()), vec!["s1"]);
        assert_eq!(ids(store.search_engines()), vec!["e1"]);
        assert_eq!(store.settings().active_search_engine_id, "e1");
        assert_eq!(store.settings().background.opacity, 1.0);
    }

    #[test]
    fn export_then_import_restores_state() {
        let mut source = store_with_sites(&["A", "B"]);
        source.reorder(CollectionId::Sites, "B", "A").unwrap();
        let json = source.export_json().unwrap();

        let mut target = Store::open(MemoryStorage::new());
        target.import_json(&json).unwrap();
        assert_eq!(ids(target.sites()), vec!["B", "A"]);
        assert!(target.import_json("{ nope").is_err());
    }

    #[test]
    fn observers_hear_committed_mutations() {
        let mut store = store_with_sites(&["A", "B"]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(Box::new(move |change| sink.borrow_mut().push(change)));

        store.reorder(CollectionId::Sites, "B", "A").unwrap();
        store.reorder(CollectionId::Sites, "B", "B").unwrap();
        store.set_active_search_engine("bing").unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![StoreChange::Collection(CollectionId::Sites), StoreChange::Settings]
        );
    }

    #[test]
    fn storage_failure_degrades_but_keeps_memory_state() {
        let mut store = store_with_sites(&["A", "B"]);
        store.backend_mut().set_fail_writes(true);

        store.reorder(CollectionId::Sites, "B", "A").unwrap();
        assert_eq!(ids(store.sites()), vec!["B", "A"]);
        assert!(store.is_degraded());
        assert!(matches!(store.sync(), Err(StoreError::Storage(_))));

        store.backend_mut().set_fail_writes(false);
        store.sync().unwrap();
        assert!(!store.is_degraded());
        let persisted: Vec<Entity> =
            serde_json::from_str(store.backend().raw("navigator_sites").unwrap()).unwrap();
        assert_eq!(ids(&persisted), vec!["B", "A"]);
    }
}
