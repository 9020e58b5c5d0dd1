// View binder for the start page.
// Renders the store's collections into the document, owns the input pipeline
// (touch translation -> reorder engines) and commits finished drags back to the
// store. The store stays the single source of truth: every committed mutation
// comes back through its subscription and re-renders the affected views.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::config::StartPageConfig;
use crate::error::{ReorderError, StoreError};
use crate::modules::dom::{Document, ElementId, ItemSelector, Layout, Rect};
use crate::modules::navigation::{self, EntityForm};
use crate::modules::reorder::{ReorderCallback, ReorderList, ReorderOutcome};
use crate::modules::touch::{SyntheticEvent, SyntheticKind, TouchInput, TouchTranslator};
use crate::settings::{Background, SettingsDebouncer};
use crate::state::{CollectionId, Entity, StoreChange};
use crate::storage::StorageBackend;
use crate::store::Store;

pub const GRID_ID: &str = "website-cards";
pub const ADD_CARD_ID: &str = "add-website-card";
pub const SETTINGS_LIST_ID: &str = "search-engines-list";
pub const DROPDOWN_ID: &str = "search-engine-list";
pub const BACKGROUND_ID: &str = "background-overlay";
pub const SEARCH_INPUT_ID: &str = "search-input";
pub const ENGINE_BUTTON_ID: &str = "search-engine-button";

pub const SITE_CARD_CLASS: &str = "website-card";
pub const ENGINE_ROW_CLASS: &str = "search-engine-settings-item";
pub const DROPDOWN_ITEM_CLASS: &str = "search-engine-item";
const EDIT_ENGINE_CLASS: &str = "edit-search-engine";

const VIEWPORT: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 1280.0,
    height: 960.0,
};
const CARD_SIZE: f64 = 100.0;
const CARD_GAP: f64 = 16.0;
const ENGINE_ROW_HEIGHT: f64 = 44.0;
const SETTINGS_WIDTH: f64 = 360.0;
const DROPDOWN_ROW_HEIGHT: f64 = 36.0;

/// Something the page wants its host to do in response to input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    Open(String),
    ShowAddSite,
    EditSite(String),
    EditSearchEngine(String),
}

/// Keys the search input reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
    Escape,
    ArrowUp,
    ArrowDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// One of the rendered views of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Grid,
    SettingsList,
    Dropdown,
}

pub struct StartPage<B: StorageBackend + 'static> {
    doc: Document,
    store: Rc<RefCell<Store<B>>>,
    touch: TouchTranslator,
    grid: ReorderList,
    engine_list: ReorderList,
    pending: Rc<RefCell<Vec<StoreChange>>>,
    debouncer: SettingsDebouncer,
}

impl<B: StorageBackend + 'static> StartPage<B> {
    pub fn new(store: Store<B>, config: StartPageConfig) -> Result<Self, ReorderError> {
        let mut doc = Document::new(VIEWPORT);
        build_skeleton(&mut doc, config.grid_columns);

        let store = Rc::new(RefCell::new(store));
        let pending: Rc<RefCell<Vec<StoreChange>>> = Rc::default();
        {
            let sink = pending.clone();
            store
                .borrow_mut()
                .subscribe(Box::new(move |change| sink.borrow_mut().push(change)));
        }

        {
            let store = store.borrow();
            render_sites(&mut doc, &store);
            render_engines(&mut doc, &store);
            render_dropdown(&mut doc, &store);
            render_background(&mut doc, &store.settings().background);
        }

        let grid = ReorderList::enable(
            &mut doc,
            GRID_ID,
            ItemSelector::class(SITE_CARD_CLASS).excluding(ADD_CARD_ID),
            commit_to(store.clone(), CollectionId::Sites),
        )?;
        let engine_list = ReorderList::enable(
            &mut doc,
            SETTINGS_LIST_ID,
            ItemSelector::class(ENGINE_ROW_CLASS),
            commit_to(store.clone(), CollectionId::SearchEngines),
        )?;

        Ok(Self {
            doc,
            store,
            touch: TouchTranslator::new(config.touch),
            grid,
            engine_list,
            pending,
            debouncer: SettingsDebouncer::new(config.settings_debounce_ms),
        })
    }

    // --- accessors ---

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn store(&self) -> Ref<'_, Store<B>> {
        self.store.borrow()
    }

    pub fn touch(&self) -> &TouchTranslator {
        &self.touch
    }

    pub fn reorder_list(&self, view: View) -> Option<&ReorderList> {
        match view {
            View::Grid => Some(&self.grid),
            View::SettingsList => Some(&self.engine_list),
            View::Dropdown => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.grid.is_dragging() || self.engine_list.is_dragging()
    }

    fn view_container(&self, view: View) -> Option<ElementId> {
        let id = match view {
            View::Grid => GRID_ID,
            View::SettingsList => SETTINGS_LIST_ID,
            View::Dropdown => DROPDOWN_ID,
        };
        self.doc.get_element_by_id(id)
    }

    /// Rendered element for entity `id` in `view`.
    pub fn element_for(&self, view: View, id: &str) -> Option<ElementId> {
        let container = self.view_container(view)?;
        self.doc
            .children(container)
            .iter()
            .copied()
            .find(|el| self.doc.data_id(*el) == Some(id))
    }

    /// Entity ids in the order `view` currently shows them.
    pub fn view_order(&self, view: View) -> Vec<String> {
        let Some(container) = self.view_container(view) else {
            return Vec::new();
        };
        let selector = match view {
            View::Grid => ItemSelector::class(SITE_CARD_CLASS).excluding(ADD_CARD_ID),
            View::SettingsList => ItemSelector::class(ENGINE_ROW_CLASS),
            View::Dropdown => ItemSelector::class(DROPDOWN_ITEM_CLASS),
        };
        self.doc
            .query_children(container, &selector)
            .into_iter()
            .filter_map(|el| self.doc.data_id(el).map(str::to_string))
            .collect()
    }

    // --- input ---

    /// Entry point for raw touch input.
    pub fn dispatch_touch(&mut self, input: &TouchInput) -> Vec<PageAction> {
        let events = self.touch.handle(&mut self.doc, input);
        events
            .iter()
            .filter_map(|ev| self.dispatch_pointer(ev))
            .collect()
    }

    /// Entry point for native pointer and drag events; translated touch input
    /// ends up here too.
    pub fn dispatch_pointer(&mut self, ev: &SyntheticEvent) -> Option<PageAction> {
        let action = match ev.kind {
            SyntheticKind::DragStart if self.is_dragging() => {
                log::warn!("[Page] Drag already in progress, ignoring drag start");
                None
            }
            SyntheticKind::DragStart
            | SyntheticKind::DragOver
            | SyntheticKind::Drop
            | SyntheticKind::DragEnd => {
                for list in [&mut self.grid, &mut self.engine_list] {
                    if list.handle(&mut self.doc, ev) != ReorderOutcome::Ignored {
                        break;
                    }
                }
                None
            }
            SyntheticKind::Click => self.on_click(ev.target),
            SyntheticKind::DoubleClick => self.on_double_click(ev.target),
            SyntheticKind::PointerDown | SyntheticKind::PointerMove | SyntheticKind::PointerUp => None,
        };
        self.flush_changes();
        action
    }

    fn closest_with_class(&self, el: ElementId, class: &str) -> Option<ElementId> {
        self.doc.closest(el, |d, e| d.has_class(e, class))
    }

    fn is_within(&self, dom_id: &str, el: ElementId) -> bool {
        self.doc
            .get_element_by_id(dom_id)
            .is_some_and(|container| self.doc.contains(container, el))
    }

    fn on_click(&mut self, target: ElementId) -> Option<PageAction> {
        if self.is_within(ENGINE_BUTTON_ID, target) {
            self.toggle_dropdown();
            return None;
        }
        if self.is_dropdown_open()
            && !self.is_within(DROPDOWN_ID, target)
            && !self.is_within(SEARCH_INPUT_ID, target)
        {
            self.close_dropdown();
        }

        if let Some(card) = self.closest_with_class(target, SITE_CARD_CLASS) {
            if self.doc.dom_id(card) == Some(ADD_CARD_ID) {
                return Some(PageAction::ShowAddSite);
            }
            let id = self.doc.data_id(card)?;
            let url = self.store.borrow().get(CollectionId::Sites, id)?.target_url_template.clone();
            return Some(PageAction::Open(url));
        }
        if let Some(button) = self.closest_with_class(target, EDIT_ENGINE_CLASS) {
            let id = self.doc.data_id(button)?;
            return Some(PageAction::EditSearchEngine(id.to_string()));
        }
        if let Some(item) = self.closest_with_class(target, DROPDOWN_ITEM_CLASS) {
            let id = self.doc.data_id(item)?.to_string();
            if let Err(e) = self.set_active_search_engine(&id) {
                log::warn!("[Page] Failed to switch search engine to {}: {}", id, e);
            }
            self.close_dropdown();
        }
        None
    }

    fn on_double_click(&mut self, target: ElementId) -> Option<PageAction> {
        let card = self.closest_with_class(target, SITE_CARD_CLASS)?;
        if self.doc.dom_id(card) == Some(ADD_CARD_ID) {
            return None;
        }
        self.doc
            .data_id(card)
            .map(|id| PageAction::EditSite(id.to_string()))
    }

    // --- rendering ---

    /// Re-renders every view affected by store changes since the last call.
    fn flush_changes(&mut self) {
        let changes: Vec<StoreChange> = std::mem::take(&mut *self.pending.borrow_mut());
        if changes.is_empty() {
            return;
        }
        let sites = changes.iter().any(|c| c.touches(CollectionId::Sites));
        let engines = changes.iter().any(|c| c.touches(CollectionId::SearchEngines));
        let settings = changes
            .iter()
            .any(|c| matches!(c, StoreChange::Settings | StoreChange::All));

        if sites {
            self.render(CollectionId::Sites);
        }
        if engines {
            self.render(CollectionId::SearchEngines);
        } else if settings {
            render_dropdown(&mut self.doc, &self.store.borrow());
        }
        if settings {
            let background = self.store.borrow().settings().background.clone();
            render_background(&mut self.doc, &background);
        }
    }

    /// Rebuilds the views showing `collection` from the store.
    pub fn render(&mut self, collection: CollectionId) {
        let store = self.store.borrow();
        match collection {
            CollectionId::Sites => {
                self.grid.cancel(&mut self.doc);
                render_sites(&mut self.doc, &store);
                self.grid.attach_items(&mut self.doc);
            }
            CollectionId::SearchEngines => {
                self.engine_list.cancel(&mut self.doc);
                render_engines(&mut self.doc, &store);
                render_dropdown(&mut self.doc, &store);
                self.engine_list.attach_items(&mut self.doc);
            }
        }
    }

    // --- search bar ---

    pub fn search_text(&self) -> &str {
        self.doc
            .get_element_by_id(SEARCH_INPUT_ID)
            .map_or("", |input| self.doc.text(input))
    }

    pub fn set_search_text(&mut self, text: &str) {
        if let Some(input) = self.doc.get_element_by_id(SEARCH_INPUT_ID) {
            self.doc.set_text(input, text);
        }
    }

    /// Keyboard input for the focused search box.
    ///
    /// `/` on an empty box opens the engine dropdown, Escape closes it and the
    /// arrow keys cycle engines while it is open. Enter returns the search URL
    /// for the typed query and clears the box.
    pub fn dispatch_key(&mut self, key: Key) -> Option<PageAction> {
        match key {
            Key::Enter => {
                let url = self.search(self.search_text());
                self.set_search_text("");
                url.map(PageAction::Open)
            }
            Key::Escape => {
                self.close_dropdown();
                None
            }
            Key::Char('/') if self.search_text().is_empty() => {
                self.open_dropdown();
                None
            }
            Key::ArrowUp | Key::ArrowDown if self.is_dropdown_open() => {
                let direction = if key == Key::ArrowDown {
                    Direction::Forward
                } else {
                    Direction::Backward
                };
                if let Err(e) = self.cycle_search_engine(direction) {
                    log::warn!("[Page] Failed to cycle search engine: {}", e);
                }
                None
            }
            Key::ArrowUp | Key::ArrowDown => None,
            Key::Char(c) => {
                let mut text = self.search_text().to_string();
                text.push(c);
                self.set_search_text(&text);
                None
            }
            Key::Backspace => {
                let mut text = self.search_text().to_string();
                text.pop();
                self.set_search_text(&text);
                None
            }
        }
    }

    /// URL for searching `query` with the active engine.
    pub fn search(&self, query: &str) -> Option<String> {
        let store = self.store.borrow();
        let engine = store.active_search_engine()?;
        navigation::search_url(engine, query)
    }

    pub fn set_active_search_engine(&mut self, id: &str) -> Result<(), StoreError> {
        let result = self.store.borrow_mut().set_active_search_engine(id);
        self.flush_changes();
        swallow_not_found(result)
    }

    /// Moves the active engine one step through the list, wrapping around.
    pub fn cycle_search_engine(&mut self, direction: Direction) -> Result<(), StoreError> {
        let next = {
            let store = self.store.borrow();
            let engines = store.search_engines();
            if engines.is_empty() {
                return Ok(());
            }
            let active = &store.settings().active_search_engine_id;
            let current = engines.iter().position(|e| &e.id == active).unwrap_or(0);
            let next = match direction {
                Direction::Forward => (current + 1) % engines.len(),
                Direction::Backward => (current + engines.len() - 1) % engines.len(),
            };
            engines[next].id.clone()
        };
        self.set_active_search_engine(&next)
    }

    pub fn is_dropdown_open(&self) -> bool {
        self.doc
            .get_element_by_id(DROPDOWN_ID)
            .is_some_and(|el| !self.doc.has_class(el, "hidden"))
    }

    pub fn open_dropdown(&mut self) {
        if let Some(el) = self.doc.get_element_by_id(DROPDOWN_ID) {
            self.doc.remove_class(el, "hidden");
        }
    }

    pub fn close_dropdown(&mut self) {
        if let Some(el) = self.doc.get_element_by_id(DROPDOWN_ID) {
            self.doc.add_class(el, "hidden");
        }
    }

    pub fn toggle_dropdown(&mut self) {
        if self.is_dropdown_open() {
            self.close_dropdown();
        } else {
            self.open_dropdown();
        }
    }

    // --- forms ---

    /// Adds a site (empty form id) or updates an existing one.
    pub fn save_site(&mut self, form: &EntityForm) -> Result<(), StoreError> {
        self.save(CollectionId::Sites, form)
    }

    pub fn save_search_engine(&mut self, form: &EntityForm) -> Result<(), StoreError> {
        self.save(CollectionId::SearchEngines, form)
    }

    fn save(&mut self, collection: CollectionId, form: &EntityForm) -> Result<(), StoreError> {
        let is_new = form.id.trim().is_empty();
        let entity: Entity = navigation::entity_from_form(form, collection)?;
        let result = if is_new {
            self.store.borrow_mut().add(collection, entity)
        } else {
            self.store.borrow_mut().update(collection, entity)
        };
        self.flush_changes();
        swallow_not_found(result)
    }

    pub fn delete_site(&mut self, id: &str) -> Result<(), StoreError> {
        self.delete(CollectionId::Sites, id)
    }

    pub fn delete_search_engine(&mut self, id: &str) -> Result<(), StoreError> {
        self.delete(CollectionId::SearchEngines, id)
    }

    fn delete(&mut self, collection: CollectionId, id: &str) -> Result<(), StoreError> {
        let result = self.store.borrow_mut().delete(collection, id);
        self.flush_changes();
        swallow_not_found(result)
    }

    // --- settings & data ---

    /// Applies `background` to the overlay right away and schedules the
    /// settings write for `now_ms + debounce`.
    pub fn schedule_background(&mut self, background: Background, now_ms: u64) {
        render_background(&mut self.doc, &background);
        let mut settings = self
            .debouncer
            .peek()
            .cloned()
            .unwrap_or_else(|| self.store.borrow().settings().clone());
        settings.background = background;
        self.debouncer.schedule(settings, now_ms);
    }

    /// Writes a debounced settings change once its delay has elapsed.
    pub fn tick(&mut self, now_ms: u64) {
        if let Some(settings) = self.debouncer.poll(now_ms) {
            self.store.borrow_mut().update_settings(settings);
            self.flush_changes();
        }
    }

    pub fn flush_pending(&mut self) {
        if let Some(settings) = self.debouncer.flush() {
            self.store.borrow_mut().update_settings(settings);
            self.flush_changes();
        }
    }

    pub fn export_json(&self) -> Result<String, StoreError> {
        self.store.borrow().export_json()
    }

    pub fn import_json(&mut self, json: &str) -> Result<(), StoreError> {
        let result = self.store.borrow_mut().import_json(json);
        self.flush_changes();
        result
    }
}

/// Builds the `onReordered` callback that commits a view's order to the store.
fn commit_to<B: StorageBackend + 'static>(
    store: Rc<RefCell<Store<B>>>,
    collection: CollectionId,
) -> ReorderCallback {
    Box::new(move |new_order: &[String], original: &[String]| {
        log::debug!(
            "[Page] {} reordered from {:?} to {:?}",
            collection,
            original,
            new_order
        );
        if let Err(e) = store.borrow_mut().apply_order(collection, new_order) {
            log::warn!("[Page] Failed to commit {} order: {}", collection, e);
        }
    })
}

/// Unknown ids are logged by the store and never surfaced to the user.
fn swallow_not_found(result: Result<(), StoreError>) -> Result<(), StoreError> {
    match result {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => other,
    }
}

fn build_skeleton(doc: &mut Document, grid_columns: usize) {
    let root = doc.root();
    let columns = grid_columns.max(1);

    let background = doc.create_element("div");
    doc.set_dom_id(background, BACKGROUND_ID);
    doc.set_frame(background, VIEWPORT);
    doc.add_class(background, "hidden");
    doc.append_child(root, background);

    let grid = doc.create_element("div");
    doc.set_dom_id(grid, GRID_ID);
    doc.set_frame(
        grid,
        Rect::new(40.0, 240.0, columns as f64 * (CARD_SIZE + CARD_GAP), 640.0),
    );
    doc.set_layout(
        grid,
        Layout::Grid {
            columns,
            cell_width: CARD_SIZE,
            cell_height: CARD_SIZE,
            gap: CARD_GAP,
        },
    );
    doc.append_child(root, grid);

    let button = doc.create_element("button");
    doc.set_dom_id(button, ENGINE_BUTTON_ID);
    doc.set_frame(button, Rect::new(280.0, 100.0, 40.0, 40.0));
    doc.append_child(root, button);

    let input = doc.create_element("input");
    doc.set_dom_id(input, SEARCH_INPUT_ID);
    doc.set_frame(input, Rect::new(320.0, 100.0, 400.0, 40.0));
    doc.append_child(root, input);

    let add_card = doc.create_element("div");
    doc.set_dom_id(add_card, ADD_CARD_ID);
    doc.add_class(add_card, SITE_CARD_CLASS);
    doc.set_text(add_card, "+");
    doc.append_child(grid, add_card);

    let settings = doc.create_element("div");
    doc.set_dom_id(settings, SETTINGS_LIST_ID);
    doc.set_frame(settings, Rect::new(880.0, 240.0, SETTINGS_WIDTH, 640.0));
    doc.set_layout(
        settings,
        Layout::List {
            item_height: ENGINE_ROW_HEIGHT,
            gap: 8.0,
        },
    );
    doc.append_child(root, settings);

    // Added last so it paints above the grid when open.
    let dropdown = doc.create_element("div");
    doc.set_dom_id(dropdown, DROPDOWN_ID);
    doc.add_class(dropdown, "hidden");
    doc.set_frame(dropdown, Rect::new(320.0, 150.0, 240.0, 200.0));
    doc.set_layout(
        dropdown,
        Layout::List {
            item_height: DROPDOWN_ROW_HEIGHT,
            gap: 0.0,
        },
    );
    doc.append_child(root, dropdown);
}

fn append_icon(doc: &mut Document, parent: ElementId, entity: &Entity, frame: Rect) {
    let img = doc.create_element("img");
    doc.set_attr(img, "src", &entity.icon_url);
    doc.set_attr(img, "alt", &entity.display_name);
    doc.set_frame(img, frame);
    doc.append_child(parent, img);
}

fn append_label(doc: &mut Document, parent: ElementId, text: &str, frame: Rect) {
    let span = doc.create_element("span");
    doc.set_text(span, text);
    doc.set_frame(span, frame);
    doc.append_child(parent, span);
}

fn render_sites<B: StorageBackend>(doc: &mut Document, store: &Store<B>) {
    let (Some(grid), Some(add_card)) = (doc.get_element_by_id(GRID_ID), doc.get_element_by_id(ADD_CARD_ID))
    else {
        log::error!("[Page] Grid view is missing from the document");
        return;
    };
    let stale: Vec<ElementId> = doc
        .children(grid)
        .iter()
        .copied()
        .filter(|c| *c != add_card)
        .collect();
    for el in stale {
        doc.drop_subtree(el);
    }

    for site in store.sites() {
        let card = doc.create_element("div");
        doc.add_class(card, SITE_CARD_CLASS);
        doc.set_data_id(card, &site.id);
        append_icon(doc, card, site, Rect::new(38.0, 20.0, 24.0, 24.0));
        append_label(doc, card, &site.display_name, Rect::new(0.0, 60.0, CARD_SIZE, 20.0));
        doc.insert_before(grid, card, Some(add_card));
    }
}

fn render_engines<B: StorageBackend>(doc: &mut Document, store: &Store<B>) {
    let Some(list) = doc.get_element_by_id(SETTINGS_LIST_ID) else {
        log::error!("[Page] Search engine settings list is missing from the document");
        return;
    };
    doc.drop_children(list);

    for engine in store.search_engines() {
        let row = doc.create_element("div");
        doc.add_class(row, ENGINE_ROW_CLASS);
        doc.set_data_id(row, &engine.id);

        let handle = doc.create_element("div");
        doc.add_class(handle, "drag-handle");
        doc.set_frame(handle, Rect::new(8.0, 12.0, 16.0, 20.0));
        doc.append_child(row, handle);

        append_icon(doc, row, engine, Rect::new(32.0, 12.0, 20.0, 20.0));
        append_label(doc, row, &engine.display_name, Rect::new(60.0, 12.0, 200.0, 20.0));

        let edit = doc.create_element("button");
        doc.add_class(edit, EDIT_ENGINE_CLASS);
        doc.set_data_id(edit, &engine.id);
        doc.set_frame(edit, Rect::new(SETTINGS_WIDTH - 40.0, 10.0, 24.0, 24.0));
        doc.append_child(row, edit);

        doc.append_child(list, row);
    }
}

fn render_dropdown<B: StorageBackend>(doc: &mut Document, store: &Store<B>) {
    let Some(dropdown) = doc.get_element_by_id(DROPDOWN_ID) else {
        log::error!("[Page] Search engine dropdown is missing from the document");
        return;
    };
    doc.drop_children(dropdown);

    let active = &store.settings().active_search_engine_id;
    for engine in store.search_engines() {
        let item = doc.create_element("div");
        doc.add_class(item, DROPDOWN_ITEM_CLASS);
        doc.toggle_class(item, "selected", &engine.id == active);
        doc.set_data_id(item, &engine.id);
        append_icon(doc, item, engine, Rect::new(12.0, 8.0, 20.0, 20.0));
        append_label(doc, item, &engine.display_name, Rect::new(44.0, 8.0, 160.0, 20.0));
        doc.append_child(dropdown, item);
    }
}

fn render_background(doc: &mut Document, background: &Background) {
    let Some(overlay) = doc.get_element_by_id(BACKGROUND_ID) else {
        return;
    };
    doc.toggle_class(overlay, "hidden", !background.is_visible());
    doc.set_attr(overlay, "background-image", &background.url);
    doc.set_attr(overlay, "filter", &format!("blur({}px)", background.blur_radius_px));
    doc.set_opacity(overlay, Some(background.opacity));
}
