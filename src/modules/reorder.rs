// Drag-to-reorder engine for one container.
// Consumes synthetic drag events (native or translated from touch), moves the
// dragged element live inside the container and reports the final order once.

use crate::error::ReorderError;
use crate::modules::dom::{Document, ElementId, ItemSelector, Rect};
use crate::modules::touch::{SyntheticEvent, SyntheticKind};

pub const DRAGGING_CLASS: &str = "dragging";
pub const PLACEHOLDER_CLASS: &str = "placeholder";

/// Receives `(new_order_ids, original_order_ids)` after a drag changed the order.
pub type ReorderCallback = Box<dyn FnMut(&[String], &[String])>;

/// Transient state for the one drag in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub dragged: ElementId,
    pub placeholder: ElementId,
    pub original_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome {
    Ignored,
    Started,
    Moved,
    /// Drag finished; `changed` tells whether the callback fired.
    Finished { changed: bool },
}

pub struct ReorderList {
    container: ElementId,
    selector: ItemSelector,
    session: Option<DragSession>,
    on_reordered: ReorderCallback,
}

impl std::fmt::Debug for ReorderList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReorderList")
            .field("container", &self.container)
            .field("selector", &self.selector)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ReorderList {
    /// Makes the children of `#container_dom_id` matching `selector` reorderable.
    pub fn enable(
        doc: &mut Document,
        container_dom_id: &str,
        selector: ItemSelector,
        on_reordered: ReorderCallback,
    ) -> Result<Self, ReorderError> {
        let container = doc
            .get_element_by_id(container_dom_id)
            .ok_or_else(|| ReorderError::MissingContainer(container_dom_id.to_string()))?;

        let list = Self {
            container,
            selector,
            session: None,
            on_reordered,
        };
        list.attach_items(doc);
        Ok(list)
    }

    /// Marks every current item draggable. Call again after re-rendering.
    pub fn attach_items(&self, doc: &mut Document) {
        for item in doc.query_children(self.container, &self.selector) {
            doc.set_draggable(item, true);
        }
    }

    pub fn container(&self) -> ElementId {
        self.container
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    /// Current item ids in document order.
    pub fn current_order(&self, doc: &Document) -> Vec<String> {
        doc.query_children(self.container, &self.selector)
            .into_iter()
            .filter_map(|el| doc.data_id(el).map(str::to_string))
            .collect()
    }

    pub fn handle(&mut self, doc: &mut Document, ev: &SyntheticEvent) -> ReorderOutcome {
        match ev.kind {
            SyntheticKind::DragStart => self.start(doc, ev),
            SyntheticKind::DragOver => self.drag_over(doc, ev),
            SyntheticKind::DragEnd => self.finish(doc, ev),
            // The order is already live in the document; dragend commits it.
            SyntheticKind::Drop => ReorderOutcome::Ignored,
            _ => ReorderOutcome::Ignored,
        }
    }

    fn item_for(&self, doc: &Document, el: ElementId) -> Option<ElementId> {
        let container = self.container;
        let selector = &self.selector;
        doc.closest(el, |d, e| d.parent(e) == Some(container) && selector.matches(d, e))
    }

    fn start(&mut self, doc: &mut Document, ev: &SyntheticEvent) -> ReorderOutcome {
        if self.session.is_some() {
            log::warn!("[Reorder] Drag start while a drag is active, ignoring");
            return ReorderOutcome::Ignored;
        }
        let Some(dragged) = self.item_for(doc, ev.target) else {
            return ReorderOutcome::Ignored;
        };

        let original_order = self.current_order(doc);

        let size = doc.bounding_rect(dragged);
        let placeholder = doc.create_element("div");
        doc.add_class(placeholder, PLACEHOLDER_CLASS);
        doc.set_frame(placeholder, Rect::new(0.0, 0.0, size.width, size.height));
        doc.add_class(dragged, DRAGGING_CLASS);

        log::debug!(
            "[Reorder] Drag started on {:?}, order: {:?}",
            doc.data_id(dragged),
            original_order
        );
        self.session = Some(DragSession {
            dragged,
            placeholder,
            original_order,
        });
        ReorderOutcome::Started
    }

    fn drag_over(&mut self, doc: &mut Document, ev: &SyntheticEvent) -> ReorderOutcome {
        let Some(session) = &self.session else {
            return ReorderOutcome::Ignored;
        };
        if !doc.contains(self.container, ev.target) {
            return ReorderOutcome::Ignored;
        }
        let (dragged, placeholder) = (session.dragged, session.placeholder);

        let reference = match self.insert_before_target(doc, ev.client.y) {
            Some(target) => Some(target),
            None => self.end_anchor(doc, &[dragged, placeholder]),
        };

        doc.insert_before(self.container, placeholder, reference);
        doc.insert_before(self.container, dragged, reference);
        ReorderOutcome::Moved
    }

    /// First non-dragging item whose vertical midpoint lies below `y`: among
    /// items with a negative offset, the one closest to zero, earliest in
    /// document order on ties. `None` when the pointer is below every item.
    fn insert_before_target(&self, doc: &Document, y: f64) -> Option<ElementId> {
        let mut best: Option<(f64, ElementId)> = None;
        for item in doc.query_children(self.container, &self.selector) {
            if doc.has_class(item, DRAGGING_CLASS) {
                continue;
            }
            let rect = doc.bounding_rect(item);
            let offset = y - rect.y - rect.height / 2.0;
            let closer = match best {
                Some((best_offset, _)) => offset > best_offset,
                None => true,
            };
            if offset < 0.0 && closer {
                best = Some((offset, item));
            }
        }
        best.map(|(_, item)| item)
    }

    /// Node that "the end of the list" sits before: the first non-item sibling
    /// after the last item (e.g. a trailing add-card), or `None` to append.
    fn end_anchor(&self, doc: &Document, skip: &[ElementId]) -> Option<ElementId> {
        let children: Vec<ElementId> = doc
            .children(self.container)
            .iter()
            .copied()
            .filter(|c| !skip.contains(c))
            .collect();
        let after_last_item = children
            .iter()
            .rposition(|c| self.selector.matches(doc, *c))
            .map(|i| i + 1)
            .unwrap_or(0);
        children.get(after_last_item).copied()
    }

    fn finish(&mut self, doc: &mut Document, ev: &SyntheticEvent) -> ReorderOutcome {
        match &self.session {
            Some(session) if session.dragged == ev.target => {}
            _ => return ReorderOutcome::Ignored,
        }
        let Some(session) = self.session.take() else {
            return ReorderOutcome::Ignored;
        };

        doc.drop_subtree(session.placeholder);
        doc.remove_class(session.dragged, DRAGGING_CLASS);

        let new_order = self.current_order(doc);
        let changed = new_order != session.original_order;
        if changed {
            log::info!("[Reorder] New order: {:?}", new_order);
            (self.on_reordered)(&new_order, &session.original_order);
        } else {
            log::debug!("[Reorder] Order unchanged, skipping callback");
        }
        ReorderOutcome::Finished { changed }
    }

    /// Aborts the active drag, putting items back in their original order
    /// without firing the callback.
    pub fn cancel(&mut self, doc: &mut Document) {
        let Some(session) = self.session.take() else {
            return;
        };
        doc.drop_subtree(session.placeholder);
        doc.remove_class(session.dragged, DRAGGING_CLASS);

        let items = doc.query_children(self.container, &self.selector);
        let anchor = self.end_anchor(doc, &items);
        for id in &session.original_order {
            if let Some(el) = items.iter().copied().find(|el| doc.data_id(*el) == Some(id.as_str())) {
                doc.insert_before(self.container, el, anchor);
            }
        }
        log::debug!("[Reorder] Drag cancelled, order restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::dom::{Layout, Point};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<(Vec<String>, Vec<String>)>>>;

    struct Fixture {
        doc: Document,
        list: ReorderList,
        items: Vec<ElementId>,
        add_card: ElementId,
        calls: Calls,
    }

    // Rows are 40px tall with no gap: item i spans [20 + 40i, 60 + 40i).
    fn fixture(ids: &[&str]) -> Fixture {
        let mut doc = Document::new(Rect::new(0.0, 0.0, 400.0, 600.0));
        let container = doc.create_element("div");
        doc.set_dom_id(container, "list");
        doc.set_frame(container, Rect::new(0.0, 20.0, 200.0, 400.0));
        doc.set_layout(container, Layout::List { item_height: 40.0, gap: 0.0 });
        doc.append_child(doc.root(), container);

        let items: Vec<_> = ids
            .iter()
            .map(|id| {
                let el = doc.create_element("div");
                doc.add_class(el, "row");
                doc.set_data_id(el, id);
                doc.append_child(container, el);
                el
            })
            .collect();
        let add_card = doc.create_element("div");
        doc.add_class(add_card, "row");
        doc.set_dom_id(add_card, "add");
        doc.append_child(container, add_card);

        let calls: Calls = Rc::default();
        let sink = calls.clone();
        let list = ReorderList::enable(
            &mut doc,
            "list",
            ItemSelector::class("row").excluding("add"),
            Box::new(move |new, old| sink.borrow_mut().push((new.to_vec(), old.to_vec()))),
        )
        .unwrap();

        Fixture {
            doc,
            list,
            items,
            add_card,
            calls,
        }
    }

    fn ev(kind: SyntheticKind, target: ElementId, y: f64) -> SyntheticEvent {
        SyntheticEvent::new(kind, target, Point::new(10.0, y), 0)
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn enable_marks_items_draggable_and_skips_excluded() {
        let f = fixture(&["a", "b"]);
        assert!(f.items.iter().all(|i| f.doc.is_draggable(*i)));
        assert!(!f.doc.is_draggable(f.add_card));
    }

    #[test]
    fn missing_container_is_a_setup_error() {
        let mut doc = Document::new(Rect::new(0.0, 0.0, 10.0, 10.0));
        let err = ReorderList::enable(&mut doc, "nope", ItemSelector::class("row"), Box::new(|_, _| {}))
            .unwrap_err();
        assert_eq!(err, ReorderError::MissingContainer("nope".into()));
    }

    #[test]
    fn dragging_last_item_to_top_reorders_once() {
        let Fixture { mut doc, mut list, items, calls, add_card } = fixture(&["a", "b", "c"]);

        assert_eq!(list.handle(&mut doc, &ev(SyntheticKind::DragStart, items[2], 110.0)), ReorderOutcome::Started);
        assert!(doc.has_class(items[2], DRAGGING_CLASS));

        // pointer above a's midpoint (40)
        assert_eq!(list.handle(&mut doc, &ev(SyntheticKind::DragOver, items[0], 30.0)), ReorderOutcome::Moved);
        assert_eq!(list.current_order(&doc), ids(&["c", "a", "b"]));
        assert_eq!(doc.children(list.container()).last(), Some(&add_card));

        let out = list.handle(&mut doc, &ev(SyntheticKind::DragEnd, items[2], 30.0));
        assert_eq!(out, ReorderOutcome::Finished { changed: true });
        assert_eq!(
            *calls.borrow(),
            vec![(ids(&["c", "a", "b"]), ids(&["a", "b", "c"]))]
        );
        assert!(list.session().is_none());
        assert!(!doc.has_class(items[2], DRAGGING_CLASS));
        assert!(doc.children(list.container()).iter().all(|c| !doc.has_class(*c, PLACEHOLDER_CLASS)));
    }

    #[test]
    fn dropping_in_place_fires_no_callback() {
        let Fixture { mut doc, mut list, items, calls, .. } = fixture(&["a", "b", "c"]);
        list.handle(&mut doc, &ev(SyntheticKind::DragStart, items[1], 80.0));
        // 70 is below a's midpoint (40) and above c's (120), so b lands back before c
        list.handle(&mut doc, &ev(SyntheticKind::DragOver, items[1], 70.0));
        assert_eq!(list.current_order(&doc), ids(&["a", "b", "c"]));
        let out = list.handle(&mut doc, &ev(SyntheticKind::Drop, items[1], 70.0));
        assert_eq!(out, ReorderOutcome::Ignored);
        let out = list.handle(&mut doc, &ev(SyntheticKind::DragEnd, items[1], 70.0));
        assert_eq!(out, ReorderOutcome::Finished { changed: false });
        assert!(calls.borrow().is_empty());
        assert!(list.session().is_none());
    }

    #[test]
    fn pointer_below_all_items_moves_to_end_before_trailing_card() {
        let Fixture { mut doc, mut list, items, calls, add_card } = fixture(&["a", "b", "c"]);
        list.handle(&mut doc, &ev(SyntheticKind::DragStart, items[0], 30.0));
        list.handle(&mut doc, &ev(SyntheticKind::DragOver, add_card, 500.0));
        assert_eq!(list.current_order(&doc), ids(&["b", "c", "a"]));
        assert_eq!(doc.children(list.container()).last(), Some(&add_card));
        list.handle(&mut doc, &ev(SyntheticKind::DragEnd, items[0], 500.0));
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn dragover_outside_container_or_without_session_is_ignored() {
        let Fixture { mut doc, mut list, items, .. } = fixture(&["a", "b"]);
        let root = doc.root();
        assert_eq!(list.handle(&mut doc, &ev(SyntheticKind::DragOver, items[0], 10.0)), ReorderOutcome::Ignored);

        list.handle(&mut doc, &ev(SyntheticKind::DragStart, items[1], 70.0));
        assert_eq!(list.handle(&mut doc, &ev(SyntheticKind::DragOver, root, 10.0)), ReorderOutcome::Ignored);
        assert_eq!(list.current_order(&doc), ids(&["a", "b"]));
    }

    #[test]
    fn second_drag_start_is_rejected_while_active() {
        let Fixture { mut doc, mut list, items, .. } = fixture(&["a", "b"]);
        list.handle(&mut doc, &ev(SyntheticKind::DragStart, items[0], 30.0));
        let out = list.handle(&mut doc, &ev(SyntheticKind::DragStart, items[1], 70.0));
        assert_eq!(out, ReorderOutcome::Ignored);
        assert_eq!(list.session().map(|s| s.dragged), Some(items[0]));
    }

    #[test]
    fn drag_start_on_nested_element_uses_its_item() {
        let Fixture { mut doc, mut list, items, .. } = fixture(&["a", "b"]);
        let label = doc.create_element("span");
        doc.append_child(items[1], label);
        assert_eq!(list.handle(&mut doc, &ev(SyntheticKind::DragStart, label, 70.0)), ReorderOutcome::Started);
        assert_eq!(list.session().map(|s| s.dragged), Some(items[1]));
    }

    #[test]
    fn repeated_drags_free_their_placeholders() {
        let Fixture { mut doc, mut list, items, .. } = fixture(&["a", "b", "c"]);
        let live = doc.live_count();
        for _ in 0..20 {
            list.handle(&mut doc, &ev(SyntheticKind::DragStart, items[2], 110.0));
            let placeholder = list.session().map(|s| s.placeholder).unwrap();
            list.handle(&mut doc, &ev(SyntheticKind::DragOver, items[0], 30.0));
            list.handle(&mut doc, &ev(SyntheticKind::DragEnd, items[2], 30.0));
            assert!(!doc.is_live(placeholder));

            list.handle(&mut doc, &ev(SyntheticKind::DragStart, items[2], 30.0));
            list.cancel(&mut doc);
        }
        assert_eq!(doc.live_count(), live);
    }

    #[test]
    fn cancel_restores_original_order_and_clears_state() {
        let Fixture { mut doc, mut list, items, calls, add_card } = fixture(&["a", "b", "c"]);
        list.handle(&mut doc, &ev(SyntheticKind::DragStart, items[2], 110.0));
        list.handle(&mut doc, &ev(SyntheticKind::DragOver, items[0], 30.0));
        assert_eq!(list.current_order(&doc), ids(&["c", "a", "b"]));

        list.cancel(&mut doc);
        assert_eq!(list.current_order(&doc), ids(&["a", "b", "c"]));
        assert_eq!(doc.children(list.container()).last(), Some(&add_card));
        assert!(list.session().is_none());
        assert!(items.iter().all(|i| !doc.has_class(*i, DRAGGING_CLASS)));
        assert!(calls.borrow().is_empty());
    }
}
