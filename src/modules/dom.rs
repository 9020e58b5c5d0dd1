// Retained element model standing in for the live DOM.
// Views render into it, the touch layer hit-tests it and the reorder engine
// moves nodes around in it. Layout is derived from each container's `Layout`
// so moving a node immediately changes where its siblings are drawn.

use std::collections::{BTreeMap, BTreeSet};

/// Handle to a node. Handles to dropped nodes go stale: reads see an empty
/// detached node and writes are ignored, even after the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId {
    index: usize,
    generation: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }

    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.mid_y())
    }
}

/// How a container positions its children.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Layout {
    /// Children use their own frame, relative to the container origin.
    Absolute,
    /// One full-width row per child.
    List { item_height: f64, gap: f64 },
    /// Fixed-size cells filled left to right, top to bottom.
    Grid {
        columns: usize,
        cell_width: f64,
        cell_height: f64,
        gap: f64,
    },
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    classes: BTreeSet<String>,
    text: String,
    opacity: Option<f64>,
    frame: Rect,
    layout: Layout,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl Node {
    const EMPTY: Node = Node {
        tag: String::new(),
        attrs: BTreeMap::new(),
        classes: BTreeSet::new(),
        text: String::new(),
        opacity: None,
        frame: Rect {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        },
        layout: Layout::Absolute,
        parent: None,
        children: Vec::new(),
    };

    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::EMPTY
        }
    }
}

static DETACHED: Node = Node::EMPTY;

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Matches list items the way `.class:not(#id)` would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSelector {
    class: String,
    excluded_dom_id: Option<String>,
}

impl ItemSelector {
    pub fn class(class: &str) -> Self {
        Self {
            class: class.to_string(),
            excluded_dom_id: None,
        }
    }

    pub fn excluding(mut self, dom_id: &str) -> Self {
        self.excluded_dom_id = Some(dom_id.to_string());
        self
    }

    pub fn matches(&self, doc: &Document, el: ElementId) -> bool {
        if !doc.has_class(el, &self.class) {
            return false;
        }
        match (&self.excluded_dom_id, doc.dom_id(el)) {
            (Some(excluded), Some(id)) => excluded != id,
            _ => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: ElementId,
}

impl Document {
    pub fn new(viewport: Rect) -> Self {
        let mut body = Node::new("body");
        body.frame = viewport;
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(body),
            }],
            free: Vec::new(),
            root: ElementId {
                index: 0,
                generation: 0,
            },
        }
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    fn slot_node(&self, el: ElementId) -> Option<&Node> {
        self.slots
            .get(el.index)
            .filter(|slot| slot.generation == el.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node(&self, el: ElementId) -> &Node {
        self.slot_node(el).unwrap_or(&DETACHED)
    }

    fn node_mut(&mut self, el: ElementId) -> Option<&mut Node> {
        self.slots
            .get_mut(el.index)
            .filter(|slot| slot.generation == el.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn create_element(&mut self, tag: &str) -> ElementId {
        let node = Some(Node::new(tag));
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = node;
            return ElementId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            node,
        });
        ElementId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// False once `el` has been dropped.
    pub fn is_live(&self, el: ElementId) -> bool {
        self.slot_node(el).is_some()
    }

    /// Number of nodes currently allocated, attached or not.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Detaches `el` and frees it with its whole subtree. The root is never dropped.
    pub fn drop_subtree(&mut self, el: ElementId) {
        if el == self.root || !self.is_live(el) {
            return;
        }
        self.remove(el);
        let mut stack = vec![el];
        while let Some(id) = stack.pop() {
            let Some(slot) = self.slots.get_mut(id.index) else {
                continue;
            };
            if slot.generation != id.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                stack.extend(node.children);
            }
        }
    }

    /// Frees every child of `parent`.
    pub fn drop_children(&mut self, parent: ElementId) {
        for child in self.children(parent).to_vec() {
            self.drop_subtree(child);
        }
    }

    pub fn tag(&self, el: ElementId) -> &str {
        &self.node(el).tag
    }

    // --- tree ---

    pub fn parent(&self, el: ElementId) -> Option<ElementId> {
        self.node(el).parent
    }

    pub fn children(&self, el: ElementId) -> &[ElementId] {
        &self.node(el).children
    }

    /// Detaches `el` from its parent. Its subtree stays intact.
    pub fn remove(&mut self, el: ElementId) {
        let Some(parent) = self.node(el).parent else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != el);
        }
        if let Some(n) = self.node_mut(el) {
            n.parent = None;
        }
    }

    pub fn append_child(&mut self, parent: ElementId, child: ElementId) {
        self.insert_before(parent, child, None);
    }

    /// Moves `child` under `parent`, before `reference` or at the end when
    /// `reference` is `None` or not a child of `parent`.
    pub fn insert_before(&mut self, parent: ElementId, child: ElementId, reference: Option<ElementId>) {
        if !self.is_live(parent) || !self.is_live(child) {
            log::warn!("[Document] Ignoring insert of a dropped node {:?}", child);
            return;
        }
        if parent == child || self.contains(child, parent) {
            log::warn!("[Document] Refusing to insert {:?} into its own subtree", child);
            return;
        }
        self.remove(child);
        let siblings = &self.node(parent).children;
        let at = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        if let Some(p) = self.node_mut(parent) {
            p.children.insert(at, child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// True when `el` is `ancestor` or lives somewhere below it.
    pub fn contains(&self, ancestor: ElementId, el: ElementId) -> bool {
        let mut cur = Some(el);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.parent(c);
        }
        false
    }

    pub fn is_attached(&self, el: ElementId) -> bool {
        self.contains(self.root, el)
    }

    /// Nearest element, starting at `el` and walking up, that satisfies `pred`.
    /// The root itself is never returned.
    pub fn closest(&self, el: ElementId, pred: impl Fn(&Document, ElementId) -> bool) -> Option<ElementId> {
        let mut cur = Some(el);
        while let Some(c) = cur {
            if c == self.root {
                return None;
            }
            if pred(self, c) {
                return Some(c);
            }
            cur = self.parent(c);
        }
        None
    }

    pub fn query_children(&self, parent: ElementId, selector: &ItemSelector) -> Vec<ElementId> {
        self.children(parent)
            .iter()
            .copied()
            .filter(|c| selector.matches(self, *c))
            .collect()
    }

    pub fn get_element_by_id(&self, dom_id: &str) -> Option<ElementId> {
        let mut stack = vec![self.root];
        while let Some(el) = stack.pop() {
            if self.dom_id(el) == Some(dom_id) {
                return Some(el);
            }
            stack.extend(self.children(el).iter().rev());
        }
        None
    }

    // --- attributes & style ---

    pub fn set_attr(&mut self, el: ElementId, name: &str, value: &str) {
        if let Some(n) = self.node_mut(el) {
            n.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn attr(&self, el: ElementId, name: &str) -> Option<&str> {
        self.node(el).attrs.get(name).map(String::as_str)
    }

    pub fn set_dom_id(&mut self, el: ElementId, dom_id: &str) {
        self.set_attr(el, "id", dom_id);
    }

    pub fn dom_id(&self, el: ElementId) -> Option<&str> {
        self.attr(el, "id")
    }

    pub fn set_data_id(&mut self, el: ElementId, id: &str) {
        self.set_attr(el, "data-id", id);
    }

    pub fn data_id(&self, el: ElementId) -> Option<&str> {
        self.attr(el, "data-id")
    }

    pub fn set_draggable(&mut self, el: ElementId, draggable: bool) {
        self.set_attr(el, "draggable", if draggable { "true" } else { "false" });
    }

    pub fn is_draggable(&self, el: ElementId) -> bool {
        self.attr(el, "draggable") == Some("true")
    }

    pub fn add_class(&mut self, el: ElementId, class: &str) {
        if let Some(n) = self.node_mut(el) {
            n.classes.insert(class.to_string());
        }
    }

    pub fn remove_class(&mut self, el: ElementId, class: &str) {
        if let Some(n) = self.node_mut(el) {
            n.classes.remove(class);
        }
    }

    pub fn toggle_class(&mut self, el: ElementId, class: &str, on: bool) {
        if on {
            self.add_class(el, class);
        } else {
            self.remove_class(el, class);
        }
    }

    pub fn has_class(&self, el: ElementId, class: &str) -> bool {
        self.node(el).classes.contains(class)
    }

    pub fn set_text(&mut self, el: ElementId, text: &str) {
        if let Some(n) = self.node_mut(el) {
            n.text = text.to_string();
        }
    }

    pub fn text(&self, el: ElementId) -> &str {
        &self.node(el).text
    }

    /// `None` resets to the stylesheet default.
    pub fn set_opacity(&mut self, el: ElementId, opacity: Option<f64>) {
        if let Some(n) = self.node_mut(el) {
            n.opacity = opacity;
        }
    }

    pub fn opacity(&self, el: ElementId) -> Option<f64> {
        self.node(el).opacity
    }

    // --- geometry ---

    pub fn set_layout(&mut self, el: ElementId, layout: Layout) {
        if let Some(n) = self.node_mut(el) {
            n.layout = layout;
        }
    }

    pub fn set_frame(&mut self, el: ElementId, frame: Rect) {
        if let Some(n) = self.node_mut(el) {
            n.frame = frame;
        }
    }

    pub fn frame(&self, el: ElementId) -> Rect {
        self.node(el).frame
    }

    /// Viewport-space rect, resolved through every ancestor's layout.
    pub fn bounding_rect(&self, el: ElementId) -> Rect {
        let node = self.node(el);
        let Some(parent) = node.parent else {
            return node.frame;
        };
        let origin = self.bounding_rect(parent);
        let index = self
            .children(parent)
            .iter()
            .position(|c| *c == el)
            .unwrap_or(0);

        match self.node(parent).layout {
            Layout::Absolute => Rect::new(
                origin.x + node.frame.x,
                origin.y + node.frame.y,
                node.frame.width,
                node.frame.height,
            ),
            Layout::List { item_height, gap } => Rect::new(
                origin.x,
                origin.y + index as f64 * (item_height + gap),
                origin.width,
                item_height,
            ),
            Layout::Grid {
                columns,
                cell_width,
                cell_height,
                gap,
            } => {
                let columns = columns.max(1);
                let col = index % columns;
                let row = index / columns;
                Rect::new(
                    origin.x + col as f64 * (cell_width + gap),
                    origin.y + row as f64 * (cell_height + gap),
                    cell_width,
                    cell_height,
                )
            }
        }
    }

    /// Topmost visible element under `p`. Later siblings paint over earlier
    /// ones and elements with the `hidden` class are skipped with their subtree.
    pub fn element_from_point(&self, p: Point) -> Option<ElementId> {
        self.hit_test(self.root, p)
    }

    fn hit_test(&self, el: ElementId, p: Point) -> Option<ElementId> {
        if self.has_class(el, "hidden") {
            return None;
        }
        for child in self.children(el).iter().rev() {
            if let Some(hit) = self.hit_test(*child, p) {
                return Some(hit);
            }
        }
        if self.bounding_rect(el).contains(p) {
            Some(el)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_doc(n: usize) -> (Document, ElementId, Vec<ElementId>) {
        let mut doc = Document::new(Rect::new(0.0, 0.0, 800.0, 600.0));
        let list = doc.create_element("div");
        doc.set_frame(list, Rect::new(10.0, 20.0, 200.0, 400.0));
        doc.set_layout(list, Layout::List { item_height: 40.0, gap: 10.0 });
        doc.append_child(doc.root(), list);
        let items = (0..n)
            .map(|i| {
                let item = doc.create_element("div");
                doc.add_class(item, "row");
                doc.set_data_id(item, &format!("item-{}", i));
                doc.append_child(list, item);
                item
            })
            .collect();
        (doc, list, items)
    }

    #[test]
    fn list_layout_follows_child_order() {
        let (mut doc, list, items) = list_doc(3);
        assert_eq!(doc.bounding_rect(items[2]), Rect::new(10.0, 120.0, 200.0, 40.0));

        doc.insert_before(list, items[2], Some(items[0]));
        assert_eq!(doc.bounding_rect(items[2]), Rect::new(10.0, 20.0, 200.0, 40.0));
        assert_eq!(doc.bounding_rect(items[1]).y, 120.0);
    }

    #[test]
    fn grid_layout_wraps_rows() {
        let mut doc = Document::new(Rect::new(0.0, 0.0, 800.0, 600.0));
        let grid = doc.create_element("div");
        doc.set_layout(
            grid,
            Layout::Grid {
                columns: 2,
                cell_width: 100.0,
                cell_height: 100.0,
                gap: 10.0,
            },
        );
        doc.append_child(doc.root(), grid);
        let cells: Vec<_> = (0..3)
            .map(|_| {
                let c = doc.create_element("div");
                doc.append_child(grid, c);
                c
            })
            .collect();
        assert_eq!(doc.bounding_rect(cells[1]), Rect::new(110.0, 0.0, 100.0, 100.0));
        assert_eq!(doc.bounding_rect(cells[2]), Rect::new(0.0, 110.0, 100.0, 100.0));
    }

    #[test]
    fn hit_testing_finds_deepest_visible_element() {
        let (mut doc, list, items) = list_doc(2);
        let label = doc.create_element("span");
        doc.set_frame(label, Rect::new(5.0, 5.0, 50.0, 20.0));
        doc.append_child(items[1], label);

        assert_eq!(doc.element_from_point(Point::new(20.0, 80.0)), Some(label));
        assert_eq!(doc.element_from_point(Point::new(150.0, 80.0)), Some(items[1]));
        assert_eq!(doc.element_from_point(Point::new(150.0, 65.0)), Some(list));

        doc.add_class(list, "hidden");
        assert_eq!(doc.element_from_point(Point::new(150.0, 80.0)), Some(doc.root()));
    }

    #[test]
    fn closest_walks_ancestors_but_not_root() {
        let (mut doc, list, items) = list_doc(1);
        let label = doc.create_element("span");
        doc.append_child(items[0], label);
        doc.set_draggable(items[0], true);

        assert_eq!(doc.closest(label, |d, e| d.is_draggable(e)), Some(items[0]));
        assert_eq!(doc.closest(label, |d, e| d.tag(e) == "body"), None);
        assert_eq!(doc.closest(list, |d, e| d.is_draggable(e)), None);
    }

    #[test]
    fn selector_excludes_by_dom_id() {
        let (mut doc, list, items) = list_doc(3);
        doc.set_dom_id(items[2], "add-card");
        let sel = ItemSelector::class("row").excluding("add-card");
        assert_eq!(doc.query_children(list, &sel), vec![items[0], items[1]]);
        assert_eq!(doc.get_element_by_id("add-card"), Some(items[2]));
    }

    #[test]
    fn dropped_nodes_are_recycled_and_stale_handles_ignored() {
        let (mut doc, list, items) = list_doc(3);
        let label = doc.create_element("span");
        doc.append_child(items[0], label);
        let live = doc.live_count();

        doc.drop_subtree(items[0]);
        assert_eq!(doc.live_count(), live - 2);
        assert!(!doc.is_live(label));
        assert_eq!(doc.children(list), &[items[1], items[2]][..]);

        // reused slots hand out fresh handles
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        assert_eq!(doc.live_count(), live);
        assert!(a != items[0] && a != label && b != items[0] && b != label);

        doc.add_class(items[0], "row");
        doc.set_data_id(label, "ghost");
        assert!(!doc.has_class(a, "row") && !doc.has_class(b, "row"));
        assert_eq!(doc.data_id(a), None);
        doc.append_child(list, items[0]);
        assert_eq!(doc.children(list).len(), 2);
    }

    #[test]
    fn drop_children_keeps_arena_bounded() {
        let (mut doc, list, _) = list_doc(0);
        let base = doc.live_count();
        for round in 0..50 {
            doc.drop_children(list);
            for i in 0..4 {
                let item = doc.create_element("div");
                doc.set_data_id(item, &format!("{}-{}", round, i));
                doc.append_child(list, item);
            }
        }
        assert_eq!(doc.live_count(), base + 4);
        assert!(doc.slots.len() <= base + 4);
        doc.drop_subtree(doc.root());
        assert!(doc.is_live(doc.root()));
    }

    #[test]
    fn insert_into_own_subtree_is_refused() {
        let (mut doc, list, items) = list_doc(1);
        doc.insert_before(items[0], list, None);
        assert_eq!(doc.parent(list), Some(doc.root()));
        assert!(doc.is_attached(items[0]));
    }
}
