// Module exports for pure logic
pub mod dom;                 // Retained element tree, layout and hit testing
pub mod navigation;          // Search URLs, favicons, form normalization
pub mod order;               // Id-based list reordering
pub mod reorder;             // Drag-and-drop reorder engine
pub mod touch;               // Touch -> pointer/drag event translation
