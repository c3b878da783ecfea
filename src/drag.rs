use tracing::debug;

use crate::model::Container;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Folder(i64),
    TopLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraggedItem {
    pub item_id: i64,
    pub origin: Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveIntent {
    pub item_id: i64,
    pub folder_id: Option<i64>,
}

/// Mouse drag of history items onto folders or back to the top-level list.
#[derive(Debug, Default)]
pub struct DragController {
    pressed: Option<DraggedItem>,
    dragging: bool,
    hover: Option<DropTarget>,
}

impl DragController {
    /// Mouse-down on an item row. Nothing is dragged until the pointer moves.
    pub fn press(&mut self, item_id: i64, origin: Container) {
        self.pressed = Some(DraggedItem { item_id, origin });
        self.dragging = false;
        self.hover = None;
    }

    pub fn pressed(&self) -> Option<DraggedItem> {
        self.pressed
    }

    pub fn dragged(&self) -> Option<DraggedItem> {
        if self.dragging { self.pressed } else { None }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn hover(&self) -> Option<DropTarget> {
        self.hover
    }

    /// Folders take anything; the top-level list only takes filed items.
    pub fn accepts(&self, target: DropTarget) -> bool {
        let Some(dragged) = self.dragged() else {
            return false;
        };
        match target {
            DropTarget::Folder(_) => true,
            DropTarget::TopLevel => matches!(dragged.origin, Container::Folder(_)),
        }
    }

    /// Pointer moved with the button held, over `target` (if any).
    pub fn drag_over(&mut self, target: Option<DropTarget>) {
        let Some(pressed) = self.pressed else {
            return;
        };
        if !self.dragging {
            self.dragging = true;
            debug!(item_id = pressed.item_id, "drag started");
        }
        // Leaving a target drops its highlight; entering one only highlights
        // when it would accept the drop.
        let hover = target.filter(|t| self.accepts(*t));
        self.hover = hover;
    }

    /// Button released. Returns the move to issue, if the drop is accepted.
    /// Drag state and highlight are cleared either way.
    pub fn drop(&mut self, target: Option<DropTarget>) -> Option<MoveIntent> {
        let intent = match (self.dragged(), target) {
            (Some(dragged), Some(target)) if self.accepts(target) => Some(MoveIntent {
                item_id: dragged.item_id,
                folder_id: match target {
                    DropTarget::Folder(id) => Some(id),
                    DropTarget::TopLevel => None,
                },
            }),
            _ => None,
        };
        self.end();
        intent
    }

    pub fn end(&mut self) {
        self.pressed = None;
        self.dragging = false;
        self.hover = None;
    }
}
