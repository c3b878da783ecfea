//! Per-item action menus.
//!
//! At most one menu and one submenu are open at a time. An open menu is
//! floated out of the sidebar pane onto the root layer so the pane cannot
//! clip it; closing puts it back inline under the container it came from.

use std::collections::BTreeMap;

use ratatui::layout::Rect;
use tracing::debug;

use crate::model::{Container, Folder};
use crate::tree::SidebarTree;

pub const MENU_WIDTH: u16 = 22;
pub const SUBMENU_WIDTH: u16 = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEntry {
    MoveToFolder,
    Delete,
}

pub const MENU_ENTRIES: [MenuEntry; 2] = [MenuEntry::MoveToFolder, MenuEntry::Delete];

impl MenuEntry {
    pub fn label(self) -> &'static str {
        match self {
            MenuEntry::MoveToFolder => "Move to folder",
            MenuEntry::Delete => "Delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmenuEntry {
    Folder { id: i64, name: String, color: String },
    NoFolder,
    CreateFolder,
}

impl SubmenuEntry {
    pub fn label(&self) -> &str {
        match self {
            SubmenuEntry::Folder { name, .. } => name,
            SubmenuEntry::NoFolder => "No folder",
            SubmenuEntry::CreateFolder => "Create new folder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: u16,
    pub y: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuPlacement {
    Inline {
        parent: Container,
    },
    Floating {
        parent: Container,
        position: Option<Position>,
    },
}

impl MenuPlacement {
    pub fn parent(self) -> Container {
        match self {
            MenuPlacement::Inline { parent } | MenuPlacement::Floating { parent, .. } => parent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionMenu {
    pub item_id: i64,
    pub hidden: bool,
    pub placement: MenuPlacement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Closed,
    Open { item_id: i64, submenu: bool },
}

/// What the caller should do after a menu or submenu entry was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    Move { item_id: i64, folder_id: Option<i64> },
    Delete { item_id: i64 },
    CreateFolder,
}

#[derive(Debug)]
pub struct MenuCoordinator {
    menus: BTreeMap<i64, ActionMenu>,
    destinations: Vec<SubmenuEntry>,
    state: MenuState,
    cursor: usize,
    sub_cursor: usize,
    margin: u16,
}

impl MenuCoordinator {
    pub fn new(margin: u16) -> Self {
        Self {
            menus: BTreeMap::new(),
            destinations: vec![SubmenuEntry::NoFolder, SubmenuEntry::CreateFolder],
            state: MenuState::Closed,
            cursor: 0,
            sub_cursor: 0,
            margin,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn open_item(&self) -> Option<i64> {
        match self.state {
            MenuState::Open { item_id, .. } => Some(item_id),
            MenuState::Closed => None,
        }
    }

    pub fn submenu_open(&self) -> bool {
        matches!(self.state, MenuState::Open { submenu: true, .. })
    }

    pub fn menu(&self, item_id: i64) -> Option<&ActionMenu> {
        self.menus.get(&item_id)
    }

    pub fn open_menus(&self) -> usize {
        self.menus.values().filter(|m| !m.hidden).count()
    }

    pub fn destinations(&self) -> &[SubmenuEntry] {
        &self.destinations
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn sub_cursor(&self) -> usize {
        self.sub_cursor
    }

    /// Recreates the menu records after a tree rebuild. Menus of vanished
    /// items are dropped; an open menu whose item survived stays open.
    pub fn sync(&mut self, tree: &SidebarTree, folders: &[Folder]) {
        let open = self.open_item();
        self.menus = tree
            .items()
            .map(|(item, container)| {
                (
                    item.id,
                    ActionMenu {
                        item_id: item.id,
                        hidden: true,
                        placement: MenuPlacement::Inline { parent: container },
                    },
                )
            })
            .collect();

        self.destinations = folders
            .iter()
            .map(|f| SubmenuEntry::Folder {
                id: f.id,
                name: f.name.clone(),
                color: f.color.clone(),
            })
            .collect();
        self.destinations.push(SubmenuEntry::NoFolder);
        self.destinations.push(SubmenuEntry::CreateFolder);
        self.sub_cursor = self.sub_cursor.min(self.destinations.len() - 1);

        match open {
            Some(item_id) if self.menus.contains_key(&item_id) => self.float(item_id),
            Some(item_id) => {
                debug!(item_id, "open menu's item vanished on rebuild");
                self.state = MenuState::Closed;
            }
            None => {}
        }
    }

    /// Trigger activation: opens the item's menu, closing any other, or
    /// closes it when it is already open.
    pub fn toggle(&mut self, item_id: i64) {
        if self.open_item() == Some(item_id) {
            self.close();
            return;
        }
        self.open(item_id);
    }

    pub fn open(&mut self, item_id: i64) {
        if !self.menus.contains_key(&item_id) {
            return;
        }
        if self.open_item().is_some() {
            self.close();
        }
        self.state = MenuState::Open {
            item_id,
            submenu: false,
        };
        self.cursor = 0;
        self.float(item_id);
        debug!(item_id, "action menu opened");
    }

    fn float(&mut self, item_id: i64) {
        if let Some(menu) = self.menus.get_mut(&item_id) {
            menu.hidden = false;
            if let MenuPlacement::Inline { parent } = menu.placement {
                menu.placement = MenuPlacement::Floating {
                    parent,
                    position: None,
                };
            }
        }
    }

    fn restore(&mut self, item_id: i64) {
        if let Some(menu) = self.menus.get_mut(&item_id) {
            menu.hidden = true;
            menu.placement = MenuPlacement::Inline {
                parent: menu.placement.parent(),
            };
        }
    }

    pub fn close(&mut self) {
        let Some(item_id) = self.open_item() else {
            return;
        };
        self.restore(item_id);
        self.state = MenuState::Closed;
        self.cursor = 0;
        self.sub_cursor = 0;
        debug!(item_id, "action menu closed");
    }

    pub fn toggle_submenu(&mut self) {
        if let MenuState::Open { item_id, submenu } = self.state {
            self.state = MenuState::Open {
                item_id,
                submenu: !submenu,
            };
            self.sub_cursor = 0;
        }
    }

    pub fn close_submenu(&mut self) {
        if let MenuState::Open { item_id, .. } = self.state {
            self.state = MenuState::Open {
                item_id,
                submenu: false,
            };
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        if self.submenu_open() {
            self.sub_cursor = step(self.sub_cursor, delta, self.destinations.len());
        } else if self.open_item().is_some() {
            self.cursor = step(self.cursor, delta, MENU_ENTRIES.len());
        }
    }

    /// Chooses a main-menu entry. Opening the submenu keeps the menu open;
    /// every other entry is terminal.
    pub fn choose(&mut self, index: usize) -> Option<MenuCommand> {
        let item_id = self.open_item()?;
        match MENU_ENTRIES.get(index)? {
            MenuEntry::MoveToFolder => {
                self.cursor = index;
                self.toggle_submenu();
                None
            }
            MenuEntry::Delete => {
                self.close();
                Some(MenuCommand::Delete { item_id })
            }
        }
    }

    pub fn choose_destination(&mut self, index: usize) -> Option<MenuCommand> {
        if !self.submenu_open() {
            return None;
        }
        let item_id = self.open_item()?;
        let command = match self.destinations.get(index)? {
            SubmenuEntry::Folder { id, .. } => MenuCommand::Move {
                item_id,
                folder_id: Some(*id),
            },
            SubmenuEntry::NoFolder => MenuCommand::Move {
                item_id,
                folder_id: None,
            },
            SubmenuEntry::CreateFolder => MenuCommand::CreateFolder,
        };
        self.close();
        Some(command)
    }

    pub fn activate_cursor(&mut self) -> Option<MenuCommand> {
        if self.submenu_open() {
            self.choose_destination(self.sub_cursor)
        } else {
            self.choose(self.cursor)
        }
    }

    pub fn menu_size(&self) -> (u16, u16) {
        (MENU_WIDTH, MENU_ENTRIES.len() as u16 + 2)
    }

    pub fn submenu_size(&self) -> (u16, u16) {
        let folders = self
            .destinations
            .iter()
            .filter(|d| matches!(d, SubmenuEntry::Folder { .. }))
            .count();
        // The "No folders available." note takes a row when there are none.
        let rows = self.destinations.len() + usize::from(folders == 0);
        (SUBMENU_WIDTH, rows as u16 + 2)
    }

    /// Re-anchors the open menu to its trigger. A missing trigger or menu
    /// leaves everything as it was.
    pub fn reposition(&mut self, trigger: Option<Rect>, viewport: Rect) {
        let Some(item_id) = self.open_item() else {
            return;
        };
        let size = self.menu_size();
        let margin = self.margin;
        let Some(menu) = self.menus.get_mut(&item_id) else {
            return;
        };
        let MenuPlacement::Floating { parent, .. } = menu.placement else {
            return;
        };
        let Some(position) = position_menu(trigger, size, viewport, margin) else {
            return;
        };
        menu.placement = MenuPlacement::Floating {
            parent,
            position: Some(position),
        };
    }

    pub fn menu_rect(&self) -> Option<Rect> {
        let menu = self.menus.get(&self.open_item()?)?;
        let MenuPlacement::Floating {
            position: Some(pos),
            ..
        } = menu.placement
        else {
            return None;
        };
        let (width, height) = self.menu_size();
        Some(Rect::new(pos.x, pos.y, width, height))
    }

    pub fn submenu_rect(&self, viewport: Rect) -> Option<Rect> {
        if !self.submenu_open() {
            return None;
        }
        let menu = self.menu_rect()?;
        let (width, height) = self.submenu_size();
        let row = menu.y + 1 + MENU_ENTRIES
            .iter()
            .position(|e| *e == MenuEntry::MoveToFolder)
            .unwrap_or(0) as u16;
        Some(position_submenu(menu, row, (width, height), viewport, self.margin))
    }
}

fn step(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    current.saturating_add_signed(delta).min(len - 1)
}

/// Fixed screen position for a menu anchored below its trigger, kept inside
/// the viewport with `margin` cells to spare. Flips above the trigger when it
/// would run past the bottom edge.
pub fn position_menu(
    trigger: Option<Rect>,
    (width, height): (u16, u16),
    viewport: Rect,
    margin: u16,
) -> Option<Position> {
    let trigger = trigger?;
    if trigger.width == 0 || trigger.height == 0 {
        return None;
    }

    let min_x = viewport.x.saturating_add(margin);
    let max_right = viewport.right().saturating_sub(margin);
    let min_y = viewport.y.saturating_add(margin);
    let max_bottom = viewport.bottom().saturating_sub(margin);

    let mut left = trigger.x;
    if left < min_x {
        left = min_x;
    }
    if left.saturating_add(width) > max_right {
        left = max_right.saturating_sub(width).max(min_x);
    }

    let mut top = trigger.bottom();
    if top.saturating_add(height) > max_bottom {
        top = trigger.y.saturating_sub(height);
    }
    if top < min_y {
        top = min_y;
    }

    Some(Position { x: left, y: top })
}

/// Submenu to the right of the menu, or to its left when the right side
/// would overflow, aligned with the row that opened it.
pub fn position_submenu(
    menu: Rect,
    row: u16,
    (width, height): (u16, u16),
    viewport: Rect,
    margin: u16,
) -> Rect {
    let max_right = viewport.right().saturating_sub(margin);
    let min_x = viewport.x.saturating_add(margin);
    let x = if menu.right().saturating_add(width) <= max_right {
        menu.right()
    } else {
        menu.x.saturating_sub(width).max(min_x)
    };

    let max_bottom = viewport.bottom().saturating_sub(margin);
    let mut y = row.saturating_sub(1);
    if y.saturating_add(height) > max_bottom {
        y = max_bottom.saturating_sub(height);
    }
    y = y.max(viewport.y.saturating_add(margin));

    Rect::new(x, y, width, height)
}
