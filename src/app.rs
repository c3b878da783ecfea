//! Application state: the single owner of everything the sidebar shows.
//!
//! Input handlers never block. Gateway work is queued in an outbox that the
//! event loop hands to the worker, and finished work comes back through
//! [`App::apply`].

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::drag::{DragController, DropTarget};
use crate::gateway::GatewayError;
use crate::layout::{
    self, CLEAR_ALL_LABEL, DialogLayout, HitMap, HitTarget, NEW_FOLDER_LABEL, PaneLayout, RowSlot,
    SearchLayout,
};
use crate::menu::{MENU_ENTRIES, MenuCommand, MenuCoordinator, MenuEntry, SubmenuEntry};
use crate::model::{Container, DEFAULT_FOLDER_COLOR, Folder, HistoryItem, Location};
use crate::notify::{Notifier, Toast};
use crate::search::{SearchEntry, SearchOverlay};
use crate::storage::{self, FOLDER_SECTION_KEY, LocalStore, SEARCHES_SECTION_KEY};
use crate::tree::{Row, Section, SectionState, SidebarTree};
use crate::worker::{Completion, Request};

const SIDEBAR_WIDTH_PCT: u16 = 42;

pub const FOLDER_PALETTE: [&str; 8] = [
    DEFAULT_FOLDER_COLOR,
    "#dc3545",
    "#fd7e14",
    "#ffc107",
    "#198754",
    "#0dcaf0",
    "#0d6efd",
    "#6f42c1",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteItem { item_id: i64 },
    ClearHistory,
    DeleteFolder { folder_id: i64, name: String },
}

impl ConfirmAction {
    pub fn title(&self) -> &'static str {
        match self {
            ConfirmAction::DeleteItem { .. } => "Delete Search Item",
            ConfirmAction::ClearHistory => "Clear All History",
            ConfirmAction::DeleteFolder { .. } => "Delete Folder",
        }
    }

    pub fn body(&self) -> String {
        match self {
            ConfirmAction::DeleteItem { .. } => String::from(
                "Are you sure you want to delete this item? This action cannot be undone.",
            ),
            ConfirmAction::ClearHistory => String::from(
                "Are you sure you want to delete all search history? This action cannot be undone.",
            ),
            ConfirmAction::DeleteFolder { name, .. } => format!(
                "Delete the folder \"{name}\"? Its items will move back to Recent."
            ),
        }
    }

    pub fn confirm_label(&self) -> &'static str {
        match self {
            ConfirmAction::DeleteItem { .. } => "Delete Item",
            ConfirmAction::ClearHistory => "Delete All",
            ConfirmAction::DeleteFolder { .. } => "Delete Folder",
        }
    }

    fn request(&self) -> Request {
        match self {
            ConfirmAction::DeleteItem { item_id } => Request::DeleteItem { item_id: *item_id },
            ConfirmAction::ClearHistory => Request::ClearHistory,
            ConfirmAction::DeleteFolder { folder_id, .. } => Request::DeleteFolder {
                folder_id: *folder_id,
            },
        }
    }
}

/// The "New folder" form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderForm {
    pub name: String,
    pub color_idx: usize,
    pub error: Option<String>,
    pub submitting: bool,
}

impl FolderForm {
    pub fn color(&self) -> &'static str {
        FOLDER_PALETTE
            .get(self.color_idx)
            .copied()
            .unwrap_or(DEFAULT_FOLDER_COLOR)
    }
}

/// Geometry of the last arranged frame.
#[derive(Debug, Clone, Default)]
pub struct FrameLayout {
    pub viewport: Rect,
    pub panes: PaneLayout,
    pub slots: Vec<RowSlot>,
    pub menu: Option<Rect>,
    pub submenu: Option<Rect>,
    pub search: Option<SearchLayout>,
    pub dialog: Option<DialogLayout>,
    pub toast: Option<Rect>,
}

pub struct App {
    pub(crate) store: Box<dyn LocalStore>,
    pub(crate) base_url: String,
    pub(crate) folders: Vec<Folder>,
    pub(crate) items: Vec<HistoryItem>,
    pub(crate) tree: SidebarTree,
    pub(crate) rows: Vec<Row>,
    pub(crate) sections: SectionState,
    pub(crate) location: Location,
    pub(crate) selected: usize,
    pub(crate) scroll: usize,
    pub(crate) menu: MenuCoordinator,
    pub(crate) drag: DragController,
    pub(crate) search: SearchOverlay,
    pub(crate) notifier: Notifier,
    pub(crate) modal: Option<ConfirmAction>,
    pub(crate) folder_form: Option<FolderForm>,
    pub(crate) hits: HitMap,
    pub(crate) frame: FrameLayout,
    pub(crate) loading: bool,
    pub(crate) status: String,
    outbox: Vec<Request>,
    quit: bool,
}

impl App {
    /// Starts empty and queues the initial folder/history fetch.
    pub fn new(store: Box<dyn LocalStore>, config: &Config) -> Self {
        let sections = SectionState {
            folders_collapsed: storage::section_collapsed(store.as_ref(), FOLDER_SECTION_KEY),
            history_collapsed: storage::section_collapsed(store.as_ref(), SEARCHES_SECTION_KEY),
        };
        let location = match config.active_item {
            Some(id) => Location::HistoryItem(id),
            None => Location::Root,
        };
        let mut app = Self {
            store,
            base_url: config.base_url.clone(),
            folders: Vec::new(),
            items: Vec::new(),
            tree: SidebarTree::default(),
            rows: Vec::new(),
            sections,
            location,
            selected: 0,
            scroll: 0,
            menu: MenuCoordinator::new(config.menu_margin),
            drag: DragController::default(),
            search: SearchOverlay::default(),
            notifier: Notifier::new(config.toast_ttl),
            modal: None,
            folder_form: None,
            hits: HitMap::default(),
            frame: FrameLayout::default(),
            loading: false,
            status: String::from("Loading history..."),
            outbox: Vec::new(),
            quit: false,
        };
        app.rebuild();
        app.reload();
        app
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn tree(&self) -> &SidebarTree {
        &self.tree
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn sections(&self) -> SectionState {
        self.sections
    }

    pub fn selected_row(&self) -> Option<Row> {
        self.rows.get(self.selected).copied()
    }

    pub fn menu(&self) -> &MenuCoordinator {
        &self.menu
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn search(&self) -> &SearchOverlay {
        &self.search
    }

    pub fn toast(&self) -> Option<&Toast> {
        self.notifier.current()
    }

    pub fn modal(&self) -> Option<&ConfirmAction> {
        self.modal.as_ref()
    }

    pub fn folder_form(&self) -> Option<&FolderForm> {
        self.folder_form.as_ref()
    }

    pub fn hits(&self) -> &HitMap {
        &self.hits
    }

    pub fn frame(&self) -> &FrameLayout {
        &self.frame
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn item_url(&self, item_id: i64) -> String {
        format!("{}{}", self.base_url, Location::HistoryItem(item_id).path())
    }

    /// Requests queued since the last call, in issue order.
    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.outbox)
    }

    fn send(&mut self, request: Request) {
        debug!(?request, "queued request");
        self.outbox.push(request);
    }

    pub fn reload(&mut self) {
        self.loading = true;
        self.send(Request::Reload);
    }

    pub fn tick(&mut self, now: Instant) {
        self.notifier.expire(now);
    }

    fn notify(&mut self, message: &str) {
        warn!(toast = message, "showing error notification");
        self.notifier.show(message, Instant::now());
    }

    fn persist(&mut self, result: anyhow::Result<()>) {
        if let Err(err) = result {
            warn!(error = %format!("{err:#}"), "failed to persist sidebar state");
            self.notify("Failed to save sidebar state.");
        }
    }

    // ---- completions -------------------------------------------------

    pub fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Reloaded(Ok((folders, items))) => {
                info!(folders = folders.len(), items = items.len(), "sidebar reloaded");
                self.loading = false;
                self.folders = folders;
                self.items = items;
                self.status = format!(
                    "{} folders, {} history items",
                    self.folders.len(),
                    self.items.len()
                );
                self.rebuild();
            }
            Completion::Reloaded(Err(err)) => {
                warn!(%err, "sidebar reload failed");
                self.loading = false;
                self.status = String::from("Failed to load history.");
                self.notify("Failed to load history.");
            }
            Completion::SearchHistory(result) => self.search.loaded(result),
            Completion::Mutated { request, result } => self.mutated(request, result),
        }
    }

    fn mutated(&mut self, request: Request, result: Result<(), GatewayError>) {
        if let Err(err) = result {
            warn!(?request, %err, "request failed");
            match (&request, err) {
                (Request::CreateFolder { .. }, GatewayError::Rejected(message)) => {
                    match self.folder_form.as_mut() {
                        Some(form) => {
                            form.submitting = false;
                            form.error = Some(message);
                        }
                        None => self.notify(&message),
                    }
                }
                _ => {
                    if let Some(form) = self.folder_form.as_mut() {
                        form.submitting = false;
                    }
                    self.notify(failure_message(&request));
                }
            }
            return;
        }

        info!(?request, "request succeeded");
        match request {
            Request::DeleteItem { item_id } => {
                if self.location.active_item() == Some(item_id) {
                    self.navigate(Location::Root);
                }
                self.status = String::from("Item deleted");
            }
            Request::ClearHistory => {
                self.navigate(Location::Root);
                self.status = String::from("History cleared");
            }
            Request::DeleteFolder { folder_id } => {
                let result = storage::remove_open_folder(self.store.as_mut(), folder_id);
                self.persist(result);
                self.status = String::from("Folder deleted");
            }
            Request::CreateFolder { ref name, .. } => {
                self.status = format!("Created folder {name}");
                self.folder_form = None;
            }
            Request::MoveItem { folder_id, .. } => {
                self.status = match folder_id {
                    Some(_) => String::from("Item moved"),
                    None => String::from("Item moved to Recent"),
                };
            }
            Request::Reload | Request::LoadSearchHistory => {}
        }
        self.reload();
    }

    // ---- tree ----------------------------------------------------------

    /// Rebuilds the tree from the last fetched data. Keeps the selection on
    /// the same row when it survives.
    pub fn rebuild(&mut self) {
        let previous = self.selected_row();
        let open = storage::open_folder_ids(self.store.as_ref());
        self.tree = SidebarTree::build(
            &self.folders,
            &self.items,
            self.location.active_item(),
            &open,
        );
        self.menu.sync(&self.tree, &self.folders);
        if let Some(dragged) = self.drag.pressed()
            && self.tree.item(dragged.item_id).is_none()
        {
            self.drag.end();
        }
        self.refresh_rows(previous);
    }

    fn refresh_rows(&mut self, keep: Option<Row>) {
        self.rows = self.tree.rows(self.sections);
        if let Some(idx) = keep.and_then(|row| self.rows.iter().position(|r| *r == row)) {
            self.selected = idx;
        }
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
    }

    pub fn toggle_folder(&mut self, folder_id: i64) {
        let Some(node) = self
            .tree
            .folders
            .iter_mut()
            .find(|node| node.folder.id == folder_id)
        else {
            return;
        };
        node.expanded = !node.expanded;
        let expanded = node.expanded;
        debug!(folder_id, expanded, "folder toggled");
        let result = if expanded {
            storage::add_open_folder(self.store.as_mut(), folder_id)
        } else {
            storage::remove_open_folder(self.store.as_mut(), folder_id)
        };
        self.persist(result);
        let keep = self.selected_row();
        self.refresh_rows(keep);
    }

    fn set_folder_expanded(&mut self, folder_id: i64, expanded: bool) {
        if self
            .tree
            .folder(folder_id)
            .is_some_and(|node| node.expanded != expanded)
        {
            self.toggle_folder(folder_id);
        }
    }

    pub fn toggle_section(&mut self, section: Section) {
        let (key, collapsed) = match section {
            Section::Folders => {
                self.sections.folders_collapsed = !self.sections.folders_collapsed;
                (FOLDER_SECTION_KEY, self.sections.folders_collapsed)
            }
            Section::History => {
                self.sections.history_collapsed = !self.sections.history_collapsed;
                (SEARCHES_SECTION_KEY, self.sections.history_collapsed)
            }
        };
        let result = storage::set_section_collapsed(self.store.as_mut(), key, collapsed);
        self.persist(result);
        let keep = self.selected_row();
        self.refresh_rows(keep);
    }

    pub fn navigate(&mut self, location: Location) {
        info!(path = %location.path(), "navigating");
        self.location = location;
        self.status = format!("Opened {}", location.path());
        self.rebuild();
        if let Some(item_id) = location.active_item() {
            self.select_item(item_id);
        }
    }

    pub fn select_item(&mut self, item_id: i64) -> bool {
        match self
            .rows
            .iter()
            .position(|row| matches!(row, Row::Item { item_id: id, .. } if *id == item_id))
        {
            Some(idx) => {
                self.selected = idx;
                true
            }
            None => false,
        }
    }

    fn select_next(&mut self) {
        if self.selected + 1 < self.rows.len() {
            self.selected += 1;
        }
    }

    fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn selected_item(&self) -> Option<i64> {
        match self.selected_row()? {
            Row::Item { item_id, .. } => Some(item_id),
            _ => None,
        }
    }

    // ---- actions -------------------------------------------------------

    fn run_menu_command(&mut self, command: MenuCommand) {
        debug!(?command, "menu command");
        match command {
            MenuCommand::Move { item_id, folder_id } => {
                self.send(Request::MoveItem { item_id, folder_id })
            }
            MenuCommand::Delete { item_id } => {
                self.modal = Some(ConfirmAction::DeleteItem { item_id });
            }
            MenuCommand::CreateFolder => self.open_folder_form(),
        }
    }

    pub fn open_folder_form(&mut self) {
        self.menu.close();
        self.folder_form = Some(FolderForm::default());
    }

    pub fn submit_folder_form(&mut self) {
        let Some(form) = self.folder_form.as_mut() else {
            return;
        };
        if form.submitting {
            return;
        }
        let name = form.name.trim().to_string();
        if name.is_empty() {
            form.error = Some(String::from("Folder name cannot be empty."));
            return;
        }
        form.error = None;
        form.submitting = true;
        let color = form.color().to_string();
        self.send(Request::CreateFolder { name, color });
    }

    pub fn confirm_modal(&mut self) {
        if let Some(action) = self.modal.take() {
            info!(?action, "confirmed");
            self.send(action.request());
        }
    }

    pub fn cancel_modal(&mut self) {
        self.modal = None;
    }

    fn request_clear_all(&mut self) {
        if self.tree.show_clear_all() {
            self.modal = Some(ConfirmAction::ClearHistory);
        }
    }

    fn request_delete_folder(&mut self, folder_id: i64) {
        if let Some(node) = self.tree.folder(folder_id) {
            self.modal = Some(ConfirmAction::DeleteFolder {
                folder_id,
                name: node.folder.name.clone(),
            });
        }
    }

    pub fn open_search(&mut self) {
        self.menu.close();
        if self.search.open() {
            self.send(Request::LoadSearchHistory);
        }
    }

    fn activate_search_entry(&mut self, entry: SearchEntry) {
        self.search.close();
        match entry {
            SearchEntry::NewChat => self.navigate(Location::Root),
            SearchEntry::Item(item) => {
                if let Some(folder_id) = item.folder_id {
                    let result = storage::add_open_folder(self.store.as_mut(), folder_id);
                    self.persist(result);
                }
                self.navigate(Location::HistoryItem(item.id));
            }
        }
    }

    fn toggle_menu(&mut self, item_id: i64) {
        self.menu.toggle(item_id);
        self.reposition_menu();
    }

    fn reposition_menu(&mut self) {
        let Some(item_id) = self.menu.open_item() else {
            return;
        };
        let trigger = self.hits.rect_of(HitTarget::ItemTrigger(item_id));
        self.menu.reposition(trigger, self.frame.viewport);
    }

    // ---- layout --------------------------------------------------------

    /// Lays out the frame and refills the hit table. Runs before every draw.
    pub fn arrange(&mut self, area: Rect) {
        self.hits.clear();
        let panes = PaneLayout::split(area, SIDEBAR_WIDTH_PCT);
        self.frame = FrameLayout {
            viewport: area,
            panes,
            ..FrameLayout::default()
        };

        let visible = layout::visible_rows(panes.sidebar).max(1);
        if self.selected < self.scroll {
            self.scroll = self.selected;
        } else if self.selected >= self.scroll + visible {
            self.scroll = self.selected + 1 - visible;
        }
        self.scroll = self.scroll.min(self.rows.len().saturating_sub(visible));

        let slots = layout::row_slots(&self.rows, panes.sidebar, self.scroll);
        for slot in &slots {
            self.register_row(slot);
        }
        self.frame.slots = slots;

        self.arrange_menu(area);

        if self.search.is_open() {
            let search = SearchLayout::compute(area);
            self.hits.push(area, HitTarget::SearchBackdrop);
            self.hits.push(search.outer, HitTarget::SearchBody);
            for (rect, filter) in &search.filters {
                self.hits.push(*rect, HitTarget::SearchFilter(*filter));
            }
            self.search.follow_selection(usize::from(search.results.height));
            let first = self.search.scroll();
            for idx in first..self.search.results().len() {
                let Some(rect) = search.result_row(idx - first) else {
                    break;
                };
                self.hits.push(rect, HitTarget::SearchResult(idx));
            }
            self.frame.search = Some(search);
        }

        if self.folder_form.is_some() {
            let dialog = DialogLayout::compute(area, 50, 50, "Create");
            self.hits.push(dialog.outer, HitTarget::FormBody);
            for (idx, rect) in dialog.swatches(FOLDER_PALETTE.len()).into_iter().enumerate() {
                self.hits.push(rect, HitTarget::FormSwatch(idx));
            }
            self.hits.push(dialog.confirm, HitTarget::FormCreate);
            self.hits.push(dialog.cancel, HitTarget::FormCancel);
            self.frame.dialog = Some(dialog);
        }

        if let Some(action) = &self.modal {
            let dialog = DialogLayout::compute(area, 50, 40, action.confirm_label());
            self.hits.push(dialog.outer, HitTarget::ModalBody);
            self.hits.push(dialog.confirm, HitTarget::ModalConfirm);
            self.hits.push(dialog.cancel, HitTarget::ModalCancel);
            self.frame.dialog = Some(dialog);
        }

        if self.notifier.current().is_some() {
            let rect = layout::toast_rect(area);
            self.hits.push(rect, HitTarget::Toast);
            self.frame.toast = Some(rect);
        }
    }

    fn register_row(&mut self, slot: &RowSlot) {
        let rect = slot.rect;
        match slot.row {
            Row::Header(section) => {
                let button = match section {
                    Section::Folders => Some((NEW_FOLDER_LABEL, HitTarget::NewFolder)),
                    Section::History if self.tree.show_clear_all() => {
                        Some((CLEAR_ALL_LABEL, HitTarget::ClearAll))
                    }
                    Section::History => None,
                };
                self.hits.push(rect, HitTarget::SectionToggle(section));
                if let Some((label, target)) = button {
                    let width = label.chars().count() as u16;
                    self.hits.push(layout::right_cells(rect, width), target);
                }
            }
            Row::Folder(folder_id) => {
                self.hits.push_drop_zone(rect, DropTarget::Folder(folder_id));
                let name = self
                    .tree
                    .folder(folder_id)
                    .map(|node| node.folder.name.as_str())
                    .unwrap_or_default();
                self.hits.push(
                    layout::folder_toggle_rect(rect, name),
                    HitTarget::FolderToggle(folder_id),
                );
                self.hits
                    .push(layout::trigger_rect(rect), HitTarget::FolderDelete(folder_id));
            }
            Row::Item { item_id, container } => {
                if container == Container::TopLevel {
                    self.hits.push_drop_zone(rect, DropTarget::TopLevel);
                }
                self.hits.push(rect, HitTarget::Item(item_id));
                self.hits
                    .push(layout::trigger_rect(rect), HitTarget::ItemTrigger(item_id));
            }
            Row::NoHistory => self.hits.push_drop_zone(rect, DropTarget::TopLevel),
            Row::FolderEmpty(_) | Row::NoFolders => {}
        }
    }

    fn arrange_menu(&mut self, area: Rect) {
        if self.menu.open_item().is_none() {
            return;
        }
        self.reposition_menu();
        let Some(menu_rect) = self.menu.menu_rect() else {
            return;
        };
        self.hits.push(menu_rect, HitTarget::MenuBody);
        let body = layout::inner(menu_rect);
        for idx in 0..MENU_ENTRIES.len() {
            let y = body.y + idx as u16;
            if y < body.bottom() {
                self.hits
                    .push(Rect::new(body.x, y, body.width, 1), HitTarget::MenuEntry(idx));
            }
        }
        self.frame.menu = Some(menu_rect);

        let Some(sub_rect) = self.menu.submenu_rect(area) else {
            return;
        };
        self.hits.push(sub_rect, HitTarget::MenuBody);
        let body = layout::inner(sub_rect);
        let offset = submenu_row_offset(self.menu.destinations());
        for idx in 0..self.menu.destinations().len() {
            let y = body.y + (idx + offset) as u16;
            if y < body.bottom() {
                self.hits
                    .push(Rect::new(body.x, y, body.width, 1), HitTarget::SubmenuEntry(idx));
            }
        }
        self.frame.submenu = Some(sub_rect);
    }

    // ---- keyboard ------------------------------------------------------

    pub fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);

        if ctrl && matches!(key.code, KeyCode::Char('c')) {
            self.quit = true;
            return;
        }
        if self.modal.is_some() {
            self.handle_modal_key(key.code);
            return;
        }
        if self.folder_form.is_some() {
            self.handle_form_key(key.code);
            return;
        }
        if ctrl && matches!(key.code, KeyCode::Char('k') | KeyCode::Char('K')) {
            self.open_search();
            return;
        }
        if ctrl
            && (matches!(key.code, KeyCode::Char('O'))
                || (shift && matches!(key.code, KeyCode::Char('o'))))
        {
            self.search.close();
            self.menu.close();
            self.navigate(Location::Root);
            return;
        }
        if self.search.is_open() {
            self.handle_search_key(key.code);
            return;
        }
        if self.menu.open_item().is_some() {
            self.handle_menu_key(key.code);
            return;
        }
        self.handle_sidebar_key(key.code);
    }

    fn handle_modal_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Enter | KeyCode::Char('y') => self.confirm_modal(),
            KeyCode::Esc | KeyCode::Char('n') => self.cancel_modal(),
            _ => {}
        }
    }

    fn handle_form_key(&mut self, code: KeyCode) {
        let Some(form) = self.folder_form.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => self.folder_form = None,
            KeyCode::Enter => self.submit_folder_form(),
            KeyCode::Backspace => {
                form.name.pop();
                form.error = None;
            }
            KeyCode::Left => {
                form.color_idx = form
                    .color_idx
                    .checked_sub(1)
                    .unwrap_or(FOLDER_PALETTE.len() - 1);
            }
            KeyCode::Right | KeyCode::Tab => {
                form.color_idx = (form.color_idx + 1) % FOLDER_PALETTE.len();
            }
            KeyCode::Char(ch) => {
                form.name.push(ch);
                form.error = None;
            }
            _ => {}
        }
    }

    fn handle_search_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.search.close(),
            KeyCode::Enter => {
                if let Some(entry) = self.search.selected_entry() {
                    self.activate_search_entry(entry);
                }
            }
            KeyCode::Down => self.search.select_next(),
            KeyCode::Up => self.search.select_prev(),
            KeyCode::Tab => self.search.cycle_filter(),
            KeyCode::Backspace => self.search.backspace(),
            KeyCode::Char(ch) => self.search.push_char(ch),
            _ => {}
        }
    }

    fn handle_menu_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.menu.close(),
            KeyCode::Up | KeyCode::Char('k') => self.menu.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.menu.move_cursor(1),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(command) = self.menu.activate_cursor() {
                    self.run_menu_command(command);
                }
            }
            KeyCode::Right | KeyCode::Char('l') => {
                let on_move = MENU_ENTRIES.get(self.menu.cursor()) == Some(&MenuEntry::MoveToFolder);
                if on_move && !self.menu.submenu_open() {
                    self.menu.toggle_submenu();
                }
            }
            KeyCode::Left | KeyCode::Char('h') => {
                if self.menu.submenu_open() {
                    self.menu.close_submenu();
                } else {
                    self.menu.close();
                }
            }
            KeyCode::Char('m') | KeyCode::Char('.') => self.menu.close(),
            _ => {}
        }
    }

    fn handle_sidebar_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Up | KeyCode::Char('k') => self.select_prev(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = self.rows.len().saturating_sub(1),
            KeyCode::Char('/') => self.open_search(),
            KeyCode::Char('r') | KeyCode::Char('g') => self.reload(),
            KeyCode::Char('n') => self.open_folder_form(),
            KeyCode::Char('C') => self.request_clear_all(),
            KeyCode::Esc => self.notifier.dismiss(),
            KeyCode::Char('m') | KeyCode::Char('.') => {
                if let Some(item_id) = self.selected_item() {
                    self.toggle_menu(item_id);
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => match self.selected_row() {
                Some(Row::Header(section)) => self.toggle_section(section),
                Some(Row::Folder(folder_id)) => self.toggle_folder(folder_id),
                Some(Row::Item { item_id, .. }) => {
                    self.navigate(Location::HistoryItem(item_id))
                }
                _ => {}
            },
            KeyCode::Right | KeyCode::Char('l') => {
                if let Some(Row::Folder(folder_id)) = self.selected_row() {
                    self.set_folder_expanded(folder_id, true);
                }
            }
            KeyCode::Left | KeyCode::Char('h') => {
                if let Some(Row::Folder(folder_id)) = self.selected_row() {
                    self.set_folder_expanded(folder_id, false);
                }
            }
            KeyCode::Delete | KeyCode::Char('d') => match self.selected_row() {
                Some(Row::Item { item_id, .. }) => {
                    self.modal = Some(ConfirmAction::DeleteItem { item_id });
                }
                Some(Row::Folder(folder_id)) => self.request_delete_folder(folder_id),
                _ => {}
            },
            _ => {}
        }
    }

    // ---- mouse ---------------------------------------------------------

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        let (x, y) = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.mouse_down(x, y),
            MouseEventKind::Drag(MouseButton::Left) => {
                if self.drag.pressed().is_some() {
                    self.drag.drag_over(self.hits.drop_target(x, y));
                }
            }
            MouseEventKind::Up(MouseButton::Left) => self.mouse_up(x, y),
            MouseEventKind::ScrollUp => {
                if self.search.is_open() {
                    self.search.select_prev();
                } else if layout::point_in_rect(x, y, self.frame.panes.sidebar) {
                    self.select_prev();
                }
            }
            MouseEventKind::ScrollDown => {
                if self.search.is_open() {
                    self.search.select_next();
                } else if layout::point_in_rect(x, y, self.frame.panes.sidebar) {
                    self.select_next();
                }
            }
            _ => {}
        }
    }

    fn mouse_down(&mut self, x: u16, y: u16) {
        let target = self.hits.hit(x, y);
        if target == Some(HitTarget::Toast) {
            self.notifier.dismiss();
            return;
        }

        if self.modal.is_some() {
            match target {
                Some(HitTarget::ModalConfirm) => self.confirm_modal(),
                Some(HitTarget::ModalCancel) => self.cancel_modal(),
                _ => {}
            }
            return;
        }

        if self.folder_form.is_some() {
            match target {
                Some(HitTarget::FormSwatch(idx)) => {
                    if let Some(form) = self.folder_form.as_mut() {
                        form.color_idx = idx;
                    }
                }
                Some(HitTarget::FormCreate) => self.submit_folder_form(),
                Some(HitTarget::FormCancel) => self.folder_form = None,
                _ => {}
            }
            return;
        }

        if self.search.is_open() {
            match target {
                Some(HitTarget::SearchResult(idx)) => {
                    self.search.select(idx);
                    if let Some(entry) = self.search.selected_entry() {
                        self.activate_search_entry(entry);
                    }
                }
                Some(HitTarget::SearchFilter(filter)) => self.search.set_filter(filter),
                Some(HitTarget::SearchBody) => {}
                _ => self.search.close(),
            }
            return;
        }

        // Outside click: anything but the open menu or its own trigger.
        if let Some(open) = self.menu.open_item() {
            let inside = target.is_some_and(|t| t.is_menu_part() || t == HitTarget::ItemTrigger(open));
            if !inside {
                self.menu.close();
            }
        }

        let Some(target) = target else {
            return;
        };
        match target {
            HitTarget::MenuEntry(idx) => {
                if let Some(command) = self.menu.choose(idx) {
                    self.run_menu_command(command);
                }
            }
            HitTarget::SubmenuEntry(idx) => {
                if let Some(command) = self.menu.choose_destination(idx) {
                    self.run_menu_command(command);
                }
            }
            HitTarget::ItemTrigger(item_id) => {
                self.select_item(item_id);
                self.toggle_menu(item_id);
            }
            HitTarget::Item(item_id) => {
                self.select_item(item_id);
                if let Some(container) = self.tree.container_of(item_id) {
                    self.drag.press(item_id, container);
                }
            }
            HitTarget::FolderToggle(folder_id) => {
                self.select_row(Row::Folder(folder_id));
                self.toggle_folder(folder_id);
            }
            HitTarget::FolderDelete(folder_id) => self.request_delete_folder(folder_id),
            HitTarget::SectionToggle(section) => {
                self.select_row(Row::Header(section));
                self.toggle_section(section);
            }
            HitTarget::NewFolder => self.open_folder_form(),
            HitTarget::ClearAll => self.request_clear_all(),
            _ => {}
        }
    }

    fn mouse_up(&mut self, x: u16, y: u16) {
        if self.drag.is_dragging() {
            if let Some(intent) = self.drag.drop(self.hits.drop_target(x, y)) {
                info!(item_id = intent.item_id, folder_id = ?intent.folder_id, "item dropped");
                self.send(Request::MoveItem {
                    item_id: intent.item_id,
                    folder_id: intent.folder_id,
                });
            }
            return;
        }
        // A press and release on the same row without movement is a click.
        if let Some(pressed) = self.drag.pressed() {
            self.drag.end();
            if self.hits.hit(x, y) == Some(HitTarget::Item(pressed.item_id)) {
                self.navigate(Location::HistoryItem(pressed.item_id));
            }
        }
    }

    fn select_row(&mut self, row: Row) {
        if let Some(idx) = self.rows.iter().position(|r| *r == row) {
            self.selected = idx;
        }
    }
}

/// Rows above the first destination: the "No folders available." note.
pub fn submenu_row_offset(destinations: &[SubmenuEntry]) -> usize {
    usize::from(
        !destinations
            .iter()
            .any(|d| matches!(d, SubmenuEntry::Folder { .. })),
    )
}

fn failure_message(request: &Request) -> &'static str {
    match request {
        Request::MoveItem { .. } => "Failed to move item.",
        Request::DeleteItem { .. } => "Failed to delete the resource.",
        Request::ClearHistory => "Failed to clear history.",
        Request::CreateFolder { .. } => "Failed to create folder.",
        Request::DeleteFolder { .. } => "Failed to delete folder.",
        Request::Reload | Request::LoadSearchHistory => "Failed to load history.",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crossterm::event::{KeyEventKind, KeyEventState};

    use super::*;
    use crate::storage::MemoryStore;
    use crate::worker::execute;
    use crate::worker::fake::FakeApi;

    const AREA: Rect = Rect {
        x: 0,
        y: 0,
        width: 100,
        height: 30,
    };

    fn folder(id: i64, name: &str) -> Folder {
        Folder {
            id,
            name: name.to_string(),
            color: String::from("#0d6efd"),
        }
    }

    fn item(id: i64, title: &str, folder_id: Option<i64>) -> HistoryItem {
        HistoryItem {
            id,
            title: title.to_string(),
            timestamp: None,
            folder_id,
        }
    }

    fn api() -> FakeApi {
        FakeApi {
            folders: vec![folder(2, "Batteries"), folder(5, "Catalysis")],
            items: vec![
                item(10, "lithium anodes", Some(2)),
                item(11, "zeolite pores", None),
                item(12, "perovskite abc", None),
            ],
            ..FakeApi::default()
        }
    }

    fn pump(app: &mut App, api: &FakeApi) {
        for request in app.take_requests() {
            app.apply(execute(api, request));
        }
    }

    fn loaded(api: &FakeApi, active: Option<i64>) -> App {
        let config = Config {
            active_item: active,
            ..Config::default()
        };
        let mut app = App::new(Box::new(MemoryStore::default()), &config);
        pump(&mut app, api);
        app.arrange(AREA);
        app
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn mouse(kind: MouseEventKind, rect: Rect) -> MouseEvent {
        MouseEvent {
            kind,
            column: rect.x,
            row: rect.y,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn click(app: &mut App, target: HitTarget) {
        let rect = app.hits().rect_of(target).expect("target on screen");
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), rect));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), rect));
        app.arrange(AREA);
    }

    #[test]
    fn startup_fetches_and_builds_tree() {
        let api = api();
        let app = loaded(&api, None);
        assert_eq!(api.calls(), vec!["GET /api/folders/", "GET /history/"]);
        assert_eq!(app.tree().top_level.len(), 2);
        assert_eq!(app.tree().container_of(10), Some(Container::Folder(2)));
        assert!(app.hits().rect_of(HitTarget::ClearAll).is_some());
    }

    #[test]
    fn arranging_twice_yields_identical_hits() {
        let api = api();
        let mut app = loaded(&api, None);
        let first = app.hits().clone();
        app.arrange(AREA);
        assert_eq!(app.hits(), &first);
    }

    #[test]
    fn trigger_click_opens_floating_menu_and_outside_click_closes() {
        let api = api();
        let mut app = loaded(&api, None);
        click(&mut app, HitTarget::ItemTrigger(11));
        assert_eq!(app.menu().open_item(), Some(11));
        assert!(app.frame().menu.is_some());

        click(&mut app, HitTarget::SectionToggle(Section::Folders));
        assert_eq!(app.menu().open_item(), None);
        assert!(app.menu().menu(11).is_some_and(|m| m.hidden));
    }

    #[test]
    fn menu_move_to_folder_sends_move_and_reloads() {
        let api = api();
        let mut app = loaded(&api, None);
        click(&mut app, HitTarget::ItemTrigger(11));
        click(&mut app, HitTarget::MenuEntry(0));
        assert!(app.menu().submenu_open());
        click(&mut app, HitTarget::SubmenuEntry(1));
        assert_eq!(app.menu().open_item(), None);
        assert_eq!(
            app.take_requests(),
            vec![Request::MoveItem {
                item_id: 11,
                folder_id: Some(5)
            }]
        );
    }

    #[test]
    fn deleting_active_item_returns_to_root() {
        let api = api();
        let mut app = loaded(&api, Some(11));
        assert!(app.select_item(11));
        app.handle_key(key(KeyCode::Char('d')));
        assert_eq!(app.modal(), Some(&ConfirmAction::DeleteItem { item_id: 11 }));
        app.handle_key(key(KeyCode::Enter));
        pump(&mut app, &api);
        assert_eq!(app.location(), Location::Root);
        assert!(api.calls().contains(&String::from("DELETE /delete-history/11")));
    }

    #[test]
    fn deleting_other_item_keeps_location() {
        let api = api();
        let mut app = loaded(&api, Some(11));
        assert!(app.select_item(12));
        app.handle_key(key(KeyCode::Char('d')));
        app.handle_key(key(KeyCode::Char('y')));
        pump(&mut app, &api);
        assert_eq!(app.location(), Location::HistoryItem(11));
    }

    #[test]
    fn failed_mutation_shows_toast() {
        let mut api = api();
        let mut app = loaded(&api, None);
        api.fail_with = Some(GatewayError::Status(500));
        app.send(Request::MoveItem {
            item_id: 11,
            folder_id: Some(2),
        });
        pump(&mut app, &api);
        assert_eq!(
            app.toast().map(|t| t.message.as_str()),
            Some("Failed to move item.")
        );
    }

    #[test]
    fn folder_form_validates_and_surfaces_duplicates() {
        let api = api();
        let mut app = loaded(&api, None);
        app.handle_key(key(KeyCode::Char('n')));
        app.handle_key(key(KeyCode::Char(' ')));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            app.folder_form().and_then(|f| f.error.as_deref()),
            Some("Folder name cannot be empty.")
        );

        for ch in "batteries".chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
        app.handle_key(key(KeyCode::Enter));
        pump(&mut app, &api);
        assert_eq!(
            app.folder_form().and_then(|f| f.error.as_deref()),
            Some("A folder with the name \"batteries\" already exists.")
        );
    }

    #[test]
    fn created_folder_closes_form() {
        let api = api();
        let mut app = loaded(&api, None);
        app.open_folder_form();
        for ch in "Optics".chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
        app.handle_key(key(KeyCode::Right));
        app.handle_key(key(KeyCode::Enter));
        pump(&mut app, &api);
        assert!(app.folder_form().is_none());
        assert!(
            api.calls()
                .contains(&String::from("POST /api/folders/create/ Optics #dc3545"))
        );
    }

    #[test]
    fn folder_toggle_persists_open_state() {
        let api = api();
        let mut app = loaded(&api, None);
        assert!(app.tree().folder(2).is_some_and(|n| !n.expanded));
        click(&mut app, HitTarget::FolderToggle(2));
        assert!(app.tree().folder(2).is_some_and(|n| n.expanded));
        assert_eq!(
            storage::open_folder_ids(app.store.as_ref()),
            BTreeSet::from([2])
        );
        assert!(app.hits().rect_of(HitTarget::Item(10)).is_some());
    }

    #[test]
    fn search_result_opens_its_folder() {
        let api = api();
        let mut app = loaded(&api, None);
        app.open_search();
        pump(&mut app, &api);
        for ch in "lith".chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert!(!app.search().is_open());
        assert_eq!(app.location(), Location::HistoryItem(10));
        assert!(storage::open_folder_ids(app.store.as_ref()).contains(&2));
        assert!(app.tree().folder(2).is_some_and(|n| n.expanded));
    }

    #[test]
    fn click_on_item_navigates() {
        let api = api();
        let mut app = loaded(&api, None);
        click(&mut app, HitTarget::Item(12));
        assert_eq!(app.location(), Location::HistoryItem(12));
        assert!(app.take_requests().is_empty());
    }

    fn chord(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            modifiers,
            ..key(code)
        }
    }

    #[test]
    fn search_list_scrolls_to_keep_selection_visible() {
        const SMALL: Rect = Rect {
            x: 0,
            y: 0,
            width: 80,
            height: 24,
        };
        let api = FakeApi {
            items: (0..30).map(|i| item(100 + i, &format!("alloy {i}"), None)).collect(),
            ..FakeApi::default()
        };
        let mut app = loaded(&api, None);
        app.handle_key(chord(KeyCode::Char('k'), KeyModifiers::CONTROL));
        pump(&mut app, &api);
        app.handle_key(key(KeyCode::Char('a')));
        app.arrange(SMALL);
        assert_eq!(app.search().results().len(), 20);

        for _ in 0..19 {
            app.handle_key(key(KeyCode::Down));
            app.arrange(SMALL);
        }
        assert_eq!(app.search().selected(), 19);
        assert!(app.search().scroll() > 0);
        assert!(app.hits().rect_of(HitTarget::SearchResult(19)).is_some());
        assert!(app.hits().rect_of(HitTarget::SearchResult(0)).is_none());

        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.location(), Location::HistoryItem(119));
    }

    #[test]
    fn ctrl_k_opens_search_from_sidebar_and_keeps_it_open() {
        let api = api();
        let mut app = loaded(&api, None);
        app.handle_key(chord(KeyCode::Char('k'), KeyModifiers::CONTROL));
        assert!(app.search().is_open());
        assert_eq!(app.take_requests(), vec![Request::LoadSearchHistory]);

        app.handle_key(chord(KeyCode::Char('k'), KeyModifiers::CONTROL));
        assert!(app.search().is_open());
    }

    #[test]
    fn ctrl_k_closes_open_menu_before_searching() {
        let api = api();
        let mut app = loaded(&api, None);
        click(&mut app, HitTarget::ItemTrigger(11));
        assert_eq!(app.menu().open_item(), Some(11));

        app.handle_key(chord(KeyCode::Char('k'), KeyModifiers::CONTROL));
        assert_eq!(app.menu().open_item(), None);
        assert!(app.search().is_open());
    }

    #[test]
    fn ctrl_shift_o_starts_new_chat() {
        let api = api();
        for code in [KeyCode::Char('O'), KeyCode::Char('o')] {
            let mut app = loaded(&api, Some(11));
            assert_eq!(app.location(), Location::HistoryItem(11));
            app.handle_key(chord(code, KeyModifiers::CONTROL | KeyModifiers::SHIFT));
            assert_eq!(app.location(), Location::Root);
        }
    }

    #[test]
    fn open_menu_follows_its_trigger_on_scroll_and_resize() {
        const TALL: Rect = Rect {
            x: 0,
            y: 0,
            width: 100,
            height: 14,
        };
        const NARROW: Rect = Rect {
            x: 0,
            y: 0,
            width: 60,
            height: 14,
        };
        let api = FakeApi {
            items: (1..=12).map(|i| item(i, &format!("run {i}"), None)).collect(),
            ..FakeApi::default()
        };
        let mut app = loaded(&api, None);
        app.arrange(TALL);
        let trigger = app
            .hits()
            .rect_of(HitTarget::ItemTrigger(3))
            .expect("trigger on screen");
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), trigger));
        app.arrange(TALL);
        let menu = app.menu().menu_rect().expect("floating menu");
        assert_eq!((menu.x, menu.y), (trigger.x, trigger.bottom()));

        let sidebar = Rect::new(1, 1, 1, 1);
        for _ in 0..4 {
            app.handle_mouse(mouse(MouseEventKind::ScrollDown, sidebar));
        }
        app.arrange(TALL);
        let scrolled = app
            .hits()
            .rect_of(HitTarget::ItemTrigger(3))
            .expect("trigger still on screen");
        assert!(scrolled.y < trigger.y);
        let menu = app.menu().menu_rect().expect("menu still open");
        assert_eq!((menu.x, menu.y), (scrolled.x, scrolled.bottom()));

        app.arrange(NARROW);
        let resized = app
            .hits()
            .rect_of(HitTarget::ItemTrigger(3))
            .expect("trigger after resize");
        assert!(resized.x < scrolled.x);
        let menu = app.menu().menu_rect().expect("menu after resize");
        assert_eq!((menu.x, menu.y), (resized.x, resized.bottom()));
    }
}
