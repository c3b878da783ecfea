//! Screen geometry shared by drawing and mouse handling.
//!
//! Everything here is recomputed from scratch each frame: the hit table is
//! cleared before it is refilled, so a rebuild never leaves stale or
//! duplicated click targets behind.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

use crate::drag::DropTarget;
use crate::search::{SEARCH_FILTERS, SearchFilter};
use crate::tree::{Row, Section};

pub const TRIGGER_WIDTH: u16 = 3;
pub const NEW_FOLDER_LABEL: &str = "[+]";
pub const CLEAR_ALL_LABEL: &str = "[clear]";
pub const SWATCH_WIDTH: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    SectionToggle(Section),
    NewFolder,
    ClearAll,
    FolderToggle(i64),
    FolderDelete(i64),
    Item(i64),
    ItemTrigger(i64),
    MenuBody,
    MenuEntry(usize),
    SubmenuEntry(usize),
    Toast,
    SearchBackdrop,
    SearchBody,
    SearchFilter(SearchFilter),
    SearchResult(usize),
    ModalBody,
    ModalConfirm,
    ModalCancel,
    FormBody,
    FormSwatch(usize),
    FormCreate,
    FormCancel,
}

impl HitTarget {
    pub fn is_menu_part(self) -> bool {
        matches!(
            self,
            HitTarget::MenuBody | HitTarget::MenuEntry(_) | HitTarget::SubmenuEntry(_)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HitMap {
    regions: Vec<(Rect, HitTarget)>,
    drop_zones: Vec<(Rect, DropTarget)>,
}

impl HitMap {
    pub fn clear(&mut self) {
        self.regions.clear();
        self.drop_zones.clear();
    }

    pub fn push(&mut self, rect: Rect, target: HitTarget) {
        if rect.width > 0 && rect.height > 0 {
            self.regions.push((rect, target));
        }
    }

    pub fn push_drop_zone(&mut self, rect: Rect, target: DropTarget) {
        if rect.width > 0 && rect.height > 0 {
            self.drop_zones.push((rect, target));
        }
    }

    /// Topmost target under the point; later registrations sit above earlier
    /// ones.
    pub fn hit(&self, x: u16, y: u16) -> Option<HitTarget> {
        self.regions
            .iter()
            .rev()
            .find(|(rect, _)| point_in_rect(x, y, *rect))
            .map(|(_, target)| *target)
    }

    pub fn drop_target(&self, x: u16, y: u16) -> Option<DropTarget> {
        self.drop_zones
            .iter()
            .rev()
            .find(|(rect, _)| point_in_rect(x, y, *rect))
            .map(|(_, target)| *target)
    }

    pub fn rect_of(&self, target: HitTarget) -> Option<Rect> {
        self.regions
            .iter()
            .find(|(_, t)| *t == target)
            .map(|(rect, _)| *rect)
    }

    pub fn drop_zone_of(&self, target: DropTarget) -> Option<Rect> {
        self.drop_zones
            .iter()
            .find(|(_, t)| *t == target)
            .map(|(rect, _)| *rect)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSlot {
    pub index: usize,
    pub row: Row,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaneLayout {
    pub sidebar: Rect,
    pub detail: Rect,
    pub footer: Rect,
}

impl PaneLayout {
    pub fn split(area: Rect, sidebar_pct: u16) -> Self {
        let root = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(4)])
            .split(area);
        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(sidebar_pct),
                Constraint::Percentage(100u16.saturating_sub(sidebar_pct)),
            ])
            .split(root[0]);
        Self {
            sidebar: panes[0],
            detail: panes[1],
            footer: root[1],
        }
    }
}

pub fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

pub fn inner(rect: Rect) -> Rect {
    Rect::new(
        rect.x.saturating_add(1),
        rect.y.saturating_add(1),
        rect.width.saturating_sub(2),
        rect.height.saturating_sub(2),
    )
}

pub fn visible_rows(pane: Rect) -> usize {
    pane.height.saturating_sub(2) as usize
}

pub fn row_slots(rows: &[Row], pane: Rect, scroll: usize) -> Vec<RowSlot> {
    let body = inner(pane);
    rows.iter()
        .enumerate()
        .skip(scroll)
        .take(body.height as usize)
        .enumerate()
        .map(|(offset, (index, row))| RowSlot {
            index,
            row: *row,
            rect: Rect::new(body.x, body.y + offset as u16, body.width, 1),
        })
        .collect()
}

/// Right-aligned button cell range inside a row.
pub fn right_cells(row: Rect, width: u16) -> Rect {
    let width = width.min(row.width);
    Rect::new(row.right().saturating_sub(width), row.y, width, row.height)
}

pub fn trigger_rect(row: Rect) -> Rect {
    right_cells(row, TRIGGER_WIDTH)
}

/// Chevron and folder name: the only part of a folder row that toggles it.
pub fn folder_toggle_rect(row: Rect, name: &str) -> Rect {
    let wanted = 4 + name.chars().count() as u16;
    let width = wanted.min(row.width.saturating_sub(TRIGGER_WIDTH));
    Rect::new(row.x, row.y, width, row.height)
}

pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

pub fn toast_rect(area: Rect) -> Rect {
    let width = 48.min(area.width.saturating_sub(2));
    Rect::new(
        area.right().saturating_sub(width + 1),
        area.y.saturating_add(1),
        width,
        3.min(area.height),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLayout {
    pub outer: Rect,
    pub input: Rect,
    pub filters: Vec<(Rect, SearchFilter)>,
    pub results: Rect,
}

impl SearchLayout {
    pub fn compute(area: Rect) -> Self {
        let outer = centered_rect(70, 70, area);
        let body = inner(outer);
        let input = Rect::new(body.x, body.y, body.width, 1.min(body.height));

        let mut filters = Vec::new();
        let mut x = body.x;
        let filter_y = body.y.saturating_add(1);
        for filter in SEARCH_FILTERS {
            let width = filter.label().chars().count() as u16 + 2;
            if x.saturating_add(width) > body.right() {
                break;
            }
            filters.push((Rect::new(x, filter_y, width, 1), filter));
            x = x.saturating_add(width + 1);
        }

        let results = Rect::new(
            body.x,
            body.y.saturating_add(3),
            body.width,
            body.height.saturating_sub(3),
        );
        Self {
            outer,
            input,
            filters,
            results,
        }
    }

    pub fn result_row(&self, index: usize) -> Option<Rect> {
        let index = u16::try_from(index).ok()?;
        if index >= self.results.height {
            return None;
        }
        Some(Rect::new(
            self.results.x,
            self.results.y + index,
            self.results.width,
            1,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogLayout {
    pub outer: Rect,
    pub body: Rect,
    pub confirm: Rect,
    pub cancel: Rect,
}

impl DialogLayout {
    pub fn compute(area: Rect, percent_x: u16, percent_y: u16, confirm_label: &str) -> Self {
        let outer = centered_rect(percent_x, percent_y, area);
        let body = inner(outer);
        let buttons_y = body.bottom().saturating_sub(1);
        let confirm_width = confirm_label.chars().count() as u16 + 2;
        let confirm = Rect::new(body.x, buttons_y, confirm_width.min(body.width), 1);
        let cancel = Rect::new(
            body.x.saturating_add(confirm_width + 2),
            buttons_y,
            8.min(body.width.saturating_sub(confirm_width + 2)),
            1,
        );
        Self {
            outer,
            body,
            confirm,
            cancel,
        }
    }

    /// Swatch cells on the third body line of the new-folder form.
    pub fn swatches(&self, count: usize) -> Vec<Rect> {
        let y = self.body.y.saturating_add(3);
        (0..count)
            .map(|idx| {
                Rect::new(
                    self.body.x + idx as u16 * SWATCH_WIDTH,
                    y,
                    SWATCH_WIDTH,
                    1,
                )
            })
            .filter(|rect| rect.right() <= self.body.right() && rect.y < self.body.bottom())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_regions_win_hit_tests() {
        let mut hits = HitMap::default();
        hits.push(Rect::new(0, 0, 10, 1), HitTarget::Item(1));
        hits.push(Rect::new(7, 0, 3, 1), HitTarget::ItemTrigger(1));
        assert_eq!(hits.hit(2, 0), Some(HitTarget::Item(1)));
        assert_eq!(hits.hit(8, 0), Some(HitTarget::ItemTrigger(1)));
        assert_eq!(hits.hit(8, 1), None);
    }

    #[test]
    fn clearing_drops_regions_and_zones() {
        let mut hits = HitMap::default();
        hits.push(Rect::new(0, 0, 4, 1), HitTarget::NewFolder);
        hits.push_drop_zone(Rect::new(0, 0, 4, 4), DropTarget::TopLevel);
        hits.push(Rect::new(0, 0, 0, 1), HitTarget::ClearAll);
        assert_eq!(hits.len(), 1);
        hits.clear();
        assert!(hits.is_empty());
        assert_eq!(hits.drop_target(1, 1), None);
    }

    #[test]
    fn row_slots_follow_scroll_and_pane_height() {
        let rows = vec![
            Row::Header(Section::Folders),
            Row::NoFolders,
            Row::Header(Section::History),
            Row::NoHistory,
        ];
        let slots = row_slots(&rows, Rect::new(0, 0, 20, 4), 1);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].index, 1);
        assert_eq!(slots[0].rect, Rect::new(1, 1, 18, 1));
        assert_eq!(slots[1].row, Row::Header(Section::History));
    }

    #[test]
    fn trigger_and_toggle_cells() {
        let row = Rect::new(1, 5, 30, 1);
        assert_eq!(trigger_rect(row), Rect::new(28, 5, 3, 1));
        assert_eq!(folder_toggle_rect(row, "Papers"), Rect::new(1, 5, 10, 1));
        assert_eq!(
            folder_toggle_rect(row, &"x".repeat(40)).width,
            27
        );
    }
}
