//! Command-palette search over the whole history.

use tracing::debug;

use crate::gateway::GatewayError;
use crate::model::HistoryItem;

const LIMIT_WITH_QUERY: usize = 20;
const LIMIT_WITHOUT_QUERY: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchFilter {
    #[default]
    All,
    Folders,
    Unfiled,
}

pub const SEARCH_FILTERS: [SearchFilter; 3] =
    [SearchFilter::All, SearchFilter::Folders, SearchFilter::Unfiled];

impl SearchFilter {
    pub fn label(self) -> &'static str {
        match self {
            SearchFilter::All => "All",
            SearchFilter::Folders => "In folders",
            SearchFilter::Unfiled => "Unfiled",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SearchFilter::All => SearchFilter::Folders,
            SearchFilter::Folders => SearchFilter::Unfiled,
            SearchFilter::Unfiled => SearchFilter::All,
        }
    }

    pub fn admits(self, item: &HistoryItem) -> bool {
        match self {
            SearchFilter::All => true,
            SearchFilter::Folders => item.folder_id.is_some(),
            SearchFilter::Unfiled => item.folder_id.is_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEntry {
    NewChat,
    Item(HistoryItem),
}

/// Category filter AND case-insensitive title substring, in server order.
pub fn filter_items<'a>(
    items: &'a [HistoryItem],
    query: &str,
    filter: SearchFilter,
) -> Vec<&'a HistoryItem> {
    let query = query.trim().to_lowercase();
    items
        .iter()
        .filter(|item| filter.admits(item))
        .filter(|item| query.is_empty() || item.title.to_lowercase().contains(&query))
        .collect()
}

#[derive(Debug, Default)]
pub struct SearchOverlay {
    open: bool,
    query: String,
    filter: SearchFilter,
    items: Vec<HistoryItem>,
    load: LoadState,
    selected: usize,
    scroll: usize,
}

impl SearchOverlay {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filter(&self) -> SearchFilter {
        self.filter
    }

    pub fn load_state(&self) -> LoadState {
        self.load
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Index of the first result drawn in the list.
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    /// Opens with a clean query and the `All` filter. Returns true when the
    /// session cache is empty and history has to be fetched.
    pub fn open(&mut self) -> bool {
        self.open = true;
        self.query.clear();
        self.filter = SearchFilter::All;
        self.selected = 0;
        self.scroll = 0;
        if matches!(self.load, LoadState::NotLoaded | LoadState::Failed) {
            self.load = LoadState::Loading;
            return true;
        }
        false
    }

    pub fn close(&mut self) {
        self.open = false;
        self.query.clear();
        self.selected = 0;
        self.scroll = 0;
    }

    pub fn loaded(&mut self, result: Result<Vec<HistoryItem>, GatewayError>) {
        match result {
            Ok(items) => {
                debug!(count = items.len(), "search history cached");
                self.items = items;
                self.load = LoadState::Loaded;
            }
            Err(err) => {
                debug!(%err, "search history failed to load");
                self.load = LoadState::Failed;
            }
        }
        self.selected = 0;
        self.scroll = 0;
    }

    pub fn push_char(&mut self, ch: char) {
        self.query.push(ch);
        self.selected = 0;
        self.scroll = 0;
    }

    pub fn backspace(&mut self) {
        self.query.pop();
        self.selected = 0;
        self.scroll = 0;
    }

    pub fn set_filter(&mut self, filter: SearchFilter) {
        self.filter = filter;
        self.selected = 0;
        self.scroll = 0;
    }

    pub fn cycle_filter(&mut self) {
        self.set_filter(self.filter.next());
    }

    /// Visible rows: "New chat" first when the query is empty, then matches
    /// capped at 20 with a query and 10 without.
    pub fn results(&self) -> Vec<SearchEntry> {
        if self.load != LoadState::Loaded {
            return if self.query.trim().is_empty() {
                vec![SearchEntry::NewChat]
            } else {
                Vec::new()
            };
        }
        let has_query = !self.query.trim().is_empty();
        let limit = if has_query {
            LIMIT_WITH_QUERY
        } else {
            LIMIT_WITHOUT_QUERY
        };
        let mut entries = Vec::new();
        if !has_query {
            entries.push(SearchEntry::NewChat);
        }
        entries.extend(
            filter_items(&self.items, &self.query, self.filter)
                .into_iter()
                .take(limit)
                .cloned()
                .map(SearchEntry::Item),
        );
        entries
    }

    pub fn select_next(&mut self) {
        let len = self.results().len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select(&mut self, index: usize) {
        let len = self.results().len();
        if index < len {
            self.selected = index;
        }
    }

    /// Moves the window of `visible` result rows so the selection stays in it.
    pub fn follow_selection(&mut self, visible: usize) {
        let visible = visible.max(1);
        if self.selected < self.scroll {
            self.scroll = self.selected;
        } else if self.selected >= self.scroll + visible {
            self.scroll = self.selected + 1 - visible;
        }
        self.scroll = self
            .scroll
            .min(self.results().len().saturating_sub(visible));
    }

    pub fn selected_entry(&self) -> Option<SearchEntry> {
        self.results().into_iter().nth(self.selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, title: &str, folder_id: Option<i64>) -> HistoryItem {
        HistoryItem {
            id,
            title: title.to_string(),
            timestamp: None,
            folder_id,
        }
    }

    fn sample() -> Vec<HistoryItem> {
        vec![
            item(1, "ABC kinetics", Some(2)),
            item(2, "xyzabc", None),
            item(3, "unrelated", Some(2)),
            item(4, "more abc data", Some(5)),
        ]
    }

    fn loaded_overlay() -> SearchOverlay {
        let mut overlay = SearchOverlay::default();
        assert!(overlay.open());
        overlay.loaded(Ok(sample()));
        overlay
    }

    #[test]
    fn folder_filter_and_query_compose() {
        let items = sample();
        let ids: Vec<i64> = filter_items(&items, "abc", SearchFilter::Folders)
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![1, 4]);

        let ids: Vec<i64> = filter_items(&items, "  ABC ", SearchFilter::Unfiled)
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn empty_query_leads_with_new_chat() {
        let overlay = loaded_overlay();
        let results = overlay.results();
        assert_eq!(results.first(), Some(&SearchEntry::NewChat));
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn results_are_capped() {
        let mut overlay = SearchOverlay::default();
        overlay.open();
        let many: Vec<HistoryItem> = (0..30).map(|i| item(i, "abc", None)).collect();
        overlay.loaded(Ok(many));
        assert_eq!(overlay.results().len(), 11);
        overlay.push_char('a');
        assert_eq!(overlay.results().len(), 20);
    }

    #[test]
    fn selection_is_bounded() {
        let mut overlay = loaded_overlay();
        overlay.push_char('a');
        overlay.push_char('b');
        overlay.push_char('c');
        assert_eq!(overlay.results().len(), 3);
        overlay.select_prev();
        assert_eq!(overlay.selected(), 0);
        for _ in 0..10 {
            overlay.select_next();
        }
        assert_eq!(overlay.selected(), 2);
        assert_eq!(
            overlay.selected_entry(),
            Some(SearchEntry::Item(item(4, "more abc data", Some(5))))
        );
    }

    #[test]
    fn cache_is_fetched_once_per_session() {
        let mut overlay = loaded_overlay();
        overlay.close();
        assert!(!overlay.open());
        assert_eq!(overlay.load_state(), LoadState::Loaded);
    }

    #[test]
    fn failed_load_retries_on_next_open() {
        let mut overlay = SearchOverlay::default();
        overlay.open();
        overlay.loaded(Err(GatewayError::Status(502)));
        assert_eq!(overlay.load_state(), LoadState::Failed);
        overlay.close();
        assert!(overlay.open());
    }

    #[test]
    fn reopening_resets_query_and_filter() {
        let mut overlay = loaded_overlay();
        overlay.push_char('x');
        overlay.cycle_filter();
        overlay.close();
        overlay.open();
        assert_eq!(overlay.query(), "");
        assert_eq!(overlay.filter(), SearchFilter::All);
    }

    #[test]
    fn scroll_follows_selection_both_ways() {
        let mut overlay = SearchOverlay::default();
        overlay.open();
        overlay.loaded(Ok((0..30).map(|i| item(i, "abc", None)).collect()));
        overlay.push_char('a');
        for _ in 0..19 {
            overlay.select_next();
            overlay.follow_selection(5);
        }
        assert_eq!(overlay.selected(), 19);
        assert_eq!(overlay.scroll(), 15);

        for _ in 0..17 {
            overlay.select_prev();
            overlay.follow_selection(5);
        }
        assert_eq!(overlay.selected(), 2);
        assert_eq!(overlay.scroll(), 2);

        overlay.push_char('b');
        assert_eq!(overlay.scroll(), 0);
    }
}
