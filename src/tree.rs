//! In-memory sidebar tree and its flattening into display rows.
//!
//! The tree is rebuilt from scratch on every reload; nothing here patches a
//! previous tree.

use std::collections::{BTreeSet, HashMap};

use crate::model::{Container, Folder, HistoryItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNode {
    pub folder: Folder,
    pub items: Vec<HistoryItem>,
    pub expanded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidebarTree {
    pub folders: Vec<FolderNode>,
    pub top_level: Vec<HistoryItem>,
    pub active_item: Option<i64>,
    pub total_items: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Folders,
    History,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionState {
    pub folders_collapsed: bool,
    pub history_collapsed: bool,
}

impl SectionState {
    pub fn collapsed(&self, section: Section) -> bool {
        match section {
            Section::Folders => self.folders_collapsed,
            Section::History => self.history_collapsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
    Header(Section),
    Folder(i64),
    Item { item_id: i64, container: Container },
    FolderEmpty(i64),
    NoFolders,
    NoHistory,
}

impl SidebarTree {
    /// Places every item exactly once: in its folder when that folder is part
    /// of this render, otherwise at top level. A folder holding the active
    /// item is expanded whatever `open_folders` says.
    pub fn build(
        folders: &[Folder],
        items: &[HistoryItem],
        active_item: Option<i64>,
        open_folders: &BTreeSet<i64>,
    ) -> Self {
        let mut nodes: Vec<FolderNode> = folders
            .iter()
            .map(|folder| FolderNode {
                folder: folder.clone(),
                items: Vec::new(),
                expanded: open_folders.contains(&folder.id),
            })
            .collect();
        let index: HashMap<i64, usize> = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.folder.id, idx))
            .collect();

        let mut top_level = Vec::new();
        for item in items {
            match item.folder_id.and_then(|id| index.get(&id)) {
                Some(&idx) => {
                    let node = &mut nodes[idx];
                    if active_item == Some(item.id) {
                        node.expanded = true;
                    }
                    node.items.push(item.clone());
                }
                None => top_level.push(item.clone()),
            }
        }

        Self {
            folders: nodes,
            top_level,
            active_item,
            total_items: items.len(),
        }
    }

    pub fn show_folder_list(&self) -> bool {
        !self.folders.is_empty()
    }

    pub fn show_history_list(&self) -> bool {
        !self.top_level.is_empty()
    }

    pub fn show_clear_all(&self) -> bool {
        self.total_items > 0
    }

    pub fn folder(&self, folder_id: i64) -> Option<&FolderNode> {
        self.folders.iter().find(|node| node.folder.id == folder_id)
    }

    pub fn item(&self, item_id: i64) -> Option<(&HistoryItem, Container)> {
        if let Some(item) = self.top_level.iter().find(|i| i.id == item_id) {
            return Some((item, Container::TopLevel));
        }
        self.folders.iter().find_map(|node| {
            node.items
                .iter()
                .find(|i| i.id == item_id)
                .map(|item| (item, Container::Folder(node.folder.id)))
        })
    }

    pub fn container_of(&self, item_id: i64) -> Option<Container> {
        self.item(item_id).map(|(_, container)| container)
    }

    pub fn items(&self) -> impl Iterator<Item = (&HistoryItem, Container)> {
        self.folders
            .iter()
            .flat_map(|node| {
                node.items
                    .iter()
                    .map(move |item| (item, Container::Folder(node.folder.id)))
            })
            .chain(self.top_level.iter().map(|item| (item, Container::TopLevel)))
    }

    pub fn rows(&self, sections: SectionState) -> Vec<Row> {
        let mut rows = vec![Row::Header(Section::Folders)];
        if !sections.folders_collapsed {
            if self.folders.is_empty() {
                rows.push(Row::NoFolders);
            }
            for node in &self.folders {
                let folder_id = node.folder.id;
                rows.push(Row::Folder(folder_id));
                if !node.expanded {
                    continue;
                }
                if node.items.is_empty() {
                    rows.push(Row::FolderEmpty(folder_id));
                }
                rows.extend(node.items.iter().map(|item| Row::Item {
                    item_id: item.id,
                    container: Container::Folder(folder_id),
                }));
            }
        }

        rows.push(Row::Header(Section::History));
        if !sections.history_collapsed {
            if self.top_level.is_empty() {
                rows.push(Row::NoHistory);
            }
            rows.extend(self.top_level.iter().map(|item| Row::Item {
                item_id: item.id,
                container: Container::TopLevel,
            }));
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: i64) -> Folder {
        Folder {
            id,
            name: format!("F{id}"),
            color: String::from("#336699"),
        }
    }

    fn item(id: i64, folder_id: Option<i64>) -> HistoryItem {
        HistoryItem {
            id,
            title: format!("query {id}"),
            timestamp: None,
            folder_id,
        }
    }

    fn open(ids: &[i64]) -> BTreeSet<i64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn every_item_lands_in_exactly_one_container() {
        let folders = vec![folder(1), folder(2)];
        let items = vec![
            item(10, Some(1)),
            item(11, None),
            item(12, Some(2)),
            item(13, Some(99)),
            item(14, Some(1)),
        ];
        let tree = SidebarTree::build(&folders, &items, None, &open(&[]));

        for it in &items {
            let hits = tree.items().filter(|(i, _)| i.id == it.id).count();
            assert_eq!(hits, 1, "item {} placed {hits} times", it.id);
        }
        assert_eq!(tree.container_of(10), Some(Container::Folder(1)));
        assert_eq!(tree.container_of(12), Some(Container::Folder(2)));
        assert_eq!(tree.container_of(13), Some(Container::TopLevel));
        assert_eq!(
            tree.top_level.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![11, 13]
        );
        assert_eq!(
            tree.folder(1).map(|n| n.items.iter().map(|i| i.id).collect::<Vec<_>>()),
            Some(vec![10, 14])
        );
    }

    #[test]
    fn persisted_open_folders_drive_expansion() {
        let folders = vec![folder(3), folder(5), folder(7)];
        let tree = SidebarTree::build(&folders, &[], None, &open(&[3, 7]));
        let expanded: Vec<(i64, bool)> = tree
            .folders
            .iter()
            .map(|n| (n.folder.id, n.expanded))
            .collect();
        assert_eq!(expanded, vec![(3, true), (5, false), (7, true)]);
    }

    #[test]
    fn active_item_forces_its_folder_open() {
        let folders = vec![folder(1), folder(2)];
        let items = vec![item(20, Some(2)), item(21, Some(1))];
        let tree = SidebarTree::build(&folders, &items, Some(20), &open(&[]));
        assert!(tree.folder(2).is_some_and(|n| n.expanded));
        assert!(tree.folder(1).is_some_and(|n| !n.expanded));
    }

    #[test]
    fn empty_inputs_show_placeholders_and_hide_clear_all() {
        let tree = SidebarTree::build(&[], &[], None, &open(&[]));
        assert!(!tree.show_folder_list());
        assert!(!tree.show_history_list());
        assert!(!tree.show_clear_all());
        assert_eq!(
            tree.rows(SectionState::default()),
            vec![
                Row::Header(Section::Folders),
                Row::NoFolders,
                Row::Header(Section::History),
                Row::NoHistory,
            ]
        );
    }

    #[test]
    fn all_items_filed_keeps_clear_all_but_shows_empty_history() {
        let folders = vec![folder(1)];
        let items = vec![item(5, Some(1))];
        let tree = SidebarTree::build(&folders, &items, None, &open(&[1]));
        assert!(!tree.show_history_list());
        assert!(tree.show_clear_all());
        assert_eq!(
            tree.rows(SectionState::default()),
            vec![
                Row::Header(Section::Folders),
                Row::Folder(1),
                Row::Item {
                    item_id: 5,
                    container: Container::Folder(1)
                },
                Row::Header(Section::History),
                Row::NoHistory,
            ]
        );
    }

    #[test]
    fn expanded_empty_folder_shows_placeholder_and_collapsed_sections_hide_rows() {
        let folders = vec![folder(4)];
        let items = vec![item(1, None)];
        let tree = SidebarTree::build(&folders, &items, None, &open(&[4]));
        let rows = tree.rows(SectionState::default());
        assert!(rows.contains(&Row::FolderEmpty(4)));

        let rows = tree.rows(SectionState {
            folders_collapsed: true,
            history_collapsed: true,
        });
        assert_eq!(
            rows,
            vec![Row::Header(Section::Folders), Row::Header(Section::History)]
        );
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let folders = vec![folder(1)];
        let items = vec![item(1, Some(1)), item(2, None)];
        let a = SidebarTree::build(&folders, &items, Some(2), &open(&[1]));
        let b = SidebarTree::build(&folders, &items, Some(2), &open(&[1]));
        assert_eq!(a, b);
        assert_eq!(a.rows(SectionState::default()), b.rows(SectionState::default()));
    }
}
