//! Frame drawing. Geometry comes from [`App::arrange`]; nothing here
//! computes positions of its own.

use chrono::Utc;
use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};

use crate::app::{App, FOLDER_PALETTE, FolderForm, submenu_row_offset};
use crate::drag::DropTarget;
use crate::format::{copyright_year, folder_color, format_title, time_ago};
use crate::layout::{self, CLEAR_ALL_LABEL, DialogLayout, NEW_FOLDER_LABEL, RowSlot, SearchLayout};
use crate::menu::{MENU_ENTRIES, SubmenuEntry};
use crate::model::{Container, Location};
use crate::search::{LoadState, SearchEntry};
use crate::tree::{Row, Section};

const SELECTED_BG: Color = Color::Rgb(44, 54, 84);
const DROP_BG: Color = Color::Rgb(39, 62, 84);

fn selected_style() -> Style {
    Style::default()
        .bg(SELECTED_BG)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

fn placeholder_style() -> Style {
    Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::ITALIC)
}

fn popup_block(title: &str, accent: Color) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .border_style(Style::default().fg(accent))
}

pub fn draw(frame: &mut Frame<'_>, app: &App) {
    let panes = app.frame().panes;
    render_sidebar(frame, panes.sidebar, app);
    render_detail(frame, panes.detail, app);
    render_footer(frame, panes.footer, app);

    render_menu(frame, app);
    if let Some(search) = &app.frame().search {
        render_search(frame, search, app);
    }
    if let (Some(form), Some(dialog)) = (app.folder_form(), app.frame().dialog)
        && app.modal().is_none()
    {
        render_folder_form(frame, &dialog, form);
    }
    if let (Some(action), Some(dialog)) = (app.modal(), app.frame().dialog) {
        frame.render_widget(Clear, dialog.outer);
        frame.render_widget(popup_block(action.title(), Color::Red), dialog.outer);
        let body = Paragraph::new(action.body()).wrap(Wrap { trim: true });
        frame.render_widget(body, dialog.body);
        render_button(frame, dialog.confirm, action.confirm_label(), Color::Red);
        render_button(frame, dialog.cancel, "Cancel", Color::Gray);
    }
    if let (Some(toast), Some(rect)) = (app.toast(), app.frame().toast) {
        frame.render_widget(Clear, rect);
        let para = Paragraph::new(toast.message.clone())
            .style(Style::default().fg(Color::White))
            .block(popup_block("Error", Color::Red));
        frame.render_widget(para, rect);
    }
}

fn render_sidebar(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let title = if app.loading {
        "History (loading...)"
    } else {
        "History"
    };
    let border = if app.search().is_open() || app.modal().is_some() {
        Style::default()
    } else {
        Style::default().fg(Color::Yellow)
    };
    frame.render_widget(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border),
        area,
    );

    let hover = app.drag().hover();
    let dragged = app.drag().dragged().map(|d| d.item_id);
    for slot in &app.frame().slots {
        let selected = app.selected == slot.index;
        let highlighted = match (slot.row, hover) {
            (Row::Folder(id), Some(DropTarget::Folder(target))) => id == target,
            (
                Row::Item {
                    container: Container::TopLevel,
                    ..
                }
                | Row::NoHistory,
                Some(DropTarget::TopLevel),
            ) => true,
            _ => false,
        };
        let mut base = Style::default();
        if highlighted {
            base = base.bg(DROP_BG);
        }
        if selected {
            base = selected_style();
        }
        render_row(frame, slot, app, base, dragged);
    }
}

fn render_row(frame: &mut Frame<'_>, slot: &RowSlot, app: &App, base: Style, dragged: Option<i64>) {
    let rect = slot.rect;
    frame.buffer_mut().set_style(rect, base);
    match slot.row {
        Row::Header(section) => {
            let collapsed = app.sections().collapsed(section);
            let chevron = if collapsed { "▸" } else { "▾" };
            let label = match section {
                Section::Folders => "Folders",
                Section::History => "Recent",
            };
            let line = Line::from(vec![
                Span::styled(format!("{chevron} "), Style::default().fg(Color::Cyan)),
                Span::styled(label, Style::default().add_modifier(Modifier::BOLD)),
            ]);
            frame.render_widget(Paragraph::new(line).style(base), rect);
            let button = match section {
                Section::Folders => Some((NEW_FOLDER_LABEL, Color::Green)),
                Section::History if app.tree().show_clear_all() => {
                    Some((CLEAR_ALL_LABEL, Color::Red))
                }
                Section::History => None,
            };
            if let Some((label, color)) = button {
                let cells = layout::right_cells(rect, label.chars().count() as u16);
                frame.render_widget(
                    Paragraph::new(Span::styled(label, base.fg(color))),
                    cells,
                );
            }
        }
        Row::Folder(folder_id) => {
            let Some(node) = app.tree().folder(folder_id) else {
                return;
            };
            let chevron = if node.expanded { "▾" } else { "▸" };
            let line = Line::from(vec![
                Span::raw(format!("{chevron} ")),
                Span::styled("●", base.fg(folder_color(&node.folder.color))),
                Span::raw(" "),
                Span::raw(node.folder.name.clone()),
                Span::styled(
                    format!("  {}", node.items.len()),
                    base.fg(Color::DarkGray),
                ),
            ]);
            frame.render_widget(Paragraph::new(line).style(base), rect);
            frame.render_widget(
                Paragraph::new(Span::styled(" × ", base.fg(Color::DarkGray))),
                layout::trigger_rect(rect),
            );
        }
        Row::Item { item_id, container } => {
            let Some((item, _)) = app.tree().item(item_id) else {
                return;
            };
            let active = app.location().active_item() == Some(item_id);
            let mut style = base;
            if active {
                style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
            }
            if dragged == Some(item_id) {
                style = style.add_modifier(Modifier::DIM);
            }
            let indent = match container {
                Container::Folder(_) => "    ",
                Container::TopLevel => "  ",
            };
            let marker = if active { "•" } else { " " };
            let line = Line::from(vec![
                Span::raw(indent),
                Span::styled(marker, style),
                Span::styled(format_title(&item.title), style),
            ]);
            frame.render_widget(Paragraph::new(line).style(base), rect);

            let age = time_ago(item.timestamp.as_deref(), Utc::now());
            let trigger = layout::trigger_rect(rect);
            let age_width = (age.chars().count() as u16 + 1).min(rect.width / 3);
            if age_width > 1 {
                let age_rect = Rect::new(
                    trigger.x.saturating_sub(age_width),
                    rect.y,
                    age_width,
                    1,
                );
                frame.render_widget(
                    Paragraph::new(Span::styled(age, base.fg(Color::DarkGray)))
                        .alignment(Alignment::Right),
                    age_rect,
                );
            }
            let open = app.menu().open_item() == Some(item_id);
            let trigger_style = if open {
                base.fg(Color::Yellow)
            } else {
                base.fg(Color::Gray)
            };
            frame.render_widget(
                Paragraph::new(Span::styled(" ⋮ ", trigger_style)),
                trigger,
            );
        }
        Row::FolderEmpty(_) => {
            frame.render_widget(
                Paragraph::new(Span::styled("    No items in this folder.", placeholder_style())),
                rect,
            );
        }
        Row::NoFolders => {
            frame.render_widget(
                Paragraph::new(Span::styled("  No folders yet.", placeholder_style())),
                rect,
            );
        }
        Row::NoHistory => {
            frame.render_widget(
                Paragraph::new(Span::styled("  No recent searches.", placeholder_style()))
                    .style(base),
                rect,
            );
        }
    }
}

fn render_detail(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title("Details");
    let lines = match app.location() {
        Location::Root => vec![
            Line::from(Span::styled(
                "New chat",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("No history item is open."),
            Line::from(vec![
                Span::raw("Press "),
                Span::styled("Ctrl+K", Style::default().fg(Color::Cyan)),
                Span::raw(" to search your history."),
            ]),
        ],
        Location::HistoryItem(item_id) => match app.tree().item(item_id) {
            Some((item, container)) => {
                let folder = match container {
                    Container::Folder(id) => app
                        .tree()
                        .folder(id)
                        .map(|node| node.folder.name.clone())
                        .unwrap_or_default(),
                    Container::TopLevel => String::from("Recent"),
                };
                let when = item.timestamp.clone().unwrap_or_else(|| String::from("-"));
                vec![
                    Line::from(Span::styled(
                        item.title.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(""),
                    detail_line("Saved", format!(
                        "{when} ({})",
                        time_ago(item.timestamp.as_deref(), Utc::now())
                    )),
                    detail_line("Folder", folder),
                    detail_line("Link", app.item_url(item_id)),
                ]
            }
            None => vec![
                Line::from(format!("History item {item_id}")),
                Line::from(""),
                detail_line("Link", app.item_url(item_id)),
            ],
        },
    };
    let para = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(para, area);
}

fn detail_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(Color::DarkGray)),
        Span::raw(value),
    ])
}

fn render_footer(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let key_line = Line::from(vec![
        Span::styled("j/k", Style::default().fg(Color::Cyan)),
        Span::raw(" nav  "),
        Span::styled("enter", Style::default().fg(Color::Cyan)),
        Span::raw(" open  "),
        Span::styled("m", Style::default().fg(Color::Cyan)),
        Span::raw(" actions  "),
        Span::styled("ctrl+k", Style::default().fg(Color::Cyan)),
        Span::raw(" search  "),
        Span::styled("n", Style::default().fg(Color::Green)),
        Span::raw(" new folder  "),
        Span::styled("d", Style::default().fg(Color::Red)),
        Span::raw(" delete  "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" refresh  "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" quit"),
    ]);
    let status_line = Line::from(vec![
        Span::raw(app.status().to_string()),
        Span::styled(
            format!("  © {}", copyright_year(Utc::now())),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let para = Paragraph::new(vec![key_line, status_line])
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: false });
    frame.render_widget(para, area);
}

fn render_menu(frame: &mut Frame<'_>, app: &App) {
    let Some(rect) = app.frame().menu else {
        return;
    };
    let menu = app.menu();
    let focused = !menu.submenu_open();
    let items: Vec<ListItem> = MENU_ENTRIES
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let style = if focused && idx == menu.cursor() {
                selected_style()
            } else {
                Style::default()
            };
            let suffix = if idx == 0 { " ›" } else { "" };
            ListItem::new(Line::from(Span::styled(
                format!("{}{suffix}", entry.label()),
                style,
            )))
        })
        .collect();
    frame.render_widget(Clear, rect);
    frame.render_widget(List::new(items).block(popup_block("Actions", Color::Cyan)), rect);

    let Some(sub) = app.frame().submenu else {
        return;
    };
    let mut items: Vec<ListItem> = Vec::new();
    if submenu_row_offset(menu.destinations()) > 0 {
        items.push(ListItem::new(Span::styled(
            "No folders available.",
            placeholder_style(),
        )));
    }
    items.extend(menu.destinations().iter().enumerate().map(|(idx, entry)| {
        let style = if idx == menu.sub_cursor() {
            selected_style()
        } else {
            Style::default()
        };
        let line = match entry {
            SubmenuEntry::Folder { color, .. } => Line::from(vec![
                Span::styled("● ", style.fg(folder_color(color))),
                Span::styled(entry.label().to_string(), style),
            ]),
            SubmenuEntry::NoFolder => Line::from(Span::styled(
                format!("  {}", entry.label()),
                style,
            )),
            SubmenuEntry::CreateFolder => Line::from(Span::styled(
                format!("+ {}", entry.label()),
                style.fg(Color::Green),
            )),
        };
        ListItem::new(line)
    }));
    frame.render_widget(Clear, sub);
    frame.render_widget(List::new(items).block(popup_block("Move to", Color::Cyan)), sub);
}

fn render_search(frame: &mut Frame<'_>, layout: &SearchLayout, app: &App) {
    let search = app.search();
    frame.render_widget(Clear, layout.outer);
    frame.render_widget(popup_block("Search history", Color::Yellow), layout.outer);

    let input = Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Cyan)),
        Span::raw(search.query().to_string()),
        Span::styled("▏", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(input), layout.input);

    for (rect, filter) in &layout.filters {
        let style = if *filter == search.filter() {
            selected_style()
        } else {
            Style::default().fg(Color::Gray)
        };
        frame.render_widget(
            Paragraph::new(Span::styled(format!(" {} ", filter.label()), style)),
            *rect,
        );
    }

    let message = match search.load_state() {
        LoadState::Loading | LoadState::NotLoaded => Some("Loading history..."),
        LoadState::Failed => Some("Failed to load history."),
        LoadState::Loaded => None,
    };
    let results = search.results();
    let first = search.scroll();
    for (idx, entry) in results.iter().enumerate().skip(first) {
        let Some(rect) = layout.result_row(idx - first) else {
            break;
        };
        let style = if idx == search.selected() {
            selected_style()
        } else {
            Style::default()
        };
        let line = match entry {
            SearchEntry::NewChat => Line::from(Span::styled("+ New chat", style.fg(Color::Green))),
            SearchEntry::Item(item) => {
                let place = match item.folder_id.and_then(|id| app.tree().folder(id)) {
                    Some(node) => node.folder.name.clone(),
                    None => String::from("Recent"),
                };
                Line::from(vec![
                    Span::styled(item.title.clone(), style),
                    Span::styled(format!("  {place}"), style.fg(Color::DarkGray)),
                ])
            }
        };
        frame.render_widget(Paragraph::new(line).style(style), rect);
    }
    let note = match message {
        Some(message) => Some(message),
        None if results.is_empty() => Some("No matching history."),
        None => None,
    };
    if let Some(note) = note
        && let Some(rect) = layout.result_row(results.len().saturating_sub(first))
    {
        frame.render_widget(
            Paragraph::new(Span::styled(note, placeholder_style())),
            rect,
        );
    }
}

fn render_folder_form(frame: &mut Frame<'_>, dialog: &DialogLayout, form: &FolderForm) {
    frame.render_widget(Clear, dialog.outer);
    frame.render_widget(popup_block("New folder", Color::Green), dialog.outer);

    let body = dialog.body;
    let name = Line::from(vec![
        Span::styled("Name: ", Style::default().fg(Color::DarkGray)),
        Span::raw(form.name.clone()),
        Span::styled("▏", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(name), Rect::new(body.x, body.y, body.width, 1));

    if let Some(error) = &form.error
        && body.height > 1
    {
        frame.render_widget(
            Paragraph::new(Span::styled(error.clone(), Style::default().fg(Color::Red))),
            Rect::new(body.x, body.y + 1, body.width, 1),
        );
    }
    if body.height > 2 {
        frame.render_widget(
            Paragraph::new(Span::styled(
                "Color (←/→):",
                Style::default().fg(Color::DarkGray),
            )),
            Rect::new(body.x, body.y + 2, body.width, 1),
        );
    }
    for (idx, rect) in dialog.swatches(FOLDER_PALETTE.len()).into_iter().enumerate() {
        let chosen = idx == form.color_idx;
        let text = if chosen { "[●]" } else { " ● " };
        frame.render_widget(
            Paragraph::new(Span::styled(
                text,
                Style::default().fg(folder_color(FOLDER_PALETTE[idx])),
            )),
            rect,
        );
    }
    let create = if form.submitting { "Saving" } else { "Create" };
    render_button(frame, dialog.confirm, create, Color::Green);
    render_button(frame, dialog.cancel, "Cancel", Color::Gray);
}

fn render_button(frame: &mut Frame<'_>, rect: Rect, label: &str, color: Color) {
    frame.render_widget(
        Paragraph::new(Span::styled(
            format!("[{label}]"),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        rect,
    );
}

#[cfg(test)]
mod tests {
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::config::Config;
    use crate::model::{Folder, HistoryItem};
    use crate::storage::MemoryStore;
    use crate::worker::Completion;

    fn screen(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).expect("terminal");
        terminal
            .draw(|frame| {
                app.arrange(frame.area());
                draw(frame, app);
            })
            .expect("draw");
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app_with(folders: Vec<Folder>, items: Vec<HistoryItem>) -> App {
        let mut app = App::new(Box::new(MemoryStore::default()), &Config::default());
        app.take_requests();
        app.apply(Completion::Reloaded(Ok((folders, items))));
        app
    }

    #[test]
    fn empty_sidebar_shows_placeholders_without_clear_all() {
        let mut app = app_with(Vec::new(), Vec::new());
        let text = screen(&mut app);
        assert!(text.contains("No folders yet."));
        assert!(text.contains("No recent searches."));
        assert!(!text.contains(CLEAR_ALL_LABEL));
        assert!(text.contains(&format!("© {}", copyright_year(Utc::now()))));
    }

    #[test]
    fn long_titles_are_shortened_in_rows() {
        let mut app = app_with(
            vec![Folder {
                id: 1,
                name: String::from("Papers"),
                color: String::from("#198754"),
            }],
            vec![HistoryItem {
                id: 9,
                title: String::from("a very long question about electrolytes"),
                timestamp: None,
                folder_id: None,
            }],
        );
        let text = screen(&mut app);
        assert!(text.contains("a very long question a..."));
        assert!(text.contains("Papers"));
        assert!(text.contains(CLEAR_ALL_LABEL));
    }
}
