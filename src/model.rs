use std::time::Instant;

use arboard::Clipboard;
use tracing::{debug, info, trace};

use crate::domain::{Message, RTVConfig, RTVError};
use crate::header::Header;
use crate::row::RowEvent;
use crate::row_events::RowEvents;
use crate::stack::{Component, Pages};
use crate::table_data::{SortColumn, TableData, ViewSetting};
use crate::ui::{STATUSLINE_HEIGHT, TABLE_CHROME_HEIGHT};
use crate::watcher::Snapshot;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

/// Pages the viewer can show.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Table,
    Detail(String),
    Help,
}

impl Component for View {
    fn name(&self) -> &str {
        match self {
            View::Table => "table",
            View::Detail(_) => "detail",
            View::Help => "help",
        }
    }

    fn is_dialog(&self) -> bool {
        matches!(self, View::Help)
    }
}

/// All fields of one row next to their previous values.
#[derive(Debug, Clone, Default)]
pub struct DetailData {
    pub id: String,
    pub header: Header,
    pub event: Option<RowEvent>,
}

/// Everything the UI needs to draw a frame.
#[derive(Debug, Clone)]
pub struct UIData {
    pub name: String,
    pub namespace: String,
    pub header: Header,
    pub rows: Vec<RowEvent>,
    pub total: usize,
    pub selected_row: Option<usize>,
    pub sort_column: SortColumn,
    pub manual_sort: bool,
    pub wide: bool,
    pub filter: String,
    pub view: View,
    pub show_help: bool,
    pub detail: Option<DetailData>,
    pub status_message: String,
    pub last_status_message_update: Instant,
    pub last_data_change: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            namespace: String::new(),
            header: Header::default(),
            rows: Vec::new(),
            total: 0,
            selected_row: None,
            sort_column: SortColumn::default(),
            manual_sort: false,
            wide: false,
            filter: String::new(),
            view: View::Table,
            show_help: false,
            detail: None,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
            last_data_change: Instant::now(),
        }
    }
}

pub struct Model {
    config: RTVConfig,
    pub status: Status,
    table: TableData,
    view_setting: ViewSetting,
    sort_column: SortColumn,
    manual: bool,
    pages: Pages<View>,
    selected: Option<String>,
    page_size: usize,
    last_data_change: Instant,
    uidata: UIData,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &RTVConfig, ui_height: usize) -> Self {
        let mut pages = Pages::new();
        pages.push(View::Table);

        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            table: TableData::full(
                config.gvr.clone(),
                config.namespace.clone(),
                Header::default(),
                RowEvents::new(),
            ),
            view_setting: config.view.clone(),
            sort_column: SortColumn::default(),
            manual: false,
            pages,
            selected: None,
            page_size: Self::page_size_for(ui_height),
            last_data_change: Instant::now(),
            uidata: UIData::empty(),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.set_status_message("Loading ...");
        model.update_uidata();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn table(&self) -> &TableData {
        &self.table
    }

    pub fn sort_column(&self) -> &SortColumn {
        &self.sort_column
    }

    /// Reconciles a new snapshot. Returns false when nothing observable changed.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> bool {
        // Same reconciliation as the table so duplicate ids land where the table puts them.
        let mut events = RowEvents::new();
        events.update(snapshot.rows.clone());
        let candidate = TableData::full(
            self.table.gvr().clone(),
            self.table.namespace(),
            snapshot.header,
            events,
        );
        if !self.table.diff(Some(&candidate)) {
            trace!("Snapshot unchanged, skipping redraw");
            return false;
        }

        if self.table.header() != candidate.header() {
            info!(
                "Header of {} changed, resetting {} rows",
                self.table.gvr(),
                self.table.count()
            );
            let namespace = self.table.namespace().to_string();
            self.table.reset(namespace);
            self.table.set_header(candidate.header().clone());
        }
        self.table.update(snapshot.rows);

        self.last_data_change = Instant::now();
        self.refresh_sort_column();
        self.set_status_message(format!("{} {}", self.table.count(), self.table.gvr()));
        self.update_uidata();
        true
    }

    pub fn snapshot_failed(&mut self, err: &RTVError) {
        self.set_status_message(format!("Refresh failed: {err}"));
        self.update_uidata();
    }

    pub fn update(&mut self, message: Option<Message>) {
        let Some(msg) = message else {
            return;
        };
        trace!("Update: view {:?}, message {:?}", self.pages.current(), msg);

        match msg {
            Message::Quit => self.quit(),
            Message::Resize(_, height) => self.page_size = Self::page_size_for(height),
            Message::Help => self.show_help(),
            Message::Exit => self.exit(),
            _ => match self.pages.current().cloned() {
                Some(View::Table) => match msg {
                    Message::MoveDown => self.move_selection(1),
                    Message::MoveUp => self.move_selection(-1),
                    Message::MovePageDown => self.move_selection(self.page_size as isize),
                    Message::MovePageUp => self.move_selection(-(self.page_size as isize)),
                    Message::MoveBeginning => self.move_selection(isize::MIN),
                    Message::MoveEnd => self.move_selection(isize::MAX),
                    Message::Enter => self.enter(),
                    Message::ToggleWide => self.toggle_wide(),
                    Message::SortNextColumn => self.sort_by_neighbour(true),
                    Message::SortPreviousColumn => self.sort_by_neighbour(false),
                    Message::FlipSortOrder => self.flip_sort_order(),
                    Message::ResetSort => self.reset_sort(),
                    Message::CopyRowId => self.copy_row_id(),
                    _ => (),
                },
                Some(View::Detail(_)) => match msg {
                    Message::CopyRowId => self.copy_row_id(),
                    Message::ToggleWide => self.toggle_wide(),
                    _ => (),
                },
                Some(View::Help) | None => (),
            },
        }
        self.update_uidata();
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter(&mut self) {
        if let Some(id) = self.selected.clone() {
            debug!("Showing details of {id}");
            self.pages.push(View::Detail(id));
            self.pages.dump();
        }
    }

    fn exit(&mut self) {
        if self.pages.pop().is_none() {
            trace!("Nothing to go back to");
        }
        self.pages.dump();
    }

    fn show_help(&mut self) {
        if !self.pages.is_top_dialog() {
            self.pages.push(View::Help);
        }
    }

    fn toggle_wide(&mut self) {
        self.view_setting.wide = !self.view_setting.wide;
        self.refresh_sort_column();
        self.set_status_message(if self.view_setting.wide {
            "Wide columns on"
        } else {
            "Wide columns off"
        });
    }

    fn refresh_sort_column(&mut self) {
        let sc = self.table.compute_sort_col(
            &self.view_setting,
            self.sort_column.clone(),
            self.manual,
        );
        if sc != self.sort_column {
            debug!("Sort column {:?} -> {:?}", self.sort_column, sc);
        }
        self.sort_column = sc;
    }

    /// Moves the sort to the next or previous displayed column.
    fn sort_by_neighbour(&mut self, forward: bool) {
        let names: Vec<String> = self
            .table
            .display_indices(&self.view_setting)
            .into_iter()
            .filter_map(|i| self.table.header().get(i).map(|c| c.name.clone()))
            .collect();
        if names.is_empty() {
            return;
        }

        let next = match names.iter().position(|n| *n == self.sort_column.name) {
            Some(pos) if forward => (pos + 1) % names.len(),
            Some(pos) => (pos + names.len() - 1) % names.len(),
            None if forward => 0,
            None => names.len() - 1,
        };
        self.sort_column = SortColumn::new(names[next].clone(), self.sort_column.asc);
        self.manual = true;
    }

    fn flip_sort_order(&mut self) {
        if self.sort_column.is_active() {
            self.sort_column.asc = !self.sort_column.asc;
            self.manual = true;
        }
    }

    fn reset_sort(&mut self) {
        self.manual = false;
        self.sort_column = SortColumn::default();
        self.refresh_sort_column();
    }

    fn copy_row_id(&mut self) {
        let id = match self.pages.current() {
            Some(View::Detail(id)) => Some(id.clone()),
            _ => self.selected.clone(),
        };
        let Some(id) = id else {
            return;
        };
        match Clipboard::new().and_then(|mut c| c.set_text(id.clone())) {
            Ok(_) => self.set_status_message(format!("Copied {id}")),
            Err(e) => {
                debug!("Error copying to clipboard: {e:?}");
                self.set_status_message("Clipboard not available");
            }
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let rows = &self.uidata.rows;
        if rows.is_empty() {
            self.selected = None;
            return;
        }
        let current = self.uidata.selected_row.unwrap_or(0) as isize;
        let target = current.saturating_add(delta).clamp(0, rows.len() as isize - 1) as usize;
        self.selected = Some(rows[target].row.id.clone());
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn page_size_for(ui_height: usize) -> usize {
        ui_height
            .saturating_sub(STATUSLINE_HEIGHT + TABLE_CHROME_HEIGHT)
            .max(1)
    }

    fn update_uidata(&mut self) {
        let filtered = if self.config.filter.is_empty() {
            None
        } else {
            Some(self.table.filter(&self.config.filter))
        };
        let source = filtered.as_ref().unwrap_or(&self.table);

        let indices = source.display_indices(&self.view_setting);
        let rows: Vec<RowEvent> = source
            .sorted_events(&self.sort_column)
            .into_iter()
            .map(|e| e.customize(&indices))
            .collect();

        // The selection follows its row id. A vanished row leaves the cursor in place.
        let previous = self.uidata.selected_row;
        let selected_row = match &self.selected {
            Some(id) => rows.iter().position(|e| e.row.id == *id).or(previous),
            None => None,
        }
        .or(Some(0))
        .filter(|_| !rows.is_empty())
        .map(|i| i.min(rows.len().saturating_sub(1)));
        self.selected = selected_row.map(|i| rows[i].row.id.clone());

        let view = self.pages.base().cloned().unwrap_or(View::Table);
        let detail = match &view {
            View::Detail(id) => Some(DetailData {
                id: id.clone(),
                header: self.table.header().clone(),
                event: self.table.row_events().get(id).cloned(),
            }),
            _ => None,
        };

        self.uidata = UIData {
            name: self.table.gvr().to_string(),
            namespace: self.table.namespace().to_string(),
            header: Header(
                indices
                    .iter()
                    .filter_map(|&i| source.header().get(i).cloned())
                    .collect(),
            ),
            rows,
            total: self.table.count(),
            selected_row,
            sort_column: self.sort_column.clone(),
            manual_sort: self.manual,
            wide: self.view_setting.wide,
            filter: self.config.filter.clone(),
            view,
            show_help: self.pages.is_top_dialog(),
            detail,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
            last_data_change: self.last_data_change,
        };
    }
}
