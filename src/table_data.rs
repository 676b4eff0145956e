use std::collections::HashSet;
use std::fmt;

use derive_setters::Setters;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::header::Header;
use crate::row::{RowEvent, Rows};
use crate::row_events::RowEvents;

/// Opaque tag for the kind of resource a table lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Gvr(String);

impl Gvr {
    pub fn new(gvr: impl Into<String>) -> Self {
        Gvr(gvr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column the rows are ordered by. An empty name means no sorting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortColumn {
    pub name: String,
    pub asc: bool,
}

impl SortColumn {
    pub fn new(name: impl Into<String>, asc: bool) -> Self {
        Self {
            name: name.into(),
            asc,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.name.is_empty()
    }
}

/// User view preferences for a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Setters)]
#[setters(prefix = "with_")]
pub struct ViewSetting {
    /// Column whitelist in display order. Empty shows the default columns.
    pub columns: Vec<String>,
    /// Sort request as `NAME:asc` or `NAME:desc`, descending when no direction is given.
    #[setters(into)]
    pub sort_column: String,
    /// Wide mode also displays columns flagged as wide.
    pub wide: bool,
}

impl ViewSetting {
    /// Parses the sort request. Returns `None` when nothing or something malformed was asked for.
    pub fn sort_col(&self) -> Option<(&str, bool)> {
        let spec = self.sort_column.trim();
        if spec.is_empty() {
            return None;
        }
        let (name, dir) = match spec.split_once(':') {
            Some((name, dir)) => (name.trim(), dir.trim()),
            None => (spec, ""),
        };
        if name.is_empty() {
            return None;
        }
        let asc = match dir.to_ascii_lowercase().as_str() {
            "asc" => true,
            "" | "desc" => false,
            other => {
                debug!("Ignoring sort spec {spec:?} with unknown direction {other:?}");
                return None;
            }
        };
        Some((name, asc))
    }
}

/// A resource table: schema plus reconciled rows, scoped to a namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableData {
    gvr: Gvr,
    namespace: String,
    header: Header,
    row_events: RowEvents,
}

impl TableData {
    pub fn new(gvr: Gvr) -> Self {
        Self {
            gvr,
            ..Self::default()
        }
    }

    pub fn with_rows(gvr: Gvr, header: Header, row_events: RowEvents) -> Self {
        Self::full(gvr, "", header, row_events)
    }

    pub fn full(
        gvr: Gvr,
        namespace: impl Into<String>,
        header: Header,
        row_events: RowEvents,
    ) -> Self {
        Self {
            gvr,
            namespace: namespace.into(),
            header,
            row_events,
        }
    }

    pub fn gvr(&self) -> &Gvr {
        &self.gvr
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn set_header(&mut self, header: Header) {
        self.header = header;
    }

    pub fn row_events(&self) -> &RowEvents {
        &self.row_events
    }

    pub fn set_row_events(&mut self, row_events: RowEvents) {
        self.row_events = row_events;
    }

    pub fn count(&self) -> usize {
        self.row_events.len()
    }

    pub fn header_count(&self) -> usize {
        self.header.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_events.is_empty()
    }

    /// Drops header and rows and rescopes the table.
    pub fn reset(&mut self, namespace: impl Into<String>) {
        self.namespace = namespace.into();
        self.header = Header::default();
        self.row_events.clear();
    }

    pub fn update(&mut self, rows: Rows) {
        self.row_events.update(rows);
    }

    pub fn delete(&mut self, ids: &HashSet<String>) {
        self.row_events.delete(ids);
    }

    /// Returns true when `other` is observably different: namespace, header, row ids,
    /// row order or any cell value. A missing table always differs.
    pub fn diff(&self, other: Option<&TableData>) -> bool {
        let Some(other) = other else {
            return true;
        };
        self.namespace != other.namespace
            || self.header != other.header
            || self.row_events.diff(&other.row_events)
    }

    /// Header indices the view displays, in display order.
    pub fn display_indices(&self, vs: &ViewSetting) -> Vec<usize> {
        self.header.map_indices(&vs.columns, vs.wide)
    }

    /// Resolves the column the view is sorted by.
    ///
    /// A manual choice is kept as is. Otherwise the view setting request is used if it
    /// names a displayed column; without a request the previous choice survives as long
    /// as it is still displayed. Anything else disables sorting.
    pub fn compute_sort_col(&self, vs: &ViewSetting, sc: SortColumn, manual: bool) -> SortColumn {
        if manual {
            return sc;
        }

        let displayed = self.display_indices(vs);
        let is_displayed = |name: &str| {
            displayed
                .iter()
                .filter_map(|&i| self.header.get(i))
                .any(|c| c.name == name)
        };

        match vs.sort_col() {
            Some((name, asc)) if is_displayed(name) => SortColumn::new(name, asc),
            Some((name, _)) => {
                trace!("Sort column {name} is not displayed");
                SortColumn::default()
            }
            None if sc.is_active() && is_displayed(&sc.name) => sc,
            None => SortColumn::default(),
        }
    }

    /// Row events in the order the sort column asks for.
    pub fn sorted_events(&self, sc: &SortColumn) -> Vec<&RowEvent> {
        match self
            .header
            .index_of(&sc.name, true)
            .filter(|_| sc.is_active())
        {
            Some(col) => self.row_events.sorted(col, sc.asc),
            None => self.row_events.iter().collect(),
        }
    }

    /// Keeps rows with a cell containing `term`, ignoring case. A leading `!` inverts the match.
    pub fn filter(&self, term: &str) -> TableData {
        let (inverse, term) = match term.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, term),
        };
        if term.is_empty() {
            return self.clone();
        }
        let needle = term.to_lowercase();

        let evts: Vec<&RowEvent> = self.row_events.iter().collect();
        let kept: Vec<RowEvent> = evts
            .par_iter()
            .filter(|e| {
                let hit = e.row.fields.iter().any(|f| f.to_lowercase().contains(&needle));
                hit != inverse
            })
            .map(|e| RowEvent::clone(e))
            .collect();
        trace!("Filter {term:?} kept {}/{} rows", kept.len(), evts.len());

        TableData {
            gvr: self.gvr.clone(),
            namespace: self.namespace.clone(),
            header: self.header.clone(),
            row_events: RowEvents::from_events(kept),
        }
    }
}
