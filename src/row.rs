/// Cell values of a row, positionally aligned with the table header.
pub type Fields = Vec<String>;

/// A full snapshot of rows as handed over by a producer.
pub type Rows = Vec<Row>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub id: String,
    pub fields: Fields,
}

impl Row {
    pub fn new<S: Into<String>>(
        id: impl Into<String>,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            id: id.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Positional comparison. Rows of different length never match.
    pub fn same_fields(&self, other: &Row) -> bool {
        self.fields == other.fields
    }

    /// Projects the fields onto the given column indices. Out of range indices yield "".
    pub fn customize(&self, indices: &[usize]) -> Row {
        Row {
            id: self.id.clone(),
            fields: project(&self.fields, indices),
        }
    }
}

/// Previous values of the cells that changed in an update, "" for untouched cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaRow(pub Vec<String>);

impl DeltaRow {
    /// Builds the deltas between an old and a new set of fields.
    ///
    /// The result has the length of `new`. Positions beyond the old fields had no
    /// previous value and stay empty.
    pub fn diff(old: &[String], new: &[String]) -> Self {
        DeltaRow(
            new.iter()
                .enumerate()
                .map(|(i, n)| match old.get(i) {
                    Some(o) if o != n => o.clone(),
                    _ => String::new(),
                })
                .collect(),
        )
    }

    pub fn is_blank(&self) -> bool {
        self.0.iter().all(String::is_empty)
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).map(String::as_str).filter(|s| !s.is_empty())
    }

    pub fn customize(&self, indices: &[usize]) -> DeltaRow {
        if self.0.is_empty() {
            return DeltaRow::default();
        }
        DeltaRow(project(&self.0, indices))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventKind {
    #[default]
    Unchanged,
    Add,
    Update,
    /// Not produced by reconciliation, removed rows are dropped instead.
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowEvent {
    pub kind: EventKind,
    pub row: Row,
    pub deltas: DeltaRow,
}

impl RowEvent {
    pub fn new(kind: EventKind, row: Row) -> Self {
        Self {
            kind,
            row,
            deltas: DeltaRow::default(),
        }
    }

    pub fn with_deltas(row: Row, deltas: DeltaRow) -> Self {
        Self {
            kind: EventKind::Update,
            row,
            deltas,
        }
    }

    /// Classifies `new` against the event currently held for the same ID.
    pub fn reconcile(&self, new: Row) -> RowEvent {
        if self.row.same_fields(&new) {
            RowEvent::new(EventKind::Unchanged, new)
        } else {
            let deltas = DeltaRow::diff(&self.row.fields, &new.fields);
            RowEvent::with_deltas(new, deltas)
        }
    }

    pub fn customize(&self, indices: &[usize]) -> RowEvent {
        RowEvent {
            kind: self.kind,
            row: self.row.customize(indices),
            deltas: self.deltas.customize(indices),
        }
    }
}

fn project(values: &[String], indices: &[usize]) -> Vec<String> {
    indices
        .iter()
        .map(|&i| values.get(i).cloned().unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_unchanged() {
        let old = RowEvent::new(EventKind::Add, Row::new("A", ["1", "2", "3"]));
        let evt = old.reconcile(Row::new("A", ["1", "2", "3"]));
        assert_eq!(evt.kind, EventKind::Unchanged);
        assert!(evt.deltas.is_blank());
        assert!(evt.deltas.0.is_empty());
    }

    #[test]
    fn reconcile_update_keeps_old_values() {
        let old = RowEvent::new(EventKind::Unchanged, Row::new("A", ["1", "2", "3"]));
        let evt = old.reconcile(Row::new("A", ["10", "2", "30"]));
        assert_eq!(evt.kind, EventKind::Update);
        assert_eq!(evt.row, Row::new("A", ["10", "2", "30"]));
        assert_eq!(evt.deltas, DeltaRow(vec!["1".into(), "".into(), "3".into()]));
        assert_eq!(evt.deltas.get(0), Some("1"));
        assert_eq!(evt.deltas.get(1), None);
    }

    #[test]
    fn length_mismatch_is_an_update() {
        let old = RowEvent::new(EventKind::Unchanged, Row::new("A", ["1", "2"]));
        let evt = old.reconcile(Row::new("A", ["1", "2", "3"]));
        assert_eq!(evt.kind, EventKind::Update);
        assert_eq!(evt.deltas.0.len(), 3);
        assert!(evt.deltas.is_blank());

        let evt = old.reconcile(Row::new("A", ["1"]));
        assert_eq!(evt.kind, EventKind::Update);
        assert_eq!(evt.deltas, DeltaRow(vec!["".into()]));
    }

    #[test]
    fn customize_projects_row_and_deltas() {
        let evt = RowEvent::with_deltas(
            Row::new("A", ["10", "2", "3"]),
            DeltaRow(vec!["1".into(), "".into(), "".into()]),
        );
        let c = evt.customize(&[2, 0, 7]);
        assert_eq!(c.row.fields, vec!["3", "10", ""]);
        assert_eq!(c.deltas, DeltaRow(vec!["".into(), "1".into(), "".into()]));
        assert_eq!(c.kind, EventKind::Update);

        let plain = RowEvent::new(EventKind::Add, Row::new("B", ["x"]));
        assert!(plain.customize(&[0]).deltas.0.is_empty());
    }
}
