use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, trace};

use crate::row::{EventKind, Row, RowEvent, Rows};

/// Identity keyed row events kept in display order.
///
/// The map holds the events, `order` holds the ids in the sequence they are shown.
/// Both are always kept in sync: every id in `order` has exactly one event whose
/// `row.id` equals the id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowEvents {
    events: HashMap<String, RowEvent>,
    order: Vec<String>,
}

impl RowEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(evts: impl IntoIterator<Item = RowEvent>) -> Self {
        let mut re = Self::new();
        for evt in evts {
            re.upsert(evt);
        }
        re
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.order.clear();
    }

    pub fn get(&self, id: &str) -> Option<&RowEvent> {
        self.events.get(id)
    }

    /// Event at a display position.
    pub fn at(&self, idx: usize) -> Option<&RowEvent> {
        self.order.get(idx).and_then(|id| self.events.get(id))
    }

    pub fn find_index(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|i| i == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowEvent> {
        self.order.iter().filter_map(|id| self.events.get(id))
    }

    /// Replaces the event for the row id in place or appends it.
    pub fn upsert(&mut self, evt: RowEvent) {
        let id = evt.row.id.clone();
        if self.events.insert(id.clone(), evt).is_none() {
            self.order.push(id);
        }
    }

    /// Reconciles the collection against a full snapshot.
    ///
    /// Known ids keep their position and become Unchanged or Update, unknown ids are
    /// appended as Add in snapshot order and ids missing from the snapshot are dropped.
    pub fn update(&mut self, rows: Rows) {
        let mut last = HashMap::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            last.insert(row.id.clone(), idx);
        }

        let mut events = HashMap::with_capacity(last.len());
        let mut added = Vec::new();
        for (idx, row) in rows.into_iter().enumerate() {
            if last.get(&row.id) != Some(&idx) {
                debug!("Duplicate row id {} in snapshot, keeping the last one", row.id);
                continue;
            }
            let evt = match self.events.get(&row.id) {
                Some(current) => current.reconcile(row),
                None => {
                    added.push(row.id.clone());
                    RowEvent::new(EventKind::Add, row)
                }
            };
            events.insert(evt.row.id.clone(), evt);
        }

        let mut order: Vec<String> = std::mem::take(&mut self.order)
            .into_iter()
            .filter(|id| events.contains_key(id))
            .collect();
        trace!(
            "Reconciled {} rows: {} kept, {} added, {} dropped",
            events.len(),
            order.len(),
            added.len(),
            self.events.len() - order.len()
        );
        order.extend(added);

        self.events = events;
        self.order = order;
    }

    /// Removes the given ids, survivors keep their event and relative order.
    pub fn delete(&mut self, ids: &HashSet<String>) {
        self.order.retain(|id| !ids.contains(id));
        self.events.retain(|id, _| !ids.contains(id));
    }

    /// True if ids, their order or any row fields differ. Kinds and deltas are ignored.
    pub fn diff(&self, other: &RowEvents) -> bool {
        if self.order != other.order {
            return true;
        }
        self.order.iter().any(|id| {
            match (self.events.get(id), other.events.get(id)) {
                (Some(a), Some(b)) => !a.row.same_fields(&b.row),
                _ => true,
            }
        })
    }

    /// Events ordered by the cell at `col`, ties keep display order.
    pub fn sorted(&self, col: usize, asc: bool) -> Vec<&RowEvent> {
        let mut evts: Vec<&RowEvent> = self.iter().collect();
        evts.sort_by(|a, b| compare_cells(cell(&a.row, col), cell(&b.row, col), asc));
        evts
    }
}

fn cell(row: &Row, col: usize) -> &str {
    row.fields.get(col).map(String::as_str).unwrap_or("")
}

// Numbers sort before ages and ages before plain strings, independent of the direction.
fn compare_cells(a: &str, b: &str, asc: bool) -> Ordering {
    let dir = |o: Ordering| if asc { o } else { o.reverse() };

    match (parse_number(a), parse_number(b)) {
        (Some(x), Some(y)) => dir(x.total_cmp(&y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => match (parse_age(a), parse_age(b)) {
            (Some(x), Some(y)) => dir(x.cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => dir(a.cmp(b)),
        },
    }
}

// "nan" or "inf" in a cell is text, not a number.
fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses ages as printed by kubectl, e.g. `45s`, `3m2s` or `2d4h`.
fn parse_age(s: &str) -> Option<Duration> {
    let mut total: u64 = 0;
    let mut value: u64 = 0;
    let mut has_value = false;
    let mut groups = 0;

    for c in s.chars() {
        if let Some(d) = c.to_digit(10) {
            value = value.checked_mul(10)?.checked_add(u64::from(d))?;
            has_value = true;
            continue;
        }
        if !has_value {
            return None;
        }
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            'y' => 365 * 24 * 60 * 60,
            _ => return None,
        };
        total = total.checked_add(value.checked_mul(unit)?)?;
        value = 0;
        has_value = false;
        groups += 1;
    }

    if has_value || groups == 0 {
        return None;
    }
    Some(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::DeltaRow;
    use proptest::prelude::*;

    fn evt(id: &str, fields: [&str; 3]) -> RowEvent {
        RowEvent::new(EventKind::Unchanged, Row::new(id, fields))
    }

    fn kind(k: EventKind, id: &str, fields: [&str; 3]) -> RowEvent {
        RowEvent::new(k, Row::new(id, fields))
    }

    fn abc() -> RowEvents {
        RowEvents::from_events([
            evt("A", ["1", "2", "3"]),
            evt("B", ["0", "2", "3"]),
            evt("C", ["10", "2", "3"]),
        ])
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn update() {
        use EventKind::*;

        let cases = [
            (
                "no-change",
                vec![
                    Row::new("A", ["1", "2", "3"]),
                    Row::new("B", ["0", "2", "3"]),
                    Row::new("C", ["10", "2", "3"]),
                ],
                RowEvents::from_events([
                    kind(Unchanged, "A", ["1", "2", "3"]),
                    kind(Unchanged, "B", ["0", "2", "3"]),
                    kind(Unchanged, "C", ["10", "2", "3"]),
                ]),
            ),
            (
                "add",
                vec![
                    Row::new("A", ["1", "2", "3"]),
                    Row::new("B", ["0", "2", "3"]),
                    Row::new("C", ["10", "2", "3"]),
                    Row::new("D", ["10", "2", "3"]),
                ],
                RowEvents::from_events([
                    kind(Unchanged, "A", ["1", "2", "3"]),
                    kind(Unchanged, "B", ["0", "2", "3"]),
                    kind(Unchanged, "C", ["10", "2", "3"]),
                    kind(Add, "D", ["10", "2", "3"]),
                ]),
            ),
            (
                "delete",
                vec![
                    Row::new("A", ["1", "2", "3"]),
                    Row::new("C", ["10", "2", "3"]),
                ],
                RowEvents::from_events([
                    kind(Unchanged, "A", ["1", "2", "3"]),
                    kind(Unchanged, "C", ["10", "2", "3"]),
                ]),
            ),
            (
                "update",
                vec![
                    Row::new("A", ["10", "2", "3"]),
                    Row::new("B", ["0", "2", "3"]),
                    Row::new("C", ["10", "2", "3"]),
                ],
                RowEvents::from_events([
                    RowEvent::with_deltas(
                        Row::new("A", ["10", "2", "3"]),
                        DeltaRow(vec!["1".into(), "".into(), "".into()]),
                    ),
                    kind(Unchanged, "B", ["0", "2", "3"]),
                    kind(Unchanged, "C", ["10", "2", "3"]),
                ]),
            ),
        ];

        for (name, rows, expected) in cases {
            let mut re = abc();
            re.update(rows);
            assert_eq!(re, expected, "case {name}");
        }
    }

    #[test]
    fn update_appends_new_rows_after_retained_ones() {
        let mut re = abc();
        re.update(vec![
            Row::new("D", ["4", "4", "4"]),
            Row::new("C", ["10", "2", "3"]),
            Row::new("E", ["5", "5", "5"]),
            Row::new("A", ["1", "2", "3"]),
        ]);
        assert_eq!(re.ids(), ["A", "C", "D", "E"]);
        assert_eq!(re.get("D").map(|e| e.kind), Some(EventKind::Add));
        assert_eq!(re.get("E").map(|e| e.kind), Some(EventKind::Add));
    }

    #[test]
    fn update_twice_settles() {
        let rows = vec![
            Row::new("A", ["10", "2", "3"]),
            Row::new("D", ["1", "1", "1"]),
        ];
        let mut re = abc();
        re.update(rows.clone());
        assert_eq!(re.get("A").map(|e| e.kind), Some(EventKind::Update));
        re.update(rows);
        assert!(re.iter().all(|e| e.kind == EventKind::Unchanged));
        assert!(re.iter().all(|e| e.deltas.0.is_empty()));
    }

    #[test]
    fn duplicate_ids_last_one_wins() {
        let mut re = RowEvents::new();
        re.update(vec![
            Row::new("A", ["1", "1", "1"]),
            Row::new("B", ["2", "2", "2"]),
            Row::new("A", ["3", "3", "3"]),
        ]);
        assert_eq!(re.len(), 2);
        assert_eq!(re.ids(), ["B", "A"]);
        assert_eq!(re.get("A").map(|e| e.row.fields.clone()), Some(vec!["3".to_string(); 3]));
    }

    #[test]
    fn delete() {
        let cases = [
            ("ordered", abc(), set(&["A", "C"]), vec!["B"]),
            (
                "unordered",
                RowEvents::from_events([
                    evt("A", ["1", "2", "3"]),
                    evt("B", ["0", "2", "3"]),
                    evt("C", ["10", "2", "3"]),
                    evt("D", ["10", "2", "3"]),
                ]),
                set(&["C", "A"]),
                vec!["B", "D"],
            ),
            ("missing", abc(), set(&["Z"]), vec!["A", "B", "C"]),
        ];

        for (name, mut re, ids, expected) in cases {
            re.delete(&ids);
            assert_eq!(re.ids(), expected.as_slice(), "case {name}");
            assert_eq!(re.len(), expected.len(), "case {name}");
        }
    }

    #[test]
    fn delete_keeps_event_metadata() {
        let mut re = abc();
        re.update(vec![
            Row::new("A", ["9", "2", "3"]),
            Row::new("B", ["0", "2", "3"]),
            Row::new("D", ["1", "1", "1"]),
        ]);
        re.delete(&set(&["B"]));
        assert_eq!(re.ids(), ["A", "D"]);
        assert_eq!(re.at(0).map(|e| e.kind), Some(EventKind::Update));
        assert_eq!(re.at(1).map(|e| e.kind), Some(EventKind::Add));
    }

    #[test]
    fn upsert_and_lookup() {
        let mut re = abc();
        re.upsert(kind(EventKind::Update, "B", ["7", "7", "7"]));
        re.upsert(evt("Z", ["0", "0", "0"]));
        assert_eq!(re.ids(), ["A", "B", "C", "Z"]);
        assert_eq!(re.find_index("C"), Some(2));
        assert_eq!(re.find_index("X"), None);
        assert_eq!(re.get("B").map(|e| e.kind), Some(EventKind::Update));
        re.clear();
        assert!(re.is_empty());
    }

    #[test]
    fn diff_ignores_kinds() {
        let mut other = abc();
        other.upsert(kind(EventKind::Add, "A", ["1", "2", "3"]));
        assert!(!abc().diff(&other));

        other.upsert(evt("A", ["1", "2", "4"]));
        assert!(abc().diff(&other));

        let mut reordered = RowEvents::from_events([
            evt("B", ["0", "2", "3"]),
            evt("A", ["1", "2", "3"]),
            evt("C", ["10", "2", "3"]),
        ]);
        assert!(abc().diff(&reordered));
        reordered.delete(&set(&["B"]));
        assert!(abc().diff(&reordered));
    }

    #[test]
    fn sorted_by_value() {
        let re = abc();
        let ids = |evts: Vec<&RowEvent>| {
            evts.iter()
                .map(|e| e.row.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(re.sorted(0, true)), ["B", "A", "C"]);
        assert_eq!(ids(re.sorted(0, false)), ["C", "A", "B"]);
        // Ties keep display order.
        assert_eq!(ids(re.sorted(1, false)), ["A", "B", "C"]);
        // Out of range columns compare as empty cells.
        assert_eq!(ids(re.sorted(9, true)), ["A", "B", "C"]);
    }

    #[test]
    fn compare_cells_by_kind() {
        assert_eq!(compare_cells("2", "10", true), Ordering::Less);
        assert_eq!(compare_cells("2", "10", false), Ordering::Greater);
        assert_eq!(compare_cells("5", "abc", false), Ordering::Less);
        assert_eq!(compare_cells("2m", "90s", true), Ordering::Greater);
        assert_eq!(compare_cells("1d", "25h", true), Ordering::Less);
        assert_eq!(compare_cells("3h", "Running", true), Ordering::Less);
        assert_eq!(compare_cells("Pending", "Running", false), Ordering::Greater);
    }

    #[test]
    fn non_finite_cells_sort_as_text() {
        let mut re = RowEvents::new();
        re.update(
            (0..64)
                .map(|i| {
                    let value = if i % 3 == 0 {
                        "nan".to_string()
                    } else {
                        (64 - i).to_string()
                    };
                    Row::new(format!("r{i}"), [value])
                })
                .collect(),
        );

        let sorted = re.sorted(0, true);
        let cells: Vec<&str> = sorted.iter().map(|e| e.row.fields[0].as_str()).collect();
        let numbers: Vec<f64> = cells.iter().filter_map(|c| parse_number(c)).collect();
        assert_eq!(numbers.len(), 42);
        assert!(numbers.windows(2).all(|w| w[0] <= w[1]));
        assert!(cells[42..].iter().all(|c| *c == "nan"));

        assert_eq!(compare_cells("inf", "1", true), Ordering::Greater);
        assert_eq!(compare_cells("NaN", "infinity", true), Ordering::Less);
    }

    #[test]
    fn parse_age() {
        assert_eq!(super::parse_age("45s"), Some(Duration::from_secs(45)));
        assert_eq!(super::parse_age("3m2s"), Some(Duration::from_secs(182)));
        assert_eq!(
            super::parse_age("2d4h"),
            Some(Duration::from_secs(2 * 86400 + 4 * 3600))
        );
        assert_eq!(super::parse_age("10"), None);
        assert_eq!(super::parse_age("m"), None);
        assert_eq!(super::parse_age("<unknown>"), None);
        assert_eq!(super::parse_age(""), None);
    }

    fn snapshot() -> impl Strategy<Value = Rows> {
        prop::collection::vec(
            ("[a-f]", prop::collection::vec("[0-9]{1,2}", 3)),
            0..12,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .map(|(id, fields)| Row { id, fields })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn update_is_idempotent(first in snapshot(), second in snapshot()) {
            let mut re = RowEvents::new();
            re.update(first);
            re.update(second.clone());
            let ids = re.ids().to_vec();
            re.update(second);
            prop_assert!(re.iter().all(|e| e.kind == EventKind::Unchanged));
            prop_assert_eq!(re.ids(), ids.as_slice());
        }

        #[test]
        fn delete_preserves_survivor_order(
            rows in snapshot(),
            doomed in prop::collection::hash_set("[a-f]", 0..6),
        ) {
            let mut re = RowEvents::new();
            re.update(rows);
            let expected: Vec<String> = re
                .ids()
                .iter()
                .filter(|id| !doomed.contains(*id))
                .cloned()
                .collect();
            re.delete(&doomed);
            prop_assert_eq!(re.ids(), expected.as_slice());
            prop_assert!(re.iter().all(|e| !doomed.contains(&e.row.id)));
        }
    }
}
