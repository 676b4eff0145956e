use tracing::trace;

/// Display attributes of a header column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attrs {
    /// Only shown when the view is in wide mode.
    pub wide: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderColumn {
    pub name: String,
    pub attrs: Attrs,
}

impl HeaderColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Attrs::default(),
        }
    }

    pub fn wide(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Attrs { wide: true },
        }
    }
}

/// Ordered column schema of a table. Column names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header(pub Vec<HeaderColumn>);

impl Header {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderColumn> {
        self.0.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&HeaderColumn> {
        self.0.get(idx)
    }

    /// Position of the named column. Wide columns are only found when `include_wide` is set.
    pub fn index_of(&self, name: &str, include_wide: bool) -> Option<usize> {
        self.0
            .iter()
            .position(|c| c.name == name && (include_wide || !c.attrs.wide))
    }

    /// Names of the columns shown by default, or all of them in wide mode.
    pub fn columns(&self, wide: bool) -> Vec<String> {
        self.0
            .iter()
            .filter(|c| wide || !c.attrs.wide)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Header indices to display for a column whitelist.
    ///
    /// An empty whitelist selects every non-wide column (every column in wide mode).
    /// Otherwise the whitelist order wins and unknown names are skipped; listed wide
    /// columns are kept regardless of the mode. In wide mode the remaining wide columns
    /// are appended.
    pub fn map_indices(&self, cols: &[String], wide: bool) -> Vec<usize> {
        if cols.is_empty() {
            return (0..self.0.len())
                .filter(|&i| wide || !self.0[i].attrs.wide)
                .collect();
        }

        let mut indices = Vec::with_capacity(cols.len());
        for col in cols {
            match self.index_of(col, true) {
                Some(idx) if !indices.contains(&idx) => indices.push(idx),
                Some(_) => {}
                None => trace!("Skipping unknown column {col}"),
            }
        }
        if wide {
            for (idx, c) in self.0.iter().enumerate() {
                if c.attrs.wide && !indices.contains(&idx) {
                    indices.push(idx);
                }
            }
        }
        indices
    }

    /// Projects the header onto the columns selected by `map_indices`.
    pub fn customize(&self, cols: &[String], wide: bool) -> Header {
        Header(
            self.map_indices(cols, wide)
                .into_iter()
                .map(|i| self.0[i].clone())
                .collect(),
        )
    }
}

impl From<Vec<HeaderColumn>> for Header {
    fn from(cols: Vec<HeaderColumn>) -> Self {
        Header(cols)
    }
}
