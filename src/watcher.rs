use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, error, info, trace};

use crate::domain::{RTVConfig, RTVError};
use crate::header::{Header, HeaderColumn};
use crate::row::{Row, Rows};

/// Column holding the namespace of a resource, if the data has one.
pub const NAMESPACE_COLUMN: &str = "NAMESPACE";
pub const NULL_VALUE: &str = "<none>";

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

/// One complete view of the resources at a point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub header: Header,
    pub rows: Rows,
}

/// A column materialized as display strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: Vec<String>,
}

/// Reads snapshots from a tabular file.
#[derive(Debug)]
pub struct SnapshotSource {
    path: PathBuf,
    file_type: FileType,
    id_column: Option<String>,
    namespace: String,
    wide_columns: Vec<String>,
    stamp: Option<(SystemTime, u64)>,
}

impl SnapshotSource {
    pub fn new(cfg: &RTVConfig) -> Result<Self, RTVError> {
        let file_type = detect_file_type(&cfg.path)?;
        file_stamp(&cfg.path)?;
        Ok(Self {
            path: cfg.path.clone(),
            file_type,
            id_column: cfg.id_column.clone(),
            namespace: cfg.namespace.clone(),
            wide_columns: cfg.wide_columns.clone(),
            stamp: None,
        })
    }

    /// Loads the file if it changed since the last successful load.
    pub fn load(&mut self) -> Result<Option<Snapshot>, RTVError> {
        let stamp = file_stamp(&self.path)?;
        if self.stamp == Some(stamp) {
            trace!("{} unchanged, skipping load", self.path.display());
            return Ok(None);
        }
        let snapshot = self.read()?;
        self.stamp = Some(stamp);
        Ok(Some(snapshot))
    }

    fn read(&self) -> Result<Snapshot, RTVError> {
        let start_time = Instant::now();
        let frame = match self.file_type {
            FileType::CSV => load_csv(&self.path)?,
            FileType::PARQUET => load_parquet(&self.path)?,
            FileType::ARROW => load_arrow(&self.path)?,
        };

        // Each column is converted in its own rayon task.
        let df = frame.collect()?;
        let columns = df
            .get_column_names()
            .par_iter()
            .map(|name| load_column(&df, name))
            .collect::<Result<Vec<Column>, PolarsError>>()?;

        let snapshot = build_snapshot(
            columns,
            self.id_column.as_deref(),
            &self.namespace,
            &self.wide_columns,
        )?;
        debug!(
            "Loaded {} rows from {} in {}ms",
            snapshot.rows.len(),
            self.path.display(),
            start_time.elapsed().as_millis()
        );
        Ok(snapshot)
    }
}

/// Turns columns into a header and id keyed rows.
///
/// The id comes from `id_column` or the first column. With a namespace column the id
/// is `namespace/id` and a non empty `namespace` drops rows of other namespaces.
pub fn build_snapshot(
    columns: Vec<Column>,
    id_column: Option<&str>,
    namespace: &str,
    wide_columns: &[String],
) -> Result<Snapshot, RTVError> {
    if columns.is_empty() {
        return Ok(Snapshot::default());
    }

    let header = Header(
        columns
            .iter()
            .map(|c| {
                if wide_columns.contains(&c.name) {
                    HeaderColumn::wide(c.name.clone())
                } else {
                    HeaderColumn::new(c.name.clone())
                }
            })
            .collect(),
    );

    let id_idx = match id_column {
        Some(name) => header
            .index_of(name, true)
            .ok_or_else(|| RTVError::MissingColumn(name.to_string()))?,
        None => 0,
    };
    let ns_idx = header.index_of(NAMESPACE_COLUMN, true);

    let nrows = columns.iter().map(|c| c.data.len()).min().unwrap_or(0);
    let mut rows = Vec::with_capacity(nrows);
    for r in 0..nrows {
        let id = &columns[id_idx].data[r];
        let id = match ns_idx.map(|i| &columns[i].data[r]) {
            Some(ns) if !namespace.is_empty() && ns != namespace => continue,
            Some(ns) => format!("{ns}/{id}"),
            None => id.clone(),
        };
        rows.push(Row {
            id,
            fields: columns.iter().map(|c| c.data[r].clone()).collect(),
        });
    }

    Ok(Snapshot { header, rows })
}

/// Background producer polling a snapshot source.
pub struct Watcher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Watcher {
    /// Starts polling. Snapshots and load errors arrive on the returned receiver.
    pub fn spawn(
        mut source: SnapshotSource,
        interval: Duration,
    ) -> (Self, Receiver<Result<Snapshot, RTVError>>) {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = stop.clone();

        let handle = thread::spawn(move || {
            info!("Watching {} every {}ms", source.path.display(), interval.as_millis());
            while !stopped.load(Ordering::Relaxed) {
                let msg = match source.load() {
                    Ok(Some(snapshot)) => Some(Ok(snapshot)),
                    Ok(None) => None,
                    Err(e) => {
                        error!("Loading {} failed: {e}", source.path.display());
                        Some(Err(e))
                    }
                };
                if let Some(msg) = msg
                    && tx.send(msg).is_err()
                {
                    break;
                }
                thread::sleep(interval);
            }
            debug!("Watcher stopped");
        });

        (
            Self { stop, handle },
            rx,
        )
    }

    /// True once the polling thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// The thread may be mid sleep, it is detached rather than joined.
impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn detect_file_type(path: &Path) -> Result<FileType, RTVError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(RTVError::UnknownFileType),
    }
}

fn file_stamp(path: &Path) -> Result<(SystemTime, u64), RTVError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RTVError::FileNotFound,
        ErrorKind::PermissionDenied => RTVError::PermissionDenied,
        _ => RTVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(RTVError::LoadingFailed("Not a file!".into()));
    }
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    Ok((modified, metadata.len()))
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<Column, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| match value {
            Some(s) => s.replace("\r\n", " ↵ ").replace('\n', " ↵ "),
            None => NULL_VALUE.to_string(),
        })
        .collect();

    Ok(Column {
        name: col_name.to_string(),
        data,
    })
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}
