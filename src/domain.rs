use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;

use crate::table_data::{Gvr, ViewSetting};

pub const HELP_TEXT: &str = "\
Navigation
  j / Down        move down
  k / Up          move up
  PgDn / PgUp     page down / up
  g / G           first / last row
  Enter           row details
  Esc             back

View
  w               toggle wide columns
  < / >           sort by previous / next column
  o               flip sort order
  r               reset sort to view settings
  c               copy row id to clipboard

  ?               this help
  q               quit";

#[derive(Debug)]
pub enum RTVError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    MissingColumn(String),
    PathExpansion(String),
}

impl fmt::Display for RTVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RTVError::IoError(e) => write!(f, "io error: {e}"),
            RTVError::PolarsError(e) => write!(f, "failed to read data: {e}"),
            RTVError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            RTVError::FileNotFound => write!(f, "file not found"),
            RTVError::PermissionDenied => write!(f, "permission denied"),
            RTVError::UnknownFileType => write!(f, "unknown file type"),
            RTVError::MissingColumn(name) => write!(f, "column {name:?} not found"),
            RTVError::PathExpansion(msg) => write!(f, "cannot expand path: {msg}"),
        }
    }
}

impl std::error::Error for RTVError {}

impl From<Error> for RTVError {
    fn from(err: Error) -> Self {
        RTVError::IoError(err)
    }
}

impl From<PolarsError> for RTVError {
    fn from(err: PolarsError) -> Self {
        RTVError::PolarsError(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Enter,
    Exit,
    Help,
    ToggleWide,
    SortNextColumn,
    SortPreviousColumn,
    FlipSortOrder,
    ResetSort,
    CopyRowId,
    Resize(usize, usize),
}

/// Runtime settings of the viewer, built from the command line.
#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct RTVConfig {
    pub path: PathBuf,
    pub gvr: Gvr,
    #[setters(into)]
    pub namespace: String,
    pub id_column: Option<String>,
    pub wide_columns: Vec<String>,
    pub view: ViewSetting,
    #[setters(into)]
    pub filter: String,
    pub refresh_ms: u64,
    pub event_poll_time: u64,
    pub log_file: PathBuf,
}

impl Default for RTVConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            gvr: Gvr::default(),
            namespace: String::new(),
            id_column: None,
            wide_columns: Vec::new(),
            view: ViewSetting::default(),
            filter: String::new(),
            refresh_ms: 2000,
            event_poll_time: 100,
            log_file: PathBuf::from("rtv.log"),
        }
    }
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(path: &str) -> Result<PathBuf, RTVError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| RTVError::PathExpansion(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_plain_path() {
        assert_eq!(expand_path("data/pods.csv").unwrap(), PathBuf::from("data/pods.csv"));
    }

    #[test]
    fn expand_unknown_variable_fails() {
        let err = expand_path("$RTV_SURELY_NOT_SET_VARIABLE/pods.csv").unwrap_err();
        assert!(matches!(err, RTVError::PathExpansion(_)));
    }

    #[test]
    fn config_setters() {
        let cfg = RTVConfig::default()
            .with_namespace("kube-system")
            .with_refresh_ms(500);
        assert_eq!(cfg.namespace, "kube-system");
        assert_eq!(cfg.refresh_ms, 500);
        assert_eq!(cfg.event_poll_time, 100);
    }
}
