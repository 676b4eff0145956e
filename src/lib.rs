//! Live resource tables for the terminal.
//!
//! The core is the reconciliation engine in [`row_events`] and [`table_data`]: each new
//! snapshot of rows is compared against the rows already shown, every row is tagged as
//! added, updated or unchanged and changed cells keep their previous value. The other
//! modules are the terminal front end driving it.

pub mod controller;
pub mod domain;
pub mod header;
pub mod model;
pub mod row;
pub mod row_events;
pub mod stack;
pub mod table_data;
pub mod ui;
pub mod watcher;
