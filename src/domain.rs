use std::io::Error;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::chart::ChartKind;

pub const MIN_ROWS: usize = 1;
pub const MAX_ROWS: usize = 20;
pub const DEFAULT_ROWS: usize = 6;

pub const MIN_COLUMNS: usize = 1;
pub const MAX_COLUMNS: usize = 5;
pub const DEFAULT_COLUMNS: usize = 4;

// Inclusive range used by the randomize action
pub const RANDOM_MIN: i64 = 1;
pub const RANDOM_MAX: i64 = 50;

pub fn default_column_name(idx: usize) -> String {
    format!("Column_{}", idx + 1)
}

#[derive(Debug)]
pub enum TPError {
    IoError(Error),
    PolarsError(PolarsError),
    InvalidLogFile(String),
}

impl From<Error> for TPError {
    fn from(err: Error) -> Self {
        TPError::IoError(err)
    }
}

impl From<PolarsError> for TPError {
    fn from(err: PolarsError) -> Self {
        TPError::PolarsError(err)
    }
}

/// Startup configuration, assembled from the command line in `main`.
#[derive(Debug, Clone, Setters)]
pub struct AppConfig {
    pub rows: usize,
    pub columns: usize,
    pub chart: ChartKind,
    pub seed: Option<u64>,
    pub randomize: bool,
    pub event_poll_time: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            columns: DEFAULT_COLUMNS,
            chart: ChartKind::GroupedBar,
            seed: None,
            randomize: false,
            event_poll_time: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    NextField,
    PrevField,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Increment,
    Decrement,
    Enter,
    Exit,
    Randomize,
    CopyTable,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "
Navigation
  Tab / Shift-Tab   next / previous field
  Arrows            move inside a field
  + / - / ← / →     change count or cycle selection

Editing
  Enter             edit column name or cell (Enter to commit, Esc to abort)
  r                 fill the selected row with random values in [1, 50]
  y                 copy the table as CSV to the clipboard

General
  ?                 show this help
  Esc               close popup
  q                 quit
";
