use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, trace};

use crate::chart::{Chart, ChartError, ChartKind, ChartSelection, build_chart};
use crate::domain::{
    AppConfig, MAX_COLUMNS, MAX_ROWS, MIN_COLUMNS, MIN_ROWS, RANDOM_MAX, RANDOM_MIN, TPError,
    default_column_name,
};
use crate::table::DataTable;

/// One user interaction, expressed as a change to the session state.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    SetRowCount(usize),
    SetColumnCount(usize),
    SetColumnName { column: usize, name: String },
    SetCell { row: usize, column: usize, value: i64 },
    RandomizeRow(usize),
    SelectChart(ChartKind),
    SelectScatterX(usize),
    SelectScatterY(usize),
    SelectPieColumn(usize),
}

/// Everything the UI needs to draw one interaction cycle.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub table: DataTable,
    pub table_text: String,
    pub selection: ChartSelection,
    pub chart: Result<Chart, ChartError>,
}

pub struct Session {
    num_rows: usize,
    num_cols: usize,
    column_names: Vec<String>,
    rows: BTreeMap<usize, Vec<i64>>,
    selection: ChartSelection,
    rng: StdRng,
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut session = Self {
            num_rows: 0,
            num_cols: 0,
            column_names: Vec::new(),
            rows: BTreeMap::new(),
            selection: ChartSelection::new(config.chart, config.columns),
            rng,
        };
        session.resize(config.rows, config.columns);
        if config.randomize {
            for row in 0..session.num_rows {
                session.randomize_row(row);
            }
        }
        session
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<i64> {
        self.rows.get(&row).and_then(|r| r.get(column)).copied()
    }

    pub fn selection(&self) -> &ChartSelection {
        &self.selection
    }

    // Rows currently backing the session, including any not yet reconciled
    #[cfg(test)]
    pub fn stored_rows(&self) -> usize {
        self.rows.len()
    }

    /// Clamp both counts, then bring every stored row and name in line with them.
    pub fn resize(&mut self, num_rows: usize, num_cols: usize) {
        let num_rows = num_rows.clamp(MIN_ROWS, MAX_ROWS);
        let num_cols = num_cols.clamp(MIN_COLUMNS, MAX_COLUMNS);
        if num_rows != self.num_rows || num_cols != self.num_cols {
            trace!(
                "Resize session r:{}->{}, c:{}->{}",
                self.num_rows, num_rows, self.num_cols, num_cols
            );
        }
        self.num_rows = num_rows;
        self.num_cols = num_cols;

        self.rows.retain(|&ridx, _| ridx < num_rows);
        for ridx in 0..num_rows {
            let row = self.rows.entry(ridx).or_default();
            Self::reconcile(row, num_cols);
        }

        self.column_names.truncate(num_cols);
        while self.column_names.len() < num_cols {
            let idx = self.column_names.len();
            self.column_names.push(default_column_name(idx));
        }

        self.selection.clamp(num_cols);
    }

    fn reconcile(row: &mut Vec<i64>, num_cols: usize) {
        if row.len() != num_cols {
            row.resize(num_cols, 0);
        }
    }

    pub fn randomize_row(&mut self, row: usize) {
        if row >= self.num_rows {
            return;
        }
        let values = (0..self.num_cols)
            .map(|_| self.rng.gen_range(RANDOM_MIN..=RANDOM_MAX))
            .collect::<Vec<i64>>();
        debug!("Randomized row {row}: {values:?}");
        self.rows.insert(row, values);
    }

    pub fn apply(&mut self, delta: Delta) {
        trace!("Apply {:?}", delta);
        match delta {
            Delta::SetRowCount(n) => self.resize(n, self.num_cols),
            Delta::SetColumnCount(n) => self.resize(self.num_rows, n),
            Delta::SetColumnName { column, name } => {
                if let Some(c) = self.column_names.get_mut(column) {
                    *c = name;
                }
            }
            Delta::SetCell { row, column, value } => {
                if row < self.num_rows
                    && let Some(cell) = self.rows.get_mut(&row).and_then(|r| r.get_mut(column))
                {
                    *cell = value;
                }
            }
            Delta::RandomizeRow(row) => self.randomize_row(row),
            Delta::SelectChart(kind) => self.selection.kind = kind,
            Delta::SelectScatterX(c) => {
                self.selection.scatter_x = c;
                self.selection.clamp(self.num_cols);
            }
            Delta::SelectScatterY(c) => {
                self.selection.scatter_y = c;
                self.selection.clamp(self.num_cols);
            }
            Delta::SelectPieColumn(c) => {
                self.selection.pie_column = c;
                self.selection.clamp(self.num_cols);
            }
        }
    }

    pub fn table(&self) -> DataTable {
        let rows = (0..self.num_rows)
            .map(|ridx| {
                let mut row = self.rows.get(&ridx).cloned().unwrap_or_default();
                Self::reconcile(&mut row, self.num_cols);
                row
            })
            .collect();
        DataTable::new(&self.column_names, rows)
    }

    pub fn render(&mut self) -> Result<RenderPayload, TPError> {
        let start_time = Instant::now();
        self.resize(self.num_rows, self.num_cols);

        let table = self.table();
        let table_text = table.render_text()?;
        let chart = build_chart(&table, &self.selection);
        if let Err(e) = &chart {
            debug!("No chart: {e}");
        }

        trace!(
            "Rendered {}x{} table in {}us",
            table.nrows(),
            table.ncols(),
            start_time.elapsed().as_micros()
        );
        Ok(RenderPayload {
            table,
            table_text,
            selection: self.selection,
            chart,
        })
    }
}
