//! Chart construction: chart kind, column selections and the four chart builders.
//!
//! Every builder reads its data from the polars `DataFrame` assembled from the
//! session table. The result is a plain data description that the UI renders.

use std::fmt;

use clap::ValueEnum;
use polars::prelude::*;
use ratatui::style::Color;
use tracing::trace;

use crate::table::DataTable;

pub const SAME_AXIS_MESSAGE: &str = "Please select two different columns for the scatter plot.";
pub const HEATMAP_TITLE: &str = "Correlation Matrix Heatmap";
pub const BAR_X_LABEL: &str = "Rows";

/// Qualitative Set1 palette, used after the first (red) pie slice.
const SET1: [Color; 9] = [
    Color::Rgb(0xE4, 0x1A, 0x1C),
    Color::Rgb(0x37, 0x7E, 0xB8),
    Color::Rgb(0x4D, 0xAF, 0x4A),
    Color::Rgb(0x98, 0x4E, 0xA3),
    Color::Rgb(0xFF, 0x7F, 0x00),
    Color::Rgb(0xFF, 0xFF, 0x33),
    Color::Rgb(0xA6, 0x56, 0x28),
    Color::Rgb(0xF7, 0x81, 0xBF),
    Color::Rgb(0x99, 0x99, 0x99),
];
const PIE_FIRST: Color = Color::Rgb(0xFF, 0x00, 0x00);

/// Diverging red to blue scale, evenly spaced over [-1, 1].
const RDBU: [(u8, u8, u8); 11] = [
    (103, 0, 31),
    (178, 24, 43),
    (214, 96, 77),
    (244, 165, 130),
    (253, 219, 199),
    (247, 247, 247),
    (209, 229, 240),
    (146, 197, 222),
    (67, 147, 195),
    (33, 102, 172),
    (5, 48, 97),
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChartKind {
    #[default]
    #[value(name = "bar")]
    GroupedBar,
    #[value(name = "scatter")]
    Scatter,
    #[value(name = "pie")]
    Pie,
    #[value(name = "heatmap")]
    Heatmap,
}

impl ChartKind {
    pub const ALL: [Self; 4] = [Self::GroupedBar, Self::Scatter, Self::Pie, Self::Heatmap];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GroupedBar => "Grouped Bar Chart",
            Self::Scatter => "Scatter Plot",
            Self::Pie => "Pie Chart",
            Self::Heatmap => "Correlation Matrix Heatmap",
        }
    }

    fn position(self) -> usize {
        Self::ALL.iter().position(|&k| k == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Number of column selectors shown for this chart kind.
    pub fn axis_count(self) -> usize {
        match self {
            Self::Scatter => 2,
            Self::Pie => 1,
            Self::GroupedBar | Self::Heatmap => 0,
        }
    }
}

/// Which chart to draw and which columns (by index) feed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSelection {
    pub kind: ChartKind,
    pub scatter_x: usize,
    pub scatter_y: usize,
    pub pie_column: usize,
}

impl ChartSelection {
    pub fn new(kind: ChartKind, ncols: usize) -> Self {
        let mut selection = Self {
            kind,
            scatter_x: 0,
            scatter_y: 1,
            pie_column: 0,
        };
        selection.clamp(ncols);
        selection
    }

    pub fn clamp(&mut self, ncols: usize) {
        let last = ncols.saturating_sub(1);
        self.scatter_x = self.scatter_x.min(last);
        self.scatter_y = self.scatter_y.min(last);
        self.pie_column = self.pie_column.min(last);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartError {
    SameAxisColumns,
    MissingColumn(usize),
    Frame(String),
}

impl fmt::Display for ChartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartError::SameAxisColumns => write!(f, "{SAME_AXIS_MESSAGE}"),
            ChartError::MissingColumn(idx) => write!(f, "Column {} does not exist.", idx + 1),
            ChartError::Frame(msg) => write!(f, "Could not build chart: {msg}"),
        }
    }
}

impl From<PolarsError> for ChartError {
    fn from(err: PolarsError) -> Self {
        ChartError::Frame(err.to_string())
    }
}

/// One x-axis category of the bar chart: a row and its cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct BarGroupData {
    pub category: String,
    // (column label, value)
    pub bars: Vec<(String, i64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedBar {
    pub x_label: &'static str,
    /// Column labels, in bar order within every group.
    pub series: Vec<String>,
    pub groups: Vec<BarGroupData>,
}

impl GroupedBar {
    /// Heights of one column's bars across all rows.
    pub fn series_values(&self, column: usize) -> Vec<i64> {
        self.groups
            .iter()
            .map(|g| g.bars.get(column).map(|b| b.1).unwrap_or(0))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scatter {
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
    pub fraction: f64,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pie {
    pub title: String,
    pub slices: Vec<PieSlice>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub title: &'static str,
    pub labels: Vec<String>,
    pub matrix: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    GroupedBar(GroupedBar),
    Scatter(Scatter),
    Pie(Pie),
    Heatmap(Heatmap),
}

pub fn build_chart(table: &DataTable, selection: &ChartSelection) -> Result<Chart, ChartError> {
    let df = table.to_frame()?;
    trace!("Building {:?} from frame {:?}", selection.kind, df.shape());
    match selection.kind {
        ChartKind::GroupedBar => Ok(Chart::GroupedBar(grouped_bar(&df)?)),
        ChartKind::Scatter => {
            let x = column_label(table, selection.scatter_x)?;
            let y = column_label(table, selection.scatter_y)?;
            if x == y {
                return Err(ChartError::SameAxisColumns);
            }
            Ok(Chart::Scatter(scatter(&df, x, y)?))
        }
        ChartKind::Pie => {
            let column = column_label(table, selection.pie_column)?;
            Ok(Chart::Pie(pie(&df, column)?))
        }
        ChartKind::Heatmap => Ok(Chart::Heatmap(heatmap(&df)?)),
    }
}

fn column_label(table: &DataTable, idx: usize) -> Result<&str, ChartError> {
    table.label(idx).ok_or(ChartError::MissingColumn(idx))
}

fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>, PolarsError> {
    let col = df.column(name)?.cast(&DataType::Float64)?;
    let values = col.f64()?;
    Ok(values.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

fn column_i64(df: &DataFrame, name: &str) -> Result<Vec<i64>, PolarsError> {
    let col = df.column(name)?.cast(&DataType::Int64)?;
    let values = col.i64()?;
    Ok(values.into_iter().map(|v| v.unwrap_or(0)).collect())
}

fn grouped_bar(df: &DataFrame) -> Result<GroupedBar, PolarsError> {
    let series: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
    let columns = series
        .iter()
        .map(|name| column_i64(df, name))
        .collect::<Result<Vec<Vec<i64>>, PolarsError>>()?;

    let groups = (0..df.height())
        .map(|ridx| BarGroupData {
            category: ridx.to_string(),
            bars: series
                .iter()
                .zip(columns.iter())
                .map(|(name, values)| (name.clone(), values.get(ridx).copied().unwrap_or(0)))
                .collect(),
        })
        .collect();
    Ok(GroupedBar {
        x_label: BAR_X_LABEL,
        series,
        groups,
    })
}

/// Bar colour of the column at `idx`, shared by its bars and the legend.
pub fn series_color(idx: usize) -> Color {
    SET1[idx % SET1.len()]
}

fn scatter(df: &DataFrame, x: &str, y: &str) -> Result<Scatter, PolarsError> {
    let xs = column_f64(df, x)?;
    let ys = column_f64(df, y)?;
    Ok(Scatter {
        x_label: x.to_string(),
        y_label: y.to_string(),
        points: xs.into_iter().zip(ys).collect(),
    })
}

/// Slice colours: first red, then Set1 cut to `nrows - 1` entries.
pub fn pie_colors(nrows: usize) -> Vec<Color> {
    let mut colors = vec![PIE_FIRST];
    colors.extend(SET1.iter().take(nrows.saturating_sub(1)));
    colors
}

fn pie(df: &DataFrame, column: &str) -> Result<Pie, PolarsError> {
    let values = column_f64(df, column)?;
    let colors = pie_colors(values.len());
    let total: f64 = values.iter().filter(|&&v| v > 0.0).sum();
    let slices = values
        .iter()
        .enumerate()
        .map(|(ridx, &value)| PieSlice {
            label: ridx.to_string(),
            value,
            fraction: if total > 0.0 { value.max(0.0) / total } else { 0.0 },
            color: colors[ridx % colors.len()],
        })
        .collect();
    Ok(Pie {
        title: format!("Pie Chart of {column}"),
        slices,
    })
}

fn heatmap(df: &DataFrame) -> Result<Heatmap, PolarsError> {
    let labels: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
    let columns = labels
        .iter()
        .map(|name| column_f64(df, name))
        .collect::<Result<Vec<Vec<f64>>, PolarsError>>()?;
    Ok(Heatmap {
        title: HEATMAP_TITLE,
        labels,
        matrix: correlation_matrix(&columns),
    })
}

/// Pearson correlation, `None` when undefined (fewer than two rows or a constant series).
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

pub fn correlation_matrix(columns: &[Vec<f64>]) -> Vec<Vec<Option<f64>>> {
    let n = columns.len();
    let mut matrix = vec![vec![None; n]; n];
    for i in 0..n {
        // Self correlation is exact whenever it is defined
        matrix[i][i] = pearson(&columns[i], &columns[i]).map(|_| 1.0);
        for j in (i + 1)..n {
            let r = pearson(&columns[i], &columns[j]);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    matrix
}

/// Map a coefficient in [-1, 1] onto the RdBu scale.
pub fn rdbu_color(value: f64) -> Color {
    let t = ((value.clamp(-1.0, 1.0) + 1.0) / 2.0) * (RDBU.len() - 1) as f64;
    let lower = t.floor() as usize;
    let upper = (lower + 1).min(RDBU.len() - 1);
    let frac = t - lower as f64;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    let (r0, g0, b0) = RDBU[lower];
    let (r1, g1, b1) = RDBU[upper];
    Color::Rgb(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
}

pub fn format_coefficient(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "nan".to_string(),
    }
}

impl fmt::Display for Chart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chart::GroupedBar(bar) => {
                writeln!(f, "{} (x: {})", ChartKind::GroupedBar.as_str(), bar.x_label)?;
                for group in bar.groups.iter() {
                    let bars = group
                        .bars
                        .iter()
                        .map(|(label, v)| format!("{label}={v}"))
                        .collect::<Vec<String>>()
                        .join(" ");
                    writeln!(f, "  {}: {}", group.category, bars)?;
                }
                for (cidx, name) in bar.series.iter().enumerate() {
                    writeln!(f, "  series {name}: {:?}", bar.series_values(cidx))?;
                }
                Ok(())
            }
            Chart::Scatter(scatter) => {
                writeln!(
                    f,
                    "{} ({} vs {})",
                    ChartKind::Scatter.as_str(),
                    scatter.x_label,
                    scatter.y_label
                )?;
                for (x, y) in scatter.points.iter() {
                    writeln!(f, "  ({x}, {y})")?;
                }
                Ok(())
            }
            Chart::Pie(pie) => {
                writeln!(f, "{}", pie.title)?;
                for slice in pie.slices.iter() {
                    writeln!(
                        f,
                        "  {}: {} ({:.1}%)",
                        slice.label,
                        slice.value,
                        slice.fraction * 100.0
                    )?;
                }
                Ok(())
            }
            Chart::Heatmap(heatmap) => {
                writeln!(f, "{}", heatmap.title)?;
                writeln!(f, "  {}", heatmap.labels.join(" | "))?;
                for (label, row) in heatmap.labels.iter().zip(heatmap.matrix.iter()) {
                    let cells = row
                        .iter()
                        .map(|&v| format_coefficient(v))
                        .collect::<Vec<String>>()
                        .join(" ");
                    writeln!(f, "  {label}: {cells}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_table() -> DataTable {
        DataTable::new(
            &["A".to_string(), "B".to_string()],
            vec![vec![1, 2], vec![3, 4]],
        )
    }

    fn select(kind: ChartKind) -> ChartSelection {
        ChartSelection::new(kind, 2)
    }

    #[test]
    fn grouped_bar_has_one_group_per_row() {
        let chart = build_chart(&example_table(), &select(ChartKind::GroupedBar)).unwrap();
        let Chart::GroupedBar(bar) = chart else {
            panic!("expected a bar chart");
        };
        assert_eq!(bar.x_label, "Rows");
        let categories: Vec<&str> = bar.groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(categories, vec!["0", "1"]);
        assert_eq!(bar.series, vec!["A", "B"]);
        assert_eq!(
            bar.groups[0].bars,
            vec![("A".to_string(), 1), ("B".to_string(), 2)]
        );
        assert_eq!(bar.series_values(0), vec![1, 3]);
        assert_eq!(bar.series_values(1), vec![2, 4]);
    }

    #[test]
    fn bar_colors_follow_columns() {
        assert_eq!(series_color(0), SET1[0]);
        assert_eq!(series_color(1), SET1[1]);
        assert_eq!(series_color(SET1.len()), SET1[0]);
    }

    #[test]
    fn scatter_rejects_identical_columns() {
        let mut selection = select(ChartKind::Scatter);
        selection.scatter_x = 1;
        selection.scatter_y = 1;
        let err = build_chart(&example_table(), &selection).unwrap_err();
        assert_eq!(err, ChartError::SameAxisColumns);
        assert_eq!(err.to_string(), SAME_AXIS_MESSAGE);
    }

    #[test]
    fn scatter_pairs_rows() {
        let chart = build_chart(&example_table(), &select(ChartKind::Scatter)).unwrap();
        let Chart::Scatter(scatter) = chart else {
            panic!("expected a scatter chart");
        };
        assert_eq!(scatter.x_label, "A");
        assert_eq!(scatter.y_label, "B");
        assert_eq!(scatter.points, vec![(1.0, 2.0), (3.0, 4.0)]);
    }

    #[test]
    fn scatter_with_duplicate_names_uses_distinct_columns() {
        let table = DataTable::new(
            &["A".to_string(), "A".to_string()],
            vec![vec![1, 2], vec![3, 4]],
        );
        let chart = build_chart(&table, &select(ChartKind::Scatter)).unwrap();
        let Chart::Scatter(scatter) = chart else {
            panic!("expected a scatter chart");
        };
        assert_eq!(scatter.y_label, "A_2");
    }

    #[test]
    fn single_column_scatter_is_an_error() {
        let table = DataTable::new(&["A".to_string()], vec![vec![1], vec![2]]);
        let selection = ChartSelection::new(ChartKind::Scatter, 1);
        assert_eq!(
            build_chart(&table, &selection),
            Err(ChartError::SameAxisColumns)
        );
    }

    #[test]
    fn pie_slices_use_red_then_set1() {
        let mut selection = select(ChartKind::Pie);
        selection.pie_column = 1;
        let chart = build_chart(&example_table(), &selection).unwrap();
        let Chart::Pie(pie) = chart else {
            panic!("expected a pie chart");
        };
        assert_eq!(pie.title, "Pie Chart of B");
        assert_eq!(pie.slices.len(), 2);
        assert_eq!(pie.slices[0].color, PIE_FIRST);
        assert_eq!(pie.slices[1].color, SET1[0]);
        assert!((pie.slices[0].fraction - 2.0 / 6.0).abs() < 1e-12);
        assert!((pie.slices[1].fraction - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn pie_colors_cycle_after_palette() {
        let colors = pie_colors(20);
        assert_eq!(colors.len(), 10);
        let colors = pie_colors(3);
        assert_eq!(colors, vec![PIE_FIRST, SET1[0], SET1[1]]);
    }

    #[test]
    fn pie_ignores_non_positive_values() {
        let table = DataTable::new(&["A".to_string()], vec![vec![-5], vec![0], vec![5]]);
        let chart = build_chart(&table, &ChartSelection::new(ChartKind::Pie, 1)).unwrap();
        let Chart::Pie(pie) = chart else {
            panic!("expected a pie chart");
        };
        let fractions: Vec<f64> = pie.slices.iter().map(|s| s.fraction).collect();
        assert_eq!(fractions, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn heatmap_of_example_is_all_ones() {
        let chart = build_chart(&example_table(), &select(ChartKind::Heatmap)).unwrap();
        let Chart::Heatmap(heatmap) = chart else {
            panic!("expected a heatmap");
        };
        assert_eq!(heatmap.title, HEATMAP_TITLE);
        assert_eq!(heatmap.labels, vec!["A", "B"]);
        assert_eq!(heatmap.matrix[0][0], Some(1.0));
        assert_eq!(heatmap.matrix[1][1], Some(1.0));
        assert_eq!(heatmap.matrix[0][1], heatmap.matrix[1][0]);
        let r = heatmap.matrix[0][1].unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_columns_have_undefined_correlation() {
        let m = correlation_matrix(&[vec![0.0, 0.0, 0.0], vec![1.0, 2.0, 3.0]]);
        assert_eq!(m[0][0], None);
        assert_eq!(m[0][1], None);
        assert_eq!(m[1][1], Some(1.0));
        assert_eq!(format_coefficient(m[0][1]), "nan");
    }

    #[test]
    fn pearson_detects_negative_correlation() {
        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
    }

    #[test]
    fn rdbu_endpoints() {
        assert_eq!(rdbu_color(-1.0), Color::Rgb(103, 0, 31));
        assert_eq!(rdbu_color(0.0), Color::Rgb(247, 247, 247));
        assert_eq!(rdbu_color(1.0), Color::Rgb(5, 48, 97));
        assert_eq!(rdbu_color(7.0), Color::Rgb(5, 48, 97));
    }

    #[test]
    fn chart_kind_cycles() {
        assert_eq!(ChartKind::GroupedBar.next(), ChartKind::Scatter);
        assert_eq!(ChartKind::GroupedBar.prev(), ChartKind::Heatmap);
        assert_eq!(ChartKind::Heatmap.next(), ChartKind::GroupedBar);
        assert_eq!(ChartKind::Scatter.axis_count(), 2);
    }

    #[test]
    fn default_scatter_axes_are_distinct() {
        let selection = ChartSelection::new(ChartKind::Scatter, 4);
        assert_eq!((selection.scatter_x, selection.scatter_y), (0, 1));
        assert_eq!(selection.pie_column, 0);
        let selection = ChartSelection::new(ChartKind::Scatter, 1);
        assert_eq!((selection.scatter_x, selection.scatter_y), (0, 0));
    }

    #[test]
    fn selection_is_clamped_to_columns() {
        let mut selection = ChartSelection::new(ChartKind::Scatter, 5);
        selection.scatter_x = 4;
        selection.pie_column = 3;
        selection.clamp(2);
        assert_eq!((selection.scatter_x, selection.scatter_y), (1, 1));
        assert_eq!(selection.pie_column, 1);
    }

    #[test]
    fn description_lists_groups() {
        let chart = build_chart(&example_table(), &select(ChartKind::GroupedBar)).unwrap();
        let text = chart.to_string();
        assert!(text.contains("  0: A=1 B=2"));
        assert!(text.contains("  1: A=3 B=4"));
        assert!(text.contains("series A: [1, 3]"));
        assert!(text.contains("series B: [2, 4]"));
    }
}
