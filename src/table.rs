use polars::prelude::*;
use std::collections::HashSet;

use crate::domain::default_column_name;

/// Row-major snapshot of the session grid, keyed by unique column labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    labels: Vec<String>,
    rows: Vec<Vec<i64>>,
}

impl DataTable {
    pub fn new(names: &[String], rows: Vec<Vec<i64>>) -> Self {
        Self {
            labels: Self::unique_labels(names),
            rows,
        }
    }

    // Blank names fall back to the default, repeated names get a positional suffix
    fn unique_labels(names: &[String]) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut labels = Vec::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            let base = if name.trim().is_empty() {
                default_column_name(idx)
            } else {
                name.clone()
            };
            let mut label = base.clone();
            let mut n = 2;
            while seen.contains(&label) {
                label = format!("{base}_{n}");
                n += 1;
            }
            seen.insert(label.clone());
            labels.push(label);
        }
        labels
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(|s| s.as_str())
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.labels.len()
    }

    pub fn rows(&self) -> &[Vec<i64>] {
        &self.rows
    }

    #[cfg(test)]
    pub fn row(&self, idx: usize) -> Option<&[i64]> {
        self.rows.get(idx).map(|r| r.as_slice())
    }

    pub fn column_values(&self, idx: usize) -> Vec<i64> {
        self.rows
            .iter()
            .map(|r| r.get(idx).copied().unwrap_or(0))
            .collect()
    }

    pub fn to_frame(&self) -> Result<DataFrame, PolarsError> {
        let columns = self
            .labels
            .iter()
            .enumerate()
            .map(|(idx, label)| Column::new(label.as_str().into(), self.column_values(idx)))
            .collect::<Vec<Column>>();
        DataFrame::new(columns)
    }

    pub fn render_text(&self) -> Result<String, PolarsError> {
        Ok(format!("{}", self.to_frame()?))
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    pub fn to_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(
            self.labels
                .iter()
                .map(|l| Self::wrap_cell_content(l))
                .collect::<Vec<String>>()
                .join(","),
        );
        for row in self.rows.iter() {
            lines.push(
                row.iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<String>>()
                    .join(","),
            );
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn duplicate_and_blank_names_are_disambiguated() {
        let table = DataTable::new(&names(&["A", "A", " ", "A"]), vec![vec![1, 2, 3, 4]]);
        assert_eq!(table.labels(), &["A", "A_2", "Column_3", "A_3"]);
    }

    #[test]
    fn suffix_skips_names_already_taken() {
        let table = DataTable::new(&names(&["A_2", "A", "A"]), vec![]);
        assert_eq!(table.labels(), &["A_2", "A", "A_3"]);
    }

    #[test]
    fn frame_has_one_column_per_label() {
        let table = DataTable::new(&names(&["A", "B"]), vec![vec![1, 2], vec![3, 4]]);
        let df = table.to_frame().unwrap();
        assert_eq!(df.shape(), (2, 2));
        let a = df.column("A").unwrap().i64().unwrap();
        assert_eq!(a.into_iter().collect::<Vec<_>>(), vec![Some(1), Some(3)]);
        let text = table.render_text().unwrap();
        assert!(text.contains('A') && text.contains('B'));
        assert!(text.contains('4'));
    }

    #[test]
    fn column_values_follow_rows() {
        let table = DataTable::new(&names(&["A", "B"]), vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(table.column_values(1), vec![2, 4]);
        assert_eq!(table.row(1), Some(&[3, 4][..]));
        assert_eq!(table.row(2), None);
    }

    #[test]
    fn csv_quotes_labels_with_separators() {
        let table = DataTable::new(&names(&["a b", "say \"hi\""]), vec![vec![1, -2]]);
        assert_eq!(table.to_csv(), "\"a b\",\"say \"\"hi\"\"\"\n1,-2");
    }
}
