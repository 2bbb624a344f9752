use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Style, Stylize},
    symbols::{self, border},
    text::{Line, Span, Text},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Cell, Chart as XYChart, Clear, Dataset, GraphType,
        Paragraph, Row, Table, Wrap,
        canvas::{Canvas, Points},
    },
};
use tracing::trace;

use crate::chart::{
    Chart, ChartKind, GroupedBar, Heatmap, Pie, Scatter, format_coefficient, rdbu_color,
    series_color,
};
use crate::domain::AppConfig;
use crate::inputter::InputResult;
use crate::model::{EditTarget, Focus, UIData};

pub const STATUSLINE_HEIGHT: u16 = 1;
pub const FORM_HEIGHT: u16 = 6;
pub const ROW_LABEL_WIDTH: u16 = 7;
pub const CELL_WIDTH: u16 = 10;
pub const PIE_LEGEND_WIDTH: u16 = 22;
const BAR_GROUP_GAP: u16 = 2;
const MAX_BAR_WIDTH: u16 = 6;

#[derive(Debug)]
pub struct FormUI {
    last_update: Option<std::time::Instant>,
}

impl FormUI {
    pub fn new(_config: &AppConfig) -> Self {
        Self { last_update: None }
    }

    pub fn draw(&mut self, uidata: &UIData, frame: &mut Frame) {
        if self.last_update != Some(uidata.last_update) {
            trace!("Drawing ui data from {:?}", uidata.last_update);
            self.last_update = Some(uidata.last_update);
        }

        let [main, status] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(STATUSLINE_HEIGHT)])
                .areas(frame.area());
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)])
                .areas(main);
        let [form, grid] =
            Layout::vertical([Constraint::Length(FORM_HEIGHT), Constraint::Min(0)]).areas(left);

        self.draw_form(uidata, frame, form);
        self.draw_grid(uidata, frame, grid);
        self.draw_chart(uidata, frame, right);
        self.draw_statusline(uidata, frame, status);

        if uidata.show_popup {
            self.draw_popup(&uidata.popup_message, frame);
        }
    }

    // -------------------- Form ---------------------- //

    fn field(text: String, focused: bool) -> Span<'static> {
        if focused {
            text.black().on_yellow()
        } else {
            text.bold()
        }
    }

    fn selector(text: &str, focused: bool) -> Span<'static> {
        Self::field(format!("◂ {text} ▸"), focused)
    }

    fn input_spans(input: &InputResult) -> Vec<Span<'static>> {
        let before: String = input.input.chars().take(input.curser_pos).collect();
        let at: String = input
            .input
            .chars()
            .nth(input.curser_pos)
            .map(|c| c.to_string())
            .unwrap_or_else(|| " ".to_string());
        let after: String = input.input.chars().skip(input.curser_pos + 1).collect();
        vec![
            before.yellow(),
            at.black().on_yellow(),
            after.yellow(),
        ]
    }

    fn draw_form(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let table = &uidata.payload.table;
        let selection = &uidata.payload.selection;
        let focus = uidata.focus;

        let counts = Line::from(vec![
            "Number of rows: ".into(),
            Self::selector(&table.nrows().to_string(), focus == Focus::RowCount),
            "   Number of columns: ".into(),
            Self::selector(&table.ncols().to_string(), focus == Focus::ColumnCount),
        ]);

        let mut names = vec![Span::from("Column names: ")];
        for (idx, name) in uidata.column_names.iter().enumerate() {
            if uidata.edit_target == Some(EditTarget::ColumnName(idx)) {
                names.extend(Self::input_spans(&uidata.cmdinput));
            } else {
                let focused = focus == Focus::ColumnNames && uidata.name_cursor == idx;
                names.push(Self::field(format!("[{name}]"), focused));
            }
            names.push(" ".into());
        }

        let chart = Line::from(vec![
            "Select Chart Type: ".into(),
            Self::selector(selection.kind.as_str(), focus == Focus::ChartKind),
        ]);

        let label = |idx: usize| table.label(idx).unwrap_or("").to_string();
        let axis_focused = |idx: usize| focus == Focus::ChartAxis && uidata.axis_cursor == idx;
        let axes = match selection.kind {
            ChartKind::Scatter => Line::from(vec![
                "X-axis column: ".into(),
                Self::selector(&label(selection.scatter_x), axis_focused(0)),
                "   Y-axis column: ".into(),
                Self::selector(&label(selection.scatter_y), axis_focused(1)),
            ]),
            ChartKind::Pie => Line::from(vec![
                "Column for Pie Chart: ".into(),
                Self::selector(&label(selection.pie_column), axis_focused(0)),
            ]),
            ChartKind::GroupedBar | ChartKind::Heatmap => Line::from(""),
        };

        let block = Block::bordered()
            .title(Line::from(" Customizable Data Input and Visualization ".bold()).centered())
            .border_set(border::THICK);
        let form = Paragraph::new(Text::from(vec![counts, Line::from(names), chart, axes])).block(block);
        frame.render_widget(form, area);
    }

    fn draw_grid(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let table = &uidata.payload.table;
        let grid_focused = uidata.focus == Focus::Grid;

        let header = Row::new(
            std::iter::once(Cell::from(""))
                .chain(table.labels().iter().map(|l| Cell::from(l.clone()))),
        )
        .style(Style::default().bold().underlined());

        let rows = table.rows().iter().enumerate().map(|(ridx, row)| {
            let row_label = format!("Row {}", ridx + 1);
            let mut cells = vec![if grid_focused && ridx == uidata.cursor_row {
                Cell::from(row_label.yellow())
            } else {
                Cell::from(row_label.dark_gray())
            }];
            for (cidx, value) in row.iter().enumerate() {
                let cell = if uidata.edit_target == Some(EditTarget::Cell(ridx, cidx)) {
                    Cell::from(Line::from(Self::input_spans(&uidata.cmdinput)))
                } else if grid_focused && ridx == uidata.cursor_row && cidx == uidata.cursor_column
                {
                    Cell::from(value.to_string().black().on_yellow())
                } else {
                    Cell::from(value.to_string())
                };
                cells.push(cell);
            }
            Row::new(cells)
        });

        let widths = std::iter::once(Constraint::Length(ROW_LABEL_WIDTH))
            .chain(std::iter::repeat_n(Constraint::Length(CELL_WIDTH), table.ncols()));
        let title = Line::from(vec![
            " Your Input Data ".bold(),
            "(r: randomize row) ".dark_gray(),
        ]);
        let grid = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .block(Block::bordered().title(title));
        frame.render_widget(grid, area);
    }

    // -------------------- Charts ---------------------- //

    fn draw_chart(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let title = match &uidata.payload.chart {
            Ok(Chart::Pie(pie)) => pie.title.clone(),
            Ok(Chart::Heatmap(heatmap)) => heatmap.title.to_string(),
            _ => uidata.payload.selection.kind.as_str().to_string(),
        };
        let block = Block::bordered()
            .title(Line::from(vec![" Visualization: ".bold(), format!("{title} ").into()]));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        match &uidata.payload.chart {
            Ok(Chart::GroupedBar(bar)) => Self::draw_bar(bar, frame, inner),
            Ok(Chart::Scatter(scatter)) => Self::draw_scatter(scatter, frame, inner),
            Ok(Chart::Pie(pie)) => Self::draw_pie(pie, frame, inner),
            Ok(Chart::Heatmap(heatmap)) => Self::draw_heatmap(heatmap, frame, inner),
            Err(e) => {
                let message = Paragraph::new(e.to_string().red().bold()).wrap(Wrap { trim: true });
                frame.render_widget(message, inner);
            }
        }
    }

    fn bar_width(area_width: u16, ngroups: u16, nbars: u16) -> u16 {
        if nbars == 0 {
            return 1;
        }
        let gaps = BAR_GROUP_GAP.saturating_mul(ngroups.saturating_sub(1));
        (area_width.saturating_sub(gaps) / nbars).clamp(1, MAX_BAR_WIDTH)
    }

    fn draw_bar(bar: &GroupedBar, frame: &mut Frame, area: Rect) {
        let [chart_area, legend_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);
        let nbars = (bar.groups.len() * bar.series.len()) as u16;

        let mut chart = BarChart::default()
            .bar_width(Self::bar_width(chart_area.width, bar.groups.len() as u16, nbars))
            .bar_gap(0)
            .group_gap(BAR_GROUP_GAP);
        for group in bar.groups.iter() {
            let bars = group
                .bars
                .iter()
                .enumerate()
                .map(|(cidx, (_, value))| {
                    Bar::default()
                        .value((*value).max(0) as u64)
                        .text_value(value.to_string())
                        .style(Style::default().fg(series_color(cidx)))
                })
                .collect::<Vec<Bar>>();
            chart = chart.data(
                BarGroup::default()
                    .label(Line::from(group.category.clone()).centered())
                    .bars(&bars),
            );
        }
        frame.render_widget(chart, chart_area);

        // x-axis title, then one colour key per column
        let mut legend = vec![Span::from(format!("x: {}  ", bar.x_label)).bold()];
        for (cidx, name) in bar.series.iter().enumerate() {
            legend.push(Span::styled("■", Style::default().fg(series_color(cidx))));
            legend.push(format!("{name} ").into());
        }
        frame.render_widget(Paragraph::new(Line::from(legend)), legend_area);
    }

    fn bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
        let (min, max) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if min > max {
            return [0.0, 1.0];
        }
        if (max - min).abs() < f64::EPSILON {
            return [min - 1.0, max + 1.0];
        }
        let pad = (max - min) * 0.05;
        [min - pad, max + pad]
    }

    fn axis_labels(bounds: [f64; 2]) -> Vec<Line<'static>> {
        let mid = (bounds[0] + bounds[1]) / 2.0;
        [bounds[0], mid, bounds[1]]
            .iter()
            .map(|v| Line::from(format!("{v:.1}")))
            .collect()
    }

    fn draw_scatter(scatter: &Scatter, frame: &mut Frame, area: Rect) {
        let x_bounds = Self::bounds(scatter.points.iter().map(|p| p.0));
        let y_bounds = Self::bounds(scatter.points.iter().map(|p| p.1));

        let datasets = vec![
            Dataset::default()
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Cyan))
                .data(&scatter.points),
        ];
        let chart = XYChart::new(datasets)
            .x_axis(
                Axis::default()
                    .title(scatter.x_label.clone().dark_gray())
                    .bounds(x_bounds)
                    .labels(Self::axis_labels(x_bounds)),
            )
            .y_axis(
                Axis::default()
                    .title(scatter.y_label.clone().dark_gray())
                    .bounds(y_bounds)
                    .labels(Self::axis_labels(y_bounds)),
            );
        frame.render_widget(chart, area);
    }

    /// Canvas bounds that keep the unit circle round on terminal cells.
    fn pie_bounds(width: u16, height: u16) -> ([f64; 2], [f64; 2]) {
        let ratio = width.max(1) as f64 / (2.0 * height.max(1) as f64);
        if ratio >= 1.0 {
            ([-ratio, ratio], [-1.0, 1.0])
        } else {
            ([-1.0, 1.0], [-1.0 / ratio, 1.0 / ratio])
        }
    }

    /// Position of a point on the pie, 0 at twelve o'clock going clockwise.
    fn pie_position(x: f64, y: f64) -> f64 {
        let angle = x.atan2(y);
        let angle = if angle < 0.0 {
            angle + std::f64::consts::TAU
        } else {
            angle
        };
        angle / std::f64::consts::TAU
    }

    /// Sample the unit disc and assign every sample to the slice covering its angle.
    pub fn pie_points(pie: &Pie, samples: usize) -> Vec<Vec<(f64, f64)>> {
        let mut points = vec![Vec::new(); pie.slices.len()];
        let mut ends = Vec::with_capacity(pie.slices.len());
        let mut acc = 0.0;
        for slice in pie.slices.iter() {
            acc += slice.fraction;
            ends.push(acc);
        }
        if acc <= 0.0 {
            return points;
        }

        let step = 2.0 / samples.max(1) as f64;
        for i in 0..=samples {
            for j in 0..=samples {
                let x = -1.0 + i as f64 * step;
                let y = -1.0 + j as f64 * step;
                if x * x + y * y > 1.0 {
                    continue;
                }
                let pos = Self::pie_position(x, y) * acc;
                let sidx = ends
                    .iter()
                    .position(|&end| pos < end)
                    .or_else(|| pie.slices.iter().rposition(|s| s.fraction > 0.0));
                if let Some(sidx) = sidx {
                    points[sidx].push((x, y));
                }
            }
        }
        points
    }

    fn draw_pie(pie: &Pie, frame: &mut Frame, area: Rect) {
        if pie.slices.iter().all(|s| s.fraction <= 0.0) {
            frame.render_widget(Paragraph::new("No positive values to chart.".dark_gray()), area);
            return;
        }
        let [pie_area, legend_area] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(PIE_LEGEND_WIDTH)])
                .areas(area);

        let samples = 4 * std::cmp::max(pie_area.width, pie_area.height * 2) as usize;
        let points = Self::pie_points(pie, samples);
        let (x_bounds, y_bounds) = Self::pie_bounds(pie_area.width, pie_area.height);
        let canvas = Canvas::default()
            .marker(symbols::Marker::Braille)
            .x_bounds(x_bounds)
            .y_bounds(y_bounds)
            .paint(|ctx| {
                for (slice, coords) in pie.slices.iter().zip(points.iter()) {
                    ctx.draw(&Points {
                        coords: coords.as_slice(),
                        color: slice.color,
                    });
                }
            });
        frame.render_widget(canvas, pie_area);

        let legend = pie
            .slices
            .iter()
            .map(|s| {
                Line::from(vec![
                    Span::styled("■ ", Style::default().fg(s.color)),
                    format!("{}: {} ({:.1}%)", s.label, s.value, s.fraction * 100.0).into(),
                ])
            })
            .collect::<Vec<Line>>();
        frame.render_widget(Paragraph::new(legend), legend_area);
    }

    fn draw_heatmap(heatmap: &Heatmap, frame: &mut Frame, area: Rect) {
        let [table_area, scale_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(2)]).areas(area);

        let width = heatmap
            .labels
            .iter()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0)
            .max(6) as u16;

        let header = Row::new(
            std::iter::once(Cell::from(""))
                .chain(heatmap.labels.iter().map(|l| Cell::from(l.clone()))),
        )
        .style(Style::default().bold());
        let rows = heatmap
            .labels
            .iter()
            .zip(heatmap.matrix.iter())
            .map(|(label, values)| {
                let mut cells = vec![Cell::from(label.clone().bold())];
                for &value in values.iter() {
                    let style = match value {
                        Some(v) if v.abs() > 0.6 => Style::default().fg(Color::White).bg(rdbu_color(v)),
                        Some(v) => Style::default().fg(Color::Black).bg(rdbu_color(v)),
                        None => Style::default().fg(Color::Gray).bg(Color::DarkGray),
                    };
                    cells.push(Cell::from(format_coefficient(value)).style(style));
                }
                Row::new(cells).height(2)
            });
        let widths = std::iter::repeat_n(Constraint::Length(width), heatmap.labels.len() + 1);
        frame.render_widget(Table::new(rows, widths).header(header).column_spacing(0), table_area);

        let mut scale = vec![Span::from("-1 ")];
        for i in 0..=20 {
            let v = -1.0 + i as f64 * 0.1;
            scale.push(Span::styled(" ", Style::default().bg(rdbu_color(v))));
        }
        scale.push(Span::from(" 1"));
        let legend = Paragraph::new(vec![
            Line::from("Correlation Coefficient".dark_gray()),
            Line::from(scale),
        ]);
        frame.render_widget(legend, scale_area);
    }

    // -------------------- Status and popups ---------------------- //

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let hints = " Tab: next field  Enter: edit  ?: help  q: quit ";
        let [message_area, hint_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(hints.chars().count() as u16),
        ])
        .areas(area);
        frame.render_widget(Paragraph::new(uidata.status_message.clone().yellow()), message_area);
        frame.render_widget(Paragraph::new(hints.dark_gray()), hint_area);
    }

    fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
        let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
        let [area] = vertical.areas(area);
        let [area] = horizontal.areas(area);
        area
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame) {
        let area = Self::popup_area(frame.area(), 60, 70);
        frame.render_widget(Clear, area);
        let popup = Paragraph::new(message.to_string()).block(
            Block::bordered()
                .title(Line::from(" Help ".bold()).centered())
                .title_bottom(Line::from(" Esc to close ").centered())
                .border_set(border::THICK),
        );
        frame.render_widget(popup, area);
    }
}
