use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::chart::ChartKind;
use crate::domain::{AppConfig, HELP_TEXT, Message, TPError};
use crate::inputter::{InputKind, InputResult, Inputter};
use crate::session::{Delta, RenderPayload, Session};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    FORM,
    EDIT,
    POPUP,
}

/// Form field that currently receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Focus {
    RowCount,
    ColumnCount,
    ColumnNames,
    Grid,
    ChartKind,
    ChartAxis,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditTarget {
    ColumnName(usize),
    Cell(usize, usize),
}

#[derive(Debug, Clone)]
pub struct UIData {
    pub payload: RenderPayload,
    pub column_names: Vec<String>,
    pub focus: Focus,
    pub name_cursor: usize,
    pub cursor_row: usize,
    pub cursor_column: usize,
    pub axis_cursor: usize,
    pub edit_target: Option<EditTarget>,
    pub cmdinput: InputResult,
    pub show_popup: bool,
    pub popup_message: String,
    pub status_message: String,
    pub last_update: Instant,
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    session: Session,
    payload: RenderPayload,
    focus: Focus,
    name_cursor: usize,
    cursor_row: usize,
    cursor_column: usize,
    axis_cursor: usize,
    edit_target: Option<EditTarget>,
    input: Inputter,
    last_input: InputResult,
    clipboard: Option<Clipboard>,
    status_message: String,
    uidata: UIData,
}

impl Model {
    pub fn init(config: &AppConfig) -> Result<Self, TPError> {
        let mut session = Session::new(config);
        let payload = session.render()?;
        let uidata = UIData {
            payload: payload.clone(),
            column_names: session.column_names().to_vec(),
            focus: Focus::RowCount,
            name_cursor: 0,
            cursor_row: 0,
            cursor_column: 0,
            axis_cursor: 0,
            edit_target: None,
            cmdinput: InputResult::default(),
            show_popup: false,
            popup_message: String::new(),
            status_message: String::new(),
            last_update: Instant::now(),
        };
        let mut model = Self {
            status: Status::READY,
            modus: Modus::FORM,
            previous_modus: Modus::FORM,
            session,
            payload,
            focus: Focus::RowCount,
            name_cursor: 0,
            cursor_row: 0,
            cursor_column: 0,
            axis_cursor: 0,
            edit_target: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            clipboard: None,
            status_message: String::new(),
            uidata,
        };
        model.set_status_message("Press ? for help");
        Ok(model)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::EDIT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Message) -> Result<(), TPError> {
        let delta = match self.modus {
            Modus::FORM => self.handle_form_message(message),
            Modus::EDIT => match message {
                Message::RawKey(key) => self.raw_input(key),
                _ => None,
            },
            Modus::POPUP => {
                match message {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help | Message::Enter => self.close_popup(),
                    _ => (),
                }
                None
            }
        };

        if let Some(delta) = delta {
            self.session.apply(delta);
            self.payload = self.session.render()?;
            self.clamp_cursors();
        }
        self.update_uidata();
        Ok(())
    }

    fn handle_form_message(&mut self, message: Message) -> Option<Delta> {
        match message {
            Message::Quit => {
                self.quit();
                None
            }
            Message::NextField => {
                self.move_focus(1);
                None
            }
            Message::PrevField => {
                self.move_focus(-1);
                None
            }
            Message::Increment => self.step(1),
            Message::Decrement => self.step(-1),
            Message::MoveLeft => match self.focus {
                Focus::ColumnNames => {
                    self.name_cursor = self.name_cursor.saturating_sub(1);
                    None
                }
                Focus::Grid => {
                    self.cursor_column = self.cursor_column.saturating_sub(1);
                    None
                }
                _ => self.step(-1),
            },
            Message::MoveRight => match self.focus {
                Focus::ColumnNames => {
                    self.name_cursor =
                        (self.name_cursor + 1).min(self.session.num_cols().saturating_sub(1));
                    None
                }
                Focus::Grid => {
                    self.cursor_column =
                        (self.cursor_column + 1).min(self.session.num_cols().saturating_sub(1));
                    None
                }
                _ => self.step(1),
            },
            Message::MoveUp => match self.focus {
                Focus::Grid => {
                    self.cursor_row = self.cursor_row.saturating_sub(1);
                    None
                }
                Focus::ChartAxis => {
                    self.axis_cursor = self.axis_cursor.saturating_sub(1);
                    None
                }
                Focus::RowCount | Focus::ColumnCount => self.step(1),
                _ => None,
            },
            Message::MoveDown => match self.focus {
                Focus::Grid => {
                    self.cursor_row =
                        (self.cursor_row + 1).min(self.session.num_rows().saturating_sub(1));
                    None
                }
                Focus::ChartAxis => {
                    let last = self.session.selection().kind.axis_count().saturating_sub(1);
                    self.axis_cursor = (self.axis_cursor + 1).min(last);
                    None
                }
                Focus::RowCount | Focus::ColumnCount => self.step(-1),
                _ => None,
            },
            Message::Enter => {
                self.start_edit();
                None
            }
            Message::Randomize => {
                self.set_status_message(format!("Randomized row {}", self.cursor_row + 1));
                Some(Delta::RandomizeRow(self.cursor_row))
            }
            Message::CopyTable => {
                self.copy_table();
                None
            }
            Message::Help => {
                self.show_help();
                None
            }
            Message::Resize(width, height) => {
                trace!("UI was resized to w:{}, h:{}", width, height);
                None
            }
            Message::Exit | Message::RawKey(_) => None,
        }
    }

    // -------------------- Form navigation ---------------------- //

    fn fields(&self) -> Vec<Focus> {
        let mut fields = vec![
            Focus::RowCount,
            Focus::ColumnCount,
            Focus::ColumnNames,
            Focus::Grid,
            Focus::ChartKind,
        ];
        if self.session.selection().kind.axis_count() > 0 {
            fields.push(Focus::ChartAxis);
        }
        fields
    }

    fn move_focus(&mut self, step: i32) {
        let fields = self.fields();
        let current = fields.iter().position(|&f| f == self.focus).unwrap_or(0) as i32;
        let next = (current + step).rem_euclid(fields.len() as i32) as usize;
        self.focus = fields[next];
        trace!("Focus {:?}", self.focus);
    }

    /// Change the value of the focused field by one step.
    fn step(&mut self, step: i64) -> Option<Delta> {
        let ncols = self.session.num_cols();
        let cycle = |current: usize| (current as i64 + step).rem_euclid(ncols as i64) as usize;
        match self.focus {
            Focus::RowCount => Some(Delta::SetRowCount(Self::offset(
                self.session.num_rows(),
                step,
            ))),
            Focus::ColumnCount => Some(Delta::SetColumnCount(Self::offset(ncols, step))),
            Focus::ChartKind => {
                let kind = self.session.selection().kind;
                let kind = if step > 0 { kind.next() } else { kind.prev() };
                Some(Delta::SelectChart(kind))
            }
            Focus::ChartAxis => {
                let selection = *self.session.selection();
                match (selection.kind, self.axis_cursor) {
                    (ChartKind::Scatter, 0) => Some(Delta::SelectScatterX(cycle(selection.scatter_x))),
                    (ChartKind::Scatter, _) => Some(Delta::SelectScatterY(cycle(selection.scatter_y))),
                    (ChartKind::Pie, _) => Some(Delta::SelectPieColumn(cycle(selection.pie_column))),
                    _ => None,
                }
            }
            Focus::Grid => {
                let value = self.session.cell(self.cursor_row, self.cursor_column)?;
                Some(Delta::SetCell {
                    row: self.cursor_row,
                    column: self.cursor_column,
                    value: value.saturating_add(step),
                })
            }
            Focus::ColumnNames => None,
        }
    }

    fn offset(value: usize, step: i64) -> usize {
        if step < 0 {
            value.saturating_sub(step.unsigned_abs() as usize)
        } else {
            value.saturating_add(step as usize)
        }
    }

    fn clamp_cursors(&mut self) {
        let last_row = self.session.num_rows().saturating_sub(1);
        let last_col = self.session.num_cols().saturating_sub(1);
        self.cursor_row = self.cursor_row.min(last_row);
        self.cursor_column = self.cursor_column.min(last_col);
        self.name_cursor = self.name_cursor.min(last_col);

        let axis_count = self.session.selection().kind.axis_count();
        self.axis_cursor = self.axis_cursor.min(axis_count.saturating_sub(1));
        if axis_count == 0 && self.focus == Focus::ChartAxis {
            self.focus = Focus::ChartKind;
        }
    }

    // -------------------- Editing ---------------------- //

    fn start_edit(&mut self) {
        let (target, initial, kind) = match self.focus {
            Focus::ColumnNames => {
                let name = self
                    .session
                    .column_names()
                    .get(self.name_cursor)
                    .cloned()
                    .unwrap_or_default();
                (EditTarget::ColumnName(self.name_cursor), name, InputKind::Text)
            }
            Focus::Grid => {
                let value = self
                    .session
                    .cell(self.cursor_row, self.cursor_column)
                    .unwrap_or(0);
                (
                    EditTarget::Cell(self.cursor_row, self.cursor_column),
                    value.to_string(),
                    InputKind::Integer,
                )
            }
            _ => return,
        };
        trace!("Entering edit mode for {:?} ...", target);
        self.previous_modus = self.modus;
        self.modus = Modus::EDIT;
        self.edit_target = Some(target);
        self.input.start(&initial, kind);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) -> Option<Delta> {
        self.last_input = self.input.read(key);
        if !self.last_input.finished {
            return None;
        }

        self.modus = self.previous_modus;
        self.previous_modus = Modus::EDIT;
        let target = self.edit_target.take()?;
        let input = self.last_input.input.clone();
        self.input.clear();

        if self.last_input.canceled {
            self.set_status_message("Edit aborted");
            return None;
        }

        match target {
            EditTarget::ColumnName(column) => {
                debug!("Rename column {column} to \"{input}\"");
                Some(Delta::SetColumnName {
                    column,
                    name: input,
                })
            }
            EditTarget::Cell(row, column) => match input.trim().parse::<i64>() {
                Ok(value) => Some(Delta::SetCell { row, column, value }),
                Err(_) => {
                    self.set_status_message(format!("\"{input}\" is not an integer"));
                    None
                }
            },
        }
    }

    // -------------------- Popups and clipboard ---------------------- //

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn copy_table(&mut self) {
        let csv = self.payload.table.to_csv();
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(c) => self.clipboard = Some(c),
                Err(e) => {
                    info!("Clipboard unavailable: {:?}", e);
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        let result = match self.clipboard.as_mut() {
            Some(clipboard) => clipboard.set_text(csv),
            None => return,
        };
        match result {
            Ok(_) => {
                trace!("Copied table to clipboard.");
                self.set_status_message("Copied table to clipboard");
            }
            Err(e) => {
                trace!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Copying to clipboard failed");
            }
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_update = Instant::now();
    }

    fn update_uidata(&mut self) {
        self.uidata = UIData {
            payload: self.payload.clone(),
            column_names: self.session.column_names().to_vec(),
            focus: self.focus,
            name_cursor: self.name_cursor,
            cursor_row: self.cursor_row,
            cursor_column: self.cursor_column,
            axis_cursor: self.axis_cursor,
            edit_target: if self.modus == Modus::EDIT {
                self.edit_target
            } else {
                None
            },
            cmdinput: self.last_input.clone(),
            show_popup: self.modus == Modus::POPUP,
            popup_message: if self.modus == Modus::POPUP {
                HELP_TEXT.to_string()
            } else {
                String::new()
            },
            status_message: self.status_message.clone(),
            last_update: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{Chart, SAME_AXIS_MESSAGE};
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn model() -> Model {
        Model::init(&AppConfig::default().seed(Some(3))).unwrap()
    }

    fn send(model: &mut Model, messages: &[Message]) {
        for m in messages {
            model.update(m.clone()).unwrap();
        }
    }

    fn type_keys(model: &mut Model, s: &str) {
        for c in s.chars() {
            model
                .update(Message::RawKey(KeyEvent::new(
                    KeyCode::Char(c),
                    KeyModifiers::NONE,
                )))
                .unwrap();
        }
    }

    fn raw(model: &mut Model, code: KeyCode) {
        model
            .update(Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE)))
            .unwrap();
    }

    fn focus(model: &mut Model, target: Focus) {
        for _ in 0..6 {
            if model.focus == target {
                return;
            }
            send(model, &[Message::NextField]);
        }
        assert_eq!(model.focus, target);
    }

    #[test]
    fn counts_change_table_shape() {
        let mut m = model();
        send(&mut m, &[Message::Decrement, Message::Decrement]);
        assert_eq!(m.get_uidata().payload.table.nrows(), 4);
        send(&mut m, &[Message::NextField, Message::Increment]);
        assert_eq!(m.get_uidata().payload.table.ncols(), 5);
        send(&mut m, &[Message::Increment]);
        assert_eq!(m.get_uidata().payload.table.ncols(), 5);
    }

    #[test]
    fn focus_wraps_around() {
        let mut m = model();
        send(&mut m, &[Message::PrevField]);
        assert_eq!(m.focus, Focus::ChartKind);
        send(&mut m, &[Message::NextField]);
        assert_eq!(m.focus, Focus::RowCount);
    }

    #[test]
    fn edit_cell_commits_value() {
        let mut m = model();
        focus(&mut m, Focus::Grid);
        send(&mut m, &[Message::MoveDown, Message::MoveRight, Message::Enter]);
        assert!(m.raw_keyevents());
        raw(&mut m, KeyCode::Backspace);
        type_keys(&mut m, "42");
        raw(&mut m, KeyCode::Enter);
        assert!(!m.raw_keyevents());
        assert_eq!(m.get_uidata().payload.table.rows()[1][1], 42);
    }

    #[test]
    fn invalid_cell_entry_keeps_value() {
        let mut m = model();
        focus(&mut m, Focus::Grid);
        send(&mut m, &[Message::Enter]);
        raw(&mut m, KeyCode::Backspace);
        type_keys(&mut m, "-");
        raw(&mut m, KeyCode::Enter);
        assert_eq!(m.get_uidata().payload.table.rows()[0][0], 0);
        assert_eq!(m.get_uidata().status_message, "\"-\" is not an integer");
    }

    #[test]
    fn aborted_rename_changes_nothing() {
        let mut m = model();
        focus(&mut m, Focus::ColumnNames);
        send(&mut m, &[Message::Enter]);
        type_keys(&mut m, "xyz");
        raw(&mut m, KeyCode::Esc);
        assert_eq!(m.get_uidata().column_names[0], "Column_1");
        assert_eq!(m.get_uidata().status_message, "Edit aborted");
    }

    #[test]
    fn rename_column_updates_labels() {
        let mut m = model();
        focus(&mut m, Focus::ColumnNames);
        send(&mut m, &[Message::MoveRight, Message::Enter]);
        raw(&mut m, KeyCode::Home);
        type_keys(&mut m, "My");
        raw(&mut m, KeyCode::Enter);
        assert_eq!(m.get_uidata().payload.table.labels()[1], "MyColumn_2");
    }

    #[test]
    fn randomize_fills_cursor_row() {
        let mut m = model();
        focus(&mut m, Focus::Grid);
        send(&mut m, &[Message::MoveDown, Message::MoveDown, Message::Randomize]);
        let rows = m.get_uidata().payload.table.rows().to_vec();
        assert!(rows[2].iter().all(|&v| (1..=50).contains(&v)));
        assert!(rows[0].iter().all(|&v| v == 0));
        assert_eq!(m.get_uidata().status_message, "Randomized row 3");
    }

    #[test]
    fn scatter_axis_selection_and_error() {
        let mut m = model();
        focus(&mut m, Focus::ChartKind);
        send(&mut m, &[Message::MoveRight]);
        assert!(matches!(
            m.get_uidata().payload.chart,
            Ok(Chart::Scatter(_))
        ));
        send(&mut m, &[Message::NextField]);
        assert_eq!(m.focus, Focus::ChartAxis);
        send(&mut m, &[Message::MoveDown, Message::MoveLeft]);
        let uidata = m.get_uidata();
        assert_eq!(uidata.payload.selection.scatter_y, 0);
        let err = uidata.payload.chart.as_ref().unwrap_err();
        assert_eq!(err.to_string(), SAME_AXIS_MESSAGE);
        assert_eq!(uidata.payload.table.nrows(), 6);
    }

    #[test]
    fn axis_fields_follow_chart_kind() {
        let mut m = model();
        focus(&mut m, Focus::ChartKind);
        send(&mut m, &[Message::MoveRight, Message::NextField, Message::MoveDown]);
        assert_eq!((m.focus, m.axis_cursor), (Focus::ChartAxis, 1));
        send(&mut m, &[Message::PrevField, Message::MoveRight]);
        assert_eq!(m.session.selection().kind, ChartKind::Pie);
        assert_eq!(m.axis_cursor, 0);
        // Heatmap has no column selectors, so Tab wraps to the first field
        send(&mut m, &[Message::MoveRight, Message::NextField]);
        assert_eq!(m.session.selection().kind, ChartKind::Heatmap);
        assert_eq!(m.focus, Focus::RowCount);
    }

    #[test]
    fn grid_increment_changes_cell() {
        let mut m = model();
        focus(&mut m, Focus::Grid);
        send(&mut m, &[Message::Increment, Message::Increment, Message::Decrement]);
        assert_eq!(m.get_uidata().payload.table.rows()[0][0], 1);
    }

    #[test]
    fn cursor_follows_shrinking_table() {
        let mut m = model();
        focus(&mut m, Focus::Grid);
        for _ in 0..10 {
            send(&mut m, &[Message::MoveDown, Message::MoveRight]);
        }
        assert_eq!((m.cursor_row, m.cursor_column), (5, 3));
        focus(&mut m, Focus::RowCount);
        send(&mut m, &[Message::Decrement]);
        focus(&mut m, Focus::ColumnCount);
        send(&mut m, &[Message::Decrement]);
        assert_eq!((m.cursor_row, m.cursor_column), (4, 2));
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut m = model();
        send(&mut m, &[Message::Help]);
        assert!(m.get_uidata().show_popup);
        assert_eq!(m.get_uidata().popup_message, HELP_TEXT);
        send(&mut m, &[Message::Increment]);
        assert_eq!(m.get_uidata().payload.table.nrows(), 6);
        send(&mut m, &[Message::Exit]);
        assert!(!m.get_uidata().show_popup);
    }

    #[test]
    fn quit_sets_status() {
        let mut m = model();
        send(&mut m, &[Message::Quit]);
        assert_eq!(m.status, Status::QUITTING);
    }
}
