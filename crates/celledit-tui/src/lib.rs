// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use celledit_app::{
    ActiveEditor, Cell, EditEvent, EditState, Flash, OverlayKind, Page, Point, PointerOutcome,
    Rect as PageRect, Row, TableDocument, Viewport, format_date,
};
use celledit_engine::{
    DateFlyout, DateInputKind, Dispatch, Dispatcher, EditContext, EditError, EditResult,
    EditorSettings, FlyoutMetrics, Key, KeyPress, OptionQuery, PatchAck, PendingCommit,
    Persistence, TableEditor,
};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(120);
const STATUS_TTL: Duration = Duration::from_secs(4);
const DEFAULT_COLUMN_WIDTH: u16 = 12;
const HELP_TEXT: &str = "enter/e edit  tab next  esc cancel  r reload  q quit";

/// Flyout sizes in terminal cells: one line per row.
pub fn terminal_metrics() -> FlyoutMetrics {
    FlyoutMetrics {
        row_height: 1.0,
        max_rows: 6,
        date_width: 26.0,
        date_height: 3.0,
    }
}

pub fn terminal_settings(date_input: DateInputKind) -> EditorSettings {
    EditorSettings {
        metrics: terminal_metrics(),
        date_input,
        ..EditorSettings::default()
    }
}

/// Where the grid's rows come from and where its edits go.
pub trait GridRuntime {
    fn load_rows(&mut self) -> Result<Vec<Row>>;
    fn persistence(&self) -> Arc<dyn Persistence + Send + Sync>;
    fn queries(&self) -> &dyn OptionQuery;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridColumn {
    pub key: String,
    pub label: String,
    pub width: u16,
}

impl GridColumn {
    pub fn new(key: impl Into<String>, label: impl Into<String>, width: u16) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            width,
        }
    }
}

#[derive(Debug)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    CommitFinished {
        pending: PendingCommit,
        result: Result<PatchAck>,
    },
}

#[derive(Debug)]
pub struct GridView {
    title: String,
    columns: Vec<GridColumn>,
    editor: TableEditor,
    ctx: EditContext,
    cursor: (usize, usize),
    status: Option<String>,
    status_token: u64,
}

impl GridView {
    pub fn new(
        title: impl Into<String>,
        editor: TableEditor,
        columns: Vec<GridColumn>,
        settings: EditorSettings,
    ) -> Self {
        let mut page = Page::new(Viewport::new(80.0, 20.0));
        page.insert_table(TableDocument::new(editor.table()));
        Self {
            title: title.into(),
            columns,
            editor,
            ctx: EditContext::new(page, settings),
            cursor: (0, 1),
            status: None,
            status_token: 0,
        }
    }

    pub fn context(&self) -> &EditContext {
        &self.ctx
    }

    pub fn editor(&self) -> &TableEditor {
        &self.editor
    }

    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn state(&self) -> EditState {
        self.editor.state(&self.ctx)
    }

    pub fn pending_saves(&self) -> usize {
        self.ctx.page.overlays.pending_in(self.editor.table())
    }

    fn document(&self) -> Option<&TableDocument> {
        self.ctx.page.document(self.editor.table())
    }

    fn row_count(&self) -> usize {
        self.document().map_or(0, |document| document.rows().len())
    }

    /// Replaces every row. Open editors and in-flight saves against the old
    /// rows go stale.
    pub fn load(&mut self, rows: Vec<Row>) {
        let rows = layout_rows(&self.columns, rows);
        let table = self.editor.table();
        match self.ctx.page.document_mut(table) {
            Some(document) => {
                document.render(rows);
            }
            None => {
                let mut document = TableDocument::new(table);
                document.render(rows);
                self.ctx.page.insert_table(document);
            }
        }
        self.editor.sync(&mut self.ctx);
        let last_row = self.row_count().saturating_sub(1);
        self.cursor.0 = self.cursor.0.min(last_row);
    }

    fn resize(&mut self, body: Rect) {
        self.ctx.page.viewport.width = f64::from(body.width);
        self.ctx.page.viewport.height = f64::from(body.height);
    }

    fn cursor_cell(&self) -> Option<celledit_app::CellRef> {
        self.document()
            .and_then(|document| document.cell_ref(self.cursor.0, self.cursor.1))
    }
}

/// Positions every cell on the grid: one terminal line per row, columns
/// side by side.
pub fn layout_rows(columns: &[GridColumn], rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            let mut left = 0.0;
            let cells = row
                .cells
                .into_iter()
                .enumerate()
                .map(|(column, cell)| {
                    let width = columns
                        .get(column)
                        .map_or(DEFAULT_COLUMN_WIDTH, |column| column.width);
                    let rect = PageRect::new(left, index as f64, f64::from(width), 1.0);
                    left += f64::from(width);
                    cell.with_rect(rect)
                })
                .collect::<Vec<Cell>>();
            Row::new(cells)
        })
        .collect()
}

struct BackgroundSaves {
    persistence: Arc<dyn Persistence + Send + Sync>,
    tx: Sender<InternalEvent>,
}

impl Dispatcher for BackgroundSaves {
    fn dispatch(&mut self, pending: &PendingCommit) -> Dispatch {
        let persistence = Arc::clone(&self.persistence);
        let tx = self.tx.clone();
        let pending = pending.clone();
        thread::spawn(move || {
            let result = persistence.patch(&pending.payload);
            let _ = tx.send(InternalEvent::CommitFinished { pending, result });
        });
        Dispatch::InFlight
    }
}

fn background_saves<R: GridRuntime>(runtime: &R, tx: &Sender<InternalEvent>) -> BackgroundSaves {
    BackgroundSaves {
        persistence: runtime.persistence(),
        tx: tx.clone(),
    }
}

pub fn run_app<R: GridRuntime>(view: &mut GridView, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen, EnableMouseCapture)
        .context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    let (internal_tx, internal_rx) = mpsc::channel();

    reload_rows(view, runtime, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(view, runtime, &internal_tx, &internal_rx);
        view.ctx.tick(Instant::now());

        let size = match terminal.size() {
            Ok(size) => size,
            Err(error) => {
                result = Err(error).context("read terminal size");
                break;
            }
        };
        let body = screen_layout(Rect::new(0, 0, size.width, size.height)).body;
        view.resize(body);

        if let Err(error) = terminal.draw(|frame| render(frame, view)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(POLL_INTERVAL).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(view, runtime, &internal_tx, key) {
                        break;
                    }
                }
                Event::Mouse(mouse) => {
                    handle_mouse_event(view, runtime, &internal_tx, mouse, body);
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(
        io::stdout(),
        DisableMouseCapture,
        terminal::LeaveAlternateScreen
    )
    .context("leave alternate screen")?;
    result
}

fn process_internal_events<R: GridRuntime>(
    view: &mut GridView,
    runtime: &R,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view.status_token => {
                view.status = None;
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::CommitFinished { pending, result } => {
                let outcome =
                    view.editor
                        .finish_commit(&mut view.ctx, pending, result, runtime.queries());
                apply_outcome(view, tx, outcome);
            }
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_TTL);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(view: &mut GridView, internal_tx: &Sender<InternalEvent>, message: impl Into<String>) {
    view.status = Some(message.into());
    view.status_token = view.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view.status_token);
}

fn apply_outcome(
    view: &mut GridView,
    tx: &Sender<InternalEvent>,
    outcome: EditResult<Vec<EditEvent>>,
) {
    match outcome {
        Ok(events) => {
            for event in events {
                if let Some(message) = event_status(view, &event) {
                    emit_status(view, tx, message);
                }
            }
        }
        Err(EditError::Stale) => {
            debug!("edit target went stale");
        }
        Err(error) => {
            emit_status(view, tx, error.to_string());
        }
    }
    if let Some(cell) = view.editor.editing() {
        view.cursor = (cell.row, cell.column);
    }
}

fn event_status(view: &GridView, event: &EditEvent) -> Option<String> {
    match event {
        EditEvent::CommitStarted { .. } => Some("saving...".to_owned()),
        EditEvent::Committed { cell, text, .. } => {
            let label = view
                .columns
                .get(cell.column)
                .map_or("cell", |column| column.label.as_str());
            if text.is_empty() {
                Some(format!("{label} cleared"))
            } else {
                Some(format!("{label} saved: {text}"))
            }
        }
        EditEvent::Discarded { .. } => Some("rows reloaded; save result dropped".to_owned()),
        _ => None,
    }
}

fn handle_key_event<R: GridRuntime>(
    view: &mut GridView,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    view.editor.sync(&mut view.ctx);
    if view.editor.editing().is_some() {
        let Some(press) = key_press(key) else {
            return false;
        };
        let mut saves = background_saves(runtime, internal_tx);
        let outcome = view
            .editor
            .key(&mut view.ctx, press, &mut saves, runtime.queries());
        apply_outcome(view, internal_tx, outcome);
        return false;
    }

    match key.code {
        KeyCode::Char('q') => {
            let pending = view.pending_saves();
            if pending == 0 {
                return true;
            }
            emit_status(
                view,
                internal_tx,
                format!("{pending} save(s) still in flight; wait for them before quitting"),
            );
        }
        KeyCode::Up | KeyCode::Char('k') => move_cursor(view, -1, 0),
        KeyCode::Down | KeyCode::Char('j') => move_cursor(view, 1, 0),
        KeyCode::Left | KeyCode::Char('h') => move_cursor(view, 0, -1),
        KeyCode::Right | KeyCode::Char('l') => move_cursor(view, 0, 1),
        KeyCode::Enter | KeyCode::Char('e') => {
            if let Some(cell) = view.cursor_cell() {
                if view.editor.editable_column(&view.ctx.page, &cell).is_none() {
                    emit_status(view, internal_tx, "this cell is not editable");
                } else {
                    let outcome = view.editor.click(&mut view.ctx, cell, runtime.queries());
                    apply_outcome(view, internal_tx, outcome);
                }
            }
        }
        KeyCode::Char('r') => reload_rows(view, runtime, internal_tx),
        _ => {}
    }
    false
}

fn move_cursor(view: &mut GridView, rows: isize, columns: isize) {
    let last_row = view.row_count().saturating_sub(1);
    let last_column = view.columns.len().saturating_sub(1);
    view.cursor.0 = view.cursor.0.saturating_add_signed(rows).min(last_row);
    view.cursor.1 = view.cursor.1.saturating_add_signed(columns).min(last_column);
    if let Some(cell) = view.cursor_cell() {
        view.ctx.page.scroll_into_view(&cell);
    }
}

fn reload_rows<R: GridRuntime>(view: &mut GridView, runtime: &mut R, tx: &Sender<InternalEvent>) {
    match runtime.load_rows() {
        Ok(rows) => {
            let count = rows.len();
            view.load(rows);
            debug!(rows = count, table = %view.editor.config().table, "rows loaded");
        }
        Err(error) => {
            warn!(error = %format!("{error:#}"), "row load failed");
            emit_status(view, tx, format!("load failed: {error:#}"));
        }
    }
}

fn handle_mouse_event<R: GridRuntime>(
    view: &mut GridView,
    runtime: &R,
    internal_tx: &Sender<InternalEvent>,
    mouse: MouseEvent,
    body: Rect,
) {
    if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
        return;
    }
    let point = Point::new(
        f64::from(mouse.column) - f64::from(body.x),
        f64::from(mouse.row) - f64::from(body.y),
    );

    if let Some(index) = view.ctx.choice.item_at(&view.ctx.page, point) {
        let mut saves = background_saves(runtime, internal_tx);
        let outcome =
            view.editor
                .pick_choice(&mut view.ctx, index, &mut saves, runtime.queries());
        apply_outcome(view, internal_tx, outcome);
        return;
    }

    let outcome = view.ctx.pointer_down(point);
    view.editor.sync(&mut view.ctx);
    if outcome == PointerOutcome::Inside && view.ctx.page.overlay_at(point).is_some() {
        return;
    }
    if let Some(cell) = view.ctx.page.hit_test(point)
        && cell.table == view.editor.table()
    {
        view.cursor = (cell.row, cell.column);
        let outcome = view.editor.click(&mut view.ctx, cell, runtime.queries());
        apply_outcome(view, internal_tx, outcome);
    }
}

/// Terminal key to editor key. Keys the editor has no use for map to `None`.
fn key_press(key: KeyEvent) -> Option<KeyPress> {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let mapped = match key.code {
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => return Some(KeyPress::shifted(Key::Tab)),
        KeyCode::Esc => Key::Escape,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Char(ch) => return Some(KeyPress::plain(Key::Char(ch))),
        _ => return None,
    };
    Some(KeyPress {
        key: mapped,
        shift,
    })
}

struct ScreenLayout {
    title: Rect,
    header: Rect,
    body: Rect,
    status: Rect,
}

fn screen_layout(area: Rect) -> ScreenLayout {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);
    ScreenLayout {
        title: layout[0],
        header: layout[1],
        body: layout[2],
        status: layout[3],
    }
}

/// Clips a viewport-space box to `body`, in screen cells.
fn screen_rect(body: Rect, area: PageRect) -> Option<Rect> {
    let left = (f64::from(body.x) + area.x).max(f64::from(body.x));
    let top = (f64::from(body.y) + area.y).max(f64::from(body.y));
    let right = (f64::from(body.x) + area.right()).min(f64::from(body.right()));
    let bottom = (f64::from(body.y) + area.bottom()).min(f64::from(body.bottom()));
    if right - left < 1.0 || bottom - top < 1.0 {
        return None;
    }
    Some(Rect::new(
        left as u16,
        top as u16,
        (right - left) as u16,
        (bottom - top) as u16,
    ))
}

fn parse_hex_color(raw: &str) -> Option<Color> {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "black" => return Some(Color::Black),
        "white" => return Some(Color::White),
        _ => {}
    }
    let hex = trimmed.strip_prefix('#')?;
    let channel = |text: &str| u8::from_str_radix(text, 16).ok();
    match hex.len() {
        6 => Some(Color::Rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        3 => {
            let expand = |index: usize| channel(&hex[index..index + 1]).map(|value| value * 17);
            Some(Color::Rgb(expand(0)?, expand(1)?, expand(2)?))
        }
        _ => None,
    }
}

fn render(frame: &mut ratatui::Frame<'_>, view: &GridView) {
    let layout = screen_layout(frame.area());
    let page = &view.ctx.page;

    let title = format!("celledit > {}", view.title);
    frame.render_widget(
        Paragraph::new(title).style(Style::default().add_modifier(Modifier::BOLD)),
        layout.title,
    );

    let mut left = 0.0;
    for column in &view.columns {
        let area = PageRect::new(
            left - page.viewport.scroll_x,
            0.0,
            f64::from(column.width),
            1.0,
        );
        left += f64::from(column.width);
        if let Some(rect) = screen_rect(layout.header, area) {
            frame.render_widget(
                Paragraph::new(column.label.as_str()).style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                rect,
            );
        }
    }

    render_cells(frame, view, layout.body);
    render_choice_overlay(frame, view, layout.body);
    render_date_overlay(frame, view, layout.body);
    render_banners(frame, view, layout.body);

    frame.render_widget(
        Paragraph::new(status_text(view)).style(Style::default().fg(Color::Gray)),
        layout.status,
    );
}

fn render_cells(frame: &mut ratatui::Frame<'_>, view: &GridView, body: Rect) {
    let page = &view.ctx.page;
    let Some(document) = view.document() else {
        return;
    };
    let active = page.overlays.active();
    let idle = view.editor.editing().is_none();

    for (row_index, row) in document.rows().iter().enumerate() {
        for (column_index, cell) in row.cells.iter().enumerate() {
            let Some(cell_ref) = document.cell_ref(row_index, column_index) else {
                continue;
            };
            let Some(rect) = screen_rect(body, page.viewport.to_viewport(cell.rect)) else {
                continue;
            };

            let mut style = Style::default();
            if let Some(color) = cell.style.background.as_deref().and_then(parse_hex_color) {
                style = style.bg(color);
            }
            if let Some(color) = cell.style.color.as_deref().and_then(parse_hex_color) {
                style = style.fg(color);
            }
            if cell.style.flash == Some(Flash::Success) {
                style = style.bg(Color::Green).fg(Color::Black);
            }
            if page.overlays.is_pending(&cell_ref) {
                style = style.add_modifier(Modifier::DIM | Modifier::ITALIC);
            }
            let is_active = active.is_some_and(|active| active.cell == cell_ref);
            if is_active {
                style = style.add_modifier(Modifier::UNDERLINED | Modifier::BOLD);
            } else if idle && (row_index, column_index) == view.cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }

            frame.render_widget(Paragraph::new(cell.text.as_str()).style(style), rect);

            if is_active
                && active.is_some_and(|active| active.editor == ActiveEditor::Text)
                && cell.content_editable
            {
                let offset = u16::try_from(cell.text.chars().count()).unwrap_or(u16::MAX);
                let x = rect.x.saturating_add(offset).min(rect.right().saturating_sub(1));
                frame.set_cursor_position((x, rect.y));
            }
        }
    }
}

fn render_choice_overlay(frame: &mut ratatui::Frame<'_>, view: &GridView, body: Rect) {
    let page = &view.ctx.page;
    let Some(placement) = page.overlays.placement(OverlayKind::Choice) else {
        return;
    };
    let Some(rect) = screen_rect(body, page.viewport.to_viewport(placement.rect())) else {
        return;
    };

    let visible = usize::from(rect.height).max(1);
    let highlighted = view.ctx.choice.highlighted();
    let start = highlighted.saturating_sub(visible - 1);
    let lines = view
        .ctx
        .choice
        .items()
        .iter()
        .enumerate()
        .skip(start)
        .take(visible)
        .map(|(index, item)| {
            let marker = if item.selected { "* " } else { "  " };
            let label = if item.entry.is_clear() {
                "(clear)"
            } else {
                item.entry.label.as_str()
            };
            let mut style = Style::default().bg(Color::DarkGray).fg(Color::White);
            if let Some(color) = item.entry.bg_color.as_deref().and_then(parse_hex_color) {
                style = style.bg(color);
            }
            if let Some(color) = item.entry.text_color.as_deref().and_then(parse_hex_color) {
                style = style.fg(color);
            }
            if index == highlighted {
                style = style.add_modifier(Modifier::REVERSED);
            }
            Line::styled(format!("{marker}{label}"), style)
        })
        .collect::<Vec<Line>>();

    frame.render_widget(Clear, rect);
    frame.render_widget(Paragraph::new(lines), rect);
}

fn render_date_overlay(frame: &mut ratatui::Frame<'_>, view: &GridView, body: Rect) {
    let page = &view.ctx.page;
    let Some(placement) = page.overlays.placement(OverlayKind::Date) else {
        return;
    };
    let Some(rect) = screen_rect(body, page.viewport.to_viewport(placement.rect())) else {
        return;
    };

    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(render_date_overlay_text(&view.ctx.date))
            .block(Block::default().title("date").borders(Borders::ALL))
            .style(Style::default().fg(Color::White).bg(Color::Black)),
        rect,
    );
}

fn render_date_overlay_text(date: &DateFlyout) -> String {
    match date.kind() {
        DateInputKind::Calendar => match date.selected() {
            Some(selected) => format!("{} {}", format_date(selected), selected.weekday()),
            None => "no date".to_owned(),
        },
        DateInputKind::Plain => format!("{}_", date.input()),
    }
}

fn render_banners(frame: &mut ratatui::Frame<'_>, view: &GridView, body: Rect) {
    let page = &view.ctx.page;
    for banner in view.ctx.feedback.banners() {
        let Some(cell) = page.viewport_rect(&banner.cell) else {
            continue;
        };
        let width = (banner.message.chars().count() as f64 + 2.0).max(cell.width);
        let area = PageRect::new(cell.x, cell.bottom(), width, 1.0);
        let Some(rect) = screen_rect(body, area) else {
            continue;
        };
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(format!(" {}", banner.message))
                .style(Style::default().bg(Color::Red).fg(Color::White)),
            rect,
        );
    }
}

fn status_text(view: &GridView) -> String {
    let message = view.status.as_deref().unwrap_or(HELP_TEXT);
    let pending = view.pending_saves();
    if pending == 0 {
        format!("[{}] {message}", view.state().as_str())
    } else {
        format!("[{}] {message} ({pending} saving)", view.state().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        GridColumn, GridRuntime, GridView, InternalEvent, handle_key_event, handle_mouse_event,
        key_press, layout_rows, parse_hex_color, process_internal_events, render, screen_layout,
        screen_rect, terminal_settings,
    };
    use anyhow::Result;
    use celledit_app::{EditState, OverlayKind, Rect as PageRect, Row};
    use celledit_engine::{
        DateInputKind, Key, KeyPress, OptionQuery, Persistence, TableEditor,
    };
    use celledit_testkit::{
        CountingQuery, DUE_DATE, ScriptedPersistence, TASKS, TITLE, task_rows, tasks_config,
    };
    use crossterm::event::{
        KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    };
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::layout::Rect;
    use ratatui::style::Color;
    use std::sync::Arc;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::Duration;

    struct TestRuntime {
        rows: Vec<Row>,
        persistence: Arc<ScriptedPersistence>,
        queries: CountingQuery,
        loads: usize,
    }

    impl TestRuntime {
        fn new(persistence: ScriptedPersistence) -> Self {
            Self {
                rows: task_rows(),
                persistence: Arc::new(persistence),
                queries: CountingQuery::owners(),
                loads: 0,
            }
        }
    }

    impl GridRuntime for TestRuntime {
        fn load_rows(&mut self) -> Result<Vec<Row>> {
            self.loads += 1;
            Ok(self.rows.clone())
        }

        fn persistence(&self) -> Arc<dyn Persistence + Send + Sync> {
            self.persistence.clone()
        }

        fn queries(&self) -> &dyn OptionQuery {
            &self.queries
        }
    }

    fn task_columns() -> Vec<GridColumn> {
        vec![
            GridColumn::new("id", "id", 4),
            GridColumn::new("title", "title", 24),
            GridColumn::new("notes", "notes", 20),
            GridColumn::new("location", "location", 12),
            GridColumn::new("priority", "priority", 10),
            GridColumn::new("due_date", "due", 12),
            GridColumn::new("owner_id", "owner", 10),
            GridColumn::new("reviewer_id", "reviewer", 10),
        ]
    }

    fn body() -> Rect {
        screen_layout(Rect::new(0, 0, 110, 12)).body
    }

    fn loaded_view(runtime: &mut TestRuntime) -> GridView {
        let editor = TableEditor::new(TASKS, tasks_config()).expect("valid config");
        let mut view = GridView::new(
            "tasks",
            editor,
            task_columns(),
            terminal_settings(DateInputKind::Calendar),
        );
        view.resize(body());
        let rows = runtime.load_rows().expect("rows");
        view.load(rows);
        view
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn click_at(x: u16, y: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: x,
            row: y,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn run_keys(
        view: &mut GridView,
        runtime: &mut TestRuntime,
        tx: &Sender<InternalEvent>,
        keys: &[KeyEvent],
    ) -> bool {
        let mut quit = false;
        for key in keys {
            quit = handle_key_event(view, runtime, tx, *key);
        }
        quit
    }

    /// Waits for the background save, then feeds it back like the run loop.
    fn settle_save(
        view: &mut GridView,
        runtime: &TestRuntime,
        tx: &Sender<InternalEvent>,
        rx: &Receiver<InternalEvent>,
    ) {
        let event = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("save should finish");
        tx.send(event).expect("requeue event");
        process_internal_events(view, runtime, tx, rx);
    }

    fn screen_text(view: &GridView) -> String {
        let mut terminal = Terminal::new(TestBackend::new(110, 12)).expect("test terminal");
        terminal
            .draw(|frame| render(frame, view))
            .expect("draw should succeed");
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn keys_map_to_editor_presses() {
        assert_eq!(
            key_press(KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT)),
            Some(KeyPress::shifted(Key::Tab))
        );
        assert_eq!(
            key_press(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT)),
            Some(KeyPress::shifted(Key::Enter))
        );
        assert_eq!(
            key_press(KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Some(KeyPress::plain(Key::Char('A')))
        );
        assert_eq!(key_press(press(KeyCode::F(2))), None);
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#ff4863"), Some(Color::Rgb(255, 72, 99)));
        assert_eq!(parse_hex_color("#fff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(parse_hex_color("white"), Some(Color::White));
        assert_eq!(parse_hex_color("tomato"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }

    #[test]
    fn screen_rect_clips_to_body() {
        let body = Rect::new(0, 2, 20, 5);
        assert_eq!(
            screen_rect(body, PageRect::new(4.0, 1.0, 10.0, 1.0)),
            Some(Rect::new(4, 3, 10, 1))
        );
        assert_eq!(
            screen_rect(body, PageRect::new(15.0, 0.0, 10.0, 1.0)),
            Some(Rect::new(15, 2, 5, 1))
        );
        assert_eq!(screen_rect(body, PageRect::new(0.0, 9.0, 4.0, 1.0)), None);
        assert_eq!(screen_rect(body, PageRect::new(-6.0, 0.0, 4.0, 1.0)), None);
    }

    #[test]
    fn layout_rows_places_columns_side_by_side() {
        let rows = layout_rows(&task_columns(), task_rows());
        let second = &rows[1].cells;
        assert_eq!(second[0].rect, PageRect::new(0.0, 1.0, 4.0, 1.0));
        assert_eq!(second[1].rect, PageRect::new(4.0, 1.0, 24.0, 1.0));
        assert_eq!(second[2].rect.x, 28.0);
    }

    #[test]
    fn enter_edits_title_and_saves_in_background() {
        let mut runtime = TestRuntime::new(ScriptedPersistence::new());
        let mut view = loaded_view(&mut runtime);
        let (tx, rx) = mpsc::channel();

        run_keys(
            &mut view,
            &mut runtime,
            &tx,
            &[
                press(KeyCode::Enter),
                press(KeyCode::Char('!')),
                press(KeyCode::Enter),
            ],
        );
        assert_eq!(view.state(), EditState::Committing);
        assert_eq!(view.status(), Some("saving..."));

        settle_save(&mut view, &runtime, &tx, &rx);

        let sent = runtime.persistence.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].field, "title");
        assert_eq!(sent[0].value.as_deref(), Some("Clean gutters!"));
        assert_eq!(view.status(), Some("title saved: Clean gutters!"));
        assert_eq!(view.pending_saves(), 0);
        // Enter moves down a row after the save lands.
        assert_eq!(view.state(), EditState::TextEditing);
        assert_eq!(view.cursor(), (1, TITLE));
    }

    #[test]
    fn quit_waits_for_in_flight_saves() {
        let mut runtime = TestRuntime::new(ScriptedPersistence::new());
        let mut view = loaded_view(&mut runtime);
        let (tx, rx) = mpsc::channel();

        run_keys(
            &mut view,
            &mut runtime,
            &tx,
            &[
                press(KeyCode::Char('e')),
                press(KeyCode::Char('?')),
                press(KeyCode::Tab),
            ],
        );
        assert!(!run_keys(&mut view, &mut runtime, &tx, &[press(KeyCode::Char('q'))]));
        assert!(
            view.status()
                .is_some_and(|status| status.contains("still in flight"))
        );

        // Tab opens notes once the save lands.
        settle_save(&mut view, &runtime, &tx, &rx);
        assert_eq!(view.cursor(), (0, TITLE + 1));
        run_keys(&mut view, &mut runtime, &tx, &[press(KeyCode::Esc)]);
        assert!(run_keys(&mut view, &mut runtime, &tx, &[press(KeyCode::Char('q'))]));
    }

    #[test]
    fn reload_drops_late_save_results() {
        let mut runtime = TestRuntime::new(ScriptedPersistence::new());
        let mut view = loaded_view(&mut runtime);
        let (tx, rx) = mpsc::channel();

        run_keys(
            &mut view,
            &mut runtime,
            &tx,
            &[
                press(KeyCode::Enter),
                press(KeyCode::Backspace),
                press(KeyCode::Enter),
                press(KeyCode::Char('r')),
            ],
        );
        assert_eq!(runtime.loads, 2);

        settle_save(&mut view, &runtime, &tx, &rx);
        assert_eq!(view.status(), Some("rows reloaded; save result dropped"));
        assert_eq!(view.state(), EditState::Idle);
        assert_eq!(view.pending_saves(), 0);
    }

    #[test]
    fn clicking_a_choice_item_saves_it() {
        let mut runtime = TestRuntime::new(ScriptedPersistence::new());
        let mut view = loaded_view(&mut runtime);
        let (tx, rx) = mpsc::channel();
        let body = body();

        // Priority column starts at x = 4 + 24 + 20 + 12.
        handle_mouse_event(&mut view, &runtime, &tx, click_at(61, body.y), body);
        assert_eq!(view.state(), EditState::ChoiceOpen);

        let index = view
            .context()
            .choice
            .items()
            .iter()
            .position(|item| item.entry.id == "high")
            .expect("high option");
        let placement = *view
            .context()
            .page
            .overlays
            .placement(OverlayKind::Choice)
            .expect("choice placement");
        let y = body.y + placement.top as u16 + index as u16;
        handle_mouse_event(&mut view, &runtime, &tx, click_at(62, y), body);
        settle_save(&mut view, &runtime, &tx, &rx);

        let sent = runtime.persistence.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].field, "priority");
        assert_eq!(sent[0].value.as_deref(), Some("high"));
        assert_eq!(view.status(), Some("priority saved: High"));
    }

    #[test]
    fn clicking_outside_cancels_text_editing() {
        let mut runtime = TestRuntime::new(ScriptedPersistence::new());
        let mut view = loaded_view(&mut runtime);
        let (tx, _rx) = mpsc::channel();
        let body = body();

        run_keys(
            &mut view,
            &mut runtime,
            &tx,
            &[press(KeyCode::Enter), press(KeyCode::Char('x'))],
        );
        assert_eq!(view.state(), EditState::TextEditing);

        handle_mouse_event(&mut view, &runtime, &tx, click_at(2, 0), body);
        assert_eq!(view.state(), EditState::Idle);
        assert!(screen_text(&view).contains("Clean gutters "));
        assert_eq!(runtime.persistence.calls(), 0);
    }

    #[test]
    fn render_shows_rows_and_open_date_overlay() {
        let mut runtime = TestRuntime::new(ScriptedPersistence::new());
        let mut view = loaded_view(&mut runtime);
        let (tx, _rx) = mpsc::channel();

        let text = screen_text(&view);
        assert!(text.contains("celledit > tasks"));
        assert!(text.contains("Replace furnace filter"));
        assert!(text.contains("[idle]"));

        handle_mouse_event(&mut view, &runtime, &tx, click_at(71, body().y), body());
        assert_eq!(view.state(), EditState::DateOpen);
        let text = screen_text(&view);
        assert!(text.contains("2026-03-14 Saturday"));
        assert!(text.contains("[date]"));
    }

    #[test]
    fn click_inside_date_overlay_keeps_the_editor_on_its_cell() {
        let mut runtime = TestRuntime::new(ScriptedPersistence::new());
        let mut view = loaded_view(&mut runtime);
        let (tx, _rx) = mpsc::channel();

        handle_mouse_event(&mut view, &runtime, &tx, click_at(71, body().y), body());
        let first = view.editor().editing().expect("date editor open");
        assert_eq!((first.row, first.column), (0, DUE_DATE));

        // Two lines below the cell: inside the flyout, over row 2's due date.
        handle_mouse_event(&mut view, &runtime, &tx, click_at(72, body().y + 2), body());
        assert_eq!(view.editor().editing(), Some(first));
        assert_eq!(view.state(), EditState::DateOpen);
        assert!(view.context().page.overlays.is_visible(OverlayKind::Date));
    }
}
