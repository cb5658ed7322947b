// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use celledit_app::{
    ActiveCell, ActiveEditor, CellRef, CellSnapshot, ColorHints, EditEvent, EditMode, EditState,
    EditableColumn, OptionEntry, OptionSource, OverlayKind, Page, PatchPayload, TableConfig,
    TableId, ValidationError, normalize_value, parse_options, require_value,
};
use std::fmt;
use std::time::Instant;
use time::Date;
use tracing::{debug, error, info, warn};

use crate::{
    DateStep, Direction, Dispatch, Dispatcher, EditContext, EditError, EditResult, Key, KeyPress,
    OptionQuery, PatchAck, PendingCommit,
};

/// Handed to the commit hook after the server accepted an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub cell: CellRef,
    pub payload: PatchPayload,
    pub text: String,
}

/// A value an editor wants to save, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedEdit {
    pub value: Option<String>,
    pub text: String,
    pub hints: ColorHints,
    pub follow: Option<Direction>,
}

type CommitHook = Box<dyn FnMut(&CommitRecord)>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Session {
    cell: CellRef,
    column: EditableColumn,
    mode: EditMode,
    original: CellSnapshot,
}

impl Session {
    fn original_hints(&self) -> ColorHints {
        ColorHints {
            background: self.original.background.clone(),
            text: self.original.color.clone(),
        }
    }

    fn original_value(&self) -> Option<String> {
        normalize_value(
            self.original
                .value
                .as_deref()
                .unwrap_or(&self.original.text),
        )
    }
}

/// Inline editing for one rendered table. Everything shared with other
/// tables on the page arrives through [`EditContext`].
pub struct TableEditor {
    table: TableId,
    config: TableConfig,
    session: Option<Session>,
    on_commit: Option<CommitHook>,
}

impl fmt::Debug for TableEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableEditor")
            .field("table", &self.table)
            .field("config", &self.config)
            .field("session", &self.session)
            .field("on_commit", &self.on_commit.is_some())
            .finish()
    }
}

impl TableEditor {
    pub fn new(table: TableId, config: TableConfig) -> EditResult<Self> {
        if config.table.trim().is_empty() {
            return Err(EditError::Config(
                "table name is empty; set the table the edits should be saved to".to_owned(),
            ));
        }
        if config.id_key.trim().is_empty() {
            return Err(EditError::Config(format!(
                "table {:?} has no id key; name the column that identifies each row",
                config.table
            )));
        }
        if config.find_column(&config.id_key).is_some() {
            return Err(EditError::Config(format!(
                "id column {:?} of table {:?} cannot be editable",
                config.id_key, config.table
            )));
        }
        Ok(Self {
            table,
            config,
            session: None,
            on_commit: None,
        })
    }

    /// Runs after every accepted save, e.g. to refresh dependent views.
    pub fn on_commit(mut self, hook: impl FnMut(&CommitRecord) + 'static) -> Self {
        self.on_commit = Some(Box::new(hook));
        self
    }

    pub const fn table(&self) -> TableId {
        self.table
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn editing(&self) -> Option<CellRef> {
        self.session.as_ref().map(|session| session.cell)
    }

    pub fn state(&self, ctx: &EditContext) -> EditState {
        let active = ctx.page.overlays.active().map(|active| active.cell);
        match &self.session {
            Some(session) if active == Some(session.cell) => EditState::for_mode(session.mode),
            _ if ctx.page.overlays.pending_in(self.table) > 0 => EditState::Committing,
            _ => EditState::Idle,
        }
    }

    /// Forgets a session whose editor slot went to another cell.
    pub fn sync(&mut self, ctx: &mut EditContext) {
        let Some(session) = &self.session else {
            return;
        };
        let active = ctx.page.overlays.active().map(|active| active.cell);
        if active != Some(session.cell) {
            self.session = None;
            return;
        }
        if !ctx.page.is_attached(&session.cell) {
            let cell = session.cell;
            self.session = None;
            release(ctx, cell);
        }
    }

    /// The column config behind `cell`, if it is editable at all.
    pub fn editable_column(&self, page: &Page, cell: &CellRef) -> Option<EditableColumn> {
        if cell.table != self.table {
            return None;
        }
        let key = page.cell(cell)?.key.as_deref()?;
        if key == self.config.id_key {
            return None;
        }
        self.config.find_column(key).cloned()
    }

    pub fn click(
        &mut self,
        ctx: &mut EditContext,
        cell: CellRef,
        queries: &dyn OptionQuery,
    ) -> EditResult<Vec<EditEvent>> {
        self.sync(ctx);
        if cell.table != self.table {
            return Err(EditError::Config(format!(
                "cell belongs to table {} but this editor serves table {}",
                cell.table.get(),
                self.table.get()
            )));
        }
        if !ctx.page.is_attached(&cell) {
            return Err(EditError::Stale);
        }
        if ctx.page.overlays.is_pending(&cell) {
            debug!(
                table = %self.config.table,
                row = cell.row,
                column = cell.column,
                "click ignored while the cell is saving"
            );
            return Ok(Vec::new());
        }
        if self.editing() == Some(cell) {
            return Ok(Vec::new());
        }
        let Some(column) = self.editable_column(&ctx.page, &cell) else {
            return Ok(Vec::new());
        };

        let mut mode = column.mode;
        let mut options = Vec::new();
        if mode == EditMode::Choice {
            options = self.resolve_options(ctx, &cell, &column, queries);
            if options.is_empty() {
                mode = EditMode::Text;
            }
        }

        let Some(original) = ctx.page.cell(&cell).map(|target| target.snapshot()) else {
            return Err(EditError::Stale);
        };
        let editor = match mode {
            EditMode::Text => ActiveEditor::Text,
            EditMode::Choice => ActiveEditor::Overlay(OverlayKind::Choice),
            EditMode::Date => ActiveEditor::Overlay(OverlayKind::Date),
        };
        let displaced = match ctx.page.activate(ActiveCell {
            cell,
            snapshot: original.clone(),
            editor,
        }) {
            Ok(displaced) => displaced,
            Err(reason) => {
                debug!(table = %self.config.table, reason = ?reason, "editor slot denied");
                return Ok(Vec::new());
            }
        };
        ctx.choice.reset();
        ctx.date.reset();

        let mut events = Vec::new();
        if let Some(previous) = displaced {
            events.push(EditEvent::Displaced { cell: previous });
        }

        let metrics = ctx.settings.metrics;
        match mode {
            EditMode::Text => {
                if let Some(target) = ctx.page.cell_mut(&cell) {
                    target.content_editable = true;
                }
            }
            EditMode::Choice => {
                ctx.choice.show(&mut ctx.page, cell, options, &metrics);
            }
            EditMode::Date => {
                let today = ctx.today();
                ctx.date.show(&mut ctx.page, cell, &metrics, today);
            }
        }

        debug!(
            table = %self.config.table,
            field = column.field(),
            mode = mode.as_str(),
            row = cell.row,
            "editor opened"
        );
        self.session = Some(Session {
            cell,
            column,
            mode,
            original,
        });
        events.push(EditEvent::Opened { cell, mode });
        Ok(events)
    }

    /// Options for a choice cell: the cell's own `data-options` first, then
    /// the column's list or query. Empty means edit as text.
    fn resolve_options(
        &self,
        ctx: &mut EditContext,
        cell: &CellRef,
        column: &EditableColumn,
        queries: &dyn OptionQuery,
    ) -> Vec<OptionEntry> {
        let override_options = ctx
            .page
            .cell(cell)
            .and_then(|target| target.options_override.as_deref())
            .map(parse_options)
            .filter(|options| !options.is_empty());

        let mut options = match override_options {
            Some(options) => options,
            None => match &column.options {
                Some(OptionSource::Static(entries)) => entries.clone(),
                Some(OptionSource::Query(spec)) => match ctx.cache.get_or_fetch(spec, queries) {
                    Ok(entries) => entries,
                    Err(error) => {
                        warn!(
                            table = %self.config.table,
                            field = column.field(),
                            error = %format!("{error:#}"),
                            "option query failed; editing as text"
                        );
                        Vec::new()
                    }
                },
                None => Vec::new(),
            },
        };

        if !options.is_empty()
            && column.allow_blank
            && !options.iter().any(OptionEntry::is_clear)
        {
            options.insert(0, OptionEntry::clear());
        }
        options
    }

    pub fn input(&mut self, ctx: &mut EditContext, ch: char) -> bool {
        self.edit_text(ctx, |text| text.push(ch))
    }

    pub fn set_text(&mut self, ctx: &mut EditContext, value: &str) -> bool {
        self.edit_text(ctx, |text| *text = value.to_owned())
    }

    pub fn backspace(&mut self, ctx: &mut EditContext) -> bool {
        self.edit_text(ctx, |text| {
            text.pop();
        })
    }

    fn edit_text(&mut self, ctx: &mut EditContext, apply: impl FnOnce(&mut String)) -> bool {
        self.sync(ctx);
        let Some(session) = self.session.as_ref().filter(|s| s.mode == EditMode::Text) else {
            return false;
        };
        match ctx.page.cell_mut(&session.cell) {
            Some(target) => {
                apply(&mut target.text);
                true
            }
            None => false,
        }
    }

    pub fn key(
        &mut self,
        ctx: &mut EditContext,
        press: KeyPress,
        dispatcher: &mut dyn Dispatcher,
        queries: &dyn OptionQuery,
    ) -> EditResult<Vec<EditEvent>> {
        self.sync(ctx);
        let Some(mode) = self.session.as_ref().map(|session| session.mode) else {
            return Ok(Vec::new());
        };

        match (mode, press.key) {
            (_, Key::Escape) => Ok(self.cancel(ctx)),
            (EditMode::Text, Key::Enter | Key::Tab) => {
                self.commit_text(ctx, Direction::after(press), dispatcher, queries)
            }
            (EditMode::Text, Key::Char(ch)) => {
                self.input(ctx, ch);
                Ok(Vec::new())
            }
            (EditMode::Text, Key::Backspace) => {
                self.backspace(ctx);
                Ok(Vec::new())
            }
            (EditMode::Choice, Key::Up) => {
                ctx.choice.move_highlight(-1);
                Ok(Vec::new())
            }
            (EditMode::Choice, Key::Down) => {
                ctx.choice.move_highlight(1);
                Ok(Vec::new())
            }
            (EditMode::Choice, Key::Enter) => {
                let index = ctx.choice.highlighted();
                self.pick_choice(ctx, index, dispatcher, queries)
            }
            (EditMode::Date, Key::Enter) => self.pick_date(ctx, dispatcher, queries),
            (EditMode::Date, Key::Char(ch)) => {
                ctx.date.type_char(ch);
                Ok(Vec::new())
            }
            (EditMode::Date, Key::Backspace) => {
                ctx.date.backspace();
                Ok(Vec::new())
            }
            (EditMode::Date, key) => {
                if let Some(step) = date_step(key, press.shift) {
                    ctx.date.step(step);
                }
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Focus left a text cell without Enter, Tab or Escape.
    pub fn blur(&mut self, ctx: &mut EditContext) -> Vec<EditEvent> {
        self.sync(ctx);
        match self.session.as_ref().map(|session| session.mode) {
            Some(EditMode::Text) => self.cancel(ctx),
            _ => Vec::new(),
        }
    }

    pub fn cancel(&mut self, ctx: &mut EditContext) -> Vec<EditEvent> {
        self.sync(ctx);
        let Some(session) = self.session.take() else {
            return Vec::new();
        };
        abandon(ctx, &session);
        debug!(
            table = %self.config.table,
            field = session.column.field(),
            row = session.cell.row,
            "edit cancelled"
        );
        vec![EditEvent::Cancelled { cell: session.cell }]
    }

    fn commit_text(
        &mut self,
        ctx: &mut EditContext,
        follow: Option<Direction>,
        dispatcher: &mut dyn Dispatcher,
        queries: &dyn OptionQuery,
    ) -> EditResult<Vec<EditEvent>> {
        let Some(session) = self.session.clone() else {
            return Ok(Vec::new());
        };
        let typed = ctx
            .page
            .cell(&session.cell)
            .map(|target| target.text.clone())
            .unwrap_or_default();
        let value = normalize_value(&typed);

        if value == session.original_value() {
            self.session = None;
            abandon(ctx, &session);
            let mut events = vec![EditEvent::Unchanged { cell: session.cell }];
            if let Some(direction) = follow {
                events.extend(self.navigate(ctx, session.cell, direction, queries)?);
            }
            return Ok(events);
        }

        let edit = ProposedEdit {
            text: value.clone().unwrap_or_default(),
            value,
            hints: session.original_hints(),
            follow,
        };
        self.commit(ctx, edit, dispatcher, queries)
    }

    pub fn pick_choice(
        &mut self,
        ctx: &mut EditContext,
        index: usize,
        dispatcher: &mut dyn Dispatcher,
        queries: &dyn OptionQuery,
    ) -> EditResult<Vec<EditEvent>> {
        self.sync(ctx);
        let Some(session) = self
            .session
            .clone()
            .filter(|session| session.mode == EditMode::Choice)
        else {
            return Ok(Vec::new());
        };
        let Some(pick) = ctx.choice.pick(&mut ctx.page, index) else {
            return Ok(Vec::new());
        };

        if pick.value == session.original_value() {
            self.session = None;
            abandon(ctx, &session);
            return Ok(vec![EditEvent::Unchanged { cell: session.cell }]);
        }

        let edit = ProposedEdit {
            value: pick.value,
            text: pick.text,
            hints: pick.hints,
            follow: None,
        };
        self.commit(ctx, edit, dispatcher, queries)
    }

    /// Picks the listed option whose value is `id`.
    pub fn choose(
        &mut self,
        ctx: &mut EditContext,
        id: &str,
        dispatcher: &mut dyn Dispatcher,
        queries: &dyn OptionQuery,
    ) -> EditResult<Vec<EditEvent>> {
        self.sync(ctx);
        if self.session.as_ref().map(|session| session.mode) != Some(EditMode::Choice) {
            return Ok(Vec::new());
        }
        let Some(index) = ctx
            .choice
            .items()
            .iter()
            .position(|item| item.entry.id == id)
        else {
            return Err(ValidationError::UnknownOption.into());
        };
        self.pick_choice(ctx, index, dispatcher, queries)
    }

    pub fn pick_date(
        &mut self,
        ctx: &mut EditContext,
        dispatcher: &mut dyn Dispatcher,
        queries: &dyn OptionQuery,
    ) -> EditResult<Vec<EditEvent>> {
        self.sync(ctx);
        let Some(session) = self
            .session
            .clone()
            .filter(|session| session.mode == EditMode::Date)
        else {
            return Ok(Vec::new());
        };

        let pick = match ctx.date.pick(&mut ctx.page) {
            None => return Ok(Vec::new()),
            Some(Ok(pick)) => pick,
            Some(Err(invalid)) => {
                self.session = None;
                abandon(ctx, &session);
                let ttl = ctx.settings.banner_ttl;
                ctx.feedback
                    .error(session.cell, invalid.to_string(), Instant::now(), ttl);
                return Err(invalid.into());
            }
        };

        if pick.value == session.original_value() {
            self.session = None;
            abandon(ctx, &session);
            return Ok(vec![EditEvent::Unchanged { cell: session.cell }]);
        }

        let edit = ProposedEdit {
            value: pick.value,
            text: pick.text,
            hints: session.original_hints(),
            follow: None,
        };
        self.commit(ctx, edit, dispatcher, queries)
    }

    pub fn choose_date(
        &mut self,
        ctx: &mut EditContext,
        date: Date,
        dispatcher: &mut dyn Dispatcher,
        queries: &dyn OptionQuery,
    ) -> EditResult<Vec<EditEvent>> {
        self.sync(ctx);
        if self.session.as_ref().map(|session| session.mode) != Some(EditMode::Date) {
            return Ok(Vec::new());
        }
        ctx.date.select(date);
        self.pick_date(ctx, dispatcher, queries)
    }

    fn commit(
        &mut self,
        ctx: &mut EditContext,
        edit: ProposedEdit,
        dispatcher: &mut dyn Dispatcher,
        queries: &dyn OptionQuery,
    ) -> EditResult<Vec<EditEvent>> {
        let pending = self.begin_commit(ctx, edit)?;
        let mut events = vec![EditEvent::CommitStarted { cell: pending.cell }];
        match dispatcher.dispatch(&pending) {
            Dispatch::Done(result) => events.extend(self.finish_commit(ctx, pending, result, queries)?),
            Dispatch::InFlight => debug!(
                table = %pending.payload.table,
                field = %pending.payload.field,
                row = %pending.payload.id,
                "save dispatched"
            ),
        }
        Ok(events)
    }

    /// Validates the open edit, paints it optimistically and marks the cell
    /// as saving. The returned commit must be settled with
    /// [`TableEditor::finish_commit`].
    pub fn begin_commit(
        &mut self,
        ctx: &mut EditContext,
        edit: ProposedEdit,
    ) -> EditResult<PendingCommit> {
        let Some(session) = self.session.take() else {
            return Err(EditError::Config(
                "no edit is open on this table; click a cell first".to_owned(),
            ));
        };
        let cell = session.cell;
        if !ctx.page.is_attached(&cell) {
            release(ctx, cell);
            return Err(EditError::Stale);
        }

        let now = Instant::now();
        let ttl = ctx.settings.banner_ttl;
        let nullable = self.config.is_nullable(&session.column);
        if let Err(invalid) = require_value(edit.value.as_deref(), nullable) {
            abandon(ctx, &session);
            ctx.feedback.error(cell, invalid.to_string(), now, ttl);
            debug!(
                table = %self.config.table,
                field = session.column.field(),
                "blank value rejected"
            );
            return Err(invalid.into());
        }

        let Some(id) = ctx
            .page
            .document(cell.table)
            .and_then(|document| document.row_id(cell.row, &self.config.id_key))
        else {
            abandon(ctx, &session);
            let message = format!(
                "row {} of table {:?} has no {:?} cell; render the id column so edits can be saved",
                cell.row, self.config.table, self.config.id_key
            );
            ctx.feedback.error(cell, message.clone(), now, ttl);
            error!(table = %self.config.table, field = session.column.field(), "{message}");
            return Err(EditError::Config(message));
        };

        let payload = PatchPayload {
            table: self.config.table.clone(),
            field: session.column.field().to_owned(),
            id_key: self.config.id_key.clone(),
            id,
            value: edit.value.clone(),
        };
        if let Some(target) = ctx.page.cell_mut(&cell) {
            target.paint(edit.value.as_deref(), &edit.text, &edit.hints);
            target.content_editable = false;
        }
        release(ctx, cell);
        ctx.page.overlays.begin_pending(cell);
        info!(
            table = %payload.table,
            field = %payload.field,
            row = %payload.id,
            "saving cell"
        );

        Ok(PendingCommit {
            cell,
            payload,
            previous: session.original,
            text: edit.text,
            hints: edit.hints,
            follow: edit.follow,
        })
    }

    /// Settles a save. A table re-rendered in the meantime makes this a
    /// no-op.
    pub fn finish_commit(
        &mut self,
        ctx: &mut EditContext,
        pending: PendingCommit,
        result: Result<PatchAck>,
        queries: &dyn OptionQuery,
    ) -> EditResult<Vec<EditEvent>> {
        let cell = pending.cell;
        ctx.page.overlays.end_pending(&cell);
        if !ctx.page.is_attached(&cell) {
            debug!(
                table = %pending.payload.table,
                field = %pending.payload.field,
                row = %pending.payload.id,
                "table re-rendered; save result discarded"
            );
            return Ok(vec![EditEvent::Discarded { cell }]);
        }

        let now = Instant::now();
        let failure = match result {
            Ok(ack) if ack.success => None,
            Ok(ack) => Some(
                ack.message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "the server rejected the change".to_owned()),
            ),
            Err(error) => Some(format!("{error:#}")),
        };

        if let Some(message) = failure {
            if let Some(target) = ctx.page.cell_mut(&cell) {
                target.restore(&pending.previous);
            }
            let ttl = ctx.settings.banner_ttl;
            ctx.feedback.error(cell, message.clone(), now, ttl);
            warn!(
                table = %pending.payload.table,
                field = %pending.payload.field,
                row = %pending.payload.id,
                error = %message,
                "save failed; cell restored"
            );
            return Err(EditError::Transient(message));
        }

        if let Some(target) = ctx.page.cell_mut(&cell) {
            target.paint(
                pending.payload.value.as_deref(),
                &pending.text,
                &pending.hints,
            );
        }
        let ttl = ctx.settings.flash_ttl;
        ctx.feedback.flash(&mut ctx.page, cell, now, ttl);
        info!(
            table = %pending.payload.table,
            field = %pending.payload.field,
            row = %pending.payload.id,
            "cell saved"
        );

        let follow = pending.follow;
        let record = CommitRecord {
            cell,
            payload: pending.payload,
            text: pending.text,
        };
        if let Some(hook) = self.on_commit.as_mut() {
            hook(&record);
        }

        let mut events = vec![EditEvent::Committed {
            cell,
            value: record.payload.value,
            text: record.text,
        }];
        if let Some(direction) = follow {
            if ctx.page.overlays.active().is_none() {
                events.extend(self.navigate(ctx, cell, direction, queries)?);
            }
        }
        Ok(events)
    }

    /// Opens the neighbouring cell. Missing or read-only targets end editing.
    fn navigate(
        &mut self,
        ctx: &mut EditContext,
        from: CellRef,
        direction: Direction,
        queries: &dyn OptionQuery,
    ) -> EditResult<Vec<EditEvent>> {
        let Some((row, column)) = direction.step(from.row, from.column) else {
            return Ok(Vec::new());
        };
        let Some(to) = ctx
            .page
            .document(from.table)
            .filter(|document| document.generation() == from.generation)
            .and_then(|document| document.cell_ref(row, column))
        else {
            return Ok(Vec::new());
        };
        if self.editable_column(&ctx.page, &to).is_none() {
            return Ok(Vec::new());
        }

        ctx.page.scroll_into_view(&to);
        let mut events = vec![EditEvent::Moved { from, to }];
        events.extend(self.click(ctx, to, queries)?);
        Ok(events)
    }
}

fn date_step(key: Key, shift: bool) -> Option<DateStep> {
    match (key, shift) {
        (Key::Left, _) => Some(DateStep::Days(-1)),
        (Key::Right, _) => Some(DateStep::Days(1)),
        (Key::Up, _) => Some(DateStep::Days(-7)),
        (Key::Down, _) => Some(DateStep::Days(7)),
        (Key::PageUp, false) => Some(DateStep::Months(-1)),
        (Key::PageDown, false) => Some(DateStep::Months(1)),
        (Key::PageUp, true) => Some(DateStep::Years(-1)),
        (Key::PageDown, true) => Some(DateStep::Years(1)),
        _ => None,
    }
}

/// Drops the editor slot and flyouts if `cell` still holds them.
fn release(ctx: &mut EditContext, cell: CellRef) {
    if ctx.page.overlays.active().map(|active| active.cell) != Some(cell) {
        return;
    }
    ctx.page.overlays.clear_active();
    ctx.choice.close(&mut ctx.page);
    ctx.date.close(&mut ctx.page);
}

fn abandon(ctx: &mut EditContext, session: &Session) {
    if let Some(target) = ctx.page.cell_mut(&session.cell) {
        target.restore(&session.original);
    }
    release(ctx, session.cell);
}
