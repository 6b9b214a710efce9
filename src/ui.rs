use chrono::{DateTime, Local};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::model::{
    AppState, BrowserState, Entry, EntryKind, EntryStatus, Job, JobStatus, NavState, NoticeTone,
    Prompt, SortMode,
};

const COL_SEP: &str = "│";

pub fn render(frame: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], state);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
        .split(chunks[1]);
    render_browser(frame, body[0], &state.browser);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(body[1]);
    render_jobs(frame, side[0], &state.jobs);
    render_activity(frame, side[1], &state.activity_log);

    render_status_line(frame, chunks[2], state);
    render_footer(frame, chunks[3], state);

    if let Some(prompt) = state.prompt.as_ref() {
        render_prompt(frame, prompt);
    }
    if let Some(question) = state.confirm_prompt.as_deref() {
        render_confirm(frame, question);
    }
}

fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
    let location = match state.browser.nav.state() {
        NavState::AtRoot => "/".to_string(),
        NavState::InFolder(prefix) => format!("/{prefix}"),
    };
    let running = state.running_jobs();
    let mut spans = vec![
        Span::styled(
            " bucketfm ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " <{}> {}:{location}",
            state.store_label, state.bucket
        )),
    ];
    if state.browser.nav.depth() > 0 {
        spans.push(Span::styled(
            format!("  depth:{}", state.browser.nav.depth()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if running > 0 {
        spans.push(Span::styled(
            format!("  jobs:{running}"),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_browser(frame: &mut Frame, area: Rect, browser: &BrowserState) {
    let title = format!(
        "Files [{}]{}{}",
        sort_label(browser.sort_mode),
        search_suffix(browser),
        if browser.loading { " loading..." } else { "" },
    );
    let border_style = if browser.error_message.is_some() {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);

    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let mut lines = Vec::new();
    if let Some(error) = &browser.error_message {
        lines.push(Line::from(vec![
            Span::styled(
                "ERROR: ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw(error.clone()),
        ]));
    }

    if browser.entries.is_empty() {
        let placeholder = if browser.loading {
            "Loading..."
        } else if browser.search_query.is_empty() {
            "Empty folder"
        } else {
            "No matches"
        };
        lines.push(Line::styled(
            placeholder,
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(Paragraph::new(lines), inner);
        return;
    }

    let table_area = Rect {
        height: inner.height.saturating_sub(lines.len() as u16),
        ..inner
    };
    lines.extend(build_entry_lines(browser, table_area));
    frame.render_widget(Paragraph::new(lines), inner);
}

fn build_entry_lines(browser: &BrowserState, inner: Rect) -> Vec<Line<'static>> {
    let capacity = inner.height as usize;
    let total_width = inner.width as usize;
    if capacity <= 1 || total_width == 0 {
        return Vec::new();
    }

    let layout = fixed_table_layout(total_width);
    let rows_capacity = capacity.saturating_sub(1);
    let selected = browser
        .selected_index
        .min(browser.entries.len().saturating_sub(1));
    let start = visible_window_start(selected, browser.entries.len(), rows_capacity);
    let end = (start + rows_capacity).min(browser.entries.len());

    let mut lines = Vec::with_capacity(rows_capacity + 1);
    lines.push(render_table_header(layout));

    for (offset, entry) in browser.entries[start..end].iter().enumerate() {
        let base_style = if start + offset == selected {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let name_style = if start + offset == selected {
            base_style
        } else {
            kind_style(entry)
        };

        let name = entry_label(entry);
        let size_text = if entry.is_folder() {
            "-".to_string()
        } else {
            human_size(entry.size)
        };

        let mut spans = vec![Span::styled(
            pad_left(&name, layout.name_width()),
            name_style,
        )];
        match layout {
            TableLayout::Full {
                kind_width,
                status_width,
                size_width,
                modified_width,
                ..
            } => {
                spans.push(Span::styled(COL_SEP, base_style));
                spans.push(Span::styled(
                    pad_left(entry.kind.label(), kind_width),
                    base_style,
                ));
                spans.push(Span::styled(COL_SEP, base_style));
                spans.push(Span::styled(
                    pad_left(entry.status.label(), status_width),
                    base_style.patch(status_style(entry.status)),
                ));
                spans.push(Span::styled(COL_SEP, base_style));
                spans.push(Span::styled(pad_right(&size_text, size_width), base_style));
                spans.push(Span::styled(COL_SEP, base_style));
                spans.push(Span::styled(
                    pad_right(&format_modified_at(entry), modified_width),
                    base_style,
                ));
            }
            TableLayout::Compact { size_width, .. } => {
                spans.push(Span::styled(COL_SEP, base_style));
                spans.push(Span::styled(pad_right(&size_text, size_width), base_style));
            }
            TableLayout::Minimal { .. } => {}
        }
        lines.push(Line::from(spans));
    }

    lines
}

fn render_jobs(frame: &mut Frame, area: Rect, jobs: &[Job]) {
    let block = Block::default()
        .title("Jobs")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let capacity = inner.height as usize;
    let lines: Vec<Line> = jobs
        .iter()
        .rev()
        .take(capacity)
        .map(|job| {
            let text = format!(
                "#{} {} {} {}",
                job.id,
                job.kind.label(),
                job_status_label(job.status),
                job.target
            );
            Line::styled(
                truncate_name(&text, inner.width as usize),
                job_status_style(job.status),
            )
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_activity(frame: &mut Frame, area: Rect, activity_log: &[String]) {
    let block = Block::default()
        .title("Activity")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let capacity = inner.height as usize;
    let skip = activity_log.len().saturating_sub(capacity);
    let lines: Vec<Line> = activity_log[skip..]
        .iter()
        .map(|message| Line::raw(truncate_name(message, inner.width as usize)))
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_status_line(frame: &mut Frame, area: Rect, state: &AppState) {
    let (text, style) = match state.notice.as_ref() {
        Some(notice) => (notice.text.as_str(), notice_style(notice.tone)),
        None => (
            state.status_line.as_str(),
            Style::default().fg(Color::Gray).bg(Color::Black),
        ),
    };
    let text = fit_footer_cell_text(text, area.width as usize);
    frame.render_widget(Paragraph::new(Line::styled(text, style)), area);
}

fn render_footer(frame: &mut Frame, area: Rect, state: &AppState) {
    let mode = footer_mode(state);
    let mut cells = Vec::new();
    cells.push(FooterCellSpec {
        text: footer_mode_label(mode).to_string(),
        kind: FooterCellKind::Mode,
        enabled: true,
    });
    for button in build_footer_buttons(&state.browser, mode) {
        cells.push(FooterCellSpec {
            text: format!("{} {}", button.key, button.label),
            kind: FooterCellKind::Button,
            enabled: button.enabled,
        });
    }

    let spans = build_footer_spans(&cells, area.width as usize);
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn footer_mode(state: &AppState) -> FooterMode {
    if state.confirm_prompt.is_some() {
        FooterMode::Confirm
    } else if state.prompt.is_some() {
        FooterMode::Prompt
    } else {
        FooterMode::Normal
    }
}

fn footer_mode_label(mode: FooterMode) -> &'static str {
    match mode {
        FooterMode::Normal => "BROWSE",
        FooterMode::Prompt => "INPUT",
        FooterMode::Confirm => "CONFIRM",
    }
}

fn build_footer_buttons(browser: &BrowserState, mode: FooterMode) -> Vec<FooterButtonSpec> {
    match mode {
        FooterMode::Normal => {
            let selected = browser.selected_entry();
            let has_entry = selected.is_some();
            let has_file = selected.is_some_and(|entry| !entry.is_folder());
            vec![
                FooterButtonSpec::new("F2", "Rename", has_entry),
                FooterButtonSpec::new("F3", "Get", has_file),
                FooterButtonSpec::new("F4", "Put", true),
                FooterButtonSpec::new("F5", "Reload", true),
                FooterButtonSpec::new("F7", "Mkdir", true),
                FooterButtonSpec::new("F8", "Delete", has_entry),
                FooterButtonSpec::new("s", "Sort", true),
                FooterButtonSpec::new("/", "Find", true),
                FooterButtonSpec::new("Bksp", "Back", browser.nav.can_go_back()),
                FooterButtonSpec::new("F10", "Quit", true),
            ]
        }
        FooterMode::Prompt => vec![
            FooterButtonSpec::new("Enter", "OK", true),
            FooterButtonSpec::new("Esc", "Cancel", true),
        ],
        FooterMode::Confirm => vec![
            FooterButtonSpec::new("y", "Delete", true),
            FooterButtonSpec::new("n", "Cancel", true),
        ],
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FooterMode {
    Normal,
    Prompt,
    Confirm,
}

struct FooterButtonSpec {
    key: &'static str,
    label: &'static str,
    enabled: bool,
}

impl FooterButtonSpec {
    fn new(key: &'static str, label: &'static str, enabled: bool) -> Self {
        Self {
            key,
            label,
            enabled,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FooterCellKind {
    Mode,
    Button,
}

struct FooterCellSpec {
    text: String,
    kind: FooterCellKind,
    enabled: bool,
}

fn build_footer_spans(cells: &[FooterCellSpec], total_width: usize) -> Vec<Span<'static>> {
    if cells.is_empty() || total_width == 0 {
        return Vec::new();
    }

    let widths = distribute_width(total_width, cells.len());
    let mut spans = Vec::with_capacity(cells.len());
    for (cell, width) in cells.iter().zip(widths) {
        if width == 0 {
            continue;
        }
        let text = fit_footer_cell_text(cell.text.as_str(), width);
        spans.push(Span::styled(text, footer_cell_style(cell)));
    }
    spans
}

fn fit_footer_cell_text(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let mut value = truncate_name(text, width);
    let len = value.chars().count();
    if len >= width {
        return value;
    }
    value.push_str(&" ".repeat(width - len));
    value
}

fn distribute_width(total_width: usize, cells: usize) -> Vec<usize> {
    if cells == 0 {
        return Vec::new();
    }
    let base = total_width / cells;
    let rem = total_width % cells;
    (0..cells).map(|idx| base + usize::from(idx < rem)).collect()
}

fn footer_cell_style(cell: &FooterCellSpec) -> Style {
    match cell.kind {
        FooterCellKind::Mode => Style::default()
            .fg(Color::Black)
            .bg(Color::White)
            .add_modifier(Modifier::BOLD),
        FooterCellKind::Button if !cell.enabled => {
            Style::default().fg(Color::DarkGray).bg(Color::Blue)
        }
        FooterCellKind::Button => Style::default()
            .fg(Color::White)
            .bg(Color::Blue)
            .add_modifier(Modifier::BOLD),
    }
}

fn render_prompt(frame: &mut Frame, prompt: &Prompt) {
    let height = if prompt.error.is_some() { 7 } else { 6 };
    let area = centered_rect(70, height, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(prompt.title.as_str())
        .border_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(inner);

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let input = Paragraph::new(Line::styled(
        format!("{}|", prompt.value),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ))
    .block(input_block);
    frame.render_widget(input, chunks[0]);

    let hint = match prompt.error.as_deref() {
        Some(error) => Line::styled(error.to_string(), Style::default().fg(Color::Red)),
        None => Line::styled(
            "Enter to confirm, Esc to cancel",
            Style::default().fg(Color::DarkGray),
        ),
    };
    frame.render_widget(Paragraph::new(hint).alignment(Alignment::Center), chunks[1]);
}

fn render_confirm(frame: &mut Frame, question: &str) {
    let area = centered_rect(60, 5, frame.area());
    frame.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Delete")
        .border_style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD));
    let body = Paragraph::new(question)
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(body, area);
}

fn kind_style(entry: &Entry) -> Style {
    if entry.status == EntryStatus::Disabled {
        return Style::default().fg(Color::DarkGray);
    }
    match entry.kind {
        EntryKind::Folder => Style::default()
            .fg(Color::LightBlue)
            .add_modifier(Modifier::BOLD),
        EntryKind::Image => Style::default().fg(Color::Magenta),
        EntryKind::Pdf => Style::default().fg(Color::Red),
        EntryKind::Document => Style::default().fg(Color::Cyan),
        EntryKind::Video => Style::default().fg(Color::Yellow),
        EntryKind::Audio => Style::default().fg(Color::Green),
        EntryKind::File => Style::default(),
    }
}

fn status_style(status: EntryStatus) -> Style {
    match status {
        EntryStatus::Enabled => Style::default().fg(Color::Green),
        EntryStatus::Disabled => Style::default().fg(Color::DarkGray),
    }
}

fn notice_style(tone: NoticeTone) -> Style {
    let background = match tone {
        NoticeTone::Info => Color::Blue,
        NoticeTone::Success => Color::Green,
        NoticeTone::Error => Color::Red,
    };
    Style::default()
        .fg(Color::White)
        .bg(background)
        .add_modifier(Modifier::BOLD)
}

fn job_status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "queued",
        JobStatus::Running => "running",
        JobStatus::Done => "done",
        JobStatus::Failed => "failed",
    }
}

fn job_status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Queued => Style::default().fg(Color::DarkGray),
        JobStatus::Running => Style::default().fg(Color::Yellow),
        JobStatus::Done => Style::default().fg(Color::Green),
        JobStatus::Failed => Style::default().fg(Color::Red),
    }
}

#[derive(Clone, Copy)]
enum TableLayout {
    Full {
        name_width: usize,
        kind_width: usize,
        status_width: usize,
        size_width: usize,
        modified_width: usize,
    },
    Compact {
        name_width: usize,
        size_width: usize,
    },
    Minimal {
        name_width: usize,
    },
}

impl TableLayout {
    fn name_width(self) -> usize {
        match self {
            Self::Full { name_width, .. }
            | Self::Compact { name_width, .. }
            | Self::Minimal { name_width } => name_width,
        }
    }
}

fn fixed_table_layout(total_width: usize) -> TableLayout {
    if total_width < 14 {
        return TableLayout::Minimal {
            name_width: total_width.max(1),
        };
    }

    if total_width < 52 {
        let size_width = 8usize;
        let name_width = total_width.saturating_sub(size_width + 1).max(4);
        return TableLayout::Compact {
            name_width,
            size_width,
        };
    }

    let separators = 4usize;
    let kind_width = 6usize;
    let status_width = 7usize;
    let size_width = 8usize;
    let modified_width = 16usize;
    let name_width = total_width
        .saturating_sub(separators + kind_width + status_width + size_width + modified_width);

    TableLayout::Full {
        name_width,
        kind_width,
        status_width,
        size_width,
        modified_width,
    }
}

fn render_table_header(layout: TableLayout) -> Line<'static> {
    let text = match layout {
        TableLayout::Full {
            name_width,
            kind_width,
            status_width,
            size_width,
            modified_width,
        } => format!(
            "{:<name_width$}{COL_SEP}{:<kind_width$}{COL_SEP}{:<status_width$}{COL_SEP}{:>size_width$}{COL_SEP}{:>modified_width$}",
            "Name", "Type", "Status", "Size", "Modified",
        ),
        TableLayout::Compact {
            name_width,
            size_width,
        } => format!("{:<name_width$}{COL_SEP}{:>size_width$}", "Name", "Size"),
        TableLayout::Minimal { name_width } => format!("{:<name_width$}", "Name"),
    };

    Line::styled(
        text,
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
}

/// Folders get a trailing separator so they read as containers.
fn entry_label(entry: &Entry) -> String {
    if entry.is_folder() {
        format!("{}/", entry.display_name())
    } else {
        entry.display_name().to_string()
    }
}

fn pad_left(text: &str, width: usize) -> String {
    format!("{:<width$}", truncate_name(text, width))
}

fn pad_right(text: &str, width: usize) -> String {
    format!("{:>width$}", truncate_name(text, width))
}

fn truncate_name(name: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }

    let char_count = name.chars().count();
    if char_count <= width {
        return name.to_string();
    }

    if width <= 3 {
        return ".".repeat(width);
    }

    let mut truncated: String = name.chars().take(width - 3).collect();
    truncated.push_str("...");
    truncated
}

fn visible_window_start(selected: usize, total: usize, capacity: usize) -> usize {
    if total <= capacity {
        return 0;
    }
    let half = capacity / 2;
    let start = selected.saturating_sub(half);
    start.min(total.saturating_sub(capacity))
}

fn sort_label(mode: SortMode) -> &'static str {
    match mode {
        SortMode::Name => "name",
        SortMode::Size => "size",
        SortMode::ModifiedAt => "mtime",
    }
}

fn search_suffix(browser: &BrowserState) -> String {
    if browser.search_query.is_empty() {
        String::new()
    } else {
        format!("  /{}", browser.search_query)
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut size = bytes as f64;
    let mut unit_idx = 0usize;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{bytes}{}", UNITS[unit_idx])
    } else {
        format!("{size:.1}{}", UNITS[unit_idx])
    }
}

fn format_modified_at(entry: &Entry) -> String {
    let local: DateTime<Local> = entry.modified_at.with_timezone(&Local);
    local.format("%Y-%m-%d %H:%M").to_string()
}

fn centered_rect(width_percent: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(height),
            Constraint::Min(1),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}
