use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use rand::Rng;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, Overlay};
use crate::form::SettingsForm;
use crate::history::{HistoryLog, HISTORY_LIMIT};
use crate::input::Focus;
use crate::playback::{Controller, Stage};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

const HELP: &str = "(space) start/stop  (r)eplay  (tab) answer  (enter) submit  (s)ettings  (h)istory  (q)uit";

impl<R: Rng> Widget for &App<R> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let controller = &self.controller;
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // status
                Constraint::Min(1),    // value
                Constraint::Length(1), // answer / outcome
                Constraint::Length(1), // correct answer
                Constraint::Length(1), // padding
                Constraint::Length(1), // help
            ])
            .split(area);

        Paragraph::new(Span::styled(status_line(controller), dim_style))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        render_center(self, chunks[1], buf);
        render_outcome(self, chunks[2], chunks[3], buf);

        Paragraph::new(Span::styled(HELP, dim_style.patch(bold_style)))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[5], buf);

        match &self.overlay {
            Overlay::None => {}
            Overlay::Settings(form) => render_settings(form, area, buf),
            Overlay::History { scroll } => render_history(controller.history(), *scroll, area, buf),
        }
    }
}

/// Describes the run on screen; while idle, the settings the next run will use.
fn status_line<R: Rng>(controller: &Controller<R>) -> String {
    let settings = match controller.stage() {
        Stage::Idle => controller.settings(),
        _ => controller.active(),
    };
    let mode = if settings.continuous_mode() {
        "continuous"
    } else {
        "manual"
    };
    let progress = match (controller.stage(), controller.sequence()) {
        (Stage::Flashing, Some(seq)) => format!("  {}/{}", controller.index() + 1, seq.len()),
        _ => String::new(),
    };
    format!(
        "{}{}  |  {} digits x {}  |  {}/{} ms  |  {}  |  narration {}",
        controller.stage(),
        progress,
        settings.digit_count(),
        settings.item_count(),
        settings.flash_duration().as_millis(),
        settings.interval_duration().as_millis(),
        mode,
        match (settings.narration_enabled(), controller.narrator().is_available()) {
            (false, _) => "off",
            (true, false) => "unavailable",
            (true, true) => settings.language_tag(),
        }
    )
}

fn render_center<R: Rng>(app: &App<R>, area: Rect, buf: &mut Buffer) {
    let controller = &app.controller;
    let value_style = Style::default()
        .add_modifier(Modifier::BOLD)
        .fg(Color::Yellow);

    let text = match controller.stage() {
        Stage::Idle => Span::styled(
            "Press space to start",
            Style::default().add_modifier(Modifier::ITALIC),
        ),
        Stage::Flashing => match controller.current_value() {
            Some(value) => Span::styled(value.to_string(), value_style),
            None => Span::raw(""),
        },
        Stage::AwaitingAnswer | Stage::ShowingResult => Span::styled("?", value_style),
    };
    vertically_centered(Paragraph::new(text).alignment(Alignment::Center), area, buf);
}

fn render_outcome<R: Rng>(app: &App<R>, first: Rect, second: Rect, buf: &mut Buffer) {
    let controller = &app.controller;
    let green_bold = Style::default().add_modifier(Modifier::BOLD).fg(Color::Green);
    let red_bold = Style::default().add_modifier(Modifier::BOLD).fg(Color::Red);

    match controller.stage() {
        Stage::AwaitingAnswer if controller.accepts_answer() => {
            let field_style = match app.focus {
                Focus::AnswerField => Style::default().add_modifier(Modifier::UNDERLINED),
                Focus::Controls => Style::default().add_modifier(Modifier::DIM),
            };
            let cursor = if app.focus == Focus::AnswerField { "_" } else { "" };
            let line = Line::from(vec![
                Span::raw("Answer: "),
                Span::styled(format!("{}{}", controller.answer(), cursor), field_style),
            ]);
            Paragraph::new(line)
                .alignment(Alignment::Center)
                .render(first, buf);
        }
        Stage::ShowingResult => {
            let Some(outcome) = controller.last_outcome() else {
                return;
            };
            let verdict = match outcome.is_correct() {
                Some(true) => Span::styled("✔ Correct!", green_bold),
                Some(false) => Span::styled("✘ Wrong", red_bold),
                None => Span::styled(format!("= {}", outcome.target_sum), green_bold),
            };
            Paragraph::new(verdict)
                .alignment(Alignment::Center)
                .render(first, buf);
            if outcome.submitted.is_some() {
                Paragraph::new(format!("Correct answer: {}", outcome.target_sum))
                    .alignment(Alignment::Center)
                    .render(second, buf);
            }
        }
        _ => {}
    }
}

fn vertically_centered(widget: Paragraph, area: Rect, buf: &mut Buffer) {
    let top = area.height.saturating_sub(1) / 2;
    let row = Rect::new(area.x, area.y + top, area.width, area.height.min(1));
    widget.render(row, buf);
}

/// A `width` x `height` rect centered in `area`, clamped to fit.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

/// Cut `text` to at most `max` display columns, marking the cut with '…'.
fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn render_settings(form: &SettingsForm, area: Rect, buf: &mut Buffer) {
    let rows = form.rows();
    let popup = centered_rect(48, rows.len() as u16 + 4, area);
    Clear.render(popup, buf);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Settings ")
        .title_bottom(Line::from(" ↑↓ select  ←→ change  esc close ").alignment(Alignment::Center));
    let inner = block.inner(popup);
    block.render(popup, buf);

    let selected = form.selected();
    let lines: Vec<Line> = rows
        .into_iter()
        .map(|(field, value)| {
            let style = if field == selected {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!(" {:<22}", field.to_string()), style),
                Span::styled(format!("{value:>8} "), style.add_modifier(Modifier::BOLD)),
            ])
        })
        .collect();
    Paragraph::new(lines).render(inner, buf);
}

fn render_history(history: &HistoryLog, scroll: usize, area: Rect, buf: &mut Buffer) {
    let height = (HISTORY_LIMIT as u16 + 2).min(area.height.saturating_sub(2));
    let popup = centered_rect(area.width.saturating_sub(8).max(20), height, area);
    Clear.render(popup, buf);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" History (last {HISTORY_LIMIT} entries) "));
    let inner = block.inner(popup);
    block.render(popup, buf);

    if history.is_empty() {
        Paragraph::new(Span::styled(
            "No history yet.",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(inner, buf);
        return;
    }

    let max = inner.width.saturating_sub(1) as usize;
    let lines: Vec<Line> = history
        .entries()
        .skip(scroll)
        .map(|entry| Line::from(format!(" {}", truncate_to_width(entry, max))))
        .collect();
    Paragraph::new(lines).render(inner, buf);
}
