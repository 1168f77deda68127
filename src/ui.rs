//! UI rendering functions.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};
use unicode_width::UnicodeWidthChar;

use crate::app::{App, BackendHealth};
use crate::config::ConfigLoadStatus;
use crate::form::{FormError, FormField, TextInput};

const PROMPT_PLACEHOLDER: &str = "e.g., Explain the concept of black holes.";

/// Contract a path by replacing the home directory with `~` for display.
pub fn contract_path(path: &std::path::Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(suffix) = path.strip_prefix(&home)
    {
        return format!("~/{}", suffix.display());
    }
    path.display().to_string()
}

/// Formats a number with thousands separators (e.g., 7371 -> "7,371").
pub fn format_with_thousands(n: u64) -> String {
    let s = n.to_string();
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::new();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(*c);
    }
    result
}

/// Truncates a string to `max_width` terminal columns, appending "..." if cut.
/// Newlines become spaces.
pub fn truncate_str(s: &str, max_width: usize) -> String {
    let single_line: String = s.chars().map(|c| if c == '\n' { ' ' } else { c }).collect();
    let width: usize = single_line.chars().filter_map(|c| c.width()).sum();
    if width <= max_width {
        return single_line;
    }

    let budget = max_width.saturating_sub(3);
    let mut out = String::new();
    let mut used = 0;
    for c in single_line.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str("...");
    out
}

fn cursor_style() -> Style {
    Style::default().fg(Color::Black).bg(Color::White)
}

/// Render a text input as lines, drawing the cursor when focused.
pub fn input_lines(input: &TextInput, focused: bool) -> Vec<Line<'static>> {
    if !focused {
        return input
            .value()
            .split('\n')
            .map(|l| Line::raw(l.to_string()))
            .collect();
    }

    let (before, after) = input.split_at_cursor();
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();

    for (i, part) in before.split('\n').enumerate() {
        if i > 0 {
            lines.push(Line::from(std::mem::take(&mut current)));
        }
        current.push(Span::raw(part.to_string()));
    }

    // A cursor sitting on a line break or at the end is drawn as a block.
    let rest = match after.chars().next() {
        Some(c) if c != '\n' => {
            current.push(Span::styled(c.to_string(), cursor_style()));
            &after[c.len_utf8()..]
        }
        _ => {
            current.push(Span::styled(" ", cursor_style()));
            after
        }
    };

    for (i, part) in rest.split('\n').enumerate() {
        if i > 0 {
            lines.push(Line::from(std::mem::take(&mut current)));
        }
        current.push(Span::raw(part.to_string()));
    }
    lines.push(Line::from(current));
    lines
}

fn field_block(title: &str, focused: bool) -> Block<'_> {
    let (border_style, border_type) = if focused {
        (Style::default().fg(Color::Cyan), BorderType::Double)
    } else {
        (Style::default().fg(Color::DarkGray), BorderType::Rounded)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(title)
}

fn selector_line(label: &str, focused: bool) -> Line<'static> {
    let arrow_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Line::from(vec![
        Span::styled("◀ ", arrow_style),
        Span::styled(label.to_string(), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(" ▶", arrow_style),
    ])
}

pub fn draw_ui(f: &mut Frame, app: &mut App) {
    let error_height = match app.form.error() {
        Some(err) if err.detail().is_some() => 4,
        Some(_) => 3,
        None => 0,
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),            // Status panel
            Constraint::Length(2),            // Title
            Constraint::Length(7),            // Prompt
            Constraint::Length(3),            // Tone / Format / Persona
            Constraint::Length(1),            // Submit button
            Constraint::Length(error_height), // Error overlay
            Constraint::Min(3),               // Result
            Constraint::Length(1),            // Footer
        ])
        .split(f.area());

    draw_status_panel(f, app, chunks[0]);
    draw_title(f, chunks[1]);
    draw_prompt(f, app, chunks[2]);
    draw_selectors(f, app, chunks[3]);
    draw_submit_button(f, app, chunks[4]);
    if let Some(err) = app.form.error() {
        draw_error(f, err, chunks[5]);
    }
    draw_result(f, app, chunks[6]);
    draw_footer(f, chunks[7]);
}

fn draw_status_panel(f: &mut Frame, app: &App, area: Rect) {
    let (label, color) = if app.form.loading() {
        ("OPTIMIZING", Color::Green)
    } else {
        ("IDLE", Color::Cyan)
    };

    let mut spans = vec![
        Span::styled("● ", Style::default().fg(color)),
        Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw("    Session: "),
        Span::styled(
            app.session.session_id.clone().unwrap_or_else(|| "---".to_string()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("    Backend: "),
        Span::raw(truncate_str(&app.backend_label(), 40)),
        Span::raw(" "),
    ];

    spans.push(match &app.health {
        BackendHealth::Unknown => Span::styled("(unknown)", Style::default().fg(Color::DarkGray)),
        BackendHealth::Online(_) => Span::styled("(online)", Style::default().fg(Color::Green)),
        BackendHealth::Offline(_) => Span::styled("(offline)", Style::default().fg(Color::Red)),
    });

    spans.push(Span::raw("    "));
    if let Some(ref error) = app.session.logging_error {
        spans.push(Span::styled("⚠ ", Style::default().fg(Color::Yellow)));
        spans.push(Span::styled(error.clone(), Style::default().fg(Color::Yellow)));
    } else if let Some(ref log_dir) = app.session.log_directory {
        spans.push(Span::raw("Logs: "));
        spans.push(Span::styled(
            contract_path(log_dir),
            Style::default().add_modifier(Modifier::DIM),
        ));
    } else {
        spans.push(Span::raw("Logs: ---"));
    }

    if let ConfigLoadStatus::Error(ref msg) = app.session.config_status {
        spans.push(Span::raw("    "));
        spans.push(Span::styled(
            format!("⚠ {}: {}", contract_path(&app.session.config_path), msg),
            Style::default().fg(Color::Yellow),
        ));
    }

    let panel = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(color)),
    );
    f.render_widget(panel, area);
}

fn draw_title(f: &mut Frame, area: Rect) {
    let title = Paragraph::new(vec![
        Line::from(Span::styled(
            "Prompt Optimizer",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Enter your simple prompt and get a detailed, optimized version.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    f.render_widget(title, area);
}

fn draw_prompt(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.form.focus == FormField::Prompt;
    let block = field_block("Prompt", focused);

    let paragraph = if app.form.prompt.value().is_empty() && !focused {
        Paragraph::new(Span::styled(
            PROMPT_PLACEHOLDER,
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        // Keep the cursor's line in view.
        let (before, _) = app.form.prompt.split_at_cursor();
        let cursor_line = before.matches('\n').count() as u16;
        let inner_height = area.height.saturating_sub(2).max(1);
        let scroll = cursor_line.saturating_sub(inner_height - 1);
        Paragraph::new(input_lines(&app.form.prompt, focused))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0))
    };
    f.render_widget(paragraph.block(block), area);
}

fn draw_selectors(f: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(30),
            Constraint::Percentage(40),
        ])
        .split(area);

    let tone_focused = app.form.focus == FormField::Tone;
    f.render_widget(
        Paragraph::new(selector_line(app.form.tone.label(), tone_focused))
            .block(field_block("Tone", tone_focused)),
        columns[0],
    );

    let format_focused = app.form.focus == FormField::Format;
    f.render_widget(
        Paragraph::new(selector_line(app.form.format.label(), format_focused))
            .block(field_block("Format", format_focused)),
        columns[1],
    );

    let persona_focused = app.form.focus == FormField::Persona;
    let inner_width = columns[2].width.saturating_sub(2);
    // Scroll horizontally so the cursor stays visible.
    let scroll_x = (app.form.persona.cursor() as u16).saturating_sub(inner_width.saturating_sub(1));
    let persona_line = input_lines(&app.form.persona, persona_focused)
        .into_iter()
        .next()
        .unwrap_or_default();
    f.render_widget(
        Paragraph::new(persona_line)
            .scroll((0, scroll_x))
            .block(field_block("AI Persona", persona_focused)),
        columns[2],
    );
}

fn draw_submit_button(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.form.focus == FormField::SubmitButton;
    let label = if app.form.loading() {
        " Optimizing... "
    } else {
        " Optimize Prompt "
    };
    let style = if app.form.loading() {
        Style::default().fg(Color::Black).bg(Color::DarkGray)
    } else if focused {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let button = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(format!("[{}]", label), style),
    ]));
    f.render_widget(button, area);
}

fn draw_error(f: &mut Frame, err: &FormError, area: Rect) {
    let mut lines = vec![Line::from(Span::styled(
        err.message.clone(),
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ))];
    if let Some(detail) = err.detail() {
        lines.push(Line::from(Span::styled(
            detail,
            Style::default().fg(Color::Red).add_modifier(Modifier::DIM),
        )));
    }
    let panel = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Double)
            .border_style(Style::default().fg(Color::Red)),
    );
    f.render_widget(panel, area);
}

fn draw_result(f: &mut Frame, app: &mut App, area: Rect) {
    let Some(result) = app.form.result().cloned() else {
        app.result_pane_height = 0;
        app.result_pane_width = 0;
        return;
    };

    let original_lines = result.original_prompt.lines().count().clamp(1, 4) as u16;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(original_lines + 2), // Original prompt
            Constraint::Min(3),                     // Elaborated prompt
            Constraint::Length(1),                  // Token count
        ])
        .split(area);

    let original = Paragraph::new(result.original_prompt.as_str())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title("Original Prompt"),
        );
    f.render_widget(original, rows[0]);

    app.result_pane_height = rows[1].height.saturating_sub(2);
    app.result_pane_width = rows[1].width.saturating_sub(2);
    // The region may have shrunk since the last scroll.
    app.result_scroll = app.result_scroll.min(app.max_scroll());

    let content: Vec<Line> = result.elaborated_prompt.split('\n').map(Line::raw).collect();
    let elaborated = Paragraph::new(content)
        .wrap(Wrap { trim: false })
        .scroll((app.result_scroll, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::White))
                .title("Elaborated Prompt"),
        );
    f.render_widget(elaborated, rows[1]);

    let token_line = Paragraph::new(Line::from(vec![
        Span::raw(" Token Count: "),
        Span::styled(
            format_with_thousands(result.token_count),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]));
    f.render_widget(token_line, rows[2]);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let footer = Paragraph::new(Line::from(vec![Span::styled(
        "[Tab] Next field  [←/→] Change  [Ctrl+S] Optimize  [PgUp/PgDn] Scroll  [Esc] Dismiss  [Ctrl+C] Quit",
        Style::default().fg(Color::DarkGray),
    )]));
    f.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_format_with_thousands() {
        assert_eq!(format_with_thousands(0), "0");
        assert_eq!(format_with_thousands(999), "999");
        assert_eq!(format_with_thousands(7371), "7,371");
        assert_eq!(format_with_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("a\nb", 10), "a b");
        assert_eq!(truncate_str("http://very-long-host:8000", 12), "http://ve...");
        // Wide characters count as two columns.
        assert_eq!(truncate_str("日本語テキスト", 7), "日本...");
    }

    #[test]
    fn test_input_lines_unfocused_splits_on_newlines() {
        let input = TextInput::new("one\ntwo");
        let lines = input_lines(&input, false);
        assert_eq!(lines.len(), 2);
        assert_eq!(line_text(&lines[0]), "one");
        assert_eq!(line_text(&lines[1]), "two");
    }

    #[test]
    fn test_input_lines_cursor_at_end() {
        let input = TextInput::new("abc");
        let lines = input_lines(&input, true);
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "abc ");
        assert_eq!(lines[0].spans[1].style, cursor_style());
    }

    #[test]
    fn test_input_lines_cursor_mid_text() {
        let mut input = TextInput::new("ab\ncd");
        input.cursor_home();
        input.cursor_right();
        let lines = input_lines(&input, true);
        assert_eq!(lines.len(), 2);
        assert_eq!(line_text(&lines[0]), "ab");
        assert_eq!(lines[0].spans[1].content, "b");
        assert_eq!(line_text(&lines[1]), "cd");
    }

    #[test]
    fn test_input_lines_cursor_on_line_break() {
        let mut input = TextInput::new("ab\ncd");
        input.cursor_home();
        input.cursor_right();
        input.cursor_right();
        let lines = input_lines(&input, true);
        assert_eq!(lines.len(), 2);
        assert_eq!(line_text(&lines[0]), "ab ");
        assert_eq!(line_text(&lines[1]), "cd");
    }

    #[test]
    fn test_contract_path_outside_home() {
        assert_eq!(
            contract_path(std::path::Path::new("/var/log/app")),
            "/var/log/app"
        );
    }
}
