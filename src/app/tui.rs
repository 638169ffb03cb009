use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, MouseButton, MouseEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use super::runtime::handle_viewer_event;
use super::types::{AppState, NavButton, ViewerControl, ViewerEvent};
use super::ui_utils::{
    button_style, centered_rect, open_url_in_browser, phase_style, point_in_rect, strip_lines,
};

/// Scaled strip lines for one page at one image-area size.
struct RenderedStrip {
    visited: usize,
    width: u16,
    height: u16,
    lines: Vec<Line<'static>>,
}

pub fn draw_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    session_label_input: &str,
    control_tx: UnboundedSender<ViewerControl>,
    rx: &mut UnboundedReceiver<ViewerEvent>,
) -> io::Result<()> {
    let session_label = session_label_input.to_string();
    let mut state = AppState::default();
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(120);
    let mut help_mode = false;
    let mut rendered: Option<RenderedStrip> = None;
    let mut prev_button_area: Option<Rect> = None;
    let mut next_button_area: Option<Rect> = None;

    loop {
        while let Ok(event) = rx.try_recv() {
            handle_viewer_event(&mut state, event);
        }

        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(8),
                    Constraint::Length(3),
                    Constraint::Length(3),
                    Constraint::Length(6),
                ])
                .split(f.area());

            let metric_label = Style::default().fg(Color::Gray);
            let sep_style = Style::default().fg(Color::DarkGray);
            let current = if state.nav.current_url.is_empty() {
                session_label.as_str()
            } else {
                state.nav.current_url.as_str()
            };
            let header = Paragraph::new(Line::from(vec![
                Span::styled("Strip ", metric_label),
                Span::styled(current.to_string(), Style::default().fg(Color::White)),
                Span::styled("  |  ", sep_style),
                Span::styled(state.phase.label(), phase_style(state.phase)),
                Span::styled("  |  ", sep_style),
                Span::styled("Viewed ", metric_label),
                Span::styled(
                    state.visited.to_string(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
            ]))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("GoComics.com Comic Viewer (? for help, q to quit)"),
            );
            f.render_widget(header, chunks[0]);

            let image_title = match state.image_url.as_deref() {
                Some(image_url) if !state.loading => format!("Strip  {image_url}"),
                _ => "Strip".to_string(),
            };
            let image_block = Block::default().borders(Borders::ALL).title(image_title);
            let image_area = image_block.inner(chunks[1]);
            f.render_widget(image_block, chunks[1]);
            if let Some(image) = state.image.as_ref() {
                let stale = rendered.as_ref().is_none_or(|r| {
                    r.visited != state.visited
                        || r.width != image_area.width
                        || r.height != image_area.height
                });
                if stale {
                    rendered = Some(RenderedStrip {
                        visited: state.visited,
                        width: image_area.width,
                        height: image_area.height,
                        lines: strip_lines(image, image_area.width, image_area.height),
                    });
                }
            } else {
                rendered = None;
            }

            let body = if state.loading {
                Paragraph::new(Line::from(Span::styled(
                    "Loading...",
                    Style::default().fg(Color::Yellow),
                )))
            } else if let Some(placeholder) = state.placeholder() {
                Paragraph::new(Line::from(Span::styled(
                    placeholder,
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                )))
            } else if let Some(strip) = rendered.as_ref() {
                Paragraph::new(strip.lines.clone())
            } else {
                Paragraph::new("")
            };
            f.render_widget(body.alignment(Alignment::Center), image_area);

            let button_row = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Percentage(30),
                    Constraint::Percentage(20),
                    Constraint::Percentage(20),
                    Constraint::Percentage(30),
                ])
                .split(chunks[2]);
            prev_button_area = Some(button_row[1]);
            next_button_area = Some(button_row[2]);
            for (button, area) in [(NavButton::Prev, button_row[1]), (NavButton::Next, button_row[2])]
            {
                let style = button_style(state.button_enabled(button));
                f.render_widget(
                    Paragraph::new(Span::styled(button.label(), style))
                        .alignment(Alignment::Center)
                        .block(Block::default().borders(Borders::ALL).border_style(style)),
                    area,
                );
            }

            f.render_widget(
                Paragraph::new(Span::styled(state.status.clone(), Style::default().fg(Color::Gray)))
                    .alignment(Alignment::Center)
                    .block(Block::default().borders(Borders::ALL).title("Status")),
                chunks[3],
            );

            let mut log_lines = state
                .errors
                .iter()
                .take(2)
                .map(|err| Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))))
                .collect::<Vec<_>>();
            log_lines.extend(
                state
                    .status_messages
                    .iter()
                    .take(4)
                    .map(|msg| Line::from(Span::styled(msg.clone(), metric_label))),
            );
            f.render_widget(
                Paragraph::new(log_lines)
                    .block(Block::default().borders(Borders::ALL).title("Messages"))
                    .wrap(Wrap { trim: true }),
                chunks[4],
            );

            if help_mode {
                let area = centered_rect(60, 50, f.area());
                f.render_widget(Clear, area);
                f.render_widget(
                    Paragraph::new(vec![
                        Line::from("Left / h / p    previous strip"),
                        Line::from("Right / l / n   next strip"),
                        Line::from("r               reload current strip"),
                        Line::from("o               open current strip in browser"),
                        Line::from("click           press Previous / Next"),
                        Line::from("q / Esc         quit"),
                        Line::from(""),
                        Line::from("Esc, Enter or ? closes this help."),
                    ])
                    .block(
                        Block::default()
                            .title("Help")
                            .borders(Borders::ALL)
                            .border_style(Style::default().fg(Color::Yellow)),
                    )
                    .wrap(Wrap { trim: false }),
                    area,
                );
            }
        })?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    if help_mode {
                        if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('?')) {
                            help_mode = false;
                        }
                    } else {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => {
                                let _ = control_tx.send(ViewerControl::Shutdown);
                                break;
                            }
                            KeyCode::Char('?') => help_mode = true,
                            KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('p') => {
                                press(&mut state, &control_tx, NavButton::Prev);
                            }
                            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('n') => {
                                press(&mut state, &control_tx, NavButton::Next);
                            }
                            KeyCode::Char('r') => {
                                if state.loading {
                                    state.push_status("still loading, reload ignored".to_string());
                                } else if control_tx.send(ViewerControl::Reload).is_err() {
                                    state.push_error("viewer session has stopped".to_string());
                                } else {
                                    state.loading = true;
                                }
                            }
                            KeyCode::Char('o') => {
                                if let Err(err) = open_url_in_browser(&state.nav.current_url) {
                                    state.push_error(format!(
                                        "failed to open strip in browser: {err}"
                                    ));
                                }
                            }
                            _ => {}
                        }
                    }
                }
                Event::Mouse(mouse) => {
                    if !help_mode && matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) {
                        if let Some(area) = prev_button_area
                            && point_in_rect(mouse.column, mouse.row, area)
                        {
                            press(&mut state, &control_tx, NavButton::Prev);
                        } else if let Some(area) = next_button_area
                            && point_in_rect(mouse.column, mouse.row, area)
                        {
                            press(&mut state, &control_tx, NavButton::Next);
                        }
                    }
                }
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if state.done {
            break;
        }
    }

    Ok(())
}

/// Sends a navigation request unless the button is disabled. Requests made
/// while a page is loading are dropped rather than queued.
fn press(state: &mut AppState, control_tx: &UnboundedSender<ViewerControl>, button: NavButton) {
    if state.loading {
        state.push_status("still loading, navigation ignored".to_string());
        return;
    }
    if !state.button_enabled(button) {
        return;
    }
    if control_tx.send(button.control()).is_err() {
        state.push_error("viewer session has stopped".to_string());
        return;
    }
    state.loading = true;
}
