use std::process::{Command, Stdio};

use image::DynamicImage;
use image::imageops::FilterType;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use super::types::Phase;

const UPPER_HALF_BLOCK: &str = "\u{2580}";

pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

pub fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    let right = rect.x.saturating_add(rect.width);
    let bottom = rect.y.saturating_add(rect.height);
    x >= rect.x && x < right && y >= rect.y && y < bottom
}

pub fn open_url_in_browser(url: &str) -> Result<(), String> {
    if url.trim().is_empty() {
        return Err("empty URL".to_string());
    }

    #[cfg(target_os = "macos")]
    let mut command = {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    };

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", url]);
        cmd
    };

    #[cfg(all(not(target_os = "macos"), not(target_os = "windows")))]
    let mut command = {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| err.to_string())?;

    Ok(())
}

/// Draws `image` scaled to fit `width` x `height` cells. Each cell shows two
/// stacked pixels through an upper half block, so the fit box is
/// `width` x `2 * height` pixels. Rows are vertically centered.
pub fn strip_lines(image: &DynamicImage, width: u16, height: u16) -> Vec<Line<'static>> {
    if width == 0 || height == 0 || image.width() == 0 || image.height() == 0 {
        return Vec::new();
    }

    let scaled = image
        .resize(u32::from(width), u32::from(height) * 2, FilterType::Triangle)
        .to_rgb8();
    let (w, h) = scaled.dimensions();

    let rows = h.div_ceil(2);
    let pad = (u32::from(height).saturating_sub(rows) / 2) as usize;
    let mut lines = vec![Line::default(); pad];

    for y in (0..h).step_by(2) {
        let spans = (0..w)
            .map(|x| {
                let [tr, tg, tb] = scaled.get_pixel(x, y).0;
                let mut style = Style::default().fg(Color::Rgb(tr, tg, tb));
                if y + 1 < h {
                    let [br, bg, bb] = scaled.get_pixel(x, y + 1).0;
                    style = style.bg(Color::Rgb(br, bg, bb));
                }
                Span::styled(UPPER_HALF_BLOCK, style)
            })
            .collect::<Vec<_>>();
        lines.push(Line::from(spans));
    }

    lines
}

pub fn phase_style(phase: Phase) -> Style {
    match phase {
        Phase::Idle => Style::default().fg(Color::Gray),
        Phase::Loading => Style::default().fg(Color::Yellow),
        Phase::Displayed => Style::default().fg(Color::Green),
        Phase::NotFound => Style::default().fg(Color::Red),
        Phase::Error => Style::default()
            .fg(Color::LightRed)
            .add_modifier(Modifier::BOLD),
    }
}

pub fn button_style(enabled: bool) -> Style {
    if enabled {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}
