use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use image::DynamicImage;
use serde::Serialize;

use super::extract::DEFAULT_ORIGIN;
use super::fetch::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};

pub const DEFAULT_CACHE_DIR: &str = "downloaded_comics";
pub const NOT_FOUND_STATUS: &str = "Comic not found or network error.";
pub const NOT_FOUND_PLACEHOLDER: &str = "Comic not found";
pub const IMAGE_ERROR_PLACEHOLDER: &str = "Error loading image";

#[derive(Debug, Parser, Clone)]
#[command(
    name = "stripview",
    version,
    about = "Terminal viewer for GoComics strips with prev/next navigation"
)]
pub struct Cli {
    /// Strip page to open, e.g. https://www.gocomics.com/pearlsbeforeswine
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    #[arg(long, value_name = "DIR", default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,

    #[arg(long, value_name = "UA", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Site origin that relative navigation links are resolved against
    #[arg(long, value_name = "URL", default_value = DEFAULT_ORIGIN)]
    pub origin: String,

    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_tui: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageResult {
    pub image_url: Option<String>,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub current_url: String,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
    pub cached_image_path: Option<PathBuf>,
}

impl NavigationState {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            current_url: start_url.into(),
            ..Self::default()
        }
    }

    pub fn can_go_prev(&self) -> bool {
        self.prev_url.is_some()
    }

    pub fn can_go_next(&self) -> bool {
        self.next_url.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Displayed,
    NotFound,
    Error,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Displayed => "displayed",
            Phase::NotFound => "not found",
            Phase::Error => "error",
        }
    }
}

/// Everything one page load produced, ready to hand to a display.
#[derive(Debug, Clone)]
pub struct PageView {
    pub nav: NavigationState,
    pub phase: Phase,
    pub image_url: Option<String>,
    pub image: Option<DynamicImage>,
    pub status: String,
    /// Why the load fell short, from the underlying `ViewerError`.
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HeadlessReport<'a> {
    pub url: &'a str,
    pub phase: Phase,
    pub status: &'a str,
    pub page: PageResult,
    pub cached_image_path: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

#[derive(Debug)]
pub enum ViewerEvent {
    Loading { url: String },
    Loaded(Box<PageView>),
    Status(String),
    Error(String),
    Finished,
}

#[derive(Debug, Clone)]
pub enum ViewerControl {
    ShowPrev,
    ShowNext,
    Reload,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavButton {
    Prev,
    Next,
}

impl NavButton {
    pub fn label(self) -> &'static str {
        match self {
            NavButton::Prev => "⏮ Previous",
            NavButton::Next => "Next ⏭",
        }
    }

    pub fn control(self) -> ViewerControl {
        match self {
            NavButton::Prev => ViewerControl::ShowPrev,
            NavButton::Next => ViewerControl::ShowNext,
        }
    }
}

#[derive(Default)]
pub struct AppState {
    pub nav: NavigationState,
    pub phase: Phase,
    pub loading: bool,
    pub image_url: Option<String>,
    pub image: Option<DynamicImage>,
    pub status: String,
    pub visited: usize,
    pub done: bool,
    pub errors: VecDeque<String>,
    pub status_messages: VecDeque<String>,
}

impl AppState {
    pub fn begin_loading(&mut self, url: String) {
        self.loading = true;
        self.phase = Phase::Loading;
        self.status = "Loading...".to_string();
        self.push_status(format!("loading {url}"));
    }

    pub fn apply_view(&mut self, view: PageView) {
        self.loading = false;
        self.visited += 1;
        self.phase = view.phase;
        self.image_url = view.image_url;
        self.image = view.image;
        self.status = view.status;
        self.nav = view.nav;
    }

    pub fn button_enabled(&self, button: NavButton) -> bool {
        !self.loading
            && match button {
                NavButton::Prev => self.nav.can_go_prev(),
                NavButton::Next => self.nav.can_go_next(),
            }
    }

    pub fn placeholder(&self) -> Option<&'static str> {
        match self.phase {
            Phase::Idle | Phase::Loading => None,
            Phase::Displayed if self.image.is_some() => None,
            Phase::Displayed | Phase::NotFound => Some(NOT_FOUND_PLACEHOLDER),
            Phase::Error => Some(IMAGE_ERROR_PLACEHOLDER),
        }
    }

    pub fn push_error(&mut self, error: String) {
        self.errors.push_front(stamped(error));
        while self.errors.len() > 10 {
            self.errors.pop_back();
        }
    }

    pub fn push_status(&mut self, message: String) {
        self.status_messages.push_front(stamped(message));
        while self.status_messages.len() > 50 {
            self.status_messages.pop_back();
        }
    }
}

fn stamped(message: String) -> String {
    format!("[{}] {message}", Local::now().format("%H:%M:%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(phase: Phase, prev: Option<&str>, next: Option<&str>) -> PageView {
        PageView {
            nav: NavigationState {
                current_url: "https://www.gocomics.com/x".to_string(),
                prev_url: prev.map(str::to_string),
                next_url: next.map(str::to_string),
                cached_image_path: None,
            },
            phase,
            image_url: None,
            image: None,
            status: NOT_FOUND_STATUS.to_string(),
            error: None,
        }
    }

    #[test]
    fn buttons_follow_known_links() {
        let mut state = AppState::default();
        state.apply_view(view(Phase::NotFound, Some("https://a"), None));
        assert!(state.button_enabled(NavButton::Prev));
        assert!(!state.button_enabled(NavButton::Next));
    }

    #[test]
    fn buttons_are_disabled_while_loading() {
        let mut state = AppState::default();
        state.apply_view(view(Phase::NotFound, Some("https://a"), Some("https://b")));
        state.begin_loading("https://a".to_string());
        assert_eq!(state.phase, Phase::Loading);
        assert_eq!(state.status, "Loading...");
        assert!(!state.button_enabled(NavButton::Prev));
        assert!(!state.button_enabled(NavButton::Next));
    }

    #[test]
    fn placeholder_tracks_phase() {
        let mut state = AppState::default();
        assert_eq!(state.placeholder(), None);
        state.apply_view(view(Phase::NotFound, None, None));
        assert_eq!(state.placeholder(), Some(NOT_FOUND_PLACEHOLDER));
        state.apply_view(view(Phase::Error, None, None));
        assert_eq!(state.placeholder(), Some(IMAGE_ERROR_PLACEHOLDER));
    }

    #[test]
    fn error_log_is_bounded() {
        let mut state = AppState::default();
        for idx in 0..25 {
            state.push_error(format!("e{idx}"));
        }
        assert_eq!(state.errors.len(), 10);
        assert!(state.errors[0].ends_with("e24"));
    }

    #[test]
    fn headless_report_serializes_page_fields_and_reason_only_when_set() {
        let page = PageResult {
            image_url: Some("https://assets.amuniversal.com/abc".to_string()),
            ..PageResult::default()
        };
        let report = HeadlessReport {
            url: "https://www.gocomics.com/x",
            phase: Phase::NotFound,
            status: NOT_FOUND_STATUS,
            page,
            cached_image_path: None,
            error: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["phase"], "not_found");
        assert_eq!(json["page"]["image_url"], "https://assets.amuniversal.com/abc");
        assert!(json.get("error").is_none());
        assert!(json.get("nav").is_none());

        let failed = HeadlessReport {
            error: Some("https://www.gocomics.com/x answered with http 404"),
            ..report
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"], "https://www.gocomics.com/x answered with http 404");
    }
}
