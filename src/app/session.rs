//! The viewer's notion of "where am I": current strip URL plus the links to
//! the neighbouring strips, advanced one page load at a time.

use std::path::Path;

use image::{DynamicImage, ImageReader};
use tracing::{info, warn};

use super::cache::ImageCache;
use super::error::Result;
use super::extract::parse_page;
use super::fetch::PageSource;
use super::types::{NOT_FOUND_STATUS, NavigationState, PageResult, PageView, Phase};

pub struct Navigator<P, C> {
    pages: P,
    cache: C,
    origin: String,
    state: NavigationState,
    phase: Phase,
}

impl<P, C> Navigator<P, C>
where
    P: PageSource + Sync,
    C: ImageCache + Sync,
{
    pub fn new(pages: P, cache: C, origin: impl Into<String>, start_url: impl Into<String>) -> Self {
        Self {
            pages,
            cache,
            origin: origin.into(),
            state: NavigationState::new(start_url),
            phase: Phase::Idle,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Loads `url` and replaces the navigation state with what the page
    /// offered. Never fails: misses are reported through the returned phase.
    pub async fn show_page(&mut self, url: &str) -> (PageView, PageResult) {
        self.phase = Phase::Loading;
        info!(url, "loading strip page");

        let html = match self.pages.fetch_page(url).await {
            Ok(html) => html,
            Err(err) => {
                self.phase = Phase::NotFound;
                self.state = NavigationState::new(url);
                let reason = Some(err.to_string());
                let view = self.view(None, None, NOT_FOUND_STATUS.to_string(), reason);
                return (view, PageResult::default());
            }
        };

        let page = parse_page(&html, &self.origin);

        let mut cached_image_path = None;
        let mut image = None;
        let mut error = None;
        let status = match page.image_url.as_deref() {
            Some(image_url) => match self.cache.get_or_fetch(image_url).await {
                Ok(path) => {
                    let decoded = decode_image(&path);
                    cached_image_path = Some(path);
                    match decoded {
                        Ok(decoded) => {
                            self.phase = Phase::Displayed;
                            image = Some(decoded);
                            image_url.to_string()
                        }
                        Err(err) => {
                            warn!(image_url, "image decode failed: {err}");
                            self.phase = Phase::Error;
                            let status = format!("Image error: {err}");
                            error = Some(err.to_string());
                            status
                        }
                    }
                }
                Err(err) => {
                    self.phase = Phase::NotFound;
                    error = Some(err.to_string());
                    NOT_FOUND_STATUS.to_string()
                }
            },
            None => {
                warn!(url, "no strip image found on page");
                self.phase = Phase::NotFound;
                NOT_FOUND_STATUS.to_string()
            }
        };

        self.state = NavigationState {
            current_url: url.to_string(),
            prev_url: page.prev_url.clone(),
            next_url: page.next_url.clone(),
            cached_image_path,
        };
        let view = self.view(page.image_url.clone(), image, status, error);
        (view, page)
    }

    /// `None` when there is no previous strip to go to.
    pub async fn show_prev(&mut self) -> Option<PageView> {
        let url = self.state.prev_url.clone()?;
        Some(self.show_page(&url).await.0)
    }

    /// `None` when there is no next strip to go to.
    pub async fn show_next(&mut self) -> Option<PageView> {
        let url = self.state.next_url.clone()?;
        Some(self.show_page(&url).await.0)
    }

    pub async fn reload(&mut self) -> PageView {
        let url = self.state.current_url.clone();
        self.show_page(&url).await.0
    }

    fn view(
        &self,
        image_url: Option<String>,
        image: Option<DynamicImage>,
        status: String,
        error: Option<String>,
    ) -> PageView {
        PageView {
            nav: self.state.clone(),
            phase: self.phase,
            image_url,
            image,
            status,
            error,
        }
    }
}

fn decode_image(path: &Path) -> Result<DynamicImage> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image)
}
