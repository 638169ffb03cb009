//! Pulls the strip image and the day-to-day navigation links out of a strip
//! page. Every lookup is a cascade: strategies are tried in order until one
//! yields a value, and a page that matches nothing simply produces empty
//! fields.

use scraper::{ElementRef, Html, Selector};

use super::types::PageResult;

pub const DEFAULT_ORIGIN: &str = "https://www.gocomics.com";

const STRIP_ASSET_HOSTS: [&str; 2] = ["assets.amuniversal.com", "featureassets.gocomics.com"];

type ImageStrategy = fn(&Html) -> Option<String>;
type NavStrategy = fn(&Html, &mut NavLinks);

const IMAGE_STRATEGIES: &[ImageStrategy] = &[og_image_content, strip_asset_img_src];
const NAV_STRATEGIES: &[NavStrategy] = &[links_by_rel, links_by_text];

#[derive(Debug, Default)]
struct NavLinks {
    prev: Option<String>,
    next: Option<String>,
}

impl NavLinks {
    fn complete(&self) -> bool {
        self.prev.is_some() && self.next.is_some()
    }
}

pub fn parse_page(html: &str, origin: &str) -> PageResult {
    let doc = Html::parse_document(html);

    let image_url = IMAGE_STRATEGIES.iter().find_map(|strategy| strategy(&doc));

    let mut links = NavLinks::default();
    for strategy in NAV_STRATEGIES {
        if links.complete() {
            break;
        }
        strategy(&doc, &mut links);
    }

    PageResult {
        image_url,
        prev_url: links.prev.and_then(|href| absolutize(&href, origin)),
        next_url: links.next.and_then(|href| absolutize(&href, origin)),
    }
}

/// Makes a site-relative link absolute against `origin`. Empty input has no
/// URL.
pub fn absolutize(href: &str, origin: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let origin = origin.trim_end_matches('/');
    if href.starts_with('/') {
        return Some(format!("{origin}{href}"));
    }
    Some(format!("{origin}/{}", href.trim_start_matches('/')))
}

fn og_image_content(doc: &Html) -> Option<String> {
    let selector = Selector::parse("meta[property=\"og:image\"]").ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

fn strip_asset_img_src(doc: &Html) -> Option<String> {
    let selector = Selector::parse("img[src]").ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .find(|src| STRIP_ASSET_HOSTS.iter().any(|host| src.contains(host)))
        .map(str::to_string)
}

fn links_by_rel(doc: &Html, links: &mut NavLinks) {
    let Ok(selector) = Selector::parse("a[rel]") else {
        return;
    };

    let rel_match = |token: &str| {
        doc.select(&selector)
            .find(|el| {
                el.value()
                    .attr("rel")
                    .is_some_and(|rel| rel.to_lowercase().contains(token))
            })
            .and_then(non_empty_href)
    };

    if links.prev.is_none() {
        links.prev = rel_match("prev");
    }
    if links.next.is_none() {
        links.next = rel_match("next");
    }
}

fn links_by_text(doc: &Html, links: &mut NavLinks) {
    let Ok(selector) = Selector::parse("a") else {
        return;
    };

    for el in doc.select(&selector) {
        let text = anchor_text(el);
        if text == "previous" || text.starts_with("previous ") {
            if links.prev.is_none() {
                links.prev = non_empty_href(el);
            }
        } else if (text == "next" || text.starts_with("next ")) && links.next.is_none() {
            links.next = non_empty_href(el);
        }
        if links.complete() {
            break;
        }
    }
}

/// Visible text with each text node trimmed and the pieces joined, lower-cased.
fn anchor_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect::<String>().to_lowercase()
}

fn non_empty_href(el: ElementRef<'_>) -> Option<String> {
    el.value()
        .attr("href")
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}
