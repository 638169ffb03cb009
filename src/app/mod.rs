mod cache;
mod error;
mod extract;
mod fetch;
mod runtime;
mod session;
mod tui;
mod types;
mod ui_utils;

pub use runtime::run;
