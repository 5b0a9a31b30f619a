//! HTTP request handlers.

mod dependencies;
mod events;
mod packages;
mod pages;

pub(crate) use dependencies::serve_dependency;
pub(crate) use events::events;
pub(crate) use packages::redirect_package;
pub(crate) use pages::serve_page;
