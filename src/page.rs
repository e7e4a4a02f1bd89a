use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

/// State of the next-page control as currently rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextControl {
    pub disabled: bool,
}

/// Why advancing to the next page failed.
///
/// `Detached` is not a real failure: the control vanished from the DOM
/// between the state read and the click, which is how the site signals
/// the end of pagination on some category layouts. Everything else
/// aborts the traversal.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("next-page control detached from the rendered page")]
    Detached,
    #[error("navigation timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Renderer(#[from] anyhow::Error),
}

/// A live, rendered category page owned by one traversal.
///
/// The implementation wraps the external renderer; the crawler only
/// sees this contract, so tests script it directly.
#[async_trait]
pub trait CategoryPage: Send {
    /// Current page URL, used for log correlation and record source
    /// attribution only, never as a uniqueness key.
    fn current_url(&self) -> String;

    /// Inner HTML of every product tile on the page, in DOM order.
    async fn product_tiles(&mut self) -> Result<Vec<String>>;

    /// The pagination affordance, or `None` when the page has no
    /// next-page control at all.
    async fn next_control(&mut self) -> Result<Option<NextControl>>;

    /// Activate the next-page control and wait for the page to settle.
    async fn activate_next(&mut self) -> Result<(), NavigationError>;

    /// Full-page screenshot to `path`.
    async fn screenshot(&mut self, path: &Path) -> Result<()>;

    /// Release the page. Must be called on every exit path.
    async fn close(&mut self) -> Result<()>;
}
