//! Narrow boundary to the page-rendering engine.
//!
//! Everything above this module talks to a browser only through these
//! traits: contexts hand out pages, pages navigate and wait, and any
//! [`Node`] (the page document or an element inside it) can be queried for
//! descendants, text and attributes.

#[cfg(feature = "chromium")]
pub mod chromium;
#[cfg(test)]
pub mod fake;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("timed out after {timeout:?} waiting for `{selector}`")]
    Timeout { selector: String, timeout: Duration },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser error: {0}")]
    Browser(String),
}

/// Something that can be queried like a DOM node.
#[async_trait]
pub trait Node: Send + Sync {
    /// First descendant matching `selector`, if any.
    async fn query(&self, selector: &str) -> EngineResult<Option<Box<dyn Node>>>;

    /// Every descendant matching `selector`, snapshotted at call time.
    async fn query_all(&self, selector: &str) -> EngineResult<Vec<Box<dyn Node>>>;

    async fn nth(&self, selector: &str, index: usize) -> EngineResult<Option<Box<dyn Node>>> {
        Ok(self.query_all(selector).await?.into_iter().nth(index))
    }

    async fn text_content(&self) -> EngineResult<Option<String>>;

    async fn attribute(&self, name: &str) -> EngineResult<Option<String>>;
}

#[async_trait]
pub trait Page: Node {
    async fn goto(&self, url: &str) -> EngineResult<()>;

    /// Resolves once `selector` matches, or fails with [`EngineError::Timeout`].
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> EngineResult<()>;

    async fn evaluate(&self, script: &str) -> EngineResult<serde_json::Value>;

    /// Fixed settle delay for lazily rendered content.
    async fn wait_for_timeout(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    async fn close(&self) -> EngineResult<()> {
        Ok(())
    }

    fn as_node(&self) -> &dyn Node;
}

#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn new_page(&self) -> EngineResult<Box<dyn Page>>;

    async fn close(&self) -> EngineResult<()>;
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_context(&self) -> EngineResult<Box<dyn BrowserContext>>;

    async fn close(&self) -> EngineResult<()>;
}
