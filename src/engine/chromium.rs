//! Chromium over CDP, via `chromiumoxide`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::element::Element as CdpElement;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page as CdpPage;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{Browser, BrowserContext, EngineError, EngineResult, Node, Page};
use crate::config::BrowserOptions;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const TEXT_CONTENT_FN: &str = "function() { return this.textContent; }";

fn browser_err(e: impl std::fmt::Display) -> EngineError {
    EngineError::Browser(e.to_string())
}

/// Blank tab that lives inside `context`.
fn blank_target(context: &BrowserContextId) -> EngineResult<CreateTargetParams> {
    CreateTargetParams::builder()
        .url("about:blank")
        .browser_context_id(context.clone())
        .build()
        .map_err(EngineError::Browser)
}

fn root_attribute_script(name: &str) -> EngineResult<String> {
    let quoted = serde_json::to_string(name).map_err(|e| EngineError::Script(e.to_string()))?;
    Ok(format!("document.documentElement.getAttribute({})", quoted))
}

pub struct ChromiumBrowser {
    browser: Arc<Mutex<CdpBrowser>>,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    pub async fn launch(options: &BrowserOptions) -> EngineResult<Self> {
        let (width, height) = options.viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Default::default()
            });
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(EngineError::Browser)?;

        let (browser, mut handler) = CdpBrowser::launch(config).await.map_err(browser_err)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });
        info!("Launched chromium ({}x{})", width, height);

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            handler,
        })
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn new_context(&self) -> EngineResult<Box<dyn BrowserContext>> {
        let id = self
            .browser
            .lock()
            .await
            .create_browser_context(CreateBrowserContextParams::default())
            .await
            .map_err(browser_err)?;
        debug!("Opened browser context {:?}", id);
        Ok(Box::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            id,
        }))
    }

    async fn close(&self) -> EngineResult<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(browser_err)?;
        if let Err(e) = browser.wait().await {
            debug!("Waiting for chromium to exit: {}", e);
        }
        self.handler.abort();
        Ok(())
    }
}

/// An incognito-style CDP browser context: its own cookies, storage and cache.
struct ChromiumContext {
    browser: Arc<Mutex<CdpBrowser>>,
    id: BrowserContextId,
}

#[async_trait]
impl BrowserContext for ChromiumContext {
    async fn new_page(&self) -> EngineResult<Box<dyn Page>> {
        let params = blank_target(&self.id)?;
        let page = self
            .browser
            .lock()
            .await
            .new_page(params)
            .await
            .map_err(browser_err)?;
        Ok(Box::new(ChromiumPage { page }))
    }

    /// Disposing the context also closes any page still open in it.
    async fn close(&self) -> EngineResult<()> {
        self.browser
            .lock()
            .await
            .dispose_browser_context(self.id.clone())
            .await
            .map_err(browser_err)
    }
}

struct ChromiumPage {
    page: CdpPage,
}

#[async_trait]
impl Node for ChromiumPage {
    async fn query(&self, selector: &str) -> EngineResult<Option<Box<dyn Node>>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> EngineResult<Vec<Box<dyn Node>>> {
        let elements = self.page.find_elements(selector).await.map_err(browser_err)?;
        Ok(wrap(elements))
    }

    async fn text_content(&self) -> EngineResult<Option<String>> {
        let value = self.evaluate("document.documentElement.textContent").await?;
        Ok(value.as_str().map(str::to_owned))
    }

    /// Attribute of the root `<html>` element.
    async fn attribute(&self, name: &str) -> EngineResult<Option<String>> {
        let value = self.evaluate(&root_attribute_script(name)?).await?;
        Ok(value.as_str().map(str::to_owned))
    }
}

#[async_trait]
impl Page for ChromiumPage {
    async fn goto(&self, url: &str) -> EngineResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| EngineError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> EngineResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(found) = self.page.find_elements(selector).await {
                if !found.is_empty() {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout {
                    selector: selector.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn evaluate(&self, script: &str) -> EngineResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| EngineError::Script(e.to_string()))?;
        // `undefined` has no JSON value
        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    async fn close(&self) -> EngineResult<()> {
        self.page.clone().close().await.map_err(browser_err)
    }

    fn as_node(&self) -> &dyn Node {
        self
    }
}

struct ChromiumElement {
    element: CdpElement,
}

fn wrap(elements: Vec<CdpElement>) -> Vec<Box<dyn Node>> {
    elements
        .into_iter()
        .map(|element| Box::new(ChromiumElement { element }) as Box<dyn Node>)
        .collect()
}

#[async_trait]
impl Node for ChromiumElement {
    async fn query(&self, selector: &str) -> EngineResult<Option<Box<dyn Node>>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> EngineResult<Vec<Box<dyn Node>>> {
        let elements = self
            .element
            .find_elements(selector)
            .await
            .map_err(browser_err)?;
        Ok(wrap(elements))
    }

    async fn text_content(&self) -> EngineResult<Option<String>> {
        let returns = self
            .element
            .call_js_fn(TEXT_CONTENT_FN, false)
            .await
            .map_err(|e| EngineError::Script(e.to_string()))?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_str().map(str::to_owned)))
    }

    async fn attribute(&self, name: &str) -> EngineResult<Option<String>> {
        self.element.attribute(name).await.map_err(browser_err)
    }
}
