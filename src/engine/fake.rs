//! In-memory engine for tests. Selectors are matched as exact keys.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Browser, BrowserContext, EngineError, EngineResult, Node, Page};

#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    text: Option<String>,
    attrs: HashMap<String, String>,
    children: HashMap<String, Vec<FakeNode>>,
}

impl FakeNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn child(mut self, selector: &str, node: FakeNode) -> Self {
        self.children
            .entry(selector.to_string())
            .or_default()
            .push(node);
        self
    }

    fn select(&self, selector: &str) -> Vec<Box<dyn Node>> {
        self.children
            .get(selector)
            .map(|nodes| {
                nodes
                    .iter()
                    .map(|n| Box::new(n.clone()) as Box<dyn Node>)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Node for FakeNode {
    async fn query(&self, selector: &str) -> EngineResult<Option<Box<dyn Node>>> {
        Ok(self.select(selector).into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> EngineResult<Vec<Box<dyn Node>>> {
        Ok(self.select(selector))
    }

    async fn text_content(&self) -> EngineResult<Option<String>> {
        Ok(self.text.clone())
    }

    async fn attribute(&self, name: &str) -> EngineResult<Option<String>> {
        Ok(self.attrs.get(name).cloned())
    }
}

#[derive(Default)]
struct Shared {
    visits: Mutex<Vec<String>>,
    scripts: Mutex<Vec<String>>,
    contexts: AtomicUsize,
}

/// Serves canned documents keyed by URL. Unknown URLs fail navigation.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    documents: Arc<HashMap<String, FakeNode>>,
    shared: Arc<Shared>,
}

impl FakeBrowser {
    pub fn new(documents: impl IntoIterator<Item = (String, FakeNode)>) -> Self {
        Self {
            documents: Arc::new(documents.into_iter().collect()),
            shared: Arc::default(),
        }
    }

    pub fn visits(&self) -> Vec<String> {
        self.shared.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.shared.scripts.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn contexts_opened(&self) -> usize {
        self.shared.contexts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_context(&self) -> EngineResult<Box<dyn BrowserContext>> {
        self.shared.contexts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }

    async fn close(&self) -> EngineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl BrowserContext for FakeBrowser {
    async fn new_page(&self) -> EngineResult<Box<dyn Page>> {
        Ok(Box::new(FakePage {
            browser: self.clone(),
            current: Mutex::new(FakeNode::new()),
        }))
    }

    async fn close(&self) -> EngineResult<()> {
        Ok(())
    }
}

struct FakePage {
    browser: FakeBrowser,
    current: Mutex<FakeNode>,
}

impl FakePage {
    fn document(&self) -> FakeNode {
        self.current.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Node for FakePage {
    async fn query(&self, selector: &str) -> EngineResult<Option<Box<dyn Node>>> {
        Ok(self.document().select(selector).into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> EngineResult<Vec<Box<dyn Node>>> {
        Ok(self.document().select(selector))
    }

    async fn text_content(&self) -> EngineResult<Option<String>> {
        Ok(self.document().text)
    }

    async fn attribute(&self, _name: &str) -> EngineResult<Option<String>> {
        Ok(None)
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str) -> EngineResult<()> {
        if let Ok(mut visits) = self.browser.shared.visits.lock() {
            visits.push(url.to_string());
        }
        let document = self
            .browser
            .documents
            .get(url)
            .cloned()
            .ok_or_else(|| EngineError::Navigation {
                url: url.to_string(),
                reason: "no such document".into(),
            })?;
        if let Ok(mut current) = self.current.lock() {
            *current = document;
        }
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> EngineResult<()> {
        if self.document().children.contains_key(selector) {
            Ok(())
        } else {
            Err(EngineError::Timeout {
                selector: selector.to_string(),
                timeout,
            })
        }
    }

    async fn evaluate(&self, script: &str) -> EngineResult<serde_json::Value> {
        if let Ok(mut scripts) = self.browser.shared.scripts.lock() {
            scripts.push(script.to_string());
        }
        Ok(serde_json::Value::Null)
    }

    async fn wait_for_timeout(&self, _delay: Duration) {}

    fn as_node(&self) -> &dyn Node {
        self
    }
}
