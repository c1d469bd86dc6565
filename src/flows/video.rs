//! Watch pages: meta-tag metadata, channel name and the first few comments.

use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};

use crate::config::{
    COMMENTS_READY_TIMEOUT, COMMENTS_SETTLE, MAX_COMMENTS, SCROLL_PASSES, SCROLL_SETTLE,
    VIDEO_READY_TIMEOUT,
};
use crate::engine::Page;
use crate::extract::{extract, Field, FieldSpec, Locator, Missing};
use crate::record::{assemble, GroupLayout, Record};
use crate::scraper::{Flow, Readiness};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[?&]v=|youtu\.be/|/shorts/)([A-Za-z0-9_-]{11})").unwrap()
});

const CHANNEL_NAME_SELECTOR: &str = "#owner #channel-name a";
const COMMENTS_SELECTOR: &str = "#comments";
const COMMENT_TEXT_SELECTOR: &str = "ytd-comment-thread-renderer #content-text";

const SCROLL_SCRIPT: &str = "window.scrollTo(0, window.scrollY + window.innerHeight)";
const COMMENTS_INTO_VIEW_SCRIPT: &str =
    "(() => { const c = document.querySelector('#comments'); if (c) c.scrollIntoView(); })()";

const LIKE_ACTION: &str = "https://schema.org/LikeAction";
const WATCH_ACTION: &str = "https://schema.org/WatchAction";

pub const COMMENT_GROUP: &str = "comment";

pub struct VideoFlow {
    meta: Vec<Field>,
    comments: Vec<Field>,
}

impl VideoFlow {
    pub fn new() -> Self {
        Self {
            meta: meta_fields(),
            comments: comment_fields(),
        }
    }

    /// Every column a video row can have, sorted. Used as the table schema so
    /// a first video with few comments doesn't lock later ones out.
    pub fn schema(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.meta.iter().map(|f| f.name.clone()).collect();
        columns.extend((1..=MAX_COMMENTS).map(|i| format!("{}_{}", COMMENT_GROUP, i)));
        columns.sort();
        columns
    }

    /// Scrolls until the comment section renders and lazy threads load.
    async fn load_comments(&self, page: &dyn Page) -> Result<()> {
        for _ in 0..SCROLL_PASSES {
            page.evaluate(SCROLL_SCRIPT).await?;
            page.wait_for_timeout(SCROLL_SETTLE).await;
        }
        page.wait_for_selector(COMMENTS_SELECTOR, COMMENTS_READY_TIMEOUT)
            .await?;
        page.evaluate(COMMENTS_INTO_VIEW_SCRIPT).await?;
        page.wait_for_timeout(COMMENTS_SETTLE).await;
        Ok(())
    }
}

impl Default for VideoFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn meta(name: &str, locators: Vec<Locator>) -> Field {
    Field::text(name, locators, Missing::Empty)
}

/// `userInteractionCount` meta that follows the given interaction type.
fn interaction_count(name: &str, action: &str) -> Field {
    let selector = format!(
        r#"meta[itemprop="interactionType"][content="{}"] + meta[itemprop="userInteractionCount"]"#,
        action
    );
    Field::text(name, vec![Locator::attr(&selector, "content")], Missing::Omit)
}

fn meta_fields() -> Vec<Field> {
    vec![
        meta(
            "title",
            vec![Locator::meta("name", "title"), Locator::meta("property", "og:title")],
        ),
        meta(
            "description",
            vec![
                Locator::meta("name", "description"),
                Locator::meta("property", "og:description"),
            ],
        ),
        meta("keywords", vec![Locator::meta("name", "keywords")]),
        meta("url", vec![Locator::meta("property", "og:url")]),
        meta("image", vec![Locator::meta("property", "og:image")]),
        meta("duration", vec![Locator::meta("itemprop", "duration")]),
        meta("isFamilyFriendly", vec![Locator::meta("itemprop", "isFamilyFriendly")]),
        meta("datePublished", vec![Locator::meta("itemprop", "datePublished")]),
        meta("uploadDate", vec![Locator::meta("itemprop", "uploadDate")]),
        meta("genre", vec![Locator::meta("itemprop", "genre")]),
        interaction_count("likeCount", LIKE_ACTION),
        interaction_count("viewCount", WATCH_ACTION),
        meta("channelName", vec![Locator::text(CHANNEL_NAME_SELECTOR)]),
    ]
}

fn comment_fields() -> Vec<Field> {
    vec![Field::new(
        COMMENT_GROUP,
        FieldSpec::Group {
            containers: COMMENT_TEXT_SELECTOR.into(),
            fields: vec![Field::text("text", vec![Locator::this()], Missing::Empty)],
            limit: Some(MAX_COMMENTS),
        },
    )]
}

/// Bare id from an id or any common watch/share URL form.
pub fn video_id(input: &str) -> String {
    let input = input.trim();
    VIDEO_ID_RE
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| input.to_string())
}

#[async_trait]
impl Flow for VideoFlow {
    fn url_for(&self, id: &str) -> String {
        format!("{}{}", WATCH_URL, id)
    }

    fn readiness(&self) -> Readiness {
        Readiness {
            selector: CHANNEL_NAME_SELECTOR.into(),
            timeout: VIDEO_READY_TIMEOUT,
        }
    }

    async fn extract(&self, page: &dyn Page, url: &str) -> Result<Record> {
        let meta = extract(page.as_node(), &self.meta).await?;

        // Comments are best effort; the video row is written without them.
        let comments = match self.load_comments(page).await {
            Ok(()) => match extract(page.as_node(), &self.comments).await {
                Ok(comments) => comments,
                Err(e) => {
                    warn!("Error getting comments for {}: {}", url, e);
                    Record::new()
                }
            },
            Err(e) => {
                warn!("Error getting comments for {}: {:#}", url, e);
                Record::new()
            }
        };

        let record = assemble([meta, comments], GroupLayout::Indexed);
        info!("Extracted {} fields from {}", record.len(), url);
        Ok(record)
    }
}
