//! Channel "about" pages: name, description, external links and the
//! icon-keyed statistics table.

use anyhow::Result;
use async_trait::async_trait;

use crate::config::CHANNEL_READY_TIMEOUT;
use crate::engine::Page;
use crate::extract::{extract, Field, FieldSpec, LabelMap, Locator, Missing};
use crate::record::{assemble, GroupLayout, Record};
use crate::scraper::{Flow, Readiness};

const TITLE_SELECTOR: &str = "ytd-engagement-panel-title-header-renderer #title-text";
const DESCRIPTION_SELECTOR: &str = "#description-container";
const LINK_CONTAINER_SELECTOR: &str = ".yt-channel-external-link-view-model-wiz__container";
const ABOUT_ROW_SELECTOR: &str = "ytd-about-channel-renderer tr.description-item:not([hidden])";

pub const ICON_LABELS: LabelMap = &[
    ("language", "channel_url"),
    ("privacy_public", "country"),
    ("info_outline", "joined"),
    ("person_radar", "subscribers"),
    ("my_videos", "videos"),
    ("trending_up", "views"),
];

pub struct ChannelFlow {
    base: Vec<Field>,
    about: Vec<Field>,
}

impl ChannelFlow {
    pub fn new() -> Self {
        Self {
            base: base_fields(),
            about: about_fields(),
        }
    }
}

impl Default for ChannelFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn base_fields() -> Vec<Field> {
    vec![
        Field::text("channel_name", vec![Locator::text(TITLE_SELECTOR)], Missing::Sentinel),
        Field::text(
            "description",
            vec![Locator::text(DESCRIPTION_SELECTOR)],
            Missing::Sentinel,
        ),
        Field::new(
            "social_links",
            FieldSpec::Group {
                containers: LINK_CONTAINER_SELECTOR.into(),
                fields: vec![
                    Field::text("title", vec![Locator::text("span")], Missing::Empty),
                    Field::text("text", vec![Locator::text("a")], Missing::Empty),
                    Field::new(
                        "url",
                        FieldSpec::RedirectUnwrap {
                            locator: Locator::attr("a", "href"),
                        },
                    ),
                ],
                limit: None,
            },
        ),
    ]
}

fn about_fields() -> Vec<Field> {
    vec![Field::new(
        "about",
        FieldSpec::IconRemap {
            rows: ABOUT_ROW_SELECTOR.into(),
            icon: Locator::attr("yt-icon", "icon"),
            value_selector: "td".into(),
            value_index: 1,
            labels: ICON_LABELS,
        },
    )]
}

/// Channel URL pointing at its about page.
pub fn about_url(url: &str) -> String {
    if url.ends_with("/about") {
        url.to_string()
    } else {
        format!("{}/about", url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Flow for ChannelFlow {
    fn url_for(&self, id: &str) -> String {
        about_url(id)
    }

    fn readiness(&self) -> Readiness {
        Readiness {
            selector: TITLE_SELECTOR.into(),
            timeout: CHANNEL_READY_TIMEOUT,
        }
    }

    async fn extract(&self, page: &dyn Page, url: &str) -> Result<Record> {
        let base = extract(page.as_node(), &self.base).await?;
        let about = extract(page.as_node(), &self.about).await?;
        let source: Record = [("url", url)].into_iter().collect();
        Ok(assemble([base, source, about], GroupLayout::Nested))
    }
}
