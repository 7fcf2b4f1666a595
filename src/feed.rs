//! Article sources: the RSS feed and a fixed demo set.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::FeedConfig;
use crate::models::Article;
use crate::{Error, Result};

/// Finite, ordered batch of the latest articles.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// At most `limit` articles, newest first as published by the source.
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<Article>>;
}

/// RSS/Atom feed fetched over HTTP.
pub struct RssSource {
    client: reqwest::Client,
    url: String,
}

impl RssSource {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("insider_graph/0.1.0")
            .build()
            .map_err(|e| Error::Feed(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ArticleSource for RssSource {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<Article>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Feed(format!("feed fetch failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::Feed(format!("feed returned {}", resp.status())));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Feed(format!("failed to read feed body: {}", e)))?;
        let articles = parse_feed(&bytes, limit)?;

        info!(url = %self.url, items = articles.len(), "📰 Feed fetched");
        Ok(articles)
    }
}

/// Parse RSS/Atom bytes into at most `limit` articles, in feed order.
pub fn parse_feed(bytes: &[u8], limit: usize) -> Result<Vec<Article>> {
    let feed =
        feed_rs::parser::parse(bytes).map_err(|e| Error::Feed(format!("invalid feed: {}", e)))?;

    Ok(feed
        .entries
        .into_iter()
        .take(limit)
        .map(|entry| {
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            Article {
                title: entry
                    .title
                    .map(|t| collapse_whitespace(&t.content))
                    .unwrap_or_default(),
                summary: strip_markup(&summary),
                link: entry.links.first().map(|l| l.href.clone()).unwrap_or_default(),
                published: entry.published.or(entry.updated),
            }
        })
        .collect())
}

/// Reduce an HTML fragment to single-spaced plain text.
pub fn strip_markup(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 10_000).unwrap_or_else(|e| {
        debug!("html2text failed, using raw summary: {}", e);
        html.to_string()
    });
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fixed list of articles, served in order.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    articles: Vec<Article>,
}

impl StaticSource {
    pub fn new(articles: Vec<Article>) -> Self {
        Self { articles }
    }

    /// The built-in demo set: a burst of AI industry headlines with deliberate
    /// duplicates and naming variants.
    pub fn demo() -> Self {
        Self::new(
            DEMO_ARTICLES
                .iter()
                .enumerate()
                .map(|(i, (title, summary))| {
                    Article::new(*title, *summary)
                        .with_link(format!("urn:insider-graph:demo:{}", i + 1))
                })
                .collect(),
        )
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

#[async_trait]
impl ArticleSource for StaticSource {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<Article>> {
        Ok(self.articles.iter().take(limit).cloned().collect())
    }
}

const DEMO_ARTICLES: &[(&str, &str)] = &[
    (
        "OpenAI Board Fires Sam Altman",
        "In a stunning move, OpenAI's board has removed Sam Altman as CEO, citing lack of candor.",
    ),
    (
        "Microsoft Hires Sam Altman",
        "Satya Nadella announced Sam Altman will head Microsoft's new advanced AI research division.",
    ),
    (
        "Sam Altman Returns to OpenAI",
        "After internal turmoil, Sam Altman is reinstated as OpenAI CEO with a restructured board.",
    ),
    (
        "Sam Altman Fired by OpenAI Board",
        "OpenAI dismissed CEO Sam Altman due to concerns about transparency.",
    ),
    (
        "Satya Nadella Brings Sam Altman to Microsoft",
        "Microsoft hires former OpenAI CEO Sam Altman to lead a new AI research division.",
    ),
    (
        "Nvidia Unveils Blackwell B200 GPU",
        "The Blackwell B200 promises massive improvements in AI inference performance.",
    ),
    (
        "Elon Musk Sues OpenAI",
        "Elon Musk claims OpenAI deviated from its original nonprofit mission.",
    ),
    (
        "Apple Introduces Apple Intelligence",
        "Apple enters the AI race with deep integration of generative models into iOS and macOS.",
    ),
    (
        "The New York Times Sues Microsoft and OpenAI",
        "NYT alleges mass copyright violation from training language models.",
    ),
    (
        "Nvidia Reveals B200 Blackwell",
        "CEO Jensen Huang announces the new GPU for advanced AI.",
    ),
    (
        "Microsoft and OpenAI Strengthen AI Partnership",
        "After recent leadership turbulence, Microsoft deepens its collaboration with OpenAI to accelerate AI research.",
    ),
    (
        "Jensen Huang Talks About Blackwell Architecture",
        "The Nvidia CEO explained how the Blackwell architecture will redefine AI compute efficiency.",
    ),
    (
        "Elon Musk Criticizes OpenAI on Social Media",
        "Musk posted that OpenAI had strayed from its original mission, deepening his conflict with the organization.",
    ),
    (
        "Apple Intelligence Will Compete with OpenAI Models",
        "Analysts believe Apple Intelligence aims to challenge models like GPT and Claude.",
    ),
    (
        "NYT vs OpenAI Legal Battle Intensifies",
        "The New York Times expanded its lawsuit, adding further allegations of misuse.",
    ),
    (
        "Meta Develops Llama 4 Turbo Variant",
        "Meta is reportedly testing a faster version of Llama 4 for enterprise clients.",
    ),
    (
        "Google DeepMind Teases Gemini Ultra Mode",
        "DeepMind hinted at a new mode in Gemini designed for long-context reasoning.",
    ),
    (
        "Nvidia Partners with Tesla for AI Training",
        "Tesla announced a collaboration with Nvidia to improve training efficiency for its robotics models.",
    ),
    (
        "Anthropic Expands Claude Model Family",
        "Claude 4.1 Mini and Claude 4.1 Pro Max were revealed as part of a scaling strategy.",
    ),
    (
        "Microsoft Faces Pressure Over NYT Lawsuit",
        "Legal experts say Microsoft may face secondary liability in the copyright case.",
    ),
    (
        "Blackwell B200 Benchmarks Leak Online",
        "Early benchmarks show significant gains over the previous H100 hardware.",
    ),
];
