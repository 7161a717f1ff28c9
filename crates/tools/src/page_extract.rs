//! `page.extract` — fetch a web page and summarise its structure.
//!
//! The HTML is scanned with regular expressions rather than a DOM: the
//! goal is a compact outline for the model (title, headings, assets,
//! readable text), not a faithful parse.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use sitewright_config::ExtractConfig;
use sitewright_core::error::ToolError;
use sitewright_core::tool::{Tool, ToolOutput, ToolParams, required_str};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;
use url::Url;

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("title regex"));
static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>").expect("heading regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(a|img|link|script|meta)\b([^>]*)>").expect("tag regex")
});
static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").expect("anchor regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("attribute regex")
});
static INVISIBLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|template|svg)\b.*?</(script|style|noscript|template|svg)\s*>|<!--.*?-->")
        .expect("invisible block regex")
});
static ANY_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag strip regex"));
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("entity regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// The structural outline of one HTML page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageOutline {
    pub title: Option<String>,
    pub description: Option<String>,
    pub headings: Vec<Heading>,
    pub links: Vec<Link>,
    pub images: Vec<Image>,
    pub stylesheets: Vec<String>,
    pub scripts: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    pub src: String,
    pub alt: String,
}

fn attributes(raw: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(raw)
        .map(|c| {
            let name = c[1].to_ascii_lowercase();
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

/// Resolve `reference` against `base`; `None` for non-navigable schemes and bare fragments.
fn absolutize(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }
    let lowered = reference.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }
    base.join(reference).ok().map(String::from)
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |c: &regex::Captures<'_>| {
            let entity = &c[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    "copy" => Some('©'),
                    "mdash" => Some('—'),
                    "ndash" => Some('–'),
                    "hellip" => Some('…'),
                    _ => None,
                }
            };
            decoded.map(String::from).unwrap_or_else(|| c[0].to_string())
        })
        .into_owned()
}

/// Inline markup → collapsed plain text.
fn plain_text(fragment: &str) -> String {
    let stripped = ANY_TAG_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&stripped);
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

fn push_unique(list: &mut Vec<String>, seen: &mut HashSet<String>, value: String) {
    if seen.insert(value.clone()) {
        list.push(value);
    }
}

/// Outline `html` as served from `base`. `text` keeps at most `max_text_chars` characters.
pub fn outline(base: &Url, html: &str, max_text_chars: usize) -> PageOutline {
    let mut page = PageOutline {
        title: TITLE_RE
            .captures(html)
            .map(|c| plain_text(&c[1]))
            .filter(|t| !t.is_empty()),
        ..PageOutline::default()
    };

    let visible = INVISIBLE_RE.replace_all(html, " ");

    page.headings = HEADING_RE
        .captures_iter(&visible)
        .filter_map(|c| {
            let text = plain_text(&c[2]);
            let level = c[1].parse().ok()?;
            (!text.is_empty()).then_some(Heading { level, text })
        })
        .collect();

    let mut seen_links = HashSet::new();
    for c in ANCHOR_RE.captures_iter(&visible) {
        let attrs = attributes(&c[1]);
        if let Some(href) = attrs.get("href").and_then(|h| absolutize(base, h))
            && seen_links.insert(href.clone())
        {
            page.links.push(Link {
                href,
                text: plain_text(&c[2]),
            });
        }
    }

    let mut seen_assets = HashSet::new();
    for c in TAG_RE.captures_iter(html) {
        let tag = c[1].to_ascii_lowercase();
        let attrs = attributes(&c[2]);
        match tag.as_str() {
            "img" => {
                let src = attrs
                    .get("src")
                    .or_else(|| attrs.get("data-src"))
                    .and_then(|s| absolutize(base, s));
                if let Some(src) = src
                    && seen_assets.insert(src.clone())
                {
                    page.images.push(Image {
                        src,
                        alt: attrs.get("alt").cloned().unwrap_or_default(),
                    });
                }
            }
            "link" => {
                let is_stylesheet = attrs
                    .get("rel")
                    .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")));
                if is_stylesheet
                    && let Some(href) = attrs.get("href").and_then(|h| absolutize(base, h))
                {
                    push_unique(&mut page.stylesheets, &mut seen_assets, href);
                }
            }
            "script" => {
                if let Some(src) = attrs.get("src").and_then(|s| absolutize(base, s)) {
                    push_unique(&mut page.scripts, &mut seen_assets, src);
                }
            }
            "meta" => {
                let key = attrs.get("name").or_else(|| attrs.get("property"));
                if page.description.is_none()
                    && key.is_some_and(|k| k.eq_ignore_ascii_case("description") || k.eq_ignore_ascii_case("og:description"))
                {
                    page.description = attrs
                        .get("content")
                        .map(|d| d.trim().to_string())
                        .filter(|d| !d.is_empty());
                }
            }
            _ => {}
        }
    }

    let text = plain_text(&visible);
    page.text = text.chars().take(max_text_chars).collect();
    page
}

/// Fetch a URL and return its outline.
pub struct PageExtractTool {
    client: reqwest::Client,
    max_text_chars: usize,
}

impl PageExtractTool {
    pub fn new(config: &ExtractConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            max_text_chars: config.max_text_chars,
        }
    }
}

#[async_trait]
impl Tool for PageExtractTool {
    fn name(&self) -> &str {
        "page.extract"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its title, description, headings, links, images, stylesheets, scripts and visible text. Relative URLs are resolved."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Absolute http(s) URL to fetch" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: ToolParams) -> Result<ToolOutput, ToolError> {
        let raw = required_str(&params, "url")?;
        let url = Url::parse(raw)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid url '{raw}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::InvalidArguments(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("request to {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("reading body failed: {e}")))?;

        let page = outline(&final_url, &body, self.max_text_chars);

        let mut value = serde_json::to_value(&page).map_err(|e| ToolError::failed(self.name(), e))?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("url".into(), json!(raw));
            obj.insert("finalUrl".into(), json!(final_url.as_str()));
            obj.insert("status".into(), json!(status));
        }

        Ok(ToolOutput::json(value))
    }
}
