use anyhow::{Context, Result};
use tracing::info;
use url::Url;

/// Prefix rules for `User-agent: *`. Allow overrides Disallow; an
/// absent or empty robots.txt allows everything.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    allow: Vec<String>,
    disallow: Vec<String>,
}

impl RobotsRules {
    pub fn parse(content: &str) -> Self {
        let mut rules = Self::default();
        let mut in_wildcard_group = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match directive.trim().to_lowercase().as_str() {
                "user-agent" => in_wildcard_group = value == "*",
                "disallow" if in_wildcard_group && !value.is_empty() => {
                    rules.disallow.push(value.to_string());
                }
                "allow" if in_wildcard_group && !value.is_empty() => {
                    rules.allow.push(value.to_string());
                }
                _ => {}
            }
        }

        rules
    }

    pub fn is_allowed(&self, path: &str) -> bool {
        if self.allow.iter().any(|p| path.starts_with(p.as_str())) {
            return true;
        }
        !self.disallow.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// Fetch and parse robots.txt for the category's origin. A missing or
/// non-2xx robots.txt allows everything.
pub async fn fetch_rules(client: &reqwest::Client, category_url: &Url) -> Result<RobotsRules> {
    let robots_url = category_url
        .join("/robots.txt")
        .context("building robots.txt url")?;

    info!("Fetching {}", robots_url);
    let response = client.get(robots_url.clone()).send().await?;
    if !response.status().is_success() {
        return Ok(RobotsRules::default());
    }
    Ok(RobotsRules::parse(&response.text().await?))
}

// ── Tests ──
