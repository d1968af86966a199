//! Client classification by User-Agent signature rules.
//!
//! A small rule-scoring engine stands in for hard-coded bot detection: each
//! rule carries a list of case-insensitive substring tokens and a weight,
//! matched rule weights sum to a score, and a score at or above the
//! threshold classifies the client as automated. Automated clients get the
//! stricter rate-limit tier.

use serde::{Deserialize, Serialize};

fn default_rule_weight() -> f64 {
    1.0
}

/// One signature rule: a named set of User-Agent tokens.
///
/// A rule with no tokens matches requests that carry no User-Agent at all.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignatureRule {
    pub name: String,
    #[serde(default)]
    pub tokens: Vec<String>,
    #[serde(default = "default_rule_weight")]
    pub weight: f64,
}

/// Rate-limit tier assigned by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTier {
    Standard,
    Automated,
}

impl ClientTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Automated => "automated",
        }
    }
}

/// Outcome of classifying one request.
#[derive(Debug, Clone)]
pub struct Classification {
    pub tier: ClientTier,
    pub score: f64,
    /// Names of the rules that matched.
    pub matched: Vec<String>,
}

/// Scores User-Agent strings against the configured signature rules.
#[derive(Debug, Clone)]
pub struct ClientClassifier {
    rules: Vec<SignatureRule>,
    threshold: f64,
}

impl ClientClassifier {
    /// Tokens are lowercased once here so per-request matching only
    /// lowercases the User-Agent.
    pub fn new(mut rules: Vec<SignatureRule>, threshold: f64) -> Self {
        for rule in &mut rules {
            for token in &mut rule.tokens {
                *token = token.to_lowercase();
            }
        }
        Self { rules, threshold }
    }

    pub fn classify(&self, user_agent: Option<&str>) -> Classification {
        let ua = user_agent
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .map(str::to_lowercase);

        let mut score = 0.0;
        let mut matched = Vec::new();
        for rule in &self.rules {
            let hit = match &ua {
                Some(ua) => rule
                    .tokens
                    .iter()
                    .any(|token| !token.is_empty() && ua.contains(token)),
                None => rule.tokens.is_empty(),
            };
            if hit {
                score += rule.weight;
                matched.push(rule.name.clone());
            }
        }

        let tier = if score >= self.threshold {
            ClientTier::Automated
        } else {
            ClientTier::Standard
        };
        Classification {
            tier,
            score,
            matched,
        }
    }
}

impl Default for ClientClassifier {
    fn default() -> Self {
        Self::new(default_rules(), default_threshold())
    }
}

pub fn default_threshold() -> f64 {
    1.0
}

/// The stock signature set. Deployments can replace or extend it in config.
pub fn default_rules() -> Vec<SignatureRule> {
    let rule = |name: &str, tokens: &[&str]| SignatureRule {
        name: name.to_string(),
        tokens: tokens.iter().map(|t| t.to_string()).collect(),
        weight: 1.0,
    };
    vec![
        rule(
            "automation-keywords",
            &["bot", "crawler", "spider", "scraper"],
        ),
        rule(
            "headless-browser",
            &["headless", "phantomjs", "puppeteer", "playwright", "selenium"],
        ),
        rule(
            "http-tooling",
            &[
                "curl",
                "wget",
                "python-requests",
                "python-urllib",
                "scrapy",
                "go-http-client",
                "okhttp",
                "java/",
            ],
        ),
        rule("empty-agent", &[]),
    ]
}
