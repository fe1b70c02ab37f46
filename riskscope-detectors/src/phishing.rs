//! Phishing Detector
//!
//! Extracts phishing indicators from an email message.
//! - Consumes: subject, sender, recipient and body text
//! - Emits: urgency_language, sensitive_info_request, link_domain_mismatch,
//!   suspicious_link, suspicious_attachment, spoofed_domain, impersonation_attempt

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

use riskscope_core::{RiskError, Signal, SignalBuilder, SignalKind};

use crate::{saturating_strength, Detector};

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"']+"#).unwrap()
});

static HOST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:[^@/\s]+@)?([^/:?#\s]+)").unwrap()
});

static IPV4_HOST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,3}(?:\.\d{1,3}){3}$").unwrap()
});

static SENDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9._%+-]+)@([A-Za-z0-9.-]+\.[A-Za-z]{2,})").unwrap()
});

static ATTACHMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[\w-]+\.(exe|scr|js|vbs|bat|cmd|jar|iso|zip|rar|docm|xlsm)\b").unwrap()
});

/// An email submitted for analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub recipient: String,
    pub content: String,
}

impl EmailMessage {
    pub fn new(subject: &str, sender: &str, content: &str) -> Self {
        Self {
            subject: subject.to_string(),
            sender: sender.to_string(),
            recipient: String::new(),
            content: content.to_string(),
        }
    }

    /// Domain of the sender address, lowercased
    pub fn sender_domain(&self) -> Option<String> {
        SENDER_REGEX
            .captures(&self.sender)
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str().to_lowercase())
    }

    /// Display name part of `"Name <addr@domain>"`
    pub fn sender_display_name(&self) -> Option<String> {
        let (name, _) = self.sender.split_once('<')?;
        let name = name.trim().trim_matches('"').trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

/// A brand whose name is commonly abused
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustedBrand {
    pub name: String,
    pub domain: String,
}

impl TrustedBrand {
    pub fn new(name: &str, domain: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            domain: domain.to_lowercase(),
        }
    }
}

/// Phishing detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhishingDetectorConfig {
    pub urgency_phrases: Vec<String>,
    pub sensitive_phrases: Vec<String>,
    pub trusted_brands: Vec<TrustedBrand>,
    pub shortener_hosts: Vec<String>,
    /// Phrase hits at which a text signal reaches full strength
    pub phrase_saturation: usize,
    pub suspicious_link_strength: f64,
    pub attachment_strength: f64,
    pub impersonation_strength: f64,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for PhishingDetectorConfig {
    fn default() -> Self {
        Self {
            urgency_phrases: strings(&[
                "urgent",
                "immediately",
                "act now",
                "within 24 hours",
                "account will be suspended",
                "account has been suspended",
                "final notice",
                "verify your account",
                "limited time",
                "expires today",
            ]),
            sensitive_phrases: strings(&[
                "password",
                "social security",
                "ssn",
                "credit card",
                "card number",
                "cvv",
                "bank account",
                "login credentials",
                "pin code",
                "date of birth",
            ]),
            trusted_brands: vec![
                TrustedBrand::new("paypal", "paypal.com"),
                TrustedBrand::new("microsoft", "microsoft.com"),
                TrustedBrand::new("apple", "apple.com"),
                TrustedBrand::new("amazon", "amazon.com"),
                TrustedBrand::new("google", "google.com"),
                TrustedBrand::new("netflix", "netflix.com"),
            ],
            shortener_hosts: strings(&["bit.ly", "tinyurl.com", "goo.gl", "t.co", "ow.ly", "is.gd", "buff.ly"]),
            phrase_saturation: 3,
            suspicious_link_strength: 0.9,
            attachment_strength: 0.8,
            impersonation_strength: 0.6,
        }
    }
}

/// Registrable part of a host, approximated by its last two labels
pub fn base_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }
    labels[labels.len() - 2..].join(".")
}

/// Links found in `text`, trailing punctuation stripped
pub fn extract_links(text: &str) -> Vec<String> {
    URL_REGEX
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ')', '!', '?']).to_string())
        .collect()
}

/// Lowercased host of a link
pub fn link_host(link: &str) -> Option<String> {
    HOST_REGEX
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn contains_word(haystack: &str, word: &str) -> bool {
    words(haystack).contains(&word)
}

/// `phrase` appears in `tokens` as a run of whole words
fn contains_phrase(tokens: &[&str], phrase: &str) -> bool {
    let needle = words(phrase);
    !needle.is_empty() && tokens.windows(needle.len()).any(|run| run == needle.as_slice())
}

/// Phishing detector - heuristic indicator extraction
pub struct PhishingDetector {
    config: PhishingDetectorConfig,
}

impl PhishingDetector {
    pub fn new(config: PhishingDetectorConfig) -> Self {
        Self { config }
    }

    fn signal(&self, kind: SignalKind, strength: f64) -> SignalBuilder {
        Signal::builder(kind).strength(strength).source(self.name())
    }

    fn phrase_hits<'a>(&self, text: &str, phrases: &'a [String]) -> Vec<&'a str> {
        let tokens = words(text);
        phrases
            .iter()
            .filter(|p| contains_phrase(&tokens, p.as_str()))
            .map(|p| p.as_str())
            .collect()
    }

    fn text_signals(&self, text: &str, signals: &mut Vec<Signal>) -> Result<(), RiskError> {
        let saturation = self.config.phrase_saturation;

        let urgent = self.phrase_hits(text, &self.config.urgency_phrases);
        if !urgent.is_empty() {
            signals.push(
                self.signal(SignalKind::UrgencyLanguage, saturating_strength(urgent.len(), saturation))
                    .attribute("phrases", urgent.join(", "))
                    .build()?,
            );
        }

        let sensitive = self.phrase_hits(text, &self.config.sensitive_phrases);
        if !sensitive.is_empty() {
            signals.push(
                self.signal(SignalKind::SensitiveInfoRequest, saturating_strength(sensitive.len(), saturation))
                    .attribute("phrases", sensitive.join(", "))
                    .build()?,
            );
        }

        let attachments: BTreeSet<String> = ATTACHMENT_REGEX
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        if let Some(first) = attachments.iter().next() {
            signals.push(
                self.signal(SignalKind::SuspiciousAttachment, self.config.attachment_strength)
                    .attribute("attachment", first.as_str())
                    .attribute("count", attachments.len() as i64)
                    .build()?,
            );
        }

        Ok(())
    }

    fn link_signals(
        &self,
        content: &str,
        sender_domain: Option<&str>,
        signals: &mut Vec<Signal>,
    ) -> Result<(), RiskError> {
        let hosts: Vec<(String, String)> = extract_links(content)
            .into_iter()
            .filter_map(|link| link_host(&link).map(|host| (link, host)))
            .collect();

        if hosts.is_empty() {
            return Ok(());
        }

        if let Some(sender) = sender_domain {
            let sender_base = base_domain(sender);
            let mismatched: Vec<&(String, String)> = hosts
                .iter()
                .filter(|(_, host)| base_domain(host) != sender_base)
                .collect();

            if let Some((link, _)) = mismatched.first() {
                let fraction = mismatched.len() as f64 / hosts.len() as f64;
                signals.push(
                    self.signal(SignalKind::LinkDomainMismatch, fraction)
                        .attribute("link", link.as_str())
                        .attribute("sender_domain", sender)
                        .attribute("mismatched", mismatched.len() as i64)
                        .build()?,
                );
            }
        }

        let suspicious: Vec<&str> = hosts
            .iter()
            .filter(|(_, host)| self.is_suspicious_host(host))
            .map(|(link, _)| link.as_str())
            .collect();

        if let Some(link) = suspicious.first() {
            signals.push(
                self.signal(SignalKind::SuspiciousLink, self.config.suspicious_link_strength)
                    .attribute("link", *link)
                    .attribute("count", suspicious.len() as i64)
                    .build()?,
            );
        }

        Ok(())
    }

    fn is_suspicious_host(&self, host: &str) -> bool {
        IPV4_HOST_REGEX.is_match(host)
            || host.split('.').any(|label| label.starts_with("xn--"))
            || self.config.shortener_hosts.iter().any(|s| s == host)
    }

    fn brand_signals(
        &self,
        email: &EmailMessage,
        text: &str,
        sender_domain: Option<&str>,
        signals: &mut Vec<Signal>,
    ) -> Result<(), RiskError> {
        let Some(sender) = sender_domain else {
            return Ok(());
        };
        let sender_base = base_domain(sender);
        let display = email.sender_display_name().unwrap_or_default().to_lowercase();

        let mut spoofed = None;
        let mut impersonated = None;
        for brand in &self.config.trusted_brands {
            if sender_base == base_domain(&brand.domain) {
                continue;
            }
            if spoofed.is_none() && (contains_word(&display, &brand.name) || contains_word(sender, &brand.name)) {
                spoofed = Some(brand);
            } else if impersonated.is_none() && contains_word(text, &brand.name) {
                impersonated = Some(brand);
            }
        }

        if let Some(brand) = spoofed {
            signals.push(
                self.signal(SignalKind::SpoofedDomain, 1.0)
                    .attribute("brand", brand.name.as_str())
                    .attribute("sender_domain", sender)
                    .build()?,
            );
        }
        if let Some(brand) = impersonated {
            signals.push(
                self.signal(SignalKind::ImpersonationAttempt, self.config.impersonation_strength)
                    .attribute("brand", brand.name.as_str())
                    .build()?,
            );
        }

        Ok(())
    }
}

impl Default for PhishingDetector {
    fn default() -> Self {
        Self::new(PhishingDetectorConfig::default())
    }
}

impl Detector for PhishingDetector {
    type Input = EmailMessage;

    fn name(&self) -> &str {
        "phishing_analysis"
    }

    fn detect(&self, email: &EmailMessage) -> Result<Vec<Signal>, RiskError> {
        if email.content.trim().is_empty() {
            return Err(RiskError::validation("email content is required"));
        }

        let text = format!("{}\n{}", email.subject, email.content).to_lowercase();
        let sender_domain = email.sender_domain();
        let mut signals = Vec::new();

        self.text_signals(&text, &mut signals)?;
        self.link_signals(&email.content, sender_domain.as_deref(), &mut signals)?;
        self.brand_signals(email, &text, sender_domain.as_deref(), &mut signals)?;

        debug!(
            "Phishing analysis of '{}' from {}: {} indicators",
            email.subject,
            email.sender,
            signals.len()
        );
        Ok(signals)
    }
}
