//! Ordered, first-match-wins classification gates:
//!
//! 1. language: a confident non-target detection → `NON_ENGLISH`
//! 2. region: excluded domain suffix or path fragment → `EXCLUDED_ORIGIN`
//! 3. exclusion keywords: experimental → personal → rumor
//! 4. practical signal: five independent keyword groups
//! 5. fallback: technical → marketing → industry → unknown

use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use url::Url;

use crate::analyze::keywords::KeywordSet;
use crate::config::ClassifierConfig;
use crate::ingest::types::{CandidateItem, Category};

const DETECTABLE: [Language; 7] = [
    Language::English,
    Language::Japanese,
    Language::Chinese,
    Language::Korean,
    Language::German,
    Language::French,
    Language::Spanish,
];

fn language_from_name(name: &str) -> Option<Language> {
    match name.trim().to_ascii_lowercase().as_str() {
        "english" | "en" => Some(Language::English),
        "japanese" | "ja" => Some(Language::Japanese),
        "chinese" | "zh" => Some(Language::Chinese),
        "korean" | "ko" => Some(Language::Korean),
        "german" | "de" => Some(Language::German),
        "french" | "fr" => Some(Language::French),
        "spanish" | "es" => Some(Language::Spanish),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LanguageVerdict {
    Target,
    Other(Language, f64),
    /// Too short or not confident enough; never a rejection on its own.
    Indeterminate,
}

pub struct LanguageGate {
    detector: LanguageDetector,
    target: Language,
    min_chars: usize,
    min_confidence: f64,
}

impl LanguageGate {
    pub fn new(target: Language, min_chars: usize, min_confidence: f64) -> Self {
        Self {
            detector: LanguageDetectorBuilder::from_languages(&DETECTABLE).build(),
            target,
            min_chars,
            min_confidence,
        }
    }

    pub fn check(&self, text: &str) -> LanguageVerdict {
        if text.chars().count() < self.min_chars {
            return LanguageVerdict::Indeterminate;
        }
        let values = self.detector.compute_language_confidence_values(text);
        let Some((top, confidence)) = values.first().copied() else {
            return LanguageVerdict::Indeterminate;
        };
        if top == self.target {
            LanguageVerdict::Target
        } else if confidence >= self.min_confidence {
            LanguageVerdict::Other(top, confidence)
        } else {
            LanguageVerdict::Indeterminate
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: Category,
    /// Gate that decided, e.g. `language`, `practical`.
    pub gate: &'static str,
    pub matched: Vec<String>,
}

impl Classification {
    fn new(category: Category, gate: &'static str, matched: Vec<String>) -> Self {
        Self {
            category,
            gate,
            matched,
        }
    }
}

pub struct Classifier {
    language: Option<LanguageGate>,
    origin_domains: Vec<String>,
    origin_paths: Vec<String>,
    experimental: KeywordSet,
    personal: KeywordSet,
    rumor: KeywordSet,
    practical: Vec<KeywordSet>,
    technical: KeywordSet,
    marketing: KeywordSet,
    industry: KeywordSet,
    require_multiple: bool,
    min_groups: usize,
}

impl Classifier {
    pub fn from_config(cfg: &ClassifierConfig) -> Self {
        let language = match language_from_name(&cfg.target_language) {
            Some(target) => Some(LanguageGate::new(target, cfg.min_detect_chars, cfg.min_confidence)),
            None => {
                tracing::warn!(language = %cfg.target_language, "unsupported target language, language gate disabled");
                None
            }
        };
        let k = &cfg.keywords;
        Self {
            language,
            origin_domains: cfg.excluded_origin_domains.iter().map(|d| d.trim().to_ascii_lowercase()).collect(),
            origin_paths: cfg.excluded_origin_paths.iter().map(|p| p.trim().to_ascii_lowercase()).collect(),
            experimental: KeywordSet::compile("experimental", &k.experimental),
            personal: KeywordSet::compile("personal", &k.personal),
            rumor: KeywordSet::compile("rumor", &k.rumor),
            practical: k
                .practical
                .named()
                .iter()
                .map(|(name, patterns)| KeywordSet::compile(name, patterns))
                .collect(),
            technical: KeywordSet::compile("technical", &k.technical),
            marketing: KeywordSet::compile("marketing", &k.marketing),
            industry: KeywordSet::compile("industry", &k.industry),
            require_multiple: cfg.require_multiple_groups,
            min_groups: cfg.min_practical_groups.max(1),
        }
    }

    pub fn classify(&self, title: &str, body: &str, url: &str) -> Classification {
        let text = if body.is_empty() {
            title.to_string()
        } else {
            format!("{title}\n{body}")
        };

        if let Some(gate) = &self.language {
            if let LanguageVerdict::Other(lang, conf) = gate.check(&text) {
                return Classification::new(
                    Category::NonEnglish,
                    "language",
                    vec![format!("{lang:?}:{conf:.2}")],
                );
            }
        }

        if let Some(rule) = self.excluded_origin(url) {
            return Classification::new(Category::ExcludedOrigin, "region", vec![rule]);
        }

        for (set, category) in [
            (&self.experimental, Category::Excluded),
            (&self.personal, Category::PersonalUsage),
            (&self.rumor, Category::LowCredibility),
        ] {
            if let Some(p) = set.first_match(&text) {
                return Classification::new(category, "exclusion", vec![p.to_string()]);
            }
        }

        let hit_groups: Vec<String> = self
            .practical
            .iter()
            .filter(|g| g.is_match(&text))
            .map(|g| g.name().to_string())
            .collect();
        if !hit_groups.is_empty() {
            if !self.require_multiple || hit_groups.len() >= self.min_groups {
                return Classification::new(Category::Practical, "practical", hit_groups);
            }
            return Classification::new(Category::General, "practical", hit_groups);
        }

        for (set, category) in [
            (&self.technical, Category::Technical),
            (&self.marketing, Category::Marketing),
            (&self.industry, Category::General),
        ] {
            let m = set.matches(&text);
            if !m.is_empty() {
                return Classification::new(category, "fallback", m.into_iter().map(str::to_string).collect());
            }
        }
        Classification::new(Category::Unknown, "fallback", Vec::new())
    }

    /// The configured rule that marks `url` as excluded origin, if any.
    fn excluded_origin(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let path = parsed.path().to_ascii_lowercase();
        if let Some(d) = self.origin_domains.iter().find(|d| domain_matches(&host, d)) {
            return Some(d.clone());
        }
        self.origin_paths
            .iter()
            .find(|p| !p.is_empty() && path.contains(p.as_str()))
            .cloned()
    }

    /// Label every item in place.
    pub fn classify_all(&self, items: &mut [CandidateItem]) {
        for item in items.iter_mut() {
            let c = self.classify(&item.title, &item.body(), &item.canonical_url);
            tracing::debug!(
                url = %item.canonical_url,
                category = c.category.as_str(),
                gate = c.gate,
                matched = ?c.matched,
                "classified"
            );
            item.category = c.category;
        }
    }
}

fn domain_matches(host: &str, rule: &str) -> bool {
    if rule.is_empty() {
        return false;
    }
    if rule.starts_with('.') {
        host.ends_with(rule)
    } else {
        host == rule || host.ends_with(&format!(".{rule}"))
    }
}
