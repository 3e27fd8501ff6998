// src/config/keywords.rs
//! Built-in keyword tables. Every list can be replaced from `[classifier.keywords]`.

use serde::Deserialize;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The five practical-signal groups, checked independently.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PracticalGroups {
    pub release: Vec<String>,
    pub api_change: Vec<String>,
    pub implementation: Vec<String>,
    pub integration: Vec<String>,
    pub use_case: Vec<String>,
}

impl Default for PracticalGroups {
    fn default() -> Self {
        Self {
            release: strings(&[
                "release",
                r"v\d+\.\d+",
                "version",
                "launched",
                "now available",
                "generally available",
                "ships",
                "new feature",
                "update",
                "リリース",
                "新機能",
                "アップデート",
            ]),
            api_change: strings(&[
                "API",
                "endpoint",
                "parameter",
                "breaking change",
                "deprecat",
                "migration",
                "specification",
                "SDK",
                "仕様",
            ]),
            implementation: strings(&[
                "implementation",
                "how to",
                "tutorial",
                "guide",
                "architecture",
                "example",
                "step-by-step",
                "walkthrough",
                "実装",
                "サンプル",
            ]),
            integration: strings(&[
                "integration",
                "integrates",
                "workflow",
                "pipeline",
                "orchestration",
                "together with",
                "plugin",
                "連携",
                "統合",
            ]),
            use_case: strings(&[
                "use case",
                "case study",
                "in production",
                "best practice",
                "customer story",
                "事例",
                "活用例",
            ]),
        }
    }
}

impl PracticalGroups {
    /// Group name and pattern list, in a fixed order.
    pub fn named(&self) -> [(&'static str, &[String]); 5] {
        [
            ("release", &self.release),
            ("api_change", &self.api_change),
            ("implementation", &self.implementation),
            ("integration", &self.integration),
            ("use_case", &self.use_case),
        ]
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeywordConfig {
    pub experimental: Vec<String>,
    pub personal: Vec<String>,
    pub rumor: Vec<String>,
    pub practical: PracticalGroups,
    pub technical: Vec<String>,
    pub marketing: Vec<String>,
    pub industry: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            experimental: strings(&[
                "experimental",
                "prototype",
                "proof of concept",
                "hackathon",
                "side project",
                "weekend project",
                "試作",
            ]),
            personal: strings(&[
                "I tried",
                "my experience",
                "my setup",
                "I built",
                "personally",
                "使ってみた",
                "試してみた",
            ]),
            rumor: strings(&[
                "rumor",
                "rumour",
                "leak",
                "reportedly",
                "unconfirmed",
                "allegedly",
                "噂",
            ]),
            practical: PracticalGroups::default(),
            technical: strings(&[
                "deep dive",
                "analysis",
                "benchmark",
                "performance",
                "optimization",
                "latency",
                "evaluation",
                "検証",
            ]),
            marketing: strings(&[
                "breakthrough",
                "revolutionary",
                "game-changing",
                "transformative",
                "next-generation",
                "革新的",
                "画期的",
            ]),
            industry: strings(&[
                "industry",
                "market",
                "enterprise",
                "adoption",
                "partnership",
                "funding",
                "acquisition",
                "業界",
            ]),
        }
    }
}

pub fn default_meta_patterns() -> Vec<String> {
    strings(&[
        r"I (?:cannot|can't|am unable to) (?:generate|write|create)",
        r"(?:not|isn't) suitable for (?:a|this) post",
        r"as an AI",
        r"here is (?:a|the) (?:draft|post)",
        r"the (?:requested|specified) format",
        r"this (?:news|article) is not (?:relevant|appropriate)",
        "I apologi[sz]e",
        "申し訳ありませんが",
        "生成できません",
        "作成できません",
    ])
}

pub fn default_legal_patterns() -> Vec<String> {
    strings(&[
        "lawsuit",
        "sued",
        "litigation",
        "plaintiff",
        "defendant",
        "class action",
        "訴訟",
        "提訴",
    ])
}

pub fn default_political_patterns() -> Vec<String> {
    strings(&[
        r"political.*?controversy",
        r"administration.*?criticism",
        "executive order",
        "政権",
        "大統領令",
    ])
}
