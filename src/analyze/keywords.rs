//! Case-insensitive keyword matching.
//!
//! A keyword is a regex fragment. Fragments starting with an ASCII letter or digit
//! get a leading word boundary so `ship` does not fire inside `relationship`;
//! fragments in scripts without word spacing (e.g. Japanese) match anywhere.

use regex::Regex;

pub fn keyword_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let boundary = if pattern.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        r"\b"
    } else {
        ""
    };
    Regex::new(&format!("(?i){boundary}(?:{pattern})"))
}

#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    name: String,
    patterns: Vec<(String, Regex)>,
}

impl KeywordSet {
    /// Invalid patterns are skipped with a warning.
    pub fn compile(name: &str, patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter(|p| !p.trim().is_empty())
            .filter_map(|p| match keyword_regex(p) {
                Ok(re) => Some((p.clone(), re)),
                Err(e) => {
                    tracing::warn!(set = name, pattern = %p, error = %e, "invalid keyword pattern skipped");
                    None
                }
            })
            .collect();
        Self {
            name: name.to_string(),
            patterns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First pattern (in configured order) found in `text`.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(p, _)| p.as_str())
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    pub fn matches(&self, text: &str) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(p, _)| p.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(p: &[&str]) -> KeywordSet {
        let v: Vec<String> = p.iter().map(|s| s.to_string()).collect();
        KeywordSet::compile("t", &v)
    }

    #[test]
    fn leading_boundary_and_case() {
        let s = set(&["ship", "API"]);
        assert!(!s.is_match("a good relationship"));
        assert!(s.is_match("we SHIP today"));
        assert!(s.is_match("new api endpoints"));
        // prefix match is allowed: "releases" hits "release"
        assert!(set(&["release"]).is_match("Acme releases v2"));
    }

    #[test]
    fn non_ascii_patterns_match_anywhere() {
        let s = set(&["リリース"]);
        assert!(s.is_match("新バージョンをリリースしました"));
    }

    #[test]
    fn regex_fragments_and_invalid_patterns() {
        let s = set(&[r"v\d+\.\d+", "(unclosed", ""]);
        assert_eq!(s.matches("ships v2.0 today"), vec![r"v\d+\.\d+"]);
        assert_eq!(s.patterns.len(), 1);
    }
}
