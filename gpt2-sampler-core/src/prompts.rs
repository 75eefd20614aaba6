use std::path::Path;

use crate::error::{Error, Result};

const JEOPARDY: &str = include_str!("../prompts/jeopardy.json");

/// Ordered, non-empty list of prompts fed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    prompts: Vec<String>,
}

impl PromptSet {
    pub fn new(prompts: Vec<String>) -> Result<Self> {
        if prompts.is_empty() {
            return Err(Error::Prompts("no prompts given".into()));
        }
        Ok(Self { prompts })
    }

    /// The built-in Jeopardy clue list.
    pub fn jeopardy() -> Result<Self> {
        Self::from_json_str(JEOPARDY)
    }

    /// A JSON array of strings.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let prompts: Vec<String> = serde_json::from_str(raw).map_err(|e| Error::Prompts(e.to_string()))?;
        Self::new(prompts)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw).map_err(|e| Error::Prompts(format!("{}: {e}", path.display())))
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prompts.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_list_keeps_order() {
        let set = PromptSet::jeopardy().unwrap();
        assert_eq!(set.len(), 102);
        let first = set.iter().next().unwrap();
        assert!(first.starts_with("C: THE CABINET Q:"));
        assert_eq!(set.iter().filter(|p| p.is_empty()).count(), 2);
        assert!(set.iter().last().unwrap().starts_with("C: EUROPEAN HISTORY"));
    }

    #[test]
    fn test_custom_list() {
        let set = PromptSet::from_json_str(r#"["b", "a", ""]"#).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["b", "a", ""]);
    }

    #[test]
    fn test_rejects_empty_and_malformed() {
        assert!(matches!(PromptSet::from_json_str("[]"), Err(Error::Prompts(_))));
        assert!(matches!(PromptSet::from_json_str("{\"a\": 1}"), Err(Error::Prompts(_))));
    }
}
