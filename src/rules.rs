use anyhow::Context;
use std::fs;
use std::path::Path;

/// Load the keyword list: one keyword per line, trimmed and lowercased,
/// blank lines dropped. Order is preserved.
pub fn load_keywords(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading keywords file {}", path.display()))?;
    let keywords = content
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty())
        .collect();
    Ok(keywords)
}

/// True iff any keyword occurs as a substring of the body.
///
/// Keywords are lowercased by the loader but the body is compared in its
/// raw case, so matching is effectively case-sensitive on the body side.
/// Kept that way for parity with the deployed behavior.
pub fn body_matches(body: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|keyword| body.contains(keyword.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_keywords_trims_lowercases_and_drops_blanks() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "  Outage \n\nDisk Full\nerror\n   \n").unwrap();
        let keywords = load_keywords(file.path()).unwrap();
        assert_eq!(keywords, vec!["outage", "disk full", "error"]);
    }

    #[test]
    fn test_body_matches_any_keyword() {
        let keywords = vec!["outage".to_string(), "disk full".to_string()];
        assert!(body_matches("the disk full condition persists", &keywords));
        assert!(!body_matches("all systems nominal", &keywords));
    }

    #[test]
    fn test_matching_is_case_sensitive_on_body() {
        // Keywords are lowered at load time but the body is not.
        let keywords = vec!["outage".to_string()];
        assert!(body_matches("an outage occurred", &keywords));
        assert!(!body_matches("an OUTAGE occurred", &keywords));
    }

    #[test]
    fn test_empty_keyword_list_never_matches() {
        assert!(!body_matches("anything at all", &[]));
    }
}
