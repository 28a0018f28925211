//! Pattern for paths that must never be served.
//!
//! Dotfiles at the web root (`/.env`, `/.well-known/..`, `/.DS_Store`) and
//! version-control metadata anywhere in the path are denied before routing.

use regex::Regex;

use super::PolicyError;

/// Version-control directory names denied anywhere in a path.
pub const VCS_DIRECTORY_NAMES: &[&str] = &["_darcs", ".bzr", ".hg", "BitKeeper", ".git"];

/// Compiled hidden-path matcher.
///
/// Matches when the raw path starts with `/.` or contains any configured
/// name as a substring, so `/assets/.git/HEAD`
/// and `/repo.git` are both denied.
#[derive(Debug, Clone)]
pub struct HiddenPathPattern {
    regex: Regex,
}

impl HiddenPathPattern {
    /// Build a pattern over the given directory names.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::EmptyPattern`] if `names` is empty, or
    /// [`PolicyError::InvalidPattern`] if the regex fails to compile.
    pub fn with_names<I, S>(names: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives = names
            .into_iter()
            .map(|name| regex::escape(name.as_ref()))
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>();

        if alternatives.is_empty() {
            return Err(PolicyError::EmptyPattern);
        }

        let source = format!(r"(^/\.)|({})", alternatives.join("|"));
        let regex = Regex::new(&source).map_err(|e| PolicyError::InvalidPattern(e.to_string()))?;
        Ok(Self { regex })
    }

    /// Whether `raw_path` must be denied.
    #[must_use]
    pub fn is_match(&self, raw_path: &str) -> bool {
        self.regex.is_match(raw_path)
    }
}

impl Default for HiddenPathPattern {
    fn default() -> Self {
        let alternatives = VCS_DIRECTORY_NAMES
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        // Built from escaped compile-time literals, so compilation cannot fail.
        #[allow(clippy::expect_used)]
        let regex = Regex::new(&format!(r"(^/\.)|({alternatives})"))
            .expect("hidden-path pattern built from escaped literals compiles");
        Self { regex }
    }
}

impl PartialEq for HiddenPathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.regex.as_str() == other.regex.as_str()
    }
}

impl Eq for HiddenPathPattern {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_denies_root_dotfiles() {
        let pattern = HiddenPathPattern::default();
        for path in ["/.env", "/.DS_Store", "/.git/config", "/.well-known/x"] {
            assert!(pattern.is_match(path), "{path} should be hidden");
        }
    }

    #[test]
    fn test_default_denies_vcs_names_anywhere() {
        let pattern = HiddenPathPattern::default();
        for path in [
            "/assets/.git/HEAD",
            "/_darcs/prefs",
            "/src/.hg/store",
            "/x/.bzr/branch",
            "/BitKeeper/etc",
        ] {
            assert!(pattern.is_match(path), "{path} should be hidden");
        }
    }

    #[test]
    fn test_default_allows_ordinary_paths() {
        let pattern = HiddenPathPattern::default();
        for path in [
            "/",
            "/api/products",
            "/assets/index-4f2a.js",
            "/robots.txt",
            "/shop/item.name",
        ] {
            assert!(!pattern.is_match(path), "{path} should be allowed");
        }
    }

    #[test]
    fn test_with_names_escapes_metacharacters() {
        let pattern = HiddenPathPattern::with_names([".svn"]).unwrap();
        assert!(pattern.is_match("/code/.svn/entries"));
        // `.` is literal, not "any character".
        assert!(!pattern.is_match("/code/xsvn/entries"));
        // Root dotfiles are always covered.
        assert!(pattern.is_match("/.env"));
    }

    #[test]
    fn test_with_names_rejects_empty() {
        assert_eq!(
            HiddenPathPattern::with_names(Vec::<&str>::new()).unwrap_err(),
            PolicyError::EmptyPattern
        );
    }
}
