use crate::fs::Result;
use crate::walk::RawEntry;
use regex::{Regex, RegexBuilder};

/**
 Translates a wildcard pattern into an anchored regular expression source.

 - `*` matches any run of characters, `?` matches exactly one
 - neither wildcard matches a path separator, so a pattern only ever matches within one name
 - everything else is literal

 # Examples
 ```
 use findop::filters::glob_to_regex;

 let re = glob_to_regex("*.txt").unwrap();
 assert!(re.is_match("notes.TXT"));
 assert!(!re.is_match("notes.txt.bak"));
 ```

 # Errors
 [`crate::FindError::RegexError`] if the translated expression is rejected (e.g. it is too large).
*/
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::with_capacity(pattern.len() * 2 + 2);
    source.push('^');
    let mut utf8 = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(r"[^/\\]*"),
            '?' => source.push_str(r"[^/\\]"),
            literal => source.push_str(&regex::escape(literal.encode_utf8(&mut utf8))),
        }
    }
    source.push('$');

    Ok(RegexBuilder::new(&source).case_insensitive(true).build()?)
}

/**
 A compiled, case-insensitive name pattern.

 The empty pattern, `*` and `*.*` all match every name (the last one even names without a dot,
 as DOS wildcards always have) and skip the regex entirely.
*/
#[derive(Debug, Clone)]
pub struct NamePattern {
    regex: Option<Regex>,
}

impl NamePattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    /// As [`glob_to_regex`].
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = match pattern {
            "" | "*" | "*.*" => None,
            other => Some(glob_to_regex(other)?),
        };
        Ok(Self { regex })
    }

    /// A pattern that accepts everything.
    #[must_use]
    pub const fn match_all() -> Self {
        Self { regex: None }
    }

    #[inline]
    #[must_use]
    pub const fn matches_all(&self) -> bool {
        self.regex.is_none()
    }

    #[inline]
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.as_ref().is_none_or(|regex| regex.is_match(name))
    }

    /// Tests the entry's name, without decoding it when the pattern accepts everything.
    #[inline]
    #[must_use]
    pub fn matches(&self, entry: &RawEntry<'_>) -> bool {
        self.regex
            .as_ref()
            .is_none_or(|regex| regex.is_match(&entry.file_name()))
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        Self::match_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_match_within_a_name() {
        let pattern = NamePattern::new("*.txt").unwrap();
        assert!(pattern.is_match("a.txt"));
        assert!(pattern.is_match("A.TXT"));
        assert!(pattern.is_match(".txt"));
        assert!(!pattern.is_match("c.dat"));
        assert!(!pattern.is_match("sub/b.txt"));

        let single = NamePattern::new("?.rs").unwrap();
        assert!(single.is_match("a.rs"));
        assert!(!single.is_match("ab.rs"));
        assert!(!single.is_match(".rs"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let pattern = NamePattern::new("a+b(1).[x]").unwrap();
        assert!(pattern.is_match("a+b(1).[x]"));
        assert!(!pattern.is_match("aab1.x"));
    }

    #[test]
    fn match_all_spellings() {
        for spelling in ["", "*", "*.*"] {
            let pattern = NamePattern::new(spelling).unwrap();
            assert!(pattern.matches_all());
            assert!(pattern.is_match("no_dot_here"));
        }
        assert!(!NamePattern::new("*.?").unwrap().matches_all());
    }
}
