// Redis key namespacing utilities

/// Maps logical keys into one adapter's namespace
///
/// # Format
/// "{prefix}:{logical_key}"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Namespaced form of a logical key
    pub fn key(&self, logical: &str) -> String {
        format!("{}:{}", self.prefix, logical)
    }

    /// Namespaced form of every key in `logical`
    pub fn keys(&self, logical: &[&str]) -> Vec<String> {
        logical.iter().map(|k| self.key(k)).collect()
    }

    /// Logical key for a namespaced key, if it belongs to this namespace
    pub fn strip<'a>(&self, full: &'a str) -> Option<&'a str> {
        full.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
    }

    /// Glob pattern matching every key of this namespace
    ///
    /// Glob metacharacters in the prefix are escaped so a prefix such as
    /// "app[1]" cannot match keys of other namespaces.
    pub fn match_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.prefix.len() + 2);
        for c in self.prefix.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push_str(":*");
        pattern
    }
}
