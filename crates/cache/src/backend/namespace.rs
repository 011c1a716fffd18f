/// Key scoping under an optional base key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    base_key: Option<String>,
    separator: String,
}

impl Namespace {
    pub fn new(base_key: Option<String>, separator: impl Into<String>) -> Self {
        Self {
            base_key: base_key.filter(|b| !b.is_empty()),
            separator: separator.into(),
        }
    }

    pub fn base_key(&self) -> Option<&str> {
        self.base_key.as_deref()
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// `base_key + separator`, when a base key is set
    pub fn prefix(&self) -> Option<String> {
        self.base_key
            .as_ref()
            .map(|base| format!("{base}{}", self.separator))
    }

    /// Full storage key. Keys already carrying the prefix are left alone.
    pub fn key(&self, key: &str) -> String {
        match self.prefix() {
            Some(prefix) if !key.starts_with(&prefix) => format!("{prefix}{key}"),
            _ => key.to_string(),
        }
    }

    /// Whether a storage key belongs to this namespace
    pub fn owns(&self, full_key: &str) -> bool {
        match self.prefix() {
            Some(prefix) => full_key.starts_with(&prefix),
            None => true,
        }
    }

    /// Storage key without the namespace prefix
    pub fn strip<'a>(&self, full_key: &'a str) -> &'a str {
        match self.prefix() {
            Some(prefix) => full_key.strip_prefix(prefix.as_str()).unwrap_or(full_key),
            None => full_key,
        }
    }

    /// Namespace for another base key with the same separator
    pub fn with_base_key(&self, base_key: &str) -> Self {
        Self::new(Some(base_key.to_string()), self.separator.clone())
    }
}
