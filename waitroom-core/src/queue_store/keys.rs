//! Store key naming for per-queue wait and proceed sets
//!
//! The layout is shared with any other process reading the same store, so the
//! formats below must not change.

const KEY_PREFIX: &str = "users:queue:";
const WAIT_SUFFIX: &str = ":wait";
const PROCEED_SUFFIX: &str = ":proceed";

/// Glob pattern matching every wait set key
pub const WAIT_KEY_PATTERN: &str = "users:queue:*:wait";

/// Key of the wait set for `queue`
pub fn wait_key(queue: &str) -> String {
    format!("{}{}{}", KEY_PREFIX, queue, WAIT_SUFFIX)
}

/// Key of the proceed set for `queue`
pub fn proceed_key(queue: &str) -> String {
    format!("{}{}{}", KEY_PREFIX, queue, PROCEED_SUFFIX)
}

/// Recover the queue name from a wait set key.
///
/// Strips the fixed prefix and suffix rather than splitting on `:`, so queue
/// names that themselves contain `:` come back intact.
pub fn queue_name_from_wait_key(key: &str) -> Option<&str> {
    key.strip_prefix(KEY_PREFIX)?.strip_suffix(WAIT_SUFFIX)
}

/// Glob pattern over store keys.
///
/// Supports `*` (any run of characters, including none) and `?` (exactly one
/// character). Every other character, `[` included, matches itself.
/// [`KeyPattern::to_sql_glob`] renders the same pattern for SQLite's `GLOB`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern(String);

impl KeyPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Pattern matching every wait set key
    pub fn wait_keys() -> Self {
        Self::new(WAIT_KEY_PATTERN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The pattern as a SQLite `GLOB` operand with identical semantics.
    ///
    /// `GLOB` reads `[` as the start of a character class, so it is escaped
    /// as the single-member class `[[]`.
    pub fn to_sql_glob(&self) -> String {
        self.0.replace('[', "[[]")
    }

    /// Check whether `key` matches this pattern
    pub fn matches(&self, key: &str) -> bool {
        let pattern: Vec<char> = self.0.chars().collect();
        let text: Vec<char> = key.chars().collect();

        // Iterative wildcard match with single-star backtracking
        let (mut p, mut t) = (0usize, 0usize);
        let mut star: Option<usize> = None;
        let mut star_text = 0usize;

        while t < text.len() {
            if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
                p += 1;
                t += 1;
            } else if p < pattern.len() && pattern[p] == '*' {
                star = Some(p);
                star_text = t;
                p += 1;
            } else if let Some(star_pos) = star {
                p = star_pos + 1;
                star_text += 1;
                t = star_text;
            } else {
                return false;
            }
        }

        while p < pattern.len() && pattern[p] == '*' {
            p += 1;
        }

        p == pattern.len()
    }
}

impl From<&str> for KeyPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}
