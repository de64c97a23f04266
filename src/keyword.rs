use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Stability level for an architecture keyword.
///
/// See [PMS 7.3.3](https://projects.gentoo.org/pms/9/pms.html#keywords).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stability {
    /// `amd64`
    Stable,
    /// `~amd64`
    Testing,
    /// `-amd64`
    Disabled,
    /// `-*`
    DisabledAll,
}

/// A single entry from the `KEYWORDS` variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keyword {
    /// Architecture name (`amd64`, `arm64`, ...). `*` for `-*`.
    pub arch: String,
    pub stability: Stability,
}

impl Keyword {
    /// Parse a space-separated `KEYWORDS` line.
    ///
    /// # Examples
    ///
    /// ```
    /// use portage_package::{Keyword, Stability};
    ///
    /// let kws = Keyword::parse_line("amd64 ~arm64 -x86 -*").unwrap();
    /// assert_eq!(kws.len(), 4);
    /// assert_eq!(kws[1].stability, Stability::Testing);
    /// assert_eq!(kws[3].stability, Stability::DisabledAll);
    /// ```
    pub fn parse_line(input: &str) -> Result<Vec<Keyword>> {
        input.split_whitespace().map(str::parse).collect()
    }
}

impl FromStr for Keyword {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "-*" {
            return Ok(Keyword {
                arch: "*".to_string(),
                stability: Stability::DisabledAll,
            });
        }

        let (arch, stability) = match s.as_bytes().first() {
            Some(b'~') => (&s[1..], Stability::Testing),
            Some(b'-') => (&s[1..], Stability::Disabled),
            _ => (s, Stability::Stable),
        };
        if arch.is_empty() || arch.starts_with(['~', '-']) || arch.contains('*') {
            return Err(Error::InvalidKeyword(s.to_string()));
        }

        Ok(Keyword {
            arch: arch.to_string(),
            stability,
        })
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.stability {
            Stability::Stable => write!(f, "{}", self.arch),
            Stability::Testing => write!(f, "~{}", self.arch),
            Stability::Disabled => write!(f, "-{}", self.arch),
            Stability::DisabledAll => write!(f, "-*"),
        }
    }
}

/// Why a package is keyword masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordMask {
    /// Not keyworded for any accepted architecture.
    Missing,
    /// Only keyworded as testing for an architecture accepted as stable.
    Unstable,
}

impl fmt::Display for KeywordMask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            KeywordMask::Missing => "missing",
            KeywordMask::Unstable => "unstable",
        })
    }
}

/// Apply a stack of `ACCEPT_KEYWORDS` tokens.
///
/// `-*` drops everything accepted so far and `-kw` drops a single keyword.
pub fn accepted_keywords<'a, I>(tokens: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut accepted = BTreeSet::new();
    for token in tokens {
        match token.strip_prefix('-') {
            Some("*") => accepted.clear(),
            Some(keyword) => {
                accepted.remove(keyword);
            }
            None => {
                accepted.insert(token.to_string());
            }
        }
    }
    accepted
}

/// The keywords of a package that stand after `-*`/`-arch` removal.
fn effective_keywords(keywords: &[Keyword]) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    for keyword in keywords {
        match keyword.stability {
            Stability::DisabledAll => groups.clear(),
            Stability::Disabled => groups.retain(|k| *k != keyword.arch),
            Stability::Stable | Stability::Testing => {
                let text = keyword.to_string();
                if !groups.contains(&text) {
                    groups.push(text);
                }
            }
        }
    }
    groups
}

/// The package keywords that keep it masked under `accepted`, or nothing if
/// it is visible.
///
/// `**` in `accepted` accepts anything, `*` any stable keyword and `~*` any
/// testing keyword. A package without keywords reports `**`.
///
/// # Examples
///
/// ```
/// use portage_package::{accepted_keywords, missing_keywords, Keyword};
///
/// let accepted = accepted_keywords(["amd64"]);
/// let keywords = Keyword::parse_line("~amd64 x86").unwrap();
/// assert_eq!(missing_keywords(&keywords, &accepted), ["~amd64", "x86"]);
///
/// let accepted = accepted_keywords(["amd64", "~amd64"]);
/// assert!(missing_keywords(&keywords, &accepted).is_empty());
/// ```
pub fn missing_keywords(keywords: &[Keyword], accepted: &BTreeSet<String>) -> Vec<String> {
    let groups = effective_keywords(keywords);

    let mut has_stable = false;
    let mut has_testing = false;
    let mut matched = false;
    for group in &groups {
        if accepted.contains(group) {
            matched = true;
            break;
        }
        if group.starts_with('~') {
            has_testing = true;
        } else {
            has_stable = true;
        }
    }

    matched = matched
        || accepted.contains("**")
        || (has_stable && accepted.contains("*"))
        || (has_testing && accepted.contains("~*"));

    if matched {
        Vec::new()
    } else if groups.is_empty() {
        vec!["**".to_string()]
    } else {
        groups
    }
}

/// Classify the result of [`missing_keywords`] against the global
/// `ACCEPT_KEYWORDS`.
pub fn keyword_mask(missing: &[String], global: &BTreeSet<String>) -> Option<KeywordMask> {
    if missing.is_empty() {
        return None;
    }
    if missing.iter().any(|k| k == "**") {
        return Some(KeywordMask::Missing);
    }
    let unstable = missing
        .iter()
        .any(|k| global.contains(k.trim_start_matches('~')));
    Some(if unstable {
        KeywordMask::Unstable
    } else {
        KeywordMask::Missing
    })
}
