use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty version string")]
    Empty,

    #[error("invalid component {component:?} in version {input:?}")]
    InvalidComponent { input: String, component: String },
}

/// A dotted numeric version such as `18.1.2`.
///
/// Missing trailing components compare as zero, so `18.1` and `18.1.0` are
/// equal (and hash identically).
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    /// Parse a version string.
    ///
    /// Examples:
    /// - "17" -> [17]
    /// - "17.1" -> [17, 1]
    /// - " 16.7.10 " -> [16, 7, 10]
    /// - "17.a" -> Err(InvalidComponent)
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        let components = trimmed
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ParseError::InvalidComponent {
                        input: input.to_string(),
                        component: part.to_string(),
                    });
                }
                part.parse::<u64>()
                    .map_err(|_| ParseError::InvalidComponent {
                        input: input.to_string(),
                        component: part.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }

    #[cfg(test)]
    pub(crate) fn components(&self) -> &[u64] {
        &self.components
    }

    /// Components with trailing zeros removed
    fn significant(&self) -> &[u64] {
        let len = self
            .components
            .iter()
            .rposition(|&c| c != 0)
            .map_or(0, |i| i + 1);
        &self.components[..len]
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Compare two version strings
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, ParseError> {
    Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}

/// Sort version strings ascending, dropping unparseable entries.
///
/// Strings that are numerically equal ("17.0" and "17.0.0") collapse to the
/// first one seen.
pub fn sort_versions<I, S>(versions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed: Vec<(Version, String)> = versions
        .into_iter()
        .filter_map(|v| {
            let raw = v.as_ref();
            Version::parse(raw).ok().map(|parsed| (parsed, raw.to_string()))
        })
        .collect();

    // stable sort keeps first-seen order among equal versions
    parsed.sort_by(|(a, _), (b, _)| a.cmp(b));
    parsed.dedup_by(|(a, _), (b, _)| a == b);

    parsed.into_iter().map(|(_, raw)| raw).collect()
}
