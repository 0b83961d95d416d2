//! Structured key paths into a JSON value tree.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use super::Value;

/// A single path segment: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Seg {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => write!(f, "{k}"),
            Seg::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Error parsing a state path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The path string was empty.
    #[error("empty path")]
    Empty,
    /// A path segment was empty (`"a..b"`).
    #[error("empty segment in path: {0}")]
    EmptySegment(String),
}

/// A parsed path into the shared state tree, e.g. `"nested.src.0"`.
///
/// Segments made entirely of ASCII digits parse as array indices, everything
/// else as object keys. Lookup is tolerant in the digit direction: an
/// [`Seg::Index`] applied to an object falls back to the decimal string key,
/// and a digit-only [`Seg::Key`] applied to an array indexes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StatePath(SmallVec<[Seg; 4]>);

impl StatePath {
    /// Builds a path from explicit segments.
    #[must_use]
    pub fn from_segs(segs: impl IntoIterator<Item = Seg>) -> Self {
        Self(segs.into_iter().collect())
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the root path (no segments).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical dotted string form, usable as a memoization key.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Resolves the path against a value tree.
    #[must_use]
    pub fn lookup<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        let mut current = root;
        for seg in &self.0 {
            current = match (seg, current) {
                (Seg::Key(k), Value::Object(map)) => map.get(k)?,
                (Seg::Index(i), Value::Array(items)) => items.get(*i)?,
                (Seg::Index(i), Value::Object(map)) => map.get(&i.to_string())?,
                (Seg::Key(k), Value::Array(items)) => items.get(k.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Writes `new` at this path, creating intermediate objects for missing
    /// key segments. Index segments require an existing array slot.
    ///
    /// Returns `false` when the path cannot be realized (e.g. indexing past
    /// the end of an array, or keying into a non-object scalar).
    pub fn set_in(&self, root: &mut Value, new: Value) -> bool {
        let mut current = root;
        let Some((last, init)) = self.0.split_last() else {
            *current = new;
            return true;
        };
        for seg in init {
            current = match seg {
                Seg::Key(k) => {
                    if current.is_null() {
                        *current = Value::Object(serde_json::Map::new());
                    }
                    match current {
                        Value::Object(map) => map.entry(k.clone()).or_insert(Value::Null),
                        _ => return false,
                    }
                }
                Seg::Index(i) => match current {
                    Value::Array(items) if *i < items.len() => &mut items[*i],
                    _ => return false,
                },
            };
        }
        match last {
            Seg::Key(k) => {
                if current.is_null() {
                    *current = Value::Object(serde_json::Map::new());
                }
                match current {
                    Value::Object(map) => {
                        map.insert(k.clone(), new);
                        true
                    }
                    _ => false,
                }
            }
            Seg::Index(i) => match current {
                Value::Array(items) if *i < items.len() => {
                    items[*i] = new;
                    true
                }
                _ => false,
            },
        }
    }
}

impl FromStr for StatePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let mut segs = SmallVec::new();
        for part in s.split('.') {
            if part.is_empty() {
                return Err(PathError::EmptySegment(s.to_string()));
            }
            if part.bytes().all(|b| b.is_ascii_digit()) {
                // Digit-only segments cannot overflow usize in practice, but
                // fall back to a key if they somehow do.
                match part.parse::<usize>() {
                    Ok(i) => segs.push(Seg::Index(i)),
                    Err(_) => segs.push(Seg::Key(part.to_string())),
                }
            } else {
                segs.push(Seg::Key(part.to_string()));
            }
        }
        Ok(Self(segs))
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}
