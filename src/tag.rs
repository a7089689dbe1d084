//! Invalidation tags
//!
//! A tag is the label connecting cached reads to the writes that affect
//! them: every cached query result carries the tags derived from its data,
//! every successful mutation declares the tags it invalidates, and the
//! cache refreshes exactly the entries whose tag sets intersect.

use std::fmt;

/// Tag namespace, usually one per record family ("Reports", "BankPayments")
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagKind(String);

impl TagKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TagKind {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for TagKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Tag identifier within a kind
///
/// `List` is the collection-wide marker: list queries attach it so that
/// membership changes (create/delete) can refresh every list view without
/// the cache knowing which filtered lists would have contained the record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagId {
    /// Collection-wide marker covering all list views of a kind
    List,
    /// Numeric record id
    Num(i64),
    /// String record id
    Str(String),
}

impl TagId {
    pub fn is_list(&self) -> bool {
        matches!(self, TagId::List)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagId::List => write!(f, "LIST"),
            TagId::Num(n) => write!(f, "{}", n),
            TagId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for TagId {
    fn from(n: i64) -> Self {
        TagId::Num(n)
    }
}

impl From<String> for TagId {
    fn from(s: String) -> Self {
        TagId::Str(s)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        TagId::Str(s.to_string())
    }
}

/// Invalidation tag: a (kind, id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub kind: TagKind,
    pub id: TagId,
}

impl Tag {
    /// Tag for a single record
    pub fn new(kind: impl Into<TagKind>, id: impl Into<TagId>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Collection-wide tag for a kind
    pub fn list(kind: impl Into<TagKind>) -> Self {
        Self {
            kind: kind.into(),
            id: TagId::List,
        }
    }

    pub fn is_list(&self) -> bool {
        self.id.is_list()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
