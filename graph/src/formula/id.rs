use std::{borrow::Borrow, fmt, sync::Arc};

/// Names one formula. Cheap to clone; compares and hashes as its text.
///
/// Hosts usually mint ids as `<number>:<node>`, where `node` names the peer
/// that hosts the formula. The graph itself treats ids as opaque and only
/// [`FormulaId::parse`] looks inside.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct FormulaId(Arc<str>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("formula identifier {0:?} has no ':' between number and node")]
    MissingSeparator(String),
    #[error("formula identifier {0:?} has an empty {1}")]
    EmptyPart(String, &'static str),
}

impl FormulaId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn format(number: &str, node: &str) -> Self {
        Self::new(format!("{number}:{node}"))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the id into `(number, node)`.
    pub fn parse(&self) -> Result<(&str, &str), IdError> {
        let (number, node) = self
            .0
            .split_once(':')
            .ok_or_else(|| IdError::MissingSeparator(self.0.to_string()))?;
        if number.is_empty() {
            return Err(IdError::EmptyPart(self.0.to_string(), "number"));
        }
        if node.is_empty() {
            return Err(IdError::EmptyPart(self.0.to_string(), "node"));
        }
        Ok((number, node))
    }

    pub fn node(&self) -> Result<&str, IdError> {
        self.parse().map(|(_, node)| node)
    }

    /// Whether this id names a formula hosted by `node`. Malformed ids are
    /// never on any node.
    pub fn is_on_node(&self, node: &str) -> bool {
        matches!(self.parse(), Ok((_, n)) if n == node)
    }
}

impl fmt::Debug for FormulaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for FormulaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FormulaId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FormulaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FormulaId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FormulaId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}
