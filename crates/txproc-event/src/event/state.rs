//! Lazy section storage.

use std::borrow::Cow;

use super::sections::{ExecParams, Extended, SysParams};

/// JSON mapping for one optional section.
pub(crate) trait SectionValue: Default + Sized {
    fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error>;
    fn render(&self) -> Result<Vec<u8>, serde_json::Error>;
}

impl SectionValue for Extended {
    fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    fn render(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl SectionValue for SysParams {
    fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    fn render(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl SectionValue for ExecParams {
    fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        Self::from_json(bytes)
    }

    fn render(&self) -> Result<Vec<u8>, serde_json::Error> {
        self.to_json()
    }
}

/// An optional section, either still raw or parsed.
///
/// A parsed section keeps its original bytes until it is borrowed mutably,
/// so a section that was only read is written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Section<T> {
    Deferred(Vec<u8>),
    Materialized { value: T, original: Option<Vec<u8>> },
}

impl<T: SectionValue> Section<T> {
    /// A section on a freshly built event: parsed and rendered on encode.
    pub(crate) fn fresh() -> Self {
        Self::Materialized {
            value: T::default(),
            original: None,
        }
    }

    /// A section captured from the wire. Absent sections count as parsed.
    pub(crate) fn from_wire(bytes: &[u8], eager: bool) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() || eager {
            let value = if bytes.is_empty() {
                T::default()
            } else {
                T::parse(bytes)?
            };
            Ok(Self::Materialized {
                value,
                original: Some(bytes.to_vec()),
            })
        } else {
            Ok(Self::Deferred(bytes.to_vec()))
        }
    }

    pub(crate) const fn is_materialized(&self) -> bool {
        matches!(self, Self::Materialized { .. })
    }

    pub(crate) const fn get(&self) -> Option<&T> {
        match self {
            Self::Deferred(_) => None,
            Self::Materialized { value, .. } => Some(value),
        }
    }

    pub(crate) fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Deferred(_) => None,
            Self::Materialized { value, original } => {
                *original = None;
                Some(value)
            }
        }
    }

    /// Parses deferred bytes in place. Already parsed sections are untouched.
    pub(crate) fn materialize(&mut self) -> Result<(), serde_json::Error> {
        if let Self::Deferred(bytes) = self {
            let value = T::parse(bytes)?;
            let original = std::mem::take(bytes);
            *self = Self::Materialized {
                value,
                original: Some(original),
            };
        }
        Ok(())
    }

    /// Raw bytes when the section was captured and not modified since.
    pub(crate) fn raw(&self) -> Option<&[u8]> {
        match self {
            Self::Deferred(bytes) => Some(bytes),
            Self::Materialized { original, .. } => original.as_deref(),
        }
    }

    /// Bytes to place on the wire.
    pub(crate) fn to_wire(&self) -> Result<Cow<'_, [u8]>, serde_json::Error> {
        match self {
            Self::Deferred(bytes) => Ok(Cow::Borrowed(bytes)),
            Self::Materialized {
                original: Some(bytes),
                ..
            } => Ok(Cow::Borrowed(bytes)),
            Self::Materialized {
                value,
                original: None,
            } => value.render().map(Cow::Owned),
        }
    }
}
