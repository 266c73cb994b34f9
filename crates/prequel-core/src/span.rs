//! Byte ranges into source text.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A half-open byte range in the source SQL string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Byte offset from start of the source (inclusive)
    pub start: usize,
    /// Byte offset from start of the source (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A zero-length span at the given offset.
    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// The smallest span covering both `self` and `other`.
    pub fn to(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Slices the source text this span refers to.
    ///
    /// Callers must pass the same source the span was produced from.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end.min(source.len())]
    }

    /// Shifts the span left by `offset` bytes, saturating at zero.
    pub fn rebase(&self, offset: usize) -> Span {
        Span {
            start: self.start.saturating_sub(offset),
            end: self.end.saturating_sub(offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covering_span() {
        let a = Span::new(3, 7);
        let b = Span::new(5, 12);
        assert_eq!(a.to(b), Span::new(3, 12));
        assert_eq!(b.to(a), Span::new(3, 12));
    }

    #[test]
    fn slice_is_byte_accurate() {
        let src = "SELECT 1;";
        assert_eq!(Span::new(0, 6).slice(src), "SELECT");
        assert_eq!(Span::new(7, 8).slice(src), "1");
    }

    #[test]
    fn rebase_saturates() {
        assert_eq!(Span::new(2, 4).rebase(3), Span::new(0, 1));
    }
}
