use std::fmt;

/// A reference to a line and column in an input source file.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SourcePosition {
    index: usize,
    line: usize,
    col: usize,
}

/// Range of characters in the input source, starting at the character pointed
/// by the `start` field and ending just before the `end` marker.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Span {
    /// Start position of this [`Span`].
    pub start: SourcePosition,

    /// End position of this [`Span`].
    ///
    /// > __NOTE__: This points to the first source position __after__ this
    /// >           [`Span`].
    pub end: SourcePosition,
}

impl Span {
    pub(crate) fn new(start: SourcePosition, end: SourcePosition) -> Self {
        Self { start, end }
    }

    pub(crate) fn zero_width(pos: SourcePosition) -> Self {
        Self::new(pos, pos)
    }

    pub(crate) fn single_width(pos: SourcePosition) -> Self {
        let mut end = pos;
        end.advance_col();

        Self { start: pos, end }
    }
}

/// Data structure used to wrap items with their [`Span`] in the input source.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Spanning<T> {
    /// The wrapped item.
    pub item: T,

    /// Start and end positions of the wrapped item in the input source.
    pub span: Span,
}

impl<T> Spanning<T> {
    pub(crate) fn new(span: Span, item: T) -> Self {
        Self { item, span }
    }

    pub(crate) fn zero_width(pos: SourcePosition, item: T) -> Self {
        Self::new(Span::zero_width(pos), item)
    }

    pub(crate) fn single_width(pos: SourcePosition, item: T) -> Self {
        Self::new(Span::single_width(pos), item)
    }

    pub(crate) fn start_end(start: SourcePosition, end: SourcePosition, item: T) -> Self {
        Self::new(Span::new(start, end), item)
    }

    /// Modifies the contents of the spanned item.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Spanning<U> {
        Spanning::new(self.span, f(self.item))
    }
}

impl<T: fmt::Display> fmt::Display for Spanning<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. At {}", self.item, self.span.start)
    }
}

impl<T: std::error::Error> std::error::Error for Spanning<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.item.source()
    }
}

impl SourcePosition {
    #[doc(hidden)]
    pub fn new(index: usize, line: usize, col: usize) -> Self {
        assert!(index >= line + col);

        Self { index, line, col }
    }

    #[doc(hidden)]
    pub fn new_origin() -> Self {
        Self {
            index: 0,
            line: 0,
            col: 0,
        }
    }

    pub(crate) fn advance_col(&mut self) {
        self.index += 1;
        self.col += 1;
    }

    pub(crate) fn advance_line(&mut self) {
        self.index += 1;
        self.line += 1;
        self.col = 0;
    }

    /// The index of this position in the input source.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The line of this position in the input source, zero-indexed.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The column of this position in the input source, zero-indexed.
    pub fn column(&self) -> usize {
        self.col
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
