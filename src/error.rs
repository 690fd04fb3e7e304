/// A type alias for handling errors throughout the codec.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while quantizing, optimizing, or packing a mesh.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Input handed to the core was not well-formed: a non-finite float, a
    /// triangle index out of range, an attribute count not divisible by 8, or
    /// a mesh with zero extent on every position axis.
    #[error("malformed input: {0}")]
    MalformedInput(std::borrow::Cow<'static, str>),

    /// Internal invariant violation: an emitted index reached the 0xD800
    /// batch ceiling without the vertex-cache optimizer closing the batch
    /// first. This can only happen if the optimizer or compressor has a bug.
    #[error("BUG: index {index} reached the batch ceiling without a batch close")]
    IndexOverflow { index: u32 },

    /// The byte sink receiving packed UTF-8 output failed.
    #[error("sink error: {0}")]
    Sink(std::borrow::Cow<'static, str>),

    /// An unexpected I/O error occurred in an I/O-backed sink.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    #[inline]
    pub(crate) fn malformed(msg: &'static str) -> Self {
        Self::MalformedInput(std::borrow::Cow::Borrowed(msg))
    }

    #[inline]
    pub(crate) fn malformed_dynamic(msg: String) -> Self {
        Self::MalformedInput(std::borrow::Cow::Owned(msg))
    }

    #[inline]
    pub(crate) fn sink(msg: &'static str) -> Self {
        Self::Sink(std::borrow::Cow::Borrowed(msg))
    }
}
