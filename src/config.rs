//! Tunable constants the original implementation hard-codes. Collected here
//! so an embedding application can adjust them without patching source, in
//! the spirit of the teacher crate's small typed config structs (e.g.
//! `VertexStream`, `VertexDataAdapter`).

/// Vertex-cache optimizer and edge-caching compressor parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// FIFO vertex cache size used for Forsyth scoring. The spec fixes this
    /// at 32; changing it changes the scoring curve but not correctness.
    pub cache_size: u8,
    /// One past the largest index a batch may emit. Indices must stay below
    /// this so every code fits in the packer's three-byte UTF-8 alphabet.
    pub max_output_index: u32,
    /// How many index-array slots back the compressor scans for a matching
    /// edge (in units of one index, i.e. 3x the triangle lookback depth).
    pub max_backref: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache_size: 32,
            max_output_index: 0xD800,
            max_backref: 96,
        }
    }
}
