//! Edge-caching compressor with parallelogram prediction.
//!
//! Grounded in `webgl-loader/compress.h` (`EdgeCachingCompressor::Compress`,
//! `ParallelogramPredictor`, `SimplePredictor`, `EncodeDeltaAttrib`,
//! `HighWaterMark`, `UpdateLastAttrib`). The header's `CompressWithLRU` and
//! the `LruEdge*` family are a documented dead end in the original (the
//! class comment above `CompressWithLRU` reads "Work in progress. Does not
//! remotely work."); they are intentionally not ported. Only the linear
//! backref scan in `Compress` is implemented here.

use crate::config::Config;
use crate::mesh::{CodeList, QuantizedAttribList, WebGLMesh, NUM_ATTRIBS};
use crate::packing::{pack_u16_or_zero, zig_zag, ByteSink};

/// Normalizes a 3-vector to `target_len`, treating a zero-length input as
/// the zero vector rather than dividing by zero (`rcp_safe`-style).
fn normalize_to(v: [f32; 3], target_len: f32) -> [f32; 3] {
    let norm_sq = v[0] * v[0] + v[1] * v[1] + v[2] * v[2];
    if norm_sq == 0.0 {
        return [0.0, 0.0, 0.0];
    }
    let scale = target_len / norm_sq.sqrt();
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

fn cross(e1: [f32; 3], e2: [f32; 3]) -> [f32; 3] {
    [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ]
}

/// Processes one vertex-cache-optimized batch, producing parallel delta and
/// code streams. Consumes the batch because it rewinds triangle winding
/// in place while scanning for edge matches.
pub struct EdgeCachingCompressor<'a> {
    attribs: &'a QuantizedAttribList,
    indices: Vec<u16>,
    deltas: QuantizedAttribList,
    codes: CodeList,
    config: Config,
    high_water: u16,
    last_attrib: [u16; NUM_ATTRIBS],
}

impl<'a> EdgeCachingCompressor<'a> {
    pub fn new(mesh: &'a WebGLMesh) -> Self {
        Self::with_config(mesh, Config::default())
    }

    pub fn with_config(mesh: &'a WebGLMesh, config: Config) -> Self {
        EdgeCachingCompressor {
            attribs: &mesh.attribs,
            indices: mesh.indices.clone(),
            deltas: vec![0u16; mesh.attribs.len()],
            codes: CodeList::new(),
            config,
            high_water: 0,
            last_attrib: [0u16; NUM_ATTRIBS],
        }
    }

    fn num_vertices(&self) -> usize {
        self.attribs.len() / NUM_ATTRIBS
    }

    fn attrib_vertex(&self, index: usize) -> [u16; NUM_ATTRIBS] {
        let base = index * NUM_ATTRIBS;
        let mut out = [0u16; NUM_ATTRIBS];
        out.copy_from_slice(&self.attribs[base..base + NUM_ATTRIBS]);
        out
    }

    /// Runs the normal pre-pass, then the per-triangle main loop, and
    /// returns the `(deltas, codes)` pair ready for UTF-8 emission.
    pub fn compress(mut self) -> (QuantizedAttribList, CodeList) {
        self.normal_pre_pass();
        self.main_loop();
        (self.deltas, self.codes)
    }

    fn normal_pre_pass(&mut self) {
        let num_vertices = self.num_vertices();
        let mut crosses = vec![[0f32; 3]; num_vertices];
        for tri in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let p0 = self.attrib_vertex(i0);
            let p1 = self.attrib_vertex(i1);
            let p2 = self.attrib_vertex(i2);
            let e1 = [
                p1[0] as f32 - p0[0] as f32,
                p1[1] as f32 - p0[1] as f32,
                p1[2] as f32 - p0[2] as f32,
            ];
            let e2 = [
                p2[0] as f32 - p0[0] as f32,
                p2[1] as f32 - p0[1] as f32,
                p2[2] as f32 - p0[2] as f32,
            ];
            let face_cross = cross(e1, e2);
            for &v in &[i0, i1, i2] {
                crosses[v][0] += face_cross[0];
                crosses[v][1] += face_cross[1];
                crosses[v][2] += face_cross[2];
            }
        }

        for idx in 0..num_vertices {
            let predicted = normalize_to(crosses[idx], 511.0);
            let attrib = self.attrib_vertex(idx);
            let stored = [
                attrib[5] as f32 - 511.0,
                attrib[6] as f32 - 511.0,
                attrib[7] as f32 - 511.0,
            ];
            let actual = normalize_to(stored, 511.0);
            for ch in 0..3 {
                let delta = actual[ch] - predicted[ch];
                let code = zig_zag(delta.trunc() as i16);
                self.deltas[num_vertices * (5 + ch) + idx] = code;
            }
        }
    }

    fn main_loop(&mut self) {
        let num_triangles = self.indices.len() / 3;
        for t in 0..num_triangles {
            let s = t * 3;
            let max_backref = s.min(self.config.max_backref);
            match self.find_edge_match(s, max_backref) {
                Some((backref_code, backref_vert)) => {
                    self.parallelogram_predictor(backref_code, backref_vert, s)
                }
                None => self.simple_predictor(max_backref, s),
            }
        }
    }

    /// Scans up to `max_backref` index slots back for a matching edge,
    /// rotating the triangle at `s` in place so the matched edge comes
    /// first. Returns `(edge-match code, opposite vertex of the match)`.
    ///
    /// Candidate offsets run `3, 6, …, max_backref`, and each candidate can
    /// match in one of three rotations, whose code is the offset plus 0, 1,
    /// or 2. The largest code this can produce is `max_backref + 2`; the
    /// simple predictor's reservation offset (see `simple_predictor`) must
    /// stay strictly above that so the two code spaces never collide.
    fn find_edge_match(&mut self, s: usize, max_backref: usize) -> Option<(u16, u16)> {
        let i0 = self.indices[s];
        let i1 = self.indices[s + 1];
        let i2 = self.indices[s + 2];

        // Candidates start one triangle back (`backref == 0` would compare
        // the triangle against itself, which can never match a
        // non-degenerate triangle and wastes a scan slot).
        let mut backref = 3usize;
        while backref <= max_backref {
            let c = s - backref;
            let j0 = self.indices[c];
            let j1 = self.indices[c + 1];
            let j2 = self.indices[c + 2];
            let b = backref as u16;

            if j1 == i1 && j2 == i0 {
                return Some((b, j0));
            } else if j1 == i0 && j2 == i2 {
                self.rotate(s, i2, i0, i1);
                return Some((b, j0));
            } else if j1 == i2 && j2 == i1 {
                self.rotate(s, i1, i2, i0);
                return Some((b, j0));
            } else if j2 == i1 && j0 == i0 {
                return Some((b + 1, j1));
            } else if j2 == i0 && j0 == i2 {
                self.rotate(s, i2, i0, i1);
                return Some((b + 1, j1));
            } else if j2 == i2 && j0 == i1 {
                self.rotate(s, i1, i2, i0);
                return Some((b + 1, j1));
            } else if j0 == i1 && j1 == i0 {
                return Some((b + 2, j2));
            } else if j0 == i0 && j1 == i2 {
                self.rotate(s, i2, i0, i1);
                return Some((b + 2, j2));
            } else if j0 == i2 && j1 == i1 {
                self.rotate(s, i1, i2, i0);
                return Some((b + 2, j2));
            }
            backref += 3;
        }
        None
    }

    fn rotate(&mut self, s: usize, a: u16, b: u16, c: u16) {
        self.indices[s] = a;
        self.indices[s + 1] = b;
        self.indices[s + 2] = c;
    }

    fn parallelogram_predictor(&mut self, backref_code: u16, backref_vert: u16, s: usize) {
        self.codes.push(backref_code);
        let i2 = self.indices[s + 2];
        if self.mark(i2, 0) {
            let i0 = self.indices[s];
            let i1 = self.indices[s + 1];
            let num_vertices = self.num_vertices();
            let a0 = self.attrib_vertex(i0 as usize);
            let a1 = self.attrib_vertex(i1 as usize);
            let ab = self.attrib_vertex(backref_vert as usize);
            let orig = self.attrib_vertex(i2 as usize);

            let mut new_last = self.last_attrib;
            for ch in 0..5 {
                let predicted = a0[ch] as i32 + a1[ch] as i32 - ab[ch] as i32;
                let delta = orig[ch] as i32 - predicted;
                self.deltas[num_vertices * ch + i2 as usize] = zig_zag(delta as i16);
                new_last[ch] = orig[ch];
            }
            self.last_attrib = new_last;
        }
    }

    fn simple_predictor(&mut self, max_backref: usize, s: usize) {
        let i0 = self.indices[s];
        let i1 = self.indices[s + 1];
        let i2 = self.indices[s + 2];

        // `find_edge_match` can emit codes up to `max_backref + 2`; reserve
        // past that so an edge-match code and a simple new-vertex code
        // never collide at the same value.
        let i0_start_code = max_backref as u16 + 3;
        if self.mark(i0, i0_start_code) {
            let predictor = self.last_attrib;
            self.encode_delta_attrib(i0, &predictor);
        }
        if self.mark(i1, 0) {
            let predictor = self.attrib_vertex(i0 as usize);
            self.encode_delta_attrib(i1, &predictor);
        }
        if self.mark(i2, 0) {
            let a0 = self.attrib_vertex(i0 as usize);
            let a1 = self.attrib_vertex(i1 as usize);
            let mut average = [0u16; NUM_ATTRIBS];
            for ch in 0..NUM_ATTRIBS {
                average[ch] = ((a0[ch] as i32 + a1[ch] as i32) / 2) as u16;
            }
            self.encode_delta_attrib(i2, &average);
        }
    }

    fn encode_delta_attrib(&mut self, index: u16, predicted: &[u16; NUM_ATTRIBS]) {
        let num_vertices = self.num_vertices();
        let actual = self.attrib_vertex(index as usize);
        for ch in 0..5 {
            let delta = actual[ch] as i32 - predicted[ch] as i32;
            self.deltas[num_vertices * ch + index as usize] = zig_zag(delta as i16);
        }
        self.update_last_attrib(index);
    }

    fn update_last_attrib(&mut self, index: u16) {
        self.last_attrib = self.attrib_vertex(index as usize);
    }

    /// Pushes the high-water-mark code for `index` (offset by `start_code`,
    /// used to separate the simple predictor's codes from edge-match
    /// codes). Returns `true` if `index` is new, advancing the high-water
    /// mark; otherwise refreshes `last_attrib` and returns `false`.
    fn mark(&mut self, index: u16, start_code: u16) -> bool {
        let code = self.high_water.wrapping_sub(index).wrapping_add(start_code);
        self.codes.push(code);
        if index == self.high_water {
            self.high_water += 1;
            true
        } else {
            self.update_last_attrib(index);
            false
        }
    }
}

/// Writes `deltas` then `codes` to `sink`, substituting `0` for any value
/// the packer can't encode (§4.4.4).
pub fn write_utf8(deltas: &QuantizedAttribList, codes: &CodeList, sink: &mut impl ByteSink) {
    for &d in deltas {
        pack_u16_or_zero(d, sink);
    }
    for &c in codes {
        pack_u16_or_zero(c, sink);
    }
}
