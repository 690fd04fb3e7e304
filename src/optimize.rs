//! Forsyth-style linear-speed vertex cache optimizer.
//!
//! Grounded in `webgl-loader/optimize.hpp` (`VertexOptimizer`, `VertexData`,
//! `find_best_triangle`, `insert_index_to_cache`); that header has no
//! surviving `.cpp` body in the retrieved source, so the scoring formulas and
//! control flow below follow the spec's §4.3 description directly. Global
//! best-triangle selection is implemented with a lazily-invalidated max-heap
//! rather than the header's informal "candidate cache, fall back to full
//! scan" description — both are permitted by the spec as long as ties break
//! by earliest input order, and the heap is simpler to get right.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::mesh::{IndexList, QuantizedAttribList, WebGLMesh, WebGLMeshList, NUM_ATTRIBS};

const LAST_TRI_SCORE: f32 = 0.75;
const CACHE_SCORE_SCALER: f32 = 1.0;

fn cache_score(cache_tag: Option<u8>, cache_size: u8) -> f32 {
    match cache_tag {
        None => 0.0,
        Some(pos) if pos < 2 => LAST_TRI_SCORE,
        Some(pos) => {
            let cache_size = cache_size as f32;
            (((cache_size - pos as f32) / (cache_size - 3.0)).powf(1.5)) * CACHE_SCORE_SCALER
        }
    }
}

fn valence_boost(remaining_faces: usize) -> f32 {
    if remaining_faces == 0 {
        0.0
    } else {
        2.0 * (remaining_faces as f32).powf(-0.5)
    }
}

#[derive(Debug, Default, Clone)]
struct VertexData {
    faces: Vec<u32>,
    cache_tag: Option<u8>,
    score: f32,
    output_index: Option<u32>,
}

/// Entry in the best-triangle heap: `score` is the triangle's score at the
/// time this entry was pushed, used to detect staleness at pop time.
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    score: f32,
    triangle: u32,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.triangle == other.triangle
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; break ties so the *smaller* triangle
        // index (earlier in input order) compares greater and surfaces first.
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.triangle.cmp(&self.triangle))
    }
}

/// Reorders triangles within one draw batch for GPU post-transform vertex
/// cache locality, splitting the result whenever the output index space
/// would overflow [`Config::max_output_index`].
pub struct VertexOptimizer<'a> {
    attribs: &'a QuantizedAttribList,
    config: Config,
    per_vertex: Vec<VertexData>,
    cache: Vec<u32>,
    next_unused_index: u32,
}

impl<'a> VertexOptimizer<'a> {
    pub fn new(attribs: &'a QuantizedAttribList) -> Self {
        Self::with_config(attribs, Config::default())
    }

    pub fn with_config(attribs: &'a QuantizedAttribList, config: Config) -> Self {
        let num_vertices = attribs.len() / NUM_ATTRIBS;
        VertexOptimizer {
            attribs,
            config,
            per_vertex: vec![VertexData::default(); num_vertices],
            cache: Vec::with_capacity(config.cache_size as usize + 1),
            next_unused_index: 0,
        }
    }

    /// Consumes one material's triangle list (`indices.len() % 3 == 0`,
    /// values `< attribs.len() / 8`) and appends the resulting batches to
    /// `meshes`. Each call starts a fresh batch boundary; the vertex cache
    /// state carries over across calls so callers may optimize an entire
    /// mesh's materials back to back.
    ///
    /// Returns [`Error::IndexOverflow`] if an emitted index would reach the
    /// batch ceiling despite the close-batch check (an internal invariant
    /// violation, not a condition callers should expect to hit).
    pub fn add_triangles(&mut self, indices: &IndexList, meshes: &mut WebGLMeshList) -> Result<()> {
        debug_assert_eq!(indices.len() % 3, 0);
        let triangles: Vec<[u32; 3]> = indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();
        if triangles.is_empty() {
            return Ok(());
        }

        let mut active = vec![true; triangles.len()];
        let mut remaining = triangles.len();

        for (ti, tri) in triangles.iter().enumerate() {
            for &v in tri {
                self.per_vertex[v as usize].faces.push(ti as u32);
            }
        }
        for v in self.per_vertex.iter_mut() {
            v.score = valence_boost(v.faces.len());
        }

        let mut heap: BinaryHeap<HeapEntry> = triangles
            .iter()
            .enumerate()
            .map(|(ti, tri)| HeapEntry {
                score: self.triangle_score(*tri),
                triangle: ti as u32,
            })
            .collect();

        let mut current = WebGLMesh::default();

        while remaining > 0 {
            let best = self
                .pop_best(&mut heap, &triangles, &active)
                .expect("active triangles remain but heap is empty");
            let tri = triangles[best];

            self.maybe_close_batch(&tri, meshes, &mut current);
            self.emit_triangle(&tri, &mut current)?;

            active[best] = false;
            remaining -= 1;
            for &v in &tri {
                self.per_vertex[v as usize]
                    .faces
                    .retain(|&f| f != best as u32);
            }

            let evicted = self.touch_cache(tri);
            // Prepending `tri`'s vertices shifts the cache position (and
            // thus the Forsyth cache score) of every vertex still in the
            // cache, not just the triangle's own vertices or whatever got
            // evicted — so every currently cached vertex needs its score
            // recomputed, in addition to the evicted ones (whose score
            // drops to the uncached baseline).
            let mut touched: Vec<u32> = tri.to_vec();
            touched.extend(evicted);
            touched.extend(self.cache.iter().copied());
            touched.sort_unstable();
            touched.dedup();

            for &v in &touched {
                let vd = &self.per_vertex[v as usize];
                self.per_vertex[v as usize].score =
                    cache_score(vd.cache_tag, self.config.cache_size) + valence_boost(vd.faces.len());
            }
            for &v in &touched {
                for &f in &self.per_vertex[v as usize].faces {
                    if active[f as usize] {
                        heap.push(HeapEntry {
                            score: self.triangle_score(triangles[f as usize]),
                            triangle: f,
                        });
                    }
                }
            }
        }

        if !current.indices.is_empty() {
            meshes.push(current);
        }
        Ok(())
    }

    fn triangle_score(&self, tri: [u32; 3]) -> f32 {
        tri.iter().map(|&v| self.per_vertex[v as usize].score).sum()
    }

    /// Pops heap entries until finding one that is both active and still
    /// matches the triangle's live score; stale entries left over from
    /// earlier pushes are discarded along the way.
    fn pop_best(
        &self,
        heap: &mut BinaryHeap<HeapEntry>,
        triangles: &[[u32; 3]],
        active: &[bool],
    ) -> Option<usize> {
        while let Some(top) = heap.pop() {
            let tri = top.triangle as usize;
            if !active[tri] {
                continue;
            }
            if self.triangle_score(triangles[tri]) == top.score {
                return Some(tri);
            }
            // Stale: a fresher entry for this triangle exists elsewhere in
            // the heap, pushed the last time one of its vertices changed.
        }
        None
    }

    /// Prepends `tri`'s vertices to the cache (most-recent first), evicting
    /// anything beyond `cache_size` slots. Returns the evicted vertex ids.
    fn touch_cache(&mut self, tri: [u32; 3]) -> Vec<u32> {
        for &v in tri.iter().rev() {
            // Look up `v`'s current position by value rather than trusting
            // its stored `cache_tag`: earlier iterations of this same loop
            // already shifted everything after position 0, so a tag read
            // before this loop started no longer points at `v`.
            self.cache.retain(|&x| x != v);
            self.cache.insert(0, v);
        }
        let mut evicted = Vec::new();
        while self.cache.len() > self.config.cache_size as usize {
            let v = self.cache.pop().unwrap();
            self.per_vertex[v as usize].cache_tag = None;
            evicted.push(v);
        }
        for (pos, &v) in self.cache.iter().enumerate() {
            self.per_vertex[v as usize].cache_tag = Some(pos as u8);
        }
        evicted
    }

    /// Closes the current batch if emitting `tri`'s not-yet-seen vertices
    /// would push `next_unused_index` past `max_output_index`.
    fn maybe_close_batch(&mut self, tri: &[u32; 3], meshes: &mut WebGLMeshList, current: &mut WebGLMesh) {
        let mut new_vertices: Vec<u32> = tri
            .iter()
            .copied()
            .filter(|&v| self.per_vertex[v as usize].output_index.is_none())
            .collect();
        new_vertices.sort_unstable();
        new_vertices.dedup();

        if self.next_unused_index + new_vertices.len() as u32 <= self.config.max_output_index {
            return;
        }

        if !current.indices.is_empty() {
            meshes.push(std::mem::take(current));
        }
        for vd in self.per_vertex.iter_mut() {
            vd.output_index = None;
        }
        self.next_unused_index = 0;
    }

    fn emit_triangle(&mut self, tri: &[u32; 3], current: &mut WebGLMesh) -> Result<()> {
        for &v in tri {
            let output_index = match self.per_vertex[v as usize].output_index {
                Some(idx) => idx,
                None => {
                    let idx = self.next_unused_index;
                    debug_assert!(idx < self.config.max_output_index);
                    // `maybe_close_batch` should have already closed the
                    // batch before this index could be reached; this is a
                    // defense-in-depth check for release builds, where the
                    // assertion above compiles out.
                    if idx >= self.config.max_output_index {
                        return Err(Error::IndexOverflow { index: idx });
                    }
                    self.per_vertex[v as usize].output_index = Some(idx);
                    self.next_unused_index += 1;
                    let base = v as usize * NUM_ATTRIBS;
                    current
                        .attribs
                        .extend_from_slice(&self.attribs[base..base + NUM_ATTRIBS]);
                    idx
                }
            };
            current.indices.push(output_index as u16);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_attribs() -> QuantizedAttribList {
        (0..4).flat_map(|i| vec![i as u16; NUM_ATTRIBS]).collect()
    }

    #[test]
    fn single_triangle_round_trips_indices() {
        let attribs = quad_attribs();
        let mut opt = VertexOptimizer::new(&attribs);
        let mut meshes = WebGLMeshList::new();
        opt.add_triangles(&vec![0, 1, 2], &mut meshes).unwrap();

        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].triangle_count(), 1);
        assert_eq!(meshes[0].vertex_count(), 3);
        let max_index = *meshes[0].indices.iter().max().unwrap();
        assert!((max_index as u32) < 0xD800);
    }

    #[test]
    fn shared_edge_keeps_all_vertices_in_one_batch() {
        let attribs = quad_attribs();
        let mut opt = VertexOptimizer::new(&attribs);
        let mut meshes = WebGLMeshList::new();
        opt.add_triangles(&vec![0, 1, 2, 0, 2, 3], &mut meshes).unwrap();

        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].vertex_count(), 4);
        assert_eq!(meshes[0].triangle_count(), 2);
    }

    #[test]
    fn every_index_stays_below_batch_ceiling() {
        // A config with a tiny ceiling forces multiple batches from few
        // triangles, exercising the close/reset path without allocating a
        // 55000-vertex fan for the test.
        let num_vertices = 12;
        let attribs: QuantizedAttribList = (0..num_vertices)
            .flat_map(|i| vec![i as u16; NUM_ATTRIBS])
            .collect();
        let config = Config {
            cache_size: 32,
            max_output_index: 4,
            max_backref: 96,
        };
        let mut indices = IndexList::new();
        for base in 0..(num_vertices as u32 - 2) {
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }

        let mut opt = VertexOptimizer::with_config(&attribs, config);
        let mut meshes = WebGLMeshList::new();
        opt.add_triangles(&indices, &mut meshes).unwrap();

        assert!(meshes.len() > 1);
        for mesh in &meshes {
            assert!(mesh.indices.iter().all(|&idx| (idx as u32) < 4));
        }
        let total_triangles: usize = meshes.iter().map(WebGLMesh::triangle_count).sum();
        assert_eq!(total_triangles, indices.len() / 3);
    }

    #[test]
    fn disconnected_components_are_both_fully_emitted() {
        let attribs = quad_attribs();
        let mut opt = VertexOptimizer::new(&attribs);
        let mut meshes = WebGLMeshList::new();
        // Two triangles sharing no vertices.
        opt.add_triangles(&vec![0, 1, 2, 1, 2, 3], &mut meshes).unwrap();

        let total_triangles: usize = meshes.iter().map(WebGLMesh::triangle_count).sum();
        assert_eq!(total_triangles, 2);
    }
}
