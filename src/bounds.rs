//! Per-channel bounds and the affine quantization derived from them.
//!
//! Grounded in `webgl-loader/bounds.h` (`Bounds`, `BoundsParams::FromBounds`)
//! and the `Quantize` helper in `webgl-loader/base.h`.

use crate::error::{Error, Result};
use crate::mesh::{AttribList, NUM_ATTRIBS};

const MAX_POSITION: i32 = (1 << 14) - 1; // 16383
const MAX_TEXCOORD: i32 = (1 << 10) - 1; // 1023
const MAX_NORMAL: i32 = (1 << 10) - 1; // 1023

/// Running per-channel min/max over an [`AttribList`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub mins: [f32; NUM_ATTRIBS],
    pub maxes: [f32; NUM_ATTRIBS],
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new()
    }
}

impl Bounds {
    pub fn new() -> Self {
        Bounds {
            mins: [f32::MAX; NUM_ATTRIBS],
            maxes: [f32::MIN; NUM_ATTRIBS],
        }
    }

    pub fn enclose_attrib(&mut self, attrib: &[f32]) {
        debug_assert_eq!(attrib.len(), NUM_ATTRIBS);
        for i in 0..NUM_ATTRIBS {
            if self.mins[i] > attrib[i] {
                self.mins[i] = attrib[i];
            }
            if self.maxes[i] < attrib[i] {
                self.maxes[i] = attrib[i];
            }
        }
    }

    /// Scans `attribs` (interleaved, 8 floats per vertex) and returns the
    /// enclosing bounds. Returns [`Error::MalformedInput`] if the length
    /// isn't a multiple of 8 or any float is non-finite.
    pub fn from_attribs(attribs: &AttribList) -> Result<Self> {
        if attribs.len() % NUM_ATTRIBS != 0 {
            return Err(Error::malformed_dynamic(format!(
                "attribute list length ({}) must be a multiple of {}",
                attribs.len(),
                NUM_ATTRIBS
            )));
        }
        let mut bounds = Bounds::new();
        for vertex in attribs.chunks_exact(NUM_ATTRIBS) {
            if vertex.iter().any(|f| !f.is_finite()) {
                return Err(Error::malformed("non-finite attribute value"));
            }
            bounds.enclose_attrib(vertex);
        }
        Ok(bounds)
    }

    /// Widens `self` to also enclose `other`, for combining per-material
    /// bounds into a mesh-wide `Bounds` (§4.6 step 1).
    pub fn merge(&mut self, other: &Bounds) {
        for i in 0..NUM_ATTRIBS {
            if other.mins[i] < self.mins[i] {
                self.mins[i] = other.mins[i];
            }
            if other.maxes[i] > self.maxes[i] {
                self.maxes[i] = other.maxes[i];
            }
        }
    }

    /// The largest extent among the three position channels, used as the
    /// single uniform scale for quantizing position.
    pub fn uniform_scale(&self) -> f32 {
        let x = self.maxes[0] - self.mins[0];
        let y = self.maxes[1] - self.mins[1];
        let z = self.maxes[2] - self.mins[2];
        x.max(y).max(z)
    }
}

/// Per-channel decode/encode parameters derived from [`Bounds`].
///
/// Texcoord channels are locked to `min=0, scale=1` (bounds-dependent
/// texcoords are a known, deliberately-disabled limitation — see §3 of the
/// spec) and normal channels are locked to the fixed `[-1, 1]` range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsParams {
    pub mins: [f32; NUM_ATTRIBS],
    pub scales: [f32; NUM_ATTRIBS],
    pub output_maxes: [i32; NUM_ATTRIBS],
    pub decode_offsets: [i32; NUM_ATTRIBS],
    pub decode_scales: [f32; NUM_ATTRIBS],
}

impl BoundsParams {
    pub fn from_bounds(bounds: &Bounds) -> Result<Self> {
        let scale = bounds.uniform_scale();
        if scale <= 0.0 || !scale.is_finite() {
            return Err(Error::malformed(
                "mesh has zero extent on every position axis; quantization is undefined",
            ));
        }

        let mut mins = [0f32; NUM_ATTRIBS];
        let mut scales = [0f32; NUM_ATTRIBS];
        let mut output_maxes = [0i32; NUM_ATTRIBS];
        let mut decode_offsets = [0i32; NUM_ATTRIBS];
        let mut decode_scales = [0f32; NUM_ATTRIBS];

        // Position: uniform scale across all three axes.
        for i in 0..3 {
            mins[i] = bounds.mins[i];
            scales[i] = scale;
            output_maxes[i] = MAX_POSITION;
            decode_offsets[i] = (MAX_POSITION as f32 * bounds.mins[i] / scale) as i32;
            decode_scales[i] = scale / MAX_POSITION as f32;
        }
        // Texcoord: locked range, bounds-dependent texcoords disabled.
        for i in 3..5 {
            mins[i] = 0.0;
            scales[i] = 1.0;
            output_maxes[i] = MAX_TEXCOORD;
            decode_offsets[i] = 0;
            decode_scales[i] = 1.0 / MAX_TEXCOORD as f32;
        }
        // Normal: always uniform [-1, 1] range.
        for i in 5..8 {
            mins[i] = -1.0;
            scales[i] = 2.0;
            output_maxes[i] = MAX_NORMAL;
            decode_offsets[i] = 1 - (1 << 9);
            decode_scales[i] = 1.0 / 511.0;
        }

        Ok(BoundsParams {
            mins,
            scales,
            output_maxes,
            decode_offsets,
            decode_scales,
        })
    }

    pub fn decode_offsets(&self) -> [i32; NUM_ATTRIBS] {
        self.decode_offsets
    }

    pub fn decode_scales(&self) -> [f32; NUM_ATTRIBS] {
        self.decode_scales
    }
}

/// Quantizes one scalar: `floor(out_max * (f - min) / scale)`, truncated
/// toward zero into an unsigned 16-bit integer. No clamping or range
/// validation is performed; callers must ensure `f` lies in `[min, min +
/// scale]` (see §4.1 of the spec — the quantizer trusts its caller).
#[inline]
pub fn quantize(f: f32, min: f32, scale: f32, out_max: i32) -> u16 {
    if scale == 0.0 {
        return 0;
    }
    (out_max as f32 * ((f - min) / scale)) as u16
}

/// Quantizes an entire interleaved attribute vector against `params`,
/// producing a parallel [`crate::mesh::QuantizedAttribList`].
pub fn attribs_to_quantized(
    attribs: &AttribList,
    params: &BoundsParams,
) -> Result<crate::mesh::QuantizedAttribList> {
    if attribs.len() % NUM_ATTRIBS != 0 {
        return Err(Error::malformed_dynamic(format!(
            "attribute list length ({}) must be a multiple of {}",
            attribs.len(),
            NUM_ATTRIBS
        )));
    }
    let mut out = Vec::with_capacity(attribs.len());
    for vertex in attribs.chunks_exact(NUM_ATTRIBS) {
        for (j, &f) in vertex.iter().enumerate() {
            out.push(quantize(
                f,
                params.mins[j],
                params.scales[j],
                params.output_maxes[j],
            ));
        }
    }
    Ok(out)
}

/// Quantizes one named sub-group's AABB against the mesh-wide position
/// `BoundsParams`, producing the six codes (`min[3]`, `extent[3]`) the
/// pipeline packs into the shared UTF-8 stream. Grounded in
/// `CompressAABBToUtf8`.
pub fn group_bounds_code(group: &Bounds, total: &BoundsParams) -> [u16; 6] {
    let mut mins = [0u16; 3];
    let mut maxes = [0u16; 3];
    for i in 0..3 {
        mins[i] = quantize(group.mins[i], total.mins[i], total.scales[i], MAX_POSITION);
        maxes[i] = quantize(group.maxes[i], total.mins[i], total.scales[i], MAX_POSITION);
    }
    [
        mins[0],
        mins[1],
        mins[2],
        maxes[0] - mins[0],
        maxes[1] - mins[1],
        maxes[2] - mins[2],
    ]
}
