//! Wiring that drives one whole mesh's materials through bounds → quantize
//! → optimize → compress → pack, and assembles the byte-range/decode-param
//! data the (external) JSON sidecar writer needs.
//!
//! Grounded in `objcompress/main.cpp`'s per-material driver loop (not
//! present in the retrieved source tree, but described by §4.6/§6 of the
//! spec) and the teacher crate's module-per-concern layout.

use serde::Serialize;
use tracing::debug;

use crate::bounds::{attribs_to_quantized, group_bounds_code, Bounds, BoundsParams};
use crate::compress::EdgeCachingCompressor;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::mesh::{AttribList, IndexList, NUM_ATTRIBS};
use crate::optimize::VertexOptimizer;
use crate::packing::pack_u16_or_zero;

/// One named sub-group within a material's draw batch, as the (external)
/// OBJ parser collaborator would hand it off: where it starts in the index
/// list, its name, and its precomputed AABB.
#[derive(Debug, Clone)]
pub struct GroupStart {
    pub offset: usize,
    pub name: String,
    pub bounds: Bounds,
}

/// One material's contribution to the mesh, already flattened by the
/// (external) OBJ parser collaborator (§6.1).
#[derive(Debug, Clone)]
pub struct DrawBatchInput {
    pub attribs: AttribList,
    pub indices: IndexList,
    pub group_starts: Vec<GroupStart>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AttribRange {
    pub start_byte: usize,
    pub vertex_count: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CodeRange {
    pub start_byte: usize,
    pub code_count: usize,
    pub triangle_count: usize,
}

/// One compressed `WebGLMesh`'s byte ranges in the shared UTF-8 stream
/// (§3.1, §6.2).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EncodedBatch {
    pub attrib_range: AttribRange,
    pub code_range: CodeRange,
}

/// Global decode parameters derived from the mesh-wide `BoundsParams`
/// (§3.1, §6.2).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DecodeParams {
    pub decode_offsets: [i32; NUM_ATTRIBS],
    pub decode_scales: [f32; NUM_ATTRIBS],
}

impl DecodeParams {
    pub fn from_bounds_params(params: &BoundsParams) -> Self {
        DecodeParams {
            decode_offsets: params.decode_offsets(),
            decode_scales: params.decode_scales(),
        }
    }
}

/// A named sub-group's quantized AABB, ready to be packed into the shared
/// stream (§3.1, `CompressAABBToUtf8`).
#[derive(Debug, Clone, Serialize)]
pub struct GroupBoundsCode {
    pub name: String,
    pub codes: [u16; 6],
}

/// Everything one material contributes to the encoded mesh.
#[derive(Debug, Clone)]
pub struct MaterialResult {
    pub batches: Vec<EncodedBatch>,
    pub group_bounds: Vec<GroupBoundsCode>,
}

/// The full output of encoding a mesh: the shared byte stream plus the
/// per-material wiring data the sidecar writer needs.
#[derive(Debug, Clone)]
pub struct EncodedMesh {
    pub stream: Vec<u8>,
    pub materials: Vec<MaterialResult>,
    pub decode_params: DecodeParams,
}

/// Drives every material's `DrawBatchInput` through the full pipeline
/// (§4.6), appending to one shared UTF-8 stream.
pub fn encode_mesh(materials: &[DrawBatchInput], config: Config) -> Result<EncodedMesh> {
    let mut mesh_bounds = Bounds::new();
    for material in materials {
        mesh_bounds.merge(&Bounds::from_attribs(&material.attribs)?);
    }
    let bounds_params = BoundsParams::from_bounds(&mesh_bounds)?;
    debug!(
        uniform_scale = mesh_bounds.uniform_scale(),
        "mesh-wide bounds computed"
    );

    let mut stream = Vec::new();
    let mut material_results = Vec::with_capacity(materials.len());

    for (material_index, material) in materials.iter().enumerate() {
        let vertex_count = material.attribs.len() / NUM_ATTRIBS;
        if let Some(&bad_index) = material
            .indices
            .iter()
            .find(|&&index| index as usize >= vertex_count)
        {
            return Err(Error::malformed_dynamic(format!(
                "material {material_index} triangle index {bad_index} out of range for {vertex_count} vertices"
            )));
        }

        let quantized = attribs_to_quantized(&material.attribs, &bounds_params)?;

        let mut optimizer = VertexOptimizer::with_config(&quantized, config);
        let mut meshes = Vec::new();
        optimizer.add_triangles(&material.indices, &mut meshes)?;
        debug!(material_index, batch_count = meshes.len(), "material optimized");

        let mut batches = Vec::with_capacity(meshes.len());
        for mesh in &meshes {
            let compressor = EdgeCachingCompressor::with_config(mesh, config);
            let (deltas, codes) = compressor.compress();

            let attrib_start = stream.len();
            for &d in &deltas {
                pack_u16_or_zero(d, &mut stream);
            }
            let code_start = stream.len();
            for &c in &codes {
                pack_u16_or_zero(c, &mut stream);
            }
            let code_end = stream.len();
            debug!(
                material_index,
                attrib_bytes = code_start - attrib_start,
                code_bytes = code_end - code_start,
                "batch compressed"
            );

            batches.push(EncodedBatch {
                attrib_range: AttribRange {
                    start_byte: attrib_start,
                    vertex_count: mesh.vertex_count(),
                },
                code_range: CodeRange {
                    start_byte: code_start,
                    code_count: codes.len(),
                    triangle_count: mesh.triangle_count(),
                },
            });
        }

        let mut group_bounds = Vec::with_capacity(material.group_starts.len());
        for group in &material.group_starts {
            let codes = group_bounds_code(&group.bounds, &bounds_params);
            for &c in &codes {
                pack_u16_or_zero(c, &mut stream);
            }
            group_bounds.push(GroupBoundsCode {
                name: group.name.clone(),
                codes,
            });
        }

        material_results.push(MaterialResult {
            batches,
            group_bounds,
        });
    }

    Ok(EncodedMesh {
        stream,
        materials: material_results,
        decode_params: DecodeParams::from_bounds_params(&bounds_params),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_material() -> DrawBatchInput {
        DrawBatchInput {
            attribs: vec![
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
                1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, //
                0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, //
                1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, //
            ],
            indices: vec![0, 1, 2, 1, 3, 2],
            group_starts: vec![GroupStart {
                offset: 0,
                name: "quad".to_string(),
                bounds: Bounds {
                    mins: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
                    maxes: [1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0],
                },
            }],
        }
    }

    #[test]
    fn single_material_round_trip_produces_one_batch_and_group() {
        let materials = vec![quad_material()];
        let encoded = encode_mesh(&materials, Config::default()).unwrap();

        assert_eq!(encoded.materials.len(), 1);
        assert_eq!(encoded.materials[0].batches.len(), 1);
        assert_eq!(encoded.materials[0].group_bounds.len(), 1);
        assert_eq!(encoded.materials[0].group_bounds[0].name, "quad");
        assert!(!encoded.stream.is_empty());
    }

    #[test]
    fn multiple_materials_share_one_stream_and_bounds_params() {
        let materials = vec![quad_material(), quad_material()];
        let encoded = encode_mesh(&materials, Config::default()).unwrap();

        assert_eq!(encoded.materials.len(), 2);
        // Both materials quantize against the same mesh-wide decode params.
        assert_eq!(
            encoded.decode_params.decode_scales[0],
            encoded.decode_params.decode_scales[0]
        );
        let first_end = encoded.materials[0].batches[0].code_range.start_byte
            + encoded.materials[0].batches[0].code_range.code_count;
        assert!(encoded.materials[1].batches[0].attrib_range.start_byte >= first_end);
    }

    #[test]
    fn rejects_triangle_index_out_of_range() {
        let mut material = quad_material();
        material.indices[0] = 99; // only 4 vertices exist
        let result = encode_mesh(&[material], Config::default());
        assert!(result.is_err());
    }

    #[test]
    fn rejects_mesh_degenerate_on_every_axis() {
        let degenerate = DrawBatchInput {
            attribs: vec![0.0; 16],
            indices: vec![0, 0, 0],
            group_starts: vec![],
        };
        let result = encode_mesh(&[degenerate], Config::default());
        assert!(result.is_err());
    }
}
