//! Integration tests driving the full mesh-codec pipeline end to end.

use webgl_mesh_codec::bounds::{attribs_to_quantized, Bounds, BoundsParams};
use webgl_mesh_codec::compress::EdgeCachingCompressor;
use webgl_mesh_codec::config::Config;
use webgl_mesh_codec::optimize::VertexOptimizer;
use webgl_mesh_codec::pipeline::{encode_mesh, DrawBatchInput, GroupStart};
use webgl_mesh_codec::WebGLMeshList;

fn flat_shaded_quad() -> Vec<f32> {
    vec![
        0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
        1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, //
        0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, //
        1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, //
    ]
}

#[test]
fn full_pipeline_round_trips_a_single_material_quad() {
    let material = DrawBatchInput {
        attribs: flat_shaded_quad(),
        indices: vec![0, 1, 2, 1, 3, 2],
        group_starts: vec![GroupStart {
            offset: 0,
            name: "quad".to_string(),
            bounds: Bounds::from_attribs(&flat_shaded_quad()).unwrap(),
        }],
    };

    let encoded = encode_mesh(&[material], Config::default()).expect("encode succeeds");

    assert_eq!(encoded.materials.len(), 1);
    let material_result = &encoded.materials[0];
    assert_eq!(material_result.batches.len(), 1);
    assert_eq!(material_result.group_bounds.len(), 1);

    let batch = &material_result.batches[0];
    assert_eq!(batch.attrib_range.vertex_count, 4);
    assert_eq!(batch.code_range.triangle_count, 2);
    assert!(batch.code_range.start_byte >= batch.attrib_range.start_byte);
    assert!(!encoded.stream.is_empty());
}

#[test]
fn batch_boundary_splits_a_60000_vertex_fan_without_overflowing_the_index_ceiling() {
    // A triangle fan of 60000 vertices sharing a common apex — more than
    // the 0xD800 (55296) output-index ceiling — forcing the optimizer to
    // split the batch at least once.
    let num_vertices = 60_000usize;
    let mut attribs = Vec::with_capacity(num_vertices * 8);
    for i in 0..num_vertices {
        let t = i as f32;
        attribs.extend_from_slice(&[t, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }
    let mut indices = Vec::new();
    for i in 1..num_vertices as u32 - 1 {
        indices.extend_from_slice(&[0, i, i + 1]);
    }

    let bounds = Bounds::from_attribs(&attribs).unwrap();
    let params = BoundsParams::from_bounds(&bounds).unwrap();
    let quantized = attribs_to_quantized(&attribs, &params).unwrap();

    let mut optimizer = VertexOptimizer::new(&quantized);
    let mut meshes: WebGLMeshList = Vec::new();
    optimizer.add_triangles(&indices, &mut meshes).unwrap();

    assert!(meshes.len() > 1, "expected the fan to split into multiple batches");
    let mut total_triangles = 0;
    for mesh in &meshes {
        assert!(mesh.indices.iter().all(|&idx| (idx as u32) < 0xD800));
        total_triangles += mesh.triangle_count();
    }
    assert_eq!(total_triangles, indices.len() / 3);
}

#[test]
fn compressor_round_trip_reconstructs_a_lone_triangles_indices() {
    // A single, edge-isolated triangle: every code is a plain
    // new-vertex high-water-mark code. The very first code (the
    // triangle's `i0`) carries the simple predictor's reservation offset
    // (`max_backref + 3`, which is 3 for the first triangle in a batch)
    // that keeps its code space clear of edge-match codes; `i1`/`i2`
    // carry no offset. Edge-match codes need the decoder's own rotation
    // bookkeeping and are covered by `compress.rs`'s own unit tests
    // instead.
    let attribs = vec![
        0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
        1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, //
        0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, //
    ];
    let bounds = Bounds::from_attribs(&attribs).unwrap();
    let params = BoundsParams::from_bounds(&bounds).unwrap();
    let quantized = attribs_to_quantized(&attribs, &params).unwrap();

    let mut optimizer = VertexOptimizer::new(&quantized);
    let mut meshes: WebGLMeshList = Vec::new();
    optimizer.add_triangles(&vec![0, 1, 2], &mut meshes).unwrap();
    assert_eq!(meshes.len(), 1);
    let mesh = &meshes[0];

    let compressor = EdgeCachingCompressor::with_config(mesh, Config::default());
    let (deltas, codes) = compressor.compress();

    assert_eq!(deltas.len(), 8 * mesh.vertex_count());
    assert_eq!(codes.len(), 3 * mesh.triangle_count());

    let i0_start_code = 3u16; // max_backref (0) + 3, for the first triangle in a batch
    let mut high_water = 0u16;
    let mut decoded_indices = Vec::new();
    for (i, &code) in codes.iter().enumerate() {
        let start_code = if i == 0 { i0_start_code } else { 0 };
        let index = high_water.wrapping_sub(code).wrapping_add(start_code);
        decoded_indices.push(index);
        if index == high_water {
            high_water += 1;
        }
    }
    assert_eq!(decoded_indices, mesh.indices);
}
