//! Encodes a synthetic cube mesh and reports the resulting stream size,
//! standing in for the original `objcompress` command-line driver (which
//! read an OBJ/MTL pair; that parser is outside this crate's scope).

use tracing_subscriber::EnvFilter;
use webgl_mesh_codec::pipeline::{encode_mesh, DrawBatchInput, GroupStart};
use webgl_mesh_codec::{Bounds, Config};

fn cube_attribs() -> Vec<f32> {
    let mut attribs = Vec::new();
    for &x in &[0.0f32, 1.0] {
        for &y in &[0.0f32, 1.0] {
            for &z in &[0.0f32, 1.0] {
                let len = (x * x + y * y + z * z).sqrt().max(1e-6);
                attribs.extend_from_slice(&[x, y, z, x, y, x / len, y / len, z / len]);
            }
        }
    }
    attribs
}

fn cube_indices() -> Vec<u32> {
    // 12 triangles over the 8 corners, indexed the way `chunks_exact(3)`
    // expects: vertex order matches `cube_attribs`'s nested x/y/z loop.
    vec![
        0, 1, 3, 0, 3, 2, // -x face
        4, 6, 7, 4, 7, 5, // +x face
        0, 4, 5, 0, 5, 1, // -y face
        2, 3, 7, 2, 7, 6, // +y face
        0, 2, 6, 0, 6, 4, // -z face
        1, 5, 7, 1, 7, 3, // +z face
    ]
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let attribs = cube_attribs();
    let material = DrawBatchInput {
        attribs: attribs.clone(),
        indices: cube_indices(),
        group_starts: vec![GroupStart {
            offset: 0,
            name: "cube".to_string(),
            bounds: Bounds::from_attribs(&attribs).expect("cube has nonzero extent"),
        }],
    };

    let encoded = encode_mesh(&[material], Config::default()).expect("encode succeeds");

    println!("batches: {}", encoded.materials[0].batches.len());
    println!("stream bytes: {}", encoded.stream.len());
    println!(
        "groups: {:?}",
        encoded.materials[0]
            .group_bounds
            .iter()
            .map(|g| g.name.as_str())
            .collect::<Vec<_>>()
    );
}
