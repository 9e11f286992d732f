use super::*;
use crate::scene::Transform;
use glam::Vec3;

#[test]
fn test_vertex_layout_matches_struct() {
    let layout = Vertex::layout();
    assert_eq!(layout.stride, 32);
    let offsets: Vec<u32> = layout.attributes.iter().map(|a| a.offset).collect();
    assert_eq!(offsets, vec![0, 12, 24]);
    let locations: Vec<u32> = layout.attributes.iter().map(|a| a.location).collect();
    assert_eq!(locations, vec![0, 1, 2]);
}

#[test]
fn test_frame_data_is_three_matrices() {
    assert_eq!(std::mem::size_of::<FrameData>(), 192);

    let frame = FrameData {
        projection: Mat4::IDENTITY,
        view: Mat4::IDENTITY,
        model: Transform::from_position(Vec3::new(1.0, 2.0, 3.0)).matrix(),
    };
    let bytes: &[u8] = bytemuck::bytes_of(&frame);
    // Translation lives in the last column of the model matrix
    let translation: &[f32] = bytemuck::cast_slice(&bytes[128 + 48..128 + 60]);
    assert_eq!(translation, &[1.0, 2.0, 3.0]);
}

#[test]
fn test_transform_matrix_order() {
    let transform = Transform {
        position: Vec3::new(0.0, 1.0, 0.0),
        rotation: glam::Quat::IDENTITY,
        scale: Vec3::splat(2.0),
    };
    let point = transform.matrix().transform_point3(Vec3::X);
    assert_eq!(point, Vec3::new(2.0, 1.0, 0.0));
}
