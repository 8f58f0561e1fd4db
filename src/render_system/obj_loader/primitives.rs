use nalgebra_glm::TVec3;

use super::{unit_or_up, Material, Mesh};

/// Axis-aligned cube of side 1 centred on the origin: 8 shared corners, 12 triangles.
pub fn unit_cube() -> Mesh {
    let positions: Vec<[f32; 3]> = vec![
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
    ];

    // Shared corners get the averaged direction of their three faces.
    let normals = positions.iter().map(|p| unit_or_up(&TVec3::from(*p))).collect();

    let texcoords = vec![
        [0.0, 0.0],
        [1.0, 0.0],
        [1.0, 1.0],
        [0.0, 1.0],
        [1.0, 0.0],
        [0.0, 0.0],
        [0.0, 1.0],
        [1.0, 1.0],
    ];

    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2,  2, 3, 0, // front
        1, 5, 6,  6, 2, 1, // right
        5, 4, 7,  7, 6, 5, // back
        4, 0, 3,  3, 7, 4, // left
        3, 2, 6,  6, 7, 3, // top
        4, 5, 1,  1, 0, 4, // bottom
    ];

    Mesh {
        name: "unit_cube".to_string(),
        positions,
        normals,
        texcoords,
        indices,
        material: Material::default(),
    }
}

/// Square in the XZ plane at height `y`, facing +Y.
pub fn plane(half_extent: f32, y: f32) -> Mesh {
    let e = half_extent;
    Mesh {
        name: "plane".to_string(),
        positions: vec![[-e, y, e], [e, y, e], [e, y, -e], [-e, y, -e]],
        normals: vec![[0.0, 1.0, 0.0]; 4],
        texcoords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        indices: vec![0, 1, 2, 2, 3, 0],
        material: Material::coloured([0.6, 0.6, 0.6]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_eight_vertices_and_twelve_triangles() {
        let cube = unit_cube();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.index_count(), 36);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertex_count()));
    }

    #[test]
    fn cube_faces_wind_outwards() {
        let cube = unit_cube();
        for tri in cube.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| TVec3::from(cube.positions[i as usize]));
            let normal = (b - a).cross(&(c - a));
            let centre = (a + b + c) / 3.0;
            let outward = normal.dot(&centre);
            assert!(outward > 0.0, "triangle {tri:?} faces inwards");
        }
    }

    #[test]
    fn cube_corner_normals_are_unit_diagonals() {
        let cube = unit_cube();
        for (p, n) in cube.positions.iter().zip(&cube.normals) {
            let n = TVec3::from(*n);
            assert!((n.norm() - 1.0).abs() < 1e-6);
            assert!(n.dot(&TVec3::from(*p)) > 0.0);
        }
    }

    #[test]
    fn plane_faces_up() {
        let floor = plane(5.0, -0.5);
        assert!(floor.normals.iter().all(|n| *n == [0.0, 1.0, 0.0]));
        assert!(floor.positions.iter().all(|p| p[1] == -0.5));
    }
}
