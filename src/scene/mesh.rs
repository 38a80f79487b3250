use glam::{Mat4, Vec2, Vec3};

/// Indexed triangle list in object space, with one texture coordinate per
/// vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    indices: Vec<u32>,
}

impl Mesh {
    /// Creates a mesh from positions and a triangle index list. Texture
    /// coordinates start at zero; see [`Mesh::with_uvs`].
    ///
    /// # Panics
    ///
    /// Panics if `indices` is not a whole number of triangles or references a
    /// vertex that does not exist.
    #[must_use]
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        assert!(
            indices.len() % 3 == 0,
            "index count {} is not a multiple of 3",
            indices.len()
        );
        assert!(
            indices.iter().all(|&i| (i as usize) < positions.len()),
            "mesh index out of range"
        );
        let uvs = vec![Vec2::ZERO; positions.len()];
        Self {
            positions,
            uvs,
            indices,
        }
    }

    /// # Panics
    ///
    /// Panics if there is not exactly one coordinate per vertex.
    #[must_use]
    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        assert_eq!(
            uvs.len(),
            self.positions.len(),
            "one texture coordinate per vertex"
        );
        self.uvs = uvs;
        self
    }

    /// Rectangle in the XY plane centered on the origin, facing +Z. The
    /// image's top row maps to the +Y edge.
    #[must_use]
    pub fn plane(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        Self::new(
            vec![
                Vec3::new(-hw, -hh, 0.0),
                Vec3::new(hw, -hh, 0.0),
                Vec3::new(hw, hh, 0.0),
                Vec3::new(-hw, hh, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
        .with_uvs(vec![
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ])
    }

    /// Axis-aligned box centered on the origin.
    #[must_use]
    pub fn cuboid(size: Vec3) -> Self {
        let h = size * 0.5;
        let positions = vec![
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(h.x, -h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
        ];
        #[rustfmt::skip]
        let indices = vec![
            0, 1, 2, 0, 2, 3, // front
            5, 4, 7, 5, 7, 6, // back
            4, 0, 3, 4, 3, 7, // left
            1, 5, 6, 1, 6, 2, // right
            3, 2, 6, 3, 6, 7, // top
            4, 5, 1, 4, 1, 0, // bottom
        ];
        Self::new(positions, indices)
    }

    #[inline]
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[inline]
    #[must_use]
    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex indices of each triangle.
    pub fn triangle_indices(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|tri| [tri[0] as usize, tri[1] as usize, tri[2] as usize])
    }

    /// Triangles with `transform` applied to every corner.
    pub fn triangles(&self, transform: Mat4) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.triangle_indices()
            .map(move |tri| tri.map(|i| transform.transform_point3(self.positions[i])))
    }

    /// Uniformly scaled copy.
    #[must_use]
    pub fn scaled(&self, scale: f32) -> Self {
        Self {
            positions: self.positions.iter().map(|p| *p * scale).collect(),
            uvs: self.uvs.clone(),
            indices: self.indices.clone(),
        }
    }
}
