//! Triangle rasterizer for the software backend.
//!
//! Edge functions are evaluated at pixel centers. Triangles are drawn
//! two-sided; any triangle with a vertex at or behind the eye (`w <= 0`) is
//! skipped rather than clipped. Fragments outside the `[0, 1]` depth range
//! are discarded and the depth test is `LessEqual`, the same state the GPU
//! scene pipeline uses. Texture coordinates are interpolated
//! perspective-correct.

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};

use super::DepthPlane;
use crate::pixels::PixelBuffer;
use crate::scene::{DrawItem, Lighting, RenderRequest, Shading, TextureMap};

struct ScreenVertex {
    pos: Vec2,
    depth: f32,
    inv_w: f32,
    uv_over_w: Vec2,
}

#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Flat-shaded color of one triangle.
fn shade(item: &DrawItem, lighting: &Lighting, world: &[Vec3; 3]) -> Vec4 {
    match item.shading {
        Shading::Unlit => item.color,
        Shading::Lambert => {
            let normal = (world[1] - world[0])
                .cross(world[2] - world[0])
                .normalize_or_zero();
            let diffuse = normal.dot(-lighting.direction).abs();
            let lit = lighting.ambient + lighting.color * diffuse;
            (item.color.xyz() * lit).extend(item.color.w)
        }
    }
}

/// Draws every item of `request` into `color`, testing and writing `depth`
/// when present.
pub(super) fn draw_request(
    request: &RenderRequest,
    color: &mut PixelBuffer,
    mut depth: Option<&mut DepthPlane>,
) {
    let size = Vec2::new(color.width() as f32, color.height() as f32);
    let view_projection = request.camera.view_projection;

    for item in &request.items {
        let positions = item.mesh.positions();
        let uvs = item.mesh.uvs();
        for tri in item.mesh.triangle_indices() {
            let world = tri.map(|i| item.transform.transform_point3(positions[i]));
            let clip = world.map(|p| view_projection * p.extend(1.0));
            if clip.iter().any(|c| c.w <= 0.0) {
                continue;
            }
            let mut verts = clip.map(|c| {
                let ndc = c.xyz() / c.w;
                ScreenVertex {
                    pos: Vec2::new((ndc.x * 0.5 + 0.5) * size.x, (0.5 - ndc.y * 0.5) * size.y),
                    depth: ndc.z,
                    inv_w: 1.0 / c.w,
                    uv_over_w: Vec2::ZERO,
                }
            });
            for (vert, &i) in verts.iter_mut().zip(&tri) {
                vert.uv_over_w = uvs[i] * vert.inv_w;
            }
            let base = shade(item, &request.lighting, &world);
            fill_triangle(&verts, base, item.map.as_ref(), color, depth.as_deref_mut());
        }
    }
}

fn fill_triangle(
    verts: &[ScreenVertex; 3],
    base: Vec4,
    map: Option<&TextureMap>,
    color: &mut PixelBuffer,
    mut depth: Option<&mut DepthPlane>,
) {
    let [a, b, c] = verts;
    let area = edge(a.pos, b.pos, c.pos);
    if area.abs() <= f32::EPSILON {
        return;
    }

    let min = a.pos.min(b.pos).min(c.pos).floor().max(Vec2::ZERO);
    let max = a.pos.max(b.pos).max(c.pos).ceil();
    let x_end = (max.x as u32).min(color.width());
    let y_end = (max.y as u32).min(color.height());

    for y in (min.y as u32)..y_end {
        for x in (min.x as u32)..x_end {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b.pos, c.pos, p) / area;
            let w1 = edge(c.pos, a.pos, p) / area;
            let w2 = edge(a.pos, b.pos, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let z = w0 * a.depth + w1 * b.depth + w2 * c.depth;
            if !(0.0..=1.0).contains(&z) {
                continue;
            }
            if let Some(plane) = depth.as_deref_mut() {
                if z > plane.get(x, y) {
                    continue;
                }
                plane.set(x, y, z);
            }
            let fragment = match map {
                Some(map) => {
                    let inv_w = w0 * a.inv_w + w1 * b.inv_w + w2 * c.inv_w;
                    let uv = (a.uv_over_w * w0 + b.uv_over_w * w1 + c.uv_over_w * w2) / inv_w;
                    base * map.sample(uv)
                }
                None => base,
            };
            color.set(x, y, fragment);
        }
    }
}
