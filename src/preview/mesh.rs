/// STL mesh previews
///
/// The mesh is framed to its bounding box with the same scale on all three
/// axes, seen from an elevated three-quarter camera, flat shaded into a
/// transparent canvas and finally cropped to the visible pixels.
use super::Processor;
use crate::error::{Error, Result};
use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Transform, Vector3};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use std::fs::File;
use std::path::Path;

pub const STL_EXTENSIONS: [&str; 1] = [".stl"];

/// Side of the square render canvas before cropping
const RENDER_SIZE: u32 = 480;
/// Empty border kept around the projection inside the canvas
const MARGIN: f32 = 8.0;
/// Camera elevation above the XY plane, in degrees
const ELEVATION: f32 = 30.0;
/// Camera azimuth around Z, in degrees
const AZIMUTH: f32 = -60.0;
/// Base face colour before shading
const FACE_COLOR: [f32; 3] = [31.0, 119.0, 180.0];
/// Light never drops a face below this fraction of its colour
const AMBIENT: f32 = 0.35;
/// Faces smaller than this (in square pixels) are edge-on and skipped
const MIN_AREA: f32 = 1e-3;

pub type Triangle = [Point3<f32>; 3];

#[derive(Debug, Default, Clone, Copy)]
pub struct MeshProcessor;

impl Processor for MeshProcessor {
    fn name(&self) -> &'static str {
        "mesh"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &STL_EXTENSIONS
    }

    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        let triangles = load_triangles(path)?;
        let canvas = render_triangles(&triangles)?;
        let cropped = crop_to_opaque(&canvas).ok_or(Error::EmptyRender)?;
        Ok(DynamicImage::ImageRgba8(cropped))
    }
}

/// Parse a binary or ASCII STL file into triangles
pub fn load_triangles(path: &Path) -> Result<Vec<Triangle>> {
    let mut file = File::open(path)?;
    let mesh = stl_io::read_stl(&mut file).map_err(|e| Error::Mesh(e.to_string()))?;
    if mesh.faces.is_empty() {
        return Err(Error::Mesh("mesh has no triangles".into()));
    }

    let vertex = |index: usize| -> Result<Point3<f32>> {
        let v = mesh
            .vertices
            .get(index)
            .ok_or_else(|| Error::Mesh(format!("vertex index {index} out of range")))?;
        let point = Point3::new(v[0], v[1], v[2]);
        if point.x.is_finite() && point.y.is_finite() && point.z.is_finite() {
            Ok(point)
        } else {
            Err(Error::Mesh("mesh has non-finite coordinates".into()))
        }
    };

    mesh.faces
        .iter()
        .map(|face| {
            Ok([
                vertex(face.vertices[0])?,
                vertex(face.vertices[1])?,
                vertex(face.vertices[2])?,
            ])
        })
        .collect()
}

/// Axis-aligned bounding box as (min, max)
pub fn bounding_box(triangles: &[Triangle]) -> Option<(Point3<f32>, Point3<f32>)> {
    let mut points = triangles.iter().flatten();
    let first = *points.next()?;
    Some(points.fold((first, first), |(min, max), p| {
        (
            Point3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z)),
            Point3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z)),
        )
    }))
}

/// Render the mesh into a `RENDER_SIZE` square RGBA canvas.
///
/// Pixels not covered by any face stay fully transparent.
pub fn render_triangles(triangles: &[Triangle]) -> Result<RgbaImage> {
    let (min, max) = bounding_box(triangles).ok_or_else(|| Error::Mesh("mesh has no triangles".into()))?;
    let extent = max - min;
    let scale = extent.x.max(extent.y).max(extent.z);
    if scale <= 0.0 {
        return Err(Error::Mesh("mesh bounding box is a single point".into()));
    }
    let center = min.midpoint(max);

    // One scale for every axis keeps the true proportions
    let view = camera() * Matrix4::from_scale(1.0 / scale) * Matrix4::from_translation(-center.to_vec());
    let light = Vector3::new(-0.4, 0.6, 0.7).normalize();

    let projected: Vec<([Point3<f32>; 3], f32)> = triangles
        .iter()
        .map(|triangle| {
            let corners = (*triangle).map(|p| view.transform_point(p));
            let normal = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
            let shade = if normal.magnitude2() > 0.0 {
                AMBIENT + (1.0 - AMBIENT) * normal.normalize().dot(light).abs()
            } else {
                AMBIENT
            };
            (corners, shade)
        })
        .collect();

    // Fit the projected outline into the canvas
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in projected.iter().flat_map(|(corners, _)| corners.iter()) {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    let span = (max_x - min_x).max(max_y - min_y);
    if span <= 0.0 {
        return Err(Error::EmptyRender);
    }
    let pixels_per_unit = (RENDER_SIZE as f32 - 2.0 * MARGIN) / span;

    let mut canvas = RgbaImage::new(RENDER_SIZE, RENDER_SIZE);
    let mut depth = vec![f32::INFINITY; (RENDER_SIZE * RENDER_SIZE) as usize];

    for (corners, shade) in &projected {
        // Screen space: x right, y down, z = distance from the camera
        let screen = (*corners).map(|p| {
            Point3::new(
                MARGIN + (p.x - min_x) * pixels_per_unit,
                MARGIN + (max_y - p.y) * pixels_per_unit,
                -p.z,
            )
        });
        let color = Rgba([
            (FACE_COLOR[0] * shade).round() as u8,
            (FACE_COLOR[1] * shade).round() as u8,
            (FACE_COLOR[2] * shade).round() as u8,
            255,
        ]);
        rasterize(&mut canvas, &mut depth, &screen, color);
    }

    Ok(canvas)
}

/// Orthographic camera looking at the origin from the configured angles
fn camera() -> Matrix4<f32> {
    let (elevation, azimuth) = (ELEVATION.to_radians(), AZIMUTH.to_radians());
    let eye = Point3::new(
        elevation.cos() * azimuth.cos(),
        elevation.cos() * azimuth.sin(),
        elevation.sin(),
    );
    Matrix4::look_at_rh(eye, Point3::origin(), Vector3::unit_z())
}

fn edge(a: Point3<f32>, b: Point3<f32>, x: f32, y: f32) -> f32 {
    (b.x - a.x) * (y - a.y) - (b.y - a.y) * (x - a.x)
}

/// Fill one screen-space triangle with a depth test, sampling pixel centres
fn rasterize(canvas: &mut RgbaImage, depth: &mut [f32], tri: &[Point3<f32>; 3], color: Rgba<u8>) {
    let area = edge(tri[0], tri[1], tri[2].x, tri[2].y);
    if area.abs() < MIN_AREA {
        return;
    }

    let (width, height) = canvas.dimensions();
    let left = tri.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let top = tri.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let right = (tri.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil() as u32).min(width);
    let bottom = (tri.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil() as u32).min(height);

    for y in top..bottom {
        for x in left..right {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(tri[1], tri[2], px, py) / area;
            let w1 = edge(tri[2], tri[0], px, py) / area;
            let w2 = edge(tri[0], tri[1], px, py) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let z = w0 * tri[0].z + w1 * tri[1].z + w2 * tri[2].z;
            let index = (y * width + x) as usize;
            if z < depth[index] {
                depth[index] = z;
                canvas.put_pixel(x, y, color);
            }
        }
    }
}

/// Crop to the tight bounding box of pixels with non-zero alpha.
///
/// Returns `None` when every pixel is transparent.
pub fn crop_to_opaque(image: &RgbaImage) -> Option<RgbaImage> {
    let (width, height) = image.dimensions();
    let (mut left, mut top) = (width, height);
    let (mut right, mut bottom) = (0, 0);
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] > 0 {
            found = true;
            left = left.min(x);
            right = right.max(x);
            top = top.min(y);
            bottom = bottom.max(y);
        }
    }

    if !found {
        return None;
    }
    Some(imageops::crop_imm(image, left, top, right + 1 - left, bottom + 1 - top).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn write_binary_stl(path: &Path, triangles: &[[[f32; 3]; 3]]) {
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
        for triangle in triangles {
            // Zero normal: readers recompute it
            bytes.extend_from_slice(&[0u8; 12]);
            for vertex in triangle {
                for coordinate in vertex {
                    bytes.extend_from_slice(&coordinate.to_le_bytes());
                }
            }
            bytes.extend_from_slice(&0u16.to_le_bytes());
        }
        fs::File::create(path).unwrap().write_all(&bytes).unwrap();
    }

    fn box_triangles(sx: f32, sy: f32, sz: f32) -> Vec<[[f32; 3]; 3]> {
        let v = |x: f32, y: f32, z: f32| [x * sx, y * sy, z * sz];
        let quads = [
            [v(0., 0., 0.), v(1., 0., 0.), v(1., 1., 0.), v(0., 1., 0.)],
            [v(0., 0., 1.), v(1., 0., 1.), v(1., 1., 1.), v(0., 1., 1.)],
            [v(0., 0., 0.), v(1., 0., 0.), v(1., 0., 1.), v(0., 0., 1.)],
            [v(0., 1., 0.), v(1., 1., 0.), v(1., 1., 1.), v(0., 1., 1.)],
            [v(0., 0., 0.), v(0., 1., 0.), v(0., 1., 1.), v(0., 0., 1.)],
            [v(1., 0., 0.), v(1., 1., 0.), v(1., 1., 1.), v(1., 0., 1.)],
        ];
        quads
            .iter()
            .flat_map(|[a, b, c, d]| [[*a, *b, *c], [*a, *c, *d]])
            .collect()
    }

    #[test]
    fn crop_finds_opaque_square() {
        let mut canvas = RgbaImage::new(100, 100);
        for y in 20..80 {
            for x in 10..90 {
                canvas.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }
        canvas.put_pixel(10, 20, Rgba([255, 0, 0, 255]));

        let cropped = crop_to_opaque(&canvas).unwrap();
        assert_eq!(cropped.dimensions(), (80, 60));
        assert_eq!(*cropped.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert!(cropped.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn crop_of_transparent_canvas_is_none() {
        assert!(crop_to_opaque(&RgbaImage::new(64, 64)).is_none());
    }

    #[test]
    fn crop_counts_faint_alpha() {
        let mut canvas = RgbaImage::new(10, 10);
        canvas.put_pixel(3, 7, Rgba([0, 0, 0, 1]));
        assert_eq!(crop_to_opaque(&canvas).unwrap().dimensions(), (1, 1));
    }

    #[test]
    fn bounding_box_covers_all_vertices() {
        let triangles = [[
            Point3::new(-1.0, 2.0, 0.5),
            Point3::new(3.0, -4.0, 0.0),
            Point3::new(0.0, 0.0, 9.0),
        ]];
        let (min, max) = bounding_box(&triangles).unwrap();
        assert_eq!(min, Point3::new(-1.0, -4.0, 0.0));
        assert_eq!(max, Point3::new(3.0, 2.0, 9.0));
    }

    #[test]
    fn cube_renders_a_cropped_opaque_preview() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.STL");
        write_binary_stl(&path, &box_triangles(10.0, 10.0, 10.0));

        let image = MeshProcessor.decode(&path).unwrap().to_rgba8();
        let (width, height) = image.dimensions();
        assert!(width > 0 && width <= RENDER_SIZE);
        assert!(height > 0 && height <= RENDER_SIZE);

        // Tight crop: every border row and column touches the mesh
        assert!((0..width).any(|x| image.get_pixel(x, 0)[3] > 0));
        assert!((0..width).any(|x| image.get_pixel(x, height - 1)[3] > 0));
        assert!((0..height).any(|y| image.get_pixel(0, y)[3] > 0));
        assert!((0..height).any(|y| image.get_pixel(width - 1, y)[3] > 0));
    }

    #[test]
    fn proportions_follow_the_bounding_box() {
        let dir = tempfile::tempdir().unwrap();
        let tall = dir.path().join("tall.stl");
        let flat = dir.path().join("flat.stl");
        write_binary_stl(&tall, &box_triangles(1.0, 1.0, 8.0));
        write_binary_stl(&flat, &box_triangles(8.0, 8.0, 1.0));

        let tall = MeshProcessor.decode(&tall).unwrap();
        let flat = MeshProcessor.decode(&flat).unwrap();
        assert!(tall.height() > tall.width());
        assert!(flat.width() > flat.height());
    }

    #[test]
    fn degenerate_meshes_fail() {
        let dir = tempfile::tempdir().unwrap();

        let empty = dir.path().join("empty.stl");
        write_binary_stl(&empty, &[]);
        assert!(MeshProcessor.decode(&empty).is_err());

        let point = dir.path().join("point.stl");
        write_binary_stl(&point, &[[[1.0, 1.0, 1.0]; 3]]);
        assert!(MeshProcessor.decode(&point).is_err());

        let garbage = dir.path().join("garbage.stl");
        fs::write(&garbage, b"solid nope\nthis is not a facet\n").unwrap();
        assert!(MeshProcessor.decode(&garbage).is_err());

        let zero = dir.path().join("zero.stl");
        fs::write(&zero, b"").unwrap();
        assert!(MeshProcessor.decode(&zero).is_err());
    }

    #[test]
    fn zero_area_render_is_a_failure() {
        // Three collinear points: a triangle with no area from any angle
        let triangles = [[
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(2.0, 2.0, 2.0),
        ]];
        let canvas = render_triangles(&triangles).unwrap();
        assert!(crop_to_opaque(&canvas).is_none());
    }
}
