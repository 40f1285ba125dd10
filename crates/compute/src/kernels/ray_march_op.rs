use glam::{Vec3, Vec4};

use super::CpuTexture;
use crate::layout::WORKGROUP_SIZE;
use crate::RayMarchParams;

/// Read-only inputs of one ray-march dispatch.
pub struct RayMarchInputs<'a> {
    pub params: &'a RayMarchParams,
    pub volume: &'a CpuTexture,
    pub skybox: &'a CpuTexture,
    pub surface: &'a CpuTexture,
}

/// Runs every invocation of the `workgroups` grid, writing into `output`.
/// Invocations that fall outside the target are skipped, as in the shader.
pub fn handle_ray_march(inputs: &RayMarchInputs<'_>, output: &mut CpuTexture, workgroups: [u32; 3]) {
    let width = output.desc.size.width;
    let height = output.desc.size.height;

    for gy in 0..workgroups[1] {
        for gx in 0..workgroups[0] {
            for ly in 0..WORKGROUP_SIZE[1] {
                for lx in 0..WORKGROUP_SIZE[0] {
                    let px = gx * WORKGROUP_SIZE[0] + lx;
                    let py = gy * WORKGROUP_SIZE[1] + ly;
                    if px >= width || py >= height {
                        continue;
                    }
                    output.store(px, py, trace_pixel(inputs, px, py));
                }
            }
        }
    }
}

/// Colour of pixel `(px, py)`; row 0 is the top of the image.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trace_pixel(inputs: &RayMarchInputs<'_>, px: u32, py: u32) -> [f32; 4] {
    let params = inputs.params;
    let [width, height] = params.output_size;
    let ndc_x = ((px as f32 + 0.5) / width.max(1) as f32) * 2.0 - 1.0;
    let ndc_y = 1.0 - ((py as f32 + 0.5) / height.max(1) as f32) * 2.0;

    let camera_to_world = params.camera_to_world();
    let origin = camera_to_world.transform_point3(Vec3::ZERO);
    let view = params.inverse_projection() * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
    let view_dir = if view.w.abs() > f32::EPSILON { view.truncate() / view.w } else { view.truncate() };
    let dir = camera_to_world.transform_vector3(view_dir).normalize_or_zero();

    march(inputs, origin, dir)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn march(inputs: &RayMarchInputs<'_>, origin: Vec3, dir: Vec3) -> [f32; 4] {
    let params = inputs.params;
    let side = Vec3::splat(params.volume_side as f32);
    let mut pos = origin;

    for _ in 0..params.max_steps {
        let cell = pos.floor();
        if cell.cmpge(Vec3::ZERO).all() && cell.cmplt(side).all() {
            let density = inputs.volume.load(cell.x as u32, cell.y as u32, cell.z as u32)[0];
            if density > params.threshold {
                let local = pos - cell;
                let [r, g, b, _] = inputs.surface.load_uv(local.x, local.y);
                return [r, g, b, 1.0];
            }
        }
        pos += dir * params.step_size;
    }

    sky(inputs.skybox, dir)
}

/// Equirectangular lookup with +z as the zenith.
fn sky(skybox: &CpuTexture, dir: Vec3) -> [f32; 4] {
    let u = 0.5 + dir.y.atan2(dir.x) / std::f32::consts::TAU;
    let v = dir.z.clamp(-1.0, 1.0).acos() / std::f32::consts::PI;
    let [r, g, b, _] = skybox.load_uv(u, v);
    [r, g, b, 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TextureDesc, TextureFormat, TextureUsage};
    use glam::Mat4;

    fn solid(label: &str, rgba: [f32; 4]) -> CpuTexture {
        let desc = TextureDesc::image_2d(label, 1, 1, TextureFormat::Rgba32Float, TextureUsage::Sampled);
        CpuTexture::new(&desc, Some(&rgba)).unwrap()
    }

    fn floor_volume(side: u32) -> CpuTexture {
        let desc = TextureDesc::volume("floor", side);
        let mut texels = vec![0.0; (side * side * side) as usize];
        texels[..(side * side) as usize].fill(0.5);
        CpuTexture::new(&desc, Some(&texels)).unwrap()
    }

    // Camera above the floor looking straight down -z.
    fn looking_down(max_steps: u32) -> RayMarchParams {
        let eye = Vec3::new(4.0, 4.0, 6.0);
        let view = Mat4::look_at_rh(eye, Vec3::new(4.0, 4.0, 0.0), Vec3::Y);
        let proj = Mat4::perspective_rh(0.5, 1.0, 0.1, 100.0);
        RayMarchParams {
            camera_to_world: view.inverse().to_cols_array_2d(),
            inverse_projection: proj.inverse().to_cols_array_2d(),
            max_steps,
            step_size: 0.25,
            threshold: 0.0,
            volume_side: 8,
            output_size: [4, 4],
            _pad: [0, 0],
        }
    }

    #[test]
    fn enough_steps_hit_the_floor() {
        let params = looking_down(64);
        let volume = floor_volume(8);
        let sky_tex = solid("sky", [0.0, 0.0, 1.0, 1.0]);
        let surface = solid("surface", [1.0, 0.0, 0.0, 1.0]);
        let inputs = RayMarchInputs { params: &params, volume: &volume, skybox: &sky_tex, surface: &surface };
        assert_eq!(trace_pixel(&inputs, 1, 1), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn starved_budget_falls_through_to_sky() {
        let params = looking_down(4);
        let volume = floor_volume(8);
        let sky_tex = solid("sky", [0.0, 0.0, 1.0, 1.0]);
        let surface = solid("surface", [1.0, 0.0, 0.0, 1.0]);
        let inputs = RayMarchInputs { params: &params, volume: &volume, skybox: &sky_tex, surface: &surface };
        assert_eq!(trace_pixel(&inputs, 1, 1), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn single_group_covers_small_target() {
        let params = looking_down(0);
        let volume = floor_volume(8);
        let sky_tex = solid("sky", [0.0, 1.0, 0.0, 1.0]);
        let surface = solid("surface", [1.0, 0.0, 0.0, 1.0]);
        let inputs = RayMarchInputs { params: &params, volume: &volume, skybox: &sky_tex, surface: &surface };

        let desc = TextureDesc::image_2d("out", 4, 4, TextureFormat::Rgba32Float, TextureUsage::Storage);
        let mut out = CpuTexture::new(&desc, None).unwrap();
        handle_ray_march(&inputs, &mut out, [1, 1, 1]);
        assert!(out.data.chunks(4).all(|t| t == [0.0, 1.0, 0.0, 1.0]));
    }
}
