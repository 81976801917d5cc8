use glam::{Mat4, Vec3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

const MIN_RADIUS: f32 = 1.0;
const MAX_RADIUS: f32 = 5_000.0;

#[derive(Debug, Clone)]
pub struct Camera {
    // --- Orbital Parameters (Primary State) ---
    /// The world-space point the camera orbits around.
    pub target: Vec3,
    /// Distance from the camera to the target.
    pub radius: f32,
    /// Azimuth angle around the world Y axis (radians).
    pub azimuth_rad: f32,
    /// Elevation angle above the horizontal plane (radians).
    pub elevation_rad: f32,

    // --- Projection ---
    fovy_rad: f32,
    near: f32,
    far: f32,
    pub proj: Mat4,
}

impl Camera {
    /// Creates an orbital camera from an eye/target pair; the orbital
    /// parameters are derived from the offset between the two.
    pub fn new(eye: Vec3, target: Vec3, fovy_deg: f32, aspect: f32, near: f32, far: f32) -> Self {
        let offset = eye - target;
        let radius = offset.length().max(MIN_RADIUS);

        let fovy_rad = fovy_deg.to_radians();

        Self {
            target,
            radius,
            azimuth_rad: offset.x.atan2(offset.z),
            elevation_rad: (offset.y / radius).clamp(-1.0, 1.0).asin(),
            fovy_rad,
            near,
            far,
            proj: Mat4::perspective_rh(fovy_rad, aspect, near, far),
        }
    }

    /// Recomputes the projection matrix for a new surface aspect ratio.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.proj = Mat4::perspective_rh(self.fovy_rad, aspect.max(1e-3), self.near, self.far);
    }

    /// Camera position reconstructed from the orbital parameters.
    pub fn position(&self) -> Vec3 {
        let (sin_az, cos_az) = self.azimuth_rad.sin_cos();
        let (sin_el, cos_el) = self.elevation_rad.sin_cos();

        self.target
            + self.radius * Vec3::new(cos_el * sin_az, sin_el, cos_el * cos_az)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Combined view-projection matrix.
    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view()
    }
}

pub struct CameraController {
    mouse_down: bool,
    last_mouse: Option<(f64, f64)>,
}

impl CameraController {
    /// Creates a new controller with default state.
    pub fn new() -> Self {
        Self {
            mouse_down: false,
            last_mouse: None,
        }
    }

    /// Handles window events and updates the camera.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut Camera) {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.mouse_down = *state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor_orbit((position.x, position.y), camera);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };

                self.handle_scroll(scroll, camera);
            }
            _ => {}
        }
    }

    /// Adjusts the orbit radius based on scroll input.
    fn handle_scroll(&mut self, delta: f32, camera: &mut Camera) {
        // Positive delta = scroll up = zoom in = decrease radius.
        let zoom = 1.1_f32.powf(-delta);
        camera.radius = (camera.radius * zoom).clamp(MIN_RADIUS, MAX_RADIUS);
    }

    /// Rotates the camera around the target while the left button is held.
    fn handle_cursor_orbit(&mut self, xy: (f64, f64), camera: &mut Camera) {
        if let Some(last) = self.last_mouse {
            if self.mouse_down {
                let dx = ((xy.0 - last.0) * 0.005) as f32;
                let dy = ((last.1 - xy.1) * 0.005) as f32;

                camera.azimuth_rad -= dx;
                camera.elevation_rad -= dy;

                // Clamp elevation to prevent flipping over the poles.
                camera.elevation_rad = camera
                    .elevation_rad
                    .clamp((-89.0f32).to_radians(), 89.0f32.to_radians());
            }
        }
        self.last_mouse = Some(xy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbital_parameters_reconstruct_the_eye() {
        // The character flow's rig: eye (100, 200, 300) looking at (0, 100, 0).
        let camera = Camera::new(
            Vec3::new(100.0, 200.0, 300.0),
            Vec3::new(0.0, 100.0, 0.0),
            45.0,
            16.0 / 9.0,
            1.0,
            2000.0,
        );

        let eye = camera.position();
        assert!((eye - Vec3::new(100.0, 200.0, 300.0)).length() < 1e-2);
    }

    #[test]
    fn resize_recomputes_projection() {
        let mut camera = Camera::new(
            Vec3::new(0.0, 0.0, 70.0),
            Vec3::ZERO,
            45.0,
            1.0,
            0.1,
            2000.0,
        );

        camera.set_aspect(2.0);
        let expect = Mat4::perspective_rh(45.0f32.to_radians(), 2.0, 0.1, 2000.0);
        assert!(camera
            .proj
            .to_cols_array()
            .iter()
            .zip(expect.to_cols_array())
            .all(|(a, b)| (a - b).abs() < 1e-6));
    }

    #[test]
    fn zoom_clamps_the_radius() {
        let mut camera = Camera::new(
            Vec3::new(0.0, 0.0, 70.0),
            Vec3::ZERO,
            45.0,
            1.0,
            0.1,
            2000.0,
        );
        let mut controller = CameraController::new();

        for _ in 0..500 {
            controller.handle_scroll(10.0, &mut camera);
        }
        assert!(camera.radius >= MIN_RADIUS);

        for _ in 0..500 {
            controller.handle_scroll(-10.0, &mut camera);
        }
        assert!(camera.radius <= MAX_RADIUS);
    }
}
