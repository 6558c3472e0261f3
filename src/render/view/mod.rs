pub use bytemuck::{Pod, Zeroable};

/// A view in 3D space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct View {
    /// The horizontal field of view in radians.
    pub field_of_view_x: f64,
    /// The vertical field of view in radians.
    pub field_of_view_y: f64,
    /// Image height.
    pub image_height: u32,
    /// Image width.
    pub image_width: u32,
    /// View ID.
    pub view_id: u32,
    /// Position in world space.
    pub view_position: [f64; 3],
    /// Affine transformation from world space to view space.
    ///
    /// It is in **column-major order**, i.e., `M[col][row]`.
    pub view_transform: [[f64; 4]; 4],
}

/// A per-pixel view ray in world space.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Ray {
    pub origin: [f32; 3],
    /// Normalized direction.
    pub direction: [f32; 3],
}

impl View {
    /// Returns the world-space ray through the pixel `(x, y)`.
    pub fn pixel_ray(
        &self,
        x: u32,
        y: u32,
    ) -> Ray {
        // F_x <- I_x / tan(Fov_x / 2) / 2
        let focal_length_x = self.image_width as f64
            / (self.field_of_view_x / 2.0).tan()
            / 2.0;
        // F_y <- I_y / tan(Fov_y / 2) / 2
        let focal_length_y = self.image_height as f64
            / (self.field_of_view_y / 2.0).tan()
            / 2.0;

        // View space: +z forward, pixel centers at half offsets.
        let direction = [
            (x as f64 + 0.5 - self.image_width as f64 / 2.0) / focal_length_x,
            (y as f64 + 0.5 - self.image_height as f64 / 2.0) / focal_length_y,
            1.0,
        ];

        // World space: the rotation rows of the view transform are its
        // inverse columns.
        let mut world = [0.0f64; 3];
        for row in 0..3 {
            for axis in 0..3 {
                world[row] += self.view_transform[row][axis] * direction[axis];
            }
        }

        let norm =
            (world[0] * world[0] + world[1] * world[1] + world[2] * world[2])
                .sqrt();

        Ray {
            origin: self.view_position.map(|value| value as f32),
            direction: world.map(|value| (value / norm) as f32),
        }
    }

    /// Returns the rays of all pixels in row-major order.
    ///
    /// The shape is `[I_y, I_x]`.
    pub fn pixel_rays(&self) -> Vec<Ray> {
        let mut rays =
            Vec::with_capacity((self.image_height * self.image_width) as usize);
        for y in 0..self.image_height {
            for x in 0..self.image_width {
                rays.push(self.pixel_ray(x, y));
            }
        }
        rays
    }
}

impl Ray {
    /// Returns the point at the ray parameter `t`.
    #[inline]
    pub fn point_at(
        &self,
        t: f32,
    ) -> [f32; 3] {
        [
            self.origin[0] + t * self.direction[0],
            self.origin[1] + t * self.direction[1],
            self.origin[2] + t * self.direction[2],
        ]
    }

    /// Intersects the ray with the cube `center ± extent` by slab tests.
    ///
    /// Returns the entry and exit ray parameters, clamped to the forward
    /// half of the ray, or `None` on a miss.
    pub fn intersect_cube(
        &self,
        center: [f32; 3],
        extent: f32,
    ) -> Option<(f32, f32)> {
        let mut t_entry = 0.0f32;
        let mut t_exit = f32::INFINITY;

        for axis in 0..3 {
            let origin = self.origin[axis] - center[axis];
            let direction = self.direction[axis];

            if direction.abs() < f32::EPSILON {
                if origin.abs() > extent {
                    return None;
                }
                continue;
            }

            let inverse = direction.recip();
            let t_0 = (-extent - origin) * inverse;
            let t_1 = (extent - origin) * inverse;
            t_entry = t_entry.max(t_0.min(t_1));
            t_exit = t_exit.min(t_0.max(t_1));

            if t_entry > t_exit {
                return None;
            }
        }

        Some((t_entry, t_exit))
    }
}

impl Default for View {
    fn default() -> Self {
        Self {
            field_of_view_x: std::f64::consts::FRAC_PI_2,
            field_of_view_y: std::f64::consts::FRAC_PI_2,
            image_height: 64,
            image_width: 64,
            view_id: 0,
            view_position: [0.0; 3],
            view_transform: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn pixel_ray_identity_view() {
        use super::*;

        let view = View {
            image_height: 2,
            image_width: 2,
            ..Default::default()
        };

        // With a 2x2 image, the pixel centers straddle the optical axis
        // symmetrically.
        let ray_00 = view.pixel_ray(0, 0);
        let ray_11 = view.pixel_ray(1, 1);

        assert_eq!(ray_00.origin, [0.0; 3]);
        assert!(ray_00.direction[2] > 0.0);
        assert!((ray_00.direction[0] + ray_11.direction[0]).abs() < 1e-6);
        assert!((ray_00.direction[1] + ray_11.direction[1]).abs() < 1e-6);

        let norm = ray_00
            .direction
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn intersect_cube() {
        use super::*;

        let ray = Ray {
            origin: [0.0, 0.0, -4.0],
            direction: [0.0, 0.0, 1.0],
        };

        let (t_entry, t_exit) = ray.intersect_cube([0.0; 3], 1.0).unwrap();
        assert!((t_entry - 3.0).abs() < 1e-6);
        assert!((t_exit - 5.0).abs() < 1e-6);

        assert_eq!(ray.intersect_cube([4.0, 0.0, 0.0], 1.0), None);

        // An origin inside the cube clamps the entry to 0.
        let (t_entry, _) = Ray {
            origin: [0.0; 3],
            direction: [0.0, 0.0, 1.0],
        }
        .intersect_cube([0.0; 3], 1.0)
        .unwrap();
        assert_eq!(t_entry, 0.0);
    }
}
