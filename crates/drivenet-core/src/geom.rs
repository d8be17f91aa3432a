/// Minimal 3D math for the sensor and motion code: points as `[f64; 3]`,
/// rotations as unit quaternions.

pub type Vec3 = [f64; 3];

/// Local forward axis of a vehicle (drives toward negative z).
pub const FORWARD: Vec3 = [0.0, 0.0, -1.0];
/// Local up axis; steering and the sensor fan rotate about this.
pub const UP: Vec3 = [0.0, 1.0, 0.0];

pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(v: Vec3, s: f64) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn length(v: Vec3) -> f64 {
    dot(v, v).sqrt()
}

/// Normalize `v`; zero-length vectors are returned unchanged.
pub fn normalize(v: Vec3) -> Vec3 {
    let len = length(v);
    if len == 0.0 {
        v
    } else {
        scale(v, 1.0 / len)
    }
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Unit quaternion. Constructors keep it normalized; `rotate` assumes it is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quat {
    pub const IDENTITY: Quat = Quat {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Quat {
        let axis = normalize(axis);
        let half = angle * 0.5;
        let s = half.sin();
        Quat {
            x: axis[0] * s,
            y: axis[1] * s,
            z: axis[2] * s,
            w: half.cos(),
        }
    }

    /// Hamilton product; `a.mul(b)` applies `b` first, then `a`.
    pub fn mul(self, rhs: Quat) -> Quat {
        Quat {
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        }
    }

    pub fn rotate(&self, v: Vec3) -> Vec3 {
        let qv = [self.x, self.y, self.z];
        let t = scale(cross(qv, v), 2.0);
        add(add(v, scale(t, self.w)), cross(qv, t))
    }
}

impl Default for Quat {
    fn default() -> Self {
        Quat::IDENTITY
    }
}

/// Directed probe; `dir` is unit length.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn point_at(&self, t: f64) -> Vec3 {
        add(self.origin, scale(self.dir, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_vec3_close(a: Vec3, b: Vec3) {
        for i in 0..3 {
            assert!((a[i] - b[i]).abs() < 1e-9, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn identity_rotation_is_noop() {
        assert_vec3_close(Quat::IDENTITY.rotate([1.0, 2.0, 3.0]), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn quarter_turn_about_up_maps_forward_to_left() {
        // +90 degrees about +y takes -z to -x.
        let q = Quat::from_axis_angle(UP, FRAC_PI_2);
        assert_vec3_close(q.rotate(FORWARD), [-1.0, 0.0, 0.0]);
    }

    #[test]
    fn composed_rotations_match_sequential_application() {
        let a = Quat::from_axis_angle(UP, 0.3);
        let b = Quat::from_axis_angle([1.0, 0.0, 0.0], 0.7);
        let v = [0.2, -1.0, 0.5];
        assert_vec3_close(a.mul(b).rotate(v), a.rotate(b.rotate(v)));
    }

    #[test]
    fn normalize_handles_zero_vector() {
        assert_eq!(normalize([0.0, 0.0, 0.0]), [0.0, 0.0, 0.0]);
        let n = normalize([3.0, 0.0, 4.0]);
        assert!((length(n) - 1.0).abs() < 1e-12);
    }
}
