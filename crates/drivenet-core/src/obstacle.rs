use crate::geom::{self, Ray, Vec3};
use rstar::{RTree, RTreeObject, AABB};

/// Axis-aligned box, `min[i] <= max[i]` on every axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        debug_assert!(
            (0..3).all(|i| min[i] <= max[i]),
            "degenerate box: min must not exceed max"
        );
        Self { min, max }
    }

    /// Slab test. Returns the entry distance along the ray, or the exit
    /// distance when the origin is inside the box. `None` on a miss.
    fn ray_distance(&self, ray: &Ray) -> Option<f64> {
        let mut t_near = f64::NEG_INFINITY;
        let mut t_far = f64::INFINITY;
        for axis in 0..3 {
            let o = ray.origin[axis];
            let d = ray.dir[axis];
            if d.abs() < 1e-12 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t1 = (self.min[axis] - o) * inv;
            let mut t2 = (self.max[axis] - o) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_near = t_near.max(t1);
            t_far = t_far.min(t2);
            if t_near > t_far {
                return None;
            }
        }
        if t_far < 0.0 {
            return None;
        }
        Some(t_near.max(0.0))
    }

    fn overlaps_sphere(&self, center: Vec3, radius: f64) -> bool {
        let mut dist_sq = 0.0;
        for axis in 0..3 {
            let c = center[axis].clamp(self.min[axis], self.max[axis]);
            let d = center[axis] - c;
            dist_sq += d * d;
        }
        dist_sq <= radius * radius
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Box(Aabb),
    Sphere { center: Vec3, radius: f64 },
}

impl Shape {
    /// Nearest non-negative intersection distance along `ray`, if any.
    pub fn ray_distance(&self, ray: &Ray) -> Option<f64> {
        match self {
            Shape::Box(aabb) => aabb.ray_distance(ray),
            Shape::Sphere { center, radius } => {
                let oc = geom::sub(ray.origin, *center);
                let b = geom::dot(oc, ray.dir);
                let c = geom::dot(oc, oc) - radius * radius;
                let disc = b * b - c;
                if disc < 0.0 {
                    return None;
                }
                let sqrt_disc = disc.sqrt();
                let mut t = -b - sqrt_disc;
                if t < 0.0 {
                    t = -b + sqrt_disc;
                }
                (t >= 0.0).then_some(t)
            }
        }
    }

    pub fn overlaps_sphere(&self, center: Vec3, radius: f64) -> bool {
        match self {
            Shape::Box(aabb) => aabb.overlaps_sphere(center, radius),
            Shape::Sphere {
                center: c,
                radius: r,
            } => {
                let d = geom::sub(*c, center);
                geom::dot(d, d) <= (r + radius) * (r + radius)
            }
        }
    }

    fn bounds(&self) -> Aabb {
        match self {
            Shape::Box(aabb) => *aabb,
            Shape::Sphere { center, radius } => Aabb {
                min: [
                    center[0] - radius,
                    center[1] - radius,
                    center[2] - radius,
                ],
                max: [
                    center[0] + radius,
                    center[1] + radius,
                    center[2] + radius,
                ],
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Obstacle {
    pub id: u32,
    pub shape: Shape,
}

impl Obstacle {
    pub fn new(id: u32, shape: Shape) -> Self {
        Self { id, shape }
    }
}

impl RTreeObject for Obstacle {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        let bounds = self.shape.bounds();
        AABB::from_corners(bounds.min, bounds.max)
    }
}

/// Ray-intersectable obstacle collection backed by an R*-tree (bulk-loaded,
/// O(n log n)). Membership changes between ticks are handled by rebuilding.
#[derive(Clone, Debug)]
pub struct ObstacleSet {
    tree: RTree<Obstacle>,
}

impl ObstacleSet {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self {
            tree: RTree::bulk_load(obstacles),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Obstacle> {
        self.tree.iter()
    }

    /// Obstacles whose envelope touches the segment `[origin, origin + dir * range]`.
    /// Candidate pruning only; the caller still does the exact intersection test.
    pub fn candidates_along(&self, ray: &Ray, range: f64) -> impl Iterator<Item = &Obstacle> {
        let end = ray.point_at(range);
        let lo = [
            ray.origin[0].min(end[0]),
            ray.origin[1].min(end[1]),
            ray.origin[2].min(end[2]),
        ];
        let hi = [
            ray.origin[0].max(end[0]),
            ray.origin[1].max(end[1]),
            ray.origin[2].max(end[2]),
        ];
        let envelope = AABB::from_corners(lo, hi);
        self.tree.locate_in_envelope_intersecting(&envelope)
    }

    /// First obstacle overlapping the given sphere, if any. Used for vehicle
    /// collision checks.
    pub fn overlapping_sphere(&self, center: Vec3, radius: f64) -> Option<u32> {
        let envelope = AABB::from_corners(
            [center[0] - radius, center[1] - radius, center[2] - radius],
            [center[0] + radius, center[1] + radius, center[2] + radius],
        );
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .find(|obstacle| obstacle.shape.overlaps_sphere(center, radius))
            .map(|obstacle| obstacle.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::FORWARD;

    fn box_at(id: u32, min: Vec3, max: Vec3) -> Obstacle {
        Obstacle::new(id, Shape::Box(Aabb::new(min, max)))
    }

    #[test]
    fn ray_hits_box_face_at_expected_distance() {
        let shape = Shape::Box(Aabb::new([-5.0, 0.0, -12.0], [5.0, 2.0, -10.0]));
        let ray = Ray {
            origin: [0.0, 1.0, 0.0],
            dir: FORWARD,
        };
        let d = shape.ray_distance(&ray).unwrap();
        assert!((d - 10.0).abs() < 1e-9);
    }

    #[test]
    fn ray_parallel_to_box_misses() {
        let shape = Shape::Box(Aabb::new([2.0, 0.0, -12.0], [5.0, 2.0, -10.0]));
        let ray = Ray {
            origin: [0.0, 1.0, 0.0],
            dir: FORWARD,
        };
        assert_eq!(shape.ray_distance(&ray), None);
    }

    #[test]
    fn ray_from_inside_box_reports_exit() {
        let shape = Shape::Box(Aabb::new([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        let ray = Ray {
            origin: [0.0, 0.0, 0.0],
            dir: FORWARD,
        };
        // Entry is behind the origin; distance clamps to zero (still a hit).
        assert_eq!(shape.ray_distance(&ray), Some(0.0));
    }

    #[test]
    fn ray_hits_sphere_near_side() {
        let shape = Shape::Sphere {
            center: [0.0, 0.0, -10.0],
            radius: 2.0,
        };
        let ray = Ray {
            origin: [0.0, 0.0, 0.0],
            dir: FORWARD,
        };
        let d = shape.ray_distance(&ray).unwrap();
        assert!((d - 8.0).abs() < 1e-9);
    }

    #[test]
    fn sphere_behind_ray_is_missed() {
        let shape = Shape::Sphere {
            center: [0.0, 0.0, 10.0],
            radius: 2.0,
        };
        let ray = Ray {
            origin: [0.0, 0.0, 0.0],
            dir: FORWARD,
        };
        assert_eq!(shape.ray_distance(&ray), None);
    }

    #[test]
    fn candidates_along_prunes_far_obstacles() {
        let set = ObstacleSet::new(vec![
            box_at(0, [-1.0, 0.0, -11.0], [1.0, 2.0, -10.0]),
            box_at(1, [100.0, 0.0, -11.0], [102.0, 2.0, -10.0]),
        ]);
        let ray = Ray {
            origin: [0.0, 1.0, 0.0],
            dir: FORWARD,
        };
        let ids: Vec<u32> = set.candidates_along(&ray, 50.0).map(|o| o.id).collect();
        assert_eq!(ids, vec![0]);
        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
        assert!(ObstacleSet::new(vec![]).is_empty());
    }

    #[test]
    fn overlapping_sphere_detects_contact() {
        let set = ObstacleSet::new(vec![box_at(7, [2.0, 0.0, -1.0], [4.0, 2.0, 1.0])]);
        assert_eq!(set.overlapping_sphere([1.5, 1.0, 0.0], 1.0), Some(7));
        assert_eq!(set.overlapping_sphere([0.0, 1.0, 0.0], 1.0), None);
    }
}
