//! Poincaré disk geometry on top of `num_complex`.

use num_complex::Complex64;

use hypergol_core::Point;

/// Disk automorphisms, geodesic reflections and distances.
pub trait DiskGeometry: Sized {
    /// Automorphism sending `a` to the origin: `(z - a) / (1 - ā·z)`.
    ///
    /// `mobius(z, -a)` is its inverse.
    fn mobius(self, a: Self) -> Self;

    /// Reflect across the geodesic through `a` and `b`.
    fn reflect_across(self, a: Self, b: Self) -> Self;

    /// Hyperbolic distance in the Poincaré disk.
    fn hyperbolic_distance(self, other: Self) -> f64;
}

impl DiskGeometry for Complex64 {
    fn mobius(self, a: Complex64) -> Complex64 {
        (self - a) / (Complex64::new(1.0, 0.0) - a.conj() * self)
    }

    // Move `a` to the origin, where the geodesic is a diameter, mirror
    // across that diameter and move back.
    fn reflect_across(self, a: Complex64, b: Complex64) -> Complex64 {
        let direction = b.mobius(a);
        let length = direction.norm();
        if length == 0.0 {
            return self;
        }
        let unit = direction.unscale(length);
        let mirrored = unit * unit * self.mobius(a).conj();
        mirrored.mobius(-a)
    }

    fn hyperbolic_distance(self, other: Complex64) -> f64 {
        let t = other.mobius(self).norm().min(1.0 - f64::EPSILON);
        2.0 * t.atanh()
    }
}

pub fn to_point(z: Complex64) -> Point {
    Point::new(z.re, z.im)
}

pub fn from_point(p: Point) -> Complex64 {
    Complex64::new(p.x, p.y)
}
