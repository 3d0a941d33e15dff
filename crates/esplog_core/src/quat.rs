use core::ops::Mul;
use fixed::types::I2F30;

/// Fractional bits of every quaternion and rotation-vector component.
pub const FRAC_BITS: u32 = 30;

const ONE: I2F30 = I2F30::from_bits(1 << FRAC_BITS);

/// Rotation vector (axis scaled by angle, radians) in Q2.30.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RotationVector {
    pub x: I2F30,
    pub y: I2F30,
    pub z: I2F30,
}

impl RotationVector {
    pub const ZERO: RotationVector = RotationVector {
        x: I2F30::ZERO,
        y: I2F30::ZERO,
        z: I2F30::ZERO,
    };

    pub fn new(x: I2F30, y: I2F30, z: I2F30) -> Self {
        Self { x, y, z }
    }

    /// Saturates components outside ±2 rad; NaN becomes zero.
    pub fn from_f64(x: f64, y: f64, z: f64) -> Self {
        let component = |v: f64| {
            if v.is_nan() {
                I2F30::ZERO
            } else {
                I2F30::saturating_from_num(v)
            }
        };
        Self {
            x: component(x),
            y: component(y),
            z: component(z),
        }
    }

    pub fn to_array(self) -> [I2F30; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(c: [I2F30; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }

    fn norm_squared(self) -> I2F30 {
        self.x
            .saturating_mul(self.x)
            .saturating_add(self.y.saturating_mul(self.y))
            .saturating_add(self.z.saturating_mul(self.z))
    }
}

/// Unit quaternion with Q2.30 components, `w` first.
///
/// All operations are integer-only and saturate instead of wrapping, so the
/// same inputs give bit-identical results on every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedQuat {
    pub w: I2F30,
    pub x: I2F30,
    pub y: I2F30,
    pub z: I2F30,
}

impl Default for FixedQuat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl FixedQuat {
    pub const IDENTITY: FixedQuat = FixedQuat {
        w: ONE,
        x: I2F30::ZERO,
        y: I2F30::ZERO,
        z: I2F30::ZERO,
    };

    pub fn new(w: I2F30, x: I2F30, y: I2F30, z: I2F30) -> Self {
        Self { w, x, y, z }
    }

    /// Builds a quaternion from floating-point components, normalizing first.
    /// A zero (or non-finite) input yields the identity.
    pub fn from_f64(w: f64, x: f64, y: f64, z: f64) -> Self {
        let norm = libm::sqrt(w * w + x * x + y * y + z * z);
        if !(norm.is_finite() && norm > 0.0) {
            return Self::IDENTITY;
        }
        Self {
            w: I2F30::saturating_from_num(w / norm),
            x: I2F30::saturating_from_num(x / norm),
            y: I2F30::saturating_from_num(y / norm),
            z: I2F30::saturating_from_num(z / norm),
        }
    }

    pub fn to_f64(self) -> [f64; 4] {
        [
            self.w.to_num::<f64>(),
            self.x.to_num::<f64>(),
            self.y.to_num::<f64>(),
            self.z.to_num::<f64>(),
        ]
    }

    /// Inverse rotation of a unit quaternion.
    pub fn conjugate(self) -> Self {
        Self {
            w: self.w,
            x: self.x.saturating_neg(),
            y: self.y.saturating_neg(),
            z: self.z.saturating_neg(),
        }
    }

    /// Picks the representative with `w >= 0` (`q` and `-q` are the same
    /// rotation).
    pub fn canonical(self) -> Self {
        if self.w.is_negative() {
            Self {
                w: self.w.saturating_neg(),
                x: self.x.saturating_neg(),
                y: self.y.saturating_neg(),
                z: self.z.saturating_neg(),
            }
        } else {
            self
        }
    }

    pub fn norm_squared(self) -> I2F30 {
        self.w
            .saturating_mul(self.w)
            .saturating_add(self.x.saturating_mul(self.x))
            .saturating_add(self.y.saturating_mul(self.y))
            .saturating_add(self.z.saturating_mul(self.z))
    }

    /// One Newton step towards unit length: `q * (3 - |q|^2) / 2`.
    ///
    /// Only meaningful for quaternions already close to unit length, which is
    /// all that products and exponentials of unit quaternions produce.
    pub fn normalized(self) -> Self {
        let factor = ONE.saturating_add(ONE.saturating_sub(self.norm_squared()) >> 1);
        Self {
            w: self.w.saturating_mul(factor),
            x: self.x.saturating_mul(factor),
            y: self.y.saturating_mul(factor),
            z: self.z.saturating_mul(factor),
        }
    }

    /// Exponential map: the rotation by `|v|` radians about `v`.
    ///
    /// Uses the Taylor series of `cos(θ/2)` and `sin(θ/2)/θ` up to the fourth
    /// power, which is exact to Q30 precision for the per-sample deltas the
    /// predictor handles.
    pub fn from_rotation_vector(v: RotationVector) -> Self {
        let half = RotationVector::new(v.x >> 1u32, v.y >> 1u32, v.z >> 1u32);
        let h2 = half.norm_squared();
        let h4 = h2.saturating_mul(h2);

        let w = ONE.saturating_sub(h2 >> 1u32).saturating_add(h4 / 24);
        let s = ONE.saturating_sub(h2 / 6).saturating_add(h4 / 120);

        Self {
            w,
            x: half.x.saturating_mul(s),
            y: half.y.saturating_mul(s),
            z: half.z.saturating_mul(s),
        }
        .normalized()
    }

    /// Small-angle logarithm: the rotation vector of this quaternion.
    ///
    /// `2 * asin(|v|) * v / |v|` approximated as `2 v (1 + |v|^2 / 6)`;
    /// components saturate at ±2 rad.
    pub fn to_rotation_vector(self) -> RotationVector {
        let q = self.canonical();
        let v = RotationVector::new(q.x, q.y, q.z);
        let gain = ONE.saturating_add(v.norm_squared() / 6);
        RotationVector::new(
            q.x.saturating_mul(gain).saturating_mul_int(2),
            q.y.saturating_mul(gain).saturating_mul_int(2),
            q.z.saturating_mul(gain).saturating_mul_int(2),
        )
    }

    /// Rotation taking `self` to `other`, i.e. `self⁻¹ · other`, canonical
    /// and renormalized.
    pub fn delta_to(self, other: FixedQuat) -> Self {
        (self.conjugate() * other).canonical().normalized()
    }

    /// Raw components `[w, x, y, z]` with `frac_bits` fractional bits
    /// (rounded to nearest). `frac_bits` is clamped to `1..=30`.
    pub fn to_bits(self, frac_bits: u32) -> [i32; 4] {
        let shift = FRAC_BITS - frac_bits.clamp(1, FRAC_BITS);
        let reduce = |c: I2F30| -> i32 {
            if shift == 0 {
                c.to_bits()
            } else {
                ((c.to_bits() as i64 + (1i64 << (shift - 1))) >> shift) as i32
            }
        };
        [reduce(self.w), reduce(self.x), reduce(self.y), reduce(self.z)]
    }

    /// Inverse of [`to_bits`](Self::to_bits). Values that do not fit Q2.30
    /// saturate.
    pub fn from_bits(bits: [i32; 4], frac_bits: u32) -> Self {
        let shift = FRAC_BITS - frac_bits.clamp(1, FRAC_BITS);
        let widen = |b: i32| -> I2F30 {
            let wide = (b as i64) << shift;
            I2F30::from_bits(wide.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
        };
        Self {
            w: widen(bits[0]),
            x: widen(bits[1]),
            y: widen(bits[2]),
            z: widen(bits[3]),
        }
    }
}

impl Mul for FixedQuat {
    type Output = FixedQuat;

    /// Hamilton product: `self` followed by `rhs` in the body frame.
    fn mul(self, rhs: FixedQuat) -> FixedQuat {
        let (a, b) = (self, rhs);
        FixedQuat {
            w: a.w
                .saturating_mul(b.w)
                .saturating_sub(a.x.saturating_mul(b.x))
                .saturating_sub(a.y.saturating_mul(b.y))
                .saturating_sub(a.z.saturating_mul(b.z)),
            x: a.w
                .saturating_mul(b.x)
                .saturating_add(a.x.saturating_mul(b.w))
                .saturating_add(a.y.saturating_mul(b.z))
                .saturating_sub(a.z.saturating_mul(b.y)),
            y: a.w
                .saturating_mul(b.y)
                .saturating_sub(a.x.saturating_mul(b.z))
                .saturating_add(a.y.saturating_mul(b.w))
                .saturating_add(a.z.saturating_mul(b.x)),
            z: a.w
                .saturating_mul(b.z)
                .saturating_add(a.x.saturating_mul(b.y))
                .saturating_sub(a.y.saturating_mul(b.x))
                .saturating_add(a.z.saturating_mul(b.w)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: FixedQuat, b: FixedQuat, tol: f64) -> bool {
        let (a, b) = (a.canonical().to_f64(), b.canonical().to_f64());
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tol)
    }

    #[test]
    fn identity_is_neutral() {
        let q = FixedQuat::from_f64(0.9, 0.1, -0.3, 0.2);
        assert_eq!(q * FixedQuat::IDENTITY, q);
        assert_eq!(FixedQuat::IDENTITY * q, q);
    }

    #[test]
    fn conjugate_inverts() {
        let q = FixedQuat::from_f64(0.7, 0.5, -0.1, 0.5);
        assert!(close(q * q.conjugate(), FixedQuat::IDENTITY, 1e-8));
    }

    #[test]
    fn exp_matches_closed_form() {
        let v = RotationVector::from_f64(0.01, 0.005, 0.0);
        let q = FixedQuat::from_rotation_vector(v);
        let angle = (0.01f64 * 0.01 + 0.005 * 0.005).sqrt();
        let s = (angle / 2.0).sin() / angle;
        let expected = FixedQuat::from_f64((angle / 2.0).cos(), 0.01 * s, 0.005 * s, 0.0);
        assert!(close(q, expected, 1e-8));
    }

    #[test]
    fn log_inverts_exp_for_small_angles() {
        let v = RotationVector::from_f64(0.05, -0.02, 0.03);
        let back = FixedQuat::from_rotation_vector(v).to_rotation_vector();
        for (a, b) in v.to_array().iter().zip(back.to_array().iter()) {
            assert!((a.to_num::<f64>() - b.to_num::<f64>()).abs() < 1e-7);
        }
    }

    #[test]
    fn delta_recovers_composition() {
        let a = FixedQuat::from_f64(0.8, 0.2, 0.4, -0.4);
        let step = FixedQuat::from_rotation_vector(RotationVector::from_f64(0.02, 0.0, -0.01));
        let b = a * step;
        assert!(close(a.delta_to(b), step, 1e-8));
    }

    #[test]
    fn normalization_pulls_towards_unit() {
        let q = FixedQuat::from_f64(0.5, 0.5, 0.5, 0.5);
        let grown = FixedQuat::new(q.w + I2F30::from_num(0.001), q.x, q.y, q.z);
        let before = (grown.norm_squared().to_num::<f64>() - 1.0).abs();
        let after = (grown.normalized().norm_squared().to_num::<f64>() - 1.0).abs();
        assert!(after < before / 100.0);
    }

    #[test]
    fn from_f64_handles_degenerate_input() {
        assert_eq!(FixedQuat::from_f64(0.0, 0.0, 0.0, 0.0), FixedQuat::IDENTITY);
        assert_eq!(FixedQuat::from_f64(f64::NAN, 0.0, 0.0, 0.0), FixedQuat::IDENTITY);
        assert!(close(FixedQuat::from_f64(2.0, 0.0, 0.0, 0.0), FixedQuat::IDENTITY, 1e-9));
    }

    #[test]
    fn bit_depth_conversion() {
        let q = FixedQuat::from_f64(0.6, -0.48, 0.64, 0.0);
        assert_eq!(FixedQuat::from_bits(q.to_bits(30), 30), q);

        let coarse = q.to_bits(14);
        assert_eq!(coarse[0], (0.6f64 * 16384.0).round() as i32);
        let restored = FixedQuat::from_bits(coarse, 14);
        assert!(close(restored, q, 1.0 / 16384.0));
    }

    #[test]
    fn canonical_flips_negative_scalar() {
        let q = FixedQuat::from_f64(-0.6, 0.8, 0.0, 0.0);
        let c = q.canonical();
        assert!(!c.w.is_negative());
        assert_eq!(c.x, q.x.saturating_neg());
    }
}
