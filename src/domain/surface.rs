//! Contact surfaces between pairs of bodies.
//!
//! Every pair of bodies that can touch during play owns exactly one [`ContactSurface`]. The
//! registry is filled once while a world is built; afterwards only the parameters of existing
//! entries change.

use std::collections::BTreeMap;

use thiserror::Error;

/// Identifies a body, or a part of a composite body, for surface lookup.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum BodyKey {
    Ground,
    Ball,
    Wall(usize),
    Chassis(usize),
    Kicker(usize),
    Wheel(usize, usize),
}

/// Unordered pair of bodies. Construction sorts the keys, so `(a, b)` and `(b, a)` are equal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SurfacePair(BodyKey, BodyKey);

impl SurfacePair {
    pub fn new(a: BodyKey, b: BodyKey) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// Contact behaviour switches. Fixed when the surface is registered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SurfaceMode {
    pub bounce: bool,
    /// Friction limit proportional to the normal impulse instead of an absolute force.
    pub approx: bool,
    pub slip1: bool,
    pub slip2: bool,
}

impl SurfaceMode {
    pub const ALL: SurfaceMode = SurfaceMode {
        bounce: true,
        approx: true,
        slip1: true,
        slip2: true,
    };

    pub const BOUNCE_APPROX: SurfaceMode = SurfaceMode {
        bounce: true,
        approx: true,
        slip1: false,
        slip2: false,
    };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactSurface {
    mode: SurfaceMode,
    /// Coulomb friction coefficient; negative means unbounded.
    pub friction: f64,
    pub bounce: f64,
    pub bounce_velocity: f64,
    pub slip1: f64,
    pub slip2: f64,
}

impl ContactSurface {
    pub const fn new(mode: SurfaceMode, friction: f64, bounce: f64, bounce_velocity: f64) -> Self {
        Self {
            mode,
            friction,
            bounce,
            bounce_velocity,
            slip1: 0.0,
            slip2: 0.0,
        }
    }

    pub fn with_slip(self, slip1: f64, slip2: f64) -> Self {
        Self {
            slip1,
            slip2,
            ..self
        }
    }

    /// Coefficient of restitution for an approaching normal speed.
    pub fn restitution(&self, approach_speed: f64) -> f64 {
        if self.mode.bounce && approach_speed > self.bounce_velocity {
            self.bounce
        } else {
            0.0
        }
    }

    /// Largest tangential impulse the surface can transmit.
    pub fn friction_limit(&self, normal_impulse: f64, dt: f64) -> f64 {
        if self.friction < 0.0 {
            f64::INFINITY
        } else if self.mode.approx {
            self.friction * normal_impulse.abs()
        } else {
            self.friction * dt
        }
    }

    /// Tangential impulse opposing `relative_speed` along one friction direction.
    ///
    /// With force-dependent slip the contact tolerates a sliding speed of `slip * force`, so the
    /// impulse solves `relative_speed - j * inverse_mass = slip * j / dt`.
    pub fn tangential_impulse(
        &self,
        relative_speed: f64,
        inverse_mass: f64,
        normal_impulse: f64,
        dt: f64,
        direction: FrictionDirection,
    ) -> f64 {
        let slip = match direction {
            FrictionDirection::First if self.mode.slip1 => self.slip1,
            FrictionDirection::Second if self.mode.slip2 => self.slip2,
            _ => 0.0,
        };
        let denominator = inverse_mass + slip / dt;
        if denominator <= 0.0 {
            return 0.0;
        }
        let limit = self.friction_limit(normal_impulse, dt);
        let impulse = relative_speed / denominator;
        if !(impulse.is_finite() && limit >= 0.0) {
            return 0.0;
        }
        impulse.clamp(-limit, limit)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrictionDirection {
    First,
    Second,
}

#[derive(Error, Debug, PartialEq)]
pub enum SurfaceError {
    #[error("no contact surface registered for {0:?}")]
    NotFound(SurfacePair),
    #[error("contact surface for {0:?} registered twice")]
    Duplicate(SurfacePair),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceRegistry {
    surfaces: BTreeMap<SurfacePair, ContactSurface>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        a: BodyKey,
        b: BodyKey,
        surface: ContactSurface,
    ) -> Result<(), SurfaceError> {
        let pair = SurfacePair::new(a, b);
        if self.surfaces.contains_key(&pair) {
            return Err(SurfaceError::Duplicate(pair));
        }
        self.surfaces.insert(pair, surface);
        Ok(())
    }

    pub fn find(&self, a: BodyKey, b: BodyKey) -> Result<&ContactSurface, SurfaceError> {
        let pair = SurfacePair::new(a, b);
        self.surfaces.get(&pair).ok_or(SurfaceError::NotFound(pair))
    }

    pub fn find_mut(
        &mut self,
        a: BodyKey,
        b: BodyKey,
    ) -> Result<&mut ContactSurface, SurfaceError> {
        let pair = SurfacePair::new(a, b);
        self.surfaces
            .get_mut(&pair)
            .ok_or(SurfaceError::NotFound(pair))
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn surface() -> ContactSurface {
        ContactSurface::new(SurfaceMode::ALL, 0.5, 0.3, 0.1)
    }

    #[test]
    fn test_registry_find_is_unordered() {
        let mut registry = SurfaceRegistry::new();
        registry
            .register(BodyKey::Ball, BodyKey::Ground, surface())
            .unwrap();
        assert_eq!(
            registry.find(BodyKey::Ground, BodyKey::Ball).unwrap(),
            &surface()
        );
        assert_eq!(
            registry.find(BodyKey::Ball, BodyKey::Ground).unwrap(),
            &surface()
        );
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = SurfaceRegistry::new();
        registry
            .register(BodyKey::Chassis(0), BodyKey::Chassis(1), surface())
            .unwrap();
        assert_eq!(
            registry.register(BodyKey::Chassis(1), BodyKey::Chassis(0), surface()),
            Err(SurfaceError::Duplicate(SurfacePair::new(
                BodyKey::Chassis(0),
                BodyKey::Chassis(1)
            )))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_missing_pair() {
        let registry = SurfaceRegistry::new();
        assert_eq!(
            registry.find(BodyKey::Ball, BodyKey::Kicker(3)),
            Err(SurfaceError::NotFound(SurfacePair::new(
                BodyKey::Ball,
                BodyKey::Kicker(3)
            )))
        );
    }

    #[test]
    fn test_registry_parameters_are_mutable_in_place() {
        let mut registry = SurfaceRegistry::new();
        registry
            .register(BodyKey::Ball, BodyKey::Ground, surface())
            .unwrap();
        registry
            .find_mut(BodyKey::Ground, BodyKey::Ball)
            .unwrap()
            .friction = 0.9;
        assert_abs_diff_eq!(
            registry.find(BodyKey::Ball, BodyKey::Ground).unwrap().friction,
            0.9
        );
    }

    #[rstest]
    #[case::slow_approach(0.05, 0.0)]
    #[case::fast_approach(2.0, 0.3)]
    fn test_restitution_threshold(#[case] speed: f64, #[case] expected: f64) {
        assert_abs_diff_eq!(surface().restitution(speed), expected);
    }

    #[test]
    fn test_restitution_requires_bounce_mode() {
        let surface = ContactSurface::new(SurfaceMode::default(), 0.5, 0.3, 0.1);
        assert_abs_diff_eq!(surface.restitution(2.0), 0.0);
    }

    #[test]
    fn test_tangential_impulse_is_clamped_by_friction() {
        // Sticking would need 1.0, friction allows 0.5 * 0.4.
        let impulse = surface().tangential_impulse(1.0, 1.0, 0.4, 0.01, FrictionDirection::First);
        assert_abs_diff_eq!(impulse, 0.2);
    }

    #[test]
    fn test_tangential_impulse_with_slip() {
        let surface = surface().with_slip(0.01, 0.0);
        let impulse = surface.tangential_impulse(0.1, 1.0, 100.0, 0.01, FrictionDirection::First);
        assert_abs_diff_eq!(impulse, 0.05, epsilon = 1e-12);
        let impulse = surface.tangential_impulse(0.1, 1.0, 100.0, 0.01, FrictionDirection::Second);
        assert_abs_diff_eq!(impulse, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_friction_is_unbounded() {
        let surface = ContactSurface::new(SurfaceMode::ALL, -1.0, 0.0, 0.0);
        assert!(surface.friction_limit(0.0, 0.01).is_infinite());
    }

    #[rstest]
    #[case::nan_speed(f64::NAN, 1.0)]
    #[case::nan_normal_impulse(1.0, f64::NAN)]
    #[case::infinite_speed(f64::INFINITY, 1.0)]
    fn test_tangential_impulse_ignores_non_finite_input(
        #[case] relative_speed: f64,
        #[case] normal_impulse: f64,
    ) {
        let impulse = surface().tangential_impulse(
            relative_speed,
            1.0,
            normal_impulse,
            0.01,
            FrictionDirection::First,
        );
        assert_eq!(impulse, 0.0);
    }
}
