//! Host-side combat math.

/// Area damage for a target `distance` away from an explosion.
///
/// Damage ramps linearly from zero at the blast center up to `max_damage`
/// at the edge of the radius, and stays capped beyond it. The outward ramp
/// is the established gameplay behavior and is kept as-is.
pub fn explosion_damage(distance: f32, radius: f32, max_damage: f32) -> f32 {
    if radius <= 0.0 {
        return 0.0;
    }
    let clamped = distance.clamp(0.0, radius);
    clamped / radius * max_damage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_from_center_to_edge() {
        assert_eq!(explosion_damage(0.0, 5.0, 10.0), 0.0);
        assert_eq!(explosion_damage(2.5, 5.0, 10.0), 5.0);
        assert_eq!(explosion_damage(5.0, 5.0, 10.0), 10.0);
    }

    #[test]
    fn caps_beyond_the_radius() {
        assert_eq!(explosion_damage(50.0, 5.0, 10.0), 10.0);
    }

    #[test]
    fn degenerate_radius_deals_nothing() {
        assert_eq!(explosion_damage(1.0, 0.0, 10.0), 0.0);
        assert_eq!(explosion_damage(1.0, -3.0, 10.0), 0.0);
    }

    #[test]
    fn negative_distance_is_treated_as_center() {
        assert_eq!(explosion_damage(-2.0, 5.0, 10.0), 0.0);
    }
}
