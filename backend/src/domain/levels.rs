//! Level calculation from total points.
//!
//! Pure functions: levels are always recomputed from points, never stored
//! independently of them.

/// Ascending point thresholds for levels 1 through 10.
pub const LEVEL_THRESHOLDS: [u64; 10] = [0, 100, 300, 600, 1000, 1500, 2500, 4000, 6000, 9000];

pub const MAX_LEVEL: u32 = 10;

/// Level for a point total: the highest threshold not exceeding the points,
/// capped at level 10.
pub fn level_for_points(total_points: u64) -> u32 {
    let mut level = 1u32;
    for threshold in LEVEL_THRESHOLDS.iter().skip(1) {
        if total_points >= *threshold {
            level += 1;
        } else {
            break;
        }
    }
    level.min(MAX_LEVEL)
}

/// Points still needed to reach the next level, 0 at max level.
pub fn points_for_next_level(total_points: u64) -> u64 {
    let level = level_for_points(total_points);
    if level >= MAX_LEVEL {
        return 0;
    }
    LEVEL_THRESHOLDS[level as usize] - total_points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_for_points(0), 1);
        assert_eq!(level_for_points(99), 1);
        assert_eq!(level_for_points(100), 2);
        assert_eq!(level_for_points(299), 2);
        assert_eq!(level_for_points(300), 3);
        assert_eq!(level_for_points(8999), 9);
        assert_eq!(level_for_points(9000), 10);
        assert_eq!(level_for_points(1_000_000), 10);
    }

    #[test]
    fn test_level_is_monotonic() {
        let mut last = 0;
        for points in 0..10_000u64 {
            let level = level_for_points(points);
            assert!(level >= last, "level dropped at {} points", points);
            last = level;
        }
    }

    #[test]
    fn test_points_for_next_level() {
        assert_eq!(points_for_next_level(0), 100);
        assert_eq!(points_for_next_level(150), 150);
        assert_eq!(points_for_next_level(8999), 1);
        assert_eq!(points_for_next_level(9000), 0);
        assert_eq!(points_for_next_level(20_000), 0);
    }
}
