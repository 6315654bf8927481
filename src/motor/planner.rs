// Path planner: canvas segments -> turn/forward motor steps
// The robot turns in place to face each segment, then drives its length.

use serde::{Deserialize, Serialize};

use crate::config::HEADING_OFFSET_DEG;
use crate::messages::PathSegment;

/// Turns at or below this magnitude are not worth sending (degrees)
pub const MIN_TURN_DEG: f64 = 0.5;

/// Forward moves at or below this distance are not worth sending (feet)
pub const MIN_DISTANCE_FT: f64 = 0.01;

/// One motion primitive understood by the motor controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotorStep {
    TurnLeft {
        #[serde(rename = "deg")]
        degrees: f64,
    },
    TurnRight {
        #[serde(rename = "deg")]
        degrees: f64,
    },
    Forward { distance_ft: f64 },
    Stop,
}

pub type MotorPlan = Vec<MotorStep>;

/// Wrap an angle into (-180, 180] in constant time
pub fn normalize_degrees(angle: f64) -> f64 {
    // [0, 360], where 360 only appears by rounding tiny negative inputs
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

/// Build a plan with the default canvas-to-robot heading offset
pub fn build_plan(segments: &[PathSegment]) -> MotorPlan {
    build_plan_with_offset(segments, HEADING_OFFSET_DEG)
}

/// Build a plan, assuming the robot starts at heading 0
///
/// # Arguments
/// * `segments` - Drawn path, in order
/// * `heading_offset` - Added to every canvas heading to get a robot heading
pub fn build_plan_with_offset(segments: &[PathSegment], heading_offset: f64) -> MotorPlan {
    let mut plan = Vec::with_capacity(segments.len() * 2);
    let mut current_heading = 0.0;

    for seg in segments {
        let target = normalize_degrees(seg.heading_degrees + heading_offset);

        // Canvas angles grow the opposite way to the robot's turn sense
        let delta = -normalize_degrees(target - current_heading);
        let magnitude = delta.abs();

        if magnitude > MIN_TURN_DEG {
            if delta > 0.0 {
                plan.push(MotorStep::TurnLeft { degrees: magnitude });
            } else {
                plan.push(MotorStep::TurnRight { degrees: magnitude });
            }
        }

        if seg.distance_feet > MIN_DISTANCE_FT {
            plan.push(MotorStep::Forward {
                distance_ft: seg.distance_feet,
            });
        }

        current_heading = target;
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(distance_feet: f64, heading_degrees: f64) -> PathSegment {
        PathSegment::new(distance_feet, heading_degrees)
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize_degrees(180.0), 180.0);
        assert_eq!(normalize_degrees(-180.0), 180.0);
        assert_eq!(normalize_degrees(270.0), -90.0);
        assert_eq!(normalize_degrees(-450.0), -90.0);
        assert_eq!(normalize_degrees(720.0), 0.0);
        assert_eq!(normalize_degrees(-1e-20), 0.0);
    }

    #[test]
    fn test_normalize_huge_angles_terminates() {
        for angle in [1e12, -1e12, 1e20, -1e20, f64::MAX, f64::MIN] {
            let wrapped = normalize_degrees(angle);
            assert!(wrapped > -180.0 && wrapped <= 180.0, "{} -> {}", angle, wrapped);
        }
    }

    #[test]
    fn test_plan_with_huge_heading_returns() {
        let plan = build_plan(&[seg(1.0, 1e20)]);
        assert_eq!(plan.last(), Some(&MotorStep::Forward { distance_ft: 1.0 }));
    }

    #[test]
    fn test_empty_path_yields_empty_plan() {
        assert!(build_plan(&[]).is_empty());
    }

    #[test]
    fn test_zero_heading_zero_distance_is_single_90_turn() {
        let plan = build_plan(&[seg(0.0, 0.0)]);
        assert_eq!(plan.len(), 1);
        match plan[0] {
            MotorStep::TurnLeft { degrees } | MotorStep::TurnRight { degrees } => {
                assert!((degrees - 90.0).abs() < 1e-9)
            }
            other => panic!("expected a turn, got {:?}", other),
        }
    }

    #[test]
    fn test_minus_90_canvas_heading_needs_no_turn() {
        let plan = build_plan(&[seg(2.0, -90.0)]);
        assert_eq!(plan, vec![MotorStep::Forward { distance_ft: 2.0 }]);
    }

    // The negated delta is what maps canvas rotation onto the controller's
    // left/right. If either assertion flips, drawn paths mirror.
    #[test]
    fn test_turn_direction_sign_convention() {
        // target +90, delta +90, negated -> right
        assert_eq!(
            build_plan(&[seg(0.0, 0.0)]),
            vec![MotorStep::TurnRight { degrees: 90.0 }]
        );
        // target -90 (normalized from 270), delta -90, negated -> left
        assert_eq!(
            build_plan(&[seg(0.0, 180.0)]),
            vec![MotorStep::TurnLeft { degrees: 90.0 }]
        );
        // target 45 from heading 0: negated delta is -45 -> right
        assert_eq!(
            build_plan(&[seg(0.0, -45.0)]),
            vec![MotorStep::TurnRight { degrees: 45.0 }]
        );
    }

    #[test]
    fn test_heading_carries_between_segments() {
        let plan = build_plan(&[seg(1.0, -90.0), seg(1.0, 0.0), seg(1.0, 0.0)]);
        assert_eq!(
            plan,
            vec![
                MotorStep::Forward { distance_ft: 1.0 },
                MotorStep::TurnRight { degrees: 90.0 },
                MotorStep::Forward { distance_ft: 1.0 },
                MotorStep::Forward { distance_ft: 1.0 },
            ]
        );
    }

    #[test]
    fn test_turn_takes_short_way_round() {
        // 170 -> -170 is a 20 degree turn, not 340
        let plan = build_plan_with_offset(&[seg(0.0, 170.0), seg(0.0, -170.0)], 0.0);
        assert_eq!(plan.len(), 2);
        match plan[1] {
            MotorStep::TurnLeft { degrees } | MotorStep::TurnRight { degrees } => {
                assert!((degrees - 20.0).abs() < 1e-9, "turned {}", degrees)
            }
            other => panic!("expected a turn, got {:?}", other),
        }
    }

    #[test]
    fn test_negligible_steps_are_dropped() {
        let plan = build_plan_with_offset(&[seg(0.01, 0.5), seg(0.005, 0.9)], 0.0);
        assert!(plan.is_empty(), "unexpected steps: {:?}", plan);

        let plan = build_plan_with_offset(&[seg(0.011, 0.6)], 0.0);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_plan_never_emits_tiny_magnitudes() {
        let segments: Vec<PathSegment> = (0..200)
            .map(|i| seg((i % 7) as f64 * 0.004, (i as f64 * 37.3) % 360.0 - 180.0))
            .collect();
        for step in build_plan(&segments) {
            match step {
                MotorStep::TurnLeft { degrees } | MotorStep::TurnRight { degrees } => {
                    assert!(degrees > MIN_TURN_DEG && degrees <= 180.0)
                }
                MotorStep::Forward { distance_ft } => assert!(distance_ft > MIN_DISTANCE_FT),
                MotorStep::Stop => panic!("planner never emits Stop"),
            }
        }
    }

    #[test]
    fn test_step_wire_shape() {
        let json = serde_json::to_value(MotorStep::TurnLeft { degrees: 15.5 }).unwrap();
        assert_eq!(json, serde_json::json!({"action": "TURN_LEFT", "deg": 15.5}));
        let json = serde_json::to_value(MotorStep::Forward { distance_ft: 2.8 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "FORWARD", "distance_ft": 2.8})
        );
        let json = serde_json::to_value(MotorStep::Stop).unwrap();
        assert_eq!(json, serde_json::json!({"action": "STOP"}));
    }
}
