use crate::models::{
    command::Command,
    gesture::GestureResult,
    hand::{DetectedHand, HandSnapshot, Handedness},
};

/// Tunable cutoffs for gesture classification. All pixel values are in the
/// detector's frame coordinates.
#[derive(Debug, Clone, Copy)]
pub struct GestureThresholds {
    /// A fingertip must sit this many pixels above its PIP joint to count
    /// as extended.
    pub finger_extension_margin: f32,

    /// One hand must be this many pixels higher than the other before
    /// steering takes over from the finger-count gestures.
    pub steering_height_margin: f32,

    /// At most this many extended fingers reads as a closed fist.
    pub closed_fist_max_fingers: usize,

    /// At least this many extended fingers reads as an open hand.
    pub open_hand_min_fingers: usize,
}

impl Default for GestureThresholds {
    fn default() -> Self {
        Self {
            finger_extension_margin: 20.0,
            steering_height_margin: 80.0,
            closed_fist_max_fingers: 1,
            open_hand_min_fingers: 3,
        }
    }
}

/// Decide a drive command from one frame of hand landmarks.
///
/// Requires exactly two hands, one per side; anything else stops the car.
/// The camera image is mirrored, so the hand the detector labels `Left` is
/// the user's right hand. A clearly raised hand steers toward its own side
/// and takes precedence; otherwise two fists drive forward, two open hands
/// drive backward, and any mix stops.
///
/// Pure: no state, no side effects, same snapshot in means same result out.
pub fn classify(snapshot: &HandSnapshot, thresholds: &GestureThresholds) -> GestureResult {
    if snapshot.hands.len() != 2 {
        return GestureResult::new(
            Command::Stop,
            format!("need exactly two hands, saw {}", snapshot.hands.len()),
        );
    }

    // Mirrored image: detector "Left" is the user's right hand.
    let users_right = hand_labelled(snapshot, Handedness::Left);
    let users_left = hand_labelled(snapshot, Handedness::Right);

    let (users_right, users_left) = match (users_right, users_left) {
        (Some(right), Some(left)) => (right, left),
        _ => {
            return GestureResult::new(Command::Stop, "need one hand on each side");
        }
    };

    // y grows downward, so a positive gap means the right hand is higher.
    let height_gap = users_left.height() - users_right.height();
    if height_gap.abs() > thresholds.steering_height_margin {
        return if height_gap > 0.0 {
            GestureResult::new(Command::Right, "right hand raised")
        } else {
            GestureResult::new(Command::Left, "left hand raised")
        };
    }

    let margin = thresholds.finger_extension_margin;
    let left_fingers = users_left.extended_finger_count(margin);
    let right_fingers = users_right.extended_finger_count(margin);

    if left_fingers <= thresholds.closed_fist_max_fingers
        && right_fingers <= thresholds.closed_fist_max_fingers
    {
        return GestureResult::new(
            Command::Forward,
            format!("two fists ({} and {} fingers)", left_fingers, right_fingers),
        );
    }

    if left_fingers >= thresholds.open_hand_min_fingers
        && right_fingers >= thresholds.open_hand_min_fingers
    {
        return GestureResult::new(
            Command::Backward,
            format!(
                "two open hands ({} and {} fingers)",
                left_fingers, right_fingers
            ),
        );
    }

    GestureResult::new(
        Command::Stop,
        format!(
            "mixed hands ({} and {} fingers)",
            left_fingers, right_fingers
        ),
    )
}

fn hand_labelled(snapshot: &HandSnapshot, label: Handedness) -> Option<&DetectedHand> {
    snapshot.hands.iter().find(|hand| hand.handedness == label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::hand::{
        LandmarkPoint, FINGER_TIP_PIP_PAIRS, LANDMARK_COUNT, MIDDLE_FINGER_MCP, WRIST,
    };

    /// Build a hand at a vertical position with a chosen number of extended
    /// fingers. PIP joints sit 40 px above the wrist line; extended tips
    /// clear them by 30 px, curled tips sit 10 px below them.
    fn hand(label: Handedness, height: f32, extended_fingers: usize) -> DetectedHand {
        let mut landmarks = [LandmarkPoint { x: 0.0, y: height }; LANDMARK_COUNT];
        for (i, (tip, pip)) in FINGER_TIP_PIP_PAIRS.iter().enumerate() {
            landmarks[*pip] = LandmarkPoint {
                x: 0.0,
                y: height - 40.0,
            };
            let tip_y = if i < extended_fingers {
                height - 70.0
            } else {
                height - 30.0
            };
            landmarks[*tip] = LandmarkPoint { x: 0.0, y: tip_y };
        }
        landmarks[WRIST] = LandmarkPoint { x: 0.0, y: height };
        landmarks[MIDDLE_FINGER_MCP] = LandmarkPoint { x: 0.0, y: height };
        DetectedHand {
            handedness: label,
            landmarks,
        }
    }

    fn snapshot(hands: Vec<DetectedHand>) -> HandSnapshot {
        HandSnapshot { hands }
    }

    #[test]
    fn test_two_fists_drive_forward() {
        let frame = snapshot(vec![
            hand(Handedness::Left, 300.0, 0),
            hand(Handedness::Right, 300.0, 0),
        ]);
        let result = classify(&frame, &GestureThresholds::default());
        assert_eq!(result.command, Command::Forward);
    }

    #[test]
    fn test_two_open_hands_drive_backward() {
        let frame = snapshot(vec![
            hand(Handedness::Left, 300.0, 4),
            hand(Handedness::Right, 300.0, 4),
        ]);
        let result = classify(&frame, &GestureThresholds::default());
        assert_eq!(result.command, Command::Backward);
    }

    #[test]
    fn test_raised_right_hand_steers_right() {
        // The detector's "Left" hand is the user's right. Raised well past
        // the 80 px margin, and with mixed finger counts to show steering
        // takes precedence.
        let frame = snapshot(vec![
            hand(Handedness::Left, 200.0, 0),
            hand(Handedness::Right, 310.0, 4),
        ]);
        let result = classify(&frame, &GestureThresholds::default());
        assert_eq!(result.command, Command::Right);
    }

    #[test]
    fn test_raised_left_hand_steers_left() {
        let frame = snapshot(vec![
            hand(Handedness::Left, 310.0, 0),
            hand(Handedness::Right, 200.0, 0),
        ]);
        let result = classify(&frame, &GestureThresholds::default());
        assert_eq!(result.command, Command::Left);
    }

    #[test]
    fn test_one_hand_stops() {
        let frame = snapshot(vec![hand(Handedness::Left, 300.0, 0)]);
        let result = classify(&frame, &GestureThresholds::default());
        assert_eq!(result.command, Command::Stop);
    }

    #[test]
    fn test_no_hands_stop() {
        let result = classify(&HandSnapshot::default(), &GestureThresholds::default());
        assert_eq!(result.command, Command::Stop);
    }

    #[test]
    fn test_two_hands_on_the_same_side_stop() {
        let frame = snapshot(vec![
            hand(Handedness::Left, 300.0, 0),
            hand(Handedness::Left, 300.0, 0),
        ]);
        let result = classify(&frame, &GestureThresholds::default());
        assert_eq!(result.command, Command::Stop);
    }

    #[test]
    fn test_mixed_hands_stop() {
        let frame = snapshot(vec![
            hand(Handedness::Left, 300.0, 0),
            hand(Handedness::Right, 300.0, 4),
        ]);
        let result = classify(&frame, &GestureThresholds::default());
        assert_eq!(result.command, Command::Stop);
    }

    #[test]
    fn test_one_finger_still_reads_as_a_fist() {
        let frame = snapshot(vec![
            hand(Handedness::Left, 300.0, 1),
            hand(Handedness::Right, 300.0, 1),
        ]);
        let result = classify(&frame, &GestureThresholds::default());
        assert_eq!(result.command, Command::Forward);
    }

    #[test]
    fn test_three_fingers_already_read_as_open() {
        let frame = snapshot(vec![
            hand(Handedness::Left, 300.0, 3),
            hand(Handedness::Right, 300.0, 3),
        ]);
        let result = classify(&frame, &GestureThresholds::default());
        assert_eq!(result.command, Command::Backward);
    }

    #[test]
    fn test_two_fingers_are_neither_fist_nor_open() {
        let frame = snapshot(vec![
            hand(Handedness::Left, 300.0, 2),
            hand(Handedness::Right, 300.0, 2),
        ]);
        let result = classify(&frame, &GestureThresholds::default());
        assert_eq!(result.command, Command::Stop);
    }

    #[test]
    fn test_height_gap_at_the_margin_does_not_steer() {
        // Exactly 80 px apart: falls through to the finger rules.
        let frame = snapshot(vec![
            hand(Handedness::Left, 220.0, 0),
            hand(Handedness::Right, 300.0, 0),
        ]);
        let result = classify(&frame, &GestureThresholds::default());
        assert_eq!(result.command, Command::Forward);
    }

    #[test]
    fn test_thresholds_are_respected() {
        let thresholds = GestureThresholds {
            steering_height_margin: 10.0,
            ..GestureThresholds::default()
        };
        let frame = snapshot(vec![
            hand(Handedness::Left, 280.0, 0),
            hand(Handedness::Right, 300.0, 0),
        ]);
        let result = classify(&frame, &thresholds);
        assert_eq!(result.command, Command::Right);
    }

    #[test]
    fn test_classification_is_pure() {
        let frame = snapshot(vec![
            hand(Handedness::Left, 300.0, 0),
            hand(Handedness::Right, 300.0, 4),
        ]);
        let thresholds = GestureThresholds::default();
        let first = classify(&frame, &thresholds);
        let second = classify(&frame, &thresholds);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rationale_explains_the_stop() {
        let result = classify(&HandSnapshot::default(), &GestureThresholds::default());
        assert!(result.rationale.contains("two hands"));
    }
}
