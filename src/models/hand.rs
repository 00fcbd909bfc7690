use serde::Deserialize;

/// Landmark indices from the 21-point hand model used by the detector.
pub const WRIST: usize = 0;
pub const INDEX_FINGER_PIP: usize = 6;
pub const INDEX_FINGER_TIP: usize = 8;
pub const MIDDLE_FINGER_MCP: usize = 9;
pub const MIDDLE_FINGER_PIP: usize = 10;
pub const MIDDLE_FINGER_TIP: usize = 12;
pub const RING_FINGER_PIP: usize = 14;
pub const RING_FINGER_TIP: usize = 16;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

pub const LANDMARK_COUNT: usize = 21;

/// The (tip, PIP) landmark pairs checked for finger extension. The thumb is
/// deliberately excluded; its tip moves sideways, not up.
pub const FINGER_TIP_PIP_PAIRS: [(usize, usize); 4] = [
    (INDEX_FINGER_TIP, INDEX_FINGER_PIP),
    (MIDDLE_FINGER_TIP, MIDDLE_FINGER_PIP),
    (RING_FINGER_TIP, RING_FINGER_PIP),
    (PINKY_TIP, PINKY_PIP),
];

/// One landmark in frame pixel coordinates. The y axis grows downward, so a
/// smaller y is higher in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
}

/// The detector's handedness label for a hand.
///
/// The camera image is mirrored, so a hand the detector labels `Left` is the
/// user's right hand and vice versa. Classification accounts for this; keep
/// the raw label here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// One detected hand: the detector's label plus its 21 landmarks.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectedHand {
    pub handedness: Handedness,
    pub landmarks: [LandmarkPoint; LANDMARK_COUNT],
}

impl DetectedHand {
    /// Count extended non-thumb fingers. A finger counts as extended when
    /// its tip sits above its PIP joint by more than `margin` pixels.
    pub fn extended_finger_count(&self, margin: f32) -> usize {
        FINGER_TIP_PIP_PAIRS
            .iter()
            .filter(|(tip, pip)| self.landmarks[*tip].y < self.landmarks[*pip].y - margin)
            .count()
    }

    /// Vertical position of the hand: the average y of the wrist and the
    /// middle-finger MCP. Smaller means higher.
    pub fn height(&self) -> f32 {
        (self.landmarks[WRIST].y + self.landmarks[MIDDLE_FINGER_MCP].y) / 2.0
    }
}

/// Everything the detector saw in one camera frame. Normally zero, one, or
/// two hands; the classifier only acts on exactly two.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandSnapshot {
    pub hands: Vec<DetectedHand>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_hand(y: f32) -> DetectedHand {
        DetectedHand {
            handedness: Handedness::Left,
            landmarks: [LandmarkPoint { x: 0.0, y }; LANDMARK_COUNT],
        }
    }

    #[test]
    fn test_flat_hand_has_no_extended_fingers() {
        let hand = flat_hand(300.0);
        assert_eq!(hand.extended_finger_count(20.0), 0);
    }

    #[test]
    fn test_extension_requires_clearing_the_margin() {
        let mut hand = flat_hand(300.0);
        // Exactly at the margin does not count.
        hand.landmarks[INDEX_FINGER_TIP].y = 280.0;
        assert_eq!(hand.extended_finger_count(20.0), 0);

        hand.landmarks[INDEX_FINGER_TIP].y = 279.0;
        assert_eq!(hand.extended_finger_count(20.0), 1);
    }

    #[test]
    fn test_all_four_fingers_count() {
        let mut hand = flat_hand(300.0);
        for (tip, _) in FINGER_TIP_PIP_PAIRS {
            hand.landmarks[tip].y = 200.0;
        }
        assert_eq!(hand.extended_finger_count(20.0), 4);
    }

    #[test]
    fn test_height_averages_wrist_and_middle_mcp() {
        let mut hand = flat_hand(0.0);
        hand.landmarks[WRIST].y = 200.0;
        hand.landmarks[MIDDLE_FINGER_MCP].y = 300.0;
        assert_eq!(hand.height(), 250.0);
    }

    #[test]
    fn test_snapshot_deserializes_from_detector_json() {
        let point = r#"{"x": 1.0, "y": 2.0}"#;
        let landmarks = (0..LANDMARK_COUNT)
            .map(|_| point)
            .collect::<Vec<_>>()
            .join(",");
        let raw = format!(
            r#"{{"hands": [{{"handedness": "Left", "landmarks": [{}]}}]}}"#,
            landmarks
        );

        let snapshot: HandSnapshot =
            serde_json::from_str(&raw).expect("Failed to deserialize snapshot.");
        assert_eq!(snapshot.hands.len(), 1);
        assert_eq!(snapshot.hands[0].handedness, Handedness::Left);
        assert_eq!(snapshot.hands[0].landmarks[WRIST].y, 2.0);
    }

    #[test]
    fn test_snapshot_rejects_wrong_landmark_count() {
        let raw = r#"{"hands": [{"handedness": "Right", "landmarks": [{"x": 0.0, "y": 0.0}]}]}"#;
        assert!(serde_json::from_str::<HandSnapshot>(raw).is_err());
    }
}
