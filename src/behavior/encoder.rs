//! Behavioral vector encoder
//!
//! Layout of the 128 slots:
//!
//! | slots  | feature                              |
//! |--------|--------------------------------------|
//! | 0-23   | hour of day, one-hot                 |
//! | 24-30  | day of week, one-hot (Sunday first)  |
//! | 31-35  | action, one-hot                      |
//! | 41-45  | notification category, one-hot       |
//! | 51-60  | response latency, 6-minute buckets   |
//! | 61-64  | device, one-hot                      |
//!
//! Every other slot stays zero. The result is L2-normalized.

use crate::behavior::types::{BehaviorEvent, DeviceType, NotificationAction, NotificationCategory};
use crate::vector::l2_normalize;

/// Length of every behavioral vector
pub const BEHAVIOR_DIMENSION: usize = 128;

const DAY_OFFSET: usize = 24;
const LATENCY_OFFSET: usize = 51;
const LATENCY_BUCKETS: usize = 10;
const LATENCY_BUCKET_MINUTES: f64 = 6.0;
const MAX_LATENCY_MINUTES: f64 = 60.0;

fn action_slot(action: NotificationAction) -> usize {
    match action {
        NotificationAction::Opened => 31,
        NotificationAction::Dismissed => 32,
        NotificationAction::Snoozed => 33,
        NotificationAction::Clicked => 34,
        NotificationAction::Ignored => 35,
    }
}

fn category_slot(category: NotificationCategory) -> usize {
    match category {
        NotificationCategory::MedicationReminder => 41,
        NotificationCategory::HealthCheck => 42,
        NotificationCategory::CareGroupUpdate => 43,
        NotificationCategory::SystemAlert => 44,
        NotificationCategory::AiInsight => 45,
    }
}

fn device_slot(device: DeviceType) -> usize {
    match device {
        DeviceType::Mobile => 61,
        DeviceType::Tablet => 62,
        DeviceType::Desktop => 63,
        DeviceType::Watch => 64,
    }
}

/// Slot and pre-normalization value for a response latency.
///
/// Latency is capped at 60 minutes; the cap lands in the last bucket.
/// Non-positive latencies are not encoded.
pub fn latency_slot(minutes: f64) -> Option<(usize, f32)> {
    if !minutes.is_finite() || minutes <= 0.0 {
        return None;
    }
    let capped = minutes.min(MAX_LATENCY_MINUTES);
    let bucket = ((capped / LATENCY_BUCKET_MINUTES).floor() as usize).min(LATENCY_BUCKETS - 1);
    Some((LATENCY_OFFSET + bucket, (capped / MAX_LATENCY_MINUTES) as f32))
}

/// Encodes notification interactions into behavioral vectors
#[derive(Debug, Default, Clone, Copy)]
pub struct BehaviorEncoder;

impl BehaviorEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode one event into a normalized 128-dimension vector
    pub fn encode(&self, event: &BehaviorEvent) -> Vec<f32> {
        let mut vector = vec![0.0_f32; BEHAVIOR_DIMENSION];

        if event.hour_of_day < 24 {
            vector[event.hour_of_day as usize] = 1.0;
        }
        if event.day_of_week < 7 {
            vector[DAY_OFFSET + event.day_of_week as usize] = 1.0;
        }

        vector[action_slot(event.action)] = 1.0;
        vector[category_slot(event.category)] = 1.0;

        if let Some((slot, value)) = event.latency_minutes().and_then(latency_slot) {
            vector[slot] = value;
        }

        if let Some(device) = event.device {
            vector[device_slot(device)] = 1.0;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(hour: u32, day: u32) -> BehaviorEvent {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
        let mut event = BehaviorEvent::at(
            "user-1",
            "n-1",
            NotificationAction::Opened,
            NotificationCategory::HealthCheck,
            ts,
        );
        event.hour_of_day = hour;
        event.day_of_week = day;
        event
    }

    fn norm(vector: &[f32]) -> f32 {
        vector.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    #[test]
    fn test_one_hot_slots() {
        let encoded = BehaviorEncoder::new().encode(&event(9, 2).with_device(DeviceType::Tablet));

        let hot: Vec<usize> = encoded
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(hot, vec![9, 26, 31, 42, 62]);

        // Five equal components after normalization
        let expected = 1.0 / 5.0_f32.sqrt();
        assert!((encoded[9] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_vector_is_unit_length() {
        let encoded = BehaviorEncoder::new().encode(
            &event(23, 6)
                .with_latency_ms(13 * 60_000)
                .with_device(DeviceType::Watch),
        );
        assert_eq!(encoded.len(), BEHAVIOR_DIMENSION);
        assert!((norm(&encoded) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_time_fields_are_skipped() {
        let encoded = BehaviorEncoder::new().encode(&event(24, 7));
        assert!(encoded[..31].iter().all(|v| *v == 0.0));
        assert!((norm(&encoded) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_latency_buckets() {
        assert_eq!(latency_slot(0.0), None);
        let (slot, value) = latency_slot(3.0).unwrap();
        assert_eq!(slot, 51);
        assert!((value - 0.05).abs() < 1e-6);
        assert_eq!(latency_slot(13.0).map(|(slot, _)| slot), Some(53));
        // The cap lands in the last bucket rather than overflowing
        assert_eq!(latency_slot(60.0), Some((60, 1.0)));
        assert_eq!(latency_slot(500.0), Some((60, 1.0)));
    }

    #[test]
    fn test_unused_slots_stay_zero() {
        let encoded = BehaviorEncoder::new().encode(
            &event(0, 0)
                .with_latency_ms(59 * 60_000)
                .with_device(DeviceType::Mobile),
        );
        for slot in (36..41).chain(46..51).chain(65..BEHAVIOR_DIMENSION) {
            assert_eq!(encoded[slot], 0.0, "slot {slot}");
        }
    }
}
