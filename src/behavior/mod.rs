//! Notification behavior encoding
//!
//! Turns a user's reaction to a notification into a fixed 128-dimension
//! vector so similar reactions can be found through the behavioral index.

pub mod encoder;
pub mod types;

pub use encoder::{BehaviorEncoder, BEHAVIOR_DIMENSION};
pub use types::{
    BehaviorEvent, BehaviorMetadata, DeviceType, NotificationAction, NotificationCategory,
};
