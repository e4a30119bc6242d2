//! oneM2M resource representations exchanged with the platform

use serde::{Deserialize, Serialize};

/// Resource type code of a subscription (`ty=23`)
pub const SUBSCRIPTION_RESOURCE_TYPE: u8 = 23;

/// Notification content type "whole resource representation"
pub const NOTIFICATION_CONTENT_REPRESENTATION: u8 = 2;

/// Notification event type "update of the subscribed-to resource"
pub const EVENT_TYPE_UPDATE: u8 = 3;

/// Wrapper matching the `m2m:sub` root element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEnvelope {
    #[serde(rename = "m2m:sub")]
    pub subscription: SubscriptionResource,
}

/// Subscription resource attributes sent on creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionResource {
    /// Resource name
    #[serde(rename = "rn")]
    pub resource_name: String,

    /// Notification target URIs
    #[serde(rename = "nu")]
    pub notification_uris: Vec<String>,

    /// Notification content type
    #[serde(rename = "nct")]
    pub notification_content_type: u8,

    /// Event notification criteria
    #[serde(rename = "enc")]
    pub criteria: EventNotificationCriteria,

    /// Resource identifier assigned by the platform, only present in responses
    #[serde(rename = "ri", default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

/// Restricts which events on the watched resource produce notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNotificationCriteria {
    #[serde(rename = "net")]
    pub event_types: Vec<u8>,
}

impl SubscriptionEnvelope {
    /// Body for a subscription delivering update events to `notification_uri`
    pub fn for_updates(resource_name: &str, notification_uri: String) -> Self {
        Self {
            subscription: SubscriptionResource {
                resource_name: resource_name.to_string(),
                notification_uris: vec![notification_uri],
                notification_content_type: NOTIFICATION_CONTENT_REPRESENTATION,
                criteria: EventNotificationCriteria {
                    event_types: vec![EVENT_TYPE_UPDATE],
                },
                resource_id: None,
            },
        }
    }
}
