//! Notification envelope codec
//!
//! Mobius wraps every notification in a request primitive whose `pc` (primitive
//! content) holds an `m2m:sgn` notification. Only two values are of interest:
//!
//! - `pc.m2m:sgn.nev.rep.m2m:cin.con`: the content of the created content instance
//! - `pc.m2m:sgn.sur`: the subscription resource that triggered the notification
//!
//! Either may be missing without failing the decode. Only a payload that is not
//! a JSON document at all is rejected.

use serde_json::Value;

use crate::error::{Result, StreamError};

const CONTENT_POINTER: &str = "/pc/m2m:sgn/nev/rep/m2m:cin/con";
const SUBSCRIPTION_RESOURCE_POINTER: &str = "/pc/m2m:sgn/sur";
const VERIFICATION_POINTER: &str = "/pc/m2m:sgn/vrq";

/// Decoded view of one notification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationEnvelope {
    /// Changed content value, if present
    pub content: Option<Value>,
    /// Identifier of the subscription resource that produced the notification
    pub subscription_resource: Option<String>,
    /// Set for the verification notification sent right after creation
    pub verification_request: bool,
}

impl NotificationEnvelope {
    /// Content as a string slice when the platform delivered a JSON string
    pub fn content_str(&self) -> Option<&str> {
        self.content.as_ref().and_then(Value::as_str)
    }

    /// True if neither field could be extracted
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.subscription_resource.is_none()
    }
}

/// Decode a raw notification payload.
///
/// # Errors
/// [`StreamError::MalformedPayload`] if `raw` is not a JSON document.
pub fn decode(raw: &[u8]) -> Result<NotificationEnvelope> {
    let document: Value =
        serde_json::from_slice(raw).map_err(|e| StreamError::MalformedPayload(e.to_string()))?;

    let content = document
        .pointer(CONTENT_POINTER)
        .filter(|value| !value.is_null())
        .cloned();

    let subscription_resource = document
        .pointer(SUBSCRIPTION_RESOURCE_POINTER)
        .and_then(Value::as_str)
        .map(str::to_string);

    let verification_request = document
        .pointer(VERIFICATION_POINTER)
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(NotificationEnvelope {
        content,
        subscription_resource,
        verification_request,
    })
}
