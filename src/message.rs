//! Validated MQTT message values
//!
//! A [`Message`] is immutable after construction: topic, payload, quality of
//! service and retain flag are checked up front so that the transport never
//! sees a malformed publish. Publishing borrows the message; the creator keeps
//! ownership and the value is reclaimed when it goes out of scope.

use thiserror::Error;

/// MQTT delivery-guarantee level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    /// Fire and forget.
    AtMostOnce,
    /// Acknowledged delivery, duplicates possible.
    AtLeastOnce,
    /// Assured single delivery.
    ExactlyOnce,
}

impl QosLevel {
    pub fn value(self) -> u8 {
        match self {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QosLevel {
    type Error = MessageError;

    fn try_from(qos: u8) -> Result<Self, MessageError> {
        match qos {
            0 => Ok(QosLevel::AtMostOnce),
            1 => Ok(QosLevel::AtLeastOnce),
            2 => Ok(QosLevel::ExactlyOnce),
            other => Err(MessageError::QosOutOfRange(other)),
        }
    }
}

/// Message construction errors. These indicate caller bugs and are never
/// retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message topic must not be empty")]
    EmptyTopic,
    #[error("message payload must not be empty")]
    EmptyPayload,
    #[error("quality of service must be 0, 1 or 2, got {0}")]
    QosOutOfRange(u8),
}

/// An immutable publishable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    topic: String,
    payload: String,
    qos: QosLevel,
    retain: bool,
}

impl Message {
    /// Build a message, validating every field before anything is copied.
    pub fn new(topic: &str, payload: &str, qos: u8, retain: bool) -> Result<Self, MessageError> {
        if topic.is_empty() {
            return Err(MessageError::EmptyTopic);
        }
        if payload.is_empty() {
            return Err(MessageError::EmptyPayload);
        }
        let qos = QosLevel::try_from(qos)?;

        Ok(Self {
            topic: topic.to_owned(),
            payload: payload.to_owned(),
            qos,
            retain,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn qos(&self) -> QosLevel {
        self.qos
    }

    pub fn retain(&self) -> bool {
        self.retain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_topic() {
        assert_eq!(
            Message::new("", "x", 0, false).unwrap_err(),
            MessageError::EmptyTopic
        );
    }

    #[test]
    fn rejects_empty_payload() {
        assert_eq!(
            Message::new("t", "", 0, false).unwrap_err(),
            MessageError::EmptyPayload
        );
    }

    #[test]
    fn rejects_out_of_range_qos() {
        assert_eq!(
            Message::new("t", "x", 3, false).unwrap_err(),
            MessageError::QosOutOfRange(3)
        );
    }

    #[test]
    fn valid_message_round_trips_all_fields() {
        let msg = Message::new("t/p", "42", 2, false).unwrap();
        assert_eq!(msg.topic(), "t/p");
        assert_eq!(msg.payload(), "42");
        assert_eq!(msg.qos(), QosLevel::ExactlyOnce);
        assert!(!msg.retain());
    }

    #[test]
    fn retain_flag_is_preserved() {
        let msg = Message::new("status", "online", 1, true).unwrap();
        assert!(msg.retain());
        assert_eq!(msg.qos(), QosLevel::AtLeastOnce);
    }

    #[test]
    fn qos_levels_map_to_wire_values() {
        assert_eq!(QosLevel::AtMostOnce.value(), 0);
        assert_eq!(QosLevel::AtLeastOnce.value(), 1);
        assert_eq!(QosLevel::ExactlyOnce.value(), 2);
        assert_eq!(QosLevel::try_from(1).unwrap(), QosLevel::AtLeastOnce);
        assert!(QosLevel::try_from(7).is_err());
    }
}
