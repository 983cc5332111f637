// Wire format for messages on the channel
// reason: serde_json so any serializable body survives the round trip

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ipcq_core::domain::{Message, MessageBody, SenderId};
use ipcq_core::port::TransportError;

/// Fields that travel with a message; delivery metadata is set by the receiver
#[derive(Serialize)]
struct Envelope<'a> {
    created_on: &'a DateTime<Utc>,
    sender_id: &'a Option<SenderId>,
    body: &'a MessageBody,
}

#[derive(Deserialize)]
struct OwnedEnvelope {
    created_on: DateTime<Utc>,
    sender_id: Option<SenderId>,
    body: MessageBody,
}

pub fn encode(message: &Message) -> Result<Vec<u8>, TransportError> {
    let envelope = Envelope {
        created_on: &message.created_on,
        sender_id: &message.sender_id,
        body: &message.body,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

pub fn decode(bytes: &[u8]) -> Result<Message, serde_json::Error> {
    let envelope: OwnedEnvelope = serde_json::from_slice(bytes)?;
    Ok(Message::new(
        envelope.created_on,
        envelope.sender_id,
        envelope.body,
    ))
}
