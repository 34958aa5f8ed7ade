//! FiRa connector message codec and administrative sub-protocol (§3, §4.6).

use strum::{Display, EnumString, FromRepr};

use super::{ByteReader, DecodeError};

/// Top two header bits of a [`FiraConnectorMessage`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, EnumString, FromRepr)]
#[repr(u8)]
pub enum MessageType {
    /// A command sent to the peer.
    Command = 0,
    /// An unsolicited event sent to the peer.
    Event = 1,
    /// A response to a previously received command.
    CommandRespond = 2,
}

/// Bottom six header bits of a [`FiraConnectorMessage`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, EnumString, FromRepr)]
#[repr(u8)]
pub enum InstructionCode {
    /// Ordinary application payload.
    DataExchange = 0,
    /// An [`AdminErrorMessage`] payload.
    ErrorIndication = 1,
}

/// A single FiRa Connector Message: the payload reassembled from a chain of
/// [`FiraConnectorDataPacket`](super::FiraConnectorDataPacket)s (§3).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FiraConnectorMessage {
    /// Message type.
    pub message_type: MessageType,
    /// Instruction code.
    pub instruction_code: InstructionCode,
    /// Message payload.
    pub payload: Vec<u8>,
}

impl FiraConnectorMessage {
    /// Encodes this message to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.payload.len());
        let header = ((self.message_type as u8) << 6) | (self.instruction_code as u8 & 0x3F);
        out.push(header);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decodes a message from its wire format.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(buf);
        let header = reader.u8()?;
        let message_type = MessageType::from_repr(header >> 6).ok_or(DecodeError::InvalidMessageType(header >> 6))?;
        let instruction_code = match header & 0x3F {
            0 => InstructionCode::DataExchange,
            1 => InstructionCode::ErrorIndication,
            // Any other instruction code is carried as DataExchange-shaped
            // application payload; only the two codes named in §3 are
            // meaningful to this crate.
            _ => InstructionCode::DataExchange,
        };
        Ok(Self { message_type, instruction_code, payload: reader.rest().to_vec() })
    }

    /// Classifies this message as an [`AdminErrorMessage`] or
    /// [`AdminEventMessage`] if its shape and payload match a recognised
    /// administrative message (§4.6).
    pub fn classify(&self) -> Option<AdminMessage> {
        match (self.message_type, self.instruction_code) {
            (MessageType::CommandRespond, InstructionCode::ErrorIndication) => {
                let code = u16::from_be_bytes(self.payload.get(0..2)?.try_into().ok()?);
                AdminErrorCode::from_repr(code).map(|code| AdminMessage::Error(AdminErrorMessage { code }))
            }
            (MessageType::Event, InstructionCode::DataExchange) => {
                let code = u16::from_be_bytes(self.payload.get(0..2)?.try_into().ok()?);
                AdminEventCode::from_repr(code).map(|code| {
                    AdminMessage::Event(AdminEventMessage { code, additional_data: self.payload[2..].to_vec() })
                })
            }
            _ => None,
        }
    }
}

/// Either of the two recognised administrative message shapes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdminMessage {
    /// See [`AdminErrorMessage`].
    Error(AdminErrorMessage),
    /// See [`AdminEventMessage`].
    Event(AdminEventMessage),
}

/// Administrative error codes recognised in an [`AdminErrorMessage`] (§3).
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, EnumString, FromRepr)]
#[repr(u16)]
pub enum AdminErrorCode {
    /// A submitted data packet exceeded `optimizedDataPacketSize`.
    DataPacketLengthOverflow = 0x8001,
    /// A reassembled message exceeded `maxMessageBufferSize`.
    MessageLengthOverflow = 0x8002,
    /// Too many SECIDs had a fragmented message in flight concurrently.
    TooManyConcurrentFragmentedSessions = 0x8003,
    /// The addressed SECID does not exist.
    SecidInvalid = 0x8004,
    /// The addressed SECID cannot be the target of a response.
    SecidInvalidForResponse = 0x8005,
    /// The addressed SECID already has a fragmented message in flight.
    SecidBusy = 0x8006,
    /// The addressed SECID reported a protocol error.
    SecidProtocolError = 0x8007,
    /// The addressed SECID reported an internal error.
    SecidInternalError = 0x8008,
}

/// An administrative error response from the peer (`CommandRespond` +
/// `ErrorIndication`, §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AdminErrorMessage {
    /// The reported error code.
    pub code: AdminErrorCode,
}

/// Administrative event codes recognised in an [`AdminEventMessage`] (§3).
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, EnumString, FromRepr)]
#[repr(u16)]
pub enum AdminEventCode {
    /// The peer's capabilities changed and should be re-read.
    CapabilitiesChanged = 0x0001,
}

/// An administrative event from the peer (`Event` + `DataExchange` with a
/// recognised event code, §3).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AdminEventMessage {
    /// The reported event code.
    pub code: AdminEventCode,
    /// Event-specific additional data, if any.
    pub additional_data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_command_message() {
        let msg = FiraConnectorMessage {
            message_type: MessageType::Command,
            instruction_code: InstructionCode::DataExchange,
            payload: vec![0x01, 0x02, 0x03],
        };
        let encoded = msg.encode();
        assert_eq!(encoded[0], 0x00);
        assert_eq!(FiraConnectorMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn round_trips_an_event_message() {
        let msg = FiraConnectorMessage {
            message_type: MessageType::Event,
            instruction_code: InstructionCode::ErrorIndication,
            payload: vec![],
        };
        let encoded = msg.encode();
        assert_eq!(encoded[0], 0b0100_0001);
        assert_eq!(FiraConnectorMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn classifies_admin_error_message() {
        let msg = FiraConnectorMessage::decode(&[0x81, 0x80, 0x04]).unwrap();
        assert_eq!(
            msg.classify(),
            Some(AdminMessage::Error(AdminErrorMessage { code: AdminErrorCode::SecidInvalid }))
        );
    }

    #[test]
    fn classifies_admin_event_message() {
        let msg = FiraConnectorMessage {
            message_type: MessageType::Event,
            instruction_code: InstructionCode::DataExchange,
            payload: vec![0x00, 0x01, 0xFF],
        };
        assert_eq!(
            msg.classify(),
            Some(AdminMessage::Event(AdminEventMessage {
                code: AdminEventCode::CapabilitiesChanged,
                additional_data: vec![0xFF]
            }))
        );
    }

    #[test]
    fn non_admin_message_does_not_classify() {
        let msg = FiraConnectorMessage {
            message_type: MessageType::Command,
            instruction_code: InstructionCode::DataExchange,
            payload: vec![0x01, 0x02],
        };
        assert_eq!(msg.classify(), None);
    }
}
