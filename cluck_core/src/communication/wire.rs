//! Wire format for Cluck messages.
//!
//! Every payload starts with a single tag byte selecting the protocol; all
//! multi-byte numeric fields are big-endian. The router itself only ever
//! peeks at the tag byte; full decoding happens once, at the subscriber
//! dispatch boundary, into the closed [`CluckMessage`] type so every bridge
//! can match exhaustively.

use crate::channel::LogLevel;
use thiserror::Error;

/// The closed tag space. One byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageTag {
    Ping = 0,
    EventFire = 1,
    EventSubscribe = 2,
    EventResponse = 3,
    Log = 4,
    BoolSubscribe = 5,
    BoolResponse = 6,
    BoolWrite = 7,
    FloatSubscribe = 8,
    FloatResponse = 9,
    FloatWrite = 10,
    StreamChunk = 11,
    TopologyNotify = 12,
    Invoke = 13,
    InvokeReply = 14,
    NegativeAck = 15,
}

impl MessageTag {
    pub fn from_u8(byte: u8) -> Option<MessageTag> {
        match byte {
            0 => Some(MessageTag::Ping),
            1 => Some(MessageTag::EventFire),
            2 => Some(MessageTag::EventSubscribe),
            3 => Some(MessageTag::EventResponse),
            4 => Some(MessageTag::Log),
            5 => Some(MessageTag::BoolSubscribe),
            6 => Some(MessageTag::BoolResponse),
            7 => Some(MessageTag::BoolWrite),
            8 => Some(MessageTag::FloatSubscribe),
            9 => Some(MessageTag::FloatResponse),
            10 => Some(MessageTag::FloatWrite),
            11 => Some(MessageTag::StreamChunk),
            12 => Some(MessageTag::TopologyNotify),
            13 => Some(MessageTag::Invoke),
            14 => Some(MessageTag::InvokeReply),
            15 => Some(MessageTag::NegativeAck),
            _ => None,
        }
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            MessageTag::Ping => "Ping",
            MessageTag::EventFire => "EventFire",
            MessageTag::EventSubscribe => "EventSubscribe",
            MessageTag::EventResponse => "EventResponse",
            MessageTag::Log => "Log",
            MessageTag::BoolSubscribe => "BoolSubscribe",
            MessageTag::BoolResponse => "BoolResponse",
            MessageTag::BoolWrite => "BoolWrite",
            MessageTag::FloatSubscribe => "FloatSubscribe",
            MessageTag::FloatResponse => "FloatResponse",
            MessageTag::FloatWrite => "FloatWrite",
            MessageTag::StreamChunk => "StreamChunk",
            MessageTag::TopologyNotify => "TopologyNotify",
            MessageTag::Invoke => "Invoke",
            MessageTag::InvokeReply => "InvokeReply",
            MessageTag::NegativeAck => "NegativeAck",
        }
    }
}

/// Describe the leading tag of a raw payload, for trace logging.
pub fn describe_payload(data: &[u8]) -> &'static str {
    match data.first() {
        None => "(empty)",
        Some(&byte) => match MessageTag::from_u8(byte) {
            Some(tag) => tag.name(),
            None => "(unknown tag)",
        },
    }
}

/// Errors from [`CluckMessage::decode`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("empty payload")]
    Empty,
    #[error("unknown message tag {0}")]
    UnknownTag(u8),
    #[error("{0} payload too short")]
    Truncated(&'static str),
    #[error("log field lengths inconsistent with payload size")]
    BadLogFraming,
    #[error("unknown log level byte {0}")]
    BadLogLevel(i8),
}

/// A fully decoded Cluck message.
#[derive(Debug, Clone, PartialEq)]
pub enum CluckMessage {
    Ping,
    PingReply { role: u8 },
    EventFire,
    EventSubscribe,
    EventResponse,
    Log {
        level: LogLevel,
        message: String,
        extended: Option<String>,
    },
    BoolSubscribe,
    BoolResponse(bool),
    BoolWrite(bool),
    FloatSubscribe,
    FloatResponse(f32),
    FloatWrite(f32),
    StreamChunk(Vec<u8>),
    TopologyNotify,
    Invoke(Vec<u8>),
    InvokeReply(Vec<u8>),
    NegativeAck,
}

impl CluckMessage {
    /// The tag this message carries on the wire.
    pub fn tag(&self) -> MessageTag {
        match self {
            CluckMessage::Ping | CluckMessage::PingReply { .. } => MessageTag::Ping,
            CluckMessage::EventFire => MessageTag::EventFire,
            CluckMessage::EventSubscribe => MessageTag::EventSubscribe,
            CluckMessage::EventResponse => MessageTag::EventResponse,
            CluckMessage::Log { .. } => MessageTag::Log,
            CluckMessage::BoolSubscribe => MessageTag::BoolSubscribe,
            CluckMessage::BoolResponse(_) => MessageTag::BoolResponse,
            CluckMessage::BoolWrite(_) => MessageTag::BoolWrite,
            CluckMessage::FloatSubscribe => MessageTag::FloatSubscribe,
            CluckMessage::FloatResponse(_) => MessageTag::FloatResponse,
            CluckMessage::FloatWrite(_) => MessageTag::FloatWrite,
            CluckMessage::StreamChunk(_) => MessageTag::StreamChunk,
            CluckMessage::TopologyNotify => MessageTag::TopologyNotify,
            CluckMessage::Invoke(_) => MessageTag::Invoke,
            CluckMessage::InvokeReply(_) => MessageTag::InvokeReply,
            CluckMessage::NegativeAck => MessageTag::NegativeAck,
        }
    }

    /// Decode a raw payload. Trailing garbage after a fixed-size body is
    /// tolerated; a short body is not.
    pub fn decode(data: &[u8]) -> Result<CluckMessage, WireError> {
        let tag_byte = *data.first().ok_or(WireError::Empty)?;
        let tag = MessageTag::from_u8(tag_byte).ok_or(WireError::UnknownTag(tag_byte))?;
        let body = &data[1..];
        match tag {
            MessageTag::Ping => match body.first() {
                None => Ok(CluckMessage::Ping),
                Some(&role) => Ok(CluckMessage::PingReply { role }),
            },
            MessageTag::EventFire => Ok(CluckMessage::EventFire),
            MessageTag::EventSubscribe => Ok(CluckMessage::EventSubscribe),
            MessageTag::EventResponse => Ok(CluckMessage::EventResponse),
            MessageTag::Log => decode_log(body),
            MessageTag::BoolSubscribe => Ok(CluckMessage::BoolSubscribe),
            MessageTag::BoolResponse => match body.first() {
                Some(&b) => Ok(CluckMessage::BoolResponse(b != 0)),
                None => Err(WireError::Truncated("boolean response")),
            },
            MessageTag::BoolWrite => match body.first() {
                Some(&b) => Ok(CluckMessage::BoolWrite(b != 0)),
                None => Err(WireError::Truncated("boolean write")),
            },
            MessageTag::FloatSubscribe => Ok(CluckMessage::FloatSubscribe),
            MessageTag::FloatResponse => {
                decode_f32(body, "float response").map(CluckMessage::FloatResponse)
            }
            MessageTag::FloatWrite => decode_f32(body, "float write").map(CluckMessage::FloatWrite),
            MessageTag::StreamChunk => Ok(CluckMessage::StreamChunk(body.to_vec())),
            MessageTag::TopologyNotify => Ok(CluckMessage::TopologyNotify),
            MessageTag::Invoke => Ok(CluckMessage::Invoke(body.to_vec())),
            MessageTag::InvokeReply => Ok(CluckMessage::InvokeReply(body.to_vec())),
            MessageTag::NegativeAck => Ok(CluckMessage::NegativeAck),
        }
    }

    /// Encode into the wire layout.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            CluckMessage::Ping => vec![MessageTag::Ping as u8],
            CluckMessage::PingReply { role } => vec![MessageTag::Ping as u8, *role],
            CluckMessage::EventFire => vec![MessageTag::EventFire as u8],
            CluckMessage::EventSubscribe => vec![MessageTag::EventSubscribe as u8],
            CluckMessage::EventResponse => vec![MessageTag::EventResponse as u8],
            CluckMessage::Log {
                level,
                message,
                extended,
            } => encode_log(*level, message, extended.as_deref()),
            CluckMessage::BoolSubscribe => vec![MessageTag::BoolSubscribe as u8],
            CluckMessage::BoolResponse(v) => vec![MessageTag::BoolResponse as u8, *v as u8],
            CluckMessage::BoolWrite(v) => vec![MessageTag::BoolWrite as u8, *v as u8],
            CluckMessage::FloatSubscribe => vec![MessageTag::FloatSubscribe as u8],
            CluckMessage::FloatResponse(v) => encode_f32(MessageTag::FloatResponse, *v),
            CluckMessage::FloatWrite(v) => encode_f32(MessageTag::FloatWrite, *v),
            CluckMessage::StreamChunk(bytes) => prefixed(MessageTag::StreamChunk, bytes),
            CluckMessage::TopologyNotify => vec![MessageTag::TopologyNotify as u8],
            CluckMessage::Invoke(bytes) => prefixed(MessageTag::Invoke, bytes),
            CluckMessage::InvokeReply(bytes) => prefixed(MessageTag::InvokeReply, bytes),
            CluckMessage::NegativeAck => vec![MessageTag::NegativeAck as u8],
        }
    }
}

fn prefixed(tag: MessageTag, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + bytes.len());
    out.push(tag as u8);
    out.extend_from_slice(bytes);
    out
}

fn encode_f32(tag: MessageTag, value: f32) -> Vec<u8> {
    let mut out = vec![tag as u8];
    out.extend_from_slice(&value.to_bits().to_be_bytes());
    out
}

fn decode_f32(body: &[u8], what: &'static str) -> Result<f32, WireError> {
    let raw: [u8; 4] = body
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(WireError::Truncated(what))?;
    Ok(f32::from_bits(u32::from_be_bytes(raw)))
}

/// Layout after the tag byte: level byte, message length (u32 BE), extended
/// length (u32 BE), message bytes, extended bytes.
fn encode_log(level: LogLevel, message: &str, extended: Option<&str>) -> Vec<u8> {
    let msg = message.as_bytes();
    let ext = extended.map(str::as_bytes).unwrap_or(&[]);
    let mut out = Vec::with_capacity(10 + msg.len() + ext.len());
    out.push(MessageTag::Log as u8);
    out.push(level.to_byte() as u8);
    out.extend_from_slice(&(msg.len() as u32).to_be_bytes());
    out.extend_from_slice(&(ext.len() as u32).to_be_bytes());
    out.extend_from_slice(msg);
    out.extend_from_slice(ext);
    out
}

fn decode_log(body: &[u8]) -> Result<CluckMessage, WireError> {
    if body.len() < 9 {
        return Err(WireError::Truncated("log"));
    }
    let level_byte = body[0] as i8;
    let level = LogLevel::from_byte(level_byte).ok_or(WireError::BadLogLevel(level_byte))?;
    let msg_len = u32::from_be_bytes([body[1], body[2], body[3], body[4]]) as u64;
    let mut ext_len = u32::from_be_bytes([body[5], body[6], body[7], body[8]]) as u64;
    let avail = (body.len() - 9) as u64;
    if msg_len + ext_len > avail {
        // Tolerate a bad extended length if the message portion alone is
        // consistent; otherwise the record is unusable.
        if msg_len <= avail {
            ext_len = 0;
        } else {
            return Err(WireError::BadLogFraming);
        }
    }
    let msg_end = 9 + msg_len as usize;
    let message = String::from_utf8_lossy(&body[9..msg_end]).into_owned();
    let extended = if ext_len == 0 {
        None
    } else {
        Some(String::from_utf8_lossy(&body[msg_end..msg_end + ext_len as usize]).into_owned())
    };
    Ok(CluckMessage::Log {
        level,
        message,
        extended,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_space_round_trip() {
        for byte in 0u8..=15 {
            let tag = MessageTag::from_u8(byte).unwrap();
            assert_eq!(tag as u8, byte);
        }
        assert_eq!(MessageTag::from_u8(16), None);
    }

    #[test]
    fn test_float_write_layout_is_big_endian() {
        let encoded = CluckMessage::FloatWrite(1.0).encode();
        assert_eq!(encoded, vec![10, 0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(
            CluckMessage::decode(&encoded).unwrap(),
            CluckMessage::FloatWrite(1.0)
        );
    }

    #[test]
    fn test_bool_response_layout() {
        assert_eq!(CluckMessage::BoolResponse(true).encode(), vec![6, 1]);
        assert_eq!(
            CluckMessage::decode(&[6, 1]).unwrap(),
            CluckMessage::BoolResponse(true)
        );
        assert_eq!(
            CluckMessage::decode(&[6]),
            Err(WireError::Truncated("boolean response"))
        );
    }

    #[test]
    fn test_ping_and_reply() {
        assert_eq!(CluckMessage::decode(&[0]).unwrap(), CluckMessage::Ping);
        assert_eq!(
            CluckMessage::decode(&[0, 7]).unwrap(),
            CluckMessage::PingReply { role: 7 }
        );
    }

    #[test]
    fn test_log_round_trip() {
        let msg = CluckMessage::Log {
            level: LogLevel::Warning,
            message: "motor stalled".into(),
            extended: Some("detail".into()),
        };
        assert_eq!(CluckMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn test_log_bad_extended_length_truncates_extended() {
        let mut encoded = CluckMessage::Log {
            level: LogLevel::Info,
            message: "hello".into(),
            extended: None,
        }
        .encode();
        // Claim a huge extended field that is not actually present.
        encoded[6..10].copy_from_slice(&500u32.to_be_bytes());
        match CluckMessage::decode(&encoded).unwrap() {
            CluckMessage::Log {
                message, extended, ..
            } => {
                assert_eq!(message, "hello");
                assert_eq!(extended, None);
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn test_log_bad_message_length_is_rejected() {
        let mut encoded = CluckMessage::Log {
            level: LogLevel::Info,
            message: "hello".into(),
            extended: None,
        }
        .encode();
        encoded[2..6].copy_from_slice(&500u32.to_be_bytes());
        assert_eq!(
            CluckMessage::decode(&encoded),
            Err(WireError::BadLogFraming)
        );
    }

    #[test]
    fn test_stream_chunk_carries_raw_bytes() {
        let msg = CluckMessage::StreamChunk(vec![1, 2, 3]);
        assert_eq!(msg.encode(), vec![11, 1, 2, 3]);
        assert_eq!(CluckMessage::decode(&[11]).unwrap(), CluckMessage::StreamChunk(vec![]));
    }

    #[test]
    fn test_unknown_tag_and_empty() {
        assert_eq!(CluckMessage::decode(&[]), Err(WireError::Empty));
        assert_eq!(CluckMessage::decode(&[99]), Err(WireError::UnknownTag(99)));
    }
}
