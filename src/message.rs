//! Message protocol definitions
//!
//! Each frame payload is a JSON object whose top-level key selects the
//! message kind:
//!
//! ```text
//! {"USERNAME": "<name>"}
//! {"USERNAME_ACCEPTED": bool, "INFO": str?, "USER_LIST": [...]?, "MESSAGES": [...]?}
//! {"MESSAGES": [[sender, audience, unix_ts, body], ...]}
//! {"USERS_JOINED": [name, ...]}
//! {"USERS_LEFT": [name, ...]}
//! {"ERROR": str}
//! ```
//!
//! `MESSAGES` appears both in registration acks and in chat batches, so the
//! ack is recognized first by its `USERNAME_ACCEPTED` key. Any other key is
//! kept as [`Message::Unknown`] so the caller can log and drop it.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::AppError;
use crate::types::Audience;

const USERNAME: &str = "USERNAME";
const USERNAME_ACCEPTED: &str = "USERNAME_ACCEPTED";
const MESSAGES: &str = "MESSAGES";
const USERS_JOINED: &str = "USERS_JOINED";
const USERS_LEFT: &str = "USERS_LEFT";
const ERROR: &str = "ERROR";

/// One chat entry: `[sender, audience, timestamp, body]` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(String, String, i64, String)",
    into = "(String, String, i64, String)"
)]
pub struct ChatMessage {
    pub sender: String,
    pub audience: String,
    /// Unix timestamp in seconds, as supplied by the sending client
    pub timestamp: i64,
    pub body: String,
}

impl ChatMessage {
    pub fn new(
        sender: impl Into<String>,
        audience: impl Into<String>,
        timestamp: i64,
        body: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            audience: audience.into(),
            timestamp,
            body: body.into(),
        }
    }

    /// Parsed audience selector
    pub fn audience(&self) -> Audience {
        Audience::parse(&self.audience)
    }
}

impl From<(String, String, i64, String)> for ChatMessage {
    fn from((sender, audience, timestamp, body): (String, String, i64, String)) -> Self {
        Self {
            sender,
            audience,
            timestamp,
            body,
        }
    }
}

impl From<ChatMessage> for (String, String, i64, String) {
    fn from(msg: ChatMessage) -> Self {
        (msg.sender, msg.audience, msg.timestamp, msg.body)
    }
}

/// Entry of the `USER_LIST` sent with a successful registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    pub name: String,
    pub active: bool,
}

/// Answer to a `USERNAME` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAck {
    #[serde(rename = "USERNAME_ACCEPTED")]
    pub accepted: bool,
    #[serde(rename = "INFO", default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(rename = "USER_LIST", default, skip_serializing_if = "Option::is_none")]
    pub user_list: Option<Vec<UserStatus>>,
    #[serde(rename = "MESSAGES", default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ChatMessage>>,
}

impl RegisterAck {
    /// Successful registration carrying the roster and history replay
    pub fn accepted(
        info: impl Into<String>,
        user_list: Vec<UserStatus>,
        history: Vec<ChatMessage>,
    ) -> Self {
        Self {
            accepted: true,
            info: Some(info.into()),
            user_list: Some(user_list),
            history: Some(history),
        }
    }

    /// Negative acknowledgment; the session stays anonymous
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            info: Some(reason.into()),
            user_list: None,
            history: None,
        }
    }
}

/// A protocol message, in either direction
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Claim a username (client → server)
    Register(String),
    /// Registration outcome (server → client)
    RegisterAck(RegisterAck),
    /// Batch of chat entries (both directions)
    Chat(Vec<ChatMessage>),
    /// Users that came online
    UsersJoined(Vec<String>),
    /// Users that went offline
    UsersLeft(Vec<String>),
    /// Non-fatal error report
    Error(String),
    /// Unrecognized top-level key, kept for logging
    Unknown(String, Value),
}

impl Message {
    /// Decode a frame payload
    pub fn from_slice(payload: &[u8]) -> Result<Self, AppError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Encode into a frame payload
    pub fn to_vec(&self) -> Result<Vec<u8>, AppError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Short name of the variant, for logs
    pub fn kind(&self) -> &str {
        match self {
            Message::Register(_) => USERNAME,
            Message::RegisterAck(_) => USERNAME_ACCEPTED,
            Message::Chat(_) => MESSAGES,
            Message::UsersJoined(_) => USERS_JOINED,
            Message::UsersLeft(_) => USERS_LEFT,
            Message::Error(_) => ERROR,
            Message::Unknown(key, _) => key,
        }
    }
}

/// Convert AppError to Message for client notification
impl From<AppError> for Message {
    fn from(err: AppError) -> Self {
        let text = match &err {
            AppError::UsernameRequired => {
                "You must register a username before sending messages".to_string()
            }
            AppError::AlreadyRegistered(name) => {
                format!("You are already registered as {}", name)
            }
            AppError::UnknownAudience(_) => {
                "Specified username does not exist (or at least is not online)".to_string()
            }
            AppError::Json(e) => format!("Invalid message format: {}", e),
            // Fatal errors are not typically converted (connection closes)
            _ => "Internal error".to_string(),
        };
        Message::Error(text)
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        fn single<S: Serializer, V: Serialize + ?Sized>(
            serializer: S,
            key: &str,
            value: &V,
        ) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry(key, value)?;
            map.end()
        }

        match self {
            Message::Register(name) => single(serializer, USERNAME, name),
            Message::RegisterAck(ack) => ack.serialize(serializer),
            Message::Chat(messages) => single(serializer, MESSAGES, messages),
            Message::UsersJoined(names) => single(serializer, USERS_JOINED, names),
            Message::UsersLeft(names) => single(serializer, USERS_LEFT, names),
            Message::Error(text) => single(serializer, ERROR, text),
            Message::Unknown(key, value) => single(serializer, key, value),
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = serde_json::Map::<String, Value>::deserialize(deserializer)?;

        if map.contains_key(USERNAME_ACCEPTED) {
            return serde_json::from_value(Value::Object(map))
                .map(Message::RegisterAck)
                .map_err(D::Error::custom);
        }

        // Recognized keys are tried in this order, whatever order the object
        // arrived in; remaining keys are ignored
        let recognized = [USERNAME, MESSAGES, USERS_JOINED, USERS_LEFT, ERROR];
        let key = recognized
            .iter()
            .find(|key| map.contains_key(**key))
            .map(|key| key.to_string())
            .or_else(|| map.keys().next().cloned())
            .ok_or_else(|| D::Error::custom("empty message object"))?;
        let value = map.remove(&key).unwrap_or(Value::Null);

        let message = match key.as_str() {
            USERNAME => Message::Register(serde_json::from_value(value).map_err(D::Error::custom)?),
            MESSAGES => Message::Chat(serde_json::from_value(value).map_err(D::Error::custom)?),
            USERS_JOINED => {
                Message::UsersJoined(serde_json::from_value(value).map_err(D::Error::custom)?)
            }
            USERS_LEFT => {
                Message::UsersLeft(serde_json::from_value(value).map_err(D::Error::custom)?)
            }
            ERROR => Message::Error(serde_json::from_value(value).map_err(D::Error::custom)?),
            _ => Message::Unknown(key, value),
        };
        Ok(message)
    }
}
