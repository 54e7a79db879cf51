use chrono::{ DateTime, SecondsFormat, Utc };
use serde::{ Deserialize, Serialize, Serializer };
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{ Hash, Hasher };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat message between the user and the assistant.
///
/// Messages are values: appending content yields a new `Message` that keeps
/// the original `timestamp`, so a previously rendered version is never
/// changed underneath its holder.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// The `{role, content}` projection sent to the completion endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self::logged_on(role, content, Utc::now())
    }

    pub fn logged_on(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Empty assistant message that is filled in as deltas arrive.
    pub fn placeholder() -> Self {
        Self::new(Role::Assistant, "")
    }

    /// Identifier derived from the full value of the message.
    pub fn id(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    pub fn append(&self, content: &str) -> Self {
        let mut next = String::with_capacity(self.content.len() + content.len());
        next.push_str(&self.content);
        next.push_str(content);
        Self::logged_on(self.role, next, self.timestamp)
    }

    pub fn to_prompt(&self) -> PromptMessage {
        PromptMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }

    pub fn iso_timestamp(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// RFC 3339 in UTC with microsecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(ts))
}

impl fmt::Display for ChatMessage {
    /// `[<role> @ <timestamp>]` header line followed by the content.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} @ {}]\n{}", self.role, self.iso_timestamp(), self.content)
    }
}
