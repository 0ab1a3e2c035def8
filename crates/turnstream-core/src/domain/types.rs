use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn from_string(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Conversation thread; replaced on every reset.
    ThreadId
);
string_id!(
    /// One request/response cycle within a thread.
    TurnId
);
string_id!(MessageId);
string_id!(FragmentId);
string_id!(StepId);
string_id!(
    /// Correlation key assigned by the remote agent. Opaque: never parse it.
    ToolCallId
);

impl ThreadId {
    pub fn new() -> Self {
        Self(format!("thread_{}", Uuid::now_v7().as_simple()))
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

/// Text that is guaranteed to contain something other than whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Trims the input and rejects it when nothing is left.
    pub fn new(value: impl AsRef<str>) -> Option<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces identifiers for messages, reasoning fragments, steps and turns.
///
/// Ids are `<kind>_<namespace>_<counter>`. The namespace is a UUIDv7 chosen
/// once per generator, so ids never collide within a process, while a
/// generator built with a fixed namespace yields the same sequence on every
/// run. The generator lives inside [`TurnState`](super::state::TurnState),
/// which keeps replays of the reducer byte-for-byte identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdGenerator {
    namespace: String,
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_namespace(Uuid::now_v7().as_simple().to_string())
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            next: 0,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn next_raw(&mut self, kind: &str) -> String {
        self.next += 1;
        format!("{kind}_{}_{}", self.namespace, self.next)
    }

    pub fn message_id(&mut self) -> MessageId {
        MessageId(self.next_raw("msg"))
    }

    pub fn fragment_id(&mut self) -> FragmentId {
        FragmentId(self.next_raw("frag"))
    }

    pub fn step_id(&mut self) -> StepId {
        StepId(self.next_raw("step"))
    }

    pub fn turn_id(&mut self) -> TurnId {
        TurnId(self.next_raw("turn"))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
