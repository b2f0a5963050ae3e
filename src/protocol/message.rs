//! Response definitions
//!
//! Represents what the server sends back for a request.

use serde::Serialize;

use super::Properties;

/// Trailing `error id=<n> msg=<text>` descriptor of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDescriptor {
    /// 0 means success
    pub id: u32,

    /// Human readable message (unescaped)
    pub message: String,

    /// Any further properties on the error line (e.g. `failed_permid`)
    pub extra: Properties,
}

impl ErrorDescriptor {
    pub fn ok() -> Self {
        Self {
            id: 0,
            message: "ok".to_string(),
            extra: Properties::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.id == 0
    }
}

impl std::fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "id={} msg={}", self.id, self.message)?;
        for (k, v) in self.extra.iter() {
            write!(f, " {}={}", k, v)?;
        }
        Ok(())
    }
}

/// A complete response: data objects plus the trailing error descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryMessage {
    pub objects: Vec<Properties>,
    pub error: ErrorDescriptor,
}

impl QueryMessage {
    pub fn new(objects: Vec<Properties>, error: ErrorDescriptor) -> Self {
        Self { objects, error }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_ok()
    }

    /// First object, which single-entity commands (`whoami`, `version`) return
    pub fn first(&self) -> Option<&Properties> {
        self.objects.first()
    }
}
