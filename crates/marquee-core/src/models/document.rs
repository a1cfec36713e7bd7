use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Document namespaces. Keys are unique within a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentNamespace {
    Json,
    Text,
}

impl DocumentNamespace {
    pub fn dir(&self) -> &'static str {
        match self {
            DocumentNamespace::Json => "json",
            DocumentNamespace::Text => "text",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentNamespace::Json => "json",
            DocumentNamespace::Text => "txt",
        }
    }
}

impl fmt::Display for DocumentNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir())
    }
}

impl FromStr for DocumentNamespace {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(DocumentNamespace::Json),
            "text" => Ok(DocumentNamespace::Text),
            other => Err(AppError::InvalidInput(format!(
                "Unknown document namespace '{}'",
                other
            ))),
        }
    }
}
