use std::fmt;
use std::path::Path;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::utils::{QueueError, QueueResult};

/// The image tools that run batches through a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    Convert,
    MetadataRemoval,
    Base64,
    BackgroundRemoval,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        Self::Convert,
        Self::MetadataRemoval,
        Self::Base64,
        Self::BackgroundRemoval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Convert => "convert",
            Self::MetadataRemoval => "metadata-removal",
            Self::Base64 => "base64",
            Self::BackgroundRemoval => "background-removal",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "convert" | "converter" => Ok(Self::Convert),
            "metadata-removal" | "metadata" | "exif" => Ok(Self::MetadataRemoval),
            "base64" => Ok(Self::Base64),
            "background-removal" | "background" | "bg" => Ok(Self::BackgroundRemoval),
            other => Err(QueueError::config(format!("Unknown tool: {}", other))),
        }
    }
}

/// Per-tool concurrency caps.
///
/// Each tool configures its own cap; there is no shared default between them.
/// Background removal runs one model invocation at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    pub convert: usize,
    pub metadata_removal: usize,
    pub base64: usize,
    pub background_removal: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            convert: 3,
            metadata_removal: 2,
            base64: 2,
            background_removal: 1,
        }
    }
}

impl QueueConfig {
    pub fn concurrency_for(&self, tool: ToolKind) -> usize {
        match tool {
            ToolKind::Convert => self.convert,
            ToolKind::MetadataRemoval => self.metadata_removal,
            ToolKind::Base64 => self.base64,
            ToolKind::BackgroundRemoval => self.background_removal,
        }
    }

    pub fn set_concurrency(&mut self, tool: ToolKind, max_concurrent: usize) {
        let slot = match tool {
            ToolKind::Convert => &mut self.convert,
            ToolKind::MetadataRemoval => &mut self.metadata_removal,
            ToolKind::Base64 => &mut self.base64,
            ToolKind::BackgroundRemoval => &mut self.background_removal,
        };
        *slot = max_concurrent;
    }

    /// Rejects any tool configured with a zero cap.
    pub fn validate(&self) -> QueueResult<()> {
        for tool in ToolKind::ALL {
            if self.concurrency_for(tool) == 0 {
                return Err(QueueError::config(format!(
                    "Concurrency for {} must be at least 1",
                    tool
                )));
            }
        }
        Ok(())
    }

    /// Parses and validates a JSON config. Missing tools keep their defaults.
    pub fn from_json(json: &str) -> QueueResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> QueueResult<Self> {
        let path = path.as_ref();
        debug!("Loading queue config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}
