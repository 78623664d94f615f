//! Layered error definitions
//!
//! Categorized by source: wiring / config / general.
//! Synchronization defects are not represented here: they are corrupted
//! invariants and abort via assertion instead of being returned.

use thiserror::Error;

use crate::{ChannelName, GroupId};

/// Unified error type
#[derive(Debug, Error)]
pub enum EngineError {
    // ===== Wiring Errors =====
    /// Channel payload type is not accepted by the subscribing node
    #[error("node '{node}' does not accept payload type {payload} of channel '{channel}'")]
    TypeMismatch {
        node: String,
        channel: ChannelName,
        payload: &'static str,
    },

    /// Two outputs of one node share a name
    #[error("duplicate channel '{channel}' on node '{node}'")]
    DuplicateChannel { node: String, channel: ChannelName },

    /// Output channel lookup failed
    #[error("node '{node}' has no output channel '{channel}'")]
    UnknownChannel { node: String, channel: ChannelName },

    /// Channel ring depth differs from the graph's
    #[error("channel '{channel}' has ring depth {depth}, node '{node}' expects {expected}")]
    DepthMismatch {
        node: String,
        channel: ChannelName,
        depth: usize,
        expected: usize,
    },

    /// A node already joins its inputs under another group
    #[error("node '{node}' already joins group {existing}, cannot add group {requested}")]
    GroupConflict {
        node: String,
        existing: GroupId,
        requested: GroupId,
    },

    /// Node handle does not resolve in the graph
    #[error("unknown node #{0}")]
    UnknownNode(usize),

    /// Disconnect of a channel the node never subscribed to
    #[error("node '{node}' is not subscribed to channel '{channel}' (group {group})")]
    NotSubscribed {
        node: String,
        channel: ChannelName,
        group: GroupId,
    },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Create type mismatch error
    pub fn type_mismatch(
        node: impl Into<String>,
        channel: ChannelName,
        payload: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            node: node.into(),
            channel,
            payload,
        }
    }

    /// Create duplicate channel error
    pub fn duplicate_channel(node: impl Into<String>, channel: ChannelName) -> Self {
        Self::DuplicateChannel {
            node: node.into(),
            channel,
        }
    }

    /// Create unknown channel error
    pub fn unknown_channel(node: impl Into<String>, channel: impl Into<ChannelName>) -> Self {
        Self::UnknownChannel {
            node: node.into(),
            channel: channel.into(),
        }
    }

    /// Create ring depth mismatch error
    pub fn depth_mismatch(
        node: impl Into<String>,
        channel: ChannelName,
        depth: usize,
        expected: usize,
    ) -> Self {
        Self::DepthMismatch {
            node: node.into(),
            channel,
            depth,
            expected,
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for errors raised while wiring a graph
    pub fn is_wiring(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. }
                | Self::DuplicateChannel { .. }
                | Self::UnknownChannel { .. }
                | Self::DepthMismatch { .. }
                | Self::GroupConflict { .. }
                | Self::UnknownNode(_)
                | Self::NotSubscribed { .. }
        )
    }
}
