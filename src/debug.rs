//! The debug-message surface (§4.I / §6).
//!
//! The engine never decides for the caller whether a message matters: every
//! site logs through `tracing` unconditionally (so the crate is observable
//! with `RUST_LOG` alone), and additionally forwards to a per-context
//! callback when one is registered and the message passes the context's
//! severity/source/type filter.

use bitflags::bitflags;
use tracing::{debug, error, warn};

/// Where a debug message originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugSource {
    Api,
    Kernel,
}

/// What kind of condition a debug message reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugType {
    Deprecated,
    Error,
    Other,
}

/// How severe a debug message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugSeverity {
    High,
    Medium,
    Low,
    Notification,
}

bitflags! {
    /// Bitmask filter over [`DebugSource`] used when registering a callback.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugSourceMask: u8 {
        const API = 1 << 0;
        const KERNEL = 1 << 1;
    }

    /// Bitmask filter over [`DebugType`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugTypeMask: u8 {
        const DEPRECATED = 1 << 0;
        const ERROR = 1 << 1;
        const OTHER = 1 << 2;
    }

    /// Bitmask filter over [`DebugSeverity`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugSeverityMask: u8 {
        const HIGH = 1 << 0;
        const MEDIUM = 1 << 1;
        const LOW = 1 << 2;
        const NOTIFICATION = 1 << 3;
    }
}

impl From<DebugSource> for DebugSourceMask {
    fn from(value: DebugSource) -> Self {
        match value {
            DebugSource::Api => DebugSourceMask::API,
            DebugSource::Kernel => DebugSourceMask::KERNEL,
        }
    }
}

impl From<DebugType> for DebugTypeMask {
    fn from(value: DebugType) -> Self {
        match value {
            DebugType::Deprecated => DebugTypeMask::DEPRECATED,
            DebugType::Error => DebugTypeMask::ERROR,
            DebugType::Other => DebugTypeMask::OTHER,
        }
    }
}

impl From<DebugSeverity> for DebugSeverityMask {
    fn from(value: DebugSeverity) -> Self {
        match value {
            DebugSeverity::High => DebugSeverityMask::HIGH,
            DebugSeverity::Medium => DebugSeverityMask::MEDIUM,
            DebugSeverity::Low => DebugSeverityMask::LOW,
            DebugSeverity::Notification => DebugSeverityMask::NOTIFICATION,
        }
    }
}

/// A single debug event, as delivered to a registered callback.
#[derive(Debug, Clone)]
pub struct DebugMessage {
    pub source: DebugSource,
    pub r#type: DebugType,
    pub id: u32,
    pub severity: DebugSeverity,
    pub message: String,
}

type DebugCallback = Box<dyn Fn(&DebugMessage) + Send + Sync>;

/// Per-context sink: a severity/source/type filter plus an optional callback.
///
/// Every component still logs through `tracing` regardless of whether a
/// callback is registered or what the filter says — the filter only gates
/// the callback, not the crate's own log emission.
pub struct DebugSink {
    source_mask: DebugSourceMask,
    type_mask: DebugTypeMask,
    severity_mask: DebugSeverityMask,
    callback: Option<DebugCallback>,
}

impl Default for DebugSink {
    fn default() -> Self {
        Self {
            source_mask: DebugSourceMask::all(),
            type_mask: DebugTypeMask::all(),
            severity_mask: DebugSeverityMask::all(),
            callback: None,
        }
    }
}

impl DebugSink {
    pub fn set_filter(
        &mut self,
        source_mask: DebugSourceMask,
        type_mask: DebugTypeMask,
        severity_mask: DebugSeverityMask,
    ) {
        self.source_mask = source_mask;
        self.type_mask = type_mask;
        self.severity_mask = severity_mask;
    }

    pub fn set_callback(&mut self, callback: impl Fn(&DebugMessage) + Send + Sync + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Logs through `tracing` unconditionally, then forwards to the
    /// registered callback if the message passes the filter.
    pub fn emit(
        &self,
        source: DebugSource,
        r#type: DebugType,
        id: u32,
        severity: DebugSeverity,
        message: impl Into<String>,
    ) {
        let message = message.into();

        match severity {
            DebugSeverity::High => error!(target: "cutmesh_core", id, message = %message),
            DebugSeverity::Medium => warn!(target: "cutmesh_core", id, message = %message),
            DebugSeverity::Low | DebugSeverity::Notification => {
                debug!(target: "cutmesh_core", id, message = %message)
            }
        }

        if !self.source_mask.contains(source.into())
            || !self.type_mask.contains(r#type.into())
            || !self.severity_mask.contains(severity.into())
        {
            return;
        }

        if let Some(callback) = &self.callback {
            callback(&DebugMessage {
                source,
                r#type,
                id,
                severity,
                message,
            });
        }
    }
}
