//! Error Types
//!
//! This module defines the error types used throughout the compositor.
//!
//! # Overview
//!
//! The main error type [`PostFxError`] covers all failure modes including:
//! - GPU initialization failures
//! - Render target allocation failures (resource exhaustion)
//! - Missing platform capabilities (depth sharing)
//! - Shader template and asset loading errors
//!
//! Only resource exhaustion and capability errors are expected at runtime;
//! the [`Compositor`](crate::renderer::Compositor) recovers from both by
//! keeping the last good render targets or by switching to a degraded
//! pipeline variant.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, PostFxError>`.

use thiserror::Error;

/// The main error type for the post-processing compositor.
#[derive(Error, Debug)]
pub enum PostFxError {
    // ========================================================================
    // GPU & Context Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create a presentation surface for the window.
    #[error("Failed to create surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),

    /// The surface could not provide a frame to render into.
    #[error("Surface frame unavailable: {0}")]
    SurfaceUnavailable(String),

    // ========================================================================
    // Render Target Errors
    // ========================================================================
    /// A render target could not be allocated.
    #[error("Render target '{label}' allocation failed at {width}x{height}: {reason}")]
    ResourceExhausted {
        /// Label of the target that failed
        label: &'static str,
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Backend-specific reason
        reason: String,
    },

    /// Zero-sized viewport.
    #[error("Invalid render target extent {width}x{height}")]
    InvalidExtent {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// A pass referenced a render target that has not been allocated.
    #[error("Render target '{0}' is not allocated")]
    TargetNotAllocated(&'static str),

    /// A depth operation was attempted on a target without a depth attachment.
    #[error("Render target '{0}' has no depth attachment")]
    MissingDepthAttachment(&'static str),

    // ========================================================================
    // Capability Errors
    // ========================================================================
    /// The backend cannot provide a feature the pipeline variant requires.
    #[error("Capability not supported by backend '{backend}': {capability}")]
    CapabilityMissing {
        /// Backend name
        backend: &'static str,
        /// Missing capability
        capability: &'static str,
    },

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// Shader template lookup or rendering failed.
    #[error("Shader template error: {0}")]
    ShaderTemplate(#[from] minijinja::Error),

    // ========================================================================
    // Asset & I/O Errors
    // ========================================================================
    /// An asset failed to load.
    #[error("Asset load failed: {0}")]
    AssetLoadFailed(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Image encoding or decoding error.
    #[error("Image error: {0}")]
    ImageError(String),

    // ========================================================================
    // Windowing Errors
    // ========================================================================
    /// Event loop error (winit).
    #[cfg(feature = "winit")]
    #[error("Event loop error: {0}")]
    EventLoopError(#[from] winit::error::EventLoopError),
}

impl From<image::ImageError> for PostFxError {
    fn from(err: image::ImageError) -> Self {
        PostFxError::ImageError(err.to_string())
    }
}

/// Alias for `Result<T, PostFxError>`.
pub type Result<T> = std::result::Result<T, PostFxError>;
