/// SwapChain trait - for window presentation

use std::any::Any;

use bitflags::bitflags;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::Result;
use crate::graphics_device::{Format, Resource};

/// A native window a swap chain can present into
///
/// Implemented for every type that exposes both raw handles (a winit
/// `Window`, an SDL window, ...).
pub trait WindowSurface: HasWindowHandle + HasDisplayHandle {}

impl<T: HasWindowHandle + HasDisplayHandle + ?Sized> WindowSurface for T {}

/// How back buffers are scaled to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaling {
    Stretch,
    None,
    AspectRatioStretch,
}

/// Presentation model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapEffect {
    /// Flip model, buffer contents discarded after present
    FlipDiscard,
    /// Flip model, buffer contents kept
    FlipSequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    Unspecified,
    Premultiplied,
    Straight,
    Ignore,
}

bitflags! {
    /// Swap-chain creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SwapChainFlags: u32 {
        /// Allow switching display mode when going fullscreen
        const ALLOW_MODE_SWITCH = 0x2;
    }
}

bitflags! {
    /// Present flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PresentFlags: u32 {
        /// Present without waiting (fails instead of blocking)
        const DO_NOT_WAIT = 0x8;
    }
}

/// Swap-chain description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub stereo: bool,
    pub sample_count: u32,
    pub sample_quality: u32,
    /// Back buffers are used as render targets
    pub back_buffer_usage: bool,
    pub buffer_count: u32,
    pub scaling: Scaling,
    pub swap_effect: SwapEffect,
    pub alpha_mode: AlphaMode,
    pub flags: SwapChainFlags,
}

impl SwapChainDesc {
    /// Flip-model swap chain sized to a window's client area: stretch
    /// scaling, mode switch allowed, one sample, no stereo
    pub fn flip_model(width: u32, height: u32, format: Format, buffer_count: u32) -> Self {
        Self {
            width,
            height,
            format,
            stereo: false,
            sample_count: 1,
            sample_quality: 0,
            back_buffer_usage: true,
            buffer_count,
            scaling: Scaling::Stretch,
            swap_effect: SwapEffect::FlipDiscard,
            alpha_mode: AlphaMode::Unspecified,
            flags: SwapChainFlags::ALLOW_MODE_SWITCH,
        }
    }
}

/// Swap chain presenting back buffers to a window
pub trait SwapChain: Send + Sync {
    /// Actual description, which may differ from the requested one
    /// (buffer count, format)
    fn desc(&self) -> Result<SwapChainDesc>;

    /// Back buffer `index` as a resource
    fn buffer(&self, index: u32) -> Result<Box<dyn Resource>>;

    /// Index of the back buffer that can currently be written
    ///
    /// Changes after every present.
    fn current_back_buffer_index(&self) -> Result<u32>;

    /// Present the current back buffer
    ///
    /// # Arguments
    ///
    /// * `sync_interval` - Vertical blanks to wait (1 = vsync)
    /// * `flags` - Present flags
    fn present(&mut self, sync_interval: u32, flags: PresentFlags) -> Result<()>;

    /// For backend downcasts
    fn as_any(&self) -> &dyn Any;
}
