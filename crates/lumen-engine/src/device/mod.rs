//! wgpu device and window surface.
//!
//! [`Gpu`] creates the instance/adapter/device/queue for one window, owns the
//! surface configuration and hands out per-frame encoders.

mod frame;
mod gpu;
mod init;
mod surface;

pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
