/// Collaborator traits at the bottom of every decoded command
///
/// `GraphicsDriver` is one current rendering context. Object names it returns
/// are service ids; client handles never reach it. Objects are shared by every
/// context created from the same device, matching a GL share group.
///
/// `Surface` is the on-screen (or pbuffer) drawable a decoder presents to.
/// Offscreen decoders still hold one for sizing and swap notifications.

pub mod graphics_driver;
pub mod surface;

#[cfg(test)]
pub mod mock_driver;

pub use graphics_driver::{reborrow, ActiveVariable, GraphicsDriver};
pub use surface::{Surface, SurfaceFormat};
