//! Resource managers
//!
//! One manager per object kind. Each maps client handles to arena keys and
//! counts references explicitly; the driver object is deleted when the last
//! reference goes away. Cross-object links (framebuffer attachments, vertex
//! attribute buffers) are stored as keys and resolved through the owning
//! manager.

mod object_table;
pub mod buffer_manager;
pub mod texture_manager;
pub mod renderbuffer_manager;
pub mod framebuffer_manager;
pub mod shader_manager;
pub mod program_manager;
pub mod vertex_array_manager;
pub mod mailbox_manager;

pub use object_table::ObjectTable;
pub use buffer_manager::{Buffer, BufferKey, BufferManager};
pub use texture_manager::{
    CanRenderCondition, LevelClearer, LevelInfo, SamplerState, ServiceTexture,
    Texture, TextureDefinition, TextureKey, TextureManager,
};
pub use renderbuffer_manager::{Renderbuffer, RenderbufferKey, RenderbufferManager};
pub use framebuffer_manager::{
    Attachment, AttachmentInfo, Framebuffer, FramebufferKey, FramebufferManager,
};
pub use shader_manager::{Shader, ShaderKey, ShaderManager};
pub use program_manager::{
    AttribInfo, Program, ProgramExecutable, ProgramKey, ProgramManager, UniformInfo,
};
pub use vertex_array_manager::{
    VertexArrayKey, VertexArrayManager, VertexAttrib, VertexAttribManager,
};
pub use mailbox_manager::{MailboxManager, MailboxName, MAILBOX_NAME_LENGTH};
