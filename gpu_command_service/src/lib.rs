/*!
# GPU Command Service

Service-side decoder and resource runtime for a GLES2-style command stream.

An untrusted client serializes graphics calls into command records and writes
bulk arguments into shared memory. This crate validates and replays those
records against a [`GraphicsDriver`](gpu::driver::GraphicsDriver) while tracking
every client-visible object through per-kind managers.

## Architecture

- **FeatureSet**: negotiated extensions, validators, workarounds and limits
- **ContextGroup**: shared managers for one share group
- **Resource managers**: buffers, textures, renderbuffers, framebuffers,
  shaders, programs, vertex arrays and mailboxes
- **Decoder**: per-context command interpreter
- **QueryManager**: pending queues publishing through shared-memory sync records

Driver backends implement [`GraphicsDriver`](gpu::driver::GraphicsDriver)
(see the `gpu_command_service_driver_soft` crate).
*/

// Internal modules
mod error;
mod service;
pub mod log;
pub mod gl;
pub mod driver;
pub mod shared_memory;
pub mod id_allocator;
pub mod feature;
pub mod shader_translator;
pub mod resource;
pub mod context_group;
pub mod query;
pub mod sync_point;
pub mod decoder;
pub mod cmd_parser;

// Main gpu namespace module
pub mod gpu {
    // Error types
    pub use crate::error::{ContextLostReason, Error, Result};

    // Process-wide logger slot
    pub use crate::service::Service;

    // Logging sub-module (types only, macros are exported at crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    pub mod gl {
        pub use crate::gl::*;
    }

    pub mod driver {
        pub use crate::driver::*;
    }

    pub mod memory {
        pub use crate::shared_memory::*;
    }

    pub mod feature {
        pub use crate::feature::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }

    pub mod query {
        pub use crate::query::*;
    }

    pub use crate::cmd_parser::{CommandBuffer, CommandHandler, CommandParser, ParseError, ParseStatus};
    pub use crate::context_group::{
        ContextGroup, ContextGroupConfig, DecoderId, GroupResources, IdNamespace,
        SharedContextGroup,
    };
    pub use crate::decoder::{
        commands, CommandError, CommandOutcome, CommandResult, ContextAttribs, Decoder,
        DecoderState,
    };
    pub use crate::id_allocator::IdAllocator;
    pub use crate::shader_translator::{PassthroughTranslator, ShaderTranslator};
    pub use crate::sync_point::SyncPointManager;
}

// Re-export math library at crate root
pub use glam;
