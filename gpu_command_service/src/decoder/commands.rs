//! Command records
//!
//! Every command is a header word followed by a fixed argument record and,
//! for "immediate" commands, trailing data. The table below is the single
//! source of truth for ids, argument layouts and arity: the decoder checks
//! declared lengths against it before any handler runs, and clients encode
//! with the same structs.
//!
//! Argument structs are `#[repr(C)]` records of 32-bit fields, so they are
//! read straight out of the word stream with `bytemuck`.

use bytemuck::{Pod, Zeroable};

/// How the argument count of a command is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgFlags {
    /// Exactly `arg_count` words
    Fixed,
    /// At least `arg_count` words, the rest is immediate data
    AtLeastN,
}

/// Static descriptor of one command id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub arg_flags: ArgFlags,
    /// Words in the fixed record, header excluded
    pub arg_count: u32,
}

impl CommandInfo {
    pub fn accepts(&self, arg_count: u32) -> bool {
        match self.arg_flags {
            ArgFlags::Fixed => arg_count == self.arg_count,
            ArgFlags::AtLeastN => arg_count >= self.arg_count,
        }
    }
}

/// A typed command record
pub trait Command: Copy {
    const ID: CommandId;
    const ARG_FLAGS: ArgFlags;
    const ARG_COUNT: u32 = (std::mem::size_of::<Self>() / 4) as u32;

    /// Read the fixed record from the start of `args`
    fn from_args(args: &[u32]) -> Option<Self>;

    /// Append the fixed record to `out`
    fn write_args(&self, out: &mut Vec<u32>);
}

macro_rules! command_struct {
    ($name:ident, $flags:ident {}) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq)]
        pub struct $name;

        impl Command for $name {
            const ID: CommandId = CommandId::$name;
            const ARG_FLAGS: ArgFlags = ArgFlags::$flags;

            fn from_args(_args: &[u32]) -> Option<Self> {
                Some(Self)
            }

            fn write_args(&self, _out: &mut Vec<u32>) {}
        }
    };
    ($name:ident, $flags:ident { $($field:ident : $ty:ty),+ $(,)? }) => {
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
        pub struct $name {
            $(pub $field: $ty),+
        }

        impl Command for $name {
            const ID: CommandId = CommandId::$name;
            const ARG_FLAGS: ArgFlags = ArgFlags::$flags;

            fn from_args(args: &[u32]) -> Option<Self> {
                let words = args.get(..Self::ARG_COUNT as usize)?;
                Some(bytemuck::pod_read_unaligned(bytemuck::cast_slice(words)))
            }

            fn write_args(&self, out: &mut Vec<u32>) {
                out.extend_from_slice(bytemuck::cast_slice(std::slice::from_ref(self)));
            }
        }
    };
}

macro_rules! command_table {
    ($($name:ident = $id:literal, $flags:ident { $($body:tt)* };)*) => {
        /// Every command id the decoder understands
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum CommandId {
            $($name = $id),*
        }

        impl CommandId {
            pub fn from_u32(id: u32) -> Option<Self> {
                match id {
                    $($id => Some(Self::$name),)*
                    _ => None,
                }
            }
        }

        /// Arity descriptor of `id`, `None` for unknown ids
        pub fn command_info(id: u32) -> Option<CommandInfo> {
            match id {
                $($id => Some(CommandInfo {
                    name: stringify!($name),
                    arg_flags: ArgFlags::$flags,
                    arg_count: <$name as Command>::ARG_COUNT,
                }),)*
                _ => None,
            }
        }

        $(command_struct!($name, $flags { $($body)* });)*
    };
}

command_table! {
    // ----- Common commands -----
    Noop = 0, AtLeastN {};
    SetToken = 1, Fixed { token: u32 };
    SetBucketSize = 2, Fixed { bucket_id: u32, size: u32 };
    SetBucketData = 3, Fixed { bucket_id: u32, offset: u32, size: u32, shm_id: u32, shm_offset: u32 };
    SetBucketDataImmediate = 4, AtLeastN { bucket_id: u32, offset: u32, size: u32 };
    GetBucketStart = 5, Fixed {
        bucket_id: u32,
        result_shm_id: u32,
        result_shm_offset: u32,
        data_memory_size: u32,
        data_shm_id: u32,
        data_shm_offset: u32,
    };
    GetBucketData = 6, Fixed { bucket_id: u32, offset: u32, size: u32, shm_id: u32, shm_offset: u32 };

    // ----- GLES2 -----
    ActiveTexture = 256, Fixed { texture: u32 };
    AttachShader = 257, Fixed { program: u32, shader: u32 };
    BindAttribLocationBucket = 258, Fixed { program: u32, index: u32, name_bucket_id: u32 };
    BindBuffer = 259, Fixed { target: u32, buffer: u32 };
    BindFramebuffer = 260, Fixed { target: u32, framebuffer: u32 };
    BindRenderbuffer = 261, Fixed { target: u32, renderbuffer: u32 };
    BindTexture = 262, Fixed { target: u32, texture: u32 };
    BlendFunc = 263, Fixed { sfactor: u32, dfactor: u32 };
    BufferData = 264, Fixed { target: u32, size: i32, data_shm_id: u32, data_shm_offset: u32, usage: u32 };
    BufferSubData = 265, Fixed { target: u32, offset: i32, size: i32, data_shm_id: u32, data_shm_offset: u32 };
    CheckFramebufferStatus = 266, Fixed { target: u32, result_shm_id: u32, result_shm_offset: u32 };
    Clear = 267, Fixed { mask: u32 };
    ClearColor = 268, Fixed { red: f32, green: f32, blue: f32, alpha: f32 };
    ClearDepthf = 269, Fixed { depth: f32 };
    ClearStencil = 270, Fixed { s: i32 };
    ColorMask = 271, Fixed { red: u32, green: u32, blue: u32, alpha: u32 };
    CompileShader = 272, Fixed { shader: u32 };
    CompressedTexImage2D = 273, Fixed {
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        border: i32,
        image_size: i32,
        data_shm_id: u32,
        data_shm_offset: u32,
    };
    CopyTexImage2D = 274, Fixed {
        target: u32,
        level: i32,
        internal_format: u32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        border: i32,
    };
    CopyTexSubImage2D = 275, Fixed {
        target: u32,
        level: i32,
        xoffset: i32,
        yoffset: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    };
    CreateProgram = 276, Fixed { client_id: u32 };
    CreateShader = 277, Fixed { shader_type: u32, client_id: u32 };
    CullFace = 278, Fixed { mode: u32 };
    DeleteBuffersImmediate = 279, AtLeastN { n: i32 };
    DeleteFramebuffersImmediate = 280, AtLeastN { n: i32 };
    DeleteProgram = 281, Fixed { program: u32 };
    DeleteRenderbuffersImmediate = 282, AtLeastN { n: i32 };
    DeleteShader = 283, Fixed { shader: u32 };
    DeleteTexturesImmediate = 284, AtLeastN { n: i32 };
    DepthFunc = 285, Fixed { func: u32 };
    DepthMask = 286, Fixed { flag: u32 };
    DetachShader = 287, Fixed { program: u32, shader: u32 };
    Disable = 288, Fixed { cap: u32 };
    DisableVertexAttribArray = 289, Fixed { index: u32 };
    DrawArrays = 290, Fixed { mode: u32, first: i32, count: i32 };
    DrawElements = 291, Fixed { mode: u32, count: i32, ty: u32, index_offset: u32 };
    Enable = 292, Fixed { cap: u32 };
    EnableVertexAttribArray = 293, Fixed { index: u32 };
    Finish = 294, Fixed {};
    Flush = 295, Fixed {};
    FramebufferRenderbuffer = 296, Fixed {
        target: u32,
        attachment: u32,
        renderbuffer_target: u32,
        renderbuffer: u32,
    };
    FramebufferTexture2D = 297, Fixed { target: u32, attachment: u32, textarget: u32, texture: u32, level: i32 };
    FrontFace = 298, Fixed { mode: u32 };
    GenBuffersImmediate = 299, AtLeastN { n: i32 };
    GenerateMipmap = 300, Fixed { target: u32 };
    GenFramebuffersImmediate = 301, AtLeastN { n: i32 };
    GenRenderbuffersImmediate = 302, AtLeastN { n: i32 };
    GenTexturesImmediate = 303, AtLeastN { n: i32 };
    GetAttribLocationBucket = 304, Fixed {
        program: u32,
        name_bucket_id: u32,
        location_shm_id: u32,
        location_shm_offset: u32,
    };
    GetError = 305, Fixed { result_shm_id: u32, result_shm_offset: u32 };
    GetIntegerv = 306, Fixed { pname: u32, params_shm_id: u32, params_shm_offset: u32 };
    GetProgramiv = 307, Fixed { program: u32, pname: u32, params_shm_id: u32, params_shm_offset: u32 };
    GetProgramInfoLog = 308, Fixed { program: u32, bucket_id: u32 };
    GetShaderiv = 309, Fixed { shader: u32, pname: u32, params_shm_id: u32, params_shm_offset: u32 };
    GetShaderInfoLog = 310, Fixed { shader: u32, bucket_id: u32 };
    GetString = 311, Fixed { name: u32, bucket_id: u32 };
    GetUniformfv = 312, Fixed { program: u32, location: i32, params_shm_id: u32, params_shm_offset: u32 };
    GetUniformLocationBucket = 313, Fixed {
        program: u32,
        name_bucket_id: u32,
        location_shm_id: u32,
        location_shm_offset: u32,
    };
    Hint = 314, Fixed { target: u32, mode: u32 };
    IsBuffer = 315, Fixed { buffer: u32, result_shm_id: u32, result_shm_offset: u32 };
    IsFramebuffer = 316, Fixed { framebuffer: u32, result_shm_id: u32, result_shm_offset: u32 };
    IsProgram = 317, Fixed { program: u32, result_shm_id: u32, result_shm_offset: u32 };
    IsRenderbuffer = 318, Fixed { renderbuffer: u32, result_shm_id: u32, result_shm_offset: u32 };
    IsShader = 319, Fixed { shader: u32, result_shm_id: u32, result_shm_offset: u32 };
    IsTexture = 320, Fixed { texture: u32, result_shm_id: u32, result_shm_offset: u32 };
    LinkProgram = 321, Fixed { program: u32 };
    PixelStorei = 322, Fixed { pname: u32, param: i32 };
    ReadPixels = 323, Fixed {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels_shm_id: u32,
        pixels_shm_offset: u32,
        result_shm_id: u32,
        result_shm_offset: u32,
        async_: u32,
    };
    RenderbufferStorage = 324, Fixed { target: u32, internal_format: u32, width: i32, height: i32 };
    Scissor = 325, Fixed { x: i32, y: i32, width: i32, height: i32 };
    ShaderSourceBucket = 326, Fixed { shader: u32, data_bucket_id: u32 };
    TexImage2D = 327, Fixed {
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        border: i32,
        format: u32,
        ty: u32,
        pixels_shm_id: u32,
        pixels_shm_offset: u32,
    };
    TexParameterf = 328, Fixed { target: u32, pname: u32, param: f32 };
    TexParameteri = 329, Fixed { target: u32, pname: u32, param: i32 };
    TexSubImage2D = 330, Fixed {
        target: u32,
        level: i32,
        xoffset: i32,
        yoffset: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels_shm_id: u32,
        pixels_shm_offset: u32,
        internal: u32,
    };
    Uniform1f = 331, Fixed { location: i32, x: f32 };
    Uniform1i = 332, Fixed { location: i32, x: i32 };
    Uniform1ivImmediate = 333, AtLeastN { location: i32, count: i32 };
    Uniform4f = 334, Fixed { location: i32, x: f32, y: f32, z: f32, w: f32 };
    Uniform4fvImmediate = 335, AtLeastN { location: i32, count: i32 };
    UniformMatrix4fvImmediate = 336, AtLeastN { location: i32, count: i32, transpose: u32 };
    UseProgram = 337, Fixed { program: u32 };
    ValidateProgram = 338, Fixed { program: u32 };
    VertexAttrib4f = 339, Fixed { index: u32, x: f32, y: f32, z: f32, w: f32 };
    VertexAttribPointer = 340, Fixed { index: u32, size: i32, ty: u32, normalized: u32, stride: i32, offset: u32 };
    Viewport = 341, Fixed { x: i32, y: i32, width: i32, height: i32 };
    SwapBuffers = 342, Fixed {};
    GenQueriesEXTImmediate = 343, AtLeastN { n: i32 };
    DeleteQueriesEXTImmediate = 344, AtLeastN { n: i32 };
    BeginQueryEXT = 345, Fixed { target: u32, id: u32, sync_shm_id: u32, sync_shm_offset: u32 };
    EndQueryEXT = 346, Fixed { target: u32, submit_count: u32 };
    GenVertexArraysOESImmediate = 347, AtLeastN { n: i32 };
    DeleteVertexArraysOESImmediate = 348, AtLeastN { n: i32 };
    IsVertexArrayOES = 349, Fixed { array: u32, result_shm_id: u32, result_shm_offset: u32 };
    BindVertexArrayOES = 350, Fixed { array: u32 };
    TexStorage2DEXT = 351, Fixed { target: u32, levels: i32, internal_format: u32, width: i32, height: i32 };
    RenderbufferStorageMultisampleEXT = 352, Fixed {
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    };
    BindUniformLocationCHROMIUMBucket = 353, Fixed { program: u32, location: i32, name_bucket_id: u32 };
    ProduceTextureCHROMIUMImmediate = 354, AtLeastN { target: u32 };
    ConsumeTextureCHROMIUMImmediate = 355, AtLeastN { target: u32 };
    GenSharedIdsCHROMIUM = 356, Fixed { namespace_id: u32, id_offset: u32, n: i32, ids_shm_id: u32, ids_shm_offset: u32 };
    DeleteSharedIdsCHROMIUM = 357, Fixed { namespace_id: u32, n: i32, ids_shm_id: u32, ids_shm_offset: u32 };
    RegisterSharedIdsCHROMIUM = 358, Fixed { namespace_id: u32, n: i32, ids_shm_id: u32, ids_shm_offset: u32 };
    LoseContextCHROMIUM = 359, Fixed { current: u32, other: u32 };
    ResizeCHROMIUM = 360, Fixed { width: u32, height: u32 };
    AsyncTexImage2DCHROMIUM = 361, Fixed {
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        border: i32,
        format: u32,
        ty: u32,
        pixels_shm_id: u32,
        pixels_shm_offset: u32,
    };
    WaitAsyncTexImage2DCHROMIUM = 362, Fixed { target: u32 };
    WaitSyncPointCHROMIUM = 363, Fixed { sync_point: u32 };
    GetTranslatedShaderSourceANGLE = 364, Fixed { shader: u32, bucket_id: u32 };
}

/// Words in a mailbox name carried by Produce/ConsumeTexture
pub const MAILBOX_WORDS: usize = 16;

/// Header word: low 21 bits are the record size in words (header
/// included), high 11 bits the command id
pub const SIZE_BITS: u32 = 21;
pub const SIZE_MASK: u32 = (1 << SIZE_BITS) - 1;
pub const MAX_COMMAND_ID: u32 = (1 << (32 - SIZE_BITS)) - 1;

pub fn header(id: u32, size_in_words: u32) -> u32 {
    (id << SIZE_BITS) | (size_in_words & SIZE_MASK)
}

pub fn split_header(word: u32) -> (u32, u32) {
    (word >> SIZE_BITS, word & SIZE_MASK)
}

/// Encode `cmd` followed by `data` into a header-prefixed record
pub fn encode<C: Command>(cmd: &C, data: &[u32]) -> Vec<u32> {
    let mut words = vec![0];
    cmd.write_args(&mut words);
    words.extend_from_slice(data);
    words[0] = header(C::ID as u32, words.len() as u32);
    words
}

/// Pad a byte payload to whole words for an immediate command
pub fn bytes_to_words(bytes: &[u8]) -> Vec<u32> {
    let mut padded = bytes.to_vec();
    padded.resize(bytes.len().div_ceil(4) * 4, 0);
    padded.chunks_exact(4).map(bytemuck::pod_read_unaligned::<u32>).collect()
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
