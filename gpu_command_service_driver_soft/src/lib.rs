/*!
# GPU Command Service - Software Driver

Host-memory implementation of the `GraphicsDriver` and `Surface` traits of
`gpu_command_service`.

Objects live in a [`SoftDevice`] shared by all of its contexts, the way a GL
share group is. Texel storage defined without data is filled with a
recognizable pattern, so tests can prove uninitialized memory never reaches
a client.

```no_run
use gpu_command_service::gpu::{ContextAttribs, ContextGroup, ContextGroupConfig, Decoder};
use gpu_command_service::gpu::feature::DisallowedFeatures;
use gpu_command_service_driver_soft::{DeviceConfig, SoftDevice, SoftSurface};

let device = SoftDevice::new(DeviceConfig::default());
let surface = SoftSurface::new(64, 64);
let driver = device.create_context(Some(&surface));
let group = ContextGroup::shared(ContextGroupConfig::default());
let mut decoder = Decoder::new(group, Box::new(driver), Box::new(surface));
decoder.initialize(ContextAttribs::default(), &DisallowedFeatures::default())?;
# Ok::<(), gpu_command_service::gpu::Error>(())
```
*/

mod soft_image;
mod soft_program;
mod soft_device;
mod soft_driver;
mod soft_surface;

pub use soft_device::{DeviceConfig, ObjectCounts, SoftDevice, VertexAttrib};
pub use soft_driver::{FixedFunctionState, SoftDriver};
pub use soft_image::{SoftImage, UNDEFINED_PATTERN};
pub use soft_program::{scan_declarations, Declaration, SoftProgram, SoftShader};
pub use soft_surface::{SoftSurface, SurfaceHandle};
