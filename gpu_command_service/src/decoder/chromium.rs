/// Service extensions: shared id namespaces, forced context loss, back
/// buffer resize and sync point waits

use super::commands as cmd;
use super::offscreen::OffscreenTarget;
use super::{done, reason_for_status, CommandError, CommandOutcome, CommandResult, Decoder};
use crate::context_group::{GroupResources, IdNamespace};
use crate::error::ContextLostReason;
use crate::feature::Workarounds;
use crate::gl;
use crate::shared_memory::SharedMemoryRef;

fn is_reset_status(status: u32) -> bool {
    matches!(status, gl::GUILTY_CONTEXT_RESET | gl::INNOCENT_CONTEXT_RESET | gl::UNKNOWN_CONTEXT_RESET)
}

impl Decoder {
    /// Window over `n` ids in shared memory; `None` (after raising
    /// INVALID_VALUE) for a negative count
    fn shared_id_window(
        &mut self,
        func: &str,
        n: i32,
        shm_id: u32,
        shm_offset: u32,
    ) -> Result<Option<SharedMemoryRef>, CommandError> {
        if n < 0 {
            self.set_error(gl::INVALID_VALUE, func, "n < 0")?;
            return Ok(None);
        }
        let size = (n as u32).checked_mul(4).ok_or(CommandError::OutOfBounds)?;
        self.shm(shm_id, shm_offset, size).map(Some)
    }

    fn shared_namespace(&mut self, func: &str, namespace_id: u32) -> Result<Option<IdNamespace>, CommandError> {
        match IdNamespace::from_wire(namespace_id) {
            Some(namespace) => Ok(Some(namespace)),
            None => {
                self.invalid_enum(func, namespace_id, "namespace_id")?;
                Ok(None)
            }
        }
    }

    pub(super) fn gen_shared_ids(&mut self, res: &mut GroupResources<'_>, c: cmd::GenSharedIdsCHROMIUM) -> CommandResult {
        const FUNC: &str = "glGenSharedIdsCHROMIUM";
        let Some(namespace) = self.shared_namespace(FUNC, c.namespace_id)? else {
            return done();
        };
        let Some(window) = self.shared_id_window(FUNC, c.n, c.ids_shm_id, c.ids_shm_offset)? else {
            return done();
        };
        let allocator = res.id_allocator(namespace);
        let mut next = c.id_offset;
        for i in 0..c.n as usize {
            let id = allocator.alloc_id_at_or_above(next);
            window.write_u32(i * 4, id)?;
            next = id.saturating_add(1);
        }
        done()
    }

    pub(super) fn delete_shared_ids(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::DeleteSharedIdsCHROMIUM,
    ) -> CommandResult {
        const FUNC: &str = "glDeleteSharedIdsCHROMIUM";
        let Some(namespace) = self.shared_namespace(FUNC, c.namespace_id)? else {
            return done();
        };
        let Some(window) = self.shared_id_window(FUNC, c.n, c.ids_shm_id, c.ids_shm_offset)? else {
            return done();
        };
        let allocator = res.id_allocator(namespace);
        for i in 0..c.n as usize {
            allocator.free_id(window.read_u32(i * 4)?);
        }
        done()
    }

    /// Reserve client-chosen ids; all or nothing
    pub(super) fn register_shared_ids(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::RegisterSharedIdsCHROMIUM,
    ) -> CommandResult {
        const FUNC: &str = "glRegisterSharedIdsCHROMIUM";
        let Some(namespace) = self.shared_namespace(FUNC, c.namespace_id)? else {
            return done();
        };
        let Some(window) = self.shared_id_window(FUNC, c.n, c.ids_shm_id, c.ids_shm_offset)? else {
            return done();
        };
        let ids = (0..c.n as usize)
            .map(|i| window.read_u32(i * 4))
            .collect::<Result<Vec<u32>, _>>()?;
        let allocator = res.id_allocator(namespace);
        for (registered, &id) in ids.iter().enumerate() {
            if !allocator.mark_as_used(id) {
                for &undo in &ids[..registered] {
                    allocator.free_id(undo);
                }
                return self.set_error(gl::INVALID_VALUE, FUNC, "id already in use");
            }
        }
        done()
    }

    /// Lose this context with `current`; the rest of the group is told
    /// `other` once the group lock is released
    pub(super) fn lose_context_cmd(&mut self, c: cmd::LoseContextCHROMIUM) -> CommandResult {
        const FUNC: &str = "glLoseContextCHROMIUM";
        if !is_reset_status(c.current) {
            return self.invalid_enum(FUNC, c.current, "current");
        }
        if !is_reset_status(c.other) {
            return self.invalid_enum(FUNC, c.other, "other");
        }
        self.mark_lost(reason_for_status(c.current));
        self.lose_others = Some(c.other);
        Err(CommandError::LostContext)
    }

    pub(super) fn resize(&mut self, res: &mut GroupResources<'_>, c: cmd::ResizeCHROMIUM) -> CommandResult {
        let width = c.width.clamp(1, i32::MAX as u32) as i32;
        let height = c.height.clamp(1, i32::MAX as u32) as i32;
        let restore = self.restore_bindings(res);

        if let Some(mut target) = self.offscreen.take() {
            let recreate = self
                .features
                .as_ref()
                .is_some_and(|f| f.workarounds.contains(Workarounds::DELETE_INSTEAD_OF_RESIZE_FBO));
            let resized = if recreate {
                let format = target.format();
                target.destroy(Some(self.driver.as_mut()));
                OffscreenTarget::create(self.driver.as_mut(), format, width, height, restore)
            } else {
                target.resize(self.driver.as_mut(), width, height, restore).map(|()| target)
            };
            match resized {
                Ok(target) => {
                    if self.state.bound_draw_framebuffer.is_none() {
                        self.driver.bind_framebuffer(gl::FRAMEBUFFER, target.framebuffer_id());
                    }
                    self.offscreen = Some(target);
                }
                Err(err) => {
                    crate::gpu_error!("gpu::Decoder", "Could not resize offscreen target to {}x{}: {}", width, height, err);
                    self.mark_lost(ContextLostReason::Unknown);
                    return Err(CommandError::LostContext);
                }
            }
        } else if !self.surface.resize(width, height) {
            crate::gpu_error!("gpu::Decoder", "Surface refused resize to {}x{}", width, height);
            self.mark_lost(ContextLostReason::Unknown);
            return Err(CommandError::LostContext);
        }
        self.backbuffer_cleared = false;
        done()
    }

    /// Deferred until `sync_point` retires
    pub(super) fn wait_sync_point(&mut self, c: cmd::WaitSyncPointCHROMIUM) -> CommandResult {
        let retired = self.sync_points.as_ref().map_or(true, |manager| manager.is_retired(c.sync_point));
        if retired {
            done()
        } else {
            Ok(CommandOutcome::Deferred)
        }
    }
}

#[cfg(test)]
#[path = "chromium_tests.rs"]
mod tests;
