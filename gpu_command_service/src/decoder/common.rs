/// Common commands: tokens and buckets
///
/// These never touch the context group and run even before the first
/// resource command of a batch.

use super::commands as cmd;
use super::{done, CommandError, CommandResult, Decoder};

impl Decoder {
    pub(super) fn set_token(&mut self, c: cmd::SetToken) -> CommandResult {
        self.token = c.token;
        done()
    }

    pub(super) fn set_bucket_size(&mut self, c: cmd::SetBucketSize) -> CommandResult {
        self.buckets.set_size(c.bucket_id, c.size as usize);
        done()
    }

    pub(super) fn set_bucket_data(&mut self, c: cmd::SetBucketData) -> CommandResult {
        let data = self.shm_bytes(c.shm_id, c.shm_offset, c.size)?;
        let bucket = self.buckets.get_mut(c.bucket_id).ok_or(CommandError::InvalidArguments)?;
        if !bucket.set_data(c.offset as usize, &data) {
            return Err(CommandError::InvalidArguments);
        }
        done()
    }

    pub(super) fn set_bucket_data_immediate(&mut self, c: cmd::SetBucketDataImmediate, data: &[u32]) -> CommandResult {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let payload = bytes.get(..c.size as usize).ok_or(CommandError::OutOfBounds)?;
        let bucket = self.buckets.get_mut(c.bucket_id).ok_or(CommandError::InvalidArguments)?;
        if !bucket.set_data(c.offset as usize, payload) {
            return Err(CommandError::InvalidArguments);
        }
        done()
    }

    /// Publish a bucket's size and as much of its data as fits
    pub(super) fn get_bucket_start(&mut self, c: cmd::GetBucketStart) -> CommandResult {
        let result = self.shm(c.result_shm_id, c.result_shm_offset, 4)?;
        let data = if c.data_memory_size != 0 {
            Some(self.shm(c.data_shm_id, c.data_shm_offset, c.data_memory_size)?)
        } else {
            None
        };
        if result.read_u32(0)? != 0 {
            return Err(CommandError::InvalidArguments);
        }
        let bucket = self.buckets.get(c.bucket_id).ok_or(CommandError::InvalidArguments)?;
        let size = bucket.size();
        result.write_u32(0, size as u32)?;
        if let Some(window) = data {
            let len = size.min(c.data_memory_size as usize);
            window.write(0, &bucket.data()[..len])?;
        }
        done()
    }

    pub(super) fn get_bucket_data(&mut self, c: cmd::GetBucketData) -> CommandResult {
        let window = self.shm(c.shm_id, c.shm_offset, c.size)?;
        let bucket = self.buckets.get(c.bucket_id).ok_or(CommandError::InvalidArguments)?;
        let bytes = bucket
            .get_data(c.offset as usize, c.size as usize)
            .ok_or(CommandError::InvalidArguments)?;
        window.write(0, bytes)?;
        done()
    }
}
