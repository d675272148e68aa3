/// Per-decoder byte buckets
///
/// Buckets carry variable-length data (shader source, names, info logs)
/// between client and service without sizing a shared-memory transfer up
/// front. Strings are stored with a trailing NUL.

use rustc_hash::FxHashMap;

#[derive(Debug, Default, Clone)]
pub struct Bucket {
    data: Vec<u8>,
}

impl Bucket {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Resize to `size` bytes, zero filled
    pub fn set_size(&mut self, size: usize) {
        self.data.clear();
        self.data.resize(size, 0);
    }

    /// Write `src` at `offset`; false if it does not fit
    pub fn set_data(&mut self, offset: usize, src: &[u8]) -> bool {
        let Some(end) = offset.checked_add(src.len()) else {
            return false;
        };
        match self.data.get_mut(offset..end) {
            Some(dst) => {
                dst.copy_from_slice(src);
                true
            }
            None => false,
        }
    }

    pub fn get_data(&self, offset: usize, size: usize) -> Option<&[u8]> {
        let end = offset.checked_add(size)?;
        self.data.get(offset..end)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_from_string(&mut self, text: &str) {
        self.data.clear();
        self.data.extend_from_slice(text.as_bytes());
        self.data.push(0);
    }

    /// Contents up to the terminating NUL, which must be the last byte
    pub fn get_as_string(&self) -> Option<String> {
        let (last, body) = self.data.split_last()?;
        if *last != 0 || body.contains(&0) {
            return None;
        }
        String::from_utf8(body.to_vec()).ok()
    }
}

#[derive(Debug, Default)]
pub struct BucketTable {
    buckets: FxHashMap<u32, Bucket>,
}

impl BucketTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u32) -> Option<&Bucket> {
        self.buckets.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Bucket> {
        self.buckets.get_mut(&id)
    }

    pub fn create_or_get(&mut self, id: u32) -> &mut Bucket {
        self.buckets.entry(id).or_default()
    }

    /// A size of 0 frees the bucket
    pub fn set_size(&mut self, id: u32, size: usize) {
        if size == 0 {
            self.buckets.remove(&id);
        } else {
            self.create_or_get(id).set_size(size);
        }
    }

    pub fn string(&self, id: u32) -> Option<String> {
        self.get(id).and_then(|bucket| bucket.get_as_string())
    }

    pub fn set_string(&mut self, id: u32, text: &str) {
        self.create_or_get(id).set_from_string(text);
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
#[path = "bucket_tests.rs"]
mod tests;
