//! Per-buffer-view cache of decompressed bytes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::indices::BufferViewId;

type Slot = Arc<Mutex<Option<Arc<[u8]>>>>;

/// Each buffer view gets its own guarded cell. The first caller decodes while
/// holding the cell; concurrent callers for the same view wait and then share
/// the result. Failed decodes are not stored.
#[derive(Default)]
pub struct DecodeCache {
    slots: Mutex<HashMap<BufferViewId, Slot>>,
}

impl DecodeCache {
    pub fn get_or_decode<F>(&self, view: BufferViewId, decode: F) -> Result<Arc<[u8]>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(view).or_default())
        };

        let mut cell = slot.lock();
        if let Some(bytes) = cell.as_ref() {
            return Ok(Arc::clone(bytes));
        }
        let bytes: Arc<[u8]> = decode()?.into();
        *cell = Some(Arc::clone(&bytes));
        Ok(bytes)
    }

    pub fn contains(&self, view: BufferViewId) -> bool {
        let slot = self.slots.lock().get(&view).cloned();
        slot.map_or(false, |s| s.lock().is_some())
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}

// A cloned document starts with a cold cache.
impl Clone for DecodeCache {
    fn clone(&self) -> Self {
        DecodeCache::default()
    }
}

impl fmt::Debug for DecodeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeCache")
            .field("views", &self.slots.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GltfError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_concurrent_first_access_decodes_once() {
        let cache = DecodeCache::default();
        let decodes = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let bytes = cache
                        .get_or_decode(BufferViewId(3), || {
                            decodes.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(10));
                            Ok(vec![1, 2, 3])
                        })
                        .unwrap();
                    assert_eq!(&bytes[..], &[1, 2, 3]);
                });
            }
        });

        assert_eq!(decodes.load(Ordering::SeqCst), 1);
        assert!(cache.contains(BufferViewId(3)));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = DecodeCache::default();
        let err = cache.get_or_decode(BufferViewId(0), || Err(GltfError::Cancelled));
        assert!(err.is_err());
        assert!(!cache.contains(BufferViewId(0)));

        let ok = cache.get_or_decode(BufferViewId(0), || Ok(vec![9])).unwrap();
        assert_eq!(&ok[..], &[9]);
        cache.clear();
        assert!(!cache.contains(BufferViewId(0)));
    }
}
