//! Bounded-Retry Resource Provisioning
//!
//! Bulk acquisition of test resources from a [`ResourcePool`]. An empty batch
//! is treated as transient pool pressure and retried; an allocator error is a
//! defect and is never retried. A run of empty batches longer than the retry
//! ceiling is reported as exhaustion.

use crate::error::ProvisionError;
use tracing::trace;

/// Consecutive empty batches tolerated before giving up
pub const MAX_RETRY: u32 = 1024;

/// Allocator seam for the provisioner
pub trait ResourcePool {
    /// Handle to one allocated resource
    type Resource;
    /// What kind of resource to allocate (e.g. an event type)
    type Kind: Copy + std::fmt::Debug;
    /// Hard allocator error
    type Error: std::error::Error + Send + Sync + 'static;

    /// Allocate up to `max` resources, appending them to `out`.
    ///
    /// Returns the number appended; `Ok(0)` means the pool is momentarily
    /// empty. Nothing is appended on error.
    fn alloc_batch(
        &mut self,
        kind: Self::Kind,
        size: usize,
        max: usize,
        out: &mut Vec<Self::Resource>,
    ) -> Result<usize, Self::Error>;

    /// Return one resource to this pool
    fn free(&mut self, resource: Self::Resource);
}

/// Acquires and releases resource tables with bounded retries
#[derive(Debug, Clone, Copy)]
pub struct ResourceProvisioner {
    max_retry: u32,
}

impl Default for ResourceProvisioner {
    fn default() -> Self {
        Self::new(MAX_RETRY)
    }
}

impl ResourceProvisioner {
    /// Provisioner with a custom retry ceiling
    pub fn new(max_retry: u32) -> Self {
        Self { max_retry }
    }

    /// Retry ceiling in use
    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }

    /// Acquire exactly `count` resources of `kind`/`size` from `pool`.
    pub fn acquire<P: ResourcePool>(
        &self,
        pool: &mut P,
        kind: P::Kind,
        size: usize,
        count: usize,
    ) -> Result<Vec<P::Resource>, ProvisionError> {
        let mut acquired = Vec::with_capacity(count);
        let mut retries = 0u32;

        while acquired.len() < count {
            let want = count - acquired.len();

            let got = match pool.alloc_batch(kind, size, want, &mut acquired) {
                Ok(got) => got,
                Err(e) => {
                    // Keep the pool balanced before reporting.
                    let have = acquired.len();
                    self.release_all(pool, acquired);
                    return Err(ProvisionError::Allocator {
                        acquired: have,
                        requested: count,
                        source: Box::new(e),
                    });
                }
            };

            if got == 0 {
                retries += 1;
                if retries > self.max_retry {
                    let have = acquired.len();
                    self.release_all(pool, acquired);
                    return Err(ProvisionError::Exhausted {
                        acquired: have,
                        requested: count,
                        retries,
                    });
                }
                continue;
            }

            trace!(?kind, got, total = acquired.len(), "acquired batch");
            retries = 0;
        }

        Ok(acquired)
    }

    /// Acquire into a slot table: the first `count` slots are overwritten
    /// with valid resources. Slots must be free (`None`) beforehand.
    pub fn acquire_into<P: ResourcePool>(
        &self,
        pool: &mut P,
        kind: P::Kind,
        size: usize,
        slots: &mut [Option<P::Resource>],
    ) -> Result<(), ProvisionError> {
        let resources = self.acquire(pool, kind, size, slots.len())?;
        for (slot, resource) in slots.iter_mut().zip(resources) {
            debug_assert!(slot.is_none(), "acquire_into over a live slot");
            *slot = Some(resource);
        }
        Ok(())
    }

    /// Return every valid slot to `pool` and mark it invalid.
    /// Already-invalid slots are skipped.
    pub fn release<P: ResourcePool>(&self, pool: &mut P, slots: &mut [Option<P::Resource>]) {
        for slot in slots {
            if let Some(resource) = slot.take() {
                pool.free(resource);
            }
        }
    }

    fn release_all<P: ResourcePool>(&self, pool: &mut P, resources: Vec<P::Resource>) {
        for resource in resources {
            pool.free(resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("bad pool")]
    struct BadPool;

    /// Scripted allocator: yields `per_call` per batch, errors on call
    /// `fail_on_call` (if set). Tracks live resources.
    struct Scripted {
        per_call: usize,
        fail_on_call: Option<u32>,
        calls: u32,
        live: usize,
        next: u32,
    }

    impl Scripted {
        fn yielding(per_call: usize) -> Self {
            Self {
                per_call,
                fail_on_call: None,
                calls: 0,
                live: 0,
                next: 0,
            }
        }
    }

    impl ResourcePool for Scripted {
        type Resource = u32;
        type Kind = ();
        type Error = BadPool;

        fn alloc_batch(
            &mut self,
            _kind: (),
            _size: usize,
            max: usize,
            out: &mut Vec<u32>,
        ) -> Result<usize, BadPool> {
            self.calls += 1;
            if self.fail_on_call == Some(self.calls) {
                return Err(BadPool);
            }
            let n = self.per_call.min(max);
            for _ in 0..n {
                out.push(self.next);
                self.next += 1;
            }
            self.live += n;
            Ok(n)
        }

        fn free(&mut self, _resource: u32) {
            self.live -= 1;
        }
    }

    #[test]
    fn single_resource_batches_still_complete() {
        let mut pool = Scripted::yielding(1);
        let got = ResourceProvisioner::default()
            .acquire(&mut pool, (), 64, 5000)
            .unwrap();

        assert_eq!(got.len(), 5000);
        assert_eq!(pool.calls, 5000);
    }

    #[test]
    fn sustained_empty_batches_exhaust_after_ceiling() {
        let mut pool = Scripted::yielding(0);
        let err = ResourceProvisioner::default()
            .acquire(&mut pool, (), 64, 5000)
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Exhausted {
                acquired: 0,
                requested: 5000,
                retries,
            } if retries == MAX_RETRY + 1
        ));
        assert_eq!(pool.calls, MAX_RETRY + 1);
    }

    #[test]
    fn hard_error_is_not_retried() {
        let mut pool = Scripted::yielding(10);
        pool.fail_on_call = Some(3);

        let err = ResourceProvisioner::default()
            .acquire(&mut pool, (), 64, 100)
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Allocator {
                acquired: 20,
                requested: 100,
                ..
            }
        ));
        assert_eq!(pool.calls, 3);
        // Partial acquisition went back to the pool.
        assert_eq!(pool.live, 0);
    }

    #[test]
    fn release_skips_invalid_slots() {
        let mut pool = Scripted::yielding(4);
        let provisioner = ResourceProvisioner::new(8);
        let mut slots = vec![None; 8];

        provisioner
            .acquire_into(&mut pool, (), 64, &mut slots)
            .unwrap();
        assert_eq!(pool.live, 8);

        slots[3] = None;
        pool.live -= 1;

        provisioner.release(&mut pool, &mut slots);
        assert_eq!(pool.live, 0);
        assert!(slots.iter().all(Option::is_none));

        // Second release is a no-op.
        provisioner.release(&mut pool, &mut slots);
        assert_eq!(pool.live, 0);
    }
}
