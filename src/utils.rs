use crate::{Error, Result};

/// Implement [`Observable`](crate::object::Observable) for types holding an `object: Object` field.
macro_rules! impl_observable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::object::Observable for $ty {
                fn object(&self) -> &$crate::object::Object {
                    &self.object
                }

                fn object_mut(&mut self) -> &mut $crate::object::Object {
                    &mut self.object
                }
            }
        )*
    };
}

pub(crate) use impl_observable;

/// Worker pool for one execution of a parallel filter; `None` uses the rayon default size.
pub(crate) fn build_thread_pool(threads: Option<usize>) -> Result<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(Error::invalid_argument("number of threads must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| Error::AllocationFailure(format!("failed to build rayon thread pool: {e}")))
}

/// Split `0..len` into consecutive batches of at most `batch` items.
pub(crate) fn batches(len: usize, batch: usize) -> Vec<std::ops::Range<usize>> {
    let batch = batch.max(1);
    (0..len)
        .step_by(batch)
        .map(|start| start..(start + batch).min(len))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_cover_range() {
        assert_eq!(batches(5, 2), vec![0..2, 2..4, 4..5]);
        assert!(batches(0, 3).is_empty());
    }

    #[test]
    fn zero_threads_rejected() {
        assert!(build_thread_pool(Some(0)).is_err());
        assert_eq!(build_thread_pool(Some(2)).unwrap().current_num_threads(), 2);
    }
}
