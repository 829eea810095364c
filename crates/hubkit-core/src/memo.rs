// ── Per-instance fetch memoization ──
//
// Nodes are built per request and fetch their remote backing at most
// once. `Memo` is the explicit cache field for that fetch.

use std::future::Future;

use tokio::sync::OnceCell;

/// A value loaded at most once for the lifetime of its owning node.
///
/// Starts empty (not yet loaded) unless built with [`Memo::loaded`].
/// Concurrent callers of [`Memo::get_or_try_load`] coalesce onto one load;
/// a failed load leaves the memo empty so a later call can retry.
#[derive(Debug)]
pub struct Memo<T> {
    cell: OnceCell<T>,
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// A memo that already holds `value` (e.g. data carried by a listing).
    pub fn loaded(value: T) -> Self {
        Self {
            cell: OnceCell::from(value),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Return the memoized value, running `load` only if nothing is cached.
    pub async fn get_or_try_load<E, F, Fut>(&self, load: F) -> Result<&T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell.get_or_try_init(load).await
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn loads_once() {
        let calls = AtomicUsize::new(0);
        let memo: Memo<u32> = Memo::new();
        assert!(!memo.is_loaded());

        for _ in 0..3 {
            let value = memo
                .get_or_try_load(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(7)
                })
                .await
                .unwrap();
            assert_eq!(*value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(memo.is_loaded());
    }

    #[tokio::test]
    async fn failed_load_can_be_retried() {
        let memo: Memo<u32> = Memo::new();
        let first = memo.get_or_try_load(|| async { Err("offline") }).await;
        assert!(first.is_err());
        assert!(memo.get().is_none());

        let second = memo
            .get_or_try_load(|| async { Ok::<_, &str>(3) })
            .await
            .unwrap();
        assert_eq!(*second, 3);
    }

    #[test]
    fn preloaded_memo_is_ready() {
        let memo = Memo::loaded("ready");
        assert_eq!(memo.get(), Some(&"ready"));
    }
}
