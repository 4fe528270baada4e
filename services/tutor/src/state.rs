//! services/tutor/src/state.rs
//!
//! Per-session operation state observable by a UI: busy flags for the
//! one-shot and streaming paths, the streamed-content accumulator, and the
//! most recent failure notice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tutor_core::normalize::Notice;

/// The observable state of the operations running on one session.
///
/// The loading flag covers the four one-shot operations; the streaming flag
/// and the accumulator belong to the chat operation. The two pairs are
/// independent, so a chat stream and a one-shot call may be in flight at the
/// same time.
#[derive(Debug, Default)]
pub struct OperationState {
    loading: AtomicBool,
    streaming: AtomicBool,
    streamed_content: RwLock<String>,
    last_notice: RwLock<Option<Notice>>,
}

impl OperationState {
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// The assistant text accumulated so far by the current (or most recent)
    /// chat call.
    pub fn streamed_content(&self) -> String {
        read_or_recover(&self.streamed_content, String::clone)
    }

    /// The notice recorded for the most recently failed operation, if any.
    pub fn last_notice(&self) -> Option<Notice> {
        read_or_recover(&self.last_notice, Option::clone)
    }

    /// Marks the one-shot path busy; the returned guard resets the flag on
    /// every exit path, including early returns and panics.
    pub(crate) fn begin_loading(&self) -> BusyGuard<'_> {
        self.loading.store(true, Ordering::SeqCst);
        BusyGuard { flag: &self.loading }
    }

    /// Marks the streaming path busy and clears any stale accumulated text.
    pub(crate) fn begin_streaming(&self) -> BusyGuard<'_> {
        write_or_recover(&self.streamed_content, String::clear);
        self.streaming.store(true, Ordering::SeqCst);
        BusyGuard {
            flag: &self.streaming,
        }
    }

    pub(crate) fn append_delta(&self, delta: &str) {
        write_or_recover(&self.streamed_content, |content| content.push_str(delta));
    }

    pub(crate) fn record_notice(&self, notice: Notice) {
        write_or_recover(&self.last_notice, |slot| *slot = Some(notice.clone()));
    }
}

/// Resets its busy flag when dropped, giving every operation a guaranteed
/// cleanup step regardless of how it settles.
pub(crate) struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

// Lock poisoning only happens if a holder panicked; the state is still a
// plain value, so recover it rather than propagating the poison.
fn read_or_recover<T, R>(lock: &RwLock<T>, read: impl Fn(&T) -> R) -> R {
    match lock.read() {
        Ok(guard) => read(&guard),
        Err(poisoned) => read(&poisoned.into_inner()),
    }
}

fn write_or_recover<T>(lock: &RwLock<T>, mutate: impl Fn(&mut T)) {
    match lock.write() {
        Ok(mut guard) => mutate(&mut *guard),
        Err(poisoned) => mutate(&mut *poisoned.into_inner()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_guard_resets_flag_on_drop() {
        let state = OperationState::default();
        {
            let _busy = state.begin_loading();
            assert!(state.is_loading());
        }
        assert!(!state.is_loading());
    }

    #[test]
    fn begin_streaming_clears_stale_content() {
        let state = OperationState::default();
        {
            let _busy = state.begin_streaming();
            state.append_delta("first call");
        }
        let _busy = state.begin_streaming();
        assert_eq!(state.streamed_content(), "");
    }

    #[test]
    fn loading_and_streaming_flags_are_independent() {
        let state = OperationState::default();
        let _loading = state.begin_loading();
        let _streaming = state.begin_streaming();
        assert!(state.is_loading());
        assert!(state.is_streaming());
        drop(_loading);
        assert!(!state.is_loading());
        assert!(state.is_streaming());
    }
}
