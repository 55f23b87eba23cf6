//! Panic trapping
//!
//! A process panic hook is installed once. While a trap is armed on the
//! current thread the hook records the panic location and a backtrace into a
//! thread-local slot and stays silent; otherwise it defers to whatever hook
//! was installed before it.
//!
//! The hook runs on the panicking thread before unwinding starts, and the
//! `catch_unwind` that stops the unwind runs on that same thread within the
//! same call, so the slot never crosses requests.

use crate::report::SourceLocation;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::Once;
use std::task::Poll;

thread_local! {
    static ARMED: Cell<usize> = const { Cell::new(0) };
    static CAPTURED: RefCell<Option<Captured>> = const { RefCell::new(None) };
}

static INSTALL: Once = Once::new();

struct Captured {
    message: Option<String>,
    location: Option<SourceLocation>,
    backtrace: String,
}

/// A panic stopped by [`catch`] or [`catch_future`]
pub struct Trapped {
    pub payload: Box<dyn Any + Send>,
    pub location: Option<SourceLocation>,
    pub backtrace: String,
}

impl Trapped {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        // `resume_unwind` skips the hook, so the slot may hold a panic the
        // handler already caught; only trust it when the messages agree.
        let captured =
            take_captured().filter(|captured| captured.message.as_deref() == message(&*payload));
        match captured {
            Some(captured) => Self {
                payload,
                location: captured.location,
                backtrace: captured.backtrace,
            },
            // Another hook replaced ours, or the payload was rethrown; the
            // trap point is the best we have.
            None => Self {
                payload,
                location: None,
                backtrace: Backtrace::force_capture().to_string(),
            },
        }
    }
}

impl std::fmt::Debug for Trapped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trapped")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Install the recording hook. Idempotent.
pub fn install_hook() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if is_armed() {
                record(info);
            } else {
                previous(info);
            }
        }));
    });
}

fn is_armed() -> bool {
    ARMED.try_with(Cell::get).unwrap_or(0) > 0
}

fn record(info: &PanicHookInfo<'_>) {
    let captured = Captured {
        message: message(info.payload()).map(str::to_owned),
        location: info.location().map(SourceLocation::from),
        backtrace: Backtrace::force_capture().to_string(),
    };
    let _ = CAPTURED.try_with(|slot| {
        if let Ok(mut slot) = slot.try_borrow_mut() {
            *slot = Some(captured);
        }
    });
}

fn message(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}

fn take_captured() -> Option<Captured> {
    CAPTURED
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
        .ok()
        .flatten()
}

/// Arms the trap on the current thread until dropped.
struct Armed {
    // tied to the thread whose counter it bumped
    _thread: PhantomData<*const ()>,
}

impl Armed {
    fn arm() -> Self {
        ARMED.with(|depth| {
            if depth.get() == 0 {
                // stale capture from a panic some inner code caught itself
                let _ = take_captured();
            }
            depth.set(depth.get() + 1);
        });
        Self {
            _thread: PhantomData,
        }
    }
}

impl Drop for Armed {
    fn drop(&mut self) {
        let _ = ARMED.try_with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run `f`, trapping any panic it raises.
pub fn catch<R>(f: impl FnOnce() -> R) -> Result<R, Trapped> {
    install_hook();
    let armed = Armed::arm();
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    drop(armed);
    result.map_err(Trapped::from_payload)
}

/// Drive `future` to completion, trapping a panic raised by any of its polls.
///
/// A future that panicked is never polled again.
pub async fn catch_future<F: Future>(future: F) -> Result<F::Output, Trapped> {
    let mut future = std::pin::pin!(future);
    std::future::poll_fn(move |cx| match catch(|| future.as_mut().poll(cx)) {
        Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
        Ok(Poll::Pending) => Poll::Pending,
        Err(trapped) => Poll::Ready(Err(trapped)),
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_passes_through_values() {
        let result = catch(|| 40 + 2);
        assert_eq!(result.unwrap(), 42);
        assert!(!is_armed());
    }

    #[test]
    fn test_catch_records_location_and_backtrace() {
        let line = line!() + 1;
        let trapped = catch(|| panic!("boom")).unwrap_err();

        let location = trapped.location.as_ref().unwrap();
        assert!(location.file.ends_with("trap/mod.rs"), "{}", location.file);
        assert_eq!(location.line, line);
        assert!(!trapped.backtrace.is_empty());
        assert_eq!(trapped.payload.downcast_ref::<&str>(), Some(&"boom"));
        assert!(!is_armed());
    }

    #[test]
    fn test_formatted_message_keeps_location() {
        let code = 7;
        let line = line!() + 1;
        let trapped = catch(|| panic!("code {}", code)).unwrap_err();
        assert_eq!(trapped.location.unwrap().line, line);
        assert_eq!(message(&*trapped.payload), Some("code 7"));
    }

    #[test]
    fn test_rethrown_payload_does_not_inherit_handled_location() {
        let trapped = catch(|| {
            let handled = panic::catch_unwind(|| panic!("handled inside"));
            assert!(handled.is_err());
            panic::resume_unwind(Box::new("rethrown"));
        })
        .unwrap_err();

        assert_eq!(trapped.payload.downcast_ref::<&str>(), Some(&"rethrown"));
        assert!(trapped.location.is_none());
        assert!(!trapped.backtrace.is_empty());
        assert!(!is_armed());
    }

    #[test]
    fn test_nested_catch_keeps_outer_armed() {
        let outer = catch(|| {
            let inner = catch(|| panic!("inner"));
            assert!(inner.is_err());
            assert!(is_armed());
            panic!("outer");
        })
        .unwrap_err();

        assert_eq!(outer.payload.downcast_ref::<&str>(), Some(&"outer"));
        assert!(!is_armed());
    }

    #[tokio::test]
    async fn test_catch_future_across_yields() {
        let line = line!() + 3;
        let trapped = catch_future(async {
            tokio::task::yield_now().await;
            panic!("after yield");
        })
        .await
        .unwrap_err();

        assert_eq!(trapped.location.unwrap().line, line);
        assert_eq!(trapped.payload.downcast_ref::<&str>(), Some(&"after yield"));
    }

    #[tokio::test]
    async fn test_catch_future_ok() {
        let value = catch_future(async {
            tokio::task::yield_now().await;
            "done"
        })
        .await
        .unwrap();
        assert_eq!(value, "done");
    }
}
