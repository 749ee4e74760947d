use crate::core::Severity;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{Instant, sleep_until};
use uuid::Uuid;

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(5000);

/// Callback run when a confirmation resolves
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// A transient user-facing message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub id: Uuid,
    pub message: String,
    pub severity: Severity,
    /// `None` never expires on its own
    pub duration: Option<Duration>,
}

/// A pending yes/no question guarding a destructive action
pub struct Confirmation {
    pub title: String,
    pub message: String,
    on_confirm: Option<Callback>,
    on_cancel: Option<Callback>,
}

impl Confirmation {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            on_confirm: None,
            on_cancel: None,
        }
    }

    pub fn on_confirm(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_confirm = Some(Box::new(f));
        self
    }

    pub fn on_cancel(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Confirmation")
            .field("title", &self.title)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Title and message of the pending confirmation, for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationPrompt {
    pub title: String,
    pub message: String,
}

#[derive(Default)]
struct Inner {
    toasts: Vec<Toast>,
    confirmation: Option<Confirmation>,
}

/// Toast queue plus the single confirmation slot.
///
/// Cloning shares the same queue. Toast expiry is scheduled on the ambient
/// tokio runtime; outside a runtime toasts only leave through
/// [`NotificationCenter::remove_toast`]. Callbacks always run after the
/// internal lock is released, so they may notify again.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Mutex<Inner>>,
    default_duration: Duration,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_DURATION)
    }
}

impl NotificationCenter {
    pub fn new(default_duration: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            default_duration,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a toast with the default duration
    pub fn add_toast(&self, message: impl Into<String>, severity: Severity) -> Uuid {
        self.push(message.into(), severity, Some(self.default_duration))
    }

    pub fn add_toast_for(&self, message: impl Into<String>, severity: Severity, duration: Duration) -> Uuid {
        self.push(message.into(), severity, Some(duration))
    }

    /// Enqueue a toast that stays until dismissed
    pub fn add_sticky(&self, message: impl Into<String>, severity: Severity) -> Uuid {
        self.push(message.into(), severity, None)
    }

    fn push(&self, message: String, severity: Severity, duration: Option<Duration>) -> Uuid {
        let id = Uuid::new_v4();
        match severity {
            Severity::Error => tracing::warn!("Toast [{}]: {}", severity, message),
            _ => tracing::debug!("Toast [{}]: {}", severity, message),
        }
        self.lock().toasts.push(Toast {
            id,
            message,
            severity,
            duration,
        });

        if let Some(duration) = duration {
            let deadline = Instant::now() + duration;
            match Handle::try_current() {
                Ok(handle) => {
                    let center = self.clone();
                    handle.spawn(async move {
                        sleep_until(deadline).await;
                        center.remove_toast(id);
                    });
                }
                Err(_) => tracing::debug!("No runtime, toast {} will not expire", id),
            }
        }
        id
    }

    /// Dismiss a toast; returns false when it was already gone
    pub fn remove_toast(&self, id: Uuid) -> bool {
        let mut inner = self.lock();
        let before = inner.toasts.len();
        inner.toasts.retain(|t| t.id != id);
        inner.toasts.len() != before
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.lock().toasts.clone()
    }

    /// Open a confirmation, replacing (and cancelling) any pending one
    pub fn show_confirm(&self, confirmation: Confirmation) {
        let replaced = self.lock().confirmation.replace(confirmation);
        if let Some(old) = replaced {
            tracing::debug!("Confirmation '{}' replaced before it resolved", old.title);
            if let Some(cancel) = old.on_cancel {
                cancel();
            }
        }
    }

    pub fn pending_confirmation(&self) -> Option<ConfirmationPrompt> {
        self.lock().confirmation.as_ref().map(|c| ConfirmationPrompt {
            title: c.title.clone(),
            message: c.message.clone(),
        })
    }

    /// Resolve the pending confirmation positively. Returns false if none was open.
    pub fn confirm(&self) -> bool {
        let taken = self.lock().confirmation.take();
        match taken {
            Some(c) => {
                if let Some(f) = c.on_confirm {
                    f();
                }
                true
            }
            None => false,
        }
    }

    /// Resolve the pending confirmation negatively. Returns false if none was open.
    pub fn cancel(&self) -> bool {
        let taken = self.lock().confirmation.take();
        match taken {
            Some(c) => {
                if let Some(f) = c.on_cancel {
                    f();
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_toast_expires_after_duration() {
        let center = NotificationCenter::default();
        let id = center.add_toast_for("Saved", Severity::Success, Duration::from_millis(3000));

        tokio::time::advance(Duration::from_millis(2999)).await;
        tokio::task::yield_now().await;
        assert!(center.toasts().iter().any(|t| t.id == id));

        tokio::time::advance(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert!(center.toasts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sticky_toast_needs_dismissal() {
        let center = NotificationCenter::default();
        let id = center.add_sticky("Heads up", Severity::Warning);
        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(center.toasts().len(), 1);
        assert!(center.remove_toast(id));
        assert!(!center.remove_toast(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_dismissal_then_expiry_is_harmless() {
        let center = NotificationCenter::default();
        let id = center.add_toast("Gone soon", Severity::Info);
        assert!(center.remove_toast(id));
        tokio::time::advance(DEFAULT_TOAST_DURATION).await;
        tokio::task::yield_now().await;
        assert!(center.toasts().is_empty());
    }

    #[test]
    fn test_confirmation_runs_exactly_one_callback() {
        let center = NotificationCenter::default();
        let confirmed = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicUsize::new(0));

        let (c, x) = (confirmed.clone(), cancelled.clone());
        center.show_confirm(
            Confirmation::new("Delete run", "This cannot be undone")
                .on_confirm(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .on_cancel(move || {
                    x.fetch_add(1, Ordering::SeqCst);
                }),
        );
        assert_eq!(center.pending_confirmation().unwrap().title, "Delete run");
        assert!(center.confirm());
        assert!(!center.confirm());
        assert!(!center.cancel());
        assert_eq!(confirmed.load(Ordering::SeqCst), 1);
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);
        assert!(center.pending_confirmation().is_none());
    }

    #[test]
    fn test_replacing_confirmation_cancels_previous() {
        let center = NotificationCenter::default();
        let cancelled = Arc::new(AtomicUsize::new(0));
        let x = cancelled.clone();
        center.show_confirm(Confirmation::new("First", "").on_cancel(move || {
            x.fetch_add(1, Ordering::SeqCst);
        }));
        center.show_confirm(Confirmation::new("Second", ""));
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(center.pending_confirmation().unwrap().title, "Second");
    }

    #[test]
    fn test_callback_may_notify_again() {
        let center = NotificationCenter::default();
        let inner = center.clone();
        center.show_confirm(Confirmation::new("Purge", "Wipe everything?").on_confirm(move || {
            inner.add_sticky("Purged", Severity::Success);
        }));
        assert!(center.confirm());
        assert_eq!(center.toasts().len(), 1);
    }
}
