use std::fmt;

type SuccessHook<T> = Box<dyn Fn(&T) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&str) + Send + Sync>;
type CancelHook = Box<dyn Fn() + Send + Sync>;

/// Hooks fired when a run of the current generation settles
///
/// ```
/// use opslot::OperationCallbacks;
///
/// let callbacks = OperationCallbacks::<String>::default()
///     .on_success(|saved| println!("saved {saved}"))
///     .on_error(|message| eprintln!("failed: {message}"));
/// ```
pub struct OperationCallbacks<T> {
    on_success: Option<SuccessHook<T>>,
    on_error: Option<ErrorHook>,
    on_cancel: Option<CancelHook>,
}

impl<T> Default for OperationCallbacks<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
            on_cancel: None,
        }
    }
}

impl<T> OperationCallbacks<T> {
    pub fn on_success(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    /// Receives the error's display text
    pub fn on_error(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    pub fn on_cancel(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_cancel = Some(Box::new(hook));
        self
    }

    pub(crate) fn succeeded(&self, data: &T) {
        if let Some(hook) = &self.on_success {
            hook(data);
        }
    }

    pub(crate) fn failed(&self, message: &str) {
        if let Some(hook) = &self.on_error {
            hook(message);
        }
    }

    pub(crate) fn cancelled(&self) {
        if let Some(hook) = &self.on_cancel {
            hook();
        }
    }
}

impl<T> fmt::Debug for OperationCallbacks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationCallbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .finish()
    }
}
