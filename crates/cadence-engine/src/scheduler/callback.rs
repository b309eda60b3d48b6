use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::time::Timestamp;

/// Directive returned by a frame callback.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameControl {
    /// Keep the callback registered.
    Continue,
    /// Unregister the callback after this invocation.
    Remove,
}

type CallbackFn = dyn FnMut(Timestamp) -> FrameControl;

/// Shared handle to a frame callback.
///
/// Clones refer to the same callback. Identity, not behavior, decides
/// equality: two handles are equal only if one was cloned from the other.
/// The handle returned by [`FrameScheduler::add_callback`] is the token
/// used to remove the callback later.
///
/// [`FrameScheduler::add_callback`]: super::FrameScheduler::add_callback
#[derive(Clone)]
pub struct FrameCallback(Rc<RefCell<CallbackFn>>);

impl FrameCallback {
    /// Wraps a callback that stays registered until removed.
    pub fn new<F>(mut f: F) -> Self
    where
        F: FnMut(Timestamp) + 'static,
    {
        Self::with_control(move |t| {
            f(t);
            FrameControl::Continue
        })
    }

    /// Wraps a callback that decides after each frame whether to stay.
    pub fn with_control<F>(f: F) -> Self
    where
        F: FnMut(Timestamp) -> FrameControl + 'static,
    {
        Self(Rc::new(RefCell::new(f)))
    }

    /// Returns true if both handles refer to the same callback.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Invokes the callback, or returns `None` if it is already running
    /// further up the stack.
    pub(crate) fn invoke(&self, timestamp: Timestamp) -> Option<FrameControl> {
        let mut f = self.0.try_borrow_mut().ok()?;
        Some((*f)(timestamp))
    }
}

impl PartialEq for FrameCallback {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for FrameCallback {}

impl fmt::Debug for FrameCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FrameCallback")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}
