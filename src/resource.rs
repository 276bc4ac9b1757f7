//! Ownership-tagged resource wrapper
//!
//! A [`ManagedResource`] pairs a value with an ownership tag. Owned values are
//! released (their release hook runs, then they are dropped) when the resource
//! is replaced, released, or dropped. Borrowed values are left alone: the hook
//! never runs for them, and `release` keeps them in place.
//!
//! The agent uses this to hold its configuration, which may either be adopted
//! from a loader (owned) or supplied by the embedding application (borrowed).

type ReleaseHook<T> = Box<dyn FnOnce(T) + Send>;

/// A value slot that tracks whether the holder is responsible for releasing
/// the value.
pub struct ManagedResource<T> {
    value: Option<T>,
    owned: bool,
    release: Option<ReleaseHook<T>>,
}

impl<T> ManagedResource<T> {
    /// Create an empty resource. Releasing an empty resource is a no-op.
    pub fn empty() -> Self {
        Self {
            value: None,
            owned: false,
            release: None,
        }
    }

    /// Store `value` and take ownership of it. Any previously owned value is
    /// released first; a previously borrowed value is detached.
    ///
    /// Returns a mutable reference to the stored value.
    pub fn move_into(&mut self, value: T) -> &mut T {
        self.release();
        self.release = None;
        self.owned = true;
        self.value.insert(value)
    }

    /// Like [`move_into`](Self::move_into), but runs `release` on the value
    /// when it is eventually released.
    pub fn move_into_with(
        &mut self,
        value: T,
        release: impl FnOnce(T) + Send + 'static,
    ) -> &mut T {
        self.release();
        self.release = Some(Box::new(release));
        self.owned = true;
        self.value.insert(value)
    }

    /// Store `value` without taking ownership. The release hook never runs
    /// for a borrowed value.
    pub fn set_borrowed(&mut self, value: T) {
        self.release();
        self.release = None;
        self.owned = false;
        self.value = Some(value);
    }

    /// Release the held value if it is owned: the release hook runs once and
    /// the slot becomes empty. Idempotent. Borrowed values stay in place.
    pub fn release(&mut self) {
        if !self.owned {
            return;
        }
        if let Some(value) = self.value.take() {
            if let Some(hook) = self.release.take() {
                hook(value);
            }
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

impl<T> Default for ManagedResource<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Drop for ManagedResource<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> std::fmt::Debug for ManagedResource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedResource")
            .field("present", &self.value.is_some())
            .field("owned", &self.owned)
            .finish()
    }
}
