use std::{
    cell::{Ref, RefCell},
    rc::{Rc, Weak},
    time::Duration,
};

use derive_ex::derive_ex;
use futures::{
    future::{LocalBoxFuture, RemoteHandle},
    task::LocalSpawnExt,
};

use crate::{BoxError, Spawner, utils::timer::sleep};

#[cfg(test)]
mod tests;

pub type CompareFn<T> = Rc<dyn Fn(&T, &T) -> bool>;
pub type MergeFn<T> = Rc<dyn Fn(&T, &T, &T) -> T>;
pub type SaveFn<T> = Rc<dyn Fn(T, T) -> LocalBoxFuture<'static, Result<T, BoxError>>>;

/// Callbacks customizing a [`SaveBuffer`].
#[derive_ex(Clone(bound()), Default(bound()))]
pub struct SaveBufferOptions<T: 'static> {
    /// Returns `true` if two values are equivalent. Defaults to `PartialEq`.
    pub compare: Option<CompareFn<T>>,

    /// Merges local edits with a new upstream value: `merge(base, ours, theirs)`.
    /// Without it, local edits win.
    pub merge: Option<MergeFn<T>>,

    /// Persists `ours` given the upstream `base`, returning the saved value.
    /// Without it, saving only commits the local value.
    pub save: Option<SaveFn<T>>,

    /// Saves automatically once edits have been idle for this long.
    pub autosave: Option<Duration>,
}
impl<T: 'static> SaveBufferOptions<T> {
    pub fn with_compare(mut self, f: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.compare = Some(Rc::new(f));
        self
    }
    pub fn with_merge(mut self, f: impl Fn(&T, &T, &T) -> T + 'static) -> Self {
        self.merge = Some(Rc::new(f));
        self
    }
    pub fn with_save(
        mut self,
        f: impl Fn(T, T) -> LocalBoxFuture<'static, Result<T, BoxError>> + 'static,
    ) -> Self {
        self.save = Some(Rc::new(f));
        self
    }
    pub fn with_autosave(mut self, delay: Duration) -> Self {
        self.autosave = Some(delay);
        self
    }
}

/// Local edits of an upstream value, kept until saved and rebased when the upstream changes.
#[derive_ex(Clone(bound()))]
pub struct SaveBuffer<T: 'static>(Rc<SaveBufferNode<T>>);

struct SaveBufferNode<T: 'static> {
    options: SaveBufferOptions<T>,
    spawner: Spawner,
    updater: RefCell<Option<Rc<dyn Fn()>>>,
    data: RefCell<SaveBufferData<T>>,
}

struct SaveBufferData<T> {
    original: Option<T>,
    current: Option<T>,
    changed: bool,
    saving: bool,
    autosave: Option<RemoteHandle<()>>,
    autosave_seq: u64,
}
impl<T> SaveBufferData<T> {
    fn cancel_autosave(&mut self) {
        self.autosave_seq = self.autosave_seq.wrapping_add(1);
        self.autosave = None;
    }
}

impl<T: Clone + PartialEq + 'static> SaveBuffer<T> {
    /// Creates an empty buffer. `updater` is called whenever the buffer changes.
    pub fn new(options: SaveBufferOptions<T>, spawner: Spawner, updater: impl Fn() + 'static) -> Self {
        Self(Rc::new(SaveBufferNode {
            options,
            spawner,
            updater: RefCell::new(Some(Rc::new(updater))),
            data: RefCell::new(SaveBufferData {
                original: None,
                current: None,
                changed: false,
                saving: false,
                autosave: None,
                autosave_seq: 0,
            }),
        }))
    }

    fn data(&self) -> Ref<'_, SaveBufferData<T>> {
        self.0.data.borrow()
    }
    fn same(&self, a: &T, b: &T) -> bool {
        match &self.0.options.compare {
            Some(compare) => compare(a, b),
            None => a == b,
        }
    }
    fn notify(&self) {
        let updater = self.0.updater.borrow().clone();
        if let Some(updater) = updater {
            updater();
        }
    }

    /// Returns `true` once an upstream value has been received.
    pub fn is_ready(&self) -> bool {
        self.data().original.is_some()
    }
    pub fn is_changed(&self) -> bool {
        self.data().changed
    }
    pub fn is_saving(&self) -> bool {
        self.data().saving
    }
    pub fn current(&self) -> Option<T> {
        self.data().current.clone()
    }
    pub fn original(&self) -> Option<T> {
        self.data().original.clone()
    }

    /// Receives the upstream value.
    ///
    /// Without local edits the buffer follows upstream.
    /// With local edits the new value is merged into them.
    pub fn base(&self, theirs: T) {
        let (original, current, changed) = {
            let d = self.data();
            (d.original.clone(), d.current.clone(), d.changed)
        };
        let (next, changed) = match (original, current) {
            (Some(base), _) if self.same(&base, &theirs) => {
                self.0.data.borrow_mut().original = Some(theirs);
                return;
            }
            (Some(base), Some(ours)) if changed => {
                let next = match &self.0.options.merge {
                    Some(merge) => merge(&base, &ours, &theirs),
                    None => ours,
                };
                let changed = !self.same(&theirs, &next);
                (next, changed)
            }
            _ => (theirs.clone(), false),
        };
        {
            let d = &mut *self.0.data.borrow_mut();
            d.original = Some(theirs);
            d.current = Some(next);
            d.changed = changed;
            if !changed {
                d.cancel_autosave();
            }
        }
        self.notify();
    }

    /// Replaces the local value.
    pub fn set(&self, ours: T) {
        let (original, current) = {
            let d = self.data();
            (d.original.clone(), d.current.clone())
        };
        if current.as_ref() == Some(&ours) {
            return;
        }
        let changed = original.is_none_or(|original| !self.same(&original, &ours));
        {
            let d = &mut *self.0.data.borrow_mut();
            d.current = Some(ours);
            d.changed = changed;
            d.cancel_autosave();
            if changed {
                if let Some(delay) = self.0.options.autosave {
                    self.schedule_autosave(d, delay);
                }
            }
        }
        self.notify();
    }

    /// Discards local edits.
    pub fn reset(&self) {
        {
            let d = &mut *self.0.data.borrow_mut();
            if !d.changed {
                return;
            }
            d.current = d.original.clone();
            d.changed = false;
            d.cancel_autosave();
        }
        self.notify();
    }

    /// Saves local edits. Does nothing if there are none or a save is in progress.
    pub async fn save(&self) -> Result<(), BoxError> {
        let (base, ours) = {
            let d = &mut *self.0.data.borrow_mut();
            if !d.changed || d.saving {
                return Ok(());
            }
            let Some(ours) = d.current.clone() else {
                return Ok(());
            };
            d.cancel_autosave();
            d.saving = true;
            (d.original.clone().unwrap_or_else(|| ours.clone()), ours)
        };
        self.notify();
        let result = match &self.0.options.save {
            Some(save) => save(base, ours.clone()).await,
            None => Ok(ours.clone()),
        };
        let current = self.current();
        let edited = current.as_ref() != Some(&ours);
        let changed = match (&result, &current) {
            (Ok(saved), Some(current)) if edited => !self.same(saved, current),
            (Ok(_), _) => false,
            (Err(_), _) => true,
        };
        {
            let d = &mut *self.0.data.borrow_mut();
            d.saving = false;
            if let Ok(saved) = &result {
                d.original = Some(saved.clone());
                if !edited {
                    d.current = Some(saved.clone());
                }
            }
            d.changed = changed;
        }
        self.notify();
        result.map(|_| ())
    }

    fn schedule_autosave(&self, d: &mut SaveBufferData<T>, delay: Duration) {
        let seq = d.autosave_seq;
        let node: Weak<SaveBufferNode<T>> = Rc::downgrade(&self.0);
        let task = async move {
            sleep(delay).await;
            let Some(node) = node.upgrade() else {
                return;
            };
            let this = SaveBuffer(node);
            {
                let d = &mut *this.0.data.borrow_mut();
                if d.autosave_seq != seq {
                    return;
                }
                // This task is running; keep it alive while `save` clears the handle.
                if let Some(handle) = d.autosave.take() {
                    handle.forget();
                }
            }
            if let Err(e) = this.save().await {
                tracing::warn!("autosave failed: {e}");
            }
        };
        match self.0.spawner.spawn_local_with_handle(task) {
            Ok(handle) => d.autosave = Some(handle),
            Err(e) => tracing::warn!("cannot schedule autosave: {e}"),
        }
    }

    /// Stops notifying the host and cancels a pending autosave.
    pub fn detach(&self) {
        self.0.updater.borrow_mut().take();
        self.0.data.borrow_mut().cancel_autosave();
    }
}
