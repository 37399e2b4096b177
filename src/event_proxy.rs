use std::{
    cell::RefCell,
    collections::HashMap,
    future::Future,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;
use futures::future::{join_all, select_all};

use crate::utils::sync::{Settled, Settler, settle_once};

#[cfg(test)]
mod tests;

pub type Handler<T> = Rc<dyn Fn(T)>;

struct ProxyEntry<T> {
    settler: Settler<T>,
    settled: Settled<T>,
    handler: Handler<T>,
}

struct ProxyData<T> {
    entries: HashMap<String, ProxyEntry<T>>,
    filters: HashMap<String, Rc<dyn Fn(&T) -> bool>>,
}

/// Collects named events so that a producer can await them.
///
/// Handlers are created on first request and cached by name.
/// The first accepted event of each name settles its wait; later events are ignored.
#[derive_ex(Clone(bound()), Default(bound()))]
#[default(Self::new())]
pub struct EventProxy<T: 'static>(Rc<RefCell<ProxyData<T>>>);

impl<T: 'static> EventProxy<T> {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(ProxyData {
            entries: HashMap::new(),
            filters: HashMap::new(),
        })))
    }
}

impl<T: Clone + 'static> EventProxy<T> {
    fn entry<U>(&self, name: &str, f: impl FnOnce(&ProxyEntry<T>) -> U) -> U {
        let mut d = self.0.borrow_mut();
        if !d.entries.contains_key(name) {
            let (settler, settled) = settle_once();
            let handler = Self::bind(Rc::downgrade(&self.0), name.to_owned());
            d.entries.insert(
                name.to_owned(),
                ProxyEntry {
                    settler,
                    settled,
                    handler,
                },
            );
        }
        f(&d.entries[name])
    }

    fn bind(proxy: Weak<RefCell<ProxyData<T>>>, name: String) -> Handler<T> {
        Rc::new(move |value: T| {
            let Some(proxy) = proxy.upgrade() else {
                return;
            };
            let filter = proxy.borrow().filters.get(&name).cloned();
            if let Some(filter) = filter {
                if !filter(&value) {
                    return;
                }
            }
            if let Some(entry) = proxy.borrow().entries.get(&name) {
                entry.settler.settle(value);
            }
        })
    }

    /// Returns the handler for `name`, creating it on first request.
    pub fn handler(&self, name: &str) -> Handler<T> {
        self.entry(name, |e| e.handler.clone())
    }

    /// Only events of `name` satisfying `predicate` settle its wait.
    pub fn filter(&self, name: &str, predicate: impl Fn(&T) -> bool + 'static) {
        self.0
            .borrow_mut()
            .filters
            .insert(name.to_owned(), Rc::new(predicate));
    }

    pub fn is_fired(&self, name: &str) -> bool {
        self.entry(name, |e| e.settler.is_settled())
    }
    pub fn value(&self, name: &str) -> Option<T> {
        self.entry(name, |e| e.settled.get())
    }

    /// Waits for the first accepted event of `name`.
    ///
    /// Resolves to `None` if the proxy is dropped first.
    pub fn wait(&self, name: &str) -> impl Future<Output = Option<T>> + use<T> {
        let settled = self.entry(name, |e| e.settled.clone());
        async move { settled.wait().await }
    }

    /// Waits for the first event among `names`.
    pub async fn any(&self, names: &[&str]) -> Option<T> {
        if names.is_empty() {
            return None;
        }
        let waits = names.iter().map(|name| Box::pin(self.wait(name)));
        select_all(waits).await.0
    }

    /// Waits for an event of every name in `names`.
    pub async fn all(&self, names: &[&str]) -> Option<Vec<T>> {
        let waits: Vec<_> = names.iter().map(|name| self.wait(name)).collect();
        join_all(waits).await.into_iter().collect()
    }
}
