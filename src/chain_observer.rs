use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use crate::{
    core::next_id,
    kvo::{KeyObservable, EACH_KEY},
    observer_set::ObserverKey,
    subscription::Subscription,
};

#[cfg(test)]
mod tests;

pub type ChainCallback = dyn Fn();

/// Identity shared by a chain template and all of its clones.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ChainId(usize);

/// One hop of a dotted property path such as `@each.price`.
///
/// A chain is created as an unbound template. Binding a node to an object with
/// [`activate`](Self::activate) observes the node's property on that object and binds a
/// clone of the next hop to the object found under that property. An `@each` hop bound
/// to an array hands the rest of the chain to the array, which clones it onto every
/// member.
///
/// Nodes only hold weak references to the objects they observe.
pub struct ChainObserver {
    id: ChainId,
    property: String,
    next: Option<Rc<ChainObserver>>,
    root: Weak<ChainObserver>,
    callback: Rc<ChainCallback>,
    object: RefCell<Option<Weak<dyn KeyObservable>>>,
    registration: Cell<Option<ObserverKey>>,
    is_content: Cell<bool>,
    child: RefCell<Option<Rc<ChainObserver>>>,
}

impl ChainObserver {
    /// Builds an unbound chain for `path`; `callback` is called whenever the value at the
    /// end of the path may have changed.
    pub fn create_chain(path: &str, callback: impl Fn() + 'static) -> Rc<Self> {
        let callback: Rc<ChainCallback> = Rc::new(callback);
        let id = ChainId(next_id());
        let parts: Vec<&str> = path.split('.').collect();
        Rc::new_cyclic(|root| Self::new_node(id, &parts, root, &callback))
    }
    fn new_node(
        id: ChainId,
        parts: &[&str],
        root: &Weak<Self>,
        callback: &Rc<ChainCallback>,
    ) -> Self {
        let next = if parts.len() > 1 {
            Some(Rc::new(Self::new_node(id, &parts[1..], root, callback)))
        } else {
            None
        };
        Self {
            id,
            property: parts[0].to_string(),
            next,
            root: root.clone(),
            callback: callback.clone(),
            object: RefCell::new(None),
            registration: Cell::new(None),
            is_content: Cell::new(false),
            child: RefCell::new(None),
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }
    pub fn chain_id(&self) -> ChainId {
        self.id
    }
    pub fn next(&self) -> Option<&Rc<ChainObserver>> {
        self.next.as_ref()
    }
    /// First node of the template this node was created from.
    pub fn root(&self) -> Option<Rc<ChainObserver>> {
        self.root.upgrade()
    }
    pub fn object(&self) -> Option<Rc<dyn KeyObservable>> {
        self.object.borrow().as_ref()?.upgrade()
    }
    pub fn is_active(&self) -> bool {
        self.object.borrow().is_some()
    }

    /// Terminal node of the chain.
    pub fn tail(self: &Rc<Self>) -> Rc<Self> {
        let mut node = self.clone();
        while let Some(next) = node.next.clone() {
            node = next;
        }
        node
    }

    /// Copy of this node that shares the template's next hop but is not bound to any
    /// object.
    pub fn clone_unbound(&self) -> Rc<Self> {
        Rc::new(Self {
            id: self.id,
            property: self.property.clone(),
            next: self.next.clone(),
            root: self.root.clone(),
            callback: self.callback.clone(),
            object: RefCell::new(None),
            registration: Cell::new(None),
            is_content: Cell::new(false),
            child: RefCell::new(None),
        })
    }

    /// Binds this node to `item` and starts observing.
    pub fn activate(self: &Rc<Self>, item: Rc<dyn KeyObservable>) -> Rc<Self> {
        self.deactivate();
        *self.object.borrow_mut() = Some(Rc::downgrade(&item));
        if self.property == EACH_KEY {
            self.is_content.set(item.add_content_observer(self));
        } else {
            let this = Rc::downgrade(self);
            let key = item.key_observers().add_observer(
                &self.property,
                Rc::new(move |_| {
                    if let Some(this) = this.upgrade() {
                        this.property_did_change();
                    }
                }),
            );
            self.registration.set(Some(key));
            self.bind_child(&item);
        }
        self.clone()
    }

    /// Stops observing and unbinds this node and every hop bound below it.
    pub fn deactivate(self: &Rc<Self>) {
        let object = self.object.borrow_mut().take();
        let child = self.child.borrow_mut().take();
        if let Some(child) = child {
            child.deactivate();
        }
        let registration = self.registration.take();
        let is_content = self.is_content.replace(false);
        let Some(object) = object.and_then(|o| o.upgrade()) else {
            return;
        };
        if is_content {
            object.remove_content_observer(self);
        }
        if let Some(key) = registration {
            object.key_observers().remove_observer(&self.property, key);
        }
    }

    fn bind_child(&self, object: &Rc<dyn KeyObservable>) {
        let Some(next) = &self.next else {
            return;
        };
        let Some(value) = object.observable_at(&self.property) else {
            return;
        };
        let child = next.clone_unbound();
        child.activate(value);
        *self.child.borrow_mut() = Some(child);
    }

    /// Rebinds the hops below this node and calls the chain's callback.
    pub fn property_did_change(self: &Rc<Self>) {
        if self.next.is_some() && self.property != EACH_KEY {
            let child = self.child.borrow_mut().take();
            if let Some(child) = child {
                child.deactivate();
            }
            if let Some(object) = self.object() {
                self.bind_child(&object);
            }
        }
        self.notify_property_did_change();
    }

    /// Calls the chain's callback without rebinding.
    pub fn notify_property_did_change(&self) {
        (self.callback)()
    }
}
impl fmt::Debug for ChainObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainObserver")
            .field("id", &self.id)
            .field("property", &self.property)
            .field("next", &self.next)
            .field("is_active", &self.is_active())
            .finish()
    }
}

/// Observes `path` starting at `target` until the returned subscription is dropped.
pub fn observe_path(
    target: Rc<dyn KeyObservable>,
    path: &str,
    f: impl Fn() + 'static,
) -> Subscription {
    let chain = ChainObserver::create_chain(path, f);
    chain.activate(target);
    Subscription::from_fn(move || chain.deactivate())
}
