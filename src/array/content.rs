use std::collections::VecDeque;

/// Storage behind an [`ObservableArray`](super::ObservableArray).
///
/// Read access is required. Storage that can be modified also implements
/// [`ReplaceContent`] and returns itself from [`as_replaceable`](Self::as_replaceable);
/// the array reports every modifying operation on other storage as an error.
pub trait ArrayContent<T>: 'static {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn object_at(&self, index: usize) -> Option<T>;

    fn as_replaceable(&mut self) -> Option<&mut dyn ReplaceContent<T>> {
        None
    }
}

/// The splice primitive every modifying array operation is built on.
pub trait ReplaceContent<T> {
    /// Replaces `removed` elements starting at `index` with `objects`.
    ///
    /// Callers guarantee `index <= len` and `index + removed <= len`.
    fn replace(&mut self, index: usize, removed: usize, objects: Vec<T>);
}

impl<T: Clone + 'static> ArrayContent<T> for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }
    fn object_at(&self, index: usize) -> Option<T> {
        self.get(index).cloned()
    }
    fn as_replaceable(&mut self) -> Option<&mut dyn ReplaceContent<T>> {
        Some(self)
    }
}
impl<T> ReplaceContent<T> for Vec<T> {
    fn replace(&mut self, index: usize, removed: usize, objects: Vec<T>) {
        self.splice(index..index + removed, objects);
    }
}

impl<T: Clone + 'static> ArrayContent<T> for VecDeque<T> {
    fn len(&self) -> usize {
        VecDeque::len(self)
    }
    fn object_at(&self, index: usize) -> Option<T> {
        self.get(index).cloned()
    }
    fn as_replaceable(&mut self) -> Option<&mut dyn ReplaceContent<T>> {
        Some(self)
    }
}
impl<T> ReplaceContent<T> for VecDeque<T> {
    fn replace(&mut self, index: usize, removed: usize, objects: Vec<T>) {
        if index == 0 && removed == 0 {
            for object in objects.into_iter().rev() {
                self.push_front(object);
            }
            return;
        }
        let tail = self.split_off(index + removed);
        self.truncate(index);
        self.extend(objects);
        self.extend(tail);
    }
}

impl<T: Clone + 'static> ArrayContent<T> for &'static [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }
    fn object_at(&self, index: usize) -> Option<T> {
        self.get(index).cloned()
    }
}
