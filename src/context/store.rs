//! Request-scoped typed key/value store.
//!
//! Values are keyed by their type, the same way request extensions work:
//! define a small newtype per piece of data a handler hands to the next one.

use axum::http::Extensions;

#[derive(Debug, Default)]
pub struct Store {
    inner: Extensions,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value of the same type.
    pub fn set<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.inner.insert(value)
    }

    /// `None` means "never set", distinct from a stored empty value.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.inner.get::<T>()
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.inner.get_mut::<T>()
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.inner.remove::<T>()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.inner.get::<T>().is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Identity(String);

    #[derive(Clone, Debug, PartialEq)]
    struct Tags(Vec<String>);

    #[test]
    fn test_absent_vs_empty() {
        let mut store = Store::new();
        assert!(store.get::<Tags>().is_none());

        store.set(Tags(Vec::new()));
        assert_eq!(store.get::<Tags>(), Some(&Tags(Vec::new())));
        assert!(store.contains::<Tags>());
    }

    #[test]
    fn test_set_replaces_and_clear_wipes() {
        let mut store = Store::new();
        assert!(store.set(Identity("alice".into())).is_none());
        assert_eq!(store.set(Identity("bob".into())), Some(Identity("alice".into())));
        store.set(Tags(vec!["admin".into()]));
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
        assert!(store.get::<Identity>().is_none());
    }
}
