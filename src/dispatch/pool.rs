//! Pool of reusable execution contexts.
//!
//! # Responsibilities
//! - Hand out a context per request, allocating only when the pool is empty
//! - Take contexts back when the request is done
//! - Cap the number of idle contexts kept around
//!
//! # Design Decisions
//! - One mutex-guarded free list; the lock is held only to push/pop
//! - Contexts are homogeneous, any idle one can serve any request
//! - RAII guard returns the context on drop, even if a handler panics;
//!   on unwind it still runs `ContextExt::request_end`

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use crate::context::{Context, ContextExt};
use crate::observability::metrics;

/// Factory for the host extension stored in each context.
pub type ContextFactory<E> = Arc<dyn Fn() -> E + Send + Sync>;

pub struct ContextPool<E> {
    free: Mutex<Vec<Box<Context<E>>>>,
    factory: ContextFactory<E>,
    params_capacity: usize,
    max_idle: usize,
}

impl<E: ContextExt> ContextPool<E> {
    pub fn new(factory: ContextFactory<E>, max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            factory,
            params_capacity: 0,
            max_idle,
        }
    }

    pub(crate) fn set_params_capacity(&mut self, capacity: usize) {
        self.params_capacity = capacity;
    }

    pub(crate) fn set_factory(&mut self, factory: ContextFactory<E>) {
        self.factory = factory;
        self.free
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub(crate) fn set_max_idle(&mut self, max_idle: usize) {
        self.max_idle = max_idle;
    }

    /// Take an idle context or build a new one.
    pub fn acquire(&self) -> PooledContext<'_, E> {
        let idle = self
            .free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();

        let mut context = match idle {
            Some(context) => context,
            None => {
                metrics::record_context_allocation();
                Box::new(Context::new((self.factory)(), self.params_capacity))
            }
        };
        context.reserve_params(self.params_capacity);

        PooledContext {
            pool: self,
            context: Some(context),
        }
    }

    fn release(&self, context: Box<Context<E>>) {
        let mut free = self
            .free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if free.len() < self.max_idle {
            free.push(context);
        }
    }

    /// Number of idle contexts.
    pub fn idle(&self) -> usize {
        self.free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// A context on loan from the pool; returned when dropped.
pub struct PooledContext<'p, E: ContextExt> {
    pool: &'p ContextPool<E>,
    context: Option<Box<Context<E>>>,
}

impl<E: ContextExt> Deref for PooledContext<'_, E> {
    type Target = Context<E>;

    fn deref(&self) -> &Self::Target {
        self.context
            .as_deref()
            .expect("pooled context is present until drop")
    }
}

impl<E: ContextExt> DerefMut for PooledContext<'_, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
            .as_deref_mut()
            .expect("pooled context is present until drop")
    }
}

impl<E: ContextExt> Drop for PooledContext<'_, E> {
    fn drop(&mut self) {
        if let Some(mut context) = self.context.take() {
            // A panicking handler skipped the normal request end.
            if std::thread::panicking() {
                drop(context.request_end());
            }
            self.pool.release(context);
        }
    }
}
