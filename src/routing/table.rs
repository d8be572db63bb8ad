//! Append-only route tables with snapshot reads.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::routing::template::PathTemplate;

/// Decides whether a newer registration hides an older one bound to an
/// identical template.
pub trait RouteTarget {
    fn shadows(&self, _older: &Self) -> bool {
        true
    }
}

/// A compiled template bound to whatever serves it.
#[derive(Debug)]
pub struct Route<H> {
    pub template: PathTemplate,
    pub target: H,
}

impl<H> Route<H> {
    pub fn new(template: PathTemplate, target: H) -> Self {
        Self { template, target }
    }
}

/// The routes of one table at the moment [`RouteTable::snapshot`] was taken.
///
/// Iteration is newest registration first.
pub struct RouteSnapshot<H> {
    routes: Arc<Vec<Arc<Route<H>>>>,
}

impl<H> RouteSnapshot<H> {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route<H>>> + '_ {
        self.routes.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<H> Clone for RouteSnapshot<H> {
    fn clone(&self) -> Self {
        Self {
            routes: Arc::clone(&self.routes),
        }
    }
}

/// An ordered, append-only list of routes for one verb or upgrade kind.
///
/// Writers publish a new list with copy-on-write; readers work from a
/// snapshot and never wait on a writer. A handler can therefore register
/// routes while it is itself being dispatched from a snapshot.
pub struct RouteTable<H> {
    routes: ArcSwap<Vec<Arc<Route<H>>>>,
}

impl<H> RouteTable<H> {
    pub fn new() -> Self {
        Self {
            routes: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Publish `route` as the newest entry.
    pub fn add(&self, route: Route<H>) {
        let route = Arc::new(route);
        self.routes.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&route));
            next
        });
    }

    pub fn snapshot(&self) -> RouteSnapshot<H> {
        RouteSnapshot {
            routes: self.routes.load_full(),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.load().is_empty()
    }
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self::new()
    }
}
