use std::fmt;

use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;

/// One named route exposed by a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub name: String,
    pub method: Method,
    pub path: String,
    pub has_handler: bool,
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.method, self.path)
    }
}

/// Inventory of the routes a service advertises, as produced by
/// [`RouteSet::into_router`]. An entry has a handler exactly when the router
/// built alongside it serves that method and path.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Visits every route, failing on the first one without a handler.
    /// Returns the number of routes visited.
    pub fn walk(&self) -> Result<usize, String> {
        for entry in &self.entries {
            if !entry.has_handler {
                return Err(format!("route {entry} has no handler"));
            }
        }
        Ok(self.entries.len())
    }
}

/// Builds a service's router and its [`RouteTable`] from the same list, so
/// the table cannot drift from what is actually mounted.
pub struct RouteSet<S = ()> {
    entries: Vec<RouteEntry>,
    mounted: Vec<(String, MethodRouter<S>)>,
}

impl<S> Default for RouteSet<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            mounted: Vec::new(),
        }
    }
}

impl<S> RouteSet<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `handler` for `method` on `path`. Methods axum cannot route
    /// on stay in the table without a handler.
    pub fn record<H, T>(mut self, name: &str, method: Method, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        let has_handler = match MethodFilter::try_from(method.clone()) {
            Ok(filter) => {
                self.mounted.push((path.to_owned(), on(filter, handler)));
                true
            }
            Err(_) => false,
        };
        self.push(name, method, path, has_handler)
    }

    /// Advertises a route that nothing serves yet.
    pub fn declare(self, name: &str, method: Method, path: &str) -> Self {
        self.push(name, method, path, false)
    }

    fn push(mut self, name: &str, method: Method, path: &str, has_handler: bool) -> Self {
        self.entries.push(RouteEntry {
            name: name.to_owned(),
            method,
            path: path.to_owned(),
            has_handler,
        });
        self
    }

    pub fn into_router(self) -> (Router<S>, RouteTable) {
        let router = self
            .mounted
            .into_iter()
            .fold(Router::new(), |router, (path, method_router)| {
                router.route(&path, method_router)
            });
        let table = RouteTable {
            entries: self.entries,
        };
        (router, table)
    }
}
