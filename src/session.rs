//! The handles a collection resolves against.

use crate::catalog::CatalogClient;
use crate::db::CacheStore;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Catalog client plus an optional cache store, shared by every collection
/// built from it. Cloning is cheap.
///
/// Clones also share the set of collection ids currently being written to
/// the cache, so two lazy resolutions of the same id never populate it at
/// the same time. Separately constructed sessions over one store do not see
/// each other's writers.
#[derive(Clone)]
pub struct Session {
    catalog: Rc<dyn CatalogClient>,
    cache: Option<Rc<dyn CacheStore>>,
    populating: Rc<RefCell<HashSet<String>>>,
}

impl Session {
    /// Session without a cache: every named collection is fetched remotely.
    pub fn new(catalog: impl CatalogClient + 'static) -> Self {
        Self::from_parts(Rc::new(catalog), None)
    }

    #[must_use]
    pub fn from_parts(catalog: Rc<dyn CatalogClient>, cache: Option<Rc<dyn CacheStore>>) -> Self {
        Self {
            catalog,
            cache,
            populating: Rc::default(),
        }
    }

    /// Attach a cache store.
    #[must_use]
    pub fn with_cache(mut self, cache: impl CacheStore + 'static) -> Self {
        self.cache = Some(Rc::new(cache));
        self
    }

    /// Attach an already shared cache store.
    #[must_use]
    pub fn with_shared_cache(mut self, cache: Rc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogClient {
        self.catalog.as_ref()
    }

    #[must_use]
    pub fn cache(&self) -> Option<&dyn CacheStore> {
        self.cache.as_deref()
    }

    #[must_use]
    pub fn shared_cache(&self) -> Option<Rc<dyn CacheStore>> {
        self.cache.clone()
    }

    #[must_use]
    pub const fn is_cache_configured(&self) -> bool {
        self.cache.is_some()
    }

    /// Become the only cache writer for `collection_id` until the claim is dropped.
    ///
    /// Returns `None` while another claim on the same id is alive.
    pub(crate) fn claim_population(&self, collection_id: &str) -> Option<PopulationClaim> {
        let fresh = self.populating.borrow_mut().insert(collection_id.to_owned());
        fresh.then(|| PopulationClaim {
            populating: Rc::clone(&self.populating),
            collection_id: collection_id.to_owned(),
        })
    }

    #[must_use]
    pub fn is_populating(&self, collection_id: &str) -> bool {
        self.populating.borrow().contains(collection_id)
    }
}

/// Exclusive right to write one collection into the cache.
pub(crate) struct PopulationClaim {
    populating: Rc<RefCell<HashSet<String>>>,
    collection_id: String,
}

impl Drop for PopulationClaim {
    fn drop(&mut self) {
        self.populating.borrow_mut().remove(&self.collection_id);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cache_configured", &self.is_cache_configured())
            .finish_non_exhaustive()
    }
}
