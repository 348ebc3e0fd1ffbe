//! Where a named collection gets its items from.
//!
//! A [`CollectionSource`] knows how to turn a display name into an id and how
//! to fetch the records behind that id. [`resolve_items`] decides, on the
//! first pull, whether to read the collection back from the cache store or to
//! fetch it remotely and populate the cache while streaming.

use crate::catalog::{EntityKind, RawStream};
use crate::db::CacheStore;
use crate::error::{FlowError, Result};
use crate::item::Item;
use crate::session::{PopulationClaim, Session};
use crate::stream::{ItemResult, ItemStream};
use log::{debug, info, trace};
use std::rc::Rc;

/// Id resolution and remote fetching for one kind of named collection.
pub trait CollectionSource {
    fn kind(&self) -> EntityKind;

    /// Map a display name to a catalog id.
    fn resolve_id(&self, session: &Session, name: &str) -> Result<String> {
        let kind = self.kind();
        session
            .catalog()
            .search_id(kind, name)?
            .ok_or_else(|| FlowError::Resolution {
                kind,
                name: name.to_owned(),
            })
    }

    /// Unprocessed records behind `id`.
    fn raw_fetch(&self, session: &Session, id: &str) -> Result<RawStream> {
        session.catalog().fetch_raw_items(self.kind(), id)
    }

    /// Decoded items behind `id`, fetched remotely.
    fn fetch_items(&self, session: &Session, id: &str) -> Result<ItemStream> {
        let kind = self.kind();
        let raw = self.raw_fetch(session, id)?;
        Ok(ItemStream::new(
            raw.map(move |record| record.and_then(|r| Item::from_raw(kind, r))),
        ))
    }

    /// Whether items of this source are read from and written to the cache.
    fn uses_cache(&self) -> bool {
        true
    }
}

/// Items of the collection `id`, read through the session cache.
///
/// Nothing happens until the first pull. A complete cached copy is served
/// from the store; otherwise the source is fetched remotely and, when a cache
/// is configured, every item is written to it before being yielded. The copy
/// is marked complete once the remote stream is exhausted.
///
/// Only one stream per id writes at a time. A resolution that starts while
/// another one of the same id is still populating the cache streams remotely
/// without touching the store.
#[must_use]
pub fn resolve_items(session: Session, source: Rc<dyn CollectionSource>, id: String) -> ItemStream {
    ItemStream::deferred(move || {
        let cache = if source.uses_cache() {
            session.shared_cache()
        } else {
            None
        };

        if let Some(cache) = &cache {
            if cache.contains(&id)? {
                debug!("Reading {} {id} from cache", source.kind());
                return Ok(ItemStream::from_items(cache.read_items(&id)?));
            }
        }

        let writer = cache.and_then(|cache| match session.claim_population(&id) {
            Some(claim) => Some((cache, claim)),
            None => {
                debug!("{} {id} is already being cached, streaming without writing", source.kind());
                None
            }
        });

        info!("Retrieving items via API for {} {id}", source.kind());
        let remote = source.fetch_items(&session, &id)?;
        match writer {
            Some((cache, claim)) => {
                cache.begin_collection(&id)?;
                Ok(ItemStream::new(WriteThrough {
                    cache,
                    id,
                    upstream: remote,
                    claim: Some(claim),
                }))
            }
            None => Ok(remote),
        }
    })
}

/// Copies every item into the cache before passing it on.
///
/// Holds the population claim for `id` until the stream ends, fails or is
/// dropped.
struct WriteThrough {
    cache: Rc<dyn CacheStore>,
    id: String,
    upstream: ItemStream,
    claim: Option<PopulationClaim>,
}

impl Iterator for WriteThrough {
    type Item = ItemResult;

    fn next(&mut self) -> Option<ItemResult> {
        self.claim.as_ref()?;
        match self.upstream.next() {
            Some(Ok(item)) => {
                trace!("Write-through {} -> {}", item.id(), self.id);
                if let Err(err) = self.cache.write_item(&self.id, &item) {
                    self.claim = None;
                    return Some(Err(err));
                }
                Some(Ok(item))
            }
            Some(Err(err)) => {
                // Rows written so far stay; the collection is just not marked complete.
                self.claim = None;
                Some(Err(err))
            }
            None => {
                let finished = self.cache.finish_collection(&self.id);
                self.claim = None;
                debug!("Cached complete collection {}", self.id);
                finished.err().map(Err)
            }
        }
    }
}
