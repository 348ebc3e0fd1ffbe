//! Lazy item sequences.
//!
//! [`ItemStream`] is single-pass: it yields each item once and stops for good
//! after the first error. [`SharedStream`] memoises a stream so that several
//! consumers can replay it independently while the upstream source is pulled
//! at most once.

use crate::error::{FlowError, Result};
use crate::item::Item;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ItemResult = Result<Item>;

/// Single-pass, pull-based sequence of items.
pub struct ItemStream {
    inner: Box<dyn Iterator<Item = ItemResult>>,
    failed: bool,
}

impl ItemStream {
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = ItemResult> + 'static,
    {
        Self {
            inner: Box::new(iter),
            failed: false,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Item>,
        I::IntoIter: 'static,
    {
        Self::new(items.into_iter().map(Ok))
    }

    /// A stream whose only element is `err`.
    #[must_use]
    pub fn failed(err: FlowError) -> Self {
        Self::new(std::iter::once(Err(err)))
    }

    /// Run `init` on the first pull, then stream what it returned.
    ///
    /// Nothing happens (no lookups, no cache access) until a consumer asks
    /// for the first item, and setup errors surface there.
    pub fn deferred<F>(init: F) -> Self
    where
        F: FnOnce() -> Result<Self> + 'static,
    {
        let mut init = Some(init);
        Self::new(std::iter::once(()).flat_map(move |()| match init.take() {
            Some(f) => f().unwrap_or_else(Self::failed),
            None => Self::empty(),
        }))
    }

    /// Drain the stream into a buffer, stopping at the first error.
    pub fn collect_items(self) -> Result<Vec<Item>> {
        self.collect()
    }
}

impl Iterator for ItemStream {
    type Item = ItemResult;

    fn next(&mut self) -> Option<ItemResult> {
        if self.failed {
            return None;
        }
        let next = self.inner.next();
        if matches!(next, Some(Err(_))) {
            self.failed = true;
        }
        next
    }
}

impl fmt::Debug for ItemStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemStream")
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

struct Memo {
    buffer: Vec<Item>,
    upstream: Option<ItemStream>,
    failure: Option<String>,
}

/// Memoising tee over an [`ItemStream`].
///
/// Every [`cursor`](Self::cursor) starts at the beginning. Items already
/// pulled by any cursor are served from the shared buffer, new ones are pulled
/// from upstream and appended.
#[derive(Clone)]
pub struct SharedStream {
    memo: Rc<RefCell<Memo>>,
}

impl SharedStream {
    #[must_use]
    pub fn new(upstream: ItemStream) -> Self {
        Self {
            memo: Rc::new(RefCell::new(Memo {
                buffer: Vec::new(),
                upstream: Some(upstream),
                failure: None,
            })),
        }
    }

    /// A fresh, independent replay of the whole sequence.
    #[must_use]
    pub fn cursor(&self) -> ItemStream {
        ItemStream::new(Cursor {
            memo: Rc::clone(&self.memo),
            pos: 0,
        })
    }

    /// Items buffered so far.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.memo.borrow().buffer.len()
    }
}

impl fmt::Debug for SharedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStream")
            .field("buffered", &self.buffered())
            .finish_non_exhaustive()
    }
}

struct Cursor {
    memo: Rc<RefCell<Memo>>,
    pos: usize,
}

impl Iterator for Cursor {
    type Item = ItemResult;

    fn next(&mut self) -> Option<ItemResult> {
        let mut guard = self.memo.borrow_mut();
        let memo = &mut *guard;

        if let Some(item) = memo.buffer.get(self.pos) {
            self.pos += 1;
            return Some(Ok(item.clone()));
        }
        if let Some(reason) = &memo.failure {
            return Some(Err(FlowError::UpstreamFailed(reason.clone())));
        }

        let pulled = memo.upstream.as_mut()?.next();
        match pulled {
            Some(Ok(item)) => {
                memo.buffer.push(item.clone());
                self.pos += 1;
                Some(Ok(item))
            }
            Some(Err(err)) => {
                memo.failure = Some(err.to_string());
                memo.upstream = None;
                Some(Err(err))
            }
            None => {
                memo.upstream = None;
                None
            }
        }
    }
}
