//! The capability object handed to route handlers.

use crate::pages::PageStore;
use std::sync::Arc;

/// Everything a handler may reach beyond the request itself: the page
/// template store and the verbose-mode flag. Built once at startup and
/// shared read-only across workers.
#[derive(Debug, Clone, Default)]
pub struct Portal {
    pages: Arc<PageStore>,
    debug: bool,
}

impl Portal {
    pub fn new(pages: Arc<PageStore>, debug: bool) -> Self {
        Self { pages, debug }
    }

    #[inline(always)]
    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    #[inline(always)]
    pub const fn debug(&self) -> bool {
        self.debug
    }
}
