use thiserror::Error;

pub const MIN_PAGE_SIZE: u32 = 5;
pub const MAX_PAGE_SIZE: u32 = 10;

/// A restartable page cursor: 1-based page number plus page size.
///
/// Only built through [`Page::new`], so `page_id` is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page_id: u32,
    page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("page_id must be at least 1, got {0}")]
    PageId(u32),

    #[error("page_size must be between {min} and {max}, got {0}", min = MIN_PAGE_SIZE, max = MAX_PAGE_SIZE)]
    PageSize(u32),
}

impl Page {
    pub fn new(page_id: u32, page_size: u32) -> Result<Self, PageError> {
        if page_id < 1 {
            return Err(PageError::PageId(page_id));
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(PageError::PageSize(page_size));
        }
        Ok(Self { page_id, page_size })
    }

    pub fn first(page_size: u32) -> Result<Self, PageError> {
        Self::new(1, page_size)
    }

    pub fn next(&self) -> Self {
        Self {
            page_id: self.page_id.saturating_add(1),
            page_size: self.page_size,
        }
    }

    pub fn page_id(&self) -> u32 {
        self.page_id
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page_id - 1) * i64::from(self.page_size)
    }
}
