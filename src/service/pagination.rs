//! Offset pagination: clamp the requested page, then derive totals from the matching count.

use serde::{Deserialize, Deserializer};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Bounds applied to every search. `default_page_size` is used when the caller omits `pageSize`.
#[derive(Clone, Copy, Debug)]
pub struct PageBounds {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageBounds {
    fn default() -> Self {
        PageBounds {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Raw search query string: `?searchTerm=&page=&pageSize=`. Values are signed so that
/// `page=0` or `pageSize=-5` parse and get clamped instead of being rejected.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default)]
    pub search_term: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub page_size: Option<i64>,
}

/// `page=` and `page=abc` read as absent rather than failing the whole request.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// Trimmed, lower-cased; None when blank.
    pub search_term: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn from_params(params: &SearchParams, bounds: PageBounds) -> Self {
        let max = bounds.max_page_size.max(1);
        let page = params.page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
        let page_size = params
            .page_size
            .unwrap_or(bounds.default_page_size as i64)
            .clamp(1, max as i64) as u32;
        let search_term = params
            .search_term
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        PageRequest {
            search_term,
            page,
            page_size,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    pub fn limit(&self) -> u64 {
        self.page_size as u64
    }
}

/// ceil(total / page_size); zero rows means zero pages.
pub fn total_pages(total_count: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_count.div_ceil(page_size as u64)
}
