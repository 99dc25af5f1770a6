//! CrudService: generic CRUD over an `EntityStore`, driven by the resolved entity model.

mod crud;
mod pagination;
mod validation;
pub use crud::{parse_id, CrudService, DeleteOutcome, Page};
pub use pagination::{total_pages, PageBounds, PageRequest, SearchParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use validation::{is_email, RequestValidator};
