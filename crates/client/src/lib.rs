pub mod endpoints;
pub mod fetch;
pub mod paginate;
pub mod pool;

pub use endpoints::Endpoints;
pub use fetch::{FetchError, FetchOutcome, HttpFetcher, Method, ResourceFetcher, Target};
pub use paginate::{drain_pages, parse_page, Page, PAGE_DELAY};
pub use pool::run_batch;
