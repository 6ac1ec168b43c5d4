mod relay;
pub use relay::{
    RelayAction, RelayClient, RelayError, ScrapedPage, SearchResults, WebSearchResult,
};
