//! Fan-out/fan-in join of Core shelf listings with Index catalogue documents.

use futures_util::future::{join_all, try_join_all};

use cover_kernel::settings::DetailPolicy;
use cover_upstream::{SessionCredential, UpstreamClient, UpstreamResult};

use super::models::{BookDetail, BookSummary, CombinedBook, ShelfListing};

/// The shelf listings Core keeps per user. They differ only by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shelf {
    /// Books the user owns.
    Library,
    Reading,
    Read,
    Borrowed,
}

impl Shelf {
    pub const ALL: [Shelf; 4] = [Shelf::Library, Shelf::Reading, Shelf::Read, Shelf::Borrowed];

    /// Suffix after `/user/{id}/books`.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Library => "",
            Self::Reading => "/reading",
            Self::Read => "/read",
            Self::Borrowed => "/borrowed",
        }
    }

    /// Core path of this shelf for `user_id`.
    pub fn core_path(&self, user_id: &str) -> String {
        format!(
            "/user/{}/books{}",
            urlencoding::encode(user_id),
            self.suffix()
        )
    }
}

/// Joins Core listings with Index details.
pub struct Aggregator<'a> {
    core: &'a UpstreamClient,
    index: &'a UpstreamClient,
    policy: DetailPolicy,
}

impl<'a> Aggregator<'a> {
    pub fn new(core: &'a UpstreamClient, index: &'a UpstreamClient, policy: DetailPolicy) -> Self {
        Self {
            core,
            index,
            policy,
        }
    }

    pub fn policy(&self) -> DetailPolicy {
        self.policy
    }

    /// The listing at `list_path`, unjoined.
    pub async fn list_raw(
        &self,
        list_path: &str,
        session: &SessionCredential,
    ) -> UpstreamResult<Vec<BookSummary>> {
        let listing: ShelfListing = self.core.get(list_path, session).await?;
        Ok(listing.into_books())
    }

    /// The listing at `list_path` with one Index lookup per entry, issued
    /// concurrently and joined back in Core's order.
    ///
    /// Under [`DetailPolicy::FailFast`] the first failed lookup fails the
    /// call and the lookups still in flight are dropped. Under
    /// [`DetailPolicy::Partial`] every lookup settles and failures leave
    /// `detail` empty with a `detailError` marker.
    pub async fn list_with_details(
        &self,
        list_path: &str,
        session: &SessionCredential,
    ) -> UpstreamResult<Vec<CombinedBook>> {
        let books = self.list_raw(list_path, session).await?;
        tracing::debug!(
            path = list_path,
            count = books.len(),
            policy = ?self.policy,
            "fetching catalogue details"
        );

        let lookups = books.iter().map(|book| self.detail(&book.isbn, session));

        match self.policy {
            DetailPolicy::FailFast => {
                let details = try_join_all(lookups).await?;
                Ok(books
                    .into_iter()
                    .zip(details)
                    .map(|(summary, detail)| CombinedBook {
                        summary,
                        detail: Some(detail),
                        detail_error: None,
                    })
                    .collect())
            }
            DetailPolicy::Partial => {
                let details = join_all(lookups).await;
                Ok(books
                    .into_iter()
                    .zip(details)
                    .map(|(summary, detail)| match detail {
                        Ok(detail) => CombinedBook {
                            summary,
                            detail: Some(detail),
                            detail_error: None,
                        },
                        Err(err) => CombinedBook {
                            summary,
                            detail: None,
                            detail_error: Some(err.to_string()),
                        },
                    })
                    .collect())
            }
        }
    }

    async fn detail(&self, isbn: &str, session: &SessionCredential) -> UpstreamResult<BookDetail> {
        let path = format!("/book/{}", urlencoding::encode(isbn));
        self.index.get(&path, session).await
    }
}
