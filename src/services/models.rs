//! Request-scoped values exchanged with the Core and Index services.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use cover_upstream::{Backend, Id};

/// One entry of a Core shelf listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub isbn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Remaining Core fields, relayed untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Core answers shelf listings either wrapped as `{books: [...]}` or as a
/// bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ShelfListing {
    Wrapped { books: Vec<BookSummary> },
    Bare(Vec<BookSummary>),
}

impl ShelfListing {
    pub fn into_books(self) -> Vec<BookSummary> {
        match self {
            Self::Wrapped { books } | Self::Bare(books) => books,
        }
    }
}

/// Catalogue document returned by Index for one ISBN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookDetail(pub Value);

/// A shelf entry joined with its catalogue document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedBook {
    #[serde(flatten)]
    pub summary: BookSummary,
    pub detail: Option<BookDetail>,
    /// Set only when the lookup failed under the partial policy.
    #[serde(rename = "detailError", skip_serializing_if = "Option::is_none")]
    pub detail_error: Option<String>,
}

/// Borrow record held by Core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Borrow {
    pub id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrower_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Answer to a borrow request: the new id, bare or inside a record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BorrowReceipt {
    Record { id: Id },
    Bare(Id),
}

impl BorrowReceipt {
    pub fn into_id(self) -> Id {
        match self {
            Self::Record { id } | Self::Bare(id) => id,
        }
    }
}

/// Where the book changes hands. Exactly one form is accepted; a payload
/// mixing both, or carrying neither, does not deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepositLocation {
    Address(AddressLocation),
    Known(KnownLocation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressLocation {
    #[serde(rename = "type", alias = "depositLocationType")]
    pub kind: String,
    #[serde(alias = "depositLocationAddress")]
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KnownLocation {
    #[serde(rename = "locationId", alias = "depositLocationId")]
    pub location_id: Id,
}

/// Body of `PUT /user/me/appointments`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentRequest {
    pub meeting: MeetingDraft,
}

/// Appointment as proposed by the caller, before any borrow exists.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDraft {
    pub book_id: Id,
    pub deposit_location: DepositLocation,
    /// Other meeting fields (date, message, ...) forwarded as given.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body sent to Core to create the appointment. The draft's `bookId` is
/// replaced by the full borrow record.
#[derive(Debug, Serialize)]
pub struct AppointmentSubmission<'a> {
    pub meeting: Meeting<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting<'a> {
    pub borrow: &'a Borrow,
    pub deposit_location: &'a DepositLocation,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<'a> AppointmentSubmission<'a> {
    pub fn new(draft: &'a MeetingDraft, borrow: &'a Borrow) -> Self {
        let mut extra = draft.extra.clone();
        extra.remove("borrow");
        Self {
            meeting: Meeting {
                borrow,
                deposit_location: &draft.deposit_location,
                extra,
            },
        }
    }
}

/// Reachability of one backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub service_name: Backend,
    pub reachable: bool,
    /// Probe payload when reachable, failure description otherwise.
    pub detail: Value,
}
