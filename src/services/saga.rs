//! Borrow then appointment, as a sequential saga over Core.
//!
//! The transitions live in [`SagaState::apply`], free of I/O; the
//! [`SagaOrchestrator`] only performs the call each state asks for and
//! feeds the outcome back as a [`SagaEvent`]. A step never starts before
//! the previous step's answer is in.
//!
//! Nothing is compensated: when a step fails after the borrow was created,
//! the borrow stays in Core and its id is logged.

use std::fmt;

use serde_json::{json, Value};
use thiserror::Error;

use cover_upstream::{Id, SessionCredential, UpstreamClient, UpstreamError};

use super::models::{AppointmentSubmission, Borrow, BorrowReceipt, MeetingDraft};

/// Core call made by one saga step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaStep {
    /// `POST /borrow`
    Borrow,
    /// `GET /borrow/{id}`
    FetchBorrow,
    /// `PUT /user/me/appointments`
    CreateAppointment,
}

impl SagaStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Borrow => "borrow",
            Self::FetchBorrow => "fetch_borrow",
            Self::CreateAppointment => "create_appointment",
        }
    }
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SagaState {
    Requested,
    Borrowed { borrow_id: Id },
    BorrowLoaded { borrow: Borrow },
    AppointmentCreated { appointment: Value },
    Failed {
        step: SagaStep,
        /// Borrow left behind in Core, if one was created.
        orphaned_borrow: Option<Id>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SagaEvent {
    BorrowCreated { borrow_id: Id },
    BorrowFetched { borrow: Borrow },
    AppointmentCreated { appointment: Value },
    /// The pending step's call failed.
    StepFailed,
}

#[derive(Debug, Error)]
pub enum SagaError {
    #[error("saga step {step} failed: {source}")]
    Step {
        step: SagaStep,
        #[source]
        source: UpstreamError,
    },

    #[error("event {event} does not apply to saga state {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}

impl SagaState {
    /// The step this state waits on; `None` once terminal.
    pub fn next_step(&self) -> Option<SagaStep> {
        match self {
            Self::Requested => Some(SagaStep::Borrow),
            Self::Borrowed { .. } => Some(SagaStep::FetchBorrow),
            Self::BorrowLoaded { .. } => Some(SagaStep::CreateAppointment),
            Self::AppointmentCreated { .. } | Self::Failed { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_step().is_none()
    }

    /// Id of the borrow created so far, if any.
    pub fn borrow_id(&self) -> Option<&Id> {
        match self {
            Self::Borrowed { borrow_id } => Some(borrow_id),
            Self::BorrowLoaded { borrow } => Some(&borrow.id),
            Self::Failed {
                orphaned_borrow, ..
            } => orphaned_borrow.as_ref(),
            Self::Requested | Self::AppointmentCreated { .. } => None,
        }
    }

    pub fn apply(self, event: SagaEvent) -> Result<Self, SagaError> {
        match (self, event) {
            (Self::Requested, SagaEvent::BorrowCreated { borrow_id }) => {
                Ok(Self::Borrowed { borrow_id })
            }
            (Self::Borrowed { .. }, SagaEvent::BorrowFetched { borrow }) => {
                Ok(Self::BorrowLoaded { borrow })
            }
            (Self::BorrowLoaded { .. }, SagaEvent::AppointmentCreated { appointment }) => {
                Ok(Self::AppointmentCreated { appointment })
            }
            (state, SagaEvent::StepFailed) => match state.next_step() {
                Some(step) => Ok(Self::Failed {
                    step,
                    orphaned_borrow: state.borrow_id().cloned(),
                }),
                None => Err(invalid(&state, &SagaEvent::StepFailed)),
            },
            (state, event) => Err(invalid(&state, &event)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Borrowed { .. } => "borrowed",
            Self::BorrowLoaded { .. } => "borrow_loaded",
            Self::AppointmentCreated { .. } => "appointment_created",
            Self::Failed { .. } => "failed",
        }
    }
}

impl SagaEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::BorrowCreated { .. } => "borrow_created",
            Self::BorrowFetched { .. } => "borrow_fetched",
            Self::AppointmentCreated { .. } => "appointment_created",
            Self::StepFailed => "step_failed",
        }
    }
}

fn invalid(state: &SagaState, event: &SagaEvent) -> SagaError {
    SagaError::InvalidTransition {
        state: state.name(),
        event: event.name(),
    }
}

/// Drives the borrow/appointment saga against Core.
pub struct SagaOrchestrator<'a> {
    core: &'a UpstreamClient,
}

impl<'a> SagaOrchestrator<'a> {
    pub fn new(core: &'a UpstreamClient) -> Self {
        Self { core }
    }

    /// Borrow `draft.book_id`, load the borrow record, then create the
    /// appointment with the record in place of the book id.
    ///
    /// Returns the appointment as created by Core.
    pub async fn create_borrow_appointment(
        &self,
        draft: &MeetingDraft,
        session: &SessionCredential,
    ) -> Result<Value, SagaError> {
        let mut state = SagaState::Requested;

        while let Some(step) = state.next_step() {
            let outcome = self.run(step, &state, draft, session).await;
            state = match outcome {
                Ok(event) => state.apply(event)?,
                Err(SagaError::Step { step, source }) => {
                    let failed = state.apply(SagaEvent::StepFailed)?;
                    if let Some(borrow_id) = failed.borrow_id() {
                        tracing::warn!(
                            step = %step,
                            borrow_id = %borrow_id,
                            "appointment saga failed after the borrow was created; borrow left in place"
                        );
                    } else {
                        tracing::warn!(step = %step, error = %source, "appointment saga failed");
                    }
                    return Err(SagaError::Step { step, source });
                }
                Err(other) => return Err(other),
            };
            tracing::debug!(step = %step, state = state.name(), "saga step done");
        }

        match state {
            SagaState::AppointmentCreated { appointment } => Ok(appointment),
            other => Err(SagaError::InvalidTransition {
                state: other.name(),
                event: "finish",
            }),
        }
    }

    /// Perform `step` with the input held by `state`.
    async fn run(
        &self,
        step: SagaStep,
        state: &SagaState,
        draft: &MeetingDraft,
        session: &SessionCredential,
    ) -> Result<SagaEvent, SagaError> {
        let failed = |source| SagaError::Step { step, source };
        match (step, state) {
            (SagaStep::Borrow, SagaState::Requested) => {
                let receipt: BorrowReceipt = self
                    .core
                    .post("/borrow", &json!({ "bookId": draft.book_id }), session)
                    .await
                    .map_err(failed)?;
                Ok(SagaEvent::BorrowCreated {
                    borrow_id: receipt.into_id(),
                })
            }
            (SagaStep::FetchBorrow, SagaState::Borrowed { borrow_id }) => {
                let path = format!("/borrow/{}", urlencoding::encode(&borrow_id.to_string()));
                let borrow: Borrow = self.core.get(&path, session).await.map_err(failed)?;
                Ok(SagaEvent::BorrowFetched { borrow })
            }
            (SagaStep::CreateAppointment, SagaState::BorrowLoaded { borrow }) => {
                let body = AppointmentSubmission::new(draft, borrow);
                let appointment: Value = self
                    .core
                    .put("/user/me/appointments", &body, session)
                    .await
                    .map_err(failed)?;
                Ok(SagaEvent::AppointmentCreated { appointment })
            }
            (step, state) => Err(SagaError::InvalidTransition {
                state: state.name(),
                event: step.as_str(),
            }),
        }
    }
}
