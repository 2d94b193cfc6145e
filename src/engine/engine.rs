//! The per-user conversational state machine.
//!
//! One inbound text event at a time per session: the session lock is held
//! for the whole transition, so rapid double-sends from one user never
//! interleave. Every failure a transition does not handle explicitly is
//! caught here, reported to the user, and forces the session back to
//! `idle` — no session is ever left stuck in an inconsistent step.

use crate::channels::OutgoingResponse;
use crate::destinations::DestinationStore;
use crate::directory::StudentDirectory;
use crate::engine::router::Command;
use crate::engine::session::{Session, SessionMap, Step};
use crate::error::{Error, StoreError};
use crate::export::WeeklyExporter;
use crate::gate::AccessGate;
use crate::store::Student;

/// Drives the request conversation for all users.
pub struct ConversationEngine {
    directory: StudentDirectory,
    destinations: DestinationStore,
    gate: AccessGate,
    exporter: WeeklyExporter,
    sessions: SessionMap,
}

impl ConversationEngine {
    pub fn new(
        directory: StudentDirectory,
        destinations: DestinationStore,
        gate: AccessGate,
        exporter: WeeklyExporter,
    ) -> Self {
        Self {
            directory,
            destinations,
            gate,
            exporter,
            sessions: SessionMap::new(),
        }
    }

    /// Handle one inbound text event for a user and produce the replies.
    pub async fn handle(&self, user_id: &str, text: &str) -> Vec<OutgoingResponse> {
        let handle = self.sessions.entry(user_id).await;
        let mut session = handle.lock().await;
        let text = text.trim();

        if let Some(command) = Command::parse(text) {
            tracing::debug!(user_id, ?command, "Command received");
            return self.on_command(&mut session, command);
        }

        match self.dispatch(&mut session, text).await {
            Ok(replies) => replies,
            Err(err) => {
                tracing::error!(user_id, error = %err, "Transition failed; session reset");
                session.reset();
                vec![
                    OutgoingResponse::text(
                        "❌ An error occurred. Please try again or use /start to restart.",
                    ),
                    OutgoingResponse::text(format!("Error details: {err}")),
                ]
            }
        }
    }

    /// Current step for a user, if a session exists.
    pub async fn current_step(&self, user_id: &str) -> Option<Step> {
        self.sessions.step_of(user_id).await
    }

    /// Commands interrupt any step.
    fn on_command(&self, session: &mut Session, command: Command) -> Vec<OutgoingResponse> {
        session.reset();
        match command {
            Command::Start => vec![OutgoingResponse::text(
                "Welcome! Use /48h to make a 48-hour request.",
            )],
            Command::Request48h => {
                session.step = Step::WaitingName;
                vec![OutgoingResponse::text("Please send me your family name.")]
            }
            Command::List => {
                session.step = Step::WaitingCode;
                vec![OutgoingResponse::text("Please write the secret code.")]
            }
        }
    }

    /// Free-text dispatch on the current step.
    async fn dispatch(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Vec<OutgoingResponse>, Error> {
        match session.step {
            Step::Idle => Ok(vec![OutgoingResponse::text(
                "Use /48h to make a 48-hour request, or /start to restart.",
            )]),
            Step::WaitingName => self.on_name(session, text).await,
            Step::SelectingStudent => self.on_selection(session, text).await,
            Step::WaitingDestination => self.on_destination(session, text).await,
            Step::HasExistingChoice => self.on_existing_choice(session, text).await,
            Step::WaitingCode => self.on_code(session, text).await,
        }
    }

    // ── waiting_name ────────────────────────────────────────────────

    async fn on_name(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Vec<OutgoingResponse>, Error> {
        let student = match self.directory.find_exact(text).await? {
            Some(student) => student,
            None => {
                let mut candidates = self.directory.find_approximate(text).await?;
                match candidates.len() {
                    // User may retry; the step is unchanged.
                    0 => {
                        return Ok(vec![OutgoingResponse::text(
                            "❌ No student found. Please check the spelling and try again, \
                             or use /start to restart.",
                        )]);
                    }
                    1 => candidates.remove(0),
                    _ => {
                        let mut message = String::from(
                            "Found multiple matches. Please select your name by sending the number:\n\n",
                        );
                        for (index, candidate) in candidates.iter().enumerate() {
                            message.push_str(&format!(
                                "{}. {}\n",
                                index + 1,
                                candidate.display_name()
                            ));
                        }
                        session.step = Step::SelectingStudent;
                        session.candidates = candidates;
                        return Ok(vec![OutgoingResponse::text(message)]);
                    }
                }
            }
        };

        self.proceed_with_student(session, student, "Found").await
    }

    // ── selecting_student ───────────────────────────────────────────

    async fn on_selection(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Vec<OutgoingResponse>, Error> {
        let choice = text
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=session.candidates.len()).contains(n));

        let Some(choice) = choice else {
            // Step and candidates unchanged.
            return Ok(vec![OutgoingResponse::text(
                "❌ Invalid selection. Please send a valid number from the list, \
                 or use /start to restart.",
            )]);
        };

        let student = session.candidates[choice - 1].clone();
        self.proceed_with_student(session, student, "Selected").await
    }

    /// Shared tail of the single-candidate branch: check for an existing
    /// destination this week and route accordingly.
    async fn proceed_with_student(
        &self,
        session: &mut Session,
        student: Student,
        label: &str,
    ) -> Result<Vec<OutgoingResponse>, Error> {
        // A student without a matricule cannot own a destination record;
        // fatal for this turn (caught by the blanket recovery).
        let matricule = student.matricule.ok_or(StoreError::MissingMatricule {
            family_name: student.family_name.clone(),
            given_name: student.given_name.clone(),
        })?;

        session.candidates.clear();

        if let Some(current) = self.destinations.current_for(matricule).await? {
            session.step = Step::HasExistingChoice;
            session.selected = Some(student);
            session.current_destination = Some(current.clone());
            return Ok(vec![OutgoingResponse::text(format!(
                "You already have a 48h request for: {current}\n\n\
                 What would you like to do?\n\
                 Send \"delete\" to remove it, or send a new destination to update it."
            ))]);
        }

        session.step = Step::WaitingDestination;
        let name = student.display_name();
        session.selected = Some(student);
        Ok(vec![OutgoingResponse::text(format!(
            "{label}: {name}\n\nPlease send me your destination (max 20 characters)."
        ))])
    }

    // ── waiting_destination ─────────────────────────────────────────

    async fn on_destination(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Vec<OutgoingResponse>, Error> {
        let student = selected_student(session)?;

        match self.destinations.set(&student, text).await {
            Err(StoreError::DestinationTooLong { max, .. }) => {
                // Step unchanged; the user may retry.
                Ok(vec![length_error(max)])
            }
            Err(err) => Err(err.into()),
            Ok(()) => {
                session.reset();
                Ok(vec![OutgoingResponse::text(format!(
                    "✅ Your 48h request has been saved!\nDestination: {text}"
                ))])
            }
        }
    }

    // ── has_existing_choice ─────────────────────────────────────────

    async fn on_existing_choice(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Vec<OutgoingResponse>, Error> {
        let student = selected_student(session)?;

        if matches!(text.to_lowercase().as_str(), "delete" | "remove") {
            self.destinations.clear(&student).await?;
            session.reset();
            return Ok(vec![OutgoingResponse::text(
                "✅ Your 48h request has been deleted.",
            )]);
        }

        // Validate before clearing so a rejected update never loses the
        // existing record.
        if let Err(StoreError::DestinationTooLong { max, .. }) = DestinationStore::validate(text) {
            return Ok(vec![length_error(max)]);
        }

        // Delete-before-set keeps the one-record-per-week invariant; the
        // store itself is insert-only.
        self.destinations.clear(&student).await?;
        self.destinations.set(&student, text).await?;
        session.reset();
        Ok(vec![OutgoingResponse::text(format!(
            "✅ Your destination has been updated to: {text}"
        ))])
    }

    // ── waiting_code ────────────────────────────────────────────────

    async fn on_code(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Vec<OutgoingResponse>, Error> {
        if !self.gate.verify(text) {
            // Step unchanged; the user may retry.
            return Ok(vec![OutgoingResponse::text("Invalid code.")]);
        }

        // Reset on successful verification regardless of export outcome.
        session.reset();
        let path = self.exporter.export_current_week().await?;
        Ok(vec![
            OutgoingResponse::text("📄 Weekly destination list:").with_attachment(path),
        ])
    }
}

fn selected_student(session: &Session) -> Result<Student, Error> {
    session.selected.clone().ok_or_else(|| {
        Error::Session(format!("no student selected in step {}", session.step))
    })
}

fn length_error(max: usize) -> OutgoingResponse {
    OutgoingResponse::text(format!(
        "❌ Destination must be {max} characters or less. Please try again."
    ))
}
