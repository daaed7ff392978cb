use docent_api::{ChatAnswer, ChatTurn, SourceRef, TurnRole};

/// Assistant content used when the backend omits the `response` field.
pub const MISSING_ANSWER_PLACEHOLDER: &str = "No answer was returned.";

/// Assistant content used when the exchange fails outright.
pub const EXCHANGE_FAILED_APOLOGY: &str =
    "Sorry, something went wrong while answering. Please try again.";

/// Stable identifier for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identifier for one request/response exchange.
///
/// This changes on every submit so stale completions can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub u64);

impl ExchangeId {
    /// Creates a typed exchange identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

/// Core immutable message model.
///
/// Messages never change after they are appended; source references ride on
/// assistant messages and drive follow-up card fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub sources: Vec<SourceRef>,
}

impl Message {
    /// Creates a message with explicit sources.
    pub fn new(
        id: MessageId,
        role: Role,
        content: impl Into<String>,
        sources: Vec<SourceRef>,
    ) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            sources,
        }
    }

    /// Creates a user message; user turns never carry sources.
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content, Vec::new())
    }

    /// Creates an assistant message with the sources the backend returned.
    pub fn assistant(id: MessageId, content: impl Into<String>, sources: Vec<SourceRef>) -> Self {
        Self::new(id, Role::Assistant, content, sources)
    }
}

/// Busy-flag state boundary for the conversation controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeState {
    #[default]
    Idle,
    InFlight(ExchangeId),
}

/// Rejection reason for illegal exchange transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeRejection {
    AlreadyInFlight {
        active: ExchangeId,
        attempted: ExchangeId,
    },
    NoActiveExchange {
        attempted: ExchangeId,
    },
    StaleExchange {
        active: ExchangeId,
        attempted: ExchangeId,
    },
}

impl ExchangeState {
    /// Returns the active exchange if and only if one is in flight.
    pub fn active_exchange(&self) -> Option<ExchangeId> {
        match self {
            Self::InFlight(exchange_id) => Some(*exchange_id),
            Self::Idle => None,
        }
    }

    /// Starts a new exchange; at most one may be in flight.
    pub fn begin(&self, attempted: ExchangeId) -> Result<Self, ExchangeRejection> {
        match self {
            Self::Idle => Ok(Self::InFlight(attempted)),
            Self::InFlight(active) => Err(ExchangeRejection::AlreadyInFlight {
                active: *active,
                attempted,
            }),
        }
    }

    /// Settles the active exchange; success and failure both land on `Idle`.
    pub fn settle(&self, attempted: ExchangeId) -> Result<Self, ExchangeRejection> {
        match self {
            Self::InFlight(active) if *active == attempted => Ok(Self::Idle),
            Self::InFlight(active) => Err(ExchangeRejection::StaleExchange {
                active: *active,
                attempted,
            }),
            Self::Idle => Err(ExchangeRejection::NoActiveExchange { attempted }),
        }
    }
}

/// Typed no-op reasons for a rejected submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    /// The trimmed input was empty.
    EmptyInput,
    /// An exchange is already in flight; the transcript is untouched.
    ExchangeInFlight(ExchangeId),
}

/// Everything the controller needs to run one accepted submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeBegun {
    pub exchange_id: ExchangeId,
    pub user_message_id: MessageId,
    /// Full ordered history, including the new user turn, reduced to wire shape.
    pub history: Vec<ChatTurn>,
}

/// Terminal result of one exchange as seen by the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The backend answered; missing fields fall back, they do not fail.
    Answer(ChatAnswer),
    /// Transport or status failure; the cause is logged at the call site.
    Failure,
}

/// Append-only conversation state plus the exchange machine.
///
/// Session-scoped and in-memory only: messages are never mutated or removed,
/// and nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    exchange_state: ExchangeState,
    next_message_id: u64,
    next_exchange_id: u64,
}

impl Transcript {
    /// Creates an empty transcript in idle state.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            exchange_state: ExchangeState::default(),
            next_message_id: 1,
            next_exchange_id: 1,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn exchange_state(&self) -> ExchangeState {
        self.exchange_state
    }

    pub fn is_busy(&self) -> bool {
        self.exchange_state.active_exchange().is_some()
    }

    /// Accepts a submit: appends one user message, flips to `InFlight`, and
    /// returns the full history to send.
    ///
    /// Whitespace-only input and submits while busy reject without touching
    /// the message list.
    pub fn begin_exchange(&mut self, text: &str) -> Result<ExchangeBegun, SubmitRejection> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SubmitRejection::EmptyInput);
        }

        if let Some(active) = self.exchange_state.active_exchange() {
            return Err(SubmitRejection::ExchangeInFlight(active));
        }

        let exchange_id = self.alloc_exchange_id();
        self.exchange_state = self
            .exchange_state
            .begin(exchange_id)
            .expect("idle state checked above");

        let user_message_id = self.alloc_message_id();
        self.messages.push(Message::user(user_message_id, trimmed));

        Ok(ExchangeBegun {
            exchange_id,
            user_message_id,
            history: self.wire_history(),
        })
    }

    /// Settles an exchange: appends exactly one assistant message and clears
    /// the busy flag. Stale exchange ids are rejected and leave the
    /// transcript unchanged.
    pub fn settle_exchange(
        &mut self,
        exchange_id: ExchangeId,
        outcome: ExchangeOutcome,
    ) -> Result<MessageId, ExchangeRejection> {
        self.exchange_state = self.exchange_state.settle(exchange_id)?;

        let (content, sources) = match outcome {
            ExchangeOutcome::Answer(answer) => (
                answer
                    .response
                    .unwrap_or_else(|| MISSING_ANSWER_PLACEHOLDER.to_string()),
                answer.sources,
            ),
            ExchangeOutcome::Failure => (EXCHANGE_FAILED_APOLOGY.to_string(), Vec::new()),
        };

        let message_id = self.alloc_message_id();
        self.messages
            .push(Message::assistant(message_id, content, sources));

        Ok(message_id)
    }

    fn wire_history(&self) -> Vec<ChatTurn> {
        self.messages
            .iter()
            .map(|message| ChatTurn::new(role_to_wire(message.role), message.content.clone()))
            .collect()
    }

    fn alloc_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id = self.next_message_id.saturating_add(1);
        id
    }

    fn alloc_exchange_id(&mut self) -> ExchangeId {
        let id = ExchangeId::new(self.next_exchange_id);
        self.next_exchange_id = self.next_exchange_id.saturating_add(1);
        id
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

fn role_to_wire(role: Role) -> TurnRole {
    match role {
        Role::User => TurnRole::User,
        Role::Assistant => TurnRole::Assistant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(response: Option<&str>, sources: Vec<SourceRef>) -> ChatAnswer {
        ChatAnswer {
            response: response.map(str::to_string),
            sources,
        }
    }

    #[test]
    fn accepted_submit_grows_transcript_by_exactly_two() {
        let mut transcript = Transcript::new();

        let begun = transcript
            .begin_exchange("What is the capital of France?")
            .expect("non-empty submit must be accepted");
        assert_eq!(transcript.messages().len(), 1);
        assert_eq!(transcript.messages()[0].id, begun.user_message_id);
        assert!(transcript.is_busy());
        assert_eq!(begun.history.len(), 1);
        assert_eq!(begun.history[0].role, TurnRole::User);

        transcript
            .settle_exchange(
                begun.exchange_id,
                ExchangeOutcome::Answer(answer(
                    Some("Paris is the capital."),
                    vec![SourceRef::new("x1", "PDFchunks1")],
                )),
            )
            .expect("settle must be accepted");

        assert_eq!(transcript.messages().len(), 2);
        assert!(!transcript.is_busy());

        let assistant = &transcript.messages()[1];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content, "Paris is the capital.");
        assert_eq!(assistant.sources, vec![SourceRef::new("x1", "PDFchunks1")]);
    }

    #[test]
    fn failure_outcome_appends_apology_and_clears_busy() {
        let mut transcript = Transcript::new();
        let begun = transcript.begin_exchange("hello").expect("accepted");

        transcript
            .settle_exchange(begun.exchange_id, ExchangeOutcome::Failure)
            .expect("failure settle must be accepted");

        assert_eq!(transcript.messages().len(), 2);
        assert!(!transcript.is_busy());

        let assistant = &transcript.messages()[1];
        assert_eq!(assistant.content, EXCHANGE_FAILED_APOLOGY);
        assert!(assistant.sources.is_empty());
    }

    #[test]
    fn missing_response_field_falls_back_to_placeholder() {
        let mut transcript = Transcript::new();
        let begun = transcript.begin_exchange("hello").expect("accepted");

        transcript
            .settle_exchange(
                begun.exchange_id,
                ExchangeOutcome::Answer(answer(None, Vec::new())),
            )
            .expect("settle must be accepted");

        assert_eq!(transcript.messages()[1].content, MISSING_ANSWER_PLACEHOLDER);
    }

    #[test]
    fn whitespace_submit_leaves_transcript_unchanged() {
        let mut transcript = Transcript::new();

        assert_eq!(
            transcript.begin_exchange("   \n\t "),
            Err(SubmitRejection::EmptyInput)
        );
        assert!(transcript.messages().is_empty());
        assert!(!transcript.is_busy());
    }

    #[test]
    fn submit_while_busy_leaves_transcript_unchanged() {
        let mut transcript = Transcript::new();
        let begun = transcript.begin_exchange("first").expect("accepted");

        assert_eq!(
            transcript.begin_exchange("second"),
            Err(SubmitRejection::ExchangeInFlight(begun.exchange_id))
        );
        assert_eq!(transcript.messages().len(), 1);
    }

    #[test]
    fn history_carries_full_ordered_conversation() {
        let mut transcript = Transcript::new();

        let first = transcript.begin_exchange("one").expect("accepted");
        transcript
            .settle_exchange(
                first.exchange_id,
                ExchangeOutcome::Answer(answer(Some("answer one"), Vec::new())),
            )
            .expect("settled");

        let second = transcript.begin_exchange("two").expect("accepted");
        let roles: Vec<TurnRole> = second.history.iter().map(|turn| turn.role).collect();
        let contents: Vec<&str> = second
            .history
            .iter()
            .map(|turn| turn.content.as_str())
            .collect();

        assert_eq!(
            roles,
            vec![TurnRole::User, TurnRole::Assistant, TurnRole::User]
        );
        assert_eq!(contents, vec!["one", "answer one", "two"]);
    }

    #[test]
    fn stale_settle_is_rejected_without_appending() {
        let mut transcript = Transcript::new();
        let begun = transcript.begin_exchange("hello").expect("accepted");

        let stale = ExchangeId::new(begun.exchange_id.0 + 1);
        let rejection = transcript
            .settle_exchange(stale, ExchangeOutcome::Failure)
            .expect_err("stale settle must be rejected");

        assert_eq!(
            rejection,
            ExchangeRejection::StaleExchange {
                active: begun.exchange_id,
                attempted: stale,
            }
        );
        assert_eq!(transcript.messages().len(), 1);
        assert!(transcript.is_busy());
    }

    #[test]
    fn settle_without_active_exchange_is_rejected() {
        let mut transcript = Transcript::new();
        let attempted = ExchangeId::new(7);

        assert_eq!(
            transcript.settle_exchange(attempted, ExchangeOutcome::Failure),
            Err(ExchangeRejection::NoActiveExchange { attempted })
        );
        assert!(transcript.messages().is_empty());
    }

    #[test]
    fn exchange_state_transitions_are_deterministic() {
        let idle = ExchangeState::Idle;
        let first = ExchangeId::new(1);
        let second = ExchangeId::new(2);

        let in_flight = idle.begin(first).expect("idle accepts begin");
        assert_eq!(in_flight.active_exchange(), Some(first));

        assert_eq!(
            in_flight.begin(second),
            Err(ExchangeRejection::AlreadyInFlight {
                active: first,
                attempted: second,
            })
        );
        assert_eq!(
            in_flight.settle(second),
            Err(ExchangeRejection::StaleExchange {
                active: first,
                attempted: second,
            })
        );
        assert_eq!(in_flight.settle(first), Ok(ExchangeState::Idle));
    }
}
