/// Event contracts for chat module wiring.
pub mod events;
/// Domain entities and the deterministic exchange state boundary.
pub mod message;
pub mod message_input;
pub mod message_list;
pub mod scroll_manager;
pub mod source_card;
pub mod view;

pub use events::Submit;
pub use message::{
    EXCHANGE_FAILED_APOLOGY, ExchangeBegun, ExchangeId, ExchangeOutcome, ExchangeRejection,
    ExchangeState, MISSING_ANSWER_PLACEHOLDER, Message, MessageId, Role, SubmitRejection,
    Transcript,
};
pub use message_input::MessageInput;
pub use message_list::MessageList;
pub use scroll_manager::ScrollManager;
pub use source_card::SourceCard;
pub use view::ChatView;
