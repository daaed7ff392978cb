use std::sync::Arc;

use gpui::*;
use gpui_component::{ActiveTheme, v_flex};
use gpui_tokio_bridge::Tokio;
use tokio::sync::oneshot;

use docent_api::{BackendResult, ChatAnswer, QaBackend};

use crate::chat::events::Submit;
use crate::chat::message::{ExchangeId, ExchangeOutcome, Transcript};
use crate::chat::{MessageInput, MessageList};

/// Parent coordinator for transcript/list/input/backend orchestration.
///
/// Owns the conversation controller state: the append-only transcript and the
/// single-exchange busy discipline. Network work runs on the Tokio bridge;
/// results come back through a oneshot channel and are applied on the
/// foreground entity.
pub struct ChatView {
    message_list: Entity<MessageList>,
    message_input: Entity<MessageInput>,
    backend: Arc<dyn QaBackend>,
    transcript: Transcript,
    ask_worker_task: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
    ask_reader_task: Option<Task<()>>,
}

impl ChatView {
    pub fn new(backend: Arc<dyn QaBackend>, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let message_list = cx.new(|cx| MessageList::new(backend.clone(), cx));
        let message_input = cx.new(|cx| MessageInput::new(window, cx));

        cx.subscribe(&message_input, |this, _, event: &Submit, cx| {
            this.handle_submit(event.clone(), cx);
        })
        .detach();

        Self {
            message_list,
            message_input,
            backend,
            transcript: Transcript::new(),
            ask_worker_task: None,
            ask_reader_task: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn handle_submit(&mut self, event: Submit, cx: &mut Context<Self>) {
        let begun = match self.transcript.begin_exchange(&event.content) {
            Ok(begun) => begun,
            Err(rejection) => {
                // The input already guards these; a second guard here keeps the
                // transcript invariant independent of UI wiring.
                tracing::debug!(?rejection, "submit rejected");
                return;
            }
        };

        self.message_input.update(cx, |input, cx| {
            input.set_busy(true, cx);
        });
        self.sync_messages(cx);

        let exchange_id = begun.exchange_id;
        let backend = self.backend.clone();
        let history = begun.history;
        let (result_tx, result_rx) = oneshot::channel();

        self.ask_worker_task = Some(Tokio::spawn(cx, async move {
            let result = backend.ask(history).await;
            let _ = result_tx.send(result);
        }));

        self.ask_reader_task = Some(cx.spawn(async move |this, cx| {
            let received = result_rx.await;
            let _ = this.update(cx, |this, cx| {
                this.handle_ask_result(exchange_id, received, cx);
            });
        }));

        cx.notify();
    }

    fn handle_ask_result(
        &mut self,
        exchange_id: ExchangeId,
        received: Result<BackendResult<ChatAnswer>, oneshot::error::RecvError>,
        cx: &mut Context<Self>,
    ) {
        self.ask_worker_task = None;
        self.ask_reader_task = None;

        let outcome = match received {
            Ok(Ok(answer)) => ExchangeOutcome::Answer(answer),
            Ok(Err(error)) => {
                tracing::error!(error = %error, "chat exchange failed");
                ExchangeOutcome::Failure
            }
            Err(_) => {
                tracing::error!("chat worker dropped before sending a result");
                ExchangeOutcome::Failure
            }
        };

        if let Err(rejection) = self.transcript.settle_exchange(exchange_id, outcome) {
            tracing::warn!(?rejection, "exchange settle rejected");
        }

        self.message_input.update(cx, |input, cx| {
            input.set_busy(self.transcript.is_busy(), cx);
        });
        self.sync_messages(cx);
        cx.notify();
    }

    fn sync_messages(&mut self, cx: &mut Context<Self>) {
        let messages = self.transcript.messages().to_vec();
        self.message_list.update(cx, |list, cx| {
            list.set_messages(messages, cx);
        });
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                div()
                    .id("chat-view-message-list")
                    .flex_1()
                    .min_h_0()
                    .child(self.message_list.clone()),
            )
            .child(
                div()
                    .id("chat-view-message-input")
                    .flex_shrink_0()
                    .w_full()
                    .border_t_1()
                    .border_color(theme.border)
                    .child(self.message_input.clone()),
            )
    }
}
