use std::sync::Arc;

use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    label::Label,
    v_flex,
};
use gpui_tokio_bridge::Tokio;
use tokio::sync::oneshot;

use docent_api::{BackendResult, QaBackend, SourceData, SourceRef};

/// Mutually exclusive render states for one card.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CardState {
    Loading,
    Failed,
    Loaded(SourceData),
}

/// One citation card.
///
/// Issues exactly one `/api/sources` fetch when constructed. Duplicate
/// references elsewhere in the transcript fetch independently; there is no
/// cache and no retry. Dropping the card drops its tasks, abandoning any
/// in-flight request without an observable update.
pub struct SourceCard {
    source: SourceRef,
    state: CardState,
    worker_task: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
    reader_task: Option<Task<()>>,
}

impl SourceCard {
    pub fn new(backend: Arc<dyn QaBackend>, source: SourceRef, cx: &mut Context<Self>) -> Self {
        let (result_tx, result_rx) = oneshot::channel();

        let request = source.clone();
        let worker_task = Tokio::spawn(cx, async move {
            let result = backend.resolve_source(request).await;
            let _ = result_tx.send(result);
        });

        let reader_task = cx.spawn(async move |this, cx| {
            let received = result_rx.await;
            let _ = this.update(cx, |this, cx| {
                this.handle_resolved(received, cx);
            });
        });

        Self {
            source,
            state: CardState::Loading,
            worker_task: Some(worker_task),
            reader_task: Some(reader_task),
        }
    }

    fn handle_resolved(
        &mut self,
        received: Result<BackendResult<SourceData>, oneshot::error::RecvError>,
        cx: &mut Context<Self>,
    ) {
        self.worker_task = None;
        self.reader_task = None;
        self.state = settle_card_state(&self.source, received);
        cx.notify();
    }

    fn render_loaded(&self, data: &SourceData, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let link = data.link().map(str::to_string);

        v_flex()
            .gap_1()
            .child(
                Label::new(data.kind_label())
                    .text_xs()
                    .text_color(theme.foreground.opacity(0.5)),
            )
            .child(Label::new(data.title().to_string()).text_sm())
            .child(
                Label::new(data.date().to_string())
                    .text_xs()
                    .text_color(theme.foreground.opacity(0.65)),
            )
            .child(
                Label::new(data.body().to_string())
                    .text_sm()
                    .text_color(theme.foreground.opacity(0.8)),
            )
            .when_some(link, |column, link| {
                let button_id =
                    SharedString::from(format!("source-link-{}", self.source.object_id));
                column.child(
                    div().flex().justify_start().child(
                        Button::new(ElementId::Name(button_id))
                            .ghost()
                            .small()
                            .child("Open PDF")
                            .on_click(move |_, _, cx| {
                                cx.open_url(&link);
                            }),
                    ),
                )
            })
            .into_any_element()
    }
}

/// Maps a worker result onto a render state.
///
/// Any error path lands on `Failed`: backend errors were already logged in
/// detail by the client, and a dropped worker is logged here.
fn settle_card_state(
    source: &SourceRef,
    received: Result<BackendResult<SourceData>, oneshot::error::RecvError>,
) -> CardState {
    match received {
        Ok(Ok(data)) => CardState::Loaded(data),
        Ok(Err(_)) => CardState::Failed,
        Err(_) => {
            tracing::error!(
                object_id = %source.object_id,
                collection = %source.collection,
                "source worker dropped before sending a result"
            );
            CardState::Failed
        }
    }
}

impl Render for SourceCard {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        let body = match &self.state {
            CardState::Loading => Label::new("Loading source...")
                .text_xs()
                .text_color(theme.foreground.opacity(0.5))
                .into_any_element(),
            CardState::Failed => Label::new("Failed to load source")
                .text_xs()
                .text_color(theme.danger)
                .into_any_element(),
            CardState::Loaded(data) => self.render_loaded(data, cx),
        };

        let failed = matches!(self.state, CardState::Failed);

        div()
            .w_full()
            .px_3()
            .py_2()
            .rounded_lg()
            .border_1()
            .border_color(if failed { theme.danger } else { theme.border })
            .bg(theme.background)
            .child(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_api::BackendError;

    fn source() -> SourceRef {
        SourceRef::new("x1", "PDFchunks1")
    }

    fn excerpt() -> SourceData {
        SourceData::Excerpt {
            title: "T".to_string(),
            date: "2024-01-01".to_string(),
            body: "C".to_string(),
            link: None,
        }
    }

    #[test]
    fn resolved_data_settles_the_card_as_loaded() {
        let state = settle_card_state(&source(), Ok(Ok(excerpt())));
        assert_eq!(state, CardState::Loaded(excerpt()));
    }

    #[test]
    fn backend_error_settles_the_card_as_failed() {
        let error = BackendError::SourceStatus {
            stage: "source-http-status",
            object_id: "x1".to_string(),
            status: 500,
            body: "internal error".to_string(),
        };

        let state = settle_card_state(&source(), Ok(Err(error)));
        assert_eq!(state, CardState::Failed);
    }

    #[test]
    fn dropped_worker_settles_the_card_as_failed() {
        let (result_tx, result_rx) = oneshot::channel::<BackendResult<SourceData>>();
        drop(result_tx);
        let received = result_rx.blocking_recv();

        let state = settle_card_state(&source(), received);
        assert_eq!(state, CardState::Failed);
    }
}
