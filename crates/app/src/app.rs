use std::sync::Arc;

use gpui::*;
use gpui_component::{ActiveTheme, h_flex, label::Label, v_flex};

use docent_api::QaBackend;

use crate::chat::ChatView;

gpui::actions!(shell, [Quit]);

/// Main window shell: a slim title row over the chat view.
pub struct AppShell {
    chat_view: Entity<ChatView>,
}

impl AppShell {
    pub fn new(backend: Arc<dyn QaBackend>, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let chat_view = cx.new(|cx| ChatView::new(backend, window, cx));

        Self { chat_view }
    }
}

impl Render for AppShell {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .size_full()
            .min_h_0()
            .bg(theme.background)
            .child(
                h_flex()
                    .w_full()
                    .flex_shrink_0()
                    .px_4()
                    .py_2()
                    .border_b_1()
                    .border_color(theme.border)
                    .child(Label::new("Docent").text_sm()),
            )
            .child(div().flex_1().min_h_0().child(self.chat_view.clone()))
    }
}
