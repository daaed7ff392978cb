use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;
use std::ops::Range;
use std::rc::Rc;
use std::sync::Arc;

use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    text::TextView,
    v_flex, v_virtual_list,
};

use docent_api::QaBackend;

use crate::chat::message::{Message, MessageId, Role};
use crate::chat::scroll_manager::ScrollManager;
use crate::chat::source_card::SourceCard;

const DEFAULT_CONTENT_WIDTH: Pixels = px(680.);
const LIST_HORIZONTAL_PADDING: Pixels = px(16.);
const CONTENT_WIDTH_CHANGE_EPSILON: f32 = 1.0;
const USER_BUBBLE_MAX_WIDTH: Pixels = px(540.);
const USER_BUBBLE_PADDING_X: Pixels = px(14.);
const USER_BUBBLE_PADDING_Y: Pixels = px(10.);
const ASSISTANT_LABEL_HEIGHT: Pixels = px(16.);
const ASSISTANT_LABEL_GAP: Pixels = px(8.);
const SOURCE_CARD_ESTIMATED_HEIGHT: Pixels = px(96.);
const SOURCE_CARD_GAP: Pixels = px(8.);
const ESTIMATED_TEXT_LINE_HEIGHT: Pixels = px(18.);
const ESTIMATED_CHAR_WIDTH: f32 = 7.0;
const MARKDOWN_SAFE_FALLBACK_THRESHOLD_BYTES: usize = 128 * 1024;

/// Card entities are keyed by owning message and reference position so
/// duplicate references stay distinct instances.
type SourceCardKey = (MessageId, usize);

struct SizeCacheEntry {
    layout_hash: u64,
    height: Pixels,
    measured: bool,
}

/// Virtualized transcript view.
///
/// Owns one [`SourceCard`] entity per assistant source reference; because the
/// transcript is append-only, cards are created once and never churn.
pub struct MessageList {
    backend: Arc<dyn QaBackend>,
    messages: Vec<Message>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    scroll_manager: ScrollManager,
    size_cache: HashMap<MessageId, SizeCacheEntry>,
    source_cards: HashMap<SourceCardKey, Entity<SourceCard>>,
    content_width: Option<Pixels>,
}

impl MessageList {
    pub fn new(backend: Arc<dyn QaBackend>, _cx: &mut Context<Self>) -> Self {
        Self {
            backend,
            messages: Vec::new(),
            item_sizes: Rc::new(Vec::new()),
            scroll_manager: ScrollManager::new(),
            size_cache: HashMap::new(),
            source_cards: HashMap::new(),
            content_width: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn set_messages(&mut self, messages: Vec<Message>, cx: &mut Context<Self>) {
        let grew = messages.len() > self.messages.len();

        self.messages = messages;
        self.ensure_source_cards(cx);
        self.rebuild_item_sizes();

        if grew {
            self.scroll_manager.request_scroll_to_bottom_if_following();
        }

        cx.notify();
    }

    /// Materializes one card entity per source reference, each of which
    /// issues its own fetch on construction.
    fn ensure_source_cards(&mut self, cx: &mut Context<Self>) {
        let mut active_keys = HashSet::new();

        for message in &self.messages {
            for (index, source) in message.sources.iter().enumerate() {
                let key = (message.id, index);
                active_keys.insert(key);

                if !self.source_cards.contains_key(&key) {
                    let backend = self.backend.clone();
                    let source = source.clone();
                    let card = cx.new(|cx| SourceCard::new(backend, source, cx));
                    self.source_cards.insert(key, card);
                }
            }
        }

        self.source_cards.retain(|key, _| active_keys.contains(key));
    }

    fn update_content_width(&mut self, cx: &mut Context<Self>) {
        let list_width = self.scroll_manager.bounds_width();
        if list_width <= Pixels::ZERO {
            return;
        }

        let next_content_width = max_pixels(px(1.), list_width - LIST_HORIZONTAL_PADDING * 2);
        let width_changed = self.content_width.is_none_or(|current| {
            (f32::from(current) - f32::from(next_content_width)).abs()
                > CONTENT_WIDTH_CHANGE_EPSILON
        });

        if width_changed {
            self.content_width = Some(next_content_width);

            // Width changed, so cached measurements no longer apply.
            for entry in self.size_cache.values_mut() {
                entry.measured = false;
            }

            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn rebuild_item_sizes(&mut self) {
        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let mut active_ids = HashSet::with_capacity(self.messages.len());
        let mut sizes = Vec::with_capacity(self.messages.len());

        for message in &self.messages {
            let next_hash = layout_hash(message);
            let estimated_height = estimate_message_height(message, content_width);

            let entry = self.size_cache.entry(message.id).or_insert(SizeCacheEntry {
                layout_hash: next_hash,
                height: estimated_height,
                measured: false,
            });

            // Cache entries are keyed by message id and invalidate only when content changes.
            if entry.layout_hash != next_hash {
                entry.layout_hash = next_hash;
                entry.height = estimated_height;
                entry.measured = false;
            } else if !entry.measured {
                entry.height = estimated_height;
            }

            sizes.push(size(px(0.), entry.height));
            active_ids.insert(message.id);
        }

        self.size_cache.retain(|id, _| active_ids.contains(id));
        self.item_sizes = Rc::new(sizes);
    }

    fn measure_visible_items(
        &mut self,
        visible_range: Range<usize>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        if self.messages.is_empty() {
            return;
        }

        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let available_space = size(
            AvailableSpace::Definite(content_width),
            AvailableSpace::MinContent,
        );
        let mut updated = false;

        for index in visible_range {
            let Some(message) = self.messages.get(index).cloned() else {
                continue;
            };

            let next_hash = layout_hash(&message);
            let estimated_height = estimate_message_height(&message, content_width);

            {
                let entry = self.size_cache.entry(message.id).or_insert(SizeCacheEntry {
                    layout_hash: next_hash,
                    height: estimated_height,
                    measured: false,
                });

                if entry.layout_hash != next_hash {
                    entry.layout_hash = next_hash;
                    entry.height = estimated_height;
                    entry.measured = false;
                }
            }

            let mut row = self.render_message_row(&message, index, cx);
            let measured_height = row.layout_as_root(available_space, window, cx).height;
            let Some(entry) = self.size_cache.get_mut(&message.id) else {
                continue;
            };
            let height_changed = !entry.measured || pixels_changed(entry.height, measured_height);
            if height_changed {
                entry.height = measured_height;
                updated = true;
            }
            entry.measured = true;
        }

        if updated {
            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn render_message_row(
        &self,
        message: &Message,
        index: usize,
        cx: &mut Context<Self>,
    ) -> AnyElement {
        let theme = cx.theme();

        if message.role == Role::User {
            let content = if message.content.is_empty() {
                " ".to_string()
            } else {
                message.content.clone()
            };

            return v_flex()
                .w_full()
                .items_end()
                .child(
                    div()
                        .max_w(USER_BUBBLE_MAX_WIDTH)
                        .px(USER_BUBBLE_PADDING_X)
                        .py(USER_BUBBLE_PADDING_Y)
                        .rounded_lg()
                        .bg(theme.accent)
                        .text_color(theme.accent_foreground)
                        .child(Label::new(content).text_sm()),
                )
                .into_any_element();
        }

        let content = self.render_assistant_content(message, index);
        let cards = message
            .sources
            .iter()
            .enumerate()
            .filter_map(|(source_index, _)| {
                self.source_cards
                    .get(&(message.id, source_index))
                    .cloned()
            })
            .collect::<Vec<_>>();

        v_flex()
            .w_full()
            .gap_2()
            .child(
                Label::new("Assistant")
                    .text_xs()
                    .text_color(theme.foreground.opacity(0.5)),
            )
            .child(content)
            .when(!cards.is_empty(), |column| {
                column.child(v_flex().w_full().gap(SOURCE_CARD_GAP).children(cards))
            })
            .into_any_element()
    }

    fn render_assistant_content(&self, message: &Message, index: usize) -> AnyElement {
        if message.content.trim().is_empty() {
            return Label::new("(empty response)").text_sm().into_any_element();
        }

        if message.content.len() > MARKDOWN_SAFE_FALLBACK_THRESHOLD_BYTES {
            // Keep markdown rendering predictable by falling back to plain text for oversized payloads.
            return Label::new(message.content.clone())
                .text_sm()
                .into_any_element();
        }

        let markdown_id = ElementId::Name(SharedString::from(format!(
            "assistant-markdown-{}-{index}",
            message.id.0
        )));

        TextView::markdown(markdown_id, message.content.clone())
            .code_block_actions(|code_block, _window, _cx| {
                let code = code_block.code().to_string();
                let mut hasher = DefaultHasher::new();
                hasher.write(code.as_bytes());
                let copy_button_id = format!("copy-code-{}", hasher.finish());

                h_flex().w_full().justify_end().child(
                    Button::new(copy_button_id)
                        .ghost()
                        .small()
                        .icon(IconName::Copy)
                        .child("Copy")
                        .on_click(move |_, _, cx| {
                            cx.write_to_clipboard(ClipboardItem::new_string(code.clone()));
                        }),
                )
            })
            .selectable(true)
            .into_any_element()
    }
}

impl Render for MessageList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        self.update_content_width(cx);
        self.scroll_manager.update_follow_state();
        self.scroll_manager.apply_pending_scroll();

        v_flex().size_full().min_h_0().child(
            v_virtual_list(
                cx.entity().clone(),
                "message-list",
                self.item_sizes.clone(),
                |this, visible_range, window, cx| {
                    // Only visible rows get measured, so layout cost stays O(visible).
                    this.update_content_width(cx);
                    this.measure_visible_items(visible_range.clone(), window, cx);
                    visible_range
                        .filter_map(|index| {
                            this.messages
                                .get(index)
                                .cloned()
                                .map(|message| this.render_message_row(&message, index, cx))
                        })
                        .collect::<Vec<_>>()
                },
            )
            .size_full()
            .px_4()
            .py_3()
            .gap_4()
            .track_scroll(self.scroll_manager.handle()),
        )
    }
}

fn layout_hash(message: &Message) -> u64 {
    let mut hasher = DefaultHasher::new();

    hasher.write_u64(message.id.0);

    let role_tag = match message.role {
        Role::User => 0,
        Role::Assistant => 1,
    };
    hasher.write_u8(role_tag);

    hasher.write(message.content.as_bytes());

    for source in &message.sources {
        hasher.write(source.object_id.as_bytes());
        hasher.write(source.collection.as_bytes());
    }

    hasher.finish()
}

fn estimate_message_height(message: &Message, content_width: Pixels) -> Pixels {
    match message.role {
        Role::User => {
            let bubble_width = min_pixels(content_width, USER_BUBBLE_MAX_WIDTH);
            let text_width = max_pixels(px(1.), bubble_width - USER_BUBBLE_PADDING_X * 2);
            let text_height = estimate_text_height(&message.content, text_width);
            text_height + USER_BUBBLE_PADDING_Y * 2
        }
        Role::Assistant => {
            let text_height = if message.content.is_empty() {
                ESTIMATED_TEXT_LINE_HEIGHT
            } else {
                estimate_text_height(&message.content, content_width)
            };

            let mut total_height = ASSISTANT_LABEL_HEIGHT + ASSISTANT_LABEL_GAP + text_height;
            for _ in &message.sources {
                total_height += SOURCE_CARD_GAP + SOURCE_CARD_ESTIMATED_HEIGHT;
            }

            total_height
        }
    }
}

fn estimate_text_height(content: &str, width: Pixels) -> Pixels {
    if content.is_empty() {
        return ESTIMATED_TEXT_LINE_HEIGHT;
    }

    let width_as_f32 = f32::from(width);
    let chars_per_line = (width_as_f32 / ESTIMATED_CHAR_WIDTH).floor().max(1.0) as usize;

    let mut line_count = 0usize;
    for line in content.lines() {
        let char_count = line.chars().count().max(1);
        line_count += char_count.div_ceil(chars_per_line);
    }

    // Account for the trailing empty line when content ends with a newline.
    if content.ends_with('\n') {
        line_count += 1;
    }

    ESTIMATED_TEXT_LINE_HEIGHT * line_count.max(1)
}

fn max_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) >= f32::from(b) { a } else { b }
}

fn min_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) <= f32::from(b) { a } else { b }
}

fn pixels_changed(a: Pixels, b: Pixels) -> bool {
    (f32::from(a) - f32::from(b)).abs() > 0.5
}
