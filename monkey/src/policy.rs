//! Randomized exploration decisions for the target app's own screens.

use crate::config::Configuration;
use crate::dump::safe_text;
use crate::log::ActionKind;
use crate::node::UiNode;
use crate::pass::PassContext;
use crate::platforms::GlobalAction;
use crate::query::AttributeQuery;
use crate::search::search;
use rand::{Rng, RngCore};
use tracing::{debug, info, instrument, warn};

pub const EDIT_TEXT_CLASS: &str = "android.widget.EditText";
pub const CHECKBOX_CLASS: &str = "android.widget.CheckBox";
pub const RADIO_CLASS: &str = "android.widget.CheckedTextView";

pub const SCROLL_BACKWARD_VALUE: &str = "ACTION_SCROLL_BACKWARD";
pub const SCROLL_FORWARD_VALUE: &str = "ACTION_SCROLL_FORWARD";

const OAUTH_MARKERS: &[&str] = &["facebook", "google"];

/// Widget classes the policy fills and toggles
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPolicy {
    pub text_input: AttributeQuery,
    pub checkbox: AttributeQuery,
    pub radio: AttributeQuery,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            text_input: AttributeQuery::class(EDIT_TEXT_CLASS),
            checkbox: AttributeQuery::class(CHECKBOX_CLASS),
            radio: AttributeQuery::class(RADIO_CLASS),
        }
    }
}

impl DecisionPolicy {
    /// Types into text inputs and toggles checkboxes and radio buttons, each
    /// with its configured chance.
    #[instrument(level = "debug", skip(self, ctx, root))]
    pub fn fill_editfields(&self, ctx: &mut PassContext<'_>, root: &UiNode) {
        for field in search(Some(root), &self.text_input) {
            if !ctx.chance(ctx.config.text_input_chance) {
                continue;
            }
            let attrs = field.attributes();
            let value = text_input_for(&attrs.text, &attrs.resource_id, ctx.config, ctx.rng());
            ctx.record(ActionKind::FillForm, &safe_text(&attrs.resource_id), &value);
            if let Err(e) = field.set_text(&value) {
                warn!(resource_id = %attrs.resource_id, error = %e, "Failed to set text");
            }
        }

        for checkbox in search(Some(root), &self.checkbox) {
            if ctx.chance(ctx.config.checkbox_tick_chance) {
                toggle(ctx, &checkbox, ActionKind::Checkbox);
            }
        }

        for radio in search(Some(root), &self.radio) {
            if ctx.chance(ctx.config.radio_tick_chance) {
                toggle(ctx, &radio, ActionKind::Radiobutton);
            }
        }
    }

    /// Scrolls a random scrollable node, with the configured chance.
    /// Returns whether a scroll was performed.
    #[instrument(level = "debug", skip(self, ctx, root))]
    pub fn input_gestures(&self, ctx: &mut PassContext<'_>, root: &UiNode) -> bool {
        if !ctx.chance(ctx.config.scroll_chance) {
            return false;
        }

        let scrollables = search(Some(root), &AttributeQuery::ByScrollable);
        let Some(node) = ctx.pick(&scrollables).cloned() else {
            info!("No scrollables found");
            return false;
        };

        let forward = !ctx.chance(0.5);
        let value = if forward {
            SCROLL_FORWARD_VALUE
        } else {
            SCROLL_BACKWARD_VALUE
        };
        let resource_id = safe_text(&node.resource_id());
        debug!(%resource_id, value, "Scrolling");
        ctx.record(ActionKind::Scroll, &resource_id, value);
        if let Err(e) = node.scroll(forward) {
            warn!(%resource_id, error = %e, "Scroll failed");
        }
        true
    }

    /// Presses back or clicks a random clickable node, after giving OAuth
    /// buttons a chance. Returns whether anything was done.
    #[instrument(level = "debug", skip(self, ctx, root))]
    pub fn find_and_click_clickables(&self, ctx: &mut PassContext<'_>, root: &UiNode) -> bool {
        let clickables = search(Some(root), &AttributeQuery::ByClickable);

        if self.find_oauth_forms(ctx, &clickables) {
            return true;
        }

        if ctx.chance(ctx.config.back_button_press_chance) {
            debug!("Pressing back");
            ctx.record(ActionKind::Back, "", "");
            if let Err(e) = ctx.provider.global_action(GlobalAction::Back) {
                warn!(error = %e, "Back failed");
            }
            return true;
        }

        let Some(node) = ctx.pick(&clickables).cloned() else {
            info!("No clickables found");
            return false;
        };
        click(ctx, &node);
        true
    }

    /// Clicks the first clickable whose resource id names an OAuth provider,
    /// with the configured chance.
    pub fn find_oauth_forms(&self, ctx: &mut PassContext<'_>, clickables: &[UiNode]) -> bool {
        if !ctx.chance(ctx.config.oauth_search_chance) {
            debug!("Skipped OAuth search");
            return false;
        }

        let oauth = clickables.iter().find(|node| {
            let resource_id = node.resource_id().to_lowercase();
            OAUTH_MARKERS.iter().any(|marker| resource_id.contains(marker))
        });
        match oauth {
            Some(node) => {
                debug!(resource_id = %node.resource_id(), "Clicking OAuth form");
                click(ctx, node);
                true
            }
            None => false,
        }
    }
}

/// Records and performs a click on `node`
pub(crate) fn click(ctx: &mut PassContext<'_>, node: &UiNode) {
    let resource_id = safe_text(&node.resource_id());
    ctx.record(ActionKind::Click, &resource_id, "");
    if let Err(e) = node.click() {
        warn!(%resource_id, error = %e, "Click failed");
    }
}

fn toggle(ctx: &mut PassContext<'_>, node: &UiNode, kind: ActionKind) {
    let resource_id = safe_text(&node.resource_id());
    if let Err(e) = node.click() {
        warn!(%resource_id, %kind, error = %e, "Toggle failed");
    }
    let checked = node.is_checked();
    debug!(%resource_id, %kind, checked, "Toggled");
    ctx.record(kind, &resource_id, &checked.to_string());
}

#[derive(Debug, Clone, Copy)]
enum TextValue {
    Literal(&'static str),
    Username,
    Password,
    Url,
}

/// Context keywords and the input they call for. First match wins.
const TEXT_INPUT_RULES: &[(&str, TextValue)] = &[
    ("time", TextValue::Literal("Time input field")),
    ("date", TextValue::Literal("Date input field")),
    ("number", TextValue::Literal("12345678")),
    ("phone", TextValue::Literal("12345678")),
    ("+1", TextValue::Literal("+1-12345678")),
    ("mail", TextValue::Username),
    ("user", TextValue::Username),
    ("pass", TextValue::Password),
    ("city", TextValue::Literal("Dresden")),
    ("http", TextValue::Url),
    ("url", TextValue::Url),
];

/// The text that describes a field: its text, else its resource id
pub fn field_context(text: &str, resource_id: &str) -> String {
    let text = safe_text(text);
    if !text.is_empty() {
        return text;
    }
    if resource_id.is_empty() {
        info!("Found a field without text or resource id");
    }
    resource_id.to_string()
}

/// Input chosen by keyword for a field, or `None` when no keyword matches
pub fn classify_text_input(text: &str, resource_id: &str, config: &Configuration) -> Option<String> {
    let context = field_context(text, resource_id).to_lowercase();
    TEXT_INPUT_RULES
        .iter()
        .find(|(keyword, _)| context.contains(keyword))
        .map(|(_, value)| match value {
            TextValue::Literal(literal) => literal.to_string(),
            TextValue::Username => config.username.clone(),
            TextValue::Password => config.password.clone(),
            TextValue::Url => config.url.clone(),
        })
}

/// Input for a field: the keyword rule's value, else a random generic input
pub fn text_input_for(
    text: &str,
    resource_id: &str,
    config: &Configuration,
    rng: &mut dyn RngCore,
) -> String {
    if let Some(value) = classify_text_input(text, resource_id, config) {
        return value;
    }
    let fallbacks = ["Test", "12345", "", "1111", config.url.as_str()];
    fallbacks[rng.gen_range(0..fallbacks.len())].to_string()
}
