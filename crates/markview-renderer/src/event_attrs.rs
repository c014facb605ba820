//! Inline event handler attributes for resolved resource links.
//!
//! The rendered HTML runs inside a script-isolated view whose host only
//! exposes a `postMessage`-style bridge, so interactivity is emitted as
//! small inline handler snippets that reference nothing but built-in
//! globals and that bridge function.

use crate::options::RenderOptions;

/// Delay before a sustained touch is reported as a long press.
const LONG_PRESS_DELAY_MS: u32 = 500;

/// Build the inline event handler attribute string for an element bound
/// to `resource_id`.
///
/// With long press enabled a touch-and-hold fires
/// `postMessage("longclick:<id>")` after [`LONG_PRESS_DELAY_MS`]; in that
/// mode no `onclick` is emitted because the two gestures would conflict.
/// Otherwise, when `click_action` is given, it becomes an `onclick`
/// handler suppressing default navigation.
///
/// The returned string is either empty or starts with a space so it can
/// be appended directly after other attributes.
#[must_use]
pub fn event_handling_attrs(
    resource_id: &str,
    options: &RenderOptions,
    click_action: Option<&str>,
) -> String {
    if options.enable_long_press && !resource_id.is_empty() {
        let post = &options.post_message_syntax;
        let fire = format!("{post}('longclick:{resource_id}')");

        // The timer id lives on window so a second touch point can find
        // it. Two fingers means pinch-to-zoom, not long press, so a
        // touch while a timer is pending cancels it without arming a
        // new one.
        let touch_start = format!(
            "if (window.longPressTimeout) {{ clearTimeout(window.longPressTimeout); window.longPressTimeout = null; }} else {{ window.longPressTimeout = setTimeout(() => {{ window.longPressTimeout = null; {fire}; }}, {LONG_PRESS_DELAY_MS}); }}"
        );
        let cancel = "if (window.longPressTimeout) { clearTimeout(window.longPressTimeout); window.longPressTimeout = null; }";

        return format!(
            " ontouchstart=\"{touch_start}\" ontouchmove=\"{cancel}\" ontouchend=\"{cancel}\" ontouchcancel=\"{cancel}\""
        );
    }

    match click_action {
        Some(action) => format!(" onclick='{action} return false;'"),
        None => String::new(),
    }
}
