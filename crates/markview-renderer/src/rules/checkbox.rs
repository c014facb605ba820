//! Interactive task list checkboxes.
//!
//! In the default mode each task marker becomes a real checkbox input
//! whose click handler reports `checkboxclick:<checked|unchecked>:<line>`
//! through the host messaging function, so the host can update the
//! underlying note text. The CSS-only mode renders no input at all; the
//! surrounding list structure is tagged with classes instead (handled
//! where the list markup is written).

use crate::options::CheckboxRenderingType;
use crate::rules::{RenderContext, RenderRule, RuleEvent, RuleOutcome};

pub struct CheckboxRule;

impl RenderRule for CheckboxRule {
    fn name(&self) -> &'static str {
        "checkbox"
    }

    fn handle(&self, event: &RuleEvent<'_>, ctx: &mut RenderContext<'_>) -> RuleOutcome {
        let RuleEvent::TaskListMarker { checked, offset } = event else {
            return RuleOutcome::PassThrough;
        };

        if ctx.options.checkbox_rendering_type == CheckboxRenderingType::CssOnly {
            // Marker consumed; classes go on the list markup itself.
            return RuleOutcome::Html(String::new());
        }

        ctx.checkbox_index += 1;
        let id = format!("md-checkbox-{}", ctx.checkbox_index);
        let line = ctx.line_of_offset(*offset);
        let post = &ctx.options.post_message_syntax;

        // The handler runs in an isolated script context: only builtin
        // globals and the messaging function are available.
        let onclick = format!(
            "const label = document.getElementById('{id}-label'); if (label) {{ label.className = this.checked ? 'checkbox-label-checked' : 'checkbox-label-unchecked'; }} {post}('checkboxclick:' + (this.checked ? 'checked' : 'unchecked') + ':{line}');"
        );

        let checked_attr = if *checked { " checked=\"checked\"" } else { "" };
        let disabled_attr = if ctx.options.checkbox_disabled {
            " disabled=\"disabled\""
        } else {
            ""
        };
        let label_class = if *checked {
            "checkbox-label-checked"
        } else {
            "checkbox-label-unchecked"
        };

        ctx.pending_checkbox_label = true;
        RuleOutcome::Html(format!(
            "<input type=\"checkbox\" id=\"{id}\"{checked_attr}{disabled_attr} onclick=\"{onclick}\"/><label id=\"{id}-label\" for=\"{id}\" class=\"{label_class}\">"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RenderOptions;
    use crate::rules::test_support::ContextFixture;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_marker_becomes_input_and_label() {
        let mut fixture = ContextFixture::new();
        fixture.source = "- [ ] first\n- [x] second".to_owned();
        let mut ctx = fixture.context();

        let RuleOutcome::Html(html) = CheckboxRule.handle(
            &RuleEvent::TaskListMarker {
                checked: false,
                offset: 2,
            },
            &mut ctx,
        ) else {
            panic!("marker should render");
        };
        assert!(html.contains("id=\"md-checkbox-1\""));
        assert!(!html.contains("checked=\"checked\""));
        assert!(html.contains("checkboxclick:"));
        assert!(html.contains(":1');"));
        assert!(html.contains("class=\"checkbox-label-unchecked\""));
        assert!(ctx.pending_checkbox_label);
    }

    #[test]
    fn test_checked_marker_and_line_number() {
        let mut fixture = ContextFixture::new();
        fixture.source = "- [ ] first\n- [x] second".to_owned();
        let mut ctx = fixture.context();

        let RuleOutcome::Html(html) = CheckboxRule.handle(
            &RuleEvent::TaskListMarker {
                checked: true,
                offset: 14,
            },
            &mut ctx,
        ) else {
            panic!("marker should render");
        };
        assert!(html.contains("checked=\"checked\""));
        assert!(html.contains(":2');"));
    }

    #[test]
    fn test_index_increments_per_render() {
        let fixture = ContextFixture::new();
        let mut ctx = fixture.context();
        for expected in 1..=3u32 {
            let RuleOutcome::Html(html) = CheckboxRule.handle(
                &RuleEvent::TaskListMarker {
                    checked: false,
                    offset: 0,
                },
                &mut ctx,
            ) else {
                panic!("marker should render");
            };
            assert!(html.contains(&format!("id=\"md-checkbox-{expected}\"")));
        }
    }

    #[test]
    fn test_disabled_checkbox() {
        let mut fixture = ContextFixture::new();
        fixture.options = RenderOptions {
            checkbox_disabled: true,
            ..RenderOptions::default()
        };
        let mut ctx = fixture.context();
        let RuleOutcome::Html(html) = CheckboxRule.handle(
            &RuleEvent::TaskListMarker {
                checked: false,
                offset: 0,
            },
            &mut ctx,
        ) else {
            panic!("marker should render");
        };
        assert!(html.contains("disabled=\"disabled\""));
    }

    #[test]
    fn test_css_only_mode_emits_nothing() {
        let mut fixture = ContextFixture::new();
        fixture.options = RenderOptions {
            checkbox_rendering_type: CheckboxRenderingType::CssOnly,
            ..RenderOptions::default()
        };
        let mut ctx = fixture.context();
        let outcome = CheckboxRule.handle(
            &RuleEvent::TaskListMarker {
                checked: true,
                offset: 0,
            },
            &mut ctx,
        );
        assert_eq!(outcome, RuleOutcome::Html(String::new()));
        assert!(!ctx.pending_checkbox_label);
    }
}
