//! Mandatory sanitization of raw HTML embedded in markdown.
//!
//! After sanitization, internal resource images inside the HTML are
//! resolved against the resource map the same way the HTML pipeline
//! resolves them.

use crate::html_pipeline::rewrite_resource_images;
use crate::rules::{RenderContext, RenderRule, RuleEvent, RuleOutcome};
use crate::sanitize::SanitizeOptions;

pub struct SanitizeHtmlRule;

impl SanitizeHtmlRule {
    fn sanitize_options(ctx: &RenderContext<'_>) -> SanitizeOptions {
        SanitizeOptions {
            add_no_md_conv_class: false,
            allowed_file_prefixes: ctx.options.allowed_file_prefixes.clone(),
        }
    }
}

impl RenderRule for SanitizeHtmlRule {
    fn name(&self) -> &'static str {
        "sanitize_html"
    }

    fn handle(&self, event: &RuleEvent<'_>, ctx: &mut RenderContext<'_>) -> RuleOutcome {
        match event {
            RuleEvent::HtmlBlock(html) => {
                let options = Self::sanitize_options(ctx);
                let sanitized = ctx.sanitizer.sanitize(html, &options);
                RuleOutcome::Html(rewrite_resource_images(
                    &sanitized,
                    ctx.options,
                    ctx.resource_model,
                ))
            }
            // Inline fragments may be lone opening or closing tags, so
            // they go through the fragment-aware mode.
            RuleEvent::InlineHtml(html) => {
                let options = Self::sanitize_options(ctx);
                let sanitized = ctx.sanitizer.sanitize_fragment(html, &options);
                RuleOutcome::Html(rewrite_resource_images(
                    &sanitized,
                    ctx.options,
                    ctx.resource_model,
                ))
            }
            _ => RuleOutcome::PassThrough,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{FetchStatus, LocalState, ResourceInfo, ResourceItem};
    use crate::rules::test_support::ContextFixture;
    use pretty_assertions::assert_eq;

    const ID: &str = "0123456789abcdef0123456789abcdef";

    fn fixture_with_image(status: FetchStatus) -> ContextFixture {
        let mut fixture = ContextFixture::new();
        fixture.options.resources.insert(
            ID.to_owned(),
            ResourceInfo {
                item: ResourceItem {
                    id: ID.to_owned(),
                    title: "pic".to_owned(),
                    mime: "image/png".to_owned(),
                    file_extension: "png".to_owned(),
                },
                local_state: LocalState {
                    fetch_status: status,
                },
            },
        );
        fixture
    }

    #[test]
    fn test_block_sanitized() {
        let fixture = ContextFixture::new();
        let mut ctx = fixture.context();
        let outcome = SanitizeHtmlRule.handle(
            &RuleEvent::HtmlBlock("<p onclick=\"x()\">hi<script>evil()</script></p>"),
            &mut ctx,
        );
        assert_eq!(outcome, RuleOutcome::Html("<p>hi</p>".to_owned()));
    }

    #[test]
    fn test_block_resource_image_resolved() {
        let fixture = fixture_with_image(FetchStatus::Done);
        let mut ctx = fixture.context();
        let block = format!("<img src=\":/{ID}\">");
        let RuleOutcome::Html(html) =
            SanitizeHtmlRule.handle(&RuleEvent::HtmlBlock(&block), &mut ctx)
        else {
            panic!("html blocks are always handled");
        };
        assert!(html.contains(&format!("data-resource-id=\"{ID}\"")));
        assert!(html.contains("src=\"file:///res/"));
        assert!(!html.contains(":/0123"));
    }

    #[test]
    fn test_block_absent_resource_image_placeholder() {
        let fixture = ContextFixture::new();
        let mut ctx = fixture.context();
        let block = format!("<img src=\":/{ID}\">");
        let RuleOutcome::Html(html) =
            SanitizeHtmlRule.handle(&RuleEvent::HtmlBlock(&block), &mut ctx)
        else {
            panic!("html blocks are always handled");
        };
        assert!(html.contains("resource-status-notDownloaded"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn test_inline_open_tag_not_completed() {
        let fixture = ContextFixture::new();
        let mut ctx = fixture.context();
        let outcome =
            SanitizeHtmlRule.handle(&RuleEvent::InlineHtml("<em class=\"x\">"), &mut ctx);
        assert_eq!(outcome, RuleOutcome::Html("<em class=\"x\">".to_owned()));
    }
}
