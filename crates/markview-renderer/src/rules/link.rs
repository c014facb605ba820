//! Link rendering via the resource resolver.
//!
//! Link open and close arrive as separate tokens, so the resolved
//! replacement is pushed on the render context's link stack at open
//! time and popped at close time, where any media player for the
//! linked resource is appended after the anchor.

use crate::resolver::{LinkReplacement, link_replacement, media_player_html};
use crate::rules::{RenderContext, RenderRule, RuleEvent, RuleOutcome};

pub struct LinkOpenRule;

pub struct LinkCloseRule;

/// Player markup for audio, video and PDF resources, emitted after the
/// closed anchor to the same resource.
fn player_for(replacement: &LinkReplacement, ctx: &mut RenderContext<'_>) -> String {
    let (Some(info), Some(full_path), Some(reference)) = (
        &replacement.resource,
        &replacement.resource_full_path,
        &replacement.reference,
    ) else {
        return String::new();
    };
    media_player_html(
        reference,
        info,
        full_path,
        ctx.options,
        ctx.theme,
        &mut ctx.embed_counts,
    )
    .unwrap_or_default()
}

impl RenderRule for LinkOpenRule {
    fn name(&self) -> &'static str {
        "link_open"
    }

    fn handle(&self, event: &RuleEvent<'_>, ctx: &mut RenderContext<'_>) -> RuleOutcome {
        let RuleEvent::LinkOpen { href, title } = event else {
            return RuleOutcome::PassThrough;
        };
        let replacement = link_replacement(href, *title, ctx.options, ctx.resource_model);
        let html = replacement.html.clone();
        ctx.link_stack.push(replacement);
        RuleOutcome::Html(html)
    }
}

impl RenderRule for LinkCloseRule {
    fn name(&self) -> &'static str {
        "link_close"
    }

    fn handle(&self, event: &RuleEvent<'_>, ctx: &mut RenderContext<'_>) -> RuleOutcome {
        if !matches!(event, RuleEvent::LinkClose) {
            return RuleOutcome::PassThrough;
        }
        match ctx.link_stack.pop() {
            Some(replacement) => {
                let player = if replacement.resource_ready {
                    player_for(&replacement, ctx)
                } else {
                    String::new()
                };
                RuleOutcome::Html(format!("</a>{player}"))
            }
            // Close with no matching open: leave it to the default
            // writer.
            None => RuleOutcome::PassThrough,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RenderOptions;
    use crate::resource::{FetchStatus, LocalState, ResourceInfo, ResourceItem, ResourceMap};
    use crate::rules::test_support::ContextFixture;
    use pretty_assertions::assert_eq;

    const ID: &str = "0123456789abcdef0123456789abcdef";

    fn fixture_with(mime: &str, status: FetchStatus) -> ContextFixture {
        let mut fixture = ContextFixture::new();
        let mut resources = ResourceMap::new();
        resources.insert(
            ID.to_owned(),
            ResourceInfo {
                item: ResourceItem {
                    id: ID.to_owned(),
                    title: "clip".to_owned(),
                    mime: mime.to_owned(),
                    file_extension: "bin".to_owned(),
                },
                local_state: LocalState {
                    fetch_status: status,
                },
            },
        );
        fixture.options = RenderOptions {
            resources,
            ..RenderOptions::default()
        };
        fixture
    }

    #[test]
    fn test_open_close_pair() {
        let fixture = ContextFixture::new();
        let mut ctx = fixture.context();
        let open = LinkOpenRule.handle(
            &RuleEvent::LinkOpen {
                href: "https://example.com",
                title: None,
            },
            &mut ctx,
        );
        assert!(matches!(open, RuleOutcome::Html(html) if html.starts_with("<a data-from-md")));
        assert_eq!(ctx.link_stack.len(), 1);

        let close = LinkCloseRule.handle(&RuleEvent::LinkClose, &mut ctx);
        assert_eq!(close, RuleOutcome::Html("</a>".to_owned()));
        assert!(ctx.link_stack.is_empty());
    }

    #[test]
    fn test_close_without_open_passes() {
        let fixture = ContextFixture::new();
        let mut ctx = fixture.context();
        assert_eq!(
            LinkCloseRule.handle(&RuleEvent::LinkClose, &mut ctx),
            RuleOutcome::PassThrough
        );
    }

    #[test]
    fn test_ready_audio_link_gets_player_after_anchor() {
        let fixture = fixture_with("audio/mpeg", FetchStatus::Done);
        let mut ctx = fixture.context();
        let href = format!(":/{ID}");
        let RuleOutcome::Html(open) = LinkOpenRule.handle(
            &RuleEvent::LinkOpen {
                href: &href,
                title: None,
            },
            &mut ctx,
        ) else {
            panic!("link should render");
        };
        assert!(open.contains("<a data-from-md"));
        assert!(!open.contains("<audio"));

        let RuleOutcome::Html(close) = LinkCloseRule.handle(&RuleEvent::LinkClose, &mut ctx)
        else {
            panic!("close should render");
        };
        assert!(close.starts_with("</a><audio"));
    }

    #[test]
    fn test_pending_resource_gets_no_player() {
        let fixture = fixture_with("audio/mpeg", FetchStatus::Started);
        let mut ctx = fixture.context();
        let href = format!(":/{ID}");
        let RuleOutcome::Html(open) = LinkOpenRule.handle(
            &RuleEvent::LinkOpen {
                href: &href,
                title: None,
            },
            &mut ctx,
        ) else {
            panic!("link should render");
        };
        assert!(open.contains("resource-status-downloading"));

        let close = LinkCloseRule.handle(&RuleEvent::LinkClose, &mut ctx);
        assert_eq!(close, RuleOutcome::Html("</a>".to_owned()));
    }
}
