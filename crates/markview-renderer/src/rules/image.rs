//! Internal image reference rendering.

use crate::resolver::image_replacement;
use crate::rules::{RenderContext, RenderRule, RuleEvent, RuleOutcome};

pub struct ImageRule;

impl RenderRule for ImageRule {
    fn name(&self) -> &'static str {
        "image"
    }

    fn handle(&self, event: &RuleEvent<'_>, ctx: &mut RenderContext<'_>) -> RuleOutcome {
        let RuleEvent::Image { src, alt, title } = event else {
            return RuleOutcome::PassThrough;
        };
        match image_replacement(src, alt, *title, ctx.options, ctx.resource_model) {
            Some(html) => RuleOutcome::Html(html),
            // External images are left to the default writer.
            None => RuleOutcome::PassThrough,
        }
    }
}
