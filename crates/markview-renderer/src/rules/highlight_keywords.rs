//! Search keyword highlighting in text runs.

use crate::html::escape_html;
use crate::rules::{RenderContext, RenderRule, RuleEvent, RuleOutcome};

pub struct HighlightKeywordsRule;

impl RenderRule for HighlightKeywordsRule {
    fn name(&self) -> &'static str {
        "highlight_keywords"
    }

    fn handle(&self, event: &RuleEvent<'_>, ctx: &mut RenderContext<'_>) -> RuleOutcome {
        let RuleEvent::Text(text) = event else {
            return RuleOutcome::PassThrough;
        };
        let keywords = &ctx.options.highlighted_keywords;
        if keywords.is_empty() {
            return RuleOutcome::PassThrough;
        }

        // Offsets found in the lowercased copy are only valid in the
        // original for ASCII text, where byte positions cannot shift.
        let lower = if text.is_ascii() {
            text.to_ascii_lowercase()
        } else {
            (*text).to_owned()
        };
        if !keywords
            .iter()
            .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
        {
            return RuleOutcome::PassThrough;
        }

        let mut marked: Vec<(usize, usize)> = Vec::new();
        for keyword in keywords {
            if keyword.is_empty() {
                continue;
            }
            let needle = if text.is_ascii() {
                keyword.to_ascii_lowercase()
            } else {
                keyword.clone()
            };
            let mut from = 0;
            while let Some(found) = lower[from..].find(&needle) {
                let start = from + found;
                marked.push((start, start + needle.len()));
                from = start + needle.len();
            }
        }
        marked.sort_unstable();
        // Overlapping matches from different keywords collapse into one
        // mark.
        let mut spans: Vec<(usize, usize)> = Vec::new();
        for (start, end) in marked {
            match spans.last_mut() {
                Some((_, last_end)) if start < *last_end => *last_end = (*last_end).max(end),
                _ => spans.push((start, end)),
            }
        }

        let mut out = String::with_capacity(text.len() + spans.len() * 13);
        let mut pos = 0;
        for (start, end) in spans {
            out.push_str(&escape_html(&text[pos..start]));
            out.push_str("<mark>");
            out.push_str(&escape_html(&text[start..end]));
            out.push_str("</mark>");
            pos = end;
        }
        out.push_str(&escape_html(&text[pos..]));
        RuleOutcome::Html(out)
    }
}
