//! Incremental rendering of a response while it streams

use crate::output::console::ConsoleFormatter;
use chatwire_domain::ResponseContent;

/// Remembers what has been printed for one response and renders only what
/// changed since.
///
/// Content only grows at the end: the last item is extended by merges and
/// new items are appended. An earlier item that changes in place (a tool
/// call that finished, an answered question) is printed again on its own
/// line.
#[derive(Debug, Default)]
pub struct ResponseView {
    printed: Vec<String>,
}

impl ResponseView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to write to bring the terminal up to date with `content`.
    pub fn update(&mut self, content: &[ResponseContent]) -> String {
        let mut out = String::new();
        for (i, item) in content.iter().enumerate() {
            let rendered = ConsoleFormatter::format_content(item);
            match self.printed.get(i) {
                Some(old) if *old == rendered => {}
                Some(old) if rendered.starts_with(old.as_str()) && i + 1 == self.printed.len() => {
                    out.push_str(&rendered[old.len()..]);
                    self.printed[i] = rendered;
                }
                Some(_) => {
                    out.push('\n');
                    out.push_str(&rendered);
                    self.printed[i] = rendered;
                }
                None => {
                    if !self.printed.is_empty() {
                        out.push_str("\n\n");
                    }
                    out.push_str(&rendered);
                    self.printed.push(rendered);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatwire_domain::ToolCallContent;

    #[test]
    fn test_streamed_markdown_prints_suffix_only() {
        colored::control::set_override(false);
        let mut view = ResponseView::new();
        assert_eq!(view.update(&[ResponseContent::markdown("Hel")]), "Hel");
        assert_eq!(view.update(&[ResponseContent::markdown("Hello")]), "lo");
        assert_eq!(view.update(&[ResponseContent::markdown("Hello")]), "");
    }

    #[test]
    fn test_new_items_are_separated() {
        colored::control::set_override(false);
        let mut view = ResponseView::new();
        view.update(&[ResponseContent::markdown("a")]);
        let out = view.update(&[ResponseContent::markdown("a"), ResponseContent::error("b")]);
        assert_eq!(out, "\n\nError: b");
    }

    #[test]
    fn test_changed_earlier_item_is_reprinted() {
        colored::control::set_override(false);
        let running = ResponseContent::ToolCall(ToolCallContent {
            id: Some("scan".into()),
            name: Some("scan".into()),
            arguments: None,
            finished: false,
            result: None,
        });
        let mut done = running.clone();
        if let ResponseContent::ToolCall(call) = &mut done {
            call.finished = true;
            call.result = Some("Repo Scanned".into());
        }

        let mut view = ResponseView::new();
        view.update(&[running, ResponseContent::markdown("x")]);
        let out = view.update(&[done, ResponseContent::markdown("x")]);
        assert_eq!(out, "\n✓ scan Repo Scanned");
    }
}
