//! Prompt-boundary test for wizard output.
//!
//! The wizard has no machine-readable prompt protocol. A prompt is recognized
//! only as the trailing, not yet newline-terminated fragment of its output
//! that contains one of a few marker characters (`:` or `?` by default).
//!
//! ## Known limitations
//!
//! - A marker inside a line that was already terminated is never treated as
//!   a prompt.
//! - A status fragment that happens to contain a marker and arrives without
//!   its newline is mistaken for a prompt.
//! - Multi-line prompts and prompts without any marker are not supported.

/// Marker substrings that identify a prompt awaiting input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMarkers {
    markers: Vec<String>,
}

impl Default for PromptMarkers {
    fn default() -> Self {
        Self::new([":", "?"])
    }
}

impl PromptMarkers {
    /// Empty markers are dropped; they would match every fragment.
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(Into::into)
                .filter(|m: &String| !m.is_empty())
                .collect(),
        }
    }

    /// Does this unterminated fragment look like a prompt?
    pub fn matches(&self, fragment: &str) -> bool {
        self.markers.iter().any(|m| fragment.contains(m.as_str()))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.markers
    }
}

/// A fragment of output the tool is presumably blocked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedPrompt {
    /// The fragment exactly as received.
    pub text: String,
    /// The output stream closed; `text` is whatever was left over.
    pub at_eof: bool,
}

impl DetectedPrompt {
    pub fn question(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            at_eof: false,
        }
    }

    pub fn end_of_stream(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            at_eof: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_markers_are_colon_and_question_mark() {
        let markers = PromptMarkers::default();
        assert_eq!(markers.as_slice(), &[":".to_string(), "?".to_string()]);
    }

    #[test]
    fn colon_fragment_is_a_prompt() {
        let markers = PromptMarkers::default();
        assert!(markers.matches("Formal Name [Hello World]: "));
    }

    #[test]
    fn question_fragment_is_a_prompt() {
        let markers = PromptMarkers::default();
        assert!(markers.matches("Do you want to continue? "));
    }

    #[test]
    fn plain_fragment_is_not_a_prompt() {
        let markers = PromptMarkers::default();
        assert!(!markers.matches("Creating project"));
        assert!(!markers.matches(""));
    }

    #[test]
    fn custom_markers_replace_defaults() {
        let markers = PromptMarkers::new(["> "]);
        assert!(markers.matches("choice> "));
        assert!(!markers.matches("Formal Name: "));
    }

    #[test]
    fn empty_markers_are_ignored() {
        let markers = PromptMarkers::new(["", "?"]);
        assert_eq!(markers.as_slice().len(), 1);
        assert!(!markers.matches("anything"));
    }

    #[test]
    fn eof_prompt_is_flagged() {
        let p = DetectedPrompt::end_of_stream("");
        assert!(p.at_eof);
        assert!(!DetectedPrompt::question("Name: ").at_eof);
    }
}
