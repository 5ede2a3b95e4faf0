//! Live text statistics shown in window status bars and the tools panel.

/// Counts for a single window's buffer. Paragraphs here are non-blank lines
/// (any newline run separates); see [`manuscript_paragraphs`] for the
/// blank-line granularity used at project scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextStats {
    pub chars: usize,
    pub chars_no_space: usize,
    pub words: usize,
    pub sentences: usize,
    pub paragraphs: usize,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        let chars = text.chars().count();
        let chars_no_space = text.chars().filter(|c| !c.is_whitespace()).count();
        let words = text.split_whitespace().count();
        let sentences = text
            .split(|c| matches!(c, '.' | '!' | '?'))
            .filter(|s| !s.trim().is_empty())
            .count();
        let paragraphs = text.lines().filter(|l| !l.trim().is_empty()).count();
        Self { chars, chars_no_space, words, sentences, paragraphs }
    }
}

/// Paragraphs separated by blank lines, for whole-manuscript counts.
pub fn manuscript_paragraphs(text: &str) -> usize {
    text.split("\n\n").filter(|p| !p.trim().is_empty()).count()
}
