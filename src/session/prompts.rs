//! Prompt templates for text generation.

/// Placeholder replaced by the user's subject.
pub const SUBJECT_PLACEHOLDER: &str = "{subject}";

/// The "terrible poem" instruction.
pub const TERRIBLE_POEM_TEMPLATE: &str = "Write a single verse, terrible poem about the following \
subject: {subject}. It should be 4 lines long and almost, but not quite, rhyme. It should be \
intentionally terrible, with bonus points for some factual inaccuracies. Respond only with the \
4 lines of the poem. Do not include any other text.";

/// Fixed instruction text with a `{subject}` slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    /// Templates without a placeholder get the subject appended.
    pub fn new(template: impl Into<String>) -> Self {
        let mut template = template.into();
        if !template.contains(SUBJECT_PLACEHOLDER) {
            template.push_str(SUBJECT_PLACEHOLDER);
        }
        Self(template)
    }

    pub fn terrible_poem() -> Self {
        Self::new(TERRIBLE_POEM_TEMPLATE)
    }

    pub fn render(&self, subject: &str) -> String {
        self.0.replace(SUBJECT_PLACEHOLDER, subject)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::terrible_poem()
    }
}
