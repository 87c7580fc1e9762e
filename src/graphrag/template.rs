use crate::prompts::Prompt;
use crate::Result;

/// Question-answering prompt with `{query_text}` and `{context}` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagTemplate {
    template: String,
}

impl Default for RagTemplate {
    fn default() -> Self {
        Self {
            template: Prompt::RagAnswer.default_text().to_string(),
        }
    }
}

impl RagTemplate {
    /// Custom template; must contain both slots.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        Prompt::RagAnswer.validate(&template)?;
        Ok(Self { template })
    }

    /// Template from `prompts/rag_answer.md`, or the built-in text.
    pub fn load() -> Result<Self> {
        Ok(Self {
            template: Prompt::RagAnswer.load()?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute both slots in one pass, so placeholder-like text inside the
    /// question or the context is left as is.
    pub fn format(&self, query_text: &str, context: &str) -> String {
        let slots = [("{query_text}", query_text), ("{context}", context)];
        let mut out = String::with_capacity(self.template.len() + query_text.len() + context.len());
        let mut rest = self.template.as_str();

        loop {
            let next = slots
                .iter()
                .filter_map(|(slot, value)| rest.find(slot).map(|pos| (pos, *slot, *value)))
                .min_by_key(|(pos, _, _)| *pos);

            match next {
                Some((pos, slot, value)) => {
                    out.push_str(&rest[..pos]);
                    out.push_str(value);
                    rest = &rest[pos + slot.len()..];
                }
                None => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }
}
