//! Conversation language selection for the CLI.

use qadex_rag::PromptTemplate;
use qadex_rag::session::{
    DEFAULT_GREETING, DEFAULT_SYSTEM_INSTRUCTION, SPANISH_GREETING, SPANISH_SYSTEM_INSTRUCTION,
};

/// Language of the prompts sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    /// English prompts.
    #[default]
    English,
    /// Spanish prompts, matching the labels of the bundled dataset.
    Spanish,
}

impl Language {
    /// Parse a language from its code or name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Some(Self::English),
            "es" | "spanish" | "español" => Some(Self::Spanish),
            _ => None,
        }
    }

    /// Prompt template rendering retrieved context.
    #[must_use]
    pub fn template(self) -> PromptTemplate {
        match self {
            Self::English => PromptTemplate::default(),
            Self::Spanish => PromptTemplate::spanish(),
        }
    }

    /// System instruction for every request.
    #[must_use]
    pub const fn system_instruction(self) -> &'static str {
        match self {
            Self::English => DEFAULT_SYSTEM_INSTRUCTION,
            Self::Spanish => SPANISH_SYSTEM_INSTRUCTION,
        }
    }

    /// Prompt asking the model to introduce itself.
    #[must_use]
    pub const fn greeting(self) -> &'static str {
        match self {
            Self::English => DEFAULT_GREETING,
            Self::Spanish => SPANISH_GREETING,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::English => write!(f, "en"),
            Self::Spanish => write!(f, "es"),
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown language: {s} (expected en or es)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_names() {
        assert_eq!("es".parse::<Language>(), Ok(Language::Spanish));
        assert_eq!("English".parse::<Language>(), Ok(Language::English));
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn spanish_uses_spanish_prompts() {
        let lang = Language::Spanish;
        assert_eq!(lang.template(), PromptTemplate::spanish());
        assert_eq!(lang.greeting(), SPANISH_GREETING);
        assert_eq!(lang.to_string().parse::<Language>(), Ok(lang));
    }
}
