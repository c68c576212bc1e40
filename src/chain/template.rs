//! Prompt templates.
//!
//! `{name}` marks a variable; `{{` and `}}` produce literal braces. A `{`
//! without a matching `}` is kept as text.

use std::collections::HashMap;

use crate::chain::history::{Role, Turn};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var(String),
}

/// A text scaffold with named slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn from_template(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let rest: String = chars.clone().collect();
                    match rest.find('}') {
                        Some(end) if is_identifier(&rest[..end]) => {
                            if !text.is_empty() {
                                segments.push(Segment::Text(std::mem::take(&mut text)));
                            }
                            segments.push(Segment::Var(rest[..end].to_string()));
                            for _ in 0..rest[..=end].chars().count() {
                                chars.next();
                            }
                        }
                        _ => text.push('{'),
                    }
                }
                other => text.push(other),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Self { segments }
    }

    /// Variable names in order of first appearance.
    pub fn input_variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for seg in &self.segments {
            if let Segment::Var(name) = seg {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    pub fn format(&self, vars: &HashMap<String, String>) -> Result<String> {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Text(t) => out.push_str(t),
                Segment::Var(name) => {
                    let value = vars
                        .get(name)
                        .ok_or_else(|| PipelineError::MissingVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// One slot in a chat prompt.
#[derive(Debug, Clone)]
pub enum ChatPart {
    System(PromptTemplate),
    Human(PromptTemplate),
    Ai(PromptTemplate),
    /// Where the session's prior turns go.
    History,
}

/// An ordered list of role-tagged messages rendered into one prompt string.
#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    parts: Vec<ChatPart>,
}

impl ChatPromptTemplate {
    pub fn from_parts(parts: Vec<ChatPart>) -> Self {
        Self { parts }
    }

    /// System prompt, history placeholder, then `{input}` from the human.
    pub fn with_history(system_prompt: &str) -> Self {
        Self::from_parts(vec![
            ChatPart::System(PromptTemplate::from_template(system_prompt)),
            ChatPart::History,
            ChatPart::Human(PromptTemplate::from_template("{input}")),
        ])
    }

    /// Render every part as `Role: text` on its own line, ending with the `AI:` cue.
    pub fn render(&self, vars: &HashMap<String, String>, history: &[Turn]) -> Result<String> {
        let mut lines = Vec::new();
        for part in &self.parts {
            match part {
                ChatPart::System(t) => lines.push(format!("System: {}", t.format(vars)?)),
                ChatPart::Human(t) => {
                    lines.push(format!("{}: {}", Role::Human.prefix(), t.format(vars)?))
                }
                ChatPart::Ai(t) => {
                    lines.push(format!("{}: {}", Role::Ai.prefix(), t.format(vars)?))
                }
                ChatPart::History => lines.extend(history.iter().map(Turn::to_line)),
            }
        }
        lines.push(format!("{}:", Role::Ai.prefix()));
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_format_substitutes_variables() {
        let t = PromptTemplate::from_template("Concept: {topic}\nExplanation:");
        assert_eq!(t.input_variables(), vec!["topic"]);
        let out = t.format(&vars(&[("topic", "Docker")])).unwrap();
        assert_eq!(out, "Concept: Docker\nExplanation:");
    }

    #[test]
    fn test_missing_variable() {
        let t = PromptTemplate::from_template("{a} and {b}");
        let err = t.format(&vars(&[("a", "x")])).unwrap_err();
        assert!(matches!(err, PipelineError::MissingVariable(name) if name == "b"));
    }

    #[test]
    fn test_escaped_and_stray_braces() {
        let t = PromptTemplate::from_template("{{literal}} {x} { not a var");
        assert_eq!(t.input_variables(), vec!["x"]);
        assert_eq!(
            t.format(&vars(&[("x", "1")])).unwrap(),
            "{literal} 1 { not a var"
        );
    }

    #[test]
    fn test_repeated_variable_listed_once() {
        let t = PromptTemplate::from_template("{x}{y}{x}");
        assert_eq!(t.input_variables(), vec!["x", "y"]);
    }

    #[test]
    fn test_chat_render_places_history_before_input() {
        let chat = ChatPromptTemplate::with_history("You are a helpful AI assistant.");
        let history = vec![Turn::human("Hi, my name is Dave."), Turn::ai("Hello Dave.")];
        let out = chat
            .render(&vars(&[("input", "What is my name?")]), &history)
            .unwrap();
        assert_eq!(
            out,
            "System: You are a helpful AI assistant.\n\
             Human: Hi, my name is Dave.\n\
             AI: Hello Dave.\n\
             Human: What is my name?\n\
             AI:"
        );
    }
}
