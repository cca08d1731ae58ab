//! Placeholder expansion for presence templates.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_.\-]+)\}").unwrap());

/// Values may themselves contain placeholders; nesting stops at this depth so
/// self-referencing bindings cannot loop.
const MAX_DEPTH: usize = 4;

/// Expands a template string against the current argument bindings.
pub trait TemplateExpander: Send + Sync {
    fn expand(&self, template: &str, bindings: &BTreeMap<String, String>) -> String;
}

/// `{key}` substitution. Unknown keys in the template expand to an empty
/// string. Inside a bound value only known keys are expanded, so text such as
/// a server MOTD keeps any other braces verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderExpander;

impl TemplateExpander for PlaceholderExpander {
    fn expand(&self, template: &str, bindings: &BTreeMap<String, String>) -> String {
        expand_at(template, bindings, 0).trim().to_string()
    }
}

/// Depth 0 is template text; anything deeper came from a binding.
fn expand_at(text: &str, bindings: &BTreeMap<String, String>, depth: usize) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &regex::Captures| match bindings.get(&caps[1]) {
            Some(value) if depth < MAX_DEPTH => expand_at(value, bindings, depth + 1),
            Some(value) => value.clone(),
            None if depth == 0 => String::new(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_known_keys() {
        let b = bindings(&[("server.name", "Hypixel")]);
        assert_eq!(
            PlaceholderExpander.expand("Playing on {server.name}", &b),
            "Playing on Hypixel"
        );
    }

    #[test]
    fn unknown_keys_become_empty() {
        let b = bindings(&[]);
        assert_eq!(PlaceholderExpander.expand("{menu.message}", &b), "");
    }

    #[test]
    fn nested_values_are_expanded() {
        let b = bindings(&[
            ("biome.message", "in {biome.name}"),
            ("biome.name", "Desert"),
        ]);
        assert_eq!(PlaceholderExpander.expand("{biome.message}", &b), "in Desert");
    }

    #[test]
    fn self_reference_terminates() {
        let b = bindings(&[("a", "{a}x")]);
        let out = PlaceholderExpander.expand("{a}", &b);
        assert!(out.ends_with("xxxx"));
    }

    #[test]
    fn braces_inside_values_stay_literal() {
        let b = bindings(&[("server.motd", "Type {x} to win"), ("server.name", "Hub")]);
        assert_eq!(
            PlaceholderExpander.expand("{server.name}: {server.motd}", &b),
            "Hub: Type {x} to win"
        );
    }

    #[test]
    fn substituted_text_is_not_rescanned_as_template() {
        // "{a" + "b}" only forms a placeholder after substitution
        let b = bindings(&[("open", "{a"), ("close", "b}"), ("ab", "boom")]);
        assert_eq!(PlaceholderExpander.expand("{open}{close}", &b), "{ab}");
    }
}
