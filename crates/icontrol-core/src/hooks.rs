// Per-type validators, referenced by name from the catalog.
//
// Each hook sees the verb and the identity being addressed and runs
// before any request, for every verb that addresses an identity.

use crate::meta::Verb;
use crate::uri::Identity;

/// Validator signature: `Err(reason)` rejects the call locally.
pub type Validator = fn(Verb, &Identity) -> Result<(), String>;

/// Resolve a validator by the name used in catalog files.
pub fn lookup(name: &str) -> Option<Validator> {
    match name {
        "lowercase_name" => Some(lowercase_name),
        "no_whitespace_name" => Some(no_whitespace_name),
        _ => None,
    }
}

/// Names the device stores case-folded (ASM headers, cookies).
fn lowercase_name(_verb: Verb, identity: &Identity) -> Result<(), String> {
    match identity.name.as_deref() {
        Some(name) if name.chars().any(char::is_uppercase) => {
            Err(format!("name '{name}' must be lowercase"))
        }
        _ => Ok(()),
    }
}

fn no_whitespace_name(_verb: Verb, identity: &Identity) -> Result<(), String> {
    match identity.name.as_deref() {
        Some(name) if name.chars().any(char::is_whitespace) => {
            Err(format!("name '{name}' must not contain whitespace"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_rejects_mixed_case_for_every_verb() {
        let Some(hook) = lookup("lowercase_name") else {
            panic!("lowercase_name hook missing");
        };

        for verb in [Verb::Create, Verb::Load, Verb::Update, Verb::Modify, Verb::Delete] {
            assert!(hook(verb, &Identity::named("X-Foo")).is_err());
            assert!(hook(verb, &Identity::named("x-foo")).is_ok());
        }
    }

    #[test]
    fn identity_without_name_passes() {
        let Some(hook) = lookup("lowercase_name") else {
            panic!("lowercase_name hook missing");
        };
        assert!(hook(Verb::Load, &Identity::by_id("AbC")).is_ok());
    }

    #[test]
    fn unknown_hook_is_none() {
        assert!(lookup("shout").is_none());
    }
}
