//! Pure, reversible transform between the remote's stored (wrapped) form and
//! the user's authored (unwrapped) form of a `ServerScript` file. No parsing
//! library — exact string matching on a known prologue/epilogue, since the
//! wrapped shape is a fixed literal this system itself produces.

use crate::model::{FileKind, ModuleOptions};

const PROLOGUE: &str = "function _main(module, exports, require){";
const EPILOGUE_NO_OPTIONS: &str = "}\n__defineModule__(_main);";
const EPILOGUE_PREFIX: &str = "}\n__defineModule__(_main, ";
const EPILOGUE_SUFFIX: &str = ");";

/// `kind == ServerScript AND name` is neither system-synthetic nor a
/// git-breadcrumb.
pub fn is_wrap_eligible(kind: FileKind, name: &str) -> bool {
    kind == FileKind::ServerScript
        && !crate::model::is_system_synthetic(name)
        && !crate::model::is_git_breadcrumb(name)
}

/// Produce the exact wrapped shape the Remote stores.
pub fn wrap(user_text: &str, options: Option<&ModuleOptions>) -> String {
    let epilogue = match options.filter(|o| !o.is_empty()) {
        Some(opts) => {
            let json = serde_json::to_string(opts).unwrap_or_else(|_| "{}".to_string());
            format!("{EPILOGUE_PREFIX}{json}{EPILOGUE_SUFFIX}")
        }
        None => EPILOGUE_NO_OPTIONS.to_string(),
    };
    format!("{PROLOGUE}{user_text}{epilogue}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unwrapped {
    pub user_text: String,
    pub existing_options: Option<ModuleOptions>,
}

/// Parse the known prologue/epilogue, extracting the body verbatim. If the
/// prologue is absent, returns the text unchanged with no recovered options.
pub fn unwrap(stored_text: &str) -> Unwrapped {
    let Some(after_prologue) = stored_text.strip_prefix(PROLOGUE) else {
        return Unwrapped {
            user_text: stored_text.to_string(),
            existing_options: None,
        };
    };

    if let Some(body) = after_prologue.strip_suffix(EPILOGUE_NO_OPTIONS) {
        return Unwrapped {
            user_text: body.to_string(),
            existing_options: None,
        };
    }

    if after_prologue.ends_with(EPILOGUE_SUFFIX) {
        if let Some(prefix_idx) = after_prologue.rfind(EPILOGUE_PREFIX) {
            let body = &after_prologue[..prefix_idx];
            let json_start = prefix_idx + EPILOGUE_PREFIX.len();
            let json_end = after_prologue.len() - EPILOGUE_SUFFIX.len();
            let json_str = &after_prologue[json_start..json_end];
            if let Ok(options) = serde_json::from_str::<ModuleOptions>(json_str) {
                return Unwrapped {
                    user_text: body.to_string(),
                    existing_options: Some(options),
                };
            }
        }
    }

    // Prologue present but epilogue doesn't match a shape we produced:
    // treat the whole thing as unwrapped text, per "if the prologue is
    // absent, returns the text unchanged" — extended here to "epilogue
    // unrecognized" since neither shape is otherwise parseable.
    Unwrapped {
        user_text: stored_text.to_string(),
        existing_options: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_without_options_matches_exact_shape() {
        let wrapped = wrap("function f(){return 1}", None);
        assert_eq!(
            wrapped,
            "function _main(module, exports, require){function f(){return 1}}\n__defineModule__(_main);"
        );
    }

    #[test]
    fn round_trip_without_options() {
        let original = "const x = 1;\nreturn x;";
        let wrapped = wrap(original, None);
        let unwrapped = unwrap(&wrapped);
        assert_eq!(unwrapped.user_text, original);
        assert_eq!(unwrapped.existing_options, None);
    }

    #[test]
    fn round_trip_with_options() {
        let opts = ModuleOptions {
            load_now: Some(true),
            hoisted_functions: Some(vec!["foo".to_string(), "bar".to_string()]),
        };
        let wrapped = wrap("body text", Some(&opts));
        let unwrapped = unwrap(&wrapped);
        assert_eq!(unwrapped.user_text, "body text");
        assert_eq!(unwrapped.existing_options, Some(opts));
    }

    #[test]
    fn unwrap_without_prologue_returns_unchanged() {
        let raw = "plain text, not wrapped at all";
        let unwrapped = unwrap(raw);
        assert_eq!(unwrapped.user_text, raw);
        assert_eq!(unwrapped.existing_options, None);
    }

    #[test]
    fn wrap_then_unwrap_is_byte_equal_to_system_produced_stored_text() {
        let opts = ModuleOptions {
            load_now: None,
            hoisted_functions: Some(vec!["init".to_string()]),
        };
        let stored = wrap("let y = 2;", Some(&opts));
        let unwrapped = unwrap(&stored);
        let rewrapped = wrap(&unwrapped.user_text, unwrapped.existing_options.as_ref());
        assert_eq!(rewrapped, stored);
    }

    #[test]
    fn eligibility_excludes_manifest_breadcrumb_and_synthetic() {
        assert!(is_wrap_eligible(FileKind::ServerScript, "Utils"));
        assert!(!is_wrap_eligible(FileKind::ServerScript, "appsscript"));
        assert!(!is_wrap_eligible(FileKind::ServerScript, "common-js/loader"));
        assert!(!is_wrap_eligible(FileKind::ServerScript, ".git/config"));
        assert!(!is_wrap_eligible(FileKind::Markup, "Index"));
    }

    proptest::proptest! {
        #[test]
        fn prop_wrap_unwrap_round_trip(
            body in "[a-zA-Z0-9_ \n;(){}=+-]{0,200}",
            load_now in proptest::option::of(proptest::bool::ANY),
            hoisted in proptest::option::of(proptest::collection::vec("[a-zA-Z_][a-zA-Z0-9_]{0,10}", 0..5)),
        ) {
            let opts = ModuleOptions { load_now, hoisted_functions: hoisted };
            let opts_ref = if opts.is_empty() { None } else { Some(&opts) };
            let wrapped = wrap(&body, opts_ref);
            let unwrapped = unwrap(&wrapped);
            proptest::prop_assert_eq!(&unwrapped.user_text, &body);
            if opts.is_empty() {
                proptest::prop_assert_eq!(unwrapped.existing_options, None);
            } else {
                proptest::prop_assert_eq!(unwrapped.existing_options, Some(opts));
            }
        }
    }
}
