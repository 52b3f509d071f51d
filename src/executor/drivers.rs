//! Driver stubs for function-call style problems.
//!
//! When a problem defines a `function_name`, the user writes a method on a
//! `Solution` class instead of a stdin/stdout program. The stub appended to
//! their source reads one JSON-encoded argument per stdin line, calls the
//! method, and prints the JSON-encoded return value.

/// Underscore-prefixed names so the stub cannot collide with user code.
const PYTHON_DRIVER: &str = r#"
import json as _json, sys as _sys

_lines = _sys.stdin.read().strip().split('\n')
_args = [_json.loads(_l) for _l in _lines if _l]
_sol = Solution()
_result = _sol.{function_name}(*_args)
print(_json.dumps(_result))
"#;

/// The stub to append for a language, or `None` when the language has no
/// driver template and only supports plain stdin/stdout problems.
pub fn generate_driver(language_slug: &str, function_name: &str) -> Option<String> {
    match language_slug.to_lowercase().as_str() {
        "python" | "python3" => Some(PYTHON_DRIVER.replace("{function_name}", function_name)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_driver_calls_the_named_method() {
        let driver = generate_driver("python3", "twoSum").unwrap();
        assert!(driver.contains("_sol.twoSum(*_args)"));
        assert!(driver.contains("Solution()"));
        assert!(!driver.contains("{function_name}"));
    }

    #[test]
    fn slug_lookup_is_case_insensitive() {
        assert!(generate_driver("Python", "f").is_some());
    }

    #[test]
    fn languages_without_a_template_get_none() {
        assert!(generate_driver("java", "twoSum").is_none());
        assert!(generate_driver("c", "twoSum").is_none());
    }
}
