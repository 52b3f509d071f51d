use serde::{Deserialize, Serialize};

/// How test cases are dispatched for a language.
///
/// `Batch` runs every test in one container via the runner script; container
/// startup is paid once instead of per test. `Individual` starts a fresh
/// container per test, which is slower but needs no runner support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    Batch,
    Individual,
}

/// Capability record for one language: which image runs it, how it is
/// compiled and invoked, and which dispatch strategy applies.
#[derive(Debug, Clone)]
pub struct LanguageSpec {
    pub slug: &'static str,
    pub name: &'static str,
    pub docker_image: &'static str,
    pub file_extension: &'static str,
    pub run_command: &'static str,
    pub compile_command: Option<&'static str>,
    pub strategy: ExecutionStrategy,
}

impl LanguageSpec {
    pub fn needs_compilation(&self) -> bool {
        self.compile_command.is_some()
    }

    /// Conventional source filename. Java is special: the public class is
    /// `Solution`, so the file must be `Solution.java`.
    pub fn filename(&self) -> String {
        if self.slug == "java" {
            "Solution.java".to_string()
        } else {
            format!("solution{}", self.file_extension)
        }
    }
}

static LANGUAGES: &[LanguageSpec] = &[
    LanguageSpec {
        slug: "python3",
        name: "Python 3.12",
        docker_image: "python:3.12-slim",
        file_extension: ".py",
        run_command: "python3 /app/solution.py",
        compile_command: None,
        strategy: ExecutionStrategy::Batch,
    },
    LanguageSpec {
        slug: "python",
        name: "Python 3.12",
        docker_image: "python:3.12-slim",
        file_extension: ".py",
        run_command: "python3 /app/solution.py",
        compile_command: None,
        strategy: ExecutionStrategy::Batch,
    },
    LanguageSpec {
        slug: "java",
        name: "Java 21",
        docker_image: "eclipse-temurin:21-jdk",
        file_extension: ".java",
        run_command: "java -cp /app Solution",
        compile_command: Some("javac -d /app /app/Solution.java"),
        strategy: ExecutionStrategy::Individual,
    },
    LanguageSpec {
        slug: "c",
        name: "C (GCC 13)",
        docker_image: "gcc:13",
        file_extension: ".c",
        run_command: "/app/solution",
        compile_command: Some("gcc -O2 -std=c17 -o /app/solution /app/solution.c"),
        strategy: ExecutionStrategy::Individual,
    },
];

/// Look up a language capability record by slug, case-insensitive.
pub fn get_language(slug: &str) -> Option<&'static LanguageSpec> {
    let slug = slug.to_lowercase();
    LANGUAGES.iter().find(|l| l.slug == slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(get_language("Python3").is_some());
        assert!(get_language("JAVA").is_some());
        assert!(get_language("brainfuck").is_none());
    }

    #[test]
    fn java_filename_matches_class_name() {
        assert_eq!(get_language("java").unwrap().filename(), "Solution.java");
        assert_eq!(get_language("python3").unwrap().filename(), "solution.py");
        assert_eq!(get_language("c").unwrap().filename(), "solution.c");
    }

    #[test]
    fn interpreted_languages_skip_compilation() {
        assert!(!get_language("python3").unwrap().needs_compilation());
        assert!(get_language("c").unwrap().needs_compilation());
        assert!(get_language("java").unwrap().needs_compilation());
    }

    #[test]
    fn python_uses_the_batch_strategy() {
        assert_eq!(
            get_language("python3").unwrap().strategy,
            ExecutionStrategy::Batch
        );
        assert_eq!(
            get_language("c").unwrap().strategy,
            ExecutionStrategy::Individual
        );
    }
}
