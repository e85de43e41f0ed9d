//! Deciding what a tool run's stderr means.

/// Stderr prefix rdiff-backup prints on case-insensitive filesystems.
pub const CASE_WARNING: &str = "Warning: could not determine case";

/// Verdict on one tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StderrVerdict {
    Clean,
    /// The tool refused a backup inside its minimum interval.
    TooSoon(String),
    Fatal(String),
}

/// Allow-list driven classification of tool stderr.
///
/// Each non-empty line is checked on its own: lines starting with a benign
/// prefix are ignored, lines containing a too-soon marker make the run
/// retryable, anything else is fatal.
#[derive(Debug, Clone)]
pub struct StderrClassifier {
    benign: Vec<String>,
    too_soon: Vec<String>,
}

impl Default for StderrClassifier {
    fn default() -> Self {
        Self {
            benign: vec![CASE_WARNING.to_string()],
            too_soon: vec!["not in the past".to_string(), "less than a second".to_string()],
        }
    }
}

impl StderrClassifier {
    /// Add benign prefixes on top of the defaults.
    pub fn with_benign<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.benign.extend(extra.into_iter().map(Into::into));
        self
    }

    pub fn benign(&self) -> &[String] {
        &self.benign
    }

    pub fn classify(&self, stderr: &str, success: bool) -> StderrVerdict {
        let significant: Vec<&str> = stderr
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| !self.benign.iter().any(|p| line.starts_with(p.as_str())))
            .collect();

        if significant.is_empty() {
            return if success {
                StderrVerdict::Clean
            } else {
                StderrVerdict::Fatal("tool exited with an error and no diagnostics".to_string())
            };
        }

        let message = significant.join("\n");
        let too_soon = significant.iter().any(|line| {
            let line = line.to_lowercase();
            self.too_soon.iter().any(|m| line.contains(&m.to_lowercase()))
        });

        if too_soon {
            StderrVerdict::TooSoon(message)
        } else {
            StderrVerdict::Fatal(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_benign_are_clean() {
        let classifier = StderrClassifier::default();
        assert_eq!(classifier.classify("", true), StderrVerdict::Clean);
        assert_eq!(
            classifier.classify(
                "Warning: could not determine case sensitivity of source directory\n\n",
                true
            ),
            StderrVerdict::Clean
        );
    }

    #[test]
    fn too_soon_is_retryable() {
        let classifier = StderrClassifier::default();
        let verdict = classifier.classify(
            "Fatal Error: Time of Last backup is not in the past.  This is probably caused by running two backups in less than a second.",
            false,
        );
        assert!(matches!(verdict, StderrVerdict::TooSoon(_)));
    }

    #[test]
    fn unknown_output_is_fatal_even_with_benign_lines() {
        let classifier = StderrClassifier::default();
        let verdict = classifier.classify(
            "Warning: could not determine case\nFatal Error: disk full\n",
            false,
        );
        assert_eq!(verdict, StderrVerdict::Fatal("Fatal Error: disk full".to_string()));

        // Unrecognized stderr is fatal even on a zero exit.
        assert!(matches!(
            classifier.classify("something odd", true),
            StderrVerdict::Fatal(_)
        ));
    }

    #[test]
    fn silent_failure_is_fatal() {
        let classifier = StderrClassifier::default();
        assert!(matches!(classifier.classify("", false), StderrVerdict::Fatal(_)));
    }

    #[test]
    fn configured_prefixes_are_benign() {
        let classifier = StderrClassifier::default().with_benign(["Note:"]);
        assert_eq!(classifier.classify("Note: using cached metadata", true), StderrVerdict::Clean);
        assert_eq!(classifier.benign().len(), 2);
    }
}
