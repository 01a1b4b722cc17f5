//! Issue accumulation and the overall validation verdict.

use serde::Serialize;

/// Severity of a single issue. `valid` is the conjunction "no fatal and no error".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

/// On-the-wire issue code vocabulary (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCode {
    Structure,
    Required,
    Value,
    Invariant,
    Processing,
    Invalid,
    NotFound,
    CodeInvalid,
    Extension,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub code: IssueCode,
    pub diagnostics: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_path: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_path: Option<Vec<String>>,
}

impl Issue {
    pub fn new(severity: IssueSeverity, code: IssueCode, diagnostics: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            diagnostics: diagnostics.into(),
            expression_path: None,
            location_path: None,
        }
    }

    pub fn fatal(code: IssueCode, diagnostics: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Fatal, code, diagnostics)
    }

    pub fn error(code: IssueCode, diagnostics: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Error, code, diagnostics)
    }

    pub fn warning(code: IssueCode, diagnostics: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Warning, code, diagnostics)
    }

    pub fn information(code: IssueCode, diagnostics: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Information, code, diagnostics)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.expression_path = Some(vec![path.clone()]);
        self.location_path = Some(vec![path]);
        self
    }

    pub fn with_expression_path(mut self, path: impl Into<String>) -> Self {
        self.expression_path = Some(vec![path.into()]);
        self
    }

    pub fn with_location_path(mut self, path: impl Into<String>) -> Self {
        self.location_path = Some(vec![path.into()]);
        self
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self.severity, IssueSeverity::Fatal | IssueSeverity::Error)
    }
}

/// The verdict of one validation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<Issue>,
}

impl ValidationResult {
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let valid = !issues.iter().any(Issue::is_blocking);
        Self { valid, issues }
    }

    pub fn fatal(issue: Issue) -> Self {
        Self::from_issues(vec![issue])
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error || i.severity == IssueSeverity::Fatal)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count()
    }

    pub fn issues_with_code(&self, code: IssueCode) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_is_false_when_an_error_is_present() {
        let result = ValidationResult::from_issues(vec![Issue::error(
            IssueCode::Required,
            "name is required",
        )]);
        assert!(!result.valid);
        assert_eq!(result.error_count(), 1);
    }

    #[test]
    fn valid_stays_true_with_only_warnings() {
        let result = ValidationResult::from_issues(vec![Issue::warning(
            IssueCode::CodeInvalid,
            "code not in set",
        )]);
        assert!(result.valid);
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn with_path_sets_both_expression_and_location() {
        let issue = Issue::error(IssueCode::Value, "bad").with_path("Patient.active");
        assert_eq!(issue.expression_path.unwrap(), vec!["Patient.active"]);
        assert_eq!(issue.location_path.unwrap(), vec!["Patient.active"]);
    }
}
