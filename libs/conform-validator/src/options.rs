//! `ValidatorOptions`: a plain, fully field-enumerated configuration record
//! (§6) — no string-keyed bag, no YAML presets.

#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    pub validate_constraints: bool,
    pub validate_terminology: bool,
    pub validate_references: bool,
    pub validate_extensions: bool,
    pub skip_contained_validation: bool,
    pub strict_mode: bool,
    pub max_errors: u32,
    pub profile_url: Option<String>,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            validate_constraints: true,
            validate_terminology: false,
            validate_references: false,
            validate_extensions: true,
            skip_contained_validation: false,
            strict_mode: false,
            max_errors: 0,
            profile_url: None,
        }
    }
}

impl ValidatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraints(mut self, enabled: bool) -> Self {
        self.validate_constraints = enabled;
        self
    }

    pub fn with_terminology(mut self, enabled: bool) -> Self {
        self.validate_terminology = enabled;
        self
    }

    pub fn with_references(mut self, enabled: bool) -> Self {
        self.validate_references = enabled;
        self
    }

    pub fn with_extensions(mut self, enabled: bool) -> Self {
        self.validate_extensions = enabled;
        self
    }

    pub fn with_strict_mode(mut self, enabled: bool) -> Self {
        self.strict_mode = enabled;
        self
    }

    pub fn with_max_errors(mut self, max_errors: u32) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn with_profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_record() {
        let options = ValidatorOptions::default();
        assert!(options.validate_constraints);
        assert!(!options.validate_terminology);
        assert!(options.validate_extensions);
        assert_eq!(options.max_errors, 0);
    }

    #[test]
    fn with_terminology_toggles_the_flag() {
        let options = ValidatorOptions::new().with_terminology(true);
        assert!(options.validate_terminology);
    }
}
