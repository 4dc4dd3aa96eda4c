use std::fmt::{self, Display, Formatter};

/// A problem discovered while loading or validating a bag. `file` names the on-disk
/// artifact the problem concerns, eg `bag-info.txt` or `data/report.pdf`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BagIssue {
    file: String,
    message: String,
}

/// Errors and warnings accumulated by a load or validate pass. Components build their own
/// local logs and the bag merges them. Warnings never migrate into the error list.
#[derive(Debug, Default)]
pub struct IssueLog {
    errors: Vec<BagIssue>,
    warnings: Vec<BagIssue>,
}

impl BagIssue {
    pub fn new<F: AsRef<str>, M: AsRef<str>>(file: F, message: M) -> Self {
        Self {
            file: file.as_ref().into(),
            message: message.as_ref().into(),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for BagIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}

impl IssueLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error<F: AsRef<str>, M: AsRef<str>>(&mut self, file: F, message: M) {
        self.errors.push(BagIssue::new(file, message));
    }

    pub fn warn<F: AsRef<str>, M: AsRef<str>>(&mut self, file: F, message: M) {
        self.warnings.push(BagIssue::new(file, message));
    }

    pub fn merge(&mut self, other: IssueLog) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[BagIssue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[BagIssue] {
        &self.warnings
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }
}
