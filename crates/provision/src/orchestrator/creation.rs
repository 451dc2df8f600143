//! Creation retry state machine.
//!
//! Vendor rejection messages are classified into three retryable causes.
//! Everything else is fatal on the first failure.

use std::sync::LazyLock;

use regex::Regex;

use crate::providers::ProvisionRequest;

/// Retries allowed beyond the first creation attempt.
pub const MAX_CREATE_RETRIES: u32 = 2;

static NAME_CONFLICT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)name\b.*\b(already|in use|taken|exists|must be unique|not unique)")
            .unwrap(),
        Regex::new(r"(?i)label\b.*\b(already|in use|taken|must be unique)").unwrap(),
        Regex::new(r"(?i)uniqueness_error").unwrap(),
        Regex::new(r"(?i)duplicate\s+(server\s+|instance\s+)?(name|label|hostname)").unwrap(),
    ]
});

static LOCATION_DISABLED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(concat!(
            r"(?i)(location|region|datacenter)\s+(\S+\s+)?(is\s+)?(currently\s+)?",
            r"(disabled|closed|unavailable|not available|not accepting)",
        ))
        .unwrap(),
        Regex::new(r"(?i)(disabled|closed)\s+(location|region|datacenter)").unwrap(),
    ]
});

static TYPE_UNAVAILABLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)unavailable").unwrap(),
        Regex::new(r"(?i)not\s+available").unwrap(),
        Regex::new(r"(?i)sold\s+out").unwrap(),
        Regex::new(r"(?i)out\s+of\s+stock").unwrap(),
        Regex::new(r"(?i)unsupported|not\s+supported").unwrap(),
    ]
});

/// Why a creation call was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The requested name is already in use.
    NameConflict,
    /// The region is closed to new servers.
    LocationDisabled,
    /// The size is sold out or not offered in the region.
    TypeUnavailable,
    /// Anything else.
    Unclassified,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameConflict => write!(f, "name conflict"),
            Self::LocationDisabled => write!(f, "location disabled"),
            Self::TypeUnavailable => write!(f, "type unavailable"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Classify a vendor rejection message.
#[must_use]
pub fn classify_failure(message: &str) -> FailureKind {
    let matches = |patterns: &[Regex]| patterns.iter().any(|p| p.is_match(message));

    if matches(&NAME_CONFLICT_PATTERNS) {
        FailureKind::NameConflict
    } else if matches(&LOCATION_DISABLED_PATTERNS) {
        FailureKind::LocationDisabled
    } else if matches(&TYPE_UNAVAILABLE_PATTERNS) {
        FailureKind::TypeUnavailable
    } else {
        FailureKind::Unclassified
    }
}

/// What the orchestrator must do before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Obtain a new name; keep region and size.
    RenameAndRetry,
    /// Obtain a new region (minus excluded) and a new size for it.
    RelocateAndRetry,
    /// Obtain a new size for the same region (minus excluded).
    ResizeAndRetry,
    /// Give up.
    Fatal,
}

/// Mutable retry state for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationState {
    /// Request for the next attempt.
    pub request: ProvisionRequest,
    /// Retries taken so far.
    pub attempt: u32,
    /// Regions rejected as disabled during this run.
    pub excluded_regions: Vec<String>,
    /// Sizes rejected as unavailable during this run.
    pub excluded_sizes: Vec<String>,
}

impl CreationState {
    #[must_use]
    pub fn new(request: ProvisionRequest) -> Self {
        Self {
            request,
            attempt: 0,
            excluded_regions: Vec::new(),
            excluded_sizes: Vec::new(),
        }
    }

    /// Whether another retry is allowed.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.attempt < MAX_CREATE_RETRIES
    }

    /// Apply a classified failure of the current request.
    ///
    /// Retryable causes consume exactly one retry and record exclusions.
    pub fn transition(&mut self, kind: FailureKind) -> Transition {
        if kind == FailureKind::Unclassified || !self.can_retry() {
            return Transition::Fatal;
        }
        self.attempt += 1;

        match kind {
            FailureKind::NameConflict => Transition::RenameAndRetry,
            FailureKind::LocationDisabled => {
                push_unique(&mut self.excluded_regions, &self.request.region);
                Transition::RelocateAndRetry
            }
            FailureKind::TypeUnavailable => {
                push_unique(&mut self.excluded_sizes, &self.request.size);
                Transition::ResizeAndRetry
            }
            FailureKind::Unclassified => Transition::Fatal,
        }
    }

    /// Whether `region` was rejected earlier in the run.
    #[must_use]
    pub fn region_excluded(&self, region: &str) -> bool {
        self.excluded_regions.iter().any(|r| r == region)
    }

    /// Whether `size` was rejected earlier in the run.
    #[must_use]
    pub fn size_excluded(&self, size: &str) -> bool {
        self.excluded_sizes.iter().any(|s| s == size)
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}
