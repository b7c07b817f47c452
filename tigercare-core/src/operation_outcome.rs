use serde::{Deserialize, Serialize};

/// FHIR OperationOutcome resource for error reporting
/// See: https://www.hl7.org/fhir/operationoutcome.html
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub resource_type: String,
    pub issue: Vec<OperationOutcomeIssue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcomeIssue {
    pub severity: IssueSeverity,
    pub code: IssueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

/// Subset of the FHIR issue-type value set the portal emits or reads back
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Invalid,
    Structure,
    Required,
    Value,
    Security,
    Login,
    Unknown,
    Expired,
    Forbidden,
    Processing,
    NotSupported,
    NotFound,
    TooCostly,
    Conflict,
    Transient,
    Exception,
    Timeout,
    Throttled,
    Informational,
    #[serde(other)]
    Other,
}

impl OperationOutcome {
    /// Create a new OperationOutcome with a single issue
    pub fn new(severity: IssueSeverity, code: IssueType, diagnostics: impl Into<String>) -> Self {
        Self {
            resource_type: "OperationOutcome".to_string(),
            issue: vec![OperationOutcomeIssue {
                severity,
                code,
                diagnostics: Some(diagnostics.into()),
            }],
        }
    }

    pub fn error(code: IssueType, diagnostics: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Error, code, diagnostics)
    }

    /// Missing or rejected session
    pub fn unauthorized(diagnostics: impl Into<String>) -> Self {
        Self::error(IssueType::Login, diagnostics)
    }

    /// Server-side failure (misconfiguration, upstream outage)
    pub fn exception(diagnostics: impl Into<String>) -> Self {
        Self::error(IssueType::Exception, diagnostics)
    }

    /// Join the diagnostics of an OperationOutcome body returned by an
    /// upstream FHIR server. `None` if the body is not an OperationOutcome
    /// or carries no diagnostics.
    pub fn summarize(body: &str) -> Option<String> {
        let outcome: OperationOutcome = serde_json::from_str(body).ok()?;
        if outcome.resource_type != "OperationOutcome" {
            return None;
        }
        let msgs: Vec<&str> = outcome
            .issue
            .iter()
            .filter_map(|i| i.diagnostics.as_deref())
            .collect();
        (!msgs.is_empty()).then(|| msgs.join("; "))
    }
}
