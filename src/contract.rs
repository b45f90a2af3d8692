//! Input contracts for task local state.
//!
//! A task's validate phase turns the raw local state into its typed input or
//! rejects it with a [`ContractViolation`] that names the offending fields.
//! Shape checking is delegated to `serde`; value rules to the `validator`
//! crate's [`Validate`] derive.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::{Validate, ValidationErrors};

/// Local state did not match what a task expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractViolation {
    /// Fields that were missing or invalid. May be empty when the underlying
    /// checker could not attribute the failure to a field.
    pub fields: Vec<String>,
    /// Human-readable description of the mismatch.
    pub reason: String,
}

impl ContractViolation {
    /// A violation not attributed to any particular field.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            fields: Vec::new(),
            reason: reason.into(),
        }
    }

    /// A required field is absent.
    pub fn missing(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            reason: format!("missing field `{field}`"),
            fields: vec![field],
        }
    }

    /// A field is present but its value is not acceptable.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            fields: vec![field.into()],
            reason: reason.into(),
        }
    }

    /// Whether `field` is among the named offenders.
    pub fn names(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            write!(f, "contract violation: {}", self.reason)
        } else {
            write!(
                f,
                "contract violation on [{}]: {}",
                self.fields.join(", "),
                self.reason
            )
        }
    }
}

impl std::error::Error for ContractViolation {}

impl From<ValidationErrors> for ContractViolation {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors.errors().keys().map(|k| k.to_string()).collect();
        fields.sort();
        Self {
            fields,
            reason: errors.to_string(),
        }
    }
}

impl From<serde_json::Error> for ContractViolation {
    fn from(err: serde_json::Error) -> Self {
        let reason = err.to_string();
        let fields = quoted_field(&reason).into_iter().collect();
        Self { fields, reason }
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for ContractViolation {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path = err.path().to_string();
        let reason = err.into_inner().to_string();
        // Missing and unknown fields are reported at their parent's path.
        let field = match (quoted_field(&reason), path.as_str()) {
            (Some(name), ".") => Some(name),
            (Some(name), parent) => Some(format!("{parent}.{name}")),
            (None, ".") => None,
            (None, path) => Some(path.to_string()),
        };
        Self {
            fields: field.into_iter().collect(),
            reason,
        }
    }
}

/// serde reports field problems as "missing field `name`".
fn quoted_field(message: &str) -> Option<String> {
    let rest = ["missing field ", "unknown field ", "duplicate field "]
        .iter()
        .find_map(|prefix| message.strip_prefix(prefix))?;
    let start = rest.find('`')? + 1;
    let len = rest[start..].find('`')?;
    Some(rest[start..start + len].to_string())
}

/// Check that `value` has the shape of `T` and return it as a `T`.
///
/// Offending fields are named by their dotted path, e.g. `deck.idea` or
/// `rounds[2].amount`.
///
/// # Example
///
/// ```rust
/// use hustle::contract::conform;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Counter { n: i64 }
///
/// let ok: Counter = conform(&serde_json::json!({"n": 5})).unwrap();
/// assert_eq!(ok.n, 5);
///
/// let err = conform::<Counter>(&serde_json::json!({})).unwrap_err();
/// assert_eq!(err.fields, vec!["n".to_string()]);
/// ```
pub fn conform<T: DeserializeOwned>(value: &Value) -> Result<T, ContractViolation> {
    serde_path_to_error::deserialize(value).map_err(ContractViolation::from)
}

/// Like [`conform`], then also apply the type's [`Validate`] rules.
pub fn conform_validated<T>(value: &Value) -> Result<T, ContractViolation>
where
    T: DeserializeOwned + Validate,
{
    let typed: T = conform(value)?;
    check(&typed)?;
    Ok(typed)
}

/// Apply [`Validate`] rules to already-typed local state.
pub fn check<T: Validate>(value: &T) -> Result<(), ContractViolation> {
    value.validate().map_err(ContractViolation::from)
}
