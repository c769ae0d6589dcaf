use std::fmt;

/// What to do when a referenced service does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InvalidBehavior {
    /// Fail with `ServiceNotFound`
    #[default]
    Raise,
    /// Inject null instead of the service
    Null,
    /// Inject null, and skip method calls that would receive it
    Ignore,
}

/// Immutable pointer to another service by id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    id: String,
    invalid_behavior: InvalidBehavior,
}

impl Reference {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_behavior(id, InvalidBehavior::Raise)
    }

    pub fn with_behavior(id: impl Into<String>, invalid_behavior: InvalidBehavior) -> Self {
        Self {
            id: id.into(),
            invalid_behavior,
        }
    }

    /// Reference that resolves to null when the target is missing
    pub fn optional(id: impl Into<String>) -> Self {
        Self::with_behavior(id, InvalidBehavior::Null)
    }

    /// Reference whose absence silently drops the method call using it
    pub fn ignore_on_missing(id: impl Into<String>) -> Self {
        Self::with_behavior(id, InvalidBehavior::Ignore)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn invalid_behavior(&self) -> InvalidBehavior {
        self.invalid_behavior
    }

    pub fn is_required(&self) -> bool {
        self.invalid_behavior == InvalidBehavior::Raise
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.invalid_behavior {
            InvalidBehavior::Raise => write!(f, "@{}", self.id),
            InvalidBehavior::Null | InvalidBehavior::Ignore => write!(f, "@?{}", self.id),
        }
    }
}

impl From<&str> for Reference {
    fn from(id: &str) -> Self {
        Reference::new(id)
    }
}

impl From<String> for Reference {
    fn from(id: String) -> Self {
        Reference::new(id)
    }
}
