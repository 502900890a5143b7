//! Outcome of a single step interaction

/// Navigation requested by a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFlowAction {
    /// Store the value and move to the next step
    Continue,
    /// Re-enter the previous step
    Back,
    /// Abort the whole run
    Cancel,
}

/// Immutable pair of navigation action and collected value
///
/// `value` is only carried by `Continue`. A `Continue` without value marks
/// a step that deliberately recorded nothing (see `ChoiceStep`'s other item).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    action: InputFlowAction,
    value: Option<String>,
}

impl StepResult {
    /// Continue with a collected value
    pub fn proceed(value: impl Into<String>) -> Self {
        Self {
            action: InputFlowAction::Continue,
            value: Some(value.into()),
        }
    }

    /// Continue without recording a value for this step
    pub fn proceed_empty() -> Self {
        Self {
            action: InputFlowAction::Continue,
            value: None,
        }
    }

    pub fn back() -> Self {
        Self {
            action: InputFlowAction::Back,
            value: None,
        }
    }

    pub fn cancel() -> Self {
        Self {
            action: InputFlowAction::Cancel,
            value: None,
        }
    }

    pub fn action(&self) -> InputFlowAction {
        self.action
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn into_value(self) -> Option<String> {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proceed_carries_value() {
        let result = StepResult::proceed("1700000000");
        assert_eq!(result.action(), InputFlowAction::Continue);
        assert_eq!(result.value(), Some("1700000000"));
    }

    #[test]
    fn test_back_and_cancel_have_no_value() {
        assert_eq!(StepResult::back().value(), None);
        assert_eq!(StepResult::cancel().value(), None);
        assert_eq!(StepResult::cancel().action(), InputFlowAction::Cancel);
    }

    #[test]
    fn test_proceed_empty() {
        let result = StepResult::proceed_empty();
        assert_eq!(result.action(), InputFlowAction::Continue);
        assert!(result.into_value().is_none());
    }
}
