/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Data operations supported by the access layer
/// Used by collections for permission mapping and user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Select,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Permission action a caller needs before the operation may run
    pub fn required_action(&self) -> Action {
        match self {
            Operation::Select => Action::View,
            Operation::Create => Action::Create,
            Operation::Update => Action::Edit,
            Operation::Delete => Action::Delete,
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Operation::Select => "Records loaded",
            Operation::Create => "Record created",
            Operation::Update => "Record updated",
            Operation::Delete => "Record deleted",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Operation::Select => "Failed to load records",
            Operation::Create => "Failed to create record",
            Operation::Update => "Failed to update record",
            Operation::Delete => "Failed to delete record",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Select => "select",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Permission actions, a fixed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Export,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::View,
        Action::Create,
        Action::Edit,
        Action::Delete,
        Action::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Export => "export",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" | "read" => Ok(Action::View),
            "create" => Ok(Action::Create),
            "edit" | "update" => Ok(Action::Edit),
            "delete" => Ok(Action::Delete),
            "export" => Ok(Action::Export),
            other => Err(format!("unknown permission action: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_map_to_permission_actions() {
        assert_eq!(Operation::Select.required_action(), Action::View);
        assert_eq!(Operation::Create.required_action(), Action::Create);
        assert_eq!(Operation::Update.required_action(), Action::Edit);
        assert_eq!(Operation::Delete.required_action(), Action::Delete);
    }

    #[test]
    fn parses_action_aliases() {
        assert_eq!("VIEW".parse::<Action>().unwrap(), Action::View);
        assert_eq!("update".parse::<Action>().unwrap(), Action::Edit);
        assert!("approve".parse::<Action>().is_err());
    }
}
