//! Numbered menu for one role
//!
//! Every action keeps its position from [`ACTIONS`] except `Exit`, which
//! follows the last entry the role can see. An Administrator therefore sees
//! 1-11 and a Restricted caller sees 8, 9 and 10 (Exit). Numbers the role
//! cannot see still resolve, so a forbidden choice is refused by the role
//! check rather than mistaken for a different action.

use std::fmt::Write as _;

use super::{Action, ActionSpec, Role, ACTIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Menu {
    role: Role,
}

impl Menu {
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self { role }
    }

    /// Number assigned to `Exit` for this role
    #[must_use]
    pub fn exit_number(&self) -> u32 {
        let last_visible = ACTIONS
            .iter()
            .zip(1u32..)
            .filter(|(spec, _)| spec.action != Action::Exit && self.role.permits(spec.action))
            .map(|(_, number)| number)
            .max()
            .unwrap_or(0);
        last_visible + 1
    }

    /// Visible entries with their numbers, in display order
    #[must_use]
    pub fn entries(&self) -> Vec<(u32, &'static ActionSpec)> {
        let mut entries: Vec<(u32, &'static ActionSpec)> = ACTIONS
            .iter()
            .zip(1u32..)
            .filter(|(spec, _)| spec.action != Action::Exit && self.role.permits(spec.action))
            .map(|(spec, number)| (number, spec))
            .collect();
        entries.push((self.exit_number(), Action::Exit.spec()));
        entries
    }

    /// Map a typed number to an action; `None` for numbers outside the table
    #[must_use]
    pub fn resolve(&self, choice: u32) -> Option<Action> {
        if choice == self.exit_number() {
            return Some(Action::Exit);
        }

        let idx = usize::try_from(choice.checked_sub(1)?).ok()?;
        ACTIONS.get(idx).map(|spec| spec.action).filter(|action| *action != Action::Exit)
    }

    /// Menu text as printed before each prompt
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("Available operations:\n");
        for (number, spec) in self.entries() {
            let _ = writeln!(out, "{number}. {}", spec.label);
        }
        out
    }
}
