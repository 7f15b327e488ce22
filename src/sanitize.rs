// SPDX-License-Identifier: PMPL-1.0-or-later

//! Input validation for values rendered into embeds.
//!
//! Role names arrive from relayed events and CLI arguments and end up as
//! markdown field labels, so they are validated before a roster is
//! created.

use crate::error::{Error, Result};

/// Maximum allowed length for a role name. The platform caps role names
/// at 100 characters.
const MAX_ROLE_NAME_LENGTH: usize = 100;

/// Validate a role name before it becomes an embed field label.
///
/// Rejects names that are empty, overlong, or contain control characters
/// or newlines (which would break the one-line label shape).
pub fn validate_role_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Role names cannot be empty.".to_string(),
        ));
    }

    if name.len() > MAX_ROLE_NAME_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Role name exceeds maximum length of {} characters.",
            MAX_ROLE_NAME_LENGTH
        )));
    }

    if name.chars().any(|ch| ch.is_control()) {
        return Err(Error::InvalidInput(format!(
            "Role name '{}' contains a control character.",
            name.escape_default()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_names_pass() {
        assert!(validate_role_name("Maths Helper").is_ok());
        assert!(validate_role_name("français").is_ok());
        assert!(validate_role_name("CS & EE").is_ok());
    }

    #[test]
    fn empty_and_whitespace_names_rejected() {
        assert!(validate_role_name("").is_err());
        assert!(validate_role_name("   ").is_err());
    }

    #[test]
    fn overlong_name_rejected() {
        let long = "a".repeat(MAX_ROLE_NAME_LENGTH + 1);
        assert!(validate_role_name(&long).is_err());
    }

    #[test]
    fn control_characters_rejected() {
        assert!(validate_role_name("bad\nname").is_err());
        assert!(validate_role_name("bad\x00name").is_err());
    }
}
