//! Field-name normalization: external field codes (mixed case) -> storage column names (snake_case).

/// Convert a mixed-case field code to its storage column name.
/// A separator is inserted at each lowercase-to-uppercase transition, then the
/// whole string is lowercased. Runs of uppercase stay fused:
/// `"SecretID"` -> `"secret_id"`, `"CreatedAt"` -> `"created_at"`, `"ID"` -> `"id"`.
pub fn to_storage_name(code: &str) -> String {
    let mut out = String::with_capacity(code.len() + 4);
    let mut prev_lower = false;
    for c in code.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            prev_lower = c.is_lowercase();
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::to_storage_name;

    #[test]
    fn lowercase_to_uppercase_transitions_get_separators() {
        assert_eq!(to_storage_name("CreatedAt"), "created_at");
        assert_eq!(to_storage_name("userName"), "user_name");
    }

    #[test]
    fn uppercase_runs_stay_fused() {
        assert_eq!(to_storage_name("ID"), "id");
        assert_eq!(to_storage_name("SecretID"), "secret_id");
        assert_eq!(to_storage_name("UID"), "uid");
    }

    #[test]
    fn already_snake_is_untouched() {
        assert_eq!(to_storage_name("deleted_at"), "deleted_at");
        assert_eq!(to_storage_name("status"), "status");
    }
}
