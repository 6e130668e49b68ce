use crate::{AppError, AppState};

/// Splits candidate participant names into resolved roster ids and guest
/// names. Numeric tokens are mention ids and pass through as resolved.
pub async fn resolve_names(
    state: &AppState,
    names: &[String],
) -> Result<(Vec<String>, Vec<String>), AppError> {
    let mut resolved = Vec::new();
    let mut guests = Vec::new();
    for name in names {
        if !name.is_empty() && name.chars().all(|ch| ch.is_ascii_digit()) {
            resolved.push(name.clone());
            continue;
        }
        match state.roster.resolve_user_by_name(name).await? {
            Some(member) => resolved.push(member.id),
            None => guests.push(name.clone()),
        }
    }
    Ok((resolved, guests))
}
