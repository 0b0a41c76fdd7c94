/// Project part of a ticket key such as `PROJ-123`.
pub fn project_from_ticket_key(ticket_key: &str) -> Option<&str> {
    let ticket_key = ticket_key.trim();
    let (project, number) = ticket_key.rsplit_once('-')?;
    if is_project_key(project) && !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
    {
        Some(project)
    } else {
        None
    }
}

pub fn is_ticket_key(value: &str) -> bool {
    project_from_ticket_key(value).is_some()
}

/// Uppercase letter followed by uppercase letters or digits.
pub fn is_project_key(value: &str) -> bool {
    let mut chars = value.trim().chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {
            chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Accepts either a project key or a ticket key and returns the project key.
pub fn resolve_project(input: &str) -> Result<String, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("project key or ticket key is required".to_string());
    }
    if let Some(project) = project_from_ticket_key(input) {
        return Ok(project.to_string());
    }
    if is_project_key(input) {
        return Ok(input.to_string());
    }
    Err(format!(
        "invalid project or ticket key format: '{input}' (expected PROJECT or PROJECT-123)"
    ))
}
