use uuid::Uuid;

const MAX_BASE_LEN: usize = 40;
const SUFFIX_LEN: usize = 5;

/// Builds the public URL identifier for a form name.
///
/// `"Backend Intern (2025)!"` becomes something like `backend-intern-2025-3f9a1`.
/// The random suffix keeps repeated names apart.
pub fn build_slug(name: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string()[..SUFFIX_LEN].to_string();
    format!("{}-{suffix}", slug_base(name))
}

fn slug_base(name: &str) -> String {
    let mut base = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !base.is_empty() {
                base.push('-');
            }
            pending_hyphen = false;
            base.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    // Only ASCII is pushed, so byte truncation is safe.
    base.truncate(MAX_BASE_LEN);
    let base = base.trim_end_matches('-');

    if base.is_empty() {
        "form".to_string()
    } else {
        base.to_string()
    }
}
