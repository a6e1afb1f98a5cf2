//! Deterministic type names derived from declaration paths and references.

const COMPONENTS_PREFIX: &str = "#/components/";
const SCHEMAS_PREFIX: &str = "#/components/schemas/";

/// PascalCase a free-form identifier into a type name.
///
/// Non-alphanumeric characters split words; a leading digit gets an `N`
/// prefix so the result is always a valid identifier.
pub fn to_type_name(s: &str) -> String {
    ensure_identifier(pascal_case(s))
}

/// Join path segments into a type name, e.g. `["Order", "client", "anyOf"]`
/// becomes `Order_Client_AnyOf`.
pub fn path_to_type_name<S: AsRef<str>>(path: &[S]) -> String {
    let joined = path
        .iter()
        .map(|segment| pascal_case(segment.as_ref()))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    ensure_identifier(joined)
}

/// Type name for the target of a reference.
///
/// Component references use the component name. Any other local pointer is
/// named from its path so that every reference to the same path agrees.
pub fn ref_to_type_name(reference: &str) -> String {
    if is_standard_component_reference(reference) {
        return to_type_name(&ref_object_name(reference));
    }

    let tokens = pointer_tokens(reference);
    let mut segments = Vec::with_capacity(tokens.len());
    let mut iter = tokens.iter().map(String::as_str).peekable();
    let mut first = true;

    while let Some(token) = iter.next() {
        let leading = first;
        first = false;
        match token {
            "paths" if leading => {}
            "components" if leading => {
                iter.next();
            }
            "schema" => {}
            "responses" => match iter.next() {
                Some(code) => segments.push(format!("Response{}", pascal_case(code))),
                None => segments.push("Responses".to_string()),
            },
            "content" => {
                if let Some(media) = iter.next() {
                    segments.push(media_type_segment(media));
                }
            }
            other => segments.push(pascal_case(other)),
        }
    }

    path_to_type_name(&segments)
}

/// Last segment of a reference, unescaped.
pub fn ref_object_name(reference: &str) -> String {
    pointer_tokens(reference).pop().unwrap_or_default()
}

/// True for `#/components/<kind>/<name>` with nothing after the name.
pub fn is_standard_component_reference(reference: &str) -> bool {
    match reference.strip_prefix(COMPONENTS_PREFIX) {
        Some(rest) => {
            let mut parts = rest.split('/');
            matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(kind), Some(name), None) if !kind.is_empty() && !name.is_empty()
            )
        }
        None => false,
    }
}

/// Name of the schema component a reference points at, if it points at one
/// directly.
pub fn component_schema_name(reference: &str) -> Option<String> {
    let rest = reference.strip_prefix(SCHEMAS_PREFIX)?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(unescape_token(rest))
}

/// `#/components/schemas/Foo` for `#/components/schemas/Foo/properties/bar`.
pub fn parent_component_reference(reference: &str) -> Option<String> {
    let rest = reference.strip_prefix(COMPONENTS_PREFIX)?;
    let mut parts = rest.splitn(3, '/');
    let kind = parts.next()?;
    let name = parts.next()?;
    parts.next()?;
    Some(format!("{}{}/{}", COMPONENTS_PREFIX, kind, name))
}

/// Reference string for a component.
pub fn component_reference(kind: &str, name: &str) -> String {
    format!("{}{}/{}", COMPONENTS_PREFIX, kind, escape_token(name))
}

/// Unescaped tokens of a local JSON pointer reference.
pub fn pointer_tokens(reference: &str) -> Vec<String> {
    let pointer = reference.trim_start_matches('#').trim_start_matches('/');
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer.split('/').map(unescape_token).collect()
}

/// Escape a key for use as a JSON pointer token (`~` to `~0`, `/` to `~1`).
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Pick a free name for `base`.
///
/// Tries `base` first, then each suffix appended, then each suffix with an
/// increasing number. The first name `is_taken` rejects wins.
pub fn generate_type_name<F>(is_taken: F, base: &str, suffixes: &[String]) -> String
where
    F: Fn(&str) -> bool,
{
    if !is_taken(base) {
        return base.to_string();
    }

    let default_suffixes = [String::new()];
    let suffixes = if suffixes.is_empty() {
        &default_suffixes[..]
    } else {
        suffixes
    };

    for suffix in suffixes {
        let name = format!("{}{}", base, suffix);
        if !is_taken(&name) {
            return name;
        }
    }

    let mut i = 1usize;
    loop {
        for suffix in suffixes {
            let name = format!("{}{}{}", base, suffix, i);
            if !is_taken(&name) {
                return name;
            }
        }
        i += 1;
    }
}

fn media_type_segment(media: &str) -> String {
    let essence = media.split(';').next().unwrap_or(media).trim();
    if essence == "application/json" || essence.ends_with("+json") {
        "JSON".to_string()
    } else {
        pascal_case(essence)
    }
}

fn pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

fn ensure_identifier(name: String) -> String {
    match name.chars().next() {
        None => "Empty".to_string(),
        Some(c) if c.is_ascii_digit() => format!("N{}", name),
        Some(_) => name,
    }
}
