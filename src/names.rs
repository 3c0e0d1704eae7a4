//! Identifier translation between host and script conventions.
//!
//! Host members use the leading-uppercase export convention; script code
//! sees lowerCamelCase. Translation is a pure function and its inverse
//! produces candidate host spellings to try in order. Only ASCII letters
//! participate; anything else passes through untouched (and is therefore
//! never visible, since visibility is defined as "translation changed the
//! name").

/// Translate a host member name to its script spelling.
///
/// The leading run of ASCII uppercase letters is lowercased; if the run is
/// longer than one character and shorter than the whole name, its last
/// character stays attached to the remainder instead.
///
/// ```
/// use caramel::names::to_script_name;
///
/// assert_eq!(to_script_name("Int"), "int");
/// assert_eq!(to_script_name("HTTPServer"), "httpServer");
/// assert_eq!(to_script_name("URL"), "url");
/// assert_eq!(to_script_name("foo"), "foo");
/// ```
pub fn to_script_name(name: &str) -> String {
    let mut run = String::new();
    let mut keep = String::new();
    for c in name.chars() {
        if c.is_ascii_uppercase() && keep.is_empty() {
            run.push(c);
        } else {
            keep.push(c);
        }
    }

    // The run is pure ASCII, so byte arithmetic is character arithmetic.
    if run.len() > 1 && run.len() != name.len() {
        let last = run.split_off(run.len() - 1);
        keep.insert_str(0, &last);
    }

    run.make_ascii_lowercase();
    run + &keep
}

/// Whether a host member name is visible to scripts.
///
/// A name is visible exactly when translating it changes it; all-lowercase
/// and non-ASCII names are invisible to the property protocol.
pub fn is_visible(name: &str) -> bool {
    to_script_name(name) != name
}

/// Candidate host spellings for a script member name, tried in order.
///
/// A script name starting with an uppercase letter cannot refer to a
/// visible member and yields no candidates. Otherwise the candidates are
/// the name with its first character uppercased, then the name with its
/// whole leading lowercase run uppercased (`httpServer` -> `HttpServer`,
/// `HTTPServer`).
pub fn host_candidates(name: &str) -> Vec<String> {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Vec::new(),
    };
    if first.is_ascii_uppercase() {
        return Vec::new();
    }

    let mut title = String::with_capacity(name.len());
    title.extend(first.to_uppercase());
    title.push_str(chars.as_str());

    let mut run = String::new();
    let mut rest = String::new();
    for c in name.chars() {
        if c.is_ascii_lowercase() && rest.is_empty() {
            run.push(c);
        } else {
            rest.push(c);
        }
    }
    run.make_ascii_uppercase();
    let upper_run = run + &rest;

    if upper_run == title {
        vec![title]
    } else {
        vec![title, upper_run]
    }
}
