use std::ffi::OsString;

use crate::command::Environment;

/// Return `base` (or the ambient environment when `None`) with every `var`
/// entry removed and a single `var=value` entry appended.
pub fn with_parallelism(
    base: Option<&[(OsString, OsString)]>,
    var: &str,
    value: u32,
) -> Environment {
    let ambient;
    let base = match base {
        Some(entries) if !entries.is_empty() => entries,
        _ => {
            ambient = std::env::vars_os().collect::<Environment>();
            ambient.as_slice()
        }
    };

    let mut env: Environment = base
        .iter()
        .filter(|(key, _)| key.as_os_str() != var)
        .cloned()
        .collect();
    env.push((OsString::from(var), OsString::from(value.to_string())));
    env
}
