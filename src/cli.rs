//! Flag parsing shared by the binaries: `--name=value`, `--name value` and bare flags.

use std::path::PathBuf;
use std::str::FromStr;

/// First value of `name` that parses as `T`. Blank values are skipped.
pub fn value_arg<T: FromStr>(args: &[String], name: &str) -> Option<T> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        let raw = match arg.strip_prefix(&prefix) {
            Some(raw) => raw,
            None if arg == name => match args.get(idx + 1) {
                Some(next) => next.as_str(),
                None => continue,
            },
            None => continue,
        };
        let raw = raw.trim();
        if !raw.is_empty()
            && let Ok(v) = raw.parse::<T>()
        {
            return Some(v);
        }
    }
    None
}

/// Comma-separated paths, e.g. `--csv a.csv,b.csv`.
pub fn path_list_arg(args: &[String], name: &str) -> Vec<PathBuf> {
    value_arg::<String>(args, name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default()
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}
