use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Date tokens stripped from directory names, in order. The "and
/// before/after" forms and ranges go first so the leading-year rules do not
/// leave half of them behind.
static DATE_TOKENS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\d{4}\s+and\s+(before|after)$", // whole "1949 and before"
        r"\d{4}-\d{4}",              // decade ranges, anywhere
        r"\s+and\s+(before|after)$",
        r"^\d{4}[-_]\d{2}[-_]\d{2}", // YYYY-MM-DD / YYYY_MM_DD
        r"^\d{8}",                   // YYYYMMDD
        r"^\d{6}",                   // YYMMDD
        r"^\d{4}[-_]",               // YYYY_ / YYYY-
        r"^\d{4}\s+",                // YYYY followed by space
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static UNDERSCORES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());
static DISALLOWED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// Human-readable label built from the directories between `source_root`
/// and the file, e.g. `/src/2019-07-04 Lake Trip/Day 1/IMG_1.jpg` gives
/// `Lake_Trip_Day_1`. Empty when nothing meaningful survives.
pub fn extract(full_path: &str, source_root: &str) -> String {
    let root = source_root.trim_end_matches('/');
    let full = full_path.trim_end_matches('/');

    let rel = Path::new(full)
        .strip_prefix(root)
        .unwrap_or_else(|_| Path::new(full.trim_start_matches('/')));

    let Some(dir) = rel.parent() else {
        return String::new();
    };

    dir.iter()
        .filter_map(|c| c.to_str())
        .map(clean_directory_name)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Strip date tokens from one directory name and reduce it to `[A-Za-z0-9_]`.
pub fn clean_directory_name(dir: &str) -> String {
    let mut name: String = dir.nfc().collect();
    for re in DATE_TOKENS.iter() {
        name = re.replace_all(&name, "").into_owned();
    }

    let name = name.trim_matches(['_', '-', ' ']).replace(' ', "_");
    let name = fold_accents(&name);
    let name = DISALLOWED_RE.replace_all(&name, "_");
    let name = UNDERSCORES_RE.replace_all(&name, "_");
    name.trim_matches('_').to_string()
}

/// `Café` -> `Cafe`; characters without a Latin base are left for the
/// `[A-Za-z0-9_]` pass to replace.
fn fold_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}
