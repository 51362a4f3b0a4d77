use std::cmp::Ordering;

/// Split into alternating runs of ASCII digits and non-digits.
fn runs(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev_digit: Option<bool> = None;
    for (i, c) in s.char_indices() {
        let digit = c.is_ascii_digit();
        if prev_digit.is_some_and(|p| p != digit) {
            out.push(&s[start..i]);
            start = i;
        }
        prev_digit = Some(digit);
    }
    if start < s.len() {
        out.push(&s[start..]);
    }
    out
}

fn is_number(run: &str) -> bool {
    run.bytes().all(|b| b.is_ascii_digit())
}

/// Numeric comparison of digit runs of any length ("007" == "7").
fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural ordering: digit runs compare by value, everything else
/// byte-wise, and a sequence that is a prefix of another sorts first.
/// `img2.jpg` < `img10.jpg`. Names equal by value (`IMG_007`, `IMG_7`)
/// fall back to byte order so the result is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_runs = runs(a);
    let b_runs = runs(b);

    for (x, y) in a_runs.iter().zip(b_runs.iter()) {
        let ord = if is_number(x) && is_number(y) {
            cmp_numeric(x, y)
        } else {
            x.cmp(y)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    a_runs
        .len()
        .cmp(&b_runs.len())
        .then_with(|| a.cmp(b))
}

/// Stable in-place natural sort.
pub fn natural_sort<S: AsRef<str>>(items: &mut [S]) {
    items.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}
