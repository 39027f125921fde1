//! Text sanitization after decoding.
//!
//! Removes encoding artifacts left behind by the lossy decode path. Pure
//! string transform, idempotent on already-clean input.

/// Remove null and replacement characters and collapse short runs of `?`
/// (a common artifact of mis-decoded multi-byte sequences) to a single `?`.
///
/// Runs of 2-3 consecutive `?` collapse to one; longer runs are assumed to
/// be intentional text and are left alone.
pub fn sanitize(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|&c| c != '\0' && c != '\u{FFFD}')
        .collect();

    collapse_question_runs(&cleaned)
}

fn collapse_question_runs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '?' {
            out.push(c);
            continue;
        }

        let mut run = 1;
        while chars.peek() == Some(&'?') {
            chars.next();
            run += 1;
        }

        if (2..=3).contains(&run) {
            out.push('?');
        } else {
            for _ in 0..run {
                out.push('?');
            }
        }
    }

    out
}
