/// Canonicalizes program output for comparison
///
/// Splits on `'\n'` literally (so `"a\nb\n"` becomes `["a", "b", ""]`),
/// drops leading and trailing whitespace-only lines, then strips trailing
/// whitespace from each surviving line. Leading whitespace inside a line and
/// interior blank lines are kept.
pub fn normalize(raw: &str) -> Vec<&str> {
    let lines: Vec<&str> = raw.split('\n').collect();
    let first = match lines.iter().position(|l| !l.trim().is_empty()) {
        Some(i) => i,
        None => return Vec::new(),
    };
    // position() succeeded, so rposition() must as well
    let last = lines.iter().rposition(|l| !l.trim().is_empty()).unwrap();
    lines[first..=last].iter().map(|l| l.trim_end()).collect()
}
