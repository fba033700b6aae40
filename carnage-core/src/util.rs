/// K/D ratio for display. With no deaths the ratio is the kill count.
pub fn kd_ratio(kills: u64, deaths: u64) -> f64 {
    if deaths == 0 {
        kills as f64
    } else {
        kills as f64 / deaths as f64
    }
}

/// Up to two leading characters of a name, uppercased, for avatar badges.
pub fn initials(name: &str) -> String {
    name.chars().take(2).collect::<String>().to_uppercase()
}

/// Pad `s` with spaces to exactly `width` characters, truncating longer input.
///
/// Counts characters rather than bytes so gamertags with non-ASCII
/// characters keep the table columns aligned.
pub fn pad_truncate(s: &str, width: usize) -> String {
    let mut out: String = s.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat_n(' ', width - len));
    out
}
