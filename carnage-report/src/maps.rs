//! Map display-name resolution.
//!
//! Report files name the map through an internal token embedded in the
//! filename (e.g. `asq_chill` for Narrows). The table below is scanned in
//! declaration order and the first token contained in the filename wins, so
//! the order of entries is part of the behavior: `asq_the_pit` must never be
//! reached for a filename that also contains `asq_cyberdy`, for instance.

/// Internal map token → display name, in lookup order.
pub const MAP_TOKENS: &[(&str, &str)] = &[
    ("asq_chill", "Narrows"),
    ("asq_constru", "Construct"),
    ("asq_guardia", "Guardian"),
    ("asq_cyberdy", "The Pit"),
    ("asq_warehou", "Foundry (Onslaught)"),
    ("asq_midship", "Heretic"),
    ("asq_epitaph", "Epitaph"),
    ("asq_high_ground", "High Ground"),
    ("asq_isolation", "Isolation"),
    ("asq_last_resort", "Last Resort"),
    ("asq_sandtrap", "Sandtrap"),
    ("asq_snowbound", "Snowbound"),
    ("asq_the_pit", "The Pit"),
    ("asq_valhalla", "Valhalla"),
    ("asq_blackout", "Blackout"),
    ("asq_ghost_town", "Ghost Town"),
    ("asq_rat_nest", "Rat's Nest"),
    ("asq_standoff", "Standoff"),
    ("asq_avalanche", "Avalanche"),
    ("asq_foundry", "Foundry"),
    ("asq_boundless", "Snowbound (Boundless)"),
    ("asq_glacier", "Cold Storage"),
    ("asq_orbital", "Orbital"),
    ("asq_assembly", "Assembly"),
    ("asq_citadel", "Citadel"),
    ("asq_heretic", "Heretic"),
    ("asq_longshore", "Longshore"),
    ("asq_sandbox", "Sandbox"),
    ("asq_tundra", "Avalanche"),
    ("asq_descent", "Assembly"),
];

/// Filename fragment that marks a multiplayer carnage report.
pub const REPORT_PATTERN: &str = "mpcarnagereport";

/// Label for a recognized report file whose map could not be identified.
pub const GENERIC_MATCH_LABEL: &str = "Halo 3 Match";

/// Label of last resort.
pub const GENERIC_MAP_LABEL: &str = "Halo 3 Map";

/// Which step of the fallback chain produced a map name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapSource {
    /// A token from [`MAP_TOKENS`] was found in the filename.
    Token,
    /// The report's own map tag (only consulted by the parser).
    ReportTag,
    /// The mode/hopper hint passed by the caller.
    ModeHint,
    /// The filename looks like a carnage report but names no known map.
    FilenamePattern,
    /// Nothing matched.
    Generic,
}

/// Placeholder values that never count as a real name.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown")
}

/// Find the first map token (in table order) contained in `filename`,
/// ignoring case.
pub fn lookup_token(filename: &str) -> Option<&'static str> {
    let lower = filename.to_lowercase();
    MAP_TOKENS
        .iter()
        .find(|(token, _)| lower.contains(token))
        .map(|(_, name)| *name)
}

/// Resolve a map display name from a report filename.
///
/// Fallback chain, in order:
/// 1. token table match on the filename
/// 2. `mode_hint`, unless it is a placeholder
/// 3. [`GENERIC_MATCH_LABEL`] when the filename contains [`REPORT_PATTERN`]
/// 4. [`GENERIC_MAP_LABEL`]
pub fn resolve_map_name(filename: &str, mode_hint: Option<&str>) -> String {
    resolve_with_source(filename, mode_hint).0
}

/// Like [`resolve_map_name`] but also reports which step matched.
pub fn resolve_with_source(filename: &str, mode_hint: Option<&str>) -> (String, MapSource) {
    if let Some(name) = lookup_token(filename) {
        return (name.to_string(), MapSource::Token);
    }

    if let Some(hint) = mode_hint.filter(|h| !is_placeholder(h)) {
        return (hint.trim().to_string(), MapSource::ModeHint);
    }

    if filename.to_lowercase().contains(REPORT_PATTERN) {
        return (GENERIC_MATCH_LABEL.to_string(), MapSource::FilenamePattern);
    }

    (GENERIC_MAP_LABEL.to_string(), MapSource::Generic)
}

/// Resolution used by the parser, which also knows the report's `MapName` tag.
///
/// The filename token still takes precedence; the tag is consulted before
/// the mode hint.
pub fn resolve_with_report_tag(
    filename: &str,
    map_tag: Option<&str>,
    mode_hint: Option<&str>,
) -> (String, MapSource) {
    if let Some(name) = lookup_token(filename) {
        return (name.to_string(), MapSource::Token);
    }
    if let Some(tag) = map_tag.filter(|t| !is_placeholder(t)) {
        return (tag.trim().to_string(), MapSource::ReportTag);
    }
    resolve_with_source(filename, mode_hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_match_wins_over_mode_hint() {
        let (name, source) =
            resolve_with_source("asq_chill_2026-01-20-18-14-04.xml", Some("Team Slayer"));
        assert_eq!(name, "Narrows");
        assert_eq!(source, MapSource::Token);
    }

    #[test]
    fn token_match_is_case_insensitive() {
        assert_eq!(resolve_map_name("ASQ_Valhalla_report.XML", None), "Valhalla");
    }

    #[test]
    fn mode_hint_used_when_no_token() {
        let (name, source) = resolve_with_source("mpcarnagereport1.xml", Some("Team Doubles"));
        assert_eq!(name, "Team Doubles");
        assert_eq!(source, MapSource::ModeHint);
    }

    #[test]
    fn unknown_mode_hint_falls_through_to_filename_pattern() {
        let (name, source) = resolve_with_source("mpcarnagereport1_3528_0_0.xml", Some("Unknown"));
        assert_eq!(name, GENERIC_MATCH_LABEL);
        assert_eq!(source, MapSource::FilenamePattern);
    }

    #[test]
    fn empty_mode_hint_is_a_placeholder() {
        assert_eq!(
            resolve_map_name("mpcarnagereport1.xml", Some("  ")),
            GENERIC_MATCH_LABEL
        );
    }

    #[test]
    fn fully_generic_label_when_nothing_matches() {
        let (name, source) = resolve_with_source("random_file.xml", None);
        assert_eq!(name, GENERIC_MAP_LABEL);
        assert_eq!(source, MapSource::Generic);
    }

    #[test]
    fn first_declared_token_wins() {
        // asq_warehou is declared before asq_foundry.
        assert_eq!(
            lookup_token("asq_foundry_asq_warehou.xml"),
            Some("Foundry (Onslaught)")
        );
        // asq_chill is declared before asq_sandbox.
        assert_eq!(lookup_token("asq_sandbox_asq_chill.xml"), Some("Narrows"));
    }

    #[test]
    fn report_tag_consulted_before_hint() {
        let (name, source) =
            resolve_with_report_tag("mpcarnagereport1.xml", Some("Guardian"), Some("Slayer"));
        assert_eq!(name, "Guardian");
        assert_eq!(source, MapSource::ReportTag);

        let (name, source) =
            resolve_with_report_tag("mpcarnagereport1.xml", Some("Unknown"), Some("Slayer"));
        assert_eq!(name, "Slayer");
        assert_eq!(source, MapSource::ModeHint);
    }
}
