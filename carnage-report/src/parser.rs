use std::collections::HashMap;
use std::path::Path;

use carnage_core::{MatchRecord, PlayerRecord, UNKNOWN_MATCH_ID, UNKNOWN_PLAYER};
use chrono::NaiveDateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::ReportError;
use crate::maps::resolve_with_report_tag;
use crate::timestamp::parse_filename_timestamp;

/// Root element names written by the game client.
const ROOT_NAMES: &[&str] = &["CarnageReport", "MultiplayerCarnageReport"];

const DEFAULT_MODE: &str = "Slayer";
const DEFAULT_HOPPER: &str = "Unknown";

// ---------------------------------------------------------------------------
// Raw document shape
// ---------------------------------------------------------------------------

/// Attributes of one `<Player>` element, untyped.
#[derive(Debug, Default)]
struct RawPlayer {
    attrs: HashMap<String, String>,
}

/// The `<Players>` node as the export format presents it: absent, a single
/// player, or a sequence. Collapsed to a `Vec` before anything else sees it.
#[derive(Debug, Default)]
enum PlayerNodes {
    #[default]
    Absent,
    One(RawPlayer),
    Many(Vec<RawPlayer>),
}

impl PlayerNodes {
    fn push(&mut self, player: RawPlayer) {
        *self = match std::mem::take(self) {
            PlayerNodes::Absent => PlayerNodes::One(player),
            PlayerNodes::One(first) => PlayerNodes::Many(vec![first, player]),
            PlayerNodes::Many(mut all) => {
                all.push(player);
                PlayerNodes::Many(all)
            }
        };
    }

    fn into_vec(self) -> Vec<RawPlayer> {
        match self {
            PlayerNodes::Absent => Vec::new(),
            PlayerNodes::One(player) => vec![player],
            PlayerNodes::Many(all) => all,
        }
    }
}

#[derive(Debug, Default)]
struct RawReport {
    root: Option<String>,
    has_players: bool,
    /// Game-level values keyed by element name (`GameUniqueId`, `MapName`, ...).
    fields: HashMap<String, String>,
    players: PlayerNodes,
}

impl RawReport {
    fn open(&mut self, stack: &[String], name: &str, e: &BytesStart<'_>) -> Result<(), ReportError> {
        match stack.len() {
            0 => self.root = Some(name.to_string()),
            1 if name == "Players" => self.has_players = true,
            1 => {
                if let Some(value) = element_value(name, e)? {
                    self.fields.insert(name.to_string(), value);
                }
            }
            2 if name == "Player" && stack[1] == "Players" => {
                self.players.push(RawPlayer {
                    attrs: attributes(e)?,
                });
            }
            _ => {}
        }
        Ok(())
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>, ReportError> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

/// Game-level elements store their value in an attribute named after the
/// element (`<MapName MapName="..."/>`), sometimes with an `m` prefix
/// (`<GameEnum mGameEnum="..."/>`). A lone attribute of any name is accepted too.
fn element_value(name: &str, e: &BytesStart<'_>) -> Result<Option<String>, ReportError> {
    let mut attrs = attributes(e)?;
    if let Some(v) = attrs.remove(name) {
        return Ok(Some(v));
    }
    if let Some(v) = attrs.remove(&format!("m{name}")) {
        return Ok(Some(v));
    }
    if attrs.len() == 1 {
        return Ok(attrs.into_values().next());
    }
    Ok(None)
}

fn read_raw(raw: &[u8]) -> Result<RawReport, ReportError> {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    let mut xml = Reader::from_reader(raw);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut report = RawReport::default();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let name = local_name(e);
                report.open(&stack, &name, e)?;
                stack.push(name);
            }
            Event::Empty(ref e) => {
                let name = local_name(e);
                report.open(&stack, &name, e)?;
            }
            Event::Text(ref e) => {
                // <MapName>Guardian</MapName> style values
                if stack.len() == 2 {
                    let text = e.unescape()?.trim().to_string();
                    if !text.is_empty() {
                        report.fields.entry(stack[1].clone()).or_insert(text);
                    }
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ReportError::malformed(format!(
            "truncated report: <{open}> is never closed"
        )));
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Parse a count the way the export writes them: leading integer, anything
/// unparsable is 0, negatives clamp to 0.
fn parse_count(value: Option<&str>) -> u32 {
    let Some(value) = value else { return 0 };
    let trimmed = value.trim();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    match trimmed[..end].parse::<i64>() {
        Ok(n) => n.clamp(0, i64::from(u32::MAX)) as u32,
        Err(_) => 0,
    }
}

fn parse_flag(value: Option<&str>) -> bool {
    value
        .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
        .unwrap_or(false)
}

fn normalize_player(raw: RawPlayer) -> PlayerRecord {
    let get = |key: &str| raw.attrs.get(key).map(String::as_str);
    let text = |key: &str| get(key).unwrap_or_default().trim().to_string();

    let display_name = match get("mGamertagText").map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => UNKNOWN_PLAYER.to_string(),
    };

    PlayerRecord {
        display_name,
        xbox_user_id: text("mXboxUserId"),
        clan_tag: text("ClantagText"),
        service_id: text("ServiceId"),
        team_id: parse_count(get("mTeamId")),
        score: parse_count(get("Score")),
        standing: parse_count(get("mStanding")),
        kills: parse_count(get("mKills")),
        deaths: parse_count(get("mDeaths")),
        assists: parse_count(get("mAssists")),
        betrayals: parse_count(get("mBetrayals")),
        suicides: parse_count(get("mSuicides")),
        best_streak: parse_count(get("mMostKillsInARow")),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a report, using the current local time when the filename carries
/// no timestamp token.
pub fn parse_report(raw: &[u8], source_filename: &str) -> Result<MatchRecord, ReportError> {
    parse_report_at(raw, source_filename, chrono::Local::now().naive_local())
}

/// Parse a report with an explicit ingestion time for the `played_at` fallback.
///
/// Every leaf value is optional. The only hard failure is a document with no
/// recognizable report root.
pub fn parse_report_at(
    raw: &[u8],
    source_filename: &str,
    ingested_at: NaiveDateTime,
) -> Result<MatchRecord, ReportError> {
    let RawReport {
        root,
        has_players,
        fields,
        players,
    } = read_raw(raw)?;

    let root = root.ok_or_else(|| ReportError::malformed("document has no root element"))?;
    if !ROOT_NAMES.contains(&root.as_str()) && !has_players {
        return Err(ReportError::malformed(format!(
            "unexpected root element <{root}>"
        )));
    }

    let field = |name: &str| {
        fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    let hopper_name = field("HopperName").unwrap_or(DEFAULT_HOPPER).to_string();
    let (map_name, map_source) =
        resolve_with_report_tag(source_filename, field("MapName"), Some(&hopper_name));
    log::debug!(
        "{}: map resolved to '{}' via {:?}",
        source_filename,
        map_name,
        map_source
    );

    let played_at = parse_filename_timestamp(source_filename).unwrap_or_else(|| {
        log::debug!("{}: no timestamp token, using ingestion time", source_filename);
        ingested_at
    });

    let players: Vec<PlayerRecord> = players.into_vec().into_iter().map(normalize_player).collect();

    Ok(MatchRecord {
        match_id: field("GameUniqueId").unwrap_or(UNKNOWN_MATCH_ID).to_string(),
        map_name,
        mode_name: field("GameTypeName").unwrap_or(DEFAULT_MODE).to_string(),
        is_ranked: parse_flag(field("IsMatchmaking")),
        teams_enabled: parse_flag(field("IsTeamsEnabled")),
        played_at,
        game_enum: parse_count(field("GameEnum")),
        hopper_name,
        players,
    })
}

/// Read and parse a report file from disk.
pub fn parse_report_file(path: &Path) -> Result<MatchRecord, ReportError> {
    let raw = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_report(&raw, &filename)
}

#[cfg(test)]
#[path = "tests/parser_tests.rs"]
mod tests;
