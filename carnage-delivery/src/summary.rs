//! Captions and the plain-text stats table used when an image can't be sent.

use carnage_core::MatchRecord;
use carnage_core::util::pad_truncate;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Caption for the chat session destination.
pub fn session_caption(record: &MatchRecord) -> String {
    format!(
        "🎮 {} - {}\n📅 {}",
        record.map_name,
        record.mode_name,
        record.played_at.format(TIME_FORMAT)
    )
}

/// Caption for the webhook destination (markdown).
pub fn webhook_caption(record: &MatchRecord) -> String {
    format!(
        "🏆 **{}** - {}\n📅 {}\nID: `{}`",
        record.map_name,
        record.mode_name,
        record.played_at.format(TIME_FORMAT),
        record.match_id
    )
}

/// Fixed-width stats table, players sorted by score, highest first.
pub fn fallback_table(record: &MatchRecord) -> String {
    let mut out = format!("**STATS: {} ({})**\n", record.map_name, record.mode_name);
    out.push_str("```\n");
    out.push_str("Player          | K   | D   | A   | Score\n");
    out.push_str("----------------|-----|-----|-----|-------\n");
    for p in record.players_by_score() {
        out.push_str(&format!(
            "{} | {:<3} | {:<3} | {:<3} | {:<5}\n",
            pad_truncate(&p.display_name, 15),
            p.kills,
            p.deaths,
            p.assists,
            p.score
        ));
    }
    out.push_str("```");
    out
}

/// File name used for the image attachment. `key` is the match id, or the
/// report's file stem when the id is unknown.
pub fn attachment_name(key: &str) -> String {
    format!("match_{}.png", key)
}
