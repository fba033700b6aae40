//! HTML post-game document that the browser screenshots.
//!
//! The page is self-contained (inline CSS, no remote fonts or scripts) so a
//! render never waits on the network.

use carnage_core::util::initials;
use carnage_core::{MatchRecord, PlayerRecord, Team, TeamOutcome, TeamTotals, winner};

const STYLE: &str = r#"
body { margin: 0; background: #0a141d; color: #e0e6eb; font-family: 'DejaVu Sans', Arial, sans-serif; }
.panel { margin: 32px auto; max-width: 1100px; background: rgba(18, 38, 54, 0.9); border: 1px solid rgba(130, 215, 255, 0.25); border-radius: 8px; }
.header { display: flex; justify-content: space-between; align-items: flex-end; padding: 24px; background: #050a0f; border-bottom: 1px solid #1f2a33; }
.kicker { font-size: 12px; letter-spacing: 0.3em; text-transform: uppercase; color: #26c6da; }
.map { font-size: 36px; font-weight: bold; text-transform: uppercase; letter-spacing: 0.05em; }
.meta { color: #90a4ae; font-size: 13px; font-family: monospace; }
.when { text-align: right; }
.date { font-size: 20px; }
.time { font-size: 14px; color: #90a4ae; }
.body { padding: 24px 32px; }
.banner { text-align: center; padding: 14px; margin-bottom: 24px; font-size: 28px; font-weight: bold; letter-spacing: 0.2em; text-transform: uppercase; border-top: 1px solid; border-bottom: 1px solid; }
.banner.blue { color: #4fc3f7; border-color: #4fc3f7; }
.banner.red { color: #ef5350; border-color: #ef5350; }
.banner.draw { color: #ffd700; border-color: #ffd700; }
.team { margin-bottom: 28px; }
.team-head { display: flex; justify-content: space-between; align-items: center; padding: 10px 14px; margin-bottom: 8px; border-left: 4px solid; }
.team-head.blue { border-color: #4fc3f7; background: rgba(1, 46, 74, 0.9); }
.team-head.red { border-color: #ef5350; background: rgba(66, 11, 11, 0.9); }
.team-head.other { border-color: #b0bec5; background: rgba(40, 50, 58, 0.9); }
.team-name { font-size: 22px; font-weight: bold; }
.team-score { font-size: 28px; font-weight: bold; }
table { width: 100%; border-collapse: collapse; }
th { text-transform: uppercase; font-size: 12px; letter-spacing: 0.1em; color: #90a4ae; padding: 6px; border-bottom: 1px solid rgba(255, 255, 255, 0.1); }
td { padding: 10px 6px; border-bottom: 1px solid rgba(255, 255, 255, 0.08); text-align: center; }
td.player { text-align: left; }
.badge { display: inline-block; width: 32px; height: 32px; line-height: 32px; text-align: center; border-radius: 4px; font-size: 12px; font-weight: bold; margin-right: 10px; background: #263238; vertical-align: middle; }
.tag { font-size: 11px; color: #78909c; text-transform: uppercase; }
.score { color: #ffd700; font-weight: bold; font-size: 18px; }
tr.totals td { font-weight: bold; background: rgba(255, 255, 255, 0.04); }
.footer { padding: 12px; text-align: center; font-size: 11px; color: #546e7a; font-family: monospace; letter-spacing: 0.2em; text-transform: uppercase; border-top: 1px solid #1f2a33; }
"#;

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Text of the winner banner.
pub fn banner_text(outcome: TeamOutcome) -> String {
    match outcome {
        TeamOutcome::Winner(team) => format!("{} Team Victory", team.label()),
        TeamOutcome::Draw => "Draw".to_string(),
    }
}

fn css_class(team: Team) -> &'static str {
    match team {
        Team::Blue => "blue",
        Team::Red => "red",
        Team::Other(_) => "other",
    }
}

fn push_table_head(html: &mut String) {
    html.push_str("<table><thead><tr>");
    for col in ["Player", "Kills", "Score", "Deaths", "Assists", "K/D"] {
        html.push_str(&format!("<th>{}</th>", col));
    }
    html.push_str("</tr></thead><tbody>\n");
}

fn push_player_row(html: &mut String, player: &PlayerRecord) {
    let name = escape_html(&player.display_name);
    html.push_str(&format!(
        "<tr><td class=\"player\"><span class=\"badge\">{}</span>{}<div class=\"tag\">Service Tag: {}</div></td>\
         <td>{}</td><td class=\"score\">{}</td><td>{}</td><td>{}</td><td>{:.2}</td></tr>\n",
        escape_html(&initials(&player.display_name)),
        name,
        escape_html(player.service_tag()),
        player.kills,
        player.score,
        player.deaths,
        player.assists,
        player.kd_ratio(),
    ));
}

fn push_totals_row(html: &mut String, label: &str, totals: &TeamTotals) {
    html.push_str(&format!(
        "<tr class=\"totals\"><td class=\"player\">{} TOTALS</td>\
         <td>{}</td><td class=\"score\">{}</td><td>{}</td><td>{}</td><td>{:.2}</td></tr>\n",
        escape_html(&label.to_uppercase()),
        totals.kills,
        totals.score,
        totals.deaths,
        totals.assists,
        totals.kd_ratio(),
    ));
}

fn push_section(html: &mut String, class: &str, title: &str, players: &[&PlayerRecord]) {
    let mut totals = TeamTotals::default();
    for p in players {
        totals.add(p);
    }

    html.push_str(&format!(
        "<div class=\"team\"><div class=\"team-head {class}\"><span class=\"team-name\">{}</span>\
         <span class=\"team-score\">{}</span></div>\n",
        escape_html(title),
        totals.score,
    ));
    push_table_head(html);
    for p in players {
        push_player_row(html, p);
    }
    push_totals_row(html, title, &totals);
    html.push_str("</tbody></table></div>\n");
}

/// Build the full HTML document for a match.
///
/// Team games get a Blue and a Red table plus an "Other" table when any
/// player carries a team id beyond 1. Free-for-all games get one table with
/// every player, ordered by score.
pub fn match_document(record: &MatchRecord) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    html.push_str("<title>Post Game Carnage Report</title>\n<style>");
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n<div class=\"panel\">\n");

    html.push_str(&format!(
        "<div class=\"header\"><div><div class=\"kicker\">Post Game Carnage Report</div>\
         <div class=\"map\">{}</div><div class=\"meta\">{} // ID: {}</div></div>\
         <div class=\"when\"><div class=\"kicker\">Date Played</div>\
         <div class=\"date\">{}</div><div class=\"time\">{}</div></div></div>\n",
        escape_html(&record.map_name),
        escape_html(&record.mode_name),
        escape_html(&record.match_id),
        record.played_at.format("%Y-%m-%d"),
        record.played_at.format("%H:%M:%S"),
    ));

    html.push_str("<div class=\"body\">\n");
    if record.teams_enabled {
        let outcome = winner(record);
        let banner_class = match outcome {
            TeamOutcome::Winner(team) => css_class(team),
            TeamOutcome::Draw => "draw",
        };
        html.push_str(&format!(
            "<div class=\"banner {}\">{}</div>\n",
            banner_class,
            escape_html(&banner_text(outcome)),
        ));

        for team in [Team::Blue, Team::Red] {
            let players = record.players_on_team(team.id());
            push_section(&mut html, css_class(team), &team.label(), &players);
        }

        let others: Vec<&PlayerRecord> = record.players.iter().filter(|p| p.team_id > 1).collect();
        if !others.is_empty() {
            push_section(&mut html, "other", "Other", &others);
        }
    } else {
        push_section(&mut html, "other", "Players", &record.players_by_score());
    }
    html.push_str("</div>\n");

    html.push_str(&format!(
        "<div class=\"footer\">Carnage Relay // H3MCC // {}</div>\n",
        escape_html(&record.mode_name)
    ));
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

#[cfg(test)]
#[path = "tests/document_tests.rs"]
mod tests;
