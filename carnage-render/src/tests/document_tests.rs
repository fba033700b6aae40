use super::*;
use chrono::NaiveDate;

fn player(name: &str, team_id: u32, kills: u32, deaths: u32, score: u32) -> PlayerRecord {
    PlayerRecord {
        display_name: name.to_string(),
        team_id,
        kills,
        deaths,
        score,
        ..PlayerRecord::default()
    }
}

fn team_match(players: Vec<PlayerRecord>) -> MatchRecord {
    MatchRecord {
        match_id: "777".to_string(),
        map_name: "Guardian".to_string(),
        mode_name: "Team Slayer".to_string(),
        is_ranked: true,
        teams_enabled: true,
        played_at: NaiveDate::from_ymd_opt(2026, 1, 20)
            .unwrap()
            .and_hms_opt(18, 14, 4)
            .unwrap(),
        game_enum: 3,
        hopper_name: "Team Doubles".to_string(),
        players,
    }
}

#[test]
fn test_escape_html() {
    assert_eq!(escape_html("Tom & Jerry"), "Tom &amp; Jerry");
    assert_eq!(escape_html("<script>"), "&lt;script&gt;");
    assert_eq!(escape_html(r#"a"b'c"#), "a&quot;b&#39;c");
}

#[test]
fn test_kd_columns_use_two_decimals() {
    let html = match_document(&team_match(vec![
        player("Alpha", 0, 7, 0, 10),
        player("Bravo", 0, 3, 4, 5),
        player("Charlie", 1, 1, 3, 2),
    ]));
    assert!(html.contains("<td>7.00</td>"));
    assert!(html.contains("<td>0.75</td>"));
    assert!(html.contains("<td>0.33</td>"));
    // Blue totals: 10 kills over 4 deaths.
    assert!(html.contains("<td>2.50</td>"));
}

#[test]
fn test_header_shows_map_mode_and_time() {
    let html = match_document(&team_match(vec![player("Alpha", 0, 5, 1, 5)]));
    assert!(html.contains("Guardian"));
    assert!(html.contains("Team Slayer"));
    assert!(html.contains("2026-01-20"));
    assert!(html.contains("18:14:04"));
}

#[test]
fn test_higher_score_wins_not_kills() {
    // Red has more kills, Blue has more score.
    let record = team_match(vec![
        player("Alpha", 0, 5, 10, 30),
        player("Bravo", 1, 25, 2, 20),
    ]);
    let html = match_document(&record);
    assert!(html.contains("Blue Team Victory"));
    assert!(!html.contains("Red Team Victory"));
}

#[test]
fn test_tied_score_is_draw() {
    let record = team_match(vec![
        player("Alpha", 0, 5, 1, 10),
        player("Bravo", 1, 8, 3, 10),
    ]);
    let html = match_document(&record);
    assert!(html.contains(">Draw<"));
    assert!(!html.contains("Victory"));
}

#[test]
fn test_totals_rows_sum_team_members() {
    let record = team_match(vec![
        player("Alpha", 0, 10, 2, 10),
        player("Charlie", 0, 6, 4, 6),
        player("Bravo", 1, 3, 9, 3),
    ]);
    let html = match_document(&record);
    // Blue: 16 kills / 6 deaths
    assert!(html.contains("BLUE TOTALS</td><td>16</td><td class=\"score\">16</td><td>6</td>"));
    assert!(html.contains("2.67"));
    assert!(html.contains("RED TOTALS</td><td>3</td>"));
}

#[test]
fn test_other_team_gets_its_own_table() {
    let record = team_match(vec![
        player("Alpha", 0, 1, 1, 1),
        player("Bravo", 1, 1, 1, 1),
        player("Zulu", 5, 1, 1, 1),
    ]);
    let html = match_document(&record);
    assert!(html.contains("OTHER TOTALS"));
    assert!(html.contains("Zulu"));
}

#[test]
fn test_no_other_table_for_two_teams() {
    let record = team_match(vec![player("Alpha", 0, 1, 1, 1), player("Bravo", 1, 1, 1, 1)]);
    assert!(!match_document(&record).contains("OTHER TOTALS"));
}

#[test]
fn test_free_for_all_single_table_by_score() {
    let mut record = team_match(vec![
        player("Low", 0, 1, 1, 2),
        player("High", 3, 1, 1, 9),
    ]);
    record.teams_enabled = false;
    let html = match_document(&record);

    assert!(html.contains("PLAYERS TOTALS"));
    assert!(!html.contains("BLUE TOTALS"));
    assert!(!html.contains("Victory"));
    let high = html.find("High").unwrap();
    let low = html.find("Low").unwrap();
    assert!(high < low);
}

#[test]
fn test_player_strings_are_escaped() {
    let mut p = player("<b>x</b>", 0, 1, 1, 1);
    p.clan_tag = "A&B".to_string();
    let html = match_document(&team_match(vec![p]));
    assert!(!html.contains("<b>x</b>"));
    assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
    assert!(html.contains("Service Tag: A&amp;B"));
}

#[test]
fn test_service_tag_falls_back_to_na() {
    let html = match_document(&team_match(vec![player("Alpha", 0, 1, 1, 1)]));
    assert!(html.contains("Service Tag: N/A"));
}

#[test]
fn test_empty_match_renders() {
    let html = match_document(&team_match(Vec::new()));
    assert!(html.contains(">Draw<"));
    assert!(html.ends_with("</html>\n"));
}
