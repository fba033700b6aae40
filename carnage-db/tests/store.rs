use std::sync::Arc;

use carnage_core::{MatchRecord, PlayerRecord};
use carnage_db::{DedupeStore, MatchStore};
use chrono::NaiveDate;

fn record(id: &str) -> MatchRecord {
    MatchRecord {
        match_id: id.to_string(),
        map_name: "Valhalla".to_string(),
        mode_name: "Slayer".to_string(),
        is_ranked: false,
        teams_enabled: false,
        played_at: NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
        game_enum: 0,
        hopper_name: "Unknown".to_string(),
        players: vec![PlayerRecord::unknown(), PlayerRecord::unknown()],
    }
}

#[test]
fn dedupe_store_never_seen_is_false() {
    let store = MatchStore::in_memory().unwrap();
    assert!(!store.exists("never").unwrap());
}

#[test]
fn persisting_twice_matches_persisting_once() {
    let store = MatchStore::in_memory().unwrap();
    let m = record("m1");

    for _ in 0..2 {
        store.upsert_game(&m).unwrap();
        store.upsert_players(&m.match_id, &m.players).unwrap();
        store.mark_processed(&m.match_id, Some("a.xml")).unwrap();
    }

    let stats = store.stats().unwrap();
    assert_eq!(stats.games, 1);
    assert_eq!(stats.players, 2);
    assert_eq!(stats.processed, 1);
    assert!(store.exists("m1").unwrap());
    assert!(store.game_exists("m1").unwrap());
}

#[test]
fn concurrent_writers_for_same_match_leave_one_row() {
    let store = Arc::new(MatchStore::in_memory().unwrap());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let m = record("shared");
                store.upsert_game(&m).unwrap();
                store.upsert_players(&m.match_id, &m.players).unwrap();
                store.mark_processed(&m.match_id, None).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stats = store.stats().unwrap();
    assert_eq!(stats.games, 1);
    assert_eq!(stats.players, 2);
    assert_eq!(stats.processed, 1);
}

#[test]
fn file_backed_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("matches.db");
    {
        let store = MatchStore::open(&path).unwrap();
        store.mark_processed("persisted", Some("r.xml")).unwrap();
        store.record_delivery("persisted", "delivered", "failed", true).unwrap();
    }

    let store = MatchStore::open(&path).unwrap();
    assert!(store.exists("persisted").unwrap());
    let rec = store.processing_record("persisted").unwrap().unwrap();
    assert_eq!(rec.session_status, "failed");
    assert_eq!(store.recent_games(5).unwrap().len(), 0);
    assert!(store.players_for_game("persisted").unwrap().is_empty());
}
