mod common;

use common::{test_hub, TestClient};
use uuid::Uuid;

use domain::models::draft::{DraftMode, Side};
use websocket::draft_room::{DraftRoomConfig, RoomHandle, RoomPlayer, RoomRequest};

fn duel_config(timer_ms: u64) -> DraftRoomConfig {
    DraftRoomConfig {
        id: Uuid::new_v4(),
        short_code: "DUELROOM".to_string(),
        timer_ms,
        mode: DraftMode::ProPlay,
        roster: None,
        fearless_bans: Vec::new(),
    }
}

async fn join(room: &RoomHandle, side: Option<Side>) -> TestClient {
    let user_id = Uuid::new_v4();
    let (mut client, tx) = TestClient::new(user_id);
    room.join(client.connection_id, user_id, side, tx)
        .await
        .unwrap();
    client.draft_state().await;
    client
}

async fn start_duel(room: &RoomHandle, blue: &mut TestClient, red: &mut TestClient) {
    room.request(RoomRequest::SetReady {
        connection_id: blue.connection_id,
        ready: true,
    })
    .await;
    room.request(RoomRequest::SetReady {
        connection_id: red.connection_id,
        ready: true,
    })
    .await;
    room.request(RoomRequest::StartDraft {
        connection_id: blue.connection_id,
    })
    .await;
    blue.draft_event("draft_started").await;
    red.draft_event("draft_started").await;
    // Consume the phase-zero announcement so later finds see fresh phases.
    blue.draft_event("phase_changed").await;
    red.draft_event("phase_changed").await;
}

async fn select_and_lock(room: &RoomHandle, client: &mut TestClient, champion: &str) {
    room.request(RoomRequest::Select {
        connection_id: client.connection_id,
        champion_id: champion.to_string(),
    })
    .await;
    client.draft_event("champion_hovered").await;
    room.request(RoomRequest::LockIn {
        connection_id: client.connection_id,
    })
    .await;
    client.draft_event("champion_selected").await;
}

async fn sync(room: &RoomHandle, client: &mut TestClient) -> serde_json::Value {
    room.request(RoomRequest::SyncState {
        connection_id: client.connection_id,
    })
    .await;
    client.draft_state().await
}

#[tokio::test]
async fn test_ban_dedup_and_turn_advance() {
    let hub = test_hub();
    let room = hub.create_draft_room(duel_config(30_000)).unwrap();
    let mut blue = join(&room, Some(Side::Blue)).await;
    let mut red = join(&room, Some(Side::Red)).await;
    start_duel(&room, &mut blue, &mut red).await;

    select_and_lock(&room, &mut blue, "Aatrox").await;
    let phase = red.draft_event("phase_changed").await;
    assert_eq!(phase["payload"]["phase_index"], 1);
    assert_eq!(phase["payload"]["team"], "red");

    // The same champion cannot be selected by the other side.
    room.request(RoomRequest::Select {
        connection_id: red.connection_id,
        champion_id: "Aatrox".to_string(),
    })
    .await;
    red.draft_err("CHAMPION_UNAVAILABLE").await;

    let state = sync(&room, &mut blue).await;
    assert_eq!(state["payload"]["blue_bans"], serde_json::json!(["Aatrox"]));
    assert_eq!(state["payload"]["phase_index"], 1);
    assert_eq!(state["payload"]["current_team"], "red");
    assert_eq!(state["payload"]["current_action"], "ban");
}

#[tokio::test]
async fn test_double_lock_in_advances_once() {
    let hub = test_hub();
    let room = hub.create_draft_room(duel_config(30_000)).unwrap();
    let mut blue = join(&room, Some(Side::Blue)).await;
    let mut red = join(&room, Some(Side::Red)).await;
    start_duel(&room, &mut blue, &mut red).await;

    select_and_lock(&room, &mut blue, "Zed").await;
    room.request(RoomRequest::LockIn {
        connection_id: blue.connection_id,
    })
    .await;
    blue.draft_err("NOT_YOUR_TURN").await;

    let state = sync(&room, &mut blue).await;
    assert_eq!(state["payload"]["phase_index"], 1);
}

#[tokio::test]
async fn test_non_captain_cannot_act_in_team_mode() {
    let hub = test_hub();
    let captain_blue = Uuid::new_v4();
    let captain_red = Uuid::new_v4();
    let grunt_blue = Uuid::new_v4();

    let mut roster = Vec::new();
    for (i, user_id) in [captain_blue, grunt_blue].into_iter().enumerate() {
        roster.push(RoomPlayer {
            user_id,
            display_name: format!("blue-{i}"),
            team: Side::Blue,
            role: None,
            captain: i == 0,
        });
    }
    roster.push(RoomPlayer {
        user_id: captain_red,
        display_name: "red-0".to_string(),
        team: Side::Red,
        role: None,
        captain: true,
    });

    let config = DraftRoomConfig {
        id: Uuid::new_v4(),
        short_code: "TEAMROOM".to_string(),
        timer_ms: 30_000,
        mode: DraftMode::ProPlay,
        roster: Some(roster),
        fearless_bans: Vec::new(),
    };
    let room = hub.create_draft_room(config).unwrap();

    let (mut blue_cap, tx) = TestClient::new(captain_blue);
    room.join(blue_cap.connection_id, captain_blue, None, tx)
        .await
        .unwrap();
    let (mut red_cap, tx) = TestClient::new(captain_red);
    room.join(red_cap.connection_id, captain_red, None, tx)
        .await
        .unwrap();
    let (mut grunt, tx) = TestClient::new(grunt_blue);
    room.join(grunt.connection_id, grunt_blue, None, tx)
        .await
        .unwrap();
    start_duel(&room, &mut blue_cap, &mut red_cap).await;

    // A non-captain teammate cannot select during blue's ban.
    room.request(RoomRequest::Select {
        connection_id: grunt.connection_id,
        champion_id: "Aatrox".to_string(),
    })
    .await;
    grunt.draft_err("NOT_YOUR_TURN").await;

    let state = sync(&room, &mut blue_cap).await;
    assert_eq!(state["payload"]["blue_bans"], serde_json::json!([]));
    assert_eq!(state["payload"]["phase_index"], 0);

    // The captain can.
    select_and_lock(&room, &mut blue_cap, "Aatrox").await;
}

#[tokio::test(start_paused = true)]
async fn test_timer_expiry_auto_advances_ban() {
    let hub = test_hub();
    let room = hub.create_draft_room(duel_config(5_000)).unwrap();
    let mut blue = join(&room, Some(Side::Blue)).await;
    let mut red = join(&room, Some(Side::Red)).await;
    start_duel(&room, &mut blue, &mut red).await;

    // Nobody acts: duration + buffer elapses.
    tokio::time::sleep(tokio::time::Duration::from_millis(11_000)).await;

    let selected = red.draft_event("champion_selected").await;
    assert_eq!(selected["payload"]["champion_id"], "None");
    assert_eq!(selected["payload"]["action_type"], "ban");
    let phase = red.draft_event("phase_changed").await;
    assert_eq!(phase["payload"]["phase_index"], 1);
    assert_eq!(phase["payload"]["team"], "red");
}

#[tokio::test(start_paused = true)]
async fn test_timer_expiry_auto_picks_random_champion() {
    let hub = test_hub();
    let room = hub.create_draft_room(duel_config(5_000)).unwrap();
    let mut blue = join(&room, Some(Side::Blue)).await;
    let mut red = join(&room, Some(Side::Red)).await;
    start_duel(&room, &mut blue, &mut red).await;

    // Let the six ban phases and the first pick phase time out.
    for _ in 0..7 {
        tokio::time::sleep(tokio::time::Duration::from_millis(11_000)).await;
    }
    for _ in 0..6 {
        let selected = blue.draft_event("champion_selected").await;
        assert_eq!(selected["payload"]["action_type"], "ban");
        assert_eq!(selected["payload"]["champion_id"], "None");
    }
    // Phase 6 is blue's first pick: the auto-pick draws a real champion.
    let selected = blue.draft_event("champion_selected").await;
    assert_eq!(selected["payload"]["action_type"], "pick");
    let champion = selected["payload"]["champion_id"].as_str().unwrap();
    assert_ne!(champion, "None");
    assert!(common::CHAMPIONS.contains(&champion));
}

#[tokio::test(start_paused = true)]
async fn test_lock_in_during_buffer_commits_selection() {
    let hub = test_hub();
    let room = hub.create_draft_room(duel_config(2_000)).unwrap();
    let mut blue = join(&room, Some(Side::Blue)).await;
    let mut red = join(&room, Some(Side::Red)).await;
    start_duel(&room, &mut blue, &mut red).await;

    // Elapsed is past the duration but inside the 5 s buffer.
    tokio::time::sleep(tokio::time::Duration::from_millis(3_000)).await;
    select_and_lock(&room, &mut blue, "Ahri").await;

    let state = sync(&room, &mut blue).await;
    assert_eq!(state["payload"]["blue_bans"], serde_json::json!(["Ahri"]));
    assert_eq!(state["payload"]["phase_index"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_edit_resume_roundtrip() {
    let hub = test_hub();
    let room = hub.create_draft_room(duel_config(30_000)).unwrap();
    let mut blue = join(&room, Some(Side::Blue)).await;
    let mut red = join(&room, Some(Side::Red)).await;
    start_duel(&room, &mut blue, &mut red).await;

    // Complete the first ban phase: B R B R B R.
    let bans = ["Aatrox", "Ahri", "Akali", "Ashe", "Azir", "Caitlyn"];
    for (i, champion) in bans.iter().enumerate() {
        if i % 2 == 0 {
            select_and_lock(&room, &mut blue, champion).await;
        } else {
            select_and_lock(&room, &mut red, champion).await;
        }
    }

    room.request(RoomRequest::Pause {
        connection_id: blue.connection_id,
    })
    .await;
    let paused = blue.draft_event("draft_paused").await;
    let frozen = paused["payload"]["frozen_remaining_ms"].as_u64().unwrap();
    assert!(frozen <= 30_000);

    // Blue proposes replacing its first ban; red confirms.
    room.request(RoomRequest::ProposeEdit {
        connection_id: blue.connection_id,
        slot: domain::models::pending_edit::EditSlot {
            kind: domain::models::draft::PhaseAction::Ban,
            team: Side::Blue,
            index: 0,
        },
        champion_id: "Zed".to_string(),
    })
    .await;
    red.draft_event("edit_proposed").await;
    room.request(RoomRequest::RespondEdit {
        connection_id: red.connection_id,
        accept: true,
    })
    .await;
    let applied = blue.draft_event("edit_applied").await;
    assert_eq!(applied["payload"]["old_champion_id"], "Aatrox");
    assert_eq!(applied["payload"]["new_champion_id"], "Zed");

    let state = sync(&room, &mut blue).await;
    assert_eq!(
        state["payload"]["blue_bans"],
        serde_json::json!(["Zed", "Akali", "Azir"])
    );
    assert_eq!(
        state["payload"]["red_bans"],
        serde_json::json!(["Ahri", "Ashe", "Caitlyn"])
    );
    assert_eq!(state["payload"]["status"], "paused");
    assert!(state["payload"]["pending_edit"].is_null());

    // Both sides ready up; the countdown runs and the draft resumes.
    room.request(RoomRequest::ResumeReady {
        connection_id: blue.connection_id,
        ready: true,
    })
    .await;
    room.request(RoomRequest::ResumeReady {
        connection_id: red.connection_id,
        ready: true,
    })
    .await;
    let countdown = blue.draft_event("resume_countdown").await;
    assert_eq!(countdown["payload"]["seconds"], 5);
    let resumed = blue.draft_event("draft_resumed").await;
    assert_eq!(resumed["payload"]["reason"], "both players ready");

    // The timer restarts from the frozen remaining; the phase is unchanged.
    let tick = blue
        .find("restarted timer tick", |v| v["type"] == "TIMER")
        .await;
    assert_eq!(tick["payload"]["remaining_ms"].as_u64().unwrap(), frozen);
    let state = sync(&room, &mut blue).await;
    assert_eq!(state["payload"]["phase_index"], 6);
    assert_eq!(state["payload"]["status"], "in_progress");
}

#[tokio::test(start_paused = true)]
async fn test_unready_cancels_resume_countdown() {
    let hub = test_hub();
    let room = hub.create_draft_room(duel_config(30_000)).unwrap();
    let mut blue = join(&room, Some(Side::Blue)).await;
    let mut red = join(&room, Some(Side::Red)).await;
    start_duel(&room, &mut blue, &mut red).await;

    room.request(RoomRequest::Pause {
        connection_id: red.connection_id,
    })
    .await;
    blue.draft_event("draft_paused").await;

    for client in [&blue, &red] {
        room.request(RoomRequest::ResumeReady {
            connection_id: client.connection_id,
            ready: false,
        })
        .await;
    }
    room.request(RoomRequest::ResumeReady {
        connection_id: blue.connection_id,
        ready: true,
    })
    .await;
    room.request(RoomRequest::ResumeReady {
        connection_id: red.connection_id,
        ready: true,
    })
    .await;
    let countdown = blue.draft_event("resume_countdown").await;
    assert_eq!(countdown["payload"]["seconds"], 5);

    room.request(RoomRequest::ResumeReady {
        connection_id: red.connection_id,
        ready: false,
    })
    .await;
    let cancelled = blue
        .find("cancelled countdown", |v| {
            v["type"] == "EVENT"
                && v["event"] == "resume_countdown"
                && v["payload"]["seconds"] == 0
        })
        .await;
    assert_eq!(cancelled["payload"]["cancelled_by"], "red");

    // Still paused, both flags cleared.
    let state = sync(&room, &mut blue).await;
    assert_eq!(state["payload"]["status"], "paused");
    assert_eq!(state["payload"]["pause"]["blue_resume_ready"], false);
    assert_eq!(state["payload"]["pause"]["red_resume_ready"], false);
}

#[tokio::test(start_paused = true)]
async fn test_edit_expires_with_timeout_reason() {
    let hub = test_hub();
    let room = hub.create_draft_room(duel_config(30_000)).unwrap();
    let mut blue = join(&room, Some(Side::Blue)).await;
    let mut red = join(&room, Some(Side::Red)).await;
    start_duel(&room, &mut blue, &mut red).await;
    select_and_lock(&room, &mut blue, "Aatrox").await;

    room.request(RoomRequest::Pause {
        connection_id: blue.connection_id,
    })
    .await;
    blue.draft_event("draft_paused").await;
    room.request(RoomRequest::ProposeEdit {
        connection_id: blue.connection_id,
        slot: domain::models::pending_edit::EditSlot {
            kind: domain::models::draft::PhaseAction::Ban,
            team: Side::Blue,
            index: 0,
        },
        champion_id: "Zed".to_string(),
    })
    .await;
    red.draft_event("edit_proposed").await;

    tokio::time::sleep(tokio::time::Duration::from_secs(31)).await;
    let rejected = red.draft_event("edit_rejected").await;
    assert_eq!(rejected["payload"]["reason"], "timeout");

    // The slot is untouched.
    let state = sync(&room, &mut red).await;
    assert_eq!(state["payload"]["blue_bans"], serde_json::json!(["Aatrox"]));
}

#[tokio::test(start_paused = true)]
async fn test_pause_auto_resumes_after_deadline() {
    let hub = test_hub();
    let room = hub.create_draft_room(duel_config(30_000)).unwrap();
    let mut blue = join(&room, Some(Side::Blue)).await;
    let mut red = join(&room, Some(Side::Red)).await;
    start_duel(&room, &mut blue, &mut red).await;

    room.request(RoomRequest::Pause {
        connection_id: blue.connection_id,
    })
    .await;
    red.draft_event("draft_paused").await;

    tokio::time::sleep(tokio::time::Duration::from_secs(301)).await;
    let resumed = red.draft_event("draft_resumed").await;
    assert_eq!(resumed["payload"]["reason"], "system timeout");
}

#[tokio::test]
async fn test_requested_side_taken_demotes_to_spectator() {
    let hub = test_hub();
    let room = hub.create_draft_room(duel_config(30_000)).unwrap();
    let _blue = join(&room, Some(Side::Blue)).await;

    let user_id = Uuid::new_v4();
    let (mut latecomer, tx) = TestClient::new(user_id);
    let seat = room
        .join(latecomer.connection_id, user_id, Some(Side::Blue), tx)
        .await
        .unwrap();
    assert_eq!(seat, websocket::messages::SeatSide::Spectator);
    latecomer.draft_err("SIDE_TAKEN").await;

    // Spectators cannot ready up.
    room.request(RoomRequest::SetReady {
        connection_id: latecomer.connection_id,
        ready: true,
    })
    .await;
    latecomer.draft_err("UNAUTHORIZED").await;
}

#[tokio::test]
async fn test_pending_obligations_for_user() {
    let hub = test_hub();
    let room = hub.create_draft_room(duel_config(30_000)).unwrap();
    let mut blue = join(&room, Some(Side::Blue)).await;
    let mut red = join(&room, Some(Side::Red)).await;

    // No obligations before start.
    assert!(hub
        .pending_draft_actions_for_user(blue.user_id)
        .await
        .is_empty());

    start_duel(&room, &mut blue, &mut red).await;
    let obligations = hub.pending_draft_actions_for_user(blue.user_id).await;
    assert_eq!(obligations.len(), 1);
    assert_eq!(obligations[0].room_id, room.id);
    assert!(hub
        .pending_draft_actions_for_user(red.user_id)
        .await
        .is_empty());
}

#[tokio::test]
async fn test_duplicate_room_id_is_rejected() {
    let hub = test_hub();
    let config = duel_config(30_000);
    let duplicate = DraftRoomConfig {
        short_code: "OTHER123".to_string(),
        ..config.clone()
    };
    hub.create_draft_room(config).unwrap();
    assert!(hub.create_draft_room(duplicate).is_err());
}
