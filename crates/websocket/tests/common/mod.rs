use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use domain::collaborators::{ChampionCatalog, TeamGenerator, UserDirectory, UserProfile};
use domain::errors::DomainResult;
use domain::models::draft::{DraftMode, Side};
use domain::models::match_option::{Assignment, MatchOption};
use domain::models::player::{LobbyPlayer, Role};
use websocket::hub::Hub;

pub const CHAMPIONS: [&str; 24] = [
    "Aatrox", "Ahri", "Akali", "Ashe", "Azir", "Caitlyn", "Darius", "Ezreal", "Gnar", "Jinx",
    "KSante", "Leona", "Lux", "Nautilus", "Orianna", "Renekton", "Sett", "Syndra", "Thresh",
    "Varus", "Vi", "Yone", "Zed", "Zeri",
];

pub struct StaticCatalog;

impl ChampionCatalog for StaticCatalog {
    fn list(&self) -> Vec<String> {
        CHAMPIONS.iter().map(|c| c.to_string()).collect()
    }
}

pub struct TestDirectory;

#[async_trait]
impl UserDirectory for TestDirectory {
    async fn lookup(&self, user_id: Uuid) -> UserProfile {
        UserProfile {
            display_name: format!("user-{}", &user_id.to_string()[..8]),
        }
    }
}

/// Deterministic generator: option 1 splits by join order (first five blue),
/// option 2 is the mirror image.
pub struct SplitGenerator;

#[async_trait]
impl TeamGenerator for SplitGenerator {
    async fn generate(
        &self,
        players: &[LobbyPlayer],
        _mode: DraftMode,
    ) -> DomainResult<Vec<MatchOption>> {
        let mut sorted: Vec<&LobbyPlayer> = players.iter().collect();
        sorted.sort_by_key(|p| p.join_order);

        let assignments: Vec<Assignment> = sorted
            .iter()
            .enumerate()
            .map(|(i, p)| Assignment {
                user_id: p.user_id,
                team: if i < 5 { Side::Blue } else { Side::Red },
                role: Role::ALL[i % 5],
                role_mmr: 1400 + (i as i32) * 10,
                comfort: 0.6,
            })
            .collect();

        let mut mirrored = assignments.clone();
        for a in &mut mirrored {
            a.team = a.team.opposite();
        }

        let build = |option_number: u32, assignments: Vec<Assignment>| MatchOption {
            option_number,
            algorithm: "split".to_string(),
            blue_avg_mmr: 1420.0,
            red_avg_mmr: 1470.0,
            blue_avg_comfort: 0.6,
            red_avg_comfort: 0.6,
            mmr_difference: 50.0,
            balance_score: 0.8,
            max_lane_diff: 50,
            assignments,
        };
        Ok(vec![build(1, assignments), build(2, mirrored)])
    }
}

pub fn test_hub() -> Arc<Hub> {
    Hub::new(
        Arc::new(TestDirectory),
        Arc::new(StaticCatalog),
        Arc::new(SplitGenerator),
        None,
    )
}

/// A fake connected client: holds the receiving half of the outbound buffer
/// the server writes into.
pub struct TestClient {
    pub connection_id: Uuid,
    pub user_id: Uuid,
    pub rx: mpsc::Receiver<String>,
}

impl TestClient {
    pub fn new(user_id: Uuid) -> (Self, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel(256);
        (
            Self {
                connection_id: Uuid::new_v4(),
                user_id,
                rx,
            },
            tx,
        )
    }

    pub async fn next(&mut self) -> Value {
        let frame = self
            .rx
            .recv()
            .await
            .expect("server closed the client channel");
        serde_json::from_str(&frame).expect("server sent invalid JSON")
    }

    /// Read frames until one matches, discarding the rest (timer ticks and
    /// unrelated events). Panics after a bounded number of frames.
    pub async fn find(&mut self, what: &str, pred: impl Fn(&Value) -> bool) -> Value {
        for _ in 0..500 {
            let frame = self.next().await;
            if pred(&frame) {
                return frame;
            }
        }
        panic!("never received {what}");
    }

    pub async fn draft_event(&mut self, name: &str) -> Value {
        self.find(name, |v| v["type"] == "EVENT" && v["event"] == name)
            .await
    }

    pub async fn draft_err(&mut self, code: &str) -> Value {
        self.find(code, |v| v["type"] == "ERR" && v["code"] == code)
            .await
    }

    pub async fn draft_state(&mut self) -> Value {
        self.find("STATE", |v| v["type"] == "STATE").await
    }

    pub async fn lobby_msg(&mut self, name: &str) -> Value {
        self.find(name, |v| v["type"] == name).await
    }
}
