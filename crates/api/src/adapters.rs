//! Reference implementations of the injected collaborators, so the binary
//! runs end-to-end in development. Production deployments swap these for
//! real identity, champion and matchmaking services.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use domain::collaborators::{
    AuthVerifier, ChampionCatalog, PersistenceHooks, TeamGenerator, UserDirectory, UserProfile,
    UNKNOWN_DISPLAY_NAME,
};
use domain::errors::{DomainError, DomainResult};
use domain::models::draft::{DraftMode, DraftResult, Side};
use domain::models::match_option::{Assignment, MatchOption};
use domain::models::player::{LobbyPlayer, Role};

/// Display names learned from dev tokens, keyed by user id.
pub struct InMemoryUserDirectory {
    names: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            names: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, user_id: Uuid, display_name: String) {
        self.names
            .write()
            .expect("directory lock")
            .insert(user_id, display_name);
    }
}

impl Default for InMemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn lookup(&self, user_id: Uuid) -> UserProfile {
        let display_name = self
            .names
            .read()
            .expect("directory lock")
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string());
        UserProfile { display_name }
    }
}

/// Accepts dev tokens of the form `<uuid>` or `<uuid>:<display name>`,
/// registering the display name as a side effect.
pub struct DevTokenVerifier {
    directory: Arc<InMemoryUserDirectory>,
}

impl DevTokenVerifier {
    pub fn new(directory: Arc<InMemoryUserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl AuthVerifier for DevTokenVerifier {
    async fn verify(&self, token: &str) -> DomainResult<Uuid> {
        let (id_part, name) = match token.split_once(':') {
            Some((id, name)) => (id, Some(name)),
            None => (token, None),
        };
        let user_id: Uuid = id_part
            .parse()
            .map_err(|_| DomainError::Unauthorized)?;
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            self.directory.register(user_id, name.to_string());
        }
        Ok(user_id)
    }
}

const DEFAULT_CHAMPIONS: [&str; 40] = [
    "Aatrox", "Ahri", "Akali", "Alistar", "Ashe", "Azir", "Caitlyn", "Camille", "Darius",
    "Ezreal", "Gnar", "Gragas", "Gwen", "Jax", "Jayce", "Jhin", "Jinx", "KSante", "KaiSa",
    "LeBlanc", "LeeSin", "Leona", "Lux", "Nautilus", "Orianna", "Rakan", "Renekton", "Rell",
    "Sejuani", "Senna", "Sett", "Syndra", "Thresh", "Varus", "Vi", "Viego", "Xayah", "Yone",
    "Zed", "Zeri",
];

pub struct StaticChampionCatalog {
    champions: Vec<String>,
}

impl StaticChampionCatalog {
    pub fn new(champions: Vec<String>) -> Self {
        Self { champions }
    }
}

impl Default for StaticChampionCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_CHAMPIONS.iter().map(|c| c.to_string()).collect())
    }
}

impl ChampionCatalog for StaticChampionCatalog {
    fn list(&self) -> Vec<String> {
        self.champions.clone()
    }
}

/// Deterministic stand-in for the external matchmaker: three candidate
/// compositions built from join order, with synthetic MMR figures.
pub struct JoinOrderTeamGenerator;

#[async_trait]
impl TeamGenerator for JoinOrderTeamGenerator {
    async fn generate(
        &self,
        players: &[LobbyPlayer],
        _mode: DraftMode,
    ) -> DomainResult<Vec<MatchOption>> {
        if players.len() != 10 {
            return Err(DomainError::MissingPlayers);
        }
        let mut sorted: Vec<&LobbyPlayer> = players.iter().collect();
        sorted.sort_by_key(|p| p.join_order);

        let mut options = Vec::new();
        for k in 0..3u32 {
            let assignments: Vec<Assignment> = sorted
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let rotated = (i + k as usize) % 10;
                    Assignment {
                        user_id: p.user_id,
                        team: if rotated < 5 { Side::Blue } else { Side::Red },
                        role: Role::ALL[rotated % 5],
                        role_mmr: 1200 + ((i * 17 + k as usize * 31) % 200) as i32,
                        comfort: 0.5 + ((i + k as usize) % 5) as f64 / 10.0,
                    }
                })
                .collect();

            let avg = |team: Side| {
                let mmrs: Vec<i32> = assignments
                    .iter()
                    .filter(|a| a.team == team)
                    .map(|a| a.role_mmr)
                    .collect();
                mmrs.iter().sum::<i32>() as f64 / mmrs.len() as f64
            };
            let comfort = |team: Side| {
                let values: Vec<f64> = assignments
                    .iter()
                    .filter(|a| a.team == team)
                    .map(|a| a.comfort)
                    .collect();
                values.iter().sum::<f64>() / values.len() as f64
            };

            let blue_avg_mmr = avg(Side::Blue);
            let red_avg_mmr = avg(Side::Red);
            options.push(MatchOption {
                option_number: k + 1,
                algorithm: "join_order".to_string(),
                blue_avg_mmr,
                red_avg_mmr,
                blue_avg_comfort: comfort(Side::Blue),
                red_avg_comfort: comfort(Side::Red),
                mmr_difference: (blue_avg_mmr - red_avg_mmr).abs(),
                balance_score: 1.0 / (1.0 + (blue_avg_mmr - red_avg_mmr).abs()),
                max_lane_diff: 100,
                assignments,
            });
        }
        Ok(options)
    }
}

/// Logs completed drafts and generated options instead of persisting them.
pub struct LoggingPersistenceHooks;

#[async_trait]
impl PersistenceHooks for LoggingPersistenceHooks {
    async fn on_draft_completed(&self, room_id: Uuid, result: &DraftResult) {
        info!(
            room_id = %room_id,
            blue_picks = ?result.blue_picks,
            red_picks = ?result.red_picks,
            "draft completed"
        );
    }

    async fn on_match_options_generated(&self, lobby_id: Uuid, options: &[MatchOption]) {
        info!(lobby_id = %lobby_id, count = options.len(), "match options generated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dev_token_verifier_registers_names() {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let verifier = DevTokenVerifier::new(directory.clone());

        let user_id = Uuid::new_v4();
        let verified = verifier
            .verify(&format!("{user_id}:Faker"))
            .await
            .unwrap();
        assert_eq!(verified, user_id);
        assert_eq!(directory.lookup(user_id).await.display_name, "Faker");

        // Bare uuid tokens verify without a name.
        assert!(verifier.verify(&user_id.to_string()).await.is_ok());
        assert!(verifier.verify("not-a-uuid").await.is_err());
    }

    #[tokio::test]
    async fn test_directory_sentinel_for_unknown() {
        let directory = InMemoryUserDirectory::new();
        let profile = directory.lookup(Uuid::new_v4()).await;
        assert_eq!(profile.display_name, UNKNOWN_DISPLAY_NAME);
    }

    #[tokio::test]
    async fn test_generator_produces_balanced_options() {
        let players: Vec<LobbyPlayer> = (0..10)
            .map(|i| LobbyPlayer::new(Uuid::new_v4(), format!("p{i}"), i))
            .collect();
        let options = JoinOrderTeamGenerator
            .generate(&players, DraftMode::ProPlay)
            .await
            .unwrap();
        assert_eq!(options.len(), 3);
        for option in &options {
            assert_eq!(option.assignments.len(), 10);
            assert_eq!(option.team_assignments(Side::Blue).count(), 5);
            assert_eq!(option.team_assignments(Side::Red).count(), 5);
            // Five distinct roles per team.
            for team in [Side::Blue, Side::Red] {
                let mut roles: Vec<Role> =
                    option.team_assignments(team).map(|a| a.role).collect();
                roles.sort_by_key(|r| r.to_string());
                roles.dedup();
                assert_eq!(roles.len(), 5);
            }
        }
    }

    #[tokio::test]
    async fn test_generator_requires_ten_players() {
        let players: Vec<LobbyPlayer> = (0..7)
            .map(|i| LobbyPlayer::new(Uuid::new_v4(), format!("p{i}"), i))
            .collect();
        let err = JoinOrderTeamGenerator
            .generate(&players, DraftMode::ProPlay)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::MissingPlayers);
    }
}
