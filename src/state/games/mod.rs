//! Game implementations and the pure helpers they share.

pub mod duel;
pub mod matchmaker;
pub mod penalty;
pub mod selector;
pub mod statements;
pub mod wheel;

#[cfg(test)]
pub(crate) mod testing {
    use rand::{SeedableRng, rngs::StdRng};
    use uuid::Uuid;

    use crate::{
        config::AppConfig,
        state::{phase::GameContext, session::Player},
    };

    /// Players, host and random source used to build a [`GameContext`] in tests.
    pub struct Table {
        pub players: Vec<Player>,
        pub config: AppConfig,
        pub rng: StdRng,
    }

    impl Table {
        pub fn with_players(names: &[&str]) -> Self {
            Self {
                players: names
                    .iter()
                    .map(|name| Player::new(Uuid::new_v4(), name.to_string()))
                    .collect(),
                config: AppConfig::default(),
                rng: StdRng::seed_from_u64(7),
            }
        }

        pub fn id(&self, name: &str) -> Uuid {
            self.players
                .iter()
                .find(|player| player.display_name == name)
                .map(|player| player.id)
                .unwrap()
        }

        pub fn host(&self) -> Uuid {
            self.players[0].id
        }

        pub fn ctx(&mut self) -> GameContext<'_> {
            GameContext {
                players: &self.players,
                host_id: self.players[0].id,
                config: &self.config,
                rng: &mut self.rng,
            }
        }
    }
}
