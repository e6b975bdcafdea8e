//! Duel pairing and the deterministic payoff table.

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::state::{
    games::penalty::Penalties,
    session::{Player, PlayerId},
};

/// Sips the cooperator drinks after being exploited.
const EXPLOITED_SIPS: u32 = 1;

/// A duelist's secret choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    /// Share the pot.
    Cooperate,
    /// Try to take the pot.
    Defect,
}

/// Two players facing each other in a duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    /// First duelist.
    pub player_a: PlayerId,
    /// Second duelist.
    pub player_b: PlayerId,
}

impl Pairing {
    /// Whether `id` is one of the duelists.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.player_a == id || self.player_b == id
    }

    /// Replace a duelist id in place.
    pub fn replace(&mut self, old: PlayerId, new: PlayerId) {
        if self.player_a == old {
            self.player_a = new;
        }
        if self.player_b == old {
            self.player_b = new;
        }
    }
}

/// Points and penalties resulting from one duel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelOutcome {
    /// Points won by the first duelist.
    pub points_a: u32,
    /// Points won by the second duelist.
    pub points_b: u32,
    /// Sips owed by the first duelist.
    pub sips_a: u32,
    /// Sips owed by the second duelist.
    pub sips_b: u32,
    /// Players who have to drink, in duel order.
    pub drinkers: Vec<PlayerId>,
}

/// Whether a player can be drawn into a duel.
pub fn is_eligible(player: &Player) -> bool {
    !player.disconnected && !player.display_name.trim().is_empty()
}

/// Pick two distinct eligible players uniformly at random.
///
/// The whole candidate list is shuffled before taking the first two entries. Returns
/// `None` when fewer than two players are eligible; the caller decides what to do.
pub fn pair<R>(participants: &[Player], rng: &mut R) -> Option<Pairing>
where
    R: Rng + ?Sized,
{
    let mut candidates: Vec<PlayerId> = participants
        .iter()
        .filter(|player| is_eligible(player))
        .map(|player| player.id)
        .collect();

    if candidates.len() < 2 {
        return None;
    }

    candidates.shuffle(rng);
    Some(Pairing {
        player_a: candidates[0],
        player_b: candidates[1],
    })
}

/// Score one duel from both choices and the payoffs currently in effect.
pub fn score(pairing: Pairing, choice_a: Choice, choice_b: Choice, payoffs: &Penalties) -> DuelOutcome {
    match (choice_a, choice_b) {
        (Choice::Cooperate, Choice::Cooperate) => DuelOutcome {
            points_a: payoffs.both_cooperate,
            points_b: payoffs.both_cooperate,
            sips_a: 0,
            sips_b: 0,
            drinkers: Vec::new(),
        },
        (Choice::Defect, Choice::Defect) => DuelOutcome {
            points_a: 0,
            points_b: 0,
            sips_a: payoffs.both_defect,
            sips_b: payoffs.both_defect,
            drinkers: vec![pairing.player_a, pairing.player_b],
        },
        (Choice::Cooperate, Choice::Defect) => DuelOutcome {
            points_a: 0,
            points_b: payoffs.mixed,
            sips_a: EXPLOITED_SIPS,
            sips_b: 0,
            drinkers: vec![pairing.player_a],
        },
        (Choice::Defect, Choice::Cooperate) => DuelOutcome {
            points_a: payoffs.mixed,
            points_b: 0,
            sips_a: 0,
            sips_b: EXPLOITED_SIPS,
            drinkers: vec![pairing.player_b],
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};
    use uuid::Uuid;

    use super::*;
    use crate::state::games::penalty::penalties;

    fn player(name: &str) -> Player {
        Player::new(Uuid::new_v4(), name.to_string())
    }

    #[test]
    fn pair_requires_two_eligible_players() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut host = player("Alice");
        assert!(pair(std::slice::from_ref(&host), &mut rng).is_none());

        let bob = player("Bob");
        host.disconnected = true;
        assert!(pair(&[host, bob], &mut rng).is_none());
    }

    #[test]
    fn pair_covers_every_combination() {
        let mut rng = StdRng::seed_from_u64(42);
        let players = vec![player("A"), player("B"), player("C")];
        let mut seen = HashSet::new();
        for _ in 0..300 {
            let pairing = pair(&players, &mut rng).unwrap();
            assert_ne!(pairing.player_a, pairing.player_b);
            let mut key = [pairing.player_a, pairing.player_b];
            key.sort();
            seen.insert(key);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn exploited_cooperator_drinks() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let pairing = Pairing {
            player_a: alice,
            player_b: bob,
        };
        let outcome = score(pairing, Choice::Cooperate, Choice::Defect, &penalties(&[]));
        assert_eq!(outcome.points_a, 0);
        assert_eq!(outcome.points_b, 5);
        assert_eq!(outcome.drinkers, vec![alice]);
    }

    #[test]
    fn symmetric_outcomes() {
        let pairing = Pairing {
            player_a: Uuid::new_v4(),
            player_b: Uuid::new_v4(),
        };
        let payoffs = penalties(&[]);

        let both_cooperate = score(pairing, Choice::Cooperate, Choice::Cooperate, &payoffs);
        assert_eq!((both_cooperate.points_a, both_cooperate.points_b), (3, 3));
        assert!(both_cooperate.drinkers.is_empty());

        let both_defect = score(pairing, Choice::Defect, Choice::Defect, &payoffs);
        assert_eq!((both_defect.points_a, both_defect.points_b), (0, 0));
        assert_eq!(both_defect.drinkers.len(), 2);
        assert_eq!(both_defect.sips_a, payoffs.both_defect);
    }
}
