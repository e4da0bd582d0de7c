//! Standings derived from the shared per-question score history

use crate::challenge::models::{PlayerProgressEntry, Question};
use crate::core::message_types::Nemesis;

#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub rank: usize,
    pub nemesis: Option<Nemesis>,
}

/// Rank the player against everyone else in one history entry. Every other
/// player at or above `score` counts against the rank; the highest of them is
/// the nemesis.
pub fn standing(entry: Option<&PlayerProgressEntry>, player: &str, score: f64) -> Standing {
    let mut count = 0;
    let mut nemesis: Option<Nemesis> = None;

    if let Some(entry) = entry {
        for (name, &total) in &entry.question_metrics {
            if name == player || total < score {
                continue;
            }
            count += 1;
            let higher = nemesis.as_ref().map(|n| total > n.total_score).unwrap_or(true);
            if higher {
                nemesis = Some(Nemesis {
                    name: name.clone(),
                    total_score: total,
                    is_ghost: false,
                });
            }
        }
    }

    Standing {
        rank: count + 1,
        nemesis,
    }
}

/// A previous participation rebuilt from history
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Replay {
    pub answered: usize,
    pub score: f64,
    pub streak: u32,
}

/// Walk the history in order until the first entry without the player.
/// A rising score extends the streak, as does a question that awards no
/// points; anything else resets it.
pub fn replay_history(entries: &[PlayerProgressEntry], questions: &[Question], player: &str) -> Replay {
    let mut replay = Replay::default();
    let mut previous = 0.0;

    for (index, entry) in entries.iter().enumerate() {
        let current = match entry.question_metrics.get(player) {
            Some(&score) => score,
            None => break,
        };
        let points_question = questions
            .get(index)
            .map(Question::points_enabled)
            .unwrap_or(true);

        if current > previous || !points_question {
            replay.streak += 1;
        } else {
            replay.streak = 0;
        }
        previous = current;
        replay.answered += 1;
        replay.score = current;
    }
    replay
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn entry(scores: &[(&str, f64)]) -> PlayerProgressEntry {
        PlayerProgressEntry {
            question_metrics: scores
                .iter()
                .map(|(n, s)| (n.to_string(), *s))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_rank_counts_players_at_or_above() {
        let e = entry(&[("me", 900.0), ("a", 1200.0), ("b", 900.0), ("c", 100.0)]);
        let s = standing(Some(&e), "me", 900.0);
        assert_eq!(s.rank, 3);
        let nemesis = s.nemesis.unwrap();
        assert_eq!(nemesis.name, "a");
        assert_eq!(nemesis.total_score, 1200.0);
    }

    #[test]
    fn test_leader_has_no_nemesis() {
        let e = entry(&[("me", 2000.0), ("a", 1200.0)]);
        let s = standing(Some(&e), "me", 2000.0);
        assert_eq!(s.rank, 1);
        assert!(s.nemesis.is_none());
        assert_eq!(standing(None, "me", 0.0).rank, 1);
    }

    #[test]
    fn test_replay_stops_at_missing_player() {
        let entries = vec![
            entry(&[("me", 800.0)]),
            entry(&[("me", 1700.0)]),
            entry(&[("me", 1700.0)]),
            entry(&[("me", 2500.0)]),
            entry(&[("other", 10.0)]),
        ];
        let replay = replay_history(&entries, &[], "me");
        assert_eq!(replay.answered, 4);
        assert_eq!(replay.score, 2500.0);
        assert_eq!(replay.streak, 1);
    }
}
