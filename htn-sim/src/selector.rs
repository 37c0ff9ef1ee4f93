use htn::{GoalHistory, GoalSelector, RankedGoal, TaskId};
use htn_core::WorldState;

type ScoreFn = Box<dyn Fn(&WorldState, &GoalHistory) -> f32>;

/// A goal and the function that scores it.
pub struct GoalOption {
    pub goal: TaskId,
    score_fn: ScoreFn,
}

impl GoalOption {
    pub fn new(goal: TaskId, score_fn: impl Fn(&WorldState, &GoalHistory) -> f32 + 'static) -> Self {
        Self {
            goal,
            score_fn: Box::new(score_fn),
        }
    }

    fn score(&self, state: &WorldState, history: &GoalHistory) -> f32 {
        let s = (self.score_fn)(state, history);
        if s.is_nan() { f32::NEG_INFINITY } else { s }
    }
}

/// Scores every option and ranks them, highest first. Ties keep option order.
pub struct UtilitySelector {
    options: Vec<GoalOption>,
    last_best: Option<RankedGoal>,
}

impl UtilitySelector {
    pub fn new(options: Vec<GoalOption>) -> Self {
        Self {
            options,
            last_best: None,
        }
    }

    pub fn last_best(&self) -> Option<RankedGoal> {
        self.last_best
    }
}

impl GoalSelector for UtilitySelector {
    fn rank_goals(&mut self, state: &WorldState, history: &GoalHistory) -> Vec<RankedGoal> {
        let mut ranked: Vec<RankedGoal> = self
            .options
            .iter()
            .map(|opt| RankedGoal {
                goal: opt.goal,
                score: opt.score(state, history),
            })
            .collect();
        // Stable sort keeps option order for equal scores.
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        self.last_best = ranked.first().copied();
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: TaskId = TaskId("a");
    const B: TaskId = TaskId("b");
    const C: TaskId = TaskId("c");

    #[test]
    fn ranks_highest_first_and_keeps_order_on_ties() {
        let mut selector = UtilitySelector::new(vec![
            GoalOption::new(A, |_, _| 1.0),
            GoalOption::new(B, |_, _| 2.0),
            GoalOption::new(C, |_, _| 1.0),
        ]);
        let ranked = selector.rank_goals(&WorldState::new(), &GoalHistory::new(4));
        let goals: Vec<_> = ranked.iter().map(|r| r.goal).collect();
        assert_eq!(goals, vec![B, A, C]);
        assert_eq!(selector.last_best().map(|r| r.goal), Some(B));
    }

    #[test]
    fn nan_scores_sink_to_the_bottom() {
        let mut selector = UtilitySelector::new(vec![
            GoalOption::new(A, |_, _| f32::NAN),
            GoalOption::new(B, |_, _| -5.0),
        ]);
        let ranked = selector.rank_goals(&WorldState::new(), &GoalHistory::new(4));
        assert_eq!(ranked[0].goal, B);
        assert_eq!(ranked[1].score, f32::NEG_INFINITY);
    }

    #[test]
    fn scores_can_read_the_goal_history() {
        let mut history = GoalHistory::new(4);
        history.push(A);
        let mut selector = UtilitySelector::new(vec![
            GoalOption::new(A, |_, h| h.distance_since(A) as f32),
            GoalOption::new(B, |_, h| h.distance_since(B) as f32),
        ]);
        let ranked = selector.rank_goals(&WorldState::new(), &history);
        assert_eq!(ranked[0].goal, B);
        assert_eq!(ranked[0].score, 4.0);
    }
}
