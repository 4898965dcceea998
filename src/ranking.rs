use crate::entry::{TimeEntry, parse_date};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of people shown per leaderboard when the caller does not ask for
/// anything else.
pub const DEFAULT_TOP_N: usize = 5;

/// Length of the task breakdown window when no date range is given.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Title of the leaderboard that sums every task.
pub const OVERALL_TITLE: &str = "Overall Leaders";

/// One person's summed hours within a ranking.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredPerson {
    pub name: String,
    pub score: f64,
}

/// A titled list of people ordered by descending score.
///
/// `total` is the sum of the members actually kept in `members`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ranking {
    pub title: String,
    pub members: Vec<ScoredPerson>,
    pub total: f64,
}

/// Rankings ordered by descending total.
pub type RankingSet = Vec<Ranking>;

impl Ranking {
    /// Builds a ranking from a name → score map, keeping at most `limit`
    /// members.
    fn from_scores(title: &str, scores: BTreeMap<String, f64>, limit: Option<usize>) -> Self {
        let mut members = order_people(scores);
        if let Some(limit) = limit {
            members.truncate(limit);
        }
        let total = members.iter().map(|p| p.score).sum();

        Ranking {
            title: title.to_string(),
            members,
            total,
        }
    }
}

/// Orders people by descending score. Ties keep the map's name order.
fn order_people(scores: BTreeMap<String, f64>) -> Vec<ScoredPerson> {
    let mut people: Vec<ScoredPerson> = scores
        .into_iter()
        .map(|(name, score)| ScoredPerson { name, score })
        .collect();
    people.sort_by(|a, b| b.score.total_cmp(&a.score));
    people
}

/// Orders rankings by descending total. Ties keep emission order.
fn order_rankings(mut set: RankingSet) -> RankingSet {
    set.sort_by(|a, b| b.total.total_cmp(&a.total));
    set
}

type TaskScores = BTreeMap<String, BTreeMap<String, f64>>;

fn add_task_score(task_maps: &mut TaskScores, entry: &TimeEntry) {
    *task_maps
        .entry(entry.task.clone())
        .or_default()
        .entry(entry.name.clone())
        .or_insert(0.0) += entry.duration;
}

/// Builds the leaderboards: one overall ranking plus one per task, each cut
/// down to the top `top_n` people.
///
/// # Arguments
/// * `entries` - Normalized entries
/// * `top_n` - Maximum number of people per ranking
///
/// # Returns
/// * `RankingSet` - "Overall Leaders" (if there is any data) and one ranking
///   per task, ordered by descending total
pub fn rankings<'a>(entries: impl IntoIterator<Item = &'a TimeEntry>, top_n: usize) -> RankingSet {
    let mut overall: BTreeMap<String, f64> = BTreeMap::new();
    let mut task_maps = TaskScores::new();

    for entry in entries {
        *overall.entry(entry.name.clone()).or_insert(0.0) += entry.duration;
        add_task_score(&mut task_maps, entry);
    }

    let mut set = RankingSet::new();

    if !overall.is_empty() {
        set.push(Ranking::from_scores(OVERALL_TITLE, overall, Some(top_n)));
    }

    for (task, scores) in task_maps {
        if !scores.is_empty() {
            set.push(Ranking::from_scores(&task, scores, Some(top_n)));
        }
    }

    order_rankings(set)
}

/// Inclusive calendar window used to filter the task breakdown.
///
/// The window only applies when both bounds are set and `end >= start`;
/// otherwise every entry is included.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateWindow {
            start: Some(start),
            end: Some(end),
        }
    }

    /// The `days` days ending with `today`, inclusive.
    pub fn last_days(today: NaiveDate, days: i64) -> Self {
        DateWindow::new(today - Duration::days(days - 1), today)
    }

    /// Parses the `date-range` form value, `DD/MM/YYYY - DD/MM/YYYY`.
    ///
    /// A bound that fails to parse is left unset, which leaves the window
    /// inactive.
    pub fn from_range_param(value: &str) -> Self {
        let parts: Vec<&str> = value.split(" - ").collect();
        if parts.len() < 2 {
            return DateWindow::default();
        }

        DateWindow {
            start: parse_date(parts[0]),
            end: parse_date(parts[1]),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if end >= start)
    }

    pub fn contains(&self, entry: &TimeEntry) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) if end >= start => entry
                .parsed_date()
                .is_some_and(|date| date >= start && date <= end),
            _ => true,
        }
    }
}

/// Builds the per-task breakdown for the entries inside `window`.
///
/// Unlike [`rankings`] nobody is cut from a task.
pub fn task_breakdown<'a>(
    entries: impl IntoIterator<Item = &'a TimeEntry>,
    window: &DateWindow,
) -> RankingSet {
    let mut task_maps = TaskScores::new();

    for entry in entries.into_iter().filter(|e| window.contains(e)) {
        add_task_score(&mut task_maps, entry);
    }

    let set = task_maps
        .into_iter()
        .filter(|(_, scores)| !scores.is_empty())
        .map(|(task, scores)| Ranking::from_scores(&task, scores, None))
        .collect();

    order_rankings(set)
}
