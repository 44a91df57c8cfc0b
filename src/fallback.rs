//! fallback.rs — Deterministic SQL for questions the LLM could not handle.
//!
//! An ordered rule table over the lower-cased question. The first rule whose
//! trigger matches and whose required parameter is present wins; a rule that
//! matches without its parameter defers to the rules after it.

use crate::extract::ExtractedParams;

/// Returned when no rule applies. Always executes successfully.
pub const DEFAULT_SQL: &str = "SELECT COUNT(*) FROM videos";

struct Rule {
    name: &'static str,
    matches: fn(&str) -> bool,
    build: fn(&ExtractedParams) -> Option<String>,
}

const RULES: &[Rule] = &[
    Rule {
        name: "total_videos",
        matches: |q| q.contains("сколько всего видео"),
        build: |_| Some(DEFAULT_SQL.to_string()),
    },
    Rule {
        name: "videos_by_creator",
        matches: |q| q.contains("сколько видео у креатора") || q.contains("креатора с id"),
        build: |p| {
            p.creator_id
                .as_ref()
                .map(|id| format!("SELECT COUNT(*) FROM videos WHERE creator_id = '{id}'"))
        },
    },
    Rule {
        name: "videos_over_views",
        matches: |q| q.contains("сколько видео набрало больше") && q.contains("просмотров"),
        build: |p| {
            p.first_number()
                .map(|n| format!("SELECT COUNT(*) FROM videos WHERE views_count > {n}"))
        },
    },
    Rule {
        name: "views_growth_on_date",
        matches: |q| q.contains("на сколько просмотров") && q.contains("выросли"),
        build: |p| {
            p.date.as_ref().map(|date| {
                format!(
                    "SELECT COALESCE(SUM(delta_views_count), 0) FROM video_snapshots \
                     WHERE DATE(created_at) = '{date}'"
                )
            })
        },
    },
    Rule {
        name: "videos_with_new_views_on_date",
        matches: |q| q.contains("сколько разных видео получали новые просмотры"),
        build: |p| {
            p.date.as_ref().map(|date| {
                format!(
                    "SELECT COUNT(DISTINCT video_id) FROM video_snapshots \
                     WHERE DATE(created_at) = '{date}' AND delta_views_count > 0"
                )
            })
        },
    },
];

/// Build SQL for `question` from the rule table. Pure and infallible.
pub fn fallback_sql(question: &str, params: &ExtractedParams) -> String {
    let lowered = question.to_lowercase();

    for rule in RULES {
        if !(rule.matches)(&lowered) {
            continue;
        }
        match (rule.build)(params) {
            Some(sql) => {
                tracing::debug!(rule = rule.name, "fallback rule matched");
                return sql;
            }
            None => {
                tracing::debug!(rule = rule.name, "fallback rule matched without its parameter, trying next");
            }
        }
    }

    DEFAULT_SQL.to_string()
}
