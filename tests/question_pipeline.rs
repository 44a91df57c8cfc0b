use serde_json::json;

use video_analytics_bot::bot::{self, NO_RESULT_TEXT};
use video_analytics_bot::database::Database;
use video_analytics_bot::executor::{QueryExecutor, ScalarValue};
use video_analytics_bot::fallback::DEFAULT_SQL;
use video_analytics_bot::llm::{CompletionBackend, LlmError};
use video_analytics_bot::resolver::{LlmStrategy, QueryOrigin, QueryResolver, ResolvedQuery};

/// Language model that is always down.
struct Offline;

impl CompletionBackend for Offline {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Err(LlmError::MissingApiKey)
    }
}

/// Language model that always answers with the same text.
struct Scripted(&'static str);

impl CompletionBackend for Scripted {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }
}

fn seeded_db(dir: &tempfile::TempDir) -> Database {
    let path = dir.path().join("pipeline.db");
    let db = Database::open(path.to_str().unwrap()).unwrap();
    let feed = json!({
        "videos": [
            {
                "id": "v1",
                "creator_id": "alpha",
                "video_created_at": "2025-11-01T10:00:00+00:00",
                "views_count": 150000,
                "snapshots": [
                    { "id": "s1", "views_count": 140000, "delta_views_count": 1200,
                      "created_at": "2025-11-27T09:00:00+00:00" },
                    { "id": "s2", "views_count": 150000, "delta_views_count": 10000,
                      "created_at": "2025-11-28T09:00:00+00:00" }
                ]
            },
            {
                "id": "v2",
                "creator_id": "beta",
                "video_created_at": "2025-11-03T10:00:00+00:00",
                "views_count": 900,
                "snapshots": [
                    { "id": "s3", "views_count": 900, "delta_views_count": 0,
                      "created_at": "2025-11-27T09:00:00+00:00" },
                    { "id": "s4", "views_count": 900, "delta_views_count": 234567,
                      "created_at": "2025-11-28T23:59:59+00:00" }
                ]
            },
            {
                "id": "v3",
                "creator_id": "alpha",
                "video_created_at": "2025-11-05T10:00:00+00:00",
                "views_count": 100001
            }
        ]
    });
    db.load_json(&feed, 20).unwrap();
    db
}

#[tokio::test]
async fn total_videos_with_llm_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let resolver = QueryResolver::new(LlmStrategy::new(Offline));
    let executor = QueryExecutor::new(db);

    let query = resolver.resolve("Сколько всего видео есть в системе?").await;
    assert_eq!(query.origin, QueryOrigin::Fallback);
    assert_eq!(query.sql, DEFAULT_SQL);
    assert_eq!(executor.execute(&query).await, Some(ScalarValue::Int(3)));
}

#[tokio::test]
async fn views_growth_on_a_date() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let resolver = QueryResolver::new(LlmStrategy::new(Offline));
    let executor = QueryExecutor::new(db);

    let query = resolver
        .resolve("На сколько просмотров в сумме выросли все видео 28 ноября 2025?")
        .await;
    assert!(query.sql.contains("SUM(delta_views_count)"));
    assert!(query.sql.contains("'2025-11-28'"));
    assert_eq!(executor.execute(&query).await, Some(ScalarValue::Int(244567)));
}

#[tokio::test]
async fn views_growth_on_an_empty_date_is_zero() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let resolver = QueryResolver::new(LlmStrategy::new(Offline));
    let executor = QueryExecutor::new(db);

    let query = resolver
        .resolve("На сколько просмотров в сумме выросли все видео 1 декабря 2025?")
        .await;
    assert_eq!(executor.execute(&query).await, Some(ScalarValue::Int(0)));
}

#[tokio::test]
async fn distinct_videos_with_new_views() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let service = bot::llm_service(Offline, QueryExecutor::new(db));

    let reply = service
        .answer("Сколько разных видео получали новые просмотры 27 ноября 2025?")
        .await;
    assert_eq!(reply, "📊 <b>Результат:</b> 1");
}

#[tokio::test]
async fn creator_and_threshold_questions() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let service = bot::llm_service(Offline, QueryExecutor::new(db));

    assert_eq!(
        service.answer("Сколько видео у креатора с id alpha?").await,
        "📊 <b>Результат:</b> 2"
    );
    assert_eq!(
        service
            .answer("Сколько видео набрало больше 100 000 просмотров?")
            .await,
        "📊 <b>Результат:</b> 2"
    );
}

#[tokio::test]
async fn plausible_llm_sql_is_executed_and_formatted() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let service = bot::llm_service(
        Scripted("```sql\nSELECT SUM(delta_views_count) FROM video_snapshots;\n```"),
        QueryExecutor::new(db),
    );

    let (query, reply) = service.respond("Сколько всего прибавилось просмотров?").await;
    assert_eq!(query.origin, QueryOrigin::Llm);
    assert_eq!(reply, "📊 <b>Результат:</b> 245 767");
}

#[tokio::test]
async fn broken_llm_sql_reports_no_result() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let service = bot::llm_service(
        Scripted("SELECT COUNT(*) FROM clips"),
        QueryExecutor::new(db),
    );

    assert_eq!(service.answer("Сколько клипов?").await, NO_RESULT_TEXT);
}

#[tokio::test]
async fn write_statements_from_llm_leave_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let snapshots_before = db.count_snapshots().unwrap();

    for sql in [
        "DELETE FROM videos WHERE id IN (SELECT id FROM videos)",
        "UPDATE videos SET views_count = (SELECT SUM(views_count) FROM videos)",
        "DELETE FROM video_snapshots WHERE delta_views_count >= (SELECT MIN(delta_views_count) FROM video_snapshots)",
    ] {
        let service = bot::llm_service(Scripted(sql), QueryExecutor::new(db.clone()));
        let (query, reply) = service.respond("Удали все видео").await;
        assert_eq!(query.origin, QueryOrigin::Llm, "{sql}");
        assert_eq!(reply, NO_RESULT_TEXT, "{sql}");
    }

    assert_eq!(db.count_videos().unwrap(), 3);
    assert_eq!(db.count_snapshots().unwrap(), snapshots_before);
    let executor = QueryExecutor::new(db);
    let views = executor
        .execute(&ResolvedQuery::new(
            "SELECT views_count FROM videos WHERE id = 'v2'",
            QueryOrigin::Fallback,
        ))
        .await;
    assert_eq!(views, Some(ScalarValue::Int(900)));
}

#[tokio::test]
async fn non_numeric_result_reports_generic_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let service = bot::llm_service(
        Scripted("SELECT creator_id FROM videos WHERE id = 'v1'"),
        QueryExecutor::new(db),
    );

    assert_eq!(service.answer("Кто автор видео v1?").await, bot::ERROR_TEXT);
}

#[tokio::test]
async fn fallback_sql_is_stable_across_calls() {
    let resolver = QueryResolver::new(LlmStrategy::new(Offline));
    let question = "Сколько видео у креатора с id beta?";
    let first = resolver.resolve(question).await;
    let second = resolver.resolve(question).await;
    assert_eq!(first.sql, second.sql);
    assert!(first.params.is_empty());
}
