//! schema.rs — Schema catalog for the video metrics store.
//!
//! Holds the DDL executed by the store owner and the system prompt that
//! constrains LLM output to single-number SQLite queries over these tables.

/// SQLite DDL for the two-table video metrics schema.
pub const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id                TEXT    PRIMARY KEY,
    creator_id        TEXT    NOT NULL,
    video_created_at  TEXT    NOT NULL,      -- 'YYYY-MM-DD HH:MM:SS' UTC
    views_count       INTEGER NOT NULL DEFAULT 0,
    likes_count       INTEGER NOT NULL DEFAULT 0,
    comments_count    INTEGER NOT NULL DEFAULT 0,
    reports_count     INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT    NOT NULL,
    updated_at        TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS video_snapshots (
    id                    TEXT    PRIMARY KEY,
    video_id              TEXT    NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
    views_count           INTEGER NOT NULL DEFAULT 0,
    likes_count           INTEGER NOT NULL DEFAULT 0,
    comments_count        INTEGER NOT NULL DEFAULT 0,
    reports_count         INTEGER NOT NULL DEFAULT 0,
    delta_views_count     INTEGER NOT NULL DEFAULT 0,
    delta_likes_count     INTEGER NOT NULL DEFAULT 0,
    delta_comments_count  INTEGER NOT NULL DEFAULT 0,
    delta_reports_count   INTEGER NOT NULL DEFAULT 0,
    created_at            TEXT    NOT NULL,  -- measurement time
    updated_at            TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_videos_creator     ON videos (creator_id);
CREATE INDEX IF NOT EXISTS idx_snapshots_video    ON video_snapshots (video_id);
CREATE INDEX IF NOT EXISTS idx_snapshots_created  ON video_snapshots (created_at);
"#;

/// Drops both tables, children first.
pub const DROP_DDL: &str = r#"
DROP TABLE IF EXISTS video_snapshots;
DROP TABLE IF EXISTS videos;
"#;

/// Column-level description shown to the model.
pub const SCHEMA_DESCRIPTION: &str = r#"1. Таблица videos:
   - id (text) - ID видео
   - creator_id (text) - ID креатора
   - video_created_at (timestamp) - дата публикации
   - views_count (integer) - просмотры
   - likes_count (integer) - лайки
   - comments_count (integer) - комментарии
   - reports_count (integer) - жалобы
   - created_at, updated_at (timestamp)

2. Таблица video_snapshots:
   - id (text) - ID снапшота
   - video_id (text) - ссылка на videos.id
   - views_count, likes_count, comments_count, reports_count (integer) - абсолютные значения
   - delta_views_count, delta_likes_count, delta_comments_count, delta_reports_count (integer) - приращения с прошлого замера
   - created_at (timestamp) - время замера
   - updated_at (timestamp)"#;

/// Worked question → SQL pairs included in the prompt.
pub const EXAMPLES: &[(&str, &str)] = &[
    (
        "Сколько всего видео есть в системе?",
        "SELECT COUNT(*) FROM videos;",
    ),
    (
        "Сколько видео у креатора с id abc123 вышло с 1 ноября 2025 по 5 ноября 2025 включительно?",
        "SELECT COUNT(*) FROM videos WHERE creator_id = 'abc123' AND DATE(video_created_at) BETWEEN '2025-11-01' AND '2025-11-05';",
    ),
    (
        "Сколько видео набрало больше 100000 просмотров за всё время?",
        "SELECT COUNT(*) FROM videos WHERE views_count > 100000;",
    ),
    (
        "На сколько просмотров в сумме выросли все видео 28 ноября 2025?",
        "SELECT COALESCE(SUM(delta_views_count), 0) FROM video_snapshots WHERE DATE(created_at) = '2025-11-28';",
    ),
    (
        "Сколько разных видео получали новые просмотры 27 ноября 2025?",
        "SELECT COUNT(DISTINCT video_id) FROM video_snapshots WHERE DATE(created_at) = '2025-11-27' AND delta_views_count > 0;",
    ),
];

/// System prompt for text-to-SQL generation.
pub fn build_text_to_sql_prompt() -> String {
    let examples = EXAMPLES
        .iter()
        .map(|(question, sql)| format!("Вопрос: {question}\nSQL: {sql}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Ты преобразуешь русские запросы в SQL для SQLite.

БАЗА ДАННЫХ:
{schema}

ВАЖНЫЕ ПРАВИЛА:
1. Для дат используй DATE() для сравнения дат без времени
2. Всегда подставляй КОНКРЕТНЫЕ значения из запроса в SQL
3. НЕ используй параметры типа :param_name
4. Для диапазонов дат используй BETWEEN
5. Всегда возвращай запрос, который возвращает ОДНО число
6. Только SELECT, никаких INSERT, UPDATE, DELETE, DROP

Примеры:
{examples}

ВОЗВРАЩАЙ ТОЛЬКО SQL ЗАПРОС, БЕЗ ОБЪЯСНЕНИЙ!"#,
        schema = SCHEMA_DESCRIPTION,
        examples = examples,
    )
}
