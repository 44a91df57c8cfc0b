//! bot.rs — Conversational front end.
//!
//! `/start` and `/help` answer with static text; anything else is treated as
//! a question: resolve → execute → format. Each incoming message is handled
//! on its own task. The only shared state is read-only.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::executor::{QueryExecutor, ScalarValue};
use crate::llm::CompletionBackend;
use crate::resolver::{LlmStrategy, QueryResolver, ResolutionStrategy, ResolvedQuery};
use crate::telegram::{Message, TelegramClient};

pub const WELCOME_TEXT: &str = "👋 <b>Привет! Я бот для аналитики видео.</b>\n\n\
Задайте мне вопрос на естественном языке, например:\n\
• Сколько всего видео есть в системе?\n\
• Сколько видео у креатора с id ... вышло с 1 по 5 ноября 2025?\n\
• Сколько видео набрало больше 100000 просмотров?\n\
• На сколько просмотров в сумме выросли все видео 28 ноября 2025?\n\
• Сколько разных видео получали новые просмотры 27 ноября 2025?\n\n\
Я верну вам ответ в виде одного числа.";

pub const HELP_TEXT: &str = "📊 <b>Примеры запросов:</b>\n\n\
1. <b>Подсчет видео:</b>\n\
   • 'Сколько всего видео есть в системе?'\n\
   • 'Сколько видео у креатора с id abc123?'\n\n\
2. <b>Запросы по датам:</b>\n\
   • 'Сколько видео вышло с 1 по 5 ноября 2025?'\n\
   • 'Сколько видео опубликовано 28 ноября 2025?'\n\n\
3. <b>Аналитика просмотров:</b>\n\
   • 'Сколько видео набрало больше 100000 просмотров?'\n\
   • 'На сколько просмотров выросли все видео вчера?'\n\n\
4. <b>Динамика просмотров:</b>\n\
   • 'Сколько разных видео получали новые просмотры 27 ноября 2025?'\n\n\
Просто напишите вопрос, и я постараюсь на него ответить!";

pub const PROCESSING_TEXT: &str = "🔄 <i>Обрабатываю запрос...</i>";

pub const NO_RESULT_TEXT: &str = "❌ <b>Не удалось получить результат.</b>\n\
Проверьте формулировку запроса.";

pub const ERROR_TEXT: &str = "❌ <b>Произошла ошибка при обработке запроса.</b>\n\
Пожалуйста, проверьте формулировку или попробуйте другой запрос.";

const POLL_ERROR_PAUSE: Duration = Duration::from_secs(5);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("result is not a number: {0:?}")]
    NotANumber(String),
}

/// Group digits in threes with a space: `1234567` → `1 234 567`.
pub fn format_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

pub fn format_result(value: &ScalarValue) -> Result<String, FormatError> {
    match value {
        ScalarValue::Int(n) => Ok(format_thousands(*n)),
        ScalarValue::Raw(text) => Err(FormatError::NotANumber(text.clone())),
    }
}

/// What an incoming text asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    Start,
    Help,
    Question(&'a str),
    Empty,
}

impl<'a> Request<'a> {
    pub fn parse(text: &'a str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Request::Empty;
        }
        let first = text.split_whitespace().next().unwrap_or_default();
        let command = first.split('@').next().unwrap_or_default();
        match command {
            "/start" => Request::Start,
            "/help" => Request::Help,
            _ => Request::Question(text),
        }
    }
}

/// Everything a message handler needs, shared read-only between tasks.
pub struct QuestionService<P> {
    resolver: QueryResolver<P>,
    executor: QueryExecutor,
}

impl<P: ResolutionStrategy> QuestionService<P> {
    pub fn new(resolver: QueryResolver<P>, executor: QueryExecutor) -> Self {
        Self { resolver, executor }
    }

    /// Resolve, execute and format one question into reply text.
    pub async fn answer(&self, question: &str) -> String {
        self.respond(question).await.1
    }

    /// Like `answer`, also returning the query that was run.
    pub async fn respond(&self, question: &str) -> (ResolvedQuery, String) {
        let query = self.resolver.resolve(question).await;
        let reply = match self.executor.execute(&query).await {
            None => NO_RESULT_TEXT.to_string(),
            Some(value) => match format_result(&value) {
                Ok(formatted) => format!("📊 <b>Результат:</b> {formatted}"),
                Err(err) => {
                    error!(sql = %query.sql, error = %err, "could not format query result");
                    ERROR_TEXT.to_string()
                }
            },
        };
        (query, reply)
    }
}

pub type LlmQuestionService<B> = QuestionService<LlmStrategy<B>>;

// ─── Polling loop ───────────────────────────────────────────────────────────

/// Poll Telegram until Ctrl-C, spawning one task per message.
pub async fn run<P>(telegram: TelegramClient, service: QuestionService<P>) -> anyhow::Result<()>
where
    P: ResolutionStrategy + 'static,
{
    let me = telegram.get_me().await?;
    info!(
        "Bot connected: @{}",
        me.username.as_deref().unwrap_or("<no username>")
    );

    let telegram = Arc::new(telegram);
    let service = Arc::new(service);
    let mut offset = 0i64;

    loop {
        let updates = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, stopping bot");
                return Ok(());
            }
            updates = telegram.get_updates(offset) => updates,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(err) => {
                warn!(error = %err, "getUpdates failed, pausing before next poll");
                tokio::time::sleep(POLL_ERROR_PAUSE).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let telegram = Arc::clone(&telegram);
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                handle_message(&telegram, &service, message).await;
            });
        }
    }
}

async fn handle_message<P: ResolutionStrategy>(
    telegram: &TelegramClient,
    service: &QuestionService<P>,
    message: Message,
) {
    let chat_id = message.chat.id;
    let user_id = message.from.as_ref().map(|u| u.id);
    let Some(text) = message.text.as_deref() else {
        return;
    };

    let outcome = match Request::parse(text) {
        Request::Empty => return,
        Request::Start => telegram.send_message(chat_id, WELCOME_TEXT).await.map(drop),
        Request::Help => telegram.send_message(chat_id, HELP_TEXT).await.map(drop),
        Request::Question(question) => {
            info!(?user_id, question, "question received");
            match telegram.send_message(chat_id, PROCESSING_TEXT).await {
                Ok(processing) => {
                    let reply = service.answer(question).await;
                    telegram
                        .edit_message_text(chat_id, processing.message_id, &reply)
                        .await
                }
                Err(err) => Err(err),
            }
        }
    };

    if let Err(err) = outcome {
        error!(chat_id, ?user_id, error = %err, "failed to reply");
    }
}

/// Convenience constructor for the production wiring.
pub fn llm_service<B: CompletionBackend>(backend: B, executor: QueryExecutor) -> LlmQuestionService<B> {
    QuestionService::new(QueryResolver::new(LlmStrategy::new(backend)), executor)
}
