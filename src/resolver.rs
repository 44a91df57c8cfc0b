//! resolver.rs — Question → executable SQL.
//!
//! Two resolution strategies are tried in a fixed order: the language model
//! first, then the deterministic rule table. The model's answer is cleaned and
//! sanity-checked before it is trusted; any failure hands the same question
//! and extracted parameters to the fallback. There is no retry and no cache.

use std::collections::HashMap;
use std::future::Future;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::extract::{self, ExtractedParams};
use crate::fallback::{self, DEFAULT_SQL};
use crate::llm::{CompletionBackend, LlmError};
use crate::schema;

lazy_static! {
    // `:name` placeholders. The leading group keeps `::cast` and `10:00` intact.
    static ref PLACEHOLDER_RE: Regex =
        Regex::new(r"(^|[^:\w]):[A-Za-z_]\w*").expect("placeholder regex");
}

const SQL_KEYWORDS: &[&str] = &["SELECT", "COUNT", "SUM"];

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("generated text does not look like SQL: {0}")]
    Implausible(String),
}

/// Which strategy produced the SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrigin {
    Llm,
    Fallback,
}

/// Executable SQL plus its bound parameters. Literals are inlined into the
/// text, so `params` is always empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub sql: String,
    pub params: HashMap<String, String>,
    pub origin: QueryOrigin,
}

impl ResolvedQuery {
    pub fn new(sql: impl Into<String>, origin: QueryOrigin) -> Self {
        Self {
            sql: sql.into(),
            params: HashMap::new(),
            origin,
        }
    }
}

pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve(
        &self,
        question: &str,
        params: &ExtractedParams,
    ) -> impl Future<Output = Result<String, ResolveError>> + Send;
}

// ─── LLM strategy ───────────────────────────────────────────────────────────

pub struct LlmStrategy<B> {
    backend: B,
    system_prompt: String,
}

impl<B: CompletionBackend> LlmStrategy<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            system_prompt: schema::build_text_to_sql_prompt(),
        }
    }
}

impl<B: CompletionBackend> ResolutionStrategy for LlmStrategy<B> {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn resolve(&self, question: &str, _params: &ExtractedParams) -> Result<String, ResolveError> {
        let raw = self.backend.complete(&self.system_prompt, question).await?;
        let sql = clean_generated_sql(&raw);
        debug!(sql = %sql, "LLM generated SQL");

        if !looks_like_sql(&sql) {
            return Err(ResolveError::Implausible(sql.chars().take(120).collect()));
        }
        Ok(sql)
    }
}

/// Strip markdown fences and replace named placeholders with `NULL`.
pub fn clean_generated_sql(raw: &str) -> String {
    let unfenced = raw.replace("```sql", "").replace("```", "");
    PLACEHOLDER_RE
        .replace_all(unfenced.trim(), "${1}NULL")
        .into_owned()
}

/// Keyword-presence plausibility check.
pub fn looks_like_sql(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    SQL_KEYWORDS.iter().any(|kw| upper.contains(kw))
}

// ─── Fallback strategy ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackStrategy;

impl ResolutionStrategy for FallbackStrategy {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn resolve(&self, question: &str, params: &ExtractedParams) -> Result<String, ResolveError> {
        Ok(fallback::fallback_sql(question, params))
    }
}

// ─── Resolver ───────────────────────────────────────────────────────────────

pub struct QueryResolver<P> {
    primary: P,
    fallback: FallbackStrategy,
}

impl<P: ResolutionStrategy> QueryResolver<P> {
    pub fn new(primary: P) -> Self {
        Self {
            primary,
            fallback: FallbackStrategy,
        }
    }

    pub async fn resolve(&self, question: &str) -> ResolvedQuery {
        let params = extract::extract(question);
        if !params.is_empty() {
            debug!(?params, "extracted parameters");
        }

        match self.primary.resolve(question, &params).await {
            Ok(sql) => {
                info!(strategy = self.primary.name(), sql = %sql, "resolved question");
                return ResolvedQuery::new(sql, QueryOrigin::Llm);
            }
            Err(err) => {
                warn!(strategy = self.primary.name(), error = %err, "switching to fallback SQL");
            }
        }

        let sql = match self.fallback.resolve(question, &params).await {
            Ok(sql) => sql,
            Err(err) => {
                warn!(error = %err, "fallback failed, using default query");
                DEFAULT_SQL.to_string()
            }
        };
        info!(strategy = self.fallback.name(), sql = %sql, "resolved question");
        ResolvedQuery::new(sql, QueryOrigin::Fallback)
    }
}
