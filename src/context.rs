//! Per-request scope handed to every manager: site, locale, configuration,
//! editor name, database session and tracing span.

use crate::config::{Config, Settings};
use crate::error::ConfigError;
use crate::store::Db;
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Context {
    site_id: i64,
    locale: Option<String>,
    editor: String,
    config: Arc<Config>,
    settings: Arc<Settings>,
    db: Db,
    span: tracing::Span,
}

impl Context {
    /// Site 1, no locale, editor `core`.
    pub fn new(db: Db, config: Config) -> Result<Self, ConfigError> {
        let settings = Settings::from_config(&config)?;
        let mut ctx = Context {
            site_id: 1,
            locale: None,
            editor: "core".into(),
            config: Arc::new(config),
            settings: Arc::new(settings),
            db,
            span: tracing::Span::none(),
        };
        ctx.span = ctx.make_span();
        Ok(ctx)
    }

    fn make_span(&self) -> tracing::Span {
        tracing::debug_span!(
            "mshop",
            site_id = self.site_id,
            editor = %self.editor,
            locale = self.locale.as_deref().unwrap_or("")
        )
    }

    pub fn with_site(mut self, site_id: i64) -> Self {
        self.site_id = site_id;
        self.span = self.make_span();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self.span = self.make_span();
        self
    }

    pub fn with_editor(mut self, editor: impl Into<String>) -> Self {
        self.editor = editor.into();
        self.span = self.make_span();
        self
    }

    /// Same scope with its own transaction slot, for independent units of work.
    pub fn session(&self) -> Context {
        Context {
            db: self.db.session(),
            ..self.clone()
        }
    }

    pub fn site_id(&self) -> i64 {
        self.site_id
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn editor(&self) -> &str {
        &self.editor
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Configuration value at `path`, or `default`.
    pub fn config_get<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        self.config.get_or(path, default)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}
