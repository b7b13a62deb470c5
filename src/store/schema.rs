//! SQLite schema definition

/// SQL schema for the news document store
pub const SCHEMA_SQL: &str = r#"
-- Articles: ingested news items, clustered into topics
CREATE TABLE IF NOT EXISTS articles (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    source TEXT NOT NULL,
    source_priority TEXT NOT NULL DEFAULT 'medium',
    title TEXT NOT NULL,
    description TEXT,
    url TEXT,
    embedding_json TEXT,
    published_at TEXT NOT NULL,
    ingested_at TEXT NOT NULL,
    word_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    topic_id TEXT,
    former_topic_id TEXT,
    archived_at TEXT
);

-- Topics: one document per story; lists and vectors are JSON text
CREATE TABLE IF NOT EXISTS topics (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    status TEXT NOT NULL,
    article_ids_json TEXT NOT NULL,
    article_count INTEGER NOT NULL,
    sources_json TEXT NOT NULL,
    centroid_json TEXT NOT NULL,
    confidence REAL NOT NULL,
    title TEXT,
    summary TEXT,
    key_insights_json TEXT NOT NULL DEFAULT '[]',
    has_title INTEGER NOT NULL DEFAULT 0,
    narrative_confidence REAL,
    development_note TEXT,
    created_at TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    stale_since TEXT,
    archived_at TEXT,
    resurrected_at TEXT,
    merged_at TEXT,
    merged_from_json TEXT NOT NULL DEFAULT '[]',
    title_generated_at TEXT,
    last_regenerated TEXT,
    last_trimmed TEXT,
    discussion_id TEXT,
    history_point_count INTEGER NOT NULL DEFAULT 0,
    last_history_point TEXT,
    version INTEGER NOT NULL DEFAULT 0
);

-- Topic history: append-only snapshots, never updated or cascaded
CREATE TABLE IF NOT EXISTS topic_history (
    id TEXT PRIMARY KEY,
    topic_id TEXT NOT NULL,
    history_type TEXT NOT NULL,
    title TEXT,
    summary TEXT,
    key_insights_json TEXT NOT NULL,
    article_count INTEGER NOT NULL,
    sources_json TEXT NOT NULL,
    confidence REAL NOT NULL,
    centroid_json TEXT NOT NULL,
    significance_score REAL NOT NULL,
    breakdown_json TEXT NOT NULL,
    was_regenerated INTEGER NOT NULL,
    development_note TEXT,
    created_at TEXT NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status, ingested_at);
CREATE INDEX IF NOT EXISTS idx_articles_topic ON articles(topic_id);
CREATE INDEX IF NOT EXISTS idx_articles_category ON articles(category, status);
CREATE INDEX IF NOT EXISTS idx_topics_category ON topics(category, status);
CREATE INDEX IF NOT EXISTS idx_history_topic ON topic_history(topic_id, created_at);
"#;
