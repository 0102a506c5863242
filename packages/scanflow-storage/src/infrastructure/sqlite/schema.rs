//! SQLite schema

pub(super) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS components (
    id INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    kee TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    qualifier TEXT NOT NULL,
    scope TEXT NOT NULL,
    path TEXT,
    description TEXT,
    project_uuid TEXT,
    copy_component_id INTEGER,
    enabled INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY,
    component_id INTEGER NOT NULL REFERENCES components(id),
    root_snapshot_id INTEGER,
    parent_snapshot_id INTEGER,
    path TEXT,
    depth INTEGER NOT NULL DEFAULT 0,
    qualifier TEXT NOT NULL,
    scope TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    islast INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_snapshots_component ON snapshots(component_id, islast);
CREATE INDEX IF NOT EXISTS idx_snapshots_parent ON snapshots(parent_snapshot_id);
CREATE INDEX IF NOT EXISTS idx_snapshots_root ON snapshots(root_snapshot_id);

CREATE TABLE IF NOT EXISTS metrics (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    short_name TEXT NOT NULL,
    val_type TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS project_measures (
    id INTEGER PRIMARY KEY,
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),
    metric_id INTEGER NOT NULL REFERENCES metrics(id),
    value REAL,
    text_value TEXT,
    variation_value_1 REAL,
    variation_value_2 REAL,
    variation_value_3 REAL,
    variation_value_4 REAL,
    variation_value_5 REAL
);
CREATE INDEX IF NOT EXISTS idx_measures_snapshot_metric ON project_measures(snapshot_id, metric_id);

CREATE TABLE IF NOT EXISTS properties (
    id INTEGER PRIMARY KEY,
    prop_key TEXT NOT NULL,
    resource_id INTEGER,
    user_id INTEGER,
    text_value TEXT
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    login TEXT NOT NULL UNIQUE,
    name TEXT,
    email TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS user_groups (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS groups_users (
    user_id INTEGER NOT NULL REFERENCES users(id),
    group_id INTEGER NOT NULL REFERENCES user_groups(id),
    PRIMARY KEY (user_id, group_id)
);

CREATE TABLE IF NOT EXISTS user_tokens (
    id INTEGER PRIMARY KEY,
    login TEXT NOT NULL,
    name TEXT NOT NULL,
    token_hash TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_user_tokens_login ON user_tokens(login);

CREATE TABLE IF NOT EXISTS file_sources (
    component_key TEXT PRIMARY KEY,
    project_key TEXT NOT NULL,
    line_count INTEGER NOT NULL,
    line_data TEXT NOT NULL,
    data_hash TEXT NOT NULL,
    revision TEXT,
    last_change_date INTEGER,
    analysis_date INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
";
