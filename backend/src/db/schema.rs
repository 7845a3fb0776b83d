/// Tables of the metadata store. Every statement is idempotent so the schema can be
/// applied on each open. Timestamps are UTC epoch milliseconds.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS feeds (
    id      TEXT PRIMARY KEY,
    name    TEXT NOT NULL UNIQUE,
    active  INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS datasources (
    id                      TEXT PRIMARY KEY,
    name                    TEXT NOT NULL UNIQUE,
    description             TEXT,
    kind                    TEXT NOT NULL CHECK (kind IN ('jdbc', 'derived')),
    type_name               TEXT,
    controller_service_id   TEXT,
    password                TEXT,
    connection_url          TEXT,
    driver_class_name       TEXT,
    driver_location         TEXT,
    db_user                 TEXT,
    datasource_type         TEXT,
    properties              TEXT
);

CREATE TABLE IF NOT EXISTS feed_datasources (
    feed_id         TEXT NOT NULL REFERENCES feeds(id),
    datasource_id   TEXT NOT NULL REFERENCES datasources(id),
    role            TEXT NOT NULL CHECK (role IN ('source', 'destination')),
    PRIMARY KEY (feed_id, datasource_id, role)
);

CREATE TABLE IF NOT EXISTS executed_feeds (
    feed_execution_id   INTEGER PRIMARY KEY,
    feed_instance_id    INTEGER NOT NULL,
    feed_name           TEXT NOT NULL,
    status              TEXT NOT NULL,
    exit_code           TEXT,
    exit_message        TEXT,
    start_time          INTEGER,
    end_time            INTEGER
);

CREATE INDEX IF NOT EXISTS executed_feeds_name_idx ON executed_feeds (feed_name, start_time);

CREATE TABLE IF NOT EXISTS executed_jobs (
    job_execution_id    INTEGER PRIMARY KEY,
    job_instance_id     INTEGER NOT NULL,
    feed_execution_id   INTEGER NOT NULL REFERENCES executed_feeds(feed_execution_id),
    job_name            TEXT NOT NULL,
    feed_name           TEXT NOT NULL,
    status              TEXT NOT NULL,
    exit_code           TEXT,
    exit_message        TEXT,
    start_time          INTEGER,
    end_time            INTEGER
);

CREATE INDEX IF NOT EXISTS executed_jobs_feed_idx ON executed_jobs (feed_name, start_time);
"#;
