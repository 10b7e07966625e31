/// Schema statements applied idempotently at startup. Statements must not
/// contain literal semicolons; `Db::ensure_schema` splits on them.
pub const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS memories (
	id UUID PRIMARY KEY,
	text TEXT NOT NULL,
	tags JSONB NOT NULL DEFAULT '[]',
	source_app TEXT,
	session_id TEXT,
	status TEXT NOT NULL DEFAULT 'raw',
	created_at BIGINT NOT NULL,
	updated_at BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memories_session_id ON memories (session_id);
CREATE INDEX IF NOT EXISTS idx_memories_source_app ON memories (source_app);
CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories (created_at);
CREATE INDEX IF NOT EXISTS idx_memories_status ON memories (status);

CREATE TABLE IF NOT EXISTS ingest_queue (
	queue_id UUID PRIMARY KEY,
	payload JSONB NOT NULL,
	status TEXT NOT NULL DEFAULT 'PENDING',
	attempts INT NOT NULL DEFAULT 0,
	last_error TEXT,
	available_at TIMESTAMPTZ NOT NULL,
	created_at TIMESTAMPTZ NOT NULL,
	updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ingest_queue_due ON ingest_queue (status, available_at);
";
