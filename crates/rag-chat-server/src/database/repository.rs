use super::{ChunkRow, DbPool};
use anyhow::Result;
use pgvector::Vector;
use tracing::{debug, info};

pub struct Repository {
    pool: DbPool,
    table: String,
    dimension: usize,
}

impl Repository {
    /// `table` is interpolated into SQL, so only `[A-Za-z0-9_]` is accepted.
    pub fn new(pool: DbPool, table: &str, dimension: usize) -> Result<Self> {
        if !is_valid_identifier(table) {
            anyhow::bail!("Invalid chunk table name: {:?}", table);
        }
        if dimension == 0 {
            anyhow::bail!("Embedding dimension must be positive");
        }

        Ok(Self {
            pool,
            table: table.to_string(),
            dimension,
        })
    }

    /// Create the pgvector extension, chunk table and namespace index if missing
    pub async fn ensure_schema(&self) -> Result<()> {
        let pool = self.pool.get_pool();

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(pool)
            .await?;

        sqlx::query(&format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
                id BIGSERIAL PRIMARY KEY,
                namespace TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding vector({dim}) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#,
            table = self.table,
            dim = self.dimension
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_namespace_idx ON {table} (namespace)",
            table = self.table
        ))
        .execute(pool)
        .await?;

        info!("Vector table {} ready (dim={})", self.table, self.dimension);
        Ok(())
    }

    /// Bulk insert chunk texts with their embeddings
    pub async fn insert_chunks(
        &self,
        namespace: &str,
        chunks: &[String],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(format!(
            "INSERT INTO {} (namespace, content, embedding) ",
            self.table
        ));

        query_builder.push_values(chunks.iter().zip(embeddings), |mut b, (content, embedding)| {
            b.push_bind(namespace)
                .push_bind(content)
                .push_bind(Vector::from(embedding));
        });

        let result = query_builder.build().execute(self.pool.get_pool()).await?;
        Ok(result.rows_affected() as usize)
    }

    /// Cosine-distance search restricted to one namespace
    pub async fn search_namespace(
        &self,
        namespace: &str,
        query_embedding: Vector,
        limit: i64,
    ) -> Result<Vec<ChunkRow>> {
        let rows = sqlx::query_as::<_, ChunkRow>(&format!(
            r#"SELECT
                content,
                (1 - (embedding <=> $1))::float4 AS similarity
               FROM {}
               WHERE namespace = $2
               ORDER BY embedding <=> $1, id
               LIMIT $3"#,
            self.table
        ))
        .bind(query_embedding)
        .bind(namespace)
        .bind(limit)
        .fetch_all(self.pool.get_pool())
        .await?;

        debug!("Found {} chunks for namespace {}", rows.len(), namespace);
        Ok(rows)
    }
}

fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
